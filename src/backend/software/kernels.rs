//! CPU versions of the shader programs in `shaders/`.
//!
//! These mirror the GLSL one texel at a time so the software backend
//! produces the same simulation as the GPU.

use {
    crate::{backend::PassUniforms, grid::Particle},
    nalgebra::Vector2,
    std::f32::consts::TAU,
};

/// Angular speed numerator, in radians per millisecond.
pub const SPIN_RATE: f32 = 0.00012;

/// Keeps the innermost shells from spinning unboundedly fast.
pub const RADIUS_FALLOFF: f32 = 0.2;

/// A per-texel physics computation: one record in, one record out.
pub type TexelKernel = dyn Fn(Particle, &PassUniforms) -> Particle;

/// Rotate each emitted particle along its shell. Inner shells turn faster
/// than outer shells. Texels which were never emitted (size 0) are left
/// alone.
pub fn advance_spiral(particle: Particle, uniforms: &PassUniforms) -> Particle {
    if particle.size <= 0.0 {
        return particle;
    }
    let angular_speed = SPIN_RATE / (RADIUS_FALLOFF + particle.radius.abs());
    Particle {
        phase: (particle.phase + angular_speed * uniforms.delta_ms)
            .rem_euclid(TAU),
        ..particle
    }
}

/// The copy program.
pub fn identity(particle: Particle, _uniforms: &PassUniforms) -> Particle {
    particle
}

/// Where the render program places a particle, in normalized device
/// coordinates. The y axis is scaled so shells stay circular on wide
/// surfaces.
pub fn device_position(
    particle: &Particle,
    uniforms: &PassUniforms,
) -> Vector2<f32> {
    let mut position = particle.spiral_position();
    if uniforms.dest_size[1] > 0.0 {
        position.y *= uniforms.dest_size[0] / uniforms.dest_size[1];
    }
    position
}

/// The atlas cell for a glyph value, or None when the glyph renders as
/// nothing.
pub fn atlas_cell(particle: &Particle, atlas_grid: [f32; 2]) -> Option<(u32, u32)> {
    if !particle.has_glyph() {
        return None;
    }
    let columns = atlas_grid[0].max(1.0) as i32;
    let rows = atlas_grid[1].max(1.0) as i32;
    let cell = particle.glyph.round() as i32 + 1;
    if cell < 0 || cell >= columns * rows {
        return None;
    }
    Some(((cell % columns) as u32, (cell / columns) as u32))
}

/// The debug program's color for a raw state texel.
pub fn debug_color(particle: &Particle) -> [f32; 4] {
    [
        (particle.phase / TAU).rem_euclid(1.0),
        particle.radius.clamp(0.0, 1.0),
        (particle.size / 32.0).clamp(0.0, 1.0),
        0.75,
    ]
}

#[cfg(test)]
mod test {
    use super::*;

    fn uniforms(delta_ms: f32) -> PassUniforms {
        PassUniforms {
            delta_ms,
            dest_size: [200.0, 100.0],
            ..Default::default()
        }
    }

    #[test]
    fn unemitted_texels_do_not_move() {
        let particle = Particle::default();
        assert_eq!(advance_spiral(particle, &uniforms(16.0)), particle);
    }

    #[test]
    fn inner_shells_turn_faster() {
        let inner = Particle {
            radius: 0.1,
            size: 2.0,
            ..Default::default()
        };
        let outer = Particle {
            radius: 0.9,
            ..inner
        };
        let u = uniforms(16.0);
        assert!(advance_spiral(inner, &u).phase > advance_spiral(outer, &u).phase);
    }

    #[test]
    fn phase_stays_in_one_turn() {
        let particle = Particle {
            phase: TAU - 0.0001,
            radius: 0.0,
            size: 1.0,
            glyph: 0.0,
        };
        let advanced = advance_spiral(particle, &uniforms(1000.0));
        assert!(advanced.phase >= 0.0 && advanced.phase < TAU);
    }

    #[test]
    fn device_position_corrects_for_aspect() {
        let particle = Particle {
            phase: std::f32::consts::FRAC_PI_2,
            radius: 0.25,
            size: 1.0,
            glyph: 0.0,
        };
        let position = device_position(&particle, &uniforms(0.0));
        assert!(position.x.abs() < 1e-6);
        assert!((position.y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn atlas_cells_are_offset_by_one() {
        let grid = [8.0, 4.0];
        let at_sign = Particle {
            glyph: -1.0,
            ..Default::default()
        };
        let z = Particle {
            glyph: 25.0,
            ..Default::default()
        };
        let space = Particle {
            glyph: -33.0,
            ..Default::default()
        };
        assert_eq!(atlas_cell(&at_sign, grid), Some((0, 0)));
        assert_eq!(atlas_cell(&z, grid), Some((2, 3)));
        assert_eq!(atlas_cell(&space, grid), None);
        assert_eq!(atlas_cell(&z, [4.0, 4.0]), None);
    }
}
