use nalgebra::Vector2;

/// The glyph value written when an emission call has no glyphs to cycle
/// through. Anything outside of the atlas range renders as nothing.
pub const NO_GLYPH: f32 = -128.0;

/// The datastructure used to represent a particle on the CPU and GPU.
///
/// One record fills exactly one RGBA32F texel of the state textures.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
#[repr(C)]
pub struct Particle {
    /// The angle along the spiral in radians.
    pub phase: f32,

    /// The spiral radius the particle was emitted at.
    pub radius: f32,

    /// The rendered point size.
    pub size: f32,

    /// The glyph atlas cell, stored as an integer-valued float.
    pub glyph: f32,
}

impl Particle {
    /// The particle's position on the spiral before any aspect correction.
    pub fn spiral_position(&self) -> Vector2<f32> {
        Vector2::new(self.phase.cos(), self.phase.sin()) * self.radius
    }

    /// True when the glyph value names one of the atlas symbols ('@'..'Z').
    pub fn has_glyph(&self) -> bool {
        self.glyph >= -1.0 && self.glyph <= 25.0
    }

    pub fn as_array(&self) -> [f32; 4] {
        [self.phase, self.radius, self.size, self.glyph]
    }
}

/// The vertex data used by the render pass to look up a particle's texel.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
#[repr(C)]
pub struct DataLocation {
    pub texel: [f32; 2],
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn particle_fills_one_rgba32f_texel() {
        assert_eq!(std::mem::size_of::<Particle>(), 16);
    }

    #[test]
    fn glyph_range_covers_at_sign_through_z() {
        let mut particle = Particle::default();
        particle.glyph = -1.0;
        assert!(particle.has_glyph());
        particle.glyph = 25.0;
        assert!(particle.has_glyph());
        particle.glyph = -33.0;
        assert!(!particle.has_glyph());
        particle.glyph = NO_GLYPH;
        assert!(!particle.has_glyph());
    }
}
