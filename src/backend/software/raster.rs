use {
    super::kernels,
    crate::{
        backend::{PassUniforms, Viewport},
        grid::{DataLocation, Particle},
    },
    image::{Rgba, RgbaImage},
};

pub(super) const CLEAR_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Splat one additive point sprite per data location into `target`.
///
/// `state` is the row-major state texture with `side` texels per row.
pub(super) fn draw_point_sprites(
    target: &mut RgbaImage,
    state: &[Particle],
    side: u32,
    locations: &[DataLocation],
    atlas: &RgbaImage,
    uniforms: &PassUniforms,
) {
    let (width, height) = target.dimensions();
    for location in locations {
        let [x, y] = location.texel;
        let index = (y as usize) * side as usize + x as usize;
        let Some(particle) = state.get(index) else {
            continue;
        };
        if particle.size <= 0.0 {
            continue;
        }
        let Some((column, row)) =
            kernels::atlas_cell(particle, uniforms.atlas_grid)
        else {
            continue;
        };

        let position = kernels::device_position(particle, uniforms);
        let center_x = (position.x * 0.5 + 0.5) * width as f32;
        let center_y = (position.y * 0.5 + 0.5) * height as f32;
        let point_size = particle.size * uniforms.pixel_ratio.max(0.0);
        if point_size <= 0.0 {
            continue;
        }
        let left = center_x - point_size / 2.0;
        let top = center_y - point_size / 2.0;

        let first_x = left.floor().max(0.0) as u32;
        let first_y = top.floor().max(0.0) as u32;
        let last_x = ((left + point_size).ceil().max(0.0) as u32).min(width);
        let last_y = ((top + point_size).ceil().max(0.0) as u32).min(height);

        for py in first_y..last_y {
            let v = (py as f32 + 0.5 - top) / point_size;
            if !(0.0..1.0).contains(&v) {
                continue;
            }
            for px in first_x..last_x {
                let u = (px as f32 + 0.5 - left) / point_size;
                if !(0.0..1.0).contains(&u) {
                    continue;
                }
                let texel = sample_cell(atlas, uniforms.atlas_grid, column, row, u, v);
                blend_additive(target.get_pixel_mut(px, py), texel);
            }
        }
    }
}

/// Draw the raw state texture into `viewport` with alpha blending.
pub(super) fn draw_state_overlay(
    target: &mut RgbaImage,
    state: &[Particle],
    side: u32,
    viewport: &Viewport,
) {
    let (width, height) = target.dimensions();
    if viewport.width <= 0.0 || viewport.height <= 0.0 || side == 0 {
        return;
    }
    let first_x = viewport.x.max(0.0) as u32;
    let first_y = viewport.y.max(0.0) as u32;
    let last_x = ((viewport.x + viewport.width).max(0.0) as u32).min(width);
    let last_y = ((viewport.y + viewport.height).max(0.0) as u32).min(height);

    for py in first_y..last_y {
        let v = (py as f32 + 0.5 - viewport.y) / viewport.height;
        let ty = ((v * side as f32) as u32).min(side - 1);
        for px in first_x..last_x {
            let u = (px as f32 + 0.5 - viewport.x) / viewport.width;
            let tx = ((u * side as f32) as u32).min(side - 1);
            let particle = &state[(ty * side + tx) as usize];
            blend_alpha(
                target.get_pixel_mut(px, py),
                kernels::debug_color(particle),
            );
        }
    }
}

fn sample_cell(
    atlas: &RgbaImage,
    atlas_grid: [f32; 2],
    column: u32,
    row: u32,
    u: f32,
    v: f32,
) -> [f32; 4] {
    let (width, height) = atlas.dimensions();
    if width == 0 || height == 0 {
        return [0.0; 4];
    }
    let atlas_u = (column as f32 + u) / atlas_grid[0].max(1.0);
    let atlas_v = (row as f32 + v) / atlas_grid[1].max(1.0);
    let x = ((atlas_u * width as f32) as u32).min(width - 1);
    let y = ((atlas_v * height as f32) as u32).min(height - 1);
    let Rgba([r, g, b, a]) = *atlas.get_pixel(x, y);
    [
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        a as f32 / 255.0,
    ]
}

/// `SRC_ALPHA, ONE` blending.
fn blend_additive(dst: &mut Rgba<u8>, src: [f32; 4]) {
    let alpha = src[3];
    for channel in 0..4 {
        let source = src[channel] * alpha;
        let current = dst.0[channel] as f32 / 255.0;
        dst.0[channel] = to_byte(current + source);
    }
}

/// `SRC_ALPHA, ONE_MINUS_SRC_ALPHA` blending.
fn blend_alpha(dst: &mut Rgba<u8>, src: [f32; 4]) {
    let alpha = src[3];
    for channel in 0..3 {
        let current = dst.0[channel] as f32 / 255.0;
        dst.0[channel] = to_byte(src[channel] * alpha + current * (1.0 - alpha));
    }
    let current = dst.0[3] as f32 / 255.0;
    dst.0[3] = to_byte(alpha * alpha + current * (1.0 - alpha));
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn additive_blending_saturates() {
        let mut pixel = Rgba([200, 0, 0, 255]);
        blend_additive(&mut pixel, [1.0, 0.5, 0.0, 1.0]);
        assert_eq!(pixel, Rgba([255, 128, 0, 255]));
    }

    #[test]
    fn transparent_atlas_texels_add_nothing() {
        let mut pixel = Rgba([10, 20, 30, 255]);
        blend_additive(&mut pixel, [1.0, 1.0, 1.0, 0.0]);
        assert_eq!(pixel, Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn sprites_land_at_the_spiral_position() {
        let mut target = RgbaImage::from_pixel(100, 100, CLEAR_COLOR);
        let atlas = RgbaImage::from_pixel(8, 4, Rgba([255, 255, 255, 255]));
        let state = [Particle {
            phase: 0.0,
            radius: 0.5,
            size: 2.0,
            glyph: 0.0,
        }];
        let uniforms = PassUniforms {
            dest_size: [100.0, 100.0],
            atlas_grid: [8.0, 4.0],
            pixel_ratio: 1.0,
            ..Default::default()
        };
        draw_point_sprites(
            &mut target,
            &state,
            1,
            &[DataLocation { texel: [0.0, 0.0] }],
            &atlas,
            &uniforms,
        );

        // x = (0.5 * 0.5 + 0.5) * 100 = 75, y = 50
        assert_eq!(*target.get_pixel(75, 50), Rgba([255, 255, 255, 255]));
        assert_eq!(*target.get_pixel(10, 10), CLEAR_COLOR);
    }
}
