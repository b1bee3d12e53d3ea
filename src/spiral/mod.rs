mod text;

use {
    crate::emission::EmitRequest,
    serde::Deserialize,
    std::fmt,
};

pub use self::text::glyph_indices;

/// The initial sequence of concentric shells.
///
/// Shell `i` (for `first_shell <= i < last_shell`) emits
/// `base_count + i * delta_count` particles at radius
/// `((radius_base + radius_linear * i + radius_quadratic * i²) / width) / 2`
/// with point size `(size_base + i * size_per_shell) / 2`.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpiralLayout {
    pub first_shell: u32,
    pub last_shell: u32,
    pub base_count: f32,
    pub radius_base: f32,
    pub radius_linear: f32,
    pub radius_quadratic: f32,
    pub size_base: f32,
    pub size_per_shell: f32,
}

impl Default for SpiralLayout {
    fn default() -> Self {
        Self {
            first_shell: 17,
            last_shell: 100,
            base_count: 100.0,
            radius_base: 20.0,
            radius_linear: 3.0,
            radius_quadratic: 0.25,
            size_base: 3.0,
            size_per_shell: 0.5,
        }
    }
}

/// The emission parameters of one shell. Glyphs are supplied separately
/// so a whole shell sequence can share one glyph buffer.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Shell {
    pub index: u32,
    pub count: u32,
    pub radius: f32,
    pub point_size: f32,
    pub phase_offset: f32,
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shell {}: {} particles, radius {:.4}, size {:.2}, phase {:.2}",
            self.index, self.count, self.radius, self.point_size, self.phase_offset
        )
    }
}

impl Shell {
    pub fn request<'glyphs>(&self, glyphs: &'glyphs [i32]) -> EmitRequest<'glyphs> {
        EmitRequest {
            count: self.count,
            radius: self.radius,
            point_size: self.point_size,
            glyphs,
            phase_offset: self.phase_offset,
        }
    }
}

impl SpiralLayout {
    /// Every shell in emission order.
    ///
    /// # Params
    ///
    /// * `surface_width` - the logical surface width the radius formula is
    ///   expressed against
    /// * `delta_count` - added to the particle count once per shell index
    /// * `delta_phase` - the phase offset per shell index
    pub fn shells(
        &self,
        surface_width: u32,
        delta_count: f32,
        delta_phase: f32,
    ) -> Vec<Shell> {
        let width = surface_width.max(1) as f32;
        (self.first_shell..self.last_shell)
            .map(|index| {
                let i = index as f32;
                let count = (self.base_count + i * delta_count).floor().max(1.0);
                let radius = ((self.radius_base
                    + self.radius_linear * i
                    + self.radius_quadratic * i * i)
                    / width)
                    / 2.0;
                Shell {
                    index,
                    count: count as u32,
                    radius,
                    point_size: (self.size_base + i * self.size_per_shell) / 2.0,
                    phase_offset: i * delta_phase,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use {super::*, pretty_assertions::assert_eq};

    #[test]
    fn the_default_layout_emits_83_shells() {
        let shells = SpiralLayout::default().shells(1366, 0.0, 0.4);
        assert_eq!(shells.len(), 83);
        assert_eq!(shells[0].index, 17);
        assert_eq!(shells[82].index, 99);
        assert!(shells.iter().all(|shell| shell.count == 100));
    }

    #[test]
    fn shell_geometry_follows_the_formulas() {
        let shell = SpiralLayout::default().shells(1000, 2.0, 0.5)[0];
        assert_eq!(shell.count, 134);
        // 20 + 51 + 72.25 = 143.25
        assert!((shell.radius - 143.25 / 1000.0 / 2.0).abs() < 1e-7);
        assert_eq!(shell.point_size, 5.75);
        assert_eq!(shell.phase_offset, 8.5);
    }

    #[test]
    fn counts_never_drop_below_one() {
        let shells = SpiralLayout::default().shells(1366, -10.0, 0.0);
        assert!(shells.iter().all(|shell| shell.count >= 1));
    }

    #[test]
    fn fractional_counts_round_down() {
        let shell = SpiralLayout::default().shells(1366, 0.5, 0.0)[0];
        assert_eq!(shell.count, 108);
    }

    #[test]
    fn shells_describe_themselves_on_one_line() {
        let shell = Shell {
            index: 17,
            count: 100,
            radius: 0.05,
            point_size: 5.75,
            phase_offset: 6.8,
        };
        assert_eq!(
            shell.to_string(),
            "shell 17: 100 particles, radius 0.0500, size 5.75, phase 6.80"
        );
    }
}
