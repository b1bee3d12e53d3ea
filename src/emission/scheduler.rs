use {
    super::{split_span, EmissionPlan, EmissionReport, EmitRequest},
    crate::{
        backend::{BackendError, GraphicsBackend, TextureHandle},
        grid::{Particle, ParticleGrid, NO_GLYPH},
    },
    std::f32::consts::TAU,
};

/// Owns the emission cursor and turns emission requests into partial
/// region uploads.
#[derive(Debug, Clone)]
pub struct EmissionScheduler {
    grid: ParticleGrid,
    cursor: u32,
}

impl EmissionScheduler {
    pub fn new(grid: ParticleGrid) -> Self {
        Self { grid, cursor: 0 }
    }

    /// The next linear index to be overwritten.
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn grid(&self) -> &ParticleGrid {
        &self.grid
    }

    /// Start the next emission at index 0.
    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    /// Compute the chunks and records for `request` at the current cursor
    /// without touching any backend.
    pub fn plan(&self, request: &EmitRequest) -> EmissionPlan {
        let chunks = split_span(&self.grid, self.cursor, request.count);
        let step = TAU / request.count.max(1) as f32;
        let records = (0..request.count)
            .map(|index| Particle {
                phase: step * index as f32 + request.phase_offset,
                radius: request.radius,
                size: request.point_size,
                glyph: glyph_for(request.glyphs, index),
            })
            .collect();
        EmissionPlan { chunks, records }
    }

    /// Write `request`'s particles into `target` and advance the cursor.
    ///
    /// A count of zero writes nothing and leaves the cursor where it is.
    pub fn emit<B>(
        &mut self,
        backend: &mut B,
        target: TextureHandle,
        request: &EmitRequest,
    ) -> Result<EmissionReport, BackendError>
    where
        B: GraphicsBackend + ?Sized,
    {
        let start_cursor = self.cursor;
        if request.count == 0 {
            log::debug!("Skipping an emission of zero particles");
            return Ok(EmissionReport {
                start_cursor,
                end_cursor: start_cursor,
                chunk_count: 0,
                record_count: 0,
            });
        }

        let plan = self.plan(request);
        let mut remaining = plan.records.as_slice();
        for chunk in &plan.chunks {
            let (texels, rest) = remaining.split_at(chunk.len as usize);
            backend.write_region(target, chunk.region(), texels)?;
            remaining = rest;
        }

        let capacity = self.grid.capacity() as u64;
        self.cursor =
            ((self.cursor as u64 + request.count as u64) % capacity) as u32;

        let report = EmissionReport {
            start_cursor,
            end_cursor: self.cursor,
            chunk_count: plan.chunks.len(),
            record_count: plan.records.len(),
        };
        log::trace!("{:?}", report);
        Ok(report)
    }
}

fn glyph_for(glyphs: &[i32], index: u32) -> f32 {
    if glyphs.is_empty() {
        NO_GLYPH
    } else {
        glyphs[index as usize % glyphs.len()] as f32
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::backend::{
            software::SoftwareBackend, SurfaceDescriptor, TexelRegion,
        },
        pretty_assertions::assert_eq,
        proptest::prelude::*,
        std::collections::HashSet,
    };

    fn request(count: u32, glyphs: &[i32]) -> EmitRequest<'_> {
        EmitRequest {
            count,
            radius: 0.25,
            point_size: 3.0,
            glyphs,
            phase_offset: 0.0,
        }
    }

    fn backend_and_texture(side: u32) -> (SoftwareBackend, TextureHandle) {
        let mut backend = SoftwareBackend::new(SurfaceDescriptor {
            width: 32,
            height: 32,
            scale: 1.0,
        });
        let texture = backend.create_state_texture(side).unwrap();
        (backend, texture)
    }

    #[test]
    fn phases_are_spread_evenly_around_the_circle() {
        let scheduler =
            EmissionScheduler::new(ParticleGrid::with_capacity(16).unwrap());
        let phases: Vec<f32> = scheduler
            .plan(&request(4, &[0]))
            .records
            .iter()
            .map(|record| record.phase)
            .collect();
        let expected = [0.0, TAU / 4.0, TAU / 2.0, 3.0 * TAU / 4.0];
        for (phase, expected) in phases.iter().zip(expected) {
            assert!((phase - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn glyphs_cycle_across_the_emission() {
        let scheduler =
            EmissionScheduler::new(ParticleGrid::with_capacity(16).unwrap());
        let glyphs: Vec<f32> = scheduler
            .plan(&request(5, &[7, 9]))
            .records
            .iter()
            .map(|record| record.glyph)
            .collect();
        assert_eq!(glyphs, vec![7.0, 9.0, 7.0, 9.0, 7.0]);
    }

    #[test]
    fn an_empty_glyph_sequence_uses_the_sentinel() {
        let scheduler =
            EmissionScheduler::new(ParticleGrid::with_capacity(16).unwrap());
        let plan = scheduler.plan(&request(3, &[]));
        assert!(plan.records.iter().all(|record| record.glyph == NO_GLYPH));
    }

    #[test]
    fn emit_writes_each_chunk_and_advances_the_cursor() {
        let (mut backend, texture) = backend_and_texture(4);
        let mut scheduler =
            EmissionScheduler::new(ParticleGrid::with_capacity(16).unwrap());
        scheduler
            .emit(&mut backend, texture, &request(3, &[1]))
            .unwrap();
        let report = scheduler
            .emit(&mut backend, texture, &request(3, &[2]))
            .unwrap();

        assert_eq!(
            report,
            EmissionReport {
                start_cursor: 3,
                end_cursor: 6,
                chunk_count: 2,
                record_count: 3,
            }
        );
        let regions: Vec<TexelRegion> = backend
            .region_writes()
            .iter()
            .map(|write| write.region)
            .collect();
        assert_eq!(
            regions,
            vec![
                TexelRegion { x: 0, y: 0, width: 3, height: 1 },
                TexelRegion { x: 3, y: 0, width: 1, height: 1 },
                TexelRegion { x: 0, y: 1, width: 2, height: 1 },
            ]
        );

        let texels = backend.state_texels(texture).unwrap();
        let glyphs: Vec<f32> = texels.iter().map(|t| t.glyph).collect();
        assert_eq!(&glyphs[..7], &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 0.0]);
        assert!(texels[6..].iter().all(|t| *t == Particle::default()));
    }

    #[test]
    fn zero_count_is_a_no_op() {
        let (mut backend, texture) = backend_and_texture(4);
        let mut scheduler =
            EmissionScheduler::new(ParticleGrid::with_capacity(16).unwrap());
        let report = scheduler
            .emit(&mut backend, texture, &request(0, &[1]))
            .unwrap();
        assert_eq!(report.record_count, 0);
        assert_eq!(scheduler.cursor(), 0);
        assert!(backend.region_writes().is_empty());
    }

    #[test]
    fn emitting_more_than_the_capacity_wraps_around() {
        let (mut backend, texture) = backend_and_texture(4);
        let mut scheduler =
            EmissionScheduler::new(ParticleGrid::with_capacity(16).unwrap());
        let report = scheduler
            .emit(&mut backend, texture, &request(16 + 10, &[3]))
            .unwrap();
        assert_eq!(report.end_cursor, 10);
        assert_eq!(report.record_count, 26);
    }

    proptest! {
        #[test]
        fn emission_targets_unique_slots(
            start in 0u32..64,
            count in 1u32..=64,
        ) {
            let grid = ParticleGrid::with_capacity(64).unwrap();
            let mut scheduler = EmissionScheduler::new(grid);
            scheduler.cursor = start;
            let plan = scheduler.plan(&request(count, &[0]));
            prop_assert_eq!(plan.records.len() as u32, count);

            let mut targets = HashSet::new();
            for chunk in &plan.chunks {
                for offset in 0..chunk.len {
                    let index = chunk.y * grid.side() + chunk.x + offset;
                    prop_assert!(targets.insert(index));
                }
            }
            prop_assert_eq!(targets.len() as u32, count);
        }

        #[test]
        fn the_cursor_advances_by_count_modulo_capacity(
            start in 0u32..16,
            count in 0u32..100,
        ) {
            let (mut backend, texture) = backend_and_texture(4);
            let mut scheduler =
                EmissionScheduler::new(ParticleGrid::with_capacity(16).unwrap());
            scheduler.cursor = start;
            scheduler.emit(&mut backend, texture, &request(count, &[0])).unwrap();
            prop_assert_eq!(scheduler.cursor(), (start + count) % 16);
        }
    }
}
