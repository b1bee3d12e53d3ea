//! The owned per-display simulation state.

use {
    crate::{
        backend::{
            BackendError, GraphicsBackend, OverlayDraw, ParticleDraw,
            PassUniforms, ProgramHandle, ProgramKind, SurfaceDescriptor,
            TexelRegion, TextureHandle, Viewport,
        },
        config::{Config, ConfigError, SpiralConfig},
        emission::{EmissionReport, EmissionScheduler, EmitRequest},
        grid::{GridError, Particle, ParticleGrid},
        logging::PrettyList,
        spiral::{glyph_indices, SpiralLayout},
        stepper::{BufferStrategy, SimulationStepper, StepError},
        timing::FrameTime,
    },
    image::RgbaImage,
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Step(#[from] StepError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The overlay's logical size and its margin from the bottom-left corner.
const OVERLAY_WIDTH: f32 = 360.0;
const OVERLAY_HEIGHT: f32 = 180.0;
const OVERLAY_MARGIN: f32 = 16.0;

/// The four programs every simulation needs.
#[derive(Debug, Copy, Clone)]
struct Programs {
    physics: ProgramHandle,
    copy: ProgramHandle,
    render: ProgramHandle,
    debug: ProgramHandle,
}

/// Everything one display needs to emit, advance, and draw its particles.
pub struct SimulationContext<B: GraphicsBackend> {
    backend: B,
    grid: ParticleGrid,
    atlas: TextureHandle,
    atlas_grid: [f32; 2],
    programs: Programs,
    stepper: SimulationStepper,
    scheduler: EmissionScheduler,
    layout: SpiralLayout,
    clear_on_reset: bool,
    debug_overlay: bool,
}

impl<B: GraphicsBackend> SimulationContext<B> {
    /// Build the simulation on `backend` and emit the initial spiral.
    ///
    /// Any failure here is fatal: the simulation cannot run without float
    /// textures or any of its programs.
    pub fn new(mut backend: B, config: &Config) -> Result<Self, SimulationError> {
        config.validate()?;
        if !backend.supports_float_textures() {
            return Err(BackendError::Unsupported(format!(
                "{} cannot render into RGBA32F textures",
                backend.describe()
            ))
            .into());
        }

        let grid = ParticleGrid::with_capacity(config.simulation.capacity)?;
        let textures = [
            backend.create_state_texture(grid.side())?,
            backend.create_state_texture(grid.side())?,
        ];
        let atlas = backend.create_glyph_atlas()?;
        backend.upload_data_locations(&grid.data_locations())?;

        let programs = Programs {
            physics: backend.create_program(ProgramKind::Physics)?,
            copy: backend.create_program(ProgramKind::Copy)?,
            render: backend.create_program(ProgramKind::Render)?,
            debug: backend.create_program(ProgramKind::Debug)?,
        };
        let stepper = SimulationStepper::new(
            config.simulation.buffer_strategy,
            textures,
            programs.physics,
            programs.copy,
        )?;

        log::info!(
            "Simulation created on {}\n{:#?}\nbuffer strategy: {:?}",
            backend.describe(),
            grid,
            stepper.strategy()
        );

        let mut context = Self {
            backend,
            scheduler: EmissionScheduler::new(grid),
            grid,
            atlas,
            atlas_grid: [
                config.atlas.columns as f32,
                config.atlas.rows as f32,
            ],
            programs,
            stepper,
            layout: config.spiral.layout,
            clear_on_reset: config.simulation.clear_on_reset,
            debug_overlay: config.simulation.debug_overlay,
        };
        context.emit_spiral(&config.spiral)?;
        Ok(context)
    }

    /// Restart the emission cursor and emit the spiral again with new
    /// parameters.
    ///
    /// Existing particles are only erased when `clear_on_reset` is enabled.
    /// Otherwise the new shells simply overwrite the slots from index 0.
    pub fn reset_spiral(
        &mut self,
        text: &str,
        delta_count: f32,
        delta_phase: f32,
    ) -> Result<Vec<EmissionReport>, SimulationError> {
        self.scheduler.reset_cursor();
        if self.clear_on_reset {
            self.clear_input()?;
        }
        self.emit_spiral(&SpiralConfig {
            text: text.to_owned(),
            delta_count,
            delta_phase,
            layout: self.layout,
        })
    }

    /// Emit one batch of particles into the input texture.
    pub fn emit(
        &mut self,
        request: &EmitRequest,
    ) -> Result<EmissionReport, SimulationError> {
        let target = self.stepper.input();
        Ok(self.scheduler.emit(&mut self.backend, target, request)?)
    }

    /// Advance every particle by one tick.
    pub fn step(&mut self, time: FrameTime) -> Result<(), SimulationError> {
        let uniforms = self.uniforms(time);
        self.stepper.step(&mut self.backend, &uniforms)?;
        Ok(())
    }

    /// Draw the latest state to the surface, then the debug overlay when it
    /// is enabled.
    pub fn draw(&mut self, time: FrameTime) -> Result<(), SimulationError> {
        let uniforms = self.uniforms(time);
        let latest = self.stepper.latest();
        self.backend.draw_particles(&ParticleDraw {
            program: self.programs.render,
            state: latest,
            atlas: self.atlas,
            particle_count: self.grid.capacity(),
            uniforms,
        })?;
        if self.debug_overlay {
            self.backend.draw_overlay(&OverlayDraw {
                program: self.programs.debug,
                source: latest,
                viewport: overlay_viewport(&self.backend.surface()),
                uniforms,
            })?;
        }
        Ok(())
    }

    pub fn present(&mut self) -> Result<(), SimulationError> {
        Ok(self.backend.present()?)
    }

    /// Replace the blank glyph atlas with a decoded image.
    pub fn upload_atlas(
        &mut self,
        image: &RgbaImage,
    ) -> Result<(), SimulationError> {
        self.backend.upload_glyph_atlas(self.atlas, image)?;
        log::info!(
            "Glyph atlas uploaded ({}x{})",
            image.width(),
            image.height()
        );
        Ok(())
    }

    /// The most recently presented surface contents.
    pub fn read_surface(&mut self) -> Result<RgbaImage, SimulationError> {
        Ok(self.backend.read_surface()?)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn grid(&self) -> &ParticleGrid {
        &self.grid
    }

    pub fn cursor(&self) -> u32 {
        self.scheduler.cursor()
    }

    pub fn strategy(&self) -> BufferStrategy {
        self.stepper.strategy()
    }

    /// The texture emission writes into.
    pub fn input_texture(&self) -> TextureHandle {
        self.stepper.input()
    }

    /// The texture holding the most recently simulated state.
    pub fn latest_texture(&self) -> TextureHandle {
        self.stepper.latest()
    }

    /// The uniforms shared by every pass of one frame.
    pub fn uniforms(&self, time: FrameTime) -> PassUniforms {
        let surface = self.backend.surface();
        let side = self.grid.side() as f32;
        PassUniforms {
            bounds: [side, side],
            dest_size: [surface.width as f32, surface.height as f32],
            atlas_grid: self.atlas_grid,
            time_ms: time.time_ms,
            delta_ms: time.delta_ms.max(0.0),
            pixel_ratio: surface.scale,
        }
    }

    fn emit_spiral(
        &mut self,
        spiral: &SpiralConfig,
    ) -> Result<Vec<EmissionReport>, SimulationError> {
        let glyphs = glyph_indices(&spiral.text);
        let shells = self.layout.shells(
            self.backend.surface().width,
            spiral.delta_count,
            spiral.delta_phase,
        );
        log::debug!(
            "Emitting the spiral for {:?}\n{}",
            spiral.text,
            PrettyList::titled("shells", &shells)
        );

        let target = self.stepper.input();
        let mut reports = Vec::with_capacity(shells.len());
        for shell in &shells {
            let request = shell.request(&glyphs);
            reports.push(self.scheduler.emit(
                &mut self.backend,
                target,
                &request,
            )?);
        }
        Ok(reports)
    }

    fn clear_input(&mut self) -> Result<(), SimulationError> {
        let side = self.grid.side();
        let zeroes = vec![Particle::default(); self.grid.capacity() as usize];
        self.backend.write_region(
            self.stepper.input(),
            TexelRegion {
                x: 0,
                y: 0,
                width: side,
                height: side,
            },
            &zeroes,
        )?;
        Ok(())
    }
}

/// Where the debug overlay lands, in physical pixels with the origin at the
/// top-left of the surface.
pub fn overlay_viewport(surface: &SurfaceDescriptor) -> Viewport {
    let (_, physical_height) = surface.physical_size();
    let scale = surface.scale;
    Viewport {
        x: OVERLAY_MARGIN * scale,
        y: physical_height as f32 - (OVERLAY_MARGIN + OVERLAY_HEIGHT) * scale,
        width: OVERLAY_WIDTH * scale,
        height: OVERLAY_HEIGHT * scale,
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::backend::software::{PassTarget, SoftwareBackend},
        pretty_assertions::assert_eq,
    };

    fn surface() -> SurfaceDescriptor {
        SurfaceDescriptor {
            width: 400,
            height: 300,
            scale: 1.0,
        }
    }

    fn small_config() -> Config {
        let mut config = Config::default();
        config.simulation.capacity = 64 * 64;
        config.surface.width = 400;
        config.surface.height = 300;
        config
    }

    #[test]
    fn new_emits_the_initial_spiral() {
        let context =
            SimulationContext::new(SoftwareBackend::new(surface()), &small_config())
                .unwrap();
        // 83 shells of 100 particles
        assert_eq!(context.cursor(), 8300 % 4096);

        let texels = context
            .backend()
            .state_texels(context.input_texture())
            .unwrap();
        assert!(texels.iter().all(|texel| texel.size > 0.0));
    }

    #[test]
    fn new_fails_without_float_textures() {
        let backend = SoftwareBackend::new(surface()).without_float_textures();
        let result = SimulationContext::new(backend, &small_config());
        assert!(matches!(
            result,
            Err(SimulationError::Backend(BackendError::Unsupported(_)))
        ));
    }

    #[test]
    fn new_fails_when_a_program_cannot_be_created() {
        let backend =
            SoftwareBackend::new(surface()).failing_program(ProgramKind::Render);
        let result = SimulationContext::new(backend, &small_config());
        assert!(matches!(
            result,
            Err(SimulationError::Backend(BackendError::ProgramCreation {
                program: ProgramKind::Render,
                ..
            }))
        ));
    }

    #[test]
    fn new_rejects_invalid_capacities() {
        let mut config = small_config();
        config.simulation.capacity = 1000;
        let result =
            SimulationContext::new(SoftwareBackend::new(surface()), &config);
        assert!(matches!(result, Err(SimulationError::Config(_))));
    }

    #[test]
    fn draw_renders_particles_then_the_overlay() {
        let mut context =
            SimulationContext::new(SoftwareBackend::new(surface()), &small_config())
                .unwrap();
        context.backend_mut().clear_logs();
        context.draw(FrameTime::default()).unwrap();

        let targets: Vec<(ProgramKind, PassTarget)> = context
            .backend()
            .pass_log()
            .iter()
            .map(|record| (record.program, record.target))
            .collect();
        assert_eq!(
            targets,
            vec![
                (ProgramKind::Render, PassTarget::Surface),
                (ProgramKind::Debug, PassTarget::Surface),
            ]
        );
    }

    #[test]
    fn uniforms_describe_the_grid_and_surface() {
        let mut descriptor = surface();
        descriptor.scale = 2.0;
        let context =
            SimulationContext::new(SoftwareBackend::new(descriptor), &small_config())
                .unwrap();
        let uniforms = context.uniforms(FrameTime {
            time_ms: 100.0,
            delta_ms: -5.0,
        });
        assert_eq!(uniforms.bounds, [64.0, 64.0]);
        assert_eq!(uniforms.dest_size, [400.0, 300.0]);
        assert_eq!(uniforms.atlas_grid, [8.0, 4.0]);
        assert_eq!(uniforms.delta_ms, 0.0);
        assert_eq!(uniforms.pixel_ratio, 2.0);
    }

    #[test]
    fn the_overlay_sits_in_the_bottom_left_corner() {
        let viewport = overlay_viewport(&SurfaceDescriptor {
            width: 800,
            height: 600,
            scale: 2.0,
        });
        assert_eq!(
            viewport,
            Viewport {
                x: 32.0,
                y: 1200.0 - 32.0 - 360.0,
                width: 720.0,
                height: 360.0,
            }
        );
    }
}
