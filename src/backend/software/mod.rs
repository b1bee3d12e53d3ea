//! A CPU implementation of [GraphicsBackend].
//!
//! State textures are plain `Vec<Particle>` buffers and each program is a
//! Rust function applied one texel at a time. The backend keeps a log of
//! every pass it runs and every region it writes so callers can check the
//! order and shape of the work the simulation asks for.

pub mod kernels;
mod raster;

use {
    self::kernels::TexelKernel,
    crate::{
        backend::{
            BackendError, GraphicsBackend, OverlayDraw, ParticleDraw,
            ProgramHandle, ProgramKind, SurfaceDescriptor, TexelRegion,
            TextureHandle, TexturePass,
        },
        grid::{DataLocation, Particle},
    },
    image::{Rgba, RgbaImage},
};

/// Where a pass rendered to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PassTarget {
    Texture(TextureHandle),
    Surface,
}

/// One recorded pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassRecord {
    pub program: ProgramKind,
    pub sampled: Vec<TextureHandle>,
    pub target: PassTarget,
}

/// One recorded partial-region upload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RegionWrite {
    pub texture: TextureHandle,
    pub region: TexelRegion,
}

enum SoftwareTexture {
    State { side: u32, texels: Vec<Particle> },
    Atlas(RgbaImage),
}

pub struct SoftwareBackend {
    surface: SurfaceDescriptor,
    textures: Vec<SoftwareTexture>,
    programs: Vec<ProgramKind>,
    physics: Box<TexelKernel>,
    data_locations: Vec<DataLocation>,
    frame: RgbaImage,
    presented: RgbaImage,
    pass_log: Vec<PassRecord>,
    region_writes: Vec<RegionWrite>,
    float_textures: bool,
    failing_program: Option<ProgramKind>,
}

impl SoftwareBackend {
    /// Create a backend which presents into an image of the surface's
    /// physical size.
    pub fn new(surface: SurfaceDescriptor) -> Self {
        let (width, height) = surface.physical_size();
        Self {
            surface,
            textures: vec![],
            programs: vec![],
            physics: Box::new(kernels::advance_spiral),
            data_locations: vec![],
            frame: RgbaImage::from_pixel(width, height, raster::CLEAR_COLOR),
            presented: RgbaImage::from_pixel(
                width,
                height,
                raster::CLEAR_COLOR,
            ),
            pass_log: vec![],
            region_writes: vec![],
            float_textures: true,
            failing_program: None,
        }
    }

    /// Replace the physics program's kernel.
    pub fn with_physics_kernel<F>(mut self, kernel: F) -> Self
    where
        F: Fn(Particle, &crate::backend::PassUniforms) -> Particle + 'static,
    {
        self.physics = Box::new(kernel);
        self
    }

    /// Behave like a device without RGBA32F render targets.
    pub fn without_float_textures(mut self) -> Self {
        self.float_textures = false;
        self
    }

    /// Make creation of one program fail, like a shader which does not link.
    pub fn failing_program(mut self, kind: ProgramKind) -> Self {
        self.failing_program = Some(kind);
        self
    }

    /// The full contents of a state texture in row-major order.
    pub fn state_texels(
        &self,
        texture: TextureHandle,
    ) -> Result<&[Particle], BackendError> {
        match self.textures.get(texture.0 as usize) {
            Some(SoftwareTexture::State { texels, .. }) => Ok(texels),
            _ => Err(BackendError::UnknownTexture(texture)),
        }
    }

    /// Every pass run so far, oldest first.
    pub fn pass_log(&self) -> &[PassRecord] {
        &self.pass_log
    }

    /// Every partial-region upload so far, oldest first.
    pub fn region_writes(&self) -> &[RegionWrite] {
        &self.region_writes
    }

    /// Forget the recorded passes and region writes.
    pub fn clear_logs(&mut self) {
        self.pass_log.clear();
        self.region_writes.clear();
    }

    fn program_kind(
        &self,
        program: ProgramHandle,
    ) -> Result<ProgramKind, BackendError> {
        self.programs
            .get(program.0 as usize)
            .copied()
            .ok_or(BackendError::UnknownProgram(program))
    }

    fn state(&self, texture: TextureHandle) -> Result<(u32, &[Particle]), BackendError> {
        match self.textures.get(texture.0 as usize) {
            Some(SoftwareTexture::State { side, texels }) => Ok((*side, texels)),
            _ => Err(BackendError::UnknownTexture(texture)),
        }
    }

    fn atlas(&self, texture: TextureHandle) -> Result<&RgbaImage, BackendError> {
        match self.textures.get(texture.0 as usize) {
            Some(SoftwareTexture::Atlas(image)) => Ok(image),
            _ => Err(BackendError::UnknownTexture(texture)),
        }
    }

    /// Clear `frame` and splat every particle into it.
    fn splat_particles(
        &self,
        frame: &mut RgbaImage,
        draw: &ParticleDraw,
    ) -> Result<(), BackendError> {
        let (side, state) = self.state(draw.state)?;
        let atlas = self.atlas(draw.atlas)?;
        for pixel in frame.pixels_mut() {
            *pixel = raster::CLEAR_COLOR;
        }
        let count = (draw.particle_count as usize).min(self.data_locations.len());
        raster::draw_point_sprites(
            frame,
            state,
            side,
            &self.data_locations[..count],
            atlas,
            &draw.uniforms,
        );
        Ok(())
    }

    fn push_texture(&mut self, texture: SoftwareTexture) -> TextureHandle {
        self.textures.push(texture);
        TextureHandle((self.textures.len() - 1) as u32)
    }
}

impl GraphicsBackend for SoftwareBackend {
    fn describe(&self) -> String {
        let (width, height) = self.surface.physical_size();
        format!("Software rasterizer ({}x{} surface)", width, height)
    }

    fn supports_float_textures(&self) -> bool {
        self.float_textures
    }

    fn surface(&self) -> SurfaceDescriptor {
        self.surface
    }

    fn create_state_texture(
        &mut self,
        side: u32,
    ) -> Result<TextureHandle, BackendError> {
        if !self.float_textures {
            return Err(BackendError::Unsupported(
                "RGBA32F render targets are not available".to_owned(),
            ));
        }
        let texels = vec![Particle::default(); side as usize * side as usize];
        Ok(self.push_texture(SoftwareTexture::State { side, texels }))
    }

    fn create_glyph_atlas(&mut self) -> Result<TextureHandle, BackendError> {
        let blank = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0]));
        Ok(self.push_texture(SoftwareTexture::Atlas(blank)))
    }

    fn upload_glyph_atlas(
        &mut self,
        atlas: TextureHandle,
        image: &RgbaImage,
    ) -> Result<(), BackendError> {
        match self.textures.get_mut(atlas.0 as usize) {
            Some(SoftwareTexture::Atlas(current)) => {
                *current = image.clone();
                Ok(())
            }
            _ => Err(BackendError::UnknownTexture(atlas)),
        }
    }

    fn write_region(
        &mut self,
        texture: TextureHandle,
        region: TexelRegion,
        texels: &[Particle],
    ) -> Result<(), BackendError> {
        let Some(SoftwareTexture::State { side, texels: dst }) =
            self.textures.get_mut(texture.0 as usize)
        else {
            return Err(BackendError::UnknownTexture(texture));
        };
        if !region.fits_within(*side, *side) {
            return Err(BackendError::RegionOutOfBounds {
                region,
                width: *side,
                height: *side,
            });
        }
        if texels.len() != region.texel_count() {
            return Err(BackendError::TexelCountMismatch {
                region,
                expected: region.texel_count(),
                actual: texels.len(),
            });
        }
        if region.width > 0 {
            for (row, source) in
                texels.chunks(region.width as usize).enumerate()
            {
                let start = (region.y as usize + row) * *side as usize
                    + region.x as usize;
                dst[start..start + source.len()].copy_from_slice(source);
            }
        }
        self.region_writes.push(RegionWrite { texture, region });
        Ok(())
    }

    fn upload_data_locations(
        &mut self,
        locations: &[DataLocation],
    ) -> Result<(), BackendError> {
        self.data_locations = locations.to_vec();
        Ok(())
    }

    fn create_program(
        &mut self,
        kind: ProgramKind,
    ) -> Result<ProgramHandle, BackendError> {
        if self.failing_program == Some(kind) {
            return Err(BackendError::ProgramCreation {
                program: kind,
                reason: "the program failed to link".to_owned(),
            });
        }
        self.programs.push(kind);
        Ok(ProgramHandle((self.programs.len() - 1) as u32))
    }

    fn run_texture_pass(
        &mut self,
        pass: &TexturePass,
    ) -> Result<(), BackendError> {
        let kind = self.program_kind(pass.program)?;
        if !kind.targets_state_texture() {
            return Err(BackendError::ProgramCreation {
                program: kind,
                reason: "the program does not render into a state texture"
                    .to_owned(),
            });
        }
        if pass.source == pass.target {
            return Err(BackendError::FeedbackLoop(pass.target));
        }

        let (source_side, source) = self.state(pass.source)?;
        let (target_side, _) = self.state(pass.target)?;
        if source_side != target_side {
            return Err(BackendError::RegionOutOfBounds {
                region: TexelRegion {
                    x: 0,
                    y: 0,
                    width: source_side,
                    height: source_side,
                },
                width: target_side,
                height: target_side,
            });
        }

        let result: Vec<Particle> = match kind {
            ProgramKind::Physics => source
                .iter()
                .map(|&texel| (self.physics)(texel, &pass.uniforms))
                .collect(),
            _ => source
                .iter()
                .map(|&texel| kernels::identity(texel, &pass.uniforms))
                .collect(),
        };
        if let Some(SoftwareTexture::State { texels, .. }) =
            self.textures.get_mut(pass.target.0 as usize)
        {
            *texels = result;
        }

        self.pass_log.push(PassRecord {
            program: kind,
            sampled: vec![pass.source],
            target: PassTarget::Texture(pass.target),
        });
        Ok(())
    }

    fn draw_particles(
        &mut self,
        draw: &ParticleDraw,
    ) -> Result<(), BackendError> {
        let kind = self.program_kind(draw.program)?;

        let mut frame = std::mem::take(&mut self.frame);
        let drawn = self.splat_particles(&mut frame, draw);
        self.frame = frame;
        drawn?;

        self.pass_log.push(PassRecord {
            program: kind,
            sampled: vec![draw.state, draw.atlas],
            target: PassTarget::Surface,
        });
        Ok(())
    }

    fn draw_overlay(
        &mut self,
        draw: &OverlayDraw,
    ) -> Result<(), BackendError> {
        let kind = self.program_kind(draw.program)?;

        let mut frame = std::mem::take(&mut self.frame);
        let drawn = self.state(draw.source).map(|(side, state)| {
            raster::draw_state_overlay(&mut frame, state, side, &draw.viewport)
        });
        self.frame = frame;
        drawn?;

        self.pass_log.push(PassRecord {
            program: kind,
            sampled: vec![draw.source],
            target: PassTarget::Surface,
        });
        Ok(())
    }

    fn present(&mut self) -> Result<(), BackendError> {
        self.presented = self.frame.clone();
        Ok(())
    }

    fn read_surface(&mut self) -> Result<RgbaImage, BackendError> {
        Ok(self.presented.clone())
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::backend::{PassUniforms, Viewport},
        pretty_assertions::assert_eq,
    };

    fn backend() -> SoftwareBackend {
        SoftwareBackend::new(SurfaceDescriptor {
            width: 64,
            height: 32,
            scale: 1.0,
        })
    }

    fn particle(phase: f32) -> Particle {
        Particle {
            phase,
            radius: 0.5,
            size: 2.0,
            glyph: 0.0,
        }
    }

    #[test]
    fn write_region_only_touches_the_region() {
        let mut backend = backend();
        let texture = backend.create_state_texture(4).unwrap();
        let region = TexelRegion {
            x: 1,
            y: 2,
            width: 2,
            height: 1,
        };
        backend
            .write_region(texture, region, &[particle(1.0), particle(2.0)])
            .unwrap();

        let texels = backend.state_texels(texture).unwrap();
        for (index, texel) in texels.iter().enumerate() {
            match index {
                9 => assert_eq!(*texel, particle(1.0)),
                10 => assert_eq!(*texel, particle(2.0)),
                _ => assert_eq!(*texel, Particle::default()),
            }
        }
        assert_eq!(backend.region_writes(), &[RegionWrite { texture, region }]);
    }

    #[test]
    fn write_region_rejects_regions_outside_the_texture() {
        let mut backend = backend();
        let texture = backend.create_state_texture(4).unwrap();
        let region = TexelRegion {
            x: 3,
            y: 0,
            width: 2,
            height: 1,
        };
        let result =
            backend.write_region(texture, region, &[particle(0.0); 2]);
        assert!(matches!(
            result,
            Err(BackendError::RegionOutOfBounds { .. })
        ));
    }

    #[test]
    fn write_region_rejects_the_wrong_number_of_texels() {
        let mut backend = backend();
        let texture = backend.create_state_texture(4).unwrap();
        let region = TexelRegion {
            x: 0,
            y: 0,
            width: 3,
            height: 1,
        };
        let result = backend.write_region(texture, region, &[particle(0.0)]);
        assert!(matches!(
            result,
            Err(BackendError::TexelCountMismatch {
                expected: 3,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn aliased_passes_are_rejected() {
        let mut backend = backend();
        let texture = backend.create_state_texture(2).unwrap();
        let program = backend.create_program(ProgramKind::Copy).unwrap();
        let result = backend.run_texture_pass(&TexturePass {
            program,
            source: texture,
            target: texture,
            uniforms: PassUniforms::default(),
        });
        assert!(matches!(result, Err(BackendError::FeedbackLoop(t)) if t == texture));
        assert!(backend.pass_log().is_empty());
    }

    #[test]
    fn physics_pass_advances_every_emitted_texel() {
        let mut backend =
            backend().with_physics_kernel(|mut texel, uniforms| {
                texel.phase += uniforms.delta_ms;
                texel
            });
        let input = backend.create_state_texture(2).unwrap();
        let output = backend.create_state_texture(2).unwrap();
        let program = backend.create_program(ProgramKind::Physics).unwrap();
        backend
            .write_region(
                input,
                TexelRegion {
                    x: 0,
                    y: 0,
                    width: 2,
                    height: 2,
                },
                &[particle(0.0), particle(1.0), particle(2.0), particle(3.0)],
            )
            .unwrap();

        backend
            .run_texture_pass(&TexturePass {
                program,
                source: input,
                target: output,
                uniforms: PassUniforms {
                    delta_ms: 10.0,
                    ..Default::default()
                },
            })
            .unwrap();

        let phases: Vec<f32> = backend
            .state_texels(output)
            .unwrap()
            .iter()
            .map(|texel| texel.phase)
            .collect();
        assert_eq!(phases, vec![10.0, 11.0, 12.0, 13.0]);
        assert_eq!(
            backend.pass_log(),
            &[PassRecord {
                program: ProgramKind::Physics,
                sampled: vec![input],
                target: PassTarget::Texture(output),
            }]
        );
    }

    #[test]
    fn copy_pass_reproduces_the_source() {
        let mut backend = backend();
        let a = backend.create_state_texture(2).unwrap();
        let b = backend.create_state_texture(2).unwrap();
        let program = backend.create_program(ProgramKind::Copy).unwrap();
        backend
            .write_region(
                a,
                TexelRegion {
                    x: 1,
                    y: 1,
                    width: 1,
                    height: 1,
                },
                &[particle(4.0)],
            )
            .unwrap();
        backend
            .run_texture_pass(&TexturePass {
                program,
                source: a,
                target: b,
                uniforms: PassUniforms::default(),
            })
            .unwrap();
        assert_eq!(
            backend.state_texels(a).unwrap(),
            backend.state_texels(b).unwrap()
        );
    }

    #[test]
    fn state_textures_need_float_support() {
        let mut backend = backend().without_float_textures();
        assert!(!backend.supports_float_textures());
        assert!(matches!(
            backend.create_state_texture(4),
            Err(BackendError::Unsupported(_))
        ));
    }

    #[test]
    fn present_freezes_the_surface() {
        let mut backend = backend();
        let state = backend.create_state_texture(1).unwrap();
        let atlas = backend.create_glyph_atlas().unwrap();
        let program = backend.create_program(ProgramKind::Render).unwrap();
        backend
            .upload_glyph_atlas(
                atlas,
                &RgbaImage::from_pixel(8, 4, Rgba([255, 255, 255, 255])),
            )
            .unwrap();
        backend
            .upload_data_locations(&[DataLocation { texel: [0.0, 0.0] }])
            .unwrap();
        backend
            .write_region(
                state,
                TexelRegion {
                    x: 0,
                    y: 0,
                    width: 1,
                    height: 1,
                },
                &[Particle {
                    phase: 0.0,
                    radius: 0.0,
                    size: 4.0,
                    glyph: 0.0,
                }],
            )
            .unwrap();

        let draw = ParticleDraw {
            program,
            state,
            atlas,
            particle_count: 1,
            uniforms: PassUniforms {
                dest_size: [64.0, 32.0],
                atlas_grid: [8.0, 4.0],
                pixel_ratio: 1.0,
                ..Default::default()
            },
        };
        backend.draw_particles(&draw).unwrap();
        assert_eq!(
            *backend.read_surface().unwrap().get_pixel(32, 16),
            raster::CLEAR_COLOR
        );

        backend.present().unwrap();
        assert_eq!(
            *backend.read_surface().unwrap().get_pixel(32, 16),
            Rgba([255, 255, 255, 255])
        );
    }

    #[test]
    fn failed_draws_keep_the_surface() {
        let mut backend = backend();
        let program = backend.create_program(ProgramKind::Render).unwrap();
        let debug = backend.create_program(ProgramKind::Debug).unwrap();
        let missing = TextureHandle(7);

        let particles = backend.draw_particles(&ParticleDraw {
            program,
            state: missing,
            atlas: missing,
            particle_count: 1,
            uniforms: PassUniforms::default(),
        });
        assert!(matches!(
            particles,
            Err(BackendError::UnknownTexture(t)) if t == missing
        ));

        let overlay = backend.draw_overlay(&OverlayDraw {
            program: debug,
            source: missing,
            viewport: Viewport {
                x: 0.0,
                y: 0.0,
                width: 8.0,
                height: 8.0,
            },
            uniforms: PassUniforms::default(),
        });
        assert!(matches!(overlay, Err(BackendError::UnknownTexture(_))));
        assert!(backend.pass_log().is_empty());

        backend.present().unwrap();
        let surface = backend.read_surface().unwrap();
        assert_eq!(surface.dimensions(), (64, 32));
        assert!(surface.pixels().all(|pixel| *pixel == raster::CLEAR_COLOR));
    }
}
