//! The capabilities the simulation needs from a graphics backend.
//!
//! The simulation never talks to a graphics API directly. Everything it
//! needs (float state textures, partial-region uploads, offscreen passes,
//! point-sprite presentation) is expressed through [GraphicsBackend], which
//! is implemented by the CPU [software::SoftwareBackend] and the headless
//! [vulkan::VulkanBackend].

pub mod software;
pub mod vulkan;

use {
    crate::grid::{DataLocation, Particle},
    image::RgbaImage,
    std::path::PathBuf,
    thiserror::Error,
};

pub use self::vulkan::VulkanError;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Unable to create a graphics context: {}", .0)]
    ContextCreation(String),

    #[error("The graphics backend is unsupported: {}", .0)]
    Unsupported(String),

    #[error("Unable to load shader code from {:?}", .path)]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to create the {:?} program: {}", .program, .reason)]
    ProgramCreation { program: ProgramKind, reason: String },

    #[error("No texture exists for handle {:?}", .0)]
    UnknownTexture(TextureHandle),

    #[error("No program exists for handle {:?}", .0)]
    UnknownProgram(ProgramHandle),

    #[error(
        "Texture {:?} cannot be sampled while it is also the render target",
        .0
    )]
    FeedbackLoop(TextureHandle),

    #[error("Region {:?} does not fit inside a {}x{} texture", .region, .width, .height)]
    RegionOutOfBounds {
        region: TexelRegion,
        width: u32,
        height: u32,
    },

    #[error("Region {:?} needs {} texels but {} were provided", .region, .expected, .actual)]
    TexelCountMismatch {
        region: TexelRegion,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Vulkan(#[from] VulkanError),
}

/// An opaque handle to a texture owned by a backend.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u32);

/// An opaque handle to a program owned by a backend.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub(crate) u32);

/// The four programs which make up the simulation pipeline.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// Advances every particle record by one step. Renders into a state
    /// texture.
    Physics,

    /// Identity full-grid copy between state textures.
    Copy,

    /// Draws one point sprite per particle into the surface.
    Render,

    /// Draws the raw state texture into a corner of the surface.
    Debug,
}

impl ProgramKind {
    /// The vertex and fragment shader names for this program. Backends which
    /// consume compiled shader code look for `<name>.spv`.
    pub fn shader_names(&self) -> (&'static str, &'static str) {
        match self {
            ProgramKind::Physics => ("fullscreen.vert", "physics.frag"),
            ProgramKind::Copy => ("fullscreen.vert", "copy.frag"),
            ProgramKind::Render => ("render.vert", "render.frag"),
            ProgramKind::Debug => ("fullscreen.vert", "debug.frag"),
        }
    }

    /// True when the program renders into a state texture rather than the
    /// surface.
    pub fn targets_state_texture(&self) -> bool {
        matches!(self, ProgramKind::Physics | ProgramKind::Copy)
    }
}

/// Describes the drawable a backend presents into.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SurfaceDescriptor {
    /// Logical width, the unit the spiral radius formula is expressed in.
    pub width: u32,

    /// Logical height.
    pub height: u32,

    /// Physical pixels per logical pixel.
    pub scale: f32,
}

impl SurfaceDescriptor {
    /// The drawable size in physical pixels.
    pub fn physical_size(&self) -> (u32, u32) {
        (
            ((self.width as f32) * self.scale).round().max(1.0) as u32,
            ((self.height as f32) * self.scale).round().max(1.0) as u32,
        )
    }
}

/// A rectangle of texels.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TexelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TexelRegion {
    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// True when the region lies entirely inside a `width` x `height`
    /// texture.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}

/// A viewport in physical surface pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Values every program can read. The layout matches the push constant
/// block declared by the shaders.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
#[repr(C)]
pub struct PassUniforms {
    /// The state texture size in texels.
    pub bounds: [f32; 2],

    /// The surface size in logical pixels.
    pub dest_size: [f32; 2],

    /// Glyph atlas columns and rows.
    pub atlas_grid: [f32; 2],

    /// Total elapsed simulation time.
    pub time_ms: f32,

    /// Time since the previous frame.
    pub delta_ms: f32,

    /// Physical pixels per logical pixel. Point sizes are logical.
    pub pixel_ratio: f32,
}

/// A full-texture offscreen pass: `source` is sampled, `target` is the only
/// render target.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TexturePass {
    pub program: ProgramHandle,
    pub source: TextureHandle,
    pub target: TextureHandle,
    pub uniforms: PassUniforms,
}

/// One additive point sprite per particle, drawn into the surface.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ParticleDraw {
    pub program: ProgramHandle,
    pub state: TextureHandle,
    pub atlas: TextureHandle,
    pub particle_count: u32,
    pub uniforms: PassUniforms,
}

/// The raw state texture drawn into a viewport of the surface.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OverlayDraw {
    pub program: ProgramHandle,
    pub source: TextureHandle,
    pub viewport: Viewport,
    pub uniforms: PassUniforms,
}

/// Everything the simulation needs from a graphics implementation.
///
/// Calls are synchronous: when a method returns the backend is free to be
/// used again, and results of earlier calls are visible to later ones.
pub trait GraphicsBackend {
    /// A human-readable description used in logs.
    fn describe(&self) -> String;

    /// True when RGBA32F textures can be both sampled and rendered into.
    fn supports_float_textures(&self) -> bool;

    /// The drawable surface this backend presents into.
    fn surface(&self) -> SurfaceDescriptor;

    /// Create a zero-filled square RGBA32F state texture.
    fn create_state_texture(
        &mut self,
        side: u32,
    ) -> Result<TextureHandle, BackendError>;

    /// Create the glyph atlas texture. It starts as a single transparent
    /// texel until [GraphicsBackend::upload_glyph_atlas] replaces it.
    fn create_glyph_atlas(&mut self) -> Result<TextureHandle, BackendError>;

    /// Replace the contents (and size) of the glyph atlas.
    fn upload_glyph_atlas(
        &mut self,
        atlas: TextureHandle,
        image: &RgbaImage,
    ) -> Result<(), BackendError>;

    /// Overwrite a rectangle of a state texture. `texels` are in row-major
    /// order and must contain exactly `region.texel_count()` records.
    fn write_region(
        &mut self,
        texture: TextureHandle,
        region: TexelRegion,
        texels: &[Particle],
    ) -> Result<(), BackendError>;

    /// Provide the per-vertex data locations used by the render program.
    fn upload_data_locations(
        &mut self,
        locations: &[DataLocation],
    ) -> Result<(), BackendError>;

    /// Create one of the simulation programs.
    fn create_program(
        &mut self,
        kind: ProgramKind,
    ) -> Result<ProgramHandle, BackendError>;

    /// Run a full-texture offscreen pass.
    fn run_texture_pass(
        &mut self,
        pass: &TexturePass,
    ) -> Result<(), BackendError>;

    /// Clear the surface and draw the particles into it.
    fn draw_particles(
        &mut self,
        draw: &ParticleDraw,
    ) -> Result<(), BackendError>;

    /// Draw a state texture into a viewport of the surface, on top of
    /// whatever was drawn so far.
    fn draw_overlay(&mut self, draw: &OverlayDraw)
        -> Result<(), BackendError>;

    /// Finish the frame.
    fn present(&mut self) -> Result<(), BackendError>;

    /// Read the most recently presented surface contents.
    fn read_surface(&mut self) -> Result<RgbaImage, BackendError>;
}
