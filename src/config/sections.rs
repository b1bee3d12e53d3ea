use {
    crate::{
        backend::SurfaceDescriptor, spiral::SpiralLayout,
        stepper::BufferStrategy,
    },
    serde::Deserialize,
    std::path::PathBuf,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// The number of particle records. Must be a non-zero perfect square.
    pub capacity: u32,
    pub buffer_strategy: BufferStrategy,

    /// Zero the whole input texture before a reset re-emits the spiral.
    pub clear_on_reset: bool,

    /// Draw the raw state texture into the bottom-left corner.
    pub debug_overlay: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            capacity: 65536,
            buffer_strategy: BufferStrategy::default(),
            clear_on_reset: false,
            debug_overlay: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpiralConfig {
    pub text: String,
    pub delta_count: f32,
    pub delta_phase: f32,
    pub layout: SpiralLayout,
}

impl Default for SpiralConfig {
    fn default() -> Self {
        Self {
            text: "JEZE   ".to_owned(),
            delta_count: 0.0,
            delta_phase: 0.4,
            layout: SpiralLayout::default(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
    pub scale: f32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 1366,
            height: 768,
            scale: 1.0,
        }
    }
}

impl SurfaceConfig {
    pub fn descriptor(&self) -> SurfaceDescriptor {
        SurfaceDescriptor {
            width: self.width,
            height: self.height,
            scale: self.scale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    /// The glyph atlas image. Glyphs render blank without one.
    pub path: Option<PathBuf>,
    pub columns: u32,
    pub rows: u32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            path: None,
            columns: 8,
            rows: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Where compiled `<name>.spv` files are found.
    pub directory: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("shaders"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub target_fps: u32,
    pub frames_to_track: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            frames_to_track: 60,
        }
    }
}

/// Which spawn policy runs every frame.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SpawnConfig {
    /// Nothing is emitted after the initial spiral.
    #[default]
    Idle,

    /// Emit `count` particles every `interval_ms` until `until_ms` has
    /// elapsed. The phase offset turns `phase_rate` radians per
    /// millisecond.
    TimedBurst {
        count: u32,
        interval_ms: f32,
        until_ms: f32,
        radius: f32,
        point_size: f32,
        #[serde(default)]
        phase_rate: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// A flexi_logger spec. `RUST_LOG` takes precedence.
    pub level: String,

    /// Also write logs to files in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            directory: None,
        }
    }
}
