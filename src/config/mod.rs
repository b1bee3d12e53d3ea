//! Runtime configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) gives the
//! stock spiral.

mod sections;

use {
    crate::grid::ParticleGrid,
    serde::Deserialize,
    std::path::{Path, PathBuf},
    thiserror::Error,
};

pub use self::sections::{
    AtlasConfig, FrameConfig, LoggingConfig, ShaderConfig, SimulationConfig,
    SpawnConfig, SpiralConfig, SurfaceConfig,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read the config file at {:?}", .path)]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {}", .0)]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub simulation: SimulationConfig,
    pub spiral: SpiralConfig,
    pub surface: SurfaceConfig,
    pub atlas: AtlasConfig,
    pub shaders: ShaderConfig,
    pub frame: FrameConfig,
    pub spawn: SpawnConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Read, parse, and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_owned(),
                source,
            })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML config text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the simulation cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ParticleGrid::with_capacity(self.simulation.capacity)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;

        let surface = &self.surface;
        if surface.width == 0 || surface.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "the surface must not be empty, got {}x{}",
                surface.width, surface.height
            )));
        }
        if !(surface.scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "the surface scale must be positive, got {}",
                surface.scale
            )));
        }
        if self.atlas.columns == 0 || self.atlas.rows == 0 {
            return Err(ConfigError::Invalid(format!(
                "the glyph atlas grid must not be empty, got {}x{}",
                self.atlas.columns, self.atlas.rows
            )));
        }
        if self.frame.target_fps == 0 {
            return Err(ConfigError::Invalid(
                "the target fps must be greater than zero".to_owned(),
            ));
        }
        let layout = &self.spiral.layout;
        if layout.first_shell > layout.last_shell {
            return Err(ConfigError::Invalid(format!(
                "the first shell {} comes after the last shell {}",
                layout.first_shell, layout.last_shell
            )));
        }
        if let SpawnConfig::TimedBurst { interval_ms, .. } = self.spawn {
            if !(interval_ms > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "the spawn interval must be positive, got {}",
                    interval_ms
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use {
        super::*, crate::stepper::BufferStrategy, indoc::indoc,
        pretty_assertions::assert_eq,
    };

    #[test]
    fn an_empty_file_gives_the_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.simulation.capacity, 65536);
        assert_eq!(config.spiral.text, "JEZE   ");
        assert_eq!(config.surface.width, 1366);
        assert_eq!(config.spawn, SpawnConfig::Idle);
    }

    #[test]
    fn sections_override_individual_fields() {
        let config = Config::from_toml_str(indoc! {r#"
            [simulation]
            capacity = 1024
            buffer_strategy = "swap_roles"

            [spiral]
            text = "AB"

            [spiral.layout]
            first_shell = 2
            last_shell = 5

            [spawn]
            policy = "timed_burst"
            count = 10
            interval_ms = 50.0
            until_ms = 3000.0
            radius = 0.3
            point_size = 4.0
        "#})
        .unwrap();

        assert_eq!(config.simulation.capacity, 1024);
        assert_eq!(
            config.simulation.buffer_strategy,
            BufferStrategy::SwapRoles
        );
        assert!(config.simulation.debug_overlay);
        assert_eq!(config.spiral.text, "AB");
        assert_eq!(config.spiral.delta_phase, 0.4);
        assert_eq!(config.spiral.layout.first_shell, 2);
        assert_eq!(config.spiral.layout.base_count, 100.0);
        assert_eq!(
            config.spawn,
            SpawnConfig::TimedBurst {
                count: 10,
                interval_ms: 50.0,
                until_ms: 3000.0,
                radius: 0.3,
                point_size: 4.0,
                phase_rate: 0.0,
            }
        );
    }

    #[test]
    fn capacities_must_be_perfect_squares() {
        let result = Config::from_toml_str(indoc! {"
            [simulation]
            capacity = 1000
        "});
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn empty_surfaces_are_rejected() {
        let mut config = Config::default();
        config.surface.height = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_fps_is_rejected() {
        let mut config = Config::default();
        config.frame.target_fps = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unknown_strategies_fail_to_parse() {
        let result = Config::from_toml_str(indoc! {r#"
            [simulation]
            buffer_strategy = "triple"
        "#});
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn files_are_loaded_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spiral.toml");
        std::fs::write(&path, "[surface]\nwidth = 640\nheight = 480\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.surface.width, 640);

        let missing = Config::load(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
