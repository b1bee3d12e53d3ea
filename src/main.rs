use {
    anyhow::{Context, Result},
    clap::{Parser, ValueEnum},
    glyph_spiral::{
        atlas::GlyphAtlasLoader,
        backend::{
            software::SoftwareBackend, vulkan::VulkanBackend, GraphicsBackend,
        },
        config::Config,
        frame::FrameDriver,
        logging,
        simulation::SimulationContext,
        spiral::glyph_indices,
    },
    indoc::formatdoc,
    std::path::PathBuf,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// Headless Vulkan rendering into an offscreen image
    Vulkan,

    /// Everything on the CPU
    Software,
}

/// Render glyph particles on a rotating spiral.
#[derive(Debug, Parser)]
#[command(name = "glyph-spiral")]
#[command(version, about, long_about = None)]
struct Cli {
    /// A TOML config file. Defaults are used for anything it leaves out.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = BackendKind::Vulkan)]
    backend: BackendKind,

    /// How many frames to run before exiting
    #[arg(short, long, default_value_t = 120)]
    frames: u64,

    /// Override the spiral text
    #[arg(short, long)]
    text: Option<String>,

    /// Save the last presented frame as a PNG
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Reset the spiral before this frame
    #[arg(long)]
    reset_at: Option<u64>,

    /// The text used by the reset. Defaults to the spiral text.
    #[arg(long, requires = "reset_at")]
    reset_text: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| {
            format!("Unable to load the config at {:?}", path)
        })?,
        None => Config::default(),
    };
    if let Some(text) = &cli.text {
        config.spiral.text = text.clone();
    }

    let _logger = logging::setup(&config.logging)?;

    match cli.backend {
        BackendKind::Vulkan => {
            let backend = VulkanBackend::new(
                config.surface.descriptor(),
                &config.shaders.directory,
            )
            .context("Unable to create the Vulkan backend")?;
            run(backend, &config, &cli)
        }
        BackendKind::Software => {
            run(SoftwareBackend::new(config.surface.descriptor()), &config, &cli)
        }
    }
}

fn run<B: GraphicsBackend>(backend: B, config: &Config, cli: &Cli) -> Result<()> {
    log::info!(
        "{}",
        formatdoc! {"
            Starting glyph-spiral
              backend: {backend}
              capacity: {capacity}
              strategy: {strategy:?}
              text: {text:?}
              frames: {frames}",
            backend = backend.describe(),
            capacity = config.simulation.capacity,
            strategy = config.simulation.buffer_strategy,
            text = config.spiral.text,
            frames = cli.frames,
        }
    );

    let context = SimulationContext::new(backend, config)
        .context("Unable to initialize the simulation")?;
    let atlas = match &config.atlas.path {
        Some(path) => GlyphAtlasLoader::spawn(path),
        None => {
            log::warn!("No glyph atlas configured, glyphs will render blank");
            GlyphAtlasLoader::none()
        }
    };
    let spawn = config.spawn.build_policy(glyph_indices(&config.spiral.text));
    let mut driver = FrameDriver::new(context, &config.frame, atlas, spawn);

    let reset_text = cli
        .reset_text
        .clone()
        .unwrap_or_else(|| config.spiral.text.clone());
    driver
        .run_until(|driver| {
            if Some(driver.frame_count()) == cli.reset_at {
                log::info!("Resetting the spiral with {:?}", reset_text);
                driver.context_mut().reset_spiral(
                    &reset_text,
                    config.spiral.delta_count,
                    config.spiral.delta_phase,
                )?;
            }
            Ok(driver.frame_count() >= cli.frames)
        })
        .context("A frame failed")?;

    if let Some(output) = &cli.output {
        let image = driver
            .context_mut()
            .read_surface()
            .context("Unable to read back the surface")?;
        image
            .save(output)
            .with_context(|| format!("Unable to save {:?}", output))?;
        log::info!("Saved the final frame to {:?}", output);
    }

    Ok(())
}
