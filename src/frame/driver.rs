use {
    super::SpawnPolicy,
    crate::{
        atlas::GlyphAtlasLoader,
        backend::GraphicsBackend,
        config::FrameConfig,
        simulation::{SimulationContext, SimulationError},
        timing::{FrameClock, FrameRateLimit, FrameTime},
    },
};

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Runs the simulation one display frame at a time.
///
/// Every frame follows the same sequence:
///
/// ```mermaid
/// flowchart LR
///     clock[tick the clock] --> atlas[poll the glyph atlas]
///     atlas --> spawn[run the spawn policy]
///     spawn --> step[physics + copy-back]
///     step --> draw[draw particles]
///     draw --> overlay[debug overlay]
///     overlay --> present
/// ```
///
/// Any failing pass ends the run. Dropping the driver tears everything
/// down.
pub struct FrameDriver<B: GraphicsBackend> {
    context: SimulationContext<B>,
    clock: FrameClock,
    limit: FrameRateLimit,
    atlas: GlyphAtlasLoader,
    spawn: Box<dyn SpawnPolicy>,
    frame_count: u64,
}

impl<B: GraphicsBackend> FrameDriver<B> {
    pub fn new(
        context: SimulationContext<B>,
        frame: &FrameConfig,
        atlas: GlyphAtlasLoader,
        spawn: Box<dyn SpawnPolicy>,
    ) -> Self {
        Self {
            context,
            clock: FrameClock::new(),
            limit: FrameRateLimit::new(frame.target_fps, frame.frames_to_track),
            atlas,
            spawn,
            frame_count: 0,
        }
    }

    pub fn context(&self) -> &SimulationContext<B> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut SimulationContext<B> {
        &mut self.context
    }

    /// The number of frames completed so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Tear down the driver and keep the simulation.
    pub fn into_context(self) -> SimulationContext<B> {
        self.context
    }

    /// Run one frame at the current time.
    pub fn run_frame(&mut self) -> Result<FrameTime, SimulationError> {
        let time = self.clock.tick();
        self.run_frame_at(time)?;
        Ok(time)
    }

    /// Run one frame with an explicit time.
    pub fn run_frame_at(
        &mut self,
        time: FrameTime,
    ) -> Result<(), SimulationError> {
        self.poll_atlas()?;

        if let Some(request) = self.spawn.next_emission(time) {
            self.context.emit(&request)?;
        }

        self.context.step(time)?;
        self.context.draw(time)?;
        self.context.present()?;

        self.frame_count += 1;
        Ok(())
    }

    /// Run frames until `stop` returns true.
    ///
    /// `stop` is checked before every frame, so it can also be used to
    /// adjust the simulation between frames. Frames are limited to the
    /// configured target frame rate.
    pub fn run_until<F>(&mut self, mut stop: F) -> Result<(), SimulationError>
    where
        F: FnMut(&mut Self) -> Result<bool, SimulationError>,
    {
        while !stop(self)? {
            self.limit.start_frame();
            self.run_frame()?;
            self.limit.sleep_to_limit();
        }
        log::info!(
            "Stopped after {} frames, average frame time {:?}",
            self.frame_count,
            self.limit.avg_frame_time()
        );
        Ok(())
    }

    fn poll_atlas(&mut self) -> Result<(), SimulationError> {
        match self.atlas.poll() {
            Some(Ok(image)) => self.context.upload_atlas(&image),
            Some(Err(err)) => {
                log::warn!("The glyph atlas stays blank: {}", err);
                Ok(())
            }
            None => Ok(()),
        }
    }
}
