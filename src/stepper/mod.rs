use {
    crate::backend::{
        BackendError, GraphicsBackend, PassUniforms, ProgramHandle,
        TextureHandle, TexturePass,
    },
    serde::Deserialize,
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum StepError {
    #[error(
        "Texture {:?} was about to be sampled and rendered into in one pass",
        .0
    )]
    Aliased(TextureHandle),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// How the pair of state textures is advanced each tick.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferStrategy {
    /// Physics renders input into output, then a copy pass brings output
    /// back into input. The input texture never changes identity.
    #[default]
    CopyBack,

    /// Physics renders the current texture into the next one, then the two
    /// swap roles. No copy pass is needed.
    SwapRoles,
}

/// Drives one simulation tick over a pair of state textures.
///
/// In both strategies [SimulationStepper::input] is where emission writes
/// and [SimulationStepper::latest] holds the most recently simulated state.
#[derive(Debug)]
pub struct SimulationStepper {
    strategy: BufferStrategy,
    textures: [TextureHandle; 2],
    current: usize,
    physics: ProgramHandle,
    copy: ProgramHandle,
}

impl SimulationStepper {
    /// # Params
    ///
    /// * `textures` - two distinct state textures. The first starts out as
    ///   the input.
    /// * `physics` - the program which advances each texel
    /// * `copy` - the identity program, only used by
    ///   [BufferStrategy::CopyBack]
    pub fn new(
        strategy: BufferStrategy,
        textures: [TextureHandle; 2],
        physics: ProgramHandle,
        copy: ProgramHandle,
    ) -> Result<Self, StepError> {
        if textures[0] == textures[1] {
            return Err(StepError::Aliased(textures[0]));
        }
        Ok(Self {
            strategy,
            textures,
            current: 0,
            physics,
            copy,
        })
    }

    pub fn strategy(&self) -> BufferStrategy {
        self.strategy
    }

    /// The texture emission writes into.
    pub fn input(&self) -> TextureHandle {
        self.textures[self.current]
    }

    /// The texture holding the most recently simulated state.
    pub fn latest(&self) -> TextureHandle {
        match self.strategy {
            BufferStrategy::CopyBack => self.textures[1],
            BufferStrategy::SwapRoles => self.textures[self.current],
        }
    }

    fn output(&self) -> TextureHandle {
        self.textures[1 - self.current]
    }

    /// Run one tick.
    pub fn step<B>(
        &mut self,
        backend: &mut B,
        uniforms: &PassUniforms,
    ) -> Result<(), StepError>
    where
        B: GraphicsBackend + ?Sized,
    {
        let physics = TexturePass {
            program: self.physics,
            source: self.input(),
            target: self.output(),
            uniforms: *uniforms,
        };
        run_pass(backend, &physics)?;

        match self.strategy {
            BufferStrategy::CopyBack => {
                let copy = TexturePass {
                    program: self.copy,
                    source: physics.target,
                    target: physics.source,
                    uniforms: *uniforms,
                };
                run_pass(backend, &copy)?;
            }
            BufferStrategy::SwapRoles => {
                self.current = 1 - self.current;
            }
        }
        Ok(())
    }
}

fn run_pass<B>(backend: &mut B, pass: &TexturePass) -> Result<(), StepError>
where
    B: GraphicsBackend + ?Sized,
{
    if pass.source == pass.target {
        return Err(StepError::Aliased(pass.source));
    }
    backend.run_texture_pass(pass)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::backend::{
            software::{PassTarget, SoftwareBackend},
            ProgramKind, SurfaceDescriptor,
        },
        pretty_assertions::assert_eq,
    };

    fn setup(
        strategy: BufferStrategy,
    ) -> (SoftwareBackend, SimulationStepper, [TextureHandle; 2]) {
        let mut backend = SoftwareBackend::new(SurfaceDescriptor {
            width: 16,
            height: 16,
            scale: 1.0,
        });
        let textures = [
            backend.create_state_texture(2).unwrap(),
            backend.create_state_texture(2).unwrap(),
        ];
        let physics = backend.create_program(ProgramKind::Physics).unwrap();
        let copy = backend.create_program(ProgramKind::Copy).unwrap();
        let stepper =
            SimulationStepper::new(strategy, textures, physics, copy).unwrap();
        (backend, stepper, textures)
    }

    #[test]
    fn copy_back_runs_physics_then_copy() {
        let (mut backend, mut stepper, [a, b]) =
            setup(BufferStrategy::CopyBack);
        stepper.step(&mut backend, &PassUniforms::default()).unwrap();

        let passes: Vec<(ProgramKind, Vec<TextureHandle>, PassTarget)> = backend
            .pass_log()
            .iter()
            .map(|record| {
                (record.program, record.sampled.clone(), record.target)
            })
            .collect();
        assert_eq!(
            passes,
            vec![
                (ProgramKind::Physics, vec![a], PassTarget::Texture(b)),
                (ProgramKind::Copy, vec![b], PassTarget::Texture(a)),
            ]
        );
        assert_eq!(stepper.input(), a);
        assert_eq!(stepper.latest(), b);
    }

    #[test]
    fn swap_roles_alternates_the_textures() {
        let (mut backend, mut stepper, [a, b]) =
            setup(BufferStrategy::SwapRoles);
        stepper.step(&mut backend, &PassUniforms::default()).unwrap();
        assert_eq!(stepper.input(), b);
        assert_eq!(stepper.latest(), b);
        stepper.step(&mut backend, &PassUniforms::default()).unwrap();
        assert_eq!(stepper.input(), a);

        let targets: Vec<PassTarget> =
            backend.pass_log().iter().map(|record| record.target).collect();
        assert_eq!(
            targets,
            vec![PassTarget::Texture(b), PassTarget::Texture(a)]
        );
    }

    #[test]
    fn a_single_texture_cannot_back_both_roles() {
        let texture = TextureHandle(0);
        let result = SimulationStepper::new(
            BufferStrategy::CopyBack,
            [texture, texture],
            ProgramHandle(0),
            ProgramHandle(1),
        );
        assert!(matches!(result, Err(StepError::Aliased(t)) if t == texture));
    }
}
