//! The predictive engine as seen by the harness.
//!
//! The harness never looks inside an engine. It stages inputs, asks for one
//! activation, optionally one learning update, commits the timestep and reads
//! the prediction back. Every call either succeeds or fails for good.

use rand::Rng;

use crate::config::{ComputeKind, EngineDesc};
use crate::error::Result;

/// A live, stateful engine: learned weights plus recurrent memory.
pub trait Engine {
    /// Number of input slots (`input_width * input_height`).
    fn input_len(&self) -> usize;

    /// Stage one scalar of the next input.
    fn set_input(&mut self, index: usize, value: f32) -> Result<()>;

    /// One forward pass over the staged input.
    fn activate(&mut self) -> Result<()>;

    /// One weight update from the most recent activation.
    fn learn(&mut self) -> Result<()>;

    /// Finalize the timestep and advance temporal state.
    fn step_end(&mut self) -> Result<()>;

    /// One scalar of the predicted next input, in `[0, 1]`.
    fn prediction(&self, index: usize) -> Result<f32>;

    /// Reset temporal state to neutral, keeping learned weights.
    fn clear_memory(&mut self) -> Result<()>;
}

/// A compute backend able to produce engines.
///
/// Setup runs in three fallible stages so a missing device or a broken
/// program stops the run before any sequence is touched.
pub trait EngineBackend {
    type Session;
    type Program;
    type Engine: Engine;

    fn initialize(&self, kind: ComputeKind) -> Result<Self::Session>;

    fn load_program(&self, session: &Self::Session, source: &str) -> Result<Self::Program>;

    fn create_random(
        &self,
        session: &Self::Session,
        program: &Self::Program,
        desc: &EngineDesc,
        rng: &mut impl Rng,
    ) -> Result<Self::Engine>;
}

/// Initialize, load the program and build a randomly initialized engine.
pub fn bootstrap<B: EngineBackend>(
    backend: &B,
    kind: ComputeKind,
    program: &str,
    desc: &EngineDesc,
    rng: &mut impl Rng,
) -> Result<B::Engine> {
    let session = backend.initialize(kind)?;
    let program = backend.load_program(&session, program)?;
    backend.create_random(&session, &program, desc, rng)
}

/// Stage a feature vector into the engine, zeroing any input slots past its
/// end (the input grid may be larger than the feature width).
pub(crate) fn feed<E: Engine + ?Sized>(engine: &mut E, values: &[f32]) -> Result<()> {
    for (i, &v) in values.iter().enumerate() {
        engine.set_input(i, v)?;
    }
    for i in values.len()..engine.input_len() {
        engine.set_input(i, 0.0)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayerDesc;
    use crate::error::HarnessError;
    use crate::testing::{Call, RecordingEngine};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    struct FlakyBackend {
        program_ok: bool,
    }

    impl EngineBackend for FlakyBackend {
        type Session = ();
        type Program = ();
        type Engine = RecordingEngine;

        fn initialize(&self, kind: ComputeKind) -> Result<()> {
            match kind {
                ComputeKind::Cpu => Ok(()),
                ComputeKind::Gpu => Err(HarnessError::BackendUnavailable("no device".into())),
            }
        }

        fn load_program(&self, _: &(), source: &str) -> Result<()> {
            if self.program_ok {
                Ok(())
            } else {
                Err(HarnessError::ProgramLoad(source.to_string()))
            }
        }

        fn create_random(
            &self,
            _: &(),
            _: &(),
            desc: &EngineDesc,
            _: &mut impl Rng,
        ) -> Result<RecordingEngine> {
            Ok(RecordingEngine::new(desc.input_len()))
        }
    }

    fn desc() -> EngineDesc {
        EngineDesc::square_for(4, vec![LayerDesc::new(2, 2)])
    }

    #[test]
    fn test_bootstrap_unavailable_backend_is_fatal() {
        let mut rng = SmallRng::seed_from_u64(1);
        let backend = FlakyBackend { program_ok: true };
        let err = bootstrap(&backend, ComputeKind::Gpu, "p", &desc(), &mut rng).unwrap_err();
        assert!(matches!(err, HarnessError::BackendUnavailable(_)));
    }

    #[test]
    fn test_bootstrap_program_failure_is_fatal() {
        let mut rng = SmallRng::seed_from_u64(1);
        let backend = FlakyBackend { program_ok: false };
        let err =
            bootstrap(&backend, ComputeKind::Cpu, "broken.cl", &desc(), &mut rng).unwrap_err();
        assert!(matches!(err, HarnessError::ProgramLoad(ref s) if s == "broken.cl"));
    }

    #[test]
    fn test_bootstrap_success() {
        let mut rng = SmallRng::seed_from_u64(1);
        let backend = FlakyBackend { program_ok: true };
        let engine = bootstrap(&backend, ComputeKind::Cpu, "p", &desc(), &mut rng).unwrap();
        assert_eq!(engine.input_len(), 4);
    }

    #[test]
    fn test_feed_zeroes_padding() {
        let mut engine = RecordingEngine::new(4);
        feed(&mut engine, &[1.0, 0.0]).unwrap();
        assert_eq!(engine.staged(), &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(engine.calls().iter().filter(|c| matches!(c, Call::SetInput(..))).count(), 4);
    }
}
