//! Sequence-prediction experiment harness.
//!
//! Encodes symbolic timesteps (note lists or bit vectors) into fixed-width
//! feature vectors, drives a stateful online-learning engine through them one
//! timestep at a time, and scores next-step predictions against what actually
//! comes next.
//!
//! Zero I/O: datasets arrive as parsed values and progress leaves through a
//! [`ProgressObserver`].

pub mod config;
pub mod constants;
pub mod dataset;
pub mod driver;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod reference;
pub mod session;
pub mod synth;
pub mod testing;

pub use config::{
    ComputeKind, EngineDesc, Experiment, ExperimentConfig, HarnessConfig, LayerDesc, Layout,
    SessionPlan,
};
pub use constants::{MATCH_THRESHOLD, MAX_NOTE, MIN_NOTE};
pub use dataset::{Dataset, RawSequence, SplitSummary};
pub use driver::SequenceDriver;
pub use encoder::{FeatureVector, Timestep, encode};
pub use engine::{Engine, EngineBackend, bootstrap};
pub use error::{DatasetFault, EncodeError, HarnessError, Result};
pub use evaluator::{ErrorAccumulator, PredictiveEvaluator, is_on};
pub use reference::{CpuBackend, CpuEngine};
pub use session::{
    EpochSummary, EvaluationReport, ProgressObserver, Session, SessionReport, Silent,
};
pub use synth::{SynthSpec, generate};
