//! Training-mode drive: encode, feed, activate, learn, commit; clear at the
//! end of every sequence.

use crate::config::{HarnessConfig, Layout};
use crate::dataset::{RawSequence, to_timestep};
use crate::encoder::FeatureVector;
use crate::engine::{Engine, feed};
use crate::error::{HarnessError, Result};

/// Drives an engine through whole sequences with learning enabled.
pub struct SequenceDriver<'a> {
    config: &'a HarnessConfig,
    layout: Layout,
    split: &'a str,
    input: FeatureVector,
}

impl<'a> SequenceDriver<'a> {
    /// `split` only labels integrity errors.
    pub fn new(config: &'a HarnessConfig, layout: Layout, split: &'a str) -> Self {
        Self {
            config,
            layout,
            split,
            input: FeatureVector::zeros(config.feature_width),
        }
    }

    /// Run one sequence through the engine and clear its memory afterwards.
    /// Returns the number of timesteps trained.
    pub fn train_sequence<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        sequence: &RawSequence,
        index: usize,
    ) -> Result<usize> {
        for (t, raw) in sequence.iter().enumerate() {
            self.input
                .fill_from(&to_timestep(raw, self.layout, self.config))
                .map_err(|e| HarnessError::dataset(self.split, index, t, e))?;

            feed(engine, self.input.as_slice())?;
            engine.activate()?;
            engine.learn()?;
            engine.step_end()?;
        }

        engine.clear_memory()?;
        Ok(sequence.len())
    }
}
