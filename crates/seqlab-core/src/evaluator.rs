//! Test-mode drive: activation without learning, scoring each step's
//! prediction against the input that actually follows.
//!
//! Per timestep the order is fixed: stage the new input, compare the stale
//! prediction from the previous step against it, activate, commit, then read
//! the fresh prediction. Reordering these changes what "next-step prediction"
//! measures.

use crate::config::{HarnessConfig, Layout};
use crate::dataset::{RawSequence, to_timestep};
use crate::encoder::FeatureVector;
use crate::engine::{Engine, feed};
use crate::error::{HarnessError, Result};

/// Binarize a value against the match threshold. The boundary itself is off.
pub fn is_on(value: f32, threshold: f32) -> bool {
    value > threshold
}

/// Running mismatch tally across an evaluation run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ErrorAccumulator {
    pub errors: u64,
    pub total: u64,
}

impl ErrorAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare a prediction against the observed input, index by index.
    pub fn record(&mut self, prediction: &[f32], actual: &[f32], threshold: f32) {
        for (&p, &a) in prediction.iter().zip(actual) {
            if is_on(p, threshold) != is_on(a, threshold) {
                self.errors += 1;
            }
            self.total += 1;
        }
    }

    /// Error percentage, or `None` when nothing was compared.
    pub fn error_percent(&self) -> Option<f64> {
        (self.total > 0).then(|| self.errors as f64 / self.total as f64 * 100.0)
    }
}

/// Drives an engine through sequences without learning and scores it.
pub struct PredictiveEvaluator<'a> {
    config: &'a HarnessConfig,
    layout: Layout,
    split: &'a str,
    input: FeatureVector,
    prediction: Option<FeatureVector>,
}

impl<'a> PredictiveEvaluator<'a> {
    pub fn new(config: &'a HarnessConfig, layout: Layout, split: &'a str) -> Self {
        Self {
            config,
            layout,
            split,
            input: FeatureVector::zeros(config.feature_width),
            prediction: None,
        }
    }

    /// Score one sequence into `acc`, then clear engine memory and drop the
    /// retained prediction so nothing crosses the sequence boundary.
    pub fn evaluate_sequence<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        sequence: &RawSequence,
        index: usize,
        acc: &mut ErrorAccumulator,
    ) -> Result<()> {
        for (t, raw) in sequence.iter().enumerate() {
            self.input
                .fill_from(&to_timestep(raw, self.layout, self.config))
                .map_err(|e| HarnessError::dataset(self.split, index, t, e))?;

            feed(engine, self.input.as_slice())?;

            if let Some(prev) = &self.prediction {
                acc.record(
                    prev.as_slice(),
                    self.input.as_slice(),
                    self.config.match_threshold,
                );
            }

            engine.activate()?;
            engine.step_end()?;

            let predicted = self
                .prediction
                .get_or_insert_with(|| FeatureVector::zeros(self.config.feature_width));
            for (k, slot) in predicted.as_mut_slice().iter_mut().enumerate() {
                *slot = engine.prediction(k)?;
            }
        }

        engine.clear_memory()?;
        self.prediction = None;
        Ok(())
    }
}
