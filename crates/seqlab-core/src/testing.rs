//! Deterministic engine double for exercising the harness without a device.

use std::collections::VecDeque;

use crate::engine::Engine;
use crate::error::{HarnessError, Result};

/// One recorded engine call.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    SetInput(usize, f32),
    Activate,
    Learn,
    StepEnd,
    ClearMemory,
}

/// How the double produces its prediction on `activate`.
#[derive(Clone, Debug)]
pub enum PredictionRule {
    /// Same vector every step.
    Constant(Vec<f32>),
    /// One vector per activation, in order; the last one repeats.
    Script(VecDeque<Vec<f32>>),
    /// Elementwise max of the staged input and everything committed since the
    /// last memory clear.
    Accumulate,
}

/// Records every call and predicts according to a [`PredictionRule`].
#[derive(Clone, Debug)]
pub struct RecordingEngine {
    staged: Vec<f32>,
    memory: Vec<f32>,
    prediction: Vec<f32>,
    rule: PredictionRule,
    calls: Vec<Call>,
    fail_on_activation: Option<usize>,
    activations: usize,
}

impl RecordingEngine {
    pub fn new(input_len: usize) -> Self {
        Self {
            staged: vec![0.0; input_len],
            memory: vec![0.0; input_len],
            prediction: vec![0.0; input_len],
            rule: PredictionRule::Constant(vec![0.0; input_len]),
            calls: Vec::new(),
            fail_on_activation: None,
            activations: 0,
        }
    }

    pub fn with_rule(mut self, rule: PredictionRule) -> Self {
        self.rule = rule;
        self
    }

    /// Make the `n`th activation (zero-based) report failure.
    pub fn failing_at_activation(mut self, n: usize) -> Self {
        self.fail_on_activation = Some(n);
        self
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Recorded calls without the per-slot `SetInput` noise.
    pub fn protocol(&self) -> Vec<Call> {
        self.calls
            .iter()
            .filter(|c| !matches!(c, Call::SetInput(..)))
            .cloned()
            .collect()
    }

    pub fn staged(&self) -> &[f32] {
        &self.staged
    }

    fn fit(&self, v: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0; self.staged.len()];
        for (slot, &x) in out.iter_mut().zip(v) {
            *slot = x;
        }
        out
    }
}

impl Engine for RecordingEngine {
    fn input_len(&self) -> usize {
        self.staged.len()
    }

    fn set_input(&mut self, index: usize, value: f32) -> Result<()> {
        let len = self.staged.len();
        let slot = self
            .staged
            .get_mut(index)
            .ok_or_else(|| HarnessError::Engine(format!("input index {index} >= {len}")))?;
        *slot = value;
        self.calls.push(Call::SetInput(index, value));
        Ok(())
    }

    fn activate(&mut self) -> Result<()> {
        if self.fail_on_activation == Some(self.activations) {
            return Err(HarnessError::Engine(format!(
                "activation {} failed",
                self.activations
            )));
        }
        self.activations += 1;
        let next = match &mut self.rule {
            PredictionRule::Constant(v) => v.clone(),
            PredictionRule::Script(queue) if queue.len() > 1 => {
                queue.pop_front().unwrap_or_default()
            }
            PredictionRule::Script(queue) => queue.front().cloned().unwrap_or_default(),
            PredictionRule::Accumulate => self
                .staged
                .iter()
                .zip(&self.memory)
                .map(|(&s, &m)| s.max(m))
                .collect(),
        };
        self.prediction = self.fit(&next);
        self.calls.push(Call::Activate);
        Ok(())
    }

    fn learn(&mut self) -> Result<()> {
        self.calls.push(Call::Learn);
        Ok(())
    }

    fn step_end(&mut self) -> Result<()> {
        self.memory.clone_from(&self.prediction);
        self.calls.push(Call::StepEnd);
        Ok(())
    }

    fn prediction(&self, index: usize) -> Result<f32> {
        self.prediction.get(index).copied().ok_or_else(|| {
            HarnessError::Engine(format!(
                "prediction index {index} >= {}",
                self.prediction.len()
            ))
        })
    }

    fn clear_memory(&mut self) -> Result<()> {
        self.memory.fill(0.0);
        self.prediction.fill(0.0);
        self.calls.push(Call::ClearMemory);
        Ok(())
    }
}
