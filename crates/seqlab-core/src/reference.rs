//! CPU reference engine.
//!
//! A stack of randomly wired recurrent layers (fixed after creation) feeding
//! an online-learned logistic readout that predicts the next input. It exists
//! so the harness can run end to end without a compute device; it makes no
//! attempt to be a good sequence model.

use rand::Rng;

use crate::config::{ComputeKind, EngineDesc};
use crate::engine::{Engine, EngineBackend};
use crate::error::{HarnessError, Result};

/// Hidden-unit nonlinearity selected by the loaded program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    Tanh,
    Sigmoid,
}

impl Activation {
    fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => sigmoid(x),
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

pub const PROGRAMS: &[&str] = &["reference", "reference-sigmoid"];

/// Bound CPU "device".
#[derive(Clone, Copy, Debug)]
pub struct CpuDevice;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuProgram {
    pub activation: Activation,
}

/// Backend producing [`CpuEngine`]s. Only [`ComputeKind::Cpu`] binds.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuBackend;

impl EngineBackend for CpuBackend {
    type Session = CpuDevice;
    type Program = CpuProgram;
    type Engine = CpuEngine;

    fn initialize(&self, kind: ComputeKind) -> Result<CpuDevice> {
        match kind {
            ComputeKind::Cpu => Ok(CpuDevice),
            ComputeKind::Gpu => Err(HarnessError::BackendUnavailable(
                "no GPU device support in this build (set engine.backend = \"cpu\")".to_string(),
            )),
        }
    }

    fn load_program(&self, _device: &CpuDevice, source: &str) -> Result<CpuProgram> {
        let activation = match source {
            "reference" => Activation::Tanh,
            "reference-sigmoid" => Activation::Sigmoid,
            other => {
                return Err(HarnessError::ProgramLoad(format!(
                    "unknown program '{other}' (available: {})",
                    PROGRAMS.join(", ")
                )));
            }
        };
        Ok(CpuProgram { activation })
    }

    fn create_random(
        &self,
        _device: &CpuDevice,
        program: &CpuProgram,
        desc: &EngineDesc,
        rng: &mut impl Rng,
    ) -> Result<CpuEngine> {
        desc.validate(0)?;
        Ok(CpuEngine::new(program.activation, desc, rng))
    }
}

/// Uniform weights in `[lo, hi)`; a degenerate range yields `lo` everywhere.
fn random_weights(n: usize, lo: f32, hi: f32, rng: &mut impl Rng) -> Vec<f32> {
    (0..n)
        .map(|_| if lo < hi { rng.random_range(lo..hi) } else { lo })
        .collect()
}

struct Layer {
    units: usize,
    fan_in: usize,
    forward: Vec<f32>,
    recurrent: Vec<f32>,
    state: Vec<f32>,
    prev_state: Vec<f32>,
}

impl Layer {
    fn random(units: usize, fan_in: usize, lo: f32, hi: f32, rng: &mut impl Rng) -> Self {
        Self {
            units,
            fan_in,
            forward: random_weights(units * fan_in, lo, hi, rng),
            recurrent: random_weights(units * units, lo, hi, rng),
            state: vec![0.0; units],
            prev_state: vec![0.0; units],
        }
    }

    fn activate(&mut self, below: &[f32], activation: Activation) {
        for u in 0..self.units {
            let fw = &self.forward[u * self.fan_in..(u + 1) * self.fan_in];
            let rw = &self.recurrent[u * self.units..(u + 1) * self.units];
            let drive: f32 = fw.iter().zip(below).map(|(w, x)| w * x).sum::<f32>()
                + rw.iter().zip(&self.prev_state).map(|(w, s)| w * s).sum::<f32>();
            self.state[u] = activation.apply(drive);
        }
    }

    fn clear(&mut self) {
        self.state.fill(0.0);
        self.prev_state.fill(0.0);
    }
}

pub struct CpuEngine {
    activation: Activation,
    input: Vec<f32>,
    layers: Vec<Layer>,
    features: Vec<f32>,
    /// Row-major `input_len x features.len()`.
    readout: Vec<f32>,
    readout_bias: Vec<f32>,
    readout_rate: f32,
    prediction: Vec<f32>,
    committed_features: Vec<f32>,
    committed_prediction: Vec<f32>,
    has_committed: bool,
}

impl CpuEngine {
    fn new(activation: Activation, desc: &EngineDesc, rng: &mut impl Rng) -> Self {
        let input_len = desc.input_len();
        let (lo, hi) = (desc.min_init_weight, desc.max_init_weight);

        let mut layers = Vec::with_capacity(desc.layers.len());
        let mut fan_in = input_len;
        for l in &desc.layers {
            layers.push(Layer::random(l.units(), fan_in, lo, hi, &mut *rng));
            fan_in = l.units();
        }

        let feature_len: usize = layers.iter().map(|l| l.units).sum();

        Self {
            activation,
            input: vec![0.0; input_len],
            readout: random_weights(input_len * feature_len, lo, hi, rng),
            readout_bias: random_weights(input_len, lo, hi, rng),
            layers,
            features: vec![0.0; feature_len],
            readout_rate: desc.readout_rate,
            prediction: vec![0.0; input_len],
            committed_features: vec![0.0; feature_len],
            committed_prediction: vec![0.0; input_len],
            has_committed: false,
        }
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn feature_len(&self) -> usize {
        self.features.len()
    }
}

impl Engine for CpuEngine {
    fn input_len(&self) -> usize {
        self.input.len()
    }

    fn set_input(&mut self, index: usize, value: f32) -> Result<()> {
        let len = self.input.len();
        match self.input.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(HarnessError::Engine(format!(
                "input index {index} out of range for {len} inputs"
            ))),
        }
    }

    fn activate(&mut self) -> Result<()> {
        let mut below = self.input.clone();
        let mut offset = 0;
        for layer in &mut self.layers {
            layer.activate(&below, self.activation);
            self.features[offset..offset + layer.units].copy_from_slice(&layer.state);
            offset += layer.units;
            below.clone_from(&layer.state);
        }

        let f = self.features.len();
        for (k, p) in self.prediction.iter_mut().enumerate() {
            let row = &self.readout[k * f..(k + 1) * f];
            let logit = self.readout_bias[k]
                + row.iter().zip(&self.features).map(|(w, x)| w * x).sum::<f32>();
            *p = sigmoid(logit);
        }
        Ok(())
    }

    /// Delta-rule update of the readout: the prediction committed last step
    /// is pulled toward the input just observed.
    fn learn(&mut self) -> Result<()> {
        if !self.has_committed {
            return Ok(());
        }
        let f = self.committed_features.len();
        for k in 0..self.input.len() {
            let err = self.input[k] - self.committed_prediction[k];
            let step = self.readout_rate * err;
            let row = &mut self.readout[k * f..(k + 1) * f];
            for (w, x) in row.iter_mut().zip(&self.committed_features) {
                *w += step * x;
            }
            self.readout_bias[k] += step;
        }
        Ok(())
    }

    fn step_end(&mut self) -> Result<()> {
        for layer in &mut self.layers {
            layer.prev_state.clone_from(&layer.state);
        }
        self.committed_features.clone_from(&self.features);
        self.committed_prediction.clone_from(&self.prediction);
        self.has_committed = true;
        Ok(())
    }

    fn prediction(&self, index: usize) -> Result<f32> {
        self.prediction.get(index).copied().ok_or_else(|| {
            HarnessError::Engine(format!(
                "prediction index {index} out of range for {} outputs",
                self.prediction.len()
            ))
        })
    }

    fn clear_memory(&mut self) -> Result<()> {
        for layer in &mut self.layers {
            layer.clear();
        }
        self.features.fill(0.0);
        self.prediction.fill(0.0);
        self.committed_features.fill(0.0);
        self.committed_prediction.fill(0.0);
        self.has_committed = false;
        Ok(())
    }
}
