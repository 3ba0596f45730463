//! Harness, engine and session configuration.
//!
//! `ExperimentConfig` is the serde-facing document (one TOML file per
//! experiment). `resolve` validates it and splits it into the explicit
//! structures the encoder, engine bootstrap and orchestrator take.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{
    MATCH_THRESHOLD, MAX_FEATURE_WIDTH, MAX_INIT_WEIGHT, MAX_NOTE, MAX_SEQUENCES, MIN_INIT_WEIGHT,
    MIN_NOTE, READOUT_RATE, TRAIN_SPLIT,
};
use crate::error::{HarnessError, Result};

/// How dataset timesteps are shaped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Each timestep lists absolute note numbers that are on.
    #[default]
    Notes,
    /// Each timestep is a dense 0/1 vector of exactly `feature_width` entries.
    Bits,
}

/// Encoding and scoring parameters shared by the driver and evaluator.
#[derive(Clone, Debug, PartialEq)]
pub struct HarnessConfig {
    pub feature_width: usize,
    /// Subtracted from absolute note numbers before encoding.
    pub note_offset: i64,
    pub match_threshold: f32,
}

impl HarnessConfig {
    pub fn new(feature_width: usize) -> Self {
        Self {
            feature_width,
            note_offset: 0,
            match_threshold: MATCH_THRESHOLD,
        }
    }

    /// Notes in `[min_note, max_note)` map onto features `0..max_note - min_note`.
    pub fn from_note_range(min_note: i64, max_note: i64) -> Result<Self> {
        if max_note <= min_note {
            return Err(HarnessError::InvalidConfig(format!(
                "note range [{min_note}, {max_note}) is empty"
            )));
        }
        let feature_width = max_note
            .checked_sub(min_note)
            .and_then(|span| usize::try_from(span).ok())
            .ok_or_else(|| {
                HarnessError::InvalidConfig(format!(
                    "note range [{min_note}, {max_note}) is too wide"
                ))
            })?;
        Ok(Self {
            feature_width,
            note_offset: min_note,
            match_threshold: MATCH_THRESHOLD,
        })
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.match_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.feature_width == 0 {
            return Err(HarnessError::InvalidConfig(
                "feature width must be positive".to_string(),
            ));
        }
        if self.feature_width > MAX_FEATURE_WIDTH {
            return Err(HarnessError::InvalidConfig(format!(
                "feature width {} exceeds limit {MAX_FEATURE_WIDTH}",
                self.feature_width
            )));
        }
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(HarnessError::InvalidConfig(format!(
                "match threshold {} outside [0, 1]",
                self.match_threshold
            )));
        }
        Ok(())
    }
}

/// One hierarchical layer, outermost first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDesc {
    pub width: usize,
    pub height: usize,
}

impl LayerDesc {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn units(&self) -> usize {
        self.width * self.height
    }
}

/// Shape and initialization of a freshly created engine.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineDesc {
    pub input_width: usize,
    pub input_height: usize,
    pub layers: Vec<LayerDesc>,
    pub min_init_weight: f32,
    pub max_init_weight: f32,
    pub readout_rate: f32,
}

impl EngineDesc {
    /// Smallest square input grid holding `feature_width` values.
    pub fn square_for(feature_width: usize, layers: Vec<LayerDesc>) -> Self {
        let side = (feature_width as f64).sqrt().ceil() as usize;
        Self {
            input_width: side,
            input_height: side,
            layers,
            min_init_weight: MIN_INIT_WEIGHT,
            max_init_weight: MAX_INIT_WEIGHT,
            readout_rate: READOUT_RATE,
        }
    }

    pub fn input_len(&self) -> usize {
        self.input_width * self.input_height
    }

    pub fn validate(&self, feature_width: usize) -> Result<()> {
        if self.layers.is_empty() {
            return Err(HarnessError::InvalidConfig(
                "engine needs at least one layer".to_string(),
            ));
        }
        if let Some(i) = self.layers.iter().position(|l| l.units() == 0) {
            return Err(HarnessError::InvalidConfig(format!("layer {i} has zero units")));
        }
        if feature_width > self.input_len() {
            return Err(HarnessError::InvalidConfig(format!(
                "feature width {feature_width} exceeds engine input {}x{}",
                self.input_width, self.input_height
            )));
        }
        if self.min_init_weight > self.max_init_weight {
            return Err(HarnessError::InvalidConfig(format!(
                "min init weight {} above max init weight {}",
                self.min_init_weight, self.max_init_weight
            )));
        }
        Ok(())
    }
}

/// Which compute device the engine should bind to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeKind {
    #[default]
    Cpu,
    Gpu,
}

impl std::fmt::Display for ComputeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComputeKind::Cpu => write!(f, "cpu"),
            ComputeKind::Gpu => write!(f, "gpu"),
        }
    }
}

/// What the orchestrator runs: how many epochs, over which prefix of which
/// split, and which split (if any) to score afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionPlan {
    pub epochs: usize,
    /// `None` uses every sequence in the split.
    pub max_sequences: Option<usize>,
    pub train_split: String,
    pub eval_split: Option<String>,
}

impl Default for SessionPlan {
    fn default() -> Self {
        Self {
            epochs: 1,
            max_sequences: Some(MAX_SEQUENCES),
            train_split: TRAIN_SPLIT.to_string(),
            eval_split: Some(TRAIN_SPLIT.to_string()),
        }
    }
}

// --- Experiment document ---

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub dataset: PathBuf,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub encoding: EncodingSection,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub session: SessionSection,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncodingSection {
    #[serde(default)]
    pub layout: Layout,
    #[serde(default = "default_min_note")]
    pub min_note: i64,
    #[serde(default = "default_max_note")]
    pub max_note: i64,
    /// Required for `bits`; overrides the note span for `notes`.
    #[serde(default)]
    pub feature_width: Option<usize>,
    #[serde(default = "default_threshold")]
    pub match_threshold: f32,
}

impl Default for EncodingSection {
    fn default() -> Self {
        Self {
            layout: Layout::Notes,
            min_note: MIN_NOTE,
            max_note: MAX_NOTE,
            feature_width: None,
            match_threshold: MATCH_THRESHOLD,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineSection {
    #[serde(default)]
    pub backend: ComputeKind,
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default)]
    pub input_width: Option<usize>,
    #[serde(default)]
    pub input_height: Option<usize>,
    #[serde(default = "default_layers")]
    pub layers: Vec<LayerDesc>,
    #[serde(default = "default_min_weight")]
    pub min_init_weight: f32,
    #[serde(default = "default_max_weight")]
    pub max_init_weight: f32,
    #[serde(default = "default_readout_rate")]
    pub readout_rate: f32,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            backend: ComputeKind::Cpu,
            program: default_program(),
            input_width: None,
            input_height: None,
            layers: default_layers(),
            min_init_weight: MIN_INIT_WEIGHT,
            max_init_weight: MAX_INIT_WEIGHT,
            readout_rate: READOUT_RATE,
            seed: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSection {
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    /// `0` means every sequence in the split.
    #[serde(default = "default_max_sequences")]
    pub max_sequences: usize,
    #[serde(default = "default_train_split")]
    pub train_split: String,
    #[serde(default = "default_true")]
    pub evaluate: bool,
    /// Defaults to the training split.
    #[serde(default)]
    pub eval_split: Option<String>,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            epochs: 1,
            max_sequences: MAX_SEQUENCES,
            train_split: TRAIN_SPLIT.to_string(),
            evaluate: true,
            eval_split: None,
        }
    }
}

fn default_min_note() -> i64 {
    MIN_NOTE
}
fn default_max_note() -> i64 {
    MAX_NOTE
}
fn default_threshold() -> f32 {
    MATCH_THRESHOLD
}
fn default_program() -> String {
    "reference".to_string()
}
fn default_layers() -> Vec<LayerDesc> {
    vec![LayerDesc::new(16, 16), LayerDesc::new(8, 8)]
}
fn default_min_weight() -> f32 {
    MIN_INIT_WEIGHT
}
fn default_max_weight() -> f32 {
    MAX_INIT_WEIGHT
}
fn default_readout_rate() -> f32 {
    READOUT_RATE
}
fn default_epochs() -> usize {
    1
}
fn default_max_sequences() -> usize {
    MAX_SEQUENCES
}
fn default_train_split() -> String {
    TRAIN_SPLIT.to_string()
}
fn default_true() -> bool {
    true
}

/// A validated experiment, ready to bootstrap and run.
#[derive(Clone, Debug)]
pub struct Experiment {
    pub label: Option<String>,
    pub dataset: PathBuf,
    pub layout: Layout,
    pub harness: HarnessConfig,
    pub backend: ComputeKind,
    pub program: String,
    pub engine: EngineDesc,
    pub seed: Option<u64>,
    pub plan: SessionPlan,
}

impl ExperimentConfig {
    /// Minimal config pointing at a dataset, everything else defaulted.
    pub fn for_dataset(dataset: impl Into<PathBuf>) -> Self {
        Self {
            dataset: dataset.into(),
            label: None,
            encoding: EncodingSection::default(),
            engine: EngineSection::default(),
            session: SessionSection::default(),
        }
    }

    pub fn resolve(&self) -> Result<Experiment> {
        let enc = &self.encoding;
        let harness = match enc.layout {
            Layout::Notes => {
                let mut h = HarnessConfig::from_note_range(enc.min_note, enc.max_note)?;
                if let Some(width) = enc.feature_width {
                    h.feature_width = width;
                }
                h
            }
            Layout::Bits => {
                let width = enc.feature_width.ok_or_else(|| {
                    HarnessError::InvalidConfig(
                        "bits layout requires encoding.feature_width".to_string(),
                    )
                })?;
                HarnessConfig::new(width)
            }
        }
        .with_threshold(enc.match_threshold);
        harness.validate()?;

        let eng = &self.engine;
        let mut engine = EngineDesc::square_for(harness.feature_width, eng.layers.clone());
        match (eng.input_width, eng.input_height) {
            (Some(w), Some(h)) => {
                engine.input_width = w;
                engine.input_height = h;
            }
            (None, None) => {}
            _ => {
                return Err(HarnessError::InvalidConfig(
                    "engine.input_width and engine.input_height must be set together".to_string(),
                ));
            }
        }
        engine.min_init_weight = eng.min_init_weight;
        engine.max_init_weight = eng.max_init_weight;
        engine.readout_rate = eng.readout_rate;
        engine.validate(harness.feature_width)?;

        let sess = &self.session;
        if sess.epochs == 0 {
            return Err(HarnessError::InvalidConfig(
                "session.epochs must be positive".to_string(),
            ));
        }
        let plan = SessionPlan {
            epochs: sess.epochs,
            max_sequences: (sess.max_sequences > 0).then_some(sess.max_sequences),
            train_split: sess.train_split.clone(),
            eval_split: sess
                .evaluate
                .then(|| sess.eval_split.clone().unwrap_or_else(|| sess.train_split.clone())),
        };

        Ok(Experiment {
            label: self.label.clone(),
            dataset: self.dataset.clone(),
            layout: enc.layout,
            harness,
            backend: eng.backend,
            program: eng.program.clone(),
            engine,
            seed: eng.seed,
            plan,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_piano_range_defaults() {
        let exp = ExperimentConfig::for_dataset("piano.json").resolve().unwrap();
        assert_eq!(exp.harness.feature_width, 88);
        assert_eq!(exp.harness.note_offset, 21);
        assert_eq!(exp.harness.match_threshold, 0.5);
        // ceil(sqrt(88)) = 10
        assert_eq!(exp.engine.input_width, 10);
        assert_eq!(exp.engine.input_height, 10);
        assert_eq!(exp.plan.max_sequences, Some(4));
        assert_eq!(exp.plan.eval_split.as_deref(), Some("train"));
    }

    #[test]
    fn test_bits_layout_requires_width() {
        let mut cfg = ExperimentConfig::for_dataset("bits.json");
        cfg.encoding.layout = Layout::Bits;
        assert!(matches!(cfg.resolve(), Err(HarnessError::InvalidConfig(_))));

        cfg.encoding.feature_width = Some(16);
        let exp = cfg.resolve().unwrap();
        assert_eq!(exp.harness.feature_width, 16);
        assert_eq!(exp.harness.note_offset, 0);
        assert_eq!(exp.engine.input_len(), 16);
    }

    #[test]
    fn test_empty_note_range_rejected() {
        assert!(HarnessConfig::from_note_range(60, 60).is_err());
        assert!(HarnessConfig::from_note_range(60, 50).is_err());
    }

    #[test]
    fn test_extreme_note_range_is_config_error() {
        let err = HarnessConfig::from_note_range(i64::MIN, i64::MAX).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidConfig(_)), "{err}");
    }

    #[test]
    fn test_oversized_width_rejected() {
        let wide = HarnessConfig::from_note_range(0, i64::MAX).unwrap();
        assert!(matches!(wide.validate(), Err(HarnessError::InvalidConfig(_))));
        assert!(HarnessConfig::new(MAX_FEATURE_WIDTH).validate().is_ok());
        assert!(HarnessConfig::new(MAX_FEATURE_WIDTH + 1).validate().is_err());

        let mut cfg = ExperimentConfig::for_dataset("d.json");
        cfg.encoding.min_note = -1;
        cfg.encoding.max_note = i64::MAX;
        assert!(matches!(cfg.resolve(), Err(HarnessError::InvalidConfig(_))));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let cfg = HarnessConfig::new(4).with_threshold(1.5);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_input_too_small_for_features() {
        let mut cfg = ExperimentConfig::for_dataset("d.json");
        cfg.engine.input_width = Some(4);
        cfg.engine.input_height = Some(4);
        let err = cfg.resolve().unwrap_err();
        assert!(err.to_string().contains("exceeds engine input 4x4"), "{err}");
    }

    #[test]
    fn test_half_specified_input_shape_rejected() {
        let mut cfg = ExperimentConfig::for_dataset("d.json");
        cfg.engine.input_width = Some(12);
        assert!(cfg.resolve().is_err());
    }

    #[test]
    fn test_inverted_weight_bounds_rejected() {
        let mut cfg = ExperimentConfig::for_dataset("d.json");
        cfg.engine.min_init_weight = 0.2;
        cfg.engine.max_init_weight = -0.2;
        assert!(cfg.resolve().is_err());
    }

    #[test]
    fn test_no_layers_rejected() {
        let mut cfg = ExperimentConfig::for_dataset("d.json");
        cfg.engine.layers.clear();
        assert!(cfg.resolve().is_err());
    }

    #[test]
    fn test_zero_max_sequences_means_all() {
        let mut cfg = ExperimentConfig::for_dataset("d.json");
        cfg.session.max_sequences = 0;
        assert_eq!(cfg.resolve().unwrap().plan.max_sequences, None);
    }

    #[test]
    fn test_evaluate_off_clears_eval_split() {
        let mut cfg = ExperimentConfig::for_dataset("d.json");
        cfg.session.evaluate = false;
        cfg.session.eval_split = Some("test".to_string());
        assert_eq!(cfg.resolve().unwrap().plan.eval_split, None);
    }

    #[test]
    fn test_held_out_eval_split() {
        let mut cfg = ExperimentConfig::for_dataset("d.json");
        cfg.session.eval_split = Some("test".to_string());
        assert_eq!(cfg.resolve().unwrap().plan.eval_split.as_deref(), Some("test"));
    }

    #[test]
    fn test_zero_epochs_rejected() {
        let mut cfg = ExperimentConfig::for_dataset("d.json");
        cfg.session.epochs = 0;
        assert!(cfg.resolve().is_err());
    }

    #[test]
    fn test_json_document_defaults() {
        let cfg: ExperimentConfig =
            serde_json::from_str(r#"{"dataset": "x.json", "engine": {"backend": "gpu"}}"#).unwrap();
        assert_eq!(cfg.engine.backend, ComputeKind::Gpu);
        assert_eq!(cfg.engine.program, "reference");
        assert_eq!(cfg.engine.layers.len(), 2);
        assert_eq!(cfg.session.train_split, "train");
    }
}
