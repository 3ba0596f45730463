//! Named splits of symbolic sequences.
//!
//! The JSON shape mirrors the classic polyphonic-music benchmarks:
//! `{"train": [[[60, 64, 67], [62], ...], ...], "valid": ..., "test": ...}`
//! where each innermost array is one timestep. For the `bits` layout the
//! innermost arrays are dense 0/1 vectors instead of note numbers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{HarnessConfig, Layout};
use crate::constants::TRAIN_SPLIT;
use crate::encoder::{FeatureVector, Timestep};
use crate::error::{DatasetFault, HarnessError, Result};

/// One sequence as stored: a list of raw timesteps.
pub type RawSequence = Vec<Vec<i64>>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    splits: BTreeMap<String, Vec<RawSequence>>,
}

/// Shape statistics for one split.
#[derive(Clone, Debug, PartialEq)]
pub struct SplitSummary {
    pub name: String,
    pub sequences: usize,
    pub timesteps: usize,
    pub shortest: usize,
    pub longest: usize,
    /// Smallest and largest value seen in any timestep.
    pub value_range: Option<(i64, i64)>,
    /// Most values active in a single timestep.
    pub max_active: usize,
}

impl Dataset {
    /// Parse and check structural integrity: a `train` split must exist and
    /// no sequence may be empty.
    pub fn from_json(json: &str) -> Result<Self> {
        let dataset: Dataset = serde_json::from_str(json)?;
        dataset.check_structure()?;
        Ok(dataset)
    }

    pub fn from_splits(splits: BTreeMap<String, Vec<RawSequence>>) -> Result<Self> {
        let dataset = Self { splits };
        dataset.check_structure()?;
        Ok(dataset)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn check_structure(&self) -> Result<()> {
        if !self.splits.contains_key(TRAIN_SPLIT) {
            return Err(HarnessError::Dataset {
                split: TRAIN_SPLIT.to_string(),
                sequence: None,
                timestep: None,
                fault: DatasetFault::MissingSplit,
            });
        }
        for (name, sequences) in &self.splits {
            if let Some(i) = sequences.iter().position(|s| s.is_empty()) {
                return Err(HarnessError::Dataset {
                    split: name.clone(),
                    sequence: Some(i),
                    timestep: None,
                    fault: DatasetFault::EmptySequence,
                });
            }
        }
        Ok(())
    }

    pub fn split_names(&self) -> impl Iterator<Item = &str> {
        self.splits.keys().map(String::as_str)
    }

    pub fn split(&self, name: &str) -> Result<&[RawSequence]> {
        self.splits
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| HarnessError::Dataset {
                split: name.to_string(),
                sequence: None,
                timestep: None,
                fault: DatasetFault::MissingSplit,
            })
    }

    /// The first `max` sequences of a split (all of them when `None`).
    pub fn select(&self, name: &str, max: Option<usize>) -> Result<&[RawSequence]> {
        let sequences = self.split(name)?;
        let n = max.map_or(sequences.len(), |m| m.min(sequences.len()));
        Ok(&sequences[..n])
    }

    /// Encode every timestep of `sequences` once, reporting the first
    /// integrity defect with its location.
    pub fn validate(
        sequences: &[RawSequence],
        split: &str,
        layout: Layout,
        config: &HarnessConfig,
    ) -> Result<()> {
        let mut scratch = FeatureVector::zeros(config.feature_width);
        for (s, seq) in sequences.iter().enumerate() {
            if seq.is_empty() {
                return Err(HarnessError::Dataset {
                    split: split.to_string(),
                    sequence: Some(s),
                    timestep: None,
                    fault: DatasetFault::EmptySequence,
                });
            }
            for (t, raw) in seq.iter().enumerate() {
                scratch
                    .fill_from(&to_timestep(raw, layout, config))
                    .map_err(|e| HarnessError::dataset(split, s, t, e))?;
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> Vec<SplitSummary> {
        self.splits
            .iter()
            .map(|(name, sequences)| {
                let lengths = sequences.iter().map(Vec::len);
                let value_range = sequences
                    .iter()
                    .flatten()
                    .flatten()
                    .fold(None, |acc: Option<(i64, i64)>, &v| match acc {
                        None => Some((v, v)),
                        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                    });
                SplitSummary {
                    name: name.clone(),
                    sequences: sequences.len(),
                    timesteps: lengths.clone().sum(),
                    shortest: lengths.clone().min().unwrap_or(0),
                    longest: lengths.max().unwrap_or(0),
                    value_range,
                    max_active: sequences
                        .iter()
                        .flatten()
                        .map(|step| step.len())
                        .max()
                        .unwrap_or(0),
                }
            })
            .collect()
    }
}

/// Interpret one raw timestep under the given layout.
pub fn to_timestep(raw: &[i64], layout: Layout, config: &HarnessConfig) -> Timestep {
    match layout {
        Layout::Notes => Timestep::from_notes(raw, config.note_offset),
        Layout::Bits => Timestep::Dense(raw.to_vec()),
    }
}
