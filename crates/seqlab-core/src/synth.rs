//! Seeded synthetic note datasets for smoke runs.
//!
//! A handful of random chord motifs are drawn; every sequence repeats one
//! motif from a random phase, with occasional dropped (silent) steps. A model
//! that learns the motifs can predict both splits well.

use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::index;

use crate::config::HarnessConfig;
use crate::constants::{MAX_NOTE, MIN_NOTE, TRAIN_SPLIT};
use crate::dataset::{Dataset, RawSequence};
use crate::error::{HarnessError, Result};

#[derive(Clone, Debug)]
pub struct SynthSpec {
    pub motifs: usize,
    /// Chords per motif.
    pub period: usize,
    /// Timesteps per sequence.
    pub length: usize,
    pub train_sequences: usize,
    pub test_sequences: usize,
    /// Notes per chord.
    pub chord_size: usize,
    pub min_note: i64,
    /// Exclusive.
    pub max_note: i64,
    /// Probability that a step is replaced by silence.
    pub dropout: f64,
}

impl Default for SynthSpec {
    fn default() -> Self {
        Self {
            motifs: 3,
            period: 4,
            length: 32,
            train_sequences: 8,
            test_sequences: 4,
            chord_size: 3,
            min_note: MIN_NOTE,
            max_note: MAX_NOTE,
            dropout: 0.0,
        }
    }
}

impl SynthSpec {
    /// Number of distinct notes in range, checked like a harness width.
    fn span(&self) -> Result<usize> {
        let config = HarnessConfig::from_note_range(self.min_note, self.max_note)?;
        config.validate()?;
        Ok(config.feature_width)
    }

    /// Returns the note span on success.
    fn validate(&self) -> Result<usize> {
        let span = self.span()?;
        if self.chord_size > span {
            return Err(HarnessError::InvalidConfig(format!(
                "chord size {} exceeds note span {span}",
                self.chord_size
            )));
        }
        if self.motifs == 0 || self.period == 0 || self.length == 0 {
            return Err(HarnessError::InvalidConfig(
                "motifs, period and length must be positive".to_string(),
            ));
        }
        if self.train_sequences == 0 {
            return Err(HarnessError::InvalidConfig(
                "at least one training sequence is required".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.dropout) {
            return Err(HarnessError::InvalidConfig(format!(
                "dropout {} outside [0, 1]",
                self.dropout
            )));
        }
        Ok(span)
    }
}

fn random_chord(spec: &SynthSpec, span: usize, rng: &mut impl Rng) -> Vec<i64> {
    let mut notes: Vec<i64> = index::sample(rng, span, spec.chord_size)
        .into_iter()
        .map(|i| spec.min_note + i as i64)
        .collect();
    notes.sort_unstable();
    notes
}

fn render(motif: &[Vec<i64>], spec: &SynthSpec, rng: &mut impl Rng) -> RawSequence {
    let phase = rng.random_range(0..motif.len());
    (0..spec.length)
        .map(|t| {
            if spec.dropout > 0.0 && rng.random_bool(spec.dropout) {
                Vec::new()
            } else {
                motif[(phase + t) % motif.len()].clone()
            }
        })
        .collect()
}

pub fn generate(spec: &SynthSpec, rng: &mut impl Rng) -> Result<Dataset> {
    let span = spec.validate()?;

    let motifs: Vec<Vec<Vec<i64>>> = (0..spec.motifs)
        .map(|_| (0..spec.period).map(|_| random_chord(spec, span, rng)).collect())
        .collect();

    let mut split = |n: usize| -> Vec<RawSequence> {
        (0..n)
            .map(|_| {
                let motif = &motifs[rng.random_range(0..motifs.len())];
                render(motif, spec, &mut *rng)
            })
            .collect()
    };

    let mut splits = BTreeMap::new();
    splits.insert(TRAIN_SPLIT.to_string(), split(spec.train_sequences));
    if spec.test_sequences > 0 {
        splits.insert("test".to_string(), split(spec.test_sequences));
    }
    Dataset::from_splits(splits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HarnessConfig, Layout};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn test_shape_and_range() {
        let spec = SynthSpec::default();
        let ds = generate(&spec, &mut SmallRng::seed_from_u64(42)).unwrap();
        let train = ds.split("train").unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(ds.split("test").unwrap().len(), 4);
        assert!(train.iter().all(|s| s.len() == 32));

        let cfg = HarnessConfig::from_note_range(spec.min_note, spec.max_note).unwrap();
        Dataset::validate(train, "train", Layout::Notes, &cfg).unwrap();
    }

    #[test]
    fn test_sequences_repeat_their_motif() {
        let spec = SynthSpec {
            period: 3,
            ..SynthSpec::default()
        };
        let ds = generate(&spec, &mut SmallRng::seed_from_u64(1)).unwrap();
        for seq in ds.split("train").unwrap() {
            for t in 3..seq.len() {
                assert_eq!(seq[t], seq[t - 3]);
            }
            assert!(seq.iter().all(|step| step.len() == 3));
        }
    }

    #[test]
    fn test_same_seed_same_dataset() {
        let spec = SynthSpec::default();
        let a = generate(&spec, &mut SmallRng::seed_from_u64(9)).unwrap();
        let b = generate(&spec, &mut SmallRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_full_dropout_is_silence() {
        let spec = SynthSpec {
            dropout: 1.0,
            test_sequences: 0,
            ..SynthSpec::default()
        };
        let ds = generate(&spec, &mut SmallRng::seed_from_u64(2)).unwrap();
        assert!(ds.split("test").is_err());
        assert!(ds.split("train").unwrap().iter().flatten().all(|s| s.is_empty()));
    }

    #[test]
    fn test_chord_wider_than_range_rejected() {
        let spec = SynthSpec {
            min_note: 60,
            max_note: 62,
            chord_size: 3,
            ..SynthSpec::default()
        };
        assert!(generate(&spec, &mut SmallRng::seed_from_u64(0)).is_err());
    }

    #[test]
    fn test_extreme_note_range_rejected() {
        let spec = SynthSpec {
            min_note: i64::MIN,
            max_note: i64::MAX,
            ..SynthSpec::default()
        };
        let err = generate(&spec, &mut SmallRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidConfig(_)), "{err}");
    }
}
