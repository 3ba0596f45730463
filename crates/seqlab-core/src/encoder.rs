//! Timestep → feature vector encoding.
//!
//! Pure and deterministic. Out-of-range indices are rejected, never clamped.

use crate::error::EncodeError;

/// One symbolic timestep in feature-index space.
#[derive(Clone, Debug, PartialEq)]
pub enum Timestep {
    /// Zero-based indices of the active features. Signed so that a note below
    /// the configured offset surfaces as a negative index instead of wrapping.
    Active(Vec<i64>),
    /// Explicit 0/1 vector, one entry per feature.
    Dense(Vec<i64>),
}

impl Timestep {
    /// Translate absolute note numbers into feature indices. Saturates at
    /// the `i64` bounds; either extreme is out of range for any width.
    pub fn from_notes(notes: &[i64], note_offset: i64) -> Self {
        Timestep::Active(notes.iter().map(|n| n.saturating_sub(note_offset)).collect())
    }

    fn check(&self, width: usize) -> Result<(), EncodeError> {
        match self {
            Timestep::Active(indices) => {
                if let Some(&index) = indices.iter().find(|&&k| k < 0 || k as u64 >= width as u64) {
                    return Err(EncodeError::IndexOutOfRange { index, width });
                }
            }
            Timestep::Dense(bits) => {
                if bits.len() != width {
                    return Err(EncodeError::WidthMismatch {
                        expected: width,
                        got: bits.len(),
                    });
                }
                if let Some((position, &value)) =
                    bits.iter().enumerate().find(|&(_, &b)| b != 0 && b != 1)
                {
                    return Err(EncodeError::NonBinary { position, value });
                }
            }
        }
        Ok(())
    }
}

/// Fixed-width vector of values in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn zeros(width: usize) -> Self {
        Self(vec![0.0; width])
    }

    pub fn from_values(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.0
    }

    /// Indices whose value is above `threshold`.
    pub fn active_indices(&self, threshold: f32) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v > threshold)
            .map(|(i, _)| i)
            .collect()
    }

    /// Overwrite in place with the encoding of `timestep`. The vector is left
    /// untouched when the timestep is invalid.
    pub fn fill_from(&mut self, timestep: &Timestep) -> Result<(), EncodeError> {
        let width = self.0.len();
        timestep.check(width)?;
        match timestep {
            Timestep::Active(indices) => {
                self.0.fill(0.0);
                for &k in indices {
                    self.0[k as usize] = 1.0;
                }
            }
            Timestep::Dense(bits) => {
                for (slot, &b) in self.0.iter_mut().zip(bits) {
                    *slot = b as f32;
                }
            }
        }
        Ok(())
    }
}

/// Encode one timestep into a fresh vector of `width` entries.
pub fn encode(timestep: &Timestep, width: usize) -> Result<FeatureVector, EncodeError> {
    let mut v = FeatureVector::zeros(width);
    v.fill_from(timestep)?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_active_indices_set_to_one() {
        let v = encode(&Timestep::Active(vec![0, 2]), 4).unwrap();
        assert_eq!(v.as_slice(), &[1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_empty_timestep_is_silence() {
        let v = encode(&Timestep::Active(vec![]), 5).unwrap();
        assert_eq!(v.as_slice(), &[0.0; 5]);
    }

    #[test]
    fn test_duplicate_indices_tolerated() {
        let v = encode(&Timestep::Active(vec![1, 1, 1]), 3).unwrap();
        assert_eq!(v.as_slice(), &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_index_at_width_rejected() {
        let err = encode(&Timestep::Active(vec![1, 4]), 4).unwrap_err();
        assert_eq!(err, EncodeError::IndexOutOfRange { index: 4, width: 4 });
    }

    #[test]
    fn test_note_below_offset_rejected() {
        let ts = Timestep::from_notes(&[20, 21], 21);
        assert_eq!(ts, Timestep::Active(vec![-1, 0]));
        let err = encode(&ts, 88).unwrap_err();
        assert_eq!(err, EncodeError::IndexOutOfRange { index: -1, width: 88 });
    }

    #[test]
    fn test_extreme_notes_rejected_not_wrapped() {
        let low = Timestep::from_notes(&[i64::MIN], 21);
        assert_eq!(low, Timestep::Active(vec![i64::MIN]));
        assert!(matches!(encode(&low, 88), Err(EncodeError::IndexOutOfRange { .. })));

        let high = Timestep::from_notes(&[i64::MAX], -1);
        assert_eq!(high, Timestep::Active(vec![i64::MAX]));
        assert!(matches!(encode(&high, 88), Err(EncodeError::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_note_translation() {
        let ts = Timestep::from_notes(&[21, 60, 108], 21);
        let v = encode(&ts, 88).unwrap();
        assert_eq!(v.active_indices(0.5), vec![0, 39, 87]);
    }

    #[test]
    fn test_dense_bits() {
        let v = encode(&Timestep::Dense(vec![0, 1, 1, 0]), 4).unwrap();
        assert_eq!(v.as_slice(), &[0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_dense_wrong_width() {
        let err = encode(&Timestep::Dense(vec![0, 1, 1]), 4).unwrap_err();
        assert_eq!(err, EncodeError::WidthMismatch { expected: 4, got: 3 });
    }

    #[test]
    fn test_dense_non_binary() {
        let err = encode(&Timestep::Dense(vec![0, 2, 1]), 3).unwrap_err();
        assert_eq!(err, EncodeError::NonBinary { position: 1, value: 2 });
    }

    #[test]
    fn test_fill_overwrites_previous_step() {
        let mut live = FeatureVector::zeros(4);
        live.fill_from(&Timestep::Active(vec![0, 1])).unwrap();
        live.fill_from(&Timestep::Active(vec![3])).unwrap();
        assert_eq!(live.as_slice(), &[0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_failed_fill_leaves_vector_untouched() {
        let mut live = FeatureVector::zeros(4);
        live.fill_from(&Timestep::Active(vec![2])).unwrap();
        assert!(live.fill_from(&Timestep::Active(vec![0, 9])).is_err());
        assert_eq!(live.as_slice(), &[0.0, 0.0, 1.0, 0.0]);
    }

    proptest! {
        #[test]
        fn prop_encoding_marks_exactly_given_indices(
            width in 1usize..128,
            raw in proptest::collection::vec(0usize..128, 0..20),
        ) {
            let indices: Vec<i64> = raw.iter().map(|&k| (k % width) as i64).collect();
            let v = encode(&Timestep::Active(indices.clone()), width).unwrap();
            prop_assert_eq!(v.len(), width);
            for (k, &x) in v.as_slice().iter().enumerate() {
                prop_assert!(x == 0.0 || x == 1.0);
                prop_assert_eq!(x == 1.0, indices.contains(&(k as i64)));
            }
        }

        #[test]
        fn prop_encoding_is_idempotent(
            width in 1usize..64,
            raw in proptest::collection::vec(0usize..64, 0..10),
        ) {
            let ts = Timestep::Active(raw.iter().map(|&k| (k % width) as i64).collect());
            let a = encode(&ts, width).unwrap();
            let b = encode(&ts, width).unwrap();
            let bits_a: Vec<u32> = a.as_slice().iter().map(|x| x.to_bits()).collect();
            let bits_b: Vec<u32> = b.as_slice().iter().map(|x| x.to_bits()).collect();
            prop_assert_eq!(bits_a, bits_b);
        }
    }
}
