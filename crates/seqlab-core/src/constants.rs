/// Decision boundary for binarizing predictions and inputs when scoring.
/// A value exactly at the boundary counts as "off".
pub const MATCH_THRESHOLD: f32 = 0.5;

/// Lowest piano key in MIDI numbering (A0), inclusive.
pub const MIN_NOTE: i64 = 21;

/// One past the highest piano key (C8 = 108), exclusive.
pub const MAX_NOTE: i64 = 109;

/// Largest feature vector the harness will allocate.
pub const MAX_FEATURE_WIDTH: usize = 1 << 16;

/// Default bounds for random weight initialization.
pub const MIN_INIT_WEIGHT: f32 = -0.1;
pub const MAX_INIT_WEIGHT: f32 = 0.1;

/// Default delta-rule step size for the reference engine readout.
pub const READOUT_RATE: f32 = 0.05;

/// Default number of sequences taken from the front of a split.
pub const MAX_SEQUENCES: usize = 4;

pub const TRAIN_SPLIT: &str = "train";
