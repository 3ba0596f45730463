use std::fmt;

/// Fault found while turning one timestep into a feature vector.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeError {
    /// Active index (after note-offset translation) outside `[0, width)`.
    IndexOutOfRange { index: i64, width: usize },
    /// Dense bit vector whose length differs from the feature width.
    WidthMismatch { expected: usize, got: usize },
    /// Dense entry that is neither 0 nor 1.
    NonBinary { position: usize, value: i64 },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::IndexOutOfRange { index, width } => {
                write!(f, "feature index {index} outside [0, {width})")
            }
            EncodeError::WidthMismatch { expected, got } => {
                write!(f, "bit vector has {got} entries, expected {expected}")
            }
            EncodeError::NonBinary { position, value } => {
                write!(f, "bit vector entry {position} is {value}, expected 0 or 1")
            }
        }
    }
}

impl std::error::Error for EncodeError {}

/// What is wrong with a dataset record.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetFault {
    Encode(EncodeError),
    EmptySequence,
    MissingSplit,
}

impl fmt::Display for DatasetFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetFault::Encode(e) => write!(f, "{e}"),
            DatasetFault::EmptySequence => write!(f, "sequence has no timesteps"),
            DatasetFault::MissingSplit => write!(f, "split not present in dataset"),
        }
    }
}

impl From<EncodeError> for DatasetFault {
    fn from(e: EncodeError) -> Self {
        DatasetFault::Encode(e)
    }
}

#[derive(Debug)]
pub enum HarnessError {
    /// Requested compute backend cannot be bound.
    BackendUnavailable(String),
    /// Engine program failed to load.
    ProgramLoad(String),
    InvalidConfig(String),
    /// Dataset integrity defect. `sequence`/`timestep` are zero-based and
    /// absent when the fault is not tied to one record.
    Dataset {
        split: String,
        sequence: Option<usize>,
        timestep: Option<usize>,
        fault: DatasetFault,
    },
    /// An Engine call signalled failure.
    Engine(String),
    Json(serde_json::Error),
}

impl HarnessError {
    pub fn dataset(
        split: &str,
        sequence: usize,
        timestep: usize,
        fault: impl Into<DatasetFault>,
    ) -> Self {
        HarnessError::Dataset {
            split: split.to_string(),
            sequence: Some(sequence),
            timestep: Some(timestep),
            fault: fault.into(),
        }
    }
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarnessError::BackendUnavailable(msg) => {
                write!(f, "compute backend unavailable: {msg}")
            }
            HarnessError::ProgramLoad(msg) => write!(f, "could not load program: {msg}"),
            HarnessError::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            HarnessError::Dataset {
                split,
                sequence,
                timestep,
                fault,
            } => {
                write!(f, "dataset integrity error in split '{split}'")?;
                if let Some(seq) = sequence {
                    write!(f, ", sequence {seq}")?;
                }
                if let Some(step) = timestep {
                    write!(f, ", timestep {step}")?;
                }
                write!(f, ": {fault}")
            }
            HarnessError::Engine(msg) => write!(f, "engine failure: {msg}"),
            HarnessError::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for HarnessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HarnessError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(e: serde_json::Error) -> Self {
        HarnessError::Json(e)
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
