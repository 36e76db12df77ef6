use thiserror::Error;

/// Errors raised while building or evaluating a [`Model`](crate::Model).
///
/// Array arithmetic on mismatched shapes still panics inside `Matrix`; this
/// type covers everything a caller can get wrong through the public entry
/// points.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid loss type code {0}: expected 0 (original), 1 (modified) or 2 (angular)")]
    InvalidLossType(i64),
    #[error("unknown loss type {0:?}: expected \"original\", \"modified\" or \"angular\"")]
    UnknownLossType(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("empty batch")]
    EmptyBatch,
    #[error("batch mismatch: {images} images but {labels} labels")]
    BatchMismatch { images: usize, labels: usize },
    #[error("label {label} at index {index} is out of range for {num_classes} classes")]
    LabelOutOfRange {
        index: usize,
        label: usize,
        num_classes: usize,
    },
    #[error("expected single-channel images, got {0} channels")]
    ChannelMismatch(usize),
    #[error("images of {height}x{width} are too small, the extractor needs at least {min}x{min}")]
    ImageTooSmall {
        height: usize,
        width: usize,
        min: usize,
    },
    #[error("tensor shape {shape:?} needs {expected} values, got {actual}")]
    DataLength {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
    #[error("parameter {name:?} already exists with shape {existing:?}, requested {requested:?}")]
    ShapeConflict {
        name: String,
        existing: Vec<usize>,
        requested: Vec<usize>,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = ModelError> = std::result::Result<T, E>;
