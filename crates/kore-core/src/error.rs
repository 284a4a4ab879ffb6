use crate::{DType, DataLayout, Device};

/// Errors raised by the tensor substrate.
#[derive(Debug, thiserror::Error)]
pub enum KoreError {
    #[error("Tensor holds no memory; allocate or assign data before reading it")]
    NotInitialized,

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },

    #[error("DType mismatch: expected {expected}, got {got}")]
    DTypeMismatch { expected: DType, got: DType },

    #[error("Unsupported dtype: {0}")]
    UnsupportedDType(DType),

    #[error("Unsupported layout transform from {from} to {to}")]
    UnsupportedLayout { from: DataLayout, to: DataLayout },

    #[error("Unsupported place: {0}")]
    UnsupportedDevice(Device),

    #[error("Unknown {kind} enumerator '{value}'")]
    UnknownEnumerator { kind: &'static str, value: String },

    #[error("Storage error: {0}")]
    StorageError(String),
}
