//! # kore-core
//!
//! Tensor substrate for the Kore operator runtime.
//!
//! Provides:
//! - `DType`: element types with stable ordinals
//! - `Device`: execution places (CPU, CUDA, pinned host)
//! - `DataLayout`: memory layout tags
//! - `Storage`: shared copy-on-write buffers
//! - `Tensor`: dense arrays with optional storage
//! - `SelectedRows`: sparse row subsets of a dense tensor

pub mod device;
pub mod dtype;
pub mod error;
pub mod layout;
pub mod prelude;
pub mod selected_rows;
pub mod shape;
pub mod storage;
pub mod tensor;

pub use device::Device;
pub use dtype::{DType, Element};
pub use error::KoreError;
pub use layout::{need_transform_layout, DataLayout};
pub use selected_rows::SelectedRows;
pub use shape::Shape;
pub use storage::Storage;
pub use tensor::Tensor;

/// Result type alias for Kore operations.
pub type Result<T> = std::result::Result<T, KoreError>;
