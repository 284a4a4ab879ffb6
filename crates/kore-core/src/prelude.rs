//! Convenience re-exports for common kore-core types.
//!
//! ```rust
//! use kore_core::prelude::*;
//! ```

pub use crate::DType;
pub use crate::DataLayout;
pub use crate::Device;
pub use crate::KoreError;
pub use crate::Result;
pub use crate::SelectedRows;
pub use crate::Shape;
pub use crate::Tensor;
