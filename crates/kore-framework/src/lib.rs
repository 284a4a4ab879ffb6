//! # kore-framework
//!
//! Operator execution runtime for Kore.
//!
//! Provides:
//! - `OpDesc`: mutable, serializable operator descriptions
//! - `OpKernelType`: kernel signatures (data type, layout, place, accelerator)
//! - `OpRegistry`: operator creators, attribute checkers and kernel tables
//! - `Scope` / `Variable`: named variable storage with parent lookup
//! - `OperatorWithKernel`: shape inference, kernel selection, input
//!   conversion, execution and in-place reconciliation
//!
//! ```ignore
//! let mut builder = OpRegistryBuilder::new();
//! builder
//!     .register_kernel_op::<Relu>("relu", OpAttrChecker::new())?
//!     .register_kernel_fn("relu", OpKernelType::new(DType::F32, Device::Cpu), relu_f32)?;
//! let registry = builder.build();
//!
//! let op = registry.create_op(&desc)?;
//! op.run(&scope, Device::Cpu)?;
//! ```

pub mod accelerator;
pub mod attribute;
pub mod data_transform;
pub mod device_context;
pub mod error;
pub mod execution_context;
pub mod flags;
pub mod infer_shape;
pub mod kernel;
pub mod kernel_type;
pub mod op_desc;
pub mod operator;
pub mod operator_with_kernel;
pub mod registry;
pub mod scope;
pub mod variable;

pub use accelerator::Accelerator;
pub use attribute::{AttrRule, AttrType, Attribute, AttributeMap, OpAttrChecker};
pub use device_context::{CpuDeviceContext, DeviceContext, DeviceContextPool};
pub use error::FrameworkError;
pub use execution_context::ExecutionContext;
pub use infer_shape::RuntimeInferShapeContext;
pub use kernel::{OpKernel, OpKernelMap};
pub use kernel_type::{need_transform, OpKernelType};
pub use op_desc::{OpDesc, OpDescProto, VariableNameMap};
pub use operator::{NopOp, Operator, OperatorBase, EMPTY_VAR_NAME, TEMP_VAR_NAME};
pub use operator_with_kernel::{indicate_data_type, KernelOp, OperatorWithKernel};
pub use registry::{OpRegistry, OpRegistryBuilder};
pub use scope::{Scope, VarHandle};
pub use variable::{VarType, VarValue, Variable};

/// Result type alias for framework operations.
pub type Result<T> = std::result::Result<T, FrameworkError>;
