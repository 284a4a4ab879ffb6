use kore_core::{DType, Device, KoreError};

use crate::attribute::AttrType;
use crate::variable::VarType;

/// Errors raised while describing, creating or running operators.
///
/// Every variant is fatal to the operator call that produced it.
#[derive(Debug, thiserror::Error)]
pub enum FrameworkError {
    #[error(transparent)]
    Core(#[from] KoreError),

    #[error("Operator {op_type} has no parameter '{param}'")]
    MissingParameter { op_type: String, param: String },

    #[error("Parameter '{param}' of operator {op_type} must bind one variable, got {count}")]
    MultipleArguments {
        op_type: String,
        param: String,
        count: usize,
    },

    #[error("Operator {op_type} has no attribute '{name}'")]
    MissingAttribute { op_type: String, name: String },

    #[error("Attribute '{name}' is {got}, expected {expected}")]
    AttributeTypeMismatch {
        name: String,
        expected: AttrType,
        got: AttrType,
    },

    #[error("Attribute '{name}' of operator {op_type} is invalid: {reason}")]
    InvalidAttribute {
        op_type: String,
        name: String,
        reason: String,
    },

    #[error("Variable '{0}' is not found in scope")]
    VariableNotFound(String),

    #[error("Variable must hold a value before it is read")]
    EmptyVariable,

    #[error("Variable holds {got}, expected {expected}")]
    VariableTypeMismatch { expected: VarType, got: VarType },

    #[error("Operator '{0}' has not been registered")]
    UnregisteredOp(String),

    #[error("Operator '{0}' is registered more than once")]
    DuplicateOp(String),

    #[error("Operator {op_type} already has a kernel for {kernel_type}")]
    DuplicateKernel { op_type: String, kernel_type: String },

    #[error("There are no kernels which are registered in the {0} operator")]
    NoKernelsRegistered(String),

    #[error("Operator {op_type} does not have kernel for {kernel_type}")]
    NoKernelForSignature { op_type: String, kernel_type: String },

    #[error("DataType of operator {op_type} must be the same: got {first} != {second}")]
    InconsistentDataType {
        op_type: String,
        first: DType,
        second: DType,
    },

    #[error("DataType of operator {0} should be indicated by input")]
    DataTypeNotIndicated(String),

    #[error("Tensor {var} contains {kind} after operator {op_type}")]
    NanOrInf {
        op_type: String,
        var: String,
        kind: &'static str,
    },

    #[error("Place {0} is not supported by this build")]
    UnsupportedPlace(Device),

    #[error("Not implemented: {0}")]
    Unimplemented(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
