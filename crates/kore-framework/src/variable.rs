use std::fmt;

use kore_core::{SelectedRows, Tensor};

use crate::error::FrameworkError;
use crate::Result;

/// Value kinds a variable can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarType {
    Tensor,
    SelectedRows,
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarType::Tensor => write!(f, "Tensor"),
            VarType::SelectedRows => write!(f, "SelectedRows"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum VarValue {
    Tensor(Tensor),
    SelectedRows(SelectedRows),
}

impl VarValue {
    pub fn var_type(&self) -> VarType {
        match self {
            VarValue::Tensor(_) => VarType::Tensor,
            VarValue::SelectedRows(_) => VarType::SelectedRows,
        }
    }

    /// The dense tensor behind either kind.
    pub fn tensor(&self) -> &Tensor {
        match self {
            VarValue::Tensor(t) => t,
            VarValue::SelectedRows(sr) => sr.value(),
        }
    }
}

/// A named slot in a scope. Starts empty; the first mutable access fixes its kind.
#[derive(Debug, Clone, Default)]
pub struct Variable {
    value: Option<VarValue>,
}

impl Variable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.value.is_some()
    }

    pub fn is_tensor(&self) -> bool {
        matches!(self.value, Some(VarValue::Tensor(_)))
    }

    pub fn is_selected_rows(&self) -> bool {
        matches!(self.value, Some(VarValue::SelectedRows(_)))
    }

    pub fn value(&self) -> Option<&VarValue> {
        self.value.as_ref()
    }

    pub fn var_type(&self) -> Result<VarType> {
        self.value
            .as_ref()
            .map(VarValue::var_type)
            .ok_or(FrameworkError::EmptyVariable)
    }

    pub fn get_tensor(&self) -> Result<&Tensor> {
        match &self.value {
            Some(VarValue::Tensor(t)) => Ok(t),
            Some(other) => Err(mismatch(VarType::Tensor, other)),
            None => Err(FrameworkError::EmptyVariable),
        }
    }

    /// Dense tensor, created empty when the variable holds nothing yet.
    pub fn get_mutable_tensor(&mut self) -> Result<&mut Tensor> {
        let value = self
            .value
            .get_or_insert_with(|| VarValue::Tensor(Tensor::new()));
        match value {
            VarValue::Tensor(t) => Ok(t),
            other => Err(mismatch(VarType::Tensor, other)),
        }
    }

    pub fn get_selected_rows(&self) -> Result<&SelectedRows> {
        match &self.value {
            Some(VarValue::SelectedRows(sr)) => Ok(sr),
            Some(other) => Err(mismatch(VarType::SelectedRows, other)),
            None => Err(FrameworkError::EmptyVariable),
        }
    }

    pub fn get_mutable_selected_rows(&mut self) -> Result<&mut SelectedRows> {
        let value = self
            .value
            .get_or_insert_with(|| VarValue::SelectedRows(SelectedRows::default()));
        match value {
            VarValue::SelectedRows(sr) => Ok(sr),
            other => Err(mismatch(VarType::SelectedRows, other)),
        }
    }

    pub fn set_value(&mut self, value: VarValue) {
        self.value = Some(value);
    }

    pub fn clear(&mut self) {
        self.value = None;
    }
}

fn mismatch(expected: VarType, got: &VarValue) -> FrameworkError {
    FrameworkError::VariableTypeMismatch {
        expected,
        got: got.var_type(),
    }
}
