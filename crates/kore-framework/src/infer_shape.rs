//! Shape inference over a live scope.
//!
//! Runs before any kernel so output variables carry their dims before data
//! materializes. Only metadata is touched; tensor contents are never read.

use crate::attribute::FromAttribute;
use crate::error::FrameworkError;
use crate::execution_context::bound_var_exists;
use crate::operator::{OperatorBase, EMPTY_VAR_NAME};
use crate::scope::{Scope, VarHandle};
use crate::variable::{VarType, VarValue};
use crate::Result;

pub struct RuntimeInferShapeContext<'a> {
    op: &'a OperatorBase,
    scope: &'a Scope,
}

impl<'a> RuntimeInferShapeContext<'a> {
    pub fn new(op: &'a OperatorBase, scope: &'a Scope) -> Self {
        Self { op, scope }
    }

    pub fn op(&self) -> &'a OperatorBase {
        self.op
    }

    pub fn attr<T: FromAttribute>(&self, name: &str) -> Result<T> {
        self.op.attr(name)
    }

    pub fn has_input(&self, param: &str) -> Result<bool> {
        let names = self.op.has_inputs(param).then(|| self.op.inputs_map()[param].as_slice());
        bound_var_exists(self.scope, self.op.type_(), param, names)
    }

    pub fn has_output(&self, param: &str) -> Result<bool> {
        let names = self.op.has_outputs(param).then(|| self.op.outputs_map()[param].as_slice());
        bound_var_exists(self.scope, self.op.type_(), param, names)
    }

    /// Whether `param` binds at least one variable and all of them exist.
    pub fn has_inputs(&self, param: &str) -> bool {
        self.all_exist(self.op.inputs(param).ok())
    }

    pub fn has_outputs(&self, param: &str) -> bool {
        self.all_exist(self.op.outputs(param).ok())
    }

    fn all_exist(&self, names: Option<&[String]>) -> bool {
        match names {
            Some(names) if !names.is_empty() => names.iter().all(|n| self.scope.find_var(n).is_some()),
            _ => false,
        }
    }

    pub fn input_var_type(&self, param: &str) -> Result<VarType> {
        let var = self.find(self.op.input(param)?)?;
        let var = var.read();
        var.var_type()
    }

    /// Dims of the single input bound to `param`.
    ///
    /// Selected rows report their complete dims: the height followed by the
    /// trailing dims of the row values.
    pub fn input_dim(&self, param: &str) -> Result<Vec<usize>> {
        self.dim_of(self.op.input(param)?)
    }

    pub fn inputs_dim(&self, param: &str) -> Result<Vec<Vec<usize>>> {
        self.op.inputs(param)?.iter().map(|n| self.dim_of(n)).collect()
    }

    pub fn set_output_dim(&self, param: &str, dims: &[usize]) -> Result<()> {
        self.set_dim(self.op.output(param)?, dims)
    }

    pub fn set_outputs_dim(&self, param: &str, dims: &[Vec<usize>]) -> Result<()> {
        let names = self.op.outputs(param)?;
        if names.len() != dims.len() {
            return Err(kore_core::KoreError::ShapeMismatch {
                expected: vec![names.len()],
                got: vec![dims.len()],
            }
            .into());
        }
        for (name, d) in names.iter().zip(dims) {
            if name != EMPTY_VAR_NAME {
                self.set_dim(name, d)?;
            }
        }
        Ok(())
    }

    /// Give output `out` the dims of input `input`.
    pub fn share_dim(&self, input: &str, out: &str) -> Result<()> {
        let dims = self.input_dim(input)?;
        self.set_output_dim(out, &dims)
    }

    fn find(&self, name: &str) -> Result<VarHandle> {
        self.scope
            .find_var(name)
            .ok_or_else(|| FrameworkError::VariableNotFound(name.to_string()))
    }

    fn dim_of(&self, name: &str) -> Result<Vec<usize>> {
        let var = self.find(name)?;
        let var = var.read();
        match var.value() {
            Some(VarValue::Tensor(t)) => Ok(t.dims().to_vec()),
            Some(VarValue::SelectedRows(sr)) => {
                let mut dims = vec![sr.height().max(0) as usize];
                dims.extend(sr.value().dims().iter().skip(1));
                Ok(dims)
            }
            None => Err(FrameworkError::EmptyVariable),
        }
    }

    fn set_dim(&self, name: &str, dims: &[usize]) -> Result<()> {
        let var = self.find(name)?;
        let mut var = var.write();
        if var.is_selected_rows() {
            var.get_mutable_selected_rows()?.value_mut().resize(dims);
        } else {
            var.get_mutable_tensor()?.resize(dims);
        }
        Ok(())
    }
}
