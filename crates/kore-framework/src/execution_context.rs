//! The view a kernel gets of its operator, scope and device for one call.

use kore_core::{Device, Tensor};

use crate::attribute::FromAttribute;
use crate::device_context::DeviceContext;
use crate::error::FrameworkError;
use crate::operator::{OperatorBase, EMPTY_VAR_NAME};
use crate::scope::{Scope, VarHandle};
use crate::Result;

/// Borrowed view binding an operator, a scope and a device context.
///
/// Lookups resolve through the scope chain; names bound to
/// [`EMPTY_VAR_NAME`] resolve to `None`.
pub struct ExecutionContext<'a> {
    op: &'a OperatorBase,
    scope: &'a Scope,
    device_context: &'a dyn DeviceContext,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(op: &'a OperatorBase, scope: &'a Scope, device_context: &'a dyn DeviceContext) -> Self {
        Self {
            op,
            scope,
            device_context,
        }
    }

    pub fn op(&self) -> &'a OperatorBase {
        self.op
    }

    pub fn scope(&self) -> &'a Scope {
        self.scope
    }

    pub fn device_context(&self) -> &'a dyn DeviceContext {
        self.device_context
    }

    pub fn place(&self) -> Device {
        self.device_context.place()
    }

    pub fn attr<T: FromAttribute>(&self, name: &str) -> Result<T> {
        self.op.attr(name)
    }

    pub fn inputs(&self, param: &str) -> Result<&'a [String]> {
        self.op.inputs(param)
    }

    pub fn outputs(&self, param: &str) -> Result<&'a [String]> {
        self.op.outputs(param)
    }

    // =========================================================================
    // Existence
    // =========================================================================

    /// Whether `param` is bound to exactly one variable present in scope.
    ///
    /// Fails when more than one variable is bound.
    pub fn has_input(&self, param: &str) -> Result<bool> {
        let names = self.op.has_inputs(param).then(|| self.op.inputs_map()[param].as_slice());
        bound_var_exists(self.scope, self.op.type_(), param, names)
    }

    pub fn has_output(&self, param: &str) -> Result<bool> {
        let names = self.op.has_outputs(param).then(|| self.op.outputs_map()[param].as_slice());
        bound_var_exists(self.scope, self.op.type_(), param, names)
    }

    pub fn input_size(&self, param: &str) -> Result<usize> {
        Ok(self.op.inputs(param)?.len())
    }

    pub fn output_size(&self, param: &str) -> Result<usize> {
        Ok(self.op.outputs(param)?.len())
    }

    // =========================================================================
    // Variables
    // =========================================================================

    pub fn input_var(&self, param: &str) -> Result<Option<VarHandle>> {
        Ok(self.resolve(self.op.input(param)?))
    }

    pub fn output_var(&self, param: &str) -> Result<Option<VarHandle>> {
        Ok(self.resolve(self.op.output(param)?))
    }

    pub fn multi_input_var(&self, param: &str) -> Result<Vec<Option<VarHandle>>> {
        Ok(self.op.inputs(param)?.iter().map(|n| self.resolve(n)).collect())
    }

    pub fn multi_output_var(&self, param: &str) -> Result<Vec<Option<VarHandle>>> {
        Ok(self.op.outputs(param)?.iter().map(|n| self.resolve(n)).collect())
    }

    fn resolve(&self, name: &str) -> Option<VarHandle> {
        if name == EMPTY_VAR_NAME {
            None
        } else {
            self.scope.find_var(name)
        }
    }

    // =========================================================================
    // Tensors
    // =========================================================================

    /// The dense tensor bound to input `param`. The returned handle shares
    /// storage with the variable.
    pub fn input_tensor(&self, param: &str) -> Result<Option<Tensor>> {
        match self.input_var(param)? {
            Some(var) => Ok(Some(var.read().get_tensor()?.clone())),
            None => Ok(None),
        }
    }

    pub fn multi_input_tensor(&self, param: &str) -> Result<Vec<Option<Tensor>>> {
        self.multi_input_var(param)?
            .into_iter()
            .map(|var| match var {
                Some(var) => Ok(Some(var.read().get_tensor()?.clone())),
                None => Ok(None),
            })
            .collect()
    }

    /// The dense tensor currently bound to output `param`, created empty if
    /// the variable holds nothing yet.
    pub fn output_tensor(&self, param: &str) -> Result<Option<Tensor>> {
        match self.output_var(param)? {
            Some(var) => Ok(Some(var.write().get_mutable_tensor()?.clone())),
            None => Ok(None),
        }
    }

    /// Store `tensor` into the variable bound to output `param`.
    pub fn set_output_tensor(&self, param: &str, tensor: Tensor) -> Result<()> {
        let name = self.op.output(param)?;
        let var = self
            .resolve(name)
            .ok_or_else(|| FrameworkError::VariableNotFound(name.to_string()))?;
        *var.write().get_mutable_tensor()? = tensor;
        Ok(())
    }
}

/// Shared `HasInput`/`HasOutput` rule: unbound, empty, placeholder or
/// missing-from-scope all count as absent.
pub(crate) fn bound_var_exists(
    scope: &Scope,
    op_type: &str,
    param: &str,
    names: Option<&[String]>,
) -> Result<bool> {
    let names = match names {
        Some(names) if !names.is_empty() => names,
        _ => return Ok(false),
    };
    if names.len() > 1 {
        return Err(FrameworkError::MultipleArguments {
            op_type: op_type.to_string(),
            param: param.to_string(),
            count: names.len(),
        });
    }
    let name = &names[0];
    Ok(name != EMPTY_VAR_NAME && scope.find_var(name).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{Attribute, AttributeMap};
    use crate::device_context::CpuDeviceContext;
    use crate::op_desc::VariableNameMap;
    use crate::operator::TempVarNames;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn base() -> OperatorBase {
        let mut inputs = VariableNameMap::new();
        inputs.insert("X".into(), names(&["x"]));
        inputs.insert("Xs".into(), names(&["x", EMPTY_VAR_NAME, "ghost"]));
        inputs.insert("Bias".into(), names(&[EMPTY_VAR_NAME]));
        inputs.insert("None".into(), vec![]);
        let mut outputs = VariableNameMap::new();
        outputs.insert("Out".into(), names(&["out"]));
        let mut attrs = AttributeMap::new();
        attrs.insert("axis".into(), Attribute::Int(1));
        OperatorBase::new("ctx_op", inputs, outputs, attrs, &TempVarNames::new())
    }

    #[test]
    fn test_has_input() {
        let op = base();
        let scope = Scope::new();
        *scope.var("x").write().get_mutable_tensor().unwrap() = Tensor::from_f32(&[1.0], &[1]).unwrap();
        let dev = CpuDeviceContext::new();
        let ctx = ExecutionContext::new(&op, &scope, &dev);

        assert!(ctx.has_input("X").unwrap());
        assert!(!ctx.has_input("Bias").unwrap());
        assert!(!ctx.has_input("None").unwrap());
        assert!(!ctx.has_input("Unbound").unwrap());
        assert!(ctx.has_input("Xs").is_err());
        assert!(!ctx.has_output("Out").unwrap());
        assert_eq!(ctx.input_size("Xs").unwrap(), 3);
        assert_eq!(ctx.attr::<i32>("axis").unwrap(), 1);
        assert_eq!(ctx.place(), Device::Cpu);
    }

    #[test]
    fn test_tensor_access() {
        let op = base();
        let scope = Scope::new();
        let x = Tensor::from_f32(&[1.0, 2.0], &[2]).unwrap();
        *scope.var("x").write().get_mutable_tensor().unwrap() = x.clone();
        scope.var("out");
        let dev = CpuDeviceContext::new();
        let ctx = ExecutionContext::new(&op, &scope, &dev);

        let got = ctx.input_tensor("X").unwrap().unwrap();
        assert!(got.shares_storage_with(&x));
        assert!(ctx.input_tensor("Bias").unwrap().is_none());

        let multi = ctx.multi_input_tensor("Xs").unwrap();
        assert_eq!(multi.len(), 3);
        assert!(multi[0].is_some());
        assert!(multi[1].is_none());
        assert!(multi[2].is_none());

        ctx.set_output_tensor("Out", got.cast(kore_core::DType::F64).unwrap()).unwrap();
        let out = ctx.output_tensor("Out").unwrap().unwrap();
        assert_eq!(out.to_vec::<f64>().unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_missing_output_var() {
        let op = base();
        let scope = Scope::new();
        let dev = CpuDeviceContext::new();
        let ctx = ExecutionContext::new(&op, &scope, &dev);
        let err = ctx.set_output_tensor("Out", Tensor::new()).unwrap_err();
        assert!(matches!(err, FrameworkError::VariableNotFound(ref n) if n == "out"));
    }
}
