//! Operator identity, bindings and the `Run` entry point.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kore_core::Device;

use crate::attribute::{get_attr, AttributeMap, FromAttribute};
use crate::device_context::set_device_id;
use crate::error::FrameworkError;
use crate::op_desc::VariableNameMap;
use crate::scope::Scope;
use crate::variable::VarValue;
use crate::Result;

/// Placeholder meaning "no variable bound here".
pub const EMPTY_VAR_NAME: &str = "@EMPTY@";

/// Output name asking for a freshly generated temporary.
pub const TEMP_VAR_NAME: &str = "@TEMP@";

/// Source of unique temporary variable names.
///
/// Safe to share between threads constructing operators concurrently.
#[derive(Debug, Default)]
pub struct TempVarNames {
    counter: AtomicUsize,
}

impl TempVarNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// `@TEMP@<op_type>@<n>` with a process-unique `n`.
    pub fn next(&self, op_type: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{TEMP_VAR_NAME}{op_type}@{n}")
    }
}

/// Identity, bindings and attributes shared by every operator.
#[derive(Debug, Clone)]
pub struct OperatorBase {
    type_: String,
    inputs: VariableNameMap,
    outputs: VariableNameMap,
    attrs: AttributeMap,
}

impl OperatorBase {
    /// Output names equal to [`TEMP_VAR_NAME`] are replaced by generated ones.
    pub fn new(
        type_: impl Into<String>,
        inputs: VariableNameMap,
        mut outputs: VariableNameMap,
        attrs: AttributeMap,
        temp_names: &TempVarNames,
    ) -> Self {
        let type_ = type_.into();
        for name in outputs.values_mut().flatten() {
            if name == TEMP_VAR_NAME {
                *name = temp_names.next(&type_);
            }
        }
        Self {
            type_,
            inputs,
            outputs,
            attrs,
        }
    }

    pub fn type_(&self) -> &str {
        &self.type_
    }

    pub fn inputs_map(&self) -> &VariableNameMap {
        &self.inputs
    }

    pub fn outputs_map(&self) -> &VariableNameMap {
        &self.outputs
    }

    pub fn attrs(&self) -> &AttributeMap {
        &self.attrs
    }

    pub fn attr<T: FromAttribute>(&self, name: &str) -> Result<T> {
        let attr = self
            .attrs
            .get(name)
            .ok_or_else(|| FrameworkError::MissingAttribute {
                op_type: self.type_.clone(),
                name: name.to_string(),
            })?;
        get_attr(name, attr)
    }

    /// Whether `param` is bound, even to zero variables.
    pub fn has_inputs(&self, param: &str) -> bool {
        self.inputs.contains_key(param)
    }

    pub fn has_outputs(&self, param: &str) -> bool {
        self.outputs.contains_key(param)
    }

    /// The single variable bound to input `param`, or [`EMPTY_VAR_NAME`].
    pub fn input(&self, param: &str) -> Result<&str> {
        single(&self.type_, param, self.inputs(param)?)
    }

    pub fn inputs(&self, param: &str) -> Result<&[String]> {
        bound(&self.type_, &self.inputs, param)
    }

    pub fn output(&self, param: &str) -> Result<&str> {
        single(&self.type_, param, self.outputs(param)?)
    }

    pub fn outputs(&self, param: &str) -> Result<&[String]> {
        bound(&self.type_, &self.outputs, param)
    }

    /// All bound input variables, parameters in key order.
    pub fn input_vars(&self) -> Vec<String> {
        self.inputs.values().flatten().cloned().collect()
    }

    pub fn output_vars(&self) -> Vec<String> {
        self.outputs.values().flatten().cloned().collect()
    }

    pub fn debug_string(&self) -> String {
        self.debug_string_ex(None)
    }

    /// Like [`OperatorBase::debug_string`], annotating each variable with its
    /// dims (and row count for selected rows) when `scope` is given.
    pub fn debug_string_ex(&self, scope: Option<&Scope>) -> String {
        let mut out = format!("Op({}), inputs:{{", self.type_);
        write_bindings(&mut out, &self.inputs, scope);
        out.push_str("}, outputs:{");
        write_bindings(&mut out, &self.outputs, scope);
        out.push_str("}.");
        out
    }
}

fn bound<'a>(op_type: &str, map: &'a VariableNameMap, param: &str) -> Result<&'a [String]> {
    map.get(param)
        .map(Vec::as_slice)
        .ok_or_else(|| FrameworkError::MissingParameter {
            op_type: op_type.to_string(),
            param: param.to_string(),
        })
}

fn single<'a>(op_type: &str, param: &str, names: &'a [String]) -> Result<&'a str> {
    match names {
        [] => Ok(EMPTY_VAR_NAME),
        [name] => Ok(name),
        _ => Err(FrameworkError::MultipleArguments {
            op_type: op_type.to_string(),
            param: param.to_string(),
            count: names.len(),
        }),
    }
}

fn write_bindings(out: &mut String, map: &VariableNameMap, scope: Option<&Scope>) {
    for (i, (param, names)) in map.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("{param}["));
        for (j, name) in names.iter().enumerate() {
            if j > 0 {
                out.push_str(", ");
            }
            out.push_str(name);
            if let Some(scope) = scope {
                write_var_summary(out, scope, name);
            }
        }
        out.push(']');
    }
}

fn write_var_summary(out: &mut String, scope: &Scope, name: &str) {
    let Some(var) = scope.find_var(name) else {
        return;
    };
    let var = var.read();
    match var.value() {
        Some(VarValue::SelectedRows(sr)) => {
            out.push_str(&format!("[row_size={}]{}", sr.rows().len(), sr.value().shape()));
        }
        Some(VarValue::Tensor(t)) if t.is_initialized() => {
            out.push_str(&t.shape().to_string());
        }
        _ => {}
    }
}

// =============================================================================
// Operator trait
// =============================================================================

/// An executable operator.
///
/// Implementors supply [`Operator::run_impl`]; callers use [`Operator::run`],
/// which validates the place and binds the active device first.
pub trait Operator: Send + Sync {
    fn base(&self) -> &OperatorBase;

    fn run_impl(&self, scope: &Arc<Scope>, place: Device) -> Result<()>;

    fn supports_gpu(&self) -> bool {
        false
    }

    fn type_(&self) -> &str {
        self.base().type_()
    }

    fn run(&self, scope: &Arc<Scope>, place: Device) -> Result<()> {
        tracing::trace!("{}", self.base().debug_string_ex(Some(scope.as_ref())));
        if let Device::Cuda(id) = place {
            if !cfg!(feature = "cuda") {
                return Err(FrameworkError::UnsupportedPlace(place));
            }
            set_device_id(id);
        }
        self.run_impl(scope, place)?;
        tracing::trace!("{} done", self.base().debug_string_ex(Some(scope.as_ref())));
        Ok(())
    }
}

/// Operator that does nothing when run.
#[derive(Debug, Clone)]
pub struct NopOp {
    base: OperatorBase,
}

impl NopOp {
    pub fn new(base: OperatorBase) -> Self {
        Self { base }
    }
}

impl Operator for NopOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run_impl(&self, _scope: &Arc<Scope>, _place: Device) -> Result<()> {
        Ok(())
    }
}
