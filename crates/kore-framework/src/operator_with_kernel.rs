//! Kernel dispatch: shape inference, kernel selection, input conversion,
//! execution and in-place reconciliation.

use std::collections::HashSet;
use std::sync::Arc;

use kore_core::{DType, Device, Tensor};

use crate::data_transform::{copy_variable_with_tensor, data_transform};
use crate::device_context::DeviceContextPool;
use crate::error::FrameworkError;
use crate::execution_context::ExecutionContext;
use crate::flags;
use crate::infer_shape::RuntimeInferShapeContext;
use crate::kernel::OpKernel;
use crate::kernel_type::{need_transform, OpKernelType};
use crate::operator::{Operator, OperatorBase};
use crate::registry::OpRegistry;
use crate::scope::Scope;
use crate::variable::VarValue;
use crate::Result;

/// Per-operator hooks driving [`OperatorWithKernel`].
pub trait KernelOp: Send + Sync + 'static {
    /// Set output dims from input dims and attributes. Must not read tensor data.
    fn infer_shape(&self, ctx: &RuntimeInferShapeContext<'_>) -> Result<()>;

    /// Signature of the kernel to run. Defaults to the inputs' common data
    /// type on the calling context's place.
    fn expected_kernel_type(&self, ctx: &ExecutionContext<'_>) -> Result<OpKernelType> {
        Ok(OpKernelType::new(indicate_data_type(ctx)?, ctx.place()))
    }

    /// Signature describing the data bound to input parameter `param`.
    /// Defaults to the expected data type with the tensor's own place and layout.
    fn kernel_type_for_var(&self, _param: &str, tensor: &Tensor, expected: &OpKernelType) -> Result<OpKernelType> {
        Ok(OpKernelType::new(expected.data_type, tensor.place()?).with_layout(tensor.layout()))
    }
}

/// The data type shared by every bound input.
///
/// Dense tensors and selected-rows values both count. Fails when inputs
/// disagree or when no input carries a value.
pub fn indicate_data_type(ctx: &ExecutionContext<'_>) -> Result<DType> {
    let op_type = ctx.op().type_();
    let mut found: Option<DType> = None;
    for name in ctx.op().inputs_map().values().flatten() {
        let Some(var) = ctx.scope().find_var(name) else {
            continue;
        };
        let var = var.read();
        let Some(value) = var.value() else {
            continue;
        };
        let dtype = value.tensor().dtype()?;
        match found {
            Some(first) if first != dtype => {
                return Err(FrameworkError::InconsistentDataType {
                    op_type: op_type.to_string(),
                    first,
                    second: dtype,
                })
            }
            _ => found = Some(dtype),
        }
    }
    found.ok_or_else(|| FrameworkError::DataTypeNotIndicated(op_type.to_string()))
}

/// Operator whose work is done by a registered kernel.
pub struct OperatorWithKernel<H> {
    base: OperatorBase,
    hooks: H,
    registry: Arc<OpRegistry>,
}

impl<H: KernelOp> OperatorWithKernel<H> {
    pub fn new(base: OperatorBase, hooks: H, registry: Arc<OpRegistry>) -> Self {
        Self { base, hooks, registry }
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Convert every initialized tensor-bearing input whose signature differs
    /// from `expected` into a variable of the same name in a child scope.
    /// Selected rows are converted through their row values.
    ///
    /// Returns the child scope (if any conversion happened) and the
    /// converted names that are also outputs.
    fn prepare_data(&self, scope: &Arc<Scope>, expected: &OpKernelType) -> Result<(Option<Arc<Scope>>, Vec<String>)> {
        let outputs: HashSet<String> = self.base.output_vars().into_iter().collect();
        let mut transfer_scope: Option<Arc<Scope>> = None;
        let mut inplace_vars = Vec::new();

        for (param, names) in self.base.inputs_map() {
            for name in names {
                let Some(var) = scope.find_var(name) else {
                    continue;
                };
                let var = var.read();
                let Some(value) = var.value() else {
                    continue;
                };
                let tensor = value.tensor();
                if !tensor.is_initialized() {
                    continue;
                }
                let actual = self.hooks.kernel_type_for_var(param, tensor, expected)?;
                if !need_transform(&actual, expected) {
                    continue;
                }
                if outputs.contains(name) {
                    inplace_vars.push(name.clone());
                }
                tracing::debug!("Transform variable {} from {} to {}", name, actual, expected);

                let out = data_transform(expected, &actual, tensor)?;
                let trans_var = transfer_scope
                    .get_or_insert_with(|| scope.new_scope())
                    .var(name);
                copy_variable_with_tensor(&var, out, &mut trans_var.write())?;
            }
        }
        Ok((transfer_scope, inplace_vars))
    }

    /// Make the original variable `name` alias the converted tensor. For
    /// selected rows only the row values are shared.
    fn share_back(&self, scope: &Scope, transfer_scope: &Scope, name: &str) -> Result<()> {
        let converted = transfer_scope
            .find_local_var(name)
            .ok_or_else(|| FrameworkError::VariableNotFound(name.to_string()))?;
        let converted = converted
            .read()
            .value()
            .map(|v| v.tensor().clone())
            .ok_or(FrameworkError::EmptyVariable)?;

        let original = scope
            .find_var(name)
            .ok_or_else(|| FrameworkError::VariableNotFound(name.to_string()))?;
        let mut original = original.write();
        let original = if original.is_selected_rows() {
            original.get_mutable_selected_rows()?.value_mut()
        } else {
            original.get_mutable_tensor()?
        };

        if let (Ok(from), Ok(to)) = (original.place(), converted.place()) {
            if !from.is_same_class(&to) {
                tracing::warn!(
                    "{}: not sharing in-place var {} across places ({} -> {})",
                    self.base.type_(),
                    name,
                    to,
                    from
                );
                return Ok(());
            }
        }
        tracing::debug!("share inplace var {} back to its original scope", name);
        original.share_data_with(&converted);
        Ok(())
    }

    /// Everything after kernel selection. The transfer scope, if any, is
    /// still attached to `scope` while this runs.
    fn run_selected(
        &self,
        scope: &Arc<Scope>,
        transfer_scope: Option<&Scope>,
        inplace_vars: &[String],
        kernel: &dyn OpKernel,
        expected: &OpKernelType,
    ) -> Result<()> {
        let exec_scope: &Scope = transfer_scope.unwrap_or(scope.as_ref());
        let exec_dev_ctx = DeviceContextPool::instance().get(expected.place)?;
        kernel.compute(&ExecutionContext::new(&self.base, exec_scope, exec_dev_ctx.as_ref()))?;

        for name in inplace_vars {
            self.share_back(scope, exec_scope, name)?;
        }

        if flags::benchmark() {
            exec_dev_ctx.wait();
        }
        if flags::check_nan_inf() {
            self.check_nan_inf(exec_scope)?;
        }
        Ok(())
    }

    fn check_nan_inf(&self, scope: &Scope) -> Result<()> {
        for name in self.base.output_vars() {
            let Some(var) = scope.find_var(&name) else {
                continue;
            };
            let var = var.read();
            if let Some(VarValue::Tensor(tensor)) = var.value() {
                check_tensor_nan_inf(self.base.type_(), &name, tensor)?;
            }
        }
        Ok(())
    }
}

/// Fails if a floating-point tensor holds Inf (reported first) or NaN.
/// Half-precision values are widened to f64 before the scan.
fn check_tensor_nan_inf(op_type: &str, name: &str, tensor: &Tensor) -> Result<()> {
    if !tensor.is_initialized() {
        return Ok(());
    }
    let (has_inf, has_nan) = match tensor.dtype()? {
        DType::F32 => scan(tensor.as_slice::<f32>()?.iter().map(|&v| v as f64)),
        DType::F64 => scan(tensor.as_slice::<f64>()?.iter().copied()),
        dtype if dtype.is_float() => {
            let wide = tensor.cast(DType::F64)?;
            scan(wide.as_slice::<f64>()?.iter().copied())
        }
        _ => return Ok(()),
    };
    let kind = if has_inf {
        "Inf"
    } else if has_nan {
        "NaN"
    } else {
        return Ok(());
    };
    Err(FrameworkError::NanOrInf {
        op_type: op_type.to_string(),
        var: name.to_string(),
        kind,
    })
}

fn scan(values: impl Iterator<Item = f64>) -> (bool, bool) {
    values.fold((false, false), |(inf, nan), v| (inf || v.is_infinite(), nan || v.is_nan()))
}

impl<H: KernelOp> Operator for OperatorWithKernel<H> {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn supports_gpu(&self) -> bool {
        self.registry.op_support_gpu(self.base.type_())
    }

    fn run_impl(&self, scope: &Arc<Scope>, place: Device) -> Result<()> {
        let op_type = self.base.type_();

        let infer_ctx = RuntimeInferShapeContext::new(&self.base, scope);
        self.hooks.infer_shape(&infer_ctx)?;

        let pool = DeviceContextPool::instance();
        let dev_ctx = pool.get(place)?;

        let kernels = self
            .registry
            .kernels_for(op_type)
            .ok_or_else(|| FrameworkError::NoKernelsRegistered(op_type.to_string()))?;

        let ctx = ExecutionContext::new(&self.base, scope, dev_ctx.as_ref());
        let expected = self.hooks.expected_kernel_type(&ctx)?;
        tracing::debug!("expected_kernel_key: {}", expected);

        let kernel = kernels
            .get(&expected)
            .ok_or_else(|| FrameworkError::NoKernelForSignature {
                op_type: op_type.to_string(),
                kernel_type: expected.to_string(),
            })?;

        let (transfer_scope, inplace_vars) = self.prepare_data(scope, &expected)?;
        let result = self.run_selected(
            scope,
            transfer_scope.as_deref(),
            &inplace_vars,
            &**kernel,
            &expected,
        );
        if let Some(kid) = &transfer_scope {
            scope.delete_scope(kid);
        }
        result
    }
}
