//! Conversions that bring a tensor from the representation it has to the one
//! a kernel expects: layout first, then data type, then place.

use kore_core::{need_transform_layout, DataLayout, KoreError, Tensor};

use crate::error::FrameworkError;
use crate::kernel_type::OpKernelType;
use crate::variable::{VarValue, Variable};
use crate::Result;

/// Convert `input`, described by `actual`, to match `expected`.
///
/// Fails if no conversion applies.
pub fn data_transform(expected: &OpKernelType, actual: &OpKernelType, input: &Tensor) -> Result<Tensor> {
    let mut out = input.clone();
    let mut transformed = false;

    if need_transform_layout(actual.data_layout, expected.data_layout) {
        out = trans_data_layout(actual, expected, &out)?;
        transformed = true;
    }

    if actual.data_type != expected.data_type {
        out = out.cast(expected.data_type)?;
        transformed = true;
    }

    if !actual.place.is_same_class(&expected.place) {
        out = out.to_device(expected.place)?;
        transformed = true;
    }

    if !transformed {
        return Err(FrameworkError::Unimplemented(format!(
            "no transform applies from {actual} to {expected}"
        )));
    }
    Ok(out)
}

/// Axis order that rearranges `from` into `to`.
fn layout_axes(from: DataLayout, to: DataLayout) -> Result<[usize; 4]> {
    match (from, to) {
        (DataLayout::Nchw, DataLayout::Nhwc) => Ok([0, 2, 3, 1]),
        (DataLayout::Nhwc, DataLayout::Nchw) => Ok([0, 3, 1, 2]),
        _ => Err(KoreError::UnsupportedLayout { from, to }.into()),
    }
}

/// Permute a 4-D tensor between `NHWC` and `NCHW` on its current place.
pub fn trans_data_layout(
    kernel_type_for_var: &OpKernelType,
    expected: &OpKernelType,
    input: &Tensor,
) -> Result<Tensor> {
    if !kernel_type_for_var.place.is_same_class(&expected.place) {
        return Err(FrameworkError::Unimplemented(format!(
            "layout transform across places ({} -> {})",
            kernel_type_for_var.place, expected.place
        )));
    }
    if input.ndim() != 4 {
        return Err(FrameworkError::Unimplemented(format!(
            "layout transform of a {}-D tensor",
            input.ndim()
        )));
    }
    let axes = layout_axes(kernel_type_for_var.data_layout, expected.data_layout)?;
    let mut out = input.permute(&axes)?;
    out.set_layout(expected.data_layout);
    Ok(out)
}

/// Store `tensor` into `dst`, keeping the kind of `src`. Selected rows keep
/// their rows and height; only the row values are replaced.
pub fn copy_variable_with_tensor(src: &Variable, tensor: Tensor, dst: &mut Variable) -> Result<()> {
    match src.value() {
        Some(VarValue::Tensor(_)) => {
            *dst.get_mutable_tensor()? = tensor;
        }
        Some(VarValue::SelectedRows(sr)) => {
            let out = dst.get_mutable_selected_rows()?;
            out.set_rows(sr.rows().to_vec());
            out.set_height(sr.height());
            *out.value_mut() = tensor;
        }
        None => return Err(FrameworkError::EmptyVariable),
    }
    Ok(())
}
