use std::collections::HashMap;

use crate::execution_context::ExecutionContext;
use crate::kernel_type::OpKernelType;
use crate::Result;

/// A concrete implementation of one operator for one kernel signature.
///
/// Any `Fn(&ExecutionContext) -> Result<()>` closure is a kernel.
pub trait OpKernel: Send + Sync {
    fn compute(&self, ctx: &ExecutionContext<'_>) -> Result<()>;
}

impl<F> OpKernel for F
where
    F: Fn(&ExecutionContext<'_>) -> Result<()> + Send + Sync,
{
    fn compute(&self, ctx: &ExecutionContext<'_>) -> Result<()> {
        self(ctx)
    }
}

/// Kernels of one operator type, keyed by signature.
pub type OpKernelMap = HashMap<OpKernelType, Box<dyn OpKernel>>;
