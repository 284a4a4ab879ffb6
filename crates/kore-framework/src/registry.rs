//! Operator and kernel registry.
//!
//! Registration happens once through [`OpRegistryBuilder`]; [`OpRegistryBuilder::build`]
//! freezes the tables into an [`OpRegistry`] shared as `Arc` and read without
//! locking at dispatch time. Operators created by the registry hold an `Arc`
//! back to it for kernel lookup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::attribute::{AttributeMap, OpAttrChecker};
use crate::error::FrameworkError;
use crate::execution_context::ExecutionContext;
use crate::kernel::{OpKernel, OpKernelMap};
use crate::kernel_type::OpKernelType;
use crate::op_desc::{OpDesc, OpDescProto, VariableNameMap};
use crate::operator::{Operator, OperatorBase, TempVarNames};
use crate::operator_with_kernel::{KernelOp, OperatorWithKernel};
use crate::Result;

/// Instantiates an operator from resolved bindings and checked attributes.
pub type OpCreator = Arc<dyn Fn(OperatorBase, &Arc<OpRegistry>) -> Box<dyn Operator> + Send + Sync>;

/// Everything the registry knows about one operator type.
pub struct OpInfo {
    creator: OpCreator,
    checker: OpAttrChecker,
}

impl OpInfo {
    pub fn creator(&self) -> &OpCreator {
        &self.creator
    }

    pub fn checker(&self) -> &OpAttrChecker {
        &self.checker
    }
}

impl fmt::Debug for OpInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpInfo({:?})", self.checker)
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Single writer for the registry tables.
#[derive(Default)]
pub struct OpRegistryBuilder {
    infos: HashMap<String, OpInfo>,
    kernels: HashMap<String, OpKernelMap>,
}

impl OpRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_op<C>(&mut self, op_type: &str, creator: C, checker: OpAttrChecker) -> Result<&mut Self>
    where
        C: Fn(OperatorBase, &Arc<OpRegistry>) -> Box<dyn Operator> + Send + Sync + 'static,
    {
        if self.infos.contains_key(op_type) {
            return Err(FrameworkError::DuplicateOp(op_type.to_string()));
        }
        self.infos.insert(
            op_type.to_string(),
            OpInfo {
                creator: Arc::new(creator),
                checker,
            },
        );
        Ok(self)
    }

    /// Register an operator dispatched through [`OperatorWithKernel`] with hooks `H`.
    pub fn register_kernel_op<H>(&mut self, op_type: &str, checker: OpAttrChecker) -> Result<&mut Self>
    where
        H: KernelOp + Default,
    {
        self.register_op(
            op_type,
            |base: OperatorBase, registry: &Arc<OpRegistry>| -> Box<dyn Operator> {
                Box::new(OperatorWithKernel::new(base, H::default(), Arc::clone(registry)))
            },
            checker,
        )
    }

    /// Add a kernel for `(op_type, key)`. Each pair may be registered once.
    pub fn register_kernel<K>(&mut self, op_type: &str, key: OpKernelType, kernel: K) -> Result<&mut Self>
    where
        K: OpKernel + 'static,
    {
        let kernels = self.kernels.entry(op_type.to_string()).or_default();
        if kernels.contains_key(&key) {
            return Err(FrameworkError::DuplicateKernel {
                op_type: op_type.to_string(),
                kernel_type: key.to_string(),
            });
        }
        kernels.insert(key, Box::new(kernel));
        Ok(self)
    }

    /// [`OpRegistryBuilder::register_kernel`] for a plain closure.
    pub fn register_kernel_fn<F>(&mut self, op_type: &str, key: OpKernelType, f: F) -> Result<&mut Self>
    where
        F: Fn(&ExecutionContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.register_kernel(op_type, key, f)
    }

    pub fn build(self) -> Arc<OpRegistry> {
        let kernel_count: usize = self.kernels.values().map(HashMap::len).sum();
        tracing::info!(
            "Kore op registry ready: {} operators, {} kernels",
            self.infos.len(),
            kernel_count
        );
        Arc::new(OpRegistry {
            infos: self.infos,
            kernels: self.kernels,
            temp_names: TempVarNames::new(),
        })
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Read-only operator and kernel tables.
pub struct OpRegistry {
    infos: HashMap<String, OpInfo>,
    kernels: HashMap<String, OpKernelMap>,
    temp_names: TempVarNames,
}

impl OpRegistry {
    /// Operator type → (signature → kernel).
    pub fn all_op_kernels(&self) -> &HashMap<String, OpKernelMap> {
        &self.kernels
    }

    pub fn kernels_for(&self, op_type: &str) -> Option<&OpKernelMap> {
        self.kernels.get(op_type)
    }

    pub fn has_op(&self, op_type: &str) -> bool {
        self.infos.contains_key(op_type)
    }

    pub fn op_info(&self, op_type: &str) -> Result<&OpInfo> {
        self.infos
            .get(op_type)
            .ok_or_else(|| FrameworkError::UnregisteredOp(op_type.to_string()))
    }

    /// Whether any kernel of `op_type` runs on a CUDA place.
    pub fn op_support_gpu(&self, op_type: &str) -> bool {
        self.kernels_for(op_type)
            .is_some_and(|kernels| kernels.keys().any(|k| k.place.is_cuda()))
    }

    pub fn temp_names(&self) -> &TempVarNames {
        &self.temp_names
    }

    /// Check attributes (filling defaults) and instantiate the operator.
    pub fn create_op_with(
        self: &Arc<Self>,
        op_type: &str,
        inputs: VariableNameMap,
        outputs: VariableNameMap,
        mut attrs: AttributeMap,
    ) -> Result<Box<dyn Operator>> {
        let info = self.op_info(op_type)?;
        info.checker.check(op_type, &mut attrs)?;
        let base = OperatorBase::new(op_type, inputs, outputs, attrs, &self.temp_names);
        Ok((info.creator)(base, self))
    }

    pub fn create_op(self: &Arc<Self>, desc: &OpDesc) -> Result<Box<dyn Operator>> {
        self.create_op_with(
            desc.type_(),
            desc.inputs().clone(),
            desc.outputs().clone(),
            desc.attr_map().clone(),
        )
    }

    pub fn create_op_from_proto(self: &Arc<Self>, proto: &OpDescProto) -> Result<Box<dyn Operator>> {
        self.create_op(&OpDesc::from_proto(proto))
    }
}

impl fmt::Debug for OpRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ops: Vec<&String> = self.infos.keys().collect();
        ops.sort();
        write!(f, "OpRegistry(ops={:?})", ops)
    }
}
