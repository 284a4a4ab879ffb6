//! Benchmark: kernel dispatch overhead with and without input conversion.

use std::time::Instant;

use kore_core::{DType, DataLayout, Device, Tensor};
use kore_framework::{
    AttributeMap, ExecutionContext, KernelOp, OpAttrChecker, OpDesc, OpKernelType, OpRegistryBuilder, Operator,
    Result, RuntimeInferShapeContext, Scope, VariableNameMap,
};

#[derive(Default)]
struct Passthrough;

impl KernelOp for Passthrough {
    fn infer_shape(&self, ctx: &RuntimeInferShapeContext<'_>) -> Result<()> {
        ctx.share_dim("X", "Out")
    }
}

#[derive(Default)]
struct Nchw;

impl KernelOp for Nchw {
    fn infer_shape(&self, ctx: &RuntimeInferShapeContext<'_>) -> Result<()> {
        ctx.share_dim("X", "Out")
    }

    fn expected_kernel_type(&self, ctx: &ExecutionContext<'_>) -> Result<OpKernelType> {
        Ok(OpKernelType::new(DType::F32, ctx.place()).with_layout(DataLayout::Nchw))
    }
}

fn copy_kernel(ctx: &ExecutionContext<'_>) -> Result<()> {
    if let Some(x) = ctx.input_tensor("X")? {
        ctx.set_output_tensor("Out", x)?;
    }
    Ok(())
}

fn desc(op_type: &str) -> OpDesc {
    let mut d = OpDesc::new(op_type, VariableNameMap::new(), VariableNameMap::new(), AttributeMap::new());
    d.set_input("X", vec!["x".to_string()]);
    d.set_output("Out", vec!["out".to_string()]);
    d
}

fn bench(op: &dyn Operator, x: &Tensor, iters: usize) -> f64 {
    let start = Instant::now();
    for _ in 0..iters {
        let scope = Scope::new();
        *scope.var("x").write().get_mutable_tensor().unwrap() = x.clone();
        scope.var("out");
        op.run(&scope, Device::Cpu).unwrap();
    }
    start.elapsed().as_secs_f64() / iters as f64
}

fn main() {
    let cpu_f32 = OpKernelType::new(DType::F32, Device::Cpu);
    let mut builder = OpRegistryBuilder::new();
    builder
        .register_kernel_op::<Passthrough>("passthrough", OpAttrChecker::new())
        .unwrap()
        .register_kernel_fn("passthrough", cpu_f32, copy_kernel)
        .unwrap()
        .register_kernel_op::<Nchw>("nchw", OpAttrChecker::new())
        .unwrap()
        .register_kernel_fn("nchw", cpu_f32.with_layout(DataLayout::Nchw), copy_kernel)
        .unwrap();
    let registry = builder.build();

    let passthrough = registry.create_op(&desc("passthrough")).unwrap();
    let nchw = registry.create_op(&desc("nchw")).unwrap();

    println!("=== Kore Dispatch Benchmark ===\n");
    println!("{:<18} {:>12} {:>14} {:>14}", "shape", "elements", "direct (us)", "NHWC->NCHW (us)");
    println!("{}", "-".repeat(62));

    let shapes: &[[usize; 4]] = &[[1, 8, 8, 4], [8, 32, 32, 16], [16, 64, 64, 32]];
    for dims in shapes {
        let numel: usize = dims.iter().product();
        let data: Vec<f32> = (0..numel).map(|i| i as f32).collect();
        let mut x = Tensor::from_f32(&data, dims).unwrap();
        x.set_layout(DataLayout::Nhwc);

        let iters = (1 << 20) / numel.max(1) + 10;
        let direct = bench(passthrough.as_ref(), &x, iters);
        let converted = bench(nchw.as_ref(), &x, iters);
        println!(
            "{:<18} {:>12} {:>14.2} {:>14.2}",
            format!("{:?}", dims),
            numel,
            direct * 1e6,
            converted * 1e6
        );
    }
}
