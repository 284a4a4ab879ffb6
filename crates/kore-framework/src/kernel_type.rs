//! Kernel signatures: the key used to select a kernel.

use std::fmt;
use std::hash::{Hash, Hasher};

use kore_core::{need_transform_layout, DType, DataLayout, Device};

use crate::accelerator::Accelerator;
use crate::device_context::DeviceContext;

/// Kernel preference order, fastest and most specific first.
///
/// Dispatch currently requires an exact signature match and does not consult
/// this list.
pub const KERNEL_PRIORITY: [(Device, Accelerator); 4] = [
    (Device::Cuda(0), Accelerator::Cudnn),
    (Device::Cuda(0), Accelerator::Plain),
    (Device::Cpu, Accelerator::MklDnn),
    (Device::Cpu, Accelerator::Plain),
];

/// Compound key selecting a kernel: data type, layout, place and backend.
///
/// Two signatures are equal when their places belong to the same class
/// (device index is ignored) and every other field matches exactly.
#[derive(Debug, Clone, Copy)]
pub struct OpKernelType {
    pub data_type: DType,
    pub data_layout: DataLayout,
    pub place: Device,
    pub accelerator: Accelerator,
}

impl OpKernelType {
    /// Signature with `AnyLayout` and the plain backend.
    pub fn new(data_type: DType, place: Device) -> Self {
        Self {
            data_type,
            data_layout: DataLayout::AnyLayout,
            place,
            accelerator: Accelerator::Plain,
        }
    }

    /// Signature placed wherever `ctx` runs.
    pub fn from_device_context(data_type: DType, ctx: &dyn DeviceContext) -> Self {
        Self::new(data_type, ctx.place())
    }

    pub fn with_layout(mut self, data_layout: DataLayout) -> Self {
        self.data_layout = data_layout;
        self
    }

    pub fn with_accelerator(mut self, accelerator: Accelerator) -> Self {
        self.accelerator = accelerator;
        self
    }

    /// Packs each field into its own byte of one word.
    ///
    /// Every field ordinal is below 2^8, so distinct signatures never collide.
    pub fn hash_value(&self) -> usize {
        self.place.which()
            + ((self.data_type.proto_id() as usize) << 8)
            + ((self.data_layout.ordinal() as usize) << 16)
            + ((self.accelerator.ordinal() as usize) << 24)
    }
}

impl PartialEq for OpKernelType {
    fn eq(&self, other: &Self) -> bool {
        self.place.is_same_class(&other.place)
            && self.data_type == other.data_type
            && self.data_layout == other.data_layout
            && self.accelerator == other.accelerator
    }
}

impl Eq for OpKernelType {}

impl Hash for OpKernelType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_value().hash(state);
    }
}

impl fmt::Display for OpKernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "data_type[{}]:data_layout[{}]:place[{}]:accelerator[{}]",
            self.data_type, self.data_layout, self.place, self.accelerator
        )
    }
}

pub fn kernel_type_to_string(kernel_type: &OpKernelType) -> String {
    kernel_type.to_string()
}

/// Whether data described by `l` must be converted before a kernel keyed by
/// `r` can consume it.
pub fn need_transform(l: &OpKernelType, r: &OpKernelType) -> bool {
    !l.place.is_same_class(&r.place)
        || l.data_type != r.data_type
        || need_transform_layout(l.data_layout, r.data_layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(k: &OpKernelType) -> u64 {
        let mut h = DefaultHasher::new();
        k.hash(&mut h);
        h.finish()
    }

    #[test]
    fn test_to_string() {
        let k = OpKernelType::new(DType::F32, Device::Cpu)
            .with_layout(DataLayout::Nchw)
            .with_accelerator(Accelerator::MklDnn);
        assert_eq!(
            k.to_string(),
            "data_type[f32]:data_layout[NCHW]:place[cpu]:accelerator[MKLDNN]"
        );
        assert_eq!(kernel_type_to_string(&k), k.to_string());

        let gpu = OpKernelType::new(DType::F64, Device::Cuda(0)).with_accelerator(Accelerator::Cudnn);
        assert_eq!(
            gpu.to_string(),
            "data_type[f64]:data_layout[ANYLAYOUT]:place[cuda:0]:accelerator[CUDNN]"
        );
    }

    #[test]
    fn test_equality_ignores_device_index() {
        let a = OpKernelType::new(DType::F32, Device::Cuda(0));
        let b = OpKernelType::new(DType::F32, Device::Cuda(1));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let cpu = OpKernelType::new(DType::F32, Device::Cpu);
        assert_ne!(a, cpu);
        assert_ne!(cpu, OpKernelType::new(DType::F32, Device::CudaPinned));
    }

    #[test]
    fn test_equality_is_strict_on_other_fields() {
        let base = OpKernelType::new(DType::F32, Device::Cpu);
        assert_ne!(base, OpKernelType::new(DType::F64, Device::Cpu));
        assert_ne!(base, base.with_layout(DataLayout::Nhwc));
        assert_ne!(base, base.with_accelerator(Accelerator::MklDnn));
    }

    #[test]
    fn test_hash_separates_single_field_changes() {
        let base = OpKernelType::new(DType::F32, Device::Cpu);
        let variants = [
            OpKernelType::new(DType::F32, Device::Cuda(0)),
            OpKernelType::new(DType::F64, Device::Cpu),
            base.with_layout(DataLayout::Nchw),
            base.with_accelerator(Accelerator::MklDnn),
        ];
        for v in &variants {
            assert_ne!(base.hash_value(), v.hash_value());
        }

        let mut seen = std::collections::HashSet::new();
        for dtype in DType::ALL {
            for layout in DataLayout::ALL {
                for accel in Accelerator::ALL {
                    for place in [Device::Cpu, Device::Cuda(0), Device::CudaPinned] {
                        let k = OpKernelType::new(dtype, place)
                            .with_layout(layout)
                            .with_accelerator(accel);
                        assert!(seen.insert(k.hash_value()));
                    }
                }
            }
        }
    }

    #[test]
    fn test_need_transform() {
        let nhwc = OpKernelType::new(DType::F32, Device::Cpu).with_layout(DataLayout::Nhwc);
        let nchw = nhwc.with_layout(DataLayout::Nchw);
        let any = nhwc.with_layout(DataLayout::AnyLayout);

        assert!(!need_transform(&nhwc, &nhwc));
        assert!(need_transform(&nhwc, &nchw));
        assert!(!need_transform(&nhwc, &any));
        assert!(!need_transform(&any, &nchw));

        let f64_kernel = OpKernelType::new(DType::F64, Device::Cpu).with_layout(DataLayout::Nhwc);
        assert!(need_transform(&nhwc, &f64_kernel));

        let gpu = OpKernelType::new(DType::F32, Device::Cuda(0)).with_layout(DataLayout::Nhwc);
        assert!(need_transform(&nhwc, &gpu));
        assert!(!need_transform(&gpu, &OpKernelType { place: Device::Cuda(3), ..gpu }));
    }

    #[test]
    fn test_no_self_transform() {
        for dtype in DType::ALL {
            for layout in DataLayout::ALL {
                let k = OpKernelType::new(dtype, Device::Cpu).with_layout(layout);
                assert!(!need_transform(&k, &k));
            }
        }
    }

    #[test]
    fn test_priority_order() {
        assert_eq!(KERNEL_PRIORITY[0], (Device::Cuda(0), Accelerator::Cudnn));
        assert_eq!(KERNEL_PRIORITY[3], (Device::Cpu, Accelerator::Plain));
    }
}
