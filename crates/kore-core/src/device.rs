use std::fmt;

/// Place where tensor memory lives and where kernels execute.
///
/// Places are grouped into classes (see [`Device::which`]): every CUDA
/// device belongs to the same class regardless of its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Device {
    /// Host memory
    #[default]
    Cpu,
    /// CUDA GPU with device index
    Cuda(usize),
    /// Page-locked host memory used for fast host/device copies
    CudaPinned,
}

impl Device {
    /// Class ordinal of this place: 0 = CPU, 1 = CUDA, 2 = pinned host.
    pub fn which(&self) -> usize {
        match self {
            Device::Cpu => 0,
            Device::Cuda(_) => 1,
            Device::CudaPinned => 2,
        }
    }

    /// Whether two places belong to the same class, ignoring device index.
    pub fn is_same_class(&self, other: &Device) -> bool {
        self.which() == other.which()
    }

    /// Whether this is a CPU place.
    pub fn is_cpu(&self) -> bool {
        matches!(self, Device::Cpu)
    }

    /// Whether this is a CUDA place.
    pub fn is_cuda(&self) -> bool {
        matches!(self, Device::Cuda(_))
    }

    /// Whether this is pinned host memory.
    pub fn is_cuda_pinned(&self) -> bool {
        matches!(self, Device::CudaPinned)
    }

    /// Get the CUDA device index, if applicable.
    pub fn cuda_index(&self) -> Option<usize> {
        match self {
            Device::Cuda(idx) => Some(*idx),
            _ => None,
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(idx) => write!(f, "cuda:{idx}"),
            Device::CudaPinned => write!(f, "cuda_pinned"),
        }
    }
}
