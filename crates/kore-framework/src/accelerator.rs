//! Acceleration backend tags.

use std::fmt;
use std::str::FromStr;

use kore_core::KoreError;

const ACCELERATOR_NAMES: [&str; 3] = ["PLAIN", "MKLDNN", "CUDNN"];

/// Implementation family a kernel belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Accelerator {
    /// Reference implementation
    #[default]
    Plain = 0,
    /// Intel MKL-DNN optimized kernels (CPU)
    MklDnn = 1,
    /// NVIDIA cuDNN optimized kernels (CUDA)
    Cudnn = 2,
}

impl Accelerator {
    pub const ALL: [Accelerator; 3] = [Accelerator::Plain, Accelerator::MklDnn, Accelerator::Cudnn];

    /// Stable ordinal, used for kernel hashing.
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }
}

impl FromStr for Accelerator {
    type Err = KoreError;

    /// Parses case-insensitively. Plain device names (`CPU`, `CUDA`) select
    /// the reference implementation.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.to_ascii_uppercase();
        if key == "CPU" || key == "CUDA" {
            return Ok(Accelerator::Plain);
        }
        ACCELERATOR_NAMES
            .iter()
            .position(|name| *name == key)
            .map(|i| Self::ALL[i])
            .ok_or_else(|| KoreError::UnknownEnumerator {
                kind: "Accelerator",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ACCELERATOR_NAMES[*self as usize])
    }
}
