use std::sync::Arc;

use crate::dtype::Element;
use crate::{DType, Device, KoreError, Result};

/// Shared, reference-counted tensor storage.
///
/// Cloning a `Storage` aliases the same buffer; mutation goes through
/// [`Storage::as_bytes_mut`], which copies on write when the buffer is shared.
/// Buffers for non-CPU places are host-resident mirrors tagged with their place.
#[derive(Debug, Clone)]
pub struct Storage {
    bytes: Arc<Vec<u8>>,
    dtype: DType,
    device: Device,
    /// Number of logical elements (not bytes).
    numel: usize,
}

impl Storage {
    /// Allocate zeroed storage for `numel` elements.
    pub fn zeros(dtype: DType, numel: usize, device: Device) -> Self {
        Self {
            bytes: Arc::new(vec![0u8; dtype.storage_bytes(numel)]),
            dtype,
            device,
            numel,
        }
    }

    /// Wrap raw native-endian bytes.
    pub fn from_bytes(dtype: DType, numel: usize, device: Device, bytes: Vec<u8>) -> Result<Self> {
        let expected = dtype.storage_bytes(numel);
        if bytes.len() != expected {
            return Err(KoreError::StorageError(format!(
                "Expected {} bytes for {} elements of {}, got {}",
                expected,
                numel,
                dtype,
                bytes.len()
            )));
        }
        Ok(Self {
            bytes: Arc::new(bytes),
            dtype,
            device,
            numel,
        })
    }

    /// Copy a typed host slice into new CPU storage.
    pub fn from_slice<T: Element>(data: &[T]) -> Self {
        Self {
            bytes: Arc::new(bytemuck::cast_slice(data).to_vec()),
            dtype: T::DTYPE,
            device: Device::Cpu,
            numel: data.len(),
        }
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn numel(&self) -> usize {
        self.numel
    }

    pub fn nbytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable view of the raw bytes (copy-on-write when shared).
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        Arc::make_mut(&mut self.bytes).as_mut_slice()
    }

    /// Interpret storage as a slice of `T`.
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        self.check_dtype(T::DTYPE)?;
        if self.bytes.is_empty() {
            return Ok(&[]);
        }
        bytemuck::try_cast_slice(self.bytes.as_slice())
            .map_err(|e| KoreError::StorageError(format!("cannot view bytes as {}: {e}", T::DTYPE)))
    }

    /// Interpret storage as a mutable slice of `T` (copy-on-write).
    pub fn as_mut_slice<T: Element>(&mut self) -> Result<&mut [T]> {
        self.check_dtype(T::DTYPE)?;
        let bytes = self.as_bytes_mut();
        if bytes.is_empty() {
            return Ok(&mut []);
        }
        bytemuck::try_cast_slice_mut(bytes)
            .map_err(|e| KoreError::StorageError(format!("cannot view bytes as {}: {e}", T::DTYPE)))
    }

    /// Whether this storage is uniquely owned (no other aliases).
    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.bytes) == 1
    }

    /// Whether two storages alias the same buffer.
    pub fn ptr_eq(&self, other: &Storage) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }

    /// Copy this buffer to `device`. Same-place copies are aliases.
    pub fn to_device(&self, device: Device) -> Storage {
        if self.device == device {
            return self.clone();
        }
        Storage {
            bytes: Arc::new(self.bytes.as_ref().clone()),
            dtype: self.dtype,
            device,
            numel: self.numel,
        }
    }

    /// Element-wise conversion to `dtype`. Same-dtype casts are aliases.
    pub fn cast(&self, dtype: DType) -> Storage {
        if self.dtype == dtype {
            return self.clone();
        }
        let src_size = self.dtype.element_size();
        let dst_size = dtype.element_size();
        let mut out = vec![0u8; dtype.storage_bytes(self.numel)];
        for (src, dst) in self.bytes.chunks_exact(src_size).zip(out.chunks_exact_mut(dst_size)) {
            dtype.write_f64(self.dtype.read_f64(src), dst);
        }
        Storage {
            bytes: Arc::new(out),
            dtype,
            device: self.device,
            numel: self.numel,
        }
    }

    fn check_dtype(&self, expected: DType) -> Result<()> {
        if self.dtype != expected {
            return Err(KoreError::DTypeMismatch {
                expected,
                got: self.dtype,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let s = Storage::zeros(DType::F32, 10, Device::Cpu);
        assert_eq!(s.dtype(), DType::F32);
        assert_eq!(s.device(), Device::Cpu);
        assert_eq!(s.numel(), 10);
        assert_eq!(s.nbytes(), 40);
        assert!(s.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_from_slice() {
        let s = Storage::from_slice(&[1.0f32, 2.0, 3.0]);
        assert_eq!(s.numel(), 3);
        assert_eq!(s.as_slice::<f32>().unwrap(), &[1.0, 2.0, 3.0]);
        assert!(s.as_slice::<f64>().is_err());
    }

    #[test]
    fn test_copy_on_write() {
        let s1 = Storage::from_slice(&[1.0f32, 2.0, 3.0]);
        let mut s2 = s1.clone();
        assert!(s1.ptr_eq(&s2));
        assert!(!s1.is_unique());

        s2.as_mut_slice::<f32>().unwrap()[0] = 99.0;

        assert!(!s1.ptr_eq(&s2));
        assert_eq!(s1.as_slice::<f32>().unwrap()[0], 1.0);
        assert_eq!(s2.as_slice::<f32>().unwrap()[0], 99.0);
    }

    #[test]
    fn test_cast() {
        let s = Storage::from_slice(&[0.0f32, 1.5, -2.0]);
        let d = s.cast(DType::F64);
        assert_eq!(d.dtype(), DType::F64);
        assert_eq!(d.as_slice::<f64>().unwrap(), &[0.0, 1.5, -2.0]);

        let i = s.cast(DType::I32);
        assert_eq!(i.as_slice::<i32>().unwrap(), &[0, 1, -2]);

        assert!(s.cast(DType::F32).ptr_eq(&s));
    }

    #[test]
    fn test_to_device_copies_across_places() {
        let s = Storage::from_slice(&[1i64, 2]);
        assert!(s.to_device(Device::Cpu).ptr_eq(&s));
        let pinned = s.to_device(Device::CudaPinned);
        assert_eq!(pinned.device(), Device::CudaPinned);
        assert!(!pinned.ptr_eq(&s));
        assert_eq!(pinned.as_slice::<i64>().unwrap(), &[1, 2]);
    }

    #[test]
    fn test_from_bytes_validation() {
        assert!(Storage::from_bytes(DType::F32, 3, Device::Cpu, vec![0u8; 11]).is_err());
        assert!(Storage::from_bytes(DType::F32, 3, Device::Cpu, vec![0u8; 12]).is_ok());
    }

    #[test]
    fn test_bytes_mut_detaches_shared_buffer() {
        let s1 = Storage::from_slice(&[1u8, 2, 3]);
        let mut s2 = s1.clone();
        s2.as_bytes_mut()[0] = 9;
        assert_eq!(s1.as_bytes(), &[1, 2, 3]);
        assert_eq!(s2.as_bytes(), &[9, 2, 3]);
        assert!(!s1.ptr_eq(&s2));
    }
}
