use std::fmt;

use crate::dtype::Element;
use crate::{DType, DataLayout, Device, KoreError, Result, Shape, Storage};

/// A dense, contiguous multi-dimensional array.
///
/// A tensor is *initialized* once it holds storage. Cloning aliases the same
/// storage; writes through [`Tensor::as_mut_slice`] copy on write, while
/// [`Tensor::share_data_with`] makes a tensor adopt another's buffer outright.
///
/// # Examples
///
/// ```
/// use kore_core::{DataLayout, Tensor};
///
/// let mut t = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
/// assert_eq!(t.dims(), &[2, 2]);
/// t.set_layout(DataLayout::Nchw);
/// assert_eq!(t.layout(), DataLayout::Nchw);
/// ```
#[derive(Clone, Default)]
pub struct Tensor {
    storage: Option<Storage>,
    shape: Shape,
    layout: DataLayout,
}

impl Tensor {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// An uninitialized tensor with no storage and an empty shape.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy typed host data into a new CPU tensor of shape `dims`.
    pub fn from_slice<T: Element>(data: &[T], dims: &[usize]) -> Result<Self> {
        let shape = Shape::new(dims);
        if shape.numel() != data.len() {
            return Err(KoreError::ShapeMismatch {
                expected: dims.to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(Self {
            storage: Some(Storage::from_slice(data)),
            shape,
            layout: DataLayout::default(),
        })
    }

    /// Create a tensor from f32 data with the given shape.
    pub fn from_f32(data: &[f32], dims: &[usize]) -> Result<Self> {
        Self::from_slice(data, dims)
    }

    /// Create a tensor from f64 data with the given shape.
    pub fn from_f64(data: &[f64], dims: &[usize]) -> Result<Self> {
        Self::from_slice(data, dims)
    }

    /// A zero-filled tensor.
    pub fn zeros(dims: &[usize], dtype: DType, device: Device) -> Self {
        let shape = Shape::new(dims);
        Self {
            storage: Some(Storage::zeros(dtype, shape.numel(), device)),
            shape,
            layout: DataLayout::default(),
        }
    }

    /// Wrap existing storage. The storage must hold exactly `dims.numel()` elements.
    pub fn from_storage(storage: Storage, dims: &[usize], layout: DataLayout) -> Result<Self> {
        let shape = Shape::new(dims);
        if shape.numel() != storage.numel() {
            return Err(KoreError::ShapeMismatch {
                expected: dims.to_vec(),
                got: vec![storage.numel()],
            });
        }
        Ok(Self {
            storage: Some(storage),
            shape,
            layout,
        })
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    pub fn is_initialized(&self) -> bool {
        self.storage.is_some()
    }

    pub fn storage(&self) -> Option<&Storage> {
        self.storage.as_ref()
    }

    /// Element type of the held storage.
    pub fn dtype(&self) -> Result<DType> {
        Ok(self.initialized()?.dtype())
    }

    /// Place of the held storage.
    pub fn place(&self) -> Result<Device> {
        Ok(self.initialized()?.device())
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    pub fn layout(&self) -> DataLayout {
        self.layout
    }

    pub fn set_layout(&mut self, layout: DataLayout) {
        self.layout = layout;
    }

    /// Set new dimensions. Storage whose element count no longer matches is
    /// released, leaving the tensor uninitialized until the next
    /// [`Tensor::mutable_data`].
    pub fn resize(&mut self, dims: &[usize]) {
        self.shape = Shape::new(dims);
        if let Some(storage) = &self.storage {
            if storage.numel() != self.shape.numel() {
                self.storage = None;
            }
        }
    }

    // =========================================================================
    // Data access
    // =========================================================================

    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        self.initialized()?.as_slice()
    }

    /// Mutable access to existing storage (copy-on-write when shared).
    pub fn as_mut_slice<T: Element>(&mut self) -> Result<&mut [T]> {
        self.storage
            .as_mut()
            .ok_or(KoreError::NotInitialized)?
            .as_mut_slice()
    }

    /// Mutable access that (re)allocates zeroed storage on `place` when the
    /// tensor is uninitialized or its dtype, place or element count differ.
    pub fn mutable_data<T: Element>(&mut self, place: Device) -> Result<&mut [T]> {
        let numel = self.shape.numel();
        let reusable = self.storage.as_ref().is_some_and(|s| {
            s.dtype() == T::DTYPE && s.device() == place && s.numel() == numel
        });
        if !reusable {
            self.storage = Some(Storage::zeros(T::DTYPE, numel, place));
        }
        self.as_mut_slice()
    }

    /// Copy the elements out into a `Vec`.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        Ok(self.as_slice::<T>()?.to_vec())
    }

    // =========================================================================
    // Aliasing
    // =========================================================================

    /// Make this tensor alias `other`'s storage, shape and layout.
    pub fn share_data_with(&mut self, other: &Tensor) {
        self.storage = other.storage.clone();
        self.shape = other.shape.clone();
        self.layout = other.layout;
    }

    /// Whether both tensors hold the same underlying buffer.
    pub fn shares_storage_with(&self, other: &Tensor) -> bool {
        match (&self.storage, &other.storage) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    /// Element-wise conversion to `dtype`. Shape, layout and place are kept.
    pub fn cast(&self, dtype: DType) -> Result<Tensor> {
        let storage = self.initialized()?.cast(dtype);
        Ok(self.with_storage(storage))
    }

    /// Copy to `place`. Shape, layout and dtype are kept.
    pub fn to_device(&self, place: Device) -> Result<Tensor> {
        let storage = self.initialized()?.to_device(place);
        Ok(self.with_storage(storage))
    }

    /// Physically reorder axes: output axis `i` is input axis `axes[i]`.
    ///
    /// The result is a fresh contiguous buffer with the same dtype, place and
    /// layout tag; callers retag the layout as needed.
    pub fn permute(&self, axes: &[usize]) -> Result<Tensor> {
        let src = self.initialized()?;
        let out_shape = self.shape.permute(axes).ok_or_else(|| KoreError::ShapeMismatch {
            expected: (0..self.ndim()).collect(),
            got: axes.to_vec(),
        })?;

        let elem = src.dtype().element_size();
        let src_strides = self.shape.contiguous_strides();
        let out_strides = out_shape.contiguous_strides();
        let src_bytes = src.as_bytes();
        let mut out = vec![0u8; src.nbytes()];

        for (linear, dst) in out.chunks_exact_mut(elem).enumerate() {
            let mut rem = linear;
            let mut src_index = 0;
            for (k, &stride) in out_strides.iter().enumerate() {
                let coord = rem / stride;
                rem %= stride;
                src_index += coord * src_strides[axes[k]];
            }
            let start = src_index * elem;
            dst.copy_from_slice(&src_bytes[start..start + elem]);
        }

        let storage = Storage::from_bytes(src.dtype(), src.numel(), src.device(), out)?;
        Ok(Tensor {
            storage: Some(storage),
            shape: out_shape,
            layout: self.layout,
        })
    }

    fn with_storage(&self, storage: Storage) -> Tensor {
        Tensor {
            storage: Some(storage),
            shape: self.shape.clone(),
            layout: self.layout,
        }
    }

    fn initialized(&self) -> Result<&Storage> {
        self.storage.as_ref().ok_or(KoreError::NotInitialized)
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.storage {
            Some(s) => write!(
                f,
                "Tensor(shape={}, dtype={}, place={}, layout={})",
                self.shape,
                s.dtype(),
                s.device(),
                self.layout,
            ),
            None => write!(f, "Tensor(shape={}, uninitialized)", self.shape),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_f32() {
        let t = Tensor::from_f32(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        assert_eq!(t.dims(), &[2, 3]);
        assert_eq!(t.ndim(), 2);
        assert_eq!(t.numel(), 6);
        assert_eq!(t.dtype().unwrap(), DType::F32);
        assert_eq!(t.place().unwrap(), Device::Cpu);
        assert_eq!(t.layout(), DataLayout::AnyLayout);
    }

    #[test]
    fn test_from_slice_checks_numel() {
        let err = Tensor::from_slice(&[1i32, 2, 3], &[2, 2]).unwrap_err();
        assert!(matches!(err, KoreError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_uninitialized() {
        let t = Tensor::new();
        assert!(!t.is_initialized());
        assert!(matches!(t.dtype(), Err(KoreError::NotInitialized)));
        assert!(matches!(t.place(), Err(KoreError::NotInitialized)));
        assert!(t.as_slice::<f32>().is_err());
    }

    #[test]
    fn test_resize_and_mutable_data() {
        let mut t = Tensor::new();
        t.resize(&[2, 2]);
        assert!(!t.is_initialized());
        {
            let data = t.mutable_data::<f64>(Device::Cpu).unwrap();
            assert_eq!(data.len(), 4);
            data[3] = 7.0;
        }
        assert_eq!(t.dtype().unwrap(), DType::F64);

        // Same numel keeps the buffer.
        t.resize(&[4]);
        assert_eq!(t.as_slice::<f64>().unwrap()[3], 7.0);

        t.resize(&[3]);
        assert!(!t.is_initialized());
    }

    #[test]
    fn test_share_data_with() {
        let src = Tensor::from_f32(&[1.0, 2.0], &[2]).unwrap();
        let mut dst = Tensor::zeros(&[5], DType::I64, Device::Cpu);
        dst.share_data_with(&src);
        assert!(dst.shares_storage_with(&src));
        assert_eq!(dst.dims(), &[2]);
        assert_eq!(dst.dtype().unwrap(), DType::F32);
        assert!(!Tensor::new().shares_storage_with(&src));
    }

    #[test]
    fn test_cast_and_to_device() {
        let mut t = Tensor::from_f64(&[1.5, -3.0], &[2]).unwrap();
        t.set_layout(DataLayout::Nchw);

        let c = t.cast(DType::F32).unwrap();
        assert_eq!(c.to_vec::<f32>().unwrap(), vec![1.5, -3.0]);
        assert_eq!(c.layout(), DataLayout::Nchw);

        let d = t.to_device(Device::CudaPinned).unwrap();
        assert_eq!(d.place().unwrap(), Device::CudaPinned);
        assert!(!d.shares_storage_with(&t));

        assert!(Tensor::new().cast(DType::F32).is_err());
    }

    #[test]
    fn test_permute_nhwc_to_nchw() {
        // N=1, H=1, W=2, C=3
        let t = Tensor::from_f32(&[0.0, 1.0, 2.0, 10.0, 11.0, 12.0], &[1, 1, 2, 3]).unwrap();
        let p = t.permute(&[0, 3, 1, 2]).unwrap();
        assert_eq!(p.dims(), &[1, 3, 1, 2]);
        assert_eq!(
            p.to_vec::<f32>().unwrap(),
            vec![0.0, 10.0, 1.0, 11.0, 2.0, 12.0]
        );
        assert!(t.permute(&[0, 1]).is_err());
    }

    #[test]
    fn test_debug() {
        let t = Tensor::from_f32(&[1.0, 2.0], &[2]).unwrap();
        let debug = format!("{:?}", t);
        assert!(debug.contains("Tensor"));
        assert!(debug.contains("f32"));
        assert!(format!("{:?}", Tensor::new()).contains("uninitialized"));
    }
}
