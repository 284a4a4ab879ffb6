use smallvec::SmallVec;
use std::fmt;

/// Tensor dimensions, stored inline for rank ≤ 4.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: SmallVec<[usize; 4]>,
}

impl Shape {
    pub fn new(dims: &[usize]) -> Self {
        Self {
            dims: SmallVec::from_slice(dims),
        }
    }

    /// Rank-0 shape.
    pub fn scalar() -> Self {
        Self::default()
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements (1 for a scalar).
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn dim(&self, axis: usize) -> Option<usize> {
        self.dims.get(axis).copied()
    }

    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    /// Row-major strides, in elements.
    pub fn contiguous_strides(&self) -> SmallVec<[usize; 4]> {
        let mut strides: SmallVec<[usize; 4]> = SmallVec::from_elem(1, self.ndim());
        for i in (0..self.ndim().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1];
        }
        strides
    }

    /// Shape obtained by reordering axes: `out[i] = self[axes[i]]`.
    ///
    /// Returns `None` unless `axes` is a permutation of `0..ndim`.
    pub fn permute(&self, axes: &[usize]) -> Option<Shape> {
        if axes.len() != self.ndim() {
            return None;
        }
        let mut seen: SmallVec<[bool; 4]> = SmallVec::from_elem(false, axes.len());
        for &a in axes {
            if a >= axes.len() || seen[a] {
                return None;
            }
            seen[a] = true;
        }
        Some(Shape {
            dims: axes.iter().map(|&a| self.dims[a]).collect(),
        })
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape({:?})", self.dims.as_slice())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dims.iter().map(|d| d.to_string()).collect();
        write!(f, "[{}]", dims.join(", "))
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims)
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape::new(&dims)
    }
}
