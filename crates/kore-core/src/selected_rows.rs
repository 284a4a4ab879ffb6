use crate::Tensor;

/// A sparse slice of a larger dense tensor.
///
/// `value` holds one row per entry in `rows`; `height` is the row count of the
/// full tensor the rows were taken from.
#[derive(Debug, Clone, Default)]
pub struct SelectedRows {
    rows: Vec<i64>,
    height: i64,
    value: Tensor,
}

impl SelectedRows {
    pub fn new(rows: Vec<i64>, height: i64) -> Self {
        Self {
            rows,
            height,
            value: Tensor::new(),
        }
    }

    pub fn rows(&self) -> &[i64] {
        &self.rows
    }

    pub fn set_rows(&mut self, rows: Vec<i64>) {
        self.rows = rows;
    }

    pub fn height(&self) -> i64 {
        self.height
    }

    pub fn set_height(&mut self, height: i64) {
        self.height = height;
    }

    pub fn value(&self) -> &Tensor {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Tensor {
        &mut self.value
    }
}
