use ndarray::{Array1, ArrayD, ArrayView1, ArrayViewD, Axis};

use super::split_rows;
use crate::{Result, SolverErr};

/// A labeled, in-memory classification dataset.
///
/// `x` has shape `(n, d_1, ..., d_k)` and `y` holds the `n` class labels.
#[derive(Debug, Clone)]
pub struct Dataset {
    x: ArrayD<f32>,
    y: Array1<usize>,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Returns
    /// An error if `x` is zero-dimensional or if it has a different amount of rows than `y`.
    pub fn new(x: ArrayD<f32>, y: Array1<usize>) -> Result<Self> {
        if x.ndim() == 0 {
            return Err(SolverErr::Config(
                "dataset inputs must have at least one axis".into(),
            ));
        }

        let rows = x.len_of(Axis(0));
        if rows != y.len() {
            return Err(SolverErr::LengthMismatch {
                what: "dataset labels",
                got: y.len(),
                expected: rows,
            });
        }

        Ok(Self { x, y })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.y.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    #[inline]
    pub fn x(&self) -> ArrayViewD<'_, f32> {
        self.x.view()
    }

    #[inline]
    pub fn y(&self) -> ArrayView1<'_, usize> {
        self.y.view()
    }

    /// Gathers the rows at `indices`, repeated indices included, into an owned batch.
    ///
    /// # Panics
    /// If any index is out of bounds.
    pub fn select(&self, indices: &[usize]) -> Batch {
        Batch {
            x: self.x.select(Axis(0), indices),
            y: self.y.select(Axis(0), indices),
        }
    }
}

/// The training and validation splits the solver works with.
#[derive(Debug, Clone)]
pub struct Data {
    pub train: Dataset,
    pub val: Dataset,
}

impl Data {
    pub fn new(train: Dataset, val: Dataset) -> Self {
        Self { train, val }
    }
}

/// An owned mini-batch of inputs and their paired labels.
#[derive(Debug, Clone)]
pub struct Batch {
    pub x: ArrayD<f32>,
    pub y: Array1<usize>,
}

impl Batch {
    #[inline]
    pub fn len(&self) -> usize {
        self.y.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Borrows the whole batch.
    pub fn view(&self) -> BatchRef<'_> {
        BatchRef {
            x: self.x.view(),
            y: self.y.view(),
        }
    }

    /// Splits the batch into `num_shards` contiguous shards whose sizes differ by at most 1.
    pub fn shards(&self, num_shards: usize) -> Vec<BatchRef<'_>> {
        let xs = split_rows(self.x.view(), num_shards);
        let ys = split_rows(self.y.view(), num_shards);

        xs.into_iter()
            .zip(ys)
            .map(|(x, y)| BatchRef { x, y })
            .collect()
    }
}

/// Borrowed batch view (zero-copy).
#[derive(Debug, Clone)]
pub struct BatchRef<'a> {
    pub x: ArrayViewD<'a, f32>,
    pub y: ArrayView1<'a, usize>,
}

impl BatchRef<'_> {
    #[inline]
    pub fn len(&self) -> usize {
        self.y.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}
