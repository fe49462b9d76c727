use std::num::NonZeroUsize;

use ndarray::{ArrayD, Axis};
use rand::Rng;

use super::{Batch, Dataset};
use crate::{Result, SolverErr};

/// An optional transformation applied to the inputs of every training batch.
pub type AugmentFn = Box<dyn Fn(ArrayD<f32>) -> ArrayD<f32> + Send + Sync>;

/// Draws `count` indices uniformly at random, with replacement, from `[0, total)`.
///
/// Returns no indices when `total` is zero.
pub fn sample_indices<R: Rng>(total: usize, count: usize, rng: &mut R) -> Vec<usize> {
    if total == 0 {
        return Vec::new();
    }

    (0..count).map(|_| rng.random_range(0..total)).collect()
}

/// Draws training mini-batches.
#[derive(Debug, Clone, Copy)]
pub struct BatchSampler {
    batch_size: NonZeroUsize,
}

impl BatchSampler {
    pub fn new(batch_size: NonZeroUsize) -> Self {
        Self { batch_size }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    /// Samples a batch of `batch_size` rows with replacement and augments its inputs.
    ///
    /// # Arguments
    /// * `data` - The dataset to sample from.
    /// * `rng` - The random number generator driving the sampling.
    /// * `augment` - An optional transformation for the gathered inputs.
    ///
    /// # Returns
    /// The batch, or an error if `data` is empty or the augmentation changed the
    /// amount of rows.
    pub fn sample<R: Rng>(
        &self,
        data: &Dataset,
        rng: &mut R,
        augment: Option<&AugmentFn>,
    ) -> Result<Batch> {
        if data.is_empty() {
            return Err(SolverErr::EmptyDataset("training"));
        }

        let indices = sample_indices(data.len(), self.batch_size(), rng);
        let mut batch = data.select(&indices);

        if let Some(augment) = augment {
            batch.x = augment(batch.x);

            let rows = if batch.x.ndim() == 0 { 0 } else { batch.x.len_of(Axis(0)) };
            if rows != batch.y.len() {
                return Err(SolverErr::LengthMismatch {
                    what: "augmented batch",
                    got: rows,
                    expected: batch.y.len(),
                });
            }
        }

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, IxDyn};
    use rand::{SeedableRng, rngs::StdRng};

    fn dataset(n: usize) -> Dataset {
        let x = ArrayD::from_shape_fn(IxDyn(&[n, 1]), |idx| idx[0] as f32);
        let y = Array1::from_iter(0..n);
        Dataset::new(x, y).unwrap()
    }

    #[test]
    fn indices_are_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let indices = sample_indices(7, 500, &mut rng);
        assert_eq!(indices.len(), 500);
        assert!(indices.iter().all(|i| *i < 7));
    }

    #[test]
    fn batch_has_configured_size_and_paired_labels() {
        let sampler = BatchSampler::new(NonZeroUsize::new(16).unwrap());
        let mut rng = StdRng::seed_from_u64(42);

        let batch = sampler.sample(&dataset(5), &mut rng, None).unwrap();

        assert_eq!(batch.len(), 16);
        for (row, label) in batch.x.outer_iter().zip(batch.y.iter()) {
            assert_eq!(row[[0]], *label as f32);
        }
    }

    #[test]
    fn same_seed_same_batch() {
        let sampler = BatchSampler::new(NonZeroUsize::new(8).unwrap());
        let data = dataset(100);

        let a = sampler.sample(&data, &mut StdRng::seed_from_u64(7), None).unwrap();
        let b = sampler.sample(&data, &mut StdRng::seed_from_u64(7), None).unwrap();
        assert_eq!(a.y, b.y);
    }

    #[test]
    fn augmentation_is_applied() {
        let sampler = BatchSampler::new(NonZeroUsize::new(4).unwrap());
        let augment: AugmentFn = Box::new(|x: ArrayD<f32>| x + 100.0);
        let mut rng = StdRng::seed_from_u64(1);

        let batch = sampler.sample(&dataset(3), &mut rng, Some(&augment)).unwrap();
        assert!(batch.x.iter().all(|v| *v >= 100.0));
    }

    #[test]
    fn augmentation_must_keep_row_count() {
        let sampler = BatchSampler::new(NonZeroUsize::new(4).unwrap());
        let augment: AugmentFn =
            Box::new(|x: ArrayD<f32>| x.slice_axis(Axis(0), (0..2).into()).to_owned());
        let mut rng = StdRng::seed_from_u64(1);

        let err = sampler.sample(&dataset(3), &mut rng, Some(&augment)).unwrap_err();
        assert!(matches!(err, SolverErr::LengthMismatch { got: 2, expected: 4, .. }));
    }

    #[test]
    fn empty_dataset_is_an_error() {
        let sampler = BatchSampler::new(NonZeroUsize::new(4).unwrap());
        let err = sampler
            .sample(&dataset(0), &mut StdRng::seed_from_u64(1), None)
            .unwrap_err();
        assert!(matches!(err, SolverErr::EmptyDataset(_)));
    }
}
