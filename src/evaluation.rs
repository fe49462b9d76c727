use std::num::NonZeroUsize;

use ndarray::{Array1, Array2, ArrayView1, ArrayViewD, Axis, Slice};
use rand::Rng;

use crate::{
    Model, Result, SolverErr,
    data::{sample_indices, split_rows},
    execution::WorkerPool,
};

/// What to evaluate and how.
///
/// Exactly one of `y` or `return_preds` must be set: labels produce an accuracy,
/// `return_preds` produces the raw predictions.
#[derive(Debug, Clone)]
pub struct EvalRequest<'a> {
    pub x: ArrayViewD<'a, f32>,
    pub y: Option<ArrayView1<'a, usize>>,
    /// When set and smaller than the dataset, evaluate a fresh random subsample of this size.
    pub num_samples: Option<usize>,
    /// The amount of rows scored at once.
    pub batch_size: NonZeroUsize,
    pub return_preds: bool,
}

impl<'a> EvalRequest<'a> {
    /// A request for the accuracy over `x` against `y`.
    pub fn accuracy(
        x: ArrayViewD<'a, f32>,
        y: ArrayView1<'a, usize>,
        batch_size: NonZeroUsize,
    ) -> Self {
        Self {
            x,
            y: Some(y),
            num_samples: None,
            batch_size,
            return_preds: false,
        }
    }

    /// A request for the predicted class of every row in `x`.
    pub fn predictions(x: ArrayViewD<'a, f32>, batch_size: NonZeroUsize) -> Self {
        Self {
            x,
            y: None,
            num_samples: None,
            batch_size,
            return_preds: true,
        }
    }

    pub fn subsample(mut self, num_samples: usize) -> Self {
        self.num_samples = Some(num_samples);
        self
    }
}

/// The outcome of an evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Accuracy(f64),
    Predictions(Array1<usize>),
}

impl Evaluation {
    pub fn accuracy(&self) -> Option<f64> {
        match self {
            Evaluation::Accuracy(acc) => Some(*acc),
            Evaluation::Predictions(_) => None,
        }
    }

    pub fn into_predictions(self) -> Option<Array1<usize>> {
        match self {
            Evaluation::Accuracy(_) => None,
            Evaluation::Predictions(preds) => Some(preds),
        }
    }
}

/// Returns the index of the highest score of every row, the first one on ties.
pub fn argmax_rows(scores: &Array2<f32>) -> Array1<usize> {
    scores
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |(best, max), (i, &s)| {
                    if s > max { (i, s) } else { (best, max) }
                })
                .0
        })
        .collect()
}

/// Classifies `request.x` in chunks, in parallel when a pool is given.
///
/// # Arguments
/// * `model` - The model to score the inputs with.
/// * `pool` - The worker pool, or `None` to score in the calling thread.
/// * `rng` - Drives the optional subsampling.
/// * `request` - What to evaluate.
///
/// # Returns
/// The accuracy or the predictions, depending on the request.
pub fn evaluate<M, R>(
    model: &M,
    pool: Option<&mut WorkerPool>,
    rng: &mut R,
    request: EvalRequest<'_>,
) -> Result<Evaluation>
where
    M: Model,
    R: Rng,
{
    if request.y.is_some() == request.return_preds {
        return Err(SolverErr::Config(
            "exactly one of labels or return_preds must be given".into(),
        ));
    }

    if request.x.ndim() == 0 {
        return Err(SolverErr::Config(
            "evaluation inputs must have at least one axis".into(),
        ));
    }

    let total = request.x.len_of(Axis(0));
    if let Some(y) = request.y {
        if y.len() != total {
            return Err(SolverErr::LengthMismatch {
                what: "evaluation labels",
                got: y.len(),
                expected: total,
            });
        }
    }

    let subsample;
    let (x, y) = match request.num_samples {
        Some(k) if total > k => {
            let indices = sample_indices(total, k, rng);
            subsample = (
                request.x.select(Axis(0), &indices),
                request.y.map(|y| y.select(Axis(0), &indices)),
            );
            (subsample.0.view(), subsample.1.as_ref().map(|y| y.view()))
        }
        _ => (request.x, request.y),
    };

    let preds = predict(model, pool, x, request.batch_size)?;

    let Some(y) = y else {
        return Ok(Evaluation::Predictions(preds));
    };

    if y.is_empty() {
        return Err(SolverErr::EmptyDataset("evaluation"));
    }

    let hits = preds.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
    Ok(Evaluation::Accuracy(hits as f64 / y.len() as f64))
}

fn predict<M: Model>(
    model: &M,
    mut pool: Option<&mut WorkerPool>,
    x: ArrayViewD<'_, f32>,
    batch_size: NonZeroUsize,
) -> Result<Array1<usize>> {
    let total = x.len_of(Axis(0));
    let mut preds = Vec::with_capacity(total);

    for start in (0..total).step_by(batch_size.get()) {
        let end = (start + batch_size.get()).min(total);
        let chunk = x.slice_axis(Axis(0), Slice::from(start..end));

        match pool.as_deref_mut() {
            None => preds.extend(classify(model, chunk)?),
            Some(pool) => {
                let shards: Vec<_> = split_rows(chunk, pool.size())
                    .into_iter()
                    .filter(|shard| shard.len_of(Axis(0)) > 0)
                    .collect();

                for shard_preds in pool.run(shards, |shard| classify(model, shard))? {
                    preds.extend(shard_preds);
                }
            }
        }
    }

    Ok(Array1::from(preds))
}

fn classify<M: Model>(model: &M, x: ArrayViewD<'_, f32>) -> Result<Array1<usize>> {
    let rows = x.len_of(Axis(0));
    let scores = model.scores(x)?;

    if scores.nrows() != rows {
        return Err(SolverErr::LengthMismatch {
            what: "scores",
            got: scores.nrows(),
            expected: rows,
        });
    }

    Ok(argmax_rows(&scores))
}
