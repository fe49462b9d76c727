use ndarray::ArrayD;

use crate::{ParamStore, Result, SolverErr};

/// Combines per-shard `(loss, gradients)` results into a single `(loss, gradients)`.
///
/// The loss is the arithmetic mean of the shard losses and every gradient is the
/// elementwise mean of that parameter's shard gradients. Shards are weighted equally
/// regardless of their size.
///
/// # Arguments
/// * `results` - One result per shard.
/// * `params` - The model's parameters, they define which gradients are required and their shapes.
///
/// # Returns
/// An error if there are no results, a shard misses a gradient or a gradient is misshapen.
pub fn aggregate(
    results: Vec<(f32, ParamStore)>,
    params: &ParamStore,
) -> Result<(f32, ParamStore)> {
    let n = results.len();
    if n == 0 {
        return Err(SolverErr::LengthMismatch {
            what: "shard results",
            got: 0,
            expected: 1,
        });
    }

    let loss = results.iter().map(|(loss, _)| *loss).sum::<f32>() / n as f32;

    let mut grads = ParamStore::new();
    for (name, value) in params {
        let mut acc = ArrayD::<f32>::zeros(value.raw_dim());

        for (_, shard_grads) in &results {
            let grad = shard_grads
                .get(name)
                .ok_or_else(|| SolverErr::MissingGradient(name.clone()))?;

            if grad.shape() != value.shape() {
                return Err(SolverErr::ShapeMismatch {
                    param: name.clone(),
                    got: grad.shape().to_vec(),
                    expected: value.shape().to_vec(),
                });
            }

            acc += grad;
        }

        acc /= n as f32;
        grads.insert(name.clone(), acc);
    }

    Ok((loss, grads))
}
