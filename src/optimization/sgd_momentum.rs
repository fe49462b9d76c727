use ndarray::{ArrayD, ArrayViewD};

use super::{OptimConfig, ensure_same_shape};
use crate::Result;

const DEFAULT_MOMENTUM: f32 = 0.9;

/// Stochastic gradient descent with momentum.
///
/// Reads `momentum` (default 0.9) and keeps a `velocity` buffer shaped like the
/// parameter:
/// `v = momentum * v - learning_rate * dw; w += v`.
pub fn sgd_momentum(
    value: ArrayViewD<'_, f32>,
    grad: ArrayViewD<'_, f32>,
    mut config: OptimConfig,
) -> Result<(ArrayD<f32>, OptimConfig)> {
    ensure_same_shape(&value, &grad)?;

    let lr = config.learning_rate;
    let mu = config.hyper_or("momentum", DEFAULT_MOMENTUM);
    let mut velocity = config.take_buffer("velocity", value.shape());

    velocity.zip_mut_with(&grad, |v, &g| *v = mu * *v - lr * g);
    let next = &value + &velocity;

    config.put_buffer("velocity", velocity);
    Ok((next, config))
}
