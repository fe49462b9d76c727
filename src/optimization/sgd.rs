use ndarray::{ArrayD, ArrayViewD};

use super::{OptimConfig, ensure_same_shape};
use crate::Result;

/// Vanilla stochastic gradient descent: `w -= learning_rate * dw`.
///
/// Uses only `learning_rate`.
pub fn sgd(
    value: ArrayViewD<'_, f32>,
    grad: ArrayViewD<'_, f32>,
    config: OptimConfig,
) -> Result<(ArrayD<f32>, OptimConfig)> {
    ensure_same_shape(&value, &grad)?;

    let mut next = value.to_owned();
    next.scaled_add(-config.learning_rate, &grad);
    Ok((next, config))
}
