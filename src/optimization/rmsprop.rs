use ndarray::{ArrayD, ArrayViewD, Zip};

use super::{OptimConfig, ensure_same_shape};
use crate::Result;

const DEFAULT_DECAY_RATE: f32 = 0.99;
const DEFAULT_EPSILON: f32 = 1e-8;

/// RMSProp: scales the step by a moving average of squared gradients.
///
/// Reads `decay_rate` (default 0.99) and `epsilon` (default 1e-8), keeps a `cache`
/// buffer shaped like the parameter.
pub fn rmsprop(
    value: ArrayViewD<'_, f32>,
    grad: ArrayViewD<'_, f32>,
    mut config: OptimConfig,
) -> Result<(ArrayD<f32>, OptimConfig)> {
    ensure_same_shape(&value, &grad)?;

    let lr = config.learning_rate;
    let decay = config.hyper_or("decay_rate", DEFAULT_DECAY_RATE);
    let eps = config.hyper_or("epsilon", DEFAULT_EPSILON);
    let mut cache = config.take_buffer("cache", value.shape());

    cache.zip_mut_with(&grad, |c, &g| *c = decay * *c + (1. - decay) * g * g);

    let mut next = value.to_owned();
    Zip::from(&mut next)
        .and(&grad)
        .and(&cache)
        .for_each(|w, &g, &c| *w -= lr * g / (c.sqrt() + eps));

    config.put_buffer("cache", cache);
    Ok((next, config))
}
