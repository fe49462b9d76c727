use ndarray::{ArrayD, ArrayViewD, Zip};

use super::{OptimConfig, ensure_same_shape};
use crate::Result;

const DEFAULT_BETA1: f32 = 0.9;
const DEFAULT_BETA2: f32 = 0.999;
const DEFAULT_EPSILON: f32 = 1e-8;

/// Adam with bias-corrected first and second moment estimates.
///
/// Reads `beta1`, `beta2`, `epsilon` and the step counter `t`; keeps the moment
/// buffers `m` and `v` shaped like the parameter.
pub fn adam(
    value: ArrayViewD<'_, f32>,
    grad: ArrayViewD<'_, f32>,
    mut config: OptimConfig,
) -> Result<(ArrayD<f32>, OptimConfig)> {
    ensure_same_shape(&value, &grad)?;

    let lr = config.learning_rate;
    let b1 = config.hyper_or("beta1", DEFAULT_BETA1);
    let b2 = config.hyper_or("beta2", DEFAULT_BETA2);
    let eps = config.hyper_or("epsilon", DEFAULT_EPSILON);
    let t = config.hyper_or("t", 0.) + 1.;
    config.hyper.insert("t".to_string(), t);

    let mut m = config.take_buffer("m", value.shape());
    let mut v = config.take_buffer("v", value.shape());

    let bc1 = 1. - b1.powf(t);
    let bc2 = 1. - b2.powf(t);

    let mut next = value.to_owned();
    Zip::from(&mut next)
        .and(&grad)
        .and(&mut m)
        .and(&mut v)
        .for_each(|w, &g, m, v| {
            *m = b1 * *m + (1. - b1) * g;
            *v = b2 * *v + (1. - b2) * g * g;
            let m_hat = *m / bc1;
            let v_hat = *v / bc2;
            *w -= lr * m_hat / (v_hat.sqrt() + eps);
        });

    config.put_buffer("m", m);
    config.put_buffer("v", v);
    Ok((next, config))
}
