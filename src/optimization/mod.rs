mod adam;
mod config;
mod registry;
mod rmsprop;
mod sgd;
mod sgd_momentum;
mod state;

pub use adam::adam;
pub use config::OptimConfig;
pub use registry::{UpdateRule, resolve, rule_names};
pub use rmsprop::rmsprop;
pub use sgd::sgd;
pub use sgd_momentum::sgd_momentum;
pub use state::OptimizerState;

use ndarray::ArrayViewD;

use crate::{Result, SolverErr};

/// Fails if a gradient isn't shaped exactly like its parameter.
fn ensure_same_shape(value: &ArrayViewD<'_, f32>, grad: &ArrayViewD<'_, f32>) -> Result<()> {
    if value.shape() != grad.shape() {
        return Err(SolverErr::ShapeMismatch {
            param: "gradient".to_string(),
            got: grad.shape().to_vec(),
            expected: value.shape().to_vec(),
        });
    }

    Ok(())
}
