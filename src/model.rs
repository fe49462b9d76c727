use std::collections::BTreeMap;

use ndarray::{Array2, ArrayD, ArrayView1, ArrayViewD};

use crate::Result;

/// Named model parameters, in a stable (sorted) order.
///
/// Cloning a `ParamStore` yields a fully independent snapshot.
pub type ParamStore = BTreeMap<String, ArrayD<f32>>;

/// The capability the solver trains.
///
/// The solver only ever reads a model through `&self` while computing losses, so a
/// model evaluated by the worker pool is shared read-only across threads. Parameters
/// are mutated exclusively through `params_mut`, between steps.
pub trait Model: Sync {
    /// Returns the model's current parameters.
    fn params(&self) -> &ParamStore;

    /// Returns the model's parameters for in-place replacement.
    fn params_mut(&mut self) -> &mut ParamStore;

    /// Runs a test-time forward pass.
    ///
    /// # Arguments
    /// * `x` - A batch of inputs of shape `(n, d_1, ..., d_k)`.
    ///
    /// # Returns
    /// Class scores of shape `(n, classes)`.
    fn scores(&self, x: ArrayViewD<'_, f32>) -> Result<Array2<f32>>;

    /// Runs a training-time forward and backward pass.
    ///
    /// # Arguments
    /// * `x` - A batch of inputs of shape `(n, d_1, ..., d_k)`.
    /// * `y` - The `n` labels for `x`.
    ///
    /// # Returns
    /// The scalar loss and a gradient per parameter, keyed and shaped like `params`.
    fn loss(&self, x: ArrayViewD<'_, f32>, y: ArrayView1<'_, usize>) -> Result<(f32, ParamStore)>;
}
