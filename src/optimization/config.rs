use std::collections::BTreeMap;

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

/// The state an update rule carries for a single parameter.
///
/// `learning_rate` is mandatory for every rule. Rule-specific scalars (momentum,
/// decay rates, step counters) live in `hyper` and cached arrays (velocities,
/// moment estimates) live in `buffers`; both may grow as training proceeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimConfig {
    pub learning_rate: f32,
    #[serde(default)]
    pub hyper: BTreeMap<String, f32>,
    #[serde(default)]
    pub buffers: BTreeMap<String, ArrayD<f32>>,
}

impl Default for OptimConfig {
    fn default() -> Self {
        Self::new(1e-2)
    }
}

impl OptimConfig {
    /// Creates a new `OptimConfig` with only a learning rate.
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            hyper: BTreeMap::new(),
            buffers: BTreeMap::new(),
        }
    }

    /// Sets a rule-specific hyperparameter.
    pub fn with_hyper(mut self, key: &str, value: f32) -> Self {
        self.hyper.insert(key.to_string(), value);
        self
    }

    /// Returns the hyperparameter `key`, storing `default` first if it's absent.
    pub(crate) fn hyper_or(&mut self, key: &str, default: f32) -> f32 {
        *self.hyper.entry(key.to_string()).or_insert(default)
    }

    /// Removes the cached array `key`, or returns zeros of `shape` if it's absent or stale.
    pub(crate) fn take_buffer(&mut self, key: &str, shape: &[usize]) -> ArrayD<f32> {
        match self.buffers.remove(key) {
            Some(buf) if buf.shape() == shape => buf,
            _ => ArrayD::zeros(IxDyn(shape)),
        }
    }

    pub(crate) fn put_buffer(&mut self, key: &str, buf: ArrayD<f32>) {
        self.buffers.insert(key.to_string(), buf);
    }
}
