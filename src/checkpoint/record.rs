use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ParamStore, optimization::OptimConfig, training::TrainingState};

/// Bumped whenever the layout of `Checkpoint` changes, older records are then skipped on restore.
pub const CHECKPOINT_VERSION: u32 = 1;

/// A snapshot of a run taken at the end of an epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub state: TrainingState,
    /// The update rule `optim_configs` were produced by.
    pub update_rule: String,
    pub lr_decay: f32,
    /// The live parameters at save time, not the best ones.
    pub model_params: ParamStore,
    pub optim_configs: BTreeMap<String, OptimConfig>,
}

impl Checkpoint {
    #[inline]
    pub fn epoch(&self) -> usize {
        self.state.epoch
    }
}
