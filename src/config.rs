use std::{num::NonZeroUsize, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Result, SolverErr, optimization::OptimConfig};

const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(100).unwrap();
const DEFAULT_PRINT_EVERY: NonZeroUsize = NonZeroUsize::new(10).unwrap();

/// Everything a `Solver` run is configured with.
///
/// The set of keys is closed: deserializing a document with any key not listed
/// here fails. Hooks that can't be serialized (a custom learning-rate schedule,
/// batch augmentation) are attached to the solver directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    /// The registered name of the update rule.
    pub update_rule: String,
    /// The template every parameter's optimizer config starts from.
    pub optim_config: OptimConfig,
    /// Multiplies every learning rate at the end of each epoch.
    pub lr_decay: f32,
    pub batch_size: NonZeroUsize,
    pub num_epochs: usize,
    /// Progress is reported, and accuracy checked, every this many iterations.
    pub print_every: NonZeroUsize,
    pub verbose: bool,
    pub checkpoint_dir: PathBuf,
    /// Save a checkpoint every this many epochs, 0 disables checkpointing.
    pub checkpoint_every: usize,
    /// A checkpoint root to resume from.
    pub resume_from: Option<PathBuf>,
    /// The amount of parallel workers, 1 computes everything in the calling thread.
    pub num_workers: NonZeroUsize,
    /// The size of the random training subsample accuracy is checked on, 0 uses the whole set.
    pub train_acc_samples: usize,
    pub eval_batch_size: NonZeroUsize,
    /// Seeds the sampling rng, `None` draws the seed from the OS.
    pub seed: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            update_rule: "sgd".to_string(),
            optim_config: OptimConfig::default(),
            lr_decay: 1.0,
            batch_size: DEFAULT_BATCH_SIZE,
            num_epochs: 10,
            print_every: DEFAULT_PRINT_EVERY,
            verbose: true,
            checkpoint_dir: PathBuf::from("checkpoints"),
            checkpoint_every: 0,
            resume_from: None,
            num_workers: NonZeroUsize::MIN,
            train_acc_samples: 1000,
            eval_batch_size: DEFAULT_BATCH_SIZE,
            seed: None,
        }
    }
}

impl SolverConfig {
    /// Parses and validates a json configuration, missing keys take their default value.
    ///
    /// # Returns
    /// A configuration error on unknown keys, malformed values or failed validation.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SolverErr::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Checks the values serde can't check by type alone.
    pub fn validate(&self) -> Result<()> {
        if self.update_rule.is_empty() {
            return Err(SolverErr::Config("update_rule must not be empty".into()));
        }

        let lr = self.optim_config.learning_rate;
        if !lr.is_finite() || lr <= 0.0 {
            return Err(SolverErr::Config(format!(
                "learning_rate must be positive and finite, got {lr}"
            )));
        }

        if !self.lr_decay.is_finite() || self.lr_decay <= 0.0 {
            return Err(SolverErr::Config(format!(
                "lr_decay must be positive and finite, got {}",
                self.lr_decay
            )));
        }

        Ok(())
    }
}
