use serde::{Deserialize, Serialize};

use crate::ParamStore;

/// Below every valid accuracy, so the first evaluation always becomes the best one.
pub const NO_ACCURACY: f64 = -1.0;

/// The solver's book-keeping, everything a checkpoint needs to resume a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    pub epoch: usize,
    pub best_val_acc: f64,
    /// A deep copy of the parameters that achieved `best_val_acc`.
    pub best_params: Option<ParamStore>,
    /// One entry per training step.
    pub loss_history: Vec<f32>,
    /// One entry per evaluation, index-aligned with `val_acc_history`.
    pub train_acc_history: Vec<f64>,
    pub val_acc_history: Vec<f64>,
}

impl Default for TrainingState {
    fn default() -> Self {
        Self {
            epoch: 0,
            best_val_acc: NO_ACCURACY,
            best_params: None,
            loss_history: Vec::new(),
            train_acc_history: Vec::new(),
            val_acc_history: Vec::new(),
        }
    }
}

impl TrainingState {
    /// Appends an evaluation and snapshots `params` if `val_acc` strictly improves on the best.
    ///
    /// # Returns
    /// Whether `val_acc` became the new best.
    pub fn record_evaluation(&mut self, train_acc: f64, val_acc: f64, params: &ParamStore) -> bool {
        self.train_acc_history.push(train_acc);
        self.val_acc_history.push(val_acc);

        if val_acc > self.best_val_acc {
            self.best_val_acc = val_acc;
            self.best_params = Some(params.clone());
            return true;
        }

        false
    }
}

/// The lifecycle of a solver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    Idle,
    Running,
    Completed,
    Aborted,
}

impl SolverState {
    pub fn name(self) -> &'static str {
        match self {
            SolverState::Idle => "idle",
            SolverState::Running => "running",
            SolverState::Completed => "completed",
            SolverState::Aborted => "aborted",
        }
    }
}
