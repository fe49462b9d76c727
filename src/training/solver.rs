use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use ndarray::{Array1, ArrayD, ArrayView1, ArrayViewD};
use rand::{SeedableRng, rngs::StdRng};

use super::{SolverState, StopHandle, TrainingState};
use crate::{
    Model, ParamStore, Result, SolverErr,
    checkpoint::{CHECKPOINT_VERSION, Checkpoint, CheckpointManager, CheckpointStore},
    config::SolverConfig,
    data::{AugmentFn, BatchSampler, Data},
    evaluation::{EvalRequest, evaluate},
    execution::{WorkerPool, aggregate},
    optimization::OptimizerState,
};

/// Maps the epoch that just started to the learning-rate decay factor applied at its boundary.
pub type LrSchedule = Box<dyn Fn(usize) -> f32 + Send + Sync>;

/// The outcome of a completed `Solver::train` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainReport {
    /// The iterations run by this call, fewer than the total when resumed.
    pub iterations: usize,
    pub epoch: usize,
    pub best_val_acc: f64,
}

/// Trains a classification model with mini-batch stochastic optimization.
///
/// The solver owns the model and the data for the whole run. On `train` it samples a
/// batch per iteration, computes the loss and gradients (split across the worker
/// pool if there is one), applies the update rule to every parameter, periodically
/// checks train and validation accuracy and checkpoints at epoch boundaries. Once
/// every iteration has run the model is left holding the parameters that achieved
/// the best validation accuracy.
pub struct Solver<M: Model> {
    model: M,
    data: Data,
    config: SolverConfig,
    sampler: BatchSampler,
    optimizer: OptimizerState,
    pool: Option<WorkerPool>,
    checkpoints: CheckpointManager,
    rng: StdRng,
    lr_decay: f32,
    lr_schedule: Option<LrSchedule>,
    augment: Option<AugmentFn>,
    training: TrainingState,
    state: SolverState,
    stop: StopHandle,
}

impl<M: Model> Solver<M> {
    /// Creates a new `Solver`.
    ///
    /// Everything that can be rejected up front is rejected here, before the model
    /// is ever evaluated. If `config.resume_from` holds a usable checkpoint the run
    /// continues from it, otherwise it silently starts from epoch zero.
    ///
    /// # Arguments
    /// * `model` - The model to train.
    /// * `data` - The training and validation splits.
    /// * `config` - The run's configuration.
    ///
    /// # Returns
    /// A configuration error for invalid values or an unknown update rule,
    /// `EmptyDataset` if either split has no rows, or an io error if the worker pool
    /// couldn't be started.
    pub fn new(model: M, data: Data, config: SolverConfig) -> Result<Self> {
        config.validate()?;

        if data.train.is_empty() {
            return Err(SolverErr::EmptyDataset("training"));
        }

        if data.val.is_empty() {
            return Err(SolverErr::EmptyDataset("validation"));
        }

        let optimizer =
            OptimizerState::new(&config.update_rule, &config.optim_config, model.params())?;

        let pool = match config.num_workers.get() {
            1 => None,
            _ => Some(WorkerPool::new(config.num_workers)?),
        };

        let mut solver = Self {
            sampler: BatchSampler::new(config.batch_size),
            checkpoints: CheckpointManager::with_root(&config.checkpoint_dir),
            rng: generate_rng(config.seed),
            lr_decay: config.lr_decay,
            model,
            data,
            optimizer,
            pool,
            lr_schedule: None,
            augment: None,
            training: TrainingState::default(),
            state: SolverState::Idle,
            stop: StopHandle::new(),
            config,
        };

        if let Some(root) = solver.config.resume_from.clone() {
            if let Some(record) = CheckpointManager::with_root(&root).load_latest() {
                let epoch = record.epoch();
                match solver.restore(record) {
                    Ok(()) => debug!(epoch = epoch; "resuming from {}", root.display()),
                    Err(e) => warn!(
                        epoch = epoch;
                        "checkpoint doesn't fit the model, starting fresh: {e}"
                    ),
                }
            }
        }

        Ok(solver)
    }

    /// Replaces the constant `lr_decay` with a factor computed from the epoch number.
    pub fn with_lr_schedule<F>(mut self, schedule: F) -> Self
    where
        F: Fn(usize) -> f32 + Send + Sync + 'static,
    {
        self.lr_schedule = Some(Box::new(schedule));
        self
    }

    /// Sets a transformation applied to the inputs of every training batch.
    pub fn with_augment<F>(mut self, augment: F) -> Self
    where
        F: Fn(ArrayD<f32>) -> ArrayD<f32> + Send + Sync + 'static,
    {
        self.augment = Some(Box::new(augment));
        self
    }

    /// Persists checkpoints into `store` instead of `config.checkpoint_dir`.
    pub fn with_checkpoint_store<S: CheckpointStore + 'static>(mut self, store: S) -> Self {
        self.checkpoints = CheckpointManager::new(store);
        self
    }

    /// Returns a handle that interrupts `train` at the next iteration boundary.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Runs every remaining iteration.
    ///
    /// The worker pool is released when this returns, whatever the outcome. On
    /// success the model holds the best parameters found and the solver is
    /// `Completed`; on any failure, interruption included, it's `Aborted` and the
    /// model keeps its latest parameters.
    ///
    /// # Returns
    /// `InvalidState` if the solver isn't `Idle`, or the first error of the run.
    pub fn train(&mut self) -> Result<TrainReport> {
        if self.state != SolverState::Idle {
            return Err(SolverErr::InvalidState {
                expected: SolverState::Idle.name(),
                got: self.state.name(),
            });
        }

        self.state = SolverState::Running;
        let result = self.run();

        if let Some(mut pool) = self.pool.take() {
            pool.terminate();
        }

        match result {
            Ok(report) => {
                if let Some(best) = &self.training.best_params {
                    *self.model.params_mut() = best.clone();
                }

                self.state = SolverState::Completed;
                Ok(report)
            }
            Err(e) => {
                warn!("training aborted: {e}");
                self.state = SolverState::Aborted;
                Err(e)
            }
        }
    }

    fn run(&mut self) -> Result<TrainReport> {
        let verbose = self.config.verbose;
        let print_every = self.config.print_every.get();

        let iterations_per_epoch = (self.data.train.len() / self.sampler.batch_size()).max(1);
        let num_iterations = self.config.num_epochs * iterations_per_epoch;
        let start = (self.training.epoch * iterations_per_epoch).min(num_iterations);

        if verbose {
            info!(
                epochs = self.config.num_epochs,
                iterations = num_iterations,
                workers = self.config.num_workers.get();
                "training for {} epochs, or {num_iterations} iterations",
                self.config.num_epochs
            );
        }

        let mut secs_per_iter = VecDeque::with_capacity(print_every);

        for it in start..num_iterations {
            if self.stop.is_stopped() {
                return Err(SolverErr::Interrupted { iteration: it });
            }

            let started = Instant::now();
            let loss = self.step()?;

            if secs_per_iter.len() == print_every {
                secs_per_iter.pop_front();
            }
            secs_per_iter.push_back(started.elapsed());

            let first_it = it == 0;
            let last_it = it + 1 == num_iterations;
            let epoch_end = (it + 1) % iterations_per_epoch == 0;
            let report = verbose && (it + 1) % print_every == 0;

            if first_it || last_it || epoch_end || report {
                let (train_acc, val_acc) = self.check_train_val()?;

                if verbose {
                    let mean = mean_secs(&secs_per_iter);
                    info!(
                        iteration = it + 1;
                        "step {}: loss {loss:.3}, train acc {train_acc:.3}, val acc {val_acc:.3} \
                         ({mean:.2} sec/it)",
                        it + 1
                    );
                }

                let params = self.model.params();
                if self.training.record_evaluation(train_acc, val_acc, params) {
                    debug!(iteration = it + 1; "new best val acc {val_acc:.3}");
                }
            }

            if epoch_end {
                self.end_epoch()?;
            }
        }

        Ok(TrainReport {
            iterations: num_iterations - start,
            epoch: self.training.epoch,
            best_val_acc: self.training.best_val_acc,
        })
    }

    /// Runs one optimization step on a freshly sampled batch.
    fn step(&mut self) -> Result<f32> {
        let batch = self
            .sampler
            .sample(&self.data.train, &mut self.rng, self.augment.as_ref())?;

        let (loss, grads) = match self.pool.as_mut() {
            None => self.model.loss(batch.x.view(), batch.y.view())?,
            Some(pool) => {
                let shards: Vec<_> = batch
                    .shards(pool.size())
                    .into_iter()
                    .filter(|shard| !shard.is_empty())
                    .collect();

                let model = &self.model;
                let results = pool.run(shards, |shard| model.loss(shard.x, shard.y))?;
                aggregate(results, model.params())?
            }
        };

        self.training.loss_history.push(loss);
        self.optimizer.step(self.model.params_mut(), &grads)?;
        Ok(loss)
    }

    fn end_epoch(&mut self) -> Result<()> {
        self.training.epoch += 1;
        let epoch = self.training.epoch;

        if self.config.verbose {
            info!(
                epoch = epoch;
                "epoch {epoch} / {} ended, best val acc {:.3}",
                self.config.num_epochs,
                self.training.best_val_acc
            );
        }

        if let Some(schedule) = &self.lr_schedule {
            self.lr_decay = schedule(epoch);
            if self.config.verbose && self.lr_decay != 1.0 {
                info!(epoch = epoch; "learning rate decayed by {}", self.lr_decay);
            }
        }

        self.optimizer.decay_learning_rate(self.lr_decay);

        let every = self.config.checkpoint_every;
        if every > 0 && epoch % every == 0 {
            self.save_checkpoint()?;
        }

        Ok(())
    }

    fn check_train_val(&mut self) -> Result<(f64, f64)> {
        let batch_size = self.config.eval_batch_size;

        let mut train = EvalRequest::accuracy(self.data.train.x(), self.data.train.y(), batch_size);
        if self.config.train_acc_samples > 0 {
            train = train.subsample(self.config.train_acc_samples);
        }
        let train_acc = accuracy(&self.model, self.pool.as_mut(), &mut self.rng, train)?;

        let val = EvalRequest::accuracy(self.data.val.x(), self.data.val.y(), batch_size);
        let val_acc = accuracy(&self.model, self.pool.as_mut(), &mut self.rng, val)?;

        Ok((train_acc, val_acc))
    }

    /// Checks the accuracy of the model's current parameters.
    ///
    /// # Arguments
    /// * `x` - The inputs.
    /// * `y` - The true labels of `x`.
    /// * `num_samples` - When set, evaluate a random subsample of this size instead.
    pub fn check_accuracy(
        &mut self,
        x: ArrayViewD<'_, f32>,
        y: ArrayView1<'_, usize>,
        num_samples: Option<usize>,
    ) -> Result<f64> {
        let mut request = EvalRequest::accuracy(x, y, self.config.eval_batch_size);
        request.num_samples = num_samples;

        accuracy(&self.model, self.pool.as_mut(), &mut self.rng, request)
    }

    /// Returns the predicted class of every row in `x`.
    pub fn predict(&mut self, x: ArrayViewD<'_, f32>) -> Result<Array1<usize>> {
        let request = EvalRequest::predictions(x, self.config.eval_batch_size);

        evaluate(&self.model, self.pool.as_mut(), &mut self.rng, request)?
            .into_predictions()
            .ok_or(SolverErr::InvalidState {
                expected: "predictions",
                got: "accuracy",
            })
    }

    fn save_checkpoint(&mut self) -> Result<()> {
        let record = Checkpoint {
            version: CHECKPOINT_VERSION,
            state: self.training.clone(),
            update_rule: self.optimizer.rule_name().to_string(),
            lr_decay: self.lr_decay,
            model_params: self.model.params().clone(),
            optim_configs: self.optimizer.configs().clone(),
        };

        self.checkpoints.save(&record)
    }

    /// Resumes from `record`, leaving the solver untouched if it doesn't fit.
    fn restore(&mut self, record: Checkpoint) -> Result<()> {
        if record.update_rule != self.optimizer.rule_name() {
            return Err(SolverErr::Config(format!(
                "checkpoint was trained with \"{}\", not \"{}\"",
                record.update_rule,
                self.optimizer.rule_name()
            )));
        }

        check_layout(self.model.params(), &record.model_params)?;
        if let Some(best) = &record.state.best_params {
            check_layout(self.model.params(), best)?;
        }

        self.optimizer.restore(record.optim_configs)?;
        *self.model.params_mut() = record.model_params;
        self.lr_decay = record.lr_decay;
        self.training = record.state;
        Ok(())
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    pub fn training_state(&self) -> &TrainingState {
        &self.training
    }

    pub fn optimizer(&self) -> &OptimizerState {
        &self.optimizer
    }

    pub fn epoch(&self) -> usize {
        self.training.epoch
    }

    pub fn best_val_acc(&self) -> f64 {
        self.training.best_val_acc
    }

    pub fn loss_history(&self) -> &[f32] {
        &self.training.loss_history
    }

    pub fn train_acc_history(&self) -> &[f64] {
        &self.training.train_acc_history
    }

    pub fn val_acc_history(&self) -> &[f64] {
        &self.training.val_acc_history
    }
}

fn accuracy<M: Model>(
    model: &M,
    pool: Option<&mut WorkerPool>,
    rng: &mut StdRng,
    request: EvalRequest<'_>,
) -> Result<f64> {
    evaluate(model, pool, rng, request)?
        .accuracy()
        .ok_or(SolverErr::InvalidState {
            expected: "accuracy",
            got: "predictions",
        })
}

/// Checks that `got` has exactly the parameter names and shapes of `expected`.
fn check_layout(expected: &ParamStore, got: &ParamStore) -> Result<()> {
    if got.len() != expected.len() {
        return Err(SolverErr::LengthMismatch {
            what: "checkpoint parameters",
            got: got.len(),
            expected: expected.len(),
        });
    }

    for (name, value) in got {
        let current = expected
            .get(name)
            .ok_or_else(|| SolverErr::UnknownParam(name.clone()))?;

        if current.shape() != value.shape() {
            return Err(SolverErr::ShapeMismatch {
                param: name.clone(),
                got: value.shape().to_vec(),
                expected: current.shape().to_vec(),
            });
        }
    }

    Ok(())
}

fn mean_secs(window: &VecDeque<Duration>) -> f64 {
    if window.is_empty() {
        return 0.0;
    }

    window.iter().sum::<Duration>().as_secs_f64() / window.len() as f64
}

fn generate_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}
