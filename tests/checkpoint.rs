mod common;

use std::{fs, io, path::Path};

use common::{DataBlind, Softmax, blob_data, config};
use solver::{
    Model, Solver, SolverConfig, SolverErr, SolverState,
    checkpoint::{Checkpoint, CheckpointManager, CheckpointStore},
    optimization::OptimConfig,
};

fn checkpointed(dir: &Path, num_epochs: usize) -> SolverConfig {
    let mut solver_config = config(5, num_epochs);
    solver_config.update_rule = "sgd_momentum".to_string();
    solver_config.optim_config = OptimConfig::new(0.1);
    solver_config.lr_decay = 0.9;
    solver_config.checkpoint_dir = dir.to_path_buf();
    solver_config.checkpoint_every = 2;
    solver_config
}

fn record(dir: &Path) -> Checkpoint {
    CheckpointManager::with_root(dir).load_latest().unwrap()
}

#[test]
fn checkpoints_are_written_every_n_epochs() {
    let dir = tempfile::tempdir().unwrap();
    let mut solver =
        Solver::new(Softmax::new(3, 2), blob_data(20, 10, 0), checkpointed(dir.path(), 5))
            .unwrap();
    solver.train().unwrap();

    for epoch in [2, 4] {
        assert!(dir.path().join(format!("check_{epoch}/check_{epoch}.json")).is_file());
    }
    assert!(!dir.path().join("check_5").exists());

    let latest = record(dir.path());
    assert_eq!(latest.epoch(), 4);
    assert_eq!(latest.state.loss_history.len(), 16);
    assert_eq!(latest.update_rule, "sgd_momentum");
}

#[test]
fn resumed_run_matches_an_uninterrupted_one() {
    let full_dir = tempfile::tempdir().unwrap();
    let mut full =
        Solver::new(Softmax::new(3, 2), blob_data(20, 10, 1), checkpointed(full_dir.path(), 4))
            .unwrap();
    full.train().unwrap();

    // The same run, stopped after its first checkpoint.
    let short_dir = tempfile::tempdir().unwrap();
    let mut short =
        Solver::new(Softmax::new(3, 2), blob_data(20, 10, 1), checkpointed(short_dir.path(), 2))
            .unwrap();
    short.train().unwrap();

    let blob = fs::read(full_dir.path().join("check_2/check_2.json")).unwrap();
    let full_at_2: Checkpoint = serde_json::from_slice(&blob).unwrap();
    let short_at_2 = record(short_dir.path());
    assert_eq!(full_at_2, short_at_2);

    let resume_dir = tempfile::tempdir().unwrap();
    let mut resume_config = checkpointed(resume_dir.path(), 4);
    resume_config.resume_from = Some(short_dir.path().to_path_buf());

    let mut resumed = Solver::new(Softmax::new(3, 2), blob_data(20, 10, 1), resume_config).unwrap();
    assert_eq!(resumed.epoch(), 2);
    assert_eq!(resumed.model().params(), &short_at_2.model_params);
    assert_eq!(resumed.optimizer().configs(), &short_at_2.optim_configs);

    let report = resumed.train().unwrap();

    assert_eq!(report.iterations, 8);
    assert_eq!(resumed.epoch(), full.epoch());
    assert_eq!(resumed.loss_history().len(), full.loss_history().len());
    assert_eq!(resumed.train_acc_history().len(), full.train_acc_history().len());
    assert_eq!(resumed.val_acc_history().len(), full.val_acc_history().len());
    assert_eq!(&resumed.loss_history()[..8], &full.loss_history()[..8]);
}

#[test]
fn missing_resume_directory_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let mut solver_config = checkpointed(dir.path(), 1);
    solver_config.resume_from = Some(dir.path().join("never-written"));

    let solver = Solver::new(Softmax::new(3, 2), blob_data(20, 10, 2), solver_config).unwrap();
    assert_eq!(solver.epoch(), 0);
    assert!(solver.loss_history().is_empty());
}

#[test]
fn checkpoint_for_another_model_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let mut solver =
        Solver::new(Softmax::new(3, 2), blob_data(20, 10, 3), checkpointed(dir.path(), 2))
            .unwrap();
    solver.train().unwrap();

    let mut solver_config = checkpointed(dir.path(), 2);
    solver_config.resume_from = Some(dir.path().to_path_buf());

    let fresh = DataBlind::new().params().clone();
    let solver = Solver::new(DataBlind::new(), blob_data(20, 10, 3), solver_config).unwrap();
    assert_eq!(solver.epoch(), 0);
    assert_eq!(solver.model().params(), &fresh);
}

#[test]
fn resuming_a_finished_run_only_swaps_in_the_best_params() {
    let dir = tempfile::tempdir().unwrap();
    let mut solver =
        Solver::new(Softmax::new(3, 2), blob_data(20, 10, 4), checkpointed(dir.path(), 2))
            .unwrap();
    solver.train().unwrap();
    let best = solver.training_state().best_params.clone();

    let mut solver_config = checkpointed(dir.path(), 2);
    solver_config.resume_from = Some(dir.path().to_path_buf());

    let mut resumed = Solver::new(Softmax::new(3, 2), blob_data(20, 10, 4), solver_config).unwrap();
    let report = resumed.train().unwrap();

    assert_eq!(report.iterations, 0);
    assert_eq!(resumed.loss_history().len(), 8);
    assert_eq!(resumed.training_state().best_params, best);
    assert_eq!(Some(resumed.model().params().clone()), best);
}

/// Accepts a fixed amount of writes, then fails like a full disk.
struct FullDisk {
    writes_left: usize,
}

impl CheckpointStore for FullDisk {
    fn write(&mut self, _: usize, _: &[u8]) -> solver::Result<()> {
        if self.writes_left == 0 {
            return Err(io::Error::other("disk full").into());
        }

        self.writes_left -= 1;
        Ok(())
    }

    fn read(&self, _: usize) -> solver::Result<Vec<u8>> {
        Err(io::Error::from(io::ErrorKind::NotFound).into())
    }

    fn list(&self) -> solver::Result<Vec<usize>> {
        Ok(Vec::new())
    }
}

#[test]
fn failed_checkpoint_write_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut solver_config = checkpointed(dir.path(), 4);
    solver_config.checkpoint_every = 1;

    let mut solver = Solver::new(Softmax::new(3, 2), blob_data(20, 10, 5), solver_config)
        .unwrap()
        .with_checkpoint_store(FullDisk { writes_left: 1 });

    let err = solver.train().unwrap_err();

    assert!(matches!(err, SolverErr::Io(ref e) if e.to_string() == "disk full"));
    assert_eq!(solver.state(), SolverState::Aborted);
    // The second epoch boundary is the one that failed to save.
    assert_eq!(solver.epoch(), 2);
    assert_eq!(solver.loss_history().len(), 8);
    assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
}
