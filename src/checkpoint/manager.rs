use std::path::PathBuf;

use log::{debug, warn};

use super::{CHECKPOINT_VERSION, Checkpoint, CheckpointStore, FsCheckpointStore};
use crate::{Result, SolverErr};

/// Serializes checkpoints into a `CheckpointStore` and finds the latest usable one.
pub struct CheckpointManager {
    store: Box<dyn CheckpointStore>,
}

impl CheckpointManager {
    pub fn new<S: CheckpointStore + 'static>(store: S) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Creates a new `CheckpointManager` backed by the filesystem at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self::new(FsCheckpointStore::new(root))
    }

    /// Persists `record` under its epoch.
    ///
    /// # Returns
    /// An error if serialization or the store failed, nothing is retried.
    pub fn save(&mut self, record: &Checkpoint) -> Result<()> {
        let blob = serde_json::to_vec(record)?;
        self.store.write(record.epoch(), &blob)?;

        debug!(epoch = record.epoch(); "checkpoint saved");
        Ok(())
    }

    /// Loads the highest-epoch record that can be read, parses and has the current version.
    ///
    /// Failures are never fatal: unusable records are skipped with a warning and
    /// `None` is returned when nothing is left.
    pub fn load_latest(&self) -> Option<Checkpoint> {
        let mut epochs = match self.store.list() {
            Ok(epochs) => epochs,
            Err(e) => {
                warn!("couldn't list checkpoints, starting fresh: {e}");
                return None;
            }
        };

        epochs.sort_unstable_by(|a, b| b.cmp(a));
        epochs.dedup();

        for epoch in epochs {
            match self.load(epoch) {
                Ok(record) => {
                    debug!(epoch = epoch; "checkpoint restored");
                    return Some(record);
                }
                Err(e) => warn!(epoch = epoch; "skipping unusable checkpoint: {e}"),
            }
        }

        warn!("no usable checkpoint found, starting fresh");
        None
    }

    fn load(&self, epoch: usize) -> Result<Checkpoint> {
        let blob = self.store.read(epoch)?;
        let record: Checkpoint = serde_json::from_slice(&blob)?;

        if record.version != CHECKPOINT_VERSION {
            return Err(SolverErr::Config(format!(
                "checkpoint version {} isn't supported, expected {CHECKPOINT_VERSION}",
                record.version
            )));
        }

        if record.epoch() != epoch {
            return Err(SolverErr::LengthMismatch {
                what: "checkpoint epoch",
                got: record.epoch(),
                expected: epoch,
            });
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{BTreeMap, HashMap},
        fs, io,
    };

    use ndarray::{ArrayD, IxDyn};

    use super::*;
    use crate::{ParamStore, training::TrainingState};

    fn record(epoch: usize) -> Checkpoint {
        let mut params = ParamStore::new();
        params.insert("W".to_string(), ArrayD::from_elem(IxDyn(&[2, 3]), epoch as f32));

        let state = TrainingState {
            epoch,
            best_val_acc: 0.5,
            best_params: Some(params.clone()),
            loss_history: vec![2.0; epoch],
            train_acc_history: vec![0.4],
            val_acc_history: vec![0.5],
        };

        Checkpoint {
            version: CHECKPOINT_VERSION,
            state,
            update_rule: "sgd".to_string(),
            lr_decay: 0.95,
            model_params: params,
            optim_configs: BTreeMap::new(),
        }
    }

    #[test]
    fn latest_epoch_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CheckpointManager::with_root(dir.path());

        for epoch in [1, 10, 2] {
            manager.save(&record(epoch)).unwrap();
        }

        assert_eq!(manager.load_latest(), Some(record(10)));
    }

    #[test]
    fn corrupt_latest_falls_back_to_previous() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CheckpointManager::with_root(dir.path());

        manager.save(&record(1)).unwrap();
        manager.save(&record(2)).unwrap();
        fs::write(dir.path().join("check_2").join("check_2.json"), b"{ truncated").unwrap();

        assert_eq!(manager.load_latest().map(|r| r.epoch()), Some(1));
    }

    #[test]
    fn other_versions_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CheckpointManager::with_root(dir.path());

        let mut old = record(4);
        old.version = CHECKPOINT_VERSION + 1;
        manager.save(&old).unwrap();

        assert_eq!(manager.load_latest(), None);
    }

    #[test]
    fn empty_or_missing_root_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(CheckpointManager::with_root(dir.path()).load_latest(), None);
        assert_eq!(
            CheckpointManager::with_root(dir.path().join("nope")).load_latest(),
            None
        );
    }

    #[derive(Default)]
    struct MemoryStore {
        blobs: HashMap<usize, Vec<u8>>,
    }

    impl CheckpointStore for MemoryStore {
        fn write(&mut self, epoch: usize, blob: &[u8]) -> Result<()> {
            self.blobs.insert(epoch, blob.to_vec());
            Ok(())
        }

        fn read(&self, epoch: usize) -> Result<Vec<u8>> {
            self.blobs
                .get(&epoch)
                .cloned()
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound).into())
        }

        fn list(&self) -> Result<Vec<usize>> {
            Ok(self.blobs.keys().copied().collect())
        }
    }

    #[test]
    fn works_with_any_store() {
        let mut manager = CheckpointManager::new(MemoryStore::default());
        manager.save(&record(3)).unwrap();
        manager.save(&record(7)).unwrap();

        assert_eq!(manager.load_latest().map(|r| r.epoch()), Some(7));
    }
}
