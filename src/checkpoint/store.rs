use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;

use crate::Result;

/// Persists opaque checkpoint blobs keyed by epoch.
pub trait CheckpointStore: Send {
    /// Stores `blob` as the record of `epoch`, replacing only a previous record of that same epoch.
    fn write(&mut self, epoch: usize, blob: &[u8]) -> Result<()>;

    fn read(&self, epoch: usize) -> Result<Vec<u8>>;

    /// Returns the epochs that have a record, in no particular order.
    fn list(&self) -> Result<Vec<usize>>;
}

const PREFIX: &str = "check_";

/// Lays records out as `<root>/check_<epoch>/check_<epoch>.json`.
#[derive(Debug, Clone)]
pub struct FsCheckpointStore {
    root: PathBuf,
}

impl FsCheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path the record of `epoch` is stored at.
    pub fn record_path(&self, epoch: usize) -> PathBuf {
        self.root
            .join(format!("{PREFIX}{epoch}"))
            .join(format!("{PREFIX}{epoch}.json"))
    }
}

impl CheckpointStore for FsCheckpointStore {
    fn write(&mut self, epoch: usize, blob: &[u8]) -> Result<()> {
        let path = self.record_path(epoch);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        // A crash mid-write leaves at most a stray temporary file behind.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, &path)?;

        debug!(epoch = epoch, bytes = blob.len(); "wrote checkpoint to {}", path.display());
        Ok(())
    }

    fn read(&self, epoch: usize) -> Result<Vec<u8>> {
        let path = self.record_path(epoch);
        let blob = fs::read(&path)?;

        debug!(epoch = epoch, bytes = blob.len(); "read checkpoint from {}", path.display());
        Ok(blob)
    }

    fn list(&self) -> Result<Vec<usize>> {
        let mut epochs = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }

            let name = entry.file_name();
            let epoch = name
                .to_str()
                .and_then(|name| name.strip_prefix(PREFIX))
                .and_then(|tag| tag.parse().ok());

            if let Some(epoch) = epoch {
                epochs.push(epoch);
            }
        }

        Ok(epochs)
    }
}
