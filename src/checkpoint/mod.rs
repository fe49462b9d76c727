mod manager;
mod record;
mod store;

pub use manager::CheckpointManager;
pub use record::{CHECKPOINT_VERSION, Checkpoint};
pub use store::{CheckpointStore, FsCheckpointStore};
