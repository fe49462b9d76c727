mod dataset;
mod sampler;
mod shard;

pub use dataset::{Batch, BatchRef, Data, Dataset};
pub use sampler::{AugmentFn, BatchSampler, sample_indices};
pub use shard::{shard_range, split_rows};
