use std::ops::Range;

use ndarray::{ArrayView, Axis, Dimension, Slice};

/// Splits `total` items into `num_shards` groups and returns the range of `shard`.
///
/// Properties:
/// - Ranges are contiguous, disjoint and cover `[0..total)`.
/// - Sizes differ by at most 1, the first `total % num_shards` shards are the larger ones.
///
/// # Panics
/// If `num_shards` is zero or `shard` is out of range.
pub fn shard_range(total: usize, shard: usize, num_shards: usize) -> Range<usize> {
    assert!(num_shards > 0);
    assert!(shard < num_shards);

    let base = total / num_shards;
    let rem = total % num_shards;

    let start = shard * base + shard.min(rem);
    let extra = if shard < rem { 1 } else { 0 };
    let end = start + base + extra;

    start..end
}

/// Splits an array along its first axis into `num_shards` balanced, order-preserving views.
///
/// Shards may be empty when there are fewer rows than shards.
pub fn split_rows<'a, A, D: Dimension>(
    array: ArrayView<'a, A, D>,
    num_shards: usize,
) -> Vec<ArrayView<'a, A, D>> {
    let total = array.len_of(Axis(0));

    (0..num_shards)
        .map(|shard| {
            let range = shard_range(total, shard, num_shards);
            array.clone().slice_axis_move(Axis(0), Slice::from(range))
        })
        .collect()
}
