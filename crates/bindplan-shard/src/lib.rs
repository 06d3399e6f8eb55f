//! Sharding of topologically sorted binding keys.
//!
//! A graph whose plan is too large for one generated unit is split into
//! shards: ordered runs of the sorted key list, each bounded by a key count.
//! A strongly connected component is never split, so every cycle broken
//! through `Provider`/`Lazy` stays inside one shard.

pub mod partition;

pub use partition::{
    OversizedComponent, Partition, PartitionError, Shard, chunk_statements, partition,
};
