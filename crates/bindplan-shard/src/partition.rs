//! Forward-pass partitioning of sorted keys into bounded shards.

use bindplan_common::Diagnostic;
use bindplan_common::diagnostics::diagnostic_codes;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use tracing::{debug, warn};

/// One ordered group of keys initialized together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Shard<K> {
    pub index: usize,
    pub keys: Vec<K>,
}

impl<K> Shard<K> {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// A component larger than the bound, placed whole in its own shard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OversizedComponent {
    pub shard: usize,
    pub size: usize,
    pub bound: usize,
}

impl OversizedComponent {
    pub fn to_diagnostic(&self, graph: &str) -> Diagnostic {
        Diagnostic::from_code(
            graph,
            diagnostic_codes::OVERSIZED_COMPONENT,
            &[
                &self.size.to_string(),
                &self.bound.to_string(),
                &self.shard.to_string(),
            ],
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Partition<K> {
    pub shards: Vec<Shard<K>>,
    pub oversized: Vec<OversizedComponent>,
}

impl<K> Partition<K> {
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    pub fn shard_sizes(&self) -> Vec<usize> {
        self.shards.iter().map(Shard::len).collect()
    }

    /// Concatenate the shards back into one key list.
    pub fn into_keys(self) -> Vec<K> {
        self.shards.into_iter().flat_map(|s| s.keys).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartitionError<C> {
    /// The members of a component are interleaved with other keys.
    NonContiguousComponent { component: C },
}

impl<C: fmt::Display> PartitionError<C> {
    pub fn to_diagnostic(&self, graph: &str) -> Diagnostic {
        match self {
            PartitionError::NonContiguousComponent { component } => Diagnostic::from_code(
                graph,
                diagnostic_codes::NON_CONTIGUOUS_COMPONENT,
                &[&component.to_string()],
            ),
        }
    }
}

impl<C: fmt::Display> fmt::Display for PartitionError<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionError::NonContiguousComponent { component } => {
                write!(f, "component {component} is not contiguous in the sorted keys")
            }
        }
    }
}

impl<C: fmt::Debug + fmt::Display> std::error::Error for PartitionError<C> {}

/// Pack `sorted` into shards of at most `max_per_shard` keys.
///
/// Consecutive keys of one component form an indivisible unit; keys missing
/// from `component_of` are units of their own. The current shard closes when
/// it is non-empty and the next unit would overflow it. A unit larger than
/// the bound gets a shard to itself and is reported in
/// [`Partition::oversized`].
#[tracing::instrument(level = "debug", skip_all, fields(keys = sorted.len(), bound = max_per_shard.get()))]
pub fn partition<K, C>(
    sorted: &[K],
    component_of: &FxHashMap<K, C>,
    max_per_shard: NonZeroUsize,
) -> Result<Partition<K>, PartitionError<C>>
where
    K: Clone + Eq + Hash,
    C: Copy + Eq + Hash,
{
    let bound = max_per_shard.get();
    let mut shards: Vec<Shard<K>> = Vec::new();
    let mut oversized = Vec::new();
    let mut current: Vec<K> = Vec::new();
    let mut finished: FxHashSet<C> = FxHashSet::default();

    let mut start = 0;
    while start < sorted.len() {
        let component = component_of.get(&sorted[start]).copied();
        let mut end = start + 1;
        if let Some(component) = component {
            if !finished.insert(component) {
                return Err(PartitionError::NonContiguousComponent { component });
            }
            while end < sorted.len() && component_of.get(&sorted[end]) == Some(&component) {
                end += 1;
            }
        }
        let unit = &sorted[start..end];

        if !current.is_empty() && current.len() + unit.len() > bound {
            shards.push(Shard {
                index: shards.len(),
                keys: std::mem::take(&mut current),
            });
        }
        if unit.len() > bound {
            warn!(size = unit.len(), bound, shard = shards.len(), "component exceeds shard bound");
            oversized.push(OversizedComponent {
                shard: shards.len(),
                size: unit.len(),
                bound,
            });
        }
        current.extend_from_slice(unit);
        start = end;
    }
    if !current.is_empty() {
        shards.push(Shard {
            index: shards.len(),
            keys: current,
        });
    }

    debug!(shards = shards.len(), oversized = oversized.len(), "partitioned keys");
    Ok(Partition { shards, oversized })
}

/// Split a shard's ordered init statements into chunks of `per_chunk`.
pub fn chunk_statements<T: Clone>(statements: &[T], per_chunk: NonZeroUsize) -> Vec<Vec<T>> {
    statements
        .chunks(per_chunk.get())
        .map(<[T]>::to_vec)
        .collect()
}

#[cfg(test)]
#[path = "../tests/partition_tests.rs"]
mod partition_tests;
