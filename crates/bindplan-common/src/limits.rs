//! Centralized limits and defaults for the graph planner.
//!
//! Options that callers do not set fall back to these values. Keeping them in
//! one place lets the option layer, the partitioner and the tests agree on the
//! same numbers.

// =============================================================================
// Sharding
// =============================================================================

/// Default maximum number of keys placed in one shard.
///
/// Large enough that ordinary graphs never shard. A component larger than the
/// bound is still placed whole and reported as an oversized warning.
pub const DEFAULT_KEYS_PER_SHARD: usize = 2000;

/// Default maximum number of init statements in one generated init function.
///
/// When a shard holds more statements than this and chunking is enabled, the
/// statements are split into ordered chunks of this size.
pub const DEFAULT_STATEMENTS_PER_INIT_FUN: usize = 25;

// =============================================================================
// Capacity hints
// =============================================================================

/// Initial capacity for per-graph key tables.
///
/// Most graphs declare a few dozen bindings; reserving up front avoids the
/// first handful of rehashes during the resolution walk.
pub const INITIAL_GRAPH_CAPACITY: usize = 64;

/// Deepest extension chain accepted before the driver treats the chain as
/// malformed.
///
/// Real graph trees rarely nest more than three or four levels. A chain this
/// long almost always means the parent links form a loop the front end failed
/// to reject.
pub const MAX_EXTENSION_DEPTH: usize = 64;
