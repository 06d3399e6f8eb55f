//! Binding resolution for the bindplan planner.
//!
//! - [`binding_table`]: declaration model to key-to-binding lookup
//! - [`binding_graph`]: walks accessors to the reachable binding set
//! - [`topology`]: SCCs, direct-cycle detection and deterministic order
//! - [`parent_context`]: key ownership across nested extension graphs

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxBuildHasher;

pub mod binding_graph;
pub mod binding_table;
pub mod errors;
pub mod parent_context;
pub mod topology;

pub use binding_graph::{BindingGraph, BindingGraphBuilder};
pub use binding_table::{BindingSet, BindingTable, ClassIndex};
pub use errors::{BindingError, BindingErrorKind, BindingStack, Requester, StackFrame};
pub use parent_context::{ClosedLevel, NameAllocator, Ownership, ParentContext};
pub use topology::{
    Component, ComponentId, CycleError, DependencyEdge, DependencyGraph, EdgeKind, Topology,
};

/// Insertion-ordered map with the fast non-cryptographic hasher.
pub type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;
pub type FxIndexSet<K> = IndexSet<K, FxBuildHasher>;
