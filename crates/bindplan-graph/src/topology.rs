//! Cycle detection and deterministic topological ordering.
//!
//! The graph is stored densely: keys live in an insertion-ordered set and a
//! key's insertion index is its declaration index. Edges point from a
//! dependent to its dependency and are tagged [`EdgeKind::Direct`] or
//! [`EdgeKind::Deferred`] when they are added.
//!
//! Sorting runs in three steps:
//! 1. Tarjan's SCC algorithm over every edge, so keys tied together through
//!    `Provider`/`Lazy` edges land in one component.
//! 2. Inside each multi-key component, Kahn's algorithm over the direct edges
//!    only. Keys left over form a direct cycle, which is fatal.
//! 3. Kahn's algorithm over the condensed component DAG.
//!
//! Both Kahn passes break ties by the smallest declaration index, so hash
//! iteration order never reaches the output.

use crate::{FxIndexSet, errors::render_chain};
use bindplan_common::Diagnostic;
use bindplan_common::diagnostics::diagnostic_codes;
use fixedbitset::FixedBitSet;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use smallvec::SmallVec;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::hash::Hash;
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeKind {
    Direct,
    /// Through `Provider` or `Lazy`; may close a cycle.
    Deferred,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DependencyEdge {
    pub target: usize,
    pub kind: EdgeKind,
}

/// Identifies one strongly connected component in sort order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ComponentId(pub u32);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A dependency graph over keys of type `K`.
#[derive(Clone, Debug)]
pub struct DependencyGraph<K> {
    keys: FxIndexSet<K>,
    edges: Vec<SmallVec<[DependencyEdge; 4]>>,
}

impl<K> Default for DependencyGraph<K> {
    fn default() -> Self {
        Self {
            keys: FxIndexSet::default(),
            edges: Vec::new(),
        }
    }
}

impl<K: Clone + Eq + Hash> DependencyGraph<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: FxIndexSet::with_capacity_and_hasher(capacity, Default::default()),
            edges: Vec::with_capacity(capacity),
        }
    }

    /// Add a key, returning its declaration index. Re-adding is a no-op.
    pub fn add_node(&mut self, key: K) -> usize {
        let (index, inserted) = self.keys.insert_full(key);
        if inserted {
            self.edges.push(SmallVec::new());
        }
        index
    }

    /// Record that `from` depends on `to`.
    pub fn add_dependency(&mut self, from: K, to: K, kind: EdgeKind) {
        let from = self.add_node(from);
        let to = self.add_node(to);
        let edges = &mut self.edges[from];
        if !edges.iter().any(|e| e.target == to && e.kind == kind) {
            edges.push(DependencyEdge { target: to, kind });
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.keys.iter()
    }

    /// Compute components and a dependency-first order.
    ///
    /// Returns every direct cycle found, one per offending component.
    #[tracing::instrument(level = "debug", skip_all, fields(keys = self.keys.len()))]
    pub fn sort(&self) -> Result<Topology<K>, Vec<CycleError<K>>> {
        let sccs = Tarjan::new(&self.edges).run();
        debug!(components = sccs.len(), "computed strongly connected components");

        let mut scc_of = vec![0usize; self.keys.len()];
        for (scc, members) in sccs.iter().enumerate() {
            for &node in members {
                scc_of[node] = scc;
            }
        }

        let mut cycles = Vec::new();
        for (node, edges) in self.edges.iter().enumerate() {
            if edges
                .iter()
                .any(|e| e.target == node && e.kind == EdgeKind::Direct)
            {
                let key = self.key_at(node);
                cycles.push(CycleError {
                    cycle: vec![key.clone(), key.clone()],
                });
            }
        }

        // Order members of each component by their direct edges.
        let mut ordered_sccs: Vec<Vec<usize>> = Vec::with_capacity(sccs.len());
        for members in &sccs {
            if members.len() == 1 {
                ordered_sccs.push(members.clone());
                continue;
            }
            match self.order_component(members, &scc_of) {
                Ok(order) => ordered_sccs.push(order),
                Err(cycle) => {
                    cycles.push(CycleError {
                        cycle: cycle.into_iter().map(|n| self.key_at(n).clone()).collect(),
                    });
                    ordered_sccs.push(Vec::new());
                }
            }
        }

        if !cycles.is_empty() {
            debug!(cycles = cycles.len(), "direct dependency cycles found");
            return Err(cycles);
        }

        let component_order = self.order_components(&sccs, &scc_of);

        let mut sorted_keys = Vec::with_capacity(self.keys.len());
        let mut components = Vec::with_capacity(sccs.len());
        let mut component_of = FxHashMap::default();
        let mut position = vec![0usize; self.keys.len()];
        for (id, &scc) in component_order.iter().enumerate() {
            let id = ComponentId(id as u32);
            let mut keys = Vec::with_capacity(ordered_sccs[scc].len());
            for &node in &ordered_sccs[scc] {
                position[node] = sorted_keys.len();
                let key = self.key_at(node).clone();
                component_of.insert(key.clone(), id);
                sorted_keys.push(key.clone());
                keys.push(key);
            }
            components.push(Component { id, keys });
        }

        let mut deferred = FxHashSet::default();
        for (node, edges) in self.edges.iter().enumerate() {
            for edge in edges {
                if edge.kind == EdgeKind::Deferred
                    && scc_of[edge.target] == scc_of[node]
                    && position[edge.target] > position[node]
                {
                    deferred.insert(edge.target);
                }
            }
        }
        let mut deferred: Vec<usize> = deferred.into_iter().collect();
        deferred.sort_unstable_by_key(|&n| position[n]);
        let deferred_keys = deferred
            .into_iter()
            .map(|n| self.key_at(n).clone())
            .collect();

        Ok(Topology {
            sorted_keys,
            components,
            component_of,
            deferred_keys,
        })
    }

    fn key_at(&self, index: usize) -> &K {
        &self.keys[index]
    }

    /// Kahn's algorithm over the direct edges inside one component.
    ///
    /// On failure returns a cycle path whose first and last entries match.
    fn order_component(&self, members: &[usize], scc_of: &[usize]) -> Result<Vec<usize>, Vec<usize>> {
        let scc = scc_of[members[0]];
        let mut pending: FxHashMap<usize, usize> = FxHashMap::default();
        let mut dependents: FxHashMap<usize, SmallVec<[usize; 4]>> = FxHashMap::default();
        for &node in members {
            let mut count = 0;
            let mut seen: SmallVec<[usize; 4]> = SmallVec::new();
            for edge in &self.edges[node] {
                if edge.kind != EdgeKind::Direct
                    || scc_of[edge.target] != scc
                    || edge.target == node
                    || seen.contains(&edge.target)
                {
                    continue;
                }
                seen.push(edge.target);
                count += 1;
                dependents.entry(edge.target).or_default().push(node);
            }
            pending.insert(node, count);
        }

        let mut ready: BinaryHeap<Reverse<usize>> = members
            .iter()
            .copied()
            .filter(|n| pending[n] == 0)
            .map(Reverse)
            .collect();
        let mut order = Vec::with_capacity(members.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            if let Some(waiting) = dependents.get(&node) {
                for &dependent in waiting {
                    if let Some(count) = pending.get_mut(&dependent) {
                        *count -= 1;
                        if *count == 0 {
                            ready.push(Reverse(dependent));
                        }
                    }
                }
            }
        }

        if order.len() == members.len() {
            return Ok(order);
        }

        let remaining: FxHashSet<usize> = members
            .iter()
            .copied()
            .filter(|n| pending[n] > 0)
            .collect();
        Err(self.find_direct_cycle(&remaining))
    }

    /// Walk direct edges among `remaining` until a node repeats.
    ///
    /// Every remaining node still waits on another remaining node, so the
    /// walk cannot dead-end.
    fn find_direct_cycle(&self, remaining: &FxHashSet<usize>) -> Vec<usize> {
        let Some(&start) = remaining.iter().min() else {
            return Vec::new();
        };
        let mut path = vec![start];
        let mut seen_at: FxHashMap<usize, usize> = FxHashMap::default();
        seen_at.insert(start, 0);
        let mut current = start;
        loop {
            let next = self.edges[current].iter().find(|e| {
                e.kind == EdgeKind::Direct && e.target != current && remaining.contains(&e.target)
            });
            let Some(next) = next else {
                return path;
            };
            current = next.target;
            path.push(current);
            if let Some(&first) = seen_at.get(&current) {
                trace!(length = path.len() - first, "direct cycle path");
                return path.split_off(first);
            }
            seen_at.insert(current, path.len() - 1);
        }
    }

    /// Kahn's algorithm over the condensed DAG, smallest declaration index first.
    fn order_components(&self, sccs: &[Vec<usize>], scc_of: &[usize]) -> Vec<usize> {
        let rank: Vec<usize> = sccs
            .iter()
            .map(|members| members.iter().copied().min().unwrap_or(usize::MAX))
            .collect();

        let mut pending = vec![0usize; sccs.len()];
        let mut dependents: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); sccs.len()];
        let mut seen: FxHashSet<(usize, usize)> = FxHashSet::default();
        for (node, edges) in self.edges.iter().enumerate() {
            let from = scc_of[node];
            for edge in edges {
                let to = scc_of[edge.target];
                if from != to && seen.insert((from, to)) {
                    pending[from] += 1;
                    dependents[to].push(from);
                }
            }
        }

        let mut ready: BinaryHeap<Reverse<(usize, usize)>> = (0..sccs.len())
            .filter(|&scc| pending[scc] == 0)
            .map(|scc| Reverse((rank[scc], scc)))
            .collect();
        let mut order = Vec::with_capacity(sccs.len());
        while let Some(Reverse((_, scc))) = ready.pop() {
            order.push(scc);
            for &dependent in &dependents[scc] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.push(Reverse((rank[dependent], dependent)));
                }
            }
        }
        order
    }
}

// =============================================================================
// Tarjan
// =============================================================================

const UNVISITED: u32 = u32::MAX;

/// Iterative Tarjan SCC over dense node indices.
struct Tarjan<'a> {
    edges: &'a [SmallVec<[DependencyEdge; 4]>],
    index: Vec<u32>,
    lowlink: Vec<u32>,
    on_stack: FixedBitSet,
    stack: Vec<usize>,
    next_index: u32,
    components: Vec<Vec<usize>>,
}

impl<'a> Tarjan<'a> {
    fn new(edges: &'a [SmallVec<[DependencyEdge; 4]>]) -> Self {
        let n = edges.len();
        Self {
            edges,
            index: vec![UNVISITED; n],
            lowlink: vec![0; n],
            on_stack: FixedBitSet::with_capacity(n),
            stack: Vec::new(),
            next_index: 0,
            components: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Vec<usize>> {
        for root in 0..self.edges.len() {
            if self.index[root] == UNVISITED {
                self.visit(root);
            }
        }
        self.components
    }

    fn open(&mut self, v: usize) {
        self.index[v] = self.next_index;
        self.lowlink[v] = self.next_index;
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack.insert(v);
    }

    fn visit(&mut self, root: usize) {
        // (node, next edge to inspect)
        let edges = self.edges;
        let mut call: Vec<(usize, usize)> = vec![(root, 0)];
        self.open(root);

        while let Some(frame) = call.last_mut() {
            let v = frame.0;
            if let Some(edge) = edges[v].get(frame.1) {
                frame.1 += 1;
                let w = edge.target;
                if self.index[w] == UNVISITED {
                    self.open(w);
                    call.push((w, 0));
                } else if self.on_stack.contains(w) {
                    self.lowlink[v] = self.lowlink[v].min(self.index[w]);
                }
                continue;
            }

            call.pop();
            if let Some(&(parent, _)) = call.last() {
                self.lowlink[parent] = self.lowlink[parent].min(self.lowlink[v]);
            }
            if self.lowlink[v] == self.index[v] {
                let mut members = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack.set(w, false);
                    members.push(w);
                    if w == v {
                        break;
                    }
                }
                members.sort_unstable();
                self.components.push(members);
            }
        }
    }
}

// =============================================================================
// Results
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Component<K> {
    pub id: ComponentId,
    /// Members in their internal initialization order.
    pub keys: Vec<K>,
}

impl<K> Component<K> {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn is_cyclic(&self) -> bool {
        self.keys.len() > 1
    }
}

/// The outcome of a successful sort.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology<K: Eq + Hash> {
    /// Every key, dependencies before dependents.
    pub sorted_keys: Vec<K>,
    /// Components in sort order; `components[i].id == ComponentId(i)`.
    pub components: Vec<Component<K>>,
    #[serde(skip)]
    pub component_of: FxHashMap<K, ComponentId>,
    /// Targets of in-component deferred edges that point forward in the order.
    pub deferred_keys: Vec<K>,
}

impl<K: Eq + Hash> Topology<K> {
    pub fn component_of(&self, key: &K) -> Option<ComponentId> {
        self.component_of.get(key).copied()
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component<K>> {
        self.components.get(id.0 as usize)
    }
}

/// A cycle among direct dependencies. The first and last keys are equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleError<K> {
    pub cycle: Vec<K>,
}

impl<K: fmt::Display> CycleError<K> {
    pub fn to_diagnostic(&self, graph: &str) -> Diagnostic {
        Diagnostic::from_code(
            graph,
            diagnostic_codes::DEPENDENCY_CYCLE,
            &[&render_chain(&self.cycle)],
        )
    }
}

impl<K: fmt::Display> fmt::Display for CycleError<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dependency cycle: {}", render_chain(&self.cycle))
    }
}

impl<K: fmt::Debug + fmt::Display> std::error::Error for CycleError<K> {}

#[cfg(test)]
#[path = "../tests/topology_tests.rs"]
mod topology_tests;
