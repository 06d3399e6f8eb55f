//! Reachable bindings of one graph.
//!
//! [`BindingGraphBuilder`] walks requests breadth-first from a graph's
//! accessors, asking its [`BindingTable`] for the canonical binding of every
//! key it reaches. Keys that are declared but never reached are pruned. The
//! builder is consumed by [`BindingGraphBuilder::finish`], so the resulting
//! [`BindingGraph`] is read-only by construction.

use crate::FxIndexMap;
use crate::binding_table::BindingTable;
use crate::errors::{BindingError, BindingErrorKind, BindingStack, Requester, StackFrame};
use crate::parent_context::ParentContext;
use crate::topology::{CycleError, DependencyGraph, EdgeKind, Topology};
use bindplan_model::{Binding, ContextualTypeKey, GraphDeclaration, TypeKey};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};

pub struct BindingGraphBuilder<'a> {
    table: BindingTable<'a>,
    bindings: FxIndexMap<TypeKey, Arc<Binding>>,
    /// The first request that reached each key; parents of the binding stack.
    requested_by: FxHashMap<TypeKey, StackFrame>,
    queue: VecDeque<(ContextualTypeKey, Requester)>,
    failed: FxHashSet<TypeKey>,
    errors: Vec<BindingError>,
}

impl<'a> BindingGraphBuilder<'a> {
    pub fn new(table: BindingTable<'a>) -> Self {
        Self {
            table,
            bindings: FxIndexMap::default(),
            requested_by: FxHashMap::default(),
            queue: VecDeque::new(),
            failed: FxHashSet::default(),
            errors: Vec::new(),
        }
    }

    pub fn table(&self) -> &BindingTable<'a> {
        &self.table
    }

    /// Queue every accessor of `graph` in declaration order, then walk.
    pub fn request_accessors(&mut self, graph: &GraphDeclaration, ctx: &mut ParentContext) {
        for accessor in &graph.accessors {
            self.queue.push_back((
                accessor.key.clone(),
                Requester::Accessor {
                    graph: graph.name.clone(),
                    name: accessor.name.clone(),
                },
            ));
        }
        self.drain(ctx);
    }

    /// Request `key` on behalf of the extension graph `extension`, then walk.
    pub fn request_for_extension(
        &mut self,
        key: TypeKey,
        extension: impl Into<String>,
        ctx: &mut ParentContext,
    ) {
        self.request(
            ContextualTypeKey::direct(key),
            Requester::Extension {
                graph: extension.into(),
            },
            ctx,
        );
    }

    pub fn request(
        &mut self,
        request: ContextualTypeKey,
        requester: Requester,
        ctx: &mut ParentContext,
    ) {
        self.queue.push_back((request, requester));
        self.drain(ctx);
    }

    fn drain(&mut self, ctx: &mut ParentContext) {
        while let Some((request, requester)) = self.queue.pop_front() {
            let key = request.key.clone();
            if self.failed.contains(&key) {
                continue;
            }
            if let Some(existing) = self.bindings.get(&key) {
                // A default only covers the requests that declare one.
                if matches!(existing.as_ref(), Binding::Absent(_)) && !request.has_default {
                    let frame = StackFrame { requester, request };
                    let stack = self.stack_through(frame);
                    self.fail(BindingErrorKind::Unresolved { key }, stack);
                }
                continue;
            }

            self.requested_by
                .entry(key.clone())
                .or_insert_with(|| StackFrame {
                    requester,
                    request: request.clone(),
                });

            let binding = match self.table.binding_for(&key, request.has_default, ctx) {
                Ok(binding) => binding,
                Err(kind) => {
                    let stack = self.stack_for(&key);
                    self.fail(kind, stack);
                    continue;
                }
            };

            if binding.is_alias() {
                if let Err(kind @ BindingErrorKind::AliasCycle { .. }) =
                    self.table.resolve(&request, ctx)
                {
                    if let BindingErrorKind::AliasCycle { chain, .. } = &kind {
                        self.failed.extend(chain.iter().cloned());
                    }
                    let stack = self.stack_for(&key);
                    self.fail(kind, stack);
                    continue;
                }
            }

            trace!(%key, kind = binding.kind_name(), "reached binding");
            for dependency in binding.dependencies() {
                self.queue
                    .push_back((dependency.clone(), Requester::Binding(key.clone())));
            }
            self.bindings.insert(key, binding);
        }
    }

    fn fail(&mut self, kind: BindingErrorKind, stack: BindingStack) {
        if let Some(key) = failed_key(&kind) {
            self.failed.insert(key.clone());
        }
        self.errors.push(BindingError::new(kind).with_stack(stack));
    }

    /// Frames from the outermost request down to `key`.
    fn stack_for(&self, key: &TypeKey) -> BindingStack {
        let mut frames = Vec::new();
        let mut current = key;
        while let Some(frame) = self.requested_by.get(current) {
            frames.push(frame.clone());
            if frames.len() > self.requested_by.len() {
                break;
            }
            match &frame.requester {
                Requester::Binding(parent) => current = parent,
                Requester::Accessor { .. } | Requester::Extension { .. } => break,
            }
        }
        frames.reverse();
        BindingStack::new(frames)
    }

    fn stack_through(&self, frame: StackFrame) -> BindingStack {
        let mut frames = match &frame.requester {
            Requester::Binding(parent) => self.stack_for(parent).frames().to_vec(),
            Requester::Accessor { .. } | Requester::Extension { .. } => Vec::new(),
        };
        frames.push(frame);
        BindingStack::new(frames)
    }

    /// Stop walking and freeze the reached bindings.
    pub fn finish(self) -> (BindingGraph, Vec<BindingError>) {
        debug!(
            graph = self.table.graph(),
            bindings = self.bindings.len(),
            errors = self.errors.len(),
            "finished binding graph"
        );
        let graph = BindingGraph {
            graph: self.table.graph().to_string(),
            bindings: self.bindings,
        };
        (graph, self.errors)
    }
}

fn failed_key(kind: &BindingErrorKind) -> Option<&TypeKey> {
    match kind {
        BindingErrorKind::Unresolved { key }
        | BindingErrorKind::AliasCycle { key, .. }
        | BindingErrorKind::IncompatibleScope { key, .. }
        | BindingErrorKind::EmptyMultibinding { key }
        | BindingErrorKind::Duplicate { key, .. }
        | BindingErrorKind::DuplicateMapKey { key, .. }
        | BindingErrorKind::ShadowedParentBinding { key, .. } => Some(key),
        BindingErrorKind::GenericWithoutArguments { .. } => None,
    }
}

/// The frozen set of bindings reachable from one graph's accessors.
#[derive(Clone, Debug)]
pub struct BindingGraph {
    graph: String,
    bindings: FxIndexMap<TypeKey, Arc<Binding>>,
}

impl BindingGraph {
    pub fn graph(&self) -> &str {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn get(&self, key: &TypeKey) -> Option<&Arc<Binding>> {
        self.bindings.get(key)
    }

    /// Bindings in first-discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (&TypeKey, &Arc<Binding>)> {
        self.bindings.iter()
    }

    /// Edges between reached keys. Keys keep their discovery order as
    /// declaration indices.
    pub fn dependency_graph(&self) -> DependencyGraph<TypeKey> {
        let mut graph = DependencyGraph::with_capacity(self.bindings.len());
        for key in self.bindings.keys() {
            graph.add_node(key.clone());
        }
        for (key, binding) in &self.bindings {
            for dependency in binding.dependencies() {
                if !self.bindings.contains_key(&dependency.key) {
                    continue;
                }
                let kind = if dependency.is_deferred() {
                    EdgeKind::Deferred
                } else {
                    EdgeKind::Direct
                };
                graph.add_dependency(key.clone(), dependency.key.clone(), kind);
            }
        }
        graph
    }

    pub fn sort(&self) -> Result<Topology<TypeKey>, Vec<CycleError<TypeKey>>> {
        self.dependency_graph().sort()
    }
}

#[cfg(test)]
#[path = "../tests/binding_graph_tests.rs"]
mod binding_graph_tests;
