//! Compiles every graph of a declaration model into a plan.
//!
//! Graphs are grouped into trees: a root graph plus its extension graphs.
//! Trees share nothing, so each one gets its own [`ResolutionContext`] and
//! trees are compiled in parallel. Results are returned in the declaration
//! order of the graphs regardless of which tree finished first.

use crate::config::ResolvedOptions;
use crate::plan::{CompilationResult, GraphPlan, PlannedBinding, PlannedShard, ShardPlan};
use crate::report::GraphReport;
use bindplan_common::Diagnostic;
use bindplan_common::diagnostics::diagnostic_codes;
use bindplan_common::limits::MAX_EXTENSION_DEPTH;
use bindplan_graph::{
    BindingError, BindingErrorKind, BindingGraph, BindingGraphBuilder, BindingTable, ClassIndex,
    ParentContext, Topology,
};
use bindplan_model::{Binding, DeclarationModel, TypeKey};
use bindplan_shard::{chunk_statements, partition};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info_span, warn};

/// Plan every graph in `model`.
#[tracing::instrument(level = "info", skip_all, fields(graphs = model.graphs.len()))]
pub fn compile(model: &DeclarationModel, options: &ResolvedOptions) -> CompilationResult {
    let classes = ClassIndex::new(&model.classes);
    let forest = GraphForest::build(model);
    debug!(
        roots = forest.roots.len(),
        invalid = forest.invalid.len(),
        "grouped graphs into trees"
    );

    let mut plans: Vec<Option<GraphPlan>> = (0..model.graphs.len()).map(|_| None).collect();
    for (index, diagnostic) in &forest.invalid {
        let graph = &model.graphs[*index];
        let mut report = GraphReport::new(&graph.name);
        report.push(diagnostic.clone());
        plans[*index] = Some(GraphPlan::failed(&graph.name, graph.parent.clone(), report));
    }

    let trees: Vec<Vec<(usize, GraphPlan)>> = forest
        .roots
        .par_iter()
        .map(|&root| {
            ResolutionContext::new(model, &classes, &forest.children, options).compile_tree(root)
        })
        .collect();
    for (index, plan) in trees.into_iter().flatten() {
        plans[index] = Some(plan);
    }

    CompilationResult {
        graphs: plans.into_iter().flatten().collect(),
    }
}

// =============================================================================
// Graph trees
// =============================================================================

/// Parent links of a model, validated.
struct GraphForest {
    roots: Vec<usize>,
    /// Extension graphs per graph, in declaration order.
    children: FxHashMap<usize, Vec<usize>>,
    /// Graphs that can never be compiled, with the reason.
    invalid: Vec<(usize, Diagnostic)>,
}

impl GraphForest {
    fn build(model: &DeclarationModel) -> Self {
        let mut by_name: FxHashMap<&str, usize> = FxHashMap::default();
        for (index, graph) in model.graphs.iter().enumerate() {
            by_name.entry(graph.name.as_str()).or_insert(index);
        }

        let mut roots = Vec::new();
        let mut children: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        let mut invalid = Vec::new();

        for (index, graph) in model.graphs.iter().enumerate() {
            match Self::check_ancestry(model, &by_name, index) {
                Ok(()) => match &graph.parent {
                    None => roots.push(index),
                    Some(parent) => {
                        if let Some(&parent) = by_name.get(parent.as_str()) {
                            children.entry(parent).or_default().push(index);
                        }
                    }
                },
                Err(diagnostic) => {
                    warn!(graph = %graph.name, "graph cannot be compiled");
                    invalid.push((index, diagnostic));
                }
            }
        }

        Self {
            roots,
            children,
            invalid,
        }
    }

    /// Walk the parent chain of `index` up to its root.
    fn check_ancestry(
        model: &DeclarationModel,
        by_name: &FxHashMap<&str, usize>,
        index: usize,
    ) -> Result<(), Diagnostic> {
        let name = &model.graphs[index].name;
        let mut chain = vec![name.as_str()];
        let mut seen = FxHashSet::default();
        seen.insert(index);
        let mut current = index;

        while let Some(parent) = &model.graphs[current].parent {
            let Some(&next) = by_name.get(parent.as_str()) else {
                return Err(Diagnostic::from_code(
                    name.as_str(),
                    diagnostic_codes::UNKNOWN_PARENT_GRAPH,
                    &[model.graphs[current].name.as_str(), parent.as_str()],
                ));
            };
            chain.push(model.graphs[next].name.as_str());
            if !seen.insert(next) || chain.len() > MAX_EXTENSION_DEPTH {
                return Err(Diagnostic::from_code(
                    name.as_str(),
                    diagnostic_codes::EXTENSION_CYCLE,
                    &[name.as_str(), &chain.join(" -> ")],
                ));
            }
            current = next;
        }
        Ok(())
    }
}

// =============================================================================
// ResolutionContext
// =============================================================================

/// Compiles one graph tree. Owns every cache and the level stack for that tree.
pub struct ResolutionContext<'m> {
    model: &'m DeclarationModel,
    classes: &'m ClassIndex,
    children: &'m FxHashMap<usize, Vec<usize>>,
    options: &'m ResolvedOptions,
    parents: ParentContext,
    plans: Vec<(usize, GraphPlan)>,
}

impl<'m> ResolutionContext<'m> {
    pub fn new(
        model: &'m DeclarationModel,
        classes: &'m ClassIndex,
        children: &'m FxHashMap<usize, Vec<usize>>,
        options: &'m ResolvedOptions,
    ) -> Self {
        Self {
            model,
            classes,
            children,
            options,
            parents: ParentContext::new(),
            plans: Vec::new(),
        }
    }

    /// Compile `root` and all of its extension graphs.
    pub fn compile_tree(mut self, root: usize) -> Vec<(usize, GraphPlan)> {
        self.compile_graph(root);
        self.plans
    }

    fn compile_graph(&mut self, index: usize) {
        let model = self.model;
        let children = self.children;
        let graph = &model.graphs[index];
        let _span = info_span!("compile_graph", graph = %graph.name).entered();

        let (mut table, mut errors) = BindingTable::build(graph, self.classes);
        let shadowed = table.enter(&mut self.parents);
        for (key, parent_graph) in shadowed {
            errors.push(BindingError::new(BindingErrorKind::ShadowedParentBinding {
                key,
                parent_graph,
            }));
        }

        let mut builder = BindingGraphBuilder::new(table);
        builder.request_accessors(graph, &mut self.parents);

        if let Some(extensions) = children.get(&index) {
            for &child in extensions {
                self.compile_graph(child);
            }
        }

        // Keys extension graphs reached through this one must live here.
        let exposed: Vec<TypeKey> = self
            .parents
            .used_at_current()
            .into_iter()
            .map(|(key, extension)| {
                builder.request_for_extension(key.clone(), extension, &mut self.parents);
                key
            })
            .collect();

        let (bindings, walk_errors) = builder.finish();
        errors.extend(walk_errors);
        let planned = self.planned_bindings(&graph.name, &bindings, &exposed);
        if let Some(closed) = self.parents.pop() {
            debug!(exposed = closed.used.len(), "closed graph level");
        }

        let mut report = GraphReport::new(&graph.name);
        report.binding_count = bindings.len();
        report.extend(errors.iter().map(|e| e.to_diagnostic(&graph.name)));

        let topology = match bindings.sort() {
            Ok(topology) => topology,
            Err(cycles) => {
                report.extend(cycles.iter().map(|c| c.to_diagnostic(&graph.name)));
                self.plans.push((
                    index,
                    GraphPlan::failed(&graph.name, graph.parent.clone(), report),
                ));
                return;
            }
        };
        if report.has_errors() {
            self.plans.push((
                index,
                GraphPlan::failed(&graph.name, graph.parent.clone(), report),
            ));
            return;
        }

        let init_keys = |keys: &[TypeKey]| -> Vec<TypeKey> {
            keys.iter()
                .filter(|key| bindings.get(key).is_some_and(|b| b.needs_init_statement()))
                .cloned()
                .collect()
        };
        let chunk = |keys: Vec<TypeKey>| -> Vec<Vec<TypeKey>> {
            if keys.is_empty() {
                Vec::new()
            } else if self.options.chunk_field_inits {
                chunk_statements(&keys, self.options.statements_per_init_fun)
            } else {
                vec![keys]
            }
        };

        let shard_plan = self.shard(&graph.name, &topology, &mut report, |keys| {
            chunk(init_keys(keys))
        });
        let init_chunks = match &shard_plan {
            Some(_) => Vec::new(),
            None => chunk(init_keys(&topology.sorted_keys)),
        };

        self.plans.push((
            index,
            GraphPlan {
                graph: graph.name.clone(),
                parent: graph.parent.clone(),
                bindings: planned,
                sorted_keys: topology.sorted_keys,
                components: topology.components,
                deferred_keys: topology.deferred_keys,
                init_chunks,
                shard_plan,
                report,
            },
        ));
    }

    /// Attach owners and storage slots while the graph's level is still open.
    fn planned_bindings(
        &self,
        graph: &str,
        bindings: &BindingGraph,
        exposed: &[TypeKey],
    ) -> Vec<PlannedBinding> {
        bindings
            .iter()
            .map(|(key, binding)| {
                let (owner, slot) = match binding.as_ref() {
                    Binding::GraphDependency(dep) => {
                        (dep.slot.owner.clone(), Some(dep.slot.clone()))
                    }
                    _ if binding.scope().is_some() || exposed.contains(key) => {
                        (graph.to_string(), self.parents.slot_of(key).cloned())
                    }
                    _ => (graph.to_string(), None),
                };
                PlannedBinding {
                    key: key.clone(),
                    binding: binding.clone(),
                    owner,
                    slot,
                }
            })
            .collect()
    }

    /// Partition a sorted graph when sharding is on and the graph exceeds the bound.
    fn shard(
        &self,
        graph: &str,
        topology: &Topology<TypeKey>,
        report: &mut GraphReport,
        init_chunks: impl Fn(&[TypeKey]) -> Vec<Vec<TypeKey>>,
    ) -> Option<ShardPlan> {
        let bound = self.options.keys_per_shard;
        if !self.options.enable_sharding || topology.sorted_keys.len() <= bound.get() {
            return None;
        }

        let partition = match partition(&topology.sorted_keys, &topology.component_of, bound) {
            Ok(partition) => partition,
            Err(err) => {
                report.push(err.to_diagnostic(graph));
                return None;
            }
        };
        report.extend(partition.oversized.iter().map(|o| o.to_diagnostic(graph)));
        if partition.len() <= 1 {
            return None;
        }

        report.shard_count = partition.len();
        report.shard_sizes = partition.shard_sizes();
        debug!(shards = partition.len(), "sharded graph");

        let shards = partition
            .shards
            .into_iter()
            .map(|shard| {
                let init_chunks = init_chunks(&shard.keys);
                PlannedShard {
                    index: shard.index,
                    is_chunked: init_chunks.len() > 1,
                    keys: shard.keys,
                    init_chunks,
                }
            })
            .collect();
        Some(ShardPlan {
            keys_per_shard: bound.get(),
            shards,
        })
    }
}

#[cfg(test)]
#[path = "tests/driver_tests.rs"]
mod driver_tests;
