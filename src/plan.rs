//! Resolution and shard plans handed to code generation.

use crate::report::GraphReport;
use bindplan_common::Diagnostic;
use bindplan_graph::Component;
use bindplan_model::{Binding, StorageSlot, TypeKey};
use serde::Serialize;
use std::sync::Arc;

/// One reached key and how it is satisfied.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedBinding {
    pub key: TypeKey,
    pub binding: Arc<Binding>,
    /// Graph whose generated code holds the instance.
    pub owner: String,
    /// Storage field, for scoped keys and keys shared with extension graphs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<StorageSlot>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedShard {
    pub index: usize,
    pub keys: Vec<TypeKey>,
    /// Keys needing an init statement, split into init functions.
    pub init_chunks: Vec<Vec<TypeKey>>,
    pub is_chunked: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardPlan {
    pub keys_per_shard: usize,
    pub shards: Vec<PlannedShard>,
}

impl ShardPlan {
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Index of the shard holding `key`.
    pub fn shard_of(&self, key: &TypeKey) -> Option<usize> {
        self.shards
            .iter()
            .find(|shard| shard.keys.contains(key))
            .map(|shard| shard.index)
    }
}

/// Everything planned for one graph.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphPlan {
    pub graph: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub bindings: Vec<PlannedBinding>,
    pub sorted_keys: Vec<TypeKey>,
    pub components: Vec<Component<TypeKey>>,
    pub deferred_keys: Vec<TypeKey>,
    /// Init chunks for the whole graph when it is not sharded.
    pub init_chunks: Vec<Vec<TypeKey>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard_plan: Option<ShardPlan>,
    pub report: GraphReport,
}

impl GraphPlan {
    /// A plan that carries only a report, for graphs that could not be compiled.
    pub fn failed(graph: impl Into<String>, parent: Option<String>, report: GraphReport) -> Self {
        Self {
            graph: graph.into(),
            parent,
            bindings: Vec::new(),
            sorted_keys: Vec::new(),
            components: Vec::new(),
            deferred_keys: Vec::new(),
            init_chunks: Vec::new(),
            shard_plan: None,
            report,
        }
    }

    pub fn binding(&self, key: &TypeKey) -> Option<&PlannedBinding> {
        self.bindings.iter().find(|b| &b.key == key)
    }

    pub fn has_errors(&self) -> bool {
        self.report.has_errors()
    }
}

/// Plans for every graph of a model, in declaration order.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CompilationResult {
    pub graphs: Vec<GraphPlan>,
}

impl CompilationResult {
    pub fn graph(&self, name: &str) -> Option<&GraphPlan> {
        self.graphs.iter().find(|g| g.graph == name)
    }

    pub fn has_errors(&self) -> bool {
        self.graphs.iter().any(GraphPlan::has_errors)
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.graphs
            .iter()
            .flat_map(|g| g.report.errors.iter().chain(&g.report.warnings))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
