//! bindplan: compile-time dependency-graph planning.
//!
//! The workspace is split the same way a planning run flows:
//!
//! - `bindplan-model`: keys, declarations and the `Binding` sum type
//! - `bindplan-graph`: binding tables, the walk from accessors, the
//!   extension-graph context and the topological sort
//! - `bindplan-shard`: splitting a sorted graph into bounded shards
//!
//! This crate ties them together: [`driver::compile`] turns a
//! [`DeclarationModel`] into a [`CompilationResult`].

pub mod config;
pub mod driver;
pub mod plan;
pub mod report;
pub mod tracing_config;

pub use bindplan_common::{Diagnostic, DiagnosticCategory};
pub use bindplan_model::DeclarationModel;
pub use config::{PlannerOptions, ResolvedOptions, load_options, parse_options, resolve_options};
pub use driver::{ResolutionContext, compile};
pub use plan::{CompilationResult, GraphPlan, PlannedBinding, PlannedShard, ShardPlan};
pub use report::GraphReport;
