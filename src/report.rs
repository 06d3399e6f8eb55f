//! Per-graph summary of a planning run.

use bindplan_common::Diagnostic;
use serde::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphReport {
    pub graph: String,
    pub binding_count: usize,
    /// Zero when the graph was not sharded.
    pub shard_count: usize,
    pub shard_sizes: Vec<usize>,
    pub warnings: Vec<Diagnostic>,
    pub errors: Vec<Diagnostic>,
}

impl GraphReport {
    pub fn new(graph: impl Into<String>) -> Self {
        Self {
            graph: graph.into(),
            ..Self::default()
        }
    }

    /// File a diagnostic under errors or warnings by its category.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            self.errors.push(diagnostic);
        } else {
            self.warnings.push(diagnostic);
        }
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.push(diagnostic);
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Errors first, then warnings, one rendered diagnostic per block.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (index, diagnostic) in self.errors.iter().chain(&self.warnings).enumerate() {
            if index > 0 {
                out.push('\n');
            }
            out.push_str(&diagnostic.render());
        }
        out
    }
}
