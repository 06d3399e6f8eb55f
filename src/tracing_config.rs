//! Tracing setup for planner runs.
//!
//! Output format is picked by `BINDPLAN_LOG_FORMAT`:
//!
//! - `text` (default): flat `tracing-subscriber` lines
//! - `tree`: indented spans via `tracing-tree`, one level per graph
//! - `json`: one JSON object per event
//!
//! Call [`init_tracing`] once before [`crate::compile`]:
//!
//! ```no_run
//! # let model = bindplan::DeclarationModel::from_json(r#"{ "graphs": [] }"#).unwrap();
//! bindplan::tracing_config::init_tracing();
//! let result = bindplan::compile(&model, &bindplan::ResolvedOptions::default());
//! ```
//!
//! The end-to-end tests install it too:
//!
//! ```bash
//! BINDPLAN_LOG=debug BINDPLAN_LOG_FORMAT=tree cargo test --test scenarios
//! BINDPLAN_LOG="bindplan_graph::topology=trace" cargo test --test scenarios
//! ```
//!
//! Nothing is installed unless `BINDPLAN_LOG` or `RUST_LOG` is set.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

const LOG_VAR: &str = "BINDPLAN_LOG";
const FORMAT_VAR: &str = "BINDPLAN_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Tree,
    Json,
}

impl LogFormat {
    /// Unknown values fall back to [`LogFormat::Text`].
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "tree" => Self::Tree,
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    fn from_env() -> Self {
        Self::parse(&std::env::var(FORMAT_VAR).unwrap_or_default())
    }
}

/// `BINDPLAN_LOG` wins over `RUST_LOG`.
fn build_filter() -> Option<EnvFilter> {
    match std::env::var(LOG_VAR) {
        Ok(directives) => Some(EnvFilter::builder().parse_lossy(directives)),
        Err(_) if std::env::var("RUST_LOG").is_ok() => Some(EnvFilter::from_default_env()),
        Err(_) => None,
    }
}

/// Install the global subscriber, writing to stderr.
///
/// Returns `false` when logging is not requested or a subscriber is already
/// installed.
pub fn init_tracing() -> bool {
    let Some(filter) = build_filter() else {
        return false;
    };

    match LogFormat::from_env() {
        LogFormat::Tree => {
            let tree_layer = tracing_tree::HierarchicalLayer::new(2)
                .with_indent_lines(true)
                .with_deferred_spans(true)
                .with_targets(true)
                .with_writer(std::io::stderr);
            Registry::default().with(filter).with(tree_layer).try_init().is_ok()
        }
        LogFormat::Json => {
            let json_layer = fmt::layer().json().with_writer(std::io::stderr);
            Registry::default().with(filter).with(json_layer).try_init().is_ok()
        }
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok(),
    }
}
