//! Diagnostic types and message lookup for the graph planner.
//!
//! Every fatal error and warning produced while planning a graph is lowered
//! into a [`Diagnostic`]. Diagnostics carry the name of the graph they belong
//! to and, for resolution failures, the binding stack: the chain of requests
//! from the graph's accessor down to the offending key.

use serde::Serialize;

// =============================================================================
// Diagnostic Types
// =============================================================================

/// Diagnostic category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DiagnosticCategory {
    Warning = 0,
    Error = 1,
    Message = 3,
}

/// Related information for a diagnostic (e.g. one frame of a binding stack).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiagnosticRelatedInformation {
    pub message_text: String,
    pub category: DiagnosticCategory,
    pub code: u32,
}

/// A planner diagnostic with optional related information.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Name of the graph the diagnostic was reported against.
    pub graph: String,
    pub message_text: String,
    pub category: DiagnosticCategory,
    pub code: u32,
    /// Requesting chain from the graph root to the offending key, outermost first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub binding_stack: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_information: Vec<DiagnosticRelatedInformation>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    #[must_use]
    pub const fn error(graph: String, message: String, code: u32) -> Self {
        Self {
            graph,
            message_text: message,
            category: DiagnosticCategory::Error,
            code,
            binding_stack: Vec::new(),
            related_information: Vec::new(),
        }
    }

    /// Create a new warning diagnostic.
    #[must_use]
    pub const fn warning(graph: String, message: String, code: u32) -> Self {
        Self {
            graph,
            message_text: message,
            category: DiagnosticCategory::Warning,
            code,
            binding_stack: Vec::new(),
            related_information: Vec::new(),
        }
    }

    /// Build a diagnostic from a registered code, filling the message template.
    ///
    /// Falls back to the raw arguments when the code is not registered.
    #[must_use]
    pub fn from_code(graph: impl Into<String>, code: u32, args: &[&str]) -> Self {
        let graph = graph.into();
        let Some(m) = get_diagnostic_message(code) else {
            return Self::error(graph, args.join(" "), code);
        };
        let message = format_message(m.message, args);
        match m.category {
            DiagnosticCategory::Warning => Self::warning(graph, message, code),
            category => Self {
                category,
                ..Self::error(graph, message, code)
            },
        }
    }

    /// Attach a binding stack (outermost request first).
    #[must_use]
    pub fn with_binding_stack(mut self, stack: Vec<String>) -> Self {
        self.binding_stack = stack;
        self
    }

    /// Add related information to this diagnostic.
    #[must_use]
    pub fn with_related(mut self, message: String) -> Self {
        self.related_information.push(DiagnosticRelatedInformation {
            message_text: message,
            category: DiagnosticCategory::Message,
            code: 0,
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.category == DiagnosticCategory::Error
    }

    /// Render the diagnostic with its binding stack, one frame per line.
    pub fn render(&self) -> String {
        let label = match self.category {
            DiagnosticCategory::Error => "error",
            DiagnosticCategory::Warning => "warning",
            DiagnosticCategory::Message => "message",
        };
        let mut out = format!(
            "{label} BP{}: [{}] {}",
            self.code, self.graph, self.message_text
        );
        if !self.binding_stack.is_empty() {
            out.push_str("\n    requested at");
            for frame in self.binding_stack.iter().rev() {
                out.push_str("\n        ");
                out.push_str(frame);
            }
        }
        for related in &self.related_information {
            out.push_str("\n    ");
            out.push_str(&related.message_text);
        }
        out
    }
}

/// Format a diagnostic message by replacing {0}, {1}, etc. with arguments.
#[must_use]
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}

// =============================================================================
// Message Table
// =============================================================================

/// A diagnostic message definition with code, category, and message template.
#[derive(Clone, Copy, Debug)]
pub struct DiagnosticMessage {
    pub code: u32,
    pub category: DiagnosticCategory,
    pub message: &'static str,
}

pub mod diagnostic_codes {
    pub const UNRESOLVED_BINDING: u32 = 1001;
    pub const DUPLICATE_BINDING: u32 = 1002;
    pub const DEPENDENCY_CYCLE: u32 = 1003;
    pub const GENERIC_CLASS_WITHOUT_ARGUMENTS: u32 = 1004;
    pub const ALIAS_CYCLE: u32 = 1005;
    pub const INCOMPATIBLE_SCOPE: u32 = 1006;
    pub const EMPTY_MULTIBINDING: u32 = 1007;
    pub const DUPLICATE_MAP_KEY: u32 = 1008;
    pub const SHADOWED_PARENT_BINDING: u32 = 1009;
    pub const UNKNOWN_PARENT_GRAPH: u32 = 1010;
    pub const EXTENSION_CYCLE: u32 = 1011;
    pub const NON_CONTIGUOUS_COMPONENT: u32 = 1012;

    pub const OVERSIZED_COMPONENT: u32 = 2001;
}

use diagnostic_codes as codes;

pub static DIAGNOSTIC_MESSAGES: &[DiagnosticMessage] = &[
    DiagnosticMessage {
        code: codes::UNRESOLVED_BINDING,
        category: DiagnosticCategory::Error,
        message: "Cannot find a binding for '{0}'.",
    },
    DiagnosticMessage {
        code: codes::DUPLICATE_BINDING,
        category: DiagnosticCategory::Error,
        message: "'{0}' is bound multiple times in graph '{1}'.",
    },
    DiagnosticMessage {
        code: codes::DEPENDENCY_CYCLE,
        category: DiagnosticCategory::Error,
        message: "Found a dependency cycle without a Provider or Lazy indirection: {0}.",
    },
    DiagnosticMessage {
        code: codes::GENERIC_CLASS_WITHOUT_ARGUMENTS,
        category: DiagnosticCategory::Error,
        message: "Class '{0}' declares type parameters <{1}> but was requested as '{2}'.",
    },
    DiagnosticMessage {
        code: codes::ALIAS_CYCLE,
        category: DiagnosticCategory::Error,
        message: "Alias chain for '{0}' never reaches a concrete binding: {1}.",
    },
    DiagnosticMessage {
        code: codes::INCOMPATIBLE_SCOPE,
        category: DiagnosticCategory::Error,
        message: "'{0}' is scoped to '{1}', which graph '{2}' and its ancestors do not declare.",
    },
    DiagnosticMessage {
        code: codes::EMPTY_MULTIBINDING,
        category: DiagnosticCategory::Error,
        message: "Multibinding '{0}' has no contributors and is not declared with allowEmpty.",
    },
    DiagnosticMessage {
        code: codes::DUPLICATE_MAP_KEY,
        category: DiagnosticCategory::Error,
        message: "Map multibinding '{0}' has more than one contributor for key '{1}'.",
    },
    DiagnosticMessage {
        code: codes::SHADOWED_PARENT_BINDING,
        category: DiagnosticCategory::Error,
        message: "'{0}' is already provided by enclosing graph '{1}'.",
    },
    DiagnosticMessage {
        code: codes::UNKNOWN_PARENT_GRAPH,
        category: DiagnosticCategory::Error,
        message: "Graph '{0}' extends unknown graph '{1}'.",
    },
    DiagnosticMessage {
        code: codes::EXTENSION_CYCLE,
        category: DiagnosticCategory::Error,
        message: "Graph '{0}' is part of a cyclic extension chain: {1}.",
    },
    DiagnosticMessage {
        code: codes::NON_CONTIGUOUS_COMPONENT,
        category: DiagnosticCategory::Error,
        message: "Component {0} is not contiguous in the sorted key list.",
    },
    DiagnosticMessage {
        code: codes::OVERSIZED_COMPONENT,
        category: DiagnosticCategory::Warning,
        message: "Component of {0} keys exceeds the shard bound of {1} and is placed whole in shard {2}.",
    },
];

/// Look up a diagnostic message definition by code.
#[must_use]
pub fn get_diagnostic_message(code: u32) -> Option<&'static DiagnosticMessage> {
    DIAGNOSTIC_MESSAGES.iter().find(|m| m.code == code)
}

/// Get the message template for a diagnostic code.
#[must_use]
pub fn get_message_template(code: u32) -> Option<&'static str> {
    get_diagnostic_message(code).map(|m| m.message)
}

#[cfg(test)]
#[path = "../tests/diagnostics_tests.rs"]
mod diagnostics_tests;
