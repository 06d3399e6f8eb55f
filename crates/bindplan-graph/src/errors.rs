//! Resolution errors and binding stacks.
//!
//! Errors are accumulated rather than returned at the first failure, so one
//! pass over a graph tree surfaces every problem. Each error keeps the binding
//! stack that led to it and lowers into a [`Diagnostic`] for reporting.

use bindplan_common::Diagnostic;
use bindplan_common::diagnostics::diagnostic_codes;
use bindplan_model::{ContextualTypeKey, Scope, TypeKey, TypeRef};
use std::fmt;

/// Who asked for a key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requester {
    /// A named accessor on the graph itself.
    Accessor { graph: String, name: String },
    /// A key referenced by a descendant graph and exposed through this one.
    Extension { graph: String },
    /// Another binding's dependency.
    Binding(TypeKey),
}

/// One frame of a binding stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackFrame {
    pub requester: Requester,
    pub request: ContextualTypeKey,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.requester {
            Requester::Accessor { graph, name } => {
                write!(f, "{graph}.{name}: {}", self.request)
            }
            Requester::Extension { graph } => {
                write!(f, "{} exposed to extension graph {graph}", self.request)
            }
            Requester::Binding(key) => write!(f, "{key} requests {}", self.request),
        }
    }
}

/// Requesting chain from a graph root down to an offending key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BindingStack {
    frames: Vec<StackFrame>,
}

impl BindingStack {
    pub fn new(frames: Vec<StackFrame>) -> Self {
        Self { frames }
    }

    /// Frames, outermost request first.
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn render(&self) -> Vec<String> {
        self.frames.iter().map(ToString::to_string).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindingErrorKind {
    Unresolved {
        key: TypeKey,
    },
    Duplicate {
        key: TypeKey,
        graph: String,
        origins: Vec<String>,
    },
    GenericWithoutArguments {
        class: String,
        type_parameters: Vec<String>,
        requested: TypeRef,
    },
    AliasCycle {
        key: TypeKey,
        chain: Vec<TypeKey>,
    },
    IncompatibleScope {
        key: TypeKey,
        scope: Scope,
        graph: String,
    },
    EmptyMultibinding {
        key: TypeKey,
    },
    DuplicateMapKey {
        key: TypeKey,
        map_key: String,
        origins: Vec<String>,
    },
    ShadowedParentBinding {
        key: TypeKey,
        parent_graph: String,
    },
}

/// A fatal resolution error plus the binding stack that reached it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingError {
    pub kind: BindingErrorKind,
    pub stack: BindingStack,
}

impl BindingError {
    pub fn new(kind: BindingErrorKind) -> Self {
        Self {
            kind,
            stack: BindingStack::default(),
        }
    }

    #[must_use]
    pub fn with_stack(mut self, stack: BindingStack) -> Self {
        self.stack = stack;
        self
    }

    pub const fn code(&self) -> u32 {
        match &self.kind {
            BindingErrorKind::Unresolved { .. } => diagnostic_codes::UNRESOLVED_BINDING,
            BindingErrorKind::Duplicate { .. } => diagnostic_codes::DUPLICATE_BINDING,
            BindingErrorKind::GenericWithoutArguments { .. } => {
                diagnostic_codes::GENERIC_CLASS_WITHOUT_ARGUMENTS
            }
            BindingErrorKind::AliasCycle { .. } => diagnostic_codes::ALIAS_CYCLE,
            BindingErrorKind::IncompatibleScope { .. } => diagnostic_codes::INCOMPATIBLE_SCOPE,
            BindingErrorKind::EmptyMultibinding { .. } => diagnostic_codes::EMPTY_MULTIBINDING,
            BindingErrorKind::DuplicateMapKey { .. } => diagnostic_codes::DUPLICATE_MAP_KEY,
            BindingErrorKind::ShadowedParentBinding { .. } => {
                diagnostic_codes::SHADOWED_PARENT_BINDING
            }
        }
    }

    pub fn to_diagnostic(&self, graph: &str) -> Diagnostic {
        let diag = match &self.kind {
            BindingErrorKind::Unresolved { key } => {
                Diagnostic::from_code(graph, self.code(), &[&key.to_string()])
            }
            BindingErrorKind::Duplicate {
                key,
                graph: owner,
                origins,
            } => origins.iter().fold(
                Diagnostic::from_code(graph, self.code(), &[&key.to_string(), owner]),
                |d, origin| d.with_related(format!("declared by {origin}")),
            ),
            BindingErrorKind::GenericWithoutArguments {
                class,
                type_parameters,
                requested,
            } => Diagnostic::from_code(
                graph,
                self.code(),
                &[class, &type_parameters.join(", "), &requested.to_string()],
            ),
            BindingErrorKind::AliasCycle { key, chain } => Diagnostic::from_code(
                graph,
                self.code(),
                &[&key.to_string(), &render_chain(chain)],
            ),
            BindingErrorKind::IncompatibleScope {
                key,
                scope,
                graph: requester,
            } => Diagnostic::from_code(
                graph,
                self.code(),
                &[&key.to_string(), &scope.to_string(), requester],
            ),
            BindingErrorKind::EmptyMultibinding { key } => {
                Diagnostic::from_code(graph, self.code(), &[&key.to_string()])
            }
            BindingErrorKind::DuplicateMapKey {
                key,
                map_key,
                origins,
            } => origins.iter().fold(
                Diagnostic::from_code(graph, self.code(), &[&key.to_string(), map_key]),
                |d, origin| d.with_related(format!("contributed by {origin}")),
            ),
            BindingErrorKind::ShadowedParentBinding { key, parent_graph } => {
                Diagnostic::from_code(graph, self.code(), &[&key.to_string(), parent_graph])
            }
        };
        diag.with_binding_stack(self.stack.render())
    }
}

impl fmt::Display for BindingErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingErrorKind::Unresolved { key } => write!(f, "cannot find a binding for {key}"),
            BindingErrorKind::Duplicate { key, graph, origins } => write!(
                f,
                "{key} is bound {} times in {graph} ({})",
                origins.len(),
                origins.join(", ")
            ),
            BindingErrorKind::GenericWithoutArguments {
                class, requested, ..
            } => write!(f, "generic class {class} requested as {requested}"),
            BindingErrorKind::AliasCycle { key, chain } => {
                write!(f, "alias cycle at {key}: {}", render_chain(chain))
            }
            BindingErrorKind::IncompatibleScope { key, scope, graph } => {
                write!(f, "{key} is scoped to {scope}, unavailable in {graph}")
            }
            BindingErrorKind::EmptyMultibinding { key } => {
                write!(f, "multibinding {key} has no contributors")
            }
            BindingErrorKind::DuplicateMapKey { key, map_key, .. } => {
                write!(f, "map multibinding {key} repeats key {map_key}")
            }
            BindingErrorKind::ShadowedParentBinding { key, parent_graph } => {
                write!(f, "{key} is already provided by {parent_graph}")
            }
        }
    }
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for frame in self.stack.frames().iter().rev() {
            write!(f, "\n    at {frame}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BindingError {}

pub(crate) fn render_chain<K: fmt::Display>(chain: &[K]) -> String {
    chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
