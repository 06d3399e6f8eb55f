//! Resolved binding kinds.
//!
//! [`Binding`] is a closed sum type: every consumer matches it exhaustively so
//! that adding a kind is a compile-checked change at each site that cares.

use crate::keys::{ContextualTypeKey, Scope, TypeKey, TypeRef};
use serde::Serialize;
use std::fmt;

/// A named storage field owned by one graph level.
///
/// Two references to the same slot compare equal; that equality is how
/// descendants prove they share an ancestor's instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct StorageSlot {
    /// Graph owning the slot.
    pub owner: String,
    /// Nesting depth of the owning graph (0 = root).
    pub depth: u32,
    pub name: String,
}

impl fmt::Display for StorageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Binding {
    Provided(ProvidedBinding),
    ConstructorInjected(ConstructorBinding),
    Alias(AliasBinding),
    Multibinding(Multibinding),
    ObjectInstance(ObjectBinding),
    GraphDependency(GraphDependencyBinding),
    Absent(AbsentBinding),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProvidedBinding {
    pub key: TypeKey,
    pub scope: Option<Scope>,
    pub factory: String,
    pub dependencies: Vec<ContextualTypeKey>,
    /// The factory returns a collection whose elements are spliced into a set.
    pub provides_elements: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConstructorBinding {
    pub key: TypeKey,
    /// The concrete class type with type arguments applied.
    pub class: TypeRef,
    pub scope: Option<Scope>,
    pub dependencies: Vec<ContextualTypeKey>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AliasBinding {
    pub key: TypeKey,
    pub target: ContextualTypeKey,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MultibindingKind {
    Set,
    Map,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Contributor {
    pub key: TypeKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_key: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Multibinding {
    pub key: TypeKey,
    #[serde(rename = "collection")]
    pub kind: MultibindingKind,
    /// Contributors in declaration-discovery order.
    pub contributors: Vec<Contributor>,
    pub allow_empty: bool,
    pub dependencies: Vec<ContextualTypeKey>,
}

impl Multibinding {
    pub fn new(
        key: TypeKey,
        kind: MultibindingKind,
        contributors: Vec<Contributor>,
        allow_empty: bool,
    ) -> Self {
        let dependencies = contributors
            .iter()
            .map(|c| ContextualTypeKey::direct(c.key.clone()))
            .collect();
        Self {
            key,
            kind,
            contributors,
            allow_empty,
            dependencies,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ObjectBinding {
    pub key: TypeKey,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GraphDependencyBinding {
    pub key: TypeKey,
    pub slot: StorageSlot,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AbsentBinding {
    pub key: TypeKey,
}

impl Binding {
    pub fn key(&self) -> &TypeKey {
        match self {
            Binding::Provided(b) => &b.key,
            Binding::ConstructorInjected(b) => &b.key,
            Binding::Alias(b) => &b.key,
            Binding::Multibinding(b) => &b.key,
            Binding::ObjectInstance(b) => &b.key,
            Binding::GraphDependency(b) => &b.key,
            Binding::Absent(b) => &b.key,
        }
    }

    pub fn scope(&self) -> Option<&Scope> {
        match self {
            Binding::Provided(b) => b.scope.as_ref(),
            Binding::ConstructorInjected(b) => b.scope.as_ref(),
            Binding::Alias(_)
            | Binding::Multibinding(_)
            | Binding::ObjectInstance(_)
            | Binding::GraphDependency(_)
            | Binding::Absent(_) => None,
        }
    }

    /// Outgoing dependency edges, in declaration order.
    pub fn dependencies(&self) -> &[ContextualTypeKey] {
        match self {
            Binding::Provided(b) => &b.dependencies,
            Binding::ConstructorInjected(b) => &b.dependencies,
            Binding::Alias(b) => std::slice::from_ref(&b.target),
            Binding::Multibinding(b) => &b.dependencies,
            Binding::ObjectInstance(_) | Binding::GraphDependency(_) | Binding::Absent(_) => &[],
        }
    }

    pub const fn kind_name(&self) -> &'static str {
        match self {
            Binding::Provided(_) => "Provided",
            Binding::ConstructorInjected(_) => "ConstructorInjected",
            Binding::Alias(_) => "Alias",
            Binding::Multibinding(_) => "Multibinding",
            Binding::ObjectInstance(_) => "ObjectInstance",
            Binding::GraphDependency(_) => "GraphDependency",
            Binding::Absent(_) => "Absent",
        }
    }

    pub const fn is_alias(&self) -> bool {
        matches!(self, Binding::Alias(_))
    }

    /// Whether emitting this binding needs an init statement in its shard.
    ///
    /// Aliases cost nothing, absent keys use the default at the call site,
    /// and graph dependencies read an ancestor's slot.
    pub const fn needs_init_statement(&self) -> bool {
        match self {
            Binding::Provided(_)
            | Binding::ConstructorInjected(_)
            | Binding::Multibinding(_)
            | Binding::ObjectInstance(_) => true,
            Binding::Alias(_) | Binding::GraphDependency(_) | Binding::Absent(_) => false,
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Provided(b) => write!(f, "{} (provided by {})", b.key, b.factory),
            Binding::ConstructorInjected(b) => write!(f, "{} (constructor of {})", b.key, b.class),
            Binding::Alias(b) => write!(f, "{} (alias of {})", b.key, b.target.key),
            Binding::Multibinding(b) => write!(
                f,
                "{} ({} contributor{})",
                b.key,
                b.contributors.len(),
                if b.contributors.len() == 1 { "" } else { "s" }
            ),
            Binding::ObjectInstance(b) => write!(f, "{} (object)", b.key),
            Binding::GraphDependency(b) => write!(f, "{} (from {})", b.key, b.slot),
            Binding::Absent(b) => write!(f, "{} (absent, default used)", b.key),
        }
    }
}
