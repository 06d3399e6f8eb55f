//! The declaration model consumed by the planner.
//!
//! An extraction front end produces one [`DeclarationModel`] per compilation
//! unit: the injectable classes it found plus every declared graph with its
//! scopes, parent link, accessors and explicit bindings.

use crate::keys::{ContextualTypeKey, Qualifier, Scope, TypeKey, TypeRef};
use serde::{Deserialize, Serialize};

/// Everything declared in one compilation unit.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationModel {
    #[serde(default)]
    pub classes: Vec<ClassDeclaration>,
    #[serde(default)]
    pub graphs: Vec<GraphDeclaration>,
}

impl DeclarationModel {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn graph(&self, name: &str) -> Option<&GraphDeclaration> {
        self.graphs.iter().find(|g| g.name == name)
    }
}

/// A class the front end found with an injectable constructor, or an object
/// declaration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDeclaration {
    #[serde(rename = "type")]
    pub name: String,
    #[serde(default)]
    pub type_parameters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<Qualifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    pub kind: ClassKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClassKind {
    /// Constructor parameters in declaration order. They may mention the
    /// class's type parameters.
    Injectable {
        #[serde(default)]
        parameters: Vec<ContextualTypeKey>,
    },
    /// A singleton-by-declaration object with no dependencies.
    Object,
}

/// A named root request on a graph (`val repo: Repo`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    pub name: String,
    #[serde(flatten)]
    pub key: ContextualTypeKey,
}

/// One declared graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDeclaration {
    pub name: String,
    #[serde(default)]
    pub scopes: Vec<Scope>,
    /// The enclosing graph, when this graph is an extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub accessors: Vec<Accessor>,
    #[serde(default)]
    pub bindings: Vec<BindingDeclaration>,
}

impl GraphDeclaration {
    pub fn declares_scope(&self, scope: &Scope) -> bool {
        self.scopes.contains(scope)
    }
}

/// One explicitly declared binding.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingDeclaration {
    /// The bound key. For `intoSet`/`elementsIntoSet` this is the element
    /// key, for `intoMap` the value key, for `multibinds` the aggregate key.
    pub key: TypeKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(default)]
    pub dependencies: Vec<ContextualTypeKey>,
    pub kind: DeclarationKind,
    /// Human readable origin (`NetworkModule.provideClient`), used in messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl BindingDeclaration {
    pub fn origin_name(&self) -> String {
        match &self.origin {
            Some(origin) => origin.clone(),
            None => self.key.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeclarationKind {
    /// An explicit factory.
    Provides { factory: String },
    /// An alias: `key` is satisfied by whatever satisfies `target`.
    Binds { target: TypeKey },
    /// Contributes one element to `Set<key>`.
    IntoSet,
    /// Contributes a collection of elements to `Set<key>`.
    ElementsIntoSet,
    /// Contributes one entry to `Map<mapKey.type, key>`.
    #[serde(rename_all = "camelCase")]
    IntoMap { map_key: MapKey },
    /// Declares a multibinding aggregate that may exist without contributors.
    #[serde(rename_all = "camelCase")]
    Multibinds {
        #[serde(default)]
        allow_empty: bool,
    },
}

impl DeclarationKind {
    pub const fn is_contribution(&self) -> bool {
        matches!(
            self,
            DeclarationKind::IntoSet
                | DeclarationKind::ElementsIntoSet
                | DeclarationKind::IntoMap { .. }
        )
    }
}

/// The key of one map multibinding entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapKey {
    #[serde(rename = "type")]
    pub ty: TypeRef,
    pub value: String,
}

#[cfg(test)]
#[path = "../tests/declarations_tests.rs"]
mod declarations_tests;
