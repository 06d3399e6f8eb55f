//! Type identities used as binding lookup keys.
//!
//! A [`TypeKey`] is a structural type reference plus an optional qualifier.
//! A [`ContextualTypeKey`] is what a dependency parameter actually asks for:
//! the key, how it is wrapped (direct, `Provider`, `Lazy`), and whether the
//! declaration site carries a default value.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// TypeRef
// =============================================================================

/// A structural type reference: a name plus ordered type arguments.
///
/// Serialized as its textual form (`Map<String, Plugin>`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeRef {
    name: String,
    args: Vec<TypeRef>,
}

impl TypeRef {
    /// A type without type arguments.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// `Set<element>`, the aggregate type of a set multibinding.
    pub fn set_of(element: TypeRef) -> Self {
        Self::generic("Set", vec![element])
    }

    /// `Map<key, value>`, the aggregate type of a map multibinding.
    pub fn map_of(key: TypeRef, value: TypeRef) -> Self {
        Self::generic("Map", vec![key, value])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[TypeRef] {
        &self.args
    }

    /// The last dotted segment of the name (`com.app.HttpClient` -> `HttpClient`).
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Replace type variables by name. Variables never carry arguments.
    pub fn substitute(&self, bindings: &FxHashMap<&str, &TypeRef>) -> TypeRef {
        if self.args.is_empty() {
            if let Some(&replacement) = bindings.get(self.name.as_str()) {
                return replacement.clone();
            }
        }
        TypeRef {
            name: self.name.clone(),
            args: self.args.iter().map(|a| a.substitute(bindings)).collect(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            f.write_str("<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{arg}")?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for TypeRef {
    type Error = TypeRefParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for TypeRef {
    type Err = TypeRefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = TypeRefParser { input: s, pos: 0 };
        let ty = parser.parse_type()?;
        parser.skip_ws();
        if parser.pos != s.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(ty)
    }
}

/// Error returned when a textual type reference is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRefParseError {
    pub input: String,
    pub position: usize,
    pub message: &'static str,
}

impl fmt::Display for TypeRefParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid type '{}' at offset {}: {}",
            self.input, self.position, self.message
        )
    }
}

impl std::error::Error for TypeRefParseError {}

struct TypeRefParser<'a> {
    input: &'a str,
    pos: usize,
}

impl TypeRefParser<'_> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self, c: char) {
        self.pos += c.len_utf8();
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.bump(c);
        }
    }

    fn error(&self, message: &'static str) -> TypeRefParseError {
        TypeRefParseError {
            input: self.input.to_string(),
            position: self.pos,
            message,
        }
    }

    fn parse_type(&mut self) -> Result<TypeRef, TypeRefParseError> {
        self.skip_ws();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '.' | '$' | '?' | '*') {
                self.bump(c);
            } else {
                break;
            }
        }
        if start == self.pos {
            return Err(self.error("expected a type name"));
        }
        let name = self.input[start..self.pos].to_string();

        self.skip_ws();
        let mut args = Vec::new();
        if self.peek() == Some('<') {
            self.bump('<');
            loop {
                args.push(self.parse_type()?);
                self.skip_ws();
                match self.peek() {
                    Some(',') => self.bump(','),
                    Some('>') => {
                        self.bump('>');
                        break;
                    }
                    _ => return Err(self.error("expected ',' or '>'")),
                }
            }
        }
        Ok(TypeRef { name, args })
    }
}

// =============================================================================
// Qualifier / Scope
// =============================================================================

/// An opaque annotation value distinguishing bindings of the same type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Qualifier(String);

impl Qualifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A lifecycle marker. A scoped binding has one instance per graph declaring the scope.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

// =============================================================================
// TypeKey
// =============================================================================

/// A type identity plus optional qualifier. The primary map key everywhere.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeKey {
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<Qualifier>,
}

impl TypeKey {
    pub fn new(ty: TypeRef) -> Self {
        Self {
            ty,
            qualifier: None,
        }
    }

    pub fn qualified(ty: TypeRef, qualifier: Qualifier) -> Self {
        Self {
            ty,
            qualifier: Some(qualifier),
        }
    }

    /// The synthetic key of the `ordinal`-th contributor to `aggregate`.
    ///
    /// Each contributor needs its own key so that two contributions of the
    /// same element type stay distinct nodes in the binding graph.
    pub fn contributor(aggregate: &TypeKey, element: &TypeRef, ordinal: usize) -> Self {
        Self {
            ty: element.clone(),
            qualifier: Some(Qualifier(format!(
                "MultibindingElement({aggregate}, {ordinal})"
            ))),
        }
    }

    /// The synthetic key through which an extension graph's `aggregate`
    /// includes everything `graph`, an enclosing graph, contributes to it.
    pub fn inherited(aggregate: &TypeKey, graph: &str) -> Self {
        Self {
            ty: aggregate.ty.clone(),
            qualifier: Some(Qualifier(format!(
                "InheritedMultibinding({aggregate}, {graph})"
            ))),
        }
    }

    /// Same qualifier, different type. Used to derive aggregate keys.
    pub fn with_type(&self, ty: TypeRef) -> Self {
        Self {
            ty,
            qualifier: self.qualifier.clone(),
        }
    }
}

impl From<TypeRef> for TypeKey {
    fn from(ty: TypeRef) -> Self {
        Self::new(ty)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{q} {}", self.ty),
            None => write!(f, "{}", self.ty),
        }
    }
}

impl FromStr for TypeKey {
    type Err = TypeRefParseError;

    /// Parses `Type` or `@qualifier Type`. The qualifier ends at the first
    /// whitespace outside parentheses.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some(rest) = s.strip_prefix('@') else {
            return Ok(Self::new(s.parse()?));
        };
        let mut depth = 0i32;
        let mut split = None;
        for (i, c) in rest.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                c if c.is_whitespace() && depth == 0 => {
                    split = Some(i);
                    break;
                }
                _ => {}
            }
        }
        let Some(split) = split else {
            return Err(TypeRefParseError {
                input: s.to_string(),
                position: s.len(),
                message: "qualifier must be followed by a type",
            });
        };
        Ok(Self::qualified(
            rest[split..].parse()?,
            Qualifier::new(&rest[..split]),
        ))
    }
}

// =============================================================================
// ContextualTypeKey
// =============================================================================

/// How a dependency is wrapped at the request site.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WrappingKind {
    #[default]
    Direct,
    /// `Provider<T>`: resolved on each call, may break a cycle.
    Provider,
    /// `Lazy<T>`: resolved once on first use, may break a cycle.
    Lazy,
}

impl WrappingKind {
    /// Deferred edges may participate in a cycle.
    pub const fn is_deferred(self) -> bool {
        !matches!(self, WrappingKind::Direct)
    }
}

/// A dependency request: a key, its wrapping, and whether a default covers it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextualTypeKey {
    #[serde(flatten)]
    pub key: TypeKey,
    #[serde(default)]
    pub wrapping: WrappingKind,
    #[serde(default)]
    pub has_default: bool,
}

impl ContextualTypeKey {
    pub fn direct(key: TypeKey) -> Self {
        Self {
            key,
            wrapping: WrappingKind::Direct,
            has_default: false,
        }
    }

    pub fn provider(key: TypeKey) -> Self {
        Self {
            key,
            wrapping: WrappingKind::Provider,
            has_default: false,
        }
    }

    pub fn lazy(key: TypeKey) -> Self {
        Self {
            key,
            wrapping: WrappingKind::Lazy,
            has_default: false,
        }
    }

    #[must_use]
    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn is_deferred(&self) -> bool {
        self.wrapping.is_deferred()
    }
}

impl fmt::Display for ContextualTypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.wrapping {
            WrappingKind::Direct => write!(f, "{}", self.key)?,
            WrappingKind::Provider => write!(f, "Provider<{}>", self.key)?,
            WrappingKind::Lazy => write!(f, "Lazy<{}>", self.key)?,
        }
        if self.has_default {
            f.write_str(" = default")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/keys_tests.rs"]
mod keys_tests;
