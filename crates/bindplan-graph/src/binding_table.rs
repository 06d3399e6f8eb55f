//! Key-to-binding lookup for one graph.
//!
//! [`BindingTable::build`] indexes a graph's explicit declarations: provided
//! bindings, aliases and multibinding contributions. Keys with no explicit
//! declaration fall back to the enclosing levels of the [`ParentContext`] and
//! then to constructor injection through the [`ClassIndex`]. Every lookup is
//! memoized in the table, which lives exactly as long as one compilation of
//! its graph.

use crate::FxIndexMap;
use crate::errors::{BindingError, BindingErrorKind};
use crate::parent_context::ParentContext;
use bindplan_common::limits::INITIAL_GRAPH_CAPACITY;
use bindplan_model::{
    AbsentBinding, AliasBinding, Binding, BindingDeclaration, ClassDeclaration, ClassKind,
    ConstructorBinding, ContextualTypeKey, Contributor, DeclarationKind, GraphDeclaration,
    GraphDependencyBinding, Multibinding, MultibindingKind, ObjectBinding, ProvidedBinding,
    Qualifier, Scope, TypeKey, TypeRef,
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::{debug, trace};

// =============================================================================
// ClassIndex
// =============================================================================

/// Injectable classes and objects, by type name and qualifier.
#[derive(Debug, Default)]
pub struct ClassIndex {
    classes: FxHashMap<(String, Option<Qualifier>), ClassDeclaration>,
}

impl ClassIndex {
    /// Index `classes`. The first declaration of a name wins.
    pub fn new(classes: &[ClassDeclaration]) -> Self {
        let mut index = FxHashMap::default();
        for class in classes {
            index
                .entry((class.name.clone(), class.qualifier.clone()))
                .or_insert_with(|| class.clone());
        }
        Self { classes: index }
    }

    pub fn get(&self, key: &TypeKey) -> Option<&ClassDeclaration> {
        self.classes
            .get(&(key.ty.name().to_string(), key.qualifier.clone()))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

// =============================================================================
// BindingSet
// =============================================================================

/// What a request resolves to once aliases are followed.
#[derive(Clone, Debug)]
pub enum BindingSet {
    Single(Arc<Binding>),
    /// A multibinding aggregate plus every contributor, in declaration order.
    Multi {
        aggregate: Arc<Binding>,
        contributors: Vec<Arc<Binding>>,
    },
}

impl BindingSet {
    /// The terminal binding (the aggregate for a multibinding).
    pub fn binding(&self) -> &Arc<Binding> {
        match self {
            BindingSet::Single(binding) => binding,
            BindingSet::Multi { aggregate, .. } => aggregate,
        }
    }

    pub fn contributors(&self) -> &[Arc<Binding>] {
        match self {
            BindingSet::Single(_) => &[],
            BindingSet::Multi { contributors, .. } => contributors,
        }
    }
}

// =============================================================================
// BindingTable
// =============================================================================

#[derive(Debug)]
struct Aggregate {
    kind: MultibindingKind,
    contributors: Vec<Contributor>,
    allow_empty: bool,
    /// Map-key value to the origin that first claimed it.
    map_keys: FxHashMap<String, String>,
}

impl Aggregate {
    fn new(kind: MultibindingKind) -> Self {
        Self {
            kind,
            contributors: Vec::new(),
            allow_empty: false,
            map_keys: FxHashMap::default(),
        }
    }
}

#[derive(Clone, Debug)]
enum Lookup {
    Found(Arc<Binding>),
    Missing,
    Failed(BindingErrorKind),
}

/// Bindings visible to one graph, with a per-table memo.
#[derive(Debug)]
pub struct BindingTable<'a> {
    graph: String,
    scopes: Vec<Scope>,
    classes: &'a ClassIndex,
    explicit: FxIndexMap<TypeKey, Arc<Binding>>,
    contributors: FxHashSet<TypeKey>,
    /// Inherited contributor key to the aggregate and the enclosing level holding it.
    inherited: FxHashMap<TypeKey, (TypeKey, usize)>,
    cache: FxHashMap<TypeKey, Lookup>,
    absent: FxHashMap<TypeKey, Arc<Binding>>,
}

impl<'a> BindingTable<'a> {
    /// Index the explicit declarations of `graph`.
    ///
    /// Declaration errors (duplicates, map-key collisions, undeclared scopes)
    /// are returned alongside the table; the first declaration of a key wins.
    #[tracing::instrument(level = "debug", skip_all, fields(graph = %graph.name))]
    pub fn build(graph: &GraphDeclaration, classes: &'a ClassIndex) -> (Self, Vec<BindingError>) {
        let mut errors = Vec::new();
        let mut explicit: FxIndexMap<TypeKey, Arc<Binding>> =
            FxIndexMap::with_capacity_and_hasher(INITIAL_GRAPH_CAPACITY, Default::default());
        let mut origins: FxIndexMap<TypeKey, Vec<String>> = FxIndexMap::default();
        let mut aggregates: FxIndexMap<TypeKey, Aggregate> = FxIndexMap::default();
        let mut contributors = FxHashSet::default();

        for decl in &graph.bindings {
            if let Some(scope) = &decl.scope {
                if !graph.declares_scope(scope) {
                    errors.push(BindingError::new(BindingErrorKind::IncompatibleScope {
                        key: decl.key.clone(),
                        scope: scope.clone(),
                        graph: graph.name.clone(),
                    }));
                }
            }

            match &decl.kind {
                DeclarationKind::Provides { factory } => {
                    origins
                        .entry(decl.key.clone())
                        .or_default()
                        .push(decl.origin_name());
                    explicit.entry(decl.key.clone()).or_insert_with(|| {
                        Arc::new(Binding::Provided(ProvidedBinding {
                            key: decl.key.clone(),
                            scope: decl.scope.clone(),
                            factory: factory.clone(),
                            dependencies: decl.dependencies.clone(),
                            provides_elements: false,
                        }))
                    });
                }
                DeclarationKind::Binds { target } => {
                    origins
                        .entry(decl.key.clone())
                        .or_default()
                        .push(decl.origin_name());
                    explicit.entry(decl.key.clone()).or_insert_with(|| {
                        Arc::new(Binding::Alias(AliasBinding {
                            key: decl.key.clone(),
                            target: ContextualTypeKey::direct(target.clone()),
                        }))
                    });
                }
                DeclarationKind::IntoSet | DeclarationKind::ElementsIntoSet => {
                    let aggregate_key = decl.key.with_type(TypeRef::set_of(decl.key.ty.clone()));
                    let aggregate = aggregates
                        .entry(aggregate_key.clone())
                        .or_insert_with(|| Aggregate::new(MultibindingKind::Set));
                    let key = add_contributor(&aggregate_key, aggregate, decl, None);
                    let provides_elements = matches!(decl.kind, DeclarationKind::ElementsIntoSet);
                    explicit.insert(key.clone(), contribution(key.clone(), decl, provides_elements));
                    contributors.insert(key);
                }
                DeclarationKind::IntoMap { map_key } => {
                    let aggregate_key = decl
                        .key
                        .with_type(TypeRef::map_of(map_key.ty.clone(), decl.key.ty.clone()));
                    let aggregate = aggregates
                        .entry(aggregate_key.clone())
                        .or_insert_with(|| Aggregate::new(MultibindingKind::Map));
                    if let Some(first) = aggregate.map_keys.get(&map_key.value) {
                        errors.push(BindingError::new(BindingErrorKind::DuplicateMapKey {
                            key: aggregate_key,
                            map_key: map_key.value.clone(),
                            origins: vec![first.clone(), decl.origin_name()],
                        }));
                        continue;
                    }
                    aggregate
                        .map_keys
                        .insert(map_key.value.clone(), decl.origin_name());
                    let key =
                        add_contributor(&aggregate_key, aggregate, decl, Some(map_key.value.clone()));
                    explicit.insert(key.clone(), contribution(key.clone(), decl, false));
                    contributors.insert(key);
                }
                DeclarationKind::Multibinds { allow_empty } => {
                    let kind = if decl.key.ty.name() == "Map" {
                        MultibindingKind::Map
                    } else {
                        MultibindingKind::Set
                    };
                    let aggregate = aggregates
                        .entry(decl.key.clone())
                        .or_insert_with(|| Aggregate::new(kind));
                    aggregate.allow_empty |= *allow_empty;
                }
            }
        }

        for (key, found) in origins {
            if found.len() > 1 {
                errors.push(BindingError::new(BindingErrorKind::Duplicate {
                    key,
                    graph: graph.name.clone(),
                    origins: found,
                }));
            }
        }

        for (key, aggregate) in aggregates {
            if explicit.contains_key(&key) {
                errors.push(BindingError::new(BindingErrorKind::Duplicate {
                    key,
                    graph: graph.name.clone(),
                    origins: vec![
                        "an explicit binding".to_string(),
                        "a multibinding declaration".to_string(),
                    ],
                }));
                continue;
            }
            let binding = Multibinding::new(
                key.clone(),
                aggregate.kind,
                aggregate.contributors,
                aggregate.allow_empty,
            );
            explicit.insert(key, Arc::new(Binding::Multibinding(binding)));
        }

        debug!(
            explicit = explicit.len(),
            contributors = contributors.len(),
            errors = errors.len(),
            "built binding table"
        );

        let table = Self {
            graph: graph.name.clone(),
            scopes: graph.scopes.clone(),
            classes,
            explicit,
            contributors,
            inherited: FxHashMap::default(),
            cache: FxHashMap::with_capacity_and_hasher(INITIAL_GRAPH_CAPACITY, Default::default()),
            absent: FxHashMap::default(),
        };
        (table, errors)
    }

    pub fn graph(&self) -> &str {
        &self.graph
    }

    /// Keys this graph declares itself, excluding synthetic contributor keys.
    pub fn declared_keys(&self) -> impl Iterator<Item = &TypeKey> + '_ {
        self.explicit
            .keys()
            .filter(|key| !self.contributors.contains(*key))
    }

    pub fn is_contributor(&self, key: &TypeKey) -> bool {
        self.contributors.contains(key)
    }

    pub fn is_aggregate(&self, key: &TypeKey) -> bool {
        self.explicit
            .get(key)
            .is_some_and(|b| matches!(b.as_ref(), Binding::Multibinding(_)))
    }

    /// Open this graph's level in `ctx`.
    ///
    /// Declared keys an enclosing graph already provides are returned as
    /// shadowed. Multibinding aggregates are exempt: an aggregate an enclosing
    /// graph also declares is re-introduced here and includes the enclosing
    /// contributions through one inherited contributor.
    pub fn enter(&mut self, ctx: &mut ParentContext) -> Vec<(TypeKey, String)> {
        let (aggregates, declared): (Vec<TypeKey>, Vec<TypeKey>) = self
            .declared_keys()
            .cloned()
            .partition(|key| self.is_aggregate(key));
        let shadowed = ctx.push(&self.graph, self.scopes.clone(), declared);
        for key in aggregates {
            match ctx.extend(&key) {
                Some(outer) => self.inherit(key, outer.level, &outer.graph),
                None => {
                    ctx.provide(&key);
                }
            }
        }
        shadowed
    }

    fn inherit(&mut self, aggregate: TypeKey, level: usize, graph: &str) {
        let Some(Binding::Multibinding(multi)) = self.explicit.get(&aggregate).map(Arc::as_ref)
        else {
            return;
        };
        let inherited = TypeKey::inherited(&aggregate, graph);
        let mut contributors = Vec::with_capacity(multi.contributors.len() + 1);
        contributors.push(Contributor {
            key: inherited.clone(),
            map_key: None,
        });
        contributors.extend(multi.contributors.iter().cloned());
        let merged = Multibinding::new(aggregate.clone(), multi.kind, contributors, multi.allow_empty);

        debug!(%aggregate, enclosing = graph, "inheriting enclosing contributions");
        self.explicit
            .insert(aggregate.clone(), Arc::new(Binding::Multibinding(merged)));
        self.contributors.insert(inherited.clone());
        self.inherited.insert(inherited, (aggregate, level));
    }

    /// The canonical binding for `key`. Aliases are returned as aliases.
    pub fn binding_for(
        &mut self,
        key: &TypeKey,
        has_default: bool,
        ctx: &mut ParentContext,
    ) -> Result<Arc<Binding>, BindingErrorKind> {
        let lookup = match self.cache.get(key) {
            Some(lookup) => lookup.clone(),
            None => {
                let lookup = self.lookup(key, ctx);
                self.cache.insert(key.clone(), lookup.clone());
                lookup
            }
        };

        match lookup {
            Lookup::Found(binding) => Ok(binding),
            Lookup::Failed(kind) => Err(kind),
            Lookup::Missing if has_default => Ok(self
                .absent
                .entry(key.clone())
                .or_insert_with(|| {
                    trace!(%key, "using declared default");
                    Arc::new(Binding::Absent(AbsentBinding { key: key.clone() }))
                })
                .clone()),
            Lookup::Missing => Err(BindingErrorKind::Unresolved { key: key.clone() }),
        }
    }

    /// Resolve `request`, following aliases to their terminal binding.
    pub fn resolve(
        &mut self,
        request: &ContextualTypeKey,
        ctx: &mut ParentContext,
    ) -> Result<BindingSet, BindingErrorKind> {
        let mut chain: Vec<TypeKey> = vec![request.key.clone()];
        let mut binding = self.binding_for(&request.key, request.has_default, ctx)?;
        while let Binding::Alias(alias) = binding.as_ref() {
            let target = alias.target.key.clone();
            if chain.contains(&target) {
                chain.push(target);
                return Err(BindingErrorKind::AliasCycle {
                    key: request.key.clone(),
                    chain,
                });
            }
            chain.push(target.clone());
            binding = self.binding_for(&target, false, ctx)?;
        }

        let Binding::Multibinding(multi) = binding.as_ref() else {
            return Ok(BindingSet::Single(binding));
        };
        let mut contributors = Vec::with_capacity(multi.contributors.len());
        for contributor in &multi.contributors {
            contributors.push(self.binding_for(&contributor.key, false, ctx)?);
        }
        Ok(BindingSet::Multi {
            aggregate: binding.clone(),
            contributors,
        })
    }

    fn lookup(&self, key: &TypeKey, ctx: &mut ParentContext) -> Lookup {
        if let Some((aggregate, level)) = self.inherited.get(key) {
            return match ctx.mark_at(aggregate, *level) {
                Some(ownership) => graph_dependency(key, ownership.slot),
                None => Lookup::Missing,
            };
        }
        if let Some(binding) = self.explicit.get(key) {
            if let Binding::Multibinding(multi) = binding.as_ref() {
                if multi.contributors.is_empty() && !multi.allow_empty {
                    return Lookup::Failed(BindingErrorKind::EmptyMultibinding { key: key.clone() });
                }
            }
            return Lookup::Found(binding.clone());
        }

        let current = ctx.current_level();
        if let (Some(owner), Some(current)) = (ctx.owner_of(key), current) {
            if owner < current {
                if let Some(ownership) = ctx.mark(key, None) {
                    trace!(%key, owner = %ownership.graph, "bound through enclosing graph");
                    return graph_dependency(key, ownership.slot);
                }
            }
        }

        match self.classes.get(key) {
            Some(class) => self.from_class(key, class, ctx),
            None => Lookup::Missing,
        }
    }

    fn from_class(&self, key: &TypeKey, class: &ClassDeclaration, ctx: &mut ParentContext) -> Lookup {
        let parameters = match &class.kind {
            ClassKind::Object => {
                return Lookup::Found(Arc::new(Binding::ObjectInstance(ObjectBinding {
                    key: key.clone(),
                })));
            }
            ClassKind::Injectable { parameters } => parameters,
        };

        let args = key.ty.args();
        if args.len() != class.type_parameters.len() {
            return Lookup::Failed(BindingErrorKind::GenericWithoutArguments {
                class: class.name.clone(),
                type_parameters: class.type_parameters.clone(),
                requested: key.ty.clone(),
            });
        }
        let substitution: FxHashMap<&str, &TypeRef> = class
            .type_parameters
            .iter()
            .map(String::as_str)
            .zip(args.iter())
            .collect();
        let dependencies = parameters
            .iter()
            .map(|param| ContextualTypeKey {
                key: param.key.with_type(param.key.ty.substitute(&substitution)),
                ..param.clone()
            })
            .collect();
        let constructed = || {
            Lookup::Found(Arc::new(Binding::ConstructorInjected(ConstructorBinding {
                key: key.clone(),
                class: key.ty.clone(),
                scope: class.scope.clone(),
                dependencies,
            })))
        };

        let Some(scope) = &class.scope else {
            return constructed();
        };
        if self.scopes.contains(scope) {
            ctx.provide(key);
            return constructed();
        }
        match ctx.mark(key, Some(scope)) {
            Some(ownership) => {
                trace!(%key, %scope, owner = %ownership.graph, "scoped to enclosing graph");
                graph_dependency(key, ownership.slot)
            }
            None => Lookup::Failed(BindingErrorKind::IncompatibleScope {
                key: key.clone(),
                scope: scope.clone(),
                graph: self.graph.clone(),
            }),
        }
    }
}

fn graph_dependency(key: &TypeKey, slot: bindplan_model::StorageSlot) -> Lookup {
    Lookup::Found(Arc::new(Binding::GraphDependency(GraphDependencyBinding {
        key: key.clone(),
        slot,
    })))
}

fn add_contributor(
    aggregate_key: &TypeKey,
    aggregate: &mut Aggregate,
    decl: &BindingDeclaration,
    map_key: Option<String>,
) -> TypeKey {
    let key = TypeKey::contributor(aggregate_key, &decl.key.ty, aggregate.contributors.len());
    aggregate.contributors.push(Contributor {
        key: key.clone(),
        map_key,
    });
    key
}

fn contribution(key: TypeKey, decl: &BindingDeclaration, provides_elements: bool) -> Arc<Binding> {
    Arc::new(Binding::Provided(ProvidedBinding {
        key,
        scope: decl.scope.clone(),
        factory: decl.origin_name(),
        dependencies: decl.dependencies.clone(),
        provides_elements,
    }))
}

#[cfg(test)]
#[path = "../tests/binding_table_tests.rs"]
mod binding_table_tests;
