//! Key ownership across nested extension graphs.
//!
//! Each graph being compiled pushes a level. A level owns the keys it
//! introduces (explicit bindings and scoped keys it hosts) together with one
//! storage slot per key. The `available` index maps every introduced key to
//! its level, so lookup is a single hash lookup and closing a level only
//! touches the keys that level introduced.
//!
//! A multibinding aggregate may be re-introduced by an extension graph that
//! adds contributions of its own ([`ParentContext::extend`]). The inner level
//! then owns the key until it closes, and the enclosing owner is restored.

use crate::FxIndexMap;
use bindplan_model::{Scope, StorageSlot, TypeKey, TypeRef};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

/// Where a key lives: the owning level and its storage slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ownership {
    /// Level index, 0 = root graph.
    pub level: usize,
    pub graph: String,
    pub slot: StorageSlot,
}

/// The result of closing a level.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClosedLevel {
    pub graph: String,
    /// Keys this level owned or passed through for its descendants, in first-use order.
    pub used: Vec<(TypeKey, StorageSlot)>,
}

/// First use of a key through a level.
#[derive(Debug)]
struct Use {
    slot: StorageSlot,
    /// The extension graph whose request reached the key.
    requested_by: String,
}

#[derive(Debug)]
struct Level {
    graph: String,
    scopes: Vec<Scope>,
    /// Introduced keys with the enclosing owner they hide, if any.
    introduced: Vec<(TypeKey, Option<usize>)>,
    slots: FxHashMap<TypeKey, StorageSlot>,
    used: FxIndexMap<TypeKey, Use>,
    names: NameAllocator,
}

/// Stack of enclosing graph levels plus a global availability index.
#[derive(Debug, Default)]
pub struct ParentContext {
    levels: Vec<Level>,
    available: FxHashMap<TypeKey, usize>,
}

impl ParentContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open levels.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Index of the innermost level.
    pub fn current_level(&self) -> Option<usize> {
        self.levels.len().checked_sub(1)
    }

    pub fn current_graph(&self) -> Option<&str> {
        self.levels.last().map(|l| l.graph.as_str())
    }

    /// Open a level for `graph`, introducing its declared keys.
    ///
    /// Keys an enclosing level already provides are not introduced; they are
    /// returned with the name of the graph that owns them.
    pub fn push(
        &mut self,
        graph: &str,
        scopes: Vec<Scope>,
        keys: impl IntoIterator<Item = TypeKey>,
    ) -> Vec<(TypeKey, String)> {
        let level = self.levels.len();
        self.levels.push(Level {
            graph: graph.to_string(),
            scopes,
            introduced: Vec::new(),
            slots: FxHashMap::default(),
            used: FxIndexMap::default(),
            names: NameAllocator::default(),
        });

        let mut shadowed = Vec::new();
        for key in keys {
            match self.available.get(&key).copied() {
                Some(owner) if owner < level => {
                    let owner_graph = self.levels[owner].graph.clone();
                    shadowed.push((key, owner_graph));
                }
                Some(_) => {}
                None => self.introduce(level, key),
            }
        }
        debug!(
            graph,
            depth = self.depth(),
            introduced = self.levels[level].introduced.len(),
            "pushed graph level"
        );
        shadowed
    }

    /// Introduce `key` at the innermost level. A no-op when already available.
    pub fn provide(&mut self, key: &TypeKey) -> Option<Ownership> {
        let level = self.current_level()?;
        if !self.available.contains_key(key) {
            self.introduce(level, key.clone());
        }
        self.ownership(key)
    }

    /// Re-introduce `key` at the innermost level on top of its enclosing owner.
    ///
    /// Returns the enclosing ownership, which stays reachable through
    /// [`ParentContext::mark_at`]. `None` when no enclosing level owns `key`.
    pub fn extend(&mut self, key: &TypeKey) -> Option<Ownership> {
        let level = self.current_level()?;
        let outer = self.available.get(key).copied().filter(|&o| o < level)?;
        let outer_ownership = self.ownership_at(key, outer)?;
        trace!(%key, outer = %outer_ownership.graph, "extending enclosing key");
        self.introduce(level, key.clone());
        Some(outer_ownership)
    }

    /// Find (or for a scoped key, create) the owner of `key`.
    ///
    /// Every level strictly between the owner and the innermost level, and
    /// the owner itself, records the key as used so that each one exposes
    /// the owner's slot to the level below it.
    pub fn mark(&mut self, key: &TypeKey, scope: Option<&Scope>) -> Option<Ownership> {
        let owner = match self.available.get(key).copied() {
            Some(owner) => owner,
            None => {
                let scope = scope?;
                let owner = self.levels.iter().rposition(|l| l.scopes.contains(scope))?;
                trace!(%key, %scope, owner = %self.levels[owner].graph, "introducing scoped key");
                self.introduce(owner, key.clone());
                owner
            }
        };
        self.mark_at(key, owner)
    }

    /// Record a use of the slot `level` holds for `key`, even when an inner
    /// level has since re-introduced the key.
    pub fn mark_at(&mut self, key: &TypeKey, level: usize) -> Option<Ownership> {
        let innermost = self.current_level()?;
        let ownership = self.ownership_at(key, level)?;
        let requested_by = self.current_graph()?.to_string();
        for entry in &mut self.levels[level..innermost] {
            entry.used.entry(key.clone()).or_insert_with(|| Use {
                slot: ownership.slot.clone(),
                requested_by: requested_by.clone(),
            });
        }
        Some(ownership)
    }

    /// The level that would own `key`, without recording anything.
    pub fn owner_of(&self, key: &TypeKey) -> Option<usize> {
        self.available.get(key).copied()
    }

    pub fn slot_of(&self, key: &TypeKey) -> Option<&StorageSlot> {
        let level = *self.available.get(key)?;
        self.levels[level].slots.get(key)
    }

    /// Whether some open level declares `scope`.
    pub fn declares_scope(&self, scope: &Scope) -> bool {
        self.levels.iter().any(|l| l.scopes.contains(scope))
    }

    /// Keys the innermost level owns or passes through for descendants,
    /// each with the extension graph that first requested it.
    pub fn used_at_current(&self) -> Vec<(TypeKey, String)> {
        self.levels
            .last()
            .map(|l| {
                l.used
                    .iter()
                    .map(|(key, used)| (key.clone(), used.requested_by.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Close the innermost level and withdraw exactly the keys it introduced.
    pub fn pop(&mut self) -> Option<ClosedLevel> {
        let level = self.levels.pop()?;
        for (key, hidden) in &level.introduced {
            match hidden {
                Some(outer) => self.available.insert(key.clone(), *outer),
                None => self.available.remove(key),
            };
        }
        debug!(
            graph = %level.graph,
            withdrawn = level.introduced.len(),
            used = level.used.len(),
            "popped graph level"
        );
        Some(ClosedLevel {
            graph: level.graph,
            used: level
                .used
                .into_iter()
                .map(|(key, used)| (key, used.slot))
                .collect(),
        })
    }

    fn introduce(&mut self, level: usize, key: TypeKey) {
        let depth = level as u32;
        let entry = &mut self.levels[level];
        let slot = StorageSlot {
            owner: entry.graph.clone(),
            depth,
            name: entry.names.allocate(&key.ty),
        };
        entry.slots.insert(key.clone(), slot);
        let hidden = self.available.insert(key.clone(), level);
        self.levels[level].introduced.push((key, hidden));
    }

    fn ownership(&self, key: &TypeKey) -> Option<Ownership> {
        self.ownership_at(key, *self.available.get(key)?)
    }

    fn ownership_at(&self, key: &TypeKey, level: usize) -> Option<Ownership> {
        let entry = self.levels.get(level)?;
        Some(Ownership {
            level,
            graph: entry.graph.clone(),
            slot: entry.slots.get(key)?.clone(),
        })
    }
}

/// Hands out unique field names within one level.
///
/// `HttpClient` becomes `httpClient`, then `httpClient2`, `httpClient3`, ...
#[derive(Debug, Default)]
pub struct NameAllocator {
    taken: FxHashSet<String>,
    next_suffix: FxHashMap<String, u32>,
}

impl NameAllocator {
    pub fn allocate(&mut self, ty: &TypeRef) -> String {
        let base = base_name(ty);
        if self.taken.insert(base.clone()) {
            return base;
        }
        let suffix = self.next_suffix.entry(base.clone()).or_insert(2);
        loop {
            let candidate = format!("{base}{suffix}");
            *suffix += 1;
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

fn base_name(ty: &TypeRef) -> String {
    let mut name = String::new();
    push_type_name(ty, &mut name);
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => "instance".to_string(),
    }
}

fn push_type_name(ty: &TypeRef, out: &mut String) {
    let mut chars = ty.simple_name().chars().filter(|c| c.is_alphanumeric() || *c == '_');
    if let Some(first) = chars.next() {
        out.extend(first.to_uppercase());
        out.extend(chars);
    }
    for arg in ty.args() {
        push_type_name(arg, out);
    }
}

#[cfg(test)]
#[path = "../tests/parent_context_tests.rs"]
mod parent_context_tests;
