//! The lifecycle registry: per-route activation and deactivation guards.
//!
//! Guards are stored per `(route, family)`, and a later registration for
//! the same pair replaces the earlier one — guards never accumulate. The
//! registry records where each guard came from so that replacing the
//! route tree can drop definition guards while preserving externally
//! registered ones.

use crate::config::{GuardFactory, GuardFn};
use crate::errors::RouteError;
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Where a guard registration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOrigin {
    /// Declared on a route definition.
    Definition,
    /// Registered through the lifecycle API.
    External,
}

/// Which pipeline phase a guard participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardFamily {
    /// Runs when the segment is entered.
    Activate,
    /// Runs when the segment is left.
    Deactivate,
}

#[derive(Clone)]
struct GuardEntry {
    guard: GuardFn,
    factory: GuardFactory,
    origin: GuardOrigin,
}

/// Stores at most one guard per `(route, family)`.
pub struct LifecycleRegistry {
    activate: RefCell<BTreeMap<String, GuardEntry>>,
    deactivate: RefCell<BTreeMap<String, GuardEntry>>,
    max_handlers: usize,
}

impl LifecycleRegistry {
    /// Creates an empty registry bounded at `max_handlers` guarded
    /// routes per family.
    pub fn new(max_handlers: usize) -> Self {
        Self {
            activate: RefCell::new(BTreeMap::new()),
            deactivate: RefCell::new(BTreeMap::new()),
            max_handlers,
        }
    }

    fn family(&self, family: GuardFamily) -> &RefCell<BTreeMap<String, GuardEntry>> {
        match family {
            GuardFamily::Activate => &self.activate,
            GuardFamily::Deactivate => &self.deactivate,
        }
    }

    /// Registers a guard, replacing any previous one for the same pair.
    pub fn set(
        &self,
        family: GuardFamily,
        name: impl Into<String>,
        guard: GuardFn,
        factory: GuardFactory,
        origin: GuardOrigin,
    ) -> Result<(), RouteError> {
        let name = name.into();
        let mut map = self.family(family).borrow_mut();
        if !map.contains_key(&name) && map.len() >= self.max_handlers {
            return Err(RouteError::LimitExceeded {
                what: "lifecycle handlers",
                limit: self.max_handlers,
            });
        }
        map.insert(
            name,
            GuardEntry {
                guard,
                factory,
                origin,
            },
        );
        Ok(())
    }

    /// Removes the guard for `(family, name)`. Returns whether one was
    /// registered.
    pub fn remove(&self, family: GuardFamily, name: &str) -> bool {
        self.family(family).borrow_mut().remove(name).is_some()
    }

    /// The guard registered for `(family, name)`, if any.
    pub fn get(&self, family: GuardFamily, name: &str) -> Option<GuardFn> {
        self.family(family).borrow().get(name).map(|e| e.guard.clone())
    }

    /// Returns `true` if a guard is registered for `(family, name)`.
    pub fn has(&self, family: GuardFamily, name: &str) -> bool {
        self.family(family).borrow().contains_key(name)
    }

    /// Drops every guard that came from a route definition.
    pub fn clear_definition(&self) {
        self.retain(|entry| entry.origin != GuardOrigin::Definition);
    }

    /// Drops every guard that did not come from a route definition.
    pub fn clear_non_definition(&self) {
        self.retain(|entry| entry.origin == GuardOrigin::Definition);
    }

    /// Drops everything.
    pub fn clear_all(&self) {
        self.activate.borrow_mut().clear();
        self.deactivate.borrow_mut().clear();
    }

    fn retain(&self, keep: impl Fn(&GuardEntry) -> bool) {
        self.activate.borrow_mut().retain(|_, e| keep(e));
        self.deactivate.borrow_mut().retain(|_, e| keep(e));
    }

    /// Keeps only the entries for which `keep(route, origin)` holds, in
    /// both families.
    pub fn retain_entries(&self, keep: impl Fn(&str, GuardOrigin) -> bool) {
        self.activate
            .borrow_mut()
            .retain(|name, e| keep(name, e.origin));
        self.deactivate
            .borrow_mut()
            .retain(|name, e| keep(name, e.origin));
    }

    /// Snapshots the externally registered guard factories, for
    /// rebuilding a cloned router.
    pub fn external_factories(&self) -> Vec<(GuardFamily, String, GuardFactory)> {
        let mut out = Vec::new();
        for (family, map) in [
            (GuardFamily::Activate, &self.activate),
            (GuardFamily::Deactivate, &self.deactivate),
        ] {
            for (name, entry) in map.borrow().iter() {
                if entry.origin == GuardOrigin::External {
                    out.push((family, name.clone(), entry.factory.clone()));
                }
            }
        }
        out
    }
}

impl std::fmt::Debug for LifecycleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleRegistry")
            .field("activate", &self.activate.borrow().len())
            .field("deactivate", &self.deactivate.borrow().len())
            .finish()
    }
}
