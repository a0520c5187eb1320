//! User-supplied dependencies.
//!
//! Dependencies are opaque values keyed by string, handed to guard and
//! plugin factories through a [`DependencyLookup`]. They live beside the
//! router, never inside states.

use crate::errors::RouteError;
use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// A read handle over the dependency map, passed to factories.
pub type DependencyLookup = Rc<dyn Fn(&str) -> Option<Rc<dyn Any>>>;

/// The bounded dependency map.
#[derive(Default)]
pub struct Dependencies {
    map: RefCell<BTreeMap<String, Rc<dyn Any>>>,
    max: usize,
}

impl Dependencies {
    /// Creates an empty map bounded at `max` entries.
    pub fn new(max: usize) -> Self {
        Self {
            map: RefCell::new(BTreeMap::new()),
            max,
        }
    }

    /// Registers a dependency.
    pub fn set(&self, key: impl Into<String>, value: Rc<dyn Any>) -> Result<(), RouteError> {
        let key = key.into();
        let mut map = self.map.borrow_mut();
        if !map.contains_key(&key) && map.len() >= self.max {
            return Err(RouteError::LimitExceeded {
                what: "dependencies",
                limit: self.max,
            });
        }
        map.insert(key, value);
        Ok(())
    }

    /// Looks up a dependency.
    pub fn get(&self, key: &str) -> Option<Rc<dyn Any>> {
        self.map.borrow().get(key).cloned()
    }

    /// Removes a dependency.
    pub fn remove(&self, key: &str) -> Option<Rc<dyn Any>> {
        self.map.borrow_mut().remove(key)
    }

    /// Drops every dependency.
    pub fn clear(&self) {
        self.map.borrow_mut().clear();
    }

    /// The number of registered dependencies.
    pub fn len(&self) -> usize {
        self.map.borrow().len()
    }

    /// Returns `true` if no dependencies are registered.
    pub fn is_empty(&self) -> bool {
        self.map.borrow().is_empty()
    }

    /// A snapshot of every entry, used when cloning a router.
    pub fn entries(&self) -> Vec<(String, Rc<dyn Any>)> {
        self.map
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), Rc::clone(v)))
            .collect()
    }

    /// Builds the read handle factories receive.
    pub fn lookup(self: &Rc<Self>) -> DependencyLookup {
        let deps = Rc::clone(self);
        Rc::new(move |key| deps.get(key))
    }
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependencies")
            .field("len", &self.len())
            .field("max", &self.max)
            .finish()
    }
}
