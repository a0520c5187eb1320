//! The dependencies API.

use crate::dependencies::DependencyLookup;
use crate::errors::RouteError;
use crate::router::Router;
use std::any::Any;
use std::rc::Rc;

impl Router {
    /// Registers a dependency under `key`.
    pub fn set_dependency(
        &self,
        key: impl Into<String>,
        value: Rc<dyn Any>,
    ) -> Result<(), RouteError> {
        self.ensure_not_disposed()?;
        self.inner.deps.set(key, value)
    }

    /// Registers several dependencies at once.
    pub fn set_dependencies(
        &self,
        entries: impl IntoIterator<Item = (String, Rc<dyn Any>)>,
    ) -> Result<(), RouteError> {
        self.ensure_not_disposed()?;
        for (key, value) in entries {
            self.inner.deps.set(key, value)?;
        }
        Ok(())
    }

    /// Looks up a dependency.
    pub fn get_dependency(&self, key: &str) -> Option<Rc<dyn Any>> {
        self.inner.deps.get(key)
    }

    /// Removes a dependency.
    pub fn remove_dependency(&self, key: &str) -> Option<Rc<dyn Any>> {
        self.inner.deps.remove(key)
    }

    /// Drops every dependency.
    pub fn clear_dependencies(&self) -> Result<(), RouteError> {
        self.ensure_not_disposed()?;
        self.inner.deps.clear();
        Ok(())
    }

    /// The read handle handed to guard, plugin, and forwarding
    /// factories.
    pub fn dependency_lookup(&self) -> DependencyLookup {
        self.inner.deps.lookup()
    }
}
