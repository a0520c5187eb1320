//! The lifecycle API: register activation and deactivation guards from
//! outside route definitions.
//!
//! Guards added here carry the `External` origin: a routes replace keeps
//! them while dropping the guards that came with the old definitions.
//! Names are not required to be registered routes — the unknown-route
//! pseudo-name takes deactivation guards like any other.

use crate::config::GuardFactory;
use crate::errors::RouteError;
use crate::lifecycle::{GuardFamily, GuardOrigin};
use crate::router::Router;

impl Router {
    /// Registers an activation guard for `name`, replacing any previous
    /// one.
    pub fn add_activate_guard(
        &self,
        name: impl Into<String>,
        factory: GuardFactory,
    ) -> Result<(), RouteError> {
        self.add_guard(GuardFamily::Activate, name.into(), factory)
    }

    /// Registers a deactivation guard for `name`, replacing any previous
    /// one.
    pub fn add_deactivate_guard(
        &self,
        name: impl Into<String>,
        factory: GuardFactory,
    ) -> Result<(), RouteError> {
        self.add_guard(GuardFamily::Deactivate, name.into(), factory)
    }

    fn add_guard(
        &self,
        family: GuardFamily,
        name: String,
        factory: GuardFactory,
    ) -> Result<(), RouteError> {
        self.ensure_not_disposed()?;
        let guard = factory(self, self.dependency_lookup());
        self.inner
            .lifecycle
            .set(family, name, guard, factory, GuardOrigin::External)
    }

    /// Removes the activation guard for `name`. Returns whether one was
    /// registered.
    pub fn remove_activate_guard(&self, name: &str) -> bool {
        self.inner.lifecycle.remove(GuardFamily::Activate, name)
    }

    /// Removes the deactivation guard for `name`. Returns whether one
    /// was registered.
    pub fn remove_deactivate_guard(&self, name: &str) -> bool {
        self.inner.lifecycle.remove(GuardFamily::Deactivate, name)
    }

    /// Returns `true` if an activation guard is registered for `name`.
    pub fn has_activate_guard(&self, name: &str) -> bool {
        self.inner.lifecycle.has(GuardFamily::Activate, name)
    }

    /// Returns `true` if a deactivation guard is registered for `name`.
    pub fn has_deactivate_guard(&self, name: &str) -> bool {
        self.inner.lifecycle.has(GuardFamily::Deactivate, name)
    }
}
