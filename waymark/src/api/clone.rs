//! Router cloning.
//!
//! A clone is a fresh, independent router rebuilt from everything the
//! original retains: route definitions, options, dependencies (unless
//! overridden), plugin factories, and externally registered guard
//! factories. Every factory is re-run against the new instance, so the
//! clone observes its own events and owns its own state.

use crate::errors::RouteError;
use crate::lifecycle::GuardFamily;
use crate::router::Router;
use std::any::Any;
use std::rc::Rc;

/// Builds an independent copy of `router`.
///
/// `deps_override`, when given, replaces the dependency map instead of
/// copying the original's entries.
pub fn clone_router(
    router: &Router,
    deps_override: Option<Vec<(String, Rc<dyn Any>)>>,
) -> Result<Router, RouteError> {
    let configs = router.inner.tree.borrow().top_level_configs().to_vec();
    let options = (*router.inner.options).clone();
    let fresh = Router::with_options(configs, options)?;

    let entries = deps_override.unwrap_or_else(|| router.inner.deps.entries());
    fresh.set_dependencies(entries)?;

    // External guards are re-registered from their factories with their
    // original origin preserved.
    for (family, name, factory) in router.inner.lifecycle.external_factories() {
        match family {
            GuardFamily::Activate => fresh.add_activate_guard(name, factory)?,
            GuardFamily::Deactivate => fresh.add_deactivate_guard(name, factory)?,
        }
    }

    for factory in router.inner.plugins.factories() {
        fresh.use_plugin(factory)?;
    }

    if !router.inner.tree.borrow().root_path().is_empty() {
        let root = router.inner.tree.borrow().root_path().to_owned();
        fresh.set_root_path(&root)?;
    }

    Ok(fresh)
}

impl Router {
    /// Builds an independent copy of this router. See [`clone_router`].
    pub fn clone_detached(&self) -> Result<Router, RouteError> {
        clone_router(self, None)
    }
}
