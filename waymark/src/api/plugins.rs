//! The plugin API: registration, removal, and the plugin-facing helpers
//! a plugin factory reaches for.

use crate::errors::RouteError;
use crate::navigation::NavigationOptions;
use crate::params::Params;
use crate::plugins::{ForwardFn, PluginFactory};
use crate::router::{Router, RouterInner};
use crate::state::RouterState;
use std::rc::{Rc, Weak};

/// Handle returned by [`Router::use_plugin`]; consumes itself to remove
/// the plugin and run its teardown.
#[derive(Debug)]
pub struct PluginHandle {
    inner: Weak<RouterInner>,
    id: u64,
}

impl PluginHandle {
    /// Unwires the plugin's listeners and invokes its teardown hook.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.plugins.remove(&inner.bus, self.id);
        }
    }
}

impl Router {
    /// Runs `factory` and wires the produced plugin to the event bus.
    pub fn use_plugin(&self, factory: PluginFactory) -> Result<PluginHandle, RouteError> {
        self.ensure_not_disposed()?;
        let instance = factory(self, self.dependency_lookup());
        let id = self
            .inner
            .plugins
            .register(&self.inner.bus, factory, instance)?;
        Ok(PluginHandle {
            inner: Rc::downgrade(&self.inner),
            id,
        })
    }

    /// The number of registered plugins.
    pub fn plugin_count(&self) -> usize {
        self.inner.plugins.len()
    }

    /// Builds a state the way the engine would, without publishing it.
    ///
    /// `force_id` pins the meta id; passing `Some(0)` marks a preview
    /// that consumes no id.
    pub fn make_state(
        &self,
        name: impl Into<String>,
        params: Params,
        path: impl Into<String>,
        options: NavigationOptions,
        force_id: Option<u64>,
    ) -> RouterState {
        let name = name.into();
        let meta_params = self.inner.tree.borrow().meta_params(&name);
        self.inner
            .store
            .make_state(name, params, path, options, meta_params, force_id)
    }

    /// The current forwarding resolver.
    ///
    /// The engine reads every programmatic navigation through this
    /// function; wrapping it is the sanctioned way for a plugin to
    /// rewrite forwarding results.
    pub fn forward_state(&self) -> ForwardFn {
        self.inner.forward_slot.get()
    }

    /// Swaps the forwarding resolver, returning the previous one so a
    /// wrapper can delegate to it.
    pub fn set_forward_state(&self, forward: ForwardFn) -> ForwardFn {
        self.inner.forward_slot.replace(forward)
    }
}
