//! The routes API: mutate and inspect the route tree of a live router.
//!
//! Tree mutations keep the lifecycle registry in step: guards declared
//! on definitions are (re-)registered for added or updated subtrees and
//! dropped for removed ones, while externally registered guards are left
//! alone.

use crate::config::{GuardFactory, RouteConfig};
use crate::errors::RouteError;
use crate::lifecycle::GuardOrigin;
use crate::name::is_name_descendant;
use crate::router::Router;

type GuardRow = (String, Option<GuardFactory>, Option<GuardFactory>);

fn collect_guard_factories(prefix: Option<&str>, configs: &[RouteConfig], out: &mut Vec<GuardRow>) {
    for config in configs {
        let full = match prefix {
            Some(prefix) => format!("{prefix}.{}", config.name),
            None => config.name.clone(),
        };
        if config.can_activate.is_some() || config.can_deactivate.is_some() {
            out.push((
                full.clone(),
                config.can_activate.clone(),
                config.can_deactivate.clone(),
            ));
        }
        collect_guard_factories(Some(&full), &config.children, out);
    }
}

impl Router {
    /// Registers a top-level route.
    pub fn add_route(&self, route: RouteConfig) -> Result<(), RouteError> {
        self.add_routes(vec![route])
    }

    /// Registers top-level routes.
    pub fn add_routes(&self, routes: Vec<RouteConfig>) -> Result<(), RouteError> {
        self.ensure_not_disposed()?;
        let mut guards = Vec::new();
        collect_guard_factories(None, &routes, &mut guards);
        self.inner.tree.borrow_mut().add_routes(None, routes)?;
        self.install_definition_guards(guards)
    }

    /// Registers routes under an existing parent, addressed by full
    /// name.
    pub fn add_child_routes(
        &self,
        parent: &str,
        routes: Vec<RouteConfig>,
    ) -> Result<(), RouteError> {
        self.ensure_not_disposed()?;
        let mut guards = Vec::new();
        collect_guard_factories(Some(parent), &routes, &mut guards);
        self.inner.tree.borrow_mut().add_routes(Some(parent), routes)?;
        self.install_definition_guards(guards)
    }

    /// Removes a route and its subtree, dropping the subtree's guards.
    pub fn remove_route(&self, name: &str) -> Result<(), RouteError> {
        self.ensure_not_disposed()?;
        self.inner.tree.borrow_mut().remove_route(name)?;
        self.inner
            .lifecycle
            .retain_entries(|route, _| !is_name_descendant(route, name));
        Ok(())
    }

    /// Replaces a route's definition (children included), re-registering
    /// the definition guards it declares.
    pub fn update_route(&self, name: &str, config: RouteConfig) -> Result<(), RouteError> {
        self.ensure_not_disposed()?;
        let prefix = name.rsplit_once('.').map(|(parent, _)| parent.to_owned());
        let mut guards = Vec::new();
        collect_guard_factories(
            prefix.as_deref(),
            std::slice::from_ref(&config),
            &mut guards,
        );

        self.inner.tree.borrow_mut().update_route(name, config)?;
        // Definition guards of the old subtree are superseded wholesale;
        // external ones stay.
        self.inner.lifecycle.retain_entries(|route, origin| {
            origin == GuardOrigin::External || !is_name_descendant(route, name)
        });
        self.install_definition_guards(guards)
    }

    /// Replaces the whole tree.
    ///
    /// Guards installed via route definitions are dropped with the old
    /// tree; externally registered guards survive the swap.
    pub fn replace_routes(&self, routes: Vec<RouteConfig>) -> Result<(), RouteError> {
        self.ensure_not_disposed()?;
        let mut guards = Vec::new();
        collect_guard_factories(None, &routes, &mut guards);
        self.inner.tree.borrow_mut().replace_all(routes)?;
        self.inner.lifecycle.clear_definition();
        self.install_definition_guards(guards)
    }

    /// Drops every route. Externally registered guards survive.
    pub fn clear_routes(&self) -> Result<(), RouteError> {
        self.ensure_not_disposed()?;
        self.inner.tree.borrow_mut().clear();
        self.inner.lifecycle.clear_definition();
        Ok(())
    }

    /// Returns `true` if `name` is a registered full route name.
    pub fn has_route(&self, name: &str) -> bool {
        self.inner.tree.borrow().has(name)
    }

    /// Every registered full name, in depth-first declaration order.
    pub fn route_names(&self) -> Vec<String> {
        self.inner.tree.borrow().route_names()
    }

    /// The original definition of `name`, as registered.
    pub fn get_route_config(&self, name: &str) -> Option<RouteConfig> {
        self.inner.tree.borrow().get_config(name).cloned()
    }

    /// Sets the root prefix stripped on match and prepended on build.
    pub fn set_root_path(&self, path: &str) -> Result<(), RouteError> {
        self.ensure_not_disposed()?;
        self.inner.tree.borrow_mut().set_root_path(path);
        Ok(())
    }
}
