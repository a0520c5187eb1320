//! The router facade.
//!
//! [`Router`] is a cheaply clonable handle over the wired-together
//! components: options, route tree, lifecycle registry, state store,
//! event bus, plugin registry, and the transition engine state. The
//! facade validates inputs and delegates; components only ever talk to
//! each other through what is wired here at construction time.

use crate::config::{GuardFactory, RouteConfig};
use crate::dependencies::{Dependencies, DependencyLookup};
use crate::errors::{RouteError, RouterError};
use crate::events::{EventBus, EventName, FsmEvent, RouterEvent, RouterStatus, Subscription};
use crate::lifecycle::{GuardFamily, GuardOrigin, LifecycleRegistry};
use crate::name::SegmentCache;
use crate::navigation::{CancelToken, NavigationOptions};
use crate::options::RouterOptions;
use crate::params::Params;
use crate::plugins::{ForwardSlot, PluginRegistry};
use crate::state::{RouterState, StateStore, UNKNOWN_ROUTE};
use crate::tree::RouteTree;
use std::cell::RefCell;
use std::rc::Rc;

pub(crate) struct ActiveTransition {
    pub(crate) id: u64,
    pub(crate) token: CancelToken,
    pub(crate) to: Rc<RouterState>,
    pub(crate) from: Option<Rc<RouterState>>,
}

pub(crate) struct RouterInner {
    pub(crate) options: Rc<RouterOptions>,
    pub(crate) tree: RefCell<RouteTree>,
    pub(crate) lifecycle: LifecycleRegistry,
    pub(crate) store: StateStore,
    pub(crate) bus: Rc<EventBus>,
    pub(crate) plugins: PluginRegistry,
    pub(crate) deps: Rc<Dependencies>,
    pub(crate) forward_slot: ForwardSlot,
    pub(crate) segment_cache: Rc<SegmentCache>,
    pub(crate) active: RefCell<Option<ActiveTransition>>,
}

/// A client-side router.
///
/// Cloning shares the same instance; [`Router::clone_detached`] (or
/// [`crate::clone_router`]) builds an independent one.
#[derive(Clone)]
pub struct Router {
    pub(crate) inner: Rc<RouterInner>,
}

impl Router {
    /// Builds a router over `routes` with default options.
    pub fn new(routes: Vec<RouteConfig>) -> Result<Self, RouteError> {
        Self::with_options(routes, RouterOptions::new())
    }

    /// Builds a router over `routes` with the given options.
    pub fn with_options(
        routes: Vec<RouteConfig>,
        options: RouterOptions,
    ) -> Result<Self, RouteError> {
        let options = Rc::new(options);
        let tree = RouteTree::with_routes(Rc::clone(&options), routes)?;
        let limits = &options.limits;

        let inner = Rc::new(RouterInner {
            tree: RefCell::new(tree),
            lifecycle: LifecycleRegistry::new(limits.max_lifecycle_handlers),
            store: StateStore::new(),
            bus: Rc::new(EventBus::new(limits)),
            plugins: PluginRegistry::new(limits.max_plugins),
            deps: Rc::new(Dependencies::new(limits.max_dependencies)),
            forward_slot: ForwardSlot::new(Rc::new(|name, _| {
                Err(RouteError::UnknownRoute {
                    name: name.to_owned(),
                })
            })),
            segment_cache: Rc::new(SegmentCache::new()),
            active: RefCell::new(None),
            options,
        });

        // The default forwarding resolver reads the live tree; plugins
        // may wrap it later through the slot.
        let weak = Rc::downgrade(&inner);
        inner.forward_slot.replace(Rc::new(move |name, params| {
            let inner = weak.upgrade().ok_or_else(|| RouteError::UnknownRoute {
                name: name.to_owned(),
            })?;
            let lookup = inner.deps.lookup();
            let result = inner.tree.borrow().build_state(name, params, Some(&lookup));
            result
        }));

        let router = Self { inner };
        let factories = router.inner.tree.borrow().guard_factories();
        router.install_definition_guards(factories)?;
        Ok(router)
    }

    /// Registers definition guards, instantiating each factory once.
    pub(crate) fn install_definition_guards(
        &self,
        factories: Vec<(String, Option<GuardFactory>, Option<GuardFactory>)>,
    ) -> Result<(), RouteError> {
        let lookup = self.inner.deps.lookup();
        for (name, activate, deactivate) in factories {
            if let Some(factory) = activate {
                let guard = factory(self, Rc::clone(&lookup));
                self.inner.lifecycle.set(
                    GuardFamily::Activate,
                    name.clone(),
                    guard,
                    factory,
                    GuardOrigin::Definition,
                )?;
            }
            if let Some(factory) = deactivate {
                let guard = factory(self, Rc::clone(&lookup));
                self.inner.lifecycle.set(
                    GuardFamily::Deactivate,
                    name.clone(),
                    guard,
                    factory,
                    GuardOrigin::Definition,
                )?;
            }
        }
        Ok(())
    }

    /// The configured options.
    pub fn options(&self) -> Rc<RouterOptions> {
        Rc::clone(&self.inner.options)
    }

    /// The current FSM status.
    pub fn status(&self) -> RouterStatus {
        self.inner.bus.status()
    }

    /// Whether the router has been started and not stopped or disposed.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status(),
            RouterStatus::Starting | RouterStatus::Ready | RouterStatus::Transitioning
        )
    }

    pub(crate) fn ensure_not_disposed(&self) -> Result<(), RouteError> {
        if self.status() == RouterStatus::Disposed {
            Err(RouteError::RouterDisposed)
        } else {
            Ok(())
        }
    }

    /// The current published state.
    pub fn get_state(&self) -> Option<Rc<RouterState>> {
        self.inner.store.get()
    }

    /// The previously published state.
    pub fn get_previous_state(&self) -> Option<Rc<RouterState>> {
        self.inner.store.get_previous()
    }

    /// Matches `path` against the route tree without side effects.
    ///
    /// The returned state is a preview: its meta id is `0` and nothing is
    /// published.
    pub fn match_path(&self, path: &str) -> Option<RouterState> {
        let lookup = self.inner.deps.lookup();
        let simple = match self.inner.tree.borrow().match_path(path, Some(&lookup)) {
            Ok(matched) => matched?,
            Err(error) => {
                tracing::debug!(path, %error, "match failed while resolving");
                return None;
            }
        };
        let meta_params = self.inner.tree.borrow().meta_params(&simple.name);
        Some(self.inner.store.make_state(
            simple.name,
            simple.params,
            simple.path,
            NavigationOptions::default(),
            meta_params,
            Some(0),
        ))
    }

    /// Builds the URL for `(name, params)`.
    pub fn build_path(&self, name: &str, params: &Params) -> Result<String, RouteError> {
        self.inner.tree.borrow().build_path(name, params)
    }

    /// Whether a navigation to `(name, params)` could succeed: the name
    /// is known and reachable, forwarding resolves, and a path can be
    /// built.
    pub fn can_navigate_to(&self, name: &str, params: &Params) -> bool {
        if self.status() == RouterStatus::Disposed || name == UNKNOWN_ROUTE {
            return false;
        }
        if params.validate().is_err() {
            return false;
        }
        let lookup = self.inner.deps.lookup();
        self.inner
            .tree
            .borrow()
            .build_state(name, params, Some(&lookup))
            .is_ok()
    }

    /// Whether the current state is at (or, non-strictly, under) the
    /// named route.
    ///
    /// Strict requires the full name and params to match. Non-strict
    /// accepts any descendant of `name` whose params contain the given
    /// ones. `ignore_query` drops declared query params from the
    /// comparison.
    pub fn is_active_route(
        &self,
        name: &str,
        params: &Params,
        strict: bool,
        ignore_query: bool,
    ) -> bool {
        let Some(current) = self.get_state() else {
            return false;
        };

        let ignored: Vec<String> = if ignore_query {
            self.query_param_names(&current.name)
        } else {
            Vec::new()
        };

        if strict {
            current.name == name && params_equal_except(&current.params, params, &ignored)
        } else {
            crate::name::is_name_descendant(&current.name, name)
                && params_subset_except(params, &current.params, &ignored)
        }
    }

    /// Structural equality of two states.
    ///
    /// With `ignore_query`, only params captured from the path portion
    /// of the route are compared.
    pub fn are_states_equal(
        &self,
        a: Option<&RouterState>,
        b: Option<&RouterState>,
        ignore_query: bool,
    ) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                if a.name != b.name {
                    return false;
                }
                if !ignore_query {
                    return a.params == b.params;
                }
                let keys = self.inner.tree.borrow().path_param_names(&a.name);
                a.params
                    .equals_on_keys(&b.params, keys.iter().map(String::as_str))
            }
            _ => false,
        }
    }

    fn query_param_names(&self, name: &str) -> Vec<String> {
        let tree = self.inner.tree.borrow();
        let declared = tree.declared_params(name);
        let path_only: Vec<String> = tree.path_param_names(name);
        declared
            .into_iter()
            .filter(|k| !path_only.contains(k))
            .collect()
    }

    /// Registers a listener invoked with `(state, previous)` on every
    /// successful transition.
    ///
    /// ## Panics
    ///
    /// Panics if the success channel's listener limit is exhausted.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&RouterState, Option<&RouterState>) + 'static,
    {
        let id = self
            .inner
            .bus
            .add_listener(
                EventName::TransitionSuccess,
                Rc::new(move |event| {
                    if let RouterEvent::TransitionSuccess { to, from, .. } = event {
                        listener(to, from.as_deref());
                    }
                }),
            )
            .expect("transition-success listener limit reached");
        Subscription::new(&self.inner.bus, EventName::TransitionSuccess, id)
    }

    /// Starts the router from the configured default route.
    pub async fn start(&self) -> Result<Rc<RouterState>, RouterError> {
        self.start_impl(StartInput::Default).await
    }

    /// Starts the router at the state matching `path`.
    pub async fn start_path(&self, path: &str) -> Result<Rc<RouterState>, RouterError> {
        self.start_impl(StartInput::Path(path.to_owned())).await
    }

    /// Starts the router at a previously persisted state.
    pub async fn start_with_state(
        &self,
        state: RouterState,
    ) -> Result<Rc<RouterState>, RouterError> {
        self.start_impl(StartInput::State(Box::new(state))).await
    }

    async fn start_impl(&self, input: StartInput) -> Result<Rc<RouterState>, RouterError> {
        self.inner
            .bus
            .send(FsmEvent::Start)
            .map_err(|violation| violation.into_router_error())?;

        let initial = match self.compute_start_state(input) {
            Ok(state) => state,
            Err(error) => {
                let _ = self.inner.bus.send(FsmEvent::Fail);
                tracing::debug!(%error, "start failed before the pipeline");
                return Err(error);
            }
        };

        self.run_transition(Rc::new(initial), None, NavigationOptions::default(), true)
            .await
    }

    fn compute_start_state(&self, input: StartInput) -> Result<RouterState, RouterError> {
        let lookup = self.inner.deps.lookup();
        match input {
            StartInput::State(state) => Ok(*state),
            StartInput::Path(path) => {
                let matched = self
                    .inner
                    .tree
                    .borrow()
                    .match_path(&path, Some(&lookup))
                    .map_err(RouterError::transition)?;
                match matched {
                    Some(simple) => {
                        let meta_params = self.inner.tree.borrow().meta_params(&simple.name);
                        Ok(self.inner.store.make_state(
                            simple.name,
                            simple.params,
                            simple.path,
                            NavigationOptions::default(),
                            meta_params,
                            None,
                        ))
                    }
                    None => self.default_start_state(&lookup).ok_or(RouterError::NotFound {
                        target: path.clone(),
                    }),
                }
            }
            StartInput::Default => self
                .default_start_state(&lookup)
                .ok_or(RouterError::NoStartPathOrState),
        }
    }

    fn default_start_state(&self, lookup: &DependencyLookup) -> Option<RouterState> {
        let options = &self.inner.options;
        let name = options.default_route.as_deref()?;
        let simple = self
            .inner
            .tree
            .borrow()
            .build_state(name, &options.default_params, Some(lookup))
            .ok()?;
        let meta_params = self.inner.tree.borrow().meta_params(&simple.name);
        Some(self.inner.store.make_state(
            simple.name,
            simple.params,
            simple.path,
            NavigationOptions::default(),
            meta_params,
            None,
        ))
    }

    /// Stops the router, clearing the current state. A no-op when not
    /// running.
    pub fn stop(&self) -> &Self {
        match self.status() {
            RouterStatus::Ready | RouterStatus::Transitioning => {
                self.cancel_active_transition();
                let _ = self.inner.bus.send(FsmEvent::Stop);
                if let Err(error) = self.inner.bus.emit(&RouterEvent::Stop) {
                    tracing::error!(%error, "failed to emit stop event");
                }
                self.inner.store.clear();
            }
            _ => {}
        }
        self
    }

    /// Disposes the router. Idempotent; every subsequent mutating call
    /// fails with [`RouterError::Disposed`].
    pub fn dispose(&self) {
        if self.status() == RouterStatus::Disposed {
            return;
        }
        self.cancel_active_transition();
        if self.status() == RouterStatus::Starting {
            let _ = self.inner.bus.send(FsmEvent::Fail);
        }
        self.stop();
        let _ = self.inner.bus.send(FsmEvent::Dispose);

        self.inner.plugins.teardown_all(&self.inner.bus);
        self.inner.bus.clear_listeners();
        self.inner.lifecycle.clear_all();
        self.inner.tree.borrow_mut().clear();
        self.inner.deps.clear();
        self.inner.store.clear();
        self.inner.segment_cache.clear();
    }

    /// Cancels the in-flight transition, if any: aborts its token,
    /// emits its cancel event, and returns the FSM to `Ready`.
    pub(crate) fn cancel_active_transition(&self) {
        let Some(active) = self.inner.active.borrow_mut().take() else {
            return;
        };
        active.token.cancel();
        if let Err(error) = self.inner.bus.emit(&RouterEvent::TransitionCancel {
            to: Rc::clone(&active.to),
            from: active.from.clone(),
        }) {
            tracing::error!(%error, "failed to emit cancel event");
        }
        if self.status() == RouterStatus::Transitioning {
            let _ = self.inner.bus.send(FsmEvent::Cancel);
        }
    }

    pub(crate) fn register_active(
        &self,
        id: u64,
        token: CancelToken,
        to: Rc<RouterState>,
        from: Option<Rc<RouterState>>,
    ) {
        *self.inner.active.borrow_mut() = Some(ActiveTransition {
            id,
            token,
            to,
            from,
        });
    }

    pub(crate) fn is_registered_transition(&self, id: u64) -> bool {
        self.inner
            .active
            .borrow()
            .as_ref()
            .is_some_and(|active| active.id == id)
    }

    /// Clears the active slot if it still belongs to transition `id`.
    pub(crate) fn clear_active(&self, id: u64) -> bool {
        let mut active = self.inner.active.borrow_mut();
        if active.as_ref().is_some_and(|a| a.id == id) {
            *active = None;
            true
        } else {
            false
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("status", &self.status())
            .field("routes", &self.inner.tree.borrow().len())
            .finish()
    }
}

enum StartInput {
    Default,
    Path(String),
    State(Box<RouterState>),
}

fn params_equal_except(a: &Params, b: &Params, ignored: &[String]) -> bool {
    let keys: std::collections::BTreeSet<&str> = a
        .keys()
        .chain(b.keys())
        .filter(|k| !ignored.iter().any(|i| i == k))
        .collect();
    keys.into_iter().all(|k| a.get(k) == b.get(k))
}

fn params_subset_except(subset: &Params, superset: &Params, ignored: &[String]) -> bool {
    subset
        .iter()
        .filter(|(k, _)| !ignored.iter().any(|i| i == k))
        .all(|(k, v)| superset.get(k) == Some(v))
}
