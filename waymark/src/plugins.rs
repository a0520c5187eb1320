//! Plugins: observer bundles wired to lifecycle events.
//!
//! A plugin observes; it cannot block or rewrite a transition — blocking
//! is what guards are for. The single sanctioned interception point is
//! the [`ForwardSlot`]: a cell holding the forwarding resolver, which a
//! plugin may wrap to pre- or post-process forwarding results (parameter
//! persistence does exactly this). The engine always reads through the
//! cell.

use crate::dependencies::DependencyLookup;
use crate::errors::{EventsError, RouteError, RouterError};
use crate::events::{EventBus, EventName, RouterEvent};
use crate::navigation::NavigationOptions;
use crate::params::Params;
use crate::router::Router;
use crate::state::{RouterState, SimpleState};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Hooks a plugin may implement; every one defaults to a no-op.
pub trait RouterPlugin {
    /// The router started.
    fn on_start(&self) {}

    /// The router stopped.
    fn on_stop(&self) {}

    /// A transition entered the pipeline.
    fn on_transition_start(&self, _to: &RouterState, _from: Option<&RouterState>) {}

    /// A transition published its state.
    fn on_transition_success(
        &self,
        _to: &RouterState,
        _from: Option<&RouterState>,
        _options: &NavigationOptions,
    ) {
    }

    /// A transition failed.
    fn on_transition_error(
        &self,
        _to: Option<&RouterState>,
        _from: Option<&RouterState>,
        _error: &RouterError,
    ) {
    }

    /// A transition was cancelled.
    fn on_transition_cancel(&self, _to: &RouterState, _from: Option<&RouterState>) {}

    /// The plugin is being removed or the router disposed.
    fn teardown(&self) {}
}

/// A plugin factory, run once per registration (and re-run when a router
/// is cloned).
pub type PluginFactory = Rc<dyn Fn(&Router, DependencyLookup) -> Rc<dyn RouterPlugin>>;

struct PluginRecord {
    factory: PluginFactory,
    instance: Rc<dyn RouterPlugin>,
    listeners: Vec<(EventName, u64)>,
}

/// Registered plugins and their event wiring.
pub struct PluginRegistry {
    records: RefCell<BTreeMap<u64, PluginRecord>>,
    next_id: Cell<u64>,
    max_plugins: usize,
}

impl PluginRegistry {
    /// Creates an empty registry bounded at `max_plugins`.
    pub fn new(max_plugins: usize) -> Self {
        Self {
            records: RefCell::new(BTreeMap::new()),
            next_id: Cell::new(0),
            max_plugins,
        }
    }

    /// The number of registered plugins.
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    /// Returns `true` if no plugins are registered.
    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Wires `instance` to the bus, one listener per hook, and records
    /// it under a fresh id.
    pub fn register(
        &self,
        bus: &EventBus,
        factory: PluginFactory,
        instance: Rc<dyn RouterPlugin>,
    ) -> Result<u64, RouteError> {
        if self.records.borrow().len() >= self.max_plugins {
            return Err(RouteError::LimitExceeded {
                what: "plugins",
                limit: self.max_plugins,
            });
        }

        let mut listeners = Vec::with_capacity(EventName::ALL.len());
        for name in EventName::ALL {
            let plugin = Rc::clone(&instance);
            let listener: Rc<dyn Fn(&RouterEvent)> = Rc::new(move |event| match event {
                RouterEvent::Start => plugin.on_start(),
                RouterEvent::Stop => plugin.on_stop(),
                RouterEvent::TransitionStart { to, from } => {
                    plugin.on_transition_start(to, from.as_deref())
                }
                RouterEvent::TransitionSuccess { to, from, options } => {
                    plugin.on_transition_success(to, from.as_deref(), options)
                }
                RouterEvent::TransitionError { to, from, error } => {
                    plugin.on_transition_error(to.as_deref(), from.as_deref(), error)
                }
                RouterEvent::TransitionCancel { to, from } => {
                    plugin.on_transition_cancel(to, from.as_deref())
                }
            });
            match bus.add_listener(name, listener) {
                Ok(id) => listeners.push((name, id)),
                Err(EventsError::TooManyListeners { limit, .. })
                | Err(EventsError::MaxDepth { limit, .. }) => {
                    // Unwire whatever was already hooked up.
                    for (wired_name, wired_id) in listeners {
                        bus.remove_listener(wired_name, wired_id);
                    }
                    return Err(RouteError::LimitExceeded {
                        what: "event listeners",
                        limit,
                    });
                }
            }
        }

        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.records.borrow_mut().insert(
            id,
            PluginRecord {
                factory,
                instance,
                listeners,
            },
        );
        Ok(id)
    }

    /// Unwires and tears down the plugin registered under `id`.
    pub fn remove(&self, bus: &EventBus, id: u64) -> bool {
        let Some(record) = self.records.borrow_mut().remove(&id) else {
            return false;
        };
        for (name, listener_id) in record.listeners {
            bus.remove_listener(name, listener_id);
        }
        record.instance.teardown();
        true
    }

    /// Unwires and tears down every plugin.
    pub fn teardown_all(&self, bus: &EventBus) {
        let ids: Vec<u64> = self.records.borrow().keys().copied().collect();
        for id in ids {
            self.remove(bus, id);
        }
    }

    /// The registered factories, in registration order, for rebuilding a
    /// cloned router.
    pub fn factories(&self) -> Vec<PluginFactory> {
        self.records
            .borrow()
            .values()
            .map(|r| r.factory.clone())
            .collect()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.len())
            .finish()
    }
}

/// The forwarding resolver the engine reads through.
pub type ForwardFn = Rc<dyn Fn(&str, &Params) -> Result<SimpleState, RouteError>>;

/// Mutable cell holding the current forwarding resolver.
pub struct ForwardSlot {
    cell: RefCell<ForwardFn>,
}

impl ForwardSlot {
    /// Creates the slot with its default resolver.
    pub fn new(default: ForwardFn) -> Self {
        Self {
            cell: RefCell::new(default),
        }
    }

    /// The current resolver.
    pub fn get(&self) -> ForwardFn {
        self.cell.borrow().clone()
    }

    /// Swaps the resolver, returning the previous one so a wrapper can
    /// delegate to it.
    pub fn replace(&self, forward: ForwardFn) -> ForwardFn {
        self.cell.replace(forward)
    }
}

impl std::fmt::Debug for ForwardSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ForwardSlot(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Limits;

    #[derive(Default)]
    struct CountingPlugin {
        starts: Cell<u32>,
        successes: Cell<u32>,
        cancels: Cell<u32>,
        teardowns: Cell<u32>,
    }

    impl RouterPlugin for CountingPlugin {
        fn on_start(&self) {
            self.starts.set(self.starts.get() + 1);
        }
        fn on_transition_success(
            &self,
            _to: &RouterState,
            _from: Option<&RouterState>,
            _options: &NavigationOptions,
        ) {
            self.successes.set(self.successes.get() + 1);
        }
        fn on_transition_cancel(&self, _to: &RouterState, _from: Option<&RouterState>) {
            self.cancels.set(self.cancels.get() + 1);
        }
        fn teardown(&self) {
            self.teardowns.set(self.teardowns.get() + 1);
        }
    }

    fn noop_factory() -> PluginFactory {
        Rc::new(|_, _| Rc::new(CountingPlugin::default()))
    }

    fn state() -> Rc<RouterState> {
        Rc::new(RouterState {
            name: "home".into(),
            params: Params::new(),
            path: "/".into(),
            meta: None,
            transition: None,
        })
    }

    #[test]
    fn hooks_receive_matching_events() {
        let bus = EventBus::new(&Limits::default());
        let registry = PluginRegistry::new(10);
        let plugin = Rc::new(CountingPlugin::default());
        registry
            .register(&bus, noop_factory(), plugin.clone())
            .unwrap();

        bus.emit(&RouterEvent::Start).unwrap();
        bus.emit(&RouterEvent::TransitionSuccess {
            to: state(),
            from: None,
            options: NavigationOptions::default(),
        })
        .unwrap();
        bus.emit(&RouterEvent::TransitionCancel {
            to: state(),
            from: None,
        })
        .unwrap();

        assert_eq!(plugin.starts.get(), 1);
        assert_eq!(plugin.successes.get(), 1);
        assert_eq!(plugin.cancels.get(), 1);
    }

    #[test]
    fn remove_unwires_and_tears_down() {
        let bus = EventBus::new(&Limits::default());
        let registry = PluginRegistry::new(10);
        let plugin = Rc::new(CountingPlugin::default());
        let id = registry
            .register(&bus, noop_factory(), plugin.clone())
            .unwrap();

        assert!(registry.remove(&bus, id));
        assert_eq!(plugin.teardowns.get(), 1);

        bus.emit(&RouterEvent::Start).unwrap();
        assert_eq!(plugin.starts.get(), 0);

        // Removing twice is a no-op.
        assert!(!registry.remove(&bus, id));
        assert_eq!(plugin.teardowns.get(), 1);
    }

    #[test]
    fn plugin_limit_rejects_registration() {
        let bus = EventBus::new(&Limits::default());
        let registry = PluginRegistry::new(1);
        registry
            .register(&bus, noop_factory(), Rc::new(CountingPlugin::default()))
            .unwrap();
        assert!(matches!(
            registry.register(&bus, noop_factory(), Rc::new(CountingPlugin::default())),
            Err(RouteError::LimitExceeded { .. })
        ));
    }

    #[test]
    fn teardown_all_drains_the_registry() {
        let bus = EventBus::new(&Limits::default());
        let registry = PluginRegistry::new(10);
        let first = Rc::new(CountingPlugin::default());
        let second = Rc::new(CountingPlugin::default());
        registry.register(&bus, noop_factory(), first.clone()).unwrap();
        registry.register(&bus, noop_factory(), second.clone()).unwrap();

        registry.teardown_all(&bus);
        assert!(registry.is_empty());
        assert_eq!(first.teardowns.get(), 1);
        assert_eq!(second.teardowns.get(), 1);
        assert_eq!(bus.listeners_len(EventName::RouterStart), 0);
    }

    #[test]
    fn forward_slot_wraps_the_previous_resolver() {
        let default: ForwardFn = Rc::new(|name, params| {
            Ok(SimpleState {
                name: name.to_owned(),
                params: params.clone(),
                path: format!("/{name}"),
            })
        });
        let slot = ForwardSlot::new(default);

        let previous = slot.get();
        slot.replace(Rc::new(move |name, params| {
            let mut state = previous(name, params)?;
            state.params.insert("sticky", "1");
            Ok(state)
        }));

        let resolved = (slot.get())("users", &Params::new()).unwrap();
        assert_eq!(resolved.name, "users");
        assert_eq!(resolved.params.get("sticky").unwrap().as_str(), Some("1"));
    }
}
