//! Route states and the store that publishes them.
//!
//! A [`RouterState`] is a value: once the engine publishes one it is
//! shared as `Rc<RouterState>` and never mutated again. A new state
//! replaces the old one atomically; observers holding the previous `Rc`
//! keep an unchanging snapshot.

use crate::name::TransitionPath;
use crate::navigation::NavigationOptions;
use crate::params::{ParamValue, Params};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Reserved route name used when `allow_not_found` synthesizes a state
/// for a path that matches nothing.
pub const UNKNOWN_ROUTE: &str = "@@router/UNKNOWN_ROUTE";

/// The bare result of matching or forwarding, before meta is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleState {
    /// Full route name.
    pub name: String,
    /// Resolved params.
    pub params: Params,
    /// The URL representing this state.
    pub path: String,
}

/// Which half of the pipeline a transition descriptor refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPhase {
    /// Tearing down segments left behind.
    Deactivating,
    /// Bringing up newly entered segments.
    Activating,
}

/// Why a transition concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionReason {
    /// The transition published its state.
    Success,
    /// The transition was cancelled.
    Cancelled,
    /// The transition failed.
    Error,
}

/// The segment deltas of a completed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentDeltas {
    /// Segments left, innermost first.
    pub deactivated: Vec<String>,
    /// Segments entered, outermost first.
    pub activated: Vec<String>,
    /// Innermost segment shared by both states.
    pub intersection: String,
}

impl From<TransitionPath> for SegmentDeltas {
    fn from(path: TransitionPath) -> Self {
        Self {
            deactivated: path.to_deactivate,
            activated: path.to_activate,
            intersection: path.intersection,
        }
    }
}

/// Descriptor attached to a state published by a successful transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionDescriptor {
    /// The phase the pipeline was in when it published.
    pub phase: TransitionPhase,
    /// The full name of the state navigated away from, if any.
    pub from: Option<String>,
    /// Why the transition concluded.
    pub reason: TransitionReason,
    /// The segment deltas of the transition.
    pub segments: SegmentDeltas,
}

/// Bookkeeping attached to every made state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateMeta {
    /// Monotonically increasing identifier; `0` marks a preview state
    /// that was never published.
    pub id: u64,
    /// The options the producing navigation carried.
    pub options: NavigationOptions,
    /// Parameter names declared by each segment of the route, keyed by
    /// segment full name.
    pub params: BTreeMap<String, Vec<String>>,
    /// Whether the producing navigation was a redirect.
    pub redirected: bool,
}

/// A route state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterState {
    /// Full route name.
    pub name: String,
    /// Resolved params, path and query alike.
    pub params: Params,
    /// The URL representing this state.
    pub path: String,
    /// Bookkeeping; absent on states rebuilt from foreign data.
    pub meta: Option<StateMeta>,
    /// Attached by the engine when this state is published by a
    /// successful transition.
    pub transition: Option<TransitionDescriptor>,
}

impl RouterState {
    /// Whether `self` and `other` describe the same destination: equal
    /// names and deeply equal params. Meta is ignored.
    pub fn same_destination(&self, other: &RouterState) -> bool {
        self.name == other.name && self.params == other.params
    }

    /// The producing navigation's options, when known.
    pub fn options(&self) -> Option<&NavigationOptions> {
        self.meta.as_ref().map(|m| &m.options)
    }
}

/// Checks whether a deserialized value has the shape of a persisted
/// state.
///
/// History adapters use this to validate what they read back from
/// session storage before trusting it.
pub fn is_state(value: &serde_json::Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    object.get("name").is_some_and(serde_json::Value::is_string)
        && object.get("path").is_some_and(serde_json::Value::is_string)
        && object.get("params").is_some_and(serde_json::Value::is_object)
}

/// Rebuilds a state from foreign data, if it has the right shape.
pub fn state_from_json(value: serde_json::Value) -> Option<RouterState> {
    if !is_state(&value) {
        return None;
    }
    serde_json::from_value(value).ok()
}

/// Holds the current and previous published states.
#[derive(Debug, Default)]
pub struct StateStore {
    current: RefCell<Option<Rc<RouterState>>>,
    previous: RefCell<Option<Rc<RouterState>>>,
    next_id: Cell<u64>,
}

impl StateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current published state.
    pub fn get(&self) -> Option<Rc<RouterState>> {
        self.current.borrow().clone()
    }

    /// The previously published state.
    pub fn get_previous(&self) -> Option<Rc<RouterState>> {
        self.previous.borrow().clone()
    }

    /// Publishes `state`, rotating the current one into `previous`.
    pub fn set(&self, state: Rc<RouterState>) {
        let old = self.current.borrow_mut().replace(state);
        *self.previous.borrow_mut() = old;
    }

    /// Drops both states. The id counter keeps counting so that states
    /// across a stop/start cycle stay distinguishable.
    pub fn clear(&self) {
        *self.current.borrow_mut() = None;
        *self.previous.borrow_mut() = None;
    }

    /// Builds a state, assigning the next id unless `force_id` pins one.
    ///
    /// Passing `Some(0)` builds a preview state without consuming an id.
    pub fn make_state(
        &self,
        name: impl Into<String>,
        params: Params,
        path: impl Into<String>,
        options: NavigationOptions,
        meta_params: BTreeMap<String, Vec<String>>,
        force_id: Option<u64>,
    ) -> RouterState {
        let id = force_id.unwrap_or_else(|| {
            let id = self.next_id.get() + 1;
            self.next_id.set(id);
            id
        });
        let redirected = options.redirected;
        RouterState {
            name: name.into(),
            params,
            path: path.into(),
            meta: Some(StateMeta {
                id,
                options,
                params: meta_params,
                redirected,
            }),
            transition: None,
        }
    }

    /// Builds the reserved unknown-route state for `path`.
    pub fn make_not_found_state(&self, path: &str, options: NavigationOptions) -> RouterState {
        let mut params = Params::new();
        params.insert("path", ParamValue::String(path.to_owned()));
        self.make_state(UNKNOWN_ROUTE, params, path, options, BTreeMap::new(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    fn make(store: &StateStore, name: &str) -> RouterState {
        store.make_state(
            name,
            Params::new(),
            format!("/{name}"),
            NavigationOptions::default(),
            BTreeMap::new(),
            None,
        )
    }

    #[test]
    fn ids_increase_monotonically() {
        let store = StateStore::new();
        let a = make(&store, "a");
        let b = make(&store, "b");
        let c = make(&store, "c");
        let ids: Vec<u64> = [a, b, c].iter().map(|s| s.meta.as_ref().unwrap().id).collect();
        assert!(ids[0] < ids[1] && ids[1] < ids[2]);
    }

    #[test]
    fn force_id_pins_without_consuming() {
        let store = StateStore::new();
        let preview = store.make_state(
            "p",
            Params::new(),
            "/p",
            NavigationOptions::default(),
            BTreeMap::new(),
            Some(0),
        );
        assert_eq!(preview.meta.unwrap().id, 0);

        let real = make(&store, "r");
        assert_eq!(real.meta.unwrap().id, 1);
    }

    #[test]
    fn set_rotates_previous() {
        let store = StateStore::new();
        let a = Rc::new(make(&store, "a"));
        let b = Rc::new(make(&store, "b"));

        store.set(a.clone());
        assert_eq!(store.get().unwrap().name, "a");
        assert!(store.get_previous().is_none());

        store.set(b);
        assert_eq!(store.get().unwrap().name, "b");
        assert_eq!(store.get_previous().unwrap().name, "a");

        // The rotated-out state is the very same allocation.
        assert!(Rc::ptr_eq(&store.get_previous().unwrap(), &a));
    }

    #[test]
    fn clear_drops_both() {
        let store = StateStore::new();
        store.set(Rc::new(make(&store, "a")));
        store.set(Rc::new(make(&store, "b")));
        store.clear();
        assert!(store.get().is_none());
        assert!(store.get_previous().is_none());
    }

    #[test]
    fn not_found_state_carries_path_param() {
        let store = StateStore::new();
        let state = store.make_not_found_state("/nope", NavigationOptions::default());
        assert_eq!(state.name, UNKNOWN_ROUTE);
        assert_eq!(state.params.get("path").unwrap().as_str(), Some("/nope"));
        assert_eq!(state.path, "/nope");
    }

    #[test]
    fn same_destination_ignores_meta() {
        let store = StateStore::new();
        let mut a = make(&store, "users");
        let mut b = make(&store, "users");
        a.params = params!("id" => "1");
        b.params = params!("id" => "1");
        assert!(a.same_destination(&b));

        b.params = params!("id" => "2");
        assert!(!a.same_destination(&b));
    }

    #[test]
    fn is_state_checks_shape() {
        let good = serde_json::json!({
            "name": "users.view",
            "path": "/users/view/1",
            "params": {"id": "1"},
        });
        assert!(is_state(&good));
        assert!(state_from_json(good).is_some());

        let bad = serde_json::json!({"name": "users.view"});
        assert!(!is_state(&bad));
        assert!(!is_state(&serde_json::json!("string")));
    }
}
