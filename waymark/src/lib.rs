//! A framework-independent client-side routing engine.
//!
//! Waymark keeps a current *route state*, coordinates transitions
//! between states driven by URL paths or programmatic navigation, runs
//! user-supplied guards that authorise or block those transitions, and
//! broadcasts lifecycle events to observers. It is the brain between a
//! history source (address bar, test harness, server-side request) and
//! a view layer; it renders nothing and talks to no browser API itself.
//!
//! # Example
//!
//! ```rust
//! use futures::executor::block_on;
//! use waymark::{params, RouteConfig, Router};
//!
//! let router = Router::new(vec![
//!     RouteConfig::new("home", "/"),
//!     RouteConfig::new("users", "/users")
//!         .child(RouteConfig::new("list", "/list"))
//!         .child(RouteConfig::new("view", "/view/:id")),
//! ])
//! .unwrap();
//!
//! block_on(async {
//!     router.start_path("/").await.unwrap();
//!     let state = router.navigate("users.view", params!("id" => "123")).await.unwrap();
//!     assert_eq!(state.path, "/users/view/123");
//! });
//! ```
//!
//! Guards may suspend: a guard returns a future, and the engine awaits
//! each one in order. Scheduling is cooperative and single-threaded, so
//! everything here is `Rc`-based and `!Send` by design.

mod api;
mod config;
mod dependencies;
mod errors;
mod events;
mod lifecycle;
mod matcher;
mod name;
mod navigation;
mod options;
mod params;
mod paths;
mod plugins;
mod router;
mod state;
mod transition;
mod tree;

pub use api::{clone_router, PluginHandle};
pub use config::{
    async_guard, sync_guard, ForwardResult, ForwardTo, GuardFactory, GuardFn, GuardFuture,
    ParamCodec, RouteConfig,
};
pub use dependencies::{Dependencies, DependencyLookup};
pub use errors::{EventsError, GuardError, ParamsError, RouteError, RouterError};
pub use events::{
    EventBus, EventName, FsmEvent, FsmViolation, Listener, RouterEvent, RouterStatus, Subscription,
};
pub use lifecycle::{GuardFamily, GuardOrigin, LifecycleRegistry};
pub use matcher::{match_tokens, SegmentMatch};
pub use name::{is_name_descendant, name_to_ids, transition_path, SegmentCache, TransitionPath};
pub use navigation::{CancelToken, Cancelled, NavigationOptions};
pub use options::{Limits, QueryParamsMode, RouterOptions, TrailingSlash, UrlParamsEncoding};
pub use params::{ParamValue, Params};
pub use paths::{PathPattern, PathToken};
pub use plugins::{ForwardFn, PluginFactory, PluginRegistry, RouterPlugin};
pub use router::Router;
pub use state::{
    is_state, state_from_json, RouterState, SegmentDeltas, SimpleState, StateMeta, StateStore,
    TransitionDescriptor, TransitionPhase, TransitionReason, UNKNOWN_ROUTE,
};
pub use tree::RouteTree;
