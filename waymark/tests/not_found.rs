//! Unknown-route handling: synthesis under `allow_not_found`, guard
//! semantics around the reserved pseudo-route, and the plain not-found
//! failure path.

use futures::executor::block_on;
use std::cell::Cell;
use std::rc::Rc;
use waymark::{
    sync_guard, Params, RouteConfig, Router, RouterError, RouterOptions, UNKNOWN_ROUTE,
};

fn routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig::new("home", "/"),
        RouteConfig::new("users", "/users").child(RouteConfig::new("list", "/list")),
    ]
}

#[test]
fn start_on_unmatched_path_fails_without_allowance() {
    let router = Router::new(routes()).unwrap();
    block_on(async {
        let result = router.start_path("/nope").await;
        assert!(matches!(result, Err(RouterError::NotFound { .. })));
        assert!(!router.is_active());
        assert!(router.get_state().is_none());
    });
}

#[test]
fn start_on_unmatched_path_synthesizes_unknown_state() {
    let router = Router::with_options(routes(), RouterOptions::new().allow_not_found(true)).unwrap();
    block_on(async {
        let state = router.start_path("/nope").await.unwrap();
        assert_eq!(state.name, UNKNOWN_ROUTE);
        assert_eq!(state.params.get("path").unwrap().as_str(), Some("/nope"));
        assert_eq!(state.path, "/nope");
        assert!(router.is_active());
    });
}

#[test]
fn unknown_route_activation_guards_are_skipped() {
    let router = Router::with_options(routes(), RouterOptions::new().allow_not_found(true)).unwrap();
    let called = Rc::new(Cell::new(false));
    {
        let called = Rc::clone(&called);
        router
            .add_activate_guard(
                UNKNOWN_ROUTE,
                sync_guard(move |_, _| {
                    called.set(true);
                    // Would block if it ever ran.
                    false
                }),
            )
            .unwrap();
    }

    block_on(async {
        let state = router.start_path("/missing").await.unwrap();
        assert_eq!(state.name, UNKNOWN_ROUTE);
        assert!(!called.get());
    });
}

#[test]
fn unknown_route_deactivation_guards_run_normally() {
    let router = Router::with_options(routes(), RouterOptions::new().allow_not_found(true)).unwrap();
    let called = Rc::new(Cell::new(false));
    {
        let called = Rc::clone(&called);
        router
            .add_deactivate_guard(
                UNKNOWN_ROUTE,
                sync_guard(move |_, _| {
                    called.set(true);
                    true
                }),
            )
            .unwrap();
    }

    block_on(async {
        router.start_path("/missing").await.unwrap();
        let state = router.navigate("home", Params::new()).await.unwrap();
        assert_eq!(state.name, "home");
        assert!(called.get());
    });
}

#[test]
fn unknown_route_deactivation_guard_can_block() {
    let router = Router::with_options(routes(), RouterOptions::new().allow_not_found(true)).unwrap();
    router
        .add_deactivate_guard(UNKNOWN_ROUTE, sync_guard(|_, _| false))
        .unwrap();

    block_on(async {
        router.start_path("/missing").await.unwrap();
        let result = router.navigate("home", Params::new()).await;
        assert!(matches!(result, Err(RouterError::CannotDeactivate { .. })));
        assert_eq!(router.get_state().unwrap().name, UNKNOWN_ROUTE);
    });
}

#[test]
fn match_path_synthesizes_unknown_state_when_allowed() {
    let router = Router::with_options(routes(), RouterOptions::new().allow_not_found(true)).unwrap();
    let state = router.match_path("/ghost?x=1").unwrap();
    assert_eq!(state.name, UNKNOWN_ROUTE);
    assert_eq!(
        state.params.get("path").unwrap().as_str(),
        Some("/ghost?x=1")
    );

    let strict = Router::new(routes()).unwrap();
    assert!(strict.match_path("/ghost").is_none());
}

#[test]
fn unknown_route_cannot_be_a_navigation_target() {
    let router = Router::with_options(routes(), RouterOptions::new().allow_not_found(true)).unwrap();
    block_on(async {
        router.start_path("/").await.unwrap();
        let result = router.navigate(UNKNOWN_ROUTE, Params::new()).await;
        assert!(matches!(result, Err(RouterError::NotFound { .. })));
    });
}
