//! End-to-end navigation through the facade: happy path, same-state
//! short-circuit, previews, and the should-update predicate.

use futures::executor::block_on;
use std::cell::RefCell;
use std::rc::Rc;
use waymark::{
    params, NavigationOptions, Params, PluginFactory, RouteConfig, Router, RouterError,
    RouterPlugin, RouterState,
};

fn routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig::new("home", "/"),
        RouteConfig::new("users", "/users")
            .child(RouteConfig::new("list", "/list"))
            .child(RouteConfig::new("view", "/view/:id")),
    ]
}

struct Recorder {
    log: Rc<RefCell<Vec<String>>>,
}

impl RouterPlugin for Recorder {
    fn on_start(&self) {
        self.log.borrow_mut().push("router_start".into());
    }
    fn on_stop(&self) {
        self.log.borrow_mut().push("router_stop".into());
    }
    fn on_transition_start(&self, to: &RouterState, _from: Option<&RouterState>) {
        self.log.borrow_mut().push(format!("start:{}", to.name));
    }
    fn on_transition_success(
        &self,
        to: &RouterState,
        _from: Option<&RouterState>,
        _options: &NavigationOptions,
    ) {
        self.log.borrow_mut().push(format!("success:{}", to.name));
    }
    fn on_transition_error(
        &self,
        to: Option<&RouterState>,
        _from: Option<&RouterState>,
        error: &RouterError,
    ) {
        let name = to.map(|s| s.name.clone()).unwrap_or_default();
        self.log
            .borrow_mut()
            .push(format!("error:{name}:{error}"));
    }
    fn on_transition_cancel(&self, to: &RouterState, _from: Option<&RouterState>) {
        self.log.borrow_mut().push(format!("cancel:{}", to.name));
    }
}

fn recording(log: &Rc<RefCell<Vec<String>>>) -> PluginFactory {
    let log = Rc::clone(log);
    Rc::new(
        move |_: &Router, _: waymark::DependencyLookup| -> Rc<dyn RouterPlugin> {
            Rc::new(Recorder {
                log: Rc::clone(&log),
            })
        },
    )
}

#[test]
fn navigate_resolves_with_published_state() {
    let router = Router::new(routes()).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    router.use_plugin(recording(&log)).unwrap();

    block_on(async {
        router.start_path("/").await.unwrap();
        log.borrow_mut().clear();

        let state = router
            .navigate("users.view", params!("id" => "123"))
            .await
            .unwrap();

        assert_eq!(state.name, "users.view");
        assert_eq!(state.path, "/users/view/123");
        assert_eq!(state.params.get("id").unwrap().as_str(), Some("123"));

        assert_eq!(
            *log.borrow(),
            vec!["start:users.view".to_owned(), "success:users.view".to_owned()]
        );

        // The published state is the one the store now holds.
        let current = router.get_state().unwrap();
        assert!(Rc::ptr_eq(&current, &state));
        assert_eq!(router.get_previous_state().unwrap().name, "home");
    });
}

#[test]
fn transition_descriptor_describes_the_segments() {
    let router = Router::new(routes()).unwrap();
    block_on(async {
        router.start_path("/users/list").await.unwrap();
        let state = router
            .navigate("users.view", params!("id" => "1"))
            .await
            .unwrap();

        let descriptor = state.transition.as_ref().unwrap();
        assert_eq!(descriptor.from.as_deref(), Some("users.list"));
        assert_eq!(descriptor.segments.intersection, "users");
        assert_eq!(descriptor.segments.deactivated, vec!["users.list"]);
        assert_eq!(descriptor.segments.activated, vec!["users.view"]);
    });
}

#[test]
fn same_state_navigation_is_rejected_without_reload() {
    let router = Router::new(routes()).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    router.use_plugin(recording(&log)).unwrap();

    block_on(async {
        router.start_path("/").await.unwrap();
        router
            .navigate("users.view", params!("id" => "123"))
            .await
            .unwrap();
        log.borrow_mut().clear();

        let result = router.navigate("users.view", params!("id" => "123")).await;
        assert!(matches!(result, Err(RouterError::SameStates)));

        // No transition event was emitted at all.
        assert!(log.borrow().is_empty());
    });
}

#[test]
fn reload_runs_the_pipeline_for_the_same_destination() {
    let router = Router::new(routes()).unwrap();
    block_on(async {
        router.start_path("/").await.unwrap();
        let first = router
            .navigate("users.view", params!("id" => "9"))
            .await
            .unwrap();
        let second = router
            .navigate_with_options(
                "users.view",
                params!("id" => "9"),
                NavigationOptions::new().reload(true),
            )
            .await
            .unwrap();

        assert_eq!(second.name, first.name);
        assert!(second.meta.as_ref().unwrap().id > first.meta.as_ref().unwrap().id);
    });
}

#[test]
fn different_params_are_a_different_state() {
    let router = Router::new(routes()).unwrap();
    block_on(async {
        router.start_path("/").await.unwrap();
        router.navigate("users.view", params!("id" => "1")).await.unwrap();
        let state = router
            .navigate("users.view", params!("id" => "2"))
            .await
            .unwrap();
        assert_eq!(state.params.get("id").unwrap().as_str(), Some("2"));
    });
}

#[test]
fn skip_transition_previews_without_publishing() {
    let router = Router::new(routes()).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    router.use_plugin(recording(&log)).unwrap();

    block_on(async {
        router.start_path("/").await.unwrap();
        log.borrow_mut().clear();

        let preview = router
            .navigate_with_options(
                "users.view",
                params!("id" => "7"),
                NavigationOptions::new().skip_transition(true),
            )
            .await
            .unwrap();

        assert_eq!(preview.name, "users.view");
        assert_eq!(preview.path, "/users/view/7");
        // Nothing moved: no events, current state unchanged.
        assert!(log.borrow().is_empty());
        assert_eq!(router.get_state().unwrap().name, "home");
    });
}

#[test]
fn navigate_before_start_is_rejected() {
    let router = Router::new(routes()).unwrap();
    block_on(async {
        let result = router.navigate("home", Params::new()).await;
        assert!(matches!(result, Err(RouterError::NotStarted)));
    });
}

#[test]
fn navigate_to_unknown_name_is_rejected() {
    let router = Router::new(routes()).unwrap();
    block_on(async {
        router.start_path("/").await.unwrap();
        let result = router.navigate("nowhere", Params::new()).await;
        assert!(matches!(result, Err(RouterError::NotFound { .. })));
    });
}

#[test]
fn published_states_stay_structurally_stable() {
    let router = Router::new(routes()).unwrap();
    block_on(async {
        router.start_path("/").await.unwrap();
        let first = router
            .navigate("users.view", params!("id" => "1"))
            .await
            .unwrap();
        let snapshot = (*first).clone();

        router.navigate("users.list", Params::new()).await.unwrap();
        router.navigate("home", Params::new()).await.unwrap();

        // The old state is untouched by later transitions.
        assert_eq!(first.name, snapshot.name);
        assert_eq!(first.params, snapshot.params);
        assert_eq!(first.path, snapshot.path);
        assert_eq!(first.transition, snapshot.transition);
    });
}

#[test]
fn should_update_node_truth_table() {
    let router = Router::new(routes()).unwrap();
    block_on(async {
        router.start_path("/users/list").await.unwrap();
        let from = router.get_state().unwrap();
        let to = router
            .navigate("users.view", params!("id" => "1"))
            .await
            .unwrap();

        // Intersection and both deltas update; unrelated nodes do not.
        assert!(router.should_update_node("users")(&to, Some(&from)));
        assert!(router.should_update_node("users.list")(&to, Some(&from)));
        assert!(router.should_update_node("users.view")(&to, Some(&from)));
        assert!(!router.should_update_node("home")(&to, Some(&from)));
        assert!(!router.should_update_node("")(&to, Some(&from)));
    });
}

#[test]
fn should_update_node_without_a_source_state() {
    let router = Router::new(routes()).unwrap();
    block_on(async {
        let to = router.start_path("/users/list").await.unwrap();
        assert!(router.should_update_node("")(&to, None));
        assert!(router.should_update_node("users.list")(&to, None));
        assert!(!router.should_update_node("users")(&to, None));
    });
}

#[test]
fn should_update_node_always_updates_on_reload() {
    let router = Router::new(routes()).unwrap();
    block_on(async {
        router.start_path("/users/list").await.unwrap();
        let from = router.get_state().unwrap();
        let to = router
            .navigate_with_options(
                "users.list",
                Params::new(),
                NavigationOptions::new().reload(true),
            )
            .await
            .unwrap();

        assert!(router.should_update_node("home")(&to, Some(&from)));
        assert!(router.should_update_node("anything.at.all")(&to, Some(&from)));
    });
}

#[test]
fn subscribe_receives_every_published_state() {
    let router = Router::new(routes()).unwrap();
    let seen: Rc<RefCell<Vec<(String, Option<String>)>>> = Rc::new(RefCell::new(Vec::new()));
    let subscription = {
        let seen = Rc::clone(&seen);
        router.subscribe(move |to, from| {
            seen.borrow_mut()
                .push((to.name.clone(), from.map(|s| s.name.clone())));
        })
    };

    block_on(async {
        router.start_path("/").await.unwrap();
        router.navigate("users.list", Params::new()).await.unwrap();
        let _ = router.navigate("users.list", Params::new()).await;

        assert_eq!(
            *seen.borrow(),
            vec![
                ("home".to_owned(), None),
                ("users.list".to_owned(), Some("home".to_owned())),
            ]
        );

        subscription.unsubscribe();
        router.navigate("home", Params::new()).await.unwrap();
        assert_eq!(seen.borrow().len(), 2);
    });
}
