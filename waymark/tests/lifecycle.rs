//! Router lifecycle: start, stop, dispose, and the event ordering
//! around them.

use futures::executor::block_on;
use std::cell::RefCell;
use std::rc::Rc;
use waymark::{
    params, DependencyLookup, NavigationOptions, Params, RouteConfig, RouteError, Router,
    RouterError, RouterOptions, RouterPlugin, RouterState,
};

fn routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig::new("home", "/"),
        RouteConfig::new("users", "/users").child(RouteConfig::new("view", "/view/:id")),
    ]
}

struct Recorder(Rc<RefCell<Vec<String>>>);

impl RouterPlugin for Recorder {
    fn on_start(&self) {
        self.0.borrow_mut().push("router_start".into());
    }
    fn on_stop(&self) {
        self.0.borrow_mut().push("router_stop".into());
    }
    fn on_transition_start(&self, to: &RouterState, _: Option<&RouterState>) {
        self.0.borrow_mut().push(format!("start:{}", to.name));
    }
    fn on_transition_success(
        &self,
        to: &RouterState,
        _: Option<&RouterState>,
        _: &NavigationOptions,
    ) {
        self.0.borrow_mut().push(format!("success:{}", to.name));
    }
    fn teardown(&self) {
        self.0.borrow_mut().push("teardown".into());
    }
}

fn recorder(log: &Rc<RefCell<Vec<String>>>) -> waymark::PluginFactory {
    let log = Rc::clone(log);
    Rc::new(
        move |_: &Router, _: DependencyLookup| -> Rc<dyn RouterPlugin> {
            Rc::new(Recorder(Rc::clone(&log)))
        },
    )
}

#[test]
fn start_emits_events_in_order() {
    let router = Router::new(routes()).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    router.use_plugin(recorder(&log)).unwrap();

    block_on(async {
        let state = router.start_path("/").await.unwrap();
        assert_eq!(state.name, "home");
        assert_eq!(
            *log.borrow(),
            vec!["start:home", "router_start", "success:home"]
        );
        assert!(router.is_active());
    });
}

#[test]
fn start_uses_the_default_route_when_no_input() {
    let router = Router::with_options(
        routes(),
        RouterOptions::new()
            .default_route("users.view")
            .default_params(params!("id" => "me")),
    )
    .unwrap();

    block_on(async {
        let state = router.start().await.unwrap();
        assert_eq!(state.name, "users.view");
        assert_eq!(state.path, "/users/view/me");
    });
}

#[test]
fn start_without_input_or_default_fails() {
    let router = Router::new(routes()).unwrap();
    block_on(async {
        let result = router.start().await;
        assert!(matches!(result, Err(RouterError::NoStartPathOrState)));
        assert!(!router.is_active());
        // The failure is recoverable: a later start works.
        router.start_path("/").await.unwrap();
    });
}

#[test]
fn start_with_a_persisted_state() {
    let router = Router::new(routes()).unwrap();
    let persisted = router
        .make_state(
            "users.view",
            params!("id" => "7"),
            "/users/view/7",
            NavigationOptions::default(),
            None,
        );

    block_on(async {
        let state = router.start_with_state(persisted).await.unwrap();
        assert_eq!(state.name, "users.view");
        assert_eq!(router.get_state().unwrap().name, "users.view");
    });
}

#[test]
fn second_start_fails() {
    let router = Router::new(routes()).unwrap();
    block_on(async {
        router.start_path("/").await.unwrap();
        let result = router.start_path("/").await;
        assert!(matches!(result, Err(RouterError::AlreadyStarted)));
    });
}

#[test]
fn unmatched_start_falls_back_to_the_default_route() {
    let router =
        Router::with_options(routes(), RouterOptions::new().default_route("home")).unwrap();
    block_on(async {
        let state = router.start_path("/nope").await.unwrap();
        assert_eq!(state.name, "home");
    });
}

#[test]
fn stop_clears_state_and_emits() {
    let router = Router::new(routes()).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    router.use_plugin(recorder(&log)).unwrap();

    block_on(async {
        router.start_path("/").await.unwrap();
        log.borrow_mut().clear();

        router.stop();
        assert!(!router.is_active());
        assert!(router.get_state().is_none());
        assert_eq!(*log.borrow(), vec!["router_stop"]);

        // Stopping again is a no-op.
        router.stop();
        assert_eq!(*log.borrow(), vec!["router_stop"]);
    });
}

#[test]
fn router_restarts_after_stop() {
    let router = Router::new(routes()).unwrap();
    block_on(async {
        let first = router.start_path("/").await.unwrap();
        router.stop();
        let second = router.start_path("/users/view/1").await.unwrap();
        assert_eq!(second.name, "users.view");
        // Ids stay monotonic across the stop.
        assert!(second.meta.as_ref().unwrap().id > first.meta.as_ref().unwrap().id);
    });
}

#[test]
fn navigation_after_stop_is_rejected() {
    let router = Router::new(routes()).unwrap();
    block_on(async {
        router.start_path("/").await.unwrap();
        router.stop();
        let result = router.navigate("home", Params::new()).await;
        assert!(matches!(result, Err(RouterError::NotStarted)));
    });
}

#[test]
fn dispose_tears_everything_down() {
    let router = Router::new(routes()).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    router.use_plugin(recorder(&log)).unwrap();
    router.set_dependency("api", Rc::new(1u8)).unwrap();

    block_on(async {
        router.start_path("/").await.unwrap();
        router.dispose();

        assert!(log.borrow().contains(&"teardown".to_owned()));
        assert!(router.get_state().is_none());
        assert!(router.get_dependency("api").is_none());
        assert!(router.route_names().is_empty());
        assert_eq!(router.plugin_count(), 0);
    });
}

#[test]
fn disposed_router_rejects_every_mutation() {
    let router = Router::new(routes()).unwrap();
    router.dispose();

    block_on(async {
        assert!(matches!(
            router.start_path("/").await,
            Err(RouterError::Disposed)
        ));
        assert!(matches!(
            router.navigate("home", Params::new()).await,
            Err(RouterError::Disposed)
        ));
        assert!(matches!(
            router.add_route(RouteConfig::new("x", "/x")),
            Err(RouteError::RouterDisposed)
        ));
        assert!(matches!(
            router.set_dependency("k", Rc::new(0u8)),
            Err(RouteError::RouterDisposed)
        ));
        assert!(!router.can_navigate_to("home", &Params::new()));

        // Dispose is idempotent.
        router.dispose();
    });
}

#[test]
fn dispose_while_transitioning_cancels_first() {
    let router = Router::new(routes()).unwrap();
    router
        .add_activate_guard(
            "users",
            waymark::async_guard(|_, _, _| {
                futures::future::pending::<Result<bool, waymark::GuardError>>()
            }),
        )
        .unwrap();

    block_on(async {
        router.start_path("/").await.unwrap();

        let navigation = router.navigate("users.view", params!("id" => "1"));
        let teardown = async {
            router.dispose();
        };
        let (result, ()) = futures::join!(navigation, teardown);
        assert!(matches!(result, Err(RouterError::Cancelled)));
    });
}

#[test]
fn navigate_to_default_uses_configured_route() {
    let router =
        Router::with_options(routes(), RouterOptions::new().default_route("home")).unwrap();
    block_on(async {
        router.start_path("/users/view/2").await.unwrap();
        let state = router
            .navigate_to_default(NavigationOptions::default())
            .await
            .unwrap();
        assert_eq!(state.name, "home");
    });
}
