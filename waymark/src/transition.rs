//! The transition engine.
//!
//! [`Router::navigate`] is the single entry point for transitions. A
//! transition proposes a destination state, runs deactivation guards
//! innermost-first and activation guards outermost-first, re-checks for
//! cancellation between phases, and finally publishes the new state
//! atomically: store write, FSM completion, and success event happen
//! back-to-back with no suspension point between them.
//!
//! At most one transition is ever in flight. A newer navigation cancels
//! the in-flight one before taking its place; `stop`, `dispose`, and a
//! caller-supplied token cancel through the same per-transition token.

use crate::config::GuardFn;
use crate::errors::{GuardError, RouteError, RouterError};
use crate::events::{FsmEvent, FsmViolation, RouterEvent, RouterStatus};
use crate::lifecycle::GuardFamily;
use crate::name::{name_to_ids, TransitionPath};
use crate::navigation::{CancelToken, NavigationOptions};
use crate::params::Params;
use crate::router::Router;
use crate::state::{
    RouterState, SegmentDeltas, TransitionDescriptor, TransitionPhase, TransitionReason,
    UNKNOWN_ROUTE,
};
use futures::future::{select, Either};
use std::rc::Rc;

impl Router {
    /// Navigates to `(name, params)` with default options.
    pub async fn navigate(
        &self,
        name: &str,
        params: Params,
    ) -> Result<Rc<RouterState>, RouterError> {
        self.navigate_with_options(name, params, NavigationOptions::default())
            .await
    }

    /// Navigates to `(name, params)`.
    ///
    /// The returned future resolves with the published state or rejects
    /// with the error that concluded the transition. `SameStates` and
    /// `Cancelled` are expected outcomes of ordinary use; callers that
    /// fire and forget can ignore them safely.
    pub async fn navigate_with_options(
        &self,
        name: &str,
        params: Params,
        options: NavigationOptions,
    ) -> Result<Rc<RouterState>, RouterError> {
        let status = self.status();
        if !status.can_send(FsmEvent::Navigate) {
            let error = FsmViolation {
                from: status,
                event: FsmEvent::Navigate,
            }
            .into_router_error();
            tracing::debug!(name, %error, "navigation rejected by lifecycle");
            return Err(error);
        }

        if !self.inner.options.no_validate {
            if !self.inner.tree.borrow().has(name) {
                let error = RouterError::NotFound {
                    target: name.to_owned(),
                };
                tracing::debug!(name, "navigation target is not registered");
                return Err(error);
            }
            params.validate().map_err(RouterError::transition)?;
        }

        // Build the proposed state through the forwarding slot so that
        // plugin interception applies.
        let simple = (self.inner.forward_slot.get())(name, &params).map_err(|error| match error {
            RouteError::UnknownRoute { name } => RouterError::NotFound { target: name },
            other => RouterError::transition(other),
        })?;
        let meta_params = self.inner.tree.borrow().meta_params(&simple.name);
        let to_state = Rc::new(self.inner.store.make_state(
            simple.name,
            simple.params,
            simple.path,
            options.clone(),
            meta_params,
            None,
        ));

        let from = self.get_state();
        // The short-circuit only applies when nothing is in flight: with
        // a transition pending, the published state is about to be
        // replaced, and navigating "back" to it is a real supersession.
        if status != RouterStatus::Transitioning {
            if let Some(current) = &from {
                if current.same_destination(&to_state) && !options.wants_rerun() {
                    tracing::debug!(name = %to_state.name, "destination equals the current state");
                    return Err(RouterError::SameStates);
                }
            }
        }

        // A preview: hand the would-be state back without touching the
        // store, the FSM, or any in-flight transition.
        if options.skip_transition {
            return Ok(to_state);
        }

        self.cancel_active_transition();
        self.inner
            .bus
            .send(FsmEvent::Navigate)
            .map_err(|violation| violation.into_router_error())?;

        self.run_transition(to_state, from, options, false).await
    }

    /// Navigates to the configured default route.
    pub async fn navigate_to_default(
        &self,
        options: NavigationOptions,
    ) -> Result<Rc<RouterState>, RouterError> {
        let Some(default_route) = self.inner.options.default_route.clone() else {
            return Err(RouterError::NotFound {
                target: "(default route)".to_owned(),
            });
        };
        let params = self.inner.options.default_params.clone();
        self.navigate_with_options(&default_route, params, options)
            .await
    }

    pub(crate) async fn run_transition(
        &self,
        to: Rc<RouterState>,
        from: Option<Rc<RouterState>>,
        options: NavigationOptions,
        is_start: bool,
    ) -> Result<Rc<RouterState>, RouterError> {
        let id = to.meta.as_ref().map(|m| m.id).unwrap_or_default();
        let token = match &options.cancel {
            Some(external) => external.child(),
            None => CancelToken::new(),
        };
        self.register_active(id, token.clone(), Rc::clone(&to), from.clone());

        if let Err(error) = self.inner.bus.emit(&RouterEvent::TransitionStart {
            to: Rc::clone(&to),
            from: from.clone(),
        }) {
            tracing::error!(%error, "failed to emit transition start");
        }

        let path = self.segment_path(&to, from.as_deref(), &options);
        let outcome = self.run_phases(&to, &from, &options, &token, &path, id).await;

        match outcome {
            Ok(()) => {
                self.cleanup_left_guards(&path);

                let descriptor = TransitionDescriptor {
                    phase: TransitionPhase::Activating,
                    from: from.as_ref().map(|s| s.name.clone()),
                    reason: TransitionReason::Success,
                    segments: SegmentDeltas::from(path),
                };
                let mut published = (*to).clone();
                published.transition = Some(descriptor);
                let published = Rc::new(published);

                // Publication is atomic: no suspension point from here to
                // the success event. The active slot is released first so
                // a listener that navigates re-entrantly does not cancel
                // an already-completed transition.
                self.inner.store.set(Rc::clone(&published));
                self.clear_active(id);
                if is_start {
                    let _ = self.inner.bus.send(FsmEvent::Started);
                    if let Err(error) = self.inner.bus.emit(&RouterEvent::Start) {
                        tracing::error!(%error, "failed to emit router start");
                    }
                } else {
                    let _ = self.inner.bus.send(FsmEvent::Complete);
                }
                if let Err(error) = self.inner.bus.emit(&RouterEvent::TransitionSuccess {
                    to: Rc::clone(&published),
                    from: from.clone(),
                    options: options.clone(),
                }) {
                    tracing::error!(%error, "failed to emit transition success");
                }
                Ok(published)
            }
            Err(RouterError::Cancelled) => {
                // If this transition is still the registered one, nobody
                // else has announced the cancellation yet.
                if self.clear_active(id) {
                    if let Err(error) = self.inner.bus.emit(&RouterEvent::TransitionCancel {
                        to: Rc::clone(&to),
                        from: from.clone(),
                    }) {
                        tracing::error!(%error, "failed to emit transition cancel");
                    }
                    match self.status() {
                        RouterStatus::Transitioning => {
                            let _ = self.inner.bus.send(FsmEvent::Cancel);
                        }
                        RouterStatus::Starting => {
                            let _ = self.inner.bus.send(FsmEvent::Fail);
                        }
                        _ => {}
                    }
                }
                tracing::debug!(name = %to.name, "transition cancelled");
                Err(RouterError::Cancelled)
            }
            Err(error) => {
                if !self.clear_active(id) {
                    // Superseded while a guard was concluding: the newer
                    // navigation already announced the cancellation.
                    tracing::debug!(name = %to.name, "transition superseded mid-guard");
                    return Err(RouterError::Cancelled);
                }
                match self.status() {
                    RouterStatus::Transitioning | RouterStatus::Starting => {
                        let _ = self.inner.bus.send(FsmEvent::Fail);
                    }
                    _ => {}
                }
                if let Err(emit_error) = self.inner.bus.emit(&RouterEvent::TransitionError {
                    to: Some(Rc::clone(&to)),
                    from: from.clone(),
                    error: Rc::new(error.clone()),
                }) {
                    tracing::error!(%emit_error, "failed to emit transition error");
                }
                if error.is_expected() {
                    tracing::debug!(name = %to.name, %error, "transition concluded");
                } else {
                    tracing::error!(name = %to.name, %error, "transition failed");
                }
                Err(error)
            }
        }
    }

    fn segment_path(
        &self,
        to: &RouterState,
        from: Option<&RouterState>,
        options: &NavigationOptions,
    ) -> TransitionPath {
        if options.wants_rerun() {
            // A forced rerun tears down and rebuilds the full chains.
            let mut to_deactivate = from.map(|s| name_to_ids(&s.name)).unwrap_or_default();
            to_deactivate.reverse();
            return TransitionPath {
                intersection: String::new(),
                to_deactivate,
                to_activate: name_to_ids(&to.name),
            };
        }
        self.inner
            .segment_cache
            .get(&to.name, from.map(|s| s.name.as_str()))
    }

    async fn run_phases(
        &self,
        to: &Rc<RouterState>,
        from: &Option<Rc<RouterState>>,
        options: &NavigationOptions,
        token: &CancelToken,
        path: &TransitionPath,
        id: u64,
    ) -> Result<(), RouterError> {
        if !options.force_deactivate {
            for segment in &path.to_deactivate {
                if let Some(guard) = self.inner.lifecycle.get(GuardFamily::Deactivate, segment) {
                    self.run_guard(guard, to, from, token, segment, GuardFamily::Deactivate)
                        .await?;
                }
            }
        }
        self.checkpoint(token, id)?;

        if to.name != UNKNOWN_ROUTE {
            for segment in &path.to_activate {
                if let Some(guard) = self.inner.lifecycle.get(GuardFamily::Activate, segment) {
                    self.run_guard(guard, to, from, token, segment, GuardFamily::Activate)
                        .await?;
                }
            }
        }
        self.checkpoint(token, id)?;
        Ok(())
    }

    async fn run_guard(
        &self,
        guard: GuardFn,
        to: &Rc<RouterState>,
        from: &Option<Rc<RouterState>>,
        token: &CancelToken,
        segment: &str,
        family: GuardFamily,
    ) -> Result<(), RouterError> {
        let future = guard(Rc::clone(to), from.clone(), token.clone());
        let result = match select(future, token.cancelled()).await {
            Either::Left((result, _)) => result,
            Either::Right(((), _)) => return Err(RouterError::Cancelled),
        };
        match result {
            Ok(true) => Ok(()),
            Ok(false) => Err(match family {
                GuardFamily::Deactivate => RouterError::CannotDeactivate {
                    segment: segment.to_owned(),
                },
                GuardFamily::Activate => RouterError::CannotActivate {
                    segment: segment.to_owned(),
                },
            }),
            Err(GuardError::Aborted) => Err(RouterError::Cancelled),
            Err(GuardError::Failed(cause)) => Err(RouterError::Transition { cause }),
        }
    }

    /// Re-checks between phases that the transition is still the one the
    /// router is running.
    fn checkpoint(&self, token: &CancelToken, id: u64) -> Result<(), RouterError> {
        if token.is_cancelled() || !self.is_registered_transition(id) {
            return Err(RouterError::Cancelled);
        }
        match self.status() {
            RouterStatus::Transitioning | RouterStatus::Starting => Ok(()),
            _ => Err(RouterError::Cancelled),
        }
    }

    /// Drops deactivation guards for segments the transition left for
    /// good, so abandoned subtrees do not accumulate stale guards.
    fn cleanup_left_guards(&self, path: &TransitionPath) {
        if !self.inner.options.auto_clean_up {
            return;
        }
        for segment in &path.to_deactivate {
            if !path.to_activate.contains(segment) {
                self.inner.lifecycle.remove(GuardFamily::Deactivate, segment);
            }
        }
    }

    /// Returns the predicate view bindings use to decide whether the
    /// subtree rooted at `node_name` should re-render for a transition.
    pub fn should_update_node(
        &self,
        node_name: impl Into<String>,
    ) -> impl Fn(&RouterState, Option<&RouterState>) -> bool {
        let cache = Rc::clone(&self.inner.segment_cache);
        let node_name = node_name.into();
        move |to, from| {
            if to.options().is_some_and(NavigationOptions::wants_rerun) {
                return true;
            }
            let Some(from) = from else {
                return node_name.is_empty() || node_name == to.name;
            };
            let path = cache.get(&to.name, Some(from.name.as_str()));
            node_name == path.intersection
                || path.to_activate.iter().any(|s| s == &node_name)
                || path.to_deactivate.iter().any(|s| s == &node_name)
        }
    }
}
