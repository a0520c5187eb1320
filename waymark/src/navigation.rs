//! Navigation options and cooperative cancellation.
//!
//! Every transition owns one [`CancelToken`]. All three cancellation
//! sources — a caller-supplied token, a superseding navigation, and
//! `stop`/`dispose` — funnel through it, and guards receive a clone so
//! that long-running work can observe the abort.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

/// Options carried by a single navigation request.
///
/// The booleans are a closed set; unknown concerns belong in params or
/// dependencies, not here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavigationOptions {
    /// Ask the history adapter to overwrite the current entry.
    #[serde(default)]
    pub replace: bool,
    /// Re-run the pipeline even when the destination equals the current
    /// state.
    #[serde(default)]
    pub reload: bool,
    /// Synonym of `reload` kept separate for history adapters that
    /// distinguish user-forced reloads.
    #[serde(default)]
    pub force: bool,
    /// Return the would-be state without running the pipeline or
    /// publishing.
    #[serde(default)]
    pub skip_transition: bool,
    /// Bypass deactivation guards entirely.
    #[serde(default)]
    pub force_deactivate: bool,
    /// Marks a navigation spawned as a redirect of another one.
    #[serde(default)]
    pub redirected: bool,
    /// External cancellation source for this navigation.
    #[serde(skip)]
    pub cancel: Option<CancelToken>,
}

impl NavigationOptions {
    /// Options with every flag unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `replace` flag.
    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    /// Sets the `reload` flag.
    pub fn reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }

    /// Sets the `force` flag.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Sets the `skip_transition` flag.
    pub fn skip_transition(mut self, skip: bool) -> Self {
        self.skip_transition = skip;
        self
    }

    /// Sets the `force_deactivate` flag.
    pub fn force_deactivate(mut self, force: bool) -> Self {
        self.force_deactivate = force;
        self
    }

    /// Attaches an external cancellation token.
    pub fn cancel_with(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Whether the pipeline should run even for an equal destination.
    pub(crate) fn wants_rerun(&self) -> bool {
        self.reload || self.force
    }
}

#[derive(Debug, Default)]
struct TokenState {
    cancelled: bool,
    wakers: Vec<Waker>,
    children: Vec<Weak<RefCell<TokenState>>>,
}

/// A cooperative cancellation source.
///
/// Cloning shares the same source. [`CancelToken::child`] derives a token
/// that is cancelled when its parent is, which is how an external
/// caller-supplied token is chained into the per-transition one.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Rc<RefCell<TokenState>>,
}

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.state.borrow().cancelled
    }

    /// Cancels this token, waking every suspended observer and
    /// propagating to derived child tokens.
    pub fn cancel(&self) {
        let mut queue = vec![Rc::clone(&self.state)];
        while let Some(state) = queue.pop() {
            let mut inner = state.borrow_mut();
            if inner.cancelled {
                continue;
            }
            inner.cancelled = true;
            for waker in inner.wakers.drain(..) {
                waker.wake();
            }
            queue.extend(inner.children.drain(..).filter_map(|w| w.upgrade()));
        }
    }

    /// Derives a token that is cancelled whenever `self` is.
    ///
    /// Cancelling the child does not affect the parent.
    pub fn child(&self) -> CancelToken {
        let child = CancelToken::new();
        let mut inner = self.state.borrow_mut();
        if inner.cancelled {
            child.state.borrow_mut().cancelled = true;
        } else {
            inner.children.push(Rc::downgrade(&child.state));
        }
        child
    }

    /// A future that resolves once the token is cancelled.
    pub fn cancelled(&self) -> Cancelled {
        Cancelled {
            state: Rc::clone(&self.state),
        }
    }
}

/// Future returned by [`CancelToken::cancelled`].
#[derive(Debug)]
pub struct Cancelled {
    state: Rc<RefCell<TokenState>>,
}

impl Future for Cancelled {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut inner = self.state.borrow_mut();
        if inner.cancelled {
            return Poll::Ready(());
        }
        if !inner.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            inner.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::future::{select, Either};
    use futures::pin_mut;

    #[test]
    fn starts_uncancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn children_follow_parent() {
        let parent = CancelToken::new();
        let child = parent.child();
        assert!(!child.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn parent_ignores_child_cancel() {
        let parent = CancelToken::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn child_of_cancelled_parent_is_born_cancelled() {
        let parent = CancelToken::new();
        parent.cancel();
        assert!(parent.child().is_cancelled());
    }

    #[test]
    fn cancelled_future_resolves() {
        let token = CancelToken::new();
        token.cancel();
        block_on(token.cancelled());
    }

    #[test]
    fn cancelled_future_wakes_selects() {
        let token = CancelToken::new();
        let watcher = token.cancelled();

        block_on(async {
            let trigger = async {
                token.cancel();
            };
            pin_mut!(trigger);
            match select(watcher, trigger).await {
                // Either branch is fine as long as the watcher has or
                // will complete; poll it to the end.
                Either::Left(((), _)) => {}
                Either::Right(((), watcher)) => watcher.await,
            }
        });
    }

    #[test]
    fn options_builder() {
        let options = NavigationOptions::new()
            .replace(true)
            .reload(true)
            .force_deactivate(true);
        assert!(options.replace);
        assert!(options.reload);
        assert!(options.force_deactivate);
        assert!(!options.skip_transition);
        assert!(options.wants_rerun());
    }

    #[test]
    fn options_serde_skips_token() {
        let options = NavigationOptions::new().cancel_with(CancelToken::new());
        let json = serde_json::to_string(&options).unwrap();
        let back: NavigationOptions = serde_json::from_str(&json).unwrap();
        assert!(back.cancel.is_none());
    }
}
