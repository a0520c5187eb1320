//! Error types for the routing engine.
//!
//! Two families exist. [`RouterError`] is the navigation taxonomy: every
//! failure a transition (or a lifecycle call such as [`Router::start`]) can
//! surface, both through the returned future and through the
//! `TRANSITION_ERROR` event. [`RouteError`] covers registration and
//! validation failures of the route tree itself, which are always surfaced
//! directly to the caller and never travel through the event bus.
//!
//! [`Router::start`]: crate::Router::start

use std::rc::Rc;
use thiserror::Error;

/// An error produced while navigating or driving the router lifecycle.
///
/// `SameStates` and `Cancelled` are expected outcomes of ordinary
/// operation: they fulfil the error contract of the returned future but
/// are only ever logged at debug level.
#[derive(Error, Debug, Clone)]
pub enum RouterError {
    /// No route matches the given path, or the target name is unknown.
    #[error("route not found: {target}")]
    NotFound {
        /// The path or route name that failed to resolve.
        target: String,
    },

    /// `start` was called without an input and no default route is
    /// configured.
    #[error("no start path or state provided, and no default route is configured")]
    NoStartPathOrState,

    /// A navigation API was called while the router was not started.
    #[error("router is not started")]
    NotStarted,

    /// `start` was called on a router that is already running.
    #[error("router is already started")]
    AlreadyStarted,

    /// Any call made after `dispose`.
    #[error("router has been disposed")]
    Disposed,

    /// Navigation to a state equal to the current one, without
    /// `reload` or `force`.
    #[error("navigation target is identical to the current state")]
    SameStates,

    /// A deactivation guard blocked the transition.
    #[error("segment {segment:?} cannot be deactivated")]
    CannotDeactivate {
        /// The segment whose guard returned false.
        segment: String,
    },

    /// An activation guard blocked the transition.
    #[error("segment {segment:?} cannot be activated")]
    CannotActivate {
        /// The segment whose guard returned false.
        segment: String,
    },

    /// A generic failure inside the transition pipeline.
    #[error("transition failed: {cause}")]
    Transition {
        /// The underlying failure.
        cause: throw_error::Error,
    },

    /// The transition was cancelled: superseded by a newer navigation,
    /// aborted through a cancellation token, or interrupted by
    /// `stop`/`dispose`.
    #[error("transition cancelled")]
    Cancelled,
}

impl RouterError {
    /// Wraps an arbitrary error as a pipeline failure.
    pub fn transition(cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transition {
            cause: cause.into(),
        }
    }

    /// Whether this error is an expected outcome of ordinary navigation.
    ///
    /// Expected errors reject the returned future but are not worth
    /// diagnostics: a caller that fires and forgets a navigation must not
    /// have its logs polluted by supersede cancellations or same-state
    /// short-circuits.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::SameStates | Self::Cancelled | Self::NotStarted | Self::NotFound { .. }
        )
    }
}

/// An error raised while registering, replacing, or resolving routes.
#[derive(Error, Debug, Clone)]
pub enum RouteError {
    /// The route name is empty, too long, or contains a reserved
    /// character. Dots are reserved for joining ancestor names.
    #[error("invalid route name {name:?}: {reason}")]
    InvalidName {
        /// The offending name.
        name: String,
        /// What made it invalid.
        reason: &'static str,
    },

    /// A route with the same full name already exists.
    #[error("route {name:?} is already registered")]
    DuplicateName {
        /// The conflicting full name.
        name: String,
    },

    /// The named route does not exist.
    #[error("unknown route {name:?}")]
    UnknownRoute {
        /// The name that failed to resolve.
        name: String,
    },

    /// The route's path pattern could not be parsed.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath {
        /// The offending pattern.
        path: String,
        /// What made it invalid.
        reason: &'static str,
    },

    /// A `forward_to` target does not exist in the tree.
    #[error("route {from:?} forwards to unknown route {to:?}")]
    UnknownForwardTarget {
        /// The forwarding route.
        from: String,
        /// The missing target.
        to: String,
    },

    /// Following the forwarding chain revisited a route.
    #[error("forwarding from {start:?} is cyclic")]
    ForwardCycle {
        /// The route whose chain loops.
        start: String,
    },

    /// The forwarding source declares a parameter its destination does
    /// not.
    #[error("route {route:?} forwards with parameter {param:?} which the destination does not declare")]
    ForwardParams {
        /// The forwarding route.
        route: String,
        /// The undeclared parameter.
        param: String,
    },

    /// Path building failed because a required parameter is absent.
    #[error("cannot build path for {route:?}: missing parameter {param:?}")]
    MissingParam {
        /// The route being built.
        route: String,
        /// The absent parameter.
        param: String,
    },

    /// A registration would exceed a configured limit.
    #[error("{what} limit of {limit} exceeded")]
    LimitExceeded {
        /// The limited resource.
        what: &'static str,
        /// The configured bound.
        limit: usize,
    },

    /// The provided params failed validation.
    #[error(transparent)]
    InvalidParams(#[from] ParamsError),

    /// The owning router has been disposed.
    #[error("router has been disposed")]
    RouterDisposed,
}

/// An error raised by the params validation predicate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    /// A numeric value is NaN or infinite.
    #[error("parameter {key:?} is not a finite number")]
    NonFinite {
        /// The offending key path.
        key: String,
    },

    /// The value tree nests deeper than the engine accepts.
    #[error("params nest deeper than {limit} levels")]
    TooDeep {
        /// The depth bound.
        limit: usize,
    },
}

/// An error raised by the event emitter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventsError {
    /// Re-entrant emission on one channel exceeded the configured depth.
    #[error("emit depth limit of {limit} exceeded on {event:?}")]
    MaxDepth {
        /// The channel on which the overflow happened.
        event: &'static str,
        /// The configured bound.
        limit: usize,
    },

    /// Listener registration would exceed the per-channel bound.
    #[error("listener limit of {limit} exceeded on {event:?}")]
    TooManyListeners {
        /// The channel that is full.
        event: &'static str,
        /// The configured bound.
        limit: usize,
    },
}

/// An error returned by an activation or deactivation guard.
///
/// Guards distinguish being aborted (the transition was cancelled while
/// the guard was suspended) from genuine failure. Aborted guards conclude
/// the transition as cancelled rather than failed.
#[derive(Error, Debug, Clone)]
pub enum GuardError {
    /// The guard observed the cancellation of its transition.
    #[error("guard aborted")]
    Aborted,

    /// The guard failed with an underlying error.
    #[error("{0}")]
    Failed(throw_error::Error),
}

impl GuardError {
    /// Wraps an arbitrary error as a guard failure.
    pub fn other(cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Failed(cause.into())
    }

    /// Wraps a plain message as a guard failure.
    pub fn message(msg: impl Into<String>) -> Self {
        #[derive(Debug, Error)]
        #[error("{0}")]
        struct Message(String);

        Self::Failed(Message(msg.into()).into())
    }
}

/// Shared handle to a router error, as delivered to event listeners.
pub type SharedRouterError = Rc<RouterError>;
