//! The event bus: router lifecycle FSM plus a typed emitter.
//!
//! The FSM is the single authority on what the router may do next;
//! every externally visible operation asks it before proceeding. The
//! emitter carries six named channels. Emission dispatches over a
//! snapshot of the listener list, so listeners that unsubscribe
//! themselves (or anyone else) mid-dispatch never disturb the iteration
//! in flight — mutations are observed from the next emit on.

use crate::errors::{EventsError, RouterError};
use crate::navigation::NavigationOptions;
use crate::options::Limits;
use crate::state::RouterState;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use thiserror::Error;

/// The lifecycle states of a router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterStatus {
    /// Constructed, not started.
    Idle,
    /// `start` is computing and publishing the initial state.
    Starting,
    /// Started, no transition in flight.
    Ready,
    /// A transition is in flight.
    Transitioning,
    /// Disposed; terminal.
    Disposed,
}

/// Events the FSM accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmEvent {
    /// Begin starting.
    Start,
    /// Starting finished successfully.
    Started,
    /// The current phase failed.
    Fail,
    /// Stop the router.
    Stop,
    /// Begin a transition.
    Navigate,
    /// The in-flight transition published.
    Complete,
    /// The in-flight transition was cancelled.
    Cancel,
    /// Dispose the router.
    Dispose,
}

impl RouterStatus {
    /// The state reached by `event`, or `None` when the event is not
    /// accepted here. This match is the whole transition table; `can_send`
    /// is O(1) by construction.
    pub fn next(self, event: FsmEvent) -> Option<RouterStatus> {
        use FsmEvent::*;
        use RouterStatus::*;
        match (self, event) {
            (Idle, Start) => Some(Starting),
            (Idle, Dispose) => Some(Disposed),
            (Starting, Started) => Some(Ready),
            (Starting, Fail) => Some(Idle),
            (Ready, Navigate) => Some(Transitioning),
            (Ready, Stop) => Some(Idle),
            (Transitioning, Complete) => Some(Ready),
            (Transitioning, Cancel) => Some(Ready),
            (Transitioning, Fail) => Some(Ready),
            // Supersede: a newer navigation replaces the in-flight one.
            (Transitioning, Navigate) => Some(Transitioning),
            _ => None,
        }
    }

    /// Whether `event` is accepted in this state.
    pub fn can_send(self, event: FsmEvent) -> bool {
        self.next(event).is_some()
    }
}

/// An event sent in a state that does not accept it.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("event {event:?} is not accepted in state {from:?}")]
pub struct FsmViolation {
    /// The state the router was in.
    pub from: RouterStatus,
    /// The rejected event.
    pub event: FsmEvent,
}

impl FsmViolation {
    /// Translates the violation into the caller-facing error kind.
    pub fn into_router_error(self) -> RouterError {
        match self.from {
            RouterStatus::Disposed => RouterError::Disposed,
            RouterStatus::Idle if self.event == FsmEvent::Navigate => RouterError::NotStarted,
            RouterStatus::Starting | RouterStatus::Ready | RouterStatus::Transitioning
                if self.event == FsmEvent::Start =>
            {
                RouterError::AlreadyStarted
            }
            _ => RouterError::NotStarted,
        }
    }
}

/// The six event channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventName {
    /// The router started.
    RouterStart,
    /// The router stopped.
    RouterStop,
    /// A transition entered the pipeline.
    TransitionStart,
    /// A transition published its state.
    TransitionSuccess,
    /// A transition failed.
    TransitionError,
    /// A transition was cancelled.
    TransitionCancel,
}

impl EventName {
    pub(crate) const ALL: [EventName; 6] = [
        EventName::RouterStart,
        EventName::RouterStop,
        EventName::TransitionStart,
        EventName::TransitionSuccess,
        EventName::TransitionError,
        EventName::TransitionCancel,
    ];

    fn index(self) -> usize {
        match self {
            Self::RouterStart => 0,
            Self::RouterStop => 1,
            Self::TransitionStart => 2,
            Self::TransitionSuccess => 3,
            Self::TransitionError => 4,
            Self::TransitionCancel => 5,
        }
    }

    /// The channel's wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RouterStart => "$start",
            Self::RouterStop => "$stop",
            Self::TransitionStart => "$$start",
            Self::TransitionSuccess => "$$success",
            Self::TransitionError => "$$error",
            Self::TransitionCancel => "$$cancel",
        }
    }
}

/// A typed event as delivered to listeners.
#[derive(Debug, Clone)]
pub enum RouterEvent {
    /// The router started.
    Start,
    /// The router stopped.
    Stop,
    /// A transition entered the pipeline.
    TransitionStart {
        /// The proposed destination.
        to: Rc<RouterState>,
        /// The state navigated away from.
        from: Option<Rc<RouterState>>,
    },
    /// A transition published its state.
    TransitionSuccess {
        /// The published state.
        to: Rc<RouterState>,
        /// The state navigated away from.
        from: Option<Rc<RouterState>>,
        /// The options the navigation carried.
        options: NavigationOptions,
    },
    /// A transition failed.
    TransitionError {
        /// The proposed destination, when one was built.
        to: Option<Rc<RouterState>>,
        /// The state navigated away from.
        from: Option<Rc<RouterState>>,
        /// What went wrong.
        error: Rc<RouterError>,
    },
    /// A transition was cancelled.
    TransitionCancel {
        /// The destination the cancelled transition was headed for.
        to: Rc<RouterState>,
        /// The state it was leaving.
        from: Option<Rc<RouterState>>,
    },
}

impl RouterEvent {
    /// The channel this event belongs to.
    pub fn name(&self) -> EventName {
        match self {
            Self::Start => EventName::RouterStart,
            Self::Stop => EventName::RouterStop,
            Self::TransitionStart { .. } => EventName::TransitionStart,
            Self::TransitionSuccess { .. } => EventName::TransitionSuccess,
            Self::TransitionError { .. } => EventName::TransitionError,
            Self::TransitionCancel { .. } => EventName::TransitionCancel,
        }
    }
}

/// A registered listener.
pub type Listener = Rc<dyn Fn(&RouterEvent)>;

/// FSM plus emitter.
pub struct EventBus {
    status: Cell<RouterStatus>,
    // Monotonic ids keep dispatch in registration order and survive
    // removals without reuse.
    channels: [RefCell<BTreeMap<u64, Listener>>; 6],
    depths: [Cell<usize>; 6],
    warned: [Cell<bool>; 6],
    next_id: Cell<u64>,
    max_listeners: usize,
    warn_listeners: usize,
    max_event_depth: usize,
}

impl EventBus {
    /// Creates a bus in the `Idle` state.
    pub fn new(limits: &Limits) -> Self {
        Self {
            status: Cell::new(RouterStatus::Idle),
            channels: Default::default(),
            depths: Default::default(),
            warned: Default::default(),
            next_id: Cell::new(0),
            max_listeners: limits.max_listeners,
            warn_listeners: limits.warn_listeners,
            max_event_depth: limits.max_event_depth,
        }
    }

    /// The current FSM state.
    pub fn status(&self) -> RouterStatus {
        self.status.get()
    }

    /// Whether the FSM accepts `event` right now.
    pub fn can_send(&self, event: FsmEvent) -> bool {
        self.status.get().can_send(event)
    }

    /// Drives the FSM, returning the state entered.
    pub fn send(&self, event: FsmEvent) -> Result<RouterStatus, FsmViolation> {
        let from = self.status.get();
        match from.next(event) {
            Some(next) => {
                self.status.set(next);
                Ok(next)
            }
            None => Err(FsmViolation { from, event }),
        }
    }

    /// Registers a listener, returning its id.
    pub fn add_listener(&self, name: EventName, listener: Listener) -> Result<u64, EventsError> {
        let channel = &self.channels[name.index()];
        let len = channel.borrow().len();
        if len >= self.max_listeners {
            return Err(EventsError::TooManyListeners {
                event: name.as_str(),
                limit: self.max_listeners,
            });
        }
        if len + 1 >= self.warn_listeners && !self.warned[name.index()].replace(true) {
            tracing::warn!(
                event = name.as_str(),
                listeners = len + 1,
                "listener count crossed the warning threshold"
            );
        }
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        channel.borrow_mut().insert(id, listener);
        Ok(id)
    }

    /// Removes a listener by id. Returns whether it was registered.
    pub fn remove_listener(&self, name: EventName, id: u64) -> bool {
        self.channels[name.index()].borrow_mut().remove(&id).is_some()
    }

    /// The number of listeners on `name`.
    pub fn listeners_len(&self, name: EventName) -> usize {
        self.channels[name.index()].borrow().len()
    }

    /// Removes every listener from every channel.
    pub fn clear_listeners(&self) {
        for channel in &self.channels {
            channel.borrow_mut().clear();
        }
    }

    /// Dispatches `event` to the listeners registered on its channel at
    /// the moment of emission.
    ///
    /// A listener that panics is logged and skipped; the rest of the
    /// snapshot still runs.
    pub fn emit(&self, event: &RouterEvent) -> Result<(), EventsError> {
        let index = event.name().index();
        let depth = &self.depths[index];
        if depth.get() >= self.max_event_depth {
            return Err(EventsError::MaxDepth {
                event: event.name().as_str(),
                limit: self.max_event_depth,
            });
        }
        depth.set(depth.get() + 1);

        let snapshot: Vec<Listener> = self.channels[index].borrow().values().cloned().collect();
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::error!(
                    event = event.name().as_str(),
                    "listener panicked during dispatch"
                );
            }
        }

        depth.set(depth.get() - 1);
        Ok(())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("status", &self.status.get())
            .finish()
    }
}

/// Handle returned by listener registration; consumes itself to
/// unsubscribe.
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<EventBus>,
    channel: EventName,
    id: u64,
}

impl Subscription {
    pub(crate) fn new(bus: &Rc<EventBus>, channel: EventName, id: u64) -> Self {
        Self {
            bus: Rc::downgrade(bus),
            channel,
            id,
        }
    }

    /// Removes the listener this handle stands for.
    pub fn unsubscribe(self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove_listener(self.channel, self.id);
        }
    }
}
