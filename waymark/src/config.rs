//! Route definitions.
//!
//! A [`RouteConfig`] is what the caller hands the router: a named path
//! pattern with optional children, forwarding, guards, default params,
//! and codecs. The tree compiles these definitions into matchable nodes
//! but keeps the originals verbatim so they can be inspected and so a
//! cloned router can be rebuilt from them.

use crate::dependencies::DependencyLookup;
use crate::errors::GuardError;
use crate::navigation::CancelToken;
use crate::params::Params;
use crate::router::Router;
use crate::state::RouterState;
use futures::future::LocalBoxFuture;
use std::fmt;
use std::rc::Rc;

/// The future a guard returns. Resolving `Ok(true)` allows the
/// transition, `Ok(false)` blocks it.
pub type GuardFuture = LocalBoxFuture<'static, Result<bool, GuardError>>;

/// An instantiated guard, called once per relevant transition with the
/// proposed destination, the current state, and the transition's
/// cancellation token.
pub type GuardFn = Rc<dyn Fn(Rc<RouterState>, Option<Rc<RouterState>>, CancelToken) -> GuardFuture>;

/// A guard factory: instantiated once at registration with the router
/// handle and a dependency lookup.
pub type GuardFactory = Rc<dyn Fn(&Router, DependencyLookup) -> GuardFn>;

/// A params transform applied when building (`encode`) or matching
/// (`decode`) the owning route. Codecs may add, drop, or rename keys.
pub type ParamCodec = Rc<dyn Fn(&Params) -> Params>;

/// What a forwarding resolver returns: the destination and the params to
/// reach it with.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardResult {
    /// Full name of the destination route.
    pub name: String,
    /// Params for the destination.
    pub params: Params,
}

/// A forwarding resolver callback, given a dependency lookup and the
/// incoming params.
pub type ForwardResolver = Rc<dyn Fn(&DependencyLookup, &Params) -> ForwardResult>;

/// Where a route forwards to.
#[derive(Clone)]
pub enum ForwardTo {
    /// A fixed destination by full name.
    Name(String),
    /// A callback computing the destination per lookup.
    Resolver(ForwardResolver),
}

impl fmt::Debug for ForwardTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Self::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

/// A route definition.
#[derive(Clone)]
pub struct RouteConfig {
    /// Local name; full names are dot-joined at compile time.
    pub name: String,
    /// Path pattern (see [`crate::paths::PathPattern`]).
    pub path: String,
    /// Child definitions.
    pub children: Vec<RouteConfig>,
    /// Forwarding target, if this route is an alias.
    pub forward_to: Option<ForwardTo>,
    /// Activation guard factory.
    pub can_activate: Option<GuardFactory>,
    /// Deactivation guard factory.
    pub can_deactivate: Option<GuardFactory>,
    /// Params filled in when absent from a navigation.
    pub default_params: Params,
    /// Transform applied to params when building this route's path.
    pub encode_params: Option<ParamCodec>,
    /// Transform applied to matched params for this route.
    pub decode_params: Option<ParamCodec>,
    /// User-defined fields, preserved verbatim.
    pub extra: Params,
}

impl RouteConfig {
    /// Creates a definition with the given local name and path pattern.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            children: Vec::new(),
            forward_to: None,
            can_activate: None,
            can_deactivate: None,
            default_params: Params::new(),
            encode_params: None,
            decode_params: None,
            extra: Params::new(),
        }
    }

    /// Appends a child definition.
    pub fn child(mut self, child: RouteConfig) -> Self {
        self.children.push(child);
        self
    }

    /// Replaces the child definitions.
    pub fn children(mut self, children: Vec<RouteConfig>) -> Self {
        self.children = children;
        self
    }

    /// Forwards this route to a fixed destination.
    pub fn forward_to(mut self, name: impl Into<String>) -> Self {
        self.forward_to = Some(ForwardTo::Name(name.into()));
        self
    }

    /// Forwards this route through a resolver callback.
    pub fn forward_with<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&DependencyLookup, &Params) -> ForwardResult + 'static,
    {
        self.forward_to = Some(ForwardTo::Resolver(Rc::new(resolver)));
        self
    }

    /// Sets the activation guard factory.
    pub fn can_activate(mut self, factory: GuardFactory) -> Self {
        self.can_activate = Some(factory);
        self
    }

    /// Sets the deactivation guard factory.
    pub fn can_deactivate(mut self, factory: GuardFactory) -> Self {
        self.can_deactivate = Some(factory);
        self
    }

    /// Sets the default params.
    pub fn default_params(mut self, params: Params) -> Self {
        self.default_params = params;
        self
    }

    /// Sets the encode transform.
    pub fn encode_params<F>(mut self, codec: F) -> Self
    where
        F: Fn(&Params) -> Params + 'static,
    {
        self.encode_params = Some(Rc::new(codec));
        self
    }

    /// Sets the decode transform.
    pub fn decode_params<F>(mut self, codec: F) -> Self
    where
        F: Fn(&Params) -> Params + 'static,
    {
        self.decode_params = Some(Rc::new(codec));
        self
    }

    /// Attaches user-defined fields.
    pub fn extra(mut self, extra: Params) -> Self {
        self.extra = extra;
        self
    }
}

impl fmt::Debug for RouteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteConfig")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("children", &self.children)
            .field("forward_to", &self.forward_to)
            .field("has_can_activate", &self.can_activate.is_some())
            .field("has_can_deactivate", &self.can_deactivate.is_some())
            .field("default_params", &self.default_params)
            .finish()
    }
}

/// Wraps a synchronous predicate as a guard factory.
///
/// ```rust
/// use waymark::{sync_guard, RouteConfig};
///
/// let admin = RouteConfig::new("admin", "/admin")
///     .can_activate(sync_guard(|_to, _from| false));
/// # let _ = admin;
/// ```
pub fn sync_guard<F>(predicate: F) -> GuardFactory
where
    F: Fn(&RouterState, Option<&RouterState>) -> bool + Clone + 'static,
{
    Rc::new(move |_router, _deps| {
        let predicate = predicate.clone();
        Rc::new(move |to, from, _cancel| {
            let allowed = predicate(&to, from.as_deref());
            Box::pin(futures::future::ready(Ok(allowed)))
        })
    })
}

/// Wraps an asynchronous closure as a guard factory.
pub fn async_guard<F, Fut>(run: F) -> GuardFactory
where
    F: Fn(Rc<RouterState>, Option<Rc<RouterState>>, CancelToken) -> Fut + Clone + 'static,
    Fut: std::future::Future<Output = Result<bool, GuardError>> + 'static,
{
    Rc::new(move |_router, _deps| {
        let run = run.clone();
        Rc::new(move |to, from, cancel| Box::pin(run(to, from, cancel)))
    })
}
