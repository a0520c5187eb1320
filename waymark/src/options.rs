//! Router configuration.
//!
//! Options are captured once at construction and never mutated; cloning
//! the struct (and building a new router from it) is the only way to
//! reconfigure.

use crate::params::Params;

/// How trailing slashes are treated when building and matching paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingSlash {
    /// Both forms match; built paths keep the form of the route pattern.
    #[default]
    Default,
    /// Built paths never end in a slash; inputs are normalised before
    /// matching.
    Never,
    /// Built paths always end in a slash; inputs are normalised before
    /// matching.
    Always,
}

/// How query parameters that are not declared by the matched route are
/// treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryParamsMode {
    /// Declared keys are kept verbatim; undeclared keys are dropped.
    #[default]
    Default,
    /// Every key is kept, declared or not.
    Loose,
    /// Undeclared keys reject the match.
    Strict,
}

/// Which characters are escaped when params are written into a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UrlParamsEncoding {
    /// Encode the characters a path or query component cannot contain,
    /// leave the rest alone.
    #[default]
    Default,
    /// Full `encodeURIComponent`-style escaping.
    UriComponent,
    /// Values pass through untouched.
    None,
}

/// Bounds on every unbounded-growth surface of the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of registered dependencies.
    pub max_dependencies: usize,
    /// Maximum number of registered plugins.
    pub max_plugins: usize,
    /// Maximum listeners per event channel; registration beyond this is
    /// rejected.
    pub max_listeners: usize,
    /// Listener count per channel at which a warning is logged once.
    pub warn_listeners: usize,
    /// Maximum re-entrant emit depth per event channel.
    pub max_event_depth: usize,
    /// Maximum number of routes carrying lifecycle guards, per family.
    pub max_lifecycle_handlers: usize,
    /// Maximum length of a single route name.
    pub max_route_name_length: usize,
    /// Capacity of the matcher's path cache.
    pub max_match_cache: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_dependencies: 100,
            max_plugins: 50,
            max_listeners: 10_000,
            warn_listeners: 1_000,
            max_event_depth: 5,
            max_lifecycle_handlers: 200,
            max_route_name_length: 512,
            max_match_cache: 64,
        }
    }
}

/// The immutable configuration snapshot a router is built from.
#[derive(Debug, Clone, Default)]
pub struct RouterOptions {
    /// Route to start on when `start` is called without an input.
    pub default_route: Option<String>,
    /// Params used together with `default_route`.
    pub default_params: Params,
    /// Synthesize an "unknown route" state instead of failing when a path
    /// matches nothing.
    pub allow_not_found: bool,
    /// Trailing-slash handling.
    pub trailing_slash: TrailingSlash,
    /// Whether static path segments match case-sensitively.
    pub case_sensitive: bool,
    /// Undeclared-query-key handling.
    pub query_params_mode: QueryParamsMode,
    /// Escaping applied to params written into URLs.
    pub url_params_encoding: UrlParamsEncoding,
    /// Drop deactivation guards for segments a transition leaves behind.
    pub auto_clean_up: bool,
    /// After a successful match, replace the state path with the
    /// canonical built path of the matched route.
    pub rewrite_path_on_match: bool,
    /// Skip name and params validation on navigation.
    pub no_validate: bool,
    /// Growth bounds.
    pub limits: Limits,
}

impl RouterOptions {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            auto_clean_up: true,
            rewrite_path_on_match: true,
            ..Self::default()
        }
    }

    /// Sets the route to start on when no input is given.
    pub fn default_route(mut self, name: impl Into<String>) -> Self {
        self.default_route = Some(name.into());
        self
    }

    /// Sets the params used with the default route.
    pub fn default_params(mut self, params: Params) -> Self {
        self.default_params = params;
        self
    }

    /// Enables or disables unknown-route synthesis.
    pub fn allow_not_found(mut self, allow: bool) -> Self {
        self.allow_not_found = allow;
        self
    }

    /// Sets the trailing-slash mode.
    pub fn trailing_slash(mut self, mode: TrailingSlash) -> Self {
        self.trailing_slash = mode;
        self
    }

    /// Sets whether static segments match case-sensitively.
    pub fn case_sensitive(mut self, sensitive: bool) -> Self {
        self.case_sensitive = sensitive;
        self
    }

    /// Sets the undeclared-query-key mode.
    pub fn query_params_mode(mut self, mode: QueryParamsMode) -> Self {
        self.query_params_mode = mode;
        self
    }

    /// Sets the URL params escaping mode.
    pub fn url_params_encoding(mut self, encoding: UrlParamsEncoding) -> Self {
        self.url_params_encoding = encoding;
        self
    }

    /// Enables or disables automatic guard clean-up.
    pub fn auto_clean_up(mut self, clean: bool) -> Self {
        self.auto_clean_up = clean;
        self
    }

    /// Enables or disables path canonicalisation after a match.
    pub fn rewrite_path_on_match(mut self, rewrite: bool) -> Self {
        self.rewrite_path_on_match = rewrite;
        self
    }

    /// Enables or disables navigation-time validation.
    pub fn no_validate(mut self, skip: bool) -> Self {
        self.no_validate = skip;
        self
    }

    /// Replaces the growth bounds.
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}
