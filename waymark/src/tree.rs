//! The compiled route tree.
//!
//! Definitions go in as [`RouteConfig`] values and come out as an arena
//! of compiled nodes: parsed token sequences, parent links, a static
//! child index for O(1) literal dispatch, effective default params, and
//! the original definitions kept verbatim. Every mutation revalidates and
//! recompiles the whole tree from its definitions — mutations are rare
//! and small next to the match traffic the compiled form serves.

use crate::config::{ForwardTo, GuardFactory, RouteConfig};
use crate::dependencies::DependencyLookup;
use crate::errors::RouteError;
use crate::matcher::{match_tokens, SegmentMatch};
use crate::name::validate_segment_name;
use crate::options::{QueryParamsMode, RouterOptions, TrailingSlash};
use crate::params::{ParamValue, Params};
use crate::paths::{
    decode_component, encode_segment, parse_query, path_segments, serialize_query,
    split_path_query, PathPattern, PathToken,
};
use crate::state::{SimpleState, UNKNOWN_ROUTE};
use nano_lru::LruMap;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

/// A compiled route node.
#[derive(Debug)]
pub(crate) struct RouteNode {
    pub(crate) full_name: String,
    pub(crate) pattern: PathPattern,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
    /// Children whose pattern opens with a literal, keyed by that
    /// literal (case-folded when matching is case-insensitive).
    pub(crate) static_children: HashMap<String, Vec<usize>>,
    /// This node's defaults layered over every ancestor's.
    pub(crate) effective_defaults: Params,
    pub(crate) config: RouteConfig,
}

struct Compiled {
    nodes: Vec<RouteNode>,
    by_name: HashMap<String, usize>,
}

/// The route tree: matcher, path builder, and forwarding resolver.
pub struct RouteTree {
    configs: Vec<RouteConfig>,
    nodes: Vec<RouteNode>,
    by_name: HashMap<String, usize>,
    options: Rc<RouterOptions>,
    root_path: String,
    match_cache: RefCell<LruMap<String, Option<SimpleState>>>,
}

impl RouteTree {
    /// Creates an empty tree.
    pub fn new(options: Rc<RouterOptions>) -> Self {
        let cache_size = options.limits.max_match_cache.max(1);
        let compiled = compile(&[], &options).expect("empty tree always compiles");
        Self {
            configs: Vec::new(),
            nodes: compiled.nodes,
            by_name: compiled.by_name,
            options,
            root_path: String::new(),
            match_cache: RefCell::new(LruMap::new(cache_size)),
        }
    }

    /// Creates a tree from top-level definitions.
    pub fn with_routes(
        options: Rc<RouterOptions>,
        routes: Vec<RouteConfig>,
    ) -> Result<Self, RouteError> {
        let mut tree = Self::new(options);
        tree.add_routes(None, routes)?;
        Ok(tree)
    }

    /// The number of registered routes, the root excluded.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Returns `true` if no routes are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `name` is a registered full route name.
    pub fn has(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Every registered full name, in depth-first declaration order.
    pub fn route_names(&self) -> Vec<String> {
        self.nodes
            .iter()
            .skip(1)
            .map(|n| n.full_name.clone())
            .collect()
    }

    /// The original definition of `name`, as registered.
    pub fn get_config(&self, name: &str) -> Option<&RouteConfig> {
        self.by_name.get(name).map(|&idx| &self.nodes[idx].config)
    }

    /// The top-level definitions the tree was built from.
    pub fn top_level_configs(&self) -> &[RouteConfig] {
        &self.configs
    }

    /// The configured root prefix.
    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    /// Replaces the root prefix stripped on match and prepended on
    /// build.
    pub fn set_root_path(&mut self, path: &str) {
        self.root_path = path.trim_end_matches('/').to_owned();
        self.match_cache.borrow_mut().clear();
    }

    /// Registers definitions under `parent` (or at the top level).
    pub fn add_routes(
        &mut self,
        parent: Option<&str>,
        routes: Vec<RouteConfig>,
    ) -> Result<(), RouteError> {
        let mut next = self.configs.clone();
        match parent {
            None => next.extend(routes),
            Some(parent_name) => {
                let slot = find_config_mut(&mut next, parent_name).ok_or_else(|| {
                    RouteError::UnknownRoute {
                        name: parent_name.to_owned(),
                    }
                })?;
                slot.children.extend(routes);
            }
        }
        self.recompile(next)
    }

    /// Removes the named route and its whole subtree.
    pub fn remove_route(&mut self, name: &str) -> Result<(), RouteError> {
        let mut next = self.configs.clone();
        if !remove_config(&mut next, name) {
            return Err(RouteError::UnknownRoute {
                name: name.to_owned(),
            });
        }
        self.recompile(next)
    }

    /// Replaces the named route's definition, children included.
    pub fn update_route(&mut self, name: &str, config: RouteConfig) -> Result<(), RouteError> {
        let mut next = self.configs.clone();
        let slot = find_config_mut(&mut next, name).ok_or_else(|| RouteError::UnknownRoute {
            name: name.to_owned(),
        })?;
        *slot = config;
        self.recompile(next)
    }

    /// Replaces the whole tree with new top-level definitions.
    pub fn replace_all(&mut self, routes: Vec<RouteConfig>) -> Result<(), RouteError> {
        self.recompile(routes)
    }

    /// Drops every route.
    pub fn clear(&mut self) {
        self.recompile(Vec::new())
            .expect("empty tree always compiles");
    }

    fn recompile(&mut self, configs: Vec<RouteConfig>) -> Result<(), RouteError> {
        let compiled = compile(&configs, &self.options)?;
        self.configs = configs;
        self.nodes = compiled.nodes;
        self.by_name = compiled.by_name;
        self.match_cache.borrow_mut().clear();
        Ok(())
    }

    /// Guard factories declared on route definitions:
    /// `(full_name, can_activate, can_deactivate)`.
    pub fn guard_factories(&self) -> Vec<(String, Option<GuardFactory>, Option<GuardFactory>)> {
        self.nodes
            .iter()
            .skip(1)
            .filter(|n| n.config.can_activate.is_some() || n.config.can_deactivate.is_some())
            .map(|n| {
                (
                    n.full_name.clone(),
                    n.config.can_activate.clone(),
                    n.config.can_deactivate.clone(),
                )
            })
            .collect()
    }

    /// Every parameter name declared along the ancestor chain of
    /// `name`, path and query alike.
    pub fn declared_params(&self, name: &str) -> Vec<String> {
        self.collect_chain_params(name, true)
    }

    /// Parameter names captured from the path portion only.
    pub fn path_param_names(&self, name: &str) -> Vec<String> {
        self.collect_chain_params(name, false)
    }

    fn collect_chain_params(&self, name: &str, with_query: bool) -> Vec<String> {
        let Some(&idx) = self.by_name.get(name) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for node_idx in self.chain(idx) {
            let pattern = &self.nodes[node_idx].pattern;
            out.extend(pattern.path_param_names().map(str::to_owned));
            if with_query {
                out.extend(pattern.query_keys.iter().cloned());
            }
        }
        out
    }

    /// Declared parameter names per segment of `name`, for state meta.
    pub fn meta_params(&self, name: &str) -> BTreeMap<String, Vec<String>> {
        let Some(&idx) = self.by_name.get(name) else {
            return BTreeMap::new();
        };
        self.chain(idx)
            .into_iter()
            .map(|node_idx| {
                let node = &self.nodes[node_idx];
                let declared = node
                    .pattern
                    .all_param_names()
                    .into_iter()
                    .map(str::to_owned)
                    .collect();
                (node.full_name.clone(), declared)
            })
            .collect()
    }

    /// Resolves the forwarding chain from `name`, returning the final
    /// route name and params.
    ///
    /// Routes without forwarding resolve to themselves. The visited set
    /// is bounded; revisiting any name fails rather than looping.
    pub fn forward(
        &self,
        name: &str,
        params: &Params,
        deps: Option<&DependencyLookup>,
    ) -> Result<(String, Params), RouteError> {
        let &idx = self
            .by_name
            .get(name)
            .ok_or_else(|| RouteError::UnknownRoute {
                name: name.to_owned(),
            })?;
        let (final_idx, params) = self.forward_from(idx, params, deps)?;
        Ok((self.nodes[final_idx].full_name.clone(), params))
    }

    fn forward_from(
        &self,
        start: usize,
        params: &Params,
        deps: Option<&DependencyLookup>,
    ) -> Result<(usize, Params), RouteError> {
        let mut idx = start;
        let mut params = params.clone();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(self.nodes[start].full_name.clone());

        while let Some(forward) = &self.nodes[idx].config.forward_to {
            let (next_name, next_params) = match forward {
                ForwardTo::Name(target) => (target.clone(), params.clone()),
                ForwardTo::Resolver(resolver) => {
                    let empty: DependencyLookup = Rc::new(|_| None);
                    let lookup = deps.unwrap_or(&empty);
                    let result = resolver(lookup, &params);
                    (result.name, result.params)
                }
            };
            if !visited.insert(next_name.clone()) {
                return Err(RouteError::ForwardCycle {
                    start: self.nodes[start].full_name.clone(),
                });
            }
            idx = *self
                .by_name
                .get(&next_name)
                .ok_or_else(|| RouteError::UnknownForwardTarget {
                    from: self.nodes[idx].full_name.clone(),
                    to: next_name.clone(),
                })?;
            params = next_params;
        }
        Ok((idx, params))
    }

    /// Builds the URL for `(name, params)`.
    pub fn build_path(&self, name: &str, params: &Params) -> Result<String, RouteError> {
        let &idx = self
            .by_name
            .get(name)
            .ok_or_else(|| RouteError::UnknownRoute {
                name: name.to_owned(),
            })?;
        self.build_path_idx(idx, params)
    }

    /// Resolves forwarding, applies defaults, and builds the full
    /// proposed state for a programmatic navigation to `(name, params)`.
    pub fn build_state(
        &self,
        name: &str,
        params: &Params,
        deps: Option<&DependencyLookup>,
    ) -> Result<SimpleState, RouteError> {
        let &idx = self
            .by_name
            .get(name)
            .ok_or_else(|| RouteError::UnknownRoute {
                name: name.to_owned(),
            })?;
        let (final_idx, params) = self.forward_from(idx, params, deps)?;
        let params = params.merged_over(&self.nodes[final_idx].effective_defaults);
        let path = self.build_path_idx(final_idx, &params)?;
        Ok(SimpleState {
            name: self.nodes[final_idx].full_name.clone(),
            params,
            path,
        })
    }

    /// Matches a URL against the tree.
    ///
    /// `Ok(None)` means nothing matched and unknown-route synthesis is
    /// disabled.
    pub fn match_path(
        &self,
        path: &str,
        deps: Option<&DependencyLookup>,
    ) -> Result<Option<SimpleState>, RouteError> {
        let Some(base) = self.match_core(path) else {
            if self.options.allow_not_found {
                let mut params = Params::new();
                params.insert("path", ParamValue::String(path.to_owned()));
                return Ok(Some(SimpleState {
                    name: UNKNOWN_ROUTE.to_owned(),
                    params,
                    path: path.to_owned(),
                }));
            }
            return Ok(None);
        };

        let &idx = self
            .by_name
            .get(&base.name)
            .expect("matched name is registered");
        if self.nodes[idx].config.forward_to.is_none() {
            return Ok(Some(base));
        }

        let (final_idx, params) = self.forward_from(idx, &base.params, deps)?;
        let params = params.merged_over(&self.nodes[final_idx].effective_defaults);
        let path = self.build_path_idx(final_idx, &params)?;
        Ok(Some(SimpleState {
            name: self.nodes[final_idx].full_name.clone(),
            params,
            path,
        }))
    }

    // Matching before forwarding, memoised per input path. Forwarding is
    // resolved outside the memo because resolver callbacks may read
    // mutable dependencies.
    fn match_core(&self, input: &str) -> Option<SimpleState> {
        if let Some(hit) = self.match_cache.borrow_mut().get(input) {
            return hit.clone();
        }
        let result = self.match_uncached(input);
        self.match_cache
            .borrow_mut()
            .insert(input.to_owned(), result.clone());
        result
    }

    fn match_uncached(&self, input: &str) -> Option<SimpleState> {
        let stripped = self.strip_root(input);
        let (path_part, query) = split_path_query(stripped);
        let raw_segments = path_segments(path_part);
        let decoded: Vec<String> = raw_segments
            .iter()
            .map(|s| decode_component(s, self.options.url_params_encoding))
            .collect();
        let segments: Vec<&str> = decoded.iter().map(String::as_str).collect();

        let (idx, mut params) = self.match_node(0, &segments)?;
        let node = &self.nodes[idx];

        // Query handling per the configured mode.
        let declared: HashSet<String> = self
            .chain(idx)
            .into_iter()
            .flat_map(|n| self.nodes[n].pattern.query_keys.iter().cloned())
            .collect();
        let parsed = query
            .map(|q| parse_query(q, self.options.url_params_encoding))
            .unwrap_or_default();
        match self.options.query_params_mode {
            QueryParamsMode::Strict => {
                if parsed.keys().any(|k| !declared.contains(k)) {
                    return None;
                }
                for (k, v) in parsed.iter() {
                    params.insert(k, v.clone());
                }
            }
            QueryParamsMode::Loose => {
                for (k, v) in parsed.iter() {
                    params.insert(k, v.clone());
                }
            }
            QueryParamsMode::Default => {
                for (k, v) in parsed.iter() {
                    if declared.contains(k) {
                        params.insert(k, v.clone());
                    }
                }
            }
        }

        if let Some(decode) = &node.config.decode_params {
            params = decode(&params);
        }
        let params = params.merged_over(&node.effective_defaults);

        let out_path = if self.options.rewrite_path_on_match {
            self.build_path_idx(idx, &params).ok()?
        } else {
            input.to_owned()
        };

        Some(SimpleState {
            name: node.full_name.clone(),
            params,
            path: out_path,
        })
    }

    fn match_node(&self, idx: usize, segments: &[&str]) -> Option<(usize, Params)> {
        let node = &self.nodes[idx];
        let own: SegmentMatch = if idx == 0 {
            SegmentMatch {
                consumed: 0,
                params: Params::new(),
            }
        } else {
            match_tokens(&node.pattern.tokens, segments, self.options.case_sensitive)?
        };
        let rest = &segments[own.consumed..];

        if rest.is_empty() {
            if idx != 0 {
                return Some((idx, own.params));
            }
            // The root sentinel is not a route; only a child with an
            // empty token sequence can claim "/".
            for &child in &node.children {
                if self.nodes[child].pattern.tokens.is_empty() {
                    if let Some(hit) = self.match_node(child, rest) {
                        return Some(hit);
                    }
                }
            }
            return None;
        }

        // Literal children first (via the index), then params and
        // token-less children in declaration order, splats last.
        let key = self.fold_key(rest[0]);
        if let Some(candidates) = node.static_children.get(&key) {
            for &child in candidates {
                if let Some((leaf, child_params)) = self.match_node(child, rest) {
                    return Some((leaf, layer_params(&own.params, child_params)));
                }
            }
        }

        let mut splats = Vec::new();
        for &child in &node.children {
            match self.nodes[child].pattern.tokens.first() {
                Some(PathToken::Static(_)) => continue,
                Some(PathToken::Splat(_)) => splats.push(child),
                _ => {
                    if let Some((leaf, child_params)) = self.match_node(child, rest) {
                        return Some((leaf, layer_params(&own.params, child_params)));
                    }
                }
            }
        }
        for child in splats {
            if let Some((leaf, child_params)) = self.match_node(child, rest) {
                return Some((leaf, layer_params(&own.params, child_params)));
            }
        }
        None
    }

    fn build_path_idx(&self, idx: usize, params: &Params) -> Result<String, RouteError> {
        let node = &self.nodes[idx];
        let merged = params.merged_over(&node.effective_defaults);
        let effective = match &node.config.encode_params {
            Some(encode) => encode(&merged),
            None => merged,
        };
        let encoding = self.options.url_params_encoding;

        let mut built_segments: Vec<String> = Vec::new();
        let mut used_in_path: HashSet<&str> = HashSet::new();
        for chain_idx in self.chain(idx) {
            let chain_node = &self.nodes[chain_idx];
            for token in &chain_node.pattern.tokens {
                match token {
                    PathToken::Static(literal) => built_segments.push(literal.clone()),
                    PathToken::Param(param) => {
                        let value = effective
                            .get(param)
                            .and_then(ParamValue::to_url_value)
                            .ok_or_else(|| RouteError::MissingParam {
                                route: node.full_name.clone(),
                                param: param.clone(),
                            })?;
                        built_segments.push(encode_segment(&value, encoding));
                        used_in_path.insert(param.as_str());
                    }
                    PathToken::Splat(param) => {
                        if param.is_empty() {
                            continue;
                        }
                        used_in_path.insert(param.as_str());
                        if let Some(value) =
                            effective.get(param).and_then(ParamValue::to_url_value)
                        {
                            built_segments.extend(
                                value
                                    .split('/')
                                    .filter(|s| !s.is_empty())
                                    .map(|s| encode_segment(s, encoding)),
                            );
                        }
                    }
                }
            }
        }

        let mut path = format!("{}/{}", self.root_path, built_segments.join("/"));
        if path.len() > 1 && path.ends_with('/') {
            path.pop();
        }
        match self.options.trailing_slash {
            TrailingSlash::Never => {}
            TrailingSlash::Always => {
                if path.len() > 1 {
                    path.push('/');
                }
            }
            TrailingSlash::Default => {
                if node.pattern.trailing_slash && path.len() > 1 {
                    path.push('/');
                }
            }
        }

        let declared: Vec<&str> = self
            .chain(idx)
            .into_iter()
            .flat_map(|n| self.nodes[n].pattern.query_keys.iter().map(String::as_str))
            .collect();
        let mut pairs: Vec<(&str, &ParamValue)> = declared
            .iter()
            .filter_map(|&k| effective.get(k).map(|v| (k, v)))
            .collect();
        if self.options.query_params_mode == QueryParamsMode::Loose {
            for (k, v) in effective.iter() {
                if !used_in_path.contains(k) && !declared.contains(&k) {
                    pairs.push((k, v));
                }
            }
        }
        let query = serialize_query(pairs, encoding);
        if !query.is_empty() {
            path.push('?');
            path.push_str(&query);
        }
        Ok(path)
    }

    fn chain(&self, idx: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut cursor = Some(idx);
        while let Some(i) = cursor {
            if i == 0 {
                break;
            }
            chain.push(i);
            cursor = self.nodes[i].parent;
        }
        chain.reverse();
        chain
    }

    fn fold_key(&self, segment: &str) -> String {
        if self.options.case_sensitive {
            segment.to_owned()
        } else {
            segment.to_ascii_lowercase()
        }
    }

    fn strip_root<'a>(&self, path: &'a str) -> &'a str {
        if self.root_path.is_empty() {
            return path;
        }
        match path.strip_prefix(&self.root_path) {
            Some("") => "/",
            Some(rest) if rest.starts_with('/') || rest.starts_with('?') => rest,
            _ => path,
        }
    }
}

impl std::fmt::Debug for RouteTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTree")
            .field("routes", &self.len())
            .field("root_path", &self.root_path)
            .finish()
    }
}

fn layer_params(outer: &Params, inner: Params) -> Params {
    inner.merged_over(outer)
}

fn find_config_mut<'a>(
    configs: &'a mut [RouteConfig],
    name: &str,
) -> Option<&'a mut RouteConfig> {
    let mut parts = name.split('.');
    let first = parts.next()?;
    let mut current = configs.iter_mut().find(|c| c.name == first)?;
    for part in parts {
        current = current.children.iter_mut().find(|c| c.name == part)?;
    }
    Some(current)
}

fn remove_config(configs: &mut Vec<RouteConfig>, name: &str) -> bool {
    match name.split_once('.') {
        None => {
            let before = configs.len();
            configs.retain(|c| c.name != name);
            configs.len() != before
        }
        Some((head, rest)) => configs
            .iter_mut()
            .find(|c| c.name == head)
            .is_some_and(|c| remove_config(&mut c.children, rest)),
    }
}

fn compile(configs: &[RouteConfig], options: &RouterOptions) -> Result<Compiled, RouteError> {
    let root = RouteNode {
        full_name: String::new(),
        pattern: PathPattern::default(),
        parent: None,
        children: Vec::new(),
        static_children: HashMap::new(),
        effective_defaults: Params::new(),
        config: RouteConfig::new("", "/"),
    };
    let mut compiled = Compiled {
        nodes: vec![root],
        by_name: HashMap::new(),
    };
    for config in configs {
        add_node(&mut compiled, config, 0, options)?;
    }
    validate_forwards(&compiled)?;
    Ok(compiled)
}

fn add_node(
    compiled: &mut Compiled,
    config: &RouteConfig,
    parent: usize,
    options: &RouterOptions,
) -> Result<(), RouteError> {
    validate_segment_name(&config.name, options.limits.max_route_name_length).map_err(|reason| {
        RouteError::InvalidName {
            name: config.name.clone(),
            reason,
        }
    })?;
    let pattern = PathPattern::parse(&config.path)?;

    let full_name = if parent == 0 {
        config.name.clone()
    } else {
        format!("{}.{}", compiled.nodes[parent].full_name, config.name)
    };
    if compiled.by_name.contains_key(&full_name) {
        return Err(RouteError::DuplicateName { name: full_name });
    }

    let effective_defaults = config
        .default_params
        .merged_over(&compiled.nodes[parent].effective_defaults);

    let idx = compiled.nodes.len();
    compiled.nodes.push(RouteNode {
        full_name: full_name.clone(),
        pattern,
        parent: Some(parent),
        children: Vec::new(),
        static_children: HashMap::new(),
        effective_defaults,
        config: config.clone(),
    });
    compiled.by_name.insert(full_name, idx);
    compiled.nodes[parent].children.push(idx);
    if let Some(first) = compiled.nodes[idx].pattern.first_static() {
        let key = if options.case_sensitive {
            first.to_owned()
        } else {
            first.to_ascii_lowercase()
        };
        compiled.nodes[parent]
            .static_children
            .entry(key)
            .or_default()
            .push(idx);
    }

    for child in &config.children {
        add_node(compiled, child, idx, options)?;
    }
    Ok(())
}

fn validate_forwards(compiled: &Compiled) -> Result<(), RouteError> {
    for node in compiled.nodes.iter().skip(1) {
        let Some(ForwardTo::Name(target)) = &node.config.forward_to else {
            continue;
        };

        // Follow the static chain, bounded by the node count.
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(&node.full_name);
        let mut cursor = target.as_str();
        loop {
            let &next =
                compiled
                    .by_name
                    .get(cursor)
                    .ok_or_else(|| RouteError::UnknownForwardTarget {
                        from: node.full_name.clone(),
                        to: cursor.to_owned(),
                    })?;
            if !visited.insert(cursor) {
                return Err(RouteError::ForwardCycle {
                    start: node.full_name.clone(),
                });
            }
            match &compiled.nodes[next].config.forward_to {
                Some(ForwardTo::Name(next_target)) => cursor = next_target,
                _ => break,
            }
        }

        // Params the source can capture must be understood by the final
        // destination.
        let destination = compiled.by_name[cursor];
        let declared: HashSet<String> = chain_params(compiled, destination);
        let own = chain_params(compiled, compiled.by_name[&node.full_name]);
        for param in own {
            if !declared.contains(&param) {
                return Err(RouteError::ForwardParams {
                    route: node.full_name.clone(),
                    param,
                });
            }
        }
    }
    Ok(())
}

fn chain_params(compiled: &Compiled, idx: usize) -> HashSet<String> {
    let mut out = HashSet::new();
    let mut cursor = Some(idx);
    while let Some(i) = cursor {
        if i == 0 {
            break;
        }
        let pattern = &compiled.nodes[i].pattern;
        out.extend(pattern.all_param_names().into_iter().map(str::to_owned));
        cursor = compiled.nodes[i].parent;
    }
    out
}
