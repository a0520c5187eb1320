//! Path patterns and URL component handling.
//!
//! A route path is a pattern of slash-separated tokens with an optional
//! query declaration:
//!
//! ```text
//! /users/view/:id          one literal, one literal, one param
//! /files/*rest             splat absorbing the remainder
//! /search?q&page           declared query keys `q` and `page`
//! ```
//!
//! Tokens are segment-granular: a single segment is either wholly
//! literal, a `:param`, or a `*splat`. Patterns mixing literal text and
//! placeholders inside one segment are rejected at parse time.

use crate::errors::RouteError;
use crate::options::UrlParamsEncoding;
use crate::params::{ParamValue, Params};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS, NON_ALPHANUMERIC};

/// Characters escaped inside a path segment under the default encoding.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Characters escaped inside a query component under the default
/// encoding.
const QUERY_COMPONENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'>')
    .add(b'=');

/// `encodeURIComponent` escaping: everything but alphanumerics and
/// `-_.!~*'()`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// One segment of a path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    /// A literal segment, matched verbatim.
    Static(String),
    /// A `:name` placeholder capturing exactly one segment.
    Param(String),
    /// A `*name` placeholder capturing the rest of the path. An empty
    /// name absorbs without capturing.
    Splat(String),
}

impl PathToken {
    /// The captured parameter name, if this token captures one.
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Self::Param(name) => Some(name),
            Self::Splat(name) if !name.is_empty() => Some(name),
            _ => None,
        }
    }
}

/// A parsed route path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathPattern {
    /// The segment tokens in order.
    pub tokens: Vec<PathToken>,
    /// Query keys declared after `?`.
    pub query_keys: Vec<String>,
    /// Whether the pattern itself was written with a trailing slash.
    pub trailing_slash: bool,
    raw: String,
}

impl PathPattern {
    /// Parses a pattern.
    ///
    /// Patterns must begin with `/` (or `?` for query-only routes).
    pub fn parse(path: &str) -> Result<Self, RouteError> {
        let invalid = |reason: &'static str| RouteError::InvalidPath {
            path: path.to_owned(),
            reason,
        };

        if path.is_empty() {
            return Err(invalid("path is empty"));
        }
        if !path.starts_with('/') && !path.starts_with('?') {
            return Err(invalid("path must start with '/' or '?'"));
        }

        let (path_part, query_part) = match path.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path, None),
        };

        let mut query_keys = Vec::new();
        if let Some(query) = query_part {
            for key in query.split('&').filter(|k| !k.is_empty()) {
                // A declaration may carry a default-looking `=`; only the
                // key matters here.
                let key = key.split('=').next().unwrap_or(key);
                query_keys.push(key.to_owned());
            }
        }

        let mut tokens = Vec::new();
        for segment in path_part.split('/').filter(|s| !s.is_empty()) {
            if tokens
                .last()
                .is_some_and(|t| matches!(t, PathToken::Splat(_)))
            {
                return Err(invalid("splat must be the last segment"));
            }
            if let Some(name) = segment.strip_prefix(':') {
                if name.is_empty() {
                    return Err(invalid("param segment has no name"));
                }
                if name.contains(':') || name.contains('*') {
                    return Err(invalid("segment mixes literal text and placeholders"));
                }
                tokens.push(PathToken::Param(name.to_owned()));
            } else if let Some(name) = segment.strip_prefix('*') {
                if name.contains(':') || name.contains('*') {
                    return Err(invalid("segment mixes literal text and placeholders"));
                }
                tokens.push(PathToken::Splat(name.to_owned()));
            } else {
                if segment.contains(':') || segment.contains('*') {
                    return Err(invalid("segment mixes literal text and placeholders"));
                }
                tokens.push(PathToken::Static(segment.to_owned()));
            }
        }

        let trailing_slash = path_part.len() > 1 && path_part.ends_with('/');

        Ok(Self {
            tokens,
            query_keys,
            trailing_slash,
            raw: path.to_owned(),
        })
    }

    /// The pattern as written.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Names captured from the path portion (params and named splats).
    pub fn path_param_names(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(PathToken::param_name)
    }

    /// Every name this pattern declares, path and query alike.
    pub fn all_param_names(&self) -> Vec<&str> {
        self.path_param_names()
            .chain(self.query_keys.iter().map(String::as_str))
            .collect()
    }

    /// Whether the pattern ends in a splat.
    pub fn has_splat(&self) -> bool {
        matches!(self.tokens.last(), Some(PathToken::Splat(_)))
    }

    /// The first token, used for static-child indexing.
    pub fn first_static(&self) -> Option<&str> {
        match self.tokens.first() {
            Some(PathToken::Static(s)) => Some(s),
            _ => None,
        }
    }
}

/// Escapes a value for use as a path segment.
pub fn encode_segment(value: &str, encoding: UrlParamsEncoding) -> String {
    match encoding {
        UrlParamsEncoding::Default => utf8_percent_encode(value, PATH_SEGMENT).to_string(),
        UrlParamsEncoding::UriComponent => utf8_percent_encode(value, URI_COMPONENT).to_string(),
        UrlParamsEncoding::None => value.to_owned(),
    }
}

/// Escapes a value for use as a query key or value.
pub fn encode_query_component(value: &str, encoding: UrlParamsEncoding) -> String {
    match encoding {
        UrlParamsEncoding::Default => utf8_percent_encode(value, QUERY_COMPONENT).to_string(),
        UrlParamsEncoding::UriComponent => utf8_percent_encode(value, URI_COMPONENT).to_string(),
        UrlParamsEncoding::None => value.to_owned(),
    }
}

/// Reverses percent-escaping on a URL component.
pub fn decode_component(value: &str, encoding: UrlParamsEncoding) -> String {
    match encoding {
        UrlParamsEncoding::None => value.to_owned(),
        _ => percent_decode_str(value).decode_utf8_lossy().into_owned(),
    }
}

/// Splits a URL into its path and query, dropping any fragment.
pub fn split_path_query(url: &str) -> (&str, Option<&str>) {
    let url = url.split('#').next().unwrap_or(url);
    match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    }
}

/// Splits a path into its non-empty segments.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Parses a query string into params.
///
/// Repeated keys accumulate into a list; a bare key without `=` parses
/// as boolean `true`. Values stay strings — the engine never guesses
/// types on behalf of the caller.
pub fn parse_query(query: &str, encoding: UrlParamsEncoding) -> Params {
    let mut params = Params::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = match pair.split_once('=') {
            Some((k, v)) => (k, Some(v)),
            None => (pair, None),
        };
        let key = decode_component(raw_key, encoding);
        let value = match raw_value {
            Some(v) => ParamValue::String(decode_component(v, encoding)),
            None => ParamValue::Bool(true),
        };

        match params.remove(&key) {
            Some(ParamValue::List(mut items)) => {
                items.push(value);
                params.insert(key, ParamValue::List(items));
            }
            Some(existing) => {
                params.insert(key, ParamValue::List(vec![existing, value]));
            }
            None => {
                params.insert(key, value);
            }
        }
    }
    params
}

/// Serializes `(key, value)` pairs into a query string.
///
/// Lists repeat their key; nested maps have no URL form and are skipped
/// with a debug log.
pub fn serialize_query<'a>(
    pairs: impl IntoIterator<Item = (&'a str, &'a ParamValue)>,
    encoding: UrlParamsEncoding,
) -> String {
    let mut out = String::new();
    for (key, value) in pairs {
        let encoded_key = encode_query_component(key, encoding);
        match value {
            ParamValue::List(items) => {
                for item in items {
                    match item.to_url_value() {
                        Some(v) => push_pair(&mut out, &encoded_key, Some(&v), encoding),
                        None => tracing::debug!(key, "skipping non-scalar query list item"),
                    }
                }
            }
            ParamValue::Map(_) => {
                tracing::debug!(key, "skipping nested map in query params");
            }
            ParamValue::Bool(true) => push_pair(&mut out, &encoded_key, None, encoding),
            other => {
                if let Some(v) = other.to_url_value() {
                    push_pair(&mut out, &encoded_key, Some(&v), encoding);
                }
            }
        }
    }
    out
}

fn push_pair(out: &mut String, key: &str, value: Option<&str>, encoding: UrlParamsEncoding) {
    if !out.is_empty() {
        out.push('&');
    }
    out.push_str(key);
    if let Some(value) = value {
        out.push('=');
        out.push_str(&encode_query_component(value, encoding));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    #[test]
    fn parses_literals_params_and_splats() {
        let pattern = PathPattern::parse("/users/view/:id").unwrap();
        assert_eq!(
            pattern.tokens,
            vec![
                PathToken::Static("users".into()),
                PathToken::Static("view".into()),
                PathToken::Param("id".into()),
            ]
        );
        assert!(!pattern.has_splat());

        let pattern = PathPattern::parse("/files/*rest").unwrap();
        assert!(pattern.has_splat());
        assert_eq!(pattern.path_param_names().collect::<Vec<_>>(), vec!["rest"]);
    }

    #[test]
    fn parses_query_declarations() {
        let pattern = PathPattern::parse("/search?q&page").unwrap();
        assert_eq!(pattern.query_keys, vec!["q", "page"]);
        assert_eq!(pattern.tokens.len(), 1);

        let pattern = PathPattern::parse("?embedded").unwrap();
        assert!(pattern.tokens.is_empty());
        assert_eq!(pattern.query_keys, vec!["embedded"]);
    }

    #[test]
    fn records_trailing_slash() {
        assert!(PathPattern::parse("/users/").unwrap().trailing_slash);
        assert!(!PathPattern::parse("/users").unwrap().trailing_slash);
        assert!(!PathPattern::parse("/").unwrap().trailing_slash);
    }

    #[test]
    fn rejects_malformed_patterns() {
        assert!(PathPattern::parse("").is_err());
        assert!(PathPattern::parse("users").is_err());
        assert!(PathPattern::parse("/users/:").is_err());
        assert!(PathPattern::parse("/a/*rest/b").is_err());
        assert!(PathPattern::parse("/user-:id").is_err());
    }

    #[test]
    fn splits_url() {
        assert_eq!(split_path_query("/a/b?x=1"), ("/a/b", Some("x=1")));
        assert_eq!(split_path_query("/a/b"), ("/a/b", None));
        assert_eq!(split_path_query("/a#frag"), ("/a", None));
    }

    #[test]
    fn query_round_trip() {
        let params = parse_query("q=rust&page=2", UrlParamsEncoding::Default);
        assert_eq!(params.get("q").unwrap().as_str(), Some("rust"));
        assert_eq!(params.get("page").unwrap().as_str(), Some("2"));

        let out = serialize_query(params.iter(), UrlParamsEncoding::Default);
        // Keys serialize in map order.
        assert_eq!(out, "page=2&q=rust");
    }

    #[test]
    fn repeated_query_keys_become_lists() {
        let params = parse_query("tag=a&tag=b", UrlParamsEncoding::Default);
        let tags = params.get("tag").unwrap().as_list().unwrap();
        assert_eq!(tags.len(), 2);

        let out = serialize_query(params.iter(), UrlParamsEncoding::Default);
        assert_eq!(out, "tag=a&tag=b");
    }

    #[test]
    fn bare_keys_parse_as_true_and_serialize_bare() {
        let params = parse_query("embedded", UrlParamsEncoding::Default);
        assert_eq!(params.get("embedded").unwrap().as_bool(), Some(true));

        let out = serialize_query(params.iter(), UrlParamsEncoding::Default);
        assert_eq!(out, "embedded");
    }

    #[test]
    fn encodes_reserved_characters() {
        assert_eq!(
            encode_segment("a b/c", UrlParamsEncoding::Default),
            "a%20b%2Fc"
        );
        assert_eq!(
            encode_segment("a b/c", UrlParamsEncoding::None),
            "a b/c"
        );
        // encodeURIComponent-style escaping keeps its unreserved set.
        assert_eq!(
            encode_query_component("a&b=c!", UrlParamsEncoding::UriComponent),
            "a%26b%3Dc!"
        );
    }

    #[test]
    fn decode_reverses_encoding() {
        let original = "hello world/älpha";
        let encoded = encode_segment(original, UrlParamsEncoding::UriComponent);
        assert_eq!(
            decode_component(&encoded, UrlParamsEncoding::UriComponent),
            original
        );
    }

    #[test]
    fn nested_maps_are_skipped_in_queries() {
        let mut nested = Params::new();
        nested.insert("inner", "x");
        let mut params = params!("ok" => "1");
        params.insert(
            "nested",
            ParamValue::Map(nested.iter().map(|(k, v)| (k.to_owned(), v.clone())).collect()),
        );

        let out = serialize_query(params.iter(), UrlParamsEncoding::Default);
        assert_eq!(out, "ok=1");
    }
}
