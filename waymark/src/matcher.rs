//! Token-sequence matching against URL segments.
//!
//! The matcher tests one node's tokens against a window of URL segments
//! and reports how many it consumed; the route tree drives it node by
//! node while walking. Splats absorb every remaining segment.

use crate::params::{ParamValue, Params};
use crate::paths::PathToken;

/// A successful match of a token sequence against a segment window.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMatch {
    /// How many URL segments the tokens consumed.
    pub consumed: usize,
    /// Parameters captured along the way.
    pub params: Params,
}

/// Tests `tokens` against the front of `segments`.
///
/// Returns `None` when any literal fails to line up or there are fewer
/// segments than tokens. A trailing splat consumes the entire remainder
/// (possibly zero segments), capturing it joined with `/`.
pub fn match_tokens(
    tokens: &[PathToken],
    segments: &[&str],
    case_sensitive: bool,
) -> Option<SegmentMatch> {
    let mut params = Params::new();
    let mut consumed = 0;

    for token in tokens {
        match token {
            PathToken::Static(expected) => {
                let actual = segments.get(consumed)?;
                let hit = if case_sensitive {
                    *actual == expected.as_str()
                } else {
                    actual.eq_ignore_ascii_case(expected)
                };
                if !hit {
                    return None;
                }
                consumed += 1;
            }
            PathToken::Param(name) => {
                let actual = segments.get(consumed)?;
                params.insert(name.clone(), ParamValue::String((*actual).to_owned()));
                consumed += 1;
            }
            PathToken::Splat(name) => {
                let rest = segments[consumed..].join("/");
                if !name.is_empty() {
                    params.insert(name.clone(), ParamValue::String(rest));
                }
                consumed = segments.len();
            }
        }
    }

    Some(SegmentMatch { consumed, params })
}
