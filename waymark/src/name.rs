//! Route names and segment arithmetic.
//!
//! A route name is a dot-joined chain of ancestor names:
//! `users.profile.edit` names a node three levels deep. Every prefix of
//! that chain (`users`, `users.profile`, `users.profile.edit`) is a
//! *segment*, and transitions are described entirely in terms of which
//! segments leave and which enter.

use nano_lru::PairCache;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

/// Expands a route name into the full names of its segments, outermost
/// first.
///
/// `users.profile.edit` becomes `["users", "users.profile",
/// "users.profile.edit"]`. Names with up to four dots take a scan-by-find
/// path sized for the common case; deeper names fall back to the general
/// walk.
pub fn name_to_ids(name: &str) -> Vec<String> {
    if name.is_empty() {
        return Vec::new();
    }

    let dots = name.bytes().filter(|b| *b == b'.').count();
    if dots == 0 {
        return vec![name.to_owned()];
    }
    if dots <= 4 {
        // Common case: shallow trees. Locate each dot with find() from the
        // previous position instead of walking every byte by hand.
        let mut ids = Vec::with_capacity(dots + 1);
        let mut from = 0;
        while let Some(offset) = name[from..].find('.') {
            let dot = from + offset;
            ids.push(name[..dot].to_owned());
            from = dot + 1;
        }
        ids.push(name.to_owned());
        return ids;
    }

    let mut ids = Vec::with_capacity(dots + 1);
    for (dot, _) in name.match_indices('.') {
        ids.push(name[..dot].to_owned());
    }
    ids.push(name.to_owned());
    ids
}

/// Returns `true` if `name` equals `ancestor` or sits below it in the
/// tree.
///
/// The comparison is segment-aware: `usersx` is not a descendant of
/// `users`.
pub fn is_name_descendant(name: &str, ancestor: &str) -> bool {
    if ancestor.is_empty() {
        return true;
    }
    match name.strip_prefix(ancestor) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}

/// The segment-level difference between two route states.
///
/// `to_deactivate` lists the segments unique to the source, innermost
/// first — the order in which they are torn down. `to_activate` lists the
/// segments unique to the destination, outermost first — the order in
/// which they are brought up. `intersection` is the innermost segment
/// common to both, or the empty string when the two share nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPath {
    /// The innermost shared segment, `""` when disjoint.
    pub intersection: String,
    /// Segments to tear down, innermost first.
    pub to_deactivate: Vec<String>,
    /// Segments to bring up, outermost first.
    pub to_activate: Vec<String>,
}

/// Computes the segment difference between `from` and `to`.
pub fn transition_path(to: &str, from: Option<&str>) -> TransitionPath {
    let to_ids = name_to_ids(to);
    let from_ids = from.map(name_to_ids).unwrap_or_default();

    let shared = from_ids
        .iter()
        .zip(to_ids.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let intersection = if shared > 0 {
        to_ids[shared - 1].clone()
    } else {
        String::new()
    };

    let mut to_deactivate: Vec<String> = from_ids[shared..].to_vec();
    to_deactivate.reverse();
    let to_activate = to_ids[shared..].to_vec();

    TransitionPath {
        intersection,
        to_deactivate,
        to_activate,
    }
}

/// A single-entry memo in front of [`transition_path`].
///
/// The should-update predicate asks for the same `(from, to)` pair once
/// per rendered node, so one slot is all the caching the hot path needs.
#[derive(Debug, Default)]
pub struct SegmentCache {
    slot: RefCell<PairCache<(String, Option<String>), TransitionPath>>,
}

impl SegmentCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the segment difference for `(to, from)`, computing it only
    /// when the cached pair differs.
    pub fn get(&self, to: &str, from: Option<&str>) -> TransitionPath {
        {
            let slot = self.slot.borrow();
            let hit = slot.get_by(|(cached_to, cached_from)| {
                cached_to == to && cached_from.as_deref() == from
            });
            if let Some(path) = hit {
                return path.clone();
            }
        }

        let path = transition_path(to, from);
        self.slot
            .borrow_mut()
            .put((to.to_owned(), from.map(str::to_owned)), path.clone());
        path
    }

    /// Drops the cached entry.
    pub fn clear(&self) {
        self.slot.borrow_mut().clear();
    }
}

/// Validates a single (undotted) route name against the naming rules.
pub(crate) fn validate_segment_name(name: &str, max_len: usize) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("name is empty");
    }
    if name.len() > max_len {
        return Err("name exceeds the configured length limit");
    }
    if name.contains('.') {
        return Err("dots are reserved for joining ancestor names");
    }
    if name.contains('/') || name.chars().any(char::is_whitespace) {
        return Err("name contains a reserved character");
    }
    Ok(())
}
