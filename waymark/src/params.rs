//! Route parameters.
//!
//! Parameters are plain recursive data: strings, booleans, finite
//! numbers, arrays, and nested maps. Nothing else — no closures, no
//! arbitrary user types — so that every published state can be compared
//! structurally, serialized across the history-adapter boundary, and
//! shared freely without interior mutability.
//!
//! The [`params!`] macro builds a [`Params`] map in place:
//!
//! ```rust
//! use waymark::params;
//!
//! let params = params!("id" => "123", "expanded" => true);
//! assert_eq!(params.get("id").unwrap().as_str(), Some("123"));
//! ```

use crate::errors::ParamsError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The deepest a param value tree may nest.
pub(crate) const MAX_PARAMS_DEPTH: usize = 32;

/// A single parameter value.
///
/// Floats are only ever finite: [`ParamValue::float`] rejects NaN and
/// infinities, and the validation predicate re-checks values that arrive
/// through deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A finite floating-point number.
    Float(f64),
    /// A string.
    String(String),
    /// An ordered list of values.
    List(Vec<ParamValue>),
    /// A nested map of values.
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// Creates a float value, rejecting NaN and infinities.
    pub fn float(value: f64) -> Result<Self, ParamsError> {
        if value.is_finite() {
            Ok(Self::Float(value))
        } else {
            Err(ParamsError::NonFinite { key: String::new() })
        }
    }

    /// Returns the string slice if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the boolean if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the list if this is a list value.
    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Whether this value is a scalar (not a list or map).
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Map(_))
    }

    /// The value rendered for use in a URL, if it has a scalar rendering.
    ///
    /// Lists are serialized key-by-key by the query writer and nested maps
    /// have no URL form, so both return `None` here.
    pub fn to_url_value(&self) -> Option<String> {
        match self {
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::List(_) | Self::Map(_) => None,
        }
    }

    fn check(&self, key: &str, depth: usize) -> Result<(), ParamsError> {
        if depth > MAX_PARAMS_DEPTH {
            return Err(ParamsError::TooDeep {
                limit: MAX_PARAMS_DEPTH,
            });
        }
        match self {
            Self::Float(f) if !f.is_finite() => Err(ParamsError::NonFinite {
                key: key.to_owned(),
            }),
            Self::List(items) => {
                for item in items {
                    item.check(key, depth + 1)?;
                }
                Ok(())
            }
            Self::Map(map) => {
                for (k, v) in map {
                    v.check(k, depth + 1)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<ParamValue>> for ParamValue {
    fn from(value: Vec<ParamValue>) -> Self {
        Self::List(value)
    }
}

impl TryFrom<f64> for ParamValue {
    type Error = ParamsError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::float(value)
    }
}

// Keys are kept sorted so that two maps built in different insertion
// orders compare and serialize identically.
/// An ordered map of parameter names to values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no parameters are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Looks up a parameter by name.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Sets a parameter, returning the previous value if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Option<ParamValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes a parameter.
    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.0.remove(key)
    }

    /// Iterates over `(name, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates over parameter names in key order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns a copy of `self` layered over `defaults`.
    ///
    /// Keys present in `self` win; keys only present in `defaults` are
    /// filled in.
    pub fn merged_over(&self, defaults: &Params) -> Params {
        let mut out = defaults.clone();
        for (k, v) in &self.0 {
            out.0.insert(k.clone(), v.clone());
        }
        out
    }

    /// Returns `true` if every parameter in `self` is present in `other`
    /// with an equal value.
    pub fn is_subset_of(&self, other: &Params) -> bool {
        self.0
            .iter()
            .all(|(k, v)| other.0.get(k).is_some_and(|o| o == v))
    }

    /// Compares two maps restricted to the given keys.
    pub fn equals_on_keys<'a>(
        &self,
        other: &Params,
        keys: impl IntoIterator<Item = &'a str>,
    ) -> bool {
        keys.into_iter().all(|k| self.0.get(k) == other.0.get(k))
    }

    /// Validates the whole map against the params contract.
    ///
    /// A flat map of scalars is the overwhelmingly common case, so it is
    /// checked without recursion first; only maps containing containers
    /// pay for the full walk with its depth bound.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let mut flat = true;
        for (key, value) in &self.0 {
            match value {
                ParamValue::Float(f) if !f.is_finite() => {
                    return Err(ParamsError::NonFinite { key: key.clone() });
                }
                ParamValue::List(_) | ParamValue::Map(_) => flat = false,
                _ => {}
            }
        }
        if flat {
            return Ok(());
        }

        for (key, value) in &self.0 {
            value.check(key, 0)?;
        }
        Ok(())
    }
}

impl FromIterator<(String, ParamValue)> for Params {
    fn from_iter<T: IntoIterator<Item = (String, ParamValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = (&'a String, &'a ParamValue);
    type IntoIter = std::collections::btree_map::Iter<'a, String, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Builds a [`Params`] map from `key => value` pairs.
///
/// Values take any type with a `ParamValue` conversion.
#[macro_export]
macro_rules! params {
    () => {
        $crate::Params::new()
    };
    ($($key:expr => $val:expr),+ $(,)?) => {{
        let mut map = $crate::Params::new();
        $(map.insert($key, $crate::ParamValue::from($val));)+
        map
    }};
}
