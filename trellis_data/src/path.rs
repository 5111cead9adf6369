// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property path grammar and `${var}` substitution.
//!
//! A path is either a plain property name (`"diffuseColor"`) or a collection
//! member reference `collection[index].property`, where `index` is a 0-based
//! position or the hyphenated UUID of a member store.

use std::borrow::Cow;
use std::fmt;

/// The index token of an indexed path.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PathIndex<'a> {
    /// A 0-based position in the collection.
    Position(usize),
    /// The hyphenated UUID of a member store.
    Uuid(&'a str),
}

/// A parsed property path.
///
/// # Example
///
/// ```
/// use trellis_data::{PathIndex, PropertyPath};
///
/// assert_eq!(PropertyPath::parse("color"), Some(PropertyPath::Plain("color")));
/// assert_eq!(
///     PropertyPath::parse("lights[2].diffuse"),
///     Some(PropertyPath::Indexed {
///         collection: "lights",
///         index: PathIndex::Position(2),
///         property: "diffuse",
///     })
/// );
/// assert_eq!(PropertyPath::parse("lights[x].diffuse"), None);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PropertyPath<'a> {
    /// A property looked up by name over the directly added stores.
    Plain(&'a str),
    /// A property of a collection member.
    Indexed {
        /// Collection name.
        collection: &'a str,
        /// Member position or identity.
        index: PathIndex<'a>,
        /// Property name on the member.
        property: &'a str,
    },
}

impl<'a> PropertyPath<'a> {
    /// Parses `path`, returning `None` if it contains a malformed index.
    ///
    /// Array-style names such as `bones[0]` that are not followed by
    /// `.property` are plain names.
    #[must_use]
    pub fn parse(path: &'a str) -> Option<Self> {
        let Some(open) = path.find('[') else {
            return Some(Self::Plain(path));
        };
        let rest = &path[open + 1..];
        let Some(close) = rest.find(']') else {
            return Some(Self::Plain(path));
        };
        let Some(property) = rest[close + 1..].strip_prefix('.') else {
            return Some(Self::Plain(path));
        };
        let collection = &path[..open];
        let token = &rest[..close];
        if collection.is_empty() || token.is_empty() || property.is_empty() {
            return None;
        }
        let index = if token.contains('-') {
            PathIndex::Uuid(token)
        } else {
            PathIndex::Position(token.parse().ok()?)
        };
        Some(Self::Indexed {
            collection,
            index,
            property,
        })
    }
}

impl fmt::Display for PropertyPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(name) => f.write_str(name),
            Self::Indexed {
                collection,
                index: PathIndex::Position(i),
                property,
            } => write!(f, "{collection}[{i}].{property}"),
            Self::Indexed {
                collection,
                index: PathIndex::Uuid(uuid),
                property,
            } => write!(f, "{collection}[{uuid}].{property}"),
        }
    }
}

/// Formats the positional path of `property` on member `index` of `collection`.
#[must_use]
pub fn indexed_path(collection: &str, index: usize, property: &str) -> String {
    format!("{collection}[{index}].{property}")
}

/// Formats the identity path of `property` on the member with `uuid`.
#[must_use]
pub fn uuid_path(collection: &str, uuid: &uuid::Uuid, property: &str) -> String {
    format!("{collection}[{}].{property}", uuid.hyphenated())
}

/// An ordered map of substitution variables for property name templates.
///
/// Order matters: [`format_property_name`] substitutes the first variable,
/// in insertion order, whose placeholder occurs in the template.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct EffectVariables {
    entries: Vec<(String, String)>,
}

impl EffectVariables {
    /// Creates an empty variable map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, keeping the original position of an existing key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Chaining form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no variable is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EffectVariables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut variables = Self::new();
        for (k, v) in iter {
            variables.insert(k, v);
        }
        variables
    }
}

/// Substitutes a single `${key}` placeholder in `template`.
///
/// Variables are scanned in insertion order; the first one whose placeholder
/// occurs in the template has its first occurrence replaced, and the result is
/// returned. Other placeholders are left as they are.
///
/// ```
/// use trellis_data::{EffectVariables, format_property_name};
///
/// let vars = EffectVariables::new()
///     .with("lightId", "2")
///     .with("geometryUuid", "abc");
/// assert_eq!(format_property_name(&vars, "lights[${lightId}].diffuse"), "lights[2].diffuse");
/// assert_eq!(format_property_name(&vars, "${lightId}${lightId}"), "2${lightId}");
/// assert_eq!(format_property_name(&vars, "color"), "color");
/// ```
#[must_use]
pub fn format_property_name<'a>(variables: &EffectVariables, template: &'a str) -> Cow<'a, str> {
    if !template.contains("${") {
        return Cow::Borrowed(template);
    }
    for (key, value) in variables.iter() {
        let placeholder = format!("${{{key}}}");
        if let Some(at) = template.find(&placeholder) {
            let mut formatted = String::with_capacity(template.len() + value.len());
            formatted.push_str(&template[..at]);
            formatted.push_str(value);
            formatted.push_str(&template[at + placeholder.len()..]);
            return Cow::Owned(formatted);
        }
    }
    Cow::Borrowed(template)
}
