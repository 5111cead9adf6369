// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared property names and an explicit flyweight table.
//!
//! Property names are compared and hashed constantly (every signal lookup,
//! every path resolution), so [`Name`] is a reference-counted string that is
//! cheap to clone. Two names are equal when their contents are equal; names
//! that share an allocation compare by pointer first.
//!
//! There is no process-wide interning table. Callers that want several
//! components to share one allocation per distinct name hold a [`NameTable`]
//! and route name creation through it.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::Rc;

use hashbrown::HashSet;

/// A cheaply clonable property name.
///
/// # Example
///
/// ```
/// use trellis_data::Name;
///
/// let a = Name::new("diffuseColor");
/// let b = a.clone();
/// assert_eq!(a, b);
/// assert_eq!(a, Name::from("diffuseColor"));
/// assert_eq!(a.as_str(), "diffuseColor");
/// ```
#[derive(Clone)]
pub struct Name(Rc<str>);

impl Name {
    /// Creates a new name with its own allocation.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(Rc::from(name))
    }

    /// Returns the name as a string slice.
    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if both names share the same allocation.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Name {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0 == *other.0
    }
}

impl Eq for Name {}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl Hash for Name {
    // Must agree with `str`'s hash for `Borrow<str>` lookups.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for Name {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Name {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Name {
    fn from(name: String) -> Self {
        Self(Rc::from(name))
    }
}

impl From<&String> for Name {
    fn from(name: &String) -> Self {
        Self::new(name)
    }
}

impl From<&Self> for Name {
    fn from(name: &Self) -> Self {
        name.clone()
    }
}

/// Flyweight table handing out shared [`Name`] allocations.
///
/// Interning the same string twice returns names that share one allocation,
/// so equality checks between them short-circuit on the pointer.
///
/// # Example
///
/// ```
/// use trellis_data::NameTable;
///
/// let mut names = NameTable::new();
/// let a = names.intern("modelToWorldMatrix");
/// let b = names.intern("modelToWorldMatrix");
/// assert!(a.ptr_eq(&b));
/// assert_eq!(names.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    names: HashSet<Name>,
}

impl NameTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of distinct names in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if the table holds no names.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns the shared name for `name`, creating it on first use.
    pub fn intern(&mut self, name: &str) -> Name {
        if let Some(existing) = self.names.get(name) {
            return existing.clone();
        }
        let created = Name::new(name);
        self.names.insert(created.clone());
        created
    }

    /// Returns the shared name for `name` if it was interned before.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Name> {
        self.names.get(name)
    }

    /// Drops the names nobody outside the table holds any more, returning how
    /// many were dropped.
    pub fn prune(&mut self) -> usize {
        let before = self.names.len();
        self.names.retain(|name| Rc::strong_count(&name.0) > 1);
        before - self.names.len()
    }

    /// Drops every entry.
    ///
    /// Names handed out earlier stay valid; they just stop being shared with
    /// names interned afterwards.
    pub fn clear(&mut self) {
        self.names.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_by_content() {
        let a = Name::new("x");
        let b = Name::new("x");
        assert!(!a.ptr_eq(&b));
        assert_eq!(a, b);
        assert_ne!(a, Name::new("y"));
        assert_eq!(a, "x");
    }

    #[test]
    fn borrow_lookup_agrees_with_str() {
        let mut set = HashSet::new();
        set.insert(Name::new("lights.length"));
        assert!(set.contains("lights.length"));
        assert!(!set.contains("lights"));
    }

    #[test]
    fn table_shares_allocations() {
        let mut table = NameTable::new();
        let a = table.intern("diffuse");
        let b = table.intern("diffuse");
        let c = table.intern("specular");
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(table.len(), 2);

        table.clear();
        assert!(table.is_empty());
        let d = table.intern("diffuse");
        assert_eq!(a, d);
        assert!(!a.ptr_eq(&d));
    }

    #[test]
    fn ordering_is_lexicographic() {
        let mut names = vec![Name::new("b"), Name::new("a"), Name::new("c")];
        names.sort();
        assert_eq!(names, vec![Name::new("a"), Name::new("b"), Name::new("c")]);
    }

    #[test]
    fn prune_keeps_names_in_use() {
        let mut table = NameTable::new();
        let kept = table.intern("diffuse");
        drop(table.intern("specular"));
        assert_eq!(table.len(), 2);
        assert_eq!(table.prune(), 1);
        assert_eq!(table.len(), 1);
        assert!(table.get("diffuse").is_some_and(|name| name.ptr_eq(&kept)));
        drop(kept);
        assert_eq!(table.prune(), 1);
        assert!(table.is_empty());
    }
}
