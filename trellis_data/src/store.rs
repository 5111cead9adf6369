// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Observable property stores.
//!
//! A [`PropertyStore`] is a named bag of typed values. Every mutation is
//! reported synchronously through three signals:
//!
//! - `property_added` when a name appears,
//! - `property_changed` when a name appears or its value changes,
//! - `property_removed` when a name disappears.
//!
//! Assigning a previously absent name fires `added` strictly before `changed`.
//! Assigning a value equal to the current one fires nothing.

use std::any::type_name;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use hashbrown::HashMap;
use uuid::Uuid;

use crate::error::DataError;
use crate::name::Name;
use crate::signal::Signal;
use crate::value::{PropertyValue, Value, ValueCell};

/// Payload of property signals.
///
/// On a [`PropertyStore`] `name` is the property name. On an
/// [`AggregateStore`](crate::AggregateStore) it is the property path the
/// aggregate exposes (for example `lights[2].diffuse`).
#[derive(Clone, Debug)]
pub struct PropertyEvent {
    /// The store that owns the property.
    pub store: PropertyStore,
    /// Property name or path.
    pub name: Name,
}

struct StoreInner {
    uuid: Uuid,
    values: RefCell<HashMap<Name, ValueCell>>,
    property_added: Signal<PropertyEvent>,
    property_changed: Signal<PropertyEvent>,
    property_removed: Signal<PropertyEvent>,
}

/// A shared, observable bag of named values.
///
/// `PropertyStore` is a handle: cloning it shares the underlying store, and
/// equality and hashing follow identity. Use [`deep_clone`](Self::deep_clone)
/// for an independent copy.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use trellis_data::PropertyStore;
///
/// let store = PropertyStore::new();
/// let log = Rc::new(RefCell::new(Vec::new()));
///
/// let _added = {
///     let log = log.clone();
///     store.property_added().connect(move |e| log.borrow_mut().push(format!("added {}", e.name)))
/// };
/// let _changed = {
///     let log = log.clone();
///     store.property_changed().connect(move |e| log.borrow_mut().push(format!("changed {}", e.name)))
/// };
///
/// store.set("x", 1_i32).unwrap();
/// assert_eq!(store.get::<i32>("x").unwrap(), 1);
/// assert_eq!(*log.borrow(), ["added x", "changed x"]);
/// ```
#[derive(Clone)]
pub struct PropertyStore {
    inner: Rc<StoreInner>,
}

enum Assignment {
    Added,
    Changed,
    Unchanged,
}

impl PropertyStore {
    /// Creates an empty store with a fresh identity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(StoreInner {
                uuid: Uuid::new_v4(),
                values: RefCell::new(HashMap::new()),
                property_added: Signal::new(),
                property_changed: Signal::new(),
                property_removed: Signal::new(),
            }),
        }
    }

    /// Returns the identity of this store, stable for its lifetime.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.inner.uuid
    }

    /// Returns `true` if both handles refer to the same store.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Signal fired when a property is added.
    #[must_use]
    pub fn property_added(&self) -> &Signal<PropertyEvent> {
        &self.inner.property_added
    }

    /// Signal fired when a property is added or its value changes.
    #[must_use]
    pub fn property_changed(&self) -> &Signal<PropertyEvent> {
        &self.inner.property_changed
    }

    /// Signal fired when a property is removed.
    #[must_use]
    pub fn property_removed(&self) -> &Signal<PropertyEvent> {
        &self.inner.property_removed
    }

    /// Returns the number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.values.borrow().len()
    }

    /// Returns `true` if the store holds no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.values.borrow().is_empty()
    }

    /// Returns `true` if `name` is present.
    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.inner.values.borrow().contains_key(name)
    }

    /// Returns the property names in ascending order.
    #[must_use]
    pub fn names(&self) -> Vec<Name> {
        let mut names: Vec<Name> = self.inner.values.borrow().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Inserts or updates a property.
    ///
    /// A new property fires `added` then `changed`. Overwriting with a
    /// different value of the same type fires `changed`. Overwriting with an
    /// equal value fires nothing.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::TypeMismatch`] if the property exists with a
    /// different type; the stored value is left untouched.
    pub fn set<T: PropertyValue>(&self, name: impl Into<Name>, value: T) -> Result<(), DataError> {
        self.set_value(name, Value::new(value))
    }

    /// Inserts or updates a property from an erased value.
    ///
    /// Same notification and error behavior as [`set`](Self::set).
    ///
    /// # Errors
    ///
    /// Returns [`DataError::TypeMismatch`] if the property exists with a
    /// different type.
    pub fn set_value(&self, name: impl Into<Name>, value: Value) -> Result<(), DataError> {
        let name = name.into();
        let assignment = {
            let mut values = self.inner.values.borrow_mut();
            match values.get(&name) {
                Some(cell) => {
                    let (stored_id, stored_name) = cell.type_info();
                    if stored_id != value.type_id() {
                        return Err(DataError::TypeMismatch {
                            name,
                            stored: stored_name,
                            requested: value.type_name(),
                        });
                    }
                    if cell.replace(value) {
                        Assignment::Changed
                    } else {
                        Assignment::Unchanged
                    }
                }
                None => {
                    values.insert(name.clone(), ValueCell::new(value));
                    Assignment::Added
                }
            }
        };

        match assignment {
            Assignment::Added => {
                let event = self.event(name);
                self.inner.property_added.emit(&event);
                self.inner.property_changed.emit(&event);
            }
            Assignment::Changed => {
                self.inner.property_changed.emit(&self.event(name));
            }
            Assignment::Unchanged => {}
        }
        Ok(())
    }

    /// Returns a clone of a property value.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::PropertyNotFound`] if `name` is absent and
    /// [`DataError::TypeMismatch`] if it holds another type.
    pub fn get<T: PropertyValue>(&self, name: &str) -> Result<T, DataError> {
        self.with(name, T::clone)
    }

    /// Calls `f` with a reference to a property value.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn with<T: 'static, R>(&self, name: &str, f: impl FnOnce(&T) -> R) -> Result<R, DataError> {
        let cell = self.cell(name).ok_or_else(|| DataError::PropertyNotFound {
            name: Name::new(name),
        })?;
        let stored = cell.type_name();
        cell.with(f).ok_or_else(|| DataError::TypeMismatch {
            name: Name::new(name),
            stored,
            requested: type_name::<T>(),
        })
    }

    /// Returns a clone of the erased value of a property.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<Value> {
        self.cell(name).map(|cell| cell.value())
    }

    /// Returns the shared cell of a property.
    ///
    /// The cell keeps observing assignments to `name` until the property is
    /// removed; after that it is detached and keeps its last value.
    #[must_use]
    pub fn cell(&self, name: &str) -> Option<ValueCell> {
        self.inner.values.borrow().get(name).cloned()
    }

    /// Removes a property, firing `removed` if it existed.
    ///
    /// Returns `true` if a property was removed.
    pub fn unset(&self, name: &str) -> bool {
        let removed = self.inner.values.borrow_mut().remove_entry(name);
        match removed {
            Some((name, _)) => {
                self.inner.property_removed.emit(&self.event(name));
                true
            }
            None => false,
        }
    }

    /// Creates an independent store with copies of every value.
    ///
    /// The copy has a new identity and no connected callbacks.
    #[must_use]
    pub fn deep_clone(&self) -> Self {
        let copy = Self::new();
        {
            let source = self.inner.values.borrow();
            let mut target = copy.inner.values.borrow_mut();
            for (name, cell) in source.iter() {
                target.insert(name.clone(), ValueCell::new(cell.value()));
            }
        }
        copy
    }

    /// Assigns every property of `other` into this store.
    ///
    /// # Errors
    ///
    /// Stops at the first [`DataError::TypeMismatch`].
    pub fn copy_from(&self, other: &Self) -> Result<(), DataError> {
        for name in other.names() {
            if let Some(value) = other.value(&name) {
                self.set_value(name, value)?;
            }
        }
        Ok(())
    }

    fn event(&self, name: Name) -> PropertyEvent {
        PropertyEvent {
            store: self.clone(),
            name,
        }
    }
}

impl Default for PropertyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for PropertyStore {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for PropertyStore {}

impl Hash for PropertyStore {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.inner).hash(state);
    }
}

impl fmt::Debug for PropertyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyStore")
            .field("uuid", &self.inner.uuid)
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Slot;
    use std::cell::RefCell;

    fn record(store: &PropertyStore) -> (Rc<RefCell<Vec<String>>>, [Slot; 3]) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let added = {
            let log = log.clone();
            store
                .property_added()
                .connect(move |e| log.borrow_mut().push(format!("added {}", e.name)))
        };
        let changed = {
            let log = log.clone();
            store
                .property_changed()
                .connect(move |e| log.borrow_mut().push(format!("changed {}", e.name)))
        };
        let removed = {
            let log = log.clone();
            store
                .property_removed()
                .connect(move |e| log.borrow_mut().push(format!("removed {}", e.name)))
        };
        (log, [added, changed, removed])
    }

    #[test]
    fn set_absent_fires_added_then_changed() {
        let store = PropertyStore::new();
        let (log, _slots) = record(&store);
        store.set("x", 1_i32).unwrap();
        assert_eq!(*log.borrow(), ["added x", "changed x"]);
        assert_eq!(store.get::<i32>("x").unwrap(), 1);
    }

    #[test]
    fn set_equal_value_is_silent() {
        let store = PropertyStore::new();
        store.set("x", 1_i32).unwrap();
        let (log, _slots) = record(&store);
        store.set("x", 1_i32).unwrap();
        assert!(log.borrow().is_empty());
        store.set("x", 2_i32).unwrap();
        assert_eq!(*log.borrow(), ["changed x"]);
    }

    #[test]
    fn set_with_other_type_fails_and_keeps_value() {
        let store = PropertyStore::new();
        store.set("x", 1_i32).unwrap();
        let err = store.set("x", 1.0_f32).unwrap_err();
        assert!(matches!(err, DataError::TypeMismatch { .. }));
        assert_eq!(store.get::<i32>("x").unwrap(), 1);
    }

    #[test]
    fn get_reports_missing_and_mismatch() {
        let store = PropertyStore::new();
        assert_eq!(
            store.get::<i32>("missing"),
            Err(DataError::PropertyNotFound {
                name: Name::new("missing")
            })
        );
        store.set("x", 1_u32).unwrap();
        assert!(matches!(
            store.get::<i32>("x"),
            Err(DataError::TypeMismatch { stored: "u32", .. })
        ));
    }

    #[test]
    fn unset_fires_removed_once() {
        let store = PropertyStore::new();
        store.set("x", 1_i32).unwrap();
        let (log, _slots) = record(&store);
        assert!(store.unset("x"));
        assert!(!store.unset("x"));
        assert_eq!(*log.borrow(), ["removed x"]);
        assert!(!store.has_property("x"));
    }

    #[test]
    fn names_are_unique_and_sorted() {
        let store = PropertyStore::new();
        store.set("b", 1_i32).unwrap();
        store.set("a", 1_i32).unwrap();
        store.set("b", 2_i32).unwrap();
        assert_eq!(store.names(), vec![Name::new("a"), Name::new("b")]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn cell_tracks_updates_until_unset() {
        let store = PropertyStore::new();
        store.set("x", 1_i32).unwrap();
        let cell = store.cell("x").unwrap();
        store.set("x", 5_i32).unwrap();
        assert_eq!(cell.get::<i32>(), Some(5));
        store.unset("x");
        store.set("x", 9_i32).unwrap();
        assert_eq!(cell.get::<i32>(), Some(5));
        assert!(!cell.ptr_eq(&store.cell("x").unwrap()));
    }

    #[test]
    fn deep_clone_is_independent() {
        let store = PropertyStore::new();
        store.set("x", 1_i32).unwrap();
        let copy = store.deep_clone();
        assert_ne!(copy, store);
        assert_ne!(copy.uuid(), store.uuid());
        copy.set("x", 2_i32).unwrap();
        assert_eq!(store.get::<i32>("x").unwrap(), 1);
    }

    #[test]
    fn handler_may_mutate_the_store_it_observes() {
        let store = PropertyStore::new();
        let _slot = store.property_changed().connect(|e| {
            if e.name == "x" {
                let doubled = e.store.get::<i32>("x").unwrap() * 2;
                e.store.set("y", doubled).unwrap();
            }
        });
        store.set("x", 21_i32).unwrap();
        assert_eq!(store.get::<i32>("y").unwrap(), 42);
    }

    #[test]
    fn copy_from_assigns_all() {
        let a = PropertyStore::new();
        a.set("x", 1_i32).unwrap();
        a.set("name", String::from("a")).unwrap();
        let b = PropertyStore::new();
        b.copy_from(&a).unwrap();
        assert_eq!(b.get::<String>("name").unwrap(), "a");
        assert_eq!(b.len(), 2);
    }
}
