// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ordered, observable sequences of property stores.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::DataError;
use crate::name::Name;
use crate::signal::Signal;
use crate::store::PropertyStore;

/// Payload of collection membership signals.
#[derive(Clone, Debug)]
pub struct CollectionEvent {
    /// The collection that changed.
    pub collection: Collection,
    /// The store that was added or removed.
    pub item: PropertyStore,
    /// Position of the item: after insertion for `item_added`, before
    /// removal for `item_removed`.
    pub index: usize,
}

struct CollectionInner {
    name: Name,
    items: RefCell<Vec<PropertyStore>>,
    item_added: Signal<CollectionEvent>,
    item_removed: Signal<CollectionEvent>,
}

/// A named, ordered list of shared [`PropertyStore`]s.
///
/// Stores are shared, not owned: the same store may belong to several
/// collections. Insertion order is preserved and positional property paths
/// (`"lights[1].diffuse"`) depend on it. Every mutation fires `item_added` or
/// `item_removed` after the list has been updated.
///
/// # Example
///
/// ```
/// use trellis_data::{Collection, PropertyStore};
///
/// let lights = Collection::new("lights");
/// let a = PropertyStore::new();
/// let b = PropertyStore::new();
/// lights.push_back(a.clone());
/// lights.push_front(b.clone());
///
/// assert_eq!(lights.len(), 2);
/// assert_eq!(lights.index_of(&a), Some(1));
/// assert_eq!(lights.remove(&b).unwrap(), 0);
/// assert_eq!(lights.front(), Some(a));
/// ```
#[derive(Clone)]
pub struct Collection {
    inner: Rc<CollectionInner>,
}

impl Collection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            inner: Rc::new(CollectionInner {
                name: name.into(),
                items: RefCell::new(Vec::new()),
                item_added: Signal::new(),
                item_removed: Signal::new(),
            }),
        }
    }

    /// Returns the collection name.
    #[must_use]
    pub fn name(&self) -> &Name {
        &self.inner.name
    }

    /// Returns `true` if both handles refer to the same collection.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Signal fired after an item is inserted.
    #[must_use]
    pub fn item_added(&self) -> &Signal<CollectionEvent> {
        &self.inner.item_added
    }

    /// Signal fired after an item is removed.
    #[must_use]
    pub fn item_removed(&self) -> &Signal<CollectionEvent> {
        &self.inner.item_removed
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    /// Returns `true` if the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// Returns the item at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<PropertyStore> {
        self.inner.items.borrow().get(index).cloned()
    }

    /// Returns the first item.
    #[must_use]
    pub fn front(&self) -> Option<PropertyStore> {
        self.inner.items.borrow().first().cloned()
    }

    /// Returns the last item.
    #[must_use]
    pub fn back(&self) -> Option<PropertyStore> {
        self.inner.items.borrow().last().cloned()
    }

    /// Returns the position of `item`.
    #[must_use]
    pub fn index_of(&self, item: &PropertyStore) -> Option<usize> {
        self.inner.items.borrow().iter().position(|s| s == item)
    }

    /// Returns `true` if `item` is a member.
    #[must_use]
    pub fn contains(&self, item: &PropertyStore) -> bool {
        self.index_of(item).is_some()
    }

    /// Returns a snapshot of the items in order.
    #[must_use]
    pub fn items(&self) -> Vec<PropertyStore> {
        self.inner.items.borrow().clone()
    }

    /// Appends `item`.
    pub fn push_back(&self, item: PropertyStore) {
        let index = {
            let mut items = self.inner.items.borrow_mut();
            items.push(item.clone());
            items.len() - 1
        };
        self.added(item, index);
    }

    /// Prepends `item`.
    pub fn push_front(&self, item: PropertyStore) {
        self.inner.items.borrow_mut().insert(0, item.clone());
        self.added(item, 0);
    }

    /// Inserts `item` at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::IndexOutOfBounds`] if `index > len`.
    pub fn insert(&self, index: usize, item: PropertyStore) -> Result<(), DataError> {
        {
            let mut items = self.inner.items.borrow_mut();
            if index > items.len() {
                return Err(self.out_of_bounds(index, items.len()));
            }
            items.insert(index, item.clone());
        }
        self.added(item, index);
        Ok(())
    }

    /// Removes and returns the last item.
    pub fn pop_back(&self) -> Option<PropertyStore> {
        let (item, index) = {
            let mut items = self.inner.items.borrow_mut();
            let item = items.pop()?;
            (item, items.len())
        };
        self.removed(item.clone(), index);
        Some(item)
    }

    /// Removes and returns the first item.
    pub fn pop_front(&self) -> Option<PropertyStore> {
        let item = {
            let mut items = self.inner.items.borrow_mut();
            if items.is_empty() {
                return None;
            }
            items.remove(0)
        };
        self.removed(item.clone(), 0);
        Some(item)
    }

    /// Removes and returns the item at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::IndexOutOfBounds`] if `index >= len`.
    pub fn erase(&self, index: usize) -> Result<PropertyStore, DataError> {
        let item = {
            let mut items = self.inner.items.borrow_mut();
            if index >= items.len() {
                return Err(self.out_of_bounds(index, items.len()));
            }
            items.remove(index)
        };
        self.removed(item.clone(), index);
        Ok(item)
    }

    /// Removes the first occurrence of `item`, returning its former position.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::ItemNotFound`] if `item` is not a member.
    pub fn remove(&self, item: &PropertyStore) -> Result<usize, DataError> {
        let index = self
            .index_of(item)
            .ok_or_else(|| DataError::ItemNotFound {
                collection: self.inner.name.clone(),
            })?;
        self.erase(index)?;
        Ok(index)
    }

    /// Removes every item, last to first.
    pub fn clear(&self) {
        while self.pop_back().is_some() {}
    }

    /// Creates a collection with the same name holding deep copies of every item.
    #[must_use]
    pub fn deep_clone(&self) -> Self {
        let copy = Self::new(self.inner.name.clone());
        copy.inner
            .items
            .borrow_mut()
            .extend(self.items().iter().map(PropertyStore::deep_clone));
        copy
    }

    /// Every position `item` occupies.
    pub(crate) fn positions(&self, item: &PropertyStore) -> SmallVec<[usize; 2]> {
        self.inner
            .items
            .borrow()
            .iter()
            .enumerate()
            .filter_map(|(i, s)| (s == item).then_some(i))
            .collect()
    }

    fn added(&self, item: PropertyStore, index: usize) {
        self.inner.item_added.emit(&CollectionEvent {
            collection: self.clone(),
            item,
            index,
        });
    }

    fn removed(&self, item: PropertyStore, index: usize) {
        self.inner.item_removed.emit(&CollectionEvent {
            collection: self.clone(),
            item,
            index,
        });
    }

    fn out_of_bounds(&self, index: usize, len: usize) -> DataError {
        DataError::IndexOutOfBounds {
            collection: self.inner.name.clone(),
            index,
            len,
        }
    }
}

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Collection {}

impl Hash for Collection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.inner).hash(state);
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.inner.name)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn record(collection: &Collection) -> (Rc<RefCell<Vec<(char, usize)>>>, Vec<crate::Slot>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let added = {
            let log = log.clone();
            collection
                .item_added()
                .connect(move |e| log.borrow_mut().push(('+', e.index)))
        };
        let removed = {
            let log = log.clone();
            collection
                .item_removed()
                .connect(move |e| log.borrow_mut().push(('-', e.index)))
        };
        (log, vec![added, removed])
    }

    #[test]
    fn mutations_fire_with_positions() {
        let c = Collection::new("items");
        let (log, _slots) = record(&c);
        let a = PropertyStore::new();
        let b = PropertyStore::new();
        let d = PropertyStore::new();
        c.push_back(a.clone());
        c.push_back(b.clone());
        c.insert(1, d.clone()).unwrap();
        assert_eq!(c.items(), vec![a.clone(), d.clone(), b.clone()]);
        c.pop_front();
        c.pop_back();
        assert_eq!(c.items(), vec![d]);
        assert_eq!(
            *log.borrow(),
            vec![('+', 0), ('+', 1), ('+', 1), ('-', 0), ('-', 1)]
        );
    }

    #[test]
    fn signals_fire_after_mutation() {
        let c = Collection::new("items");
        let seen = Rc::new(RefCell::new(None));
        let _slot = {
            let seen = seen.clone();
            c.item_added()
                .connect(move |e| *seen.borrow_mut() = Some(e.collection.len()))
        };
        c.push_back(PropertyStore::new());
        assert_eq!(*seen.borrow(), Some(1));
    }

    #[test]
    fn remove_missing_item_fails() {
        let c = Collection::new("items");
        assert!(matches!(
            c.remove(&PropertyStore::new()),
            Err(DataError::ItemNotFound { .. })
        ));
        assert!(matches!(
            c.insert(3, PropertyStore::new()),
            Err(DataError::IndexOutOfBounds { index: 3, len: 0, .. })
        ));
        assert!(c.erase(0).is_err());
        assert!(c.pop_back().is_none());
        assert!(c.pop_front().is_none());
    }

    #[test]
    fn store_may_belong_to_several_collections() {
        let a = Collection::new("a");
        let b = Collection::new("b");
        let s = PropertyStore::new();
        a.push_back(s.clone());
        b.push_back(s.clone());
        a.clear();
        assert!(a.is_empty());
        assert!(b.contains(&s));
    }

    #[test]
    fn deep_clone_copies_items() {
        let c = Collection::new("items");
        let s = PropertyStore::new();
        s.set("x", 1_i32).unwrap();
        c.push_back(s.clone());
        let copy = c.deep_clone();
        assert_eq!(copy.name(), c.name());
        assert_ne!(copy.get(0).unwrap(), s);
        assert_eq!(copy.get(0).unwrap().get::<i32>("x").unwrap(), 1);
    }
}
