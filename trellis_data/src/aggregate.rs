// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Path-addressable views over several stores and collections.
//!
//! An [`AggregateStore`] re-exposes the properties of its direct providers
//! under their plain names and the properties of collection members under
//! `collection[index].property`. Each registered collection also contributes
//! a synthetic `collection.length` property (a `u32`).
//!
//! ## Event fan-out
//!
//! Every property event of a provider or member is forwarded to the
//! aggregate's catch-all signals under each path the property is reachable
//! by, and to the per-path signals returned by
//! [`property_changed_at`](AggregateStore::property_changed_at) and friends.
//! Identity paths (`collection[<uuid>].property`) only reach per-path signals.
//!
//! Membership changes are reported position by position. When a member is
//! inserted or removed, every position from the affected index to the end of
//! the collection is compared before and after the mutation: a property the
//! slot gains fires `added` then `changed`, a property it keeps fires
//! `changed` (even when the value is equal, because the store behind the path
//! is a different one), and a property it loses fires `removed`.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use hashbrown::HashMap;
use smallvec::SmallVec;
use uuid::Uuid;

use crate::collection::{Collection, CollectionEvent};
use crate::error::DataError;
use crate::name::Name;
use crate::path::{PathIndex, PropertyPath, indexed_path, uuid_path};
use crate::signal::{Signal, Slot};
use crate::store::{PropertyEvent, PropertyStore};
use crate::value::{PropertyValue, ValueCell};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Kind {
    Added = 0,
    Changed = 1,
    Removed = 2,
}

const ADDED_CHANGED: [Kind; 2] = [Kind::Added, Kind::Changed];

struct CollectionEntry {
    collection: Collection,
    length: PropertyStore,
    _slots: [Slot; 2],
}

struct Membership {
    count: usize,
    _slots: [Slot; 3],
}

struct AggregateInner {
    providers: RefCell<Vec<PropertyStore>>,
    collections: RefCell<Vec<CollectionEntry>>,
    members: RefCell<HashMap<PropertyStore, Membership>>,
    signals: [Signal<PropertyEvent>; 3],
    per_path: [RefCell<HashMap<Name, Signal<PropertyEvent>>>; 3],
}

/// A composite, path-addressable view over stores and collections.
///
/// Providers and collections are shared, not owned: the same store may be
/// reachable through several aggregates. `AggregateStore` is a handle; clones
/// share the aggregate and equality follows identity.
///
/// # Example
///
/// ```
/// use trellis_data::{AggregateStore, PropertyStore};
///
/// let data = AggregateStore::new();
/// for diffuse in [1.0_f32, 2.0, 3.0] {
///     let light = PropertyStore::new();
///     light.set("diffuse", diffuse).unwrap();
///     data.add_provider_to(light, "lights");
/// }
///
/// assert_eq!(data.get::<u32>("lights.length").unwrap(), 3);
/// assert_eq!(data.get::<f32>("lights[1].diffuse").unwrap(), 2.0);
///
/// let first = data.collection("lights").unwrap().front().unwrap();
/// data.remove_provider_from(&first, "lights").unwrap();
/// assert_eq!(data.get::<f32>("lights[0].diffuse").unwrap(), 2.0);
/// assert_eq!(data.get::<u32>("lights.length").unwrap(), 2);
/// ```
#[derive(Clone)]
pub struct AggregateStore {
    inner: Rc<AggregateInner>,
}

/// A non-owning reference to an [`AggregateStore`].
#[derive(Clone)]
pub struct WeakAggregateStore {
    inner: Weak<AggregateInner>,
}

impl WeakAggregateStore {
    /// Returns the aggregate if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<AggregateStore> {
        self.inner.upgrade().map(|inner| AggregateStore { inner })
    }
}

impl fmt::Debug for WeakAggregateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakAggregateStore")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl AggregateStore {
    /// Creates an empty aggregate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(AggregateInner {
                providers: RefCell::new(Vec::new()),
                collections: RefCell::new(Vec::new()),
                members: RefCell::new(HashMap::new()),
                signals: [Signal::new(), Signal::new(), Signal::new()],
                per_path: [RefCell::default(), RefCell::default(), RefCell::default()],
            }),
        }
    }

    /// Returns a weak reference to this aggregate.
    #[must_use]
    pub fn downgrade(&self) -> WeakAggregateStore {
        WeakAggregateStore {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Returns `true` if both handles refer to the same aggregate.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Signal fired when any reachable property path appears.
    #[must_use]
    pub fn property_added(&self) -> &Signal<PropertyEvent> {
        &self.inner.signals[Kind::Added as usize]
    }

    /// Signal fired when any reachable property path appears or changes.
    #[must_use]
    pub fn property_changed(&self) -> &Signal<PropertyEvent> {
        &self.inner.signals[Kind::Changed as usize]
    }

    /// Signal fired when any reachable property path disappears.
    #[must_use]
    pub fn property_removed(&self) -> &Signal<PropertyEvent> {
        &self.inner.signals[Kind::Removed as usize]
    }

    /// Returns the dedicated `added` signal of `path`, creating it on demand.
    ///
    /// The signal is dropped from the aggregate the next time it would fire
    /// with no callback connected, so connect to it right away.
    #[must_use]
    pub fn property_added_at(&self, path: &str) -> Signal<PropertyEvent> {
        self.per_path_signal(Kind::Added, path)
    }

    /// Returns the dedicated `changed` signal of `path`, creating it on demand.
    ///
    /// See [`property_added_at`](Self::property_added_at) for its lifetime.
    #[must_use]
    pub fn property_changed_at(&self, path: &str) -> Signal<PropertyEvent> {
        self.per_path_signal(Kind::Changed, path)
    }

    /// Returns the dedicated `removed` signal of `path`, creating it on demand.
    ///
    /// See [`property_added_at`](Self::property_added_at) for its lifetime.
    #[must_use]
    pub fn property_removed_at(&self, path: &str) -> Signal<PropertyEvent> {
        self.per_path_signal(Kind::Removed, path)
    }

    /// Returns the number of live per-path signals.
    #[must_use]
    pub fn num_path_signals(&self) -> usize {
        self.inner.per_path.iter().map(|m| m.borrow().len()).sum()
    }

    /// Adds a direct provider, announcing each of its properties.
    ///
    /// Adding a store that is already a direct provider does nothing.
    pub fn add_provider(&self, store: PropertyStore) {
        {
            let mut providers = self.inner.providers.borrow_mut();
            if providers.contains(&store) {
                return;
            }
            providers.push(store.clone());
        }
        log::trace!("aggregate: provider {} added", store.uuid());
        self.attach(&store);
        for name in store.names() {
            self.fire_all(&ADDED_CHANGED, &store, &name, true);
        }
    }

    /// Appends `store` to the collection called `collection`, registering a new
    /// collection if none has that name.
    pub fn add_provider_to(&self, store: PropertyStore, collection: &str) {
        let target = match self.collection(collection) {
            Some(existing) => existing,
            None => {
                let created = Collection::new(collection);
                self.add_collection(created.clone());
                created
            }
        };
        target.push_back(store);
    }

    /// Removes a direct provider, announcing the removal of its properties.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::ProviderNotFound`] if `store` is not a direct provider.
    pub fn remove_provider(&self, store: &PropertyStore) -> Result<(), DataError> {
        {
            let mut providers = self.inner.providers.borrow_mut();
            let index = providers
                .iter()
                .position(|p| p == store)
                .ok_or(DataError::ProviderNotFound { uuid: store.uuid() })?;
            providers.remove(index);
        }
        log::trace!("aggregate: provider {} removed", store.uuid());
        for name in store.names() {
            self.fire(Kind::Removed, store, &name, true);
        }
        self.detach(store);
        Ok(())
    }

    /// Removes `store` from the collection called `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::CollectionNotFound`] if no such collection is
    /// registered and [`DataError::ItemNotFound`] if `store` is not a member.
    pub fn remove_provider_from(
        &self,
        store: &PropertyStore,
        collection: &str,
    ) -> Result<(), DataError> {
        let target = self
            .collection(collection)
            .ok_or_else(|| DataError::CollectionNotFound {
                name: Name::new(collection),
            })?;
        target.remove(store).map(|_| ())
    }

    /// Registers a collection, importing its current members and creating its
    /// `<name>.length` property.
    ///
    /// A registered collection with the same name is replaced. Registering the
    /// same collection twice does nothing.
    pub fn add_collection(&self, collection: Collection) {
        let replaced = {
            let collections = self.inner.collections.borrow();
            if collections.iter().any(|e| e.collection == collection) {
                return;
            }
            collections
                .iter()
                .find(|e| e.collection.name() == collection.name())
                .map(|e| e.collection.clone())
        };
        if let Some(replaced) = replaced {
            log::debug!("aggregate: replacing collection `{}`", collection.name());
            // The entry exists, so this cannot fail.
            let _ = self.remove_collection(&replaced);
        }

        let weak = Rc::downgrade(&self.inner);
        let added = collection.item_added().connect({
            let weak = weak.clone();
            move |event: &CollectionEvent| {
                if let Some(inner) = weak.upgrade() {
                    Self { inner }.item_added(event);
                }
            }
        });
        let removed = collection.item_removed().connect(move |event: &CollectionEvent| {
            if let Some(inner) = weak.upgrade() {
                Self { inner }.item_removed(event);
            }
        });
        let length = PropertyStore::new();
        self.inner.collections.borrow_mut().push(CollectionEntry {
            collection: collection.clone(),
            length: length.clone(),
            _slots: [added, removed],
        });
        log::debug!(
            "aggregate: collection `{}` added with {} items",
            collection.name(),
            collection.len()
        );

        let name = collection.name().clone();
        for (index, item) in collection.items().iter().enumerate() {
            self.attach(item);
            self.announce_member(&ADDED_CHANGED, &name, index, item);
            self.fire_identity(&ADDED_CHANGED, &name, item);
        }
        self.attach(&length);
        self.update_length(&collection);
    }

    /// Unregisters a collection, announcing the removal of every member
    /// property and of its length.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::CollectionNotFound`] if `collection` is not registered.
    pub fn remove_collection(&self, collection: &Collection) -> Result<(), DataError> {
        let entry = {
            let mut collections = self.inner.collections.borrow_mut();
            let index = collections
                .iter()
                .position(|e| e.collection == *collection)
                .ok_or_else(|| DataError::CollectionNotFound {
                    name: collection.name().clone(),
                })?;
            collections.remove(index)
        };
        let name = collection.name().clone();
        for (index, item) in collection.items().iter().enumerate() {
            self.announce_member(&[Kind::Removed], &name, index, item);
            self.fire_identity(&[Kind::Removed], &name, item);
            self.detach(item);
        }
        for property in entry.length.names() {
            self.fire(Kind::Removed, &entry.length, &property, true);
        }
        self.detach(&entry.length);
        Ok(())
    }

    /// Returns the direct providers in insertion order.
    #[must_use]
    pub fn providers(&self) -> Vec<PropertyStore> {
        self.inner.providers.borrow().clone()
    }

    /// Returns the registered collections in registration order.
    #[must_use]
    pub fn collections(&self) -> Vec<Collection> {
        self.inner
            .collections
            .borrow()
            .iter()
            .map(|e| e.collection.clone())
            .collect()
    }

    /// Returns the collection called `name`.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<Collection> {
        self.inner
            .collections
            .borrow()
            .iter()
            .find(|e| e.collection.name() == name)
            .map(|e| e.collection.clone())
    }

    /// Returns `true` if `store` is a direct provider or a member of a
    /// registered collection.
    #[must_use]
    pub fn has_provider(&self, store: &PropertyStore) -> bool {
        self.inner.providers.borrow().contains(store)
            || self
                .inner
                .collections
                .borrow()
                .iter()
                .any(|e| e.collection.contains(store))
    }

    /// Resolves a property path to the store holding it and the property name
    /// within that store.
    ///
    /// Plain names resolve to the first direct provider defining them, then
    /// to collection lengths. Indexed paths resolve to the addressed member
    /// whether or not it defines the property. Returns `None` when nothing
    /// matches.
    #[must_use]
    pub fn provider_by_path(&self, path: &str) -> Option<(PropertyStore, Name)> {
        match PropertyPath::parse(path)? {
            PropertyPath::Plain(name) => {
                let found = self
                    .inner
                    .providers
                    .borrow()
                    .iter()
                    .find(|p| p.has_property(name))
                    .cloned();
                let found = found.or_else(|| {
                    self.inner
                        .collections
                        .borrow()
                        .iter()
                        .find(|e| e.length.has_property(name))
                        .map(|e| e.length.clone())
                });
                found.map(|store| (store, Name::new(name)))
            }
            PropertyPath::Indexed {
                collection,
                index,
                property,
            } => {
                let collection = self.collection(collection)?;
                let store = match index {
                    PathIndex::Position(i) => collection.get(i)?,
                    PathIndex::Uuid(token) => {
                        let uuid = Uuid::try_parse(token).ok()?;
                        collection.items().into_iter().find(|s| s.uuid() == uuid)?
                    }
                };
                Some((store, Name::new(property)))
            }
        }
    }

    /// Returns `true` if `path` resolves to a defined property.
    #[must_use]
    pub fn has_property(&self, path: &str) -> bool {
        self.provider_by_path(path)
            .is_some_and(|(store, name)| store.has_property(&name))
    }

    /// Returns a clone of the value at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::PathNotFound`] if the path does not resolve, and
    /// the store's error if the property is absent or has another type.
    pub fn get<T: PropertyValue>(&self, path: &str) -> Result<T, DataError> {
        let (store, name) = self.resolve(path)?;
        store.get(&name)
    }

    /// Assigns the value at `path` on the store it resolves to.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::PathNotFound`] if the path does not resolve,
    /// [`DataError::ReadOnly`] for collection lengths, and
    /// [`DataError::TypeMismatch`] as [`PropertyStore::set`] does.
    pub fn set<T: PropertyValue>(&self, path: &str, value: T) -> Result<(), DataError> {
        let (store, name) = self.resolve(path)?;
        if self.is_length_store(&store) {
            return Err(DataError::ReadOnly {
                path: path.to_owned(),
            });
        }
        store.set(name, value)
    }

    /// Removes the property at `path`, returning `true` if it existed.
    ///
    /// Collection lengths cannot be removed.
    pub fn unset(&self, path: &str) -> bool {
        self.provider_by_path(path)
            .filter(|(store, _)| !self.is_length_store(store))
            .is_some_and(|(store, name)| store.unset(&name))
    }

    /// Returns the shared cell of the property at `path`.
    #[must_use]
    pub fn cell(&self, path: &str) -> Option<ValueCell> {
        let (store, name) = self.provider_by_path(path)?;
        store.cell(&name)
    }

    /// Adds every provider and collection of `other`, sharing them.
    pub fn copy_from(&self, other: &Self) {
        for provider in other.providers() {
            self.add_provider(provider);
        }
        for collection in other.collections() {
            self.add_collection(collection);
        }
    }

    /// Creates an aggregate sharing the providers and collections of this one.
    #[must_use]
    pub fn shallow_copy(&self) -> Self {
        let copy = Self::new();
        copy.copy_from(self);
        copy
    }

    /// Creates an aggregate over deep copies of every provider and collection.
    #[must_use]
    pub fn deep_copy(&self) -> Self {
        let copy = Self::new();
        for provider in self.providers() {
            copy.add_provider(provider.deep_clone());
        }
        for collection in self.collections() {
            copy.add_collection(collection.deep_clone());
        }
        copy
    }

    fn is_length_store(&self, store: &PropertyStore) -> bool {
        self.inner
            .collections
            .borrow()
            .iter()
            .any(|e| e.length == *store)
    }

    fn resolve(&self, path: &str) -> Result<(PropertyStore, Name), DataError> {
        self.provider_by_path(path)
            .ok_or_else(|| DataError::PathNotFound {
                path: path.to_owned(),
            })
    }

    fn per_path_signal(&self, kind: Kind, path: &str) -> Signal<PropertyEvent> {
        let mut signals = self.inner.per_path[kind as usize].borrow_mut();
        if let Some(signal) = signals.get(path) {
            return signal.clone();
        }
        let signal = Signal::new();
        signals.insert(Name::new(path), signal.clone());
        signal
    }

    fn attach(&self, store: &PropertyStore) {
        let mut members = self.inner.members.borrow_mut();
        if let Some(membership) = members.get_mut(store) {
            membership.count += 1;
            return;
        }
        let slots = [Kind::Added, Kind::Changed, Kind::Removed].map(|kind| {
            let weak = Rc::downgrade(&self.inner);
            let signal = match kind {
                Kind::Added => store.property_added(),
                Kind::Changed => store.property_changed(),
                Kind::Removed => store.property_removed(),
            };
            signal.connect(move |event: &PropertyEvent| {
                if let Some(inner) = weak.upgrade() {
                    Self { inner }.forward(kind, event);
                }
            })
        });
        members.insert(
            store.clone(),
            Membership {
                count: 1,
                _slots: slots,
            },
        );
    }

    fn detach(&self, store: &PropertyStore) {
        let released = {
            let mut members = self.inner.members.borrow_mut();
            match members.get_mut(store) {
                Some(membership) if membership.count > 1 => {
                    membership.count -= 1;
                    None
                }
                Some(_) => members.remove(store),
                None => None,
            }
        };
        drop(released);
    }

    /// Reports a provider or member property event under every path it is
    /// reachable by.
    fn forward(&self, kind: Kind, event: &PropertyEvent) {
        let store = &event.store;
        let plain = self.inner.providers.borrow().contains(store) || self.is_length_store(store);
        let placements: SmallVec<[(Name, SmallVec<[usize; 2]>); 2]> = self
            .inner
            .collections
            .borrow()
            .iter()
            .map(|e| (e.collection.name().clone(), e.collection.positions(store)))
            .filter(|(_, positions)| !positions.is_empty())
            .collect();

        if plain {
            self.fire(kind, store, &event.name, true);
        }
        for (collection, positions) in &placements {
            for &index in positions {
                let path = indexed_path(collection, index, &event.name);
                self.fire(kind, store, &path, true);
            }
            if self.has_path_signals(kind) {
                let path = uuid_path(collection, &store.uuid(), &event.name);
                self.fire(kind, store, &path, false);
            }
        }
    }

    fn item_added(&self, event: &CollectionEvent) {
        if !self.is_registered(&event.collection) {
            return;
        }
        let collection = &event.collection;
        let name = collection.name();
        self.attach(&event.item);
        let len = collection.len();
        for position in event.index..len {
            // Before the insertion, this position held what now sits one further.
            let before = collection.get(position + 1);
            let after = collection.get(position);
            self.reassign(name, position, before.as_ref(), after.as_ref());
        }
        self.fire_identity(&ADDED_CHANGED, name, &event.item);
        self.update_length(collection);
    }

    fn item_removed(&self, event: &CollectionEvent) {
        if !self.is_registered(&event.collection) {
            return;
        }
        let collection = &event.collection;
        let name = collection.name();
        let len = collection.len();
        for position in event.index..=len {
            let before = if position == event.index {
                Some(event.item.clone())
            } else {
                collection.get(position - 1)
            };
            let after = collection.get(position);
            self.reassign(name, position, before.as_ref(), after.as_ref());
        }
        self.fire_identity(&[Kind::Removed], name, &event.item);
        self.detach(&event.item);
        self.update_length(collection);
    }

    /// Reports the properties of collection slot `position` moving from
    /// `before` to `after`.
    fn reassign(
        &self,
        collection: &Name,
        position: usize,
        before: Option<&PropertyStore>,
        after: Option<&PropertyStore>,
    ) {
        if let Some(before) = before {
            for property in before.names() {
                if !after.is_some_and(|a| a.has_property(&property)) {
                    let path = indexed_path(collection, position, &property);
                    self.fire(Kind::Removed, before, &path, true);
                }
            }
        }
        if let Some(after) = after {
            for property in after.names() {
                let path = indexed_path(collection, position, &property);
                if before.is_some_and(|b| b.has_property(&property)) {
                    self.fire(Kind::Changed, after, &path, true);
                } else {
                    self.fire_all(&ADDED_CHANGED, after, &path, true);
                }
            }
        }
    }

    fn announce_member(&self, kinds: &[Kind], collection: &Name, index: usize, item: &PropertyStore) {
        for property in item.names() {
            let path = indexed_path(collection, index, &property);
            self.fire_all(kinds, item, &path, true);
        }
    }

    fn fire_identity(&self, kinds: &[Kind], collection: &Name, item: &PropertyStore) {
        if !kinds.iter().any(|&k| self.has_path_signals(k)) {
            return;
        }
        for property in item.names() {
            let path = uuid_path(collection, &item.uuid(), &property);
            self.fire_all(kinds, item, &path, false);
        }
    }

    fn update_length(&self, collection: &Collection) {
        let length = self
            .inner
            .collections
            .borrow()
            .iter()
            .find(|e| e.collection == *collection)
            .map(|e| e.length.clone());
        if let Some(length) = length {
            let count = u32::try_from(collection.len()).unwrap_or(u32::MAX);
            let property = format!("{}.length", collection.name());
            if let Err(err) = length.set(property, count) {
                log::error!("aggregate: cannot update collection length: {err}");
            }
        }
    }

    fn is_registered(&self, collection: &Collection) -> bool {
        self.inner
            .collections
            .borrow()
            .iter()
            .any(|e| e.collection == *collection)
    }

    fn has_path_signals(&self, kind: Kind) -> bool {
        !self.inner.per_path[kind as usize].borrow().is_empty()
    }

    fn fire_all(&self, kinds: &[Kind], store: &PropertyStore, path: &str, catch_all: bool) {
        for &kind in kinds {
            self.fire(kind, store, path, catch_all);
        }
    }

    fn fire(&self, kind: Kind, store: &PropertyStore, path: &str, catch_all: bool) {
        let index = kind as usize;
        let dedicated = {
            let mut signals = self.inner.per_path[index].borrow_mut();
            let signal = signals.get(path).cloned();
            if signal.as_ref().is_some_and(Signal::is_empty) {
                signals.remove(path);
                None
            } else {
                signal
            }
        };
        let catch_all = catch_all && !self.inner.signals[index].is_empty();
        if !catch_all && dedicated.is_none() {
            return;
        }
        let event = PropertyEvent {
            store: store.clone(),
            name: Name::new(path),
        };
        if catch_all {
            self.inner.signals[index].emit(&event);
        }
        if let Some(signal) = dedicated {
            signal.emit(&event);
        }
    }
}

impl Default for AggregateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for AggregateStore {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for AggregateStore {}

impl Hash for AggregateStore {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.inner).hash(state);
    }
}

impl fmt::Debug for AggregateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateStore")
            .field("providers", &self.inner.providers.borrow().len())
            .field("collections", &self.collections())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Rc<RefCell<Vec<String>>>;

    fn record(data: &AggregateStore) -> (Log, [Slot; 3]) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let connect = |signal: &Signal<PropertyEvent>, tag: &'static str| {
            let log = log.clone();
            signal.connect(move |e| log.borrow_mut().push(format!("{tag} {}", e.name)))
        };
        let slots = [
            connect(data.property_added(), "added"),
            connect(data.property_changed(), "changed"),
            connect(data.property_removed(), "removed"),
        ];
        (log, slots)
    }

    fn lights(data: &AggregateStore, values: &[f32]) -> Vec<PropertyStore> {
        values
            .iter()
            .map(|&diffuse| {
                let light = PropertyStore::new();
                light.set("diffuse", diffuse).unwrap();
                data.add_provider_to(light.clone(), "lights");
                light
            })
            .collect()
    }

    #[test]
    fn plain_paths_resolve_first_provider() {
        let data = AggregateStore::new();
        let a = PropertyStore::new();
        let b = PropertyStore::new();
        a.set("x", 1_i32).unwrap();
        b.set("x", 2_i32).unwrap();
        b.set("y", 3_i32).unwrap();
        data.add_provider(a.clone());
        data.add_provider(b.clone());
        assert_eq!(data.get::<i32>("x").unwrap(), 1);
        assert_eq!(data.get::<i32>("y").unwrap(), 3);
        assert!(data.provider_by_path("z").is_none());
        assert_eq!(
            data.get::<i32>("z"),
            Err(DataError::PathNotFound { path: "z".into() })
        );
    }

    #[test]
    fn provider_events_are_forwarded() {
        let data = AggregateStore::new();
        let store = PropertyStore::new();
        store.set("a", 1_i32).unwrap();
        let (log, _slots) = record(&data);
        data.add_provider(store.clone());
        store.set("a", 2_i32).unwrap();
        data.remove_provider(&store).unwrap();
        store.set("a", 3_i32).unwrap();
        assert_eq!(
            *log.borrow(),
            ["added a", "changed a", "changed a", "removed a"]
        );
        assert!(data.remove_provider(&store).is_err());
    }

    #[test]
    fn positional_path_tracks_member() {
        let data = AggregateStore::new();
        let stores = lights(&data, &[1.0, 2.0, 3.0]);
        for (i, store) in stores.iter().enumerate() {
            assert_eq!(
                data.get::<f32>(&format!("lights[{i}].diffuse")).unwrap(),
                store.get::<f32>("diffuse").unwrap()
            );
        }
        stores[1].set("diffuse", 5.0_f32).unwrap();
        assert_eq!(data.get::<f32>("lights[1].diffuse").unwrap(), 5.0);
        assert!(data.has_property("lights[2].diffuse"));
        assert!(!data.has_property("lights[3].diffuse"));
        assert!(!data.has_property("lights[0].specular"));
    }

    #[test]
    fn removal_shifts_paths_and_length() {
        let data = AggregateStore::new();
        let stores = lights(&data, &[1.0, 2.0, 3.0]);
        data.remove_provider_from(&stores[0], "lights").unwrap();
        assert_eq!(data.get::<f32>("lights[0].diffuse").unwrap(), 2.0);
        assert_eq!(data.get::<f32>("lights[1].diffuse").unwrap(), 3.0);
        assert_eq!(data.get::<u32>("lights.length").unwrap(), 2);
        assert!(!data.has_property("lights[2].diffuse"));
    }

    #[test]
    fn removal_refires_changed_for_shifted_members() {
        let data = AggregateStore::new();
        let stores = lights(&data, &[1.0, 2.0, 3.0]);
        let (log, _slots) = record(&data);
        data.remove_provider_from(&stores[1], "lights").unwrap();
        assert_eq!(
            *log.borrow(),
            [
                "changed lights[1].diffuse",
                "removed lights[2].diffuse",
                "changed lights.length",
            ]
        );
    }

    #[test]
    fn insertion_refires_for_shifted_members() {
        let data = AggregateStore::new();
        let stores = lights(&data, &[1.0, 2.0]);
        let (log, _slots) = record(&data);
        let extra = PropertyStore::new();
        extra.set("diffuse", 0.5_f32).unwrap();
        data.collection("lights").unwrap().push_front(extra);
        assert_eq!(
            *log.borrow(),
            [
                "changed lights[0].diffuse",
                "changed lights[1].diffuse",
                "added lights[2].diffuse",
                "changed lights[2].diffuse",
                "changed lights.length",
            ]
        );
        assert_eq!(data.get::<f32>("lights[2].diffuse").unwrap(), 2.0);
        assert!(data.has_provider(&stores[0]));
    }

    #[test]
    fn length_follows_collection() {
        let data = AggregateStore::new();
        let stores = lights(&data, &[1.0, 2.0, 3.0, 4.0]);
        let collection = data.collection("lights").unwrap();
        assert_eq!(data.get::<u32>("lights.length").unwrap(), 4);
        collection.pop_back();
        collection.pop_front();
        assert_eq!(data.get::<u32>("lights.length").unwrap(), 2);
        collection.insert(1, stores[0].clone()).unwrap();
        assert_eq!(data.get::<u32>("lights.length").unwrap(), 3);
        collection.clear();
        assert_eq!(data.get::<u32>("lights.length").unwrap(), 0);
    }

    #[test]
    fn length_is_read_only() {
        let data = AggregateStore::new();
        lights(&data, &[1.0, 2.0]);
        assert_eq!(
            data.set("lights.length", 9_u32),
            Err(DataError::ReadOnly {
                path: "lights.length".into()
            })
        );
        assert!(!data.unset("lights.length"));
        assert_eq!(data.get::<u32>("lights.length").unwrap(), 2);
    }

    #[test]
    fn earlier_provider_shadows_later_one() {
        let data = AggregateStore::new();
        let front = PropertyStore::new();
        let back = PropertyStore::new();
        back.set("x", 1_i32).unwrap();
        data.add_provider(front.clone());
        data.add_provider(back.clone());
        assert_eq!(data.get::<i32>("x").unwrap(), 1);

        let added = Rc::new(RefCell::new(0));
        let _slot = {
            let added = added.clone();
            data.property_added_at("x")
                .connect(move |_| *added.borrow_mut() += 1)
        };
        let (log, _slots) = record(&data);
        front.set("x", 2_i32).unwrap();
        assert_eq!(*log.borrow(), ["added x", "changed x"]);
        assert_eq!(*added.borrow(), 1);
        assert_eq!(data.get::<i32>("x").unwrap(), 2);
        assert!(data.provider_by_path("x").is_some_and(|(s, _)| s == front));

        // Writes through the aggregate land on the shadowing store.
        data.set("x", 3_i32).unwrap();
        assert_eq!(back.get::<i32>("x").unwrap(), 1);
        assert!(front.unset("x"));
        assert_eq!(data.get::<i32>("x").unwrap(), 1);
    }

    #[test]
    fn store_twice_in_one_collection() {
        let data = AggregateStore::new();
        let light = PropertyStore::new();
        light.set("x", 1_i32).unwrap();
        data.add_provider_to(light.clone(), "lights");
        data.add_provider_to(light.clone(), "lights");
        assert_eq!(data.get::<i32>("lights[0].x").unwrap(), 1);
        assert_eq!(data.get::<i32>("lights[1].x").unwrap(), 1);
        assert_eq!(data.get::<u32>("lights.length").unwrap(), 2);

        let (log, _slots) = record(&data);
        light.set("x", 2_i32).unwrap();
        assert_eq!(*log.borrow(), ["changed lights[0].x", "changed lights[1].x"]);

        data.collection("lights").unwrap().erase(0).unwrap();
        assert_eq!(data.get::<i32>("lights[0].x").unwrap(), 2);
        assert!(!data.has_property("lights[1].x"));
        log.borrow_mut().clear();
        light.set("x", 3_i32).unwrap();
        assert_eq!(*log.borrow(), ["changed lights[0].x"]);

        data.collection("lights").unwrap().erase(0).unwrap();
        log.borrow_mut().clear();
        light.set("x", 4_i32).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn add_collection_imports_members() {
        let collection = Collection::new("lights");
        let light = PropertyStore::new();
        light.set("diffuse", 1.0_f32).unwrap();
        collection.push_back(light);
        let data = AggregateStore::new();
        let (log, _slots) = record(&data);
        data.add_collection(collection.clone());
        assert_eq!(
            *log.borrow(),
            [
                "added lights[0].diffuse",
                "changed lights[0].diffuse",
                "added lights.length",
                "changed lights.length",
            ]
        );
        log.borrow_mut().clear();
        data.remove_collection(&collection).unwrap();
        assert_eq!(
            *log.borrow(),
            ["removed lights[0].diffuse", "removed lights.length"]
        );
        assert!(data.collection("lights").is_none());
    }

    #[test]
    fn per_path_signal_fires_only_for_its_path() {
        let data = AggregateStore::new();
        let stores = lights(&data, &[1.0, 2.0]);
        let hits = Rc::new(RefCell::new(0));
        let slot = {
            let hits = hits.clone();
            data.property_changed_at("lights[1].diffuse")
                .connect(move |_| *hits.borrow_mut() += 1)
        };
        stores[0].set("diffuse", 9.0_f32).unwrap();
        stores[1].set("diffuse", 9.0_f32).unwrap();
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(data.num_path_signals(), 1);

        drop(slot);
        stores[1].set("diffuse", 10.0_f32).unwrap();
        assert_eq!(data.num_path_signals(), 0);
    }

    #[test]
    fn identity_path_signal_follows_store() {
        let data = AggregateStore::new();
        let stores = lights(&data, &[1.0, 2.0]);
        let path = format!("lights[{}].diffuse", stores[1].uuid());
        assert_eq!(data.get::<f32>(&path).unwrap(), 2.0);

        let hits = Rc::new(RefCell::new(Vec::new()));
        let _slot = {
            let hits = hits.clone();
            data.property_changed_at(&path)
                .connect(move |e| hits.borrow_mut().push(e.name.to_string()))
        };
        data.remove_provider_from(&stores[0], "lights").unwrap();
        stores[1].set("diffuse", 4.0_f32).unwrap();
        assert_eq!(*hits.borrow(), vec![path.clone()]);
        assert_eq!(data.get::<f32>(&path).unwrap(), 4.0);
    }

    #[test]
    fn set_forwards_to_resolved_store() {
        let data = AggregateStore::new();
        let stores = lights(&data, &[1.0]);
        data.set("lights[0].diffuse", 7.0_f32).unwrap();
        assert_eq!(stores[0].get::<f32>("diffuse").unwrap(), 7.0);
        assert!(matches!(
            data.set("nowhere", 1_i32),
            Err(DataError::PathNotFound { .. })
        ));
        assert!(data.unset("lights[0].diffuse"));
        assert!(!data.has_property("lights[0].diffuse"));
    }

    #[test]
    fn store_shared_by_two_members_is_watched_once() {
        let data = AggregateStore::new();
        let shared = PropertyStore::new();
        shared.set("x", 1_i32).unwrap();
        data.add_provider(shared.clone());
        data.add_provider_to(shared.clone(), "items");
        let (log, _slots) = record(&data);
        shared.set("x", 2_i32).unwrap();
        assert_eq!(*log.borrow(), ["changed x", "changed items[0].x"]);

        data.remove_provider(&shared).unwrap();
        log.borrow_mut().clear();
        shared.set("x", 3_i32).unwrap();
        assert_eq!(*log.borrow(), ["changed items[0].x"]);
    }

    #[test]
    fn deep_copy_is_independent() {
        let data = AggregateStore::new();
        let root = PropertyStore::new();
        root.set("x", 1_i32).unwrap();
        data.add_provider(root.clone());
        lights(&data, &[1.0]);

        let shallow = data.shallow_copy();
        let deep = data.deep_copy();
        root.set("x", 2_i32).unwrap();
        assert_eq!(shallow.get::<i32>("x").unwrap(), 2);
        assert_eq!(deep.get::<i32>("x").unwrap(), 1);
        assert_eq!(deep.get::<u32>("lights.length").unwrap(), 1);
        assert!(!deep.has_provider(&root));
    }

    #[test]
    fn dropping_aggregate_disconnects_from_stores() {
        let store = PropertyStore::new();
        let data = AggregateStore::new();
        data.add_provider(store.clone());
        assert_eq!(store.property_changed().num_callbacks(), 1);
        let weak = data.downgrade();
        drop(data);
        assert!(weak.upgrade().is_none());
        assert!(store.property_changed().is_empty());
    }
}
