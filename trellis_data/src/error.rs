// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type for store, collection and aggregate operations.

use crate::name::Name;

/// Errors reported by [`PropertyStore`](crate::PropertyStore),
/// [`Collection`](crate::Collection) and [`AggregateStore`](crate::AggregateStore).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DataError {
    /// The property does not exist in the store.
    #[error("property `{name}` not found")]
    PropertyNotFound {
        /// Name of the missing property.
        name: Name,
    },
    /// The property exists but holds a value of a different type.
    #[error("property `{name}` holds a `{stored}`, not a `{requested}`")]
    TypeMismatch {
        /// Name of the property.
        name: Name,
        /// Type currently stored.
        stored: &'static str,
        /// Type the caller asked for or tried to assign.
        requested: &'static str,
    },
    /// A property path did not resolve to any store.
    #[error("property path `{path}` does not resolve")]
    PathNotFound {
        /// The path as given by the caller.
        path: String,
    },
    /// The item is not a member of the collection.
    #[error("item not found in collection `{collection}`")]
    ItemNotFound {
        /// Name of the collection.
        collection: Name,
    },
    /// A positional operation was given an index past the end.
    #[error("index {index} out of bounds for collection `{collection}` of length {len}")]
    IndexOutOfBounds {
        /// Name of the collection.
        collection: Name,
        /// The offending index.
        index: usize,
        /// Length of the collection at the time of the call.
        len: usize,
    },
    /// No collection with this name is registered on the aggregate.
    #[error("collection `{name}` not found")]
    CollectionNotFound {
        /// Name of the collection.
        name: Name,
    },
    /// The path names a value the aggregate maintains itself, such as a
    /// collection length.
    #[error("property path `{path}` is read-only")]
    ReadOnly {
        /// The path as given by the caller.
        path: String,
    },
    /// The store was never added to the aggregate.
    #[error("store {uuid} is not a provider of this aggregate")]
    ProviderNotFound {
        /// Identity of the store.
        uuid: uuid::Uuid,
    },
}
