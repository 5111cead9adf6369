// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trellis Data: observable property stores for data-driven rendering.
//!
//! This crate is the reactive half of Trellis. Rendering code never polls
//! application state; it subscribes to it. The building blocks are:
//!
//! - **Property stores** ([`PropertyStore`]): named bags of typed values that
//!   report every addition, change and removal through [`Signal`]s.
//! - **Collections** ([`Collection`]): ordered, observable lists of shared
//!   stores, such as the lights of a scene.
//! - **Aggregates** ([`AggregateStore`]): a path-addressable view over several
//!   stores and collections. `"diffuseColor"` names a property of a direct
//!   provider, `"lights[2].diffuse"` the property of a collection member and
//!   `"lights.length"` the size of a collection.
//! - **Value cells** ([`ValueCell`]): the shared slot behind each property.
//!   Holding a cell gives lookup-free access to the latest value.
//! - **Names** ([`Name`], [`NameTable`]): cheap to clone and compare property
//!   names, with an explicit table for sharing allocations.
//! - **Templates** ([`EffectVariables`], [`format_property_name`]): `${var}`
//!   substitution for property names declared by effects.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use trellis_data::{AggregateStore, PropertyStore};
//!
//! let material = PropertyStore::new();
//! material.set("diffuseColor", [1.0_f32, 0.0, 0.0, 1.0]).unwrap();
//!
//! let data = AggregateStore::new();
//! data.add_provider(material.clone());
//!
//! let changes = Rc::new(Cell::new(0));
//! let _slot = {
//!     let changes = changes.clone();
//!     data.property_changed_at("diffuseColor")
//!         .connect(move |_| changes.set(changes.get() + 1))
//! };
//!
//! material.set("diffuseColor", [0.0_f32, 1.0, 0.0, 1.0]).unwrap();
//! assert_eq!(changes.get(), 1);
//! assert_eq!(
//!     data.get::<[f32; 4]>("diffuseColor").unwrap(),
//!     [0.0, 1.0, 0.0, 1.0]
//! );
//! ```
//!
//! ## Threading and re-entrancy
//!
//! Everything here is single-threaded: handles are `Rc` based and signals
//! dispatch synchronously on the caller's thread. Callbacks may mutate any
//! store, including the one that is notifying them; see [`signal`] for the
//! exact rules.

mod aggregate;
mod collection;
mod error;
mod name;
mod path;
pub mod signal;
mod store;
mod value;

pub use aggregate::{AggregateStore, WeakAggregateStore};
pub use collection::{Collection, CollectionEvent};
pub use error::DataError;
pub use name::{Name, NameTable};
pub use path::{
    EffectVariables, PathIndex, PropertyPath, format_property_name, indexed_path, uuid_path,
};
pub use signal::{Signal, Slot};
pub use store::{PropertyEvent, PropertyStore};
pub use value::{PropertyValue, Value, ValueCell};
