// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Declarative bindings from program inputs to property paths.

use std::fmt;

use hashbrown::HashMap;
use trellis_data::{Name, PropertyStore};

/// The aggregate a binding reads from.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Source {
    /// The data of the surface being drawn (geometry, material, transform).
    #[default]
    Target,
    /// The data of the renderer (camera, viewport).
    Renderer,
    /// The data of the scene root (lights, global settings).
    Root,
}

/// Points an input at a property name template in one of the three sources.
///
/// The template may contain `${var}` placeholders; see
/// [`format_property_name`](trellis_data::format_property_name).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    property_name: Name,
    source: Source,
}

impl Binding {
    /// Creates a binding.
    #[must_use]
    pub fn new(property_name: impl Into<Name>, source: Source) -> Self {
        Self {
            property_name: property_name.into(),
            source,
        }
    }

    /// Binds to a property of the target data.
    #[must_use]
    pub fn target(property_name: impl Into<Name>) -> Self {
        Self::new(property_name, Source::Target)
    }

    /// Binds to a property of the renderer data.
    #[must_use]
    pub fn renderer(property_name: impl Into<Name>) -> Self {
        Self::new(property_name, Source::Renderer)
    }

    /// Binds to a property of the root data.
    #[must_use]
    pub fn root(property_name: impl Into<Name>) -> Self {
        Self::new(property_name, Source::Root)
    }

    /// Returns the property name template.
    #[must_use]
    pub fn property_name(&self) -> &Name {
        &self.property_name
    }

    /// Returns the source.
    #[must_use]
    pub fn source(&self) -> Source {
        self.source
    }
}

impl AsRef<Self> for Binding {
    fn as_ref(&self) -> &Self {
        self
    }
}

/// How a macro's value reaches the program.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum MacroKind {
    /// Only presence matters: the macro is defined iff its property resolves.
    #[default]
    Unset,
    /// Defined with `1` or `0`.
    Bool,
    /// Defined with an integer, clamped to the binding's range.
    Int,
    /// Defined with a float.
    Float,
}

/// A binding that controls conditional shader compilation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroBinding {
    binding: Binding,
    kind: MacroKind,
    min: i32,
    max: i32,
}

impl MacroBinding {
    /// Creates a macro binding with an unbounded integer range.
    #[must_use]
    pub fn new(binding: Binding, kind: MacroKind) -> Self {
        Self {
            binding,
            kind,
            min: i32::MIN,
            max: i32::MAX,
        }
    }

    /// Restricts integer values to `min..=max`.
    #[must_use]
    pub fn with_range(mut self, min: i32, max: i32) -> Self {
        self.min = min;
        self.max = max.max(min);
        self
    }

    /// Returns the underlying binding.
    #[must_use]
    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// Returns the value kind.
    #[must_use]
    pub fn kind(&self) -> MacroKind {
        self.kind
    }

    /// Returns the lower clamp bound.
    #[must_use]
    pub fn min(&self) -> i32 {
        self.min
    }

    /// Returns the upper clamp bound.
    #[must_use]
    pub fn max(&self) -> i32 {
        self.max
    }
}

impl AsRef<Binding> for MacroBinding {
    fn as_ref(&self) -> &Binding {
        &self.binding
    }
}

/// Bindings keyed by input name, plus a store of default values.
///
/// Defaults are keyed by input name as well and are used when an input has
/// no binding or its binding does not resolve.
///
/// ```
/// use trellis_draw::{Binding, BindingMap};
///
/// let uniforms = BindingMap::new()
///     .with_binding("diffuseColor", Binding::target("material.diffuseColor"))
///     .with_binding("viewMatrix", Binding::renderer("viewMatrix"));
/// uniforms.defaults().set("alphaThreshold", 0.5_f32).unwrap();
///
/// assert!(uniforms.get("viewMatrix").is_some());
/// assert!(uniforms.defaults().has_property("alphaThreshold"));
/// ```
#[derive(Clone)]
pub struct BindingMap<B = Binding> {
    bindings: HashMap<Name, B>,
    defaults: PropertyStore,
}

/// Macro bindings of a pass.
pub type MacroBindingMap = BindingMap<MacroBinding>;

impl<B> BindingMap<B> {
    /// Creates an empty map with an empty default store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
            defaults: PropertyStore::new(),
        }
    }

    /// Adds or replaces the binding of `input`.
    pub fn insert(&mut self, input: impl Into<Name>, binding: B) {
        self.bindings.insert(input.into(), binding);
    }

    /// Chaining form of [`insert`](Self::insert).
    #[must_use]
    pub fn with_binding(mut self, input: impl Into<Name>, binding: B) -> Self {
        self.insert(input, binding);
        self
    }

    /// Replaces the default value store.
    #[must_use]
    pub fn with_defaults(mut self, defaults: PropertyStore) -> Self {
        self.defaults = defaults;
        self
    }

    /// Returns the binding of `input`.
    #[must_use]
    pub fn get(&self, input: &str) -> Option<&B> {
        self.bindings.get(input)
    }

    /// Returns the default value store.
    #[must_use]
    pub fn defaults(&self) -> &PropertyStore {
        &self.defaults
    }

    /// Iterates over bindings in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&Name, &B)> {
        self.bindings.iter()
    }

    /// Returns the bindings sorted by input name.
    #[must_use]
    pub fn sorted(&self) -> Vec<(Name, B)>
    where
        B: Clone,
    {
        let mut sorted: Vec<(Name, B)> = self
            .bindings
            .iter()
            .map(|(name, binding)| (name.clone(), binding.clone()))
            .collect();
        sorted.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        sorted
    }

    /// Returns the number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if there are no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl<B> Default for BindingMap<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: fmt::Debug> fmt::Debug for BindingMap<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingMap")
            .field("bindings", &self.bindings)
            .field("defaults", &self.defaults)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_orders_by_input_name() {
        let map = BindingMap::new()
            .with_binding("b", Binding::target("b"))
            .with_binding("a", Binding::root("a"))
            .with_binding("c", Binding::renderer("c"));
        let names: Vec<_> = map.sorted().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn range_is_normalized() {
        let m = MacroBinding::new(Binding::target("n"), MacroKind::Int).with_range(4, 1);
        assert_eq!((m.min(), m.max()), (4, 4));
    }
}
