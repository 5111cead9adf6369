// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Type-erased property values and shared value cells.
//!
//! [`Value`] boxes a value of any [`PropertyValue`] type together with its type
//! information. [`ValueCell`] is the shared slot a [`PropertyStore`](crate::PropertyStore)
//! keeps per property: updates overwrite the cell contents in place, so a
//! holder of the cell sees new values without looking the property up again.

use std::any::{Any, TypeId, type_name};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Types that can be stored as property values.
///
/// Values must be clonable (for deep copies), comparable (so redundant
/// assignments do not notify) and debuggable. Every type meeting those bounds
/// implements this trait automatically.
pub trait PropertyValue: Clone + PartialEq + fmt::Debug + 'static {}

impl<T: Clone + PartialEq + fmt::Debug + 'static> PropertyValue for T {}

/// A type-erased property value.
///
/// # Example
///
/// ```
/// use trellis_data::Value;
///
/// let value = Value::new(42_i32);
/// assert!(value.is::<i32>());
/// assert_eq!(value.downcast_ref::<i32>(), Some(&42));
/// assert_eq!(value, Value::new(42_i32));
/// assert_ne!(value, Value::new(42_u32));
/// ```
pub struct Value {
    inner: Box<dyn ErasedValue>,
    type_id: TypeId,
    type_name: &'static str,
}

impl Value {
    /// Boxes a concrete value.
    #[must_use]
    pub fn new<T: PropertyValue>(value: T) -> Self {
        Self {
            inner: Box::new(value),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    /// Returns the [`TypeId`] of the contained value.
    #[must_use]
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name of the contained value, for diagnostics.
    #[must_use]
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the contained value is a `T`.
    #[must_use]
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Returns a reference to the value if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref()
    }

    /// Returns a mutable reference to the value if it is a `T`.
    #[must_use]
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.inner.as_any_mut().downcast_mut()
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_boxed(),
            type_id: self.type_id,
            type_name: self.type_name,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.inner.dyn_eq(other.inner.as_any())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.dyn_fmt(f)
    }
}

trait ErasedValue: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn clone_boxed(&self) -> Box<dyn ErasedValue>;
    fn dyn_eq(&self, other: &dyn Any) -> bool;
    fn dyn_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T: PropertyValue> ErasedValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clone_boxed(&self) -> Box<dyn ErasedValue> {
        Box::new(self.clone())
    }

    fn dyn_eq(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<T>().is_some_and(|other| self == other)
    }

    fn dyn_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A shared, in-place updatable property slot.
///
/// Cloning a cell shares it. The owning store replaces the contents on every
/// assignment, so readers holding a clone always observe the latest value
/// until the property is removed from its store.
///
/// # Example
///
/// ```
/// use trellis_data::PropertyStore;
///
/// let store = PropertyStore::new();
/// store.set("opacity", 0.5_f32).unwrap();
/// let cell = store.cell("opacity").unwrap();
///
/// store.set("opacity", 0.75_f32).unwrap();
/// assert_eq!(cell.get::<f32>(), Some(0.75));
/// ```
#[derive(Clone)]
pub struct ValueCell(Rc<RefCell<Value>>);

impl ValueCell {
    /// Creates a detached cell holding `value`.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    /// Returns a clone of the contained value if it is a `T`.
    #[must_use]
    pub fn get<T: PropertyValue>(&self) -> Option<T> {
        self.0.borrow().downcast_ref::<T>().cloned()
    }

    /// Calls `f` with a reference to the contained value if it is a `T`.
    ///
    /// This does not clone or allocate.
    pub fn with<T: 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.0.borrow().downcast_ref::<T>().map(f)
    }

    /// Returns `true` if the contained value is a `T`.
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.0.borrow().is::<T>()
    }

    /// Returns a clone of the erased value.
    #[must_use]
    pub fn value(&self) -> Value {
        self.0.borrow().clone()
    }

    /// Returns the type name of the contained value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.0.borrow().type_name()
    }

    /// Returns `true` if both cells are the same slot.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn type_info(&self) -> (TypeId, &'static str) {
        let value = self.0.borrow();
        (Value::type_id(&value), Value::type_name(&value))
    }

    /// Replaces the contents, returning `true` if the value differed.
    pub(crate) fn replace(&self, value: Value) -> bool {
        let mut current = self.0.borrow_mut();
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    }
}

impl fmt::Debug for ValueCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValueCell").field(&*self.0.borrow()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_checks_type() {
        let value = Value::new(1.5_f32);
        assert!(value.is::<f32>());
        assert_eq!(value.downcast_ref::<f32>(), Some(&1.5));
        assert_eq!(value.downcast_ref::<f64>(), None);
        assert_eq!(value.type_name(), "f32");
    }

    #[test]
    fn equality_requires_same_type_and_value() {
        assert_eq!(Value::new(String::from("a")), Value::new(String::from("a")));
        assert_ne!(Value::new(String::from("a")), Value::new(String::from("b")));
        assert_ne!(Value::new(1_i32), Value::new(1_i64));
    }

    #[test]
    fn clone_is_deep() {
        let mut a = Value::new(vec![1, 2, 3]);
        let b = a.clone();
        a.downcast_mut::<Vec<i32>>().unwrap().push(4);
        assert_eq!(b.downcast_ref::<Vec<i32>>().unwrap().len(), 3);
    }

    #[test]
    fn debug_shows_contents() {
        assert_eq!(format!("{:?}", Value::new(7_u8)), "7");
    }

    #[test]
    fn cell_replace_reports_change() {
        let cell = ValueCell::new(Value::new(1_i32));
        let alias = cell.clone();
        assert!(!cell.replace(Value::new(1_i32)));
        assert!(cell.replace(Value::new(2_i32)));
        assert_eq!(alias.get::<i32>(), Some(2));
        assert_eq!(alias.with(|v: &i32| v * 10), Some(20));
        assert!(alias.ptr_eq(&cell));
    }

    #[test]
    fn cell_type_info_names_the_stored_type() {
        let cell = ValueCell::new(Value::new(3_u32));
        assert_eq!(cell.type_info(), (TypeId::of::<u32>(), "u32"));
        cell.replace(Value::new(4_u32));
        assert_eq!(cell.type_info().0, TypeId::of::<u32>());
    }
}
