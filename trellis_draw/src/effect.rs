// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Effects and techniques.

use std::rc::Rc;

use trellis_data::Name;

use crate::pass::Pass;

/// Name of the technique a surface uses unless told otherwise.
pub const DEFAULT_TECHNIQUE: &str = "default";

/// An ordered list of passes, with an optional technique to fall back to
/// when one of them cannot be bound or compiled.
#[derive(Clone, Debug)]
pub struct Technique {
    name: Name,
    passes: Vec<Rc<Pass>>,
    fallback: Option<Name>,
}

impl Technique {
    /// Creates a technique.
    #[must_use]
    pub fn new(name: impl Into<Name>, passes: impl IntoIterator<Item = Rc<Pass>>) -> Self {
        Self {
            name: name.into(),
            passes: passes.into_iter().collect(),
            fallback: None,
        }
    }

    /// Sets the fallback technique.
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<Name>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    /// Returns the technique name.
    #[must_use]
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Returns the passes, in draw order.
    #[must_use]
    pub fn passes(&self) -> &[Rc<Pass>] {
        &self.passes
    }

    /// Returns the fallback technique name.
    #[must_use]
    pub fn fallback(&self) -> Option<&Name> {
        self.fallback.as_ref()
    }
}

/// A named set of techniques.
///
/// ```
/// use std::rc::Rc;
/// use trellis_draw::{Effect, Pass, Technique};
///
/// let forward = Rc::new(Pass::builder("forward").build().unwrap());
/// let unlit = Rc::new(Pass::builder("unlit").build().unwrap());
/// let effect = Effect::new("phong")
///     .with_technique(Technique::new("default", [forward]).with_fallback("unlit"))
///     .with_technique(Technique::new("unlit", [unlit]));
///
/// let fallback = effect.technique("default").and_then(|t| t.fallback()).unwrap();
/// assert_eq!(effect.technique(fallback).unwrap().passes()[0].name(), "unlit");
/// ```
#[derive(Clone, Debug)]
pub struct Effect {
    name: Name,
    techniques: Vec<Technique>,
}

impl Effect {
    /// Creates an effect without techniques.
    #[must_use]
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            techniques: Vec::new(),
        }
    }

    /// Adds a technique, replacing one with the same name.
    pub fn add_technique(&mut self, technique: Technique) {
        match self
            .techniques
            .iter_mut()
            .find(|t| t.name == technique.name)
        {
            Some(slot) => *slot = technique,
            None => self.techniques.push(technique),
        }
    }

    /// Chaining form of [`add_technique`](Self::add_technique).
    #[must_use]
    pub fn with_technique(mut self, technique: Technique) -> Self {
        self.add_technique(technique);
        self
    }

    /// Returns the effect name.
    #[must_use]
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Returns the technique called `name`.
    #[must_use]
    pub fn technique(&self, name: &str) -> Option<&Technique> {
        self.techniques.iter().find(|t| t.name == name)
    }

    /// Returns every technique, in insertion order.
    #[must_use]
    pub fn techniques(&self) -> &[Technique] {
        &self.techniques
    }
}
