// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Depth-sort support for draw units.

use std::cmp::Ordering;

use glam::{Mat4, Vec3};
use trellis_data::{AggregateStore, EffectVariables, PropertyEvent, Signal, Slot, format_property_name};

use crate::draw_unit::DrawUnitId;

/// Target property holding the model-to-world transform.
pub const MODEL_TO_WORLD: &str = "modelToWorldMatrix";
/// Renderer property holding the world-to-screen transform.
pub const WORLD_TO_SCREEN: &str = "worldToScreenMatrix";
/// Target property template holding the local-space center of the geometry.
pub const GEOMETRY_CENTER: &str = "geometry[${geometryUuid}].center";

/// Watches the properties that move a draw unit in eye space and raises
/// [`sort_needed`](Self::sort_needed) when any of them changes.
///
/// Depth is only recomputed when sorting, never per frame.
#[derive(Debug)]
pub struct ZSorter {
    id: DrawUnitId,
    target: AggregateStore,
    renderer: AggregateStore,
    center_path: String,
    sort_needed: Signal<DrawUnitId>,
    slots: Vec<Slot>,
}

impl ZSorter {
    /// Creates a sorter for unit `id`.
    #[must_use]
    pub fn new(
        id: DrawUnitId,
        variables: &EffectVariables,
        target: &AggregateStore,
        renderer: &AggregateStore,
    ) -> Self {
        let mut sorter = Self {
            id,
            target: target.clone(),
            renderer: renderer.clone(),
            center_path: format_property_name(variables, GEOMETRY_CENTER).into_owned(),
            sort_needed: Signal::new(),
            slots: Vec::new(),
        };
        sorter.watch(target, MODEL_TO_WORLD);
        let center_path = sorter.center_path.clone();
        sorter.watch(target, &center_path);
        sorter.watch(renderer, WORLD_TO_SCREEN);
        sorter
    }

    /// Also raises [`sort_needed`](Self::sort_needed) when `path` of `store`
    /// changes. Used for the priority and z-sort states.
    pub fn watch(&mut self, store: &AggregateStore, path: &str) {
        for signal in [store.property_changed_at(path), store.property_removed_at(path)] {
            let needed = self.sort_needed.clone();
            let id = self.id;
            self.slots.push(signal.connect(move |_: &PropertyEvent| needed.emit(&id)));
        }
    }

    /// Signal raised with the unit id when the draw order may have changed.
    #[must_use]
    pub fn sort_needed(&self) -> &Signal<DrawUnitId> {
        &self.sort_needed
    }

    /// Computes the normalised device depth of the geometry center.
    ///
    /// Missing transforms count as identity and a missing center as the
    /// origin.
    #[must_use]
    pub fn eye_depth(&self) -> f32 {
        let model = self.target.get::<Mat4>(MODEL_TO_WORLD).unwrap_or(Mat4::IDENTITY);
        let center = self.target.get::<Vec3>(&self.center_path).unwrap_or(Vec3::ZERO);
        let world_to_screen = self
            .renderer
            .get::<Mat4>(WORLD_TO_SCREEN)
            .unwrap_or(Mat4::IDENTITY);
        let p = world_to_screen * model * center.extend(1.0);
        if p.w == 0.0 { p.z } else { p.z / p.w }
    }
}

/// Sort key of one draw unit.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SortKey {
    /// Unit the key belongs to.
    pub id: DrawUnitId,
    /// Priority state; higher draws first.
    pub priority: f32,
    /// Whether the unit is depth sorted.
    pub z_sorted: bool,
    /// Eye depth, only meaningful when `z_sorted`.
    pub depth: f32,
}

/// Orders draw units: priority descending, then units that are not depth
/// sorted, then depth sorted units back to front. Ties keep id order.
#[must_use]
pub fn draw_order(a: &SortKey, b: &SortKey) -> Ordering {
    b.priority
        .total_cmp(&a.priority)
        .then(a.z_sorted.cmp(&b.z_sorted))
        .then_with(|| {
            if a.z_sorted && b.z_sorted {
                b.depth.total_cmp(&a.depth)
            } else {
                Ordering::Equal
            }
        })
        .then(a.id.cmp(&b.id))
}
