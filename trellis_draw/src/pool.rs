// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The draw unit pool: surfaces in, sorted and bound draw units out.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;
use trellis_data::{AggregateStore, EffectVariables, Name, NameTable, PropertyEvent, Signal, Slot};

use crate::binding::MacroKind;
use crate::config::PoolConfig;
use crate::context::{GraphicsContext, ResourceContext, TextureId};
use crate::draw_unit::{DrawUnit, DrawUnitId};
use crate::effect::{DEFAULT_TECHNIQUE, Effect};
use crate::error::DrawError;
use crate::invalid::InvalidSet;
use crate::zsort::{SortKey, draw_order};

/// Identifier of a surface registered with a pool.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(pub u32);

/// Something to draw: target data rendered with an effect.
#[derive(Clone, Debug)]
pub struct Surface {
    /// Data of the surface (geometry, material, transform).
    pub target: AggregateStore,
    /// Effect to render with.
    pub effect: Rc<Effect>,
    /// Technique of the effect to start with.
    pub technique: Name,
    /// Substitution variables for binding templates.
    pub variables: EffectVariables,
}

impl Surface {
    /// Creates a surface using the default technique and no variables.
    #[must_use]
    pub fn new(target: AggregateStore, effect: Rc<Effect>) -> Self {
        Self {
            target,
            effect,
            technique: Name::new(DEFAULT_TECHNIQUE),
            variables: EffectVariables::new(),
        }
    }

    /// Sets the technique.
    #[must_use]
    pub fn with_technique(mut self, technique: impl Into<Name>) -> Self {
        self.technique = technique.into();
        self
    }

    /// Sets the substitution variables.
    #[must_use]
    pub fn with_variables(mut self, variables: EffectVariables) -> Self {
        self.variables = variables;
        self
    }
}

/// Work done by one [`DrawUnitPool::update`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateStats {
    /// Surfaces admitted.
    pub admitted: usize,
    /// Surfaces removed.
    pub removed: usize,
    /// Draw units successfully bound.
    pub rebound: usize,
    /// Draw units that failed to bind.
    pub failed: usize,
    /// Whether the draw order was re-sorted.
    pub sorted: bool,
}

impl UpdateStats {
    /// Returns `true` if the update did nothing.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug)]
struct SurfaceEntry {
    surface: Surface,
    technique: Name,
    attempts: usize,
    units: Vec<DrawUnitId>,
}

type MacroKey = (AggregateStore, Name);

/// Units depending on one macro path, and the subscriptions that invalidate
/// them.
///
/// Every user is invalidated when the property appears or disappears. Only
/// users of typed macros are invalidated when its value changes, and the
/// change subscription lives only as long as there are such users.
#[derive(Debug)]
struct MacroWatch {
    units: Rc<RefCell<Vec<DrawUnitId>>>,
    typed: Rc<RefCell<Vec<DrawUnitId>>>,
    presence: [Slot; 2],
    changed: Option<Slot>,
}

impl MacroWatch {
    fn new(store: &AggregateStore, path: &str, invalid: &InvalidSet) -> Self {
        let units: Rc<RefCell<Vec<DrawUnitId>>> = Rc::default();
        Self {
            presence: [
                connect(&store.property_added_at(path), &units, invalid),
                connect(&store.property_removed_at(path), &units, invalid),
            ],
            units,
            typed: Rc::default(),
            changed: None,
        }
    }

    fn add_typed(
        &mut self,
        id: DrawUnitId,
        store: &AggregateStore,
        path: &str,
        invalid: &InvalidSet,
    ) {
        if self.changed.is_none() {
            self.changed = Some(connect(&store.property_changed_at(path), &self.typed, invalid));
        }
        self.typed.borrow_mut().push(id);
    }

    /// Forgets `id`, returning `true` once no unit uses the path.
    fn release(&mut self, id: DrawUnitId) -> bool {
        let typed_left = {
            let mut typed = self.typed.borrow_mut();
            typed.retain(|unit| *unit != id);
            !typed.is_empty()
        };
        if !typed_left {
            self.changed = None;
        }
        let mut units = self.units.borrow_mut();
        units.retain(|unit| *unit != id);
        units.is_empty()
    }
}

fn connect(
    signal: &Signal<PropertyEvent>,
    units: &Rc<RefCell<Vec<DrawUnitId>>>,
    invalid: &InvalidSet,
) -> Slot {
    let units = units.clone();
    let invalid = invalid.clone();
    signal.connect(move |event: &PropertyEvent| {
        let units = units.borrow();
        log::trace!("macro `{}` changed, invalidating {} units", event.name, units.len());
        for &id in units.iter() {
            invalid.mark(id);
        }
    })
}

/// Owns the draw units of every surface registered with a renderer.
///
/// Membership changes are deferred: [`add_surface`](Self::add_surface) and
/// [`remove_surface`](Self::remove_surface) only queue work, and the next
/// [`update`](Self::update) creates or destroys units. Units are rebound
/// lazily, when something they depend on changed:
///
/// * a bound property was removed, or an indexed path now resolves to
///   another collection member;
/// * a missing or defaulted property appeared;
/// * a macro property was added or removed, or for typed macros changed.
///
/// The draw order is only re-sorted when a unit's priority or eye depth may
/// have changed.
pub struct DrawUnitPool {
    config: PoolConfig,
    renderer: AggregateStore,
    root: AggregateStore,
    next_surface: u32,
    next_unit: u32,
    pending_add: Vec<(SurfaceId, Surface)>,
    pending_remove: Vec<SurfaceId>,
    surfaces: HashMap<SurfaceId, SurfaceEntry>,
    units: HashMap<DrawUnitId, DrawUnit>,
    unit_surface: HashMap<DrawUnitId, SurfaceId>,
    order: Vec<DrawUnitId>,
    invalid: InvalidSet,
    names: NameTable,
    macro_watches: HashMap<MacroKey, MacroWatch>,
    unit_macros: HashMap<DrawUnitId, Vec<MacroKey>>,
    sort_slots: HashMap<DrawUnitId, Slot>,
    errors: Vec<(SurfaceId, DrawError)>,
}

impl DrawUnitPool {
    /// Creates an empty pool drawing with `renderer` and `root` data.
    #[must_use]
    pub fn new(renderer: AggregateStore, root: AggregateStore, config: PoolConfig) -> Self {
        Self {
            config,
            renderer,
            root,
            next_surface: 0,
            next_unit: 0,
            pending_add: Vec::new(),
            pending_remove: Vec::new(),
            surfaces: HashMap::new(),
            units: HashMap::new(),
            unit_surface: HashMap::new(),
            order: Vec::new(),
            invalid: InvalidSet::new(),
            names: NameTable::new(),
            macro_watches: HashMap::new(),
            unit_macros: HashMap::new(),
            sort_slots: HashMap::new(),
            errors: Vec::new(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Queues `surface` for admission on the next update.
    pub fn add_surface(&mut self, surface: Surface) -> SurfaceId {
        let id = SurfaceId(self.next_surface);
        self.next_surface = self.next_surface.wrapping_add(1);
        self.pending_add.push((id, surface));
        id
    }

    /// Queues the removal of a surface.
    ///
    /// Removing a surface whose admission is still pending cancels the
    /// admission. Returns `false` for unknown surfaces.
    pub fn remove_surface(&mut self, id: SurfaceId) -> bool {
        if let Some(at) = self.pending_add.iter().position(|(s, _)| *s == id) {
            self.pending_add.remove(at);
            return true;
        }
        if !self.surfaces.contains_key(&id) {
            return false;
        }
        if !self.pending_remove.contains(&id) {
            self.pending_remove.push(id);
        }
        true
    }

    /// Returns `true` if `id` is admitted and not queued for removal.
    #[must_use]
    pub fn contains_surface(&self, id: SurfaceId) -> bool {
        self.surfaces.contains_key(&id) && !self.pending_remove.contains(&id)
    }

    /// Returns the technique an admitted surface currently renders with,
    /// which differs from the requested one after a fallback.
    #[must_use]
    pub fn technique(&self, id: SurfaceId) -> Option<&Name> {
        self.surfaces.get(&id).map(|entry| &entry.technique)
    }

    /// Returns the units of an admitted surface, one per pass.
    #[must_use]
    pub fn surface_units(&self, id: SurfaceId) -> &[DrawUnitId] {
        self.surfaces.get(&id).map_or(&[], |entry| &entry.units)
    }

    /// Returns the surface a unit was generated for.
    #[must_use]
    pub fn surface_of(&self, unit: DrawUnitId) -> Option<SurfaceId> {
        self.unit_surface.get(&unit).copied()
    }

    /// Returns a unit.
    #[must_use]
    pub fn unit(&self, id: DrawUnitId) -> Option<&DrawUnit> {
        self.units.get(&id)
    }

    /// Iterates over every unit in draw order.
    pub fn draw_units(&self) -> impl Iterator<Item = &DrawUnit> {
        self.order.iter().filter_map(|id| self.units.get(id))
    }

    /// Returns the number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if the pool has no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Returns `true` if `id` is waiting for a rebind.
    #[must_use]
    pub fn is_invalid(&self, id: DrawUnitId) -> bool {
        self.invalid.contains(id)
    }

    /// Returns the failures of the last update that were not recovered by a
    /// fallback. A recoverable failure is followed by the reason no fallback
    /// applied ([`DrawError::NoFallback`] or [`DrawError::FallbackExhausted`]).
    #[must_use]
    pub fn last_errors(&self) -> &[(SurfaceId, DrawError)] {
        &self.errors
    }

    /// Marks every unit for rebinding.
    pub fn invalidate_all(&mut self) {
        for &id in self.units.keys() {
            self.invalid.mark(id);
        }
    }

    /// Applies queued membership changes, rebinds invalid units and, if
    /// requested, re-sorts the draw order.
    pub fn update<C: ResourceContext + ?Sized>(&mut self, context: &mut C) -> UpdateStats {
        let mut stats = UpdateStats::default();
        self.errors.clear();

        for id in core::mem::take(&mut self.pending_remove) {
            if let Some(entry) = self.surfaces.remove(&id) {
                for unit in entry.units {
                    self.destroy_unit(unit);
                }
                stats.removed += 1;
            }
        }
        let units = &self.units;
        self.order.retain(|id| units.contains_key(id));

        for (id, surface) in core::mem::take(&mut self.pending_add) {
            let technique = surface.technique.clone();
            self.surfaces.insert(
                id,
                SurfaceEntry {
                    surface,
                    technique,
                    attempts: 0,
                    units: Vec::new(),
                },
            );
            if let Err(err) = self.generate(id) {
                log::error!("surface {id:?}: {err}");
                self.errors.push((id, err));
            }
            stats.admitted += 1;
        }

        loop {
            let ids = self.invalid.drain();
            if ids.is_empty() {
                break;
            }
            for id in ids {
                let Some(surface) = self.unit_surface.get(&id).copied() else {
                    continue;
                };
                match self.rebind(id, context) {
                    Ok(()) => stats.rebound += 1,
                    Err(err) => {
                        stats.failed += 1;
                        self.fail(surface, err);
                    }
                }
            }
        }

        if self.config.sort_on_update && self.invalid.take_sort() {
            self.sort();
            stats.sorted = true;
        }
        if !stats.is_idle() {
            log::debug!("pool update: {stats:?}");
        }
        stats
    }

    /// Sorts the draw order now.
    pub fn sort(&mut self) {
        let mut keys: Vec<SortKey> = self
            .order
            .iter()
            .filter_map(|id| self.units.get(id))
            .map(DrawUnit::sort_key)
            .collect();
        keys.sort_by(draw_order);
        self.order = keys.into_iter().map(|key| key.id).collect();
    }

    /// Renders every bound unit in draw order.
    pub fn render<C: GraphicsContext + ?Sized>(
        &self,
        context: &mut C,
        current_target: Option<TextureId>,
    ) {
        for unit in self.draw_units() {
            unit.render(context, current_target);
        }
    }

    /// Creates the units of a surface for its current technique.
    fn generate(&mut self, id: SurfaceId) -> Result<(), DrawError> {
        let Some(entry) = self.surfaces.get(&id) else {
            return Ok(());
        };
        let technique = entry
            .surface
            .effect
            .technique(&entry.technique)
            .ok_or_else(|| DrawError::UnknownTechnique {
                name: entry.technique.clone(),
            })?;
        let passes = technique.passes().to_vec();
        let variables = entry.surface.variables.clone();
        let target = entry.surface.target.clone();

        let mut created = Vec::with_capacity(passes.len());
        for pass in passes {
            let unit_id = DrawUnitId(self.next_unit);
            self.next_unit = self.next_unit.wrapping_add(1);
            let unit = DrawUnit::new(
                unit_id,
                pass,
                variables.clone(),
                target.clone(),
                self.renderer.clone(),
                self.root.clone(),
            );
            self.watch_macros(&unit);
            self.units.insert(unit_id, unit);
            self.unit_surface.insert(unit_id, id);
            self.order.push(unit_id);
            self.invalid.mark(unit_id);
            created.push(unit_id);
        }
        if let Some(entry) = self.surfaces.get_mut(&id) {
            entry.units = created;
        }
        self.invalid.request_sort();
        Ok(())
    }

    fn rebind<C: ResourceContext + ?Sized>(
        &mut self,
        id: DrawUnitId,
        context: &mut C,
    ) -> Result<(), DrawError> {
        self.sort_slots.remove(&id);
        let Some(unit) = self.units.get_mut(&id) else {
            return Ok(());
        };
        unit.invalidate();
        let program = unit.pass().select_program(&unit.resolver(), context)?;
        unit.bind(program, &self.invalid)?;
        if let Some(zsorter) = unit.zsorter() {
            let invalid = self.invalid.clone();
            let slot = zsorter
                .sort_needed()
                .connect(move |_: &DrawUnitId| invalid.request_sort());
            self.sort_slots.insert(id, slot);
        }
        self.invalid.request_sort();
        Ok(())
    }

    /// Handles a failed bind: falls back to another technique if possible.
    fn fail(&mut self, id: SurfaceId, err: DrawError) {
        let Some(entry) = self.surfaces.get_mut(&id) else {
            return;
        };
        if !err.is_recoverable() {
            log::error!("surface {id:?}: {err}");
            self.errors.push((id, err));
            return;
        }
        let fallback = entry
            .surface
            .effect
            .technique(&entry.technique)
            .and_then(|t| t.fallback().cloned());
        let Some(fallback) = fallback else {
            let reason = DrawError::NoFallback {
                technique: entry.technique.clone(),
            };
            log::error!("surface {id:?}: {err}; {reason}");
            self.errors.push((id, err));
            self.errors.push((id, reason));
            return;
        };
        if entry.attempts >= self.config.max_fallback_attempts {
            let reason = DrawError::FallbackExhausted {
                technique: entry.technique.clone(),
                attempts: entry.attempts,
            };
            log::error!("surface {id:?}: {err}; {reason}");
            self.errors.push((id, err));
            self.errors.push((id, reason));
            return;
        }

        log::warn!(
            "surface {id:?}: {err}; falling back from `{}` to `{fallback}`",
            entry.technique
        );
        entry.attempts += 1;
        entry.technique = fallback;
        for unit in core::mem::take(&mut entry.units) {
            self.destroy_unit(unit);
        }
        let units = &self.units;
        self.order.retain(|unit| units.contains_key(unit));
        if let Err(err) = self.generate(id) {
            log::error!("surface {id:?}: {err}");
            self.errors.push((id, err));
        }
    }

    fn destroy_unit(&mut self, id: DrawUnitId) {
        if let Some(mut unit) = self.units.remove(&id) {
            unit.dispose();
        }
        self.unit_surface.remove(&id);
        self.sort_slots.remove(&id);
        self.invalid.remove(id);
        let mut released = false;
        for key in self.unit_macros.remove(&id).unwrap_or_default() {
            let emptied = self
                .macro_watches
                .get_mut(&key)
                .is_some_and(|watch| watch.release(id));
            if emptied {
                self.macro_watches.remove(&key);
                released = true;
            }
        }
        if released {
            self.names.prune();
        }
    }

    fn watch_macros(&mut self, unit: &DrawUnit) {
        let resolver = unit.resolver();
        let mut keys = Vec::with_capacity(unit.pass().macros().len());
        for (_, binding) in unit.pass().macros() {
            let (store, path) = resolver.locate(binding.binding(), "");
            let path = self.names.intern(&path);
            let key = (store.clone(), path.clone());
            let invalid = &self.invalid;
            let watch = self
                .macro_watches
                .entry(key.clone())
                .or_insert_with(|| MacroWatch::new(store, &path, invalid));
            watch.units.borrow_mut().push(unit.id());
            if binding.kind() != MacroKind::Unset {
                watch.add_typed(unit.id(), store, &path, invalid);
            }
            keys.push(key);
        }
        self.unit_macros.insert(unit.id(), keys);
    }
}

impl fmt::Debug for DrawUnitPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawUnitPool")
            .field("config", &self.config)
            .field("surfaces", &self.surfaces.len())
            .field("pending_add", &self.pending_add.len())
            .field("pending_remove", &self.pending_remove.len())
            .field("units", &self.units.len())
            .field("invalid", &self.invalid.len())
            .field("macro_watches", &self.macro_watches.len())
            .finish_non_exhaustive()
    }
}
