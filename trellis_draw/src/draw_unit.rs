// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Draw units: a pass bound to the data of one surface, ready to render.

use std::fmt;
use std::rc::Rc;

use trellis_data::{
    AggregateStore, DataError, EffectVariables, Name, PropertyEvent, PropertyPath, Slot,
    ValueCell, format_property_name,
};

use crate::binding::{Binding, BindingMap, Source};
use crate::context::{
    DrawOp, GraphicsContext, IndexBuffer, StateOp, TextureId, UniformKind, VertexAttribute,
};
use crate::error::DrawError;
use crate::invalid::InvalidSet;
use crate::pass::{Pass, Program};
use crate::resolver::{BindingResolver, ResolvedInput, ResolvedSource, split_array_suffix};
use crate::states::{
    BlendFactor, ColorMask, CompareMode, RenderState, ScissorBox, TriangleCulling, priority,
};
use crate::zsort::{SortKey, ZSorter};

/// Target property template holding the index buffer of the geometry.
pub const GEOMETRY_INDICES: &str = "geometry[${geometryUuid}].indices";

/// Identifier of a draw unit within its pool.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DrawUnitId(pub u32);

/// Lifecycle of a [`DrawUnit`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DrawUnitState {
    /// Created, never bound.
    Unbound,
    /// Bound and renderable.
    Bound,
    /// A binding went stale or failed; the unit waits for a rebind.
    Invalid,
    /// Released; the unit never renders again.
    Disposed,
}

#[derive(Debug)]
struct UniformSlot {
    location: u32,
    kind: UniformKind,
    cell: ValueCell,
}

#[derive(Debug)]
struct SamplerSlot {
    unit: u32,
    location: u32,
    cell: ValueCell,
}

#[derive(Debug)]
struct AttributeSlot {
    location: u32,
    cell: ValueCell,
}

/// Everything resolved by one successful bind.
#[derive(Debug)]
struct Resolved {
    program: Rc<Program>,
    uniforms: Vec<UniformSlot>,
    samplers: Vec<SamplerSlot>,
    attributes: Vec<AttributeSlot>,
    states: Vec<ValueCell>,
    indices: ValueCell,
}

/// A pass paired with the data of one surface.
///
/// Binding resolves every program input and render state once and caches the
/// value cells; rendering only reads those cells. Any change that can make a
/// cached cell stale (the property is removed, a collection shifts under an
/// indexed path, a missing value appears) marks the unit in its pool's
/// [`InvalidSet`].
pub struct DrawUnit {
    id: DrawUnitId,
    pass: Rc<Pass>,
    variables: EffectVariables,
    target: AggregateStore,
    renderer: AggregateStore,
    root: AggregateStore,
    state: DrawUnitState,
    resolved: Option<Resolved>,
    zsorter: Option<ZSorter>,
    watches: Vec<Slot>,
}

impl DrawUnit {
    /// Creates an unbound unit.
    #[must_use]
    pub fn new(
        id: DrawUnitId,
        pass: Rc<Pass>,
        variables: EffectVariables,
        target: AggregateStore,
        renderer: AggregateStore,
        root: AggregateStore,
    ) -> Self {
        Self {
            id,
            pass,
            variables,
            target,
            renderer,
            root,
            state: DrawUnitState::Unbound,
            resolved: None,
            zsorter: None,
            watches: Vec::new(),
        }
    }

    /// Returns the unit id.
    #[must_use]
    pub fn id(&self) -> DrawUnitId {
        self.id
    }

    /// Returns the pass.
    #[must_use]
    pub fn pass(&self) -> &Rc<Pass> {
        &self.pass
    }

    /// Returns the substitution variables.
    #[must_use]
    pub fn variables(&self) -> &EffectVariables {
        &self.variables
    }

    /// Returns the target data.
    #[must_use]
    pub fn target(&self) -> &AggregateStore {
        &self.target
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> DrawUnitState {
        self.state
    }

    /// Returns the bound program.
    #[must_use]
    pub fn program(&self) -> Option<&Rc<Program>> {
        self.resolved.as_ref().map(|r| &r.program)
    }

    /// Returns a resolver over this unit's data.
    #[must_use]
    pub fn resolver(&self) -> BindingResolver<'_> {
        BindingResolver::new(
            self.pass.name(),
            &self.variables,
            &self.target,
            &self.renderer,
            &self.root,
        )
    }

    /// Returns the depth-sort helper of a bound unit.
    #[must_use]
    pub fn zsorter(&self) -> Option<&ZSorter> {
        self.zsorter.as_ref()
    }

    /// Binds `program` and resolves every input and render state of the pass.
    ///
    /// On failure the unit is left [`Invalid`](DrawUnitState::Invalid) and
    /// watches the path that failed to resolve, so it is marked in `invalid`
    /// once the value appears.
    ///
    /// # Errors
    ///
    /// Returns [`DrawError::MissingValue`] when an input has neither a value
    /// nor a default, and [`DrawError::Data`] when a value has the wrong type.
    pub fn bind(&mut self, program: Rc<Program>, invalid: &InvalidSet) -> Result<(), DrawError> {
        if self.state == DrawUnitState::Disposed {
            return Ok(());
        }
        self.release();
        match self.resolve(program, invalid) {
            Ok(resolved) => {
                self.zsorter = Some(self.make_zsorter());
                self.resolved = Some(resolved);
                self.state = DrawUnitState::Bound;
                Ok(())
            }
            Err(err) => {
                self.state = DrawUnitState::Invalid;
                Err(err)
            }
        }
    }

    /// Marks the unit stale without dropping its watches.
    pub fn invalidate(&mut self) {
        if self.state == DrawUnitState::Bound {
            self.state = DrawUnitState::Invalid;
        }
    }

    /// Drops the bound program, cached cells and watches.
    pub fn unbind(&mut self) {
        self.release();
        if self.state != DrawUnitState::Disposed {
            self.state = DrawUnitState::Unbound;
        }
    }

    /// Unbinds the unit for good.
    pub fn dispose(&mut self) {
        self.release();
        self.state = DrawUnitState::Disposed;
    }

    /// Returns the sort key of the unit.
    #[must_use]
    pub fn sort_key(&self) -> SortKey {
        let state = |s: RenderState| self.resolved.as_ref().map(|r| &r.states[s.index()]);
        let priority = state(RenderState::Priority)
            .and_then(ValueCell::get::<f32>)
            .unwrap_or(priority::OPAQUE);
        let z_sorted = state(RenderState::ZSorted)
            .and_then(ValueCell::get::<bool>)
            .unwrap_or(false);
        let depth = match &self.zsorter {
            Some(zsorter) if z_sorted => zsorter.eye_depth(),
            _ => 0.0,
        };
        SortKey {
            id: self.id,
            priority,
            z_sorted,
            depth,
        }
    }

    /// Renders the unit if it is bound.
    ///
    /// `current_target` is the render target the caller has set. A unit whose
    /// `target` state names another texture switches to it and restores
    /// `current_target` afterwards; `None` keeps the caller's target.
    pub fn render<C: GraphicsContext + ?Sized>(
        &self,
        context: &mut C,
        current_target: Option<TextureId>,
    ) {
        if self.state != DrawUnitState::Bound {
            return;
        }
        let Some(resolved) = &self.resolved else {
            return;
        };
        let Some(indices) = resolved.indices.get::<IndexBuffer>() else {
            return;
        };
        let states = &resolved.states;
        let target = states[RenderState::Target.index()]
            .get::<Option<TextureId>>()
            .flatten()
            .or(current_target);
        if target != current_target {
            context.state(StateOp::RenderTarget(target));
        }

        context.state(StateOp::UseProgram(resolved.program.id()));
        for uniform in &resolved.uniforms {
            if let Some(value) = uniform.kind.read(&uniform.cell) {
                context.state(StateOp::Uniform {
                    location: uniform.location,
                    value,
                });
            }
        }
        for sampler in &resolved.samplers {
            if let Some(texture) = sampler.cell.get::<TextureId>() {
                context.state(StateOp::Texture {
                    unit: sampler.unit,
                    location: sampler.location,
                    texture,
                });
            }
        }
        for attribute in &resolved.attributes {
            if let Some(stream) = attribute.cell.get::<VertexAttribute>() {
                context.state(StateOp::VertexAttribute {
                    location: attribute.location,
                    attribute: stream,
                });
            }
        }

        let read = |s: RenderState| &states[s.index()];
        context.state(StateOp::Blending {
            source: read(RenderState::BlendSource)
                .get::<BlendFactor>()
                .unwrap_or(BlendFactor::One),
            destination: read(RenderState::BlendDestination)
                .get::<BlendFactor>()
                .unwrap_or(BlendFactor::Zero),
        });
        context.state(StateOp::ColorMask(
            read(RenderState::ColorMask)
                .get::<ColorMask>()
                .unwrap_or_default(),
        ));
        context.state(StateOp::Depth {
            mask: read(RenderState::DepthMask).get::<bool>().unwrap_or(true),
            function: read(RenderState::DepthFunction)
                .get::<CompareMode>()
                .unwrap_or_default(),
        });
        context.state(StateOp::TriangleCulling(
            read(RenderState::TriangleCulling)
                .get::<TriangleCulling>()
                .unwrap_or_default(),
        ));
        let scissor = read(RenderState::ScissorTest)
            .get::<bool>()
            .unwrap_or(false)
            .then(|| {
                read(RenderState::ScissorBox)
                    .get::<ScissorBox>()
                    .unwrap_or_default()
            });
        context.state(StateOp::Scissor(scissor));

        context.draw(DrawOp::Triangles(indices));

        if target != current_target {
            context.state(StateOp::RenderTarget(current_target));
        }
    }

    fn release(&mut self) {
        self.watches.clear();
        self.resolved = None;
        self.zsorter = None;
    }

    fn make_zsorter(&self) -> ZSorter {
        let mut zsorter = ZSorter::new(self.id, &self.variables, &self.target, &self.renderer);
        let resolver = self.resolver();
        for state in [RenderState::Priority, RenderState::ZSorted] {
            if let Some(binding) = self.pass.state_bindings().get(state.name()) {
                let (store, path) = resolver.locate(binding, "");
                zsorter.watch(store, &path);
            }
        }
        zsorter
    }

    fn resolve(&mut self, program: Rc<Program>, invalid: &InvalidSet) -> Result<Resolved, DrawError> {
        let pass = self.pass.clone();
        let resolver = BindingResolver::new(
            pass.name(),
            &self.variables,
            &self.target,
            &self.renderer,
            &self.root,
        );
        let mut watcher = Watcher {
            id: self.id,
            invalid,
            watches: &mut self.watches,
        };

        let mut uniforms = Vec::new();
        let mut samplers = Vec::new();
        for input in program.uniforms() {
            let cell = watcher.resolve(&resolver, &input.name, pass.uniform_bindings())?;
            if !input.kind.accepts(&cell) {
                return Err(mismatch(&input.name, &cell, input.kind.type_name()));
            }
            if input.kind == UniformKind::Sampler2d {
                let unit = u32::try_from(samplers.len()).unwrap_or(u32::MAX);
                samplers.push(SamplerSlot {
                    unit,
                    location: input.location,
                    cell,
                });
            } else {
                uniforms.push(UniformSlot {
                    location: input.location,
                    kind: input.kind,
                    cell,
                });
            }
        }

        let mut attributes = Vec::new();
        for input in program.attributes() {
            let cell = watcher.resolve(&resolver, &input.name, pass.attribute_bindings())?;
            if !cell.is::<VertexAttribute>() {
                return Err(mismatch(&input.name, &cell, "VertexAttribute"));
            }
            attributes.push(AttributeSlot {
                location: input.location,
                cell,
            });
        }

        let mut states = Vec::with_capacity(RenderState::ALL.len());
        for state in RenderState::ALL {
            let cell = watcher.resolve(&resolver, state.name(), pass.state_bindings())?;
            if !state.accepts(&cell) {
                return Err(mismatch(&Name::new(state.name()), &cell, state.type_name()));
            }
            states.push(cell);
        }

        let indices = watcher.resolve_target(&resolver, GEOMETRY_INDICES)?;
        if !indices.is::<IndexBuffer>() {
            return Err(mismatch(&Name::new("indices"), &indices, "IndexBuffer"));
        }

        Ok(Resolved {
            program,
            uniforms,
            samplers,
            attributes,
            states,
            indices,
        })
    }
}

fn mismatch(name: &Name, cell: &ValueCell, requested: &'static str) -> DrawError {
    let err = DataError::TypeMismatch {
        name: name.clone(),
        stored: cell.type_name(),
        requested,
    };
    err.into()
}

/// Subscribes a unit to the paths its bindings depend on.
struct Watcher<'a> {
    id: DrawUnitId,
    invalid: &'a InvalidSet,
    watches: &'a mut Vec<Slot>,
}

impl Watcher<'_> {
    fn resolve<B: AsRef<Binding>>(
        &mut self,
        resolver: &BindingResolver<'_>,
        input: &str,
        bindings: &BindingMap<B>,
    ) -> Result<ValueCell, DrawError> {
        match resolver.resolve(input, bindings) {
            Ok(resolved) => {
                self.watch_resolved(&resolved);
                Ok(resolved.cell)
            }
            Err(err) => {
                let (base, suffix) = split_array_suffix(input);
                if let Some(binding) = bindings.get(base) {
                    let (store, path) = resolver.locate(binding.as_ref(), suffix);
                    self.on_added(store, &path);
                }
                log::warn!("{err}");
                Err(err)
            }
        }
    }

    fn resolve_target(
        &mut self,
        resolver: &BindingResolver<'_>,
        template: &str,
    ) -> Result<ValueCell, DrawError> {
        let target = resolver.store(Source::Target);
        let path = format_property_name(resolver.variables(), template).into_owned();
        match target.cell(&path) {
            Some(cell) => {
                self.watch_bound(target, &path, &cell);
                Ok(cell)
            }
            None => {
                self.on_added(target, &path);
                let err = DrawError::MissingValue {
                    pass: resolver.pass().clone(),
                    input: Name::new("indices"),
                    path,
                };
                log::warn!("{err}");
                Err(err)
            }
        }
    }

    fn watch_resolved(&mut self, resolved: &ResolvedInput) {
        match &resolved.source {
            ResolvedSource::Bound { store, path } => self.watch_bound(store, path, &resolved.cell),
            ResolvedSource::Default {
                pending: Some((store, path)),
            } => self.on_added(store, path),
            ResolvedSource::Default { pending: None } => {}
        }
    }

    fn watch_bound(&mut self, store: &AggregateStore, path: &str, cell: &ValueCell) {
        let (id, invalid) = (self.id, self.invalid.clone());
        self.watches
            .push(store.property_removed_at(path).connect(move |event: &PropertyEvent| {
                log::trace!("{id:?}: `{}` removed", event.name);
                invalid.mark(id);
            }));
        // Indexed paths may start resolving to another member when the
        // collection shifts; plain paths when an earlier provider gains the
        // property.
        let moved = match PropertyPath::parse(path) {
            Some(PropertyPath::Indexed { .. }) => store.property_changed_at(path),
            _ => store.property_added_at(path),
        };
        let (id, invalid) = (self.id, self.invalid.clone());
        let weak = store.downgrade();
        let cell = cell.clone();
        let owned = path.to_owned();
        self.watches.push(moved.connect(move |_: &PropertyEvent| {
            let Some(store) = weak.upgrade() else {
                return;
            };
            if !store.cell(&owned).is_some_and(|c| c.ptr_eq(&cell)) {
                log::trace!("{id:?}: `{owned}` now resolves elsewhere");
                invalid.mark(id);
            }
        }));
    }

    fn on_added(&mut self, store: &AggregateStore, path: &str) {
        let (id, invalid) = (self.id, self.invalid.clone());
        self.watches
            .push(store.property_added_at(path).connect(move |event: &PropertyEvent| {
                log::trace!("{id:?}: `{}` added", event.name);
                invalid.mark(id);
            }));
    }
}

impl fmt::Debug for DrawUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawUnit")
            .field("id", &self.id)
            .field("pass", self.pass.name())
            .field("state", &self.state)
            .field("program", &self.program().map(|p| p.id()))
            .field("watches", &self.watches.len())
            .finish_non_exhaustive()
    }
}
