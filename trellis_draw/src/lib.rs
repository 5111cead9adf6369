// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trellis Draw: draw units bound to observable data.
//!
//! Effects declare what they need by name: uniform, attribute and render-state
//! inputs, plus macros that select a shader variant. This crate turns an
//! effect applied to some data into ready-to-issue draw calls and keeps them
//! correct as the data changes, without walking the scene every frame.
//!
//! - **Bindings** ([`Binding`], [`MacroBinding`], [`BindingMap`]): map an
//!   input name to a property path (with `${var}` placeholders) in one of
//!   three stores: the target surface, the renderer or the scene root. A
//!   binding map also carries default values.
//! - **Passes** ([`Pass`], [`Technique`], [`Effect`]): program sources,
//!   declared inputs and bindings. A pass caches one compiled [`Program`] per
//!   [`ProgramSignature`], the active macro mask and values.
//! - **Draw units** ([`DrawUnit`]): one pass applied to one surface. Binding
//!   resolves every input to a value cell once; rendering reads the cells
//!   directly.
//! - **Pools** ([`DrawUnitPool`]): own the units of a set of surfaces, rebind
//!   only the units whose dependencies changed and keep them in draw order.
//! - **Renderers** ([`Renderer`]): drive a pool for one target each frame.
//! - **Contexts** ([`ResourceContext`], [`GraphicsContext`]): the boundary to
//!   a GPU backend. [`RecordingContext`] records operations instead.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::rc::Rc;
//! use glam::Vec4;
//! use trellis_data::{AggregateStore, EffectVariables, PropertyStore};
//! use trellis_draw::{
//!     Binding, BindingMap, BufferId, DrawOp, Effect, IndexBuffer, Pass, RecordingContext,
//!     Renderer, RendererConfig, Surface, Technique, UniformKind,
//! };
//!
//! // An effect with one pass reading a colour from the surface.
//! let pass = Pass::builder("flat")
//!     .sources("/* vertex */", "/* fragment */")
//!     .uniform("color", UniformKind::Float4)
//!     .uniform_bindings(BindingMap::new().with_binding("color", Binding::target("diffuseColor")))
//!     .build()
//!     .unwrap();
//! let effect = Rc::new(Effect::new("flat").with_technique(Technique::new("default", [Rc::new(pass)])));
//!
//! // Surface data: geometry in a collection, material as a direct provider.
//! let geometry = PropertyStore::new();
//! geometry
//!     .set("indices", IndexBuffer { buffer: BufferId(0), first: 0, count: 3 })
//!     .unwrap();
//! let material = PropertyStore::new();
//! material.set("diffuseColor", Vec4::ONE).unwrap();
//! let target = AggregateStore::new();
//! target.add_provider_to(geometry.clone(), "geometry");
//! target.add_provider(material.clone());
//! let variables = EffectVariables::new()
//!     .with("geometryUuid", geometry.uuid().hyphenated().to_string());
//!
//! let mut renderer = Renderer::new(RendererConfig::new("main"), AggregateStore::new());
//! renderer.add_surface(Surface::new(target, effect).with_variables(variables));
//!
//! let mut context = RecordingContext::new();
//! let stats = renderer.render(&mut context);
//! assert_eq!(stats.rebound, 1);
//! assert!(context.draws().any(|op| matches!(op, DrawOp::Triangles(_))));
//!
//! // A value change is picked up without rebinding.
//! material.set("diffuseColor", Vec4::ZERO).unwrap();
//! assert!(renderer.render(&mut context).is_idle());
//! ```
//!
//! ## Invalidation
//!
//! A bound unit subscribes to the paths it resolved. It is marked for
//! rebinding when a bound property is removed, when an indexed path starts
//! resolving to a different collection member, when a property that was
//! missing or defaulted appears, and when a macro property is added, removed
//! or (for typed macros) changed. Value changes alone never rebind: the cached
//! cells already hold the new value.

mod binding;
mod config;
mod context;
mod draw_unit;
mod effect;
mod error;
mod invalid;
mod pass;
mod pool;
mod recording;
mod renderer;
mod resolver;
mod signature;
pub mod states;
mod zsort;

pub use binding::{Binding, BindingMap, MacroBinding, MacroBindingMap, MacroKind, Source};
pub use config::{PoolConfig, RendererConfig};
pub use context::{
    AttributeInput, BufferId, CompiledProgram, DrawOp, GraphicsContext, IndexBuffer, ProgramDesc,
    ProgramId, ResourceContext, StateOp, TextureId, UniformInput, UniformKind, UniformValue,
    VertexAttribute,
};
pub use draw_unit::{DrawUnit, DrawUnitId, DrawUnitState, GEOMETRY_INDICES};
pub use effect::{DEFAULT_TECHNIQUE, Effect, Technique};
pub use error::DrawError;
pub use invalid::InvalidSet;
pub use pass::{Pass, PassBuilder, Program};
pub use pool::{DrawUnitPool, Surface, SurfaceId, UpdateStats};
pub use recording::{Event, RecordingContext};
pub use renderer::Renderer;
pub use resolver::{BindingResolver, ResolvedInput, ResolvedSource, split_array_suffix};
pub use signature::{MAX_MACROS, MacroDefine, MacroValue, ProgramSignature};
pub use states::{
    BlendFactor, ColorMask, CompareMode, RenderState, ScissorBox, TriangleCulling, Viewport,
    default_states,
};
pub use zsort::{
    GEOMETRY_CENTER, MODEL_TO_WORLD, SortKey, WORLD_TO_SCREEN, ZSorter, draw_order,
};
