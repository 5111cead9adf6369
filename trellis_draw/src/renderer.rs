// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A render pass over one pool of surfaces.

use std::fmt;

use trellis_data::{AggregateStore, Name, PropertyStore, Signal};

use crate::config::RendererConfig;
use crate::context::{DrawOp, GraphicsContext, StateOp};
use crate::pool::{DrawUnitPool, Surface, SurfaceId, UpdateStats};

/// Renders the surfaces registered with it into a target.
///
/// The renderer owns the renderer-level data every draw unit can bind to
/// (camera matrices, light lists) and a [`DrawUnitPool`].
///
/// ```
/// use std::rc::Rc;
/// use trellis_data::AggregateStore;
/// use trellis_draw::{
///     Effect, Pass, RecordingContext, Renderer, RendererConfig, Surface, Technique,
/// };
///
/// let pass = Pass::builder("flat").build().unwrap();
/// let effect = Rc::new(Effect::new("flat").with_technique(Technique::new("default", [Rc::new(pass)])));
///
/// let mut renderer = Renderer::new(RendererConfig::new("main"), AggregateStore::new());
/// renderer.add_surface(Surface::new(AggregateStore::new(), effect));
///
/// let mut context = RecordingContext::new();
/// let stats = renderer.render(&mut context);
/// assert_eq!(stats.admitted, 1);
/// ```
pub struct Renderer {
    config: RendererConfig,
    data: AggregateStore,
    properties: PropertyStore,
    root: AggregateStore,
    pool: DrawUnitPool,
    enabled: bool,
    rendering_begin: Signal<Name>,
    rendering_end: Signal<Name>,
}

impl Renderer {
    /// Creates a renderer drawing with `root` as the scene-wide data.
    #[must_use]
    pub fn new(config: RendererConfig, root: AggregateStore) -> Self {
        let data = AggregateStore::new();
        let properties = PropertyStore::new();
        data.add_provider(properties.clone());
        let pool = DrawUnitPool::new(data.clone(), root.clone(), config.pool);
        Self {
            config,
            data,
            properties,
            root,
            pool,
            enabled: true,
            rendering_begin: Signal::new(),
            rendering_end: Signal::new(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Returns the configuration for changes that apply from the next frame.
    ///
    /// The pool configuration is fixed at construction.
    pub fn config_mut(&mut self) -> &mut RendererConfig {
        &mut self.config
    }

    /// Returns the name.
    #[must_use]
    pub fn name(&self) -> &Name {
        &self.config.name
    }

    /// Returns the priority; renderers with a higher priority render first.
    #[must_use]
    pub fn priority(&self) -> f32 {
        self.config.priority
    }

    /// Returns the data draw units bind to with `Source::Renderer`.
    #[must_use]
    pub fn data(&self) -> &AggregateStore {
        &self.data
    }

    /// Returns the renderer's own properties, a provider of [`data`](Self::data).
    #[must_use]
    pub fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    /// Returns the scene-wide data.
    #[must_use]
    pub fn root(&self) -> &AggregateStore {
        &self.root
    }

    /// Returns the pool.
    #[must_use]
    pub fn pool(&self) -> &DrawUnitPool {
        &self.pool
    }

    /// Returns the pool mutably.
    pub fn pool_mut(&mut self) -> &mut DrawUnitPool {
        &mut self.pool
    }

    /// Returns `true` if the renderer draws when asked to.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enables or disables the renderer.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Signal raised with the renderer name before each frame, before the
    /// pool is updated.
    #[must_use]
    pub fn rendering_begin(&self) -> &Signal<Name> {
        &self.rendering_begin
    }

    /// Signal raised with the renderer name after each frame.
    #[must_use]
    pub fn rendering_end(&self) -> &Signal<Name> {
        &self.rendering_end
    }

    /// Queues a surface for admission on the next frame.
    pub fn add_surface(&mut self, surface: Surface) -> SurfaceId {
        self.pool.add_surface(surface)
    }

    /// Queues a surface for removal on the next frame.
    pub fn remove_surface(&mut self, id: SurfaceId) -> bool {
        self.pool.remove_surface(id)
    }

    /// Renders one frame: updates the pool, sets up the target and viewport,
    /// clears and draws every bound unit in order.
    ///
    /// Returns the work done by the pool update. A disabled renderer does
    /// nothing.
    pub fn render<C: GraphicsContext + ?Sized>(&mut self, context: &mut C) -> UpdateStats {
        if !self.enabled {
            return UpdateStats::default();
        }
        self.rendering_begin.emit(&self.config.name);

        let stats = self.pool.update(context);
        let target = self.config.render_target;
        context.state(StateOp::RenderTarget(target));
        context.state(StateOp::Viewport(self.config.viewport));
        context.draw(DrawOp::Clear {
            color: self.config.clear_color,
        });
        self.pool.render(context, target);

        log::trace!("renderer `{}`: frame done", self.config.name);
        self.rendering_end.emit(&self.config.name);
        stats
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.config)
            .field("enabled", &self.enabled)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::{Mat4, Vec4};
    use trellis_data::EffectVariables;

    use crate::binding::{Binding, BindingMap};
    use crate::context::{BufferId, IndexBuffer, TextureId, UniformKind, UniformValue};
    use crate::effect::{Effect, Technique};
    use crate::pass::Pass;
    use crate::recording::{Event, RecordingContext};
    use crate::states::Viewport;
    use crate::zsort::WORLD_TO_SCREEN;

    fn lit_effect() -> Rc<Effect> {
        let pass = Pass::builder("lit")
            .uniform("diffuseColor", UniformKind::Float4)
            .uniform("worldToScreenMatrix", UniformKind::Mat4)
            .uniform_bindings(
                BindingMap::new()
                    .with_binding("diffuseColor", Binding::target("diffuseColor"))
                    .with_binding("worldToScreenMatrix", Binding::renderer(WORLD_TO_SCREEN)),
            )
            .build()
            .unwrap();
        Rc::new(Effect::new("lit").with_technique(Technique::new("default", [Rc::new(pass)])))
    }

    fn surface(effect: Rc<Effect>) -> (Surface, PropertyStore) {
        let geometry = PropertyStore::new();
        geometry
            .set(
                "indices",
                IndexBuffer {
                    buffer: BufferId(1),
                    first: 0,
                    count: 6,
                },
            )
            .unwrap();
        let material = PropertyStore::new();
        material.set("diffuseColor", Vec4::ONE).unwrap();
        let target = AggregateStore::new();
        target.add_provider_to(geometry.clone(), "geometry");
        target.add_provider(material.clone());
        let variables =
            EffectVariables::new().with("geometryUuid", geometry.uuid().hyphenated().to_string());
        (Surface::new(target, effect).with_variables(variables), material)
    }

    #[test]
    fn frame_sets_up_target_and_draws() {
        let config = RendererConfig::new("main")
            .with_viewport(Viewport::new(0, 0, 640, 480))
            .with_clear_color(0x1122_33ff)
            .with_render_target(Some(TextureId(5)));
        let mut renderer = Renderer::new(config, AggregateStore::new());
        renderer
            .properties()
            .set(WORLD_TO_SCREEN, Mat4::IDENTITY)
            .unwrap();
        let (surface, _) = surface(lit_effect());
        renderer.add_surface(surface);

        let mut context = RecordingContext::new();
        let stats = renderer.render(&mut context);
        assert_eq!((stats.admitted, stats.rebound), (1, 1));

        let events = context.events();
        let target = events
            .iter()
            .position(|e| *e == Event::State(StateOp::RenderTarget(Some(TextureId(5)))))
            .unwrap();
        let clear = events
            .iter()
            .position(|e| *e == Event::Draw(DrawOp::Clear { color: 0x1122_33ff }))
            .unwrap();
        assert!(target < clear);
        assert_eq!(context.draws().count(), 2);
        // Units inherit the renderer's target and never switch away from it.
        assert_eq!(
            context
                .states()
                .filter(|op| matches!(op, StateOp::RenderTarget(_)))
                .count(),
            1
        );
    }

    #[test]
    fn values_are_read_at_render_time() {
        let mut renderer = Renderer::new(RendererConfig::new("main"), AggregateStore::new());
        renderer
            .properties()
            .set(WORLD_TO_SCREEN, Mat4::IDENTITY)
            .unwrap();
        let (surface, material) = surface(lit_effect());
        renderer.add_surface(surface);
        let mut context = RecordingContext::new();
        renderer.render(&mut context);

        material.set("diffuseColor", Vec4::new(1.0, 0.0, 0.0, 1.0)).unwrap();
        context.clear_events();
        let stats = renderer.render(&mut context);
        assert!(stats.is_idle());
        assert!(context.states().any(|op| matches!(
            op,
            StateOp::Uniform {
                value: UniformValue::Float4(v),
                ..
            } if *v == Vec4::new(1.0, 0.0, 0.0, 1.0)
        )));
    }

    #[test]
    fn renderer_data_changes_rebind() {
        let mut renderer = Renderer::new(RendererConfig::new("main"), AggregateStore::new());
        let (surface, _) = surface(lit_effect());
        let id = renderer.add_surface(surface);
        let mut context = RecordingContext::new();

        let stats = renderer.render(&mut context);
        assert_eq!(stats.failed, 1);
        let unit = renderer.pool().surface_units(id)[0];
        assert!(!renderer.pool().is_invalid(unit));

        renderer
            .properties()
            .set(WORLD_TO_SCREEN, Mat4::IDENTITY)
            .unwrap();
        assert!(renderer.pool().is_invalid(unit));
        let stats = renderer.render(&mut context);
        assert_eq!((stats.rebound, stats.failed), (1, 0));
    }

    #[test]
    fn signals_bracket_the_frame() {
        let mut renderer = Renderer::new(RendererConfig::new("main"), AggregateStore::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let begin_log = log.clone();
        let _begin = renderer
            .rendering_begin()
            .connect(move |name: &Name| begin_log.borrow_mut().push(format!("begin {name}")));
        let end_log = log.clone();
        let _end = renderer
            .rendering_end()
            .connect(move |name: &Name| end_log.borrow_mut().push(format!("end {name}")));

        let mut context = RecordingContext::new();
        renderer.render(&mut context);
        assert_eq!(*log.borrow(), ["begin main", "end main"]);

        renderer.set_enabled(false);
        context.clear_events();
        renderer.render(&mut context);
        assert_eq!(log.borrow().len(), 2);
        assert!(context.events().is_empty());
    }
}
