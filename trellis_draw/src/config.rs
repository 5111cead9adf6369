// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Configuration for pools and renderers.

use trellis_data::Name;

use crate::context::TextureId;
use crate::states::Viewport;

/// Configuration for a [`DrawUnitPool`](crate::DrawUnitPool).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// How many times a surface may fall back to another technique before
    /// the failure is reported as [`FallbackExhausted`](crate::DrawError::FallbackExhausted).
    pub max_fallback_attempts: usize,
    /// Whether [`update`](crate::DrawUnitPool::update) re-sorts the draw
    /// order when a sort was requested. When `false` the order only changes
    /// through [`DrawUnitPool::sort`](crate::DrawUnitPool::sort).
    pub sort_on_update: bool,
}

impl PoolConfig {
    /// The default configuration: 32 fallback attempts, sorting on update.
    pub const DEFAULT: Self = Self {
        max_fallback_attempts: 32,
        sort_on_update: true,
    };

    /// Sets [`max_fallback_attempts`](Self::max_fallback_attempts).
    #[must_use]
    pub const fn with_max_fallback_attempts(mut self, attempts: usize) -> Self {
        self.max_fallback_attempts = attempts;
        self
    }

    /// Sets [`sort_on_update`](Self::sort_on_update).
    #[must_use]
    pub const fn with_sort_on_update(mut self, sort: bool) -> Self {
        self.sort_on_update = sort;
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Configuration for a [`Renderer`](crate::Renderer).
#[derive(Clone, Debug, PartialEq)]
pub struct RendererConfig {
    /// Name, used in logs and the rendering signals.
    pub name: Name,
    /// Renderer priority; renderers with higher priority run first.
    pub priority: f32,
    /// Viewport set before drawing.
    pub viewport: Viewport,
    /// Packed `0xRRGGBBAA` clear colour.
    pub clear_color: u32,
    /// Texture to render into, or `None` for the back buffer.
    pub render_target: Option<TextureId>,
    /// Configuration of the renderer's pool.
    pub pool: PoolConfig,
}

impl RendererConfig {
    /// Creates a configuration with a black clear colour and an empty
    /// viewport.
    #[must_use]
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            priority: 0.0,
            viewport: Viewport::default(),
            clear_color: 0x0000_00ff,
            render_target: None,
            pool: PoolConfig::DEFAULT,
        }
    }

    /// Sets [`priority`](Self::priority).
    #[must_use]
    pub fn with_priority(mut self, priority: f32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets [`viewport`](Self::viewport).
    #[must_use]
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// Sets [`clear_color`](Self::clear_color).
    #[must_use]
    pub fn with_clear_color(mut self, color: u32) -> Self {
        self.clear_color = color;
        self
    }

    /// Sets [`render_target`](Self::render_target).
    #[must_use]
    pub fn with_render_target(mut self, target: Option<TextureId>) -> Self {
        self.render_target = target;
        self
    }

    /// Sets [`pool`](Self::pool).
    #[must_use]
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("renderer")
    }
}
