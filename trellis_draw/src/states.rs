// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render states: the fixed-function settings a pass binds like uniforms.
//!
//! Each state is a property named by [`RenderState::name`] whose value has a
//! fixed type. Passes bind states through a [`BindingMap`](crate::BindingMap);
//! whatever is not bound or defaulted by the pass falls back to
//! [`default_states`].

use trellis_data::{PropertyStore, ValueCell};

use crate::context::TextureId;

/// Well-known priority values. Higher priorities draw first.
pub mod priority {
    /// Drawn before everything else.
    pub const FIRST: f32 = 4000.0;
    /// Backgrounds and sky boxes.
    pub const BACKGROUND: f32 = 3000.0;
    /// Opaque geometry. The default.
    pub const OPAQUE: f32 = 2000.0;
    /// Blended geometry.
    pub const TRANSPARENT: f32 = 1000.0;
    /// Drawn after everything else.
    pub const LAST: f32 = 0.0;
}

/// A blend equation factor.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[allow(missing_docs, reason = "factor names are self-describing")]
pub enum BlendFactor {
    Zero,
    #[default]
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturate,
}

bitflags::bitflags! {
    /// Colour channels written by a draw.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ColorMask: u8 {
        /// Red channel.
        const RED   = 0b0001;
        /// Green channel.
        const GREEN = 0b0010;
        /// Blue channel.
        const BLUE  = 0b0100;
        /// Alpha channel.
        const ALPHA = 0b1000;
    }
}

impl Default for ColorMask {
    fn default() -> Self {
        Self::all()
    }
}

/// A depth or stencil comparison.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[allow(missing_docs, reason = "comparison names are self-describing")]
pub enum CompareMode {
    Always,
    Equal,
    Greater,
    GreaterEqual,
    #[default]
    Less,
    LessEqual,
    Never,
    NotEqual,
}

/// Which triangle faces are culled.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TriangleCulling {
    /// Nothing is culled.
    None,
    /// Front faces are culled.
    Front,
    /// Back faces are culled.
    #[default]
    Back,
    /// Every face is culled.
    Both,
}

/// A scissor rectangle in pixels.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ScissorBox {
    /// Left edge.
    pub x: i32,
    /// Bottom edge.
    pub y: i32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

/// A viewport rectangle in pixels.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Viewport {
    /// Left edge.
    pub x: i32,
    /// Bottom edge.
    pub y: i32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl Viewport {
    /// Creates a viewport.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// The render states a draw unit binds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RenderState {
    /// `f32`, see [`priority`].
    Priority,
    /// `bool`: sort back to front by eye depth within equal priorities.
    ZSorted,
    /// [`BlendFactor`].
    BlendSource,
    /// [`BlendFactor`].
    BlendDestination,
    /// [`ColorMask`].
    ColorMask,
    /// `bool`.
    DepthMask,
    /// [`CompareMode`].
    DepthFunction,
    /// [`TriangleCulling`].
    TriangleCulling,
    /// `bool`.
    ScissorTest,
    /// [`ScissorBox`].
    ScissorBox,
    /// `Option<TextureId>`.
    Target,
}

impl RenderState {
    /// Every state, in the order draw units store them.
    pub const ALL: [Self; 11] = [
        Self::Priority,
        Self::ZSorted,
        Self::BlendSource,
        Self::BlendDestination,
        Self::ColorMask,
        Self::DepthMask,
        Self::DepthFunction,
        Self::TriangleCulling,
        Self::ScissorTest,
        Self::ScissorBox,
        Self::Target,
    ];

    /// Returns the property name of the state.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Priority => "priority",
            Self::ZSorted => "zSorted",
            Self::BlendSource => "blendSource",
            Self::BlendDestination => "blendDestination",
            Self::ColorMask => "colorMask",
            Self::DepthMask => "depthMask",
            Self::DepthFunction => "depthFunction",
            Self::TriangleCulling => "triangleCulling",
            Self::ScissorTest => "scissorTest",
            Self::ScissorBox => "scissorBox",
            Self::Target => "target",
        }
    }

    /// Returns the name of the value type, for diagnostics.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Priority => "f32",
            Self::ZSorted | Self::DepthMask | Self::ScissorTest => "bool",
            Self::BlendSource | Self::BlendDestination => "BlendFactor",
            Self::ColorMask => "ColorMask",
            Self::DepthFunction => "CompareMode",
            Self::TriangleCulling => "TriangleCulling",
            Self::ScissorBox => "ScissorBox",
            Self::Target => "Option<TextureId>",
        }
    }

    /// Returns the index of the state in [`ALL`](Self::ALL).
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns `true` if `cell` holds a value of this state's type.
    #[must_use]
    pub fn accepts(self, cell: &ValueCell) -> bool {
        match self {
            Self::Priority => cell.is::<f32>(),
            Self::ZSorted | Self::DepthMask | Self::ScissorTest => cell.is::<bool>(),
            Self::BlendSource | Self::BlendDestination => cell.is::<BlendFactor>(),
            Self::ColorMask => cell.is::<ColorMask>(),
            Self::DepthFunction => cell.is::<CompareMode>(),
            Self::TriangleCulling => cell.is::<TriangleCulling>(),
            Self::ScissorBox => cell.is::<ScissorBox>(),
            Self::Target => cell.is::<Option<TextureId>>(),
        }
    }
}

/// Returns a new store holding the built-in default of every render state.
#[must_use]
pub fn default_states() -> PropertyStore {
    let store = PropertyStore::new();
    // Fresh store and one value per name: these cannot mismatch.
    let _ = store.set(RenderState::Priority.name(), priority::OPAQUE);
    let _ = store.set(RenderState::ZSorted.name(), false);
    let _ = store.set(RenderState::BlendSource.name(), BlendFactor::One);
    let _ = store.set(RenderState::BlendDestination.name(), BlendFactor::Zero);
    let _ = store.set(RenderState::ColorMask.name(), ColorMask::all());
    let _ = store.set(RenderState::DepthMask.name(), true);
    let _ = store.set(RenderState::DepthFunction.name(), CompareMode::Less);
    let _ = store.set(RenderState::TriangleCulling.name(), TriangleCulling::Back);
    let _ = store.set(RenderState::ScissorTest.name(), false);
    let _ = store.set(RenderState::ScissorBox.name(), ScissorBox::default());
    let _ = store.set(RenderState::Target.name(), None::<TextureId>);
    store
}
