// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The graphics-context boundary: resource handles, program descriptions and
//! the state/draw operations a draw unit emits.
//!
//! Concrete GPU backends implement [`ResourceContext`] and [`GraphicsContext`].
//! Draw units only talk to a backend through these two traits; everything they
//! push is a small `Copy` value so rendering never allocates.

use glam::{IVec2, IVec3, IVec4, Mat4, Vec2, Vec3, Vec4};
use trellis_data::{Name, ValueCell};

use crate::signature::MacroDefine;
use crate::states::{BlendFactor, ColorMask, CompareMode, ScissorBox, TriangleCulling, Viewport};

/// Identifier for a compiled program.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// Identifier for a texture, usable as a sampler value or render target.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Identifier for a vertex or index buffer.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// The declared type of a uniform input.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UniformKind {
    /// `f32`.
    Float,
    /// [`Vec2`] or `[f32; 2]`.
    Float2,
    /// [`Vec3`] or `[f32; 3]`.
    Float3,
    /// [`Vec4`] or `[f32; 4]`.
    Float4,
    /// [`Mat4`].
    Mat4,
    /// `i32`.
    Int,
    /// [`IVec2`].
    Int2,
    /// [`IVec3`].
    Int3,
    /// [`IVec4`].
    Int4,
    /// `bool`.
    Bool,
    /// A [`TextureId`] bound to a texture unit.
    Sampler2d,
}

impl UniformKind {
    /// Returns the name of the primary value type, for diagnostics.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Float => "f32",
            Self::Float2 => "Vec2",
            Self::Float3 => "Vec3",
            Self::Float4 => "Vec4",
            Self::Mat4 => "Mat4",
            Self::Int => "i32",
            Self::Int2 => "IVec2",
            Self::Int3 => "IVec3",
            Self::Int4 => "IVec4",
            Self::Bool => "bool",
            Self::Sampler2d => "TextureId",
        }
    }

    /// Returns `true` if `cell` holds a value of a type this kind accepts.
    #[must_use]
    pub fn accepts(self, cell: &ValueCell) -> bool {
        match self {
            Self::Sampler2d => cell.is::<TextureId>(),
            _ => self.read(cell).is_some(),
        }
    }

    /// Reads the value of `cell` as this kind.
    ///
    /// Returns `None` for [`Sampler2d`](Self::Sampler2d) and for values of a
    /// type this kind does not accept.
    #[must_use]
    pub fn read(self, cell: &ValueCell) -> Option<UniformValue> {
        match self {
            Self::Float => cell.get::<f32>().map(UniformValue::Float),
            Self::Float2 => cell
                .get::<Vec2>()
                .or_else(|| cell.get::<[f32; 2]>().map(Vec2::from))
                .map(UniformValue::Float2),
            Self::Float3 => cell
                .get::<Vec3>()
                .or_else(|| cell.get::<[f32; 3]>().map(Vec3::from))
                .map(UniformValue::Float3),
            Self::Float4 => cell
                .get::<Vec4>()
                .or_else(|| cell.get::<[f32; 4]>().map(Vec4::from))
                .map(UniformValue::Float4),
            Self::Mat4 => cell.get::<Mat4>().map(UniformValue::Mat4),
            Self::Int => cell.get::<i32>().map(UniformValue::Int),
            Self::Int2 => cell.get::<IVec2>().map(UniformValue::Int2),
            Self::Int3 => cell.get::<IVec3>().map(UniformValue::Int3),
            Self::Int4 => cell.get::<IVec4>().map(UniformValue::Int4),
            Self::Bool => cell.get::<bool>().map(UniformValue::Bool),
            Self::Sampler2d => None,
        }
    }
}

/// A uniform value as pushed to the context.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UniformValue {
    /// See [`UniformKind::Float`].
    Float(f32),
    /// See [`UniformKind::Float2`].
    Float2(Vec2),
    /// See [`UniformKind::Float3`].
    Float3(Vec3),
    /// See [`UniformKind::Float4`].
    Float4(Vec4),
    /// See [`UniformKind::Mat4`].
    Mat4(Mat4),
    /// See [`UniformKind::Int`].
    Int(i32),
    /// See [`UniformKind::Int2`].
    Int2(IVec2),
    /// See [`UniformKind::Int3`].
    Int3(IVec3),
    /// See [`UniformKind::Int4`].
    Int4(IVec4),
    /// See [`UniformKind::Bool`].
    Bool(bool),
}

/// A vertex attribute stream, stored as a property value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Buffer holding the vertex data.
    pub buffer: BufferId,
    /// Number of components per vertex.
    pub size: u32,
    /// Distance between consecutive vertices, in components.
    pub stride: u32,
    /// Offset of the first component, in components.
    pub offset: u32,
}

/// A range of an index buffer, stored as a property value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IndexBuffer {
    /// Buffer holding the indices.
    pub buffer: BufferId,
    /// First index to draw.
    pub first: u32,
    /// Number of indices to draw.
    pub count: u32,
}

/// Everything a backend needs to compile one program variant.
#[derive(Clone, Debug)]
pub struct ProgramDesc {
    /// Name of the pass the program belongs to.
    pub name: Name,
    /// Vertex shader source.
    pub vertex_source: String,
    /// Fragment shader source.
    pub fragment_source: String,
    /// Active macros, in slot order.
    pub defines: Vec<MacroDefine>,
    /// Declared uniform inputs.
    pub uniforms: Vec<(Name, UniformKind)>,
    /// Declared attribute inputs.
    pub attributes: Vec<Name>,
}

/// A uniform the compiled program actually uses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniformInput {
    /// Input name.
    pub name: Name,
    /// Backend location.
    pub location: u32,
    /// Declared type.
    pub kind: UniformKind,
}

/// An attribute the compiled program actually uses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeInput {
    /// Input name.
    pub name: Name,
    /// Backend location.
    pub location: u32,
}

/// A program as reported by the backend after compilation.
///
/// Backends may drop inputs the compiler optimised away; draw units only bind
/// the inputs listed here.
#[derive(Clone, Debug)]
pub struct CompiledProgram {
    /// Program handle.
    pub id: ProgramId,
    /// Active uniforms.
    pub uniforms: Vec<UniformInput>,
    /// Active attributes.
    pub attributes: Vec<AttributeInput>,
}

/// Operations that change pipeline state.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum StateOp {
    /// Make a program current.
    UseProgram(ProgramId),
    /// Set a uniform of the current program.
    Uniform {
        /// Uniform location.
        location: u32,
        /// Value.
        value: UniformValue,
    },
    /// Bind a texture to a unit and point a sampler at it.
    Texture {
        /// Texture unit.
        unit: u32,
        /// Sampler uniform location.
        location: u32,
        /// Texture.
        texture: TextureId,
    },
    /// Bind a vertex attribute stream.
    VertexAttribute {
        /// Attribute location.
        location: u32,
        /// Stream description.
        attribute: VertexAttribute,
    },
    /// Set the blend equation factors.
    Blending {
        /// Source factor.
        source: BlendFactor,
        /// Destination factor.
        destination: BlendFactor,
    },
    /// Set the colour write mask.
    ColorMask(ColorMask),
    /// Set depth write and test.
    Depth {
        /// Whether depth is written.
        mask: bool,
        /// Depth comparison.
        function: CompareMode,
    },
    /// Set face culling.
    TriangleCulling(TriangleCulling),
    /// Enable the scissor test with a box, or disable it.
    Scissor(Option<ScissorBox>),
    /// Render to a texture, or to the back buffer.
    RenderTarget(Option<TextureId>),
    /// Set the viewport.
    Viewport(Viewport),
}

/// Operations that produce pixels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DrawOp {
    /// Clear the current target to a packed `0xRRGGBBAA` colour.
    Clear {
        /// Packed colour.
        color: u32,
    },
    /// Draw indexed triangles.
    Triangles(IndexBuffer),
}

/// Creation and destruction of programs.
pub trait ResourceContext {
    /// Compiles a program variant.
    ///
    /// # Errors
    ///
    /// Returns the compiler log when compilation or linking fails.
    fn create_program(&mut self, desc: &ProgramDesc) -> Result<CompiledProgram, String>;

    /// Releases a program.
    fn destroy_program(&mut self, id: ProgramId);
}

/// A context draw units render through.
pub trait GraphicsContext: ResourceContext {
    /// Applies a state operation.
    fn state(&mut self, op: StateOp);

    /// Applies a draw operation.
    fn draw(&mut self, op: DrawOp);
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_data::PropertyStore;

    #[test]
    fn arrays_are_accepted_as_vectors() {
        let store = PropertyStore::new();
        store.set("color", [1.0_f32, 0.5, 0.25, 1.0]).unwrap();
        let cell = store.cell("color").unwrap();
        assert_eq!(
            UniformKind::Float4.read(&cell),
            Some(UniformValue::Float4(Vec4::new(1.0, 0.5, 0.25, 1.0)))
        );
        assert!(!UniformKind::Float3.accepts(&cell));
    }

    #[test]
    fn samplers_need_texture_ids() {
        let store = PropertyStore::new();
        store.set("map", TextureId(3)).unwrap();
        store.set("count", 3_i32).unwrap();
        assert!(UniformKind::Sampler2d.accepts(&store.cell("map").unwrap()));
        assert!(!UniformKind::Sampler2d.accepts(&store.cell("count").unwrap()));
        assert_eq!(UniformKind::Sampler2d.read(&store.cell("map").unwrap()), None);
    }
}
