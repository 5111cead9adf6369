// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Program signatures: fingerprints of the active macros of a pass.

use std::any::type_name;
use std::fmt;
use std::hash::{Hash, Hasher};

use smallvec::SmallVec;
use trellis_data::{DataError, Name, PropertyStore, ValueCell};

use crate::binding::{MacroBinding, MacroKind};
use crate::error::DrawError;
use crate::resolver::BindingResolver;

/// Maximum number of macro slots in a signature.
pub const MAX_MACROS: usize = 64;

/// The snapshot value of a typed macro.
#[derive(Copy, Clone, Debug)]
pub enum MacroValue {
    /// A boolean macro.
    Bool(bool),
    /// An integer macro, already clamped.
    Int(i32),
    /// A float macro.
    Float(f32),
}

impl MacroValue {
    /// Formats the value as a preprocessor definition.
    #[must_use]
    pub fn to_define(self) -> String {
        match self {
            Self::Bool(b) => String::from(if b { "1" } else { "0" }),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => format!("{f:?}"),
        }
    }
}

impl PartialEq for MacroValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for MacroValue {}

impl Hash for MacroValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Float(f) => f.to_bits().hash(state),
        }
    }
}

/// One active macro, as passed to program compilation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroDefine {
    /// Macro name.
    pub name: Name,
    /// Value, or `None` for presence-only macros.
    pub value: Option<MacroValue>,
}

/// A fingerprint of the macros active for one draw unit.
///
/// Macros are assigned bit slots in ascending name order. A macro is active
/// when its property resolves in the bound store or the pass declares a
/// default for it. Two signatures are equal iff their masks and typed values
/// are equal; the pass keeps at most one compiled program per signature.
#[derive(Clone)]
pub struct ProgramSignature {
    mask: u64,
    values: SmallVec<[MacroValue; 8]>,
    defines: Vec<MacroDefine>,
}

impl ProgramSignature {
    /// Computes the signature of `macros` (sorted by name) for one draw unit.
    ///
    /// # Errors
    ///
    /// Returns [`DrawError::TooManyMacros`] if a macro in slot 64 or beyond is
    /// active, and [`DrawError::Data`] if a typed macro resolves to a value of
    /// an unsupported type.
    pub fn new(
        macros: &[(Name, MacroBinding)],
        defaults: &PropertyStore,
        resolver: &BindingResolver<'_>,
    ) -> Result<Self, DrawError> {
        let mut signature = Self {
            mask: 0,
            values: SmallVec::new(),
            defines: Vec::new(),
        };
        for (slot, (name, binding)) in macros.iter().enumerate() {
            let (store, path) = resolver.locate(binding.binding(), "");
            let Some(cell) = store.cell(&path).or_else(|| defaults.cell(name)) else {
                continue;
            };
            if slot >= MAX_MACROS {
                return Err(DrawError::TooManyMacros {
                    pass: resolver.pass().clone(),
                    name: name.clone(),
                    slot,
                });
            }
            signature.mask |= 1 << slot;
            let value = snapshot(name, binding, &cell)?;
            if let Some(value) = value {
                signature.values.push(value);
            }
            signature.defines.push(MacroDefine {
                name: name.clone(),
                value,
            });
        }
        Ok(signature)
    }

    /// Returns the bit mask of active macro slots.
    #[must_use]
    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// Returns the typed values in slot order.
    #[must_use]
    pub fn values(&self) -> &[MacroValue] {
        &self.values
    }

    /// Returns the active macros in slot order.
    #[must_use]
    pub fn defines(&self) -> &[MacroDefine] {
        &self.defines
    }
}

fn snapshot(
    name: &Name,
    binding: &MacroBinding,
    cell: &ValueCell,
) -> Result<Option<MacroValue>, DrawError> {
    let mismatch = |requested: &'static str| DataError::TypeMismatch {
        name: name.clone(),
        stored: cell.type_name(),
        requested,
    };
    let value = match binding.kind() {
        MacroKind::Unset => return Ok(None),
        MacroKind::Bool => cell
            .get::<bool>()
            .or_else(|| cell.get::<i32>().map(|i| i != 0))
            .or_else(|| cell.get::<u32>().map(|u| u != 0))
            .map(MacroValue::Bool)
            .ok_or_else(|| mismatch(type_name::<bool>()))?,
        MacroKind::Int => {
            let wide = cell
                .get::<i32>()
                .map(i64::from)
                .or_else(|| cell.get::<u32>().map(i64::from))
                .or_else(|| cell.get::<bool>().map(i64::from))
                .ok_or_else(|| mismatch(type_name::<i32>()))?;
            let clamped = wide.clamp(i64::from(binding.min()), i64::from(binding.max()));
            // In range after clamping to two i32 bounds.
            MacroValue::Int(i32::try_from(clamped).unwrap_or(binding.max()))
        }
        MacroKind::Float => cell
            .get::<f32>()
            .map(MacroValue::Float)
            .ok_or_else(|| mismatch(type_name::<f32>()))?,
    };
    Ok(Some(value))
}

impl PartialEq for ProgramSignature {
    fn eq(&self, other: &Self) -> bool {
        self.mask == other.mask && self.values == other.values
    }
}

impl Eq for ProgramSignature {}

impl Hash for ProgramSignature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mask.hash(state);
        self.values.hash(state);
    }
}

impl fmt::Debug for ProgramSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramSignature")
            .field("mask", &format_args!("{:#x}", self.mask))
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}
