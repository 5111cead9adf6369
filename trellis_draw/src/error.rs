// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type for binding, program selection and pool updates.

use trellis_data::{DataError, Name};

/// Errors reported while binding draw units and selecting programs.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum DrawError {
    /// A required input has neither a resolvable binding nor a default value.
    #[error("pass `{pass}`: no value for input `{input}` (looked up `{path}`)")]
    MissingValue {
        /// Name of the pass being bound.
        pass: Name,
        /// Program input or render state name.
        input: Name,
        /// The property path that was looked up.
        path: String,
    },
    /// A macro past the 64 slots of a signature is active.
    #[error("pass `{pass}`: macro `{name}` is active in slot {slot}, past the 64 a signature can hold")]
    TooManyMacros {
        /// Name of the pass.
        pass: Name,
        /// Name of the active macro.
        name: Name,
        /// Slot of the active macro.
        slot: usize,
    },
    /// The graphics context rejected the program.
    #[error("pass `{pass}`: program compilation failed: {message}")]
    ProgramCompile {
        /// Name of the pass.
        pass: Name,
        /// Message reported by the context.
        message: String,
    },
    /// A surface kept failing after the configured number of fallbacks.
    #[error("technique `{technique}` still failing after {attempts} fallback attempts")]
    FallbackExhausted {
        /// Technique in use when the budget ran out.
        technique: Name,
        /// Number of fallback attempts made.
        attempts: usize,
    },
    /// An effect has no technique with this name.
    #[error("unknown technique `{name}`")]
    UnknownTechnique {
        /// Name of the technique.
        name: Name,
    },
    /// A technique failed and names no fallback.
    #[error("technique `{technique}` failed and has no fallback")]
    NoFallback {
        /// Name of the technique.
        technique: Name,
    },
    /// A store operation failed, typically a value of the wrong type.
    #[error(transparent)]
    Data(#[from] DataError),
}

impl DrawError {
    /// Returns `true` for failures a fallback technique may recover from.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MissingValue { .. } | Self::ProgramCompile { .. } | Self::Data(_)
        )
    }
}
