use crate::fourcc::FourCC;
use thiserror::Error;

/// A structural error raised while assembling or validating a container.
///
/// Structural errors are fatal to the current run: once the container's
/// declared offsets, sizes or counts are inconsistent, further interpretation
/// would be unsafe. Content mismatches are *not* errors; they are collected
/// as [`crate::diag::Diagnostic`]s and never abort a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    /// The fixed container header is truncated or has bad magic/size fields.
    #[error("malformed container header: {0}")]
    MalformedHeader(String),

    /// The part offset table is inconsistent with the declared total size.
    #[error("malformed part offset table: {0}")]
    MalformedOffsets(String),

    /// A part's payload is not well-formed (truncated, misaligned, or a
    /// count would read past the declared part size).
    #[error("{part} part is not well-formed: {reason}")]
    NotWellFormed {
        /// The part whose payload failed validation.
        part: FourCC,
        /// Which sub-structure failed and why.
        reason: String,
    },

    /// A part kind appeared more than once in one container.
    #[error("duplicate {part} part")]
    DuplicatePart {
        /// The repeated part code.
        part: FourCC,
    },

    /// A part kind is not legal for the container's profile.
    #[error("{part} part is not allowed in {profile} profile")]
    PartNotAllowed {
        /// The offending part code.
        part: FourCC,
        /// The profile name (e.g. `"library"`, `"pixel"`).
        profile: &'static str,
    },

    /// The module is missing state a writer requires (detected at
    /// construction/size time, never at write time).
    #[error("cannot build {part} part: {reason}")]
    MissingModuleState {
        /// The part that could not be built.
        part: FourCC,
        /// What was missing.
        reason: String,
    },

    /// A semantic kind has no binary encoding for the module's configuration
    /// (e.g. inside-tessellation-factor on an isoline domain).
    #[error("signature element {semantic:?} has no encoding: {reason}")]
    UnencodableSemantic {
        /// The offending semantic name.
        semantic: String,
        /// Why it cannot be encoded.
        reason: String,
    },
}

impl ContainerError {
    pub(crate) fn not_well_formed(part: FourCC, reason: impl Into<String>) -> Self {
        Self::NotWellFormed {
            part,
            reason: reason.into(),
        }
    }
}
