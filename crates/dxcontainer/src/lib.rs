//! Serializer and validator for DXIL-style shader IR containers (`DXBC`).
//!
//! A container is a digest-carrying header, an offset table, and a sequence
//! of typed parts (signatures, pipeline state validation, runtime reflection,
//! the program bitcode itself). This crate covers both directions:
//!
//! - [`write_container`] serializes an in-memory [`ShaderModule`] into a
//!   complete container at a negotiated [`FormatVersion`].
//! - [`validate_container`] parses an **untrusted** container without
//!   panicking or reading out of bounds, checks its structure against the
//!   module's profile, and cross-validates every part's content against the
//!   values the writers would produce, reporting one [`Diagnostic`] per
//!   divergence.
//!
//! Structural failures (bad offsets, truncated parts, profile-illegal part
//! codes) are [`ContainerError`]s and abort a run; content mismatches never
//! do.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod container;
mod crossval;
mod diag;
mod error;
mod fourcc;
mod module;
mod reader;
mod sigelem;
mod tables;
mod validate;

/// One writer per container part kind, plus the matching untrusted-input
/// parsers.
pub mod parts;

/// Synthetic module fixtures and raw-container helpers.
///
/// Only available when compiling this crate's own tests, or when the
/// `test-utils` feature is enabled. Not part of the stable API.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::container::{
    compute_container_digest, write_container, ContainerBuilder, ContainerFile, ContainerPart,
    CONTAINER_HEADER_SIZE, CONTAINER_MAGIC, PART_HEADER_SIZE,
};
pub use crate::crossval::{validate_container, ValidateOptions, ValidationOutcome};
pub use crate::diag::{Diagnostic, DiagnosticsSink};
pub use crate::error::ContainerError;
pub use crate::fourcc::{
    FourCC, PART_DEBUG_NAME, PART_FEATURE_INFO, PART_INPUT_SIGNATURE, PART_OUTPUT_SIGNATURE,
    PART_PATCH_CONSTANT_SIGNATURE, PART_PRIVATE_DATA, PART_PROGRAM, PART_PSV,
    PART_ROOT_SIGNATURE, PART_RUNTIME_DATA, PART_SHADER_HASH, PART_VERSION_INFO,
};
pub use crate::module::{
    CompilerVersion, ComponentType, DependencyTable, FeatureFlags, FormatVersion, FunctionReach,
    InterpolationMode, MinPrecision, ResourceBinding, ResourceClass, ResourceKind, SemanticKind,
    ShaderModule, ShaderStage, SignatureElement, StageInfo, TessellatorDomain, ValueGraph,
    ValueKind, ValueNode, ViewIdState, DEDUP_VERSION, HIGHEST_RELEASED_VERSION, PREVIEW_DIGEST,
    PSV_VERSION_1, PSV_VERSION_2, UNALLOCATED_ROW,
};
pub use crate::reader::ByteReader;
pub use crate::sigelem::{
    decode_psv_element, DecodedPsvElement, ProgramElementRecord, PsvElementRecord,
    UNALLOCATED_REGISTER,
};
pub use crate::validate::validate_structure;
