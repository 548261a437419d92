//! One writer per container part kind.
//!
//! Every writer computes a deterministic byte size up front and later streams
//! exactly that many bytes. All failure detection happens at construction;
//! `write` is infallible by contract, and the assembler asserts the
//! size/write equality after the fact.

mod features;
mod hash;
mod program;
pub mod psv;
pub mod rdat;
pub mod signature;
mod versioninfo;

pub use features::FeatureInfoWriter;
pub use hash::{ShaderHashWriter, HASH_PART_SIZE};
pub use program::{parse_program_header, ProgramHeader, ProgramWriter};
pub use psv::{PsvPart, PsvWriter};
pub use rdat::{RdatPart, RdatWriter};
pub use signature::{parse_signature_part, SignaturePartWriter};
pub use versioninfo::{parse_version_info_part, VersionInfoPart, VersionInfoWriter};

use crate::fourcc::FourCC;

/// Contract shared by all part writers.
///
/// `size` is pure: it performs no I/O and depends only on state computed at
/// construction. `write` must append exactly `size()` bytes; the container
/// assembler treats any divergence as a fatal internal-consistency error.
pub trait PartWriter {
    /// The part code this writer emits.
    fn fourcc(&self) -> FourCC;

    /// Exact number of content bytes `write` will append.
    fn size(&self) -> u32;

    /// Streams the part content. Infallible: anything that can fail was
    /// checked when the writer was constructed.
    fn write(&self, out: &mut Vec<u8>);
}

/// Passthrough writer for opaque parts (root signature, private data, debug
/// name bytes already laid out by the caller).
pub struct RawPartWriter {
    fourcc: FourCC,
    bytes: Vec<u8>,
}

impl RawPartWriter {
    /// Wraps pre-laid-out part content.
    pub fn new(fourcc: FourCC, bytes: Vec<u8>) -> Self {
        Self { fourcc, bytes }
    }
}

impl PartWriter for RawPartWriter {
    fn fourcc(&self) -> FourCC {
        self.fourcc
    }

    fn size(&self) -> u32 {
        self.bytes.len() as u32
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.bytes);
    }
}

/// Writer for the `ILDN` debug name part: `{flags:u16, name_size:u16}` plus
/// the NUL-terminated name, padded to a 4-byte boundary.
pub struct DebugNameWriter {
    name: String,
    flags: u16,
}

impl DebugNameWriter {
    /// Creates a writer for `name` with the given flags word.
    pub fn new(name: &str, flags: u16) -> Self {
        Self {
            name: name.to_owned(),
            flags,
        }
    }

    fn padded_name_size(&self) -> u32 {
        let raw = self.name.len() as u32 + 1;
        (raw + 3) & !3
    }
}

impl PartWriter for DebugNameWriter {
    fn fourcc(&self) -> FourCC {
        crate::fourcc::PART_DEBUG_NAME
    }

    fn size(&self) -> u32 {
        4 + self.padded_name_size()
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&(self.padded_name_size() as u16).to_le_bytes());
        out.extend_from_slice(self.name.as_bytes());
        let written = self.name.len() as u32;
        for _ in written..self.padded_name_size() {
            out.push(0);
        }
    }
}
