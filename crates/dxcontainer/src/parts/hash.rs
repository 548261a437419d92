use crate::fourcc::{FourCC, PART_SHADER_HASH};
use crate::module::ShaderModule;
use crate::parts::PartWriter;

/// Byte size of the `HASH` part: a flags word plus the 16-byte digest.
pub const HASH_PART_SIZE: u32 = 20;

/// Flag bit: the digest covers source-dependent inputs, not just the target
/// program bytes.
pub const HASH_FLAG_SOURCE_DEPENDENT: u32 = 1;

/// Writer for the `HASH` part.
///
/// When no digest is forced externally, the digest is computed
/// deterministically from the program bytes rather than from anything
/// time-dependent, so repeated serializations of the same module are
/// byte-identical.
pub struct ShaderHashWriter {
    flags: u32,
    digest: [u8; 16],
}

impl ShaderHashWriter {
    /// Computes the digest from the module's program bytes.
    pub fn new(module: &ShaderModule, source_dependent: bool) -> Self {
        let digest = md5::compute(&module.bitcode).0;
        Self {
            flags: if source_dependent {
                HASH_FLAG_SOURCE_DEPENDENT
            } else {
                0
            },
            digest,
        }
    }

    /// Uses an externally forced digest.
    pub fn with_digest(digest: [u8; 16], flags: u32) -> Self {
        Self { flags, digest }
    }

    /// The digest that will be serialized.
    pub fn digest(&self) -> &[u8; 16] {
        &self.digest
    }
}

impl PartWriter for ShaderHashWriter {
    fn fourcc(&self) -> FourCC {
        PART_SHADER_HASH
    }

    fn size(&self) -> u32 {
        HASH_PART_SIZE
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.digest);
    }
}
