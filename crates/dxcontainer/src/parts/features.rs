use crate::fourcc::{FourCC, PART_FEATURE_INFO};
use crate::module::{FeatureFlags, ShaderModule};
use crate::parts::PartWriter;

/// Writer for the `SFI0` part: a single fixed-size feature bitmask computed
/// by scanning the module. No variable-length content.
pub struct FeatureInfoWriter {
    flags: FeatureFlags,
}

impl FeatureInfoWriter {
    /// Computes the effective feature flags for `module`.
    pub fn new(module: &ShaderModule) -> Self {
        Self {
            flags: module.effective_feature_flags(),
        }
    }

    /// The bitmask that will be serialized.
    pub fn flags(&self) -> FeatureFlags {
        self.flags
    }
}

impl PartWriter for FeatureInfoWriter {
    fn fourcc(&self) -> FourCC {
        PART_FEATURE_INFO
    }

    fn size(&self) -> u32 {
        8
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.flags.bits().to_le_bytes());
    }
}
