use core::fmt;

/// A four-character code identifying a container part (e.g. `PSV0`, `SFI0`).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCC(pub [u8; 4]);

/// Program bitcode part.
pub const PART_PROGRAM: FourCC = FourCC(*b"DXIL");
/// Input signature part.
pub const PART_INPUT_SIGNATURE: FourCC = FourCC(*b"ISG1");
/// Output signature part.
pub const PART_OUTPUT_SIGNATURE: FourCC = FourCC(*b"OSG1");
/// Patch-constant (or primitive) signature part.
pub const PART_PATCH_CONSTANT_SIGNATURE: FourCC = FourCC(*b"PSG1");
/// Feature-flags bitmask part.
pub const PART_FEATURE_INFO: FourCC = FourCC(*b"SFI0");
/// Pipeline-state-validation blob.
pub const PART_PSV: FourCC = FourCC(*b"PSV0");
/// Runtime reflection blob (library profiles).
pub const PART_RUNTIME_DATA: FourCC = FourCC(*b"RDAT");
/// Root signature blob (opaque passthrough).
pub const PART_ROOT_SIGNATURE: FourCC = FourCC(*b"RTS0");
/// Compiler version info (library profiles only).
pub const PART_VERSION_INFO: FourCC = FourCC(*b"VERS");
/// Shader hash part.
pub const PART_SHADER_HASH: FourCC = FourCC(*b"HASH");
/// Debug name part.
pub const PART_DEBUG_NAME: FourCC = FourCC(*b"ILDN");
/// Private data part; must be last and is exempt from 4-byte alignment.
pub const PART_PRIVATE_DATA: FourCC = FourCC(*b"PRIV");

impl FourCC {
    /// Returns the raw code bytes.
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({self})")
    }
}
