use crate::error::ContainerError;
use crate::fourcc::{FourCC, PART_PROGRAM};
use crate::module::{ShaderModule, ShaderStage};
use crate::parts::PartWriter;
use crate::reader::ByteReader;

const PROGRAM_HEADER_SIZE: u32 = 24;
const BITCODE_MAGIC: u32 = u32::from_le_bytes(*b"DXIL");
const BITCODE_IR_VERSION: u32 = 1;

/// Fixed header at the start of the program part.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ProgramHeader {
    /// Shader stage of the program.
    pub stage: ShaderStage,
    /// Shader model `(major, minor)`.
    pub model: (u8, u8),
    /// Declared bitcode byte size.
    pub bitcode_size: u32,
}

/// Writer for the program bitcode part: a 24-byte header followed by the
/// opaque bitcode, padded to a 4-byte boundary.
pub struct ProgramWriter {
    stage: ShaderStage,
    model: (u8, u8),
    bitcode: Vec<u8>,
}

impl ProgramWriter {
    /// Captures the module's program blob.
    pub fn new(module: &ShaderModule) -> Self {
        Self {
            stage: module.stage,
            model: module.model,
            bitcode: module.bitcode.clone(),
        }
    }

    fn padded_bitcode_size(&self) -> u32 {
        (self.bitcode.len() as u32 + 3) & !3
    }
}

impl PartWriter for ProgramWriter {
    fn fourcc(&self) -> FourCC {
        PART_PROGRAM
    }

    fn size(&self) -> u32 {
        PROGRAM_HEADER_SIZE + self.padded_bitcode_size()
    }

    fn write(&self, out: &mut Vec<u8>) {
        let version_token = (self.stage.as_u32() << 16)
            | ((self.model.0 as u32) << 4)
            | (self.model.1 as u32);
        out.extend_from_slice(&version_token.to_le_bytes());
        out.extend_from_slice(&(self.size() / 4).to_le_bytes());
        out.extend_from_slice(&BITCODE_MAGIC.to_le_bytes());
        out.extend_from_slice(&BITCODE_IR_VERSION.to_le_bytes());
        out.extend_from_slice(&PROGRAM_HEADER_SIZE.to_le_bytes()); // bitcode offset
        out.extend_from_slice(&(self.bitcode.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.bitcode);
        for _ in self.bitcode.len() as u32..self.padded_bitcode_size() {
            out.push(0);
        }
    }
}

/// Parses and bounds-checks the program part header.
pub fn parse_program_header(bytes: &[u8]) -> Result<ProgramHeader, ContainerError> {
    let mut r = ByteReader::new(PART_PROGRAM, bytes);
    let version_token = r.read_u32("program version token")?;
    let size_in_u32 = r.read_u32("program size")?;
    let magic = r.read_u32("bitcode magic")?;
    let _ir_version = r.read_u32("bitcode ir version")?;
    let bitcode_offset = r.read_u32("bitcode offset")?;
    let bitcode_size = r.read_u32("bitcode size")?;

    if magic != BITCODE_MAGIC {
        return Err(ContainerError::not_well_formed(
            PART_PROGRAM,
            format!("bad bitcode magic {magic:#010x}"),
        ));
    }
    let declared_total = (size_in_u32 as usize).checked_mul(4).ok_or_else(|| {
        ContainerError::not_well_formed(PART_PROGRAM, "program size overflows".to_owned())
    })?;
    if declared_total != bytes.len() {
        return Err(ContainerError::not_well_formed(
            PART_PROGRAM,
            format!(
                "declared size {declared_total} does not match part size {}",
                bytes.len()
            ),
        ));
    }
    let bitcode_end = (bitcode_offset as usize)
        .checked_add(bitcode_size as usize)
        .ok_or_else(|| {
            ContainerError::not_well_formed(PART_PROGRAM, "bitcode range overflows".to_owned())
        })?;
    if (bitcode_offset as usize) < PROGRAM_HEADER_SIZE as usize || bitcode_end > bytes.len() {
        return Err(ContainerError::not_well_formed(
            PART_PROGRAM,
            format!(
                "bitcode at {bitcode_offset}..{bitcode_end} is outside part size {}",
                bytes.len()
            ),
        ));
    }

    Ok(ProgramHeader {
        stage: ShaderStage::from_u32(version_token >> 16),
        model: (
            ((version_token >> 4) & 0xF) as u8,
            (version_token & 0xF) as u8,
        ),
        bitcode_size,
    })
}
