//! Container assembly and the structural read side.
//!
//! A container is a 32-byte header (`DXBC` magic, 16-byte digest, format
//! version, total size, part count), a table of absolute part offsets, and
//! the parts back to back, each with an 8-byte `{fourcc, size}` header.
//! [`ContainerBuilder`] writes one; [`ContainerFile`] walks one without
//! trusting any declared offset or size.

use tracing::debug;

use crate::error::ContainerError;
use crate::fourcc::{
    FourCC, PART_INPUT_SIGNATURE, PART_OUTPUT_SIGNATURE, PART_PATCH_CONSTANT_SIGNATURE,
    PART_PRIVATE_DATA, PART_ROOT_SIGNATURE,
};
use crate::module::{FormatVersion, ShaderModule, ShaderStage, PREVIEW_DIGEST};
use crate::parts::{
    DebugNameWriter, FeatureInfoWriter, PartWriter, ProgramWriter, PsvWriter, RawPartWriter,
    RdatWriter, ShaderHashWriter, SignaturePartWriter, VersionInfoWriter,
};

/// Container magic bytes.
pub const CONTAINER_MAGIC: [u8; 4] = *b"DXBC";
/// Fixed container header size.
pub const CONTAINER_HEADER_SIZE: u32 = 32;
/// Per-part header size (`fourcc` + content size).
pub const PART_HEADER_SIZE: u32 = 8;

/// One part located inside a parsed container.
#[derive(Copy, Clone, Debug)]
pub struct ContainerPart<'a> {
    /// The part code.
    pub fourcc: FourCC,
    /// Absolute offset of the part header in the container.
    pub offset: u32,
    /// The part content (without the 8-byte part header).
    pub bytes: &'a [u8],
}

/// A structurally verified view over container bytes.
///
/// `parse` establishes that every part lies inside the buffer and that parts
/// do not overlap; it does not interpret part content. Content-level checks
/// belong to the per-part parsers and the cross-validator.
pub struct ContainerFile<'a> {
    bytes: &'a [u8],
    /// Digest stored in the header (not verified here).
    pub digest: [u8; 16],
    /// Declared format version.
    pub version: FormatVersion,
    /// Parts in offset-table order.
    pub parts: Vec<ContainerPart<'a>>,
}

impl<'a> ContainerFile<'a> {
    /// Parses and structurally verifies `bytes`.
    pub fn parse(bytes: &'a [u8]) -> Result<ContainerFile<'a>, ContainerError> {
        if bytes.len() < CONTAINER_HEADER_SIZE as usize {
            return Err(ContainerError::MalformedHeader(format!(
                "{} bytes is shorter than the {CONTAINER_HEADER_SIZE}-byte header",
                bytes.len()
            )));
        }
        if bytes[0..4] != CONTAINER_MAGIC {
            return Err(ContainerError::MalformedHeader(format!(
                "bad magic {:02x?}",
                &bytes[0..4]
            )));
        }
        let mut digest = [0u8; 16];
        digest.copy_from_slice(&bytes[4..20]);
        let version = FormatVersion::new(
            u16::from_le_bytes([bytes[20], bytes[21]]),
            u16::from_le_bytes([bytes[22], bytes[23]]),
        );
        let total_size = u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]);
        if total_size as usize != bytes.len() {
            return Err(ContainerError::MalformedHeader(format!(
                "declared total size {total_size} does not match buffer length {}",
                bytes.len()
            )));
        }
        let part_count = u32::from_le_bytes([bytes[28], bytes[29], bytes[30], bytes[31]]);

        let table_end = (CONTAINER_HEADER_SIZE as usize)
            .checked_add(part_count as usize * 4)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| {
                ContainerError::MalformedOffsets(format!(
                    "offset table for {part_count} parts does not fit in {} bytes",
                    bytes.len()
                ))
            })?;

        let mut parts = Vec::with_capacity(part_count.min(64) as usize);
        let mut seen: Vec<FourCC> = Vec::with_capacity(parts.capacity());
        let mut previous_end = table_end;
        for i in 0..part_count as usize {
            let o = CONTAINER_HEADER_SIZE as usize + i * 4;
            let offset =
                u32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]]) as usize;
            if offset < previous_end {
                return Err(ContainerError::MalformedOffsets(format!(
                    "part {i} at offset {offset} overlaps preceding content ending at {previous_end}"
                )));
            }
            let header_end = offset
                .checked_add(PART_HEADER_SIZE as usize)
                .filter(|&end| end <= bytes.len())
                .ok_or_else(|| {
                    ContainerError::MalformedOffsets(format!(
                        "part {i} header at offset {offset} is outside the container"
                    ))
                })?;
            let fourcc = FourCC([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ]);
            let size = u32::from_le_bytes([
                bytes[offset + 4],
                bytes[offset + 5],
                bytes[offset + 6],
                bytes[offset + 7],
            ]) as usize;
            let content_end = header_end.checked_add(size).filter(|&end| end <= bytes.len()).ok_or_else(
                || {
                    ContainerError::MalformedOffsets(format!(
                        "{fourcc} part content of {size} bytes at offset {header_end} is outside the container"
                    ))
                },
            )?;
            if seen.contains(&fourcc) {
                return Err(ContainerError::DuplicatePart { part: fourcc });
            }
            seen.push(fourcc);
            parts.push(ContainerPart {
                fourcc,
                offset: offset as u32,
                bytes: &bytes[header_end..content_end],
            });
            previous_end = content_end;
        }

        if let Some(position) = seen.iter().position(|&f| f == PART_PRIVATE_DATA) {
            if position != seen.len() - 1 {
                return Err(ContainerError::MalformedOffsets(format!(
                    "{PART_PRIVATE_DATA} part at index {position} must be the last part"
                )));
            }
        }

        Ok(ContainerFile {
            bytes,
            digest,
            version,
            parts,
        })
    }

    /// The whole container buffer.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Finds a part by code.
    pub fn part(&self, fourcc: FourCC) -> Option<&ContainerPart<'a>> {
        self.parts.iter().find(|p| p.fourcc == fourcc)
    }
}

/// Computes the container digest: MD5 over the whole buffer with the digest
/// field zeroed.
pub fn compute_container_digest(bytes: &[u8]) -> [u8; 16] {
    let mut ctx = md5::Context::new();
    ctx.consume(&bytes[..4]);
    ctx.consume([0u8; 16]);
    ctx.consume(&bytes[20..]);
    ctx.compute().0
}

/// Streaming container assembler: parts are appended in emission order, then
/// `finalize` writes the header and offset table and fills in the digest.
///
/// Data-dependent rules (duplicates, part after private data, alignment)
/// are reported as errors; a writer whose `write` output diverges from its
/// `size` is a programming error and panics.
pub struct ContainerBuilder {
    version: FormatVersion,
    parts: Vec<(FourCC, Vec<u8>)>,
    finalized: bool,
}

impl ContainerBuilder {
    /// Creates an empty builder for `version`.
    pub fn new(version: FormatVersion) -> Self {
        Self {
            version,
            parts: Vec::new(),
            finalized: false,
        }
    }

    /// Appends one part.
    pub fn add_part(&mut self, writer: &dyn PartWriter) -> Result<(), ContainerError> {
        assert!(!self.finalized, "add_part called after finalize");
        let fourcc = writer.fourcc();
        if self.parts.last().is_some_and(|(f, _)| *f == PART_PRIVATE_DATA) {
            return Err(ContainerError::not_well_formed(
                fourcc,
                format!("no part may follow the {PART_PRIVATE_DATA} part"),
            ));
        }
        if self.parts.iter().any(|(f, _)| *f == fourcc) {
            return Err(ContainerError::DuplicatePart { part: fourcc });
        }
        let size = writer.size();
        if self.version.aligned() && fourcc != PART_PRIVATE_DATA && size % 4 != 0 {
            return Err(ContainerError::not_well_formed(
                fourcc,
                format!("part size {size} is not a multiple of 4"),
            ));
        }

        let mut content = Vec::with_capacity(size as usize);
        writer.write(&mut content);
        assert_eq!(
            content.len() as u32,
            size,
            "{fourcc} part: write() emitted {} bytes but size() declared {size}",
            content.len()
        );
        self.parts.push((fourcc, content));
        Ok(())
    }

    /// Writes the finished container.
    ///
    /// The digest field is filled last: the real MD5 digest when
    /// `compute_hash` is set and the version is released, the preview
    /// sentinel for pre-release versions, all zeroes otherwise.
    pub fn finalize(mut self, compute_hash: bool) -> Vec<u8> {
        self.finalized = true;
        let part_count = self.parts.len() as u32;
        let table_size = part_count * 4;
        let total_size = CONTAINER_HEADER_SIZE
            + table_size
            + self
                .parts
                .iter()
                .map(|(_, content)| PART_HEADER_SIZE + content.len() as u32)
                .sum::<u32>();

        let mut out = Vec::with_capacity(total_size as usize);
        out.extend_from_slice(&CONTAINER_MAGIC);
        out.extend_from_slice(&[0u8; 16]); // digest, backpatched below
        out.extend_from_slice(&self.version.major.to_le_bytes());
        out.extend_from_slice(&self.version.minor.to_le_bytes());
        out.extend_from_slice(&total_size.to_le_bytes());
        out.extend_from_slice(&part_count.to_le_bytes());

        let mut offset = CONTAINER_HEADER_SIZE + table_size;
        for (_, content) in &self.parts {
            out.extend_from_slice(&offset.to_le_bytes());
            offset += PART_HEADER_SIZE + content.len() as u32;
        }
        for (fourcc, content) in &self.parts {
            out.extend_from_slice(fourcc.as_bytes());
            out.extend_from_slice(&(content.len() as u32).to_le_bytes());
            out.extend_from_slice(content);
        }
        assert_eq!(
            out.len() as u32,
            total_size,
            "assembled container diverged from its sized total"
        );

        let digest = if self.version.is_prerelease() {
            PREVIEW_DIGEST
        } else if compute_hash {
            compute_container_digest(&out)
        } else {
            [0u8; 16]
        };
        out[4..20].copy_from_slice(&digest);

        debug!(
            parts = part_count,
            total_size,
            major = self.version.major,
            minor = self.version.minor,
            "container assembled"
        );
        out
    }
}

/// Serializes `module` into a complete container at `version`.
///
/// Emission order is fixed: feature flags, signatures, pipeline state or
/// runtime reflection, root signature, hash, debug name, version info,
/// program, private data. Absent optional state skips its part.
pub fn write_container(
    module: &ShaderModule,
    version: FormatVersion,
) -> Result<Vec<u8>, ContainerError> {
    let mut builder = ContainerBuilder::new(version);
    let domain = module.stage_info.tessellator_domain();
    let i1_compat = !version.aligned();

    builder.add_part(&FeatureInfoWriter::new(module))?;

    if module.stage.has_signatures() {
        builder.add_part(&SignaturePartWriter::new(
            PART_INPUT_SIGNATURE,
            &module.input_signature,
            domain,
            version,
            i1_compat,
        )?)?;
        builder.add_part(&SignaturePartWriter::new(
            PART_OUTPUT_SIGNATURE,
            &module.output_signature,
            domain,
            version,
            i1_compat,
        )?)?;
        if module.stage.has_patch_constant_signature() {
            builder.add_part(&SignaturePartWriter::new(
                PART_PATCH_CONSTANT_SIGNATURE,
                &module.patch_constant_signature,
                domain,
                version,
                i1_compat,
            )?)?;
        }
    }

    if module.stage == ShaderStage::Library {
        builder.add_part(&RdatWriter::new(module)?)?;
    } else {
        builder.add_part(&PsvWriter::new(module, version)?)?;
    }

    if let Some(blob) = &module.root_signature {
        builder.add_part(&RawPartWriter::new(PART_ROOT_SIGNATURE, blob.clone()))?;
    }

    builder.add_part(&ShaderHashWriter::new(module, false))?;

    if let Some(name) = &module.debug_name {
        builder.add_part(&DebugNameWriter::new(name, 0))?;
    }

    if module.stage == ShaderStage::Library {
        if let Some(compiler_version) = &module.compiler_version {
            builder.add_part(&VersionInfoWriter::new(compiler_version))?;
        }
    }

    builder.add_part(&ProgramWriter::new(module))?;

    if let Some(blob) = &module.private_data {
        builder.add_part(&RawPartWriter::new(PART_PRIVATE_DATA, blob.clone()))?;
    }

    Ok(builder.finalize(!version.is_prerelease()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourcc::{
        PART_FEATURE_INFO, PART_PROGRAM, PART_PSV, PART_SHADER_HASH, PART_VERSION_INFO,
    };
    use crate::test_utils::{library_module, vertex_module};

    #[test]
    fn assembled_container_parses_back() {
        let version = FormatVersion::new(1, 6);
        let bytes = write_container(&vertex_module(), version).unwrap();
        let file = ContainerFile::parse(&bytes).unwrap();

        assert_eq!(file.version, version);
        let codes: Vec<FourCC> = file.parts.iter().map(|p| p.fourcc).collect();
        assert_eq!(
            codes,
            vec![
                PART_FEATURE_INFO,
                PART_INPUT_SIGNATURE,
                PART_OUTPUT_SIGNATURE,
                PART_PSV,
                PART_SHADER_HASH,
                PART_PROGRAM,
            ]
        );
        assert_eq!(file.digest, compute_container_digest(&bytes));
    }

    #[test]
    fn library_container_carries_rdat_and_version_info() {
        let bytes = write_container(&library_module(), FormatVersion::new(1, 8)).unwrap();
        let file = ContainerFile::parse(&bytes).unwrap();
        let codes: Vec<FourCC> = file.parts.iter().map(|p| p.fourcc).collect();
        assert!(codes.contains(&crate::fourcc::PART_RUNTIME_DATA));
        assert!(codes.contains(&PART_VERSION_INFO));
        assert!(!codes.contains(&PART_INPUT_SIGNATURE));
        assert!(!codes.contains(&PART_PSV));
    }

    #[test]
    fn prerelease_versions_get_the_preview_digest() {
        let bytes = write_container(&vertex_module(), FormatVersion::new(1, 9)).unwrap();
        let file = ContainerFile::parse(&bytes).unwrap();
        assert_eq!(file.digest, PREVIEW_DIGEST);
    }

    #[test]
    fn duplicate_parts_are_rejected_at_build_time() {
        let module = vertex_module();
        let mut builder = ContainerBuilder::new(FormatVersion::new(1, 6));
        builder.add_part(&FeatureInfoWriter::new(&module)).unwrap();
        let err = builder.add_part(&FeatureInfoWriter::new(&module)).unwrap_err();
        assert!(matches!(err, ContainerError::DuplicatePart { .. }));
    }

    #[test]
    fn nothing_may_follow_the_private_data_part() {
        let module = vertex_module();
        let mut builder = ContainerBuilder::new(FormatVersion::new(1, 6));
        builder
            .add_part(&RawPartWriter::new(PART_PRIVATE_DATA, vec![1, 2, 3]))
            .unwrap();
        let err = builder.add_part(&FeatureInfoWriter::new(&module)).unwrap_err();
        assert!(matches!(err, ContainerError::NotWellFormed { .. }));
    }

    #[test]
    fn aligned_mode_rejects_misaligned_parts_but_exempts_private_data() {
        let mut builder = ContainerBuilder::new(FormatVersion::new(1, 6));
        let err = builder
            .add_part(&RawPartWriter::new(PART_ROOT_SIGNATURE, vec![0; 5]))
            .unwrap_err();
        assert!(matches!(err, ContainerError::NotWellFormed { .. }));
        builder
            .add_part(&RawPartWriter::new(PART_PRIVATE_DATA, vec![0; 5]))
            .unwrap();

        // Legacy mode has no alignment rule at all.
        let mut legacy = ContainerBuilder::new(FormatVersion::new(1, 0));
        legacy
            .add_part(&RawPartWriter::new(PART_ROOT_SIGNATURE, vec![0; 5]))
            .unwrap();
    }

    #[test]
    fn every_truncated_prefix_is_rejected() {
        let bytes = write_container(&vertex_module(), FormatVersion::new(1, 6)).unwrap();
        for len in 0..bytes.len() {
            assert!(
                ContainerFile::parse(&bytes[..len]).is_err(),
                "prefix of {len} bytes should not parse"
            );
        }
    }

    #[test]
    fn corrupted_magic_and_offsets_are_rejected() {
        let good = write_container(&vertex_module(), FormatVersion::new(1, 6)).unwrap();

        let mut bad_magic = good.clone();
        bad_magic[0] = b'X';
        assert!(matches!(
            ContainerFile::parse(&bad_magic),
            Err(ContainerError::MalformedHeader(_))
        ));

        let mut bad_offset = good.clone();
        // First offset table entry points into the header.
        bad_offset[32..36].copy_from_slice(&4u32.to_le_bytes());
        assert!(matches!(
            ContainerFile::parse(&bad_offset),
            Err(ContainerError::MalformedOffsets(_))
        ));
    }
}
