//! Profile-aware structural validation of a parsed container.
//!
//! Structure means layout only: every part's self-describing fields must be
//! internally consistent, and the set of part codes must be legal for the
//! module's profile. Whether the content matches the module is the
//! cross-validator's job.

use tracing::debug;

use crate::container::ContainerFile;
use crate::diag::{Diagnostic, DiagnosticsSink};
use crate::error::ContainerError;
use crate::fourcc::{
    FourCC, PART_DEBUG_NAME, PART_FEATURE_INFO, PART_INPUT_SIGNATURE, PART_OUTPUT_SIGNATURE,
    PART_PATCH_CONSTANT_SIGNATURE, PART_PRIVATE_DATA, PART_PROGRAM, PART_PSV,
    PART_ROOT_SIGNATURE, PART_RUNTIME_DATA, PART_SHADER_HASH, PART_VERSION_INFO,
};
use crate::module::{FormatVersion, ShaderModule, ShaderStage};
use crate::parts::{
    parse_program_header, parse_signature_part, parse_version_info_part, PsvPart, RdatPart,
    HASH_PART_SIZE,
};
use crate::reader::ByteReader;

const SIGNATURE_PARTS: [FourCC; 3] = [
    PART_INPUT_SIGNATURE,
    PART_OUTPUT_SIGNATURE,
    PART_PATCH_CONSTANT_SIGNATURE,
];

/// Structurally validates every part of `file` against the module's profile.
///
/// Malformed layout and profile-illegal parts are errors; absent mandatory
/// parts are reported to `sink`, one diagnostic per part, and do not abort
/// the run.
pub fn validate_structure(
    file: &ContainerFile<'_>,
    module: &ShaderModule,
    sink: &mut DiagnosticsSink,
) -> Result<(), ContainerError> {
    debug!(
        parts = file.parts.len(),
        profile = module.stage.profile_name(),
        "structural validation"
    );
    for part in &file.parts {
        check_part_allowed(part.fourcc, module.stage)?;
        check_part_layout(part.fourcc, part.bytes, file.version)?;
    }
    for missing in mandatory_parts(module.stage)
        .iter()
        .filter(|&&fourcc| file.part(fourcc).is_none())
    {
        sink.report(Diagnostic::MissingPart { part: *missing });
    }
    Ok(())
}

fn check_part_allowed(fourcc: FourCC, stage: ShaderStage) -> Result<(), ContainerError> {
    let library = stage == ShaderStage::Library;
    let allowed = match fourcc {
        PART_VERSION_INFO | PART_RUNTIME_DATA => library,
        f if SIGNATURE_PARTS.contains(&f) => !library,
        PART_PSV => !library,
        PART_PROGRAM | PART_FEATURE_INFO | PART_SHADER_HASH | PART_DEBUG_NAME
        | PART_ROOT_SIGNATURE | PART_PRIVATE_DATA => true,
        other => {
            return Err(ContainerError::not_well_formed(
                other,
                "unrecognized part code".to_owned(),
            ))
        }
    };
    if !allowed {
        return Err(ContainerError::PartNotAllowed {
            part: fourcc,
            profile: stage.profile_name(),
        });
    }
    Ok(())
}

fn check_part_layout(
    fourcc: FourCC,
    bytes: &[u8],
    version: FormatVersion,
) -> Result<(), ContainerError> {
    match fourcc {
        f if SIGNATURE_PARTS.contains(&f) => {
            parse_signature_part(f, bytes, version)?;
        }
        PART_PSV => {
            PsvPart::parse(bytes)?;
        }
        PART_RUNTIME_DATA => {
            RdatPart::parse(bytes)?;
        }
        PART_VERSION_INFO => {
            parse_version_info_part(bytes)?;
        }
        PART_PROGRAM => {
            parse_program_header(bytes)?;
        }
        PART_FEATURE_INFO => {
            let mut r = ByteReader::new(fourcc, bytes);
            r.read_u64("feature flags")?;
            r.expect_end("SFI0 part")?;
        }
        PART_SHADER_HASH => {
            if bytes.len() != HASH_PART_SIZE as usize {
                return Err(ContainerError::not_well_formed(
                    fourcc,
                    format!("size {} bytes, expected {HASH_PART_SIZE}", bytes.len()),
                ));
            }
        }
        PART_DEBUG_NAME => {
            let mut r = ByteReader::new(fourcc, bytes);
            let _flags = r.read_u16("debug name flags")?;
            let name_size = r.read_u16("debug name size")?;
            let name = r.take(name_size as usize, "debug name bytes")?;
            r.expect_end("ILDN part")?;
            if !name.contains(&0) {
                return Err(ContainerError::not_well_formed(
                    fourcc,
                    "debug name is missing a null terminator".to_owned(),
                ));
            }
        }
        // Opaque passthrough parts carry no structure of their own.
        PART_ROOT_SIGNATURE | PART_PRIVATE_DATA => {}
        other => {
            return Err(ContainerError::not_well_formed(
                other,
                "unrecognized part code".to_owned(),
            ))
        }
    }
    Ok(())
}

fn mandatory_parts(stage: ShaderStage) -> Vec<FourCC> {
    let mut parts = vec![PART_FEATURE_INFO, PART_PROGRAM];
    if stage == ShaderStage::Library {
        parts.push(PART_RUNTIME_DATA);
    } else {
        parts.push(PART_PSV);
        if stage.has_signatures() {
            parts.push(PART_INPUT_SIGNATURE);
            parts.push(PART_OUTPUT_SIGNATURE);
            if stage.has_patch_constant_signature() {
                parts.push(PART_PATCH_CONSTANT_SIGNATURE);
            }
        }
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{write_container, ContainerFile};
    use crate::module::FormatVersion;
    use crate::test_utils::{build_raw_container, library_module, vertex_module};

    #[test]
    fn written_containers_validate_cleanly() {
        for module in crate::test_utils::modules_for_all_stages() {
            let bytes = write_container(&module, FormatVersion::new(1, 6)).unwrap();
            let file = ContainerFile::parse(&bytes).unwrap();
            let mut sink = DiagnosticsSink::new();
            validate_structure(&file, &module, &mut sink).unwrap();
            assert!(
                sink.is_empty(),
                "{} profile: {:?}",
                module.stage.profile_name(),
                sink.diagnostics()
            );
        }
    }

    #[test]
    fn version_info_is_library_only() {
        let bytes = build_raw_container(
            FormatVersion::new(1, 6),
            &[(PART_VERSION_INFO, vec![0u8; 16])],
        );
        let file = ContainerFile::parse(&bytes).unwrap();
        let mut sink = DiagnosticsSink::new();
        let err = validate_structure(&file, &vertex_module(), &mut sink).unwrap_err();
        assert!(matches!(err, ContainerError::PartNotAllowed { .. }));
    }

    #[test]
    fn signature_parts_are_forbidden_in_library_profiles() {
        let bytes = build_raw_container(
            FormatVersion::new(1, 6),
            &[(PART_INPUT_SIGNATURE, vec![0u8; 8])],
        );
        let file = ContainerFile::parse(&bytes).unwrap();
        let mut sink = DiagnosticsSink::new();
        let err = validate_structure(&file, &library_module(), &mut sink).unwrap_err();
        assert!(matches!(err, ContainerError::PartNotAllowed { .. }));
    }

    #[test]
    fn missing_mandatory_parts_are_diagnosed_individually() {
        let bytes = build_raw_container(FormatVersion::new(1, 6), &[]);
        let file = ContainerFile::parse(&bytes).unwrap();
        let missing_parts = |module: &crate::module::ShaderModule| -> Vec<FourCC> {
            let mut sink = DiagnosticsSink::new();
            validate_structure(&file, module, &mut sink).unwrap();
            sink.diagnostics()
                .iter()
                .map(|d| match d {
                    Diagnostic::MissingPart { part } => *part,
                    other => panic!("unexpected diagnostic {other:?}"),
                })
                .collect()
        };
        assert_eq!(
            missing_parts(&vertex_module()),
            vec![
                PART_FEATURE_INFO,
                PART_PROGRAM,
                PART_PSV,
                PART_INPUT_SIGNATURE,
                PART_OUTPUT_SIGNATURE,
            ]
        );
        assert_eq!(
            missing_parts(&library_module()),
            vec![PART_FEATURE_INFO, PART_PROGRAM, PART_RUNTIME_DATA]
        );
    }

    #[test]
    fn unknown_part_codes_are_structural_errors() {
        let bytes = build_raw_container(
            FormatVersion::new(1, 6),
            &[(FourCC(*b"XXXX"), vec![0u8; 4])],
        );
        let file = ContainerFile::parse(&bytes).unwrap();
        let mut sink = DiagnosticsSink::new();
        let err = validate_structure(&file, &vertex_module(), &mut sink).unwrap_err();
        assert!(matches!(err, ContainerError::NotWellFormed { .. }));
    }

    #[test]
    fn truncated_part_payloads_are_structural_errors() {
        let bytes = build_raw_container(
            FormatVersion::new(1, 6),
            &[(PART_SHADER_HASH, vec![0u8; 12])],
        );
        let file = ContainerFile::parse(&bytes).unwrap();
        let mut sink = DiagnosticsSink::new();
        let err = validate_structure(&file, &vertex_module(), &mut sink).unwrap_err();
        assert!(matches!(err, ContainerError::NotWellFormed { .. }));
    }
}
