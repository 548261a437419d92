//! Content cross-validation: container bytes against the live module.
//!
//! Every part is re-derived through the same writers the serializer uses,
//! then compared against what the container actually holds. Structured parts
//! are diffed field by field, one diagnostic per divergence; opaque parts are
//! byte-compared. Nothing here aborts on a mismatch; structural failures
//! (which make further interpretation unsafe) are the only errors.

use core::fmt;

use tracing::debug;

use crate::container::{compute_container_digest, ContainerFile, ContainerPart};
use crate::diag::{Diagnostic, DiagnosticsSink};
use crate::error::ContainerError;
use crate::fourcc::{
    FourCC, PART_DEBUG_NAME, PART_FEATURE_INFO, PART_INPUT_SIGNATURE, PART_OUTPUT_SIGNATURE,
    PART_PATCH_CONSTANT_SIGNATURE, PART_PRIVATE_DATA, PART_PROGRAM, PART_PSV,
    PART_ROOT_SIGNATURE, PART_RUNTIME_DATA, PART_SHADER_HASH, PART_VERSION_INFO,
};
use crate::module::{FormatVersion, ShaderModule, ShaderStage, PREVIEW_DIGEST};
use crate::parts::psv::mask_words;
use crate::parts::{
    parse_program_header, parse_signature_part, parse_version_info_part, PartWriter,
    ProgramWriter, PsvPart, PsvWriter, RdatPart, RdatWriter, ShaderHashWriter,
    SignaturePartWriter, VersionInfoWriter,
};
use crate::reader::ByteReader;
use crate::sigelem::decode_psv_element;
use crate::validate::validate_structure;

const HEADER_LABEL: FourCC = FourCC(*b"DXBC");

/// Options for [`validate_container`].
#[derive(Copy, Clone, Debug, Default)]
pub struct ValidateOptions {
    /// Validate only the root signature part, ignoring all others.
    pub root_signature_only: bool,
    /// After a fully clean validation, compute the container digest and
    /// write it into the header in place.
    pub write_hash: bool,
}

/// Result of one validation run.
#[derive(Debug)]
pub struct ValidationOutcome {
    /// Everything found, in discovery order.
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationOutcome {
    /// True when no diagnostic was reported.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Validates `bytes` against `module` at the expected format version.
///
/// Structural problems (bad offsets, truncated sub-structures, profile
/// violations) return an error. Content divergences are collected and
/// returned; the hash is only injected when the run found nothing at all.
pub fn validate_container(
    bytes: &mut [u8],
    module: &ShaderModule,
    version: FormatVersion,
    options: ValidateOptions,
) -> Result<ValidationOutcome, ContainerError> {
    let mut sink = DiagnosticsSink::new();
    {
        let file = ContainerFile::parse(bytes)?;
        debug!(
            parts = file.parts.len(),
            root_signature_only = options.root_signature_only,
            "cross-validation"
        );
        if options.root_signature_only {
            validate_root_signature_only(&file, module, &mut sink)?;
        } else {
            validate_structure(&file, module, &mut sink)?;
            if file.version != version {
                sink.mismatch(
                    HEADER_LABEL,
                    "format version",
                    format_args!("{}.{}", version.major, version.minor),
                    format_args!("{}.{}", file.version.major, file.version.minor),
                );
            }
            cross_validate_parts(&file, module, version, &mut sink)?;
            check_digest(&file, &mut sink);
        }
    }

    let outcome = ValidationOutcome {
        diagnostics: sink.into_diagnostics(),
    };
    if options.write_hash && outcome.is_clean() {
        let digest = if version.is_prerelease() {
            PREVIEW_DIGEST
        } else {
            compute_container_digest(bytes)
        };
        bytes[4..20].copy_from_slice(&digest);
    }
    debug!(diagnostics = outcome.diagnostics.len(), "validation finished");
    Ok(outcome)
}

fn validate_root_signature_only(
    file: &ContainerFile<'_>,
    module: &ShaderModule,
    sink: &mut DiagnosticsSink,
) -> Result<(), ContainerError> {
    let expected = module
        .root_signature
        .as_deref()
        .ok_or_else(|| ContainerError::MissingModuleState {
            part: PART_ROOT_SIGNATURE,
            reason: "root-signature-only validation requires a module root signature".to_owned(),
        })?;
    match file.part(PART_ROOT_SIGNATURE) {
        None => sink.report(Diagnostic::MissingPart {
            part: PART_ROOT_SIGNATURE,
        }),
        Some(part) => compare_blob(sink, PART_ROOT_SIGNATURE, expected, part.bytes),
    }
    Ok(())
}

fn check_digest(file: &ContainerFile<'_>, sink: &mut DiagnosticsSink) {
    // All-zero means hashing was skipped at write time; the preview sentinel
    // marks pre-release containers. Neither is comparable to a real digest.
    if file.digest == [0u8; 16] || file.digest == PREVIEW_DIGEST {
        return;
    }
    let computed = compute_container_digest(file.bytes());
    if computed != file.digest {
        sink.mismatch(
            HEADER_LABEL,
            "container digest",
            hex(&computed),
            hex(&file.digest),
        );
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn expected_part_codes(module: &ShaderModule) -> Vec<FourCC> {
    let mut codes = vec![PART_FEATURE_INFO];
    if module.stage.has_signatures() {
        codes.push(PART_INPUT_SIGNATURE);
        codes.push(PART_OUTPUT_SIGNATURE);
        if module.stage.has_patch_constant_signature() {
            codes.push(PART_PATCH_CONSTANT_SIGNATURE);
        }
    }
    if module.stage == ShaderStage::Library {
        codes.push(PART_RUNTIME_DATA);
    } else {
        codes.push(PART_PSV);
    }
    if module.root_signature.is_some() {
        codes.push(PART_ROOT_SIGNATURE);
    }
    codes.push(PART_SHADER_HASH);
    if module.debug_name.is_some() {
        codes.push(PART_DEBUG_NAME);
    }
    if module.stage == ShaderStage::Library && module.compiler_version.is_some() {
        codes.push(PART_VERSION_INFO);
    }
    codes.push(PART_PROGRAM);
    if module.private_data.is_some() {
        codes.push(PART_PRIVATE_DATA);
    }
    codes
}

fn cross_validate_parts(
    file: &ContainerFile<'_>,
    module: &ShaderModule,
    version: FormatVersion,
    sink: &mut DiagnosticsSink,
) -> Result<(), ContainerError> {
    let expected_codes = expected_part_codes(module);

    // validate_structure already diagnosed missing mandatory parts; this
    // covers the module-dependent optional ones.
    let mandatory_reported: Vec<FourCC> = sink
        .diagnostics()
        .iter()
        .filter_map(|d| match d {
            Diagnostic::MissingPart { part } => Some(*part),
            _ => None,
        })
        .collect();
    for &code in &expected_codes {
        if file.part(code).is_none() && !mandatory_reported.contains(&code) {
            sink.report(Diagnostic::MissingPart { part: code });
        }
    }
    for part in &file.parts {
        if !expected_codes.contains(&part.fourcc) {
            sink.mismatch(part.fourcc, "presence", "absent", "present");
        }
    }

    for part in &file.parts {
        if !expected_codes.contains(&part.fourcc) {
            continue;
        }
        cross_validate_part(part, module, version, file.version, sink)?;
    }
    Ok(())
}

fn cross_validate_part(
    part: &ContainerPart<'_>,
    module: &ShaderModule,
    version: FormatVersion,
    file_version: FormatVersion,
    sink: &mut DiagnosticsSink,
) -> Result<(), ContainerError> {
    let fourcc = part.fourcc;
    let domain = module.stage_info.tessellator_domain();
    let i1_compat = !version.aligned();
    match fourcc {
        PART_FEATURE_INFO => {
            let mut r = ByteReader::new(fourcc, part.bytes);
            let actual = r.read_u64("feature flags")?;
            let expected = module.effective_feature_flags().bits();
            diff(sink, fourcc, "feature_flags", format!("{expected:#x}"), format!("{actual:#x}"));
        }
        PART_INPUT_SIGNATURE => compare_signature(
            sink,
            fourcc,
            "SigInputElement",
            &SignaturePartWriter::new(fourcc, &module.input_signature, domain, version, i1_compat)?,
            part.bytes,
            file_version,
        )?,
        PART_OUTPUT_SIGNATURE => compare_signature(
            sink,
            fourcc,
            "SigOutputElement",
            &SignaturePartWriter::new(fourcc, &module.output_signature, domain, version, i1_compat)?,
            part.bytes,
            file_version,
        )?,
        PART_PATCH_CONSTANT_SIGNATURE => compare_signature(
            sink,
            fourcc,
            "SigPatchConstElement",
            &SignaturePartWriter::new(
                fourcc,
                &module.patch_constant_signature,
                domain,
                version,
                i1_compat,
            )?,
            part.bytes,
            file_version,
        )?,
        PART_PSV => {
            let writer = PsvWriter::new(module, version)?;
            let mut expected_bytes = Vec::new();
            writer.write(&mut expected_bytes);
            let expected = PsvPart::parse(&expected_bytes)?;
            let actual = PsvPart::parse(part.bytes)?;
            compare_psv(sink, &expected, &actual)?;
        }
        PART_RUNTIME_DATA => {
            let writer = RdatWriter::new(module)?;
            let mut expected_bytes = Vec::new();
            writer.write(&mut expected_bytes);
            let expected = RdatPart::parse(&expected_bytes)?;
            let actual = RdatPart::parse(part.bytes)?;
            compare_rdat(sink, &expected, &actual)?;
        }
        PART_VERSION_INFO => {
            let compiler_version = module.compiler_version.clone().unwrap_or_default();
            let writer = VersionInfoWriter::new(&compiler_version);
            let mut expected_bytes = Vec::new();
            writer.write(&mut expected_bytes);
            let expected = parse_version_info_part(&expected_bytes)?;
            let actual = parse_version_info_part(part.bytes)?;
            diff(sink, fourcc, "major", expected.major, actual.major);
            diff(sink, fourcc, "minor", expected.minor, actual.minor);
            diff(sink, fourcc, "flags", expected.flags, actual.flags);
            diff(sink, fourcc, "commit_count", expected.commit_count, actual.commit_count);
            diff(sink, fourcc, "commit_sha", &expected.commit_sha, &actual.commit_sha);
            diff(sink, fourcc, "custom_string", &expected.custom_string, &actual.custom_string);
        }
        PART_PROGRAM => {
            let header = parse_program_header(part.bytes)?;
            diff(
                sink,
                fourcc,
                "stage",
                module.stage.profile_name(),
                header.stage.profile_name(),
            );
            diff(
                sink,
                fourcc,
                "shader model",
                format_args!("{}.{}", module.model.0, module.model.1),
                format_args!("{}.{}", header.model.0, header.model.1),
            );
            let writer = ProgramWriter::new(module);
            let mut expected_bytes = Vec::new();
            writer.write(&mut expected_bytes);
            compare_blob(sink, fourcc, &expected_bytes, part.bytes);
        }
        PART_SHADER_HASH => {
            let mut r = ByteReader::new(fourcc, part.bytes);
            let flags = r.read_u32("hash flags")?;
            let digest = r.take(16, "hash digest")?;
            let expected = ShaderHashWriter::new(module, false);
            diff(sink, fourcc, "flags", 0u32, flags);
            diff(sink, fourcc, "digest", hex(expected.digest()), hex(digest));
        }
        PART_DEBUG_NAME => {
            let mut r = ByteReader::new(fourcc, part.bytes);
            let flags = r.read_u16("debug name flags")?;
            let name_size = r.read_u16("debug name size")?;
            let name_bytes = r.take(name_size as usize, "debug name bytes")?;
            let name = ByteReader::new(fourcc, name_bytes).read_cstring_at(0, "debug name")?;
            let expected = module.debug_name.as_deref().unwrap_or("");
            diff(sink, fourcc, "flags", 0u16, flags);
            diff(sink, fourcc, "debug name", expected, name);
        }
        PART_ROOT_SIGNATURE => {
            let expected = module.root_signature.as_deref().unwrap_or(&[]);
            compare_blob(sink, fourcc, expected, part.bytes);
        }
        PART_PRIVATE_DATA => {
            let expected = module.private_data.as_deref().unwrap_or(&[]);
            compare_blob(sink, fourcc, expected, part.bytes);
        }
        _ => {}
    }
    Ok(())
}

fn diff<T: fmt::Display, U: fmt::Display>(
    sink: &mut DiagnosticsSink,
    part: FourCC,
    field: impl Into<String>,
    expected: T,
    actual: U,
) {
    let expected = expected.to_string();
    let actual = actual.to_string();
    if expected != actual {
        sink.report(Diagnostic::Mismatch {
            part,
            field: field.into(),
            expected,
            actual,
        });
    }
}

fn compare_blob(sink: &mut DiagnosticsSink, part: FourCC, expected: &[u8], actual: &[u8]) {
    if expected == actual {
        return;
    }
    let first_difference = expected
        .iter()
        .zip(actual)
        .position(|(e, a)| e != a)
        .unwrap_or_else(|| expected.len().min(actual.len()));
    sink.report(Diagnostic::BlobMismatch {
        part,
        first_difference,
    });
}

fn compare_signature(
    sink: &mut DiagnosticsSink,
    fourcc: FourCC,
    label: &str,
    expected_writer: &SignaturePartWriter,
    actual_bytes: &[u8],
    file_version: FormatVersion,
) -> Result<(), ContainerError> {
    let expected = expected_writer.records();
    // The actual bytes follow the string-table mode the container declares,
    // which may differ from the negotiated version being validated against.
    let actual = parse_signature_part(fourcc, actual_bytes, file_version)?;
    diff(sink, fourcc, "param_count", expected.len(), actual.len());
    for (i, (e, a)) in expected.iter().zip(&actual).enumerate() {
        diff(
            sink,
            fourcc,
            format!("{label}[{i}].semantic_name"),
            &e.semantic_name,
            &a.semantic_name,
        );
        diff(
            sink,
            fourcc,
            format!("{label}[{i}].semantic_index"),
            e.semantic_index,
            a.semantic_index,
        );
        diff(
            sink,
            fourcc,
            format!("{label}[{i}].system_value"),
            e.system_value,
            a.system_value,
        );
        diff(
            sink,
            fourcc,
            format!("{label}[{i}].component_type"),
            e.component_type,
            a.component_type,
        );
        diff(sink, fourcc, format!("{label}[{i}].register"), e.register, a.register);
        diff(sink, fourcc, format!("{label}[{i}].mask"), e.mask, a.mask);
        diff(
            sink,
            fourcc,
            format!("{label}[{i}].read_write_mask"),
            e.read_write_mask,
            a.read_write_mask,
        );
        diff(sink, fourcc, format!("{label}[{i}].stream"), e.stream, a.stream);
        diff(
            sink,
            fourcc,
            format!("{label}[{i}].min_precision"),
            e.min_precision,
            a.min_precision,
        );
    }
    Ok(())
}

fn compare_psv(
    sink: &mut DiagnosticsSink,
    expected: &PsvPart,
    actual: &PsvPart,
) -> Result<(), ContainerError> {
    let part = PART_PSV;
    diff(sink, part, "runtime info version", expected.info_version, actual.info_version);
    for i in 0..4 {
        diff(
            sink,
            part,
            format!("stage info word {i}"),
            expected.stage_words[i],
            actual.stage_words[i],
        );
    }
    diff(sink, part, "wave_min", expected.wave_min, actual.wave_min);
    diff(sink, part, "wave_max", expected.wave_max, actual.wave_max);

    if let (Some(e), Some(a)) = (&expected.info_v1, &actual.info_v1) {
        diff(sink, part, "shader_stage", e.shader_stage, a.shader_stage);
        diff(sink, part, "uses_view_id", e.uses_view_id, a.uses_view_id);
        diff(sink, part, "sig_input_elements", e.sig_input_elements, a.sig_input_elements);
        diff(sink, part, "sig_output_elements", e.sig_output_elements, a.sig_output_elements);
        diff(
            sink,
            part,
            "sig_patch_const_elements",
            e.sig_patch_const_elements,
            a.sig_patch_const_elements,
        );
        diff(sink, part, "sig_input_vectors", e.sig_input_vectors, a.sig_input_vectors);
        diff(
            sink,
            part,
            "sig_patch_const_vectors",
            e.sig_patch_const_vectors,
            a.sig_patch_const_vectors,
        );
        for i in 0..4 {
            diff(
                sink,
                part,
                format!("sig_output_vectors[{i}]"),
                e.sig_output_vectors[i],
                a.sig_output_vectors[i],
            );
        }
    }
    if let (Some(e), Some(a)) = (&expected.num_threads, &actual.num_threads) {
        for (i, axis) in ["x", "y", "z"].iter().enumerate() {
            diff(sink, part, format!("num_threads.{axis}"), e[i], a[i]);
        }
    }

    diff(
        sink,
        part,
        "resource count",
        expected.bind_records.len(),
        actual.bind_records.len(),
    );
    for (i, (e, a)) in expected
        .bind_records
        .iter()
        .zip(&actual.bind_records)
        .enumerate()
    {
        diff(sink, part, format!("Resource[{i}].class"), e.class, a.class);
        diff(sink, part, format!("Resource[{i}].space"), e.space, a.space);
        diff(sink, part, format!("Resource[{i}].lower_bound"), e.lower_bound, a.lower_bound);
        diff(sink, part, format!("Resource[{i}].upper_bound"), e.upper_bound, a.upper_bound);
        diff(sink, part, format!("Resource[{i}].kind"), e.kind, a.kind);
        diff(sink, part, format!("Resource[{i}].flags"), e.flags, a.flags);
    }

    compare_psv_elements(sink, "SigInputElement", expected, actual, |p| &p.input_elements)?;
    compare_psv_elements(sink, "SigOutputElement", expected, actual, |p| &p.output_elements)?;
    compare_psv_elements(sink, "SigPatchConstElement", expected, actual, |p| {
        &p.patch_const_elements
    })?;

    detect_unused_entries(sink, actual);
    compare_view_id(sink, expected, actual);
    Ok(())
}

fn compare_psv_elements(
    sink: &mut DiagnosticsSink,
    label: &str,
    expected: &PsvPart,
    actual: &PsvPart,
    select: impl Fn(&PsvPart) -> &Vec<crate::sigelem::PsvElementRecord>,
) -> Result<(), ContainerError> {
    let part = PART_PSV;
    let expected_records = select(expected);
    let actual_records = select(actual);
    diff(
        sink,
        part,
        format!("{label} count"),
        expected_records.len(),
        actual_records.len(),
    );
    for (i, (er, ar)) in expected_records.iter().zip(actual_records).enumerate() {
        let e = decode_psv_element(part, *er, &expected.string_table, &expected.index_table)?;
        let a = decode_psv_element(part, *ar, &actual.string_table, &actual.index_table)?;
        diff(sink, part, format!("{label}[{i}].semantic_name"), &e.name, &a.name);
        diff(
            sink,
            part,
            format!("{label}[{i}].semantic_indices"),
            format!("{:?}", e.indices),
            format!("{:?}", a.indices),
        );
        diff(sink, part, format!("{label}[{i}].rows"), e.record.rows, a.record.rows);
        diff(sink, part, format!("{label}[{i}].start_row"), e.record.start_row, a.record.start_row);
        diff(sink, part, format!("{label}[{i}].cols"), e.record.cols(), a.record.cols());
        diff(
            sink,
            part,
            format!("{label}[{i}].start_col"),
            e.record.start_col(),
            a.record.start_col(),
        );
        diff(
            sink,
            part,
            format!("{label}[{i}].semantic_kind"),
            format!("{:?}", e.kind),
            format!("{:?}", a.kind),
        );
        diff(
            sink,
            part,
            format!("{label}[{i}].component_type"),
            format!("{:?}", e.component_type),
            format!("{:?}", a.component_type),
        );
        diff(
            sink,
            part,
            format!("{label}[{i}].interpolation"),
            format!("{:?}", e.interpolation),
            format!("{:?}", a.interpolation),
        );
        diff(
            sink,
            part,
            format!("{label}[{i}].dynamic_mask"),
            e.record.dynamic_mask_and_stream & 0xF,
            a.record.dynamic_mask_and_stream & 0xF,
        );
        diff(sink, part, format!("{label}[{i}].stream"), e.record.stream(), a.record.stream());
    }
    Ok(())
}

/// Flags string-table and index-table entries nothing in the part refers to.
/// The conventional empty string at offset 0 and trailing alignment NULs
/// are not findings.
fn detect_unused_entries(sink: &mut DiagnosticsSink, part: &PsvPart) {
    let all_elements = part
        .input_elements
        .iter()
        .chain(&part.output_elements)
        .chain(&part.patch_const_elements);

    let mut used_strings: Vec<u32> = Vec::new();
    let mut used_indices = vec![false; part.index_table.len()];
    for record in all_elements {
        used_strings.push(record.name_offset);
        let rows = record.rows.max(1) as usize;
        let start = record.indexes_offset as usize;
        for slot in used_indices.iter_mut().skip(start).take(rows) {
            *slot = true;
        }
    }

    let table = &part.string_table;
    let mut pos = 0usize;
    while pos < table.len() {
        let Some(nul) = table[pos..].iter().position(|&b| b == 0) else {
            break;
        };
        let entry = &table[pos..pos + nul];
        let is_trailing_pad = entry.is_empty() && table.len() - pos <= 3;
        if pos != 0 && !is_trailing_pad && !used_strings.contains(&(pos as u32)) {
            sink.report(Diagnostic::UnusedTableEntry {
                part: PART_PSV,
                table: "StringTable",
                offset: pos as u32,
                value: String::from_utf8_lossy(entry).into_owned(),
            });
        }
        pos += nul + 1;
    }

    for (i, used) in used_indices.iter().enumerate() {
        if !used {
            sink.report(Diagnostic::UnusedTableEntry {
                part: PART_PSV,
                table: "SemanticIndexTable",
                offset: i as u32,
                value: part.index_table[i].to_string(),
            });
        }
    }
}

fn expand_mask(words: &[u32], scalars: u32) -> Vec<bool> {
    (0..scalars as usize)
        .map(|i| {
            words
                .get(i / 32)
                .is_some_and(|word| word & (1 << (i % 32)) != 0)
        })
        .collect()
}

fn expand_table(words: &[u32], rows: u32, cols: u32) -> Vec<bool> {
    let words_per_row = mask_words(cols) as usize;
    let mut bits = Vec::with_capacity((rows * cols) as usize);
    for row in 0..rows as usize {
        let row_words = &words[row * words_per_row..(row + 1) * words_per_row];
        bits.extend(expand_mask(row_words, cols));
    }
    bits
}

fn set_bits(bits: &[bool]) -> String {
    let set: Vec<usize> = bits
        .iter()
        .enumerate()
        .filter_map(|(i, &b)| b.then_some(i))
        .collect();
    format!("{set:?}")
}

/// Compares the ViewID regions in canonical form: every packed mask and
/// table is expanded to flat bit vectors first, so two containers with
/// different (but equivalent) word padding compare equal.
fn compare_view_id(sink: &mut DiagnosticsSink, expected: &PsvPart, actual: &PsvPart) {
    let part = PART_PSV;
    match (&expected.view_id, &actual.view_id) {
        (None, None) => {}
        (Some(_), None) => diff(sink, part, "ViewID region", "present", "absent"),
        (None, Some(_)) => diff(sink, part, "ViewID region", "absent", "present"),
        (Some(e), Some(a)) => {
            let (Some(ei), Some(ai)) = (&expected.info_v1, &actual.info_v1) else {
                return;
            };
            let streams = e.output_masks.len().max(a.output_masks.len());
            for s in 0..streams {
                let eo = ei.sig_output_vectors.get(s).copied().unwrap_or(0) as u32 * 4;
                let ao = ai.sig_output_vectors.get(s).copied().unwrap_or(0) as u32 * 4;
                let em = e.output_masks.get(s).and_then(|m| m.as_deref());
                let am = a.output_masks.get(s).and_then(|m| m.as_deref());
                compare_region(
                    sink,
                    format!("ViewIdOutputMask[{s}]"),
                    em.map(|m| expand_mask(m, eo)),
                    am.map(|m| expand_mask(m, ao)),
                );
                let ein = ei.sig_input_vectors as u32 * 4;
                let ain = ai.sig_input_vectors as u32 * 4;
                let et = e.io_tables.get(s).and_then(|t| t.as_deref());
                let at = a.io_tables.get(s).and_then(|t| t.as_deref());
                compare_region(
                    sink,
                    format!("InputToOutputTable[{s}]"),
                    et.map(|t| expand_table(t, ein, eo)),
                    at.map(|t| expand_table(t, ain, ao)),
                );
            }
            let epc = ei.sig_patch_const_vectors as u32 * 4;
            let apc = ai.sig_patch_const_vectors as u32 * 4;
            compare_region(
                sink,
                "ViewIdPatchConstMask".to_owned(),
                e.patch_const_mask.as_deref().map(|m| expand_mask(m, epc)),
                a.patch_const_mask.as_deref().map(|m| expand_mask(m, apc)),
            );
            compare_region(
                sink,
                "InputToPatchConstTable".to_owned(),
                e.input_to_patch_const
                    .as_deref()
                    .map(|t| expand_table(t, ei.sig_input_vectors as u32 * 4, epc)),
                a.input_to_patch_const
                    .as_deref()
                    .map(|t| expand_table(t, ai.sig_input_vectors as u32 * 4, apc)),
            );
            compare_region(
                sink,
                "PatchConstToOutputTable".to_owned(),
                e.patch_const_to_output
                    .as_deref()
                    .map(|t| expand_table(t, epc, ei.sig_output_vectors[0] as u32 * 4)),
                a.patch_const_to_output
                    .as_deref()
                    .map(|t| expand_table(t, apc, ai.sig_output_vectors[0] as u32 * 4)),
            );
        }
    }
}

fn compare_region(
    sink: &mut DiagnosticsSink,
    field: String,
    expected: Option<Vec<bool>>,
    actual: Option<Vec<bool>>,
) {
    let part = PART_PSV;
    match (expected, actual) {
        (None, None) => {}
        (Some(_), None) => diff(sink, part, field, "present", "absent"),
        (None, Some(_)) => diff(sink, part, field, "absent", "present"),
        (Some(e), Some(a)) => {
            if e != a {
                sink.report(Diagnostic::Mismatch {
                    part,
                    field,
                    expected: set_bits(&e),
                    actual: set_bits(&a),
                });
            }
        }
    }
}

fn compare_rdat(
    sink: &mut DiagnosticsSink,
    expected: &RdatPart,
    actual: &RdatPart,
) -> Result<(), ContainerError> {
    let part = PART_RUNTIME_DATA;
    diff(
        sink,
        part,
        "resource record count",
        expected.resource_records.len(),
        actual.resource_records.len(),
    );
    for (i, (e, a)) in expected
        .resource_records
        .iter()
        .zip(&actual.resource_records)
        .enumerate()
    {
        diff(sink, part, format!("Resource[{i}].class"), e.class, a.class);
        diff(sink, part, format!("Resource[{i}].kind"), e.kind, a.kind);
        diff(sink, part, format!("Resource[{i}].index"), e.resource_index, a.resource_index);
        diff(sink, part, format!("Resource[{i}].space"), e.space, a.space);
        diff(sink, part, format!("Resource[{i}].lower_bound"), e.lower_bound, a.lower_bound);
        diff(sink, part, format!("Resource[{i}].upper_bound"), e.upper_bound, a.upper_bound);
        diff(sink, part, format!("Resource[{i}].flags"), e.flags, a.flags);
        diff(
            sink,
            part,
            format!("Resource[{i}].name"),
            expected.string_at(e.name_offset)?,
            actual.string_at(a.name_offset)?,
        );
    }

    diff(
        sink,
        part,
        "function record count",
        expected.function_records.len(),
        actual.function_records.len(),
    );
    for (i, (e, a)) in expected
        .function_records
        .iter()
        .zip(&actual.function_records)
        .enumerate()
    {
        diff(
            sink,
            part,
            format!("Function[{i}].name"),
            expected.string_at(e.name_offset)?,
            actual.string_at(a.name_offset)?,
        );
        diff(
            sink,
            part,
            format!("Function[{i}].unmangled_name"),
            expected.string_at(e.unmangled_name_offset)?,
            actual.string_at(a.unmangled_name_offset)?,
        );
        diff(sink, part, format!("Function[{i}].shader_stage"), e.shader_stage, a.shader_stage);
        diff(sink, part, format!("Function[{i}].min_target"), e.min_target, a.min_target);
        diff(sink, part, format!("Function[{i}].payload_size"), e.payload_size, a.payload_size);
        diff(
            sink,
            part,
            format!("Function[{i}].attribute_size"),
            e.attribute_size,
            a.attribute_size,
        );
        diff(
            sink,
            part,
            format!("Function[{i}].feature_flags"),
            format!("{:#x}", e.feature_flags),
            format!("{:#x}", a.feature_flags),
        );
        diff(
            sink,
            part,
            format!("Function[{i}].resources"),
            format!("{:?}", expected.index_run(e.resources_offset, e.resources_count)?),
            format!("{:?}", actual.index_run(a.resources_offset, a.resources_count)?),
        );
        let resolve_deps = |p: &RdatPart, offset, count| -> Result<Vec<String>, ContainerError> {
            p.index_run(offset, count)?
                .iter()
                .map(|&o| p.string_at(o).map(str::to_owned))
                .collect()
        };
        diff(
            sink,
            part,
            format!("Function[{i}].dependencies"),
            format!("{:?}", resolve_deps(expected, e.deps_offset, e.deps_count)?),
            format!("{:?}", resolve_deps(actual, a.deps_offset, a.deps_count)?),
        );
    }
    Ok(())
}
