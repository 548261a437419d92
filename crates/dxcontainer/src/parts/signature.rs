//! Program signature parts (`ISG1`, `OSG1`, `PSG1`).
//!
//! Layout: `{param_count:u32, param_offset:u32}`, then `param_count` 32-byte
//! element records, then the semantic-name string table. Two legacy modes
//! exist, selected by the format-version threshold: at or above
//! [`crate::module::DEDUP_VERSION`] duplicate semantic names are
//! deduplicated and the part is padded to 4 bytes; below it, names are
//! appended per record and no padding is emitted.

use crate::error::ContainerError;
use crate::fourcc::FourCC;
use crate::module::{FormatVersion, SignatureElement, TessellatorDomain};
use crate::parts::PartWriter;
use crate::reader::ByteReader;
use crate::sigelem::{
    expand_rows, read_program_record, serialization_order, write_program_record,
    ProgramElementRecord, PROGRAM_ELEMENT_SIZE,
};
use crate::tables::StringTableBuilder;

const SIGNATURE_HEADER_SIZE: u32 = 8;

/// Writer for one program signature part.
pub struct SignaturePartWriter {
    fourcc: FourCC,
    records: Vec<ProgramElementRecord>,
    name_offsets: Vec<u32>,
    string_bytes: Vec<u8>,
}

impl SignaturePartWriter {
    /// Lays out `signature` for serialization.
    ///
    /// `domain` disambiguates tessellation-factor system values;
    /// `i1_to_unknown_compat` selects the legacy boolean component encoding.
    /// All encoding failures surface here, never at write time.
    pub fn new(
        fourcc: FourCC,
        signature: &[SignatureElement],
        domain: TessellatorDomain,
        version: FormatVersion,
        i1_to_unknown_compat: bool,
    ) -> Result<Self, ContainerError> {
        let mut records = Vec::new();
        for &index in &serialization_order(signature) {
            records.extend(expand_rows(&signature[index], domain, i1_to_unknown_compat)?);
        }

        // String offsets are relative to the part start, so the table is
        // built first and rebased past the header and record array.
        let mut table = StringTableBuilder::new(version.aligned());
        let base = SIGNATURE_HEADER_SIZE + PROGRAM_ELEMENT_SIZE * records.len() as u32;
        let name_offsets = records
            .iter()
            .map(|record| base + table.insert_string(&record.semantic_name))
            .collect();
        let string_bytes = table.finalize(version.aligned());

        Ok(Self {
            fourcc,
            records,
            name_offsets,
            string_bytes,
        })
    }

    /// The row-expanded records in serialization order.
    pub fn records(&self) -> &[ProgramElementRecord] {
        &self.records
    }
}

impl PartWriter for SignaturePartWriter {
    fn fourcc(&self) -> FourCC {
        self.fourcc
    }

    fn size(&self) -> u32 {
        SIGNATURE_HEADER_SIZE
            + PROGRAM_ELEMENT_SIZE * self.records.len() as u32
            + self.string_bytes.len() as u32
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        out.extend_from_slice(&SIGNATURE_HEADER_SIZE.to_le_bytes());
        for (record, &name_offset) in self.records.iter().zip(&self.name_offsets) {
            write_program_record(out, record, name_offset);
        }
        out.extend_from_slice(&self.string_bytes);
    }
}

/// Parses a program signature part into its records.
///
/// The input is untrusted: the record table and every semantic-name offset
/// are bounds-checked against the part size, and the string table must end
/// exactly where the part does. `version` selects the string-table mode the
/// part was written in, since the two modes end differently: aligned parts
/// carry up to three trailing NUL pad bytes, legacy parts none.
pub fn parse_signature_part(
    fourcc: FourCC,
    bytes: &[u8],
    version: FormatVersion,
) -> Result<Vec<ProgramElementRecord>, ContainerError> {
    let mut r = ByteReader::new(fourcc, bytes);
    let param_count = r.read_u32("param_count")?;
    let param_offset = r.read_u32("param_offset")?;

    if param_offset != SIGNATURE_HEADER_SIZE {
        return Err(ContainerError::not_well_formed(
            fourcc,
            format!("param_offset {param_offset} must equal header size {SIGNATURE_HEADER_SIZE}"),
        ));
    }

    let table_bytes = (param_count as usize)
        .checked_mul(PROGRAM_ELEMENT_SIZE as usize)
        .ok_or_else(|| {
            ContainerError::not_well_formed(fourcc, "param_count overflows table size".to_owned())
        })?;
    if table_bytes > bytes.len().saturating_sub(SIGNATURE_HEADER_SIZE as usize) {
        return Err(ContainerError::not_well_formed(
            fourcc,
            format!(
                "element table of {table_bytes} bytes is outside part size {}",
                bytes.len()
            ),
        ));
    }

    let string_base = SIGNATURE_HEADER_SIZE as usize + table_bytes;
    let mut records = Vec::with_capacity(param_count as usize);
    // Running total over the string table: the conventional empty string at
    // its start, then the furthest name terminator any record points at.
    let mut strings_end = string_base + 1;
    for index in 0..param_count as usize {
        let (record, name_end) = read_program_record(&mut r, index, string_base)?;
        strings_end = strings_end.max(name_end);
        records.push(record);
    }

    if version.aligned() {
        let padded_end = strings_end.next_multiple_of(4);
        if bytes.len() != padded_end {
            return Err(ContainerError::not_well_formed(
                fourcc,
                format!(
                    "part size {} does not match string table ending at {strings_end} plus alignment padding",
                    bytes.len()
                ),
            ));
        }
        if bytes[strings_end..].iter().any(|&b| b != 0) {
            return Err(ContainerError::not_well_formed(
                fourcc,
                format!("non-NUL bytes in string table padding at offset {strings_end}"),
            ));
        }
    } else if bytes.len() != strings_end {
        return Err(ContainerError::not_well_formed(
            fourcc,
            format!(
                "part size {} does not match string table ending at {strings_end}",
                bytes.len()
            ),
        ));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourcc::PART_INPUT_SIGNATURE;
    use crate::module::{
        ComponentType, InterpolationMode, MinPrecision, SemanticKind, DEDUP_VERSION,
    };

    fn element(name: &str, row: u8) -> SignatureElement {
        SignatureElement {
            name: name.to_owned(),
            indices: vec![0],
            kind: SemanticKind::Arbitrary,
            component_type: ComponentType::F32,
            interpolation: InterpolationMode::Linear,
            rows: 1,
            start_row: row,
            cols: 4,
            start_col: 0,
            usage_mask: 0xF,
            dynamic_mask: 0,
            min_precision: MinPrecision::Default,
            stream: 0,
        }
    }

    fn write_part(writer: &SignaturePartWriter) -> Vec<u8> {
        let mut out = Vec::new();
        writer.write(&mut out);
        assert_eq!(out.len() as u32, writer.size(), "size/write contract");
        out
    }

    #[test]
    fn signature_part_roundtrips() {
        let sig = vec![element("TEXCOORD", 1), element("POSITION", 0)];
        let writer = SignaturePartWriter::new(
            PART_INPUT_SIGNATURE,
            &sig,
            TessellatorDomain::Undefined,
            DEDUP_VERSION,
            false,
        )
        .expect("writer construction");
        let bytes = write_part(&writer);

        let records =
            parse_signature_part(PART_INPUT_SIGNATURE, &bytes, DEDUP_VERSION).expect("parse");
        assert_eq!(records.len(), 2);
        // Serialization order is (stream, register, name), not declaration order.
        assert_eq!(records[0].semantic_name, "POSITION");
        assert_eq!(records[0].register, 0);
        assert_eq!(records[1].semantic_name, "TEXCOORD");
        assert_eq!(records[1].register, 1);
        assert_eq!(records, writer.records());
    }

    #[test]
    fn aligned_mode_dedups_names_and_pads() {
        let mut a = element("TEXCOORD", 0);
        a.indices = vec![0];
        let mut b = element("TEXCOORD", 1);
        b.indices = vec![1];

        let aligned = SignaturePartWriter::new(
            PART_INPUT_SIGNATURE,
            &[a.clone(), b.clone()],
            TessellatorDomain::Undefined,
            DEDUP_VERSION,
            false,
        )
        .unwrap();
        let legacy = SignaturePartWriter::new(
            PART_INPUT_SIGNATURE,
            &[a, b],
            TessellatorDomain::Undefined,
            FormatVersion::new(1, 0),
            false,
        )
        .unwrap();

        assert_eq!(aligned.size() % 4, 0);
        // Legacy mode stores the name once per record; aligned mode once.
        assert!(legacy.size() > aligned.size());

        let records = parse_signature_part(
            PART_INPUT_SIGNATURE,
            &write_part(&legacy),
            FormatVersion::new(1, 0),
        )
        .unwrap();
        assert_eq!(records[0].semantic_name, "TEXCOORD");
        assert_eq!(records[1].semantic_name, "TEXCOORD");
    }

    fn one_element_part(version: FormatVersion) -> Vec<u8> {
        let sig = vec![element("POSITION", 0)];
        let writer = SignaturePartWriter::new(
            PART_INPUT_SIGNATURE,
            &sig,
            TessellatorDomain::Undefined,
            version,
            false,
        )
        .unwrap();
        write_part(&writer)
    }

    #[test]
    fn truncated_element_table_is_rejected() {
        let bytes = one_element_part(DEDUP_VERSION);
        for len in 0..bytes.len() {
            let err = parse_signature_part(PART_INPUT_SIGNATURE, &bytes[..len], DEDUP_VERSION);
            assert!(err.is_err(), "prefix of {len} bytes should not parse");
        }
    }

    #[test]
    fn legacy_parts_must_end_exactly_at_the_string_table() {
        let version = FormatVersion::new(1, 0);
        let sig = vec![element("POSITION", 0), element("TEXCOORD", 1)];
        let writer = SignaturePartWriter::new(
            PART_INPUT_SIGNATURE,
            &sig,
            TessellatorDomain::Undefined,
            version,
            false,
        )
        .unwrap();
        let bytes = write_part(&writer);
        for len in 0..bytes.len() {
            let err = parse_signature_part(PART_INPUT_SIGNATURE, &bytes[..len], version);
            assert!(err.is_err(), "prefix of {len} bytes should not parse");
        }
        let mut longer = bytes.clone();
        longer.push(0);
        assert!(parse_signature_part(PART_INPUT_SIGNATURE, &longer, version).is_err());
    }

    #[test]
    fn trailing_bytes_and_tampered_padding_are_rejected() {
        let bytes = one_element_part(DEDUP_VERSION);
        assert_eq!(bytes.len() % 4, 0);

        let mut longer = bytes.clone();
        longer.extend_from_slice(&[0u8; 4]);
        assert!(parse_signature_part(PART_INPUT_SIGNATURE, &longer, DEDUP_VERSION).is_err());

        // The one-element "POSITION" part ends in alignment NULs.
        let mut dirty_pad = bytes.clone();
        *dirty_pad.last_mut().unwrap() = 7;
        assert!(parse_signature_part(PART_INPUT_SIGNATURE, &dirty_pad, DEDUP_VERSION).is_err());
    }

    #[test]
    fn name_offsets_before_the_string_table_are_rejected() {
        let mut bytes = one_element_part(DEDUP_VERSION);
        // First record starts at 8; its name offset would point at the header.
        bytes[8..12].copy_from_slice(&0u32.to_le_bytes());
        let err =
            parse_signature_part(PART_INPUT_SIGNATURE, &bytes, DEDUP_VERSION).unwrap_err();
        assert!(matches!(err, ContainerError::NotWellFormed { .. }));
    }

    #[test]
    fn unknown_system_value_codes_are_rejected() {
        let mut bytes = one_element_part(DEDUP_VERSION);
        // system_value is the third word of the first record.
        bytes[16..20].copy_from_slice(&99u32.to_le_bytes());
        let err =
            parse_signature_part(PART_INPUT_SIGNATURE, &bytes, DEDUP_VERSION).unwrap_err();
        assert!(matches!(err, ContainerError::NotWellFormed { .. }));
    }
}
