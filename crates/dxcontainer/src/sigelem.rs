//! Signature element codec: semantic slots ⇄ fixed binary records.
//!
//! Two record shapes exist: the 32-byte program-signature record used by the
//! `ISG1`/`OSG1`/`PSG1` parts (one record per occupied row) and the 16-byte
//! PSV record that references the shared string/index pools.

use crate::error::ContainerError;
use crate::fourcc::FourCC;
use crate::module::{
    ComponentType, InterpolationMode, MinPrecision, SemanticKind, SignatureElement,
    TessellatorDomain,
};
use crate::reader::ByteReader;

/// Size of one program-signature element record.
pub const PROGRAM_ELEMENT_SIZE: u32 = 32;
/// Size of one PSV signature element record.
pub const PSV_ELEMENT_SIZE: u32 = 16;

/// Register value stored for elements the packer skipped.
pub const UNALLOCATED_REGISTER: u32 = u32::MAX;

// Binary system-value codes used by program signature records.
const SV_UNDEFINED: u32 = 0;
const SV_POSITION: u32 = 1;
const SV_CLIP_DISTANCE: u32 = 2;
const SV_CULL_DISTANCE: u32 = 3;
const SV_VERTEX_ID: u32 = 6;
const SV_PRIMITIVE_ID: u32 = 7;
const SV_INSTANCE_ID: u32 = 8;
const SV_IS_FRONT_FACE: u32 = 9;
const SV_SAMPLE_INDEX: u32 = 10;
const SV_QUAD_EDGE_TESS: u32 = 11;
const SV_QUAD_INSIDE_TESS: u32 = 12;
const SV_TRI_EDGE_TESS: u32 = 13;
const SV_TRI_INSIDE_TESS: u32 = 14;
const SV_LINE_DETAIL_TESS: u32 = 15;
const SV_BARYCENTRICS: u32 = 23;
const SV_VIEW_ID: u32 = 26;
const SV_TARGET: u32 = 64;
const SV_DEPTH: u32 = 65;
const SV_COVERAGE: u32 = 66;

// Register component type codes.
const REG_COMP_UNKNOWN: u32 = 0;
const REG_COMP_UINT32: u32 = 1;
const REG_COMP_SINT32: u32 = 2;
const REG_COMP_FLOAT32: u32 = 3;
const REG_COMP_UINT16: u32 = 4;
const REG_COMP_SINT16: u32 = 5;
const REG_COMP_FLOAT16: u32 = 6;
const REG_COMP_UINT64: u32 = 7;
const REG_COMP_SINT64: u32 = 8;
const REG_COMP_FLOAT64: u32 = 9;
const REG_COMP_BOOL: u32 = 10;

/// Maps a semantic kind to its binary system-value code.
///
/// The two tessellation-factor semantics need the tessellator domain to pick
/// among several codes; an isoline domain has no inside-factor code at all,
/// which is a hard error if encountered.
pub fn encode_system_value(
    kind: SemanticKind,
    domain: TessellatorDomain,
    semantic_name: &str,
) -> Result<u32, ContainerError> {
    let code = match kind {
        SemanticKind::Arbitrary => SV_UNDEFINED,
        SemanticKind::Position => SV_POSITION,
        SemanticKind::ClipDistance => SV_CLIP_DISTANCE,
        SemanticKind::CullDistance => SV_CULL_DISTANCE,
        SemanticKind::VertexId => SV_VERTEX_ID,
        SemanticKind::PrimitiveId => SV_PRIMITIVE_ID,
        SemanticKind::InstanceId => SV_INSTANCE_ID,
        SemanticKind::IsFrontFace => SV_IS_FRONT_FACE,
        SemanticKind::SampleIndex => SV_SAMPLE_INDEX,
        SemanticKind::Barycentrics => SV_BARYCENTRICS,
        SemanticKind::ViewId => SV_VIEW_ID,
        SemanticKind::Target => SV_TARGET,
        SemanticKind::Depth => SV_DEPTH,
        SemanticKind::Coverage => SV_COVERAGE,
        SemanticKind::TessFactor => match domain {
            TessellatorDomain::Isoline => SV_LINE_DETAIL_TESS,
            TessellatorDomain::Tri => SV_TRI_EDGE_TESS,
            TessellatorDomain::Quad => SV_QUAD_EDGE_TESS,
            TessellatorDomain::Undefined => {
                return Err(ContainerError::UnencodableSemantic {
                    semantic: semantic_name.to_owned(),
                    reason: "tessellation factor requires a tessellator domain".to_owned(),
                })
            }
        },
        SemanticKind::InsideTessFactor => match domain {
            TessellatorDomain::Tri => SV_TRI_INSIDE_TESS,
            TessellatorDomain::Quad => SV_QUAD_INSIDE_TESS,
            TessellatorDomain::Isoline => {
                return Err(ContainerError::UnencodableSemantic {
                    semantic: semantic_name.to_owned(),
                    reason: "isoline domains have no inside tessellation factor".to_owned(),
                })
            }
            TessellatorDomain::Undefined => {
                return Err(ContainerError::UnencodableSemantic {
                    semantic: semantic_name.to_owned(),
                    reason: "inside tessellation factor requires a tessellator domain".to_owned(),
                })
            }
        },
        SemanticKind::Invalid => {
            return Err(ContainerError::UnencodableSemantic {
                semantic: semantic_name.to_owned(),
                reason: "invalid semantic kind".to_owned(),
            })
        }
    };
    Ok(code)
}

/// Inverse of [`encode_system_value`]. The per-domain tessellation codes all
/// collapse back onto the two source-level kinds.
pub fn decode_system_value(code: u32) -> SemanticKind {
    match code {
        SV_UNDEFINED => SemanticKind::Arbitrary,
        SV_POSITION => SemanticKind::Position,
        SV_CLIP_DISTANCE => SemanticKind::ClipDistance,
        SV_CULL_DISTANCE => SemanticKind::CullDistance,
        SV_VERTEX_ID => SemanticKind::VertexId,
        SV_PRIMITIVE_ID => SemanticKind::PrimitiveId,
        SV_INSTANCE_ID => SemanticKind::InstanceId,
        SV_IS_FRONT_FACE => SemanticKind::IsFrontFace,
        SV_SAMPLE_INDEX => SemanticKind::SampleIndex,
        SV_QUAD_EDGE_TESS | SV_TRI_EDGE_TESS | SV_LINE_DETAIL_TESS => SemanticKind::TessFactor,
        SV_QUAD_INSIDE_TESS | SV_TRI_INSIDE_TESS => SemanticKind::InsideTessFactor,
        SV_BARYCENTRICS => SemanticKind::Barycentrics,
        SV_VIEW_ID => SemanticKind::ViewId,
        SV_TARGET => SemanticKind::Target,
        SV_DEPTH => SemanticKind::Depth,
        SV_COVERAGE => SemanticKind::Coverage,
        _ => SemanticKind::Invalid,
    }
}

/// Maps a component type to its register-component code.
///
/// `i1_to_unknown_compat` is a historical quirk kept for bit-compatibility:
/// older consumers expect boolean components encoded as the generic
/// 32-bit-unsigned code, never the dedicated boolean code that later
/// replaced it. It changes nothing else.
pub fn encode_component_type(ct: ComponentType, i1_to_unknown_compat: bool) -> u32 {
    match ct {
        ComponentType::Unknown => REG_COMP_UNKNOWN,
        ComponentType::I1 => {
            if i1_to_unknown_compat {
                REG_COMP_UINT32
            } else {
                REG_COMP_BOOL
            }
        }
        ComponentType::I16 => REG_COMP_SINT16,
        ComponentType::U16 => REG_COMP_UINT16,
        ComponentType::I32 => REG_COMP_SINT32,
        ComponentType::U32 => REG_COMP_UINT32,
        ComponentType::I64 => REG_COMP_SINT64,
        ComponentType::U64 => REG_COMP_UINT64,
        ComponentType::F16 => REG_COMP_FLOAT16,
        ComponentType::F32 => REG_COMP_FLOAT32,
        ComponentType::F64 => REG_COMP_FLOAT64,
    }
}

/// One decoded program-signature record. Field-for-field comparable, which
/// is what the cross-validator diffs.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ProgramElementRecord {
    /// Semantic name resolved from the part's string table.
    pub semantic_name: String,
    /// Semantic index for this row.
    pub semantic_index: u32,
    /// Binary system-value code.
    pub system_value: u32,
    /// Register component code.
    pub component_type: u32,
    /// Register, or [`UNALLOCATED_REGISTER`].
    pub register: u32,
    /// Component presence mask.
    pub mask: u8,
    /// Read/write usage mask.
    pub read_write_mask: u8,
    /// Output stream.
    pub stream: u32,
    /// Minimum-precision code.
    pub min_precision: u32,
}

/// Returns element indices of `signature` in serialization order: ascending
/// `(stream, register, semantic_name)` regardless of declaration order.
/// Unallocated elements sort after all allocated ones.
pub fn serialization_order(signature: &[SignatureElement]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..signature.len()).collect();
    order.sort_by(|&a, &b| {
        let ea = &signature[a];
        let eb = &signature[b];
        let reg = |e: &SignatureElement| {
            if e.is_allocated() {
                e.start_row as u32
            } else {
                UNALLOCATED_REGISTER
            }
        };
        (ea.stream, reg(ea), ea.name.as_str()).cmp(&(eb.stream, reg(eb), eb.name.as_str()))
    });
    order
}

/// Expands one element into its per-row program records.
///
/// A multi-row semantic is split into per-row records only when allocated;
/// unallocated elements keep a single record with the register sentinel, and
/// callers must not advance registers for them.
pub fn expand_rows(
    element: &SignatureElement,
    domain: TessellatorDomain,
    i1_to_unknown_compat: bool,
) -> Result<Vec<ProgramElementRecord>, ContainerError> {
    let system_value = encode_system_value(element.kind, domain, &element.name)?;
    let component_type = encode_component_type(element.component_type, i1_to_unknown_compat);
    let mask = element_column_mask(element);

    let row_count = if element.is_allocated() {
        element.rows.max(1) as usize
    } else {
        1
    };

    let mut records = Vec::with_capacity(row_count);
    for row in 0..row_count {
        let register = if element.is_allocated() {
            element.start_row as u32 + row as u32
        } else {
            UNALLOCATED_REGISTER
        };
        records.push(ProgramElementRecord {
            semantic_name: element.name.clone(),
            semantic_index: element.indices.get(row).copied().unwrap_or(0),
            system_value,
            component_type,
            register,
            mask,
            read_write_mask: element.usage_mask & 0xF,
            stream: element.stream as u32,
            min_precision: element.min_precision.as_u8() as u32,
        });
    }
    Ok(records)
}

fn element_column_mask(element: &SignatureElement) -> u8 {
    let cols = element.cols.clamp(1, 4);
    let base = (1u8 << cols) - 1;
    (base << element.start_col) & 0xF
}

/// Writes one 32-byte program record; `name_offset` points into the part's
/// string table.
pub fn write_program_record(out: &mut Vec<u8>, record: &ProgramElementRecord, name_offset: u32) {
    out.extend_from_slice(&name_offset.to_le_bytes());
    out.extend_from_slice(&record.semantic_index.to_le_bytes());
    out.extend_from_slice(&record.system_value.to_le_bytes());
    out.extend_from_slice(&record.component_type.to_le_bytes());
    out.extend_from_slice(&record.register.to_le_bytes());
    out.push(record.mask);
    out.push(record.read_write_mask);
    out.extend_from_slice(&0u16.to_le_bytes()); // pad
    out.extend_from_slice(&record.stream.to_le_bytes());
    out.extend_from_slice(&record.min_precision.to_le_bytes());
}

/// Reads one 32-byte program record, resolving the name through the chunk's
/// own bytes. The name offset is range-checked, never trusted: it must land
/// in the string table starting at `string_base`. Returns the record and the
/// end offset of its name (terminator included) so the caller can account
/// for the full string-table span.
pub fn read_program_record(
    r: &mut ByteReader<'_>,
    index: usize,
    string_base: usize,
) -> Result<(ProgramElementRecord, usize), ContainerError> {
    let name_offset = r.read_u32("semantic_name_offset")? as usize;
    let semantic_index = r.read_u32("semantic_index")?;
    let system_value = r.read_u32("system_value")?;
    let component_type = r.read_u32("component_type")?;
    let register = r.read_u32("register")?;
    let mask = r.read_u8("mask")?;
    let read_write_mask = r.read_u8("read_write_mask")?;
    let _pad = r.read_u16("pad")?;
    let stream = r.read_u32("stream")?;
    let min_precision = r.read_u32("min_precision")?;

    if decode_system_value(system_value) == SemanticKind::Invalid {
        return Err(ContainerError::not_well_formed(
            r.part(),
            format!("element {index} has unknown system value code {system_value}"),
        ));
    }
    if name_offset < string_base {
        return Err(ContainerError::not_well_formed(
            r.part(),
            format!(
                "element {index} semantic_name offset {name_offset} points before the string table at {string_base}"
            ),
        ));
    }
    let semantic_name = r
        .read_cstring_at(name_offset, &format!("element {index} semantic_name"))?
        .to_owned();
    let name_end = name_offset + semantic_name.len() + 1;

    let record = ProgramElementRecord {
        semantic_name,
        semantic_index,
        system_value,
        component_type,
        register,
        mask,
        read_write_mask,
        stream,
        min_precision,
    };
    Ok((record, name_end))
}

/// One raw 16-byte PSV signature element record.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct PsvElementRecord {
    /// Offset of the semantic name in the PSV string table.
    pub name_offset: u32,
    /// Element offset of the per-row indices in the semantic index table.
    pub indexes_offset: u32,
    /// Occupied rows.
    pub rows: u8,
    /// First row, or [`crate::module::UNALLOCATED_ROW`].
    pub start_row: u8,
    /// Low nibble: column count; bits 4..6: start column.
    pub cols_and_start: u8,
    /// Semantic kind code.
    pub semantic_kind: u8,
    /// Component type code.
    pub component_type: u8,
    /// Interpolation mode code.
    pub interpolation: u8,
    /// Low nibble: dynamic index mask; bits 4..6: output stream.
    pub dynamic_mask_and_stream: u8,
    /// Reserved, written as zero.
    pub reserved: u8,
}

impl PsvElementRecord {
    /// Builds the record for `element`, with pool references already interned.
    pub fn encode(element: &SignatureElement, name_offset: u32, indexes_offset: u32) -> Self {
        Self {
            name_offset,
            indexes_offset,
            rows: element.rows.max(1),
            start_row: element.start_row,
            cols_and_start: (element.cols.clamp(1, 4) & 0xF) | ((element.start_col & 0x3) << 4),
            semantic_kind: element.kind.as_u8(),
            component_type: element.component_type.as_u8(),
            interpolation: element.interpolation.as_u8(),
            dynamic_mask_and_stream: (element.dynamic_mask & 0xF) | ((element.stream & 0x3) << 4),
            reserved: 0,
        }
    }

    /// Appends the 16 record bytes.
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.name_offset.to_le_bytes());
        out.extend_from_slice(&self.indexes_offset.to_le_bytes());
        out.push(self.rows);
        out.push(self.start_row);
        out.push(self.cols_and_start);
        out.push(self.semantic_kind);
        out.push(self.component_type);
        out.push(self.interpolation);
        out.push(self.dynamic_mask_and_stream);
        out.push(self.reserved);
    }

    /// Reads one record.
    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, ContainerError> {
        Ok(Self {
            name_offset: r.read_u32("psv element name_offset")?,
            indexes_offset: r.read_u32("psv element indexes_offset")?,
            rows: r.read_u8("psv element rows")?,
            start_row: r.read_u8("psv element start_row")?,
            cols_and_start: r.read_u8("psv element cols_and_start")?,
            semantic_kind: r.read_u8("psv element semantic_kind")?,
            component_type: r.read_u8("psv element component_type")?,
            interpolation: r.read_u8("psv element interpolation")?,
            dynamic_mask_and_stream: r.read_u8("psv element dynamic_mask_and_stream")?,
            reserved: r.read_u8("psv element reserved")?,
        })
    }

    /// Column count.
    pub fn cols(&self) -> u8 {
        self.cols_and_start & 0xF
    }

    /// Start column.
    pub fn start_col(&self) -> u8 {
        (self.cols_and_start >> 4) & 0x3
    }

    /// Output stream.
    pub fn stream(&self) -> u8 {
        (self.dynamic_mask_and_stream >> 4) & 0x3
    }
}

/// A PSV element resolved against its owning pools, comparable field by
/// field against a module-derived [`SignatureElement`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DecodedPsvElement {
    /// Semantic name resolved from the string table.
    pub name: String,
    /// Per-row semantic indices resolved from the index table.
    pub indices: Vec<u32>,
    /// The raw record.
    pub record: PsvElementRecord,
    /// Semantic kind decoded from the record.
    pub kind: SemanticKind,
    /// Component type decoded from the record.
    pub component_type: ComponentType,
    /// Interpolation mode decoded from the record.
    pub interpolation: InterpolationMode,
    /// Minimum precision is not stored in the PSV record; kept for symmetry
    /// with the program record and always `Default` on decode.
    pub min_precision: MinPrecision,
}

/// Resolves `record` against the PSV string table and semantic index table,
/// rejecting out-of-range pool references.
pub fn decode_psv_element(
    part: FourCC,
    record: PsvElementRecord,
    string_table: &[u8],
    index_table: &[u32],
) -> Result<DecodedPsvElement, ContainerError> {
    let name_offset = record.name_offset as usize;
    if name_offset >= string_table.len() {
        return Err(ContainerError::not_well_formed(
            part,
            format!(
                "SignatureElement semantic_name offset {name_offset} is outside StringTable size {}",
                string_table.len()
            ),
        ));
    }
    let tail = &string_table[name_offset..];
    let nul = tail.iter().position(|&b| b == 0).ok_or_else(|| {
        ContainerError::not_well_formed(
            part,
            format!("StringTable entry at {name_offset} is missing a null terminator"),
        )
    })?;
    let name = core::str::from_utf8(&tail[..nul])
        .map_err(|_| {
            ContainerError::not_well_formed(
                part,
                format!("StringTable entry at {name_offset} is not valid UTF-8"),
            )
        })?
        .to_owned();

    let rows = record.rows.max(1) as usize;
    let start = record.indexes_offset as usize;
    let end = start.checked_add(rows).ok_or_else(|| {
        ContainerError::not_well_formed(part, "SemanticIndexTable reference overflows".to_owned())
    })?;
    if end > index_table.len() {
        return Err(ContainerError::not_well_formed(
            part,
            format!(
                "SemanticIndexTable reference {start}..{end} is outside table of {} entries",
                index_table.len()
            ),
        ));
    }
    let indices = index_table[start..end].to_vec();

    Ok(DecodedPsvElement {
        name,
        indices,
        kind: SemanticKind::from_u8(record.semantic_kind),
        component_type: ComponentType::from_u8(record.component_type),
        interpolation: InterpolationMode::from_u8(record.interpolation),
        min_precision: MinPrecision::Default,
        record,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourcc::PART_PSV;
    use crate::module::UNALLOCATED_ROW;

    fn arbitrary_element(name: &str, row: u8) -> SignatureElement {
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

    #[test]
    fn tess_factor_codes_depend_on_domain() {
        let quad =
            encode_system_value(SemanticKind::TessFactor, TessellatorDomain::Quad, "SV_TessFactor")
                .unwrap();
        let tri =
            encode_system_value(SemanticKind::TessFactor, TessellatorDomain::Tri, "SV_TessFactor")
                .unwrap();
        let line = encode_system_value(
            SemanticKind::TessFactor,
            TessellatorDomain::Isoline,
            "SV_TessFactor",
        )
        .unwrap();
        assert_eq!(quad, SV_QUAD_EDGE_TESS);
        assert_eq!(tri, SV_TRI_EDGE_TESS);
        assert_eq!(line, SV_LINE_DETAIL_TESS);
        for code in [quad, tri, line] {
            assert_eq!(decode_system_value(code), SemanticKind::TessFactor);
        }
    }

    #[test]
    fn isoline_inside_tess_factor_is_a_hard_error() {
        let err = encode_system_value(
            SemanticKind::InsideTessFactor,
            TessellatorDomain::Isoline,
            "SV_InsideTessFactor",
        )
        .unwrap_err();
        assert!(matches!(err, ContainerError::UnencodableSemantic { .. }));
    }

    #[test]
    fn i1_component_encoding_depends_on_compat_flag() {
        assert_eq!(encode_component_type(ComponentType::I1, true), REG_COMP_UINT32);
        assert_eq!(encode_component_type(ComponentType::I1, false), REG_COMP_BOOL);
        // The flag changes nothing else.
        assert_eq!(
            encode_component_type(ComponentType::F32, true),
            encode_component_type(ComponentType::F32, false)
        );
    }

    #[test]
    fn serialization_order_is_stream_register_name() {
        let mut b = arbitrary_element("B", 0);
        b.stream = 0;
        let mut a = arbitrary_element("A", 0);
        a.stream = 0;
        let mut c = arbitrary_element("C", 1);
        c.stream = 0;
        let mut s1 = arbitrary_element("A", 0);
        s1.stream = 1;
        let sig = vec![s1.clone(), c.clone(), b.clone(), a.clone()];
        let order = serialization_order(&sig);
        let names: Vec<(&str, u8)> = order
            .iter()
            .map(|&i| (sig[i].name.as_str(), sig[i].stream))
            .collect();
        assert_eq!(names, vec![("A", 0), ("B", 0), ("C", 0), ("A", 1)]);
    }

    #[test]
    fn unallocated_elements_sort_last_and_keep_one_row() {
        let mut unalloc = arbitrary_element("Z", UNALLOCATED_ROW);
        unalloc.rows = 3;
        unalloc.indices = vec![0, 1, 2];
        let alloc = arbitrary_element("A", 5);
        let sig = vec![unalloc.clone(), alloc.clone()];
        let order = serialization_order(&sig);
        assert_eq!(order, vec![1, 0]);

        let records = expand_rows(&unalloc, TessellatorDomain::Undefined, false).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].register, UNALLOCATED_REGISTER);
    }

    #[test]
    fn allocated_multi_row_elements_expand_per_row() {
        let mut element = arbitrary_element("M", 2);
        element.rows = 3;
        element.indices = vec![0, 1, 2];
        let records = expand_rows(&element, TessellatorDomain::Undefined, false).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(
            records.iter().map(|r| r.register).collect::<Vec<_>>(),
            vec![2, 3, 4]
        );
        assert_eq!(
            records.iter().map(|r| r.semantic_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn psv_element_decode_rejects_out_of_range_pool_references() {
        let record = PsvElementRecord {
            name_offset: 100,
            indexes_offset: 0,
            rows: 1,
            start_row: 0,
            cols_and_start: 4,
            semantic_kind: 0,
            component_type: 9,
            interpolation: 2,
            dynamic_mask_and_stream: 0,
            reserved: 0,
        };
        let err = decode_psv_element(PART_PSV, record, b"\0A\0", &[0]).unwrap_err();
        assert!(matches!(err, ContainerError::NotWellFormed { .. }));

        let record = PsvElementRecord {
            name_offset: 1,
            indexes_offset: 5,
            ..record
        };
        let err = decode_psv_element(PART_PSV, record, b"\0A\0", &[0]).unwrap_err();
        assert!(matches!(err, ContainerError::NotWellFormed { .. }));
    }
}
