//! Pipeline state validation (`PSV0`) part.
//!
//! The part is fully self-describing: a declared runtime-info size selects
//! the layout version (24 bytes for v0, 36 for v1, 48 and up for v2), then
//! resource bind records, and for v1+ the string/index pools, signature
//! element records, and the ViewID dependency region. The parser walks the
//! part with exact byte accounting; any leftover tail is a well-formedness
//! failure.

use crate::error::ContainerError;
use crate::fourcc::{FourCC, PART_PSV};
use crate::module::{
    DependencyTable, FormatVersion, ShaderModule, ShaderStage, StageInfo, ViewIdState,
};
use crate::parts::PartWriter;
use crate::reader::ByteReader;
use crate::sigelem::{PsvElementRecord, PSV_ELEMENT_SIZE};
use crate::tables::{IndexArrayBuilder, StringTableBuilder};

const PSV_INFO_SIZE_V0: u32 = 24;
const PSV_INFO_SIZE_V1: u32 = 36;
const PSV_INFO_SIZE_V2: u32 = 48;

/// Bind record size for the v0/v1 layouts.
pub const PSV_BIND_RECORD_SIZE_V0: u32 = 16;
/// Bind record size for the v2 layout (adds kind and flags).
pub const PSV_BIND_RECORD_SIZE_V2: u32 = 24;

/// Number of `u32` mask words covering `scalars` dependency bits.
pub fn mask_words(scalars: u32) -> u32 {
    scalars.div_ceil(32)
}

/// One resource bind record. `kind` and `flags` are only serialized in the
/// v2 layout and are zero when decoded from older parts.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct PsvBindRecord {
    /// Resource class code.
    pub class: u32,
    /// Register space.
    pub space: u32,
    /// First register of the range.
    pub lower_bound: u32,
    /// Last register of the range.
    pub upper_bound: u32,
    /// Resource kind code (v2 only).
    pub kind: u32,
    /// Binding flags (v2 only).
    pub flags: u32,
}

/// The v1 extension of the runtime info: stage identity and signature shape.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct PsvInfoV1 {
    /// Binary stage code.
    pub shader_stage: u8,
    /// Whether the shader reads the view index.
    pub uses_view_id: bool,
    /// Input signature element count.
    pub sig_input_elements: u8,
    /// Output signature element count.
    pub sig_output_elements: u8,
    /// Patch-constant signature element count.
    pub sig_patch_const_elements: u8,
    /// Occupied input rows.
    pub sig_input_vectors: u8,
    /// Occupied patch-constant rows.
    pub sig_patch_const_vectors: u8,
    /// Occupied output rows, one slot per geometry stream.
    pub sig_output_vectors: [u8; 4],
}

impl PsvInfoV1 {
    fn stage(&self) -> ShaderStage {
        ShaderStage::from_u32(self.shader_stage as u32)
    }

    fn stream_count(&self) -> usize {
        if self.stage() == ShaderStage::Geometry {
            4
        } else {
            1
        }
    }
}

/// Raw ViewID dependency region: packed mask words, kept in wire shape.
/// Canonical (bit-expanded) comparison happens in the cross-validator.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct PsvViewIdBlock {
    /// Per stream: mask over output scalars affected by ViewID. `None` for
    /// streams with no outputs.
    pub output_masks: Vec<Option<Vec<u32>>>,
    /// Mask over patch-constant scalars (hull/mesh stages).
    pub patch_const_mask: Option<Vec<u32>>,
    /// Per stream: inputs→outputs dependency table, row-major packed rows.
    pub io_tables: Vec<Option<Vec<u32>>>,
    /// Hull only: inputs→patch-constant table.
    pub input_to_patch_const: Option<Vec<u32>>,
    /// Domain only: patch-constant→outputs table.
    pub patch_const_to_output: Option<Vec<u32>>,
}

/// A fully decoded `PSV0` part.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PsvPart {
    /// Layout version negotiated from the declared runtime-info size.
    pub info_version: u32,
    /// The 16-byte per-stage union, as four raw words.
    pub stage_words: [u32; 4],
    /// Minimum expected wave lane count (0 = no expectation).
    pub wave_min: u32,
    /// Maximum expected wave lane count (0 = no expectation).
    pub wave_max: u32,
    /// v1 extension, present for `info_version >= 1`.
    pub info_v1: Option<PsvInfoV1>,
    /// Thread group sizes, present for `info_version >= 2`.
    pub num_threads: Option<[u32; 3]>,
    /// Resource bind records in serialized order.
    pub bind_records: Vec<PsvBindRecord>,
    /// Raw string table bytes (v1+).
    pub string_table: Vec<u8>,
    /// Semantic index table values (v1+).
    pub index_table: Vec<u32>,
    /// Input signature element records.
    pub input_elements: Vec<PsvElementRecord>,
    /// Output signature element records.
    pub output_elements: Vec<PsvElementRecord>,
    /// Patch-constant signature element records.
    pub patch_const_elements: Vec<PsvElementRecord>,
    /// ViewID dependency region, when the stage carries one.
    pub view_id: Option<PsvViewIdBlock>,
}

impl PsvPart {
    /// Parses a `PSV0` part. The part is self-describing; no module state is
    /// consulted.
    pub fn parse(bytes: &[u8]) -> Result<PsvPart, ContainerError> {
        let mut r = ByteReader::new(PART_PSV, bytes);
        let info_size = r.read_u32("runtime info size")?;
        let info_version = match info_size {
            PSV_INFO_SIZE_V0 => 0,
            PSV_INFO_SIZE_V1 => 1,
            // Larger v2-prefixed layouts are accepted; unknown trailing info
            // bytes are skipped, as future minor revisions extend in place.
            s if s >= PSV_INFO_SIZE_V2 => 2,
            s => {
                return Err(ContainerError::not_well_formed(
                    PART_PSV,
                    format!("runtime info size {s} matches no known layout"),
                ))
            }
        };
        let info_start = r.position();

        let mut stage_words = [0u32; 4];
        for (i, word) in stage_words.iter_mut().enumerate() {
            *word = r.read_u32(&format!("stage info word {i}"))?;
        }
        let wave_min = r.read_u32("minimum wave lane count")?;
        let wave_max = r.read_u32("maximum wave lane count")?;

        let info_v1 = if info_version >= 1 {
            let shader_stage = r.read_u8("shader stage")?;
            let uses_view_id = r.read_u8("uses_view_id")? != 0;
            let sig_input_elements = r.read_u8("input element count")?;
            let sig_output_elements = r.read_u8("output element count")?;
            let sig_patch_const_elements = r.read_u8("patch constant element count")?;
            let sig_input_vectors = r.read_u8("input vector count")?;
            let sig_patch_const_vectors = r.read_u8("patch constant vector count")?;
            let _pad = r.read_u8("runtime info pad")?;
            let mut sig_output_vectors = [0u8; 4];
            for (i, v) in sig_output_vectors.iter_mut().enumerate() {
                *v = r.read_u8(&format!("output vector count, stream {i}"))?;
            }
            Some(PsvInfoV1 {
                shader_stage,
                uses_view_id,
                sig_input_elements,
                sig_output_elements,
                sig_patch_const_elements,
                sig_input_vectors,
                sig_patch_const_vectors,
                sig_output_vectors,
            })
        } else {
            None
        };

        let num_threads = if info_version >= 2 {
            Some([
                r.read_u32("num_threads x")?,
                r.read_u32("num_threads y")?,
                r.read_u32("num_threads z")?,
            ])
        } else {
            None
        };

        // Skip info bytes beyond the highest layout this parser knows.
        let consumed = (r.position() - info_start) as u32;
        if info_size < consumed {
            return Err(ContainerError::not_well_formed(
                PART_PSV,
                format!("runtime info size {info_size} is shorter than its declared fields"),
            ));
        }
        r.take((info_size - consumed) as usize, "runtime info tail")?;

        let resource_count = r.read_u32("resource count")?;
        let mut bind_records = Vec::with_capacity(resource_count.min(1024) as usize);
        if resource_count > 0 {
            let bind_size = r.read_u32("bind record size")?;
            let expected = if info_version >= 2 {
                PSV_BIND_RECORD_SIZE_V2
            } else {
                PSV_BIND_RECORD_SIZE_V0
            };
            if bind_size != expected {
                return Err(ContainerError::not_well_formed(
                    PART_PSV,
                    format!("bind record size {bind_size}, layout v{info_version} requires {expected}"),
                ));
            }
            for i in 0..resource_count {
                let mut record = PsvBindRecord {
                    class: r.read_u32(&format!("resource {i} class"))?,
                    space: r.read_u32(&format!("resource {i} space"))?,
                    lower_bound: r.read_u32(&format!("resource {i} lower bound"))?,
                    upper_bound: r.read_u32(&format!("resource {i} upper bound"))?,
                    ..PsvBindRecord::default()
                };
                if info_version >= 2 {
                    record.kind = r.read_u32(&format!("resource {i} kind"))?;
                    record.flags = r.read_u32(&format!("resource {i} flags"))?;
                }
                bind_records.push(record);
            }
        }

        let mut part = PsvPart {
            info_version,
            stage_words,
            wave_min,
            wave_max,
            info_v1,
            num_threads,
            bind_records,
            string_table: Vec::new(),
            index_table: Vec::new(),
            input_elements: Vec::new(),
            output_elements: Vec::new(),
            patch_const_elements: Vec::new(),
            view_id: None,
        };

        if info_version == 0 {
            r.expect_end("PSV0 part")?;
            return Ok(part);
        }
        let info = part.info_v1.expect("v1 info parsed above");

        let string_size = r.read_u32("string table size")?;
        if string_size % 4 != 0 {
            return Err(ContainerError::not_well_formed(
                PART_PSV,
                format!("string table size {string_size} is not a multiple of 4"),
            ));
        }
        part.string_table = r.take(string_size as usize, "string table")?.to_vec();

        let index_count = r.read_u32("semantic index table count")?;
        part.index_table = r.read_u32_array(index_count as usize, "semantic index table")?;

        let element_total = info.sig_input_elements as u32
            + info.sig_output_elements as u32
            + info.sig_patch_const_elements as u32;
        if element_total > 0 {
            let record_size = r.read_u32("signature element record size")?;
            if record_size != PSV_ELEMENT_SIZE {
                return Err(ContainerError::not_well_formed(
                    PART_PSV,
                    format!("signature element record size {record_size}, expected {PSV_ELEMENT_SIZE}"),
                ));
            }
            for _ in 0..info.sig_input_elements {
                part.input_elements.push(PsvElementRecord::read(&mut r)?);
            }
            for _ in 0..info.sig_output_elements {
                part.output_elements.push(PsvElementRecord::read(&mut r)?);
            }
            for _ in 0..info.sig_patch_const_elements {
                part.patch_const_elements.push(PsvElementRecord::read(&mut r)?);
            }
        }

        if info.uses_view_id && info.stage().can_broadcast_view_id() {
            part.view_id = Some(parse_view_id_block(&mut r, &info)?);
        }

        r.expect_end("PSV0 part")?;
        Ok(part)
    }
}

fn parse_view_id_block(
    r: &mut ByteReader<'_>,
    info: &PsvInfoV1,
) -> Result<PsvViewIdBlock, ContainerError> {
    let stage = info.stage();
    let streams = info.stream_count();
    let in_scalars = info.sig_input_vectors as u32 * 4;
    let pc_scalars = info.sig_patch_const_vectors as u32 * 4;
    let out_scalars = |s: usize| info.sig_output_vectors[s] as u32 * 4;

    let mut block = PsvViewIdBlock::default();

    for s in 0..streams {
        block.output_masks.push(if out_scalars(s) > 0 {
            let words = mask_words(out_scalars(s)) as usize;
            Some(r.read_u32_array(words, &format!("ViewID output mask, stream {s}"))?)
        } else {
            None
        });
    }

    if matches!(stage, ShaderStage::Hull | ShaderStage::Mesh) && pc_scalars > 0 {
        let words = mask_words(pc_scalars) as usize;
        block.patch_const_mask =
            Some(r.read_u32_array(words, "ViewID patch constant mask")?);
    }

    for s in 0..streams {
        block.io_tables.push(if in_scalars > 0 && out_scalars(s) > 0 {
            let words = in_scalars as usize * mask_words(out_scalars(s)) as usize;
            Some(r.read_u32_array(words, &format!("input-output table, stream {s}"))?)
        } else {
            None
        });
    }

    if stage == ShaderStage::Hull && in_scalars > 0 && pc_scalars > 0 {
        let words = in_scalars as usize * mask_words(pc_scalars) as usize;
        block.input_to_patch_const =
            Some(r.read_u32_array(words, "input-patch-constant table")?);
    }
    if stage == ShaderStage::Domain && pc_scalars > 0 && out_scalars(0) > 0 {
        let words = pc_scalars as usize * mask_words(out_scalars(0)) as usize;
        block.patch_const_to_output =
            Some(r.read_u32_array(words, "patch-constant-output table")?);
    }

    Ok(block)
}

/// Writer for the `PSV0` part.
///
/// The full content is laid out at construction; failures (missing ViewID
/// state, oversized signatures) surface here, and `write` just streams the
/// finished buffer.
#[derive(Debug)]
pub struct PsvWriter {
    content: Vec<u8>,
}

impl PsvWriter {
    /// Lays out the part for `module` at the given format version.
    pub fn new(module: &ShaderModule, version: FormatVersion) -> Result<Self, ContainerError> {
        let info_version = version.psv_info_version();
        let mut content = Vec::new();

        let info_size = match info_version {
            0 => PSV_INFO_SIZE_V0,
            1 => PSV_INFO_SIZE_V1,
            _ => PSV_INFO_SIZE_V2,
        };
        content.extend_from_slice(&info_size.to_le_bytes());

        for word in stage_words(&module.stage_info) {
            content.extend_from_slice(&word.to_le_bytes());
        }
        content.extend_from_slice(&module.wave_lane_range.0.to_le_bytes());
        content.extend_from_slice(&module.wave_lane_range.1.to_le_bytes());

        if info_version >= 1 {
            content.push(module.stage.as_u32() as u8);
            content.push(module.uses_view_id as u8);
            content.push(element_count(module.input_signature.len())?);
            content.push(element_count(module.output_signature.len())?);
            content.push(element_count(module.patch_constant_signature.len())?);
            content.push(module.input_vector_count() as u8);
            content.push(module.patch_constant_vector_count() as u8);
            content.push(0); // pad
            for stream in 0..4 {
                content.push(module.output_vector_count(stream) as u8);
            }
        }
        if info_version >= 2 {
            for n in module.num_threads {
                content.extend_from_slice(&n.to_le_bytes());
            }
        }

        write_bind_records(&mut content, module, info_version);

        if info_version >= 1 {
            write_tables_and_elements(&mut content, module)?;
            if module.uses_view_id && module.stage.can_broadcast_view_id() {
                let state = module.view_id_state.as_ref().ok_or_else(|| {
                    ContainerError::MissingModuleState {
                        part: PART_PSV,
                        reason: "uses_view_id is set but no ViewID dependency state was provided"
                            .to_owned(),
                    }
                })?;
                write_view_id_block(&mut content, module, state);
            }
        }

        Ok(Self { content })
    }
}

impl PartWriter for PsvWriter {
    fn fourcc(&self) -> FourCC {
        PART_PSV
    }

    fn size(&self) -> u32 {
        self.content.len() as u32
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.content);
    }
}

fn element_count(len: usize) -> Result<u8, ContainerError> {
    u8::try_from(len).map_err(|_| {
        ContainerError::not_well_formed(
            PART_PSV,
            format!("signature has {len} elements, more than the layout can describe"),
        )
    })
}

fn stage_words(info: &StageInfo) -> [u32; 4] {
    match info {
        StageInfo::Pixel {
            depth_output,
            sample_frequency,
        } => [*depth_output as u32, *sample_frequency as u32, 0, 0],
        StageInfo::Vertex {
            output_position_present,
        } => [*output_position_present as u32, 0, 0, 0],
        StageInfo::Geometry {
            input_primitive,
            output_topology,
            output_stream_mask,
            output_position_present,
        } => [
            *input_primitive,
            *output_topology,
            *output_stream_mask as u32,
            *output_position_present as u32,
        ],
        StageInfo::Hull {
            input_control_point_count,
            output_control_point_count,
            tessellator_domain,
            tessellator_output_primitive,
        } => [
            *input_control_point_count,
            *output_control_point_count,
            tessellator_domain.as_u32(),
            *tessellator_output_primitive,
        ],
        StageInfo::Domain {
            input_control_point_count,
            tessellator_domain,
            output_position_present,
        } => [
            *input_control_point_count,
            tessellator_domain.as_u32(),
            *output_position_present as u32,
            0,
        ],
        StageInfo::Mesh {
            group_shared_bytes,
            payload_size,
            max_output_vertices,
            max_output_primitives,
            output_topology,
        } => [
            *group_shared_bytes,
            *payload_size,
            (max_output_vertices & 0xFFFF) | ((max_output_primitives & 0xFFFF) << 16),
            *output_topology,
        ],
        StageInfo::Amplification { payload_size } => [*payload_size, 0, 0, 0],
        StageInfo::Compute | StageInfo::Library => [0; 4],
    }
}

fn write_bind_records(out: &mut Vec<u8>, module: &ShaderModule, info_version: u32) {
    // Records are grouped by class; declaration order is kept within a class.
    let mut order: Vec<usize> = (0..module.resources.len()).collect();
    order.sort_by_key(|&i| module.resources[i].class);

    out.extend_from_slice(&(order.len() as u32).to_le_bytes());
    if order.is_empty() {
        return;
    }
    let bind_size = if info_version >= 2 {
        PSV_BIND_RECORD_SIZE_V2
    } else {
        PSV_BIND_RECORD_SIZE_V0
    };
    out.extend_from_slice(&bind_size.to_le_bytes());
    for i in order {
        let binding = &module.resources[i];
        out.extend_from_slice(&binding.class.as_u32().to_le_bytes());
        out.extend_from_slice(&binding.space.to_le_bytes());
        out.extend_from_slice(&binding.lower_bound.to_le_bytes());
        out.extend_from_slice(&binding.upper_bound.to_le_bytes());
        if info_version >= 2 {
            out.extend_from_slice(&binding.kind.as_u32().to_le_bytes());
            out.extend_from_slice(&binding.flags.to_le_bytes());
        }
    }
}

fn write_tables_and_elements(
    out: &mut Vec<u8>,
    module: &ShaderModule,
) -> Result<(), ContainerError> {
    // The PSV string pool always deduplicates, independent of the signature
    // parts' legacy mode.
    let mut strings = StringTableBuilder::new(true);
    let mut indices = IndexArrayBuilder::new();

    let mut encode_all = |signature: &[crate::module::SignatureElement]| {
        signature
            .iter()
            .map(|element| {
                let name_offset = strings.insert_string(&element.name);
                let (indexes_offset, _) = indices.insert_array(&element.indices);
                PsvElementRecord::encode(element, name_offset, indexes_offset)
            })
            .collect::<Vec<_>>()
    };
    let input = encode_all(&module.input_signature);
    let output = encode_all(&module.output_signature);
    let patch_const = encode_all(&module.patch_constant_signature);

    let string_bytes = strings.finalize(true);
    out.extend_from_slice(&(string_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&string_bytes);

    let index_values = indices.finalize();
    out.extend_from_slice(&(index_values.len() as u32).to_le_bytes());
    for value in &index_values {
        out.extend_from_slice(&value.to_le_bytes());
    }

    if input.len() + output.len() + patch_const.len() > 0 {
        out.extend_from_slice(&PSV_ELEMENT_SIZE.to_le_bytes());
        for record in input.iter().chain(&output).chain(&patch_const) {
            record.write(out);
        }
    }
    Ok(())
}

fn write_view_id_block(out: &mut Vec<u8>, module: &ShaderModule, state: &ViewIdState) {
    let streams = if module.stage == ShaderStage::Geometry {
        4
    } else {
        1
    };
    let in_scalars = module.input_vector_count() * 4;
    let pc_scalars = module.patch_constant_vector_count() * 4;
    let out_scalars = |s: u8| module.output_vector_count(s) * 4;

    for s in 0..streams {
        let scalars = out_scalars(s);
        if scalars > 0 {
            let bits = state
                .outputs_affected
                .get(s as usize)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            write_words(out, &pack_mask(bits, scalars));
        }
    }

    if matches!(module.stage, ShaderStage::Hull | ShaderStage::Mesh) && pc_scalars > 0 {
        let bits = state
            .patch_constant_affected
            .as_deref()
            .unwrap_or(&[]);
        write_words(out, &pack_mask(bits, pc_scalars));
    }

    for s in 0..streams {
        let scalars = out_scalars(s);
        if in_scalars > 0 && scalars > 0 {
            let table = state.io_tables.get(s as usize);
            write_words(out, &pack_table(table, in_scalars, scalars));
        }
    }

    if module.stage == ShaderStage::Hull && in_scalars > 0 && pc_scalars > 0 {
        write_words(
            out,
            &pack_table(state.patch_constant_table.as_ref(), in_scalars, pc_scalars),
        );
    }
    if module.stage == ShaderStage::Domain && pc_scalars > 0 && out_scalars(0) > 0 {
        write_words(
            out,
            &pack_table(state.patch_constant_table.as_ref(), pc_scalars, out_scalars(0)),
        );
    }
}

fn write_words(out: &mut Vec<u8>, words: &[u32]) {
    for word in words {
        out.extend_from_slice(&word.to_le_bytes());
    }
}

fn pack_mask(bits: &[bool], scalars: u32) -> Vec<u32> {
    let mut words = vec![0u32; mask_words(scalars) as usize];
    for i in 0..scalars as usize {
        if bits.get(i).copied().unwrap_or(false) {
            words[i / 32] |= 1 << (i % 32);
        }
    }
    words
}

fn pack_table(table: Option<&DependencyTable>, in_scalars: u32, out_scalars: u32) -> Vec<u32> {
    let words_per_row = mask_words(out_scalars) as usize;
    let mut words = vec![0u32; in_scalars as usize * words_per_row];
    let Some(table) = table else {
        return words;
    };
    for i in 0..in_scalars.min(table.input_scalars) as usize {
        for o in 0..out_scalars.min(table.output_scalars) as usize {
            if table.bits[i * table.output_scalars as usize + o] {
                words[i * words_per_row + o / 32] |= 1 << (o % 32);
            }
        }
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{
        ComponentType, FeatureFlags, InterpolationMode, MinPrecision, ResourceBinding,
        ResourceClass, ResourceKind, SemanticKind, SignatureElement,
    };
    use crate::sigelem::decode_psv_element;

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

    fn binding(class: ResourceClass, lower: u32) -> ResourceBinding {
        ResourceBinding {
            class,
            kind: ResourceKind::Texture2D,
            space: 0,
            lower_bound: lower,
            upper_bound: lower,
            flags: 0,
            name: String::new(),
        }
    }

    fn vertex_module() -> ShaderModule {
        ShaderModule {
            stage: ShaderStage::Vertex,
            model: (6, 0),
            entry_name: "main".to_owned(),
            bitcode: vec![0x42; 8],
            input_signature: vec![element("POSITION", 0)],
            output_signature: vec![element("SV_Position", 0), element("TEXCOORD", 1)],
            patch_constant_signature: Vec::new(),
            resources: vec![
                binding(ResourceClass::Srv, 0),
                binding(ResourceClass::CBuffer, 0),
            ],
            stage_info: StageInfo::Vertex {
                output_position_present: true,
            },
            feature_flags: FeatureFlags::empty(),
            uses_view_id: false,
            view_id_state: None,
            wave_lane_range: (0, 0),
            num_threads: [1, 1, 1],
            root_signature: None,
            private_data: None,
            debug_name: None,
            compiler_version: None,
            graph: None,
        }
    }

    fn write_part(writer: &PsvWriter) -> Vec<u8> {
        let mut out = Vec::new();
        writer.write(&mut out);
        assert_eq!(out.len() as u32, writer.size());
        out
    }

    #[test]
    fn v0_part_stops_after_resources() {
        let module = vertex_module();
        let writer = PsvWriter::new(&module, FormatVersion::new(1, 0)).unwrap();
        let part = PsvPart::parse(&write_part(&writer)).unwrap();
        assert_eq!(part.info_version, 0);
        assert!(part.info_v1.is_none());
        assert!(part.num_threads.is_none());
        assert_eq!(part.bind_records.len(), 2);
        assert!(part.string_table.is_empty());
        assert!(part.input_elements.is_empty());
    }

    #[test]
    fn bind_records_are_grouped_by_class() {
        let module = vertex_module();
        let writer = PsvWriter::new(&module, FormatVersion::new(1, 6)).unwrap();
        let part = PsvPart::parse(&write_part(&writer)).unwrap();
        // CBuffer sorts before Srv regardless of declaration order.
        assert_eq!(part.bind_records[0].class, ResourceClass::CBuffer.as_u32());
        assert_eq!(part.bind_records[1].class, ResourceClass::Srv.as_u32());
        assert_eq!(part.bind_records[1].kind, ResourceKind::Texture2D.as_u32());
    }

    #[test]
    fn v2_part_roundtrips_signatures_and_pools() {
        let module = vertex_module();
        let writer = PsvWriter::new(&module, FormatVersion::new(1, 8)).unwrap();
        let part = PsvPart::parse(&write_part(&writer)).unwrap();

        assert_eq!(part.info_version, 2);
        let info = part.info_v1.unwrap();
        assert_eq!(info.shader_stage, ShaderStage::Vertex.as_u32() as u8);
        assert_eq!(info.sig_input_elements, 1);
        assert_eq!(info.sig_output_elements, 2);
        assert_eq!(info.sig_input_vectors, 1);
        assert_eq!(info.sig_output_vectors, [2, 0, 0, 0]);
        assert_eq!(part.num_threads, Some([1, 1, 1]));
        assert_eq!(part.string_table.len() % 4, 0);

        let decoded = decode_psv_element(
            PART_PSV,
            part.input_elements[0],
            &part.string_table,
            &part.index_table,
        )
        .unwrap();
        assert_eq!(decoded.name, "POSITION");
        assert_eq!(decoded.indices, vec![0]);
        assert_eq!(decoded.kind, SemanticKind::Arbitrary);
    }

    #[test]
    fn view_id_region_shapes_follow_signature_counts() {
        let mut module = vertex_module();
        module.uses_view_id = true;
        let out_scalars = module.output_vector_count(0) * 4;
        let in_scalars = module.input_vector_count() * 4;
        let mut affected = vec![false; out_scalars as usize];
        affected[5] = true;
        let mut table = DependencyTable::empty(in_scalars, out_scalars);
        table.bits[3 * out_scalars as usize + 5] = true;
        module.view_id_state = Some(ViewIdState {
            outputs_affected: vec![affected],
            io_tables: vec![table],
            patch_constant_affected: None,
            patch_constant_table: None,
        });

        let writer = PsvWriter::new(&module, FormatVersion::new(1, 8)).unwrap();
        let part = PsvPart::parse(&write_part(&writer)).unwrap();
        let block = part.view_id.expect("ViewID region present");

        let mask = block.output_masks[0].as_ref().unwrap();
        assert_eq!(mask.len(), mask_words(out_scalars) as usize);
        assert_eq!(mask[0], 1 << 5);
        let io = block.io_tables[0].as_ref().unwrap();
        assert_eq!(
            io.len(),
            in_scalars as usize * mask_words(out_scalars) as usize
        );
        assert_eq!(io[3 * mask_words(out_scalars) as usize], 1 << 5);
    }

    #[test]
    fn missing_view_id_state_is_a_module_state_error() {
        let mut module = vertex_module();
        module.uses_view_id = true;
        let err = PsvWriter::new(&module, FormatVersion::new(1, 8)).unwrap_err();
        assert!(matches!(err, ContainerError::MissingModuleState { .. }));
    }

    #[test]
    fn every_truncated_prefix_is_rejected() {
        let mut module = vertex_module();
        module.uses_view_id = true;
        module.view_id_state = Some(ViewIdState {
            outputs_affected: vec![vec![false; 8]],
            io_tables: vec![DependencyTable::empty(4, 8)],
            patch_constant_affected: None,
            patch_constant_table: None,
        });
        let writer = PsvWriter::new(&module, FormatVersion::new(1, 8)).unwrap();
        let bytes = write_part(&writer);
        for len in 0..bytes.len() {
            assert!(
                PsvPart::parse(&bytes[..len]).is_err(),
                "prefix of {len} bytes should not parse"
            );
        }
    }
}
