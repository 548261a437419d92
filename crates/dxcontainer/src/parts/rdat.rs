//! Runtime reflection data (`RDAT`) part, emitted for library modules.
//!
//! The part is a small container of its own: a header with a version and a
//! table of sub-part offsets, then one sub-part per pool (string buffer,
//! index arrays, resource table, function table). Function records reference
//! the pools by offset; the per-function resource and callee sets come from
//! a worklist walk of the module value graph.

use crate::error::ContainerError;
use crate::fourcc::{FourCC, PART_RUNTIME_DATA};
use crate::module::{ShaderModule, ValueKind};
use crate::parts::PartWriter;
use crate::reader::ByteReader;
use crate::tables::{IndexArrayBuilder, RecordTableBuilder, StringTableBuilder};

const RDAT_VERSION: u32 = 0x10;

const SUBPART_STRING_BUFFER: u32 = 1;
const SUBPART_INDEX_ARRAYS: u32 = 2;
const SUBPART_RESOURCE_TABLE: u32 = 3;
const SUBPART_FUNCTION_TABLE: u32 = 4;

/// Size of one resource record.
pub const RDAT_RESOURCE_RECORD_SIZE: u32 = 32;
/// Size of one function record.
pub const RDAT_FUNCTION_RECORD_SIZE: u32 = 48;

/// One decoded resource record.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct RdatResourceRecord {
    /// Resource class code.
    pub class: u32,
    /// Resource kind code.
    pub kind: u32,
    /// Index of the resource in its module's declaration order.
    pub resource_index: u32,
    /// Register space.
    pub space: u32,
    /// First register of the range.
    pub lower_bound: u32,
    /// Last register of the range.
    pub upper_bound: u32,
    /// Offset of the declared name in the string buffer.
    pub name_offset: u32,
    /// Binding flags.
    pub flags: u32,
}

/// One decoded function record. Pool references are offsets, not resolved
/// values; resolution happens where the pools are in scope.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct RdatFunctionRecord {
    /// Offset of the mangled name in the string buffer.
    pub name_offset: u32,
    /// Offset of the unmangled name in the string buffer.
    pub unmangled_name_offset: u32,
    /// Element offset of the resource index run.
    pub resources_offset: u32,
    /// Length of the resource index run.
    pub resources_count: u32,
    /// Element offset of the callee name-offset run.
    pub deps_offset: u32,
    /// Length of the callee name-offset run.
    pub deps_count: u32,
    /// Binary stage code of the function.
    pub shader_stage: u32,
    /// Minimum shader target, packed `(major << 4) | minor`.
    pub min_target: u32,
    /// Ray payload size in bytes.
    pub payload_size: u32,
    /// Ray attribute size in bytes.
    pub attribute_size: u32,
    /// Feature flags the function requires.
    pub feature_flags: u64,
}

/// A fully decoded `RDAT` part.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct RdatPart {
    /// Raw string buffer bytes.
    pub string_buffer: Vec<u8>,
    /// Index array pool values.
    pub index_values: Vec<u32>,
    /// Resource table records.
    pub resource_records: Vec<RdatResourceRecord>,
    /// Function table records.
    pub function_records: Vec<RdatFunctionRecord>,
}

impl RdatPart {
    /// Parses an `RDAT` part with exact byte accounting: the four sub-parts
    /// must tile the region after the offset table with no gaps.
    pub fn parse(bytes: &[u8]) -> Result<RdatPart, ContainerError> {
        let mut r = ByteReader::new(PART_RUNTIME_DATA, bytes);
        let version = r.read_u32("RDAT version")?;
        if version != RDAT_VERSION {
            return Err(ContainerError::not_well_formed(
                PART_RUNTIME_DATA,
                format!("unsupported RDAT version {version:#x}"),
            ));
        }
        let part_count = r.read_u32("RDAT sub-part count")?;
        let offsets = r.read_u32_array(part_count as usize, "RDAT sub-part offsets")?;

        let mut part = RdatPart::default();
        for (i, &offset) in offsets.iter().enumerate() {
            if offset as usize != r.position() {
                return Err(ContainerError::not_well_formed(
                    PART_RUNTIME_DATA,
                    format!(
                        "sub-part {i} declared at offset {offset} but content ends at {}",
                        r.position()
                    ),
                ));
            }
            let kind = r.read_u32("sub-part kind")?;
            let size = r.read_u32("sub-part size")?;
            let payload = r.take(size as usize, "sub-part payload")?;
            let mut pr = ByteReader::new(PART_RUNTIME_DATA, payload);
            match kind {
                SUBPART_STRING_BUFFER => {
                    part.string_buffer = payload.to_vec();
                }
                SUBPART_INDEX_ARRAYS => {
                    if size % 4 != 0 {
                        return Err(ContainerError::not_well_formed(
                            PART_RUNTIME_DATA,
                            format!("index array sub-part size {size} is not a multiple of 4"),
                        ));
                    }
                    part.index_values =
                        pr.read_u32_array(size as usize / 4, "index array values")?;
                }
                SUBPART_RESOURCE_TABLE => {
                    part.resource_records = parse_resource_table(&mut pr)?;
                    pr.expect_end("resource table sub-part")?;
                }
                SUBPART_FUNCTION_TABLE => {
                    part.function_records = parse_function_table(&mut pr)?;
                    pr.expect_end("function table sub-part")?;
                }
                other => {
                    return Err(ContainerError::not_well_formed(
                        PART_RUNTIME_DATA,
                        format!("unknown sub-part kind {other}"),
                    ))
                }
            }
        }
        r.expect_end("RDAT part")?;
        Ok(part)
    }

    /// Resolves a string-buffer offset, rejecting out-of-range references.
    pub fn string_at(&self, offset: u32) -> Result<&str, ContainerError> {
        ByteReader::new(PART_RUNTIME_DATA, &self.string_buffer)
            .read_cstring_at(offset as usize, "string buffer entry")
    }

    /// Resolves an index-array run, rejecting out-of-range references.
    pub fn index_run(&self, offset: u32, count: u32) -> Result<&[u32], ContainerError> {
        let start = offset as usize;
        let end = start.checked_add(count as usize).ok_or_else(|| {
            ContainerError::not_well_formed(
                PART_RUNTIME_DATA,
                "index array reference overflows".to_owned(),
            )
        })?;
        self.index_values.get(start..end).ok_or_else(|| {
            ContainerError::not_well_formed(
                PART_RUNTIME_DATA,
                format!(
                    "index array reference {start}..{end} is outside pool of {} entries",
                    self.index_values.len()
                ),
            )
        })
    }
}

fn parse_record_table_header(
    r: &mut ByteReader<'_>,
    expected_stride: u32,
    what: &str,
) -> Result<u32, ContainerError> {
    let count = r.read_u32(&format!("{what} record count"))?;
    let stride = r.read_u32(&format!("{what} record stride"))?;
    if stride != expected_stride {
        return Err(ContainerError::not_well_formed(
            PART_RUNTIME_DATA,
            format!("{what} record stride {stride}, expected {expected_stride}"),
        ));
    }
    Ok(count)
}

fn parse_resource_table(
    r: &mut ByteReader<'_>,
) -> Result<Vec<RdatResourceRecord>, ContainerError> {
    let count = parse_record_table_header(r, RDAT_RESOURCE_RECORD_SIZE, "resource table")?;
    let mut records = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        records.push(RdatResourceRecord {
            class: r.read_u32("resource class")?,
            kind: r.read_u32("resource kind")?,
            resource_index: r.read_u32("resource index")?,
            space: r.read_u32("resource space")?,
            lower_bound: r.read_u32("resource lower bound")?,
            upper_bound: r.read_u32("resource upper bound")?,
            name_offset: r.read_u32("resource name offset")?,
            flags: r.read_u32("resource flags")?,
        });
    }
    Ok(records)
}

fn parse_function_table(
    r: &mut ByteReader<'_>,
) -> Result<Vec<RdatFunctionRecord>, ContainerError> {
    let count = parse_record_table_header(r, RDAT_FUNCTION_RECORD_SIZE, "function table")?;
    let mut records = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        records.push(RdatFunctionRecord {
            name_offset: r.read_u32("function name offset")?,
            unmangled_name_offset: r.read_u32("function unmangled name offset")?,
            resources_offset: r.read_u32("function resources offset")?,
            resources_count: r.read_u32("function resources count")?,
            deps_offset: r.read_u32("function deps offset")?,
            deps_count: r.read_u32("function deps count")?,
            shader_stage: r.read_u32("function shader stage")?,
            min_target: r.read_u32("function min target")?,
            payload_size: r.read_u32("function payload size")?,
            attribute_size: r.read_u32("function attribute size")?,
            feature_flags: r.read_u64("function feature flags")?,
        });
    }
    Ok(records)
}

/// Writer for the `RDAT` part.
///
/// All pool interning and graph traversal happens at construction; the
/// resulting buffer is streamed verbatim by `write`.
#[derive(Debug)]
pub struct RdatWriter {
    content: Vec<u8>,
}

impl RdatWriter {
    /// Lays out runtime reflection data for `module`. Requires the module
    /// value graph.
    pub fn new(module: &ShaderModule) -> Result<Self, ContainerError> {
        let graph = module
            .graph
            .as_ref()
            .ok_or_else(|| ContainerError::MissingModuleState {
                part: PART_RUNTIME_DATA,
                reason: "runtime reflection requires the module value graph".to_owned(),
            })?;

        let mut strings = StringTableBuilder::new(true);
        let mut index_pool = IndexArrayBuilder::new();
        let mut resource_table =
            RecordTableBuilder::new(RDAT_RESOURCE_RECORD_SIZE as usize, false);

        for (i, binding) in module.resources.iter().enumerate() {
            let name_offset = strings.insert_string(&binding.name);
            let mut record = Vec::with_capacity(RDAT_RESOURCE_RECORD_SIZE as usize);
            for word in [
                binding.class.as_u32(),
                binding.kind.as_u32(),
                i as u32,
                binding.space,
                binding.lower_bound,
                binding.upper_bound,
                name_offset,
                binding.flags,
            ] {
                record.extend_from_slice(&word.to_le_bytes());
            }
            resource_table.insert_record(&record);
        }

        // Function table order is by mangled name, so the serialized part is
        // independent of graph construction order.
        let mut roots: Vec<u32> = graph.function_roots.clone();
        roots.sort_by_key(|&root| match graph.nodes.get(root as usize).map(|n| &n.kind) {
            Some(ValueKind::Function { name, .. }) => name.clone(),
            _ => String::new(),
        });

        let mut function_table =
            RecordTableBuilder::new(RDAT_FUNCTION_RECORD_SIZE as usize, false);
        for root in roots {
            let Some(ValueKind::Function {
                name,
                unmangled,
                stage,
                feature_flags,
                payload_size,
                attribute_size,
                min_target,
            }) = graph.nodes.get(root as usize).map(|n| &n.kind)
            else {
                return Err(ContainerError::MissingModuleState {
                    part: PART_RUNTIME_DATA,
                    reason: format!("graph root {root} is not a function node"),
                });
            };
            let reach = graph.reach(root);

            let name_offset = strings.insert_string(name);
            let unmangled_offset = strings.insert_string(unmangled);
            let resource_indices: Vec<u32> =
                reach.resources.iter().map(|&i| i as u32).collect();
            let (resources_offset, resources_count) = index_pool.insert_array(&resource_indices);
            let dep_offsets: Vec<u32> = reach
                .external_callees
                .iter()
                .map(|callee| strings.insert_string(callee))
                .collect();
            let (deps_offset, deps_count) = index_pool.insert_array(&dep_offsets);

            let mut record = Vec::with_capacity(RDAT_FUNCTION_RECORD_SIZE as usize);
            for word in [
                name_offset,
                unmangled_offset,
                resources_offset,
                resources_count,
                deps_offset,
                deps_count,
                stage.as_u32(),
                *min_target,
                *payload_size,
                *attribute_size,
            ] {
                record.extend_from_slice(&word.to_le_bytes());
            }
            record.extend_from_slice(&feature_flags.bits().to_le_bytes());
            function_table.insert_record(&record);
        }

        let mut subparts: Vec<(u32, Vec<u8>)> = Vec::with_capacity(4);
        subparts.push((SUBPART_STRING_BUFFER, strings.finalize(true)));
        let mut index_bytes = Vec::new();
        for value in index_pool.finalize() {
            index_bytes.extend_from_slice(&value.to_le_bytes());
        }
        subparts.push((SUBPART_INDEX_ARRAYS, index_bytes));
        subparts.push((
            SUBPART_RESOURCE_TABLE,
            record_table_bytes(resource_table),
        ));
        subparts.push((
            SUBPART_FUNCTION_TABLE,
            record_table_bytes(function_table),
        ));

        let mut content = Vec::new();
        content.extend_from_slice(&RDAT_VERSION.to_le_bytes());
        content.extend_from_slice(&(subparts.len() as u32).to_le_bytes());
        let mut offset = (8 + 4 * subparts.len()) as u32;
        for (_, payload) in &subparts {
            content.extend_from_slice(&offset.to_le_bytes());
            offset += 8 + payload.len() as u32;
        }
        for (kind, payload) in &subparts {
            content.extend_from_slice(&kind.to_le_bytes());
            content.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            content.extend_from_slice(payload);
        }

        Ok(Self { content })
    }
}

fn record_table_bytes(table: RecordTableBuilder) -> Vec<u8> {
    let count = table.len();
    let stride = table.stride() as u32;
    let mut out = Vec::with_capacity(8 + (count * stride) as usize);
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&stride.to_le_bytes());
    out.extend_from_slice(&table.finalize());
    out
}

impl PartWriter for RdatWriter {
    fn fourcc(&self) -> FourCC {
        PART_RUNTIME_DATA
    }

    fn size(&self) -> u32 {
        self.content.len() as u32
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{
        FeatureFlags, ResourceBinding, ResourceClass, ResourceKind, ShaderStage, StageInfo,
        ValueGraph, ValueNode,
    };

    fn library_module() -> ShaderModule {
        let nodes = vec![
            // 0: function "a" -> instruction 2 -> resource 0 and callee 3
            ValueNode {
                kind: ValueKind::Function {
                    name: "\u{1}?a@@YAXXZ".to_owned(),
                    unmangled: "a".to_owned(),
                    stage: ShaderStage::Library,
                    feature_flags: FeatureFlags::RAYTRACING,
                    payload_size: 16,
                    attribute_size: 8,
                    min_target: (6 << 4) | 3,
                },
                operands: vec![2],
            },
            // 1: function "b", no reach
            ValueNode {
                kind: ValueKind::Function {
                    name: "\u{1}?b@@YAXXZ".to_owned(),
                    unmangled: "b".to_owned(),
                    stage: ShaderStage::Library,
                    feature_flags: FeatureFlags::empty(),
                    payload_size: 0,
                    attribute_size: 0,
                    min_target: (6 << 4) | 3,
                },
                operands: vec![],
            },
            ValueNode {
                kind: ValueKind::Instruction,
                operands: vec![3, 4],
            },
            ValueNode {
                kind: ValueKind::ExternalFunction {
                    name: "external".to_owned(),
                },
                operands: vec![],
            },
            ValueNode {
                kind: ValueKind::ResourceRef { index: 0 },
                operands: vec![],
            },
        ];
        ShaderModule {
            stage: ShaderStage::Library,
            model: (6, 3),
            entry_name: String::new(),
            bitcode: vec![1, 2, 3, 4],
            input_signature: Vec::new(),
            output_signature: Vec::new(),
            patch_constant_signature: Vec::new(),
            resources: vec![ResourceBinding {
                class: ResourceClass::Srv,
                kind: ResourceKind::RtAccelerationStructure,
                space: 0,
                lower_bound: 0,
                upper_bound: 0,
                flags: 0,
                name: "scene".to_owned(),
            }],
            stage_info: StageInfo::Library,
            feature_flags: FeatureFlags::empty(),
            uses_view_id: false,
            view_id_state: None,
            wave_lane_range: (0, 0),
            num_threads: [1, 1, 1],
            root_signature: None,
            private_data: None,
            debug_name: None,
            compiler_version: None,
            graph: Some(ValueGraph {
                nodes,
                function_roots: vec![1, 0],
            }),
        }
    }

    fn write_part(writer: &RdatWriter) -> Vec<u8> {
        let mut out = Vec::new();
        writer.write(&mut out);
        assert_eq!(out.len() as u32, writer.size());
        out
    }

    #[test]
    fn rdat_roundtrips_functions_and_resources() {
        let module = library_module();
        let writer = RdatWriter::new(&module).unwrap();
        let part = RdatPart::parse(&write_part(&writer)).unwrap();

        assert_eq!(part.resource_records.len(), 1);
        let resource = part.resource_records[0];
        assert_eq!(resource.class, ResourceClass::Srv.as_u32());
        assert_eq!(part.string_at(resource.name_offset).unwrap(), "scene");

        // Sorted by mangled name: "a" before "b".
        assert_eq!(part.function_records.len(), 2);
        let a = part.function_records[0];
        assert_eq!(part.string_at(a.unmangled_name_offset).unwrap(), "a");
        assert_eq!(a.payload_size, 16);
        assert_eq!(a.feature_flags, FeatureFlags::RAYTRACING.bits());
        assert_eq!(
            part.index_run(a.resources_offset, a.resources_count).unwrap(),
            &[0]
        );
        let deps = part.index_run(a.deps_offset, a.deps_count).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(part.string_at(deps[0]).unwrap(), "external");

        let b = part.function_records[1];
        assert_eq!(part.string_at(b.unmangled_name_offset).unwrap(), "b");
        assert_eq!(b.resources_count, 0);
        assert_eq!(b.deps_count, 0);
    }

    #[test]
    fn rdat_requires_the_value_graph() {
        let mut module = library_module();
        module.graph = None;
        let err = RdatWriter::new(&module).unwrap_err();
        assert!(matches!(err, ContainerError::MissingModuleState { .. }));
    }

    #[test]
    fn misplaced_subpart_offset_is_rejected() {
        let module = library_module();
        let bytes = write_part(&RdatWriter::new(&module).unwrap());
        let mut corrupted = bytes.clone();
        // First sub-part offset lives at byte 8; nudge it.
        corrupted[8] = corrupted[8].wrapping_add(4);
        assert!(RdatPart::parse(&corrupted).is_err());
        assert!(RdatPart::parse(&bytes).is_ok());
    }
}
