//! Module fixtures and raw-container helpers shared by tests.
//!
//! Enabled for this crate's own tests and, behind the `test-utils` feature,
//! for downstream integration tests.

use crate::fourcc::FourCC;
use crate::module::{
    CompilerVersion, ComponentType, DependencyTable, FeatureFlags, FormatVersion,
    InterpolationMode, MinPrecision, ResourceBinding, ResourceClass, ResourceKind, SemanticKind,
    ShaderModule, ShaderStage, SignatureElement, StageInfo, TessellatorDomain, ValueGraph,
    ValueKind, ValueNode, ViewIdState,
};

/// A one-row arbitrary float4 element at `row`.
pub fn element(name: &str, row: u8) -> SignatureElement {
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

/// A system-value element with the given kind.
pub fn system_element(name: &str, kind: SemanticKind, row: u8) -> SignatureElement {
    SignatureElement {
        kind,
        ..element(name, row)
    }
}

fn binding(class: ResourceClass, kind: ResourceKind, lower: u32, name: &str) -> ResourceBinding {
    ResourceBinding {
        class,
        kind,
        space: 0,
        lower_bound: lower,
        upper_bound: lower,
        flags: 0,
        name: name.to_owned(),
    }
}

fn base_module(stage: ShaderStage, stage_info: StageInfo) -> ShaderModule {
    ShaderModule {
        stage,
        model: (6, 6),
        entry_name: "main".to_owned(),
        bitcode: b"BCbitcode-bytes!".to_vec(),
        input_signature: Vec::new(),
        output_signature: Vec::new(),
        patch_constant_signature: Vec::new(),
        resources: Vec::new(),
        stage_info,
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

/// Vertex module with a position input, two outputs and two resources.
pub fn vertex_module() -> ShaderModule {
    let mut module = base_module(
        ShaderStage::Vertex,
        StageInfo::Vertex {
            output_position_present: true,
        },
    );
    module.input_signature = vec![element("POSITION", 0)];
    module.output_signature = vec![
        system_element("SV_Position", SemanticKind::Position, 0),
        element("TEXCOORD", 1),
    ];
    module.resources = vec![
        binding(ResourceClass::CBuffer, ResourceKind::CBuffer, 0, "cb0"),
        binding(ResourceClass::Srv, ResourceKind::Texture2D, 0, "t0"),
    ];
    module
}

/// Pixel module writing one render target.
pub fn pixel_module() -> ShaderModule {
    let mut module = base_module(
        ShaderStage::Pixel,
        StageInfo::Pixel {
            depth_output: false,
            sample_frequency: false,
        },
    );
    module.input_signature = vec![
        system_element("SV_Position", SemanticKind::Position, 0),
        element("TEXCOORD", 1),
    ];
    module.output_signature = vec![system_element("SV_Target", SemanticKind::Target, 0)];
    module.resources = vec![
        binding(ResourceClass::Sampler, ResourceKind::Sampler, 0, "s0"),
        binding(ResourceClass::Srv, ResourceKind::Texture2D, 0, "t0"),
    ];
    module
}

/// Geometry module emitting on two streams.
pub fn geometry_module() -> ShaderModule {
    let mut module = base_module(
        ShaderStage::Geometry,
        StageInfo::Geometry {
            input_primitive: 3,
            output_topology: 4,
            output_stream_mask: 0b11,
            output_position_present: true,
        },
    );
    module.input_signature = vec![element("POSITION", 0)];
    let mut stream1 = element("ATTR", 0);
    stream1.stream = 1;
    module.output_signature = vec![
        system_element("SV_Position", SemanticKind::Position, 0),
        stream1,
    ];
    module
}

/// Hull module with quad-domain tessellation factors.
pub fn hull_module() -> ShaderModule {
    let mut module = base_module(
        ShaderStage::Hull,
        StageInfo::Hull {
            input_control_point_count: 3,
            output_control_point_count: 3,
            tessellator_domain: TessellatorDomain::Quad,
            tessellator_output_primitive: 3,
        },
    );
    module.input_signature = vec![element("POSITION", 0)];
    module.output_signature = vec![element("POSITION", 0)];
    let mut edge = system_element("SV_TessFactor", SemanticKind::TessFactor, 0);
    edge.rows = 4;
    edge.indices = vec![0, 1, 2, 3];
    edge.cols = 1;
    let mut inside = system_element("SV_InsideTessFactor", SemanticKind::InsideTessFactor, 4);
    inside.rows = 2;
    inside.indices = vec![0, 1];
    inside.cols = 1;
    module.patch_constant_signature = vec![edge, inside];
    module
}

/// Domain module consuming the hull module's patch constants.
pub fn domain_module() -> ShaderModule {
    let mut module = base_module(
        ShaderStage::Domain,
        StageInfo::Domain {
            input_control_point_count: 3,
            tessellator_domain: TessellatorDomain::Quad,
            output_position_present: true,
        },
    );
    module.input_signature = vec![element("POSITION", 0)];
    module.output_signature = vec![system_element("SV_Position", SemanticKind::Position, 0)];
    module.patch_constant_signature = hull_module().patch_constant_signature;
    module
}

/// Compute module with a thread group size.
pub fn compute_module() -> ShaderModule {
    let mut module = base_module(ShaderStage::Compute, StageInfo::Compute);
    module.num_threads = [8, 8, 1];
    module.resources = vec![binding(ResourceClass::Uav, ResourceKind::RawBuffer, 0, "u0")];
    module
}

/// Mesh module with a primitive signature.
pub fn mesh_module() -> ShaderModule {
    let mut module = base_module(
        ShaderStage::Mesh,
        StageInfo::Mesh {
            group_shared_bytes: 1024,
            payload_size: 16,
            max_output_vertices: 64,
            max_output_primitives: 126,
            output_topology: 2,
        },
    );
    module.num_threads = [32, 1, 1];
    module.output_signature = vec![system_element("SV_Position", SemanticKind::Position, 0)];
    module.patch_constant_signature = vec![system_element(
        "SV_PrimitiveID",
        SemanticKind::PrimitiveId,
        0,
    )];
    module
}

/// Amplification module dispatching the mesh module.
pub fn amplification_module() -> ShaderModule {
    let mut module = base_module(
        ShaderStage::Amplification,
        StageInfo::Amplification { payload_size: 16 },
    );
    module.num_threads = [32, 1, 1];
    module
}

/// Library module with two functions, a resource, an external callee, a
/// compiler version and a value graph.
pub fn library_module() -> ShaderModule {
    let nodes = vec![
        ValueNode {
            kind: ValueKind::Function {
                name: "\u{1}?raygen@@YAXXZ".to_owned(),
                unmangled: "raygen".to_owned(),
                stage: ShaderStage::Library,
                feature_flags: FeatureFlags::RAYTRACING,
                payload_size: 16,
                attribute_size: 8,
                min_target: (6 << 4) | 3,
            },
            operands: vec![2],
        },
        ValueNode {
            kind: ValueKind::Function {
                name: "\u{1}?miss@@YAXXZ".to_owned(),
                unmangled: "miss".to_owned(),
                stage: ShaderStage::Library,
                feature_flags: FeatureFlags::RAYTRACING,
                payload_size: 16,
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
            kind: ValueKind::ResourceRef { index: 0 },
            operands: vec![],
        },
        ValueNode {
            kind: ValueKind::ExternalFunction {
                name: "lib_helper".to_owned(),
            },
            operands: vec![],
        },
    ];
    let mut module = base_module(ShaderStage::Library, StageInfo::Library);
    module.model = (6, 3);
    module.entry_name = String::new();
    module.resources = vec![binding(
        ResourceClass::Srv,
        ResourceKind::RtAccelerationStructure,
        0,
        "scene",
    )];
    module.compiler_version = Some(CompilerVersion {
        major: 1,
        minor: 8,
        flags: 0,
        commit_count: 4000,
        commit_sha: Some("0123abcd".to_owned()),
        custom_string: Some("dev build".to_owned()),
    });
    module.graph = Some(ValueGraph {
        nodes,
        function_roots: vec![0, 1],
    });
    module
}

/// Vertex module that reads ViewID, with a populated dependency state.
pub fn view_id_vertex_module() -> ShaderModule {
    let mut module = vertex_module();
    module.uses_view_id = true;
    let in_scalars = module.input_vector_count() * 4;
    let out_scalars = module.output_vector_count(0) * 4;
    let mut affected = vec![false; out_scalars as usize];
    affected[0] = true;
    let mut table = DependencyTable::empty(in_scalars, out_scalars);
    table.bits[0] = true;
    module.view_id_state = Some(ViewIdState {
        outputs_affected: vec![affected],
        io_tables: vec![table],
        patch_constant_affected: None,
        patch_constant_table: None,
    });
    module
}

/// Modules for every stage, for exercising the full writer matrix.
pub fn modules_for_all_stages() -> Vec<ShaderModule> {
    vec![
        pixel_module(),
        vertex_module(),
        geometry_module(),
        hull_module(),
        domain_module(),
        compute_module(),
        mesh_module(),
        amplification_module(),
        library_module(),
    ]
}

/// Assembles a raw container around arbitrary `(fourcc, content)` pairs,
/// bypassing the part writers. For crafting malformed containers in tests.
pub fn build_raw_container(version: FormatVersion, parts: &[(FourCC, Vec<u8>)]) -> Vec<u8> {
    let header_size = 32u32;
    let table_size = parts.len() as u32 * 4;
    let total: u32 = header_size
        + table_size
        + parts
            .iter()
            .map(|(_, content)| 8 + content.len() as u32)
            .sum::<u32>();

    let mut out = Vec::with_capacity(total as usize);
    out.extend_from_slice(b"DXBC");
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(&version.major.to_le_bytes());
    out.extend_from_slice(&version.minor.to_le_bytes());
    out.extend_from_slice(&total.to_le_bytes());
    out.extend_from_slice(&(parts.len() as u32).to_le_bytes());
    let mut offset = header_size + table_size;
    for (_, content) in parts {
        out.extend_from_slice(&offset.to_le_bytes());
        offset += 8 + content.len() as u32;
    }
    for (fourcc, content) in parts {
        out.extend_from_slice(fourcc.as_bytes());
        out.extend_from_slice(&(content.len() as u32).to_le_bytes());
        out.extend_from_slice(content);
    }
    out
}
