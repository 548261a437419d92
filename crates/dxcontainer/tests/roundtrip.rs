//! End-to-end serialize/validate round trips over the public API.

use dxcontainer::{
    validate_container, write_container, CompilerVersion, ComponentType, ContainerFile,
    Diagnostic, FeatureFlags, FormatVersion, InterpolationMode, MinPrecision, ResourceBinding,
    ResourceClass, ResourceKind, SemanticKind, ShaderModule, ShaderStage, SignatureElement,
    StageInfo, ValidateOptions, ValueGraph, ValueKind, ValueNode, PART_INPUT_SIGNATURE,
    PART_PRIVATE_DATA,
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

fn vertex_module() -> ShaderModule {
    let mut position = element("SV_Position", 0);
    position.kind = SemanticKind::Position;
    ShaderModule {
        stage: ShaderStage::Vertex,
        model: (6, 6),
        entry_name: "main".to_owned(),
        bitcode: b"BC\xC0\xDEfake-bitcode".to_vec(),
        input_signature: vec![element("POSITION", 0), element("TEXCOORD", 1)],
        output_signature: vec![position, element("TEXCOORD", 1)],
        patch_constant_signature: Vec::new(),
        resources: vec![
            ResourceBinding {
                class: ResourceClass::CBuffer,
                kind: ResourceKind::CBuffer,
                space: 0,
                lower_bound: 0,
                upper_bound: 0,
                flags: 0,
                name: "cb0".to_owned(),
            },
            ResourceBinding {
                class: ResourceClass::Srv,
                kind: ResourceKind::Texture2D,
                space: 0,
                lower_bound: 0,
                upper_bound: 0,
                flags: 0,
                name: "t0".to_owned(),
            },
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
        private_data: Some(vec![0xAA; 5]),
        debug_name: Some("shader.pdb".to_owned()),
        compiler_version: None,
        graph: None,
    }
}

fn library_module() -> ShaderModule {
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
            operands: vec![1],
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
        bitcode: b"BC\xC0\xDElib-bitcode".to_vec(),
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
        compiler_version: Some(CompilerVersion {
            major: 1,
            minor: 8,
            flags: 0,
            commit_count: 4000,
            commit_sha: Some("0123abcd".to_owned()),
            custom_string: None,
        }),
        graph: Some(ValueGraph {
            nodes,
            function_roots: vec![0],
        }),
    }
}

#[test]
fn vertex_round_trip_is_clean_across_versions() {
    let module = vertex_module();
    for version in [
        FormatVersion::new(1, 0),
        FormatVersion::new(1, 2),
        FormatVersion::new(1, 6),
        FormatVersion::new(1, 8),
    ] {
        let mut bytes = write_container(&module, version).expect("serialize");
        let outcome = validate_container(&mut bytes, &module, version, ValidateOptions::default())
            .expect("validate");
        assert!(
            outcome.is_clean(),
            "{}.{}: {:?}",
            version.major,
            version.minor,
            outcome.diagnostics
        );
    }
}

#[test]
fn library_round_trip_is_clean() {
    let module = library_module();
    let version = FormatVersion::new(1, 8);
    let mut bytes = write_container(&module, version).expect("serialize");
    let outcome = validate_container(&mut bytes, &module, version, ValidateOptions::default())
        .expect("validate");
    assert!(outcome.is_clean(), "{:?}", outcome.diagnostics);
}

#[test]
fn aligned_mode_keeps_every_part_except_private_data_aligned() {
    let bytes = write_container(&vertex_module(), FormatVersion::new(1, 6)).unwrap();
    let file = ContainerFile::parse(&bytes).unwrap();
    for part in &file.parts {
        if part.fourcc == PART_PRIVATE_DATA {
            continue;
        }
        assert_eq!(
            part.bytes.len() % 4,
            0,
            "{} part has misaligned size {}",
            part.fourcc,
            part.bytes.len()
        );
    }
    // The private data blob is carried byte-for-byte and sits last.
    assert_eq!(file.parts.last().unwrap().fourcc, PART_PRIVATE_DATA);
}

#[test]
fn tampered_signature_register_is_pinpointed() {
    let module = vertex_module();
    let version = FormatVersion::new(1, 6);
    let mut bytes = write_container(&module, version).unwrap();

    // Record layout puts the register word 16 bytes into the first record,
    // which itself starts 8 bytes into the part content.
    let record_pos = {
        let file = ContainerFile::parse(&bytes).unwrap();
        let part = file.part(PART_INPUT_SIGNATURE).unwrap();
        part.offset as usize + 8 + 8 + 16
    };
    bytes[record_pos] = 5;

    let outcome =
        validate_container(&mut bytes, &module, version, ValidateOptions::default()).unwrap();
    assert!(
        outcome.diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::Mismatch { field, actual, .. }
                if field == "SigInputElement[0].register" && actual == "5"
        )),
        "{:?}",
        outcome.diagnostics
    );
    // Tampering also breaks the container digest.
    assert!(outcome.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::Mismatch { field, .. } if field == "container digest"
    )));
}

#[test]
fn stale_container_is_flagged_against_an_updated_module() {
    let module = vertex_module();
    let version = FormatVersion::new(1, 6);
    let mut bytes = write_container(&module, version).unwrap();

    let mut updated = module.clone();
    updated.bitcode = b"BC\xC0\xDEnewer-bitcode".to_vec();
    let outcome =
        validate_container(&mut bytes, &updated, version, ValidateOptions::default()).unwrap();
    assert!(!outcome.is_clean());
    // Both the hash digest and the program blob trail the module change.
    assert!(outcome.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::Mismatch { field, .. } if field == "digest"
    )));
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::BlobMismatch { .. })));
}
