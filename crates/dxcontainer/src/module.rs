//! Immutable in-memory shader module snapshot.
//!
//! The compiler front end and optimizer are external collaborators; this
//! crate only consumes the already-validated module they produce. Nothing
//! here is mutated during a serialization or validation pass.

use bitflags::bitflags;

/// The negotiated container compatibility version.
///
/// This is a value object threaded explicitly into every component that needs
/// it; there is no process-wide version switch.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct FormatVersion {
    /// Major version.
    pub major: u16,
    /// Minor version.
    pub minor: u16,
}

/// At or above this version, signature string tables deduplicate semantic
/// names and signature parts are padded to a 4-byte boundary ("aligned
/// mode"). Below it, the legacy unaligned container mode is in effect.
pub const DEDUP_VERSION: FormatVersion = FormatVersion::new(1, 2);

/// First version whose PSV runtime info uses the v1 (signature-aware) layout.
pub const PSV_VERSION_1: FormatVersion = FormatVersion::new(1, 1);

/// First version whose PSV runtime info uses the v2 (numthreads) layout.
pub const PSV_VERSION_2: FormatVersion = FormatVersion::new(1, 6);

/// Highest officially released version. Anything strictly newer is a
/// pre-release build: container hashing is bypassed and the digest field is
/// filled with [`PREVIEW_DIGEST`] instead of a real digest.
pub const HIGHEST_RELEASED_VERSION: FormatVersion = FormatVersion::new(1, 8);

/// Well-known sentinel digest written into pre-release containers.
pub const PREVIEW_DIGEST: [u8; 16] = *b"DXCONTAINERPREVW";

impl FormatVersion {
    /// Creates a version value.
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// True when string-table dedup and 4-byte part alignment apply.
    pub fn aligned(&self) -> bool {
        *self >= DEDUP_VERSION
    }

    /// True for versions strictly newer than the highest released one.
    pub fn is_prerelease(&self) -> bool {
        *self > HIGHEST_RELEASED_VERSION
    }

    /// PSV runtime-info layout version negotiated from this format version.
    pub fn psv_info_version(&self) -> u32 {
        if *self >= PSV_VERSION_2 {
            2
        } else if *self >= PSV_VERSION_1 {
            1
        } else {
            0
        }
    }
}

/// Shader stage of a module or function.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ShaderStage {
    /// Pixel shader.
    Pixel,
    /// Vertex shader.
    Vertex,
    /// Geometry shader.
    Geometry,
    /// Hull shader.
    Hull,
    /// Domain shader.
    Domain,
    /// Compute shader.
    Compute,
    /// Shader library (multiple entry points).
    Library,
    /// Mesh shader.
    Mesh,
    /// Amplification shader.
    Amplification,
    /// Unrecognized stage value decoded from a container.
    Invalid,
}

impl ShaderStage {
    /// Decodes a stage from its binary value.
    pub fn from_u32(value: u32) -> ShaderStage {
        match value {
            0 => Self::Pixel,
            1 => Self::Vertex,
            2 => Self::Geometry,
            3 => Self::Hull,
            4 => Self::Domain,
            5 => Self::Compute,
            6 => Self::Library,
            13 => Self::Mesh,
            14 => Self::Amplification,
            _ => Self::Invalid,
        }
    }

    /// Binary value of this stage.
    pub fn as_u32(&self) -> u32 {
        match self {
            Self::Pixel => 0,
            Self::Vertex => 1,
            Self::Geometry => 2,
            Self::Hull => 3,
            Self::Domain => 4,
            Self::Compute => 5,
            Self::Library => 6,
            Self::Mesh => 13,
            Self::Amplification => 14,
            Self::Invalid => u32::MAX,
        }
    }

    /// Profile name used in diagnostics.
    pub fn profile_name(&self) -> &'static str {
        match self {
            Self::Pixel => "pixel",
            Self::Vertex => "vertex",
            Self::Geometry => "geometry",
            Self::Hull => "hull",
            Self::Domain => "domain",
            Self::Compute => "compute",
            Self::Library => "library",
            Self::Mesh => "mesh",
            Self::Amplification => "amplification",
            Self::Invalid => "invalid",
        }
    }

    /// True for stages that carry per-entry-point signature parts.
    pub fn has_signatures(&self) -> bool {
        !matches!(self, Self::Library | Self::Compute | Self::Amplification | Self::Invalid)
    }

    /// True for stages that can broadcast outputs across views, and so may
    /// carry ViewID dependency tables in the PSV part.
    pub fn can_broadcast_view_id(&self) -> bool {
        matches!(
            self,
            Self::Vertex | Self::Hull | Self::Domain | Self::Geometry | Self::Pixel | Self::Mesh
        )
    }

    /// True for stages with a patch-constant (or primitive) signature.
    pub fn has_patch_constant_signature(&self) -> bool {
        matches!(self, Self::Hull | Self::Domain | Self::Mesh)
    }
}

/// Semantic kind of a signature element: arbitrary, or one of a fixed set of
/// system values.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SemanticKind {
    /// User-defined semantic; carries a name.
    Arbitrary,
    /// `SV_VertexID`.
    VertexId,
    /// `SV_InstanceID`.
    InstanceId,
    /// `SV_Position`.
    Position,
    /// `SV_ClipDistance`.
    ClipDistance,
    /// `SV_CullDistance`.
    CullDistance,
    /// `SV_PrimitiveID`.
    PrimitiveId,
    /// `SV_SampleIndex`.
    SampleIndex,
    /// `SV_IsFrontFace`.
    IsFrontFace,
    /// `SV_Coverage`.
    Coverage,
    /// `SV_Target`.
    Target,
    /// `SV_Depth`.
    Depth,
    /// `SV_TessFactor`; binary encoding depends on the tessellator domain.
    TessFactor,
    /// `SV_InsideTessFactor`; binary encoding depends on the tessellator
    /// domain.
    InsideTessFactor,
    /// `SV_ViewID`.
    ViewId,
    /// `SV_Barycentrics`.
    Barycentrics,
    /// Unrecognized kind decoded from a container.
    Invalid,
}

impl SemanticKind {
    /// Decodes a kind from its PSV binary value.
    pub fn from_u8(value: u8) -> SemanticKind {
        match value {
            0 => Self::Arbitrary,
            1 => Self::VertexId,
            2 => Self::InstanceId,
            3 => Self::Position,
            4 => Self::ClipDistance,
            5 => Self::CullDistance,
            6 => Self::PrimitiveId,
            7 => Self::SampleIndex,
            8 => Self::IsFrontFace,
            9 => Self::Coverage,
            10 => Self::Target,
            11 => Self::Depth,
            12 => Self::TessFactor,
            13 => Self::InsideTessFactor,
            14 => Self::ViewId,
            15 => Self::Barycentrics,
            _ => Self::Invalid,
        }
    }

    /// PSV binary value of this kind.
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Arbitrary => 0,
            Self::VertexId => 1,
            Self::InstanceId => 2,
            Self::Position => 3,
            Self::ClipDistance => 4,
            Self::CullDistance => 5,
            Self::PrimitiveId => 6,
            Self::SampleIndex => 7,
            Self::IsFrontFace => 8,
            Self::Coverage => 9,
            Self::Target => 10,
            Self::Depth => 11,
            Self::TessFactor => 12,
            Self::InsideTessFactor => 13,
            Self::ViewId => 14,
            Self::Barycentrics => 15,
            Self::Invalid => u8::MAX,
        }
    }
}

/// Tessellator domain; disambiguates the binary encoding of the two
/// tessellation-factor semantics.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TessellatorDomain {
    /// No domain (non-tessellation stages).
    Undefined,
    /// Isoline domain.
    Isoline,
    /// Triangle domain.
    Tri,
    /// Quad domain.
    Quad,
}

impl TessellatorDomain {
    /// Binary value of this domain.
    pub fn as_u32(&self) -> u32 {
        match self {
            Self::Undefined => 0,
            Self::Isoline => 1,
            Self::Tri => 2,
            Self::Quad => 3,
        }
    }
}

/// Scalar component type of a signature element.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ComponentType {
    /// No declared type.
    Unknown,
    /// Single-bit boolean. Its register-component encoding depends on a
    /// legacy compatibility flag; see [`crate::sigelem::encode_component_type`].
    I1,
    /// Signed 16-bit integer.
    I16,
    /// Unsigned 16-bit integer.
    U16,
    /// Signed 32-bit integer.
    I32,
    /// Unsigned 32-bit integer.
    U32,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 64-bit integer.
    U64,
    /// 16-bit float.
    F16,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

impl ComponentType {
    /// Decodes from the PSV binary value.
    pub fn from_u8(value: u8) -> ComponentType {
        match value {
            1 => Self::I1,
            2 => Self::I16,
            3 => Self::U16,
            4 => Self::I32,
            5 => Self::U32,
            6 => Self::I64,
            7 => Self::U64,
            8 => Self::F16,
            9 => Self::F32,
            10 => Self::F64,
            _ => Self::Unknown,
        }
    }

    /// PSV binary value of this type.
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::I1 => 1,
            Self::I16 => 2,
            Self::U16 => 3,
            Self::I32 => 4,
            Self::U32 => 5,
            Self::I64 => 6,
            Self::U64 => 7,
            Self::F16 => 8,
            Self::F32 => 9,
            Self::F64 => 10,
        }
    }
}

/// Interpolation mode of a signature element.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum InterpolationMode {
    /// No interpolation declared.
    Undefined,
    /// Constant (no interpolation).
    Constant,
    /// Perspective-correct linear.
    Linear,
    /// Perspective-correct linear, centroid sampled.
    LinearCentroid,
    /// Linear without perspective correction.
    LinearNoperspective,
    /// Linear without perspective correction, centroid sampled.
    LinearNoperspectiveCentroid,
    /// Perspective-correct linear, per sample.
    LinearSample,
    /// Linear without perspective correction, per sample.
    LinearNoperspectiveSample,
    /// Unrecognized mode decoded from a container.
    Invalid,
}

impl InterpolationMode {
    /// Decodes from the PSV binary value.
    pub fn from_u8(value: u8) -> InterpolationMode {
        match value {
            0 => Self::Undefined,
            1 => Self::Constant,
            2 => Self::Linear,
            3 => Self::LinearCentroid,
            4 => Self::LinearNoperspective,
            5 => Self::LinearNoperspectiveCentroid,
            6 => Self::LinearSample,
            7 => Self::LinearNoperspectiveSample,
            _ => Self::Invalid,
        }
    }

    /// PSV binary value of this mode.
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Undefined => 0,
            Self::Constant => 1,
            Self::Linear => 2,
            Self::LinearCentroid => 3,
            Self::LinearNoperspective => 4,
            Self::LinearNoperspectiveCentroid => 5,
            Self::LinearSample => 6,
            Self::LinearNoperspectiveSample => 7,
            Self::Invalid => u8::MAX,
        }
    }
}

/// Minimum-precision hint of a signature element.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum MinPrecision {
    /// Full precision.
    Default,
    /// May be computed at 16-bit float precision.
    Float16,
    /// May be computed at signed 16-bit integer precision.
    SInt16,
    /// May be computed at unsigned 16-bit integer precision.
    UInt16,
    /// Unrecognized value decoded from a container.
    Invalid,
}

impl MinPrecision {
    /// Decodes from the binary value.
    pub fn from_u8(value: u8) -> MinPrecision {
        match value {
            0 => Self::Default,
            1 => Self::Float16,
            2 => Self::SInt16,
            3 => Self::UInt16,
            _ => Self::Invalid,
        }
    }

    /// Binary value of this hint.
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Default => 0,
            Self::Float16 => 1,
            Self::SInt16 => 2,
            Self::UInt16 => 3,
            Self::Invalid => u8::MAX,
        }
    }
}

/// Sentinel row for signature elements the packer skipped (unallocated).
/// Callers must not advance registers for unallocated elements.
pub const UNALLOCATED_ROW: u8 = 0xFF;

/// One semantic input/output slot of a shader stage.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SignatureElement {
    /// Semantic name; empty for system-value semantics.
    pub name: String,
    /// Per-row semantic indices (one per occupied row).
    pub indices: Vec<u32>,
    /// Semantic kind.
    pub kind: SemanticKind,
    /// Scalar component type.
    pub component_type: ComponentType,
    /// Interpolation mode.
    pub interpolation: InterpolationMode,
    /// Number of occupied rows.
    pub rows: u8,
    /// First row, or [`UNALLOCATED_ROW`].
    pub start_row: u8,
    /// Number of occupied columns (1..=4).
    pub cols: u8,
    /// First column; 0 when allocated at a full-register start.
    pub start_col: u8,
    /// 4-bit write/read usage mask.
    pub usage_mask: u8,
    /// 4-bit dynamic-index mask.
    pub dynamic_mask: u8,
    /// Minimum-precision hint.
    pub min_precision: MinPrecision,
    /// Output stream; 0 for all non-geometry stages.
    pub stream: u8,
}

impl SignatureElement {
    /// True when the packer assigned this element a real starting row.
    pub fn is_allocated(&self) -> bool {
        self.start_row != UNALLOCATED_ROW
    }
}

/// Resource class; also the fixed serialization order of binding records.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum ResourceClass {
    /// Constant buffer.
    CBuffer,
    /// Sampler state.
    Sampler,
    /// Shader resource view (read-only).
    Srv,
    /// Unordered access view (read-write).
    Uav,
}

impl ResourceClass {
    /// Decodes from the binary value.
    pub fn from_u32(value: u32) -> Option<ResourceClass> {
        match value {
            0 => Some(Self::CBuffer),
            1 => Some(Self::Sampler),
            2 => Some(Self::Srv),
            3 => Some(Self::Uav),
            _ => None,
        }
    }

    /// Binary value of this class.
    pub fn as_u32(&self) -> u32 {
        match self {
            Self::CBuffer => 0,
            Self::Sampler => 1,
            Self::Srv => 2,
            Self::Uav => 3,
        }
    }
}

/// Shape of a declared resource.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ResourceKind {
    /// Unrecognized kind decoded from a container.
    Invalid,
    /// 1D texture.
    Texture1D,
    /// 2D texture.
    Texture2D,
    /// 3D texture.
    Texture3D,
    /// Cube texture.
    TextureCube,
    /// Typed buffer.
    TypedBuffer,
    /// Raw (byte-address) buffer.
    RawBuffer,
    /// Structured buffer.
    StructuredBuffer,
    /// Constant buffer.
    CBuffer,
    /// Sampler state.
    Sampler,
    /// Raytracing acceleration structure.
    RtAccelerationStructure,
}

impl ResourceKind {
    /// Decodes from the binary value.
    pub fn from_u32(value: u32) -> ResourceKind {
        match value {
            1 => Self::Texture1D,
            2 => Self::Texture2D,
            3 => Self::Texture3D,
            4 => Self::TextureCube,
            5 => Self::TypedBuffer,
            6 => Self::RawBuffer,
            7 => Self::StructuredBuffer,
            8 => Self::CBuffer,
            9 => Self::Sampler,
            10 => Self::RtAccelerationStructure,
            _ => Self::Invalid,
        }
    }

    /// Binary value of this kind.
    pub fn as_u32(&self) -> u32 {
        match self {
            Self::Invalid => 0,
            Self::Texture1D => 1,
            Self::Texture2D => 2,
            Self::Texture3D => 3,
            Self::TextureCube => 4,
            Self::TypedBuffer => 5,
            Self::RawBuffer => 6,
            Self::StructuredBuffer => 7,
            Self::CBuffer => 8,
            Self::Sampler => 9,
            Self::RtAccelerationStructure => 10,
        }
    }
}

/// One declared resource binding.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ResourceBinding {
    /// Binding class (also serialization group).
    pub class: ResourceClass,
    /// Resource shape.
    pub kind: ResourceKind,
    /// Register space.
    pub space: u32,
    /// First register of the range.
    pub lower_bound: u32,
    /// Last register of the range (`u32::MAX` for unbounded).
    pub upper_bound: u32,
    /// Binding flags (v2 bind records only).
    pub flags: u32,
    /// Declared name, used by runtime reflection.
    pub name: String,
}

bitflags! {
    /// Feature usage bitmask serialized into the `SFI0` part.
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
    pub struct FeatureFlags: u64 {
        /// Uses 64-bit floats.
        const DOUBLES = 1 << 0;
        /// Uses minimum-precision data types.
        const MIN_PRECISION = 1 << 1;
        /// Uses 64-bit integer operations.
        const INT64_OPS = 1 << 2;
        /// Reads the view index.
        const VIEW_ID = 1 << 3;
        /// Uses barycentric inputs.
        const BARYCENTRICS = 1 << 4;
        /// Uses wave intrinsics.
        const WAVE_OPS = 1 << 5;
        /// Uses raytracing.
        const RAYTRACING = 1 << 6;
        /// Uses sampler feedback.
        const SAMPLER_FEEDBACK = 1 << 7;
        /// Uses 64-bit integer atomics.
        const ATOMIC_INT64 = 1 << 8;
    }
}

/// A packed input→output dependency table, stored flat in input-major order.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DependencyTable {
    /// Number of input scalars (rows).
    pub input_scalars: u32,
    /// Number of output scalars (columns).
    pub output_scalars: u32,
    /// `input_scalars * output_scalars` bits; `bits[i * outputs + o]` is true
    /// when output `o` depends on input `i`.
    pub bits: Vec<bool>,
}

impl DependencyTable {
    /// An all-false table of the given shape.
    pub fn empty(input_scalars: u32, output_scalars: u32) -> Self {
        Self {
            input_scalars,
            output_scalars,
            bits: vec![false; (input_scalars as usize) * (output_scalars as usize)],
        }
    }
}

/// ViewID broadcast state: which output scalars depend on the view index,
/// and which inputs feed which outputs.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ViewIdState {
    /// Per output stream: per output scalar, whether it depends on ViewID.
    /// Streams with no outputs carry an empty vector.
    pub outputs_affected: Vec<Vec<bool>>,
    /// Per output stream: inputs→outputs dependencies.
    pub io_tables: Vec<DependencyTable>,
    /// Patch-constant (or primitive) scalars that depend on ViewID
    /// (hull/mesh stages).
    pub patch_constant_affected: Option<Vec<bool>>,
    /// Hull: inputs→patch-constant table. Domain: patch-constant→outputs.
    pub patch_constant_table: Option<DependencyTable>,
}

/// Per-stage specialized runtime info, one variant per stage kind.
///
/// Every consumption site matches exhaustively; adding a stage is a
/// compile-time visible change.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum StageInfo {
    /// Pixel shader info.
    Pixel {
        /// Writes `SV_Depth`.
        depth_output: bool,
        /// Runs at sample frequency.
        sample_frequency: bool,
    },
    /// Vertex shader info.
    Vertex {
        /// Outputs `SV_Position`.
        output_position_present: bool,
    },
    /// Geometry shader info.
    Geometry {
        /// Input primitive code.
        input_primitive: u32,
        /// Output topology code.
        output_topology: u32,
        /// Bitmask of active output streams.
        output_stream_mask: u8,
        /// Outputs `SV_Position`.
        output_position_present: bool,
    },
    /// Hull shader info.
    Hull {
        /// Control points per input patch.
        input_control_point_count: u32,
        /// Control points per output patch.
        output_control_point_count: u32,
        /// Tessellator domain.
        tessellator_domain: TessellatorDomain,
        /// Tessellator output primitive code.
        tessellator_output_primitive: u32,
    },
    /// Domain shader info.
    Domain {
        /// Control points per input patch.
        input_control_point_count: u32,
        /// Tessellator domain.
        tessellator_domain: TessellatorDomain,
        /// Outputs `SV_Position`.
        output_position_present: bool,
    },
    /// Compute shader info (thread group sizes live on the module).
    Compute,
    /// Mesh shader info.
    Mesh {
        /// Group-shared memory used, in bytes.
        group_shared_bytes: u32,
        /// Payload struct size, in bytes.
        payload_size: u32,
        /// Maximum vertices emitted per group.
        max_output_vertices: u32,
        /// Maximum primitives emitted per group.
        max_output_primitives: u32,
        /// Output topology code.
        output_topology: u32,
    },
    /// Amplification shader info.
    Amplification {
        /// Payload struct size, in bytes.
        payload_size: u32,
    },
    /// Library info (per-function state lives in the value graph).
    Library,
}

impl StageInfo {
    /// The stage this info variant belongs to.
    pub fn stage(&self) -> ShaderStage {
        match self {
            Self::Pixel { .. } => ShaderStage::Pixel,
            Self::Vertex { .. } => ShaderStage::Vertex,
            Self::Geometry { .. } => ShaderStage::Geometry,
            Self::Hull { .. } => ShaderStage::Hull,
            Self::Domain { .. } => ShaderStage::Domain,
            Self::Compute => ShaderStage::Compute,
            Self::Mesh { .. } => ShaderStage::Mesh,
            Self::Amplification { .. } => ShaderStage::Amplification,
            Self::Library => ShaderStage::Library,
        }
    }

    /// Tessellator domain, for the stages that have one.
    pub fn tessellator_domain(&self) -> TessellatorDomain {
        match self {
            Self::Hull {
                tessellator_domain, ..
            }
            | Self::Domain {
                tessellator_domain, ..
            } => *tessellator_domain,
            _ => TessellatorDomain::Undefined,
        }
    }
}

/// Compiler version info serialized into the `VERS` part.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct CompilerVersion {
    /// Compiler major version.
    pub major: u16,
    /// Compiler minor version.
    pub minor: u16,
    /// Version flags word.
    pub flags: u32,
    /// Commit count of the compiler build.
    pub commit_count: u32,
    /// Commit id string; independently optional.
    pub commit_sha: Option<String>,
    /// Custom version string; independently optional.
    pub custom_string: Option<String>,
}

/// Node kinds in the module value graph used by runtime reflection.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ValueKind {
    /// A function defined in the module.
    Function {
        /// Mangled name.
        name: String,
        /// Unmangled (source) name.
        unmangled: String,
        /// Stage this function targets (library functions carry their own).
        stage: ShaderStage,
        /// Feature flags this function requires.
        feature_flags: FeatureFlags,
        /// Ray payload size in bytes, 0 when not applicable.
        payload_size: u32,
        /// Ray attribute size in bytes, 0 when not applicable.
        attribute_size: u32,
        /// Minimum shader target, packed `(major << 4) | minor`.
        min_target: u32,
    },
    /// A reference to `module.resources[index]`.
    ResourceRef {
        /// Index into the module resource list.
        index: usize,
    },
    /// A call target not defined in this module.
    ExternalFunction {
        /// Mangled callee name.
        name: String,
    },
    /// Any other instruction or value.
    Instruction,
}

/// One node in the value graph.
#[derive(Clone, Debug)]
pub struct ValueNode {
    /// Node payload.
    pub kind: ValueKind,
    /// Ids of the values this node uses.
    pub operands: Vec<u32>,
}

/// The module's use-def graph, used to compute, per function, the transitive
/// set of touched resources and unresolved external callees.
#[derive(Clone, Debug, Default)]
pub struct ValueGraph {
    /// All nodes; ids are indices into this arena.
    pub nodes: Vec<ValueNode>,
    /// Ids of the [`ValueKind::Function`] roots.
    pub function_roots: Vec<u32>,
}

/// Everything transitively reachable from one function root.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FunctionReach {
    /// Indices into the module resource list, in first-visit order.
    pub resources: Vec<usize>,
    /// Names of external callees, in first-visit order.
    pub external_callees: Vec<String>,
}

impl ValueGraph {
    /// Walks everything reachable from `root` with an explicit worklist.
    ///
    /// Iterative on purpose: recursion depth would otherwise be bounded by
    /// adversarial input. Each node is visited at most once per root.
    pub fn reach(&self, root: u32) -> FunctionReach {
        let mut visited = vec![false; self.nodes.len()];
        let mut worklist = vec![root];
        let mut reach = FunctionReach::default();

        while let Some(id) = worklist.pop() {
            let Some(node) = self.nodes.get(id as usize) else {
                continue;
            };
            if core::mem::replace(&mut visited[id as usize], true) {
                continue;
            }
            match &node.kind {
                ValueKind::ResourceRef { index } => reach.resources.push(*index),
                ValueKind::ExternalFunction { name } => {
                    reach.external_callees.push(name.clone())
                }
                // Function roots other than the one being walked are distinct
                // reflection entries; their bodies are not this root's reach.
                ValueKind::Function { .. } if id != root => continue,
                _ => {}
            }
            worklist.extend(node.operands.iter().copied());
        }

        reach.resources.sort_unstable();
        reach.resources.dedup();
        reach.external_callees.sort_unstable();
        reach.external_callees.dedup();
        reach
    }
}

/// An immutable snapshot of a validated shader module.
///
/// Constructed once per serialization/validation pass and never mutated
/// while a [`crate::container::ContainerBuilder`] or cross-validator holds it.
#[derive(Clone, Debug)]
pub struct ShaderModule {
    /// Shader stage of the entry point (or `Library`).
    pub stage: ShaderStage,
    /// Shader model `(major, minor)`.
    pub model: (u8, u8),
    /// Entry point name; empty for library modules.
    pub entry_name: String,
    /// Opaque program bitcode.
    pub bitcode: Vec<u8>,
    /// Input signature.
    pub input_signature: Vec<SignatureElement>,
    /// Output signature.
    pub output_signature: Vec<SignatureElement>,
    /// Patch-constant (hull/domain) or primitive (mesh) signature.
    pub patch_constant_signature: Vec<SignatureElement>,
    /// Declared resource bindings, in declaration order.
    pub resources: Vec<ResourceBinding>,
    /// Per-stage specialized info.
    pub stage_info: StageInfo,
    /// Feature usage not derivable from signatures/resources alone.
    pub feature_flags: FeatureFlags,
    /// Whether the shader reads the view index.
    pub uses_view_id: bool,
    /// ViewID dependency state; required when `uses_view_id` on a
    /// broadcast-capable stage.
    pub view_id_state: Option<ViewIdState>,
    /// Expected wave lane count range (0 = no expectation).
    pub wave_lane_range: (u32, u32),
    /// Compute/mesh/amplification thread group sizes.
    pub num_threads: [u32; 3],
    /// Root signature blob, serialized as `RTS0` when present.
    pub root_signature: Option<Vec<u8>>,
    /// Private data blob, serialized as `PRIV` when present.
    pub private_data: Option<Vec<u8>>,
    /// Debug name, serialized as `ILDN` when present.
    pub debug_name: Option<String>,
    /// Compiler version info, serialized as `VERS` for library modules.
    pub compiler_version: Option<CompilerVersion>,
    /// Value graph for runtime reflection; required for library modules.
    pub graph: Option<ValueGraph>,
}

impl ShaderModule {
    /// Feature flags actually serialized: the module's declared flags plus
    /// the usages derivable from its signatures and ViewID state.
    pub fn effective_feature_flags(&self) -> FeatureFlags {
        let mut flags = self.feature_flags;
        if self.uses_view_id {
            flags |= FeatureFlags::VIEW_ID;
        }
        let all_sigs = self
            .input_signature
            .iter()
            .chain(&self.output_signature)
            .chain(&self.patch_constant_signature);
        for element in all_sigs {
            match element.component_type {
                ComponentType::F64 => flags |= FeatureFlags::DOUBLES,
                ComponentType::I64 | ComponentType::U64 => flags |= FeatureFlags::INT64_OPS,
                _ => {}
            }
            if element.min_precision != MinPrecision::Default {
                flags |= FeatureFlags::MIN_PRECISION;
            }
            if element.kind == SemanticKind::Barycentrics {
                flags |= FeatureFlags::BARYCENTRICS;
            }
        }
        flags
    }

    /// Number of occupied input register rows ("vectors").
    pub fn input_vector_count(&self) -> u32 {
        vector_count(&self.input_signature, None)
    }

    /// Number of occupied output rows on `stream`.
    pub fn output_vector_count(&self, stream: u8) -> u32 {
        vector_count(&self.output_signature, Some(stream))
    }

    /// Number of occupied patch-constant rows.
    pub fn patch_constant_vector_count(&self) -> u32 {
        vector_count(&self.patch_constant_signature, None)
    }
}

fn vector_count(signature: &[SignatureElement], stream: Option<u8>) -> u32 {
    let mut max_row = 0u32;
    for element in signature {
        if let Some(stream) = stream {
            if element.stream != stream {
                continue;
            }
        }
        if !element.is_allocated() {
            continue;
        }
        let end = element.start_row as u32 + element.rows as u32;
        max_row = max_row.max(end);
    }
    max_row
}
