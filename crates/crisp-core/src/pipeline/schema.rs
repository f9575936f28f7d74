//! Declarative pipeline descriptor: the JSON schema read by
//! [`crate::pipeline::assembly`].

use std::collections::HashMap;

use serde::Deserialize;

/// Top-level pipeline descriptor, deserialized directly from a pipeline
/// JSON file via `serde_json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineDescriptor {
    /// Shader stem per stage, resolved against the SPIR-V cache directory
    /// as `{stem}.{stage}.spv`.
    pub shaders: ShaderStages,
    /// Vertex input bindings, index-parallel with `vertex_attributes`.
    #[serde(rename = "vertexInputBindings")]
    pub vertex_input_bindings: Vec<VertexInputBinding>,
    /// Per-binding attribute format lists, parallel to `vertex_input_bindings`.
    #[serde(rename = "vertexAttributes")]
    pub vertex_attributes: Vec<Vec<AttributeFormat>>,
    /// Input assembly state.
    #[serde(rename = "inputAssembly")]
    pub input_assembly: InputAssembly,
    /// Tessellation state, absent unless `tesc`/`tese` shaders are present.
    pub tessellation: Option<Tessellation>,
    /// Viewport/scissor state; `None` fields default to dynamic.
    pub viewport: ViewportState,
    /// Rasterizer state.
    pub rasterization: Rasterization,
    /// Multisample state.
    pub multisample: Multisample,
    /// Per-attachment blend state.
    pub blend: Blend,
    /// Depth/stencil test state.
    #[serde(rename = "depthStencil")]
    pub depth_stencil: DepthStencil,
    /// Per-descriptor-set metadata (buffered/dynamic/bindless), indexed by
    /// set number.
    #[serde(rename = "descriptorSets")]
    pub descriptor_sets: Vec<DescriptorSetMeta>,
}

impl Default for PipelineDescriptor {
    fn default() -> Self {
        Self {
            shaders: ShaderStages::default(),
            vertex_input_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            input_assembly: InputAssembly::default(),
            tessellation: None,
            viewport: ViewportState::default(),
            rasterization: Rasterization::default(),
            multisample: Multisample::default(),
            blend: Blend::default(),
            depth_stencil: DepthStencil::default(),
            descriptor_sets: Vec::new(),
        }
    }
}

/// Shader stage stems, keyed by stage name. A `HashMap` rather than fixed
/// fields so a descriptor can name any subset of the eight recognized
/// stages without `Option<String>` boilerplate per stage.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShaderStages {
    /// Stage name (`vert|frag|geom|tesc|tese|comp|mesh|task`) to shader
    /// stem.
    #[serde(flatten)]
    pub stages: HashMap<String, String>,
}

impl ShaderStages {
    /// True if every tessellation stage (`tesc` and `tese`) is present,
    /// which overrides the descriptor's primitive topology to patch-list.
    pub fn has_full_tessellation(&self) -> bool {
        self.stages.contains_key("tesc") && self.stages.contains_key("tese")
    }
}

/// One vertex input binding.
#[derive(Debug, Clone, Deserialize)]
pub struct VertexInputBinding {
    /// Per-vertex or per-instance stepping.
    #[serde(rename = "inputRate")]
    pub input_rate: InputRate,
    /// Attribute formats in this binding, used only to compute strides; the
    /// actual per-attribute `vk::Format` comes from shader reflection.
    pub formats: Vec<AttributeFormat>,
}

/// Vertex buffer stepping rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputRate {
    /// Advance once per vertex.
    Vertex,
    /// Advance once per instance.
    Instance,
}

/// Vector width used to compute a vertex attribute's byte size for stride
/// calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeFormat {
    /// `vec2`, 8 bytes.
    Vec2,
    /// `vec3`, 12 bytes.
    Vec3,
    /// `vec4`, 16 bytes.
    Vec4,
}

impl AttributeFormat {
    /// Size in bytes, assuming 32-bit float components.
    pub fn byte_size(self) -> u32 {
        match self {
            AttributeFormat::Vec2 => 8,
            AttributeFormat::Vec3 => 12,
            AttributeFormat::Vec4 => 16,
        }
    }
}

/// Input assembly state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputAssembly {
    /// Primitive topology, overridden to patch-list when full tessellation
    /// is present.
    #[serde(rename = "primitiveTopology")]
    pub primitive_topology: PrimitiveTopology,
}

impl Default for InputAssembly {
    fn default() -> Self {
        Self {
            primitive_topology: PrimitiveTopology::TriangleList,
        }
    }
}

/// Primitive topology as named in pipeline JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrimitiveTopology {
    /// `VK_PRIMITIVE_TOPOLOGY_POINT_LIST`.
    PointList,
    /// `VK_PRIMITIVE_TOPOLOGY_LINE_LIST`.
    LineList,
    /// `VK_PRIMITIVE_TOPOLOGY_TRIANGLE_LIST`.
    TriangleList,
}

/// Tessellation state.
#[derive(Debug, Clone, Deserialize)]
pub struct Tessellation {
    /// Patch control point count.
    #[serde(rename = "controlPointCount")]
    pub control_point_count: u32,
}

/// Viewport/scissor state. Either array is a list of `pass` tokens sized to
/// the render area; an empty list means dynamic.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ViewportState {
    /// Fixed viewports, one `"pass"` token each meaning "size to the
    /// render area". Empty means dynamic viewport state.
    pub viewports: Vec<String>,
    /// Fixed scissors, same convention as `viewports`.
    pub scissors: Vec<String>,
}

impl ViewportState {
    /// If viewport/scissor are absent, they default to dynamic.
    pub fn is_dynamic(&self) -> bool {
        self.viewports.is_empty() && self.scissors.is_empty()
    }
}

/// Rasterizer state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Rasterization {
    /// Face culling mode.
    #[serde(rename = "cullMode")]
    pub cull_mode: CullMode,
    /// Fill vs wireframe.
    #[serde(rename = "polygonMode")]
    pub polygon_mode: PolygonMode,
    /// Rasterized line width (only meaningful with `polygonMode: line`).
    #[serde(rename = "lineWidth")]
    pub line_width: f32,
}

impl Default for Rasterization {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::Back,
            polygon_mode: PolygonMode::Fill,
            line_width: 1.0,
        }
    }
}

/// Face culling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CullMode {
    /// Cull front-facing triangles.
    Front,
    /// Cull back-facing triangles (the default).
    Back,
    /// No culling.
    None,
}

/// Rasterizer fill mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolygonMode {
    /// Solid-filled triangles.
    Fill,
    /// Wireframe edges.
    Line,
}

/// Multisample state.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Multisample {
    /// Enable alpha-to-coverage.
    #[serde(rename = "alphaToCoverage")]
    pub alpha_to_coverage: bool,
}

/// Per-attachment blend state. A single shared config for every color
/// attachment; per-attachment override is not exercised by this subsystem's
/// scope.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Blend {
    /// Enable blending on every color attachment.
    pub enabled: bool,
    /// Source color blend factor.
    pub src: BlendFactor,
    /// Destination color blend factor.
    pub dst: BlendFactor,
}

impl Default for Blend {
    fn default() -> Self {
        Self {
            enabled: false,
            src: BlendFactor::One,
            dst: BlendFactor::Zero,
        }
    }
}

/// Blend factor, named as it appears in pipeline JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlendFactor {
    /// `VK_BLEND_FACTOR_ONE`.
    One,
    /// `VK_BLEND_FACTOR_ZERO`.
    Zero,
    /// `VK_BLEND_FACTOR_ONE_MINUS_SRC_ALPHA`.
    OneMinusSrcAlpha,
}

/// Depth/stencil test state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DepthStencil {
    /// Flip the compare op to `GREATER_OR_EQUAL` for a reversed-Z depth
    /// buffer.
    #[serde(rename = "reverseDepth")]
    pub reverse_depth: bool,
    /// Enable depth writes.
    #[serde(rename = "depthWriteEnabled")]
    pub depth_write_enabled: bool,
    /// Enable the depth test.
    #[serde(rename = "depthTest")]
    pub depth_test: bool,
}

impl Default for DepthStencil {
    fn default() -> Self {
        Self {
            reverse_depth: false,
            depth_write_enabled: true,
            depth_test: true,
        }
    }
}

/// Per-descriptor-set metadata not derivable from reflection alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DescriptorSetMeta {
    /// Whether this set is replicated once per virtual frame. A `buffered`
    /// set must additionally list every dynamic-offset binding in
    /// `dynamic_buffers`, since a buffered set backed only by dynamic
    /// offsets needs no per-slot descriptor set (see DESIGN.md).
    pub buffered: bool,
    /// Binding indices within this set that use a dynamic-offset descriptor
    /// type (`UNIFORM_BUFFER_DYNAMIC`/`STORAGE_BUFFER_DYNAMIC`).
    #[serde(rename = "dynamicBuffers")]
    pub dynamic_buffers: Vec<u32>,
    /// `[count, max_variable_count]` for a bindless (variable-descriptor-
    /// count) binding in this set, if any.
    pub bindless: Option<[u32; 2]>,
}
