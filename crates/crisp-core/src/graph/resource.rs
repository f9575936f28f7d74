//! Logical and physical resource types (spec.md §3).

use ash::vk;

use crate::graph::handle::PassHandle;

/// Where an image's extent comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizePolicy {
    /// Fixed `(width, height)` in texels.
    Absolute,
    /// `swap_chain_extent * factor`, recomputed on every `resize`.
    SwapChainRelative(f32),
}

/// Description of a logical image resource. Two descriptions are
/// alias-compatible iff every field below except `usage_flags` and
/// `clear_value` is identical (spec.md §3: "identical in format, samples,
/// layers, mips, depth, flags, and size").
#[derive(Debug, Clone)]
pub struct ImageDescription {
    pub format: vk::Format,
    pub sample_count: vk::SampleCountFlags,
    pub layer_count: u32,
    pub mip_level_count: u32,
    pub depth_slice_count: u32,
    pub create_flags: vk::ImageCreateFlags,
    /// Accumulated during graph build as builders call `read_*`/`create_*`.
    pub usage_flags: vk::ImageUsageFlags,
    pub size_policy: SizePolicy,
    pub width: u32,
    pub height: u32,
    pub clear_value: Option<vk::ClearValue>,
}

impl ImageDescription {
    /// A single-layer, single-mip, non-multisampled 2D image sized to the
    /// swap chain. The common case for attachments.
    pub fn swap_chain_relative(format: vk::Format) -> Self {
        Self {
            format,
            sample_count: vk::SampleCountFlags::TYPE_1,
            layer_count: 1,
            mip_level_count: 1,
            depth_slice_count: 1,
            create_flags: vk::ImageCreateFlags::empty(),
            usage_flags: vk::ImageUsageFlags::empty(),
            size_policy: SizePolicy::SwapChainRelative(1.0),
            width: 0,
            height: 0,
            clear_value: None,
        }
    }

    /// A fixed-size 2D image.
    pub fn absolute(format: vk::Format, width: u32, height: u32) -> Self {
        Self {
            format,
            sample_count: vk::SampleCountFlags::TYPE_1,
            layer_count: 1,
            mip_level_count: 1,
            depth_slice_count: 1,
            create_flags: vk::ImageCreateFlags::empty(),
            usage_flags: vk::ImageUsageFlags::empty(),
            size_policy: SizePolicy::Absolute,
            width,
            height,
            clear_value: None,
        }
    }

    pub fn with_clear_value(mut self, clear_value: vk::ClearValue) -> Self {
        self.clear_value = Some(clear_value);
        self
    }

    pub fn with_mip_levels(mut self, mip_level_count: u32) -> Self {
        self.mip_level_count = mip_level_count;
        self
    }

    /// True iff `self` and `other` can share one physical image, per
    /// spec.md §3's alias-compatibility rule. Deliberately excludes
    /// `usage_flags` (accumulated, unioned across the chain) and
    /// `clear_value` (per-logical-resource, applies at attachment-build
    /// time only).
    pub fn alias_compatible(&self, other: &ImageDescription) -> bool {
        self.format == other.format
            && self.sample_count == other.sample_count
            && self.layer_count == other.layer_count
            && self.mip_level_count == other.mip_level_count
            && self.depth_slice_count == other.depth_slice_count
            && self.create_flags == other.create_flags
            && self.size_policy == other.size_policy
            && self.width == other.width
            && self.height == other.height
    }

    pub fn resolved_extent(&self, swap_chain_extent: vk::Extent2D) -> vk::Extent2D {
        match self.size_policy {
            SizePolicy::Absolute => vk::Extent2D { width: self.width, height: self.height },
            SizePolicy::SwapChainRelative(factor) => vk::Extent2D {
                width: ((swap_chain_extent.width as f32) * factor).max(1.0) as u32,
                height: ((swap_chain_extent.height as f32) * factor).max(1.0) as u32,
            },
        }
    }
}

impl PartialEq for SizePolicy {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SizePolicy::Absolute, SizePolicy::Absolute) => true,
            (SizePolicy::SwapChainRelative(a), SizePolicy::SwapChainRelative(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for SizePolicy {}

/// Description of a logical buffer resource.
#[derive(Debug, Clone)]
pub struct BufferDescription {
    pub size: vk::DeviceSize,
    pub usage_flags: vk::BufferUsageFlags,
    /// An externally-owned buffer handle (e.g. a streaming buffer); never
    /// aliased (spec.md §3).
    pub external_handle: Option<vk::Buffer>,
}

impl BufferDescription {
    pub fn new(size: vk::DeviceSize, usage_flags: vk::BufferUsageFlags) -> Self {
        Self { size, usage_flags, external_handle: None }
    }

    pub fn imported(size: vk::DeviceSize, usage_flags: vk::BufferUsageFlags, handle: vk::Buffer) -> Self {
        Self { size, usage_flags, external_handle: Some(handle) }
    }

    pub fn is_external(&self) -> bool {
        self.external_handle.is_some()
    }

    /// Buffers alias iff identical in size and usage bits; external buffers
    /// never alias (spec.md §3).
    pub fn alias_compatible(&self, other: &BufferDescription) -> bool {
        !self.is_external() && !other.is_external() && self.size == other.size && self.usage_flags == other.usage_flags
    }
}

/// What kind of access a pass declares on a resource, used both to pick the
/// target layout during execution and to select the producer's access scope
/// (spec.md §3, §4.6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceUsageKind {
    Attachment,
    Texture,
    Storage,
}

/// `{ usage_kind, pipeline_stage, access_mask }` (spec.md §3).
#[derive(Debug, Clone, Copy)]
pub struct AccessDescriptor {
    pub usage_kind: ResourceUsageKind,
    pub pipeline_stage: vk::PipelineStageFlags,
    pub access: vk::AccessFlags,
}

/// Tagged description index, image or buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Image,
    Buffer,
}

/// A logical resource: a handle's backing record (spec.md §3).
#[derive(Debug, Clone)]
pub struct LogicalResource {
    pub name: String,
    pub resource_type: ResourceType,
    pub description_index: usize,
    pub version: u32,
    pub producer: Option<PassHandle>,
    pub read_passes: Vec<PassHandle>,
    pub producer_access: Option<AccessDescriptor>,
    pub image_usage_flags: vk::ImageUsageFlags,
    pub buffer_usage_flags: vk::BufferUsageFlags,
    pub clear_value: Option<vk::ClearValue>,
    pub externally_owned: bool,
    /// Assigned by `determine_aliased_resources` during compile.
    pub physical_index: Option<usize>,
}

impl LogicalResource {
    pub fn new(name: String, resource_type: ResourceType, description_index: usize, externally_owned: bool) -> Self {
        Self {
            name,
            resource_type,
            description_index,
            version: 0,
            producer: None,
            read_passes: Vec::new(),
            producer_access: None,
            image_usage_flags: vk::ImageUsageFlags::empty(),
            buffer_usage_flags: vk::BufferUsageFlags::empty(),
            clear_value: None,
            externally_owned,
            physical_index: None,
        }
    }
}

