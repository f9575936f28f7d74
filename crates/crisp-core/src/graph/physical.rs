//! Physical resource types: the actual GPU objects one or more logical
//! resources alias onto (spec.md §3, §4.6.4, §4.6.5).

use ash::vk;

use crate::layout_ledger::{AccessScope, LayoutLedger};
use crate::resources::{Buffer, Image};

/// A physical image owning one Vulkan image shared by every logical
/// resource in `aliased_resource_indices` (spec.md §3). Carries its own
/// [`LayoutLedger`] rather than consulting module-level globals, per
/// spec.md §9's Open Question on `glastPipelineStage`/`glastAccessFlags`.
pub struct PhysicalImage {
    pub image: Image,
    pub aliased_resource_indices: Vec<usize>,
    pub ledger: LayoutLedger,
    /// Accumulated usage union of every aliased logical description, kept
    /// around so `resize` can recreate with the same usage without
    /// re-walking every logical resource.
    pub usage_flags: vk::ImageUsageFlags,
}

impl PhysicalImage {
    pub fn full_subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.image.aspect_mask(),
            base_mip_level: 0,
            level_count: self.image.mip_levels(),
            base_array_layer: 0,
            layer_count: self.image.array_layers(),
        }
    }
}

/// A physical buffer, owning its allocation unless it wraps an externally
/// owned handle (spec.md §3). Tracks its own last access scope since buffers
/// have no per-subresource layout to carry that state the way images do via
/// [`LayoutLedger`].
pub struct PhysicalBuffer {
    pub buffer: Option<Buffer>,
    pub external_handle: Option<vk::Buffer>,
    pub size: vk::DeviceSize,
    pub aliased_resource_indices: Vec<usize>,
    pub last_access: AccessScope,
}

impl PhysicalBuffer {
    pub fn handle(&self) -> vk::Buffer {
        self.external_handle
            .unwrap_or_else(|| self.buffer.as_ref().expect("physical buffer destroyed").handle())
    }
}

/// One color or depth-stencil attachment description baked into a
/// [`PhysicalPass`]'s `VkRenderPass` (spec.md §4.6.5).
#[derive(Debug, Clone, Copy)]
pub struct AttachmentSlot {
    /// Index of the owning physical image.
    pub physical_image_index: usize,
    /// Whether this slot is the depth-stencil attachment.
    pub is_depth: bool,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub initial_layout: vk::ImageLayout,
    pub final_layout: vk::ImageLayout,
    pub clear_value: Option<vk::ClearValue>,
}

/// A rasterizer pass's compiled Vulkan object: the `VkRenderPass`, its
/// attachment slots in subpass order, the render area, and one framebuffer
/// per virtual frame slot (spec.md §3, §4.6.5). Compute/ray-tracing passes
/// have no `PhysicalPass`.
pub struct PhysicalPass {
    device: ash::Device,
    render_pass: vk::RenderPass,
    pub attachments: Vec<AttachmentSlot>,
    pub render_area: vk::Extent2D,
    pub framebuffers: Vec<vk::Framebuffer>,
}

impl PhysicalPass {
    pub fn new(
        device: ash::Device,
        render_pass: vk::RenderPass,
        attachments: Vec<AttachmentSlot>,
        render_area: vk::Extent2D,
        framebuffers: Vec<vk::Framebuffer>,
    ) -> Self {
        Self {
            device,
            render_pass,
            attachments,
            render_area,
            framebuffers,
        }
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn framebuffer(&self, virtual_index: usize) -> vk::Framebuffer {
        self.framebuffers[virtual_index % self.framebuffers.len()]
    }
}

impl Drop for PhysicalPass {
    fn drop(&mut self) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.destroy_framebuffer(framebuffer, None);
            }
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}
