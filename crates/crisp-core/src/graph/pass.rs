//! Logical pass record (spec.md §3).

use ash::vk;

use crate::graph::handle::ResourceHandle;
use crate::graph::resource::AccessDescriptor;

/// What kind of work a pass performs, deciding whether it gets a
/// `VkRenderPass` (Rasterizer) or a bare execute callback (Compute/RayTracing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassType {
    Rasterizer,
    Compute,
    RayTracing,
}

/// A boxed per-pass recording callback. Invoked with the raw device, the
/// command buffer for the current virtual slot, and that slot's index.
pub type ExecuteFn = Box<dyn Fn(&ash::Device, vk::CommandBuffer, usize) + Send + Sync>;

/// One logical pass: `{ name, type, inputs[], input_accesses[], outputs[],
/// color_attachments[], optional depth_stencil_attachment, execute_fn }`
/// (spec.md §3).
pub struct Pass {
    pub name: String,
    pub pass_type: PassType,
    pub inputs: Vec<ResourceHandle>,
    pub input_accesses: Vec<AccessDescriptor>,
    pub outputs: Vec<ResourceHandle>,
    pub color_attachments: Vec<ResourceHandle>,
    pub depth_stencil_attachment: Option<ResourceHandle>,
    pub execute_fn: Option<ExecuteFn>,
}

impl Pass {
    pub fn new(name: String) -> Self {
        Self {
            name,
            pass_type: PassType::Rasterizer,
            inputs: Vec::new(),
            input_accesses: Vec::new(),
            outputs: Vec::new(),
            color_attachments: Vec::new(),
            depth_stencil_attachment: None,
            execute_fn: None,
        }
    }

    pub fn push_color_attachment(&mut self, handle: ResourceHandle) {
        self.color_attachments.push(handle);
    }

    pub fn set_depth_attachment(&mut self, handle: ResourceHandle) {
        self.depth_stencil_attachment = Some(handle);
    }
}
