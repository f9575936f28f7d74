//! Per-pass builder API (spec.md §4.6.1), grounded on `RenderGraph::Builder`
//! in `original_source`'s `RenderGraphExperimental.cpp`.

use ash::vk;

use crate::graph::blackboard::Blackboard;
use crate::graph::handle::{PassHandle, ResourceHandle, EXTERNAL_PASS};
use crate::graph::pass::PassType;
use crate::graph::resource::{
    AccessDescriptor, BufferDescription, ImageDescription, ResourceUsageKind,
};
use crate::graph::RenderGraph;

/// Borrowed for the duration of one pass's declaration. Every method mutates
/// the owning graph's resource/pass records directly; there is no separate
/// builder-local state to flush.
pub struct Builder<'a> {
    graph: &'a mut RenderGraph,
    pass_handle: PassHandle,
}

impl<'a> Builder<'a> {
    pub(crate) fn new(graph: &'a mut RenderGraph, pass_handle: PassHandle) -> Self {
        Self { graph, pass_handle }
    }

    /// Flags the owning pass's kind.
    pub fn set_type(&mut self, pass_type: PassType) {
        self.graph.pass_mut(self.pass_handle).pass_type = pass_type;
    }

    /// Sampled read; adds `SAMPLED_BIT` usage; access `{Texture,
    /// FRAGMENT_SHADER, SHADER_READ}`.
    pub fn read_texture(&mut self, res: ResourceHandle) {
        self.graph.resource_mut(res).image_usage_flags |= vk::ImageUsageFlags::SAMPLED;
        self.push_read(res, AccessDescriptor {
            usage_kind: ResourceUsageKind::Texture,
            pipeline_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            access: vk::AccessFlags::SHADER_READ,
        });
    }

    /// Storage-image read; adds `STORAGE_BIT` usage; access `{Storage,
    /// COMPUTE_SHADER, SHADER_READ}` (spec.md §4.6.1's canonical value,
    /// chosen over `original_source`'s apparently-mismatched
    /// `INPUT_ATTACHMENT_READ_BIT` for this call).
    pub fn read_storage_image(&mut self, res: ResourceHandle) {
        self.graph.resource_mut(res).image_usage_flags |= vk::ImageUsageFlags::STORAGE;
        self.push_read(res, AccessDescriptor {
            usage_kind: ResourceUsageKind::Storage,
            pipeline_stage: vk::PipelineStageFlags::COMPUTE_SHADER,
            access: vk::AccessFlags::SHADER_READ,
        });
    }

    /// Storage-buffer read; access `{Storage, COMPUTE_SHADER, SHADER_READ}`.
    pub fn read_buffer(&mut self, res: ResourceHandle) {
        self.graph.resource_mut(res).buffer_usage_flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
        self.push_read(res, AccessDescriptor {
            usage_kind: ResourceUsageKind::Storage,
            pipeline_stage: vk::PipelineStageFlags::COMPUTE_SHADER,
            access: vk::AccessFlags::SHADER_READ,
        });
    }

    /// Subpass input read; adds `INPUT_ATTACHMENT_BIT`; access `{Attachment,
    /// FRAGMENT_SHADER, INPUT_ATTACHMENT_READ}`.
    pub fn read_attachment(&mut self, res: ResourceHandle) {
        self.graph.resource_mut(res).image_usage_flags |= vk::ImageUsageFlags::INPUT_ATTACHMENT;
        self.push_read(res, AccessDescriptor {
            usage_kind: ResourceUsageKind::Attachment,
            pipeline_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            access: vk::AccessFlags::INPUT_ATTACHMENT_READ,
        });
    }

    fn push_read(&mut self, res: ResourceHandle, access: AccessDescriptor) {
        self.graph.resource_mut(res).read_passes.push(self.pass_handle);
        let pass = self.graph.pass_mut(self.pass_handle);
        pass.inputs.push(res);
        pass.input_accesses.push(access);
    }

    /// Produces a color or depth attachment; format decides which. Producer
    /// access reflects the attachment stage (color-output vs
    /// late-fragment-tests).
    pub fn create_attachment(
        &mut self,
        description: ImageDescription,
        name: impl Into<String>,
        clear_value: Option<vk::ClearValue>,
    ) -> ResourceHandle {
        let is_depth = is_depth_format(description.format);
        let handle = self.graph.add_image_resource(description, name.into());

        let resource = self.graph.resource_mut(handle);
        resource.producer = Some(self.pass_handle);
        resource.clear_value = clear_value;
        resource.image_usage_flags |= if is_depth {
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
        } else {
            vk::ImageUsageFlags::COLOR_ATTACHMENT
        };

        let access = AccessDescriptor {
            usage_kind: ResourceUsageKind::Attachment,
            pipeline_stage: if is_depth {
                vk::PipelineStageFlags::LATE_FRAGMENT_TESTS
            } else {
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            },
            access: if is_depth {
                vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
            } else {
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            },
        };
        resource.producer_access = Some(access);

        let pass = self.graph.pass_mut(self.pass_handle);
        pass.outputs.push(handle);
        if is_depth {
            pass.set_depth_attachment(handle);
        } else {
            pass.push_color_attachment(handle);
        }

        handle
    }

    /// Produces a storage image; usage `STORAGE_BIT`; producer access
    /// `{Storage, COMPUTE_SHADER, SHADER_WRITE}`.
    pub fn create_storage_image(&mut self, description: ImageDescription, name: impl Into<String>) -> ResourceHandle {
        let handle = self.graph.add_image_resource(description, name.into());
        let resource = self.graph.resource_mut(handle);
        resource.producer = Some(self.pass_handle);
        resource.image_usage_flags |= vk::ImageUsageFlags::STORAGE;
        resource.producer_access = Some(AccessDescriptor {
            usage_kind: ResourceUsageKind::Storage,
            pipeline_stage: vk::PipelineStageFlags::COMPUTE_SHADER,
            access: vk::AccessFlags::SHADER_WRITE,
        });
        self.graph.pass_mut(self.pass_handle).outputs.push(handle);
        handle
    }

    /// Produces a buffer resource owned by the graph.
    pub fn create_buffer(&mut self, description: BufferDescription, name: impl Into<String>) -> ResourceHandle {
        let handle = self.graph.add_buffer_resource(description, name.into(), false);
        self.finish_buffer_output(handle);
        handle
    }

    /// Imports an externally-owned buffer (its `external_handle` must be
    /// set); never aliased.
    pub fn import_buffer(&mut self, description: BufferDescription, name: impl Into<String>) -> ResourceHandle {
        debug_assert!(description.is_external(), "import_buffer requires an external handle");
        let handle = self.graph.add_buffer_resource(description, name.into(), true);
        self.finish_buffer_output(handle);
        handle
    }

    fn finish_buffer_output(&mut self, handle: ResourceHandle) {
        let resource = self.graph.resource_mut(handle);
        resource.producer = Some(self.pass_handle);
        resource.buffer_usage_flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
        resource.producer_access = Some(AccessDescriptor {
            usage_kind: ResourceUsageKind::Storage,
            pipeline_stage: vk::PipelineStageFlags::COMPUTE_SHADER,
            access: vk::AccessFlags::SHADER_WRITE,
        });
        self.graph.pass_mut(self.pass_handle).outputs.push(handle);
    }

    /// Read+modify: records a read on the current version, then emits a new
    /// handle at `version + 1` referring to the same physical slot (spec.md
    /// §4.6.1).
    pub fn write_attachment(&mut self, res: ResourceHandle) -> ResourceHandle {
        self.read_attachment(res);

        let source = self.graph.resource(res).clone();
        let is_depth = source
            .producer_access
            .map(|a| a.pipeline_stage == vk::PipelineStageFlags::LATE_FRAGMENT_TESTS)
            .unwrap_or(false);

        let new_handle = self.graph.push_resource_version(res, source.version + 1);
        let resource = self.graph.resource_mut(new_handle);
        resource.producer = Some(self.pass_handle);

        let pass = self.graph.pass_mut(self.pass_handle);
        pass.outputs.push(new_handle);
        if is_depth {
            pass.set_depth_attachment(new_handle);
        } else {
            pass.push_color_attachment(new_handle);
        }

        new_handle
    }

    /// Marks `res` as surviving past the graph's last internal reader via a
    /// sentinel external-pass reader.
    pub fn export_texture(&mut self, res: ResourceHandle) {
        let resource = self.graph.resource_mut(res);
        resource.image_usage_flags |= vk::ImageUsageFlags::SAMPLED;
        resource.read_passes.push(EXTERNAL_PASS);
    }

    /// Marks `res`'s physical image as a blit/copy source, for a caller that
    /// presents a graph output by copying it into the swap-chain image
    /// rather than sampling it from a pipeline (spec.md §4.6.1's export
    /// contract, applied to the transfer rather than shader-read case).
    pub fn mark_transfer_source(&mut self, res: ResourceHandle) {
        let resource = self.graph.resource_mut(res);
        resource.image_usage_flags |= vk::ImageUsageFlags::TRANSFER_SRC;
        resource.read_passes.push(EXTERNAL_PASS);
    }

    /// Shared keyed scratch map for cross-pass resource handoff.
    pub fn blackboard(&mut self) -> &mut Blackboard {
        self.graph.blackboard_mut()
    }
}

fn is_depth_format(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D16_UNORM
            | vk::Format::D32_SFLOAT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D32_SFLOAT_S8_UINT
            | vk::Format::X8_D24_UNORM_PACK32
    )
}
