//! Physical resource and physical pass creation (spec.md §4.6.4, §4.6.5),
//! grounded on `RenderGraph::allocateResources`/`createRenderPasses` in
//! `original_source`'s `RenderGraph.cpp`.

use std::collections::HashMap;

use ash::vk;

use crate::commands::CommandPool;
use crate::device::{MemoryLocation, VulkanContext};
use crate::error::{Error, Result};
use crate::graph::alias::AliasingResult;
use crate::graph::physical::{AttachmentSlot, PhysicalBuffer, PhysicalImage, PhysicalPass};
use crate::graph::resource::{BufferDescription, ImageDescription, LogicalResource, ResourceType};
use crate::layout_ledger::{AccessScope, LayoutLedger};
use crate::resources::{Buffer, Image};

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

/// Initial layout per spec.md §4.6.4: "sampled → SHADER_READ_ONLY_OPTIMAL;
/// storage → GENERAL; depth format → DEPTH_STENCIL_ATTACHMENT_OPTIMAL; else
/// COLOR_ATTACHMENT_OPTIMAL."
fn initial_layout_for(format: vk::Format, usage: vk::ImageUsageFlags) -> vk::ImageLayout {
    if usage.contains(vk::ImageUsageFlags::SAMPLED) {
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    } else if usage.contains(vk::ImageUsageFlags::STORAGE) {
        vk::ImageLayout::GENERAL
    } else if is_depth_format(format) {
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
    } else {
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
    }
}

/// The (stage, access) scope that naturally accompanies `layout`, used to
/// prime a freshly created image's ledger.
pub(crate) fn default_access_scope_for_layout(layout: vk::ImageLayout) -> AccessScope {
    match layout {
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => AccessScope {
            stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            access: vk::AccessFlags::SHADER_READ,
        },
        vk::ImageLayout::GENERAL => AccessScope {
            stage: vk::PipelineStageFlags::COMPUTE_SHADER,
            access: vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE,
        },
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => AccessScope {
            stage: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        },
        _ => AccessScope {
            stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            access: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        },
    }
}

/// Create one physical image per aliased image slot, prime its ledger with
/// a `TOP_OF_PIPE -> <init-stage>` transition, and record the accumulated
/// usage union plus the logical resources sharing it.
pub(crate) fn create_physical_images(
    context: &VulkanContext,
    resources: &[LogicalResource],
    image_descriptions: &[ImageDescription],
    aliasing: &AliasingResult,
    swap_chain_extent: vk::Extent2D,
) -> Result<Vec<PhysicalImage>> {
    let mut representative: HashMap<usize, usize> = HashMap::new(); // physical idx -> resource idx
    let mut members: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut usage_union: HashMap<usize, vk::ImageUsageFlags> = HashMap::new();

    for (resource_idx, resource) in resources.iter().enumerate() {
        if resource.resource_type != ResourceType::Image {
            continue;
        }
        let physical_idx = aliasing.physical_index[resource_idx];
        representative.entry(physical_idx).or_insert(resource_idx);
        members.entry(physical_idx).or_default().push(resource_idx);
        *usage_union.entry(physical_idx).or_insert(vk::ImageUsageFlags::empty()) |= resource.image_usage_flags;
    }

    let pool = CommandPool::new(context.device_handle(), context.physical_device().graphics_family)?;
    let single_time = pool.begin_single_time()?;
    let mut physical_images = Vec::with_capacity(representative.len());

    for physical_idx in 0..representative.len() {
        let resource_idx = representative[&physical_idx];
        let description = &image_descriptions[resources[resource_idx].description_index];
        let usage = usage_union[&physical_idx];

        let extent = description.resolved_extent(swap_chain_extent);
        let image = Image::new(
            context.device_handle(),
            context.allocator(),
            description.format,
            vk::Extent3D { width: extent.width, height: extent.height, depth: description.depth_slice_count },
            description.mip_level_count,
            description.layer_count,
            usage,
            description.sample_count,
        )?;

        let initial_layout = initial_layout_for(description.format, usage);
        let mut ledger = LayoutLedger::new(description.layer_count, description.mip_level_count, vk::ImageLayout::UNDEFINED);

        let full_range = vk::ImageSubresourceRange {
            aspect_mask: image.aspect_mask(),
            base_mip_level: 0,
            level_count: description.mip_level_count,
            base_array_layer: 0,
            layer_count: description.layer_count,
        };
        if let Some(pending) = ledger.transition(
            image.handle(),
            image.aspect_mask(),
            full_range,
            default_access_scope_for_layout(initial_layout),
            initial_layout,
        )? {
            pending.record(context.raw_device(), single_time.command_buffer());
        }

        context.name_object(image.handle(), &resources[resource_idx].name);

        physical_images.push(PhysicalImage {
            image,
            aliased_resource_indices: members.remove(&physical_idx).unwrap_or_default(),
            ledger,
            usage_flags: usage,
        });
    }

    single_time.submit_and_wait(context.graphics_queue())?;
    Ok(physical_images)
}

/// Create one physical buffer per aliased buffer slot (spec.md §4.6.4).
/// External buffers wrap the caller-supplied handle instead of allocating.
pub(crate) fn create_physical_buffers(
    context: &VulkanContext,
    resources: &[LogicalResource],
    buffer_descriptions: &[BufferDescription],
    aliasing: &AliasingResult,
) -> Result<Vec<PhysicalBuffer>> {
    let mut representative: HashMap<usize, usize> = HashMap::new();
    let mut members: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut usage_union: HashMap<usize, vk::BufferUsageFlags> = HashMap::new();

    for (resource_idx, resource) in resources.iter().enumerate() {
        if resource.resource_type != ResourceType::Buffer {
            continue;
        }
        let physical_idx = aliasing.physical_index[resource_idx];
        representative.entry(physical_idx).or_insert(resource_idx);
        members.entry(physical_idx).or_default().push(resource_idx);
        *usage_union.entry(physical_idx).or_insert(vk::BufferUsageFlags::empty()) |= resource.buffer_usage_flags;
    }

    let mut physical_buffers = Vec::with_capacity(representative.len());
    for physical_idx in 0..representative.len() {
        let resource_idx = representative[&physical_idx];
        let description = &buffer_descriptions[resources[resource_idx].description_index];
        let aliased_resource_indices = members.remove(&physical_idx).unwrap_or_default();

        if let Some(external_handle) = description.external_handle {
            physical_buffers.push(PhysicalBuffer {
                buffer: None,
                external_handle: Some(external_handle),
                size: description.size,
                aliased_resource_indices,
                last_access: AccessScope::NONE,
            });
            continue;
        }

        let usage = usage_union[&physical_idx];
        let buffer = Buffer::new(
            context.device_handle(),
            context.allocator(),
            description.size,
            usage,
            MemoryLocation::GpuOnly,
        )?;
        context.name_object(buffer.handle(), &resources[resource_idx].name);
        physical_buffers.push(PhysicalBuffer {
            buffer: Some(buffer),
            external_handle: None,
            size: description.size,
            aliased_resource_indices,
            last_access: AccessScope::NONE,
        });
    }

    Ok(physical_buffers)
}

/// Build the single-subpass `VkRenderPass` plus per-virtual-frame
/// framebuffers for one rasterizer pass (spec.md §4.6.5).
pub(crate) fn build_physical_pass(
    context: &VulkanContext,
    color_attachments: &[(&LogicalResource, usize, &PhysicalImage)],
    depth_attachment: Option<(&LogicalResource, usize, &PhysicalImage)>,
    frames_in_flight: usize,
    pass_name: &str,
) -> Result<PhysicalPass> {
    let mut attachment_descriptions = Vec::new();
    let mut slots = Vec::new();
    let mut color_refs = Vec::new();
    let mut views = Vec::new();
    let mut render_area: Option<vk::Extent2D> = None;

    for (resource, physical_image_index, physical) in color_attachments {
        let extent = vk::Extent2D { width: physical.image.extent().width, height: physical.image.extent().height };
        check_render_area(&mut render_area, extent)?;

        let load_op = if resource.clear_value.is_some() {
            vk::AttachmentLoadOp::CLEAR
        } else {
            vk::AttachmentLoadOp::DONT_CARE
        };
        let store_op = if resource.read_passes.is_empty() {
            vk::AttachmentStoreOp::DONT_CARE
        } else {
            vk::AttachmentStoreOp::STORE
        };
        let initial_layout = if physical.usage_flags.contains(vk::ImageUsageFlags::SAMPLED) {
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        } else {
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        };

        let index = attachment_descriptions.len() as u32;
        attachment_descriptions.push(
            vk::AttachmentDescription::builder()
                .format(physical.image.format())
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(load_op)
                .store_op(store_op)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(initial_layout)
                .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .build(),
        );
        color_refs.push(vk::AttachmentReference {
            attachment: index,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        });
        slots.push(AttachmentSlot {
            physical_image_index: *physical_image_index,
            is_depth: false,
            load_op,
            store_op,
            initial_layout,
            final_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            clear_value: resource.clear_value,
        });
        views.push(physical.image.view());
    }

    let mut depth_ref = None;
    let mut depth_has_clear = false;
    if let Some((resource, physical_image_index, physical)) = depth_attachment {
        let extent = vk::Extent2D { width: physical.image.extent().width, height: physical.image.extent().height };
        check_render_area(&mut render_area, extent)?;

        let load_op = if resource.clear_value.is_some() {
            vk::AttachmentLoadOp::CLEAR
        } else {
            vk::AttachmentLoadOp::DONT_CARE
        };
        depth_has_clear = resource.clear_value.is_some();
        let store_op = if resource.read_passes.is_empty() {
            vk::AttachmentStoreOp::DONT_CARE
        } else {
            vk::AttachmentStoreOp::STORE
        };
        let initial_layout = if physical.usage_flags.contains(vk::ImageUsageFlags::SAMPLED) {
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        } else {
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
        };

        let index = attachment_descriptions.len() as u32;
        attachment_descriptions.push(
            vk::AttachmentDescription::builder()
                .format(physical.image.format())
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(load_op)
                .store_op(store_op)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(initial_layout)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .build(),
        );
        let reference = vk::AttachmentReference {
            attachment: index,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        depth_ref = Some(reference);
        slots.push(AttachmentSlot {
            physical_image_index,
            is_depth: true,
            load_op,
            store_op,
            initial_layout,
            final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            clear_value: resource.clear_value,
        });
        views.push(physical.image.view());
    }

    let mut subpass_builder = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs);
    if let Some(depth_ref) = depth_ref.as_ref() {
        subpass_builder = subpass_builder.depth_stencil_attachment(depth_ref);
    }
    let subpass = subpass_builder.build();

    let mut dependencies = vec![vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::FRAGMENT_SHADER)
        .src_access_mask(vk::AccessFlags::SHADER_READ)
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        .build()];
    if depth_has_clear {
        dependencies.push(
            vk::SubpassDependency::builder()
                .src_subpass(vk::SUBPASS_EXTERNAL)
                .dst_subpass(0)
                .src_stage_mask(vk::PipelineStageFlags::TOP_OF_PIPE)
                .src_access_mask(vk::AccessFlags::empty())
                .dst_stage_mask(vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS)
                .dst_access_mask(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
                .build(),
        );
    }

    let subpasses = [subpass];
    let create_info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachment_descriptions)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    let render_pass = unsafe {
        context
            .raw_device()
            .create_render_pass(&create_info, None)
            .map_err(Error::Api)?
    };
    context.name_object(render_pass, pass_name);

    let render_area = render_area.ok_or_else(|| Error::GraphValidation {
        reason: "rasterizer pass has zero color and no depth attachment".into(),
    })?;

    let mut framebuffers = Vec::with_capacity(frames_in_flight);
    for _ in 0..frames_in_flight {
        let framebuffer_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(&views)
            .width(render_area.width)
            .height(render_area.height)
            .layers(1);
        let framebuffer = unsafe {
            context
                .raw_device()
                .create_framebuffer(&framebuffer_info, None)
                .map_err(Error::Api)?
        };
        framebuffers.push(framebuffer);
    }

    Ok(PhysicalPass::new(context.device_handle(), render_pass, slots, render_area, framebuffers))
}

fn check_render_area(render_area: &mut Option<vk::Extent2D>, extent: vk::Extent2D) -> Result<()> {
    match render_area {
        None => {
            *render_area = Some(extent);
            Ok(())
        }
        Some(existing) if *existing == extent => Ok(()),
        Some(_) => Err(Error::GraphValidation {
            reason: "rasterizer pass attachments do not share a common extent".into(),
        }),
    }
}
