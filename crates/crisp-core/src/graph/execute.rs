//! Per-pass synchronization and execution.

use ash::vk;

use crate::error::{Error, Result};
use crate::graph::compile::default_access_scope_for_layout;
use crate::graph::handle::ResourceHandle;
use crate::graph::pass::PassType;
use crate::graph::resource::{AccessDescriptor, ResourceType, ResourceUsageKind};
use crate::graph::RenderGraph;
use crate::layout_ledger::AccessScope;

fn target_layout_for(usage_kind: ResourceUsageKind) -> vk::ImageLayout {
    match usage_kind {
        ResourceUsageKind::Texture => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ResourceUsageKind::Storage => vk::ImageLayout::GENERAL,
        ResourceUsageKind::Attachment => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    }
}

/// Transition `handle`'s physical resource to `access`'s scope, recording
/// any required barrier onto `command_buffer`. Shared by input
/// synchronization (every pass) and output synchronization (compute/RT
/// passes only), per spec.md §4.6.6 steps 1-2.
fn synchronize_resource(
    graph: &mut RenderGraph,
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    handle: ResourceHandle,
    access: AccessDescriptor,
) -> Result<()> {
    let (resource_type, physical_index) = {
        let resource = &graph.resources_slice()[handle.index() as usize];
        (resource.resource_type, resource.physical_index.expect("resource synchronized before compile"))
    };
    let dst = AccessScope { stage: access.pipeline_stage, access: access.access };

    match resource_type {
        ResourceType::Image => {
            let new_layout = target_layout_for(access.usage_kind);
            let physical = graph.physical_image_mut(physical_index);
            let range = physical.full_subresource_range();
            let image = physical.image.handle();
            let aspect_mask = physical.image.aspect_mask();
            if let Some(pending) = physical.ledger.transition(image, aspect_mask, range, dst, new_layout)? {
                pending.record(device, command_buffer);
            }
        }
        ResourceType::Buffer => {
            let physical = graph.physical_buffer_mut(physical_index);
            let src = physical.last_access;
            if src.stage != dst.stage || src.access != dst.access {
                let barrier = vk::BufferMemoryBarrier::builder()
                    .src_access_mask(src.access)
                    .dst_access_mask(dst.access)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .buffer(physical.handle())
                    .offset(0)
                    .size(physical.size)
                    .build();
                unsafe {
                    device.cmd_pipeline_barrier(
                        command_buffer,
                        src.stage,
                        dst.stage,
                        vk::DependencyFlags::empty(),
                        &[],
                        &[barrier],
                        &[],
                    );
                }
            }
            physical.last_access = dst;
        }
    }

    Ok(())
}

pub(crate) fn execute_passes(
    graph: &mut RenderGraph,
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    virtual_index: usize,
) -> Result<()> {
    for pass_index in 0..graph.passes().len() {
        execute_one_pass(graph, device, command_buffer, virtual_index, pass_index)?;
    }
    Ok(())
}

fn execute_one_pass(
    graph: &mut RenderGraph,
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    virtual_index: usize,
    pass_index: usize,
) -> Result<()> {
    let pass_type = graph.passes()[pass_index].pass_type;
    let inputs: Vec<(ResourceHandle, AccessDescriptor)> = graph.passes()[pass_index]
        .inputs
        .iter()
        .copied()
        .zip(graph.passes()[pass_index].input_accesses.iter().copied())
        .collect();

    for (handle, access) in inputs {
        synchronize_resource(graph, device, command_buffer, handle, access)?;
    }

    if pass_type != PassType::Rasterizer {
        let outputs: Vec<(ResourceHandle, AccessDescriptor)> = graph.passes()[pass_index]
            .outputs
            .iter()
            .copied()
            .filter_map(|handle| {
                let access = graph.resources_slice()[handle.index() as usize].producer_access?;
                Some((handle, access))
            })
            .collect();
        for (handle, access) in outputs {
            synchronize_resource(graph, device, command_buffer, handle, access)?;
        }
    }

    if pass_type == PassType::Rasterizer {
        record_rasterizer_pass(graph, device, command_buffer, virtual_index, pass_index)
    } else {
        if let Some(execute_fn) = graph.passes()[pass_index].execute_fn.as_ref() {
            execute_fn(device, command_buffer, virtual_index);
        }
        Ok(())
    }
}

fn record_rasterizer_pass(
    graph: &mut RenderGraph,
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    virtual_index: usize,
    pass_index: usize,
) -> Result<()> {
    let (render_pass, framebuffer, render_area, clear_values, slots) = {
        let physical_pass = graph.physical_pass(pass_index).ok_or_else(|| Error::GraphValidation {
            reason: "rasterizer pass has no compiled physical pass".into(),
        })?;
        let clear_values: Vec<vk::ClearValue> =
            physical_pass.attachments.iter().map(|slot| slot.clear_value.unwrap_or_default()).collect();
        (
            physical_pass.render_pass(),
            physical_pass.framebuffer(virtual_index),
            physical_pass.render_area,
            clear_values,
            physical_pass.attachments.to_vec(),
        )
    };

    let begin_info = vk::RenderPassBeginInfo::builder()
        .render_pass(render_pass)
        .framebuffer(framebuffer)
        .render_area(vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent: render_area })
        .clear_values(&clear_values);

    unsafe {
        device.cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE);
    }

    if let Some(execute_fn) = graph.passes()[pass_index].execute_fn.as_ref() {
        execute_fn(device, command_buffer, virtual_index);
    }

    unsafe {
        device.cmd_end_render_pass(command_buffer);
    }

    for slot in &slots {
        let physical = graph.physical_image_mut(slot.physical_image_index);
        let range = physical.full_subresource_range();
        let scope = default_access_scope_for_layout(slot.final_layout);
        physical.ledger.force_layout(range, slot.final_layout, scope);
    }

    Ok(())
}
