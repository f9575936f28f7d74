//! Minimal demo binary: builds a two-pass render graph (an offscreen HDR
//! pass feeding a tonemap pass) and runs it against a live swap chain.
//! Camera controllers, asset loading, and actual shader work are out of
//! scope — this only proves the graph's compile/execute/resize path end
//! to end.

use ash::vk;

use crisp_core::device::VulkanContext;
use crisp_core::frame::VirtualFramePool;
use crisp_core::graph::{ImageDescription, PassType, RenderGraph, ResourceHandle};
use crisp_core::resources::Image;
use crisp_core::swapchain::Swapchain;
use crisp_core::window::Window;
use crisp_core::{EngineConfig, Error, Result};

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = EngineConfig::default();
    log::info!("starting crisp-demo with {} frames in flight", config.frames_in_flight);

    run(&config)?;
    Ok(())
}

fn run(config: &EngineConfig) -> Result<()> {
    let mut window = Window::new("crisp-demo", 1280, 720)?;
    let required_extensions = window.required_instance_extensions()?;
    let context = VulkanContext::new("crisp-demo", required_extensions, config.validation, |_entry, instance| {
        window.create_surface(instance)
    })?;

    let (width, height) = window.framebuffer_size();
    let mut frame_pool =
        VirtualFramePool::new(&context, vk::Extent2D { width, height }, config.frames_in_flight)?;

    let swap_chain_format = frame_pool.swapchain().format().format;
    let mut graph = RenderGraph::new(frame_pool.frames_in_flight());
    let tonemap_output = build_graph(&mut graph, swap_chain_format);
    graph.compile(&context, frame_pool.swapchain().extent())?;

    while !window.should_close() {
        if window.poll_events() {
            recreate_swap_chain(&context, &window, &mut frame_pool, &mut graph)?;
            continue;
        }

        let frame_ctx = match frame_pool.begin_frame(context.raw_device()) {
            Ok(ctx) => ctx,
            Err(Error::SwapchainOutOfDate) => {
                recreate_swap_chain(&context, &window, &mut frame_pool, &mut graph)?;
                continue;
            }
            Err(err) => return Err(err),
        };

        graph.execute(context.raw_device(), frame_ctx.command_buffer, frame_ctx.virtual_index)?;
        blit_to_swap_chain(
            &context,
            &graph,
            frame_pool.swapchain(),
            tonemap_output,
            frame_ctx.command_buffer,
            frame_ctx.swap_image_index,
        );

        frame_pool.end_frame(context.raw_device(), context.graphics_queue(), context.present_queue(), frame_ctx)?;
        graph.decrement_resource_lifetimes();
    }

    context.wait_idle()?;
    graph.finish(&context)?;
    Ok(())
}

/// Registers the demo's two passes and returns the handle presented to the
/// swap chain each frame. `hdr` writes an offscreen HDR color target; the
/// swap chain's own surface format is reused for the tonemap output so the
/// final copy is a same-format `vkCmdCopyImage` rather than a format-
/// converting blit.
fn build_graph(graph: &mut RenderGraph, swap_chain_format: vk::Format) -> ResourceHandle {
    let hdr_pass = graph.add_pass("hdr");
    let hdr_color = {
        let mut builder = graph.builder(hdr_pass);
        builder.set_type(PassType::Rasterizer);
        builder.create_attachment(
            ImageDescription::swap_chain_relative(vk::Format::R16G16B16A16_SFLOAT),
            "hdr_color",
            Some(vk::ClearValue {
                color: vk::ClearColorValue { float32: [0.05, 0.05, 0.08, 1.0] },
            }),
        )
    };
    graph.set_execute_fn(
        hdr_pass,
        Box::new(|_device, _command_buffer, _virtual_index| {
            // A real scene pass binds a pipeline assembled via
            // `crisp_core::pipeline::assemble` and draws here; the render
            // pass's own clear already exercises compile/execute.
        }),
    );

    let tonemap_pass = graph.add_pass("tonemap");
    let tonemap_output = {
        let mut builder = graph.builder(tonemap_pass);
        builder.set_type(PassType::Rasterizer);
        builder.read_texture(hdr_color);
        let output = builder.create_attachment(
            ImageDescription::swap_chain_relative(swap_chain_format),
            "tonemap_color",
            Some(vk::ClearValue {
                color: vk::ClearColorValue { float32: [0.0, 0.0, 0.0, 1.0] },
            }),
        );
        builder.mark_transfer_source(output);
        output
    };
    graph.set_execute_fn(
        tonemap_pass,
        Box::new(|_device, _command_buffer, _virtual_index| {
            // A real tonemap pass samples `hdr_color` here and writes the
            // tonemapped result; this demo's clear stands in for that draw.
        }),
    );

    tonemap_output
}

fn recreate_swap_chain(
    context: &VulkanContext,
    window: &Window,
    frame_pool: &mut VirtualFramePool,
    graph: &mut RenderGraph,
) -> Result<()> {
    context.wait_idle()?;
    let (width, height) = window.framebuffer_size();
    let extent = vk::Extent2D { width, height };
    frame_pool.recreate_swapchain(context, extent)?;
    graph.resize(context, frame_pool.swapchain().extent())
}

/// Copies the graph's tonemap output into the acquired swap-chain image.
/// The render graph never owns the swap chain (its extent is driven by the
/// window, not a declared resource), so this hand-off happens outside
/// `RenderGraph::execute` via a plain `vkCmdCopyImage`, mirroring how a real
/// engine's presentation step sits just past the graph's last pass.
fn blit_to_swap_chain(
    context: &VulkanContext,
    graph: &RenderGraph,
    swap_chain: &Swapchain,
    tonemap_output: ResourceHandle,
    command_buffer: vk::CommandBuffer,
    swap_image_index: u32,
) {
    let device = context.raw_device();
    let source: &Image = graph.exported_image(tonemap_output);
    let target = swap_chain.image(swap_image_index as usize);
    let full_color_range = vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    };

    let pre_copy_barriers = [
        vk::ImageMemoryBarrier::builder()
            .old_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .new_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(source.handle())
            .subresource_range(full_color_range)
            .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .dst_access_mask(vk::AccessFlags::TRANSFER_READ)
            .build(),
        vk::ImageMemoryBarrier::builder()
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(target.handle())
            .subresource_range(full_color_range)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .build(),
    ];

    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::PipelineStageFlags::TRANSFER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &pre_copy_barriers,
        );
    }

    let copy_region = vk::ImageCopy {
        src_subresource: vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        },
        src_offset: vk::Offset3D::default(),
        dst_subresource: vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        },
        dst_offset: vk::Offset3D::default(),
        extent: source.extent(),
    };

    unsafe {
        device.cmd_copy_image(
            command_buffer,
            source.handle(),
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            target.handle(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[copy_region],
        );
    }

    let post_copy_barriers = [
        vk::ImageMemoryBarrier::builder()
            .old_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
            .new_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(source.handle())
            .subresource_range(full_color_range)
            .src_access_mask(vk::AccessFlags::TRANSFER_READ)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .build(),
        vk::ImageMemoryBarrier::builder()
            .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(target.handle())
            .subresource_range(full_color_range)
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::empty())
            .build(),
    ];

    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &post_copy_barriers,
        );
    }
}
