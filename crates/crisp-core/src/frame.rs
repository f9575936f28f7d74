//! Virtual frame pool: a ring of `N` in-flight frames, each with its own
//! fence, image-available/render-finished semaphores, command pool, and
//! primary command buffer.

use ash::vk;

use crate::commands::CommandPool;
use crate::device::VulkanContext;
use crate::error::{Error, Result};
use crate::swapchain::Swapchain;
use crate::sync::FrameSync;

/// One virtual frame slot's resources.
struct VirtualFrame {
    sync: FrameSync,
    command_pool: CommandPool,
    command_buffer: vk::CommandBuffer,
}

/// Everything `begin_frame` hands the caller: which monotonic frame and
/// which ring slot this is, which swapchain image was acquired, and the
/// command buffer to record into.
pub struct FrameContext {
    /// Monotonically increasing frame counter (never wraps to a ring slot on
    /// its own — callers use `virtual_index` for that).
    pub frame_index: u64,
    /// `frame_index % N`, the ring slot in use this frame.
    pub virtual_index: usize,
    /// Index of the acquired swapchain image, valid for `end_frame`'s
    /// present call and for addressing `Swapchain::image`.
    pub swap_image_index: u32,
    /// The frame's primary command buffer, already `vkBeginCommandBuffer`'d
    /// with `ONE_TIME_SUBMIT`.
    pub command_buffer: vk::CommandBuffer,
}

/// Ring of `N` virtual frames plus the swapchain they present to. `N = 2` by
/// default.
pub struct VirtualFramePool {
    frames: Vec<VirtualFrame>,
    // `Option` only to allow `Swapchain::recreate` to consume the old value
    // by move in `recreate_swapchain`; always `Some` between public calls.
    swapchain: Option<Swapchain>,
    frame_index: u64,
}

/// Default pipelined depth (double-buffered virtual frames).
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;

impl VirtualFramePool {
    /// Build `frames_in_flight` virtual frames plus an initial swapchain
    /// sized to `window_extent`.
    pub fn new(context: &VulkanContext, window_extent: vk::Extent2D, frames_in_flight: usize) -> Result<Self> {
        let swapchain = Swapchain::new(context, window_extent)?;

        let mut frames = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            let sync = FrameSync::new(context.device_handle())?;
            let command_pool = CommandPool::new(context.device_handle(), context.physical_device().graphics_family)?;
            let command_buffer = command_pool.allocate_command_buffers(1)?[0];
            frames.push(VirtualFrame {
                sync,
                command_pool,
                command_buffer,
            });
        }

        Ok(Self {
            frames,
            swapchain: Some(swapchain),
            frame_index: 0,
        })
    }

    /// Pipelined depth `N`.
    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    /// Borrow the current swapchain (e.g. to read its extent/format, or
    /// fetch a particular swap image for the render graph's physical-image
    /// import).
    pub fn swapchain(&self) -> &Swapchain {
        self.swapchain.as_ref().expect("swapchain always present between calls")
    }

    /// Wait on the current slot's fence (blocking), acquire the next
    /// swapchain image, and begin that slot's command buffer.
    ///
    /// On `Err(Error::SwapchainOutOfDate)` the caller must call
    /// [`VirtualFramePool::recreate_swapchain`] and retry; any other error is
    /// fatal.
    pub fn begin_frame(&mut self, device: &ash::Device) -> Result<FrameContext> {
        let virtual_index = (self.frame_index % self.frames.len() as u64) as usize;
        let frame = &self.frames[virtual_index];

        frame.sync.in_flight.wait()?;

        let swap_image_index = self
            .swapchain()
            .acquire_next_image(frame.sync.image_available.handle())?;

        frame.sync.in_flight.reset()?;

        unsafe {
            device
                .reset_command_buffer(frame.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(Error::Api)?;
        }
        let begin_info =
            vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            device
                .begin_command_buffer(frame.command_buffer, &begin_info)
                .map_err(Error::Api)?;
        }

        Ok(FrameContext {
            frame_index: self.frame_index,
            virtual_index,
            swap_image_index,
            command_buffer: frame.command_buffer,
        })
    }

    /// End the frame's command buffer, submit it waiting on image-available
    /// and signalling render-finished (and the slot's fence on completion),
    /// then present the acquired swap image.
    ///
    /// Advances the internal frame counter regardless of outcome, since a
    /// fatal error here tears down the device; cancellation mid-frame is not
    /// supported.
    pub fn end_frame(
        &mut self,
        device: &ash::Device,
        graphics_queue: vk::Queue,
        present_queue: vk::Queue,
        ctx: FrameContext,
    ) -> Result<()> {
        let frame = &self.frames[ctx.virtual_index];

        unsafe {
            device.end_command_buffer(ctx.command_buffer).map_err(Error::Api)?;
        }

        let wait_semaphores = [frame.sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [frame.sync.render_finished.handle()];
        let command_buffers = [ctx.command_buffer];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            device
                .queue_submit(graphics_queue, &[submit_info.build()], frame.sync.in_flight.handle())
                .map_err(Error::Api)?;
        }

        self.swapchain().present(
            present_queue,
            frame.sync.render_finished.handle(),
            ctx.swap_image_index,
        )?;

        self.frame_index += 1;
        Ok(())
    }

    /// Replace the swapchain after `Error::SwapchainOutOfDate`, sizing to
    /// `window_extent`. The caller must have waited for device idle first
    /// (via [`VulkanContext::wait_idle`]) so no in-flight frame still
    /// references the old swap images.
    pub fn recreate_swapchain(&mut self, context: &VulkanContext, window_extent: vk::Extent2D) -> Result<()> {
        let old = self.swapchain.take().expect("swapchain always present between calls");
        self.swapchain = Some(old.recreate(context, window_extent)?);
        Ok(())
    }

    /// Current monotonic frame counter (not wrapped to the ring).
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }
}
