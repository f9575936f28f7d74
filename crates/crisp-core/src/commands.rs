//! Command pool and single-time command buffer recording.
//!
//! A pool, a way to record a one-shot transfer/barrier command buffer and
//! submit it synchronously, and raw per-frame command buffer allocation for
//! [`crate::frame::VirtualFramePool`].

use ash::vk;

use crate::error::{Error, Result};

/// Command pool wrapper with RAII cleanup.
pub struct CommandPool {
    device: ash::Device,
    pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool for `queue_family_index`, with `RESET_COMMAND_BUFFER` so
    /// individual buffers can be reset and re-recorded frame to frame rather
    /// than requiring a full pool reset.
    pub fn new(device: ash::Device, queue_family_index: u32) -> Result<Self> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let pool = unsafe { device.create_command_pool(&create_info, None).map_err(Error::Api)? };

        Ok(Self { device, pool })
    }

    /// Allocate `count` primary command buffers from this pool.
    pub fn allocate_command_buffers(&self, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(Error::Api)
        }
    }

    /// Raw pool handle.
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Allocate, begin, and return a single one-time-submit command buffer
    /// for recording an upload, mip-chain generation, or other transfer work
    /// that the caller will submit and wait on synchronously via
    /// [`SingleTimeCommands::submit_and_wait`].
    pub fn begin_single_time(&self) -> Result<SingleTimeCommands<'_>> {
        let command_buffer = self.allocate_command_buffers(1)?[0];

        let begin_info =
            vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(Error::Api)?;
        }

        Ok(SingleTimeCommands {
            pool: self,
            command_buffer,
        })
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}

/// A single-use command buffer, ended and submitted synchronously via
/// [`SingleTimeCommands::submit_and_wait`]. The caller records directly
/// through [`SingleTimeCommands::command_buffer`] (image barriers, blits,
/// buffer copies) using the raw `ash::Device` — this type only owns the
/// begin/end/submit/free bookkeeping, without the render-pass helpers the
/// render graph's own `execute` module provides instead.
pub struct SingleTimeCommands<'a> {
    pool: &'a CommandPool,
    command_buffer: vk::CommandBuffer,
}

impl<'a> SingleTimeCommands<'a> {
    /// The command buffer to record into.
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// End recording, submit to `queue`, block until complete, and free the
    /// command buffer. Used for one-off transfer work (staging-buffer
    /// uploads, mip-chain generation) outside the steady-state frame loop,
    /// where a dedicated fence per call would be wasted ceremony.
    pub fn submit_and_wait(self, queue: vk::Queue) -> Result<()> {
        let device = &self.pool.device;
        unsafe {
            device.end_command_buffer(self.command_buffer).map_err(Error::Api)?;

            let command_buffers = [self.command_buffer];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);

            device
                .queue_submit(queue, &[submit_info.build()], vk::Fence::null())
                .map_err(Error::Api)?;
            device.queue_wait_idle(queue).map_err(Error::Api)?;

            device.free_command_buffers(self.pool.pool, &command_buffers);
        }
        Ok(())
    }
}
