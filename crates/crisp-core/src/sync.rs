//! Semaphore and fence RAII wrappers used by the virtual frame pool.

use ash::vk;

use crate::error::{Error, Result};

/// A binary semaphore with RAII cleanup.
pub struct Semaphore {
    device: ash::Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create an unsignaled binary semaphore.
    pub fn new(device: ash::Device) -> Result<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(Error::Api)?
        };
        Ok(Self { device, semaphore })
    }

    /// The raw handle.
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// A fence with RAII cleanup.
pub struct Fence {
    device: ash::Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally pre-signaled (virtual frames create theirs
    /// signaled so the first `wait_for_fences` call on frame 0 doesn't
    /// block).
    pub fn new(device: ash::Device, signaled: bool) -> Result<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe { device.create_fence(&create_info, None).map_err(Error::Api)? };
        Ok(Self { device, fence })
    }

    /// The raw handle.
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Block until this fence is signaled.
    pub fn wait(&self) -> Result<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, u64::MAX)
                .map_err(Error::Api)
        }
    }

    /// Reset to unsignaled.
    pub fn reset(&self) -> Result<()> {
        unsafe { self.device.reset_fences(&[self.fence]).map_err(Error::Api) }
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// The three synchronization primitives a single virtual frame needs: a
/// semaphore signaled when the swapchain image is acquired, a semaphore
/// signaled when rendering finishes (for present to wait on), and a fence
/// signaled when the GPU has finished this frame's command buffer (for the
/// CPU to wait on before reusing the frame's resources).
pub struct FrameSync {
    /// Signaled by `vkAcquireNextImageKHR`.
    pub image_available: Semaphore,
    /// Signaled when the frame's command buffer completes; waited on by
    /// `vkQueuePresentKHR`.
    pub render_finished: Semaphore,
    /// Signaled when the frame's command buffer completes; waited on by the
    /// CPU before reusing this frame slot.
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create a fresh set of per-frame sync primitives.
    pub fn new(device: ash::Device) -> Result<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device, true)?,
        })
    }
}
