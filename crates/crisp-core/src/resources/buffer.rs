//! GPU buffer wrapper, allocated through [`crate::device::Allocator`].

use ash::vk;

use crate::device::{Allocator, BufferAllocation, MemoryLocation};
use crate::error::Result;

/// A buffer plus its allocator-owned memory. RAII: `Drop` returns the
/// allocation to the allocator. Owning `Buffer` values directly (rather than
/// through the deallocator) is only safe for buffers known not to be
/// in-flight on the GPU; render-graph physical buffers instead go through
/// [`crate::deallocator::ResourceDeallocator`].
pub struct Buffer {
    device: ash::Device,
    allocation: Option<BufferAllocation>,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a buffer with the given usage flags and memory location.
    pub fn new(
        device: ash::Device,
        allocator: &Allocator,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> Result<Self> {
        let create_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let host_visible = matches!(location, MemoryLocation::CpuToGpu | MemoryLocation::GpuToCpu);
        let allocation = allocator.create_buffer(&create_info, location, host_visible)?;

        Ok(Self {
            device,
            allocation: Some(allocation),
            size,
        })
    }

    /// Convenience constructor for a device-local buffer populated once at
    /// creation time via a throwaway staging buffer and a single-time
    /// transfer. Used for vertex/index buffers that never change after
    /// upload.
    pub fn new_device_local_with_data<T: bytemuck::Pod>(
        device: ash::Device,
        allocator: &Allocator,
        usage: vk::BufferUsageFlags,
        data: &[T],
        upload: impl FnOnce(&Buffer, &Buffer, vk::DeviceSize) -> Result<()>,
    ) -> Result<Self> {
        let bytes = bytemuck::cast_slice(data);
        let size = bytes.len() as vk::DeviceSize;

        let mut staging = Buffer::new(
            device.clone(),
            allocator,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
        )?;
        staging.write_data(allocator, bytes)?;

        let destination = Buffer::new(
            device,
            allocator,
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuOnly,
        )?;

        upload(&staging, &destination, size)?;

        Ok(destination)
    }

    /// Write `data` into a host-visible buffer's mapped memory.
    pub fn write_data(&mut self, allocator: &Allocator, data: &[u8]) -> Result<()> {
        let allocation = self.allocation.as_mut().expect("buffer already destroyed");
        allocator.write_mapped(&mut allocation.allocation, data)
    }

    /// Raw buffer handle.
    pub fn handle(&self) -> vk::Buffer {
        self.allocation.as_ref().expect("buffer already destroyed").buffer
    }

    /// Buffer size in bytes.
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Destroy this buffer through the allocator. Preferred over relying on
    /// `Drop` when the caller has access to the allocator, since `Drop`
    /// cannot call `vk_mem::Allocator::destroy_buffer` (it needs `&Allocator`
    /// which isn't available in a `drop` body without a back-reference).
    pub fn destroy(mut self, allocator: &Allocator) {
        if let Some(allocation) = self.allocation.take() {
            allocator.destroy_buffer(allocation);
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if self.allocation.is_some() {
            log::warn!(
                "Buffer dropped without calling destroy(allocator); GPU memory leaked until allocator teardown"
            );
        }
        let _ = &self.device;
    }
}
