//! GPU memory allocation via `vk-mem`.
//!
//! Every physical resource the render graph creates goes through this
//! allocator, which is what `vk-mem` is for: sub-allocating from a small
//! number of large device-memory blocks rather than one `vkAllocateMemory`
//! call per resource.
//! [`crate::device::physical::PhysicalDeviceInfo::find_memory_type`] still
//! exists for the one place that needs a bare allocation: the
//! instance-less unit tests.

use ash::vk;

use crate::error::{Error, Result};

/// Wraps a `vk_mem::Allocator`. One instance is created per device and
/// shared (via `&Allocator`) by every resource-creation call in
/// [`crate::resources`] and [`crate::graph::physical`].
pub struct Allocator {
    inner: vk_mem::Allocator,
}

/// A GPU buffer allocation: the raw handle plus the allocator-owned memory
/// backing it.
pub struct BufferAllocation {
    /// The `VkBuffer` handle.
    pub buffer: vk::Buffer,
    /// Opaque allocation handle, passed back to `Allocator::destroy_buffer`.
    pub allocation: vk_mem::Allocation,
}

/// A GPU image allocation: the raw handle plus the allocator-owned memory
/// backing it.
pub struct ImageAllocation {
    /// The `VkImage` handle.
    pub image: vk::Image,
    /// Opaque allocation handle, passed back to `Allocator::destroy_image`.
    pub allocation: vk_mem::Allocation,
}

/// Where an allocation should live; mirrors `vk_mem::MemoryUsage` so callers
/// in this crate don't need a `vk-mem` import of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLocation {
    /// Device-local, not host-visible. Render targets, vertex/index buffers
    /// after upload, sampled textures.
    GpuOnly,
    /// Host-visible and host-coherent, used for staging buffers and the
    /// per-frame streaming ring (`crate::streaming`).
    CpuToGpu,
    /// Host-visible, used for readback (screenshot capture, occlusion query
    /// results). Not exercised by the render graph itself today.
    GpuToCpu,
}

impl From<MemoryLocation> for vk_mem::MemoryUsage {
    fn from(location: MemoryLocation) -> Self {
        match location {
            MemoryLocation::GpuOnly => vk_mem::MemoryUsage::AutoPreferDevice,
            MemoryLocation::CpuToGpu => vk_mem::MemoryUsage::AutoPreferHost,
            MemoryLocation::GpuToCpu => vk_mem::MemoryUsage::AutoPreferHost,
        }
    }
}

impl Allocator {
    /// Create an allocator bound to the given instance/device/physical
    /// device triple.
    pub fn new(
        instance: &ash::Instance,
        device: &ash::Device,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let create_info = vk_mem::AllocatorCreateInfo::new(instance, device, physical_device);
        let inner = unsafe {
            vk_mem::Allocator::new(create_info)
                .map_err(|e| Error::InitializationFailed(format!("vk-mem init failed: {e}")))?
        };
        Ok(Self { inner })
    }

    /// Allocate and bind a buffer.
    pub fn create_buffer(
        &self,
        buffer_info: &vk::BufferCreateInfo,
        location: MemoryLocation,
        host_visible: bool,
    ) -> Result<BufferAllocation> {
        let mut alloc_info = vk_mem::AllocationCreateInfo {
            usage: location.into(),
            ..Default::default()
        };
        if host_visible {
            alloc_info.flags = vk_mem::AllocationCreateFlags::MAPPED
                | vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE;
        }

        let (buffer, allocation) = unsafe {
            self.inner
                .create_buffer(buffer_info, &alloc_info)
                .map_err(|e| Error::InitializationFailed(format!("buffer allocation failed: {e}")))?
        };

        Ok(BufferAllocation { buffer, allocation })
    }

    /// Allocate and bind an image. Images are always device-local; no render
    /// graph resource needs a host-visible image.
    pub fn create_image(&self, image_info: &vk::ImageCreateInfo) -> Result<ImageAllocation> {
        let alloc_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };

        let (image, allocation) = unsafe {
            self.inner
                .create_image(image_info, &alloc_info)
                .map_err(|e| Error::InitializationFailed(format!("image allocation failed: {e}")))?
        };

        Ok(ImageAllocation { image, allocation })
    }

    /// Destroy a buffer allocation. Must only be called after the
    /// [`crate::deallocator::ResourceDeallocator`] has confirmed the GPU is
    /// no longer using the resource.
    pub fn destroy_buffer(&self, mut alloc: BufferAllocation) {
        unsafe {
            self.inner.destroy_buffer(alloc.buffer, &mut alloc.allocation);
        }
    }

    /// Destroy an image allocation. Same lifetime contract as
    /// `destroy_buffer`.
    pub fn destroy_image(&self, mut alloc: ImageAllocation) {
        unsafe {
            self.inner.destroy_image(alloc.image, &mut alloc.allocation);
        }
    }

    /// Map a host-visible allocation's memory and write `data` into it at
    /// offset 0, then flush if the memory is not coherent. Used by streaming
    /// buffers and the initial upload of staging buffers.
    pub fn write_mapped(&self, allocation: &mut vk_mem::Allocation, data: &[u8]) -> Result<()> {
        unsafe {
            let ptr = self
                .inner
                .map_memory(allocation)
                .map_err(|e| Error::InitializationFailed(format!("map_memory failed: {e}")))?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len());
            self.inner.unmap_memory(allocation);
        }
        Ok(())
    }
}
