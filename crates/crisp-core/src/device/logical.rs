//! Logical device creation.

use ash::vk;

use crate::device::physical::PhysicalDeviceInfo;
use crate::error::{Error, Result};

/// The logical device plus the graphics and present queue handles retrieved
/// from it. Cloned `ash::Device` handles are cheap (an `Arc`-free reference
/// to the loader's function pointer table) and are what every RAII resource
/// wrapper in [`crate::resources`] stores.
pub struct LogicalDevice {
    pub(crate) device: ash::Device,
    pub(crate) graphics_queue: vk::Queue,
    pub(crate) present_queue: vk::Queue,
}

impl LogicalDevice {
    /// Create a logical device exposing the graphics and present queues
    /// named in `physical_device_info`, deduplicating queue-create-infos
    /// when both roles share a family.
    pub fn new(instance: &ash::Instance, physical_device_info: &PhysicalDeviceInfo) -> Result<Self> {
        let unique_families = physical_device_info.unique_queue_families();
        let queue_priorities = [1.0_f32];

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
                    .build()
            })
            .collect();

        let device_extensions = [ash::extensions::khr::Swapchain::name().as_ptr()];

        let features = vk::PhysicalDeviceFeatures::builder().sampler_anisotropy(true);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extensions)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .create_device(physical_device_info.device, &create_info, None)
                .map_err(Error::Api)?
        };

        let graphics_queue =
            unsafe { device.get_device_queue(physical_device_info.graphics_family, 0) };
        let present_queue =
            unsafe { device.get_device_queue(physical_device_info.present_family, 0) };

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
        })
    }

    /// Borrow the raw `ash::Device`.
    pub fn raw(&self) -> &ash::Device {
        &self.device
    }

    /// Clone the `ash::Device` handle for a resource wrapper to own.
    pub fn clone_handle(&self) -> ash::Device {
        self.device.clone()
    }

    /// The graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// The present queue (equal to `graphics_queue` on most desktop GPUs).
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_device(None);
        }
    }
}
