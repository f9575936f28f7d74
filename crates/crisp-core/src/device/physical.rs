//! Physical device selection.

use std::collections::HashSet;
use std::ffi::CStr;

use ash::vk;

use crate::error::{Error, Result};

/// A physical device together with the queue family indices and extension
/// support this crate requires.
#[derive(Clone, Copy)]
pub struct PhysicalDeviceInfo {
    /// The selected `VkPhysicalDevice` handle.
    pub device: vk::PhysicalDevice,
    /// Queue family supporting `GRAPHICS`. May equal `present_family`.
    pub graphics_family: u32,
    /// Queue family that can present to the surface this device was
    /// evaluated against.
    pub present_family: u32,
    /// Memory properties, cached at selection time since they never change.
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl PhysicalDeviceInfo {
    /// Enumerate physical devices and pick the first one exposing graphics +
    /// present queue families and the swapchain extension.
    pub fn select_suitable_device(
        instance: &ash::Instance,
        surface_loader: &ash::extensions::khr::Surface,
        surface: vk::SurfaceKHR,
    ) -> Result<Self> {
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(Error::Api)?
        };

        for device in devices {
            if let Some(info) = Self::evaluate_device(instance, surface_loader, surface, device)? {
                return Ok(info);
            }
        }

        Err(Error::NoSuitablePhysicalDevice)
    }

    fn evaluate_device(
        instance: &ash::Instance,
        surface_loader: &ash::extensions::khr::Surface,
        surface: vk::SurfaceKHR,
        device: vk::PhysicalDevice,
    ) -> Result<Option<Self>> {
        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(Error::Api)?
        };
        let has_swapchain = extensions.iter().any(|ext| {
            let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
            name == ash::extensions::khr::Swapchain::name()
        });
        if !has_swapchain {
            return Ok(None);
        }

        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut graphics_family = None;
        let mut present_family = None;
        for (index, family) in queue_families.iter().enumerate() {
            let index = index as u32;
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                graphics_family.get_or_insert(index);
            }
            let supports_present = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index, surface)
                    .unwrap_or(false)
            };
            if supports_present {
                present_family.get_or_insert(index);
            }
        }

        let (Some(graphics_family), Some(present_family)) = (graphics_family, present_family)
        else {
            return Ok(None);
        };

        let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

        Ok(Some(Self {
            device,
            graphics_family,
            present_family,
            memory_properties,
        }))
    }

    /// Distinct queue family indices this device needs (1 or 2 entries).
    pub fn unique_queue_families(&self) -> Vec<u32> {
        let set: HashSet<u32> = [self.graphics_family, self.present_family].into_iter().collect();
        set.into_iter().collect()
    }

    /// Find a memory type index matching `type_bits` and `flags` by scanning
    /// the cached `memory_properties` by hand.
    pub fn find_memory_type(
        &self,
        type_bits: u32,
        flags: vk::MemoryPropertyFlags,
    ) -> Result<u32> {
        for i in 0..self.memory_properties.memory_type_count {
            let type_matches = (type_bits & (1 << i)) != 0;
            let flags_match = self.memory_properties.memory_types[i as usize]
                .property_flags
                .contains(flags);
            if type_matches && flags_match {
                return Ok(i);
            }
        }
        Err(Error::NoSuitableMemoryType { type_bits, flags })
    }
}
