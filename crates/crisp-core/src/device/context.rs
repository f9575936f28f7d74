//! Top-level Vulkan context: instance, surface, physical/logical device, and
//! the GPU allocator. Owns everything the rest of the crate borrows from.
//!
//! The swapchain itself is not owned here — it belongs to
//! [`crate::frame::VirtualFramePool`], a separate component that is the
//! only one that changes size on resize.

use std::ffi::CString;
use std::rc::Rc;

use ash::extensions::khr::Surface;
use ash::vk;

use crate::device::allocator::Allocator;
use crate::device::instance::VulkanInstance;
use crate::device::logical::LogicalDevice;
use crate::device::physical::PhysicalDeviceInfo;
use crate::error::{Error, Result};

/// Everything needed to create GPU resources and submit work: instance,
/// surface, physical device info, logical device, and allocator.
///
/// Destruction order matters and is encoded in the field order below plus
/// the explicit `Drop` impl: allocator before device, device before
/// surface/instance. Rust drops struct fields in declaration order, but we
/// spell it out anyway since the allocator holds raw pointers into the
/// device that must not outlive it.
pub struct VulkanContext {
    pub(crate) allocator: Rc<Allocator>,
    pub(crate) device: LogicalDevice,
    pub(crate) physical_device: PhysicalDeviceInfo,
    surface_loader: Surface,
    surface: vk::SurfaceKHR,
    pub(crate) instance: VulkanInstance,
}

impl VulkanContext {
    /// Build a context from a window's required instance extensions and a
    /// surface-creation closure (so this crate doesn't need to depend on a
    /// specific windowing toolkit's surface type directly; see
    /// [`crate::window`] for the GLFW-backed caller).
    pub fn new(
        app_name: &str,
        required_extensions: Vec<CString>,
        validation: bool,
        create_surface: impl FnOnce(&ash::Entry, &ash::Instance) -> Result<vk::SurfaceKHR>,
    ) -> Result<Self> {
        let instance = VulkanInstance::new(app_name, &required_extensions, validation)?;
        let surface = create_surface(instance.entry(), instance.raw())?;
        let surface_loader = Surface::new(instance.entry(), instance.raw());

        let physical_device =
            PhysicalDeviceInfo::select_suitable_device(instance.raw(), &surface_loader, surface)?;

        let device = LogicalDevice::new(instance.raw(), &physical_device)?;

        let allocator = Rc::new(Allocator::new(instance.raw(), device.raw(), physical_device.device)?);

        Ok(Self {
            allocator,
            device,
            physical_device,
            surface_loader,
            surface,
            instance,
        })
    }

    /// Raw `ash::Device`, cloned for a resource wrapper to own.
    pub fn device_handle(&self) -> ash::Device {
        self.device.clone_handle()
    }

    /// Borrow the raw `ash::Device`.
    pub fn raw_device(&self) -> &ash::Device {
        self.device.raw()
    }

    /// Borrow the raw `ash::Instance`.
    pub fn instance(&self) -> &ash::Instance {
        self.instance.raw()
    }

    /// Physical device info (queue families, memory properties).
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// The presentation surface.
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// The surface extension loader.
    pub fn surface_loader(&self) -> &Surface {
        &self.surface_loader
    }

    /// The GPU allocator shared by all resource creation.
    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    /// A cheap, shared handle to the GPU allocator, for a
    /// [`crate::deallocator::ResourceDeallocator`] entry that must destroy a
    /// resource after this call returns — the closure owns the `Rc` rather
    /// than borrowing `&Allocator`, so it can outlive the stack frame that
    /// queued it.
    pub fn allocator_handle(&self) -> Rc<Allocator> {
        self.allocator.clone()
    }

    /// The graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue()
    }

    /// The present queue.
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue()
    }

    /// Block until the device has completed all outstanding work. Called
    /// before swapchain recreation and at shutdown.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.raw().device_wait_idle().map_err(Error::Api) }
    }

    /// Tag a Vulkan object with a debug name, active only when validation
    /// is enabled (see `original_source`'s `RenderGraph.cpp`, which names
    /// every physical resource and render pass after its logical name).
    pub fn name_object<T: vk::Handle + Copy>(&self, object: T, name: &str) {
        self.instance.set_object_name(self.device.raw(), object, name);
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
        }
        // allocator and device are dropped by field order (declared before
        // surface/instance), instance dropped last.
    }
}
