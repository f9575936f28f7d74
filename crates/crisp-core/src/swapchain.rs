//! Swapchain creation and recreation.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::vk;

use crate::device::VulkanContext;
use crate::error::{Error, Result};
use crate::resources::Image;

/// The swapchain plus its per-image views, wrapped as [`Image`] so the
/// render graph can treat the final present target like any other physical
/// image.
pub struct Swapchain {
    loader: SwapchainLoader,
    handle: vk::SwapchainKHR,
    images: Vec<Image>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain sized to `window_extent`, falling back to the
    /// surface's reported current extent when it is authoritative.
    pub fn new(context: &VulkanContext, window_extent: vk::Extent2D) -> Result<Self> {
        Self::create(context, window_extent, vk::SwapchainKHR::null())
    }

    /// Recreate against a new extent, reusing `self`'s old handle as
    /// `oldSwapchain` so the driver can hand back images still in flight.
    /// Consumes `self`; the caller replaces its stored `Swapchain` with the
    /// result. The old handle is destroyed by `ash` only after this call
    /// returns and `self` is dropped.
    pub fn recreate(self, context: &VulkanContext, window_extent: vk::Extent2D) -> Result<Self> {
        let old_handle = self.handle;
        let recreated = Self::create(context, window_extent, old_handle)?;
        drop(self);
        Ok(recreated)
    }

    fn create(
        context: &VulkanContext,
        window_extent: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self> {
        let surface = context.surface();
        let surface_loader = context.surface_loader();
        let physical_device = context.physical_device().device;

        let surface_caps = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(physical_device, surface)
                .map_err(Error::Api)?
        };

        let surface_formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(Error::Api)?
        };
        let format = surface_formats
            .iter()
            .find(|sf| {
                sf.format == vk::Format::B8G8R8A8_SRGB
                    && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
            .copied()
            .unwrap_or(surface_formats[0]);

        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_err(Error::Api)?
        };
        let present_mode = present_modes
            .iter()
            .copied()
            .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
            .unwrap_or(vk::PresentModeKHR::FIFO);

        let extent = if surface_caps.current_extent.width != u32::MAX {
            surface_caps.current_extent
        } else {
            vk::Extent2D {
                width: window_extent.width.clamp(
                    surface_caps.min_image_extent.width,
                    surface_caps.max_image_extent.width,
                ),
                height: window_extent.height.clamp(
                    surface_caps.min_image_extent.height,
                    surface_caps.max_image_extent.height,
                ),
            }
        };

        let image_count = (surface_caps.min_image_count + 1).min(if surface_caps.max_image_count > 0 {
            surface_caps.max_image_count
        } else {
            surface_caps.min_image_count + 1
        });

        let loader = SwapchainLoader::new(context.instance(), context.raw_device());

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(surface_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let handle = unsafe {
            loader
                .create_swapchain(&create_info, None)
                .map_err(Error::Api)?
        };

        let raw_images = unsafe { loader.get_swapchain_images(handle).map_err(Error::Api)? };
        let images = raw_images
            .into_iter()
            .map(|image| {
                Image::from_swapchain_image(
                    context.device_handle(),
                    image,
                    format.format,
                    vk::Extent3D {
                        width: extent.width,
                        height: extent.height,
                        depth: 1,
                    },
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            loader,
            handle,
            images,
            format,
            extent,
        })
    }

    /// Acquire the next presentable image, signalling `semaphore` when it is
    /// ready. Returns `Err(Error::SwapchainOutOfDate)` on
    /// `VK_ERROR_OUT_OF_DATE_KHR`; a suboptimal result is logged and treated
    /// as success.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<u32> {
        let result = unsafe {
            self.loader
                .acquire_next_image(self.handle, u64::MAX, semaphore, vk::Fence::null())
        };
        match result {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    log::warn!("swapchain suboptimal on acquire; proceeding this frame");
                }
                Ok(index)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(Error::SwapchainOutOfDate),
            Err(other) => Err(Error::Api(other)),
        }
    }

    /// Present `image_index`, waiting on `wait_semaphore`.
    pub fn present(
        &self,
        queue: vk::Queue,
        wait_semaphore: vk::Semaphore,
        image_index: u32,
    ) -> Result<()> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.handle];
        let indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&indices);

        let result = unsafe { self.loader.queue_present(queue, &present_info) };
        match result {
            Ok(suboptimal) => {
                if suboptimal {
                    log::warn!("swapchain suboptimal on present; will recreate next acquire");
                }
                Ok(())
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(Error::SwapchainOutOfDate),
            Err(other) => Err(Error::Api(other)),
        }
    }

    /// Current extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Surface format in use.
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Number of swapchain images (and thus the range of valid
    /// `swap_image_index` values from `begin_frame`).
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Borrow a swapchain image by index.
    pub fn image(&self, index: usize) -> &Image {
        &self.images[index]
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_swapchain(self.handle, None);
        }
    }
}
