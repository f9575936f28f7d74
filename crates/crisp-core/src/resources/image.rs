//! GPU image + image view wrapper, allocated through [`crate::device::Allocator`].

use ash::vk;

use crate::device::{Allocator, ImageAllocation};
use crate::error::{Error, Result};

/// An image plus its allocator-owned memory and a default full-resource
/// view. Additional views (e.g. per-mip, per-layer) are created on demand
/// via [`Image::create_view`].
pub struct Image {
    device: ash::Device,
    image: vk::Image,
    allocation: Option<ImageAllocation>,
    default_view: vk::ImageView,
    format: vk::Format,
    extent: vk::Extent3D,
    mip_levels: u32,
    array_layers: u32,
    aspect_mask: vk::ImageAspectFlags,
}

impl Image {
    /// Create a 2D image (or 2D array when `array_layers > 1`) with the
    /// given format/usage/mip count, and a default view covering every
    /// subresource.
    pub fn new(
        device: ash::Device,
        allocator: &Allocator,
        format: vk::Format,
        extent: vk::Extent3D,
        mip_levels: u32,
        array_layers: u32,
        usage: vk::ImageUsageFlags,
        samples: vk::SampleCountFlags,
    ) -> Result<Self> {
        let aspect_mask = aspect_mask_for_format(format);

        let create_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(extent)
            .mip_levels(mip_levels)
            .array_layers(array_layers)
            .samples(samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let allocation = allocator.create_image(&create_info)?;

        let default_view = create_view(
            &device,
            allocation.image,
            format,
            aspect_mask,
            0,
            mip_levels,
            0,
            array_layers,
        )?;

        Ok(Self {
            device,
            image: allocation.image,
            allocation: Some(allocation),
            default_view,
            format,
            extent,
            mip_levels,
            array_layers,
            aspect_mask,
        })
    }

    /// Wrap a swapchain-owned image (no allocation, not destroyable by this
    /// type) with a default view. Used for the swapchain's per-image views.
    pub fn from_swapchain_image(
        device: ash::Device,
        image: vk::Image,
        format: vk::Format,
        extent: vk::Extent3D,
    ) -> Result<Self> {
        let aspect_mask = vk::ImageAspectFlags::COLOR;
        let default_view = create_view(&device, image, format, aspect_mask, 0, 1, 0, 1)?;
        Ok(Self {
            device,
            image,
            allocation: None,
            default_view,
            format,
            extent,
            mip_levels: 1,
            array_layers: 1,
            aspect_mask,
        })
    }

    /// Create an additional view over a subrange of mips/layers.
    pub fn create_view(
        &self,
        base_mip: u32,
        mip_count: u32,
        base_layer: u32,
        layer_count: u32,
    ) -> Result<vk::ImageView> {
        create_view(
            &self.device,
            self.handle(),
            self.format,
            self.aspect_mask,
            base_mip,
            mip_count,
            base_layer,
            layer_count,
        )
    }

    /// Raw image handle.
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// The default full-resource view.
    pub fn view(&self) -> vk::ImageView {
        self.default_view
    }

    /// Pixel format.
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Extent in texels.
    pub fn extent(&self) -> vk::Extent3D {
        self.extent
    }

    /// Mip level count.
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Array layer count.
    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }

    /// Aspect mask (color, depth, or depth+stencil) inferred from format.
    pub fn aspect_mask(&self) -> vk::ImageAspectFlags {
        self.aspect_mask
    }

    /// Record successive blits to build the mip chain from mip 0. Precondition:
    /// level 0 is currently `TRANSFER_DST_OPTIMAL` (the layout left by the
    /// buffer-to-image copy that filled it); levels `1..` are `UNDEFINED`.
    /// For each level `i` in `1..mip_levels`: the source level `i-1` is
    /// transitioned `TRANSFER_DST_OPTIMAL -> TRANSFER_SRC_OPTIMAL` *before*
    /// the blit that reads it (this is what makes level 0 a valid blit
    /// source, since it is otherwise never a blit destination), the
    /// destination level `i` is transitioned `UNDEFINED -> TRANSFER_DST_OPTIMAL`,
    /// then the blit runs. Afterwards every level but the last has been
    /// moved to `TRANSFER_SRC_OPTIMAL`; the last level is still
    /// `TRANSFER_DST_OPTIMAL`. A final pair of barriers moves both groups to
    /// `SHADER_READ_ONLY_OPTIMAL`.
    pub fn record_generate_mipmaps(
        &self,
        device: &ash::Device,
        command_buffer: vk::CommandBuffer,
    ) -> Result<()> {
        if self.mip_levels <= 1 {
            return Ok(());
        }

        let mut mip_width = self.extent.width as i32;
        let mut mip_height = self.extent.height as i32;

        for level in 1..self.mip_levels {
            let barrier_src_to_transfer_src = subresource_barrier(
                self.handle(),
                self.aspect_mask,
                level - 1,
                1,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::TRANSFER_READ,
            );
            let barrier_to_dst = subresource_barrier(
                self.handle(),
                self.aspect_mask,
                level,
                1,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::AccessFlags::empty(),
                vk::AccessFlags::TRANSFER_WRITE,
            );
            unsafe {
                device.cmd_pipeline_barrier(
                    command_buffer,
                    vk::PipelineStageFlags::TRANSFER | vk::PipelineStageFlags::TOP_OF_PIPE,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier_src_to_transfer_src, barrier_to_dst],
                );
            }

            let next_width = (mip_width / 2).max(1);
            let next_height = (mip_height / 2).max(1);

            let blit = vk::ImageBlit::builder()
                .src_offsets([
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D { x: mip_width, y: mip_height, z: 1 },
                ])
                .src_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: self.aspect_mask,
                    mip_level: level - 1,
                    base_array_layer: 0,
                    layer_count: self.array_layers,
                })
                .dst_offsets([
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D { x: next_width, y: next_height, z: 1 },
                ])
                .dst_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: self.aspect_mask,
                    mip_level: level,
                    base_array_layer: 0,
                    layer_count: self.array_layers,
                })
                .build();

            unsafe {
                device.cmd_blit_image(
                    command_buffer,
                    self.handle(),
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    self.handle(),
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[blit],
                    vk::Filter::LINEAR,
                );
            }

            mip_width = next_width;
            mip_height = next_height;
        }

        // Levels 0..mip_levels-1 were each moved to TRANSFER_SRC_OPTIMAL above
        // (as a blit source); the last level never serves as a source and is
        // still TRANSFER_DST_OPTIMAL from its own blit.
        let barrier_sources_to_shader_read = subresource_barrier(
            self.handle(),
            self.aspect_mask,
            0,
            self.mip_levels - 1,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::AccessFlags::TRANSFER_READ,
            vk::AccessFlags::SHADER_READ,
        );
        let barrier_last_to_shader_read = subresource_barrier(
            self.handle(),
            self.aspect_mask,
            self.mip_levels - 1,
            1,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::SHADER_READ,
        );
        unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier_sources_to_shader_read, barrier_last_to_shader_read],
            );
        }

        Ok(())
    }

    /// Destroy through the allocator; swapchain-wrapped images only destroy
    /// their view (the swapchain owns the image itself).
    pub fn destroy(mut self, allocator: &Allocator) {
        unsafe {
            self.device.destroy_image_view(self.default_view, None);
        }
        if let Some(allocation) = self.allocation.take() {
            allocator.destroy_image(allocation);
        }
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        // Swapchain-wrapped images have no allocation: the swapchain owns
        // the image handle and destroys it, but the view is ours alone, so
        // it must be destroyed here rather than via `destroy(allocator)`,
        // which callers never hold an allocator to call for these.
        if self.allocation.is_none() {
            unsafe {
                self.device.destroy_image_view(self.default_view, None);
            }
            return;
        }

        log::warn!(
            "Image dropped without calling destroy(allocator); GPU memory leaked until allocator teardown"
        );
    }
}

fn aspect_mask_for_format(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D32_SFLOAT | vk::Format::D16_UNORM | vk::Format::X8_D24_UNORM_PACK32 => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

fn create_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
    base_mip: u32,
    mip_count: u32,
    base_layer: u32,
    layer_count: u32,
) -> Result<vk::ImageView> {
    let view_type = if layer_count > 1 {
        vk::ImageViewType::TYPE_2D_ARRAY
    } else {
        vk::ImageViewType::TYPE_2D
    };

    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(view_type)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: base_mip,
            level_count: mip_count,
            base_array_layer: base_layer,
            layer_count,
        });

    unsafe { device.create_image_view(&create_info, None).map_err(Error::Api) }
}

fn subresource_barrier(
    image: vk::Image,
    aspect_mask: vk::ImageAspectFlags,
    base_mip: u32,
    mip_count: u32,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
) -> vk::ImageMemoryBarrier {
    vk::ImageMemoryBarrier::builder()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: base_mip,
            level_count: mip_count,
            base_array_layer: 0,
            layer_count: 1,
        })
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
        .build()
}
