//! Sampler wrapper.

use ash::vk;

use crate::error::{Error, Result};

/// A sampler with RAII cleanup.
pub struct Sampler {
    device: ash::Device,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Create a sampler. `anisotropy` is clamped to the device's reported
    /// limit by the caller (left to the graph/pipeline layer, which already
    /// has the physical device properties in hand); this wrapper just
    /// forwards whatever is given it.
    pub fn new(
        device: ash::Device,
        mag_filter: vk::Filter,
        min_filter: vk::Filter,
        address_mode: vk::SamplerAddressMode,
        anisotropy: Option<f32>,
        mip_levels: u32,
    ) -> Result<Self> {
        let mut create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(mag_filter)
            .min_filter(min_filter)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .min_lod(0.0)
            .max_lod(mip_levels as f32);

        create_info = match anisotropy {
            Some(max) => create_info.anisotropy_enable(true).max_anisotropy(max),
            None => create_info.anisotropy_enable(false),
        };

        let sampler = unsafe {
            device
                .create_sampler(&create_info, None)
                .map_err(Error::Api)?
        };

        Ok(Self { device, sampler })
    }

    /// Raw handle.
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}
