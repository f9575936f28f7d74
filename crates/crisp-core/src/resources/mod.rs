//! RAII wrappers for Vulkan resources: buffers, images, samplers, and
//! descriptor sets. These are the building blocks the render graph's
//! physical resource creation (`crate::graph::physical`) assembles into
//! [`crate::graph::physical::PhysicalImage`] and
//! [`crate::graph::physical::PhysicalBuffer`].

mod buffer;
mod descriptor;
mod image;
mod sampler;

pub use buffer::Buffer;
pub use descriptor::{DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorSetWriter};
pub use image::Image;
pub use sampler::Sampler;
