//! Descriptor set layouts, pools, and writes.
//!
//! A builder driven by whatever bindings [`crate::reflection`] discovers in
//! a shader's SPIR-V, so pipeline assembly builds one layout per reflected
//! descriptor set rather than a fixed, hand-declared layout.

use ash::vk;

use crate::error::{Error, Result};

/// Builds a `vk::DescriptorSetLayout` binding-by-binding.
#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Start an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an arbitrary binding. Reflection-driven pipeline assembly uses
    /// this directly; the typed helpers below are for hand-written graph
    /// code (e.g. the virtual frame pool's per-frame UBO set).
    pub fn add_binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        descriptor_count: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(descriptor_count)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Convenience for a single uniform buffer binding.
    pub fn add_uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add_binding(binding, vk::DescriptorType::UNIFORM_BUFFER, 1, stage_flags)
    }

    /// Convenience for a dynamic-offset uniform buffer, used by the
    /// per-frame streaming buffer binding.
    pub fn add_uniform_buffer_dynamic(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add_binding(
            binding,
            vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            1,
            stage_flags,
        )
    }

    /// Convenience for a combined image+sampler binding.
    pub fn add_combined_image_sampler(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add_binding(
            binding,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            1,
            stage_flags,
        )
    }

    /// Convenience for a storage buffer binding.
    pub fn add_storage_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add_binding(binding, vk::DescriptorType::STORAGE_BUFFER, 1, stage_flags)
    }

    /// Convenience for a storage image binding (compute pass UAV writes).
    pub fn add_storage_image(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add_binding(binding, vk::DescriptorType::STORAGE_IMAGE, 1, stage_flags)
    }

    /// Finalize into a `DescriptorSetLayout`.
    pub fn build(self, device: &ash::Device) -> Result<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);
        let layout = unsafe {
            device
                .create_descriptor_set_layout(&layout_info, None)
                .map_err(Error::Api)?
        };
        Ok(DescriptorSetLayout {
            layout,
            device: device.clone(),
            bindings: self.bindings,
        })
    }
}

/// A descriptor set layout with RAII cleanup.
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: ash::Device,
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayout {
    /// Raw handle.
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// The bindings this layout was built from.
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// A descriptor pool sized generously across the common descriptor types
/// (N per set across several descriptor-type categories) rather than an
/// exact count computed from reflection, which would require a two-pass
/// layout-then-pool build.
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: ash::Device,
}

impl DescriptorPool {
    /// Create a pool supporting up to `max_sets` descriptor sets.
    pub fn new(device: ash::Device, max_sets: u32) -> Result<Self> {
        let pool_sizes = [
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(max_sets * 4)
                .build(),
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                .descriptor_count(max_sets * 4)
                .build(),
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(max_sets * 8)
                .build(),
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::STORAGE_BUFFER)
                .descriptor_count(max_sets * 4)
                .build(),
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::STORAGE_IMAGE)
                .descriptor_count(max_sets * 4)
                .build(),
        ];

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);

        let pool = unsafe {
            device
                .create_descriptor_pool(&pool_info, None)
                .map_err(Error::Api)?
        };

        Ok(Self { pool, device })
    }

    /// Allocate one descriptor set per layout in `layouts`.
    pub fn allocate(&self, layouts: &[vk::DescriptorSetLayout]) -> Result<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);
        unsafe {
            self.device
                .allocate_descriptor_sets(&alloc_info)
                .map_err(Error::Api)
        }
    }

    /// Free every set allocated from this pool at once.
    pub fn reset(&self) -> Result<()> {
        unsafe {
            self.device
                .reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty())
                .map_err(Error::Api)
        }
    }

    /// Raw handle.
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Accumulates descriptor writes and applies them in one
/// `vkUpdateDescriptorSets` call.
#[derive(Default)]
pub struct DescriptorSetWriter {
    writes: Vec<PendingWrite>,
}

enum PendingWrite {
    Buffer {
        set: vk::DescriptorSet,
        binding: u32,
        ty: vk::DescriptorType,
        info: vk::DescriptorBufferInfo,
    },
    Image {
        set: vk::DescriptorSet,
        binding: u32,
        info: vk::DescriptorImageInfo,
    },
}

impl DescriptorSetWriter {
    /// Start an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a (dynamic or non-dynamic) uniform buffer write.
    pub fn write_buffer(
        mut self,
        set: vk::DescriptorSet,
        binding: u32,
        ty: vk::DescriptorType,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    ) -> Self {
        self.writes.push(PendingWrite::Buffer {
            set,
            binding,
            ty,
            info: vk::DescriptorBufferInfo::builder()
                .buffer(buffer)
                .offset(offset)
                .range(range)
                .build(),
        });
        self
    }

    /// Queue a combined image sampler write.
    pub fn write_image(
        mut self,
        set: vk::DescriptorSet,
        binding: u32,
        view: vk::ImageView,
        sampler: vk::Sampler,
        layout: vk::ImageLayout,
    ) -> Self {
        self.writes.push(PendingWrite::Image {
            set,
            binding,
            info: vk::DescriptorImageInfo::builder()
                .image_view(view)
                .sampler(sampler)
                .image_layout(layout)
                .build(),
        });
        self
    }

    /// Apply all queued writes.
    pub fn update(self, device: &ash::Device) {
        let mut buffer_infos = Vec::with_capacity(self.writes.len());
        let mut image_infos = Vec::with_capacity(self.writes.len());
        let mut writes = Vec::with_capacity(self.writes.len());

        // Two passes: first stash every info struct so the Vec never
        // reallocates (and invalidates the pointers WriteDescriptorSet
        // borrows) while we're still pushing builder results in the second
        // pass.
        for pending in &self.writes {
            match pending {
                PendingWrite::Buffer { info, .. } => buffer_infos.push(*info),
                PendingWrite::Image { info, .. } => image_infos.push(*info),
            }
        }

        let mut buffer_idx = 0;
        let mut image_idx = 0;
        for pending in &self.writes {
            match pending {
                PendingWrite::Buffer { set, binding, ty, .. } => {
                    writes.push(
                        vk::WriteDescriptorSet::builder()
                            .dst_set(*set)
                            .dst_binding(*binding)
                            .dst_array_element(0)
                            .descriptor_type(*ty)
                            .buffer_info(std::slice::from_ref(&buffer_infos[buffer_idx]))
                            .build(),
                    );
                    buffer_idx += 1;
                }
                PendingWrite::Image { set, binding, .. } => {
                    writes.push(
                        vk::WriteDescriptorSet::builder()
                            .dst_set(*set)
                            .dst_binding(*binding)
                            .dst_array_element(0)
                            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                            .image_info(std::slice::from_ref(&image_infos[image_idx]))
                            .build(),
                    );
                    image_idx += 1;
                }
            }
        }

        unsafe {
            device.update_descriptor_sets(&writes, &[]);
        }
    }
}
