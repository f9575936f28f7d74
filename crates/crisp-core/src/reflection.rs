//! SPIR-V shader reflection: derives descriptor set layout bindings, push
//! constant ranges, and vertex input attributes directly from compiled
//! shader bytecode, via the C `spirv_reflect` library this crate's
//! `spirv-reflect` dependency binds. The merge rule across stages: same
//! `(set, binding)` ORs stage flags, otherwise first non-empty wins; push
//! constants concatenate.

use ash::vk;
use spirv_reflect::types::{ReflectDescriptorType, ReflectFormat, ReflectShaderStageFlags};
use spirv_reflect::ShaderModule;

use crate::error::{Error, Result};

/// One binding within a descriptor set, as reflected from SPIR-V.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorBinding {
    /// Binding index within its set.
    pub binding: u32,
    /// Descriptor type this binding expects.
    pub descriptor_type: vk::DescriptorType,
    /// Array size (1 for a non-array binding).
    pub descriptor_count: u32,
    /// Shader stages that reference this binding, ORed across stages during
    /// merge.
    pub stage_flags: vk::ShaderStageFlags,
}

/// A push-constant range as reflected from a single stage.
#[derive(Debug, Clone, Copy)]
pub struct PushConstantRange {
    /// Stage this range was reflected from.
    pub stage_flags: vk::ShaderStageFlags,
    /// Byte offset within the push-constant block.
    pub offset: u32,
    /// Size in bytes.
    pub size: u32,
}

/// A vertex shader input attribute, reported sorted by `location`.
#[derive(Debug, Clone, Copy)]
pub struct VertexInputAttribute {
    /// `layout(location = N)` in the shader.
    pub location: u32,
    /// Format matching the attribute's component type/count.
    pub format: vk::Format,
}

/// Reflection output for one shader stage, or the union of several after
/// [`ReflectedShader::merge`].
#[derive(Debug, Default, Clone)]
pub struct ReflectedShader {
    /// Bindings grouped by set index; `descriptor_set_layout_bindings[set]`
    /// is that set's bindings, sparse by `binding` slot (an empty slot has
    /// `descriptor_count == 0`).
    pub descriptor_set_layout_bindings: Vec<Vec<DescriptorBinding>>,
    /// Push constant ranges, one per reflecting stage, concatenated on
    /// merge.
    pub push_constant_ranges: Vec<PushConstantRange>,
    /// Vertex input attributes, sorted ascending by location. Empty for any
    /// non-vertex stage.
    pub vertex_input_attributes: Vec<VertexInputAttribute>,
}

impl ReflectedShader {
    /// Reflect a single stage's SPIR-V bytecode. `code` must be a byte
    /// stream whose length is divisible by 4.
    pub fn reflect(stage_path: &str, code: &[u8]) -> Result<Self> {
        if code.len() % 4 != 0 {
            return Err(Error::Reflection(format!(
                "{stage_path}: SPIR-V byte length {} is not a multiple of 4",
                code.len()
            )));
        }

        let module = ShaderModule::load_u8_data(code)
            .map_err(|e| Error::Reflection(format!("{stage_path}: failed to load SPIR-V module: {e}")))?;

        let stage_flags = shader_stage_to_vk(module.get_shader_stage())
            .ok_or_else(|| Error::Reflection(format!("{stage_path}: unsupported shader stage")))?;

        let bindings = module
            .enumerate_descriptor_bindings(None)
            .map_err(|e| Error::Reflection(format!("{stage_path}: descriptor binding enumeration failed: {e}")))?;

        let mut descriptor_set_layout_bindings: Vec<Vec<DescriptorBinding>> = Vec::new();
        for binding in &bindings {
            let set = binding.set as usize;
            if descriptor_set_layout_bindings.len() <= set {
                descriptor_set_layout_bindings.resize(set + 1, Vec::new());
            }
            let slot = binding.binding as usize;
            let layout = &mut descriptor_set_layout_bindings[set];
            if layout.len() <= slot {
                layout.resize(
                    slot + 1,
                    DescriptorBinding {
                        binding: 0,
                        descriptor_type: vk::DescriptorType::SAMPLER,
                        descriptor_count: 0,
                        stage_flags: vk::ShaderStageFlags::empty(),
                    },
                );
            }

            let descriptor_type = descriptor_type_to_vk(binding.descriptor_type).ok_or_else(|| {
                Error::Reflection(format!(
                    "{stage_path}: unsupported descriptor type at set {set} binding {slot}"
                ))
            })?;

            layout[slot] = DescriptorBinding {
                binding: binding.binding,
                descriptor_type,
                descriptor_count: binding.count.max(1),
                stage_flags,
            };
        }

        let push_constant_ranges = module
            .enumerate_push_constant_blocks(None)
            .map_err(|e| Error::Reflection(format!("{stage_path}: push constant enumeration failed: {e}")))?
            .into_iter()
            .map(|block| PushConstantRange {
                stage_flags,
                offset: block.offset,
                size: block.size,
            })
            .collect();

        let mut vertex_input_attributes = Vec::new();
        if stage_flags == vk::ShaderStageFlags::VERTEX {
            let inputs = module
                .enumerate_input_variables(None)
                .map_err(|e| Error::Reflection(format!("{stage_path}: input variable enumeration failed: {e}")))?;
            for input in inputs {
                // Built-in inputs (gl_VertexIndex, etc.) reflect with a
                // negative/sentinel location; skip them.
                if input.location == u32::MAX {
                    continue;
                }
                let format = format_to_vk(input.format).ok_or_else(|| {
                    Error::Reflection(format!(
                        "{stage_path}: unsupported vertex input format at location {}",
                        input.location
                    ))
                })?;
                vertex_input_attributes.push(VertexInputAttribute {
                    location: input.location,
                    format,
                });
            }
            vertex_input_attributes.sort_by_key(|attr| attr.location);
        }

        Ok(Self {
            descriptor_set_layout_bindings,
            push_constant_ranges,
            vertex_input_attributes,
        })
    }

    /// Merge `other` into `self`: same `(set, binding)` entries OR their
    /// stage flags; an empty `self` slot is replaced by `other`'s entry;
    /// push-constant ranges are concatenated.
    pub fn merge(&mut self, other: &ReflectedShader) {
        if other.descriptor_set_layout_bindings.len() > self.descriptor_set_layout_bindings.len() {
            self.descriptor_set_layout_bindings
                .resize(other.descriptor_set_layout_bindings.len(), Vec::new());
        }

        for (set_index, other_set) in other.descriptor_set_layout_bindings.iter().enumerate() {
            let self_set = &mut self.descriptor_set_layout_bindings[set_index];
            if other_set.len() > self_set.len() {
                self_set.resize(
                    other_set.len(),
                    DescriptorBinding {
                        binding: 0,
                        descriptor_type: vk::DescriptorType::SAMPLER,
                        descriptor_count: 0,
                        stage_flags: vk::ShaderStageFlags::empty(),
                    },
                );
            }

            for (slot, other_binding) in other_set.iter().enumerate() {
                let existing = &mut self_set[slot];
                if existing.descriptor_count > 0 {
                    existing.stage_flags |= other_binding.stage_flags;
                } else if other_binding.descriptor_count > 0 {
                    *existing = *other_binding;
                }
            }
        }

        self.push_constant_ranges.extend_from_slice(&other.push_constant_ranges);
    }
}

fn shader_stage_to_vk(stage: ReflectShaderStageFlags) -> Option<vk::ShaderStageFlags> {
    Some(match stage {
        ReflectShaderStageFlags::VERTEX => vk::ShaderStageFlags::VERTEX,
        ReflectShaderStageFlags::FRAGMENT => vk::ShaderStageFlags::FRAGMENT,
        ReflectShaderStageFlags::COMPUTE => vk::ShaderStageFlags::COMPUTE,
        ReflectShaderStageFlags::GEOMETRY => vk::ShaderStageFlags::GEOMETRY,
        ReflectShaderStageFlags::TESSELLATION_CONTROL => vk::ShaderStageFlags::TESSELLATION_CONTROL,
        ReflectShaderStageFlags::TESSELLATION_EVALUATION => vk::ShaderStageFlags::TESSELLATION_EVALUATION,
        _ => return None,
    })
}

fn descriptor_type_to_vk(ty: ReflectDescriptorType) -> Option<vk::DescriptorType> {
    Some(match ty {
        ReflectDescriptorType::Sampler => vk::DescriptorType::SAMPLER,
        ReflectDescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        ReflectDescriptorType::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        ReflectDescriptorType::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
        ReflectDescriptorType::UniformTexelBuffer => vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
        ReflectDescriptorType::StorageTexelBuffer => vk::DescriptorType::STORAGE_TEXEL_BUFFER,
        ReflectDescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        ReflectDescriptorType::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        ReflectDescriptorType::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        ReflectDescriptorType::StorageBufferDynamic => vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
        ReflectDescriptorType::InputAttachment => vk::DescriptorType::INPUT_ATTACHMENT,
        ReflectDescriptorType::AccelerationStructureNV => vk::DescriptorType::ACCELERATION_STRUCTURE_KHR,
        _ => return None,
    })
}

fn format_to_vk(format: ReflectFormat) -> Option<vk::Format> {
    Some(match format {
        ReflectFormat::R32_SFLOAT => vk::Format::R32_SFLOAT,
        ReflectFormat::R32G32_SFLOAT => vk::Format::R32G32_SFLOAT,
        ReflectFormat::R32G32B32_SFLOAT => vk::Format::R32G32B32_SFLOAT,
        ReflectFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
        ReflectFormat::R32_UINT => vk::Format::R32_UINT,
        ReflectFormat::R32G32_UINT => vk::Format::R32G32_UINT,
        ReflectFormat::R32G32B32_UINT => vk::Format::R32G32B32_UINT,
        ReflectFormat::R32G32B32A32_UINT => vk::Format::R32G32B32A32_UINT,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_byte_length_not_divisible_by_four() {
        let err = ReflectedShader::reflect("bad.vert.spv", &[0u8; 5]).unwrap_err();
        assert!(matches!(err, Error::Reflection(_)));
    }

    #[test]
    fn merge_ors_stage_flags_for_shared_binding() {
        let mut a = ReflectedShader {
            descriptor_set_layout_bindings: vec![vec![DescriptorBinding {
                binding: 0,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: 1,
                stage_flags: vk::ShaderStageFlags::VERTEX,
            }]],
            push_constant_ranges: vec![],
            vertex_input_attributes: vec![],
        };
        let b = ReflectedShader {
            descriptor_set_layout_bindings: vec![vec![DescriptorBinding {
                binding: 0,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: 1,
                stage_flags: vk::ShaderStageFlags::FRAGMENT,
            }]],
            push_constant_ranges: vec![],
            vertex_input_attributes: vec![],
        };
        a.merge(&b);
        assert_eq!(
            a.descriptor_set_layout_bindings[0][0].stage_flags,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn merge_concatenates_push_constants() {
        let mut a = ReflectedShader {
            descriptor_set_layout_bindings: vec![],
            push_constant_ranges: vec![PushConstantRange {
                stage_flags: vk::ShaderStageFlags::VERTEX,
                offset: 0,
                size: 16,
            }],
            vertex_input_attributes: vec![],
        };
        let b = ReflectedShader {
            descriptor_set_layout_bindings: vec![],
            push_constant_ranges: vec![PushConstantRange {
                stage_flags: vk::ShaderStageFlags::FRAGMENT,
                offset: 16,
                size: 8,
            }],
            vertex_input_attributes: vec![],
        };
        a.merge(&b);
        assert_eq!(a.push_constant_ranges.len(), 2);
    }

    #[test]
    fn vertex_attributes_sort_by_location() {
        let mut shader = ReflectedShader {
            descriptor_set_layout_bindings: vec![],
            push_constant_ranges: vec![],
            vertex_input_attributes: vec![
                VertexInputAttribute { location: 2, format: vk::Format::R32G32_SFLOAT },
                VertexInputAttribute { location: 0, format: vk::Format::R32G32B32_SFLOAT },
            ],
        };
        shader.vertex_input_attributes.sort_by_key(|a| a.location);
        assert_eq!(shader.vertex_input_attributes[0].location, 0);
        assert_eq!(shader.vertex_input_attributes[1].location, 2);
    }
}
