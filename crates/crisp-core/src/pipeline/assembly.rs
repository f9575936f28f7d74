//! Pipeline assembly: turns a [`PipelineDescriptor`] plus its stages'
//! reflected SPIR-V into a `vk::Pipeline` and its layout.

use ash::vk;

use crate::error::{Error, Result};
use crate::pipeline::schema::{
    BlendFactor, CullMode, InputRate, PipelineDescriptor, PolygonMode, PrimitiveTopology,
};
use crate::reflection::ReflectedShader;
use crate::resources::{DescriptorSetLayout, DescriptorSetLayoutBuilder};

/// An assembled graphics or compute pipeline: the `vk::Pipeline` itself,
/// its layout, and the per-set descriptor layouts that make up that layout
/// (kept so the caller can allocate sets from them).
pub struct AssembledPipeline {
    device: ash::Device,
    pipeline: vk::Pipeline,
    pipeline_layout: vk::PipelineLayout,
    descriptor_set_layouts: Vec<DescriptorSetLayout>,
    bind_point: vk::PipelineBindPoint,
}

impl AssembledPipeline {
    /// Raw pipeline handle.
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Pipeline layout, needed to bind descriptor sets and push constants.
    pub fn layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }

    /// Descriptor set layouts, in set-index order.
    pub fn descriptor_set_layouts(&self) -> &[DescriptorSetLayout] {
        &self.descriptor_set_layouts
    }

    /// Whether this is a graphics or compute pipeline.
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        self.bind_point
    }
}

impl Drop for AssembledPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.pipeline_layout, None);
        }
    }
}

/// A shader stage's compiled SPIR-V plus which stage it belongs to, handed
/// to [`assemble`] after the caller has loaded the bytes named by the
/// descriptor's `shaders` map.
pub struct StageSource<'a> {
    /// Stage, e.g. `vk::ShaderStageFlags::VERTEX`.
    pub stage: vk::ShaderStageFlags,
    /// Path used only for error messages.
    pub path: &'a str,
    /// Raw SPIR-V bytes.
    pub code: &'a [u8],
}

/// Create a `vk::ShaderModule` from raw SPIR-V bytes. Code length has
/// already been validated by [`ReflectedShader::reflect`] before this is
/// called.
fn create_shader_module(device: &ash::Device, code: &[u8]) -> Result<vk::ShaderModule> {
    // SPIR-V is a stream of u32 words; ash's create_shader_module wants a
    // &[u32], so reinterpret the validated (len % 4 == 0) byte buffer.
    let words: Vec<u32> = code
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);
    unsafe { device.create_shader_module(&create_info, None).map_err(Error::Api) }
}

/// Assemble a graphics pipeline if `render_pass` is `Some`, or a compute
/// pipeline if the only stage is `COMPUTE`. `render_area` sizes fixed
/// (non-dynamic) viewports/scissors.
pub fn assemble(
    device: &ash::Device,
    descriptor: &PipelineDescriptor,
    stages: &[StageSource<'_>],
    render_pass: Option<(vk::RenderPass, u32)>,
    render_area: vk::Extent2D,
) -> Result<AssembledPipeline> {
    if stages.iter().any(|s| s.stage == vk::ShaderStageFlags::COMPUTE) {
        return assemble_compute(device, descriptor, stages);
    }
    assemble_graphics(device, descriptor, stages, render_pass, render_area)
}

fn reflect_and_merge(stages: &[StageSource<'_>]) -> Result<ReflectedShader> {
    let mut merged = ReflectedShader::default();
    for stage in stages {
        let reflected = ReflectedShader::reflect(stage.path, stage.code)?;
        merged.merge(&reflected);
    }
    Ok(merged)
}

fn build_descriptor_set_layouts(
    device: &ash::Device,
    reflected: &ReflectedShader,
    descriptor: &PipelineDescriptor,
) -> Result<Vec<DescriptorSetLayout>> {
    let mut layouts = Vec::with_capacity(reflected.descriptor_set_layout_bindings.len());
    for (set_index, bindings) in reflected.descriptor_set_layout_bindings.iter().enumerate() {
        let mut builder = DescriptorSetLayoutBuilder::new();
        for binding in bindings {
            if binding.descriptor_count == 0 {
                continue;
            }
            builder = builder.add_binding(binding.binding, binding.descriptor_type, binding.descriptor_count, binding.stage_flags);
        }
        let _set_meta = descriptor.descriptor_sets.get(set_index);
        layouts.push(builder.build(device)?);
    }
    Ok(layouts)
}

fn build_pipeline_layout(
    device: &ash::Device,
    descriptor_set_layouts: &[DescriptorSetLayout],
    reflected: &ReflectedShader,
) -> Result<vk::PipelineLayout> {
    let set_layout_handles: Vec<vk::DescriptorSetLayout> =
        descriptor_set_layouts.iter().map(|l| l.handle()).collect();

    let push_constant_ranges: Vec<vk::PushConstantRange> = reflected
        .push_constant_ranges
        .iter()
        .map(|range| {
            vk::PushConstantRange::builder()
                .stage_flags(range.stage_flags)
                .offset(range.offset)
                .size(range.size)
                .build()
        })
        .collect();

    let layout_info = vk::PipelineLayoutCreateInfo::builder()
        .set_layouts(&set_layout_handles)
        .push_constant_ranges(&push_constant_ranges);

    unsafe { device.create_pipeline_layout(&layout_info, None).map_err(Error::Api) }
}

fn assemble_compute(
    device: &ash::Device,
    descriptor: &PipelineDescriptor,
    stages: &[StageSource<'_>],
) -> Result<AssembledPipeline> {
    let reflected = reflect_and_merge(stages)?;
    let descriptor_set_layouts = build_descriptor_set_layouts(device, &reflected, descriptor)?;
    let pipeline_layout = build_pipeline_layout(device, &descriptor_set_layouts, &reflected)?;

    let compute_stage = stages
        .iter()
        .find(|s| s.stage == vk::ShaderStageFlags::COMPUTE)
        .expect("assemble_compute called with a compute stage present");
    let module = create_shader_module(device, compute_stage.code)?;
    let entry_point = std::ffi::CStr::from_bytes_with_nul(b"main\0").expect("literal is nul-terminated");

    let stage_info = vk::PipelineShaderStageCreateInfo::builder()
        .stage(vk::ShaderStageFlags::COMPUTE)
        .module(module)
        .name(entry_point);

    let create_info = vk::ComputePipelineCreateInfo::builder()
        .stage(stage_info.build())
        .layout(pipeline_layout);

    let pipeline = unsafe {
        device
            .create_compute_pipelines(vk::PipelineCache::null(), &[create_info.build()], None)
            .map_err(|(_, result)| Error::Api(result))?[0]
    };

    unsafe {
        device.destroy_shader_module(module, None);
    }

    Ok(AssembledPipeline {
        device: device.clone(),
        pipeline,
        pipeline_layout,
        descriptor_set_layouts,
        bind_point: vk::PipelineBindPoint::COMPUTE,
    })
}

fn assemble_graphics(
    device: &ash::Device,
    descriptor: &PipelineDescriptor,
    stages: &[StageSource<'_>],
    render_pass: Option<(vk::RenderPass, u32)>,
    render_area: vk::Extent2D,
) -> Result<AssembledPipeline> {
    let (render_pass, subpass) =
        render_pass.ok_or_else(|| Error::PipelineDescriptor("graphics pipeline requires a render pass".into()))?;

    let reflected = reflect_and_merge(stages)?;
    let descriptor_set_layouts = build_descriptor_set_layouts(device, &reflected, descriptor)?;
    let pipeline_layout = build_pipeline_layout(device, &descriptor_set_layouts, &reflected)?;

    let entry_point = std::ffi::CStr::from_bytes_with_nul(b"main\0").expect("literal is nul-terminated");
    let mut modules = Vec::with_capacity(stages.len());
    let mut stage_infos = Vec::with_capacity(stages.len());
    for stage in stages {
        let module = create_shader_module(device, stage.code)?;
        stage_infos.push(
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(stage.stage)
                .module(module)
                .name(entry_point)
                .build(),
        );
        modules.push(module);
    }

    let bindings: Vec<vk::VertexInputBindingDescription> = descriptor
        .vertex_input_bindings
        .iter()
        .enumerate()
        .map(|(index, binding)| {
            let stride: u32 = binding.formats.iter().map(|f| f.byte_size()).sum();
            vk::VertexInputBindingDescription::builder()
                .binding(index as u32)
                .stride(stride)
                .input_rate(match binding.input_rate {
                    InputRate::Vertex => vk::VertexInputRate::VERTEX,
                    InputRate::Instance => vk::VertexInputRate::INSTANCE,
                })
                .build()
        })
        .collect();

    // Attribute formats come from reflection (the shader's actual input
    // locations), ordered by location; offsets accumulate per-binding using
    // the JSON's declared attribute widths.
    let mut attributes = Vec::with_capacity(reflected.vertex_input_attributes.len());
    for (binding_index, attribute_formats) in descriptor.vertex_attributes.iter().enumerate() {
        let mut offset = 0u32;
        for (slot, _json_format) in attribute_formats.iter().enumerate() {
            if let Some(reflected_attr) = reflected.vertex_input_attributes.get(slot) {
                attributes.push(
                    vk::VertexInputAttributeDescription::builder()
                        .location(reflected_attr.location)
                        .binding(binding_index as u32)
                        .format(reflected_attr.format)
                        .offset(offset)
                        .build(),
                );
            }
            offset += attribute_formats[slot].byte_size();
        }
    }

    let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(&bindings)
        .vertex_attribute_descriptions(&attributes);

    let topology = if descriptor.tessellation.is_some() || descriptor.shaders.has_full_tessellation() {
        vk::PrimitiveTopology::PATCH_LIST
    } else {
        match descriptor.input_assembly.primitive_topology {
            PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
            PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
            PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        }
    };
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder().topology(topology);

    let tessellation_state = descriptor
        .tessellation
        .as_ref()
        .map(|t| vk::PipelineTessellationStateCreateInfo::builder().patch_control_points(t.control_point_count).build());

    let is_dynamic_viewport = descriptor.viewport.is_dynamic();
    let viewports = [vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: render_area.width as f32,
        height: render_area.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }];
    let scissors = [vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: render_area,
    }];
    let viewport_state = if is_dynamic_viewport {
        vk::PipelineViewportStateCreateInfo::builder().viewport_count(1).scissor_count(1)
    } else {
        vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors)
    };

    let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
        .polygon_mode(match descriptor.rasterization.polygon_mode {
            PolygonMode::Fill => vk::PolygonMode::FILL,
            PolygonMode::Line => vk::PolygonMode::LINE,
        })
        .cull_mode(match descriptor.rasterization.cull_mode {
            CullMode::Front => vk::CullModeFlags::FRONT,
            CullMode::Back => vk::CullModeFlags::BACK,
            CullMode::None => vk::CullModeFlags::NONE,
        })
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .line_width(descriptor.rasterization.line_width);

    let multisample = vk::PipelineMultisampleStateCreateInfo::builder()
        .rasterization_samples(vk::SampleCountFlags::TYPE_1)
        .alpha_to_coverage_enable(descriptor.multisample.alpha_to_coverage);

    let depth_compare = if descriptor.depth_stencil.reverse_depth {
        vk::CompareOp::GREATER_OR_EQUAL
    } else {
        vk::CompareOp::LESS
    };
    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(descriptor.depth_stencil.depth_test)
        .depth_write_enable(descriptor.depth_stencil.depth_write_enabled)
        .depth_compare_op(depth_compare);

    let blend_factor = |f: BlendFactor| match f {
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
    };
    let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(descriptor.blend.enabled)
        .src_color_blend_factor(blend_factor(descriptor.blend.src))
        .dst_color_blend_factor(blend_factor(descriptor.blend.dst))
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(blend_factor(descriptor.blend.src))
        .dst_alpha_blend_factor(blend_factor(descriptor.blend.dst))
        .alpha_blend_op(vk::BlendOp::ADD)
        .build();
    let color_blend_attachments = [color_blend_attachment];
    let color_blend = vk::PipelineColorBlendStateCreateInfo::builder().attachments(&color_blend_attachments);

    let mut dynamic_states = Vec::new();
    if is_dynamic_viewport {
        dynamic_states.push(vk::DynamicState::VIEWPORT);
        dynamic_states.push(vk::DynamicState::SCISSOR);
    }
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

    let mut create_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&stage_infos)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization)
        .multisample_state(&multisample)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blend)
        .dynamic_state(&dynamic_state)
        .layout(pipeline_layout)
        .render_pass(render_pass)
        .subpass(subpass);
    if let Some(tessellation_state) = tessellation_state.as_ref() {
        create_info = create_info.tessellation_state(tessellation_state);
    }

    let pipeline = unsafe {
        device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info.build()], None)
            .map_err(|(_, result)| Error::Api(result))?[0]
    };

    for module in modules {
        unsafe {
            device.destroy_shader_module(module, None);
        }
    }

    Ok(AssembledPipeline {
        device: device.clone(),
        pipeline,
        pipeline_layout,
        descriptor_set_layouts,
        bind_point: vk::PipelineBindPoint::GRAPHICS,
    })
}
