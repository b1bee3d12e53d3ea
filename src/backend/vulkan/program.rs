use {
    super::{render_target::RenderPass, RenderDevice, VulkanError},
    crate::{
        backend::{BackendError, PassUniforms, ProgramKind},
        grid::DataLocation,
    },
    ash::vk,
    std::{
        fs::File,
        path::{Path, PathBuf},
        sync::Arc,
    },
};

/// The pipeline layout shared by every program: one descriptor set with the
/// state texture at binding 0 and the glyph atlas at binding 1, plus the
/// [PassUniforms] push constants.
pub struct ProgramLayout {
    pipeline_layout: vk::PipelineLayout,
    descriptor_set_layout: vk::DescriptorSetLayout,
    render_device: Arc<RenderDevice>,
}

impl ProgramLayout {
    pub fn new(render_device: Arc<RenderDevice>) -> Result<Self, VulkanError> {
        let device = render_device.logical_device();
        let bindings = [
            vk::DescriptorSetLayoutBinding {
                binding: 0,
                descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: 1,
                stage_flags: vk::ShaderStageFlags::VERTEX
                    | vk::ShaderStageFlags::FRAGMENT,
                ..Default::default()
            },
            vk::DescriptorSetLayoutBinding {
                binding: 1,
                descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: 1,
                stage_flags: vk::ShaderStageFlags::FRAGMENT,
                ..Default::default()
            },
        ];
        let descriptor_set_layout = unsafe {
            let create_info = vk::DescriptorSetLayoutCreateInfo {
                binding_count: bindings.len() as u32,
                p_bindings: bindings.as_ptr(),
                ..Default::default()
            };
            device
                .create_descriptor_set_layout(&create_info, None)
                .map_err(VulkanError::UnableToCreateDescriptorSetLayout)?
        };
        let descriptor_set_layout =
            scopeguard::guard(descriptor_set_layout, |layout| unsafe {
                device.destroy_descriptor_set_layout(layout, None);
            });

        let push_constant_ranges = [vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX
                | vk::ShaderStageFlags::FRAGMENT,
            offset: 0,
            size: std::mem::size_of::<PassUniforms>() as u32,
        }];
        let set_layouts = [*descriptor_set_layout];
        let pipeline_layout = unsafe {
            let create_info = vk::PipelineLayoutCreateInfo {
                set_layout_count: set_layouts.len() as u32,
                p_set_layouts: set_layouts.as_ptr(),
                push_constant_range_count: push_constant_ranges.len() as u32,
                p_push_constant_ranges: push_constant_ranges.as_ptr(),
                ..Default::default()
            };
            device
                .create_pipeline_layout(&create_info, None)
                .map_err(VulkanError::UnableToCreatePipelineLayout)?
        };

        let descriptor_set_layout =
            scopeguard::ScopeGuard::into_inner(descriptor_set_layout);
        Ok(Self {
            pipeline_layout,
            descriptor_set_layout,
            render_device,
        })
    }

    pub fn raw(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }

    pub fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.descriptor_set_layout
    }

    /// Record the push constants for a pass.
    ///
    /// # Safety
    ///
    /// Unsafe because the command buffer must be recording.
    pub unsafe fn cmd_push_uniforms(
        &self,
        command_buffer: vk::CommandBuffer,
        uniforms: &PassUniforms,
    ) {
        // safe because PassUniforms is repr(C) and made of f32 fields only
        let bytes = std::slice::from_raw_parts(
            uniforms as *const PassUniforms as *const u8,
            std::mem::size_of::<PassUniforms>(),
        );
        self.render_device.logical_device().cmd_push_constants(
            command_buffer,
            self.pipeline_layout,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            0,
            bytes,
        );
    }
}

impl Drop for ProgramLayout {
    fn drop(&mut self) {
        unsafe {
            let device = self.render_device.logical_device();
            device.destroy_pipeline_layout(self.pipeline_layout, None);
            device.destroy_descriptor_set_layout(
                self.descriptor_set_layout,
                None,
            );
        }
    }
}

/// One of the simulation programs as a graphics pipeline.
pub struct Program {
    kind: ProgramKind,
    pipeline: vk::Pipeline,
    render_device: Arc<RenderDevice>,
}

impl Program {
    /// Load the SPIR-V for `kind` from `shader_directory` and build its
    /// pipeline against `render_pass`.
    pub fn new(
        render_device: Arc<RenderDevice>,
        kind: ProgramKind,
        shader_directory: &Path,
        layout: &ProgramLayout,
        render_pass: &RenderPass,
    ) -> Result<Self, BackendError> {
        let (vertex_name, fragment_name) = kind.shader_names();
        let vertex_module =
            ShaderModule::load(render_device.clone(), shader_directory, vertex_name)?;
        let fragment_module = ShaderModule::load(
            render_device.clone(),
            shader_directory,
            fragment_name,
        )?;

        let pipeline = unsafe {
            create_pipeline(
                &render_device,
                kind,
                &vertex_module,
                &fragment_module,
                layout,
                render_pass,
            )
        }
        .map_err(|err| BackendError::ProgramCreation {
            program: kind,
            reason: err.to_string(),
        })?;

        log::debug!(
            "Created the {:?} program from {} and {}",
            kind,
            vertex_name,
            fragment_name
        );
        Ok(Self {
            kind,
            pipeline,
            render_device,
        })
    }

    pub fn kind(&self) -> ProgramKind {
        self.kind
    }

    pub fn raw(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        unsafe {
            self.render_device
                .logical_device()
                .destroy_pipeline(self.pipeline, None);
        }
    }
}

/// An owned shader module, loaded from `<directory>/<name>.spv`.
struct ShaderModule {
    shader_module: vk::ShaderModule,
    render_device: Arc<RenderDevice>,
}

impl ShaderModule {
    fn load(
        render_device: Arc<RenderDevice>,
        directory: &Path,
        name: &str,
    ) -> Result<Self, BackendError> {
        let path: PathBuf = directory.join(format!("{}.spv", name));
        let words = File::open(&path)
            .and_then(|mut file| ash::util::read_spv(&mut file))
            .map_err(|source| BackendError::ShaderLoad {
                path: path.clone(),
                source,
            })?;
        let create_info = vk::ShaderModuleCreateInfo {
            code_size: words.len() * std::mem::size_of::<u32>(),
            p_code: words.as_ptr(),
            ..Default::default()
        };
        let shader_module = unsafe {
            render_device
                .logical_device()
                .create_shader_module(&create_info, None)
                .map_err(VulkanError::UnableToCreateShaderModule)?
        };
        Ok(Self {
            shader_module,
            render_device,
        })
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.render_device
                .logical_device()
                .destroy_shader_module(self.shader_module, None);
        }
    }
}

/// The fixed-function state that differs between programs.
struct PipelineShape {
    topology: vk::PrimitiveTopology,
    takes_data_locations: bool,
    blend: Option<(vk::BlendFactor, vk::BlendFactor)>,
}

impl PipelineShape {
    fn for_program(kind: ProgramKind) -> Self {
        match kind {
            ProgramKind::Physics | ProgramKind::Copy => Self {
                topology: vk::PrimitiveTopology::TRIANGLE_STRIP,
                takes_data_locations: false,
                blend: None,
            },
            ProgramKind::Render => Self {
                topology: vk::PrimitiveTopology::POINT_LIST,
                takes_data_locations: true,
                blend: Some((vk::BlendFactor::SRC_ALPHA, vk::BlendFactor::ONE)),
            },
            ProgramKind::Debug => Self {
                topology: vk::PrimitiveTopology::TRIANGLE_STRIP,
                takes_data_locations: false,
                blend: Some((
                    vk::BlendFactor::SRC_ALPHA,
                    vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
                )),
            },
        }
    }
}

unsafe fn create_pipeline(
    render_device: &RenderDevice,
    kind: ProgramKind,
    vertex_module: &ShaderModule,
    fragment_module: &ShaderModule,
    layout: &ProgramLayout,
    render_pass: &RenderPass,
) -> Result<vk::Pipeline, VulkanError> {
    let shape = PipelineShape::for_program(kind);
    let stages = [
        vk::PipelineShaderStageCreateInfo {
            module: vertex_module.shader_module,
            stage: vk::ShaderStageFlags::VERTEX,
            p_name: c"main".as_ptr(),
            ..Default::default()
        },
        vk::PipelineShaderStageCreateInfo {
            module: fragment_module.shader_module,
            stage: vk::ShaderStageFlags::FRAGMENT,
            p_name: c"main".as_ptr(),
            ..Default::default()
        },
    ];

    let vertex_bindings = [vk::VertexInputBindingDescription {
        binding: 0,
        stride: std::mem::size_of::<DataLocation>() as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    }];
    let vertex_attributes = [vk::VertexInputAttributeDescription {
        location: 0,
        binding: 0,
        format: vk::Format::R32G32_SFLOAT,
        offset: memoffset::offset_of!(DataLocation, texel) as u32,
    }];
    let vertex_input_state = if shape.takes_data_locations {
        vk::PipelineVertexInputStateCreateInfo {
            vertex_binding_description_count: vertex_bindings.len() as u32,
            p_vertex_binding_descriptions: vertex_bindings.as_ptr(),
            vertex_attribute_description_count: vertex_attributes.len()
                as u32,
            p_vertex_attribute_descriptions: vertex_attributes.as_ptr(),
            ..Default::default()
        }
    } else {
        vk::PipelineVertexInputStateCreateInfo::default()
    };
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
        topology: shape.topology,
        primitive_restart_enable: vk::FALSE,
        ..Default::default()
    };
    let rasterization_state = vk::PipelineRasterizationStateCreateInfo {
        depth_clamp_enable: vk::FALSE,
        rasterizer_discard_enable: vk::FALSE,
        polygon_mode: vk::PolygonMode::FILL,
        line_width: 1.0,
        cull_mode: vk::CullModeFlags::NONE,
        ..Default::default()
    };
    let multisample_state = vk::PipelineMultisampleStateCreateInfo {
        sample_shading_enable: vk::FALSE,
        rasterization_samples: vk::SampleCountFlags::TYPE_1,
        ..Default::default()
    };
    let color_blend_attachment_states = [match shape.blend {
        Some((src_factor, dst_factor)) => {
            vk::PipelineColorBlendAttachmentState {
                color_write_mask: vk::ColorComponentFlags::RGBA,
                blend_enable: vk::TRUE,
                src_color_blend_factor: src_factor,
                dst_color_blend_factor: dst_factor,
                color_blend_op: vk::BlendOp::ADD,
                src_alpha_blend_factor: src_factor,
                dst_alpha_blend_factor: dst_factor,
                alpha_blend_op: vk::BlendOp::ADD,
            }
        }
        None => vk::PipelineColorBlendAttachmentState {
            color_write_mask: vk::ColorComponentFlags::RGBA,
            blend_enable: vk::FALSE,
            ..Default::default()
        },
    }];
    let color_blend_state = vk::PipelineColorBlendStateCreateInfo {
        attachment_count: color_blend_attachment_states.len() as u32,
        p_attachments: color_blend_attachment_states.as_ptr(),
        ..Default::default()
    };
    let viewport_state = vk::PipelineViewportStateCreateInfo {
        viewport_count: 1,
        scissor_count: 1,
        ..Default::default()
    };
    let dynamic_states =
        [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo {
        dynamic_state_count: dynamic_states.len() as u32,
        p_dynamic_states: dynamic_states.as_ptr(),
        ..Default::default()
    };
    let create_info = vk::GraphicsPipelineCreateInfo {
        stage_count: stages.len() as u32,
        p_stages: stages.as_ptr(),
        p_vertex_input_state: &vertex_input_state,
        p_input_assembly_state: &input_assembly,
        p_dynamic_state: &dynamic_state,
        p_rasterization_state: &rasterization_state,
        p_multisample_state: &multisample_state,
        p_color_blend_state: &color_blend_state,
        p_viewport_state: &viewport_state,
        render_pass: render_pass.raw(),
        layout: layout.raw(),
        subpass: 0,
        base_pipeline_handle: vk::Pipeline::null(),
        base_pipeline_index: -1,
        ..Default::default()
    };
    let pipelines = render_device
        .logical_device()
        .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
        .map_err(|(_, err)| VulkanError::UnableToCreateGraphicsPipeline(err))?;
    Ok(pipelines[0])
}
