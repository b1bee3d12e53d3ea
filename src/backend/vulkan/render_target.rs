use {
    super::{texture::Texture, RenderDevice, VulkanError},
    ash::vk,
    std::sync::Arc,
};

/// How a render pass treats its single color attachment.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AttachmentUse {
    /// Every texel is overwritten by a full-target draw. The attachment is
    /// left ready for sampling.
    StateTexture,

    /// The surface is cleared to opaque black.
    ClearSurface,

    /// The surface keeps what was drawn before.
    LoadSurface,
}

/// An owned single-subpass render pass with one color attachment.
pub struct RenderPass {
    render_pass: vk::RenderPass,
    render_device: Arc<RenderDevice>,
}

impl RenderPass {
    pub fn new(
        render_device: Arc<RenderDevice>,
        format: vk::Format,
        attachment_use: AttachmentUse,
    ) -> Result<Self, VulkanError> {
        let (load_op, initial_layout, final_layout) = match attachment_use {
            AttachmentUse::StateTexture => (
                vk::AttachmentLoadOp::DONT_CARE,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ),
            AttachmentUse::ClearSurface => (
                vk::AttachmentLoadOp::CLEAR,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            ),
            AttachmentUse::LoadSurface => (
                vk::AttachmentLoadOp::LOAD,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            ),
        };
        let attachments = [vk::AttachmentDescription {
            format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout,
            final_layout,
            ..Default::default()
        }];
        let color_attachment_references = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let subpasses = [vk::SubpassDescription {
            pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
            color_attachment_count: color_attachment_references.len() as u32,
            p_color_attachments: color_attachment_references.as_ptr(),
            ..Default::default()
        }];
        let dependencies = [
            vk::SubpassDependency {
                src_subpass: vk::SUBPASS_EXTERNAL,
                dst_subpass: 0,
                src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::FRAGMENT_SHADER
                    | vk::PipelineStageFlags::TRANSFER,
                dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::VERTEX_SHADER
                    | vk::PipelineStageFlags::FRAGMENT_SHADER,
                src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::TRANSFER_WRITE,
                dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ
                    | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::SHADER_READ,
                ..Default::default()
            },
            vk::SubpassDependency {
                src_subpass: 0,
                dst_subpass: vk::SUBPASS_EXTERNAL,
                src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                dst_stage_mask: vk::PipelineStageFlags::VERTEX_SHADER
                    | vk::PipelineStageFlags::FRAGMENT_SHADER
                    | vk::PipelineStageFlags::TRANSFER,
                src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                dst_access_mask: vk::AccessFlags::SHADER_READ
                    | vk::AccessFlags::TRANSFER_READ,
                ..Default::default()
            },
        ];
        let create_info = vk::RenderPassCreateInfo {
            attachment_count: attachments.len() as u32,
            p_attachments: attachments.as_ptr(),
            subpass_count: subpasses.len() as u32,
            p_subpasses: subpasses.as_ptr(),
            dependency_count: dependencies.len() as u32,
            p_dependencies: dependencies.as_ptr(),
            ..Default::default()
        };
        let render_pass = unsafe {
            render_device
                .logical_device()
                .create_render_pass(&create_info, None)
                .map_err(VulkanError::UnableToCreateRenderPass)?
        };
        Ok(Self {
            render_pass,
            render_device,
        })
    }

    pub fn raw(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Begin the render pass on `framebuffer` and set a viewport and
    /// scissor covering the full target.
    ///
    /// # Safety
    ///
    /// Unsafe because the render pass and framebuffer must outlive the
    /// command buffer's execution.
    pub unsafe fn cmd_begin(
        &self,
        command_buffer: vk::CommandBuffer,
        framebuffer: &Framebuffer,
    ) {
        let device = self.render_device.logical_device();
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        }];
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: framebuffer.extent,
        };
        let begin_info = vk::RenderPassBeginInfo {
            render_pass: self.render_pass,
            framebuffer: framebuffer.framebuffer,
            render_area,
            clear_value_count: clear_values.len() as u32,
            p_clear_values: clear_values.as_ptr(),
            ..Default::default()
        };
        device.cmd_begin_render_pass(
            command_buffer,
            &begin_info,
            vk::SubpassContents::INLINE,
        );
        cmd_set_viewport(
            device,
            command_buffer,
            vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: framebuffer.extent.width as f32,
                height: framebuffer.extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            },
            render_area,
        );
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.render_device
                .logical_device()
                .destroy_render_pass(self.render_pass, None);
        }
    }
}

/// Set the dynamic viewport and scissor state.
///
/// # Safety
///
/// Unsafe because a pipeline with dynamic viewport and scissor state must be
/// bound before drawing.
pub unsafe fn cmd_set_viewport(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    viewport: vk::Viewport,
    scissor: vk::Rect2D,
) {
    device.cmd_set_viewport(command_buffer, 0, &[viewport]);
    device.cmd_set_scissor(command_buffer, 0, &[scissor]);
}

/// An owned framebuffer which targets a single texture.
pub struct Framebuffer {
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
    render_device: Arc<RenderDevice>,
}

impl Framebuffer {
    /// # Safety
    ///
    /// Unsafe because the texture must outlive the framebuffer.
    pub unsafe fn new(
        render_device: Arc<RenderDevice>,
        render_pass: &RenderPass,
        texture: &Texture,
    ) -> Result<Self, VulkanError> {
        let extent = texture.extent();
        let attachments = [texture.view()];
        let create_info = vk::FramebufferCreateInfo {
            render_pass: render_pass.raw(),
            attachment_count: attachments.len() as u32,
            p_attachments: attachments.as_ptr(),
            width: extent.width,
            height: extent.height,
            layers: 1,
            ..Default::default()
        };
        let framebuffer = render_device
            .logical_device()
            .create_framebuffer(&create_info, None)
            .map_err(VulkanError::UnableToCreateFramebuffer)?;
        Ok(Self {
            framebuffer,
            extent,
            render_device,
        })
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.render_device
                .logical_device()
                .destroy_framebuffer(self.framebuffer, None);
        }
    }
}
