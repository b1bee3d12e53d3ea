//! A headless Vulkan implementation of [GraphicsBackend].
//!
//! State textures are RGBA32F images which rest in
//! `SHADER_READ_ONLY_OPTIMAL` between calls. The surface is an offscreen
//! RGBA8 image which rests in `COLOR_ATTACHMENT_OPTIMAL` and is copied into
//! a host-visible buffer on [GraphicsBackend::present].
//!
//! Every call records its commands into a one-time-submit command buffer and
//! waits for the GPU to finish before returning.

mod allocation;
mod buffer;
mod descriptors;
mod error;
mod one_time_submit;
mod program;
mod render_device;
mod render_target;
mod texture;

use {
    self::{
        buffer::HostCoherentBuffer,
        descriptors::{BindingKey, DescriptorCache},
        one_time_submit::OneTimeSubmitPool,
        program::{Program, ProgramLayout},
        render_target::{AttachmentUse, Framebuffer, RenderPass},
        texture::{LayoutTransition, Sampler, Texture},
    },
    crate::{
        backend::{
            BackendError, GraphicsBackend, OverlayDraw, ParticleDraw,
            ProgramHandle, ProgramKind, SurfaceDescriptor, TexelRegion,
            TextureHandle, TexturePass,
        },
        grid::{DataLocation, Particle},
    },
    ash::vk,
    image::RgbaImage,
    std::{path::PathBuf, sync::Arc},
};

pub use self::{
    allocation::Allocation, error::VulkanError, render_device::RenderDevice,
};

enum VulkanTexture {
    State {
        framebuffer: Framebuffer,
        texture: Texture,
    },
    Atlas(Texture),
}

impl VulkanTexture {
    fn texture(&self) -> &Texture {
        match self {
            VulkanTexture::State { texture, .. } => texture,
            VulkanTexture::Atlas(texture) => texture,
        }
    }
}

pub struct VulkanBackend {
    descriptor: SurfaceDescriptor,
    shader_directory: PathBuf,
    float_textures: bool,
    data_locations: Option<HostCoherentBuffer<DataLocation>>,
    programs: Vec<Program>,
    textures: Vec<VulkanTexture>,
    descriptors: DescriptorCache,
    surface_framebuffer: Framebuffer,
    surface: Texture,
    readback: HostCoherentBuffer<u8>,
    sampler: Sampler,
    layout: ProgramLayout,
    state_pass: RenderPass,
    clear_pass: RenderPass,
    load_pass: RenderPass,
    submit: OneTimeSubmitPool,
    render_device: Arc<RenderDevice>,
}

impl VulkanBackend {
    /// Create a headless device and an offscreen surface of the
    /// descriptor's physical size.
    ///
    /// # Params
    ///
    /// * `descriptor` - the size of the drawable surface
    /// * `shader_directory` - where compiled `<name>.spv` shaders are found
    pub fn new(
        descriptor: SurfaceDescriptor,
        shader_directory: impl Into<PathBuf>,
    ) -> Result<Self, BackendError> {
        let render_device =
            Arc::new(RenderDevice::new().map_err(context_creation_error)?);
        let float_textures =
            render_device.supports_render_and_sample(texture::STATE_FORMAT);

        let submit = OneTimeSubmitPool::new(render_device.clone())?;
        let state_pass = RenderPass::new(
            render_device.clone(),
            texture::STATE_FORMAT,
            AttachmentUse::StateTexture,
        )?;
        let clear_pass = RenderPass::new(
            render_device.clone(),
            texture::COLOR_FORMAT,
            AttachmentUse::ClearSurface,
        )?;
        let load_pass = RenderPass::new(
            render_device.clone(),
            texture::COLOR_FORMAT,
            AttachmentUse::LoadSurface,
        )?;
        let layout = ProgramLayout::new(render_device.clone())?;
        let sampler = Sampler::new(render_device.clone())?;
        let descriptors = DescriptorCache::new(render_device.clone())?;

        let (width, height) = descriptor.physical_size();
        let surface = Texture::new(
            render_device.clone(),
            vk::Extent2D { width, height },
            texture::COLOR_FORMAT,
            vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST,
        )?;
        let surface_framebuffer = unsafe {
            // safe because the surface is owned by the backend next to the
            // framebuffer
            Framebuffer::new(render_device.clone(), &clear_pass, &surface)?
        };
        let readback = HostCoherentBuffer::new(
            render_device.clone(),
            vk::BufferUsageFlags::TRANSFER_DST,
            width as usize * height as usize * 4,
        )?;

        let surface_image = surface.raw();
        submit.submit_and_wait(|device, command_buffer| unsafe {
            texture::cmd_transition(
                device,
                command_buffer,
                surface_image,
                LayoutTransition::sampled_to_transfer_dst(
                    vk::ImageLayout::UNDEFINED,
                ),
            );
            device.cmd_clear_color_image(
                command_buffer,
                surface_image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &vk::ClearColorValue {
                    float32: [0.0, 0.0, 0.0, 1.0],
                },
                &[texture::full_subresource_range()],
            );
            texture::cmd_transition(
                device,
                command_buffer,
                surface_image,
                LayoutTransition::transfer_to_attachment(
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                ),
            );
        })?;

        let mut backend = Self {
            descriptor,
            shader_directory: shader_directory.into(),
            float_textures,
            data_locations: None,
            programs: vec![],
            textures: vec![],
            descriptors,
            surface_framebuffer,
            surface,
            readback,
            sampler,
            layout,
            state_pass,
            clear_pass,
            load_pass,
            submit,
            render_device,
        };
        backend.present()?;
        Ok(backend)
    }

    fn texture(
        &self,
        handle: TextureHandle,
    ) -> Result<&VulkanTexture, BackendError> {
        self.textures
            .get(handle.0 as usize)
            .ok_or(BackendError::UnknownTexture(handle))
    }

    fn program(&self, handle: ProgramHandle) -> Result<&Program, BackendError> {
        self.programs
            .get(handle.0 as usize)
            .ok_or(BackendError::UnknownProgram(handle))
    }

    fn descriptor_set(
        &mut self,
        key: BindingKey,
    ) -> Result<vk::DescriptorSet, BackendError> {
        let state_view = self.texture(key.state)?.texture().view();
        let atlas_view = self.texture(key.atlas)?.texture().view();
        Ok(self.descriptors.get_or_write(
            key,
            &self.layout,
            self.sampler.raw(),
            (state_view, atlas_view),
        )?)
    }

    /// Upload tightly packed RGBA8 pixels into a new atlas texture.
    fn create_atlas_texture(
        &self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<Texture, BackendError> {
        let atlas = Texture::new(
            self.render_device.clone(),
            vk::Extent2D { width, height },
            texture::COLOR_FORMAT,
            vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
        )?;
        let staging = HostCoherentBuffer::new_with_data(
            self.render_device.clone(),
            vk::BufferUsageFlags::TRANSFER_SRC,
            pixels,
        )?;
        let image = atlas.raw();
        let region = TexelRegion {
            x: 0,
            y: 0,
            width,
            height,
        };
        self.submit.submit_and_wait(|device, command_buffer| unsafe {
            cmd_upload_region(
                device,
                command_buffer,
                staging.raw(),
                image,
                region,
                vk::ImageLayout::UNDEFINED,
            );
        })?;
        Ok(atlas)
    }
}

impl GraphicsBackend for VulkanBackend {
    fn describe(&self) -> String {
        let (width, height) = self.descriptor.physical_size();
        format!(
            "Vulkan on {} ({}x{} offscreen surface)",
            self.render_device.device_name(),
            width,
            height
        )
    }

    fn supports_float_textures(&self) -> bool {
        self.float_textures
    }

    fn surface(&self) -> SurfaceDescriptor {
        self.descriptor
    }

    fn create_state_texture(
        &mut self,
        side: u32,
    ) -> Result<TextureHandle, BackendError> {
        if !self.float_textures {
            return Err(BackendError::Unsupported(format!(
                "{:?} cannot be both sampled and rendered into on {}",
                texture::STATE_FORMAT,
                self.render_device.device_name()
            )));
        }
        let texture = Texture::new(
            self.render_device.clone(),
            vk::Extent2D {
                width: side,
                height: side,
            },
            texture::STATE_FORMAT,
            vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::SAMPLED
                | vk::ImageUsageFlags::TRANSFER_DST,
        )?;
        let image = texture.raw();
        self.submit.submit_and_wait(|device, command_buffer| unsafe {
            texture::cmd_transition(
                device,
                command_buffer,
                image,
                LayoutTransition::sampled_to_transfer_dst(
                    vk::ImageLayout::UNDEFINED,
                ),
            );
            device.cmd_clear_color_image(
                command_buffer,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &vk::ClearColorValue {
                    float32: [0.0; 4],
                },
                &[texture::full_subresource_range()],
            );
            texture::cmd_transition(
                device,
                command_buffer,
                image,
                LayoutTransition::transfer_dst_to_sampled(),
            );
        })?;
        let framebuffer = unsafe {
            // safe because the framebuffer is stored with its texture
            Framebuffer::new(
                self.render_device.clone(),
                &self.state_pass,
                &texture,
            )?
        };
        self.textures.push(VulkanTexture::State {
            framebuffer,
            texture,
        });
        Ok(TextureHandle((self.textures.len() - 1) as u32))
    }

    fn create_glyph_atlas(&mut self) -> Result<TextureHandle, BackendError> {
        let atlas = self.create_atlas_texture(1, 1, &[0, 0, 0, 0])?;
        self.textures.push(VulkanTexture::Atlas(atlas));
        Ok(TextureHandle((self.textures.len() - 1) as u32))
    }

    fn upload_glyph_atlas(
        &mut self,
        atlas: TextureHandle,
        image: &RgbaImage,
    ) -> Result<(), BackendError> {
        if !matches!(self.texture(atlas)?, VulkanTexture::Atlas(_)) {
            return Err(BackendError::UnknownTexture(atlas));
        }
        let (width, height) = image.dimensions();
        let replacement =
            self.create_atlas_texture(width, height, image.as_raw())?;
        self.descriptors.invalidate(atlas)?;
        self.textures[atlas.0 as usize] = VulkanTexture::Atlas(replacement);
        Ok(())
    }

    fn write_region(
        &mut self,
        texture: TextureHandle,
        region: TexelRegion,
        texels: &[Particle],
    ) -> Result<(), BackendError> {
        let VulkanTexture::State { texture: state, .. } =
            self.texture(texture)?
        else {
            return Err(BackendError::UnknownTexture(texture));
        };
        let extent = state.extent();
        if !region.fits_within(extent.width, extent.height) {
            return Err(BackendError::RegionOutOfBounds {
                region,
                width: extent.width,
                height: extent.height,
            });
        }
        if texels.len() != region.texel_count() {
            return Err(BackendError::TexelCountMismatch {
                region,
                expected: region.texel_count(),
                actual: texels.len(),
            });
        }
        if region.texel_count() == 0 {
            return Ok(());
        }

        let staging = HostCoherentBuffer::new_with_data(
            self.render_device.clone(),
            vk::BufferUsageFlags::TRANSFER_SRC,
            texels,
        )?;
        let image = state.raw();
        self.submit.submit_and_wait(|device, command_buffer| unsafe {
            cmd_upload_region(
                device,
                command_buffer,
                staging.raw(),
                image,
                region,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            );
        })?;
        log::trace!("Uploaded {:?} into {:?}", region, texture);
        Ok(())
    }

    fn upload_data_locations(
        &mut self,
        locations: &[DataLocation],
    ) -> Result<(), BackendError> {
        self.data_locations = Some(HostCoherentBuffer::new_with_data(
            self.render_device.clone(),
            vk::BufferUsageFlags::VERTEX_BUFFER,
            locations,
        )?);
        Ok(())
    }

    fn create_program(
        &mut self,
        kind: ProgramKind,
    ) -> Result<ProgramHandle, BackendError> {
        let render_pass = match kind {
            ProgramKind::Physics | ProgramKind::Copy => {
                if !self.float_textures {
                    return Err(BackendError::Unsupported(format!(
                        "the {:?} program renders into {:?} textures",
                        kind,
                        texture::STATE_FORMAT
                    )));
                }
                &self.state_pass
            }
            ProgramKind::Render => &self.clear_pass,
            ProgramKind::Debug => &self.load_pass,
        };
        let program = Program::new(
            self.render_device.clone(),
            kind,
            &self.shader_directory,
            &self.layout,
            render_pass,
        )?;
        self.programs.push(program);
        Ok(ProgramHandle((self.programs.len() - 1) as u32))
    }

    fn run_texture_pass(
        &mut self,
        pass: &TexturePass,
    ) -> Result<(), BackendError> {
        let program = self.program(pass.program)?;
        let kind = program.kind();
        let pipeline = program.raw();
        if !kind.targets_state_texture() {
            return Err(BackendError::ProgramCreation {
                program: kind,
                reason: "the program does not render into a state texture"
                    .to_owned(),
            });
        }
        if pass.source == pass.target {
            return Err(BackendError::FeedbackLoop(pass.target));
        }
        let source_extent = self.texture(pass.source)?.texture().extent();
        let VulkanTexture::State {
            texture: target, ..
        } = self.texture(pass.target)?
        else {
            return Err(BackendError::UnknownTexture(pass.target));
        };
        if source_extent != target.extent() {
            return Err(BackendError::RegionOutOfBounds {
                region: TexelRegion {
                    x: 0,
                    y: 0,
                    width: source_extent.width,
                    height: source_extent.height,
                },
                width: target.extent().width,
                height: target.extent().height,
            });
        }

        let descriptor_set = self.descriptor_set(BindingKey {
            state: pass.source,
            atlas: pass.source,
        })?;
        let VulkanTexture::State { framebuffer, .. } =
            &self.textures[pass.target.0 as usize]
        else {
            return Err(BackendError::UnknownTexture(pass.target));
        };
        let state_pass = &self.state_pass;
        let layout = &self.layout;
        self.submit.submit_and_wait(|device, command_buffer| unsafe {
            state_pass.cmd_begin(command_buffer, framebuffer);
            device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
            device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout.raw(),
                0,
                &[descriptor_set],
                &[],
            );
            layout.cmd_push_uniforms(command_buffer, &pass.uniforms);
            device.cmd_draw(command_buffer, 4, 1, 0, 0);
            device.cmd_end_render_pass(command_buffer);
        })?;
        Ok(())
    }

    fn draw_particles(
        &mut self,
        draw: &ParticleDraw,
    ) -> Result<(), BackendError> {
        let pipeline = self.program(draw.program)?.raw();
        let descriptor_set = self.descriptor_set(BindingKey {
            state: draw.state,
            atlas: draw.atlas,
        })?;
        let vertices = self
            .data_locations
            .as_ref()
            .map(|buffer| {
                let count =
                    (draw.particle_count as usize).min(buffer.element_count());
                (buffer.raw(), count as u32)
            })
            .filter(|(_, count)| *count > 0);

        let clear_pass = &self.clear_pass;
        let framebuffer = &self.surface_framebuffer;
        let layout = &self.layout;
        self.submit.submit_and_wait(|device, command_buffer| unsafe {
            clear_pass.cmd_begin(command_buffer, framebuffer);
            if let Some((vertex_buffer, count)) = vertices {
                device.cmd_bind_pipeline(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    pipeline,
                );
                device.cmd_bind_descriptor_sets(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    layout.raw(),
                    0,
                    &[descriptor_set],
                    &[],
                );
                layout.cmd_push_uniforms(command_buffer, &draw.uniforms);
                device.cmd_bind_vertex_buffers(
                    command_buffer,
                    0,
                    &[vertex_buffer],
                    &[0],
                );
                device.cmd_draw(command_buffer, count, 1, 0, 0);
            }
            device.cmd_end_render_pass(command_buffer);
        })?;
        Ok(())
    }

    fn draw_overlay(
        &mut self,
        draw: &OverlayDraw,
    ) -> Result<(), BackendError> {
        let pipeline = self.program(draw.program)?.raw();
        let descriptor_set = self.descriptor_set(BindingKey {
            state: draw.source,
            atlas: draw.source,
        })?;
        if draw.viewport.width <= 0.0 || draw.viewport.height <= 0.0 {
            return Ok(());
        }

        let extent = self.surface.extent();
        let scissor_x = draw.viewport.x.max(0.0).min(extent.width as f32);
        let scissor_y = draw.viewport.y.max(0.0).min(extent.height as f32);
        let scissor = vk::Rect2D {
            offset: vk::Offset2D {
                x: scissor_x as i32,
                y: scissor_y as i32,
            },
            extent: vk::Extent2D {
                width: ((draw.viewport.x + draw.viewport.width)
                    .min(extent.width as f32)
                    - scissor_x)
                    .max(0.0) as u32,
                height: ((draw.viewport.y + draw.viewport.height)
                    .min(extent.height as f32)
                    - scissor_y)
                    .max(0.0) as u32,
            },
        };
        let viewport = vk::Viewport {
            x: draw.viewport.x,
            y: draw.viewport.y,
            width: draw.viewport.width,
            height: draw.viewport.height,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        let load_pass = &self.load_pass;
        let framebuffer = &self.surface_framebuffer;
        let layout = &self.layout;
        self.submit.submit_and_wait(|device, command_buffer| unsafe {
            load_pass.cmd_begin(command_buffer, framebuffer);
            render_target::cmd_set_viewport(
                device,
                command_buffer,
                viewport,
                scissor,
            );
            device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
            device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout.raw(),
                0,
                &[descriptor_set],
                &[],
            );
            layout.cmd_push_uniforms(command_buffer, &draw.uniforms);
            device.cmd_draw(command_buffer, 4, 1, 0, 0);
            device.cmd_end_render_pass(command_buffer);
        })?;
        Ok(())
    }

    fn present(&mut self) -> Result<(), BackendError> {
        let image = self.surface.raw();
        let extent = self.surface.extent();
        let readback = self.readback.raw();
        self.submit.submit_and_wait(|device, command_buffer| unsafe {
            texture::cmd_transition(
                device,
                command_buffer,
                image,
                LayoutTransition::attachment_to_transfer_src(),
            );
            device.cmd_copy_image_to_buffer(
                command_buffer,
                image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                readback,
                &[whole_image_copy(extent)],
            );
            texture::cmd_transition(
                device,
                command_buffer,
                image,
                LayoutTransition::transfer_to_attachment(
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                ),
            );
        })?;
        Ok(())
    }

    fn read_surface(&mut self) -> Result<RgbaImage, BackendError> {
        let extent = self.surface.extent();
        let pixels = self.readback.as_slice().to_vec();
        let actual = pixels.len();
        RgbaImage::from_raw(extent.width, extent.height, pixels).ok_or_else(
            || {
                VulkanError::SurfaceReadbackSize {
                    expected: extent.width as usize
                        * extent.height as usize
                        * 4,
                    actual,
                }
                .into()
            },
        )
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        if let Err(err) = self.render_device.wait_idle() {
            log::error!("Unable to idle the device before teardown: {}", err);
        }
    }
}

/// Failing to reach a device at all is reported as a context creation
/// failure. Anything later is a plain driver error.
fn context_creation_error(err: VulkanError) -> BackendError {
    match err {
        VulkanError::UnableToLoadVulkan(_)
        | VulkanError::UnableToCreateInstance(_)
        | VulkanError::UnableToListPhysicalDevices(_)
        | VulkanError::NoSuitableDevice
        | VulkanError::UnableToCreateLogicalDevice(_) => {
            BackendError::ContextCreation(err.to_string())
        }
        other => BackendError::Vulkan(other),
    }
}

fn whole_image_copy(extent: vk::Extent2D) -> vk::BufferImageCopy {
    region_copy(TexelRegion {
        x: 0,
        y: 0,
        width: extent.width,
        height: extent.height,
    })
}

fn region_copy(region: TexelRegion) -> vk::BufferImageCopy {
    vk::BufferImageCopy {
        buffer_offset: 0,
        buffer_row_length: 0,
        buffer_image_height: 0,
        image_subresource: vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        },
        image_offset: vk::Offset3D {
            x: region.x as i32,
            y: region.y as i32,
            z: 0,
        },
        image_extent: vk::Extent3D {
            width: region.width,
            height: region.height,
            depth: 1,
        },
    }
}

/// Copy a tightly packed staging buffer into `region` of `image`, leaving
/// the image ready for sampling.
///
/// # Safety
///
/// Unsafe because the buffer and image must outlive the command buffer's
/// execution.
unsafe fn cmd_upload_region(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    staging: vk::Buffer,
    image: vk::Image,
    region: TexelRegion,
    current_layout: vk::ImageLayout,
) {
    texture::cmd_transition(
        device,
        command_buffer,
        image,
        LayoutTransition::sampled_to_transfer_dst(current_layout),
    );
    device.cmd_copy_buffer_to_image(
        command_buffer,
        staging,
        image,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        &[region_copy(region)],
    );
    texture::cmd_transition(
        device,
        command_buffer,
        image,
        LayoutTransition::transfer_dst_to_sampled(),
    );
}
