use {
    super::{Allocation, RenderDevice, VulkanError},
    ash::vk,
    std::sync::Arc,
};

/// The format used for particle state textures.
pub const STATE_FORMAT: vk::Format = vk::Format::R32G32B32A32_SFLOAT;

/// The format used for the glyph atlas and the surface.
pub const COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// An owned 2D image, its memory, and a view of the whole image.
pub struct Texture {
    extent: vk::Extent2D,
    format: vk::Format,
    view: vk::ImageView,
    image: vk::Image,
    allocation: Allocation,
    render_device: Arc<RenderDevice>,
}

impl Texture {
    /// Create a device-local, single-mip, optimally tiled texture. The
    /// contents start undefined.
    pub fn new(
        render_device: Arc<RenderDevice>,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
    ) -> Result<Self, VulkanError> {
        let device = render_device.logical_device();
        let create_info = vk::ImageCreateInfo {
            image_type: vk::ImageType::TYPE_2D,
            format,
            extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            },
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        };
        let image = unsafe {
            device
                .create_image(&create_info, None)
                .map_err(VulkanError::UnableToCreateImage)?
        };
        let image = scopeguard::guard(image, |image| unsafe {
            device.destroy_image(image, None);
        });

        let mut allocation = unsafe {
            render_device.allocate_memory(
                device.get_image_memory_requirements(*image),
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )?
        };
        let view = unsafe {
            device
                .bind_image_memory(*image, allocation.device_memory(), 0)
                .map_err(VulkanError::UnableToBindImageMemory)
                .and_then(|_| {
                    let view_create_info = vk::ImageViewCreateInfo {
                        image: *image,
                        format,
                        view_type: vk::ImageViewType::TYPE_2D,
                        subresource_range: full_subresource_range(),
                        ..Default::default()
                    };
                    device
                        .create_image_view(&view_create_info, None)
                        .map_err(VulkanError::UnableToCreateImageView)
                })
        };
        let view = match view {
            Ok(view) => view,
            Err(err) => {
                unsafe { render_device.free_memory(&mut allocation) };
                return Err(err);
            }
        };

        let image = scopeguard::ScopeGuard::into_inner(image);
        Ok(Self {
            extent,
            format,
            view,
            image,
            allocation,
            render_device,
        })
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// The raw image handle. Ownership is not transferred.
    pub fn raw(&self) -> vk::Image {
        self.image
    }

    /// The raw view handle. Ownership is not transferred.
    pub fn view(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            let device = self.render_device.logical_device();
            device.destroy_image_view(self.view, None);
            device.destroy_image(self.image, None);
            self.render_device.free_memory(&mut self.allocation);
        }
    }
}

/// An owned nearest-neighbor sampler which clamps to the edge.
pub struct Sampler {
    sampler: vk::Sampler,
    render_device: Arc<RenderDevice>,
}

impl Sampler {
    pub fn new(render_device: Arc<RenderDevice>) -> Result<Self, VulkanError> {
        let create_info = vk::SamplerCreateInfo {
            mag_filter: vk::Filter::NEAREST,
            min_filter: vk::Filter::NEAREST,
            mipmap_mode: vk::SamplerMipmapMode::NEAREST,
            address_mode_u: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            address_mode_v: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            address_mode_w: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            max_lod: 0.0,
            ..Default::default()
        };
        let sampler = unsafe {
            render_device
                .logical_device()
                .create_sampler(&create_info, None)
                .map_err(VulkanError::UnableToCreateSampler)?
        };
        Ok(Self {
            sampler,
            render_device,
        })
    }

    pub fn raw(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.render_device
                .logical_device()
                .destroy_sampler(self.sampler, None);
        }
    }
}

pub fn full_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Record a layout transition for the whole image.
///
/// # Safety
///
/// Unsafe because the image must outlive the command buffer's execution.
pub unsafe fn cmd_transition(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    transition: LayoutTransition,
) {
    let barrier = vk::ImageMemoryBarrier {
        old_layout: transition.old_layout,
        new_layout: transition.new_layout,
        src_access_mask: transition.src_access,
        dst_access_mask: transition.dst_access,
        src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        image,
        subresource_range: full_subresource_range(),
        ..Default::default()
    };
    device.cmd_pipeline_barrier(
        command_buffer,
        transition.src_stage,
        transition.dst_stage,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        &[barrier],
    );
}

/// The parameters of one image memory barrier.
#[derive(Debug, Copy, Clone)]
pub struct LayoutTransition {
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

impl LayoutTransition {
    /// Make a resting sampled image writable by transfer commands.
    pub fn sampled_to_transfer_dst(old_layout: vk::ImageLayout) -> Self {
        Self {
            old_layout,
            new_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            src_access: vk::AccessFlags::SHADER_READ
                | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::FRAGMENT_SHADER
                | vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        }
    }

    /// Return a transfer destination to the resting sampled layout.
    pub fn transfer_dst_to_sampled() -> Self {
        Self {
            old_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::SHADER_READ,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::VERTEX_SHADER
                | vk::PipelineStageFlags::FRAGMENT_SHADER,
        }
    }

    /// Make the surface readable by a copy.
    pub fn attachment_to_transfer_src() -> Self {
        Self {
            old_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            new_layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            src_access: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            dst_access: vk::AccessFlags::TRANSFER_READ,
            src_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        }
    }

    /// Return the surface to the layout the render passes expect.
    pub fn transfer_to_attachment(old_layout: vk::ImageLayout) -> Self {
        Self {
            old_layout,
            new_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            src_access: vk::AccessFlags::TRANSFER_READ
                | vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::COLOR_ATTACHMENT_READ
                | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        }
    }
}
