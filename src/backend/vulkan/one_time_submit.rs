use {
    super::{RenderDevice, VulkanError},
    ash::vk,
    std::sync::Arc,
};

/// A command pool with a single primary command buffer and a fence.
///
/// Every pass in the Vulkan backend is recorded, submitted, and waited on
/// before the backend call returns, so no GPU work is in flight between
/// calls.
pub struct OneTimeSubmitPool {
    fence: vk::Fence,
    command_buffer: vk::CommandBuffer,
    pool: vk::CommandPool,
    render_device: Arc<RenderDevice>,
}

impl OneTimeSubmitPool {
    pub fn new(render_device: Arc<RenderDevice>) -> Result<Self, VulkanError> {
        let device = render_device.logical_device();
        let pool = unsafe {
            let create_info = vk::CommandPoolCreateInfo {
                flags: vk::CommandPoolCreateFlags::TRANSIENT,
                queue_family_index: render_device.queue_family_index(),
                ..Default::default()
            };
            device
                .create_command_pool(&create_info, None)
                .map_err(VulkanError::UnableToCreateCommandPool)?
        };
        let pool = scopeguard::guard(pool, |pool| unsafe {
            device.destroy_command_pool(pool, None);
        });

        let command_buffer = unsafe {
            let allocate_info = vk::CommandBufferAllocateInfo {
                command_pool: *pool,
                level: vk::CommandBufferLevel::PRIMARY,
                command_buffer_count: 1,
                ..Default::default()
            };
            device
                .allocate_command_buffers(&allocate_info)
                .map_err(VulkanError::UnableToAllocateCommandBuffers)?[0]
        };
        let fence = unsafe {
            device
                .create_fence(&vk::FenceCreateInfo::default(), None)
                .map_err(VulkanError::UnableToCreateFence)?
        };

        let pool = scopeguard::ScopeGuard::into_inner(pool);
        Ok(Self {
            fence,
            command_buffer,
            pool,
            render_device,
        })
    }

    /// Record commands with `record`, submit them to the graphics queue, and
    /// block until they complete.
    pub fn submit_and_wait<Func, T>(&self, record: Func) -> Result<T, VulkanError>
    where
        Func: FnOnce(&ash::Device, vk::CommandBuffer) -> T,
    {
        let device = self.render_device.logical_device();
        unsafe {
            device
                .reset_command_pool(self.pool, vk::CommandPoolResetFlags::empty())
                .map_err(VulkanError::UnableToResetCommandPool)?;

            let begin_info = vk::CommandBufferBeginInfo {
                flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
                ..Default::default()
            };
            device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(VulkanError::UnableToBeginCommandBuffer)?;

            let result = record(device, self.command_buffer);

            device
                .end_command_buffer(self.command_buffer)
                .map_err(VulkanError::UnableToEndCommandBuffer)?;

            let submit_info = vk::SubmitInfo {
                command_buffer_count: 1,
                p_command_buffers: &self.command_buffer,
                ..Default::default()
            };
            device
                .queue_submit(
                    self.render_device.queue(),
                    &[submit_info],
                    self.fence,
                )
                .map_err(VulkanError::UnableToSubmitCommands)?;
            device
                .wait_for_fences(&[self.fence], true, u64::MAX)
                .map_err(VulkanError::UnexpectedFenceWaitError)?;
            device
                .reset_fences(&[self.fence])
                .map_err(VulkanError::UnexpectedFenceResetError)?;

            Ok(result)
        }
    }
}

impl Drop for OneTimeSubmitPool {
    fn drop(&mut self) {
        unsafe {
            let device = self.render_device.logical_device();
            device.destroy_fence(self.fence, None);
            device.destroy_command_pool(self.pool, None);
        }
    }
}
