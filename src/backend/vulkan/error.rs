use {ash::vk, thiserror::Error};

#[derive(Debug, Error)]
pub enum VulkanError {
    #[error("Unable to load the Vulkan library: {}", .0)]
    UnableToLoadVulkan(String),

    #[error("Unable to get the available Vulkan layers {:?}", .0)]
    UnableToListAvailableLayers(#[source] vk::Result),

    #[error("Unable to create a Vulkan instance {:?}", .0)]
    UnableToCreateInstance(#[source] vk::Result),

    #[error("Unable to list the physical devices {:?}", .0)]
    UnableToListPhysicalDevices(#[source] vk::Result),

    #[error("No physical device has a graphics queue")]
    NoSuitableDevice,

    #[error("Unable to create the logical device {:?}", .0)]
    UnableToCreateLogicalDevice(#[source] vk::Result),

    #[error("No device memory type supports {:?}", .0)]
    NoSuitableMemoryType(vk::MemoryPropertyFlags),

    #[error("Unable to allocate device memory {:?}", .0)]
    UnableToAllocateDeviceMemory(#[source] vk::Result),

    #[error("Unable to map device memory {:?}", .0)]
    UnableToMapDeviceMemory(#[source] vk::Result),

    #[error("Unable to create a buffer {:?}", .0)]
    UnableToCreateBuffer(#[source] vk::Result),

    #[error("Unable to bind memory to a buffer {:?}", .0)]
    UnableToBindBufferMemory(#[source] vk::Result),

    #[error("Unable to create an image {:?}", .0)]
    UnableToCreateImage(#[source] vk::Result),

    #[error("Unable to bind memory to an image {:?}", .0)]
    UnableToBindImageMemory(#[source] vk::Result),

    #[error("Unable to create an image view {:?}", .0)]
    UnableToCreateImageView(#[source] vk::Result),

    #[error("Unable to create a sampler {:?}", .0)]
    UnableToCreateSampler(#[source] vk::Result),

    #[error("Unable to create a command pool {:?}", .0)]
    UnableToCreateCommandPool(#[source] vk::Result),

    #[error("Unable to reset the command pool {:?}", .0)]
    UnableToResetCommandPool(#[source] vk::Result),

    #[error("Unable to allocate command buffers {:?}", .0)]
    UnableToAllocateCommandBuffers(#[source] vk::Result),

    #[error("Unable to begin the command buffer {:?}", .0)]
    UnableToBeginCommandBuffer(#[source] vk::Result),

    #[error("Unable to end the command buffer {:?}", .0)]
    UnableToEndCommandBuffer(#[source] vk::Result),

    #[error("Unable to submit commands to the queue {:?}", .0)]
    UnableToSubmitCommands(#[source] vk::Result),

    #[error("Unable to create a fence {:?}", .0)]
    UnableToCreateFence(#[source] vk::Result),

    #[error("Unexpected error while waiting for a fence {:?}", .0)]
    UnexpectedFenceWaitError(#[source] vk::Result),

    #[error("Unexpected error while resetting a fence {:?}", .0)]
    UnexpectedFenceResetError(#[source] vk::Result),

    #[error("Unable to create a render pass {:?}", .0)]
    UnableToCreateRenderPass(#[source] vk::Result),

    #[error("Unable to create a framebuffer {:?}", .0)]
    UnableToCreateFramebuffer(#[source] vk::Result),

    #[error("Unable to create a shader module {:?}", .0)]
    UnableToCreateShaderModule(#[source] vk::Result),

    #[error("Unable to create a descriptor set layout {:?}", .0)]
    UnableToCreateDescriptorSetLayout(#[source] vk::Result),

    #[error("Unable to create a descriptor pool {:?}", .0)]
    UnableToCreateDescriptorPool(#[source] vk::Result),

    #[error("Unable to allocate a descriptor set {:?}", .0)]
    UnableToAllocateDescriptorSet(#[source] vk::Result),

    #[error("Unable to free a descriptor set {:?}", .0)]
    UnableToFreeDescriptorSet(#[source] vk::Result),

    #[error("Unable to create a pipeline layout {:?}", .0)]
    UnableToCreatePipelineLayout(#[source] vk::Result),

    #[error("Unable to create a graphics pipeline {:?}", .0)]
    UnableToCreateGraphicsPipeline(#[source] vk::Result),

    #[error("Unable to wait for the device to idle {:?}", .0)]
    UnableToWaitForDeviceToIdle(#[source] vk::Result),

    #[error(
        "{} bytes were read back from the surface, expected {}",
        .actual,
        .expected
    )]
    SurfaceReadbackSize { expected: usize, actual: usize },
}
