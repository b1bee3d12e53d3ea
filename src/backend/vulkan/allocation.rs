use {
    super::{RenderDevice, VulkanError},
    ash::vk,
    std::ffi::c_void,
};

/// An allocated chunk of GPU memory.
///
/// Every allocation is its own `vk::DeviceMemory` object. The number of
/// resources in this application is small and fixed, so there is no need to
/// sub-allocate.
pub struct Allocation {
    device_memory: vk::DeviceMemory,
    size_in_bytes: vk::DeviceSize,
    cpu_mapped_ptr: Option<*mut c_void>,
}

impl Allocation {
    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes as usize
    }

    /// The raw device memory handle. Ownership is not transferred.
    pub fn device_memory(&self) -> vk::DeviceMemory {
        self.device_memory
    }

    /// Map the whole allocation into host memory.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///  - only memory allocated with HOST_VISIBLE can be mapped
    ///  - the caller must call unmap before the allocation is freed
    pub unsafe fn map(
        &mut self,
        device: &RenderDevice,
    ) -> Result<(), VulkanError> {
        let ptr = device
            .logical_device()
            .map_memory(
                self.device_memory,
                0,
                vk::WHOLE_SIZE,
                vk::MemoryMapFlags::empty(),
            )
            .map_err(VulkanError::UnableToMapDeviceMemory)?;
        self.cpu_mapped_ptr = Some(ptr);
        Ok(())
    }

    /// Unmap the host pointer. No-op when the memory is not mapped.
    pub fn unmap(&mut self, device: &RenderDevice) {
        if self.cpu_mapped_ptr.take().is_some() {
            // safe because this only happens when the memory is mapped
            unsafe { device.logical_device().unmap_memory(self.device_memory) }
        }
    }

    /// The mapped pointer, if the allocation has been mapped.
    pub fn mapped_ptr(&self) -> Option<*mut c_void> {
        self.cpu_mapped_ptr
    }
}

impl RenderDevice {
    /// Allocate memory which satisfies the given requirements and has all of
    /// the requested property flags.
    ///
    /// # Safety
    ///
    /// Unsafe because the caller must free the allocation with
    /// [RenderDevice::free_memory] before the device is dropped.
    pub unsafe fn allocate_memory(
        &self,
        requirements: vk::MemoryRequirements,
        flags: vk::MemoryPropertyFlags,
    ) -> Result<Allocation, VulkanError> {
        let memory_properties = self.memory_properties();
        let memory_type_index = memory_properties.memory_types
            [..memory_properties.memory_type_count as usize]
            .iter()
            .enumerate()
            .find(|(index, memory_type)| {
                let type_bit = 1 << index;
                requirements.memory_type_bits & type_bit != 0
                    && memory_type.property_flags.contains(flags)
            })
            .map(|(index, _)| index as u32)
            .ok_or(VulkanError::NoSuitableMemoryType(flags))?;

        let allocate_info = vk::MemoryAllocateInfo {
            allocation_size: requirements.size,
            memory_type_index,
            ..Default::default()
        };
        let device_memory = self
            .logical_device()
            .allocate_memory(&allocate_info, None)
            .map_err(VulkanError::UnableToAllocateDeviceMemory)?;
        Ok(Allocation {
            device_memory,
            size_in_bytes: requirements.size,
            cpu_mapped_ptr: None,
        })
    }

    /// # Safety
    ///
    /// Unsafe because the caller must ensure the memory is no longer in use
    /// by any resource.
    pub unsafe fn free_memory(&self, allocation: &mut Allocation) {
        allocation.unmap(self);
        self.logical_device()
            .free_memory(allocation.device_memory, None);
    }
}
