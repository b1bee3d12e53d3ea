use {
    super::{Allocation, RenderDevice, VulkanError},
    ash::vk,
    std::{marker::PhantomData, sync::Arc},
};

/// A Vulkan buffer which is mapped to host-coherent memory.
pub struct HostCoherentBuffer<T> {
    element_count: usize,
    buffer: vk::Buffer,
    allocation: Allocation,
    render_device: Arc<RenderDevice>,
    _phantom_data: PhantomData<T>,
}

impl<T> HostCoherentBuffer<T>
where
    T: Copy,
{
    /// Create a new buffer big enough for `len` elements of T.
    pub fn new(
        render_device: Arc<RenderDevice>,
        usage: vk::BufferUsageFlags,
        len: usize,
    ) -> Result<Self, VulkanError> {
        let size_in_bytes = (len.max(1) * std::mem::size_of::<T>()) as u64;
        let create_info = vk::BufferCreateInfo {
            size: size_in_bytes,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let device = render_device.logical_device();
        let buffer = unsafe {
            device
                .create_buffer(&create_info, None)
                .map_err(VulkanError::UnableToCreateBuffer)?
        };
        let buffer = scopeguard::guard(buffer, |buffer| unsafe {
            device.destroy_buffer(buffer, None);
        });

        let mut allocation = unsafe {
            let requirements = device.get_buffer_memory_requirements(*buffer);
            render_device.allocate_memory(
                requirements,
                vk::MemoryPropertyFlags::HOST_VISIBLE
                    | vk::MemoryPropertyFlags::HOST_COHERENT,
            )?
        };

        let bound = unsafe {
            device
                .bind_buffer_memory(*buffer, allocation.device_memory(), 0)
                .map_err(VulkanError::UnableToBindBufferMemory)
                .and_then(|_| allocation.map(&render_device))
        };
        if let Err(err) = bound {
            unsafe { render_device.free_memory(&mut allocation) };
            return Err(err);
        }

        let buffer = scopeguard::ScopeGuard::into_inner(buffer);
        Ok(Self {
            element_count: len,
            buffer,
            allocation,
            render_device,
            _phantom_data: PhantomData,
        })
    }

    /// Create a buffer holding a copy of `data`.
    pub fn new_with_data(
        render_device: Arc<RenderDevice>,
        usage: vk::BufferUsageFlags,
        data: &[T],
    ) -> Result<Self, VulkanError> {
        let mut buffer = Self::new(render_device, usage, data.len())?;
        buffer.as_slice_mut().copy_from_slice(data);
        Ok(buffer)
    }

    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// The buffer contents.
    ///
    /// The caller is responsible for making sure the GPU is not writing to
    /// the buffer. Every submission in this backend waits for completion, so
    /// that holds between backend calls.
    pub fn as_slice(&self) -> &[T] {
        match self.allocation.mapped_ptr() {
            // safe because the memory stays mapped for the buffer's lifetime
            // and holds at least element_count values
            Some(ptr) => unsafe {
                std::slice::from_raw_parts(ptr as *const T, self.element_count)
            },
            None => &[],
        }
    }

    pub fn as_slice_mut(&mut self) -> &mut [T] {
        match self.allocation.mapped_ptr() {
            // safe for the same reasons as as_slice
            Some(ptr) => unsafe {
                std::slice::from_raw_parts_mut(ptr as *mut T, self.element_count)
            },
            None => &mut [],
        }
    }

    /// The raw Vulkan buffer handle. Ownership is not transferred.
    pub fn raw(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size_in_bytes(&self) -> usize {
        self.element_count * std::mem::size_of::<T>()
    }
}

impl<T> Drop for HostCoherentBuffer<T> {
    /// The application must ensure no GPU operations reference this buffer
    /// when it is dropped.
    fn drop(&mut self) {
        unsafe {
            self.render_device
                .logical_device()
                .destroy_buffer(self.buffer, None);
            self.render_device.free_memory(&mut self.allocation);
        }
    }
}
