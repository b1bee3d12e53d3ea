use {
    super::{program::ProgramLayout, RenderDevice, VulkanError},
    crate::backend::TextureHandle,
    ash::vk,
    std::{collections::HashMap, sync::Arc},
};

const MAX_SETS: u32 = 64;

/// The textures bound by one descriptor set: the state texture at binding 0
/// and the glyph atlas at binding 1.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BindingKey {
    pub state: TextureHandle,
    pub atlas: TextureHandle,
}

/// Descriptor sets keyed by the textures they bind.
///
/// A simulation only ever binds a handful of texture combinations, so sets
/// are written once and reused every frame. Sets referencing a texture are
/// freed when that texture is replaced.
pub struct DescriptorCache {
    sets: HashMap<BindingKey, vk::DescriptorSet>,
    pool: vk::DescriptorPool,
    render_device: Arc<RenderDevice>,
}

impl DescriptorCache {
    pub fn new(render_device: Arc<RenderDevice>) -> Result<Self, VulkanError> {
        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: MAX_SETS * 2,
        }];
        let create_info = vk::DescriptorPoolCreateInfo {
            flags: vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET,
            max_sets: MAX_SETS,
            pool_size_count: pool_sizes.len() as u32,
            p_pool_sizes: pool_sizes.as_ptr(),
            ..Default::default()
        };
        let pool = unsafe {
            render_device
                .logical_device()
                .create_descriptor_pool(&create_info, None)
                .map_err(VulkanError::UnableToCreateDescriptorPool)?
        };
        Ok(Self {
            sets: HashMap::new(),
            pool,
            render_device,
        })
    }

    /// Get the descriptor set for `key`, writing a new one with
    /// `image_views` (state view, atlas view) when none exists yet.
    pub fn get_or_write(
        &mut self,
        key: BindingKey,
        layout: &ProgramLayout,
        sampler: vk::Sampler,
        image_views: (vk::ImageView, vk::ImageView),
    ) -> Result<vk::DescriptorSet, VulkanError> {
        if let Some(set) = self.sets.get(&key) {
            return Ok(*set);
        }

        let device = self.render_device.logical_device();
        let set_layouts = [layout.descriptor_set_layout()];
        let allocate_info = vk::DescriptorSetAllocateInfo {
            descriptor_pool: self.pool,
            descriptor_set_count: set_layouts.len() as u32,
            p_set_layouts: set_layouts.as_ptr(),
            ..Default::default()
        };
        let set = unsafe {
            device
                .allocate_descriptor_sets(&allocate_info)
                .map_err(VulkanError::UnableToAllocateDescriptorSet)?[0]
        };

        let image_infos = [
            vk::DescriptorImageInfo {
                sampler,
                image_view: image_views.0,
                image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            },
            vk::DescriptorImageInfo {
                sampler,
                image_view: image_views.1,
                image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            },
        ];
        let writes: Vec<vk::WriteDescriptorSet> = image_infos
            .iter()
            .enumerate()
            .map(|(binding, image_info)| vk::WriteDescriptorSet {
                dst_set: set,
                dst_binding: binding as u32,
                dst_array_element: 0,
                descriptor_count: 1,
                descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                p_image_info: image_info,
                ..Default::default()
            })
            .collect();
        unsafe { device.update_descriptor_sets(&writes, &[]) };

        self.sets.insert(key, set);
        Ok(set)
    }

    /// Free every set which binds `texture`.
    ///
    /// The caller must ensure none of the sets are in use by the GPU.
    pub fn invalidate(
        &mut self,
        texture: TextureHandle,
    ) -> Result<(), VulkanError> {
        let stale: Vec<BindingKey> = self
            .sets
            .keys()
            .filter(|key| key.state == texture || key.atlas == texture)
            .copied()
            .collect();
        if stale.is_empty() {
            return Ok(());
        }
        let stale_sets: Vec<vk::DescriptorSet> = stale
            .iter()
            .filter_map(|key| self.sets.remove(key))
            .collect();
        unsafe {
            self.render_device
                .logical_device()
                .free_descriptor_sets(self.pool, &stale_sets)
                .map_err(VulkanError::UnableToFreeDescriptorSet)
        }
    }
}

impl Drop for DescriptorCache {
    fn drop(&mut self) {
        unsafe {
            self.render_device
                .logical_device()
                .destroy_descriptor_pool(self.pool, None);
        }
    }
}
