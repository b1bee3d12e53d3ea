use {
    super::VulkanError,
    crate::logging::PrettyList,
    ash::vk,
    std::ffi::{c_char, CStr},
};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// The Vulkan instance, logical device and graphics queue.
///
/// There is no window surface. Everything this device renders goes into
/// images owned by the backend.
pub struct RenderDevice {
    queue: vk::Queue,
    queue_family_index: u32,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    device_name: String,
    large_points: bool,
    physical_device: vk::PhysicalDevice,
    logical_device: ash::Device,
    instance: ash::Instance,
    _entry: ash::Entry,
}

impl RenderDevice {
    /// Load the Vulkan library and create a logical device on the first
    /// physical device with a graphics queue. Discrete GPUs are preferred.
    pub fn new() -> Result<Self, VulkanError> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|err| VulkanError::UnableToLoadVulkan(err.to_string()))?;
        let instance = create_instance(&entry)?;
        let guarded_instance =
            scopeguard::guard(instance, |instance| unsafe {
                instance.destroy_instance(None);
            });

        let (physical_device, queue_family_index) =
            pick_physical_device(&guarded_instance)?;

        let properties = unsafe {
            guarded_instance.get_physical_device_properties(physical_device)
        };
        let device_name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "<unnamed device>".to_owned());
        let features = unsafe {
            guarded_instance.get_physical_device_features(physical_device)
        };
        let large_points = features.large_points == vk::TRUE;
        let memory_properties = unsafe {
            guarded_instance
                .get_physical_device_memory_properties(physical_device)
        };

        let queue_priorities = [1.0];
        let queue_create_infos = [vk::DeviceQueueCreateInfo {
            queue_family_index,
            queue_count: 1,
            p_queue_priorities: queue_priorities.as_ptr(),
            ..Default::default()
        }];
        let enabled_features = vk::PhysicalDeviceFeatures {
            large_points: features.large_points,
            ..Default::default()
        };
        let create_info = vk::DeviceCreateInfo {
            queue_create_info_count: queue_create_infos.len() as u32,
            p_queue_create_infos: queue_create_infos.as_ptr(),
            p_enabled_features: &enabled_features,
            ..Default::default()
        };
        let logical_device = unsafe {
            guarded_instance
                .create_device(physical_device, &create_info, None)
                .map_err(VulkanError::UnableToCreateLogicalDevice)?
        };
        let queue =
            unsafe { logical_device.get_device_queue(queue_family_index, 0) };

        log::info!(
            "Created a headless Vulkan device on {:?} (large points: {})",
            device_name,
            large_points
        );

        Ok(Self {
            queue,
            queue_family_index,
            memory_properties,
            device_name,
            large_points,
            physical_device,
            logical_device,
            instance: scopeguard::ScopeGuard::into_inner(guarded_instance),
            _entry: entry,
        })
    }

    pub fn logical_device(&self) -> &ash::Device {
        &self.logical_device
    }

    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// True when point sprites larger than one pixel are supported.
    pub fn large_points(&self) -> bool {
        self.large_points
    }

    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// True when images of `format` can be both sampled and rendered into
    /// with optimal tiling.
    pub fn supports_render_and_sample(&self, format: vk::Format) -> bool {
        let properties = unsafe {
            self.instance.get_physical_device_format_properties(
                self.physical_device,
                format,
            )
        };
        properties.optimal_tiling_features.contains(
            vk::FormatFeatureFlags::COLOR_ATTACHMENT
                | vk::FormatFeatureFlags::SAMPLED_IMAGE,
        )
    }

    /// Stall the thread until the GPU is done with all operations.
    pub fn wait_idle(&self) -> Result<(), VulkanError> {
        unsafe {
            self.logical_device
                .device_wait_idle()
                .map_err(VulkanError::UnableToWaitForDeviceToIdle)
        }
    }
}

impl Drop for RenderDevice {
    fn drop(&mut self) {
        unsafe {
            if let Err(err) = self.logical_device.device_wait_idle() {
                log::error!("Error while idling the device: {:?}", err);
            }
            self.logical_device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

fn create_instance(entry: &ash::Entry) -> Result<ash::Instance, VulkanError> {
    let available_layers = unsafe {
        entry
            .enumerate_instance_layer_properties()
            .map_err(VulkanError::UnableToListAvailableLayers)?
    };
    let layer_names: Vec<String> = available_layers
        .iter()
        .filter_map(|layer| layer.layer_name_as_c_str().ok())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();
    log::debug!("{}", PrettyList::titled("Available layers", &layer_names));

    let validation_available = layer_names
        .iter()
        .any(|name| name.as_bytes() == VALIDATION_LAYER.to_bytes());
    let enabled_layers: Vec<*const c_char> =
        if cfg!(debug_assertions) && validation_available {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };
    log::debug!(
        "Validation layer enabled: {}",
        !enabled_layers.is_empty()
    );

    let app_info = vk::ApplicationInfo {
        p_application_name: c"glyph spiral".as_ptr(),
        p_engine_name: c"no engine".as_ptr(),
        application_version: vk::make_api_version(0, 1, 0, 0),
        engine_version: vk::make_api_version(0, 1, 0, 0),
        api_version: vk::make_api_version(0, 1, 1, 0),
        ..Default::default()
    };
    let create_info = vk::InstanceCreateInfo {
        p_application_info: &app_info,
        pp_enabled_layer_names: enabled_layers.as_ptr(),
        enabled_layer_count: enabled_layers.len() as u32,
        ..Default::default()
    };
    unsafe {
        entry
            .create_instance(&create_info, None)
            .map_err(VulkanError::UnableToCreateInstance)
    }
}

fn pick_physical_device(
    instance: &ash::Instance,
) -> Result<(vk::PhysicalDevice, u32), VulkanError> {
    let physical_devices = unsafe {
        instance
            .enumerate_physical_devices()
            .map_err(VulkanError::UnableToListPhysicalDevices)?
    };

    let mut candidates: Vec<(vk::PhysicalDevice, u32, bool)> = physical_devices
        .into_iter()
        .filter_map(|physical_device| {
            let queue_families = unsafe {
                instance.get_physical_device_queue_family_properties(
                    physical_device,
                )
            };
            let graphics_family = queue_families.iter().position(|family| {
                family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            })?;
            let properties = unsafe {
                instance.get_physical_device_properties(physical_device)
            };
            let discrete = properties.device_type
                == vk::PhysicalDeviceType::DISCRETE_GPU;
            Some((physical_device, graphics_family as u32, discrete))
        })
        .collect();

    // discrete devices first
    candidates.sort_by_key(|(_, _, discrete)| !discrete);
    candidates
        .first()
        .map(|(physical_device, family, _)| (*physical_device, *family))
        .ok_or(VulkanError::NoSuitableDevice)
}
