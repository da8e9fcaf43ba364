// Vulkan context - Core GPU interface
//
// Responsibilities:
// - Instance creation (window-system extensions, optional validation)
// - Physical device selection (prefer discrete GPU)
// - Logical device + graphics queue creation
// - Descriptor pool and upload command pool shared with the GUI renderer

use anyhow::{Context, Result};
use ash::{vk, Entry};
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_char, CStr, CString};

use super::teardown::DeletionQueue;
use crate::error::StartupError;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
const PORTABILITY_SUBSET: &CStr = c"VK_KHR_portability_subset";

/// Descriptors reserved per descriptor type in the shared pool.
const DESCRIPTORS_PER_TYPE: u32 = 1000;

const POOL_DESCRIPTOR_TYPES: [vk::DescriptorType; 11] = [
    vk::DescriptorType::SAMPLER,
    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    vk::DescriptorType::SAMPLED_IMAGE,
    vk::DescriptorType::STORAGE_IMAGE,
    vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
    vk::DescriptorType::STORAGE_TEXEL_BUFFER,
    vk::DescriptorType::UNIFORM_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
    vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
    vk::DescriptorType::INPUT_ATTACHMENT,
];

/// Everything tied to the instance and logical device.
///
/// Handles are destroyed in reverse creation order when the context drops.
/// The shared descriptor pool is owned by its teardown step; nothing in the
/// GUI path allocates from it.
pub struct GpuContext {
    pub entry: Entry,
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub queue_family: u32,
    pub device: ash::Device,
    pub queue: vk::Queue,
    /// Pool for one-shot transfer work such as the font atlas upload.
    pub upload_pool: vk::CommandPool,
    deletion: DeletionQueue,
}

impl GpuContext {
    /// Create the Vulkan context for windows on `display_handle`.
    ///
    /// # Arguments
    /// * `app_name` - Application name reported to the driver
    /// * `display_handle` - Decides which surface extensions are enabled
    /// * `enable_validation` - Enable Vulkan validation layers if installed
    pub fn new(
        app_name: &str,
        display_handle: RawDisplayHandle,
        enable_validation: bool,
    ) -> Result<Self> {
        log::info!("Creating Vulkan context: {}", app_name);

        let entry = unsafe { Entry::load() }
            .map_err(|e| StartupError::LoaderUnavailable(e.to_string()))?;

        let mut deletion = DeletionQueue::new();

        let instance = Self::create_instance(&entry, app_name, display_handle, enable_validation)?;
        {
            let instance = instance.clone();
            deletion.push("instance", move || unsafe { instance.destroy_instance(None) });
        }

        if enable_validation {
            match Self::setup_debug_messenger(&entry, &instance) {
                Ok((debug_utils, messenger)) => deletion.push("debug messenger", move || unsafe {
                    debug_utils.destroy_debug_utils_messenger(messenger, None)
                }),
                Err(e) => log::warn!("Debug messenger unavailable: {:#}", e),
            }
        }

        let (physical_device, queue_family) = Self::pick_physical_device(&instance)?;
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };

        log::info!(
            "Selected GPU: {}",
            properties
                .device_name_as_c_str()
                .unwrap_or(c"<unnamed>")
                .to_string_lossy()
        );
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );

        let device = Self::create_logical_device(&instance, physical_device, queue_family)?;
        {
            let device = device.clone();
            deletion.push("device", move || unsafe { device.destroy_device(None) });
        }
        let queue = unsafe { device.get_device_queue(queue_family, 0) };

        let descriptor_pool = Self::create_descriptor_pool(&device)?;
        {
            let device = device.clone();
            deletion.push("descriptor pool", move || unsafe {
                device.destroy_descriptor_pool(descriptor_pool, None)
            });
        }

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let upload_pool = unsafe { device.create_command_pool(&pool_info, None) }
            .context("Failed to create upload command pool")?;
        {
            let device = device.clone();
            deletion.push("upload command pool", move || unsafe {
                device.destroy_command_pool(upload_pool, None)
            });
        }

        log::debug!("Teardown order registered: {}", deletion.names().join(" -> "));

        Ok(Self {
            entry,
            instance,
            physical_device,
            queue_family,
            device,
            queue,
            upload_pool,
            deletion,
        })
    }

    fn create_instance(
        entry: &Entry,
        app_name: &str,
        display_handle: RawDisplayHandle,
        enable_validation: bool,
    ) -> Result<ash::Instance> {
        let app_name_cstr = CString::new(app_name)?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"imgui-vulkan-app")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_1);

        // Surface extensions for this platform
        let mut extensions: Vec<*const c_char> =
            ash_window::enumerate_required_extensions(display_handle)
                .context("Failed to query window-system extensions")?
                .to_vec();

        let available = unsafe { entry.enumerate_instance_extension_properties(None) }
            .context("Failed to enumerate instance extensions")?;
        let has_extension = |name: &CStr| {
            available
                .iter()
                .any(|p| unsafe { CStr::from_ptr(p.extension_name.as_ptr()) } == name)
        };

        let mut flags = vk::InstanceCreateFlags::empty();
        if has_extension(ash::khr::portability_enumeration::NAME) {
            extensions.push(ash::khr::portability_enumeration::NAME.as_ptr());
            flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
        }

        let mut layer_names = Vec::new();
        if enable_validation {
            let layers = unsafe { entry.enumerate_instance_layer_properties() }
                .context("Failed to enumerate instance layers")?;
            let has_validation = layers
                .iter()
                .any(|l| unsafe { CStr::from_ptr(l.layer_name.as_ptr()) } == VALIDATION_LAYER);

            if has_validation {
                layer_names.push(VALIDATION_LAYER.as_ptr());
                extensions.push(ash::ext::debug_utils::NAME.as_ptr());
            } else {
                log::warn!("Validation requested but VK_LAYER_KHRONOS_validation is not installed");
            }
        }

        let create_info = vk::InstanceCreateInfo::default()
            .flags(flags)
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .context("Failed to create Vulkan instance")?;

        Ok(instance)
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .context("Failed to create debug messenger")?;

        Ok((debug_utils, messenger))
    }

    fn pick_physical_device(instance: &ash::Instance) -> Result<(vk::PhysicalDevice, u32)> {
        let devices = unsafe { instance.enumerate_physical_devices() }
            .context("Failed to enumerate physical devices")?;

        if devices.is_empty() {
            return Err(StartupError::NoPhysicalDevice.into());
        }

        // Score each device
        let mut best_device = None;
        let mut best_score = 0;

        for device in devices {
            let props = unsafe { instance.get_physical_device_properties(device) };

            let queue_families =
                unsafe { instance.get_physical_device_queue_family_properties(device) };

            let graphics_family = queue_families
                .iter()
                .position(|props| props.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|i| i as u32);

            if let Some(graphics_family) = graphics_family {
                // Prefer discrete GPU, otherwise take what is there
                let score = match props.device_type {
                    vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
                    vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
                    _ => 1,
                };

                if score > best_score {
                    best_score = score;
                    best_device = Some((device, graphics_family));
                }
            }
        }

        best_device.ok_or_else(|| StartupError::NoGraphicsQueue.into())
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> Result<ash::Device> {
        let queue_priorities = [1.0];
        let queue_create_info = vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family)
            .queue_priorities(&queue_priorities);

        let available = unsafe { instance.enumerate_device_extension_properties(physical_device) }
            .context("Failed to enumerate device extensions")?;

        let mut extensions = vec![ash::khr::swapchain::NAME.as_ptr()];
        // Required wherever the implementation advertises it (MoltenVK)
        if available
            .iter()
            .any(|p| unsafe { CStr::from_ptr(p.extension_name.as_ptr()) } == PORTABILITY_SUBSET)
        {
            extensions.push(PORTABILITY_SUBSET.as_ptr());
        }

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extensions);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }
            .context("Failed to create logical device")?;

        Ok(device)
    }

    fn create_descriptor_pool(device: &ash::Device) -> Result<vk::DescriptorPool> {
        let pool_sizes = POOL_DESCRIPTOR_TYPES.map(|ty| vk::DescriptorPoolSize {
            ty,
            descriptor_count: DESCRIPTORS_PER_TYPE,
        });

        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(DESCRIPTORS_PER_TYPE * pool_sizes.len() as u32)
            .pool_sizes(&pool_sizes);

        unsafe { device.create_descriptor_pool(&pool_info, None) }
            .context("Failed to create descriptor pool")
    }

    /// Names of the destroy steps in creation order; drop runs them reversed.
    #[cfg(test)]
    pub fn teardown_steps(&self) -> Vec<&'static str> {
        self.deletion.names()
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.context("Failed to wait for device idle")?;
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan context...");

        if let Err(e) = self.wait_idle() {
            log::error!("{:#}", e);
        }

        self.deletion.flush();
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_pool_covers_every_type_once() {
        let mut types = POOL_DESCRIPTOR_TYPES.to_vec();
        types.sort_by_key(|ty| ty.as_raw());
        types.dedup();
        assert_eq!(types.len(), POOL_DESCRIPTOR_TYPES.len());
    }

    /// Needs a Vulkan loader with Xlib surface support; returns early without one.
    #[cfg(target_os = "linux")]
    #[test]
    fn test_context_registers_teardown_in_creation_order() {
        use raw_window_handle::{RawDisplayHandle, XlibDisplayHandle};

        let display = RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0));
        let gpu = match GpuContext::new("teardown order", display, false) {
            Ok(gpu) => gpu,
            Err(e) => {
                eprintln!("no usable Vulkan device, skipping: {:#}", e);
                return;
            }
        };

        assert_eq!(
            gpu.teardown_steps(),
            ["instance", "device", "descriptor pool", "upload command pool"]
        );
    }
}
