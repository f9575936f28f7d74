//! Vulkan instance creation, including the validation layer and debug
//! messenger used when `EngineConfig::validation` is set.

use std::ffi::{CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::vk;

use crate::error::{Error, Result};

/// Owns the `ash::Entry` and `ash::Instance`, plus the debug messenger when
/// validation is enabled. Dropped last of all Vulkan objects except the
/// entry itself.
pub struct VulkanInstance {
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    debug_utils: Option<DebugUtils>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl VulkanInstance {
    /// Create a new instance. `required_extensions` are window-system
    /// extensions (from `glfw::get_required_instance_extensions` or
    /// `ash_window::enumerate_required_extensions`); `validation` enables
    /// the khronos validation layer plus synchronization/best-practices
    /// validation features for debug builds.
    pub fn new(
        app_name: &str,
        required_extensions: &[CString],
        validation: bool,
    ) -> Result<Self> {
        let entry = unsafe {
            ash::Entry::load()
                .map_err(|e| Error::InitializationFailed(format!("failed to load Vulkan: {e}")))?
        };

        let app_name_c = CString::new(app_name).unwrap_or_else(|_| CString::new("crisp").unwrap());
        let engine_name_c = CString::new("crisp").unwrap();
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_c)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_c)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_2);

        let mut extension_ptrs: Vec<*const i8> =
            required_extensions.iter().map(|e| e.as_ptr()).collect();

        let validation_layer_name = CString::new("VK_LAYER_KHRONOS_validation").unwrap();
        let layer_ptrs: Vec<*const i8> = if validation {
            vec![validation_layer_name.as_ptr()]
        } else {
            Vec::new()
        };

        if validation {
            extension_ptrs.push(DebugUtils::name().as_ptr());
        }

        let enabled_validation_features = [
            vk::ValidationFeatureEnableEXT::SYNCHRONIZATION_VALIDATION,
            vk::ValidationFeatureEnableEXT::BEST_PRACTICES,
        ];
        let mut validation_features = vk::ValidationFeaturesEXT::builder()
            .enabled_validation_features(&enabled_validation_features);

        let mut create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        if validation {
            create_info = create_info.push_next(&mut validation_features);
        }

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(Error::Api)?
        };

        let (debug_utils, debug_messenger) = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
                .message_severity(
                    vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                        | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                        | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
                )
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                )
                .pfn_user_callback(Some(debug_callback));
            let messenger = unsafe {
                debug_utils
                    .create_debug_utils_messenger(&messenger_info, None)
                    .map_err(Error::Api)?
            };
            (Some(debug_utils), Some(messenger))
        } else {
            (None, None)
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
            debug_messenger,
        })
    }

    /// Borrow the raw `ash::Instance`.
    pub fn raw(&self) -> &ash::Instance {
        &self.instance
    }

    /// Borrow the loader `ash::Entry`.
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// Tag a Vulkan object with a debug name via `VK_EXT_debug_utils`, for
    /// RenderDoc/validation-layer captures. A no-op when validation (and so
    /// the extension) is disabled.
    pub fn set_object_name<T: vk::Handle + Copy>(
        &self,
        device: &ash::Device,
        object: T,
        name: &str,
    ) {
        let Some(debug_utils) = self.debug_utils.as_ref() else {
            return;
        };
        let Ok(name_c) = CString::new(name) else {
            return;
        };
        let info = vk::DebugUtilsObjectNameInfoEXT::builder()
            .object_type(T::TYPE)
            .object_handle(object.as_raw())
            .object_name(&name_c);
        unsafe {
            let _ = debug_utils.set_debug_utils_object_name(device.handle(), &info);
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let (Some(debug_utils), Some(messenger)) =
                (self.debug_utils.as_ref(), self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = if callback_data.is_null() {
        CStr::from_bytes_with_nul(b"<no message>\0").unwrap()
    } else {
        CStr::from_ptr((*callback_data).p_message)
    };

    match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!("{:?}", message),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!("{:?}", message),
        _ => log::debug!("{:?}", message),
    }

    vk::FALSE
}
