use anyhow::{anyhow, Result};
use log::*;

use std::collections::HashSet;

use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::ExtDebugUtilsExtension;
use vulkanalia::window as vk_window;

use winit::window::Window;

use super::validation;
use crate::app::{AppData, Settings};

/// creates a new vulkan instance (the connection between this program and
/// the vulkan library)
///
/// the window parameter is used to enumerate the platform surface
/// extensions the instance has to enable
///
/// the 'Instance' returned by this function is not a raw vulkan instance
/// (that would be vk::Instance), it is an abstraction created by vulkanalia
/// which combines the raw instance with the commands loaded for it
pub unsafe fn create_instance(
    window: &Window,
    entry: &Entry,
    data: &mut AppData,
    settings: &Settings,
) -> Result<Instance> {
    let application_info = vk::ApplicationInfo::builder()
        .application_name(b"triangle\0")
        .application_version(vk::make_version(1, 0, 0))
        .engine_name(b"triangle\0")
        .engine_version(vk::make_version(1, 0, 0))
        .api_version(vk::make_version(1, 0, 0));

    // a requested layer which is not installed must fail loudly here,
    // otherwise create_instance reports VK_ERROR_LAYER_NOT_PRESENT anyway
    let available_layers = entry
        .enumerate_instance_layer_properties()?
        .iter()
        .map(|l| l.layer_name)
        .collect::<HashSet<_>>();

    if settings.validation && !available_layers.contains(&validation::LAYER) {
        return Err(anyhow!("Validation layer requested but not supported."));
    }

    let layers = if settings.validation {
        debug!("Setting up validation layers");
        vec![validation::LAYER.as_ptr()]
    } else {
        Vec::new()
    };

    // the surface extensions differ per platform (win32, xlib, wayland, ...)
    // so let the windowing bridge enumerate them instead of hardcoding
    let mut extensions = vk_window::get_required_instance_extensions(window)
        .iter()
        .map(|e| e.as_ptr())
        .collect::<Vec<_>>();

    // the debug messenger with our custom callback lives in an extension
    if settings.validation {
        extensions.push(vk::EXT_DEBUG_UTILS_EXTENSION.name.as_ptr());
    }

    let mut info = vk::InstanceCreateInfo::builder()
        .application_info(&application_info)
        .enabled_layer_names(&layers)
        .enabled_extension_names(&extensions);

    let mut debug_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(vk::DebugUtilsMessageSeverityFlagsEXT::all())
        .message_type(vk::DebugUtilsMessageTypeFlagsEXT::all())
        .user_callback(Some(validation::debug_callback));

    if settings.validation {
        // chaining the messenger info into the instance create info also
        // covers messages emitted by create/destroy of the instance itself
        info = info.push_next(&mut debug_info);
    }

    let instance = entry.create_instance(&info, None)?;

    if settings.validation {
        // register the persistent messenger and keep the handle around,
        // it has to be destroyed before the instance
        data.messenger = instance.create_debug_utils_messenger_ext(&debug_info, None)?;
    }

    info!("Created vulkan instance");

    Ok(instance)
}
