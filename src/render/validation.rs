use log::*;

use std::ffi::CStr;
use std::os::raw::c_void;

use vulkanalia::vk;

pub const LAYER: vk::ExtensionName = vk::ExtensionName::from_bytes(b"VK_LAYER_KHRONOS_validation");

/// callback invoked by the vulkan library whenever a validation layer
/// message is emitted
///
/// the "system" part of the declaration selects whatever calling convention
/// is the right one for interacting with the libraries of the current target
///
/// the signature has to match PFN_vkDebugUtilsMessengerCallbackEXT:
/// https://www.khronos.org/registry/vulkan/specs/1.3-extensions/man/html/PFN_vkDebugUtilsMessengerCallbackEXT.html
pub extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    // can be "general", "validation" or "performance"
    type_: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    // user data pointer registered during setup, unused here
    _: *mut c_void,
) -> vk::Bool32 {
    let data = unsafe { *data };
    let message = unsafe { CStr::from_ptr(data.message) }.to_string_lossy();

    // map severity to the matching log level
    if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        error!("({:?}) {}", type_, message);
    } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        warn!("({:?}) {}", type_, message);
    } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::INFO {
        debug!("({:?}) {}", type_, message);
    } else {
        trace!("({:?}) {}", type_, message);
    }

    // the return value indicates whether the call which triggered this
    // message should be aborted; only layer development ever wants true
    vk::FALSE
}
