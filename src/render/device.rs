use anyhow::{anyhow, Result};
use log::*;
use thiserror::Error;

use std::collections::HashSet;

use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk;

use super::queue::QueueFamilyIndices;
use super::swapchain::SwapchainSupport;
use super::validation;
use crate::app::{AppData, Settings};

// The error macro of the thiserror-crate enables definition of custom
// error types without all the boilerplate required for implementing
// std::error::Error by hand
#[derive(Debug, Error)]
#[error("Missing {0}.")]
pub struct SuitabilityError(pub &'static str);

const DEVICE_EXTENSIONS: &[vk::ExtensionName] = &[vk::KHR_SWAPCHAIN_EXTENSION.name];

/// snapshot of a chosen physical device
///
/// properties, features, memory layout and queue families of a physical
/// device are fixed for the lifetime of the instance, so they are queried
/// once at construction; everything downstream (memory type selection,
/// extension checks) reads the cached copies instead of calling back into
/// the driver
#[derive(Clone, Debug, Default)]
pub struct VulkanDevice {
    /// physical device representation
    pub physical_device: vk::PhysicalDevice,
    /// properties of the physical device, including limits
    pub properties: vk::PhysicalDeviceProperties,
    /// features of the physical device
    pub features: vk::PhysicalDeviceFeatures,
    /// features that get enabled on the logical device
    pub enabled_features: vk::PhysicalDeviceFeatures,
    /// memory types and heaps of the physical device
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// queue family properties of the physical device
    pub queue_family_properties: Vec<vk::QueueFamilyProperties>,
    /// extensions supported by the device
    pub supported_extensions: HashSet<vk::ExtensionName>,
}

impl VulkanDevice {
    pub unsafe fn new(instance: &Instance, physical_device: vk::PhysicalDevice) -> Result<Self> {
        let supported_extensions = instance
            .enumerate_device_extension_properties(physical_device, None)?
            .iter()
            .map(|e| e.extension_name)
            .collect::<HashSet<_>>();

        Ok(Self {
            physical_device,
            properties: instance.get_physical_device_properties(physical_device),
            features: instance.get_physical_device_features(physical_device),
            // the triangle needs no optional features
            enabled_features: vk::PhysicalDeviceFeatures::default(),
            memory_properties: instance.get_physical_device_memory_properties(physical_device),
            queue_family_properties: instance
                .get_physical_device_queue_family_properties(physical_device),
            supported_extensions,
        })
    }

    pub fn extension_supported(&self, extension: vk::ExtensionName) -> bool {
        self.supported_extensions.contains(&extension)
    }

    /// finds a memory type that the given requirements allow and that has
    /// all of the requested property flags
    ///
    /// graphics cards offer more than one kind of memory with different
    /// allowed operations and performance characteristics; the
    /// memory_type_bits of the requirements are a mask of indices into the
    /// memory_types array which are acceptable for the resource
    pub fn memory_type_index(
        &self,
        properties: vk::MemoryPropertyFlags,
        requirements: vk::MemoryRequirements,
    ) -> Result<u32> {
        (0..self.memory_properties.memory_type_count)
            .find(|i| {
                let suitable = (requirements.memory_type_bits & (1 << i)) != 0;
                let memory_type = self.memory_properties.memory_types[*i as usize];
                suitable && memory_type.property_flags.contains(properties)
            })
            .ok_or_else(|| anyhow!("Failed to find suitable memory type."))
    }
}

/// checks whether the given physical device can run this application at all
unsafe fn check_physical_device(
    instance: &Instance,
    data: &AppData,
    device: &VulkanDevice,
) -> Result<()> {
    QueueFamilyIndices::get(instance, data, device.physical_device)?;
    check_physical_device_extensions(device)?;

    // a device that exposes the swapchain extension may still offer no
    // format or present mode for our particular surface
    let support = SwapchainSupport::get(instance, data, device.physical_device)?;
    if support.formats.is_empty() || support.present_modes.is_empty() {
        return Err(anyhow!(SuitabilityError("Insufficient swapchain support.")));
    }

    Ok(())
}

fn check_physical_device_extensions(device: &VulkanDevice) -> Result<()> {
    if DEVICE_EXTENSIONS
        .iter()
        .all(|e| device.extension_supported(*e))
    {
        Ok(())
    } else {
        Err(anyhow!(SuitabilityError(
            "Missing required device extensions."
        )))
    }
}

/// selects the first physical device that has the required queue families,
/// device extensions and swapchain support
pub unsafe fn pick_physical_device(instance: &Instance, data: &mut AppData) -> Result<()> {
    for physical_device in instance.enumerate_physical_devices()? {
        let device = VulkanDevice::new(instance, physical_device)?;
        trace!("Checking physical device {}", device.properties.device_name);

        if let Err(error) = check_physical_device(instance, data, &device) {
            warn!(
                "Skipping physical device ('{}'): {}",
                device.properties.device_name, error
            );
        } else {
            info!(
                "Selecting physical device ('{}')",
                device.properties.device_name
            );
            data.gpu = device;
            return Ok(());
        }
    }

    Err(anyhow!("Failed to select a physical device"))
}

pub unsafe fn create_logical_device(
    instance: &Instance,
    data: &mut AppData,
    settings: &Settings,
) -> Result<Device> {
    // specify the queues to create; graphics and presentation may well be
    // the same family, in which case only one queue must be requested
    let indices = QueueFamilyIndices::get(instance, data, data.gpu.physical_device)?;

    let mut unique_indices = HashSet::new();
    unique_indices.insert(indices.graphics);
    unique_indices.insert(indices.presentation);

    // one queue per family is enough: command buffers can be recorded on
    // multiple threads and submitted together from one place
    let queue_priorities = &[1.0];
    let queue_infos = unique_indices
        .iter()
        .map(|i| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(*i)
                .queue_priorities(queue_priorities)
        })
        .collect::<Vec<_>>();

    // device layers are deprecated, but implementations predating that
    // still expect the validation layer to be listed here as well
    let layers = if settings.validation {
        vec![validation::LAYER.as_ptr()]
    } else {
        vec![]
    };

    let extensions = DEVICE_EXTENSIONS
        .iter()
        .map(|e| e.as_ptr())
        .collect::<Vec<_>>();

    let info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_infos)
        .enabled_layer_names(&layers)
        .enabled_extension_names(&extensions)
        .enabled_features(&data.gpu.enabled_features);
    let device = instance.create_device(data.gpu.physical_device, &info, None)?;

    // the queue handles live exactly as long as the device, no separate
    // destruction required
    data.graphics_queue = device.get_device_queue(indices.graphics, 0);
    data.present_queue = device.get_device_queue(indices.presentation, 0);

    trace!("graphics queue family index: {}", indices.graphics);
    trace!("presentation queue family index: {}", indices.presentation);

    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpu_with_memory(memory_types: &[vk::MemoryType]) -> VulkanDevice {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: memory_types.len() as u32,
            ..Default::default()
        };
        properties.memory_types[..memory_types.len()].copy_from_slice(memory_types);

        VulkanDevice {
            memory_properties: properties,
            ..Default::default()
        }
    }

    fn requirements(memory_type_bits: u32) -> vk::MemoryRequirements {
        vk::MemoryRequirements {
            size: 1024,
            alignment: 256,
            memory_type_bits,
        }
    }

    #[test]
    fn memory_type_honors_requirement_mask() {
        let gpu = gpu_with_memory(&[
            vk::MemoryType {
                property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE,
                heap_index: 0,
            },
            vk::MemoryType {
                property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE
                    | vk::MemoryPropertyFlags::HOST_COHERENT,
                heap_index: 0,
            },
        ]);

        // only type 1 is allowed by the mask
        let index = gpu
            .memory_type_index(vk::MemoryPropertyFlags::HOST_VISIBLE, requirements(0b10))
            .unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn memory_type_requires_all_property_flags() {
        let gpu = gpu_with_memory(&[
            vk::MemoryType {
                property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
                heap_index: 0,
            },
            vk::MemoryType {
                property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE
                    | vk::MemoryPropertyFlags::HOST_COHERENT,
                heap_index: 1,
            },
        ]);

        let index = gpu
            .memory_type_index(
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                requirements(0b11),
            )
            .unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn memory_type_errors_when_nothing_matches() {
        let gpu = gpu_with_memory(&[vk::MemoryType {
            property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            heap_index: 0,
        }]);

        assert!(gpu
            .memory_type_index(vk::MemoryPropertyFlags::HOST_VISIBLE, requirements(0b1))
            .is_err());
    }

    #[test]
    fn extension_check_reads_cached_set() {
        let mut gpu = VulkanDevice::default();
        gpu.supported_extensions
            .insert(vk::KHR_SWAPCHAIN_EXTENSION.name);

        assert!(gpu.extension_supported(vk::KHR_SWAPCHAIN_EXTENSION.name));
        assert!(!gpu.extension_supported(vk::ExtensionName::from_bytes(b"VK_KHR_nonexistent")));
    }
}
