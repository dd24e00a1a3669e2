use anyhow::{anyhow, Result};

use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::KhrSurfaceExtension;

use super::device::SuitabilityError;
use crate::app::AppData;

#[derive(Debug, Copy, Clone)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub presentation: u32,
}

impl QueueFamilyIndices {
    /// gets the queue family indices to use for the given physical device;
    /// can't be constant, because these indices vary from device to device
    pub unsafe fn get(
        instance: &Instance,
        data: &AppData,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let properties = instance.get_physical_device_queue_family_properties(physical_device);

        // learn for each family whether it can present to our surface
        let mut supports_present = Vec::with_capacity(properties.len());
        for index in 0..properties.len() {
            supports_present.push(instance.get_physical_device_surface_support_khr(
                physical_device,
                index as u32,
                data.surface,
            )?);
        }

        select_queue_families(&properties, &supports_present)
    }
}

/// searches for a graphics and a present queue family in the given
/// properties, trying to find one family that supports both
///
/// presenting from the queue we render on avoids an ownership transfer of
/// the swapchain image between families, so a combined family wins over any
/// separate graphics/present pair; only if no family supports both do we
/// fall back to the first graphics family plus the first presenting family
pub fn select_queue_families(
    properties: &[vk::QueueFamilyProperties],
    supports_present: &[bool],
) -> Result<QueueFamilyIndices> {
    debug_assert_eq!(properties.len(), supports_present.len());

    let mut graphics = None;
    let mut present = None;

    for (index, family) in properties.iter().enumerate() {
        if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            if graphics.is_none() {
                graphics = Some(index as u32);
            }

            if supports_present[index] {
                graphics = Some(index as u32);
                present = Some(index as u32);
                break;
            }
        }
    }

    // no family supports both, try to find a separate present family
    if present.is_none() {
        present = supports_present
            .iter()
            .position(|s| *s)
            .map(|i| i as u32);
    }

    if let (Some(graphics), Some(present)) = (graphics, present) {
        Ok(QueueFamilyIndices {
            graphics,
            presentation: present,
        })
    } else {
        Err(anyhow!(SuitabilityError(
            "Missing required queue families."
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn prefers_combined_family_over_earlier_graphics_only() {
        let properties = vec![
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        let supports_present = vec![false, true];

        let indices = select_queue_families(&properties, &supports_present).unwrap();
        assert_eq!(indices.graphics, 1);
        assert_eq!(indices.presentation, 1);
    }

    #[test]
    fn falls_back_to_separate_families() {
        let properties = vec![
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE),
        ];
        let supports_present = vec![false, true];

        let indices = select_queue_families(&properties, &supports_present).unwrap();
        assert_eq!(indices.graphics, 0);
        assert_eq!(indices.presentation, 1);
    }

    #[test]
    fn picks_first_combined_family() {
        let properties = vec![
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let supports_present = vec![true, true];

        let indices = select_queue_families(&properties, &supports_present).unwrap();
        assert_eq!(indices.graphics, 0);
        assert_eq!(indices.presentation, 0);
    }

    #[test]
    fn errors_without_graphics_family() {
        let properties = vec![family(vk::QueueFlags::TRANSFER)];
        let supports_present = vec![true];

        assert!(select_queue_families(&properties, &supports_present).is_err());
    }

    #[test]
    fn errors_without_present_support() {
        let properties = vec![family(vk::QueueFlags::GRAPHICS)];
        let supports_present = vec![false];

        assert!(select_queue_families(&properties, &supports_present).is_err());
    }
}
