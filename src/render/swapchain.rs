use anyhow::Result;
use log::*;

use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::KhrSurfaceExtension;
use vulkanalia::vk::KhrSwapchainExtension;

use winit::window::Window;

use crate::app::{AppData, Settings};
use crate::render::queue::QueueFamilyIndices;

/// image formats we want for the swapchain, in order of preference
const PREFERRED_IMAGE_FORMATS: &[vk::Format] = &[
    vk::Format::B8G8R8A8_UNORM,
    vk::Format::R8G8B8A8_UNORM,
    vk::Format::A8B8G8R8_UNORM_PACK32,
];

#[derive(Clone, Debug)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub unsafe fn get(
        instance: &Instance,
        data: &AppData,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        Ok(Self {
            capabilities: instance
                .get_physical_device_surface_capabilities_khr(physical_device, data.surface)?,
            formats: instance
                .get_physical_device_surface_formats_khr(physical_device, data.surface)?,
            present_modes: instance
                .get_physical_device_surface_present_modes_khr(physical_device, data.surface)?,
        })
    }
}

/// picks the surface format that best suits our needs from the formats the
/// implementation advertises
///
/// the first format of the preference list that is available wins; if none
/// of the preferred formats is offered we settle for whatever the
/// implementation lists first
pub fn select_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .cloned()
        .find(|f| PREFERRED_IMAGE_FORMATS.contains(&f.format))
        .unwrap_or_else(|| formats[0])
}

/// selects a present mode for the swapchain
///
/// FIFO waits for the vertical blank and is the only mode the spec
/// guarantees, so it doubles as the v-sync mode and the fallback; without
/// v-sync we prefer MAILBOX (low latency, no tearing) and then IMMEDIATE
pub fn select_present_mode(
    present_modes: &[vk::PresentModeKHR],
    vsync: bool,
) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }

    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else if present_modes.contains(&vk::PresentModeKHR::IMMEDIATE) {
        vk::PresentModeKHR::IMMEDIATE
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// determines the extent of the swapchain images
///
/// if current_extent is the special value u32::MAX the surface size is
/// undefined and will be set by the swapchain, so we clamp the window size
/// into the allowed range; otherwise the swapchain size must match the
/// surface exactly
pub fn select_extent(
    width: u32,
    height: u32,
    capabilities: &vk::SurfaceCapabilitiesKHR,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::max_value() {
        capabilities.current_extent
    } else {
        let clamp = |min: u32, max: u32, v: u32| min.max(max.min(v));

        vk::Extent2D::builder()
            .width(clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
                width,
            ))
            .height(clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
                height,
            ))
            .build()
    }
}

/// sticking to the minimum image count would mean sometimes waiting on the
/// driver to complete internal operations before another image can be
/// acquired, so ask for one more; max_image_count of zero means unlimited
pub fn select_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count != 0 && image_count > capabilities.max_image_count {
        image_count = capabilities.max_image_count;
    }
    image_count
}

/// not all devices support alpha-opaque; take the first supported mode out
/// of the usual candidates
pub fn select_composite_alpha(
    supported: vk::CompositeAlphaFlagsKHR,
) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::INHERIT,
    ]
    .into_iter()
    .find(|f| supported.contains(*f))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

/// we prefer a non-rotated transform when the surface supports it
pub fn select_pre_transform(
    capabilities: &vk::SurfaceCapabilitiesKHR,
) -> vk::SurfaceTransformFlagsKHR {
    if capabilities
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        capabilities.current_transform
    }
}

/// creates the swapchain and retrieves its images
///
/// the swapchain handle already stored in AppData (null on first creation)
/// is passed as old_swapchain, which eases recreation on resize: the driver
/// can reuse resources and already acquired images can still be presented;
/// the old swapchain and its image views are destroyed once the new one
/// exists
pub unsafe fn create_swapchain(
    window: &Window,
    instance: &Instance,
    device: &Device,
    data: &mut AppData,
    settings: &Settings,
) -> Result<()> {
    let indices = QueueFamilyIndices::get(instance, data, data.gpu.physical_device)?;
    let support = SwapchainSupport::get(instance, data, data.gpu.physical_device)?;

    let surface_format = select_surface_format(&support.formats);
    let present_mode = select_present_mode(&support.present_modes, settings.vsync);
    let size = window.inner_size();
    let extent = select_extent(size.width, size.height, &support.capabilities);
    let image_count = select_image_count(&support.capabilities);
    let pre_transform = select_pre_transform(&support.capabilities);
    let composite_alpha = select_composite_alpha(support.capabilities.supported_composite_alpha);

    // images shared across distinct graphics and present families need
    // concurrent mode; with a single family exclusive mode performs best
    let mut queue_family_indices = vec![];
    let image_sharing_mode = if indices.graphics != indices.presentation {
        queue_family_indices.push(indices.graphics);
        queue_family_indices.push(indices.presentation);
        vk::SharingMode::CONCURRENT
    } else {
        vk::SharingMode::EXCLUSIVE
    };

    // enable transfer source/destination on the swapchain images when the
    // surface supports it (screenshots, blits)
    let mut image_usage = vk::ImageUsageFlags::COLOR_ATTACHMENT;
    if support
        .capabilities
        .supported_usage_flags
        .contains(vk::ImageUsageFlags::TRANSFER_SRC)
    {
        image_usage |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if support
        .capabilities
        .supported_usage_flags
        .contains(vk::ImageUsageFlags::TRANSFER_DST)
    {
        image_usage |= vk::ImageUsageFlags::TRANSFER_DST;
    }

    let old_swapchain = data.swapchain;

    info!(
        "Creating swapchain ({}x{}, {:?}, {:?})",
        extent.width, extent.height, surface_format.format, present_mode
    );

    let info = vk::SwapchainCreateInfoKHR::builder()
        .surface(data.surface)
        .min_image_count(image_count)
        .image_format(surface_format.format)
        .image_color_space(surface_format.color_space)
        .image_extent(extent)
        .image_array_layers(1) // always 1 unless rendering stereoscopic 3D
        .image_usage(image_usage)
        .image_sharing_mode(image_sharing_mode)
        .queue_family_indices(&queue_family_indices)
        .pre_transform(pre_transform)
        .composite_alpha(composite_alpha)
        .present_mode(present_mode)
        // discard pixels obscured by other windows
        .clipped(true)
        .old_swapchain(old_swapchain);

    data.swapchain = device.create_swapchain_khr(&info, None)?;

    // with the replacement in place the previous swapchain and the views
    // into its images can go
    if !old_swapchain.is_null() {
        data.swapchain_image_views
            .drain(..)
            .for_each(|v| device.destroy_image_view(v, None));
        device.destroy_swapchain_khr(old_swapchain, None);
    }

    data.swapchain_images = device.get_swapchain_images_khr(data.swapchain)?;
    data.swapchain_format = surface_format.format;
    data.swapchain_extent = extent;

    Ok(())
}

/// creates one 2D color view per swapchain image; rendering and presenting
/// always go through views, never through the raw images
pub unsafe fn create_swapchain_image_views(device: &Device, data: &mut AppData) -> Result<()> {
    let components = vk::ComponentMapping::builder()
        .r(vk::ComponentSwizzle::R)
        .g(vk::ComponentSwizzle::G)
        .b(vk::ComponentSwizzle::B)
        .a(vk::ComponentSwizzle::A);

    let subresource_range = vk::ImageSubresourceRange::builder()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1);

    data.swapchain_image_views = data
        .swapchain_images
        .iter()
        .map(|i| {
            let info = vk::ImageViewCreateInfo::builder()
                .image(*i)
                .view_type(vk::ImageViewType::_2D)
                .format(data.swapchain_format)
                .components(components)
                .subresource_range(subresource_range);
            device.create_image_view(&info, None)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn surface_format_follows_preference_order() {
        let formats = vec![
            format(vk::Format::R8G8B8A8_UNORM),
            format(vk::Format::B8G8R8A8_UNORM),
        ];

        // B8G8R8A8 is preferred even though R8G8B8A8 is listed first
        assert_eq!(
            select_surface_format(&formats).format,
            vk::Format::B8G8R8A8_UNORM
        );
    }

    #[test]
    fn surface_format_falls_back_to_first_advertised() {
        let formats = vec![
            format(vk::Format::R16G16B16A16_SFLOAT),
            format(vk::Format::B8G8R8A8_SRGB),
        ];

        assert_eq!(
            select_surface_format(&formats).format,
            vk::Format::R16G16B16A16_SFLOAT
        );
    }

    #[test]
    fn present_mode_prefers_mailbox_over_immediate() {
        let modes = vec![
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::FIFO,
        ];

        assert_eq!(
            select_present_mode(&modes, false),
            vk::PresentModeKHR::MAILBOX
        );
    }

    #[test]
    fn present_mode_takes_immediate_without_mailbox() {
        let modes = vec![vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];

        assert_eq!(
            select_present_mode(&modes, false),
            vk::PresentModeKHR::IMMEDIATE
        );
    }

    #[test]
    fn present_mode_defaults_to_fifo() {
        let modes = vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::FIFO_RELAXED];

        assert_eq!(select_present_mode(&modes, false), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn vsync_forces_fifo() {
        let modes = vec![
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::FIFO,
        ];

        assert_eq!(select_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn extent_matches_defined_surface_size() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            ..Default::default()
        };

        let extent = select_extent(1024, 768, &capabilities);
        assert_eq!(extent.width, 800);
        assert_eq!(extent.height, 600);
    }

    #[test]
    fn undefined_extent_clamps_window_size() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::max_value(),
                height: u32::max_value(),
            },
            min_image_extent: vk::Extent2D {
                width: 320,
                height: 240,
            },
            max_image_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        };

        let extent = select_extent(4096, 100, &capabilities);
        assert_eq!(extent.width, 1920);
        assert_eq!(extent.height, 240);
    }

    #[test]
    fn image_count_is_one_above_minimum() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            ..Default::default()
        };

        assert_eq!(select_image_count(&capabilities), 3);
    }

    #[test]
    fn image_count_respects_maximum() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 3,
            ..Default::default()
        };

        assert_eq!(select_image_count(&capabilities), 3);
    }

    #[test]
    fn image_count_with_unlimited_maximum() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };

        assert_eq!(select_image_count(&capabilities), 3);
    }

    #[test]
    fn composite_alpha_skips_unsupported_opaque() {
        let supported =
            vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED | vk::CompositeAlphaFlagsKHR::INHERIT;

        assert_eq!(
            select_composite_alpha(supported),
            vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED
        );
    }

    #[test]
    fn pre_transform_prefers_identity() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY
                | vk::SurfaceTransformFlagsKHR::ROTATE_90,
            current_transform: vk::SurfaceTransformFlagsKHR::ROTATE_90,
            ..Default::default()
        };

        assert_eq!(
            select_pre_transform(&capabilities),
            vk::SurfaceTransformFlagsKHR::IDENTITY
        );
    }

    #[test]
    fn pre_transform_falls_back_to_current() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            supported_transforms: vk::SurfaceTransformFlagsKHR::ROTATE_180,
            current_transform: vk::SurfaceTransformFlagsKHR::ROTATE_180,
            ..Default::default()
        };

        assert_eq!(
            select_pre_transform(&capabilities),
            vk::SurfaceTransformFlagsKHR::ROTATE_180
        );
    }
}
