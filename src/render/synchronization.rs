use anyhow::Result;

use vulkanalia::prelude::v1_0::*;

use crate::app::AppData;

/// number of frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// creates the per-frame synchronization objects
///
/// semaphores order work on the GPU (acquire -> draw -> present) and can't
/// be inspected from the host; the fences are what lets the CPU block until
/// a frame's submission has drained; they start out signalled so the very
/// first wait on each frame slot passes immediately
pub unsafe fn create_sync_objects(device: &Device, data: &mut AppData) -> Result<()> {
    let semaphore_info = vk::SemaphoreCreateInfo::builder();
    let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

    for _ in 0..MAX_FRAMES_IN_FLIGHT {
        data.image_available_semaphores
            .push(device.create_semaphore(&semaphore_info, None)?);
        data.render_finished_semaphores
            .push(device.create_semaphore(&semaphore_info, None)?);
        data.in_flight_fences
            .push(device.create_fence(&fence_info, None)?);
    }

    // tracks which frame fence last touched each swapchain image; null
    // until an image has been rendered to once
    data.images_in_flight = data
        .swapchain_images
        .iter()
        .map(|_| vk::Fence::null())
        .collect();

    Ok(())
}
