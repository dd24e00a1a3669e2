use anyhow::Result;

use vulkanalia::prelude::v1_0::*;

use crate::app::AppData;
use crate::render::queue::QueueFamilyIndices;

// command buffers are allocated from a pool and can only ever be submitted
// to queues of the family the pool was created for; ours all go to the
// graphics queue
pub unsafe fn create_command_pool(
    instance: &Instance,
    device: &Device,
    data: &mut AppData,
) -> Result<()> {
    let indices = QueueFamilyIndices::get(instance, data, data.gpu.physical_device)?;

    let info = vk::CommandPoolCreateInfo::builder()
        .flags(vk::CommandPoolCreateFlags::empty())
        .queue_family_index(indices.graphics);

    data.command_pool = device.create_command_pool(&info, None)?;
    Ok(())
}
