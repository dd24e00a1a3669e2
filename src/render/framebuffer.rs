use anyhow::Result;

use vulkanalia::prelude::v1_0::*;

use crate::app::AppData;

// the attachment the render pass draws into depends on which image the
// swapchain hands out for a frame, so there is one framebuffer per
// swapchain image view
pub unsafe fn create_framebuffers(device: &Device, data: &mut AppData) -> Result<()> {
    log::debug!("creating framebuffers");

    debug_assert!(!data.swapchain_image_views.is_empty());

    data.framebuffers = data
        .swapchain_image_views
        .iter()
        .map(|i| {
            let attachments = &[*i];
            let create_info = vk::FramebufferCreateInfo::builder()
                // the render pass this framebuffer needs to be compatible
                // with, i.e. same number and type of attachments
                .render_pass(data.render_pass)
                .attachments(attachments)
                .width(data.swapchain_extent.width)
                .height(data.swapchain_extent.height)
                .layers(1);
            device.create_framebuffer(&create_info, None)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(())
}
