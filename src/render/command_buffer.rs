use anyhow::Result;

use vulkanalia::prelude::v1_0::*;

use crate::app::AppData;
use crate::render::pipeline;

/// allocates and records one primary command buffer per framebuffer
///
/// the contents never change between frames, so everything is recorded
/// once up front and the draw loop only ever submits
pub unsafe fn create_command_buffers(device: &Device, data: &mut AppData) -> Result<()> {
    debug_assert!(!data.framebuffers.is_empty());

    log::debug!("Creating {} command buffers", data.framebuffers.len());

    let allocate_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(data.command_pool)
        // PRIMARY:   submitted to a queue directly, cannot be called from
        //            other command buffers
        // SECONDARY: not submittable, but callable from primary buffers
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(data.framebuffers.len() as u32);

    data.command_buffers = device.allocate_command_buffers(&allocate_info)?;

    for (i, command_buffer) in data.command_buffers.iter().enumerate() {
        let inheritance = vk::CommandBufferInheritanceInfo::builder();

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::empty())
            .inheritance_info(&inheritance);

        device.begin_command_buffer(*command_buffer, &begin_info)?;

        // the render area should match the framebuffer extent; pixels
        // outside of it end up undefined
        let render_area = vk::Rect2D::builder()
            .offset(vk::Offset2D::default())
            .extent(data.swapchain_extent);

        let color_clear_value = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        };

        let clear_values = &[color_clear_value];
        let info = vk::RenderPassBeginInfo::builder()
            .render_pass(data.render_pass)
            .framebuffer(data.framebuffers[i])
            .render_area(render_area)
            .clear_values(clear_values);

        // INLINE: the pass contents come from this very buffer, no
        // secondary buffers involved
        device.cmd_begin_render_pass(*command_buffer, &info, vk::SubpassContents::INLINE);

        device.cmd_bind_pipeline(
            *command_buffer,
            vk::PipelineBindPoint::GRAPHICS,
            data.pipeline,
        );

        device.cmd_bind_vertex_buffers(*command_buffer, 0, &[data.vertex_buffer], &[0]);

        // only a single index buffer can be bound
        device.cmd_bind_index_buffer(*command_buffer, data.index_buffer, 0, vk::IndexType::UINT16);

        device.cmd_draw_indexed(
            *command_buffer,
            pipeline::INDICES.len() as u32, // index count
            1,                              // instance count
            0,                              // first index
            0,                              // vertex offset
            0,                              // first instance
        );

        device.cmd_end_render_pass(*command_buffer);
        device.end_command_buffer(*command_buffer)?;
    }

    Ok(())
}
