use anyhow::{anyhow, Result};
use log::*;

use vulkanalia::loader::{LibloadingLoader, LIBRARY};
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::{ExtDebugUtilsExtension, KhrSurfaceExtension, KhrSwapchainExtension};
use vulkanalia::window as vk_window;

use winit::window::Window;

use crate::render::buffer;
use crate::render::command_buffer;
use crate::render::command_pool;
use crate::render::device::{self, VulkanDevice};
use crate::render::framebuffer;
use crate::render::instance;
use crate::render::pipeline;
use crate::render::render_pass;
use crate::render::swapchain;
use crate::render::synchronization::{self, MAX_FRAMES_IN_FLIGHT};

/// runtime settings, filled from command line flags by the example binary
#[derive(Copy, Clone, Debug)]
pub struct Settings {
    /// activates the validation layer (and message output)
    pub validation: bool,
    /// force FIFO presentation, i.e. wait for the vertical blank
    pub vsync: bool,
    /// borderless fullscreen window
    pub fullscreen: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            validation: cfg!(debug_assertions),
            vsync: false,
            fullscreen: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct App {
    entry: Entry,
    instance: Instance,
    data: AppData,
    device: Device,
    settings: Settings,
    /// index of the frame slot used for the next submission
    frame: usize,
    /// set by the event loop when the window size changed; picked up after
    /// the next present
    pub resized: bool,
}

/// plain storage for every raw handle created during bring-up
///
/// handles are populated strictly in bring-up order, so any stage can rely
/// on the fields written by the stages before it and nothing else
#[derive(Clone, Debug, Default)]
pub struct AppData {
    pub surface: vk::SurfaceKHR,
    pub messenger: vk::DebugUtilsMessengerEXT,

    // chosen physical device with its cached properties; destroyed
    // implicitly with the instance
    pub gpu: VulkanDevice,

    // queues are created along with the logical device and cleaned up
    // implicitly when it is destroyed
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,

    pub swapchain_format: vk::Format,
    pub swapchain_extent: vk::Extent2D,
    pub swapchain: vk::SwapchainKHR,
    pub swapchain_images: Vec<vk::Image>,
    pub swapchain_image_views: Vec<vk::ImageView>,

    pub render_pass: vk::RenderPass,
    pub pipeline_layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,

    pub framebuffers: Vec<vk::Framebuffer>,

    pub command_pool: vk::CommandPool,
    pub command_buffers: Vec<vk::CommandBuffer>,

    pub vertex_buffer: vk::Buffer,
    pub vertex_buffer_memory: vk::DeviceMemory,
    pub index_buffer: vk::Buffer,
    pub index_buffer_memory: vk::DeviceMemory,

    // one semaphore pair and fence per frame slot, plus one fence slot per
    // swapchain image to spot images still owned by an in-flight frame
    pub image_available_semaphores: Vec<vk::Semaphore>,
    pub render_finished_semaphores: Vec<vk::Semaphore>,
    pub in_flight_fences: Vec<vk::Fence>,
    pub images_in_flight: Vec<vk::Fence>,
}

impl App {
    /// runs the whole bring-up sequence
    pub unsafe fn create(window: &Window, settings: Settings) -> Result<Self> {
        // locate the vulkan library at runtime and load the entry commands
        let loader = LibloadingLoader::new(LIBRARY)?;
        let entry = Entry::new(loader).map_err(|e| anyhow!("{}", e))?;

        let mut data = AppData::default();
        let instance = instance::create_instance(window, &entry, &mut data, &settings)?;

        // the surface has to exist before device selection, queue family
        // support is checked against it
        data.surface = vk_window::create_surface(&instance, window)?;

        device::pick_physical_device(&instance, &mut data)?;
        let device = device::create_logical_device(&instance, &mut data, &settings)?;

        swapchain::create_swapchain(window, &instance, &device, &mut data, &settings)?;
        swapchain::create_swapchain_image_views(&device, &mut data)?;
        render_pass::create_render_pass(&device, &mut data)?;
        pipeline::create_pipeline(&device, &mut data)?;
        framebuffer::create_framebuffers(&device, &mut data)?;
        command_pool::create_command_pool(&instance, &device, &mut data)?;
        buffer::create_vertex_buffer(&device, &mut data)?;
        buffer::create_index_buffer(&device, &mut data)?;
        command_buffer::create_command_buffers(&device, &mut data)?;
        synchronization::create_sync_objects(&device, &mut data)?;

        Ok(Self {
            entry,
            instance,
            data,
            device,
            settings,
            frame: 0,
            resized: false,
        })
    }

    /// renders one frame
    pub unsafe fn render(&mut self, window: &Window) -> Result<()> {
        // block until the GPU is done with the submission that used this
        // frame slot last time around
        let in_flight_fence = self.data.in_flight_fences[self.frame];
        self.device
            .wait_for_fences(&[in_flight_fence], true, u64::max_value())?;

        // an out-of-date swapchain (window resized away under us) cannot
        // produce images anymore, recreate and try again next frame
        let result = self.device.acquire_next_image_khr(
            self.data.swapchain,
            u64::max_value(),
            self.data.image_available_semaphores[self.frame],
            vk::Fence::null(),
        );

        let image_index = match result {
            Ok((image_index, _)) => image_index as usize,
            Err(vk::ErrorCode::OUT_OF_DATE_KHR) => return self.recreate_swapchain(window),
            Err(e) => return Err(anyhow!(e)),
        };

        // with more images than frame slots an image can come back while an
        // earlier frame still renders to it; wait for that frame too
        let image_in_flight = self.data.images_in_flight[image_index];
        if !image_in_flight.is_null() {
            self.device
                .wait_for_fences(&[image_in_flight], true, u64::max_value())?;
        }
        self.data.images_in_flight[image_index] = in_flight_fence;

        let wait_semaphores = &[self.data.image_available_semaphores[self.frame]];
        // the color write is the only part of the pipeline that actually
        // needs the acquired image, earlier stages may run before the
        // semaphore fires
        let wait_stages = &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = &[self.data.command_buffers[image_index]];
        let signal_semaphores = &[self.data.render_finished_semaphores[self.frame]];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(wait_semaphores)
            .wait_dst_stage_mask(wait_stages)
            .command_buffers(command_buffers)
            .signal_semaphores(signal_semaphores);

        self.device.reset_fences(&[in_flight_fence])?;
        self.device
            .queue_submit(self.data.graphics_queue, &[submit_info], in_flight_fence)?;

        let swapchains = &[self.data.swapchain];
        let image_indices = &[image_index as u32];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(signal_semaphores)
            .swapchains(swapchains)
            .image_indices(image_indices);

        let result = self
            .device
            .queue_present_khr(self.data.present_queue, &present_info);

        // a suboptimal swapchain still presents, but recreate anyway so the
        // images match the surface again
        let changed = result == Ok(vk::SuccessCode::SUBOPTIMAL_KHR)
            || result == Err(vk::ErrorCode::OUT_OF_DATE_KHR);
        if self.resized || changed {
            self.resized = false;
            self.recreate_swapchain(window)?;
        } else if let Err(e) = result {
            return Err(anyhow!(e));
        }

        self.frame = (self.frame + 1) % MAX_FRAMES_IN_FLIGHT;

        Ok(())
    }

    /// replaces the swapchain and everything derived from it, typically
    /// after a window resize
    pub unsafe fn recreate_swapchain(&mut self, window: &Window) -> Result<()> {
        debug!("Recreating swapchain");

        self.device.device_wait_idle()?;
        self.destroy_swapchain_dependents();

        // create_swapchain passes the previous handle as old_swapchain and
        // disposes of it together with the old image views
        swapchain::create_swapchain(
            window,
            &self.instance,
            &self.device,
            &mut self.data,
            &self.settings,
        )?;
        swapchain::create_swapchain_image_views(&self.device, &mut self.data)?;
        render_pass::create_render_pass(&self.device, &mut self.data)?;
        pipeline::create_pipeline(&self.device, &mut self.data)?;
        framebuffer::create_framebuffers(&self.device, &mut self.data)?;
        command_buffer::create_command_buffers(&self.device, &mut self.data)?;

        // the old images are gone, no frame owns the new ones yet
        self.data.images_in_flight = self
            .data
            .swapchain_images
            .iter()
            .map(|_| vk::Fence::null())
            .collect();

        Ok(())
    }

    /// destroys everything that depends on the swapchain dimensions or
    /// format; the image views and the swapchain itself stay alive, they
    /// are replaced through the old-swapchain path on recreation
    unsafe fn destroy_swapchain_dependents(&mut self) {
        self.data
            .framebuffers
            .drain(..)
            .for_each(|f| self.device.destroy_framebuffer(f, None));

        self.device
            .free_command_buffers(self.data.command_pool, &self.data.command_buffers);
        self.data.command_buffers.clear();

        self.device.destroy_pipeline(self.data.pipeline, None);
        self.device
            .destroy_pipeline_layout(self.data.pipeline_layout, None);
        self.device.destroy_render_pass(self.data.render_pass, None);
    }

    /// destroys the app, in reverse bring-up order
    pub unsafe fn destroy(&mut self) {
        // pending work keeps handles alive, let it drain first; teardown
        // continues even if the wait itself reports a loss
        if let Err(e) = self.device.device_wait_idle() {
            error!("device_wait_idle failed during teardown: {}", e);
        }

        self.destroy_swapchain_dependents();

        for fence in self.data.in_flight_fences.drain(..) {
            self.device.destroy_fence(fence, None);
        }
        for semaphore in self.data.render_finished_semaphores.drain(..) {
            self.device.destroy_semaphore(semaphore, None);
        }
        for semaphore in self.data.image_available_semaphores.drain(..) {
            self.device.destroy_semaphore(semaphore, None);
        }

        self.device.destroy_buffer(self.data.index_buffer, None);
        self.device.free_memory(self.data.index_buffer_memory, None);
        self.device.destroy_buffer(self.data.vertex_buffer, None);
        self.device.free_memory(self.data.vertex_buffer_memory, None);

        // destroying the command pool frees any remaining command buffers
        self.device
            .destroy_command_pool(self.data.command_pool, None);

        self.data
            .swapchain_image_views
            .drain(..)
            .for_each(|v| self.device.destroy_image_view(v, None));
        self.device.destroy_swapchain_khr(self.data.swapchain, None);

        self.device.destroy_device(None);

        // the messenger (when validation was on) has to go before the
        // instance it is registered with
        if !self.data.messenger.is_null() {
            self.instance
                .destroy_debug_utils_messenger_ext(self.data.messenger, None);
        }

        self.instance.destroy_surface_khr(self.data.surface, None);
        self.instance.destroy_instance(None);
    }
}
