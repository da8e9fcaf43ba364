// Window surface - everything that lives and dies with the swapchain
//
// Owns the VkSurfaceKHR, the swapchain, the render pass, and the per-image
// frames. render() and present() implement one acquire/submit/present round
// trip; rebuild() recreates the swapchain-dependent set after a resize.

use anyhow::{Context, Result};
use ash::vk;
use imgui_rs_vulkan_renderer::Renderer;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::window::Window;

use super::render_pass::{create_framebuffers, create_render_pass};
use super::swapchain::{select_present_mode, select_surface_format, Swapchain};
use super::sync::{Frame, FrameSemaphores};
use super::teardown::create_all;
use super::GpuContext;
use crate::config::AppSettings;
use crate::error::StartupError;
use crate::frame::{acquire_status, present_status, FrameStatus, Presenter};

pub struct WindowSurface {
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    min_image_count: u32,
    pub render_pass: vk::RenderPass,
    swapchain: Option<Swapchain>,
    framebuffers: Vec<vk::Framebuffer>,
    frames: Vec<Frame>,
    semaphores: Vec<FrameSemaphores>,
    /// Swapchain image acquired for the frame being recorded
    frame_index: u32,
    /// Semaphore pair used by the next acquire
    semaphore_index: u32,
    clear_value: vk::ClearValue,
    device: ash::Device,
    queue: vk::Queue,
    wait_stages: [vk::PipelineStageFlags; 1],
}

impl WindowSurface {
    /// Create the surface for `window` and its first swapchain.
    pub fn new(gpu: &GpuContext, window: &Window, settings: &AppSettings) -> Result<Self> {
        if settings.min_image_count < 2 {
            return Err(StartupError::InvalidImageCount(settings.min_image_count).into());
        }

        let surface_loader = ash::khr::surface::Instance::new(&gpu.entry, &gpu.instance);

        let surface = unsafe {
            ash_window::create_surface(
                &gpu.entry,
                &gpu.instance,
                window.display_handle()?.as_raw(),
                window.window_handle()?.as_raw(),
                None,
            )
        }
        .context("Failed to create window surface")?;

        let (surface_format, present_mode, render_pass) =
            match Self::configure(gpu, &surface_loader, surface, settings) {
                Ok(configured) => configured,
                Err(e) => {
                    unsafe { surface_loader.destroy_surface(surface, None) };
                    return Err(e);
                }
            };

        let mut window_surface = Self {
            surface,
            surface_loader,
            surface_format,
            present_mode,
            min_image_count: settings.min_image_count,
            render_pass,
            swapchain: None,
            framebuffers: Vec::new(),
            frames: Vec::new(),
            semaphores: Vec::new(),
            frame_index: 0,
            semaphore_index: 0,
            clear_value: settings.clear_value(),
            device: gpu.device.clone(),
            queue: gpu.queue,
            wait_stages: [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
        };

        let size = window.inner_size();
        window_surface.rebuild(gpu, size.width, size.height)?;

        Ok(window_surface)
    }

    /// Check WSI support, pick format and present mode for `surface`, and
    /// create the render pass. The caller destroys the surface on failure.
    fn configure(
        gpu: &GpuContext,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        settings: &AppSettings,
    ) -> Result<(vk::SurfaceFormatKHR, vk::PresentModeKHR, vk::RenderPass)> {
        // Check for WSI support on the queue family picked for graphics
        let supported = unsafe {
            surface_loader.get_physical_device_surface_support(
                gpu.physical_device,
                gpu.queue_family,
                surface,
            )
        }
        .context("Failed to query surface support")?;
        if !supported {
            return Err(StartupError::NoSurfaceSupport.into());
        }

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(gpu.physical_device, surface)
        }
        .context("Failed to query surface formats")?;
        let surface_format = select_surface_format(&formats).context("Surface reports no formats")?;

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(gpu.physical_device, surface)
        }
        .context("Failed to query present modes")?;
        let present_mode = select_present_mode(&present_modes, settings.present_mode);

        log::info!(
            "Surface format: {:?} / {:?}, present mode: {:?}",
            surface_format.format,
            surface_format.color_space,
            present_mode
        );

        let render_pass = create_render_pass(&gpu.device, surface_format.format)?;

        Ok((surface_format, present_mode, render_pass))
    }

    pub fn image_count(&self) -> u32 {
        self.swapchain.as_ref().map_or(0, Swapchain::image_count)
    }

    pub fn min_image_count(&self) -> u32 {
        self.min_image_count
    }

    /// Recreate swapchain, framebuffers and frames at the given size.
    pub fn rebuild(&mut self, gpu: &GpuContext, width: u32, height: u32) -> Result<()> {
        // Nothing may still reference the frames we are about to destroy
        gpu.wait_idle()?;
        self.destroy_frames();

        let old = self.swapchain.take();
        let swapchain = Swapchain::new(
            gpu,
            self.surface,
            &self.surface_loader,
            self.surface_format,
            self.present_mode,
            self.min_image_count,
            width,
            height,
            old.as_ref(),
        )?;
        drop(old);

        // Stored before its dependents so a failure below is cleaned up by
        // the next rebuild or by drop.
        let swapchain = self.swapchain.insert(swapchain);
        let image_count = swapchain.image_count() as usize;

        self.framebuffers = create_framebuffers(
            &self.device,
            &swapchain.image_views,
            self.render_pass,
            swapchain.extent,
        )?;

        let device = &self.device;
        self.frames = create_all(
            image_count,
            |_| Frame::new(device, gpu.queue_family),
            |frame| frame.destroy(device),
        )?;
        self.semaphores = create_all(
            image_count,
            |_| FrameSemaphores::new(device),
            |semaphores| semaphores.destroy(device),
        )?;

        self.frame_index = 0;
        self.semaphore_index = 0;

        Ok(())
    }

    /// Acquire an image and record + submit the GUI draw data into it.
    pub fn render(&mut self, renderer: &mut Renderer, draw_data: &imgui::DrawData) -> Result<FrameStatus> {
        let swapchain = self.swapchain.as_ref().context("Swapchain not initialized")?;
        let semaphores = &self.semaphores[self.semaphore_index as usize];

        let acquired = acquire_status(swapchain.acquire_next_image(semaphores.image_acquired))
            .context("Failed to acquire swapchain image")?;
        let Some(image_index) = acquired else {
            return Ok(FrameStatus::Stale);
        };
        self.frame_index = image_index;

        let frame = &self.frames[image_index as usize];
        let framebuffer = self.framebuffers[image_index as usize];
        let cmd = frame.command_buffer;

        unsafe {
            // Wait for the last submission that used this image
            self.device
                .wait_for_fences(&[frame.fence], true, u64::MAX)
                .context("Failed to wait for frame fence")?;
            self.device
                .reset_fences(&[frame.fence])
                .context("Failed to reset frame fence")?;

            self.device
                .reset_command_pool(frame.command_pool, vk::CommandPoolResetFlags::empty())
                .context("Failed to reset frame command pool")?;
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.device
                .begin_command_buffer(cmd, &begin_info)
                .context("Failed to begin command buffer")?;

            let clear_values = [self.clear_value];
            let render_pass_info = vk::RenderPassBeginInfo::default()
                .render_pass(self.render_pass)
                .framebuffer(framebuffer)
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent: swapchain.extent,
                })
                .clear_values(&clear_values);
            self.device
                .cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
        }

        renderer
            .cmd_draw(cmd, draw_data)
            .context("Failed to record GUI draw data")?;

        unsafe {
            self.device.cmd_end_render_pass(cmd);
            self.device
                .end_command_buffer(cmd)
                .context("Failed to end command buffer")?;

            let wait_semaphores = [semaphores.image_acquired];
            let signal_semaphores = [semaphores.render_complete];
            let command_buffers = [cmd];
            let submit_info = vk::SubmitInfo::default()
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&self.wait_stages)
                .command_buffers(&command_buffers)
                .signal_semaphores(&signal_semaphores);

            self.device
                .queue_submit(self.queue, &[submit_info], frame.fence)
                .context("Failed to submit frame")?;
        }

        Ok(FrameStatus::Rendered)
    }

    /// Present the image recorded by the last `render`.
    pub fn present(&mut self) -> Result<FrameStatus> {
        let swapchain = self.swapchain.as_ref().context("Swapchain not initialized")?;
        let semaphores = &self.semaphores[self.semaphore_index as usize];

        let status = present_status(swapchain.present(
            self.queue,
            self.frame_index,
            semaphores.render_complete,
        ))
        .context("Failed to present swapchain image")?;

        if status == FrameStatus::Rendered {
            // Now we can use the next set of semaphores
            self.semaphore_index = (self.semaphore_index + 1) % swapchain.image_count();
        }

        Ok(status)
    }

    fn destroy_frames(&mut self) {
        for frame in self.frames.drain(..) {
            frame.destroy(&self.device);
        }
        for semaphores in self.semaphores.drain(..) {
            semaphores.destroy(&self.device);
        }
        for framebuffer in self.framebuffers.drain(..) {
            unsafe { self.device.destroy_framebuffer(framebuffer, None) };
        }
    }
}

impl Drop for WindowSurface {
    fn drop(&mut self) {
        log::info!("Destroying window surface...");

        self.destroy_frames();
        self.swapchain = None;

        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

/// Borrowed view of everything one frame needs to reach the screen.
pub struct FrameTarget<'a> {
    pub gpu: &'a GpuContext,
    pub window: &'a Window,
    pub surface: &'a mut WindowSurface,
    pub renderer: &'a mut Renderer,
}

impl Presenter for FrameTarget<'_> {
    type DrawData = imgui::DrawData;

    fn framebuffer_size(&self) -> [u32; 2] {
        let size = self.window.inner_size();
        [size.width, size.height]
    }

    fn rebuild_swapchain(&mut self, width: u32, height: u32) -> Result<()> {
        self.surface.rebuild(self.gpu, width, height)
    }

    fn render(&mut self, draw_data: &imgui::DrawData) -> Result<FrameStatus> {
        self.surface.render(self.renderer, draw_data)
    }

    fn present(&mut self) -> Result<FrameStatus> {
        self.surface.present()
    }
}
