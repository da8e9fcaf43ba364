// GUI overlay - imgui context, winit platform glue, and the Vulkan renderer
//
// Field order is drop order: the renderer releases its GPU objects before
// the platform and the imgui context go away.

use anyhow::{Context, Result};
use imgui::{ConfigFlags, FontSource};
use imgui_rs_vulkan_renderer::{Options, Renderer};
use imgui_winit_support::{HiDpiMode, WinitPlatform};
use std::time::Instant;
use winit::event::{Event, WindowEvent};
use winit::window::{Window, WindowId};

use crate::backend::{GpuContext, WindowSurface};

pub struct Gui {
    renderer: Renderer,
    platform: WinitPlatform,
    context: imgui::Context,
    last_frame: Instant,
}

impl Gui {
    /// Set up imgui for `window` and build its renderer on `surface`'s render pass.
    ///
    /// Building the renderer uploads the font atlas with a one-shot command
    /// buffer from the context's upload pool and waits for it to finish.
    pub fn new(gpu: &GpuContext, window: &Window, surface: &WindowSurface) -> Result<Self> {
        let mut context = imgui::Context::create();
        context.set_ini_filename(None);
        context.io_mut().config_flags |= gui_config_flags();
        context.style_mut().use_dark_colors();

        let mut platform = WinitPlatform::new(&mut context);
        platform.attach_window(context.io_mut(), window, HiDpiMode::Default);

        context
            .fonts()
            .add_font(&[FontSource::DefaultFontData { config: None }]);

        let in_flight_frames = surface.image_count().max(surface.min_image_count()) as usize;
        let renderer = Renderer::with_default_allocator(
            &gpu.instance,
            gpu.physical_device,
            gpu.device.clone(),
            gpu.queue,
            gpu.upload_pool,
            surface.render_pass,
            &mut context,
            Some(Options {
                in_flight_frames,
                ..Default::default()
            }),
        )
        .context("Failed to initialize GUI renderer")?;

        log::info!("GUI initialized ({} frames in flight)", in_flight_frames);

        Ok(Self {
            renderer,
            platform,
            context,
            last_frame: Instant::now(),
        })
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    /// Forward a window event to imgui's input state.
    pub fn handle_event(&mut self, window: &Window, window_id: WindowId, event: &WindowEvent) {
        let event: Event<()> = Event::WindowEvent {
            window_id,
            event: event.clone(),
        };
        self.platform
            .handle_event(self.context.io_mut(), window, &event);
    }

    /// Run one GUI frame through `build` and return the finished draw data
    /// together with the renderer that can record it.
    pub fn draw(
        &mut self,
        window: &Window,
        build: impl FnOnce(&imgui::Ui),
    ) -> Result<(&imgui::DrawData, &mut Renderer)> {
        let Self {
            renderer,
            platform,
            context,
            last_frame,
        } = self;

        let now = Instant::now();
        context.io_mut().update_delta_time(now - *last_frame);
        *last_frame = now;

        platform
            .prepare_frame(context.io_mut(), window)
            .context("Failed to prepare GUI frame")?;

        let ui = context.new_frame();
        build(ui);
        platform.prepare_render(ui, window);

        Ok((context.render(), renderer))
    }
}

/// Keyboard navigation and docking; platform windows stay off.
pub fn gui_config_flags() -> ConfigFlags {
    ConfigFlags::NAV_ENABLE_KEYBOARD | ConfigFlags::DOCKING_ENABLE
}

/// A draw list with no visible area belongs to a minimized window.
pub fn is_minimized(display_size: [f32; 2]) -> bool {
    display_size[0] <= 0.0 || display_size[1] <= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimized_detection() {
        assert!(is_minimized([0.0, 720.0]));
        assert!(is_minimized([1280.0, 0.0]));
        assert!(!is_minimized([1280.0, 720.0]));
    }

    #[test]
    fn test_config_flags_enable_docking_without_viewports() {
        let flags = gui_config_flags();
        assert!(flags.contains(ConfigFlags::NAV_ENABLE_KEYBOARD));
        assert!(flags.contains(ConfigFlags::DOCKING_ENABLE));
        assert!(!flags.contains(ConfigFlags::VIEWPORTS_ENABLE));
    }
}
