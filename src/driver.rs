// =============================================================================
// DRIVER - window, graphics context, GUI, and the per-frame cycle
// =============================================================================
//
// FRAME FLOW:
// 1. Window events are fed to the GUI as they arrive
// 2. Rebuild the swapchain if it went stale and the window has an area
// 3. Begin a GUI frame, let the FrameRenderer draw, optionally the demo
// 4. Acquire, wait fence, record, submit
// 5. Present
//
// Shutdown mirrors initialization: GUI, window surface, GPU context, window.

use anyhow::Result;
use raw_window_handle::HasDisplayHandle;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::backend::{FrameTarget, GpuContext, WindowSurface};
use crate::config::AppSettings;
use crate::error::StartupError;
use crate::frame::FrameCycle;
use crate::gui::{self, Gui};

/// Per-frame GUI content supplied by the application.
pub trait FrameRenderer {
    /// Issue the widgets for one frame.
    fn render_frame(&mut self, ui: &imgui::Ui);
}

/// A device that has to finish its queued work before anything built on
/// it is destroyed.
pub trait WaitIdle {
    fn wait_idle(&self) -> Result<()>;
}

impl WaitIdle for GpuContext {
    fn wait_idle(&self) -> Result<()> {
        GpuContext::wait_idle(self)
    }
}

/// Everything `init` creates, in acquisition order.
struct Resources<W, G, S, U> {
    window: Option<W>,
    gpu: Option<G>,
    surface: Option<S>,
    gui: Option<U>,
}

impl<W, G: WaitIdle, S, U> Resources<W, G, S, U> {
    fn empty() -> Self {
        Self {
            window: None,
            gpu: None,
            surface: None,
            gui: None,
        }
    }

    /// Wait for the device, then drop GUI, surface, device and window.
    ///
    /// Returns `false` when there was nothing left to release.
    fn release(&mut self) -> bool {
        if self.window.is_none() && self.gpu.is_none() && self.surface.is_none() && self.gui.is_none() {
            return false;
        }

        if let Some(gpu) = &self.gpu {
            // Wait for GPU to finish before destroying anything
            if let Err(e) = gpu.wait_idle() {
                log::error!("{:#}", e);
            }
        }

        if self.gui.take().is_some() {
            log::info!("GUI destroyed");
        }
        self.surface = None;
        self.gpu = None;
        self.window = None;
        true
    }
}

/// Owns every resource and drives the render loop.
///
/// Resources are held in acquisition order and released in reverse by
/// [`App::shutdown`].
pub struct App<R> {
    settings: AppSettings,
    show_demo: bool,
    frame_renderer: R,
    cycle: FrameCycle,
    resources: Resources<Arc<Window>, GpuContext, WindowSurface, Gui>,

    /// First fatal error; ends the event loop
    fatal: Option<anyhow::Error>,
}

impl<R: FrameRenderer> App<R> {
    pub fn new(settings: AppSettings, frame_renderer: R) -> Self {
        Self {
            show_demo: settings.show_demo,
            settings,
            frame_renderer,
            cycle: FrameCycle::new(),
            resources: Resources::empty(),
            fatal: None,
        }
    }

    /// Run until the window closes or a fatal error occurs.
    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run_app(&mut self)?;

        self.shutdown();
        log::info!(
            "Presented {} frames, skipped {}",
            self.cycle.presented(),
            self.cycle.skipped()
        );

        match self.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    /// Create window, Vulkan context, window surface and GUI, in that order.
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        log::info!(
            "Creating window: {}x{} ({})",
            self.settings.width,
            self.settings.height,
            self.settings.title
        );

        let window_attributes = Window::default_attributes()
            .with_title(&self.settings.title)
            .with_inner_size(PhysicalSize::new(self.settings.width, self.settings.height));
        let window = event_loop
            .create_window(window_attributes)
            .map_err(|e| StartupError::Window(e.to_string()))?;
        let window = Arc::new(window);

        let gpu = GpuContext::new(
            &self.settings.title,
            window.display_handle()?.as_raw(),
            self.settings.validation,
        )?;
        let surface = WindowSurface::new(&gpu, &window, &self.settings)?;
        let gui = Gui::new(&gpu, &window, &surface)?;

        self.resources = Resources {
            window: Some(window),
            gpu: Some(gpu),
            surface: Some(surface),
            gui: Some(gui),
        };

        log::info!("Initialization complete");
        Ok(())
    }

    // =========================================================================
    // RENDER LOOP
    // =========================================================================

    fn frame(&mut self) -> Result<()> {
        let resources = &mut self.resources;
        let (Some(window), Some(gpu), Some(surface), Some(gui)) = (
            resources.window.as_deref(),
            resources.gpu.as_ref(),
            resources.surface.as_mut(),
            resources.gui.as_mut(),
        ) else {
            return Ok(());
        };

        let (draw_data, renderer) = {
            let mut target = FrameTarget {
                gpu,
                window,
                surface: &mut *surface,
                renderer: gui.renderer_mut(),
            };
            self.cycle.prepare(&mut target)?;

            let frame_renderer = &mut self.frame_renderer;
            let show_demo = &mut self.show_demo;
            gui.draw(window, |ui| {
                frame_renderer.render_frame(ui);
                if *show_demo {
                    ui.show_demo_window(show_demo);
                }
            })?
        };

        if gui::is_minimized(draw_data.display_size) {
            return Ok(());
        }

        let mut target = FrameTarget {
            gpu,
            window,
            surface,
            renderer,
        };
        self.cycle.submit(&mut target, draw_data)?;

        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{:#}", err);
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
        event_loop.exit();
    }
}

impl<R> App<R> {
    // =========================================================================
    // CLEANUP
    // =========================================================================

    /// Release everything in reverse order of acquisition. Safe to call twice.
    pub fn shutdown(&mut self) {
        if self.resources.release() {
            log::info!("Shutdown complete");
        }
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl<R: FrameRenderer> ApplicationHandler for App<R> {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.resources.window.is_some() {
            return;
        }

        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let resources = &mut self.resources;
        if let (Some(window), Some(gui)) = (resources.window.as_deref(), resources.gui.as_mut()) {
            gui.handle_event(window, window_id, &event);
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                self.cycle.mark_stale();
            }

            WindowEvent::RedrawRequested => {
                if let Err(e) = self.frame() {
                    self.fail(event_loop, e);
                }
            }

            _ => {}
        }
    }

    /// Request continuous redraws; the present mode paces the loop.
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.resources.window {
            window.request_redraw();
        }
    }
}

impl<R> Drop for App<R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Records its own drop.
    struct Tracked(&'static str, Log);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.1.borrow_mut().push(format!("drop {}", self.0));
        }
    }

    /// Records the idle wait and its drop.
    struct TrackedGpu(Log);

    impl WaitIdle for TrackedGpu {
        fn wait_idle(&self) -> Result<()> {
            self.0.borrow_mut().push("wait idle".to_string());
            Ok(())
        }
    }

    impl Drop for TrackedGpu {
        fn drop(&mut self) {
            self.0.borrow_mut().push("drop gpu".to_string());
        }
    }

    fn full(log: &Log) -> Resources<Tracked, TrackedGpu, Tracked, Tracked> {
        Resources {
            window: Some(Tracked("window", log.clone())),
            gpu: Some(TrackedGpu(log.clone())),
            surface: Some(Tracked("surface", log.clone())),
            gui: Some(Tracked("gui", log.clone())),
        }
    }

    #[test]
    fn test_release_reverses_acquisition_order() {
        let log = Log::default();
        let mut resources = full(&log);

        assert!(resources.release());
        assert_eq!(
            *log.borrow(),
            ["wait idle", "drop gui", "drop surface", "drop gpu", "drop window"]
        );
    }

    #[test]
    fn test_second_release_is_noop() {
        let log = Log::default();
        let mut resources = full(&log);

        assert!(resources.release());
        let after_first = log.borrow().len();
        assert!(!resources.release());
        assert_eq!(log.borrow().len(), after_first);
    }

    #[test]
    fn test_release_after_partial_init() {
        let log = Log::default();
        let mut resources: Resources<Tracked, TrackedGpu, Tracked, Tracked> = Resources {
            window: Some(Tracked("window", log.clone())),
            gpu: Some(TrackedGpu(log.clone())),
            ..Resources::empty()
        };

        assert!(resources.release());
        assert_eq!(*log.borrow(), ["wait idle", "drop gpu", "drop window"]);
    }

    #[test]
    fn test_release_without_device_skips_idle_wait() {
        let log = Log::default();
        let mut resources: Resources<Tracked, TrackedGpu, Tracked, Tracked> = Resources {
            window: Some(Tracked("window", log.clone())),
            ..Resources::empty()
        };

        assert!(resources.release());
        assert_eq!(*log.borrow(), ["drop window"]);
    }
}
