// =============================================================================
// DEAR IMGUI ON VULKAN - minimal winit + ash + imgui application
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  App<DemoApp> (winit event loop, frame cycle)                   │
// │    ├── Gui (imgui context, winit platform, Vulkan renderer)     │
// │    ├── WindowSurface (surface, swapchain, per-image frames)     │
// │    └── GpuContext (instance, device, queue, descriptor pool)    │
// └─────────────────────────────────────────────────────────────────┘
//
// Any Vulkan failure ends the process with the failing VkResult as the exit
// code; missing platform support exits with 1.
//
// =============================================================================

mod backend;
mod config;
mod demo;
mod driver;
mod error;
mod frame;
mod gui;
mod plot;

use config::Config;
use demo::DemoApp;
use driver::App;

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() {
    init_logging();

    // Load configuration from config.toml
    let config = Config::load();
    let settings = config.app_settings();

    log::info!("Starting {}", settings.title);
    log::info!(
        "Window: {}x{}, present mode: {:?}, demo window: {}",
        settings.width,
        settings.height,
        settings.present_mode,
        settings.show_demo
    );

    let app = App::new(settings, DemoApp::new(config.demo));
    if let Err(e) = app.run() {
        let code = error::exit_code(&e);
        log::error!("Fatal error (exit code {}): {:#}", code, e);
        std::process::exit(code);
    }
}

/// Initialize logging; RUST_LOG overrides the default Info level.
fn init_logging() {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();
}
