// Backend module - Vulkan layer under the GUI
//
// Design: Thin wrapper around ash. No globals; the context is passed by
// reference to whatever needs device handles.

pub mod device;
pub mod render_pass;
pub mod swapchain;
pub mod sync;
pub mod teardown;
pub mod window;

pub use device::GpuContext;
pub use window::{FrameTarget, WindowSurface};
