// Fatal error kinds and their process exit codes.
//
// Vulkan failures travel as `vk::Result` inside anyhow errors; missing
// platform support is a StartupError. Neither is recovered from.

use ash::vk;
use thiserror::Error;

/// Environment failures that make startup impossible.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Vulkan loader unavailable: {0}")]
    LoaderUnavailable(String),
    #[error("no Vulkan-capable GPU found")]
    NoPhysicalDevice,
    #[error("no queue family with graphics support")]
    NoGraphicsQueue,
    #[error("no WSI support on the selected physical device")]
    NoSurfaceSupport,
    #[error("failed to create window: {0}")]
    Window(String),
    #[error("min_image_count must be at least 2, got {0}")]
    InvalidImageCount(u32),
}

/// Fixed code for environment failures.
pub const ENVIRONMENT_FAILURE: i32 = 1;

/// Map a fatal error to the process exit code.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(result) = cause.downcast_ref::<vk::Result>() {
            let code = result.as_raw();
            return if code == 0 { ENVIRONMENT_FAILURE } else { code };
        }
    }
    ENVIRONMENT_FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_vulkan_result_is_exit_code() {
        let err = anyhow::Error::new(vk::Result::ERROR_DEVICE_LOST);
        assert_eq!(exit_code(&err), vk::Result::ERROR_DEVICE_LOST.as_raw());
    }

    #[test]
    fn test_context_does_not_hide_vulkan_result() {
        let result: Result<(), vk::Result> = Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        let err = result.context("Failed to create descriptor pool").unwrap_err();
        assert_eq!(exit_code(&err), -1);
    }

    #[test]
    fn test_environment_failure_is_one() {
        let err = anyhow::Error::new(StartupError::NoSurfaceSupport);
        assert_eq!(exit_code(&err), ENVIRONMENT_FAILURE);

        let err = anyhow::anyhow!("something else");
        assert_eq!(exit_code(&err), ENVIRONMENT_FAILURE);
    }
}
