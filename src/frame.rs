// Frame cycle bookkeeping
//
// Acquire and present can report that the swapchain no longer matches the
// surface. Such a frame is dropped, the swapchain is marked stale, and it is
// rebuilt at the start of a later frame once the window has a non-zero
// framebuffer. Everything here is independent of the GPU so the loop's
// decisions can be exercised with a scripted presenter.

use anyhow::Result;
use ash::prelude::VkResult;
use ash::vk;

/// Outcome of rendering or presenting one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Rendered,
    /// The swapchain is out of date or suboptimal; the frame was dropped.
    Stale,
}

/// Interpret `vkAcquireNextImageKHR`. `Ok(None)` means the swapchain is stale.
pub fn acquire_status(result: VkResult<(u32, bool)>) -> VkResult<Option<u32>> {
    match result {
        Ok((_, true)) => Ok(None),
        Ok((index, false)) => Ok(Some(index)),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Interpret `vkQueuePresentKHR`.
pub fn present_status(result: VkResult<bool>) -> VkResult<FrameStatus> {
    match result {
        Ok(false) => Ok(FrameStatus::Rendered),
        Ok(true) => Ok(FrameStatus::Stale),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) | Err(vk::Result::SUBOPTIMAL_KHR) => {
            Ok(FrameStatus::Stale)
        }
        Err(e) => Err(e),
    }
}

/// A window surface that can render and present GUI draw data.
pub trait Presenter {
    type DrawData: ?Sized;

    /// Current framebuffer size of the window, zero while minimized.
    fn framebuffer_size(&self) -> [u32; 2];

    /// Recreate every swapchain-dependent resource and reset the frame index.
    fn rebuild_swapchain(&mut self, width: u32, height: u32) -> Result<()>;

    /// Acquire an image, then record and submit the draw data into it.
    fn render(&mut self, draw_data: &Self::DrawData) -> Result<FrameStatus>;

    /// Queue the image rendered by the last successful `render`.
    fn present(&mut self) -> Result<FrameStatus>;
}

/// Tracks whether the swapchain needs a rebuild across frames.
#[derive(Debug, Default)]
pub struct FrameCycle {
    stale: bool,
    presented: u64,
    skipped: u64,
}

impl FrameCycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    #[cfg(test)]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Rebuild a stale swapchain if the window currently has an area.
    ///
    /// Returns `true` when a rebuild happened.
    pub fn prepare<P: Presenter>(&mut self, presenter: &mut P) -> Result<bool> {
        if !self.stale {
            return Ok(false);
        }

        let [width, height] = presenter.framebuffer_size();
        if width == 0 || height == 0 {
            return Ok(false);
        }

        log::debug!("Rebuilding swapchain at {}x{}", width, height);
        presenter.rebuild_swapchain(width, height)?;
        self.stale = false;
        Ok(true)
    }

    /// Render and present one frame.
    ///
    /// Present is skipped when render already found the swapchain stale.
    pub fn submit<P: Presenter>(
        &mut self,
        presenter: &mut P,
        draw_data: &P::DrawData,
    ) -> Result<FrameStatus> {
        if self.stale {
            self.skipped += 1;
            return Ok(FrameStatus::Stale);
        }

        let status = match presenter.render(draw_data)? {
            FrameStatus::Rendered => presenter.present()?,
            FrameStatus::Stale => FrameStatus::Stale,
        };

        match status {
            FrameStatus::Rendered => self.presented += 1,
            FrameStatus::Stale => {
                self.stale = true;
                self.skipped += 1;
            }
        }

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Presenter driven by scripted Vulkan results.
    struct ScriptedPresenter {
        size: [u32; 2],
        acquires: VecDeque<VkResult<(u32, bool)>>,
        presents: VecDeque<VkResult<bool>>,
        calls: Vec<String>,
        frame_index: u32,
    }

    impl ScriptedPresenter {
        fn new(size: [u32; 2]) -> Self {
            Self {
                size,
                acquires: VecDeque::new(),
                presents: VecDeque::new(),
                calls: Vec::new(),
                frame_index: 3,
            }
        }
    }

    impl Presenter for ScriptedPresenter {
        type DrawData = ();

        fn framebuffer_size(&self) -> [u32; 2] {
            self.size
        }

        fn rebuild_swapchain(&mut self, width: u32, height: u32) -> Result<()> {
            self.calls.push(format!("rebuild {}x{}", width, height));
            self.frame_index = 0;
            Ok(())
        }

        fn render(&mut self, _: &()) -> Result<FrameStatus> {
            self.calls.push("acquire".to_string());
            let result = self.acquires.pop_front().unwrap_or(Ok((0, false)));
            match acquire_status(result)? {
                Some(index) => {
                    self.frame_index = index;
                    self.calls.push("submit".to_string());
                    Ok(FrameStatus::Rendered)
                }
                None => Ok(FrameStatus::Stale),
            }
        }

        fn present(&mut self) -> Result<FrameStatus> {
            self.calls.push("present".to_string());
            let result = self.presents.pop_front().unwrap_or(Ok(false));
            Ok(present_status(result)?)
        }
    }

    #[test]
    fn test_acquire_status_mapping() {
        assert_eq!(acquire_status(Ok((2, false))), Ok(Some(2)));
        assert_eq!(acquire_status(Ok((2, true))), Ok(None));
        assert_eq!(acquire_status(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)), Ok(None));
        assert_eq!(
            acquire_status(Err(vk::Result::ERROR_DEVICE_LOST)),
            Err(vk::Result::ERROR_DEVICE_LOST)
        );
    }

    #[test]
    fn test_present_status_mapping() {
        assert_eq!(present_status(Ok(false)), Ok(FrameStatus::Rendered));
        assert_eq!(present_status(Ok(true)), Ok(FrameStatus::Stale));
        assert_eq!(
            present_status(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)),
            Ok(FrameStatus::Stale)
        );
        assert_eq!(
            present_status(Err(vk::Result::ERROR_SURFACE_LOST_KHR)),
            Err(vk::Result::ERROR_SURFACE_LOST_KHR)
        );
    }

    #[test]
    fn test_healthy_frame_presents() {
        let mut presenter = ScriptedPresenter::new([800, 600]);
        let mut cycle = FrameCycle::new();

        assert!(!cycle.prepare(&mut presenter).unwrap());
        assert_eq!(cycle.submit(&mut presenter, &()).unwrap(), FrameStatus::Rendered);
        assert_eq!(presenter.calls, ["acquire", "submit", "present"]);
        assert_eq!(cycle.presented(), 1);
    }

    #[test]
    fn test_out_of_date_acquire_skips_present() {
        let mut presenter = ScriptedPresenter::new([800, 600]);
        presenter.acquires.push_back(Err(vk::Result::ERROR_OUT_OF_DATE_KHR));
        let mut cycle = FrameCycle::new();

        assert_eq!(cycle.submit(&mut presenter, &()).unwrap(), FrameStatus::Stale);
        assert_eq!(presenter.calls, ["acquire"]);
        assert!(cycle.is_stale());
        assert_eq!(cycle.skipped(), 1);
    }

    #[test]
    fn test_suboptimal_present_marks_stale() {
        let mut presenter = ScriptedPresenter::new([800, 600]);
        presenter.presents.push_back(Ok(true));
        let mut cycle = FrameCycle::new();

        assert_eq!(cycle.submit(&mut presenter, &()).unwrap(), FrameStatus::Stale);
        assert!(cycle.is_stale());
    }

    #[test]
    fn test_stale_waits_for_nonzero_extent_then_recovers() {
        let mut presenter = ScriptedPresenter::new([800, 600]);
        presenter.acquires.push_back(Err(vk::Result::ERROR_OUT_OF_DATE_KHR));
        let mut cycle = FrameCycle::new();

        cycle.submit(&mut presenter, &()).unwrap();
        assert!(cycle.is_stale());

        // Minimized: nothing is rebuilt and nothing is rendered.
        presenter.size = [0, 600];
        assert!(!cycle.prepare(&mut presenter).unwrap());
        assert_eq!(cycle.submit(&mut presenter, &()).unwrap(), FrameStatus::Stale);
        assert_eq!(presenter.calls, ["acquire"]);

        // Restored: rebuild, then a normal frame.
        presenter.size = [1024, 768];
        assert!(cycle.prepare(&mut presenter).unwrap());
        assert!(!cycle.is_stale());
        assert_eq!(presenter.frame_index, 0);
        assert_eq!(cycle.submit(&mut presenter, &()).unwrap(), FrameStatus::Rendered);
        assert_eq!(
            presenter.calls,
            ["acquire", "rebuild 1024x768", "acquire", "submit", "present"]
        );
        assert_eq!(cycle.presented(), 1);
        assert_eq!(cycle.skipped(), 2);
    }

    #[test]
    fn test_fatal_acquire_error_propagates() {
        let mut presenter = ScriptedPresenter::new([800, 600]);
        presenter.acquires.push_back(Err(vk::Result::ERROR_DEVICE_LOST));
        let mut cycle = FrameCycle::new();

        let err = cycle.submit(&mut presenter, &()).unwrap_err();
        assert_eq!(err.downcast_ref::<vk::Result>(), Some(&vk::Result::ERROR_DEVICE_LOST));
        assert!(!cycle.is_stale());
    }
}
