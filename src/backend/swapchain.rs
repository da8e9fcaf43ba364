// Swapchain - Window presentation
//
// Manages the chain of images we render to and present to the screen.
// Acquire and present hand back the raw Vulkan result; the frame cycle
// decides what out-of-date and suboptimal mean.

use anyhow::{Context, Result};
use ash::prelude::VkResult;
use ash::vk;

use super::GpuContext;

/// Surface formats we ask for, in order of preference.
const PREFERRED_FORMATS: [vk::Format; 4] = [
    vk::Format::B8G8R8A8_UNORM,
    vk::Format::R8G8B8A8_UNORM,
    vk::Format::B8G8R8_UNORM,
    vk::Format::R8G8B8_UNORM,
];
const PREFERRED_COLOR_SPACE: vk::ColorSpaceKHR = vk::ColorSpaceKHR::SRGB_NONLINEAR;

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub swapchain_loader: ash::khr::swapchain::Device,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub extent: vk::Extent2D,
    device: ash::Device,
}

impl Swapchain {
    /// Create a swapchain for `surface`, optionally replacing `old`.
    ///
    /// The caller destroys `old` afterwards by dropping it.
    pub fn new(
        gpu: &GpuContext,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
        surface_format: vk::SurfaceFormatKHR,
        present_mode: vk::PresentModeKHR,
        min_image_count: u32,
        width: u32,
        height: u32,
        old: Option<&Swapchain>,
    ) -> Result<Self> {
        let surface_caps = unsafe {
            surface_loader.get_physical_device_surface_capabilities(gpu.physical_device, surface)
        }
        .context("Failed to query surface capabilities")?;

        let extent = choose_extent(&surface_caps, width, height);
        let image_count = choose_image_count(&surface_caps, min_image_count);

        log::info!(
            "Creating swapchain: {}x{}, {} images, {:?}",
            extent.width,
            extent.height,
            image_count,
            present_mode
        );

        let swapchain_loader = ash::khr::swapchain::Device::new(&gpu.instance, &gpu.device);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(surface_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old.map_or(vk::SwapchainKHR::null(), |s| s.swapchain));

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None) }
            .context("Failed to create swapchain")?;

        let images = unsafe { swapchain_loader.get_swapchain_images(swapchain) }
            .context("Failed to get swapchain images")?;

        log::info!("Created swapchain with {} images", images.len());

        let image_views = images
            .iter()
            .map(|&image| {
                let create_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(surface_format.format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::R,
                        g: vk::ComponentSwizzle::G,
                        b: vk::ComponentSwizzle::B,
                        a: vk::ComponentSwizzle::A,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                unsafe { gpu.device.create_image_view(&create_info, None) }
                    .context("Failed to create image view")
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            swapchain,
            swapchain_loader,
            images,
            image_views,
            extent,
            device: gpu.device.clone(),
        })
    }

    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// Acquire next image for rendering
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> VkResult<(u32, bool)> {
        unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        }
    }

    /// Present rendered image to screen
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> VkResult<bool> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.swapchain_loader.queue_present(queue, &present_info) }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// Pick the first preferred format the surface offers, else its first format.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    // A lone UNDEFINED entry means the surface takes any format
    if let [only] = available {
        if only.format == vk::Format::UNDEFINED {
            return Some(vk::SurfaceFormatKHR {
                format: PREFERRED_FORMATS[0],
                color_space: PREFERRED_COLOR_SPACE,
            });
        }
    }

    PREFERRED_FORMATS
        .iter()
        .find_map(|&format| {
            available
                .iter()
                .find(|f| f.format == format && f.color_space == PREFERRED_COLOR_SPACE)
        })
        .or_else(|| available.first())
        .copied()
}

/// Use `requested` if supported; FIFO is always available.
pub fn select_present_mode(
    available: &[vk::PresentModeKHR],
    requested: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if available.contains(&requested) {
        requested
    } else {
        vk::PresentModeKHR::FIFO
    }
}

fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR, min_image_count: u32) -> u32 {
    let mut image_count = min_image_count.max(caps.min_image_count);
    if caps.max_image_count > 0 && image_count > caps.max_image_count {
        image_count = caps.max_image_count;
    }
    image_count
}
