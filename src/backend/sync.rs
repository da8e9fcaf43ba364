// Per-image frame resources
//
// Each swapchain image gets its own command pool, command buffer and fence,
// plus a semaphore pair used for acquire -> submit -> present ordering.
// A constructor that fails part way destroys what it already created.

use anyhow::{Context, Result};
use ash::vk;

/// Command recording state for one swapchain image.
pub struct Frame {
    pub command_pool: vk::CommandPool,
    pub command_buffer: vk::CommandBuffer,
    pub fence: vk::Fence,
}

impl Frame {
    pub fn new(device: &ash::Device, queue_family: u32) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        // Start signaled so the first wait on each image returns at once
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);

        let command_pool = unsafe { device.create_command_pool(&pool_info, None) }
            .context("Failed to create frame command pool")?;

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers_and_fence = unsafe {
            device
                .allocate_command_buffers(&alloc_info)
                .context("Failed to allocate frame command buffer")
                .and_then(|buffers| {
                    let fence = device
                        .create_fence(&fence_info, None)
                        .context("Failed to create frame fence")?;
                    Ok((buffers[0], fence))
                })
        };

        match buffers_and_fence {
            Ok((command_buffer, fence)) => Ok(Self {
                command_pool,
                command_buffer,
                fence,
            }),
            Err(e) => {
                // The pool owns the buffer, if one was allocated
                unsafe { device.destroy_command_pool(command_pool, None) };
                Err(e)
            }
        }
    }

    /// Destroys the fence and the pool, freeing its buffer.
    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_fence(self.fence, None);
            device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Semaphore pair for one acquire/present round trip.
pub struct FrameSemaphores {
    pub image_acquired: vk::Semaphore,
    pub render_complete: vk::Semaphore,
}

impl FrameSemaphores {
    pub fn new(device: &ash::Device) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::default();

        let image_acquired = unsafe { device.create_semaphore(&semaphore_info, None) }
            .context("Failed to create image-acquired semaphore")?;
        let render_complete = match unsafe { device.create_semaphore(&semaphore_info, None) } {
            Ok(semaphore) => semaphore,
            Err(e) => {
                unsafe { device.destroy_semaphore(image_acquired, None) };
                return Err(e).context("Failed to create render-complete semaphore");
            }
        };

        Ok(Self {
            image_acquired,
            render_complete,
        })
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_acquired, None);
            device.destroy_semaphore(self.render_complete, None);
        }
    }
}
