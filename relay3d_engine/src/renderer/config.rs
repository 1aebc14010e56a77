/// Renderer configuration

use crate::command::CommandBuffer;
use crate::error::{Error, Result};

/// Renderer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererConfig {
    /// Queues in the render command family (>= 2)
    pub render_queue_count: usize,
    /// Queues in the object command family (same as `render_queue_count`)
    pub object_queue_count: usize,
    /// Byte capacity of every command buffer (power of two)
    pub command_buffer_size: usize,
    /// Name given to the render thread
    pub thread_name: String,
    /// Create the 1x1 white and black textures during `init()`
    pub create_default_textures: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            render_queue_count: 2,
            object_queue_count: 2,
            command_buffer_size: 1 << 23,
            thread_name: "relay3d-render".to_string(),
            create_default_textures: true,
        }
    }
}

impl RendererConfig {
    /// Check the configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if a queue count is below 2, if the two
    /// families differ in depth, or if the command
    /// buffer size is not a power of two of at least
    /// `CommandBuffer::MIN_CAPACITY` bytes.
    pub fn validate(&self) -> Result<()> {
        if self.render_queue_count < 2 {
            return Err(Error::InvalidConfig(format!(
                "render_queue_count must be >= 2, got {}",
                self.render_queue_count
            )));
        }
        if self.object_queue_count < 2 {
            return Err(Error::InvalidConfig(format!(
                "object_queue_count must be >= 2, got {}",
                self.object_queue_count
            )));
        }
        // The pump recorded in render queue i drains object queue i
        if self.object_queue_count != self.render_queue_count {
            return Err(Error::InvalidConfig(format!(
                "object_queue_count ({}) must equal render_queue_count ({})",
                self.object_queue_count, self.render_queue_count
            )));
        }
        if !self.command_buffer_size.is_power_of_two()
            || self.command_buffer_size < CommandBuffer::MIN_CAPACITY
        {
            return Err(Error::InvalidConfig(format!(
                "command_buffer_size must be a power of two >= {}, got {}",
                CommandBuffer::MIN_CAPACITY,
                self.command_buffer_size
            )));
        }
        if self.thread_name.is_empty() {
            return Err(Error::InvalidConfig("thread_name must not be empty".to_string()));
        }
        Ok(())
    }

    /// Swap/wait rounds after which every queue slot of both families has
    /// held the process role at least once
    pub fn flush_rounds(&self) -> usize {
        self.render_queue_count + self.object_queue_count - 1
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
