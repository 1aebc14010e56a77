//! A labelled command buffer
//!
//! One queue is written by the submitting thread during a frame and pumped
//! by the render thread during the next one; `QueueRing` keeps the two roles
//! on different queues.

use std::ptr::NonNull;

use super::command_buffer::{CommandBuffer, Trampolines};
use crate::engine_trace;

pub struct CommandQueue {
    label: String,
    buffer: CommandBuffer,
}

impl CommandQueue {
    /// Create a queue backed by a zeroed buffer of `capacity` bytes
    pub fn new(label: impl Into<String>, capacity: usize) -> Self {
        Self {
            label: label.into(),
            buffer: CommandBuffer::new(capacity),
        }
    }

    /// Queue label, used in log messages (e.g. "render[0]")
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Reserve space for a raw command
    ///
    /// # Safety
    ///
    /// Same contract as `CommandBuffer::slot`.
    pub unsafe fn slot(
        &mut self,
        trampolines: Trampolines,
        size: usize,
        align: usize,
    ) -> Option<NonNull<u8>> {
        unsafe { self.buffer.slot(trampolines, size, align) }
    }

    /// Record a closure, handing it back if the buffer rejected it
    pub fn try_record<F: FnOnce() + Send + 'static>(&mut self, command: F) -> Result<(), F> {
        self.buffer.try_record(command)
    }

    /// Record a closure; `false` if the buffer rejected it
    pub fn record<F: FnOnce() + Send + 'static>(&mut self, command: F) -> bool {
        self.buffer.record(command)
    }

    /// Execute all recorded commands in order and reset
    pub fn pump(&mut self) -> usize {
        let executed = self.buffer.pump();
        if executed > 0 {
            engine_trace!(
                "relay3d::CommandQueue",
                "{}: executed {} commands",
                self.label,
                executed
            );
        }
        executed
    }

    /// Drop all recorded commands without executing them
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn command_count(&self) -> usize {
        self.buffer.command_count()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn used_bytes(&self) -> usize {
        self.buffer.used_bytes()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Direct access to the underlying buffer
    pub fn buffer(&self) -> &CommandBuffer {
        &self.buffer
    }
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("label", &self.label)
            .field("command_count", &self.command_count())
            .field("used_bytes", &self.used_bytes())
            .finish()
    }
}

#[cfg(test)]
#[path = "command_queue_tests.rs"]
mod tests;
