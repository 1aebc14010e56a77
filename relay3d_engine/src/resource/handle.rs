/// Shared GPU object names and deferred destruction

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crate::engine_warn;
use crate::graphics::GraphicsDevice;
use crate::renderer::{Renderer, WeakRenderer};

/// How a resource's GPU work is scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitMode {
    /// Enqueue on the object family (runs at the start of the next frame)
    #[default]
    Deferred,
    /// Run now; only legal on the render thread or before `init()`
    Immediate,
}

#[derive(Debug, Default)]
struct HandleState {
    id: AtomicU32,
    released: AtomicBool,
}

/// GPU object name shared between a resource and its pending commands
///
/// Reads 0 until the creation command has run. Commands capture the handle
/// and read it when they execute, so a command recorded right after the
/// creation request sees the real name.
#[derive(Debug, Clone, Default)]
pub struct GpuHandle(Arc<HandleState>);

impl GpuHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current GPU name (0 if not created yet)
    pub fn get(&self) -> u32 {
        self.0.id.load(Ordering::Acquire)
    }

    pub fn set(&self, id: u32) {
        self.0.id.store(id, Ordering::Release);
    }

    /// Take the name, leaving 0 behind
    pub fn take(&self) -> u32 {
        self.0.id.swap(0, Ordering::AcqRel)
    }

    pub fn is_valid(&self) -> bool {
        self.get() != 0
    }

    /// Mark the owner as gone before the object was ever created
    pub(crate) fn mark_released(&self) {
        self.0.released.store(true, Ordering::Release);
    }

    /// Whether a pending creation command should be skipped
    pub(crate) fn is_released(&self) -> bool {
        self.0.released.load(Ordering::Acquire)
    }
}

/// Link from a resource to the renderer that schedules its GPU work
pub(crate) struct ResourceOwner {
    renderer: WeakRenderer,
    device: Arc<dyn GraphicsDevice>,
}

impl ResourceOwner {
    pub(crate) fn new(renderer: &Renderer) -> Self {
        Self {
            renderer: renderer.downgrade(),
            device: renderer.device().clone(),
        }
    }

    pub(crate) fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// Schedule an object command (creation, upload)
    pub(crate) fn object<F: FnOnce() + Send + 'static>(&self, mode: SubmitMode, command: F) {
        match self.renderer.upgrade() {
            Some(renderer) => renderer.submit_object_with(mode, command),
            None => engine_warn!("relay3d::Resource", "Renderer is gone; object command dropped"),
        }
    }

    /// Schedule a render command (bind, uniform upload)
    pub(crate) fn render<F: FnOnce() + Send + 'static>(&self, command: F) {
        match self.renderer.upgrade() {
            Some(renderer) => renderer.submit(command),
            None => engine_warn!("relay3d::Resource", "Renderer is gone; render command dropped"),
        }
    }

    /// Schedule the GPU delete of `handle`
    ///
    /// Runs inline where GPU calls are legal, otherwise as an object
    /// command. Skipped once the renderer is destroyed or gone, since the
    /// context went with it. A handle whose creation is still pending is
    /// marked released so the creation never happens.
    pub(crate) fn release<D>(&self, handle: &GpuHandle, delete: D)
    where
        D: FnOnce(&dyn GraphicsDevice, u32) + Send + 'static,
    {
        let Some(renderer) = self.renderer.upgrade() else {
            return;
        };
        if renderer.is_destroyed() {
            return;
        }

        if renderer.can_execute_inline() {
            match handle.take() {
                0 => handle.mark_released(),
                id => delete(self.device.as_ref(), id),
            }
            return;
        }

        let handle = handle.clone();
        let device = self.device.clone();
        renderer.submit_object(move || {
            let id = handle.take();
            if id != 0 {
                delete(device.as_ref(), id);
            }
        });
    }
}

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;
