/// Renderer statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of the renderer counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RendererStats {
    /// `start_frame()` calls
    pub frames_started: u64,
    /// `end_frame()` calls
    pub frames_ended: u64,
    /// Render commands executed by the render thread
    pub render_commands: u64,
    /// Object commands executed by the render thread
    pub object_commands: u64,
    /// Draws issued by `render`/`render_instanced`
    pub draw_calls: u64,
    /// Render commands recorded during the last completed frame
    pub last_frame_commands: u64,
}

/// Live counters, updated from both threads
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    frames_started: AtomicU64,
    frames_ended: AtomicU64,
    render_commands: AtomicU64,
    object_commands: AtomicU64,
    draw_calls: AtomicU64,
    last_frame_commands: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn frame_started(&self) {
        self.frames_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_ended(&self, commands: usize) {
        self.frames_ended.fetch_add(1, Ordering::Relaxed);
        self.last_frame_commands.store(commands as u64, Ordering::Relaxed);
    }

    pub(crate) fn render_commands_executed(&self, count: usize) {
        self.render_commands.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn object_commands_executed(&self, count: usize) {
        self.object_commands.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn draw_call(&self) {
        self.draw_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> RendererStats {
        RendererStats {
            frames_started: self.frames_started.load(Ordering::Relaxed),
            frames_ended: self.frames_ended.load(Ordering::Relaxed),
            render_commands: self.render_commands.load(Ordering::Relaxed),
            object_commands: self.object_commands.load(Ordering::Relaxed),
            draw_calls: self.draw_calls.load(Ordering::Relaxed),
            last_frame_commands: self.last_frame_commands.load(Ordering::Relaxed),
        }
    }
}
