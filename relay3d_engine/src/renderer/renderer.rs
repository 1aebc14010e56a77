/// Renderer - the public entry point of the render command pipeline
///
/// Every subsystem enqueues GPU work through a `Renderer` handle. Commands go
/// into the submit queue of one of two families (render, object); once per
/// frame the submitting thread swaps the families and hands the frame to the
/// render thread, which owns the graphics context and replays the commands.
///
/// # Frame protocol
///
/// ```text
/// loop {
///     renderer.wait_for_render_thread();   // previous frame fully pumped
///     renderer.swap_and_start();           // hand it over
///     renderer.start_frame();              // objects of this frame run first
///     ... submit / render ...
///     renderer.end_frame();
/// }
/// ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use glam::{Mat4, Vec4};

use crate::command::QueueRing;
use crate::error::{Error, Result};
use crate::graphics::{BlendingMode, ClearFlags, GraphicsDevice, TextureKind, TextureSpec, UniformValue};
use crate::render_thread::{RenderThread, RenderThreadState};
use crate::renderer::{RendererConfig, RendererStats};
use crate::renderer::stats::StatsCounters;
use crate::resource::{Shader, SubmitMode, Texture, VertexArray};
use crate::{engine_assert, engine_debug, engine_fatal, engine_info, engine_warn};

/// Name of the view-projection uniform uploaded by `render`
pub const VIEW_PROJECTION_UNIFORM: &str = "u_viewProjection";

const WHITE_PIXEL: u32 = 0xFFFF_FFFF;
const BLACK_PIXEL: u32 = 0xFF00_0000;

// ============================================================================
// Types
// ============================================================================

/// Number of vertices (or indices) a draw consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VertexCount {
    /// Index count if the vertex array has an index buffer, its vertex count
    /// otherwise
    #[default]
    Auto,
    /// Explicit count
    Exact(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Lifecycle {
    Created = 0,
    Running = 1,
    Destroyed = 2,
}

impl Lifecycle {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Lifecycle::Created,
            1 => Lifecycle::Running,
            _ => Lifecycle::Destroyed,
        }
    }
}

struct CommonAssets {
    white: Texture,
    black: Texture,
}

pub(crate) struct RendererShared {
    config: RendererConfig,
    device: Arc<dyn GraphicsDevice>,
    render_queues: QueueRing,
    object_queues: QueueRing,
    thread: Arc<RenderThread>,
    lifecycle: AtomicU8,
    view_projection: RwLock<Mat4>,
    assets: Mutex<Option<CommonAssets>>,
    stats: Arc<StatsCounters>,
}

impl Drop for RendererShared {
    fn drop(&mut self) {
        if self.lifecycle() != Lifecycle::Running {
            return;
        }
        engine_warn!(
            "relay3d::Renderer",
            "Renderer dropped without destroy(); stopping the render thread"
        );
        if self.thread.is_current_thread() {
            // Last handle went away inside a frame; the loop exits after it
            self.thread.deactivate();
        } else if let Err(err) = self.thread.stop() {
            engine_warn!("relay3d::Renderer", "Stopping dropped renderer: {}", err);
        }
    }
}

impl RendererShared {
    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    fn set_lifecycle(&self, lifecycle: Lifecycle) {
        self.lifecycle.store(lifecycle as u8, Ordering::Release);
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Cheap, cloneable handle to the render command pipeline
///
/// Create one per process with `Renderer::new`, call `init()` once, drive the
/// frame protocol from a single submitting thread, and call `destroy()`
/// before dropping the last handle. Dropping it without `destroy()` stops the
/// render thread and discards whatever is still queued.
#[derive(Clone)]
pub struct Renderer {
    shared: Arc<RendererShared>,
}

/// Non-owning renderer handle held by GPU resources
#[derive(Clone)]
pub struct WeakRenderer {
    shared: Weak<RendererShared>,
}

impl WeakRenderer {
    /// Upgrade to a full handle if the renderer still exists
    pub fn upgrade(&self) -> Option<Renderer> {
        self.shared.upgrade().map(|shared| Renderer { shared })
    }
}

impl Renderer {
    /// Create a renderer over `device`
    ///
    /// The device's context must be current on the calling thread; it is
    /// handed to the render thread by `init()`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if `config` does not validate.
    pub fn new(device: Arc<dyn GraphicsDevice>, config: RendererConfig) -> Result<Self> {
        config.validate()?;

        let shared = RendererShared {
            render_queues: QueueRing::new("render", config.render_queue_count, config.command_buffer_size),
            object_queues: QueueRing::new("object", config.object_queue_count, config.command_buffer_size),
            thread: Arc::new(RenderThread::new(config.thread_name.clone())),
            lifecycle: AtomicU8::new(Lifecycle::Created as u8),
            view_projection: RwLock::new(Mat4::IDENTITY),
            assets: Mutex::new(None),
            stats: Arc::new(StatsCounters::default()),
            device,
            config,
        };

        engine_debug!(
            "relay3d::Renderer",
            "Created renderer ({} render queues, {} object queues, {} bytes each)",
            shared.config.render_queue_count,
            shared.config.object_queue_count,
            shared.config.command_buffer_size
        );

        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// Non-owning handle to this renderer
    pub fn downgrade(&self) -> WeakRenderer {
        WeakRenderer {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.shared.config
    }

    /// The graphics device commands run against
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.shared.device
    }

    // ===== LIFECYCLE =====

    /// Start the render thread and create the common assets
    ///
    /// Releases the graphics context on the calling thread, spawns the
    /// render thread and waits until it holds the context and idles in
    /// `Pend`. Calling `init()` again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `Error::InitializationFailed` if the renderer was destroyed or
    /// the render thread died while starting up, `Error::RenderThread` if it
    /// could not be spawned.
    pub fn init(&self) -> Result<()> {
        match self.shared.lifecycle() {
            Lifecycle::Running => {
                engine_debug!("relay3d::Renderer", "init() called twice; ignoring");
                return Ok(());
            }
            Lifecycle::Destroyed => {
                return Err(Error::InitializationFailed(
                    "renderer has been destroyed".to_string(),
                ));
            }
            Lifecycle::Created => {}
        }

        self.shared.device.release_current();

        let shared = Arc::downgrade(&self.shared);
        let thread = self.shared.thread.clone();
        let device = self.shared.device.clone();
        if let Err(err) = self.shared.thread.run(move || render_loop(shared, thread, device)) {
            // Take the context back so the caller is where it started
            if let Err(context_err) = self.shared.device.make_current() {
                engine_warn!("relay3d::Renderer", "Could not reacquire context: {}", context_err);
            }
            return Err(err);
        }

        let state = self.shared.thread.wait_for_state(RenderThreadState::Pend);
        if state != RenderThreadState::Pend {
            let reason = match self.shared.thread.stop() {
                Err(err) => err.to_string(),
                Ok(()) => "render thread exited during start-up".to_string(),
            };
            if let Err(context_err) = self.shared.device.make_current() {
                engine_debug!("relay3d::Renderer", "Context not reacquired: {}", context_err);
            }
            return Err(Error::InitializationFailed(reason));
        }

        self.shared.set_lifecycle(Lifecycle::Running);

        if self.shared.config.create_default_textures {
            let white = Texture::with_data(
                self,
                TextureKind::Diffuse,
                TextureSpec::rgba8(1, 1),
                &[WHITE_PIXEL],
                SubmitMode::Deferred,
            );
            let black = Texture::with_data(
                self,
                TextureKind::Diffuse,
                TextureSpec::rgba8(1, 1),
                &[BLACK_PIXEL],
                SubmitMode::Deferred,
            );
            *self.assets() = Some(CommonAssets { white, black });
        }

        engine_info!("relay3d::Renderer", "Renderer initialized");
        Ok(())
    }

    /// Flush everything, release common assets and stop the render thread
    ///
    /// Idempotent. Must be called from the submitting thread while the
    /// render thread is idle (e.g. after `wait_for_render_thread()`).
    ///
    /// # Errors
    ///
    /// Returns `Error::RenderThread` if called from the render thread or if
    /// the render thread had panicked.
    pub fn destroy(&self) -> Result<()> {
        match self.shared.lifecycle() {
            Lifecycle::Destroyed => return Ok(()),
            Lifecycle::Created => {
                self.shared.set_lifecycle(Lifecycle::Destroyed);
                self.discard_leftovers();
                return Ok(());
            }
            Lifecycle::Running => {}
        }

        if self.is_render_thread() {
            return Err(Error::RenderThread(
                "destroy() called from the render thread".to_string(),
            ));
        }

        let rounds = self.shared.config.flush_rounds();
        if self.shared.thread.is_active() {
            self.wait_for_render_thread();
            self.flush(rounds);

            // Every render that might reference them has executed
            let assets = self.assets().take();
            drop(assets);
            self.flush(rounds);
        } else {
            engine_warn!("relay3d::Renderer", "Render thread is not running; skipping flush");
            self.assets().take();
        }

        let stopped = self.shared.thread.stop();
        self.shared.set_lifecycle(Lifecycle::Destroyed);
        self.discard_leftovers();

        match &stopped {
            Ok(()) => engine_info!("relay3d::Renderer", "Renderer destroyed"),
            Err(err) => engine_warn!("relay3d::Renderer", "Renderer destroyed: {}", err),
        }
        stopped
    }

    /// Warn about and drop commands still sitting in any queue
    fn discard_leftovers(&self) {
        for ring in [&self.shared.render_queues, &self.shared.object_queues] {
            for (index, count) in ring.command_counts().into_iter().enumerate() {
                if count > 0 {
                    engine_warn!(
                        "relay3d::Renderer",
                        "{}[{}] still holds {} commands at shutdown; dropping them",
                        ring.family(),
                        index,
                        count
                    );
                }
            }
            ring.clear_all();
        }
    }

    fn flush(&self, rounds: usize) {
        for _ in 0..rounds {
            self.process_object_queue();
            self.swap_and_start();
            self.wait_for_render_thread();
        }
    }

    fn assets(&self) -> std::sync::MutexGuard<'_, Option<CommonAssets>> {
        self.shared.assets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `init()` has completed and `destroy()` has not started
    pub fn is_running(&self) -> bool {
        self.shared.lifecycle() == Lifecycle::Running
    }

    /// Whether `destroy()` has completed
    pub fn is_destroyed(&self) -> bool {
        self.shared.lifecycle() == Lifecycle::Destroyed
    }

    // ===== SUBMISSION =====

    /// Enqueue a render command
    ///
    /// Called on the render thread (from inside another command), the
    /// command runs immediately instead. After `destroy()` the command is
    /// dropped with a warning.
    pub fn submit<F: FnOnce() + Send + 'static>(&self, command: F) {
        if self.is_render_thread() {
            command();
            return;
        }
        if self.is_destroyed() {
            engine_warn!("relay3d::Renderer", "submit() after destroy(); command dropped");
            return;
        }
        self.shared.render_queues.record(command);
    }

    /// Enqueue an object (resource) command
    ///
    /// Object commands of a frame run before that frame's render commands.
    /// Same render-thread and post-`destroy()` behaviour as `submit`.
    pub fn submit_object<F: FnOnce() + Send + 'static>(&self, command: F) {
        if self.is_render_thread() {
            command();
            return;
        }
        if self.is_destroyed() {
            engine_warn!("relay3d::Renderer", "submit_object() after destroy(); command dropped");
            return;
        }
        self.shared.object_queues.record(command);
    }

    /// Submit an object command, or run it now for `SubmitMode::Immediate`
    ///
    /// Immediate execution is legal only where GPU calls are: on the render
    /// thread, or before `init()`. Anywhere else it is a fatal assertion and
    /// the command falls back to deferred submission if the handler returns.
    pub fn submit_object_with<F: FnOnce() + Send + 'static>(&self, mode: SubmitMode, command: F) {
        match mode {
            SubmitMode::Deferred => self.submit_object(command),
            SubmitMode::Immediate => {
                if engine_assert!(
                    self.can_execute_inline(),
                    "relay3d::Renderer",
                    "immediate object command outside the render thread after init()"
                ) {
                    command();
                } else {
                    self.submit_object(command);
                }
            }
        }
    }

    /// Whether the calling thread is the render thread
    pub fn is_render_thread(&self) -> bool {
        self.shared.thread.is_current_thread()
    }

    /// Whether GPU calls may be made right now from the calling thread
    pub fn can_execute_inline(&self) -> bool {
        self.shared.lifecycle() == Lifecycle::Created || self.is_render_thread()
    }

    // ===== FRAME PROTOCOL =====

    /// Schedule, at the current position of the render submit queue, a
    /// pump of whatever object queue is in the process role when it runs
    pub fn process_object_queue(&self) {
        let shared = Arc::downgrade(&self.shared);
        self.submit(move || {
            if let Some(shared) = shared.upgrade() {
                let executed = shared.object_queues.pump_process();
                shared.stats.object_commands_executed(executed);
            }
        });
    }

    /// Begin recording a frame
    pub fn start_frame(&self) {
        self.shared.stats.frame_started();
        self.process_object_queue();
    }

    /// Finish recording a frame (bookkeeping only, no GPU work)
    pub fn end_frame(&self) {
        let ring = &self.shared.render_queues;
        let commands = ring
            .with_queue(ring.submit_index(), |queue| queue.command_count())
            .unwrap_or(0);
        self.shared.stats.frame_ended(commands);
    }

    /// Swap both families and hand the frame to the render thread
    ///
    /// The render thread must be idle in `Pend`; anything else is a fatal
    /// assertion and nothing is swapped.
    pub fn swap_and_start(&self) {
        let state = self.shared.thread.state();
        if !engine_assert!(
            state == RenderThreadState::Pend && !self.is_render_thread(),
            "relay3d::Renderer",
            "swap_and_start() requires an idle render thread (state {:?})",
            state
        ) {
            return;
        }

        self.shared.render_queues.swap();
        self.shared.object_queues.swap();
        self.shared.thread.set_state(RenderThreadState::Ready);
    }

    /// Block until the render thread has finished the current frame
    pub fn wait_for_render_thread(&self) {
        self.shared.thread.wait_for_state(RenderThreadState::Pend);
    }

    /// Run enough frames for everything submitted so far to execute
    ///
    /// `max(render_queue_count, object_queue_count)` rounds of {process
    /// objects, swap, wait}. Requires an idle render thread.
    pub fn pump_cmds(&self) {
        let rounds = self
            .shared
            .config
            .render_queue_count
            .max(self.shared.config.object_queue_count);
        self.flush(rounds);
    }

    /// State of the render thread handshake
    pub fn render_thread_state(&self) -> RenderThreadState {
        self.shared.thread.state()
    }

    // ===== SCENE =====

    /// Set the view-projection matrix used by subsequent `render` calls
    pub fn set_scene(&self, view_projection: Mat4) {
        *self
            .shared
            .view_projection
            .write()
            .unwrap_or_else(PoisonError::into_inner) = view_projection;
    }

    /// Current view-projection matrix
    pub fn view_projection(&self) -> Mat4 {
        *self
            .shared
            .view_projection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ===== DRAWS =====

    /// Draw `vertex_array` with `shader`
    ///
    /// With `set_view_projection`, the matrix current at submit time is
    /// uploaded to `u_viewProjection` first. Indexed if the vertex array has
    /// an index buffer.
    pub fn render(
        &self,
        shader: &Shader,
        vertex_array: &VertexArray,
        vertex_count: VertexCount,
        set_view_projection: bool,
    ) {
        self.submit_draw(shader, vertex_array, None, vertex_count, set_view_projection);
    }

    /// Instanced variant of `render`
    pub fn render_instanced(
        &self,
        shader: &Shader,
        vertex_array: &VertexArray,
        instance_count: u32,
        vertex_count: VertexCount,
        set_view_projection: bool,
    ) {
        self.submit_draw(
            shader,
            vertex_array,
            Some(instance_count),
            vertex_count,
            set_view_projection,
        );
    }

    fn submit_draw(
        &self,
        shader: &Shader,
        vertex_array: &VertexArray,
        instances: Option<u32>,
        vertex_count: VertexCount,
        set_view_projection: bool,
    ) {
        let count = match vertex_count {
            VertexCount::Exact(count) => count,
            VertexCount::Auto => match vertex_array.index_count() {
                Some(indices) => indices,
                None => vertex_array.vertex_count(),
            },
        };
        let view_projection = set_view_projection.then(|| self.view_projection());
        let shader = shader.clone();
        let vertex_array = vertex_array.clone();
        let device = self.shared.device.clone();
        let stats = self.shared.stats.clone();

        self.submit(move || {
            device.bind_shader(shader.id());
            if let Some(view_projection) = view_projection {
                shader.upload(
                    device.as_ref(),
                    VIEW_PROJECTION_UNIFORM,
                    &UniformValue::Mat4(view_projection),
                );
            }

            let vao = vertex_array.id();
            match (vertex_array.index_type(), instances) {
                (Some(index_type), None) => device.draw_elements(vao, index_type, count),
                (Some(index_type), Some(instances)) => {
                    device.draw_elements_instanced(vao, index_type, count, instances)
                }
                (None, None) => device.draw_arrays(vao, count),
                (None, Some(instances)) => device.draw_arrays_instanced(vao, count, instances),
            }
            stats.draw_call();
        });
    }

    // ===== STATE COMMANDS =====

    pub fn clear(&self, flags: ClearFlags) {
        let device = self.shared.device.clone();
        self.submit(move || device.clear(flags));
    }

    pub fn clear_color(&self, color: Vec4) {
        let device = self.shared.device.clone();
        self.submit(move || device.clear_color(color));
    }

    pub fn set_viewport(&self, x: i32, y: i32, width: u32, height: u32) {
        let device = self.shared.device.clone();
        self.submit(move || device.set_viewport(x, y, width, height));
    }

    pub fn set_depth_test(&self, enabled: bool) {
        let device = self.shared.device.clone();
        self.submit(move || device.set_depth_test(enabled));
    }

    pub fn set_wireframe(&self, enabled: bool) {
        let device = self.shared.device.clone();
        self.submit(move || device.set_wireframe(enabled));
    }

    pub fn set_blending_mode(&self, mode: BlendingMode) {
        let device = self.shared.device.clone();
        self.submit(move || device.set_blending_mode(mode));
    }

    /// Present the back buffer at this point of the frame
    pub fn swap_buffers(&self) {
        let device = self.shared.device.clone();
        self.submit(move || device.swap_buffers());
    }

    // ===== COMMON ASSETS =====

    /// 1x1 opaque white texture (`None` before `init()`, after `destroy()`
    /// or when disabled in the config)
    pub fn white_texture(&self) -> Option<Texture> {
        self.assets().as_ref().map(|assets| assets.white.clone())
    }

    /// 1x1 opaque black texture
    pub fn black_texture(&self) -> Option<Texture> {
        self.assets().as_ref().map(|assets| assets.black.clone())
    }

    // ===== STATISTICS =====

    pub fn stats(&self) -> RendererStats {
        self.shared.stats.snapshot()
    }

    /// Commands waiting in the (render, object) families
    pub fn pending_commands(&self) -> (usize, usize) {
        (
            self.shared.render_queues.pending_commands(),
            self.shared.object_queues.pending_commands(),
        )
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("lifecycle", &self.shared.lifecycle())
            .field("render_queues", &self.shared.render_queues)
            .field("object_queues", &self.shared.object_queues)
            .field("thread", &self.shared.thread)
            .finish()
    }
}

// ============================================================================
// Render thread body
// ============================================================================

fn render_loop(
    shared: Weak<RendererShared>,
    thread: Arc<RenderThread>,
    device: Arc<dyn GraphicsDevice>,
) {
    if let Err(err) = device.make_current() {
        engine_fatal!(
            "relay3d::RenderThread",
            "Failed to acquire graphics context: {}",
            err
        );
        return;
    }
    engine_info!("relay3d::RenderThread", "Render thread owns the graphics context");

    thread.set_state(RenderThreadState::Pend);

    loop {
        thread.wait_for_state(RenderThreadState::Ready);
        if !thread.is_active() {
            break;
        }
        thread.set_state(RenderThreadState::Busy);

        // Held only while pumping, so dropping every handle stops the loop
        let Some(shared) = shared.upgrade() else {
            break;
        };
        let executed = shared.render_queues.pump_process();
        shared.stats.render_commands_executed(executed);
        drop(shared);

        thread.set_state(RenderThreadState::Pend);
    }

    device.release_current();
    engine_info!("relay3d::RenderThread", "Render thread released the graphics context");
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
