use super::*;
use crate::graphics::{DeviceCall, IndexType, MockDevice, ShaderDataType};
use crate::relay3d::{Engine, FatalHandler, FatalReport};
use crate::resource::{BufferElement, BufferLayout, IndexBuffer, VertexBuffer};
use serial_test::serial;
use std::sync::atomic::AtomicUsize;
use std::sync::mpsc;

// ============================================================================
// TEST HELPERS
// ============================================================================

const VERTEX: &str = "uniform mat4 u_viewProjection;\nvoid main() {}\n";
const FRAGMENT: &str = "uniform vec4 u_color;\nvoid main() {}\n";

fn config() -> RendererConfig {
    RendererConfig {
        command_buffer_size: 1 << 16,
        create_default_textures: false,
        ..Default::default()
    }
}

fn create(config: RendererConfig) -> (Arc<MockDevice>, Renderer) {
    let device = Arc::new(MockDevice::new());
    let renderer = Renderer::new(device.clone(), config).unwrap();
    (device, renderer)
}

fn running() -> (Arc<MockDevice>, Renderer) {
    let (device, renderer) = create(config());
    renderer.init().unwrap();
    (device, renderer)
}

fn frame(renderer: &Renderer, f: impl FnOnce()) {
    renderer.start_frame();
    f();
    renderer.end_frame();
    renderer.wait_for_render_thread();
    renderer.swap_and_start();
    renderer.wait_for_render_thread();
}

fn trace() -> Arc<Mutex<Vec<&'static str>>> {
    Arc::new(Mutex::new(Vec::new()))
}

fn push(trace: &Arc<Mutex<Vec<&'static str>>>, value: &'static str) -> impl FnOnce() + Send + 'static {
    let trace = trace.clone();
    move || trace.lock().unwrap().push(value)
}

/// Shader, indexed quad and plain triangle, all created before `init()`
fn geometry(renderer: &Renderer) -> (Shader, VertexArray, VertexArray) {
    let shader = Shader::new(renderer, "flat", VERTEX, FRAGMENT, SubmitMode::Immediate);
    let layout = BufferLayout::new(vec![BufferElement::new(ShaderDataType::Float3, "a_position")]);
    let quad = VertexArray::new(
        renderer,
        vec![VertexBuffer::new(renderer, &[[0.0f32; 3]; 4], layout.clone(), SubmitMode::Immediate)],
        Some(IndexBuffer::new(renderer, &[0u16, 1, 2, 2, 3, 0], SubmitMode::Immediate)),
        SubmitMode::Immediate,
    );
    let triangle = VertexArray::new(
        renderer,
        vec![VertexBuffer::new(renderer, &[[0.0f32; 3]; 3], layout, SubmitMode::Immediate)],
        None,
        SubmitMode::Immediate,
    );
    (shader, quad, triangle)
}

struct RecordingHandler {
    reports: Arc<Mutex<Vec<FatalReport>>>,
}

impl FatalHandler for RecordingHandler {
    fn on_fatal(&self, report: &FatalReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
}

fn record_fatals() -> Arc<Mutex<Vec<FatalReport>>> {
    let reports = Arc::new(Mutex::new(Vec::new()));
    Engine::set_fatal_handler(RecordingHandler { reports: reports.clone() });
    reports
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_new_rejects_invalid_config() {
    let device = Arc::new(MockDevice::new());
    let config = RendererConfig {
        object_queue_count: 1,
        ..Default::default()
    };
    assert!(matches!(Renderer::new(device.clone(), config), Err(Error::InvalidConfig(_))));

    for (render_queue_count, object_queue_count) in [(2, 3), (3, 2)] {
        let config = RendererConfig {
            render_queue_count,
            object_queue_count,
            ..Default::default()
        };
        assert!(matches!(Renderer::new(device.clone(), config), Err(Error::InvalidConfig(_))));
    }
}

#[test]
fn test_init_hands_context_to_render_thread() {
    let (device, renderer) = create(config());
    assert!(!renderer.is_running());
    assert!(renderer.can_execute_inline());

    renderer.init().unwrap();

    assert!(renderer.is_running());
    assert!(!renderer.can_execute_inline());
    assert!(!renderer.is_render_thread());
    assert_eq!(renderer.render_thread_state(), RenderThreadState::Pend);
    assert!(device.has_owner());
    assert!(!device.is_current());

    renderer.destroy().unwrap();
    assert!(renderer.is_destroyed());
    assert!(!device.has_owner());
    assert_eq!(renderer.render_thread_state(), RenderThreadState::Dead);
}

#[test]
fn test_init_and_destroy_are_idempotent() {
    let (_device, renderer) = running();

    renderer.init().unwrap();
    assert!(renderer.is_running());

    renderer.destroy().unwrap();
    renderer.destroy().unwrap();
    assert!(renderer.is_destroyed());
    assert!(matches!(renderer.init(), Err(Error::InitializationFailed(_))));
}

#[test]
#[serial]
fn test_dropping_last_handle_stops_render_thread() {
    let (device, renderer) = running();
    frame(&renderer, || renderer.submit(|| {}));
    let weak = renderer.downgrade();

    drop(renderer);

    assert!(weak.upgrade().is_none());
    assert!(!device.has_owner());
}

#[test]
#[serial]
fn test_last_handle_dropped_inside_a_frame_stops_render_thread() {
    let (device, renderer) = running();
    let inner = renderer.clone();
    let (dropped_tx, dropped_rx) = mpsc::channel::<()>();

    renderer.start_frame();
    renderer.submit(move || {
        dropped_rx.recv().unwrap();
        drop(inner);
    });
    renderer.end_frame();
    renderer.swap_and_start();
    let weak = renderer.downgrade();
    drop(renderer);
    dropped_tx.send(()).unwrap();

    // The worker drops the last reference and winds down on its own
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while device.has_owner() && std::time::Instant::now() < deadline {
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    assert!(!device.has_owner());
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_destroy_without_init_discards_queues() {
    let (_device, renderer) = create(config());
    let executed = Arc::new(AtomicUsize::new(0));
    let witness = Arc::new(());

    let counter = executed.clone();
    let held = witness.clone();
    renderer.submit(move || {
        let _held = held;
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(renderer.pending_commands(), (1, 0));

    renderer.destroy().unwrap();

    assert_eq!(executed.load(Ordering::SeqCst), 0);
    assert_eq!(Arc::strong_count(&witness), 1);
    assert_eq!(renderer.pending_commands(), (0, 0));
}

#[test]
#[serial]
fn test_refused_context_fails_init() {
    let reports = record_fatals();
    let (_device, renderer) = {
        let device = Arc::new(MockDevice::refusing_context());
        let renderer = Renderer::new(device.clone(), config()).unwrap();
        (device, renderer)
    };

    let result = renderer.init();
    Engine::reset_fatal_handler();

    assert!(matches!(result, Err(Error::InitializationFailed(_))));
    assert!(!renderer.is_running());
    let reports = reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].message.contains("Failed to acquire graphics context"));
    drop(reports);

    renderer.destroy().unwrap();
}

#[test]
fn test_destroy_from_render_thread_is_an_error() {
    let (_device, renderer) = running();
    let (sender, receiver) = mpsc::channel();

    let inner = renderer.clone();
    renderer.submit(move || {
        sender.send(inner.destroy()).unwrap();
    });
    renderer.pump_cmds();

    assert!(matches!(receiver.recv().unwrap(), Err(Error::RenderThread(_))));
    assert!(renderer.is_running());
    renderer.destroy().unwrap();
}

// ============================================================================
// Submission and ordering
// ============================================================================

#[test]
fn test_commands_run_in_submission_order() {
    let (_device, renderer) = running();
    let trace = trace();

    frame(&renderer, || {
        renderer.submit(push(&trace, "1"));
        renderer.submit(push(&trace, "2"));
        renderer.submit(push(&trace, "3"));
    });

    assert_eq!(*trace.lock().unwrap(), vec!["1", "2", "3"]);
    renderer.destroy().unwrap();
}

#[test]
fn test_objects_run_before_renders_of_the_same_frame() {
    let (_device, renderer) = running();
    let trace = trace();

    frame(&renderer, || {
        renderer.submit(push(&trace, "render"));
        renderer.submit_object(push(&trace, "object"));
    });

    assert_eq!(*trace.lock().unwrap(), vec!["object", "render"]);
    renderer.destroy().unwrap();
}

#[test]
fn test_objects_before_renders_with_deeper_rings() {
    for (render_queue_count, object_queue_count) in [(2, 2), (3, 3), (4, 4)] {
        let (_device, renderer) = create(RendererConfig {
            render_queue_count,
            object_queue_count,
            ..config()
        });
        renderer.init().unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        // Pipelined, so several frames are in flight on deeper rings
        for frame in 0..12u32 {
            renderer.start_frame();
            let log = order.clone();
            renderer.submit(move || log.lock().unwrap().push(("render", frame)));
            let log = order.clone();
            renderer.submit_object(move || log.lock().unwrap().push(("object", frame)));
            renderer.end_frame();
            renderer.wait_for_render_thread();
            renderer.swap_and_start();
        }
        renderer.wait_for_render_thread();
        renderer.pump_cmds();

        {
            let order = order.lock().unwrap();
            assert_eq!(order.len(), 24);
            for frame in 0..12u32 {
                let object = order.iter().position(|entry| *entry == ("object", frame)).unwrap();
                let render = order.iter().position(|entry| *entry == ("render", frame)).unwrap();
                assert!(
                    object < render,
                    "{}/{} rings: frame {} rendered before its objects",
                    render_queue_count,
                    object_queue_count,
                    frame
                );
            }
        }
        renderer.destroy().unwrap();
    }
}

#[test]
fn test_submit_on_render_thread_runs_inline() {
    let (_device, renderer) = running();
    let trace = trace();

    let inner = renderer.clone();
    let outer = trace.clone();
    let nested = push(&trace, "nested");
    frame(&renderer, || {
        renderer.submit(move || {
            outer.lock().unwrap().push("before");
            inner.submit(nested);
            outer.lock().unwrap().push("after");
        });
    });

    assert_eq!(*trace.lock().unwrap(), vec!["before", "nested", "after"]);
    renderer.destroy().unwrap();
}

#[test]
fn test_submit_after_destroy_is_dropped() {
    let (_device, renderer) = running();
    renderer.destroy().unwrap();
    let trace = trace();

    renderer.submit(push(&trace, "render"));
    renderer.submit_object(push(&trace, "object"));

    assert_eq!(renderer.pending_commands(), (0, 0));
    assert!(trace.lock().unwrap().is_empty());
}

#[test]
fn test_destroy_flushes_pending_commands() {
    let (_device, renderer) = running();
    let trace = trace();

    renderer.submit(push(&trace, "render"));
    renderer.submit_object(push(&trace, "object"));
    renderer.destroy().unwrap();

    let mut seen = trace.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["object", "render"]);
}

#[test]
fn test_pump_cmds_with_deeper_rings() {
    let (_device, renderer) = create(RendererConfig {
        render_queue_count: 4,
        object_queue_count: 4,
        ..config()
    });
    renderer.init().unwrap();
    let trace = trace();

    renderer.submit(push(&trace, "render"));
    renderer.submit_object(push(&trace, "object"));
    renderer.pump_cmds();

    assert_eq!(trace.lock().unwrap().len(), 2);
    assert_eq!(renderer.pending_commands(), (0, 0));
    renderer.destroy().unwrap();
}

#[test]
#[serial]
fn test_immediate_after_init_off_thread_is_fatal() {
    let (_device, renderer) = running();
    let reports = record_fatals();
    let trace = trace();

    renderer.submit_object_with(SubmitMode::Immediate, push(&trace, "object"));
    Engine::reset_fatal_handler();

    assert_eq!(reports.lock().unwrap().len(), 1);
    // Fell back to deferred
    assert!(trace.lock().unwrap().is_empty());
    renderer.pump_cmds();
    assert_eq!(*trace.lock().unwrap(), vec!["object"]);
    renderer.destroy().unwrap();
}

// ============================================================================
// Handshake misuse
// ============================================================================

#[test]
#[serial]
fn test_swap_before_init_is_fatal() {
    let (_device, renderer) = create(config());
    let reports = record_fatals();

    renderer.submit(|| {});
    renderer.swap_and_start();
    Engine::reset_fatal_handler();

    let reports = reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].message.contains("swap_and_start"));
    assert_eq!(renderer.render_thread_state(), RenderThreadState::Dead);
    drop(reports);
    renderer.destroy().unwrap();
}

#[test]
#[serial]
fn test_swap_while_busy_is_fatal() {
    let (_device, renderer) = running();
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    renderer.submit(move || {
        started_tx.send(()).unwrap();
        release_rx.recv().unwrap();
    });
    renderer.swap_and_start();
    started_rx.recv().unwrap();

    let reports = record_fatals();
    renderer.swap_and_start();
    Engine::reset_fatal_handler();

    assert_eq!(reports.lock().unwrap().len(), 1);
    assert_eq!(renderer.render_thread_state(), RenderThreadState::Busy);

    release_tx.send(()).unwrap();
    renderer.wait_for_render_thread();
    renderer.destroy().unwrap();
}

// ============================================================================
// Draws
// ============================================================================

#[test]
fn test_render_uploads_view_projection_captured_at_submit() {
    let (device, renderer) = create(config());
    let (shader, quad, _triangle) = geometry(&renderer);
    renderer.init().unwrap();
    device.take_calls();

    let first = Mat4::from_scale(glam::Vec3::splat(2.0));
    frame(&renderer, || {
        renderer.set_scene(first);
        renderer.render(&shader, &quad, VertexCount::Auto, true);
        renderer.set_scene(Mat4::IDENTITY);
    });

    let calls: Vec<DeviceCall> = device
        .take_calls()
        .into_iter()
        .filter(|call| !matches!(call, DeviceCall::MakeCurrent | DeviceCall::ReleaseCurrent))
        .collect();
    assert_eq!(
        calls,
        vec![
            DeviceCall::BindShader(shader.id()),
            DeviceCall::SetUniform {
                shader: shader.id(),
                name: VIEW_PROJECTION_UNIFORM.to_string(),
                value: UniformValue::Mat4(first),
            },
            DeviceCall::DrawElements {
                vertex_array: quad.id(),
                index_type: IndexType::U16,
                count: 6,
            },
        ]
    );
    assert_eq!(renderer.view_projection(), Mat4::IDENTITY);

    drop((shader, quad, _triangle));
    renderer.destroy().unwrap();
}

#[test]
fn test_render_without_index_buffer() {
    let (device, renderer) = create(config());
    let (shader, _quad, triangle) = geometry(&renderer);
    renderer.init().unwrap();

    frame(&renderer, || {
        renderer.render(&shader, &triangle, VertexCount::Auto, false);
        renderer.render(&shader, &triangle, VertexCount::Exact(2), false);
    });

    let draws: Vec<DeviceCall> = device.calls().into_iter().filter(DeviceCall::is_draw).collect();
    assert_eq!(
        draws,
        vec![
            DeviceCall::DrawArrays { vertex_array: triangle.id(), count: 3 },
            DeviceCall::DrawArrays { vertex_array: triangle.id(), count: 2 },
        ]
    );
    assert_eq!(device.count(|call| matches!(call, DeviceCall::SetUniform { .. })), 0);

    drop((shader, _quad, triangle));
    renderer.destroy().unwrap();
}

#[test]
fn test_render_instanced() {
    let (device, renderer) = create(config());
    let (shader, quad, triangle) = geometry(&renderer);
    renderer.init().unwrap();

    frame(&renderer, || {
        renderer.render_instanced(&shader, &quad, 10, VertexCount::Auto, false);
        renderer.render_instanced(&shader, &triangle, 4, VertexCount::Auto, false);
    });

    let draws: Vec<DeviceCall> = device.calls().into_iter().filter(DeviceCall::is_draw).collect();
    assert_eq!(
        draws,
        vec![
            DeviceCall::DrawElementsInstanced {
                vertex_array: quad.id(),
                index_type: IndexType::U16,
                count: 6,
                instances: 10,
            },
            DeviceCall::DrawArraysInstanced {
                vertex_array: triangle.id(),
                count: 3,
                instances: 4,
            },
        ]
    );
    assert_eq!(renderer.stats().draw_calls, 2);

    drop((shader, quad, triangle));
    renderer.destroy().unwrap();
}

#[test]
fn test_state_commands() {
    let (device, renderer) = running();
    device.take_calls();

    frame(&renderer, || {
        renderer.clear_color(Vec4::new(0.1, 0.2, 0.3, 1.0));
        renderer.clear(ClearFlags::default());
        renderer.set_viewport(0, 0, 640, 480);
        renderer.set_depth_test(true);
        renderer.set_wireframe(false);
        renderer.set_blending_mode(BlendingMode::Additive);
        renderer.swap_buffers();
    });

    assert_eq!(
        device.take_calls(),
        vec![
            DeviceCall::ClearColor(Vec4::new(0.1, 0.2, 0.3, 1.0)),
            DeviceCall::Clear(ClearFlags::COLOR | ClearFlags::DEPTH),
            DeviceCall::SetViewport { x: 0, y: 0, width: 640, height: 480 },
            DeviceCall::SetDepthTest(true),
            DeviceCall::SetWireframe(false),
            DeviceCall::SetBlendingMode(BlendingMode::Additive),
            DeviceCall::SwapBuffers,
        ]
    );
    assert_eq!(device.thread_violations(), 0);
    renderer.destroy().unwrap();
}

// ============================================================================
// Common assets and statistics
// ============================================================================

#[test]
fn test_default_textures() {
    let (device, renderer) = create(RendererConfig {
        create_default_textures: true,
        ..config()
    });
    assert!(renderer.white_texture().is_none());

    renderer.init().unwrap();
    let white = renderer.white_texture().unwrap();
    let black = renderer.black_texture().unwrap();
    assert!(!white.is_loaded());

    renderer.pump_cmds();

    assert!(white.is_loaded() && black.is_loaded());
    assert_ne!(white.id(), black.id());
    assert_eq!((white.width(), white.height()), (1, 1));
    assert_eq!(device.count(|call| matches!(call, DeviceCall::UploadTexture { bytes: 4, .. })), 2);

    drop((white, black));
    renderer.destroy().unwrap();
    assert!(renderer.white_texture().is_none());
    assert_eq!(device.live_textures(), 0);
    assert_eq!(device.invalid_deletes(), 0);
}

#[test]
fn test_default_textures_disabled() {
    let (_device, renderer) = running();
    assert!(renderer.white_texture().is_none());
    assert!(renderer.black_texture().is_none());
    renderer.destroy().unwrap();
}

#[test]
fn test_stats() {
    let (_device, renderer) = running();

    frame(&renderer, || {
        renderer.submit(|| {});
        renderer.submit(|| {});
        renderer.submit_object(|| {});
    });

    let stats = renderer.stats();
    assert_eq!(stats.frames_started, 1);
    assert_eq!(stats.frames_ended, 1);
    // Two submits plus the object pump scheduled by start_frame
    assert_eq!(stats.last_frame_commands, 3);
    assert_eq!(stats.render_commands, 3);
    assert_eq!(stats.object_commands, 1);
    assert_eq!(stats.draw_calls, 0);
    renderer.destroy().unwrap();
}
