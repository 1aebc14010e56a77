use super::*;
use crate::graphics::{DeviceCall, MockDevice};
use crate::renderer::RendererConfig;
use std::sync::Arc;

fn config() -> RendererConfig {
    RendererConfig {
        command_buffer_size: 1 << 16,
        create_default_textures: false,
        ..Default::default()
    }
}

fn renderer() -> (Arc<MockDevice>, Renderer) {
    let device = Arc::new(MockDevice::new());
    let renderer = Renderer::new(device.clone(), config()).unwrap();
    (device, renderer)
}

fn running() -> (Arc<MockDevice>, Renderer) {
    let (device, renderer) = renderer();
    renderer.init().unwrap();
    (device, renderer)
}

/// Record one frame with `f` and wait for the render thread to run it
fn frame(renderer: &Renderer, f: impl FnOnce()) {
    renderer.start_frame();
    f();
    renderer.end_frame();
    renderer.wait_for_render_thread();
    renderer.swap_and_start();
    renderer.wait_for_render_thread();
}

#[test]
fn test_deferred_texture_loads_after_pump() {
    let (device, renderer) = running();

    let texture = Texture::with_data(
        &renderer,
        TextureKind::Diffuse,
        TextureSpec::rgba8(2, 2),
        &[0xFF00_FF00u32; 4],
        SubmitMode::Deferred,
    );
    assert!(!texture.is_loaded());
    assert_eq!(texture.id(), 0);

    renderer.pump_cmds();

    assert!(texture.is_loaded());
    let id = texture.id();
    let calls = device.calls();
    assert!(calls.contains(&DeviceCall::CreateTexture { id, width: 2, height: 2 }));
    assert!(calls.contains(&DeviceCall::UploadTexture { id, bytes: 16 }));

    drop(texture);
    renderer.destroy().unwrap();
    assert_eq!(device.live_textures(), 0);
    assert_eq!(device.thread_violations(), 0);
}

#[test]
fn test_immediate_before_init_runs_inline() {
    let (device, renderer) = renderer();

    let texture = Texture::new(&renderer, TextureKind::Normal, TextureSpec::rgba8(4, 4), SubmitMode::Immediate);

    assert!(texture.is_loaded());
    assert_eq!(device.live_textures(), 1);

    // Still before init: the delete runs inline too
    drop(texture);
    assert_eq!(device.live_textures(), 0);
    assert_eq!(device.thread_violations(), 0);
    renderer.destroy().unwrap();
}

#[test]
fn test_size_mismatch_creates_without_upload() {
    let (device, renderer) = renderer();

    let texture = Texture::with_data(
        &renderer,
        TextureKind::Diffuse,
        TextureSpec::rgba8(2, 2),
        &[0u8; 3],
        SubmitMode::Immediate,
    );

    assert!(texture.is_loaded());
    assert_eq!(device.count(|call| matches!(call, DeviceCall::UploadTexture { .. })), 0);
    drop(texture);
    renderer.destroy().unwrap();
}

#[test]
fn test_bind_sees_id_created_in_same_frame() {
    let (device, renderer) = running();

    let mut texture = None;
    frame(&renderer, || {
        let created = Texture::new(&renderer, TextureKind::Diffuse, TextureSpec::rgba8(1, 1), SubmitMode::Deferred);
        created.bind(3);
        texture = Some(created);
    });

    let texture = texture.unwrap();
    assert!(texture.is_loaded());
    assert!(device.calls().contains(&DeviceCall::BindTexture { id: texture.id(), unit: 3 }));

    drop(texture);
    renderer.destroy().unwrap();
}

#[test]
fn test_set_data_uploads_after_creation() {
    let (device, renderer) = running();

    let texture = Texture::new(&renderer, TextureKind::Diffuse, TextureSpec::rgba8(2, 1), SubmitMode::Deferred);
    texture.set_data(&[1u32, 2u32]).unwrap();
    // Wrong size: rejected, nothing queued
    match texture.set_data(&[1u32]) {
        Err(Error::InvalidResource(message)) => assert!(message.contains("expected 8")),
        other => panic!("unexpected result {:?}", other),
    }
    renderer.pump_cmds();

    let id = texture.id();
    assert_eq!(
        device.count(|call| *call == DeviceCall::UploadTexture { id, bytes: 8 }),
        1
    );
    assert_eq!(device.count(|call| matches!(call, DeviceCall::UploadTexture { .. })), 1);

    drop(texture);
    renderer.destroy().unwrap();
}

#[test]
fn test_last_clone_deletes_once() {
    let (device, renderer) = running();

    let texture = Texture::new(&renderer, TextureKind::Specular, TextureSpec::rgba8(1, 1), SubmitMode::Deferred);
    let copy = texture.clone();
    assert_eq!(texture, copy);
    renderer.pump_cmds();
    let id = texture.id();

    drop(texture);
    renderer.pump_cmds();
    assert!(device.is_texture_live(id));

    drop(copy);
    renderer.pump_cmds();
    assert!(!device.is_texture_live(id));
    assert_eq!(device.count(|call| *call == DeviceCall::DeleteTexture(id)), 1);
    assert_eq!(device.invalid_deletes(), 0);

    renderer.destroy().unwrap();
}

#[test]
fn test_drop_before_creation_skips_creation() {
    let (device, renderer) = renderer();

    let texture = Texture::new(&renderer, TextureKind::Diffuse, TextureSpec::rgba8(1, 1), SubmitMode::Deferred);
    drop(texture);

    renderer.init().unwrap();
    renderer.pump_cmds();
    renderer.destroy().unwrap();

    assert_eq!(device.count(|call| matches!(call, DeviceCall::CreateTexture { .. })), 0);
    assert_eq!(device.invalid_deletes(), 0);
}

#[test]
fn test_accessors() {
    let (_device, renderer) = renderer();
    let texture = Texture::new(&renderer, TextureKind::Height, TextureSpec::rgba8(8, 2), SubmitMode::Immediate);

    assert_eq!(texture.kind(), TextureKind::Height);
    assert_eq!(texture.width(), 8);
    assert_eq!(texture.height(), 2);
    assert_eq!(texture.spec().byte_size(), 64);
    assert_eq!(texture.handle().get(), texture.id());

    drop(texture);
    renderer.destroy().unwrap();
}
