/// Texture resource
///
/// The host-side description is known immediately; the GPU object is created
/// by an object command and its name becomes visible through `id()` once
/// that command has run.

use std::sync::Arc;

use bytemuck::Pod;

use crate::engine_error;
use crate::error::{Error, Result};
use crate::graphics::{TextureKind, TextureSpec};
use crate::renderer::Renderer;
use crate::resource::{GpuHandle, ResourceOwner, SubmitMode};

struct TextureInner {
    kind: TextureKind,
    spec: TextureSpec,
    handle: GpuHandle,
    owner: ResourceOwner,
}

impl Drop for TextureInner {
    fn drop(&mut self) {
        self.owner
            .release(&self.handle, |device, id| device.delete_texture(id));
    }
}

/// Shared texture handle; the GPU texture is deleted with the last clone
#[derive(Clone)]
pub struct Texture {
    inner: Arc<TextureInner>,
}

impl Texture {
    /// Create a texture with uninitialized storage
    pub fn new(renderer: &Renderer, kind: TextureKind, spec: TextureSpec, mode: SubmitMode) -> Self {
        Self::create(renderer, kind, spec, None, mode)
    }

    /// Create a texture and upload `data` (`spec.byte_size()` bytes)
    ///
    /// A size mismatch is logged and the texture is created without data.
    pub fn with_data<T: Pod>(
        renderer: &Renderer,
        kind: TextureKind,
        spec: TextureSpec,
        data: &[T],
        mode: SubmitMode,
    ) -> Self {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let pixels = check_size(&spec, bytes.len()).ok().map(|()| bytes.to_vec());
        Self::create(renderer, kind, spec, pixels, mode)
    }

    fn create(
        renderer: &Renderer,
        kind: TextureKind,
        spec: TextureSpec,
        pixels: Option<Vec<u8>>,
        mode: SubmitMode,
    ) -> Self {
        let inner = TextureInner {
            kind,
            spec: spec.clone(),
            handle: GpuHandle::new(),
            owner: ResourceOwner::new(renderer),
        };

        let handle = inner.handle.clone();
        let device = inner.owner.device().clone();
        inner.owner.object(mode, move || {
            if handle.is_released() {
                return;
            }
            let id = device.create_texture(&spec);
            if let Some(pixels) = pixels {
                device.upload_texture(id, &spec, &pixels);
            }
            handle.set(id);
        });

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Replace the whole image
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidResource` (and logs) unless `data` is exactly
    /// `spec().byte_size()` bytes.
    pub fn set_data<T: Pod>(&self, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        check_size(&self.inner.spec, bytes.len())?;

        let pixels = bytes.to_vec();
        let handle = self.inner.handle.clone();
        let device = self.inner.owner.device().clone();
        let spec = self.inner.spec.clone();
        self.inner.owner.object(SubmitMode::Deferred, move || {
            let id = handle.get();
            if id != 0 {
                device.upload_texture(id, &spec, &pixels);
            }
        });
        Ok(())
    }

    /// Bind to texture unit `unit` (a render command)
    ///
    /// The command keeps the texture alive until it has run.
    pub fn bind(&self, unit: u32) {
        let texture = self.clone();
        let device = self.inner.owner.device().clone();
        self.inner.owner.render(move || device.bind_texture(texture.id(), unit));
    }

    /// GPU name (0 until the creation command has run)
    pub fn id(&self) -> u32 {
        self.inner.handle.get()
    }

    /// Whether the GPU texture exists
    pub fn is_loaded(&self) -> bool {
        self.inner.handle.is_valid()
    }

    pub fn kind(&self) -> TextureKind {
        self.inner.kind
    }

    pub fn spec(&self) -> &TextureSpec {
        &self.inner.spec
    }

    pub fn width(&self) -> u32 {
        self.inner.spec.width
    }

    pub fn height(&self) -> u32 {
        self.inner.spec.height
    }

    /// Shared name cell, for commands that need the id at execution time
    pub fn handle(&self) -> &GpuHandle {
        &self.inner.handle
    }
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Texture {}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id())
            .field("kind", &self.inner.kind)
            .field("width", &self.inner.spec.width)
            .field("height", &self.inner.spec.height)
            .finish()
    }
}

fn check_size(spec: &TextureSpec, len: usize) -> Result<()> {
    let expected = spec.byte_size();
    if len != expected {
        let message = format!(
            "texture data is {} bytes, expected {} ({}x{})",
            len, expected, spec.width, spec.height
        );
        engine_error!("relay3d::Texture", "{}", message);
        return Err(Error::InvalidResource(message));
    }
    Ok(())
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
