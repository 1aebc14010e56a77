/// Vertex and index buffers
///
/// A vertex buffer carries a `BufferLayout` describing one vertex. The layout
/// is computed up front (offsets packed in declaration order, stride = sum of
/// element sizes) so the vertex count is known on the submitting thread
/// before the GPU buffer exists.

use std::sync::Arc;

use bytemuck::Pod;

use crate::error::{Error, Result};
use crate::{engine_error, engine_fatal};
use crate::graphics::{BufferTarget, IndexType, ShaderDataType};
use crate::renderer::Renderer;
use crate::resource::{GpuHandle, ResourceOwner, SubmitMode};

// ===== BUFFER LAYOUT =====

/// One attribute of a vertex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferElement {
    pub name: String,
    pub data_type: ShaderDataType,
    pub normalized: bool,
    /// Byte offset within the vertex (filled in by `BufferLayout::new`)
    pub offset: u32,
}

impl BufferElement {
    pub fn new(data_type: ShaderDataType, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type,
            normalized: false,
            offset: 0,
        }
    }

    /// Mark the attribute as normalized fixed-point
    pub fn normalized(mut self) -> Self {
        self.normalized = true;
        self
    }

    pub fn size(&self) -> u32 {
        self.data_type.size()
    }
}

/// Packed vertex layout
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BufferLayout {
    elements: Vec<BufferElement>,
    stride: u32,
}

impl BufferLayout {
    pub fn new(elements: Vec<BufferElement>) -> Self {
        let mut offset = 0;
        let elements: Vec<BufferElement> = elements
            .into_iter()
            .map(|mut element| {
                element.offset = offset;
                offset += element.size();
                element
            })
            .collect();

        Self {
            elements,
            stride: offset,
        }
    }

    pub fn elements(&self) -> &[BufferElement] {
        &self.elements
    }

    /// Bytes per vertex
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

// ===== SHARED GPU BUFFER =====

struct BufferInner {
    target: BufferTarget,
    byte_size: usize,
    handle: GpuHandle,
    owner: ResourceOwner,
}

impl BufferInner {
    fn create(renderer: &Renderer, target: BufferTarget, bytes: &[u8], mode: SubmitMode) -> Self {
        let inner = Self {
            target,
            byte_size: bytes.len(),
            handle: GpuHandle::new(),
            owner: ResourceOwner::new(renderer),
        };

        let data = bytes.to_vec();
        let handle = inner.handle.clone();
        let device = inner.owner.device().clone();
        inner.owner.object(mode, move || {
            if handle.is_released() {
                return;
            }
            handle.set(device.create_buffer(target, &data));
        });
        inner
    }

    fn update(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        if offset + bytes.len() > self.byte_size {
            let message = format!(
                "update of {} bytes at offset {} exceeds {:?} buffer of {} bytes",
                bytes.len(),
                offset,
                self.target,
                self.byte_size
            );
            engine_error!("relay3d::Buffer", "{}", message);
            return Err(Error::InvalidResource(message));
        }

        let data = bytes.to_vec();
        let handle = self.handle.clone();
        let device = self.owner.device().clone();
        self.owner.object(SubmitMode::Deferred, move || {
            let id = handle.get();
            if id != 0 {
                device.update_buffer(id, offset, &data);
            }
        });
        Ok(())
    }
}

impl Drop for BufferInner {
    fn drop(&mut self) {
        self.owner
            .release(&self.handle, |device, id| device.delete_buffer(id));
    }
}

// ===== VERTEX BUFFER =====

struct VertexBufferInner {
    buffer: BufferInner,
    layout: BufferLayout,
    vertex_count: u32,
}

/// Shared vertex buffer handle
#[derive(Clone)]
pub struct VertexBuffer {
    inner: Arc<VertexBufferInner>,
}

impl VertexBuffer {
    /// Upload `vertices` laid out as `layout`
    ///
    /// The vertex count is `byte size / stride`; trailing bytes that do not
    /// form a whole vertex are logged and ignored by draws.
    pub fn new<T: Pod>(renderer: &Renderer, vertices: &[T], layout: BufferLayout, mode: SubmitMode) -> Self {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        let vertex_count = match layout.stride() {
            0 => {
                engine_error!("relay3d::VertexBuffer", "Vertex buffer layout has no elements");
                0
            }
            stride => {
                if bytes.len() % stride as usize != 0 {
                    engine_error!(
                        "relay3d::VertexBuffer",
                        "{} bytes is not a whole number of {}-byte vertices",
                        bytes.len(),
                        stride
                    );
                }
                (bytes.len() / stride as usize) as u32
            }
        };

        Self {
            inner: Arc::new(VertexBufferInner {
                buffer: BufferInner::create(renderer, BufferTarget::Vertex, bytes, mode),
                layout,
                vertex_count,
            }),
        }
    }

    /// Overwrite part of the buffer, `offset` in bytes
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidResource` (and logs) if the range does not fit.
    pub fn set_data<T: Pod>(&self, offset: usize, vertices: &[T]) -> Result<()> {
        self.inner.buffer.update(offset, bytemuck::cast_slice(vertices))
    }

    pub fn layout(&self) -> &BufferLayout {
        &self.inner.layout
    }

    pub fn vertex_count(&self) -> u32 {
        self.inner.vertex_count
    }

    pub fn byte_size(&self) -> usize {
        self.inner.buffer.byte_size
    }

    /// GPU name (0 until created)
    pub fn id(&self) -> u32 {
        self.inner.buffer.handle.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.buffer.handle.is_valid()
    }

    pub(crate) fn handle(&self) -> &GpuHandle {
        &self.inner.buffer.handle
    }
}

impl PartialEq for VertexBuffer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for VertexBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexBuffer")
            .field("id", &self.id())
            .field("vertex_count", &self.inner.vertex_count)
            .field("stride", &self.inner.layout.stride())
            .finish()
    }
}

// ===== INDEX BUFFER =====

/// Integer types usable as indices
pub trait IndexElement: Pod {
    const INDEX_TYPE: IndexType;
}

impl IndexElement for u8 {
    const INDEX_TYPE: IndexType = IndexType::U8;
}

impl IndexElement for u16 {
    const INDEX_TYPE: IndexType = IndexType::U16;
}

impl IndexElement for u32 {
    const INDEX_TYPE: IndexType = IndexType::U32;
}

struct IndexBufferInner {
    buffer: BufferInner,
    index_type: IndexType,
    count: u32,
}

/// Shared index buffer handle
#[derive(Clone)]
pub struct IndexBuffer {
    inner: Arc<IndexBufferInner>,
}

impl IndexBuffer {
    pub fn new<T: IndexElement>(renderer: &Renderer, indices: &[T], mode: SubmitMode) -> Self {
        Self {
            inner: Arc::new(IndexBufferInner {
                buffer: BufferInner::create(
                    renderer,
                    BufferTarget::Index,
                    bytemuck::cast_slice(indices),
                    mode,
                ),
                index_type: T::INDEX_TYPE,
                count: index_count(indices.len()),
            }),
        }
    }

    /// Number of indices
    pub fn count(&self) -> u32 {
        self.inner.count
    }

    pub fn index_type(&self) -> IndexType {
        self.inner.index_type
    }

    pub fn id(&self) -> u32 {
        self.inner.buffer.handle.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.buffer.handle.is_valid()
    }

    pub(crate) fn handle(&self) -> &GpuHandle {
        &self.inner.buffer.handle
    }
}

/// Index count as the device sees it; more than `u32::MAX` is fatal
fn index_count(len: usize) -> u32 {
    match u32::try_from(len) {
        Ok(count) => count,
        Err(_) => {
            engine_fatal!("relay3d::IndexBuffer", "{} indices exceed the u32 index range", len);
            u32::MAX
        }
    }
}

impl PartialEq for IndexBuffer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for IndexBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexBuffer")
            .field("id", &self.id())
            .field("index_type", &self.inner.index_type)
            .field("count", &self.inner.count)
            .finish()
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
