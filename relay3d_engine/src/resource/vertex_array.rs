/// Vertex array: vertex buffers plus an optional index buffer
///
/// Attribute locations are assigned in order across all vertex buffers.
/// Matrix attributes take one location per column.

use std::sync::Arc;

use crate::graphics::{IndexType, ShaderDataType, VertexAttribute, VertexBinding};
use crate::renderer::Renderer;
use crate::resource::{GpuHandle, IndexBuffer, ResourceOwner, SubmitMode, VertexBuffer};

struct VertexArrayInner {
    handle: GpuHandle,
    vertex_buffers: Vec<VertexBuffer>,
    index_buffer: Option<IndexBuffer>,
    owner: ResourceOwner,
}

impl Drop for VertexArrayInner {
    fn drop(&mut self) {
        // Buffers are released after this, when the fields drop
        self.owner
            .release(&self.handle, |device, id| device.delete_vertex_array(id));
    }
}

/// Shared vertex array handle
#[derive(Clone)]
pub struct VertexArray {
    inner: Arc<VertexArrayInner>,
}

impl VertexArray {
    pub fn new(
        renderer: &Renderer,
        vertex_buffers: Vec<VertexBuffer>,
        index_buffer: Option<IndexBuffer>,
        mode: SubmitMode,
    ) -> Self {
        let inner = VertexArrayInner {
            handle: GpuHandle::new(),
            vertex_buffers,
            index_buffer,
            owner: ResourceOwner::new(renderer),
        };

        // Buffer names are only known once their creation commands ran,
        // which is before this one in the same family
        let handle = inner.handle.clone();
        let device = inner.owner.device().clone();
        let vertex_buffers = inner.vertex_buffers.clone();
        let index_buffer = inner.index_buffer.clone();
        inner.owner.object(mode, move || {
            if handle.is_released() {
                return;
            }
            let bindings = build_bindings(&vertex_buffers);
            let index = index_buffer.as_ref().map(|buffer| buffer.handle().get());
            handle.set(device.create_vertex_array(&bindings, index));
        });

        Self {
            inner: Arc::new(inner),
        }
    }

    /// GPU name (0 until created)
    pub fn id(&self) -> u32 {
        self.inner.handle.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.handle.is_valid()
    }

    /// Vertices drawable from every attached buffer (0 without buffers)
    pub fn vertex_count(&self) -> u32 {
        self.inner
            .vertex_buffers
            .iter()
            .map(VertexBuffer::vertex_count)
            .min()
            .unwrap_or(0)
    }

    /// Index count, if indexed
    pub fn index_count(&self) -> Option<u32> {
        self.inner.index_buffer.as_ref().map(IndexBuffer::count)
    }

    pub fn index_type(&self) -> Option<IndexType> {
        self.inner.index_buffer.as_ref().map(IndexBuffer::index_type)
    }

    pub fn vertex_buffers(&self) -> &[VertexBuffer] {
        &self.inner.vertex_buffers
    }

    pub fn index_buffer(&self) -> Option<&IndexBuffer> {
        self.inner.index_buffer.as_ref()
    }
}

impl PartialEq for VertexArray {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for VertexArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexArray")
            .field("id", &self.id())
            .field("vertex_buffers", &self.inner.vertex_buffers.len())
            .field("indexed", &self.inner.index_buffer.is_some())
            .finish()
    }
}

fn location_span(data_type: ShaderDataType) -> u32 {
    match data_type {
        ShaderDataType::Mat3 => 3,
        ShaderDataType::Mat4 => 4,
        _ => 1,
    }
}

fn build_bindings(vertex_buffers: &[VertexBuffer]) -> Vec<VertexBinding> {
    let mut location = 0;
    vertex_buffers
        .iter()
        .map(|buffer| {
            let layout = buffer.layout();
            let attributes = layout
                .elements()
                .iter()
                .map(|element| {
                    let attribute = VertexAttribute {
                        location,
                        data_type: element.data_type,
                        offset: element.offset,
                        normalized: element.normalized,
                    };
                    location += location_span(element.data_type);
                    attribute
                })
                .collect();

            VertexBinding {
                buffer: buffer.handle().get(),
                stride: layout.stride(),
                attributes,
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "vertex_array_tests.rs"]
mod tests;
