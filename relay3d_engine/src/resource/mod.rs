/// GPU resource wrappers
///
/// Host-side descriptors built synchronously; GPU allocation, upload and
/// deletion scheduled through the renderer's object family.

pub mod buffer;
pub mod handle;
pub mod shader;
pub mod texture;
pub mod vertex_array;

pub(crate) use handle::ResourceOwner;

pub use buffer::{BufferElement, BufferLayout, IndexBuffer, IndexElement, VertexBuffer};
pub use handle::{GpuHandle, SubmitMode};
pub use shader::Shader;
pub use texture::Texture;
pub use vertex_array::VertexArray;
