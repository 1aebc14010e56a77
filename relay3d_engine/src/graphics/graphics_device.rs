/// GraphicsDevice trait - the seam between the pipeline and a graphics API
///
/// Implemented by the windowing/backend layer (an OpenGL context, a software
/// rasterizer, `MockDevice` in tests). Methods take `&self`: the device is
/// shared between the submitting thread (which only hands it over) and the
/// render thread (which owns the context and makes every other call).

use glam::Vec4;

use crate::error::Result;
use crate::graphics::{
    BlendingMode, BufferTarget, ClearFlags, IndexType, TextureSpec, UniformValue, VertexBinding,
};

/// Graphics API abstraction driven by render and object commands
///
/// Object names are GL-style: non-zero `u32` values, 0 meaning "none".
pub trait GraphicsDevice: Send + Sync {
    // ===== CONTEXT =====

    /// Bind the graphics context to the calling thread
    fn make_current(&self) -> Result<()>;

    /// Unbind the graphics context from the calling thread
    fn release_current(&self);

    /// Present the back buffer
    fn swap_buffers(&self);

    // ===== STATE =====

    fn clear(&self, flags: ClearFlags);

    fn clear_color(&self, color: Vec4);

    fn set_viewport(&self, x: i32, y: i32, width: u32, height: u32);

    fn set_depth_test(&self, enabled: bool);

    fn set_wireframe(&self, enabled: bool);

    fn set_blending_mode(&self, mode: BlendingMode);

    // ===== TEXTURES =====

    /// Allocate texture storage described by `spec`
    fn create_texture(&self, spec: &TextureSpec) -> u32;

    /// Upload a full image; `data.len()` is `spec.byte_size()`
    fn upload_texture(&self, texture: u32, spec: &TextureSpec, data: &[u8]);

    fn bind_texture(&self, texture: u32, unit: u32);

    fn delete_texture(&self, texture: u32);

    // ===== SHADERS =====

    /// Compile and link a program
    ///
    /// # Errors
    ///
    /// Returns an error carrying the compiler log if compilation or linking
    /// fails.
    fn create_shader(&self, name: &str, vertex_source: &str, fragment_source: &str) -> Result<u32>;

    fn bind_shader(&self, shader: u32);

    /// Location of a uniform, `None` if the program has no such uniform
    fn uniform_location(&self, shader: u32, name: &str) -> Option<i32>;

    /// Upload a uniform of the currently bound program
    fn set_uniform(&self, location: i32, value: &UniformValue);

    fn delete_shader(&self, shader: u32);

    // ===== BUFFERS =====

    fn create_buffer(&self, target: BufferTarget, data: &[u8]) -> u32;

    fn update_buffer(&self, buffer: u32, offset: usize, data: &[u8]);

    fn delete_buffer(&self, buffer: u32);

    // ===== VERTEX ARRAYS =====

    /// Create a vertex array from vertex buffer bindings and an optional
    /// index buffer
    fn create_vertex_array(&self, bindings: &[VertexBinding], index_buffer: Option<u32>) -> u32;

    fn delete_vertex_array(&self, vertex_array: u32);

    // ===== DRAWS =====

    fn draw_elements(&self, vertex_array: u32, index_type: IndexType, count: u32);

    fn draw_arrays(&self, vertex_array: u32, count: u32);

    fn draw_elements_instanced(
        &self,
        vertex_array: u32,
        index_type: IndexType,
        count: u32,
        instances: u32,
    );

    fn draw_arrays_instanced(&self, vertex_array: u32, count: u32, instances: u32);
}
