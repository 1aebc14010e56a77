/// Mock graphics device for tests (no GPU required)
///
/// Records every call, hands out GL-style object names, understands just
/// enough GLSL to report uniform locations, and keeps track of which thread
/// holds the context so tests can prove that no GPU call escaped the render
/// thread.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use glam::Vec4;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::{engine_bail, engine_err};
use crate::graphics::{
    BlendingMode, BufferTarget, ClearFlags, GraphicsDevice, IndexType, TextureSpec, UniformValue,
    VertexBinding,
};
use crate::utils::IdAllocator;

// ============================================================================
// Recorded calls
// ============================================================================

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    MakeCurrent,
    ReleaseCurrent,
    SwapBuffers,
    Clear(ClearFlags),
    ClearColor(Vec4),
    SetViewport { x: i32, y: i32, width: u32, height: u32 },
    SetDepthTest(bool),
    SetWireframe(bool),
    SetBlendingMode(BlendingMode),
    CreateTexture { id: u32, width: u32, height: u32 },
    UploadTexture { id: u32, bytes: usize },
    BindTexture { id: u32, unit: u32 },
    DeleteTexture(u32),
    CreateShader { id: u32, name: String },
    BindShader(u32),
    SetUniform { shader: u32, name: String, value: UniformValue },
    DeleteShader(u32),
    CreateBuffer { id: u32, target: BufferTarget, bytes: usize },
    UpdateBuffer { id: u32, offset: usize, bytes: usize },
    DeleteBuffer(u32),
    CreateVertexArray { id: u32, buffers: Vec<u32>, index_buffer: Option<u32> },
    DeleteVertexArray(u32),
    DrawElements { vertex_array: u32, index_type: IndexType, count: u32 },
    DrawArrays { vertex_array: u32, count: u32 },
    DrawElementsInstanced { vertex_array: u32, index_type: IndexType, count: u32, instances: u32 },
    DrawArraysInstanced { vertex_array: u32, count: u32, instances: u32 },
}

impl DeviceCall {
    /// Whether this call is a draw
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            DeviceCall::DrawElements { .. }
                | DeviceCall::DrawArrays { .. }
                | DeviceCall::DrawElementsInstanced { .. }
                | DeviceCall::DrawArraysInstanced { .. }
        )
    }
}

// ============================================================================
// Mock device
// ============================================================================

#[derive(Default)]
struct MockState {
    calls: Vec<DeviceCall>,
    textures: IdAllocator,
    shaders: IdAllocator,
    buffers: IdAllocator,
    vertex_arrays: IdAllocator,
    /// Uniform names per program; the location is the index
    uniforms: FxHashMap<u32, Vec<String>>,
    bound_shader: u32,
    owner: Option<ThreadId>,
    refuse_context: bool,
    thread_violations: usize,
    invalid_deletes: usize,
}

/// In-memory `GraphicsDevice`
pub struct MockDevice {
    state: Mutex<MockState>,
}

impl MockDevice {
    /// Create a device whose context is current on the calling thread
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                owner: Some(thread::current().id()),
                ..Default::default()
            }),
        }
    }

    /// Create a device that refuses every `make_current`
    pub fn refusing_context() -> Self {
        let device = Self::new();
        device.lock().refuse_context = true;
        device
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock for a GPU call, counting it if the caller does not hold the context
    fn gpu(&self) -> MutexGuard<'_, MockState> {
        let mut state = self.lock();
        if state.owner != Some(thread::current().id()) {
            state.thread_violations += 1;
        }
        state
    }

    // ===== INSPECTION =====

    /// Every call recorded so far
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.lock().calls.clone()
    }

    /// Return and forget the recorded calls
    pub fn take_calls(&self) -> Vec<DeviceCall> {
        std::mem::take(&mut self.lock().calls)
    }

    /// Number of recorded calls matching `predicate`
    pub fn count(&self, predicate: impl Fn(&DeviceCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    /// Number of draw calls recorded
    pub fn draw_count(&self) -> usize {
        self.count(DeviceCall::is_draw)
    }

    /// GPU calls made from a thread that did not hold the context
    pub fn thread_violations(&self) -> usize {
        self.lock().thread_violations
    }

    /// Deletes of names that were not live (double delete, never created)
    pub fn invalid_deletes(&self) -> usize {
        self.lock().invalid_deletes
    }

    /// Whether the calling thread holds the context
    pub fn is_current(&self) -> bool {
        self.lock().owner == Some(thread::current().id())
    }

    /// Whether any thread holds the context
    pub fn has_owner(&self) -> bool {
        self.lock().owner.is_some()
    }

    pub fn live_textures(&self) -> usize {
        self.lock().textures.len()
    }

    pub fn live_shaders(&self) -> usize {
        self.lock().shaders.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.lock().buffers.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.lock().vertex_arrays.len()
    }

    pub fn is_texture_live(&self, id: u32) -> bool {
        self.lock().textures.is_live(id)
    }

    /// Uniform names declared by a program, in location order
    pub fn uniform_names(&self, shader: u32) -> Vec<String> {
        self.lock().uniforms.get(&shader).cloned().unwrap_or_default()
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MockDevice")
            .field("calls", &state.calls.len())
            .field("thread_violations", &state.thread_violations)
            .finish()
    }
}

/// Uniform names declared as `uniform <type> <name>;` in GLSL source
fn parse_uniforms(source: &str) -> impl Iterator<Item = String> + '_ {
    source.lines().filter_map(|line| {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("uniform") {
            return None;
        }
        let _type = tokens.next()?;
        let name = tokens.next()?.trim_end_matches(';');
        let name = name.split('[').next().unwrap_or(name);
        (!name.is_empty()).then(|| name.to_string())
    })
}

fn free_or_flag(ids: &mut IdAllocator, id: u32, invalid_deletes: &mut usize) {
    if !ids.free(id) {
        *invalid_deletes += 1;
    }
}

impl GraphicsDevice for MockDevice {
    fn make_current(&self) -> Result<()> {
        let mut state = self.lock();
        if state.refuse_context {
            engine_bail!("relay3d::MockDevice", "context acquisition refused");
        }
        let me = thread::current().id();
        match state.owner {
            Some(owner) if owner != me => Err(engine_err!(
                "relay3d::MockDevice",
                "context is current on another thread"
            )),
            _ => {
                state.owner = Some(me);
                state.calls.push(DeviceCall::MakeCurrent);
                Ok(())
            }
        }
    }

    fn release_current(&self) {
        let mut state = self.gpu();
        if state.owner == Some(thread::current().id()) {
            state.owner = None;
        }
        state.calls.push(DeviceCall::ReleaseCurrent);
    }

    fn swap_buffers(&self) {
        self.gpu().calls.push(DeviceCall::SwapBuffers);
    }

    fn clear(&self, flags: ClearFlags) {
        self.gpu().calls.push(DeviceCall::Clear(flags));
    }

    fn clear_color(&self, color: Vec4) {
        self.gpu().calls.push(DeviceCall::ClearColor(color));
    }

    fn set_viewport(&self, x: i32, y: i32, width: u32, height: u32) {
        self.gpu().calls.push(DeviceCall::SetViewport { x, y, width, height });
    }

    fn set_depth_test(&self, enabled: bool) {
        self.gpu().calls.push(DeviceCall::SetDepthTest(enabled));
    }

    fn set_wireframe(&self, enabled: bool) {
        self.gpu().calls.push(DeviceCall::SetWireframe(enabled));
    }

    fn set_blending_mode(&self, mode: BlendingMode) {
        self.gpu().calls.push(DeviceCall::SetBlendingMode(mode));
    }

    fn create_texture(&self, spec: &TextureSpec) -> u32 {
        let mut state = self.gpu();
        let id = state.textures.alloc();
        state.calls.push(DeviceCall::CreateTexture {
            id,
            width: spec.width,
            height: spec.height,
        });
        id
    }

    fn upload_texture(&self, texture: u32, _spec: &TextureSpec, data: &[u8]) {
        self.gpu().calls.push(DeviceCall::UploadTexture {
            id: texture,
            bytes: data.len(),
        });
    }

    fn bind_texture(&self, texture: u32, unit: u32) {
        self.gpu().calls.push(DeviceCall::BindTexture { id: texture, unit });
    }

    fn delete_texture(&self, texture: u32) {
        let mut state = self.gpu();
        let MockState { textures, invalid_deletes, .. } = &mut *state;
        free_or_flag(textures, texture, invalid_deletes);
        state.calls.push(DeviceCall::DeleteTexture(texture));
    }

    fn create_shader(&self, name: &str, vertex_source: &str, fragment_source: &str) -> Result<u32> {
        let mut state = self.gpu();
        for (stage, source) in [("vertex", vertex_source), ("fragment", fragment_source)] {
            if source.contains("#error") {
                engine_bail!("relay3d::MockDevice", "{}: {} shader failed to compile", name, stage);
            }
        }

        let id = state.shaders.alloc();
        let uniforms = parse_uniforms(vertex_source)
            .chain(parse_uniforms(fragment_source))
            .fold(Vec::new(), |mut names, name| {
                if !names.contains(&name) {
                    names.push(name);
                }
                names
            });
        state.uniforms.insert(id, uniforms);
        state.calls.push(DeviceCall::CreateShader {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }

    fn bind_shader(&self, shader: u32) {
        let mut state = self.gpu();
        state.bound_shader = shader;
        state.calls.push(DeviceCall::BindShader(shader));
    }

    fn uniform_location(&self, shader: u32, name: &str) -> Option<i32> {
        let state = self.gpu();
        state
            .uniforms
            .get(&shader)?
            .iter()
            .position(|uniform| uniform == name)
            .map(|location| location as i32)
    }

    fn set_uniform(&self, location: i32, value: &UniformValue) {
        let mut state = self.gpu();
        let shader = state.bound_shader;
        let name = state
            .uniforms
            .get(&shader)
            .and_then(|names| names.get(location as usize))
            .cloned()
            .unwrap_or_else(|| format!("<location {}>", location));
        state.calls.push(DeviceCall::SetUniform {
            shader,
            name,
            value: value.clone(),
        });
    }

    fn delete_shader(&self, shader: u32) {
        let mut state = self.gpu();
        let MockState { shaders, invalid_deletes, .. } = &mut *state;
        free_or_flag(shaders, shader, invalid_deletes);
        state.uniforms.remove(&shader);
        if state.bound_shader == shader {
            state.bound_shader = 0;
        }
        state.calls.push(DeviceCall::DeleteShader(shader));
    }

    fn create_buffer(&self, target: BufferTarget, data: &[u8]) -> u32 {
        let mut state = self.gpu();
        let id = state.buffers.alloc();
        state.calls.push(DeviceCall::CreateBuffer {
            id,
            target,
            bytes: data.len(),
        });
        id
    }

    fn update_buffer(&self, buffer: u32, offset: usize, data: &[u8]) {
        self.gpu().calls.push(DeviceCall::UpdateBuffer {
            id: buffer,
            offset,
            bytes: data.len(),
        });
    }

    fn delete_buffer(&self, buffer: u32) {
        let mut state = self.gpu();
        let MockState { buffers, invalid_deletes, .. } = &mut *state;
        free_or_flag(buffers, buffer, invalid_deletes);
        state.calls.push(DeviceCall::DeleteBuffer(buffer));
    }

    fn create_vertex_array(&self, bindings: &[VertexBinding], index_buffer: Option<u32>) -> u32 {
        let mut state = self.gpu();
        let id = state.vertex_arrays.alloc();
        state.calls.push(DeviceCall::CreateVertexArray {
            id,
            buffers: bindings.iter().map(|binding| binding.buffer).collect(),
            index_buffer,
        });
        id
    }

    fn delete_vertex_array(&self, vertex_array: u32) {
        let mut state = self.gpu();
        let MockState { vertex_arrays, invalid_deletes, .. } = &mut *state;
        free_or_flag(vertex_arrays, vertex_array, invalid_deletes);
        state.calls.push(DeviceCall::DeleteVertexArray(vertex_array));
    }

    fn draw_elements(&self, vertex_array: u32, index_type: IndexType, count: u32) {
        self.gpu().calls.push(DeviceCall::DrawElements {
            vertex_array,
            index_type,
            count,
        });
    }

    fn draw_arrays(&self, vertex_array: u32, count: u32) {
        self.gpu().calls.push(DeviceCall::DrawArrays { vertex_array, count });
    }

    fn draw_elements_instanced(
        &self,
        vertex_array: u32,
        index_type: IndexType,
        count: u32,
        instances: u32,
    ) {
        self.gpu().calls.push(DeviceCall::DrawElementsInstanced {
            vertex_array,
            index_type,
            count,
            instances,
        });
    }

    fn draw_arrays_instanced(&self, vertex_array: u32, count: u32, instances: u32) {
        self.gpu().calls.push(DeviceCall::DrawArraysInstanced {
            vertex_array,
            count,
            instances,
        });
    }
}

#[cfg(test)]
#[path = "mock_device_tests.rs"]
mod tests;
