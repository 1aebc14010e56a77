/// Shader resource
///
/// Compiled by an object command. A compile or link failure is a fatal
/// assertion: there is no sensible way to keep rendering without it.
/// Uniforms are set by name; locations are looked up on the render thread
/// and cached per shader.

use std::sync::{Arc, Mutex, PoisonError};

use glam::{Mat4, Vec2, Vec3, Vec4};
use rustc_hash::FxHashMap;

use crate::graphics::{GraphicsDevice, UniformValue};
use crate::renderer::Renderer;
use crate::resource::{GpuHandle, ResourceOwner, SubmitMode};
use crate::{engine_error, engine_fatal};

struct ShaderInner {
    name: String,
    handle: GpuHandle,
    /// Uniform name -> location; `None` caches a miss
    locations: Mutex<FxHashMap<String, Option<i32>>>,
    owner: ResourceOwner,
}

impl Drop for ShaderInner {
    fn drop(&mut self) {
        self.owner
            .release(&self.handle, |device, id| device.delete_shader(id));
    }
}

/// Shared shader program handle
#[derive(Clone)]
pub struct Shader {
    inner: Arc<ShaderInner>,
}

impl Shader {
    /// Compile `vertex_source` + `fragment_source` into a program
    pub fn new(
        renderer: &Renderer,
        name: impl Into<String>,
        vertex_source: impl Into<String>,
        fragment_source: impl Into<String>,
        mode: SubmitMode,
    ) -> Self {
        let inner = ShaderInner {
            name: name.into(),
            handle: GpuHandle::new(),
            locations: Mutex::new(FxHashMap::default()),
            owner: ResourceOwner::new(renderer),
        };

        let name = inner.name.clone();
        let vertex_source = vertex_source.into();
        let fragment_source = fragment_source.into();
        let handle = inner.handle.clone();
        let device = inner.owner.device().clone();
        inner.owner.object(mode, move || {
            if handle.is_released() {
                return;
            }
            match device.create_shader(&name, &vertex_source, &fragment_source) {
                Ok(id) => handle.set(id),
                Err(err) => {
                    engine_fatal!("relay3d::Shader", "Shader '{}' failed to build: {}", name, err)
                }
            }
        });

        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// GPU name (0 until compiled)
    pub fn id(&self) -> u32 {
        self.inner.handle.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.handle.is_valid()
    }

    /// Make this the active program (a render command)
    pub fn bind(&self) {
        let shader = self.clone();
        let device = self.inner.owner.device().clone();
        self.inner.owner.render(move || device.bind_shader(shader.id()));
    }

    // ===== UNIFORMS =====

    /// Bind the program and upload `value` to uniform `name` (a render command)
    pub fn set_uniform(&self, name: &str, value: UniformValue) {
        let shader = self.clone();
        let name = name.to_string();
        let device = self.inner.owner.device().clone();
        self.inner.owner.render(move || {
            device.bind_shader(shader.id());
            shader.upload(device.as_ref(), &name, &value);
        });
    }

    pub fn set_int(&self, name: &str, value: i32) {
        self.set_uniform(name, UniformValue::Int(value));
    }

    pub fn set_int_array(&self, name: &str, values: &[i32]) {
        self.set_uniform(name, UniformValue::IntArray(values.to_vec()));
    }

    pub fn set_uint(&self, name: &str, value: u32) {
        self.set_uniform(name, UniformValue::Uint(value));
    }

    pub fn set_bool(&self, name: &str, value: bool) {
        self.set_uniform(name, UniformValue::Bool(value));
    }

    pub fn set_float(&self, name: &str, value: f32) {
        self.set_uniform(name, UniformValue::Float(value));
    }

    pub fn set_float_array(&self, name: &str, values: &[f32]) {
        self.set_uniform(name, UniformValue::FloatArray(values.to_vec()));
    }

    pub fn set_vec2(&self, name: &str, value: Vec2) {
        self.set_uniform(name, UniformValue::Vec2(value));
    }

    pub fn set_vec3(&self, name: &str, value: Vec3) {
        self.set_uniform(name, UniformValue::Vec3(value));
    }

    pub fn set_vec4(&self, name: &str, value: Vec4) {
        self.set_uniform(name, UniformValue::Vec4(value));
    }

    pub fn set_mat4(&self, name: &str, value: Mat4) {
        self.set_uniform(name, UniformValue::Mat4(value));
    }

    /// Upload to the currently bound program; render thread only
    ///
    /// An unknown uniform is logged once and the upload skipped.
    pub(crate) fn upload(&self, device: &dyn GraphicsDevice, name: &str, value: &UniformValue) {
        if let Some(location) = self.location(device, name) {
            device.set_uniform(location, value);
        }
    }

    fn location(&self, device: &dyn GraphicsDevice, name: &str) -> Option<i32> {
        let mut locations = self
            .inner
            .locations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = locations.get(name) {
            return *cached;
        }

        let location = device.uniform_location(self.id(), name);
        if location.is_none() {
            engine_error!(
                "relay3d::Shader",
                "Uniform '{}' not found in shader '{}'",
                name,
                self.inner.name
            );
        }
        locations.insert(name.to_string(), location);
        location
    }
}

impl PartialEq for Shader {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Shader {}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("name", &self.inner.name)
            .field("id", &self.id())
            .finish()
    }
}

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;
