/// Plain data types shared by the device trait and the resource wrappers

use glam::{Mat4, Vec2, Vec3, Vec4};

// ============================================================================
// Frame state
// ============================================================================

bitflags::bitflags! {
    /// Framebuffer planes cleared by `GraphicsDevice::clear`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

impl Default for ClearFlags {
    fn default() -> Self {
        ClearFlags::COLOR | ClearFlags::DEPTH
    }
}

/// Blend equation presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendingMode {
    /// ONE, ONE
    Additive,
    /// ZERO, ONE_MINUS_SRC_COLOR
    Subtract,
    /// DST_COLOR, ZERO
    Multiply,
    /// ONE, ONE_MINUS_SRC_COLOR
    Screen,
    /// ONE, ZERO
    Replace,
    /// SRC_ALPHA, ONE_MINUS_SRC_ALPHA
    #[default]
    AlphaBlend,
    /// ONE, ONE_MINUS_SRC_ALPHA
    AlphaPremultiplied,
    /// SRC_ALPHA, ONE
    SourceAlphaAdditive,
}

// ============================================================================
// Textures
// ============================================================================

/// What a texture is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
    Specular,
    Ambient,
    Normal,
    Height,
}

/// Client-side pixel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba,
    Rgb,
    Rg,
    Red,
    RedInt,
}

impl TextureFormat {
    /// Number of channels
    pub fn channels(&self) -> u32 {
        match self {
            TextureFormat::Rgba => 4,
            TextureFormat::Rgb => 3,
            TextureFormat::Rg => 2,
            TextureFormat::Red | TextureFormat::RedInt => 1,
        }
    }
}

/// GPU-side storage format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum InternalFormat {
    RGBA8,
    RGBA16F,
    RGBA32F,
    RGB8,
    RGB16F,
    RGB32F,
    RG8,
    RG16F,
    RG32F,
    R8,
    R16,
    R8I,
    R16I,
    R32I,
    R8UI,
    R16UI,
    R32UI,
    R16F,
    R32F,
    DEPTH16,
    DEPTH24,
    DEPTH32F,
    DEPTH24_STENCIL8,
}

/// Component type of uploaded pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDataType {
    UnsignedByte,
    Byte,
    UnsignedShort,
    Short,
    UnsignedInt,
    Int,
    Float,
    HalfFloat,
}

impl TextureDataType {
    /// Size of one component in bytes
    pub fn size(&self) -> u32 {
        match self {
            TextureDataType::UnsignedByte | TextureDataType::Byte => 1,
            TextureDataType::UnsignedShort | TextureDataType::Short | TextureDataType::HalfFloat => 2,
            TextureDataType::UnsignedInt | TextureDataType::Int | TextureDataType::Float => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterType {
    Linear,
    MipmapLinear,
    Nearest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapType {
    ClampToEdge,
    Repeat,
}

/// Clear value of a render-target texture
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Float([f32; 4]),
    Int([i32; 4]),
    Uint([u32; 4]),
}

/// Host-side texture description
#[derive(Debug, Clone, PartialEq)]
pub struct TextureSpec {
    pub width: u32,
    pub height: u32,
    pub samples: u32,
    pub format: TextureFormat,
    pub internal_format: InternalFormat,
    pub data_type: TextureDataType,
    pub min_filter: FilterType,
    pub mag_filter: FilterType,
    pub wrap_s: WrapType,
    pub wrap_t: WrapType,
    pub wrap_r: WrapType,
    pub clear_value: ClearValue,
}

impl Default for TextureSpec {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            samples: 1,
            format: TextureFormat::Rgba,
            internal_format: InternalFormat::RGBA8,
            data_type: TextureDataType::UnsignedByte,
            min_filter: FilterType::Linear,
            mag_filter: FilterType::Linear,
            wrap_s: WrapType::ClampToEdge,
            wrap_t: WrapType::ClampToEdge,
            wrap_r: WrapType::ClampToEdge,
            clear_value: ClearValue::Float([0.0; 4]),
        }
    }
}

impl TextureSpec {
    /// RGBA8 texture of the given size
    pub fn rgba8(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Bytes of a full upload (width * height * channels * component size)
    pub fn byte_size(&self) -> usize {
        self.width as usize
            * self.height as usize
            * self.format.channels() as usize
            * self.data_type.size() as usize
    }
}

// ============================================================================
// Shaders
// ============================================================================

/// Value uploaded to a shader uniform
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Uint(u32),
    Float(f32),
    Bool(bool),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
}

/// Type of a vertex attribute or uniform, as declared in shader source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderDataType {
    Float,
    Float2,
    Float3,
    Float4,
    Mat3,
    Mat4,
    Int,
    Int2,
    Int3,
    Int4,
    Uint,
    Bool,
}

impl ShaderDataType {
    /// Size in bytes
    pub fn size(&self) -> u32 {
        match self {
            ShaderDataType::Float | ShaderDataType::Int | ShaderDataType::Uint => 4,
            ShaderDataType::Float2 | ShaderDataType::Int2 => 8,
            ShaderDataType::Float3 | ShaderDataType::Int3 => 12,
            ShaderDataType::Float4 | ShaderDataType::Int4 => 16,
            ShaderDataType::Mat3 => 36,
            ShaderDataType::Mat4 => 64,
            ShaderDataType::Bool => 1,
        }
    }

    /// Number of scalar components
    pub fn component_count(&self) -> u32 {
        match self {
            ShaderDataType::Float | ShaderDataType::Int | ShaderDataType::Uint | ShaderDataType::Bool => 1,
            ShaderDataType::Float2 | ShaderDataType::Int2 => 2,
            ShaderDataType::Float3 | ShaderDataType::Int3 => 3,
            ShaderDataType::Float4 | ShaderDataType::Int4 => 4,
            ShaderDataType::Mat3 => 9,
            ShaderDataType::Mat4 => 16,
        }
    }

    /// Whether the attribute is read as an integer
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ShaderDataType::Int
                | ShaderDataType::Int2
                | ShaderDataType::Int3
                | ShaderDataType::Int4
                | ShaderDataType::Uint
                | ShaderDataType::Bool
        )
    }
}

// ============================================================================
// Buffers and vertex arrays
// ============================================================================

/// Binding target of a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Vertex,
    Index,
}

/// Index element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U8,
    U16,
    U32,
}

impl IndexType {
    /// Size of one index in bytes
    pub fn size(&self) -> u32 {
        match self {
            IndexType::U8 => 1,
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// One attribute as seen by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub data_type: ShaderDataType,
    pub offset: u32,
    pub normalized: bool,
}

/// One vertex buffer attached to a vertex array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexBinding {
    pub buffer: u32,
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
