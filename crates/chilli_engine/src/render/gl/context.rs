//! GL function surface used by the resource wrappers and command executor
//!
//! Every native call the render backend makes goes through [`GlContext`]. A
//! driver-backed implementation forwards to OpenGL ES; [`HeadlessGl`](super::HeadlessGl)
//! emulates the object namespaces in memory, including context loss.

use std::fmt;
use std::num::NonZeroU32;

use bitflags::bitflags;
use thiserror::Error;

use crate::foundation::math::{Colour, Mat4, Resolution, Vec3, Vec4};

/// Result type for GL calls
pub type GlResult<T> = Result<T, GlError>;

/// Native GL object name
///
/// GL reserves `0` for "no object", so a live handle is always non-zero and a
/// zeroed/destroyed handle is represented as `Option::<GlHandle>::None`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlHandle(NonZeroU32);

impl GlHandle {
    /// Wrap a raw GL name; `0` yields `None`
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// The raw GL name
    pub fn raw(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Debug for GlHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GlHandle({})", self.0)
    }
}

/// Errors reported by GL calls
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GlError {
    /// The context has been destroyed; no call can succeed until it is recreated
    #[error("GL context lost")]
    ContextLost,

    /// A handle does not name a live object of the expected type
    #[error("Invalid GL handle {0}")]
    InvalidHandle(u32),

    /// Operation on a buffer target with nothing bound
    #[error("No buffer bound to {0:?}")]
    NothingBound(BufferTarget),

    /// Write or read outside the buffer's storage
    #[error("Access of {len} bytes at offset {offset} exceeds buffer size {size}")]
    OutOfRange {
        /// Byte offset of the access
        offset: usize,
        /// Length of the access
        len: usize,
        /// Size of the buffer storage
        size: usize,
    },

    /// Shader compilation or program link failed
    #[error("Shader compilation failed: {0}")]
    ShaderCompile(String),

    /// Framebuffer attachments do not form a complete framebuffer
    #[error("Framebuffer incomplete: {0}")]
    FramebufferIncomplete(String),

    /// The driver could not allocate another object
    #[error("GL out of memory")]
    OutOfMemory,

    /// Any other misuse of the API
    #[error("Invalid GL operation: {0}")]
    InvalidOperation(String),
}

/// Buffer binding points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex data (`GL_ARRAY_BUFFER`)
    Array,
    /// Index data (`GL_ELEMENT_ARRAY_BUFFER`)
    ElementArray,
}

/// Buffer usage hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Written once, drawn many times
    Static,
    /// Rewritten every frame
    Dynamic,
}

/// Kind of texture object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// Regular 2D texture
    Texture2d,
    /// Six-faced cubemap
    Cubemap,
}

/// Faces of a cubemap in GL order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubemapFace {
    /// +X
    PositiveX,
    /// -X
    NegativeX,
    /// +Y
    PositiveY,
    /// -Y
    NegativeY,
    /// +Z
    PositiveZ,
    /// -Z
    NegativeZ,
}

impl CubemapFace {
    /// All faces in upload order
    pub const ALL: [Self; 6] = [
        Self::PositiveX,
        Self::NegativeX,
        Self::PositiveY,
        Self::NegativeY,
        Self::PositiveZ,
        Self::NegativeZ,
    ];

    /// Index of the face in [`CubemapFace::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Pixel formats supported by texture uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TextureFormat {
    /// 8-bit RGBA
    Rgba8,
    /// 8-bit RGB
    Rgb8,
    /// 8-bit single channel
    Luminance8,
    /// 16-bit depth
    Depth16,
}

impl TextureFormat {
    /// Bytes per pixel of the format
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
            Self::Rgb8 => 3,
            Self::Luminance8 => 1,
            Self::Depth16 => 2,
        }
    }

    /// Size in bytes of one image of the given resolution
    pub fn image_size(self, resolution: Resolution) -> usize {
        resolution.area() * self.bytes_per_pixel()
    }
}

/// Framebuffer attachment points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    /// Colour attachment 0
    Colour,
    /// Depth attachment
    Depth,
}

/// Primitive topology for draw calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimitiveType {
    /// Triangle list
    #[default]
    Triangles,
    /// Line list
    Lines,
}

bitflags! {
    /// Buffers cleared by [`GlContext::clear`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        /// Colour buffer
        const COLOUR = 1 << 0;
        /// Depth buffer
        const DEPTH = 1 << 1;
        /// Stencil buffer
        const STENCIL = 1 << 2;
    }
}

/// Value uploaded to a shader uniform
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    /// Single float
    Float(f32),
    /// Integer or sampler unit
    Int(i32),
    /// 3-component vector
    Vec3(Vec3),
    /// 4-component vector
    Vec4(Vec4),
    /// 4x4 matrix
    Mat4(Mat4),
}

/// The GL entry points needed by the render backend
///
/// Buffers follow GL's bind-to-edit model so the executor's bind cache is
/// meaningful; textures, programs and framebuffers are addressed directly by
/// handle.
pub trait GlContext: Send {
    /// Generate a buffer object
    fn gen_buffer(&mut self) -> GlResult<GlHandle>;

    /// Delete a buffer object; deleting a dead name is ignored
    fn delete_buffer(&mut self, handle: GlHandle);

    /// Bind a buffer (or nothing) to a target
    fn bind_buffer(&mut self, target: BufferTarget, handle: Option<GlHandle>) -> GlResult<()>;

    /// (Re)allocate storage of the buffer bound to `target`, optionally filling it
    fn buffer_data(&mut self, target: BufferTarget, size: usize, data: Option<&[u8]>, usage: BufferUsage) -> GlResult<()>;

    /// Overwrite part of the storage of the buffer bound to `target`
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) -> GlResult<()>;

    /// Map the buffer bound to `target` for reading and copy its storage out
    fn read_buffer(&mut self, target: BufferTarget) -> GlResult<Vec<u8>>;

    /// Generate a texture object of the given kind
    fn gen_texture(&mut self, kind: TextureKind) -> GlResult<GlHandle>;

    /// Delete a texture object; deleting a dead name is ignored
    fn delete_texture(&mut self, handle: GlHandle);

    /// Define the image of a texture (or one cubemap face). `None` data allocates uninitialised storage.
    fn tex_image(
        &mut self,
        handle: GlHandle,
        face: Option<CubemapFace>,
        resolution: Resolution,
        format: TextureFormat,
        data: Option<&[u8]>,
    ) -> GlResult<()>;

    /// Bind a texture to a sampler unit
    fn bind_texture(&mut self, unit: u32, handle: Option<GlHandle>) -> GlResult<()>;

    /// Compile and link a program from vertex and fragment sources
    fn create_program(&mut self, vertex_source: &str, fragment_source: &str) -> GlResult<GlHandle>;

    /// Delete a program; deleting a dead name is ignored
    fn delete_program(&mut self, handle: GlHandle);

    /// Make a program current
    fn use_program(&mut self, handle: Option<GlHandle>) -> GlResult<()>;

    /// Look up a uniform location in a linked program
    fn uniform_location(&mut self, program: GlHandle, name: &str) -> GlResult<Option<i32>>;

    /// Set a uniform of the current program
    fn set_uniform(&mut self, location: i32, value: UniformValue) -> GlResult<()>;

    /// Generate a framebuffer object
    fn gen_framebuffer(&mut self) -> GlResult<GlHandle>;

    /// Delete a framebuffer; deleting a dead name is ignored
    fn delete_framebuffer(&mut self, handle: GlHandle);

    /// Bind a framebuffer; `None` binds the default framebuffer
    fn bind_framebuffer(&mut self, handle: Option<GlHandle>) -> GlResult<()>;

    /// Attach a texture to the bound framebuffer
    fn framebuffer_texture(&mut self, attachment: Attachment, texture: GlHandle) -> GlResult<()>;

    /// Generate a renderbuffer with depth storage of the given resolution
    fn create_depth_renderbuffer(&mut self, resolution: Resolution) -> GlResult<GlHandle>;

    /// Delete a renderbuffer; deleting a dead name is ignored
    fn delete_renderbuffer(&mut self, handle: GlHandle);

    /// Attach a renderbuffer to the bound framebuffer
    fn framebuffer_renderbuffer(&mut self, attachment: Attachment, renderbuffer: GlHandle) -> GlResult<()>;

    /// Check completeness of the bound framebuffer
    fn check_framebuffer_status(&mut self) -> GlResult<()>;

    /// Set the viewport
    fn viewport(&mut self, resolution: Resolution);

    /// Clear buffers of the bound framebuffer
    fn clear(&mut self, flags: ClearFlags, colour: Colour) -> GlResult<()>;

    /// Draw indexed primitives from the bound vertex and index buffers
    fn draw_elements(&mut self, primitive: PrimitiveType, index_count: u32, first_index: u32) -> GlResult<()>;

    /// Draw non-indexed primitives from the bound vertex buffer
    fn draw_arrays(&mut self, primitive: PrimitiveType, first_vertex: u32, vertex_count: u32) -> GlResult<()>;
}
