//! OpenGL backend
//!
//! Resource wrappers own native object names and know how to survive the GL
//! context being destroyed underneath them:
//!
//! - [`GlMesh`], [`GlTexture`], [`GlCubemap`] keep an optional CPU backup and
//!   restore from it
//! - [`GlDynamicMeshBuffer`] reads its contents back before the loss
//! - [`GlShader`] is only ever restored by reloading its source
//! - [`GlTargetGroup`] is rebuilt around its restored attachment textures
//!
//! All of them talk to GL through the [`GlContext`] trait and bind through the
//! executor's [`GlStateCache`].

pub mod backup;
pub mod context;
pub mod cubemap;
pub mod headless;
pub mod mesh;
pub mod mesh_buffer;
pub mod shader;
pub mod state_cache;
pub mod target_group;
pub mod texture;

pub use backup::{BackupData, GpuResource};
pub use context::{
    Attachment, BufferTarget, BufferUsage, ClearFlags, CubemapFace, GlContext, GlError, GlHandle, GlResult,
    PrimitiveType, TextureFormat, TextureKind, UniformValue,
};
pub use cubemap::GlCubemap;
pub use headless::{HeadlessGl, HeadlessStats};
pub use mesh::{GlMesh, VertexFormat};
pub use mesh_buffer::GlDynamicMeshBuffer;
pub use shader::GlShader;
pub use state_cache::GlStateCache;
pub use target_group::{GlTargetGroup, TargetAttachments};
pub use texture::GlTexture;
