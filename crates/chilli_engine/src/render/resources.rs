//! # Render Resources
//!
//! Shared, engine-facing handles for GPU resources. Each resource carries its
//! metadata (id, where it was loaded from, load state) plus a typed backend
//! slot holding the GL wrapper once the render thread has created it.
//!
//! ## Ownership
//!
//! Resources are `Arc`-shared between the resource pool, render snapshots and
//! the commands built from them. The backend slot is locked by the render
//! thread while it executes a command, and by the lifecycle thread only while
//! the render thread is idle (suspended), so the two never contend.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::gl::{
    GlCubemap, GlHandle, GlMesh, GlShader, GlTargetGroup, GlTexture, GpuResource, TargetAttachments, TextureFormat,
    VertexFormat,
};
use crate::foundation::math::{Colour, Resolution};
use crate::resource::{LoadState, StorageLocation};

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a render resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Allocate the next id
    pub fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a resource came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceSource {
    /// Storage location of the backing file, [`StorageLocation::None`] when built in memory
    pub location: StorageLocation,
    /// Path of the backing file relative to the storage location
    pub path: Option<PathBuf>,
}

impl ResourceSource {
    /// Source of a resource built in memory
    pub fn in_memory() -> Self {
        Self { location: StorageLocation::None, path: None }
    }

    /// Source of a resource loaded from a file
    pub fn file(location: StorageLocation, path: impl Into<PathBuf>) -> Self {
        Self { location, path: Some(path.into()) }
    }

    /// Whether the resource can be reloaded from storage
    pub fn is_file_backed(&self) -> bool {
        self.location != StorageLocation::None && self.path.is_some()
    }

    /// Path of the backing file
    pub fn file_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl fmt::Display for ResourceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{:?}:{}", self.location, path.display()),
            None => write!(f, "{:?}", self.location),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lock-protected slot holding a backend GL wrapper
#[derive(Debug)]
pub struct BackendSlot<T> {
    inner: Mutex<Option<T>>,
}

impl<T> Default for BackendSlot<T> {
    fn default() -> Self {
        Self { inner: Mutex::new(None) }
    }
}

impl<T> BackendSlot<T> {
    /// Lock the slot
    pub fn lock(&self) -> MutexGuard<'_, Option<T>> {
        lock(&self.inner)
    }

    /// Whether a backend has been created
    pub fn is_loaded(&self) -> bool {
        self.lock().is_some()
    }
}

impl<T: GpuResource> BackendSlot<T> {
    /// Invalidate the backend, if any; returns whether there was one
    pub fn invalidate(&self) -> bool {
        match self.lock().as_mut() {
            Some(backend) => {
                backend.invalidate();
                true
            }
            None => false,
        }
    }

    /// Whether the backend exists and holds live handles
    pub fn is_valid(&self) -> bool {
        self.lock().as_ref().is_some_and(GpuResource::is_valid)
    }
}

/// Identity, origin and load state shared by every render resource
#[derive(Debug)]
pub struct ResourceHeader {
    id: ResourceId,
    source: ResourceSource,
    load_state: Mutex<LoadState>,
}

impl ResourceHeader {
    fn new(source: ResourceSource) -> Self {
        Self {
            id: ResourceId::next(),
            source,
            load_state: Mutex::new(LoadState::Loading),
        }
    }

    /// Resource id
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Where the resource came from
    pub fn source(&self) -> &ResourceSource {
        &self.source
    }

    /// Storage location of the backing file
    pub fn storage_location(&self) -> StorageLocation {
        self.source.location
    }

    /// Current load state
    pub fn load_state(&self) -> LoadState {
        *lock(&self.load_state)
    }

    /// Update the load state
    pub fn set_load_state(&self, state: LoadState) {
        *lock(&self.load_state) = state;
    }
}

macro_rules! render_resource {
    ($name:ident, $backend:ty, $kind:literal) => {
        impl $name {
            /// Human readable resource kind
            pub const KIND: &'static str = $kind;

            /// Identity, origin and load state
            pub fn header(&self) -> &ResourceHeader {
                &self.header
            }

            /// Resource id
            pub fn id(&self) -> ResourceId {
                self.header.id()
            }

            /// Storage location of the backing file
            pub fn storage_location(&self) -> StorageLocation {
                self.header.storage_location()
            }

            /// Backend GL wrapper slot
            pub fn backend(&self) -> &BackendSlot<$backend> {
                &self.backend
            }
        }
    };
}

/// Shader program resource
#[derive(Debug)]
pub struct RenderShader {
    header: ResourceHeader,
    backend: BackendSlot<GlShader>,
}

impl RenderShader {
    /// Create an unloaded shader
    pub fn new(source: ResourceSource) -> Arc<Self> {
        Arc::new(Self { header: ResourceHeader::new(source), backend: BackendSlot::default() })
    }

    /// Program name of the loaded backend
    pub fn program(&self) -> Option<GlHandle> {
        self.backend.lock().as_ref().and_then(GlShader::program)
    }
}

render_resource!(RenderShader, GlShader, "shader");

/// Pixel data for a texture upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    /// Image size
    pub resolution: Resolution,
    /// Pixel format
    pub format: TextureFormat,
    /// Pixels, `None` for uninitialised storage (render targets)
    pub pixels: Option<Vec<u8>>,
}

/// 2D texture resource
#[derive(Debug)]
pub struct RenderTexture {
    header: ResourceHeader,
    backend: BackendSlot<GlTexture>,
}

impl RenderTexture {
    /// Create an unloaded texture
    pub fn new(source: ResourceSource) -> Arc<Self> {
        Arc::new(Self { header: ResourceHeader::new(source), backend: BackendSlot::default() })
    }

    /// Texture name of the loaded backend
    pub fn handle(&self) -> Option<GlHandle> {
        self.backend.lock().as_ref().and_then(GlTexture::handle)
    }

    /// Image size of the loaded backend
    pub fn resolution(&self) -> Option<Resolution> {
        self.backend.lock().as_ref().map(GlTexture::resolution)
    }
}

render_resource!(RenderTexture, GlTexture, "texture");

/// Pixel data for the six faces of a cubemap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubemapData {
    /// Size of each face
    pub face_resolution: Resolution,
    /// Pixel format of every face
    pub format: TextureFormat,
    /// Face pixels in `CubemapFace::ALL` order
    pub faces: [Vec<u8>; 6],
}

/// Cubemap resource
#[derive(Debug)]
pub struct RenderCubemap {
    header: ResourceHeader,
    backend: BackendSlot<GlCubemap>,
}

impl RenderCubemap {
    /// Create an unloaded cubemap
    pub fn new(source: ResourceSource) -> Arc<Self> {
        Arc::new(Self { header: ResourceHeader::new(source), backend: BackendSlot::default() })
    }

    /// Texture name of the loaded backend
    pub fn handle(&self) -> Option<GlHandle> {
        self.backend.lock().as_ref().and_then(GlCubemap::handle)
    }
}

render_resource!(RenderCubemap, GlCubemap, "cubemap");

/// Vertex and index data for a mesh upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshData {
    /// Vertex layout
    pub vertex_format: VertexFormat,
    /// Interleaved vertex bytes
    pub vertices: Vec<u8>,
    /// Triangle indices, empty for non-indexed meshes
    pub indices: Vec<u16>,
}

impl MeshData {
    /// Number of whole vertices in the data
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / self.vertex_format.stride()
    }
}

/// Mesh resource
#[derive(Debug)]
pub struct RenderMesh {
    header: ResourceHeader,
    vertex_format: VertexFormat,
    backend: BackendSlot<GlMesh>,
}

impl RenderMesh {
    /// Create an unloaded mesh
    pub fn new(source: ResourceSource, vertex_format: VertexFormat) -> Arc<Self> {
        Arc::new(Self {
            header: ResourceHeader::new(source),
            vertex_format,
            backend: BackendSlot::default(),
        })
    }

    /// Vertex layout
    pub fn vertex_format(&self) -> VertexFormat {
        self.vertex_format
    }
}

render_resource!(RenderMesh, GlMesh, "mesh");

/// A collection of meshes loaded or built together
#[derive(Debug)]
pub struct Model {
    id: ResourceId,
    source: ResourceSource,
    meshes: Vec<Arc<RenderMesh>>,
}

impl Model {
    /// Create a model from its meshes
    pub fn new(source: ResourceSource, meshes: Vec<Arc<RenderMesh>>) -> Arc<Self> {
        Arc::new(Self { id: ResourceId::next(), source, meshes })
    }

    /// Model id
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Where the model came from
    pub fn source(&self) -> &ResourceSource {
        &self.source
    }

    /// Storage location of the backing file
    pub fn storage_location(&self) -> StorageLocation {
        self.source.location
    }

    /// Meshes of the model
    pub fn meshes(&self) -> &[Arc<RenderMesh>] {
        &self.meshes
    }
}

/// Render target group resource: colour and/or depth textures rendered into
#[derive(Debug)]
pub struct RenderTargetGroup {
    header: ResourceHeader,
    resolution: Resolution,
    colour: Option<Arc<RenderTexture>>,
    depth: Option<Arc<RenderTexture>>,
    depth_renderbuffer: bool,
    backend: BackendSlot<GlTargetGroup>,
}

impl RenderTargetGroup {
    /// Create an unloaded target group
    ///
    /// With `depth_renderbuffer` set and no depth texture, depth is backed by
    /// a renderbuffer that is never sampled.
    pub fn new(
        resolution: Resolution,
        colour: Option<Arc<RenderTexture>>,
        depth: Option<Arc<RenderTexture>>,
        depth_renderbuffer: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            header: ResourceHeader::new(ResourceSource::in_memory()),
            resolution,
            colour,
            depth,
            depth_renderbuffer,
            backend: BackendSlot::default(),
        })
    }

    /// Size of every attachment
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Colour attachment
    pub fn colour_texture(&self) -> Option<&Arc<RenderTexture>> {
        self.colour.as_ref()
    }

    /// Depth attachment
    pub fn depth_texture(&self) -> Option<&Arc<RenderTexture>> {
        self.depth.as_ref()
    }

    /// Whether depth falls back to a renderbuffer
    pub fn uses_depth_renderbuffer(&self) -> bool {
        self.depth_renderbuffer
    }

    /// Current names of the attachment textures
    pub fn attachments(&self) -> TargetAttachments {
        TargetAttachments {
            colour: self.colour.as_ref().and_then(|texture| texture.handle()),
            depth: self.depth.as_ref().and_then(|texture| texture.handle()),
        }
    }
}

render_resource!(RenderTargetGroup, GlTargetGroup, "target group");

/// Surface description used by `ApplyMaterial`
///
/// Materials own no GPU objects; they reference a shader and the textures it
/// samples.
#[derive(Debug)]
pub struct RenderMaterial {
    id: ResourceId,
    shader: Arc<RenderShader>,
    textures: Vec<Arc<RenderTexture>>,
    cubemap: Option<Arc<RenderCubemap>>,
    colour: Colour,
    transparent: bool,
}

impl RenderMaterial {
    /// Create an opaque white material using a shader
    pub fn new(shader: Arc<RenderShader>) -> Self {
        Self {
            id: ResourceId::next(),
            shader,
            textures: Vec::new(),
            cubemap: None,
            colour: Colour::WHITE,
            transparent: false,
        }
    }

    /// Add a texture, bound to the next sampler unit
    pub fn with_texture(mut self, texture: Arc<RenderTexture>) -> Self {
        self.textures.push(texture);
        self
    }

    /// Set the cubemap, bound after the textures
    pub fn with_cubemap(mut self, cubemap: Arc<RenderCubemap>) -> Self {
        self.cubemap = Some(cubemap);
        self
    }

    /// Set the tint colour
    pub fn with_colour(mut self, colour: Colour) -> Self {
        self.colour = colour;
        self
    }

    /// Mark the material as alpha blended
    pub fn with_transparency(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    /// Finish building
    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Material id
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Shader used to draw
    pub fn shader(&self) -> &Arc<RenderShader> {
        &self.shader
    }

    /// Textures in sampler unit order
    pub fn textures(&self) -> &[Arc<RenderTexture>] {
        &self.textures
    }

    /// Cubemap, if any
    pub fn cubemap(&self) -> Option<&Arc<RenderCubemap>> {
        self.cubemap.as_ref()
    }

    /// Tint colour
    pub fn colour(&self) -> Colour {
        self.colour
    }

    /// Whether the material is alpha blended
    pub fn is_transparent(&self) -> bool {
        self.transparent
    }
}
