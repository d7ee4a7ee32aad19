//! Static GL mesh
//!
//! Vertex and index buffers uploaded once from a `LoadMesh` command. Meshes
//! without a backing file keep a CPU copy of their data when context-loss
//! recovery is enabled, since nothing else could recreate them.

use serde::{Deserialize, Serialize};

use super::backup::{BackupData, GpuResource};
use super::context::{BufferTarget, BufferUsage, GlContext, GlHandle, GlResult, PrimitiveType};
use super::state_cache::GlStateCache;
use crate::render::error::{RenderError, RenderResult};

/// Layout of one vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexFormat {
    /// Position (3 floats) + colour (4 floats)
    PositionColour,
    /// Position (3 floats) + normal (3 floats) + texture coordinates (2 floats)
    StaticMesh,
    /// Position (3 floats) + texture coordinates (2 floats) + packed RGBA colour
    Sprite,
}

impl VertexFormat {
    /// Size of one vertex in bytes
    pub fn stride(self) -> usize {
        match self {
            Self::PositionColour => 28,
            Self::StaticMesh => 32,
            Self::Sprite => 24,
        }
    }
}

/// GPU side of a static mesh
#[derive(Debug)]
pub struct GlMesh {
    vertex_format: VertexFormat,
    primitive: PrimitiveType,
    vertex_handle: Option<GlHandle>,
    index_handle: Option<GlHandle>,
    vertex_bytes: usize,
    index_count: u32,
    vertex_backup: Option<BackupData>,
    index_backup: Option<BackupData>,
    invalidated: bool,
}

impl GlMesh {
    /// Upload mesh data into new buffers
    ///
    /// `retain_backup` keeps a copy of the data so the mesh can be restored
    /// after the context is lost.
    pub fn new(
        gl: &mut dyn GlContext,
        cache: &mut GlStateCache,
        vertex_format: VertexFormat,
        primitive: PrimitiveType,
        vertex_data: &[u8],
        index_data: &[u16],
        retain_backup: bool,
    ) -> GlResult<Self> {
        let index_bytes: &[u8] = bytemuck::cast_slice(index_data);
        let mut mesh = Self {
            vertex_format,
            primitive,
            vertex_handle: None,
            index_handle: None,
            vertex_bytes: vertex_data.len(),
            index_count: u32::try_from(index_data.len()).unwrap_or(u32::MAX),
            vertex_backup: retain_backup.then(|| BackupData::copy_from(vertex_data)),
            index_backup: (retain_backup && !index_data.is_empty()).then(|| BackupData::copy_from(index_bytes)),
            invalidated: false,
        };
        mesh.upload(gl, cache, vertex_data, index_bytes)?;
        Ok(mesh)
    }

    fn upload(&mut self, gl: &mut dyn GlContext, cache: &mut GlStateCache, vertex_data: &[u8], index_data: &[u8]) -> GlResult<()> {
        let vertex_handle = gl.gen_buffer()?;
        cache.bind_buffer(gl, BufferTarget::Array, Some(vertex_handle))?;
        gl.buffer_data(BufferTarget::Array, vertex_data.len(), Some(vertex_data), BufferUsage::Static)?;

        let index_handle = if index_data.is_empty() {
            None
        } else {
            let handle = gl.gen_buffer()?;
            cache.bind_buffer(gl, BufferTarget::ElementArray, Some(handle))?;
            gl.buffer_data(BufferTarget::ElementArray, index_data.len(), Some(index_data), BufferUsage::Static)?;
            Some(handle)
        };

        self.vertex_handle = Some(vertex_handle);
        self.index_handle = index_handle;
        self.invalidated = false;
        Ok(())
    }

    /// Bind the mesh's buffers for drawing
    pub fn bind(&self, gl: &mut dyn GlContext, cache: &mut GlStateCache) -> RenderResult<()> {
        let Some(vertex_handle) = self.vertex_handle else {
            return Err(RenderError::InvalidatedResource("mesh"));
        };
        cache.bind_buffer(gl, BufferTarget::Array, Some(vertex_handle))?;
        if let Some(index_handle) = self.index_handle {
            cache.bind_buffer(gl, BufferTarget::ElementArray, Some(index_handle))?;
        }
        Ok(())
    }

    /// Draw the whole mesh; the mesh must be bound
    pub fn draw(&self, gl: &mut dyn GlContext) -> GlResult<()> {
        if self.index_handle.is_some() {
            gl.draw_elements(self.primitive, self.index_count, 0)
        } else {
            gl.draw_arrays(self.primitive, 0, self.vertex_count())
        }
    }

    /// Recreate buffers from the retained backup
    ///
    /// Restoring a live mesh is a no-op. Restoring a mesh that kept no backup
    /// is unsupported.
    pub fn restore(&mut self, gl: &mut dyn GlContext, cache: &mut GlStateCache) -> RenderResult<()> {
        if self.is_valid() {
            return Ok(());
        }
        let Some(vertex_backup) = self.vertex_backup.take() else {
            return Err(RenderError::RestoreUnsupported("mesh without backup data"));
        };
        let index_backup = self.index_backup.take();

        // Names cached before the loss may have been reissued
        cache.reset();
        let index_bytes = index_backup.as_ref().map_or(&[][..], BackupData::as_bytes);
        let result = self.upload(gl, cache, vertex_backup.as_bytes(), index_bytes);

        // The backup survives for the next loss
        self.vertex_backup = Some(vertex_backup);
        self.index_backup = index_backup;
        result.map_err(RenderError::from)
    }

    /// Delete the GL buffers; skipped for names that died with the context
    pub fn destroy(mut self, gl: &mut dyn GlContext, cache: &mut GlStateCache) {
        for handle in [self.vertex_handle.take(), self.index_handle.take()].into_iter().flatten() {
            cache.forget(handle);
            gl.delete_buffer(handle);
        }
    }

    /// Vertex layout
    pub fn vertex_format(&self) -> VertexFormat {
        self.vertex_format
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> u32 {
        u32::try_from(self.vertex_bytes / self.vertex_format.stride()).unwrap_or(u32::MAX)
    }

    /// Number of indices
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Vertex buffer name, `None` while invalidated
    pub fn vertex_handle(&self) -> Option<GlHandle> {
        self.vertex_handle
    }

    /// Index buffer name, `None` while invalidated or for non-indexed meshes
    pub fn index_handle(&self) -> Option<GlHandle> {
        self.index_handle
    }

    /// Whether a CPU copy of the data is retained
    pub fn has_backup(&self) -> bool {
        self.vertex_backup.is_some()
    }
}

impl GpuResource for GlMesh {
    fn invalidate(&mut self) {
        self.vertex_handle = None;
        self.index_handle = None;
        self.invalidated = true;
    }

    fn is_valid(&self) -> bool {
        !self.invalidated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::gl::HeadlessGl;

    fn quad() -> (Vec<u8>, Vec<u16>) {
        let vertices: Vec<u8> = (0..4 * VertexFormat::PositionColour.stride()).map(|i| (i % 251) as u8).collect();
        (vertices, vec![0, 1, 2, 2, 3, 0])
    }

    #[test]
    fn test_mesh_upload() {
        let mut gl = HeadlessGl::new();
        let mut cache = GlStateCache::new();
        let (vertices, indices) = quad();

        let mesh = GlMesh::new(&mut gl, &mut cache, VertexFormat::PositionColour, PrimitiveType::Triangles, &vertices, &indices, false).unwrap();

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.index_count(), 6);
        assert_eq!(gl.buffer_contents(mesh.vertex_handle().unwrap()), Some(vertices));
        assert!(!mesh.has_backup());
    }

    #[test]
    fn test_restore_after_context_loss() {
        let mut gl = HeadlessGl::new();
        let mut cache = GlStateCache::new();
        let (vertices, indices) = quad();
        let mut mesh = GlMesh::new(&mut gl, &mut cache, VertexFormat::PositionColour, PrimitiveType::Triangles, &vertices, &indices, true).unwrap();
        let old_handle = mesh.vertex_handle().unwrap();

        mesh.invalidate();
        gl.lose_context();
        gl.recreate_context();
        assert!(mesh.vertex_handle().is_none());

        mesh.restore(&mut gl, &mut cache).unwrap();
        let new_handle = mesh.vertex_handle().unwrap();
        assert_ne!(new_handle, old_handle);
        assert_eq!(gl.buffer_contents(new_handle), Some(vertices));
        assert_eq!(gl.buffer_contents(mesh.index_handle().unwrap()), Some(bytemuck::cast_slice(&indices).to_vec()));
        assert!(mesh.has_backup());
    }

    #[test]
    fn test_restore_without_backup_unsupported() {
        let mut gl = HeadlessGl::new();
        let mut cache = GlStateCache::new();
        let (vertices, indices) = quad();
        let mut mesh = GlMesh::new(&mut gl, &mut cache, VertexFormat::PositionColour, PrimitiveType::Triangles, &vertices, &indices, false).unwrap();

        mesh.invalidate();
        assert!(matches!(mesh.restore(&mut gl, &mut cache), Err(RenderError::RestoreUnsupported(_))));
    }

    #[test]
    fn test_bind_invalidated_mesh_fails() {
        let mut gl = HeadlessGl::new();
        let mut cache = GlStateCache::new();
        let (vertices, indices) = quad();
        let mut mesh = GlMesh::new(&mut gl, &mut cache, VertexFormat::PositionColour, PrimitiveType::Triangles, &vertices, &indices, true).unwrap();

        mesh.invalidate();
        assert!(matches!(mesh.bind(&mut gl, &mut cache), Err(RenderError::InvalidatedResource("mesh"))));
    }

    #[test]
    fn test_destroy_invalidated_mesh_issues_no_delete() {
        let mut gl = HeadlessGl::new();
        let mut cache = GlStateCache::new();
        let (vertices, indices) = quad();
        let mut mesh = GlMesh::new(&mut gl, &mut cache, VertexFormat::PositionColour, PrimitiveType::Triangles, &vertices, &indices, false).unwrap();
        let handle = mesh.vertex_handle().unwrap();

        mesh.invalidate();
        mesh.destroy(&mut gl, &mut cache);
        assert!(gl.is_live(handle));
    }
}
