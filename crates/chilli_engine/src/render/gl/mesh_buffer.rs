//! Dynamic GL mesh buffer
//!
//! A fixed-capacity vertex buffer (plus optional index buffer) rewritten every
//! frame, used for mesh batches. Its contents only live on the GPU, so before
//! the context goes away the data is read back into CPU backups and restored
//! into fresh buffers afterwards.
//!
//! ## State machine
//!
//! ```text
//! Live --backup()--> Invalidated (backup held) --restore()--> Live (new names)
//! ```
//!
//! `backup()` captures both buffers before zeroing any name, so a failed
//! read leaves the buffer untouched rather than half backed up.

use super::backup::{BackupData, GpuResource};
use super::context::{BufferTarget, BufferUsage, GlContext, GlError, GlHandle, GlResult};
use super::state_cache::GlStateCache;

/// Streaming vertex/index storage of fixed capacity
#[derive(Debug)]
pub struct GlDynamicMeshBuffer {
    vertex_capacity: usize,
    index_capacity: usize,
    vertex_handle: Option<GlHandle>,
    index_handle: Option<GlHandle>,
    vertex_backup: Option<BackupData>,
    index_backup: Option<BackupData>,
}

impl GlDynamicMeshBuffer {
    /// Allocate a buffer holding `vertex_capacity` bytes of vertices and
    /// `index_capacity` 16-bit indices. A zero index capacity creates no index buffer.
    pub fn new(gl: &mut dyn GlContext, cache: &mut GlStateCache, vertex_capacity: usize, index_capacity: usize) -> GlResult<Self> {
        let mut buffer = Self {
            vertex_capacity,
            index_capacity,
            vertex_handle: None,
            index_handle: None,
            vertex_backup: None,
            index_backup: None,
        };

        let vertex_handle = create_buffer(gl, cache, BufferTarget::Array, vertex_capacity, None)?;
        if index_capacity > 0 {
            match create_buffer(gl, cache, BufferTarget::ElementArray, buffer.index_bytes(), None) {
                Ok(index_handle) => buffer.index_handle = Some(index_handle),
                Err(error) => {
                    delete_buffer(gl, cache, vertex_handle);
                    return Err(error);
                }
            }
        }
        buffer.vertex_handle = Some(vertex_handle);

        log::debug!(
            "Created dynamic mesh buffer ({} vertex bytes, {} indices)",
            vertex_capacity,
            index_capacity
        );
        Ok(buffer)
    }

    fn index_bytes(&self) -> usize {
        self.index_capacity * std::mem::size_of::<u16>()
    }

    fn live_vertex_handle(&self) -> GlResult<GlHandle> {
        self.vertex_handle
            .ok_or_else(|| GlError::InvalidOperation("dynamic mesh buffer is invalidated".to_string()))
    }

    /// Bind both buffers
    pub fn bind(&self, gl: &mut dyn GlContext, cache: &mut GlStateCache) -> GlResult<()> {
        cache.bind_buffer(gl, BufferTarget::Array, Some(self.live_vertex_handle()?))?;
        if let Some(index_handle) = self.index_handle {
            cache.bind_buffer(gl, BufferTarget::ElementArray, Some(index_handle))?;
        }
        Ok(())
    }

    /// Write vertex bytes at the start of the vertex buffer
    pub fn write_vertices(&mut self, gl: &mut dyn GlContext, cache: &mut GlStateCache, data: &[u8]) -> GlResult<()> {
        if data.len() > self.vertex_capacity {
            return Err(GlError::OutOfRange { offset: 0, len: data.len(), size: self.vertex_capacity });
        }
        cache.bind_buffer(gl, BufferTarget::Array, Some(self.live_vertex_handle()?))?;
        gl.buffer_sub_data(BufferTarget::Array, 0, data)
    }

    /// Write indices at the start of the index buffer
    pub fn write_indices(&mut self, gl: &mut dyn GlContext, cache: &mut GlStateCache, indices: &[u16]) -> GlResult<()> {
        let index_handle = self
            .index_handle
            .ok_or_else(|| GlError::InvalidOperation("dynamic mesh buffer has no live index buffer".to_string()))?;
        let bytes: &[u8] = bytemuck::cast_slice(indices);
        if bytes.len() > self.index_bytes() {
            return Err(GlError::OutOfRange { offset: 0, len: bytes.len(), size: self.index_bytes() });
        }
        cache.bind_buffer(gl, BufferTarget::ElementArray, Some(index_handle))?;
        gl.buffer_sub_data(BufferTarget::ElementArray, 0, bytes)
    }

    /// Read the whole vertex storage back
    pub fn read_vertices(&self, gl: &mut dyn GlContext, cache: &mut GlStateCache) -> GlResult<Vec<u8>> {
        cache.bind_buffer(gl, BufferTarget::Array, Some(self.live_vertex_handle()?))?;
        gl.read_buffer(BufferTarget::Array)
    }

    /// Read the whole index storage back
    pub fn read_indices(&self, gl: &mut dyn GlContext, cache: &mut GlStateCache) -> GlResult<Vec<u16>> {
        let Some(index_handle) = self.index_handle else {
            return Ok(Vec::new());
        };
        cache.bind_buffer(gl, BufferTarget::ElementArray, Some(index_handle))?;
        let bytes = gl.read_buffer(BufferTarget::ElementArray)?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    /// Copy GPU contents into CPU backups and zero the names
    ///
    /// Must run while the context is still alive. The GL objects are not
    /// deleted: the context is about to be destroyed along with them.
    pub fn backup(&mut self, gl: &mut dyn GlContext, cache: &mut GlStateCache) -> GlResult<()> {
        let Some(vertex_handle) = self.vertex_handle else {
            return Ok(());
        };

        cache.bind_buffer(gl, BufferTarget::Array, Some(vertex_handle))?;
        let mut vertices = gl.read_buffer(BufferTarget::Array)?;
        vertices.resize(self.vertex_capacity, 0);

        let indices = match self.index_handle {
            Some(index_handle) => {
                cache.bind_buffer(gl, BufferTarget::ElementArray, Some(index_handle))?;
                let mut indices = gl.read_buffer(BufferTarget::ElementArray)?;
                indices.resize(self.index_bytes(), 0);
                Some(indices)
            }
            None => None,
        };

        self.vertex_backup = Some(BackupData::from_vec(vertices));
        self.index_backup = indices.map(BackupData::from_vec);
        for handle in [self.vertex_handle.take(), self.index_handle.take()].into_iter().flatten() {
            cache.forget(handle);
        }
        log::debug!("Backed up dynamic mesh buffer");
        Ok(())
    }

    /// Recreate buffers from the backups and release them
    ///
    /// A no-op when there is no vertex backup.
    pub fn restore(&mut self, gl: &mut dyn GlContext, cache: &mut GlStateCache) -> GlResult<()> {
        let Some(vertex_backup) = self.vertex_backup.as_ref() else {
            return Ok(());
        };

        // The cached binding refers to a name from the lost context
        cache.reset();

        let vertex_handle =
            create_buffer(gl, cache, BufferTarget::Array, self.vertex_capacity, Some(vertex_backup.as_bytes()))?;
        let index_handle = match self.index_backup.as_ref() {
            Some(index_backup) => {
                let bytes = self.index_bytes();
                match create_buffer(gl, cache, BufferTarget::ElementArray, bytes, Some(index_backup.as_bytes())) {
                    Ok(handle) => Some(handle),
                    Err(error) => {
                        delete_buffer(gl, cache, vertex_handle);
                        return Err(error);
                    }
                }
            }
            None => None,
        };

        self.vertex_handle = Some(vertex_handle);
        self.index_handle = index_handle;
        self.vertex_backup = None;
        self.index_backup = None;
        log::debug!("Restored dynamic mesh buffer");
        Ok(())
    }

    /// Delete the GL buffers
    pub fn destroy(mut self, gl: &mut dyn GlContext, cache: &mut GlStateCache) {
        for handle in [self.vertex_handle.take(), self.index_handle.take()].into_iter().flatten() {
            delete_buffer(gl, cache, handle);
        }
    }

    /// Vertex capacity in bytes
    pub fn vertex_capacity(&self) -> usize {
        self.vertex_capacity
    }

    /// Index capacity in indices
    pub fn index_capacity(&self) -> usize {
        self.index_capacity
    }

    /// Vertex buffer name, `None` while backed up
    pub fn vertex_handle(&self) -> Option<GlHandle> {
        self.vertex_handle
    }

    /// Index buffer name
    pub fn index_handle(&self) -> Option<GlHandle> {
        self.index_handle
    }

    /// Whether CPU backups are currently held
    pub fn has_backup(&self) -> bool {
        self.vertex_backup.is_some()
    }
}

impl GpuResource for GlDynamicMeshBuffer {
    fn invalidate(&mut self) {
        self.vertex_handle = None;
        self.index_handle = None;
    }

    fn is_valid(&self) -> bool {
        self.vertex_handle.is_some()
    }
}

/// Generate, bind and size a buffer; the name is deleted again if sizing fails
fn create_buffer(
    gl: &mut dyn GlContext,
    cache: &mut GlStateCache,
    target: BufferTarget,
    size: usize,
    data: Option<&[u8]>,
) -> GlResult<GlHandle> {
    let handle = gl.gen_buffer()?;
    let sized = cache
        .bind_buffer(gl, target, Some(handle))
        .and_then(|()| gl.buffer_data(target, size, data, BufferUsage::Dynamic));
    if let Err(error) = sized {
        delete_buffer(gl, cache, handle);
        return Err(error);
    }
    Ok(handle)
}

fn delete_buffer(gl: &mut dyn GlContext, cache: &mut GlStateCache, handle: GlHandle) {
    cache.forget(handle);
    gl.delete_buffer(handle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::gl::HeadlessGl;

    const VERTEX_CAPACITY: usize = 1024 * 24;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    #[test]
    fn test_backup_restore_round_trip() {
        let mut gl = HeadlessGl::new();
        let mut cache = GlStateCache::new();
        let mut buffer = GlDynamicMeshBuffer::new(&mut gl, &mut cache, VERTEX_CAPACITY, 1536).unwrap();
        let vertices = pattern(VERTEX_CAPACITY);
        let indices: Vec<u16> = (0..1536).map(|i| (i % 1024) as u16).collect();
        buffer.write_vertices(&mut gl, &mut cache, &vertices).unwrap();
        buffer.write_indices(&mut gl, &mut cache, &indices).unwrap();

        buffer.backup(&mut gl, &mut cache).unwrap();
        assert!(buffer.vertex_handle().is_none());
        assert!(buffer.index_handle().is_none());
        assert!(!buffer.is_valid());

        gl.lose_context();
        gl.recreate_context();

        buffer.restore(&mut gl, &mut cache).unwrap();
        assert!(buffer.vertex_handle().is_some());
        assert!(!buffer.has_backup());
        assert_eq!(buffer.read_vertices(&mut gl, &mut cache).unwrap(), vertices);
        assert_eq!(buffer.read_indices(&mut gl, &mut cache).unwrap(), indices);
    }

    #[test]
    fn test_repeated_cycles_keep_contents() {
        let mut gl = HeadlessGl::new();
        let mut cache = GlStateCache::new();
        let mut buffer = GlDynamicMeshBuffer::new(&mut gl, &mut cache, 256, 0).unwrap();
        let vertices = pattern(256);
        buffer.write_vertices(&mut gl, &mut cache, &vertices).unwrap();

        for _ in 0..3 {
            buffer.backup(&mut gl, &mut cache).unwrap();
            gl.lose_context();
            gl.recreate_context();
            buffer.restore(&mut gl, &mut cache).unwrap();
        }

        assert!(buffer.index_handle().is_none());
        assert_eq!(buffer.read_vertices(&mut gl, &mut cache).unwrap(), vertices);
    }

    #[test]
    fn test_restore_without_backup_is_noop() {
        let mut gl = HeadlessGl::new();
        let mut cache = GlStateCache::new();
        let mut buffer = GlDynamicMeshBuffer::new(&mut gl, &mut cache, 64, 6).unwrap();
        let handle = buffer.vertex_handle();

        buffer.restore(&mut gl, &mut cache).unwrap();
        assert_eq!(buffer.vertex_handle(), handle);
    }

    #[test]
    fn test_second_backup_is_noop() {
        let mut gl = HeadlessGl::new();
        let mut cache = GlStateCache::new();
        let mut buffer = GlDynamicMeshBuffer::new(&mut gl, &mut cache, 64, 0).unwrap();
        buffer.write_vertices(&mut gl, &mut cache, &pattern(64)).unwrap();

        buffer.backup(&mut gl, &mut cache).unwrap();
        gl.lose_context();
        buffer.backup(&mut gl, &mut cache).unwrap();
        gl.recreate_context();
        buffer.restore(&mut gl, &mut cache).unwrap();

        assert_eq!(buffer.read_vertices(&mut gl, &mut cache).unwrap(), pattern(64));
    }

    #[test]
    fn test_failed_backup_keeps_handles() {
        let mut gl = HeadlessGl::new();
        let mut cache = GlStateCache::new();
        let mut buffer = GlDynamicMeshBuffer::new(&mut gl, &mut cache, 64, 6).unwrap();

        gl.lose_context();
        cache.reset();
        assert!(buffer.backup(&mut gl, &mut cache).is_err());
        assert!(buffer.vertex_handle().is_some());
        assert!(!buffer.has_backup());
    }

    #[test]
    fn test_failed_index_buffer_releases_vertex_buffer() {
        let mut gl = HeadlessGl::new();
        let mut cache = GlStateCache::new();
        gl.set_object_limit(Some(1));

        let result = GlDynamicMeshBuffer::new(&mut gl, &mut cache, 64, 6);
        assert!(matches!(result, Err(GlError::OutOfMemory)));
        assert_eq!(gl.object_count(), 0);
    }

    #[test]
    fn test_failed_restore_keeps_backup() {
        let mut gl = HeadlessGl::new();
        let mut cache = GlStateCache::new();
        let mut buffer = GlDynamicMeshBuffer::new(&mut gl, &mut cache, 64, 6).unwrap();
        buffer.write_vertices(&mut gl, &mut cache, &pattern(64)).unwrap();
        buffer.backup(&mut gl, &mut cache).unwrap();
        gl.lose_context();
        gl.recreate_context();

        gl.set_object_limit(Some(1));
        assert!(matches!(buffer.restore(&mut gl, &mut cache), Err(GlError::OutOfMemory)));
        assert_eq!(gl.object_count(), 0);
        assert!(buffer.has_backup());
        assert!(buffer.vertex_handle().is_none());

        gl.set_object_limit(None);
        buffer.restore(&mut gl, &mut cache).unwrap();
        assert_eq!(gl.object_count(), 2);
        assert_eq!(buffer.read_vertices(&mut gl, &mut cache).unwrap(), pattern(64));
    }

    #[test]
    fn test_oversized_write_rejected() {
        let mut gl = HeadlessGl::new();
        let mut cache = GlStateCache::new();
        let mut buffer = GlDynamicMeshBuffer::new(&mut gl, &mut cache, 16, 2).unwrap();

        assert!(matches!(buffer.write_vertices(&mut gl, &mut cache, &[0; 17]), Err(GlError::OutOfRange { .. })));
        assert!(matches!(buffer.write_indices(&mut gl, &mut cache, &[0; 3]), Err(GlError::OutOfRange { .. })));
    }
}
