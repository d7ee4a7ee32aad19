//! GL cubemap

use super::backup::{BackupData, GpuResource};
use super::context::{CubemapFace, GlContext, GlHandle, GlResult, TextureFormat, TextureKind};
use super::state_cache::GlStateCache;
use crate::foundation::math::Resolution;
use crate::render::error::{RenderError, RenderResult};

/// GPU side of a six-faced cubemap
#[derive(Debug)]
pub struct GlCubemap {
    handle: Option<GlHandle>,
    face_resolution: Resolution,
    format: TextureFormat,
    backup: Option<[BackupData; 6]>,
    invalidated: bool,
}

impl GlCubemap {
    /// Create a cubemap from six faces in [`CubemapFace::ALL`] order
    pub fn new(
        gl: &mut dyn GlContext,
        face_resolution: Resolution,
        format: TextureFormat,
        faces: &[Vec<u8>; 6],
        retain_backup: bool,
    ) -> GlResult<Self> {
        let mut cubemap = Self {
            handle: None,
            face_resolution,
            format,
            backup: retain_backup.then(|| faces.each_ref().map(|face| BackupData::copy_from(face))),
            invalidated: false,
        };
        cubemap.upload(gl, faces.each_ref().map(Vec::as_slice))?;
        Ok(cubemap)
    }

    fn upload(&mut self, gl: &mut dyn GlContext, faces: [&[u8]; 6]) -> GlResult<()> {
        let handle = gl.gen_texture(TextureKind::Cubemap)?;
        for (face, data) in CubemapFace::ALL.into_iter().zip(faces) {
            if let Err(error) = gl.tex_image(handle, Some(face), self.face_resolution, self.format, Some(data)) {
                gl.delete_texture(handle);
                return Err(error);
            }
        }
        self.handle = Some(handle);
        self.invalidated = false;
        Ok(())
    }

    /// Bind the cubemap to a sampler unit
    pub fn bind(&self, gl: &mut dyn GlContext, cache: &mut GlStateCache, unit: u32) -> RenderResult<()> {
        let handle = self.handle.ok_or(RenderError::InvalidatedResource("cubemap"))?;
        cache.bind_texture(gl, unit, handle)?;
        Ok(())
    }

    /// Re-upload all faces from the backup
    pub fn restore(&mut self, gl: &mut dyn GlContext) -> RenderResult<()> {
        if self.is_valid() {
            return Ok(());
        }
        let Some(backup) = self.backup.take() else {
            return Err(RenderError::RestoreUnsupported("cubemap without backup data"));
        };
        let result = self.upload(gl, backup.each_ref().map(BackupData::as_bytes));
        self.backup = Some(backup);
        result.map_err(RenderError::from)
    }

    /// Delete the cubemap; skipped once invalidated
    pub fn destroy(mut self, gl: &mut dyn GlContext, cache: &mut GlStateCache) {
        if let Some(handle) = self.handle.take() {
            cache.forget(handle);
            gl.delete_texture(handle);
        }
    }

    /// Texture name, `None` while invalidated
    pub fn handle(&self) -> Option<GlHandle> {
        self.handle
    }

    /// Size of each face
    pub fn face_resolution(&self) -> Resolution {
        self.face_resolution
    }
}

impl GpuResource for GlCubemap {
    fn invalidate(&mut self) {
        self.handle = None;
        self.invalidated = true;
    }

    fn is_valid(&self) -> bool {
        !self.invalidated
    }
}
