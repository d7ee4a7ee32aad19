//! GL 2D texture

use super::backup::{BackupData, GpuResource};
use super::context::{GlContext, GlHandle, GlResult, TextureFormat, TextureKind};
use super::state_cache::GlStateCache;
use crate::foundation::math::Resolution;
use crate::render::error::{RenderError, RenderResult};

/// GPU side of a 2D texture
///
/// Textures created with no image data (render target attachments) need no
/// backup: restoring them re-creates empty storage of the same size, which
/// the next frame renders into again.
#[derive(Debug)]
pub struct GlTexture {
    handle: Option<GlHandle>,
    resolution: Resolution,
    format: TextureFormat,
    backup: Option<BackupData>,
    invalidated: bool,
}

impl GlTexture {
    /// Create a texture, optionally uploading image data
    pub fn new(
        gl: &mut dyn GlContext,
        resolution: Resolution,
        format: TextureFormat,
        data: Option<&[u8]>,
        retain_backup: bool,
    ) -> GlResult<Self> {
        let mut texture = Self {
            handle: None,
            resolution,
            format,
            backup: data.filter(|_| retain_backup).map(BackupData::copy_from),
            invalidated: false,
        };
        texture.upload(gl, data)?;
        Ok(texture)
    }

    fn upload(&mut self, gl: &mut dyn GlContext, data: Option<&[u8]>) -> GlResult<()> {
        let handle = gl.gen_texture(TextureKind::Texture2d)?;
        if let Err(error) = gl.tex_image(handle, None, self.resolution, self.format, data) {
            gl.delete_texture(handle);
            return Err(error);
        }
        self.handle = Some(handle);
        self.invalidated = false;
        Ok(())
    }

    /// Bind the texture to a sampler unit
    pub fn bind(&self, gl: &mut dyn GlContext, cache: &mut GlStateCache, unit: u32) -> RenderResult<()> {
        let handle = self.handle.ok_or(RenderError::InvalidatedResource("texture"))?;
        cache.bind_texture(gl, unit, handle)?;
        Ok(())
    }

    /// Recreate the texture after context loss
    ///
    /// Uploads the backup when one was kept, otherwise allocates empty
    /// storage. Restoring a live texture is a no-op.
    pub fn restore(&mut self, gl: &mut dyn GlContext) -> RenderResult<()> {
        if self.is_valid() {
            return Ok(());
        }
        let backup = self.backup.take();
        let result = self.upload(gl, backup.as_ref().map(BackupData::as_bytes));
        self.backup = backup;
        result.map_err(RenderError::from)
    }

    /// Delete the texture; skipped once invalidated
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

    /// Image size
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Pixel format
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Whether a CPU copy of the image is retained
    pub fn has_backup(&self) -> bool {
        self.backup.is_some()
    }
}

impl GpuResource for GlTexture {
    fn invalidate(&mut self) {
        self.handle = None;
        self.invalidated = true;
    }

    fn is_valid(&self) -> bool {
        !self.invalidated
    }
}
