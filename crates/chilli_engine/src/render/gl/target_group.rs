//! GL render target group (framebuffer object)
//!
//! A framebuffer with a colour and/or depth texture attached, falling back to
//! a depth renderbuffer when depth is wanted but no depth texture was given.
//! The framebuffer holds no data of its own; restoring it only needs the new
//! names of its (already restored) attachment textures.

use super::backup::GpuResource;
use super::context::{Attachment, GlContext, GlHandle, GlResult};
use super::state_cache::GlStateCache;
use crate::foundation::math::Resolution;
use crate::render::error::{RenderError, RenderResult};

/// Texture names a target group attaches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetAttachments {
    /// Colour texture
    pub colour: Option<GlHandle>,
    /// Depth texture
    pub depth: Option<GlHandle>,
}

/// GPU side of a render target group
#[derive(Debug)]
pub struct GlTargetGroup {
    framebuffer: Option<GlHandle>,
    depth_renderbuffer: Option<GlHandle>,
    resolution: Resolution,
    wants_depth_renderbuffer: bool,
    invalidated: bool,
}

impl GlTargetGroup {
    /// Create a framebuffer and attach the given textures
    ///
    /// `depth_renderbuffer` creates a depth renderbuffer when no depth
    /// texture is supplied.
    pub fn new(
        gl: &mut dyn GlContext,
        cache: &mut GlStateCache,
        resolution: Resolution,
        attachments: TargetAttachments,
        depth_renderbuffer: bool,
    ) -> GlResult<Self> {
        let mut group = Self {
            framebuffer: None,
            depth_renderbuffer: None,
            resolution,
            wants_depth_renderbuffer: depth_renderbuffer && attachments.depth.is_none(),
            invalidated: false,
        };
        group.build(gl, cache, attachments)?;
        Ok(group)
    }

    fn build(&mut self, gl: &mut dyn GlContext, cache: &mut GlStateCache, attachments: TargetAttachments) -> GlResult<()> {
        let framebuffer = gl.gen_framebuffer()?;
        let result = Self::attach(gl, cache, framebuffer, self.resolution, attachments, self.wants_depth_renderbuffer);
        // Leave the default framebuffer bound whatever happened
        let unbind = cache.bind_framebuffer(gl, None);
        match result {
            Ok(renderbuffer) => {
                unbind?;
                self.framebuffer = Some(framebuffer);
                self.depth_renderbuffer = renderbuffer;
                self.invalidated = false;
                log::debug!("Built target group {:?} ({}x{})", framebuffer, self.resolution.width, self.resolution.height);
                Ok(())
            }
            Err(error) => {
                cache.forget(framebuffer);
                gl.delete_framebuffer(framebuffer);
                Err(error)
            }
        }
    }

    fn attach(
        gl: &mut dyn GlContext,
        cache: &mut GlStateCache,
        framebuffer: GlHandle,
        resolution: Resolution,
        attachments: TargetAttachments,
        wants_depth_renderbuffer: bool,
    ) -> GlResult<Option<GlHandle>> {
        cache.bind_framebuffer(gl, Some(framebuffer))?;
        if let Some(colour) = attachments.colour {
            gl.framebuffer_texture(Attachment::Colour, colour)?;
        }
        if let Some(depth) = attachments.depth {
            gl.framebuffer_texture(Attachment::Depth, depth)?;
        }
        let renderbuffer = if wants_depth_renderbuffer {
            let renderbuffer = gl.create_depth_renderbuffer(resolution)?;
            if let Err(error) = gl.framebuffer_renderbuffer(Attachment::Depth, renderbuffer) {
                gl.delete_renderbuffer(renderbuffer);
                return Err(error);
            }
            Some(renderbuffer)
        } else {
            None
        };
        if let Err(error) = gl.check_framebuffer_status() {
            if let Some(renderbuffer) = renderbuffer {
                gl.delete_renderbuffer(renderbuffer);
            }
            return Err(error);
        }
        Ok(renderbuffer)
    }

    /// Bind the framebuffer and set the viewport to its size
    pub fn bind(&self, gl: &mut dyn GlContext, cache: &mut GlStateCache) -> RenderResult<()> {
        let framebuffer = self.framebuffer.ok_or(RenderError::InvalidatedResource("target group"))?;
        cache.bind_framebuffer(gl, Some(framebuffer))?;
        gl.viewport(self.resolution);
        Ok(())
    }

    /// Rebuild the framebuffer around restored attachment textures
    pub fn restore(&mut self, gl: &mut dyn GlContext, cache: &mut GlStateCache, attachments: TargetAttachments) -> RenderResult<()> {
        if self.is_valid() {
            return Ok(());
        }
        self.build(gl, cache, attachments).map_err(RenderError::from)
    }

    /// Delete the framebuffer and renderbuffer; skipped once invalidated
    pub fn destroy(mut self, gl: &mut dyn GlContext, cache: &mut GlStateCache) {
        if let Some(framebuffer) = self.framebuffer.take() {
            cache.forget(framebuffer);
            gl.delete_framebuffer(framebuffer);
        }
        if let Some(renderbuffer) = self.depth_renderbuffer.take() {
            gl.delete_renderbuffer(renderbuffer);
        }
    }

    /// Framebuffer name, `None` while invalidated
    pub fn framebuffer(&self) -> Option<GlHandle> {
        self.framebuffer
    }

    /// Depth renderbuffer name, if one was created
    pub fn depth_renderbuffer(&self) -> Option<GlHandle> {
        self.depth_renderbuffer
    }

    /// Size of the attachments
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
}

impl GpuResource for GlTargetGroup {
    fn invalidate(&mut self) {
        self.framebuffer = None;
        self.depth_renderbuffer = None;
        self.invalidated = true;
    }

    fn is_valid(&self) -> bool {
        !self.invalidated
    }
}
