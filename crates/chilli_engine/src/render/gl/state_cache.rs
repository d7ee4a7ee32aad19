//! Render-thread bind cache
//!
//! Tracks what is currently bound so redundant binds can be skipped. The cache
//! is owned by the command executor and threaded through every bind, so
//! nothing outside the render thread can observe or corrupt it.

use std::collections::HashMap;

use super::context::{BufferTarget, GlContext, GlHandle, GlResult};

/// What the cache believes is bound to one binding point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Binding {
    /// Unknown: the next bind must reach the context
    #[default]
    Unknown,
    /// Known binding, possibly nothing
    Bound(Option<GlHandle>),
}

/// Cache of current GL bindings
#[derive(Debug, Default)]
pub struct GlStateCache {
    array_buffer: Binding,
    element_buffer: Binding,
    program: Binding,
    framebuffer: Binding,
    textures: HashMap<u32, GlHandle>,
}

impl GlStateCache {
    /// Create an empty cache where every binding is unknown
    pub fn new() -> Self {
        Self::default()
    }

    fn buffer_slot(&mut self, target: BufferTarget) -> &mut Binding {
        match target {
            BufferTarget::Array => &mut self.array_buffer,
            BufferTarget::ElementArray => &mut self.element_buffer,
        }
    }

    /// Bind a buffer unless it is already bound
    pub fn bind_buffer(&mut self, gl: &mut dyn GlContext, target: BufferTarget, handle: Option<GlHandle>) -> GlResult<()> {
        if *self.buffer_slot(target) == Binding::Bound(handle) {
            return Ok(());
        }
        gl.bind_buffer(target, handle)?;
        *self.buffer_slot(target) = Binding::Bound(handle);
        Ok(())
    }

    /// Make a program current unless it already is
    pub fn use_program(&mut self, gl: &mut dyn GlContext, handle: Option<GlHandle>) -> GlResult<()> {
        if self.program == Binding::Bound(handle) {
            return Ok(());
        }
        gl.use_program(handle)?;
        self.program = Binding::Bound(handle);
        Ok(())
    }

    /// Bind a framebuffer unless it is already bound
    pub fn bind_framebuffer(&mut self, gl: &mut dyn GlContext, handle: Option<GlHandle>) -> GlResult<()> {
        if self.framebuffer == Binding::Bound(handle) {
            return Ok(());
        }
        gl.bind_framebuffer(handle)?;
        self.framebuffer = Binding::Bound(handle);
        Ok(())
    }

    /// Bind a texture to a unit unless it is already bound there
    pub fn bind_texture(&mut self, gl: &mut dyn GlContext, unit: u32, handle: GlHandle) -> GlResult<()> {
        if self.textures.get(&unit) == Some(&handle) {
            return Ok(());
        }
        gl.bind_texture(unit, Some(handle))?;
        self.textures.insert(unit, handle);
        Ok(())
    }

    /// Forget that a handle is bound anywhere
    ///
    /// Must be called when an object is deleted or its name becomes
    /// meaningless, otherwise a later object reusing the name would be
    /// skipped.
    pub fn forget(&mut self, handle: GlHandle) {
        for slot in [&mut self.array_buffer, &mut self.element_buffer, &mut self.program, &mut self.framebuffer] {
            if *slot == Binding::Bound(Some(handle)) {
                *slot = Binding::Unknown;
            }
        }
        self.textures.retain(|_, bound| *bound != handle);
    }

    /// Mark every binding unknown
    ///
    /// Used after context loss and before restoring buffers, when cached
    /// names refer to objects that no longer exist.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
