//! In-memory GL implementation
//!
//! `HeadlessGl` keeps every object the render backend creates in a map keyed by
//! its name, enforces the same binding rules a driver would, and can simulate
//! the context being destroyed and recreated the way a mobile OS does when an
//! app is backgrounded. Clones share the same context, so a test (or the
//! platform layer) can hold one clone while the render thread owns another.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::context::{
    Attachment, BufferTarget, BufferUsage, ClearFlags, CubemapFace, GlContext, GlError, GlHandle,
    GlResult, PrimitiveType, TextureFormat, TextureKind, UniformValue,
};
use crate::foundation::math::{Colour, Resolution};

/// Counters for calls that matter to tests and debug overlays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    /// Number of `draw_elements`/`draw_arrays` calls
    pub draw_calls: u64,
    /// Number of `bind_buffer` calls that reached the context
    pub buffer_binds: u64,
    /// Number of `use_program` calls that reached the context
    pub program_binds: u64,
    /// Number of `clear` calls
    pub clears: u64,
    /// Number of times the context has been lost
    pub context_losses: u64,
}

#[derive(Debug, Clone)]
struct TextureImage {
    resolution: Resolution,
    data: Vec<u8>,
}

#[derive(Debug)]
enum GlObject {
    Buffer {
        data: Vec<u8>,
    },
    Texture {
        kind: TextureKind,
        images: HashMap<Option<CubemapFace>, TextureImage>,
    },
    Program {
        uniforms: Vec<String>,
        values: HashMap<i32, UniformValue>,
    },
    Framebuffer {
        colour: Option<u32>,
        depth: Option<u32>,
    },
    Renderbuffer {
        resolution: Resolution,
    },
}

#[derive(Debug, Default)]
struct HeadlessState {
    next_name: u32,
    lost: bool,
    object_limit: Option<usize>,
    objects: HashMap<u32, GlObject>,
    bound_buffers: HashMap<BufferTarget, u32>,
    bound_textures: HashMap<u32, u32>,
    current_program: Option<u32>,
    bound_framebuffer: Option<u32>,
    viewport: Option<Resolution>,
    stats: HeadlessStats,
}

impl HeadlessState {
    fn check_live(&self) -> GlResult<()> {
        if self.lost {
            Err(GlError::ContextLost)
        } else {
            Ok(())
        }
    }

    fn allocate(&mut self, object: GlObject) -> GlResult<GlHandle> {
        self.check_live()?;
        if self.object_limit.is_some_and(|limit| self.objects.len() >= limit) {
            return Err(GlError::OutOfMemory);
        }
        self.next_name += 1;
        let name = self.next_name;
        self.objects.insert(name, object);
        GlHandle::new(name).ok_or(GlError::InvalidOperation("name space exhausted".to_string()))
    }

    fn delete(&mut self, handle: GlHandle) {
        if self.lost {
            return;
        }
        let name = handle.raw();
        if self.objects.remove(&name).is_some() {
            self.bound_buffers.retain(|_, bound| *bound != name);
            self.bound_textures.retain(|_, bound| *bound != name);
            if self.current_program == Some(name) {
                self.current_program = None;
            }
            if self.bound_framebuffer == Some(name) {
                self.bound_framebuffer = None;
            }
        }
    }

    fn bound_buffer_mut(&mut self, target: BufferTarget) -> GlResult<&mut Vec<u8>> {
        self.check_live()?;
        let name = *self.bound_buffers.get(&target).ok_or(GlError::NothingBound(target))?;
        match self.objects.get_mut(&name) {
            Some(GlObject::Buffer { data }) => Ok(data),
            _ => Err(GlError::InvalidHandle(name)),
        }
    }

    fn bound_framebuffer_mut(&mut self) -> GlResult<(&mut Option<u32>, &mut Option<u32>)> {
        self.check_live()?;
        let name = self
            .bound_framebuffer
            .ok_or_else(|| GlError::InvalidOperation("default framebuffer cannot take attachments".to_string()))?;
        match self.objects.get_mut(&name) {
            Some(GlObject::Framebuffer { colour, depth }) => Ok((colour, depth)),
            _ => Err(GlError::InvalidHandle(name)),
        }
    }

    fn is_kind(&self, name: u32, predicate: impl Fn(&GlObject) -> bool) -> bool {
        self.objects.get(&name).is_some_and(predicate)
    }
}

/// Software GL context
#[derive(Debug, Clone, Default)]
pub struct HeadlessGl {
    inner: Arc<Mutex<HeadlessState>>,
}

impl HeadlessGl {
    /// Create a live, empty context
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HeadlessState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Destroy the context: every object and binding is gone and all calls
    /// fail with [`GlError::ContextLost`] until [`recreate_context`](Self::recreate_context)
    pub fn lose_context(&self) {
        let mut state = self.state();
        log::info!("Headless GL context lost ({} objects destroyed)", state.objects.len());
        state.lost = true;
        state.objects.clear();
        state.bound_buffers.clear();
        state.bound_textures.clear();
        state.current_program = None;
        state.bound_framebuffer = None;
        state.stats.context_losses += 1;
    }

    /// Create a fresh context. Names keep increasing so stale handles never
    /// alias new objects.
    pub fn recreate_context(&self) {
        let mut state = self.state();
        state.lost = false;
        log::info!("Headless GL context recreated");
    }

    /// Fail object creation with [`GlError::OutOfMemory`] once `limit`
    /// objects are live; `None` removes the limit
    pub fn set_object_limit(&self, limit: Option<usize>) {
        self.state().object_limit = limit;
    }

    /// Whether the context is currently lost
    pub fn is_lost(&self) -> bool {
        self.state().lost
    }

    /// Whether a name refers to a live object
    pub fn is_live(&self, handle: GlHandle) -> bool {
        self.state().objects.contains_key(&handle.raw())
    }

    /// Number of live objects of any type
    pub fn object_count(&self) -> usize {
        self.state().objects.len()
    }

    /// Copy of a buffer's storage
    pub fn buffer_contents(&self, handle: GlHandle) -> Option<Vec<u8>> {
        match self.state().objects.get(&handle.raw()) {
            Some(GlObject::Buffer { data }) => Some(data.clone()),
            _ => None,
        }
    }

    /// Copy of a texture image (or cubemap face) and its resolution
    pub fn texture_contents(&self, handle: GlHandle, face: Option<CubemapFace>) -> Option<(Resolution, Vec<u8>)> {
        match self.state().objects.get(&handle.raw()) {
            Some(GlObject::Texture { images, .. }) => {
                images.get(&face).map(|image| (image.resolution, image.data.clone()))
            }
            _ => None,
        }
    }

    /// Attachments of a framebuffer as raw names (colour, depth)
    pub fn framebuffer_attachments(&self, handle: GlHandle) -> Option<(Option<u32>, Option<u32>)> {
        match self.state().objects.get(&handle.raw()) {
            Some(GlObject::Framebuffer { colour, depth }) => Some((*colour, *depth)),
            _ => None,
        }
    }

    /// Last value set on a program uniform
    pub fn uniform_value(&self, program: GlHandle, name: &str) -> Option<UniformValue> {
        match self.state().objects.get(&program.raw()) {
            Some(GlObject::Program { uniforms, values }) => {
                let location = uniforms.iter().position(|uniform| uniform == name)?;
                values.get(&i32::try_from(location).ok()?).cloned()
            }
            _ => None,
        }
    }

    /// Currently bound framebuffer name, `None` for the default framebuffer
    pub fn bound_framebuffer(&self) -> Option<u32> {
        self.state().bound_framebuffer
    }

    /// Last viewport set
    pub fn viewport_size(&self) -> Option<Resolution> {
        self.state().viewport
    }

    /// Call counters
    pub fn stats(&self) -> HeadlessStats {
        self.state().stats
    }
}

/// Collect `uniform <type> <name>;` declarations from shader sources
fn parse_uniforms(sources: &[&str]) -> Vec<String> {
    let mut uniforms = Vec::new();
    for source in sources {
        for line in source.lines() {
            let mut words = line.split_whitespace();
            if words.next() != Some("uniform") {
                continue;
            }
            if let Some(name) = words.nth(1) {
                let name = name.trim_end_matches(';').to_string();
                if !uniforms.contains(&name) {
                    uniforms.push(name);
                }
            }
        }
    }
    uniforms
}

impl GlContext for HeadlessGl {
    fn gen_buffer(&mut self) -> GlResult<GlHandle> {
        self.state().allocate(GlObject::Buffer { data: Vec::new() })
    }

    fn delete_buffer(&mut self, handle: GlHandle) {
        self.state().delete(handle);
    }

    fn bind_buffer(&mut self, target: BufferTarget, handle: Option<GlHandle>) -> GlResult<()> {
        let mut state = self.state();
        state.check_live()?;
        state.stats.buffer_binds += 1;
        match handle {
            Some(handle) => {
                if !state.is_kind(handle.raw(), |object| matches!(object, GlObject::Buffer { .. })) {
                    return Err(GlError::InvalidHandle(handle.raw()));
                }
                state.bound_buffers.insert(target, handle.raw());
            }
            None => {
                state.bound_buffers.remove(&target);
            }
        }
        Ok(())
    }

    fn buffer_data(&mut self, target: BufferTarget, size: usize, data: Option<&[u8]>, _usage: BufferUsage) -> GlResult<()> {
        let mut state = self.state();
        let storage = state.bound_buffer_mut(target)?;
        storage.clear();
        storage.resize(size, 0);
        if let Some(data) = data {
            let len = data.len().min(size);
            storage[..len].copy_from_slice(&data[..len]);
        }
        Ok(())
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) -> GlResult<()> {
        let mut state = self.state();
        let storage = state.bound_buffer_mut(target)?;
        let end = offset.checked_add(data.len()).filter(|end| *end <= storage.len()).ok_or(GlError::OutOfRange {
            offset,
            len: data.len(),
            size: storage.len(),
        })?;
        storage[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&mut self, target: BufferTarget) -> GlResult<Vec<u8>> {
        let mut state = self.state();
        state.bound_buffer_mut(target).map(|storage| storage.clone())
    }

    fn gen_texture(&mut self, kind: TextureKind) -> GlResult<GlHandle> {
        self.state().allocate(GlObject::Texture {
            kind,
            images: HashMap::new(),
        })
    }

    fn delete_texture(&mut self, handle: GlHandle) {
        self.state().delete(handle);
    }

    fn tex_image(
        &mut self,
        handle: GlHandle,
        face: Option<CubemapFace>,
        resolution: Resolution,
        format: TextureFormat,
        data: Option<&[u8]>,
    ) -> GlResult<()> {
        let mut state = self.state();
        state.check_live()?;
        let Some(GlObject::Texture { kind, images }) = state.objects.get_mut(&handle.raw()) else {
            return Err(GlError::InvalidHandle(handle.raw()));
        };
        if (*kind == TextureKind::Cubemap) != face.is_some() {
            return Err(GlError::InvalidOperation(format!("{kind:?} image target mismatch")));
        }
        let size = format.image_size(resolution);
        let data = match data {
            Some(data) if data.len() != size => {
                return Err(GlError::OutOfRange { offset: 0, len: data.len(), size });
            }
            Some(data) => data.to_vec(),
            None => vec![0; size],
        };
        images.insert(face, TextureImage { resolution, data });
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, handle: Option<GlHandle>) -> GlResult<()> {
        let mut state = self.state();
        state.check_live()?;
        match handle {
            Some(handle) => {
                if !state.is_kind(handle.raw(), |object| matches!(object, GlObject::Texture { .. })) {
                    return Err(GlError::InvalidHandle(handle.raw()));
                }
                state.bound_textures.insert(unit, handle.raw());
            }
            None => {
                state.bound_textures.remove(&unit);
            }
        }
        Ok(())
    }

    fn create_program(&mut self, vertex_source: &str, fragment_source: &str) -> GlResult<GlHandle> {
        for (stage, source) in [("vertex", vertex_source), ("fragment", fragment_source)] {
            if !source.contains("main") {
                return Err(GlError::ShaderCompile(format!("{stage} shader has no entry point")));
            }
        }
        let uniforms = parse_uniforms(&[vertex_source, fragment_source]);
        self.state().allocate(GlObject::Program {
            uniforms,
            values: HashMap::new(),
        })
    }

    fn delete_program(&mut self, handle: GlHandle) {
        self.state().delete(handle);
    }

    fn use_program(&mut self, handle: Option<GlHandle>) -> GlResult<()> {
        let mut state = self.state();
        state.check_live()?;
        state.stats.program_binds += 1;
        if let Some(handle) = handle {
            if !state.is_kind(handle.raw(), |object| matches!(object, GlObject::Program { .. })) {
                return Err(GlError::InvalidHandle(handle.raw()));
            }
        }
        state.current_program = handle.map(GlHandle::raw);
        Ok(())
    }

    fn uniform_location(&mut self, program: GlHandle, name: &str) -> GlResult<Option<i32>> {
        let state = self.state();
        state.check_live()?;
        match state.objects.get(&program.raw()) {
            Some(GlObject::Program { uniforms, .. }) => Ok(uniforms
                .iter()
                .position(|uniform| uniform == name)
                .and_then(|index| i32::try_from(index).ok())),
            _ => Err(GlError::InvalidHandle(program.raw())),
        }
    }

    fn set_uniform(&mut self, location: i32, value: UniformValue) -> GlResult<()> {
        let mut state = self.state();
        state.check_live()?;
        let program = state
            .current_program
            .ok_or_else(|| GlError::InvalidOperation("no program in use".to_string()))?;
        match state.objects.get_mut(&program) {
            Some(GlObject::Program { values, .. }) => {
                values.insert(location, value);
                Ok(())
            }
            _ => Err(GlError::InvalidHandle(program)),
        }
    }

    fn gen_framebuffer(&mut self) -> GlResult<GlHandle> {
        self.state().allocate(GlObject::Framebuffer { colour: None, depth: None })
    }

    fn delete_framebuffer(&mut self, handle: GlHandle) {
        self.state().delete(handle);
    }

    fn bind_framebuffer(&mut self, handle: Option<GlHandle>) -> GlResult<()> {
        let mut state = self.state();
        state.check_live()?;
        if let Some(handle) = handle {
            if !state.is_kind(handle.raw(), |object| matches!(object, GlObject::Framebuffer { .. })) {
                return Err(GlError::InvalidHandle(handle.raw()));
            }
        }
        state.bound_framebuffer = handle.map(GlHandle::raw);
        Ok(())
    }

    fn framebuffer_texture(&mut self, attachment: Attachment, texture: GlHandle) -> GlResult<()> {
        let mut state = self.state();
        state.check_live()?;
        if !state.is_kind(texture.raw(), |object| matches!(object, GlObject::Texture { kind: TextureKind::Texture2d, .. })) {
            return Err(GlError::InvalidHandle(texture.raw()));
        }
        let (colour, depth) = state.bound_framebuffer_mut()?;
        match attachment {
            Attachment::Colour => *colour = Some(texture.raw()),
            Attachment::Depth => *depth = Some(texture.raw()),
        }
        Ok(())
    }

    fn create_depth_renderbuffer(&mut self, resolution: Resolution) -> GlResult<GlHandle> {
        self.state().allocate(GlObject::Renderbuffer { resolution })
    }

    fn delete_renderbuffer(&mut self, handle: GlHandle) {
        self.state().delete(handle);
    }

    fn framebuffer_renderbuffer(&mut self, attachment: Attachment, renderbuffer: GlHandle) -> GlResult<()> {
        let mut state = self.state();
        state.check_live()?;
        if !state.is_kind(renderbuffer.raw(), |object| matches!(object, GlObject::Renderbuffer { .. })) {
            return Err(GlError::InvalidHandle(renderbuffer.raw()));
        }
        let (colour, depth) = state.bound_framebuffer_mut()?;
        match attachment {
            Attachment::Colour => *colour = Some(renderbuffer.raw()),
            Attachment::Depth => *depth = Some(renderbuffer.raw()),
        }
        Ok(())
    }

    fn check_framebuffer_status(&mut self) -> GlResult<()> {
        let mut state = self.state();
        let (colour, depth) = state.bound_framebuffer_mut()?;
        let (colour, depth) = (*colour, *depth);
        if colour.is_none() && depth.is_none() {
            return Err(GlError::FramebufferIncomplete("no attachments".to_string()));
        }

        let size_of = |name: u32| match state.objects.get(&name) {
            Some(GlObject::Texture { images, .. }) => images.get(&None).map(|image| image.resolution),
            Some(GlObject::Renderbuffer { resolution }) => Some(*resolution),
            _ => None,
        };
        let sizes: Vec<Option<Resolution>> = colour.into_iter().chain(depth).map(size_of).collect();
        if sizes.iter().any(Option::is_none) {
            return Err(GlError::FramebufferIncomplete("attachment missing storage".to_string()));
        }
        if sizes.windows(2).any(|pair| pair[0] != pair[1]) {
            return Err(GlError::FramebufferIncomplete("attachment sizes differ".to_string()));
        }
        Ok(())
    }

    fn viewport(&mut self, resolution: Resolution) {
        self.state().viewport = Some(resolution);
    }

    fn clear(&mut self, _flags: ClearFlags, _colour: Colour) -> GlResult<()> {
        let mut state = self.state();
        state.check_live()?;
        state.stats.clears += 1;
        Ok(())
    }

    fn draw_elements(&mut self, _primitive: PrimitiveType, index_count: u32, first_index: u32) -> GlResult<()> {
        let mut state = self.state();
        state.check_live()?;
        if state.current_program.is_none() {
            return Err(GlError::InvalidOperation("draw without a program".to_string()));
        }
        let vertex_bytes = state.bound_buffer_mut(BufferTarget::Array)?.len();
        if vertex_bytes == 0 {
            return Err(GlError::InvalidOperation("draw from an empty vertex buffer".to_string()));
        }
        let index_bytes = state.bound_buffer_mut(BufferTarget::ElementArray)?.len();
        let needed = (first_index as usize + index_count as usize) * std::mem::size_of::<u16>();
        if needed > index_bytes {
            return Err(GlError::OutOfRange { offset: 0, len: needed, size: index_bytes });
        }
        state.stats.draw_calls += 1;
        Ok(())
    }

    fn draw_arrays(&mut self, _primitive: PrimitiveType, _first_vertex: u32, _vertex_count: u32) -> GlResult<()> {
        let mut state = self.state();
        state.check_live()?;
        if state.current_program.is_none() {
            return Err(GlError::InvalidOperation("draw without a program".to_string()));
        }
        state.bound_buffer_mut(BufferTarget::Array)?;
        state.stats.draw_calls += 1;
        Ok(())
    }
}
