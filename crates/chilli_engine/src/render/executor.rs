//! # Render Command Executor
//!
//! Runs sealed command buffers on the render thread, strictly in list order.
//! The executor owns the render thread's [`GlStateCache`] and the dynamic
//! mesh buffer used for batches, so nothing else ever touches GL binding
//! state.
//!
//! ## Failure semantics
//!
//! - Load commands that fail mark the resource [`LoadState::Failed`] and the
//!   frame carries on
//! - Restore failures and misuse of invalidated resources are returned as
//!   errors, which stop the render thread

use std::sync::Arc;

use super::commands::{RenderCommand, RenderCommandBuffer};
use super::error::{RenderError, RenderResult};
use super::gl::{
    ClearFlags, GlContext, GlCubemap, GlDynamicMeshBuffer, GlError, GlMesh, GlResult, GlShader, GlStateCache,
    GlTargetGroup, GlTexture, PrimitiveType, UniformValue,
};
use super::resources::{BackendSlot, RenderMaterial, RenderMesh, ResourceHeader};
use super::snapshot::DirectionalLight;
use crate::core::config::RendererSettings;
use crate::foundation::math::{Colour, Mat4, Resolution};
use crate::resource::{LoadState, StorageLocation};

/// Executor tuning derived from [`RendererSettings`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Keep CPU backups of in-memory resources so they survive context loss
    pub context_loss_recovery: bool,
    /// Dynamic vertex buffer capacity in bytes
    pub dynamic_vertex_capacity: usize,
    /// Dynamic index buffer capacity in indices
    pub dynamic_index_capacity: usize,
}

impl From<&RendererSettings> for ExecutorSettings {
    fn from(settings: &RendererSettings) -> Self {
        Self {
            context_loss_recovery: settings.context_loss_recovery_enabled(),
            dynamic_vertex_capacity: settings.dynamic_vertex_capacity,
            dynamic_index_capacity: settings.dynamic_index_capacity,
        }
    }
}

/// Running totals kept by the executor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Buffers executed
    pub frames: u64,
    /// Commands executed
    pub commands: u64,
    /// Instances drawn
    pub draw_calls: u64,
    /// Resources created by load commands
    pub resources_loaded: u64,
    /// Load commands that failed
    pub load_failures: u64,
    /// Resources recreated by restore commands
    pub resources_restored: u64,
}

/// Geometry drawn by the next `RenderInstance`
#[derive(Debug)]
enum Geometry {
    None,
    Mesh(Arc<RenderMesh>),
    Batch { index_count: u32, vertex_count: u32 },
}

/// Backend wrappers that can be deleted through the executor's cache
trait DestroyBackend {
    fn destroy_backend(self, gl: &mut dyn GlContext, cache: &mut GlStateCache);
}

macro_rules! destroy_backend {
    ($($backend:ty),*) => {
        $(impl DestroyBackend for $backend {
            fn destroy_backend(self, gl: &mut dyn GlContext, cache: &mut GlStateCache) {
                self.destroy(gl, cache);
            }
        })*
    };
}

destroy_backend!(GlShader, GlTexture, GlCubemap, GlMesh, GlTargetGroup);

fn not_loaded(kind: &'static str, header: &ResourceHeader) -> RenderError {
    RenderError::NotLoaded { kind, id: header.id().raw() }
}

/// Executes command buffers against a GL context
pub struct RenderCommandExecutor {
    settings: ExecutorSettings,
    cache: GlStateCache,
    dynamic_buffer: Option<GlDynamicMeshBuffer>,
    view_projection: Mat4,
    ambient_light: Colour,
    directional_lights: Vec<DirectionalLight>,
    material: Option<Arc<RenderMaterial>>,
    geometry: Geometry,
    stats: ExecutionStats,
}

impl RenderCommandExecutor {
    /// Create an executor
    pub fn new(settings: ExecutorSettings) -> Self {
        Self {
            settings,
            cache: GlStateCache::new(),
            dynamic_buffer: None,
            view_projection: Mat4::identity(),
            ambient_light: Colour::BLACK,
            directional_lights: Vec::new(),
            material: None,
            geometry: Geometry::None,
            stats: ExecutionStats::default(),
        }
    }

    /// Totals so far
    pub fn stats(&self) -> ExecutionStats {
        self.stats
    }

    /// Execute every list of a sealed buffer in order
    ///
    /// # Panics
    ///
    /// Panics if the buffer is not sealed.
    pub fn execute(&mut self, gl: &mut dyn GlContext, buffer: &RenderCommandBuffer) -> RenderResult<()> {
        assert!(buffer.is_sealed(), "executed an unsealed command buffer");
        for list in buffer.lists() {
            for command in list.commands() {
                self.execute_command(gl, command)?;
                self.stats.commands += 1;
            }
        }
        self.stats.frames += 1;
        Ok(())
    }

    /// Back up render-thread-owned GPU data before the context is lost
    pub fn on_suspend(&mut self, gl: &mut dyn GlContext) -> RenderResult<()> {
        if let Some(buffer) = self.dynamic_buffer.as_mut() {
            buffer.backup(gl, &mut self.cache)?;
        }
        self.cache.reset();
        self.reset_pass_state();
        log::debug!("Render executor suspended");
        Ok(())
    }

    /// Restore render-thread-owned GPU data in the new context
    pub fn on_resume(&mut self, gl: &mut dyn GlContext) -> RenderResult<()> {
        self.cache.reset();
        if let Some(buffer) = self.dynamic_buffer.as_mut() {
            buffer.restore(gl, &mut self.cache)?;
        }
        log::debug!("Render executor resumed");
        Ok(())
    }

    /// Release the executor's own GL objects
    pub fn shutdown(&mut self, gl: &mut dyn GlContext) {
        if let Some(buffer) = self.dynamic_buffer.take() {
            buffer.destroy(gl, &mut self.cache);
        }
    }

    fn reset_pass_state(&mut self) {
        self.view_projection = Mat4::identity();
        self.ambient_light = Colour::BLACK;
        self.directional_lights.clear();
        self.material = None;
        self.geometry = Geometry::None;
    }

    fn retain_backup(&self, header: &ResourceHeader) -> bool {
        self.settings.context_loss_recovery && header.storage_location() == StorageLocation::None
    }

    fn finish_load<T: DestroyBackend>(
        &mut self,
        gl: &mut dyn GlContext,
        kind: &'static str,
        header: &ResourceHeader,
        slot: &BackendSlot<T>,
        created: GlResult<T>,
    ) {
        match created {
            Ok(backend) => {
                let previous = slot.lock().replace(backend);
                if let Some(previous) = previous {
                    previous.destroy_backend(gl, &mut self.cache);
                }
                header.set_load_state(LoadState::Loaded);
                self.stats.resources_loaded += 1;
                log::debug!("Loaded {} {}", kind, header.id());
            }
            Err(error) => {
                header.set_load_state(LoadState::Failed);
                self.stats.load_failures += 1;
                log::error!("Failed to load {} {} ({}): {}", kind, header.id(), header.source(), error);
            }
        }
    }

    fn unload<T: DestroyBackend>(&mut self, gl: &mut dyn GlContext, kind: &'static str, header: &ResourceHeader, slot: &BackendSlot<T>) {
        let backend = slot.lock().take();
        if let Some(backend) = backend {
            backend.destroy_backend(gl, &mut self.cache);
            log::debug!("Unloaded {} {}", kind, header.id());
        }
    }

    fn execute_command(&mut self, gl: &mut dyn GlContext, command: &RenderCommand) -> RenderResult<()> {
        match command {
            RenderCommand::LoadShader { shader, vertex_source, fragment_source } => {
                let created = GlShader::new(gl, vertex_source, fragment_source);
                self.finish_load(gl, "shader", shader.header(), shader.backend(), created);
            }
            RenderCommand::UnloadShader(shader) => self.unload(gl, "shader", shader.header(), shader.backend()),

            RenderCommand::LoadTexture { texture, data } => {
                let retain = self.retain_backup(texture.header());
                let created = GlTexture::new(gl, data.resolution, data.format, data.pixels.as_deref(), retain);
                self.finish_load(gl, "texture", texture.header(), texture.backend(), created);
            }
            RenderCommand::UnloadTexture(texture) => self.unload(gl, "texture", texture.header(), texture.backend()),

            RenderCommand::LoadCubemap { cubemap, data } => {
                let retain = self.retain_backup(cubemap.header());
                let created = GlCubemap::new(gl, data.face_resolution, data.format, &data.faces, retain);
                self.finish_load(gl, "cubemap", cubemap.header(), cubemap.backend(), created);
            }
            RenderCommand::UnloadCubemap(cubemap) => self.unload(gl, "cubemap", cubemap.header(), cubemap.backend()),

            RenderCommand::LoadMesh { mesh, data } => {
                let retain = self.retain_backup(mesh.header());
                let created = GlMesh::new(
                    gl,
                    &mut self.cache,
                    data.vertex_format,
                    PrimitiveType::Triangles,
                    &data.vertices,
                    &data.indices,
                    retain,
                );
                self.finish_load(gl, "mesh", mesh.header(), mesh.backend(), created);
            }
            RenderCommand::UnloadMesh(mesh) => self.unload(gl, "mesh", mesh.header(), mesh.backend()),

            RenderCommand::LoadTargetGroup(group) => {
                let attachments = group.attachments();
                let created = GlTargetGroup::new(
                    gl,
                    &mut self.cache,
                    group.resolution(),
                    attachments,
                    group.uses_depth_renderbuffer(),
                );
                self.finish_load(gl, "target group", group.header(), group.backend(), created);
            }
            RenderCommand::UnloadTargetGroup(group) => self.unload(gl, "target group", group.header(), group.backend()),

            RenderCommand::RestoreMesh(mesh) => {
                let mut slot = mesh.backend().lock();
                if let Some(backend) = slot.as_mut() {
                    backend.restore(gl, &mut self.cache)?;
                    self.stats.resources_restored += 1;
                } else {
                    log::warn!("Skipping restore of unloaded mesh {}", mesh.id());
                }
            }
            RenderCommand::RestoreTexture(texture) => {
                let mut slot = texture.backend().lock();
                if let Some(backend) = slot.as_mut() {
                    backend.restore(gl)?;
                    self.stats.resources_restored += 1;
                } else {
                    log::warn!("Skipping restore of unloaded texture {}", texture.id());
                }
            }
            RenderCommand::RestoreCubemap(cubemap) => {
                let mut slot = cubemap.backend().lock();
                if let Some(backend) = slot.as_mut() {
                    backend.restore(gl)?;
                    self.stats.resources_restored += 1;
                } else {
                    log::warn!("Skipping restore of unloaded cubemap {}", cubemap.id());
                }
            }
            RenderCommand::RestoreRenderTargetGroup(group) => {
                let attachments = group.attachments();
                let mut slot = group.backend().lock();
                if let Some(backend) = slot.as_mut() {
                    backend.restore(gl, &mut self.cache, attachments)?;
                    self.stats.resources_restored += 1;
                } else {
                    log::warn!("Skipping restore of unloaded target group {}", group.id());
                }
            }

            RenderCommand::Begin { resolution, clear_colour, clear_flags } => {
                self.reset_pass_state();
                self.cache.bind_framebuffer(gl, None)?;
                self.begin_pass(gl, *resolution, *clear_colour, *clear_flags)?;
            }
            RenderCommand::BeginWithTargetGroup { target_group, clear_colour, clear_flags } => {
                self.reset_pass_state();
                {
                    let slot = target_group.backend().lock();
                    let backend = slot.as_ref().ok_or_else(|| not_loaded("target group", target_group.header()))?;
                    backend.bind(gl, &mut self.cache)?;
                }
                self.begin_pass(gl, target_group.resolution(), *clear_colour, *clear_flags)?;
            }
            RenderCommand::ApplyCamera(camera) => self.view_projection = camera.view_projection(),
            RenderCommand::ApplyAmbientLight(colour) => self.ambient_light = *colour,
            RenderCommand::ApplyDirectionalLight(light) => self.directional_lights.push(light.clone()),
            RenderCommand::ApplyMaterial(material) => self.apply_material(gl, material)?,
            RenderCommand::ApplyMesh(mesh) => {
                {
                    let slot = mesh.backend().lock();
                    let backend = slot.as_ref().ok_or_else(|| not_loaded("mesh", mesh.header()))?;
                    backend.bind(gl, &mut self.cache)?;
                }
                self.geometry = Geometry::Mesh(Arc::clone(mesh));
            }
            RenderCommand::ApplyMeshBatch(data) => {
                if self.dynamic_buffer.is_none() {
                    let created = GlDynamicMeshBuffer::new(
                        gl,
                        &mut self.cache,
                        self.settings.dynamic_vertex_capacity,
                        self.settings.dynamic_index_capacity,
                    )?;
                    self.dynamic_buffer = Some(created);
                }
                let buffer = self
                    .dynamic_buffer
                    .as_mut()
                    .ok_or(RenderError::InvalidatedResource("dynamic mesh buffer"))?;
                buffer.write_vertices(gl, &mut self.cache, &data.vertices)?;
                if !data.indices.is_empty() {
                    buffer.write_indices(gl, &mut self.cache, &data.indices)?;
                }
                buffer.bind(gl, &mut self.cache)?;
                self.geometry = Geometry::Batch {
                    index_count: u32::try_from(data.indices.len()).unwrap_or(u32::MAX),
                    vertex_count: u32::try_from(data.vertex_count()).unwrap_or(u32::MAX),
                };
            }
            RenderCommand::RenderInstance { world } => self.render_instance(gl, world)?,
            RenderCommand::End => {
                self.cache.bind_framebuffer(gl, None)?;
                self.reset_pass_state();
            }
        }
        Ok(())
    }

    fn begin_pass(&mut self, gl: &mut dyn GlContext, resolution: Resolution, colour: Colour, flags: ClearFlags) -> RenderResult<()> {
        gl.viewport(resolution);
        if !flags.is_empty() {
            gl.clear(flags, colour)?;
        }
        Ok(())
    }

    fn apply_material(&mut self, gl: &mut dyn GlContext, material: &Arc<RenderMaterial>) -> RenderResult<()> {
        let shader_resource = material.shader();
        let mut shader_slot = shader_resource.backend().lock();
        let shader = shader_slot.as_mut().ok_or_else(|| not_loaded("shader", shader_resource.header()))?;
        shader.bind(gl, &mut self.cache)?;

        let colour = material.colour().to_array();
        let ambient = self.ambient_light.to_array();
        shader.set_uniform(gl, "u_colour", UniformValue::Vec4(colour.into()))?;
        shader.set_uniform(gl, "u_ambient", UniformValue::Vec4(ambient.into()))?;
        if let Some(light) = self.directional_lights.first() {
            shader.set_uniform(gl, "u_lightDirection", UniformValue::Vec3(light.direction))?;
            shader.set_uniform(gl, "u_lightColour", UniformValue::Vec4(light.colour.to_array().into()))?;
        }

        let mut unit = 0;
        for texture in material.textures() {
            let slot = texture.backend().lock();
            let backend = slot.as_ref().ok_or_else(|| not_loaded("texture", texture.header()))?;
            backend.bind(gl, &mut self.cache, unit)?;
            shader.set_uniform(gl, &format!("u_texture{unit}"), UniformValue::Int(i32::try_from(unit).unwrap_or(i32::MAX)))?;
            unit += 1;
        }
        if let Some(cubemap) = material.cubemap() {
            let slot = cubemap.backend().lock();
            let backend = slot.as_ref().ok_or_else(|| not_loaded("cubemap", cubemap.header()))?;
            backend.bind(gl, &mut self.cache, unit)?;
            shader.set_uniform(gl, "u_cubemap", UniformValue::Int(i32::try_from(unit).unwrap_or(i32::MAX)))?;
        }

        drop(shader_slot);
        self.material = Some(Arc::clone(material));
        Ok(())
    }

    fn render_instance(&mut self, gl: &mut dyn GlContext, world: &Mat4) -> RenderResult<()> {
        let material = self
            .material
            .as_ref()
            .ok_or_else(|| GlError::InvalidOperation("instance drawn without a material".to_string()))?;
        {
            let mut slot = material.shader().backend().lock();
            let shader = slot.as_mut().ok_or_else(|| not_loaded("shader", material.shader().header()))?;
            shader.set_uniform(gl, "u_wvpMat", UniformValue::Mat4(self.view_projection * world))?;
            shader.set_uniform(gl, "u_worldMat", UniformValue::Mat4(*world))?;
        }

        match &self.geometry {
            Geometry::None => {
                return Err(GlError::InvalidOperation("instance drawn without geometry".to_string()).into());
            }
            Geometry::Mesh(mesh) => {
                let slot = mesh.backend().lock();
                let backend = slot.as_ref().ok_or_else(|| not_loaded("mesh", mesh.header()))?;
                backend.draw(gl)?;
            }
            Geometry::Batch { index_count, vertex_count } => {
                if *index_count > 0 {
                    gl.draw_elements(PrimitiveType::Triangles, *index_count, 0)?;
                } else {
                    gl.draw_arrays(PrimitiveType::Triangles, 0, *vertex_count)?;
                }
            }
        }
        self.stats.draw_calls += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::commands::RenderCommandCompiler;
    use crate::render::gl::{GpuResource, HeadlessGl, TextureFormat, VertexFormat};
    use crate::render::resources::{
        MeshData, RenderShader, RenderTargetGroup, RenderTexture, ResourceSource, TextureData,
    };
    use crate::render::snapshot::{RenderBatch, RenderCamera, RenderObject, RenderSnapshot};

    const VERTEX: &str = "uniform mat4 u_wvpMat;\nuniform mat4 u_worldMat;\nvoid main() {}";
    const FRAGMENT: &str = "uniform vec4 u_colour;\nuniform int u_texture0;\nvoid main() {}";

    fn settings(recovery: bool) -> ExecutorSettings {
        ExecutorSettings { context_loss_recovery: recovery, dynamic_vertex_capacity: 4096, dynamic_index_capacity: 512 }
    }

    fn run(executor: &mut RenderCommandExecutor, gl: &mut HeadlessGl, commands: Vec<RenderCommand>) -> RenderResult<()> {
        let mut buffer = RenderCommandBuffer::new(0);
        buffer.pre_render_list_mut().extend(commands);
        buffer.seal();
        executor.execute(gl, &buffer)
    }

    fn triangle() -> MeshData {
        MeshData {
            vertex_format: VertexFormat::StaticMesh,
            vertices: vec![1; VertexFormat::StaticMesh.stride() * 3],
            indices: vec![0, 1, 2],
        }
    }

    fn load_shader(shader: &Arc<RenderShader>) -> RenderCommand {
        RenderCommand::LoadShader {
            shader: Arc::clone(shader),
            vertex_source: VERTEX.to_string(),
            fragment_source: FRAGMENT.to_string(),
        }
    }

    #[test]
    fn test_load_and_draw_frame() {
        let mut gl = HeadlessGl::new();
        let mut executor = RenderCommandExecutor::new(settings(false));
        let shader = RenderShader::new(ResourceSource::in_memory());
        let mesh = RenderMesh::new(ResourceSource::in_memory(), VertexFormat::StaticMesh);
        run(&mut executor, &mut gl, vec![load_shader(&shader), RenderCommand::LoadMesh { mesh: Arc::clone(&mesh), data: triangle() }])
            .unwrap();
        assert_eq!(mesh.header().load_state(), LoadState::Loaded);

        let mut snapshot = RenderSnapshot::new(Resolution::new(16, 16), Colour::BLACK);
        snapshot.set_camera(RenderCamera { position: Vec3::zeros(), ..RenderCamera::default() });
        let material = RenderMaterial::new(Arc::clone(&shader)).build();
        for x in 0..3 {
            #[allow(clippy::cast_precision_loss)]
            let world = Mat4::new_translation(&Vec3::new(x as f32, 0.0, 0.0));
            snapshot.add_object(RenderObject { material: Arc::clone(&material), mesh: Arc::clone(&mesh), world });
        }
        let mut buffer = RenderCommandBuffer::new(0);
        RenderCommandCompiler::new().compile(snapshot.freeze(), Vec::new(), &mut buffer);
        executor.execute(&mut gl, &buffer).unwrap();

        assert_eq!(executor.stats().draw_calls, 3);
        assert_eq!(gl.stats().draw_calls, 3);
        assert_eq!(gl.stats().program_binds, 1);
        assert_eq!(gl.viewport_size(), Some(Resolution::new(16, 16)));
    }

    #[test]
    fn test_failed_load_marks_resource() {
        let mut gl = HeadlessGl::new();
        let mut executor = RenderCommandExecutor::new(settings(false));
        let shader = RenderShader::new(ResourceSource::in_memory());
        let command = RenderCommand::LoadShader {
            shader: Arc::clone(&shader),
            vertex_source: String::new(),
            fragment_source: FRAGMENT.to_string(),
        };

        run(&mut executor, &mut gl, vec![command]).unwrap();
        assert_eq!(shader.header().load_state(), LoadState::Failed);
        assert_eq!(executor.stats().load_failures, 1);
    }

    #[test]
    fn test_in_memory_mesh_keeps_backup_only_with_recovery() {
        for recovery in [false, true] {
            let mut gl = HeadlessGl::new();
            let mut executor = RenderCommandExecutor::new(settings(recovery));
            let mesh = RenderMesh::new(ResourceSource::in_memory(), VertexFormat::StaticMesh);
            run(&mut executor, &mut gl, vec![RenderCommand::LoadMesh { mesh: Arc::clone(&mesh), data: triangle() }]).unwrap();

            let has_backup = mesh.backend().lock().as_ref().is_some_and(GlMesh::has_backup);
            assert_eq!(has_backup, recovery);
        }
    }

    #[test]
    fn test_restore_commands_recreate_resources() {
        let mut gl = HeadlessGl::new();
        let mut executor = RenderCommandExecutor::new(settings(true));
        let mesh = RenderMesh::new(ResourceSource::in_memory(), VertexFormat::StaticMesh);
        let colour = RenderTexture::new(ResourceSource::in_memory());
        let group = RenderTargetGroup::new(Resolution::new(8, 8), Some(Arc::clone(&colour)), None, true);
        run(
            &mut executor,
            &mut gl,
            vec![
                RenderCommand::LoadMesh { mesh: Arc::clone(&mesh), data: triangle() },
                RenderCommand::LoadTexture {
                    texture: Arc::clone(&colour),
                    data: TextureData { resolution: Resolution::new(8, 8), format: TextureFormat::Rgba8, pixels: None },
                },
                RenderCommand::LoadTargetGroup(Arc::clone(&group)),
            ],
        )
        .unwrap();

        executor.on_suspend(&mut gl).unwrap();
        mesh.backend().invalidate();
        colour.backend().invalidate();
        group.backend().invalidate();
        gl.lose_context();
        gl.recreate_context();
        executor.on_resume(&mut gl).unwrap();

        run(
            &mut executor,
            &mut gl,
            vec![
                RenderCommand::RestoreMesh(Arc::clone(&mesh)),
                RenderCommand::RestoreTexture(Arc::clone(&colour)),
                RenderCommand::RestoreRenderTargetGroup(Arc::clone(&group)),
            ],
        )
        .unwrap();

        assert_eq!(executor.stats().resources_restored, 3);
        assert!(mesh.backend().is_valid());
        let framebuffer = group.backend().lock().as_ref().and_then(GlTargetGroup::framebuffer).unwrap();
        let (attached, _) = gl.framebuffer_attachments(framebuffer).unwrap();
        assert_eq!(attached, colour.handle().map(|handle| handle.raw()));
    }

    #[test]
    fn test_restore_mesh_without_backup_is_fatal() {
        let mut gl = HeadlessGl::new();
        let mut executor = RenderCommandExecutor::new(settings(false));
        let mesh = RenderMesh::new(ResourceSource::in_memory(), VertexFormat::StaticMesh);
        run(&mut executor, &mut gl, vec![RenderCommand::LoadMesh { mesh: Arc::clone(&mesh), data: triangle() }]).unwrap();

        if let Some(backend) = mesh.backend().lock().as_mut() {
            backend.invalidate();
        }
        let result = run(&mut executor, &mut gl, vec![RenderCommand::RestoreMesh(mesh)]);
        assert!(matches!(result, Err(RenderError::RestoreUnsupported(_))));
    }

    #[test]
    fn test_dynamic_buffer_survives_suspend() {
        let mut gl = HeadlessGl::new();
        let mut executor = RenderCommandExecutor::new(settings(true));
        let shader = RenderShader::new(ResourceSource::in_memory());
        run(&mut executor, &mut gl, vec![load_shader(&shader)]).unwrap();

        let material = RenderMaterial::new(Arc::clone(&shader)).build();
        let batch = || RenderBatch {
            material: Arc::clone(&material),
            data: MeshData { vertex_format: VertexFormat::Sprite, vertices: vec![7; 24 * 3], indices: vec![0, 1, 2] },
        };
        let mut snapshot = RenderSnapshot::new(Resolution::new(4, 4), Colour::BLACK);
        snapshot.add_batch(batch());
        let mut buffer = RenderCommandBuffer::new(0);
        RenderCommandCompiler::new().compile(snapshot.freeze(), Vec::new(), &mut buffer);
        executor.execute(&mut gl, &buffer).unwrap();

        executor.on_suspend(&mut gl).unwrap();
        shader.backend().invalidate();
        gl.lose_context();
        gl.recreate_context();
        executor.on_resume(&mut gl).unwrap();
        run(&mut executor, &mut gl, vec![load_shader(&shader)]).unwrap();

        let mut snapshot = RenderSnapshot::new(Resolution::new(4, 4), Colour::BLACK);
        snapshot.add_batch(batch());
        RenderCommandCompiler::new().compile(snapshot.freeze(), Vec::new(), &mut buffer);
        executor.execute(&mut gl, &buffer).unwrap();
        assert_eq!(executor.stats().draw_calls, 2);
    }

    #[test]
    #[should_panic(expected = "unsealed")]
    fn test_execute_unsealed_panics() {
        let mut gl = HeadlessGl::new();
        let mut executor = RenderCommandExecutor::new(settings(false));
        let _ = executor.execute(&mut gl, &RenderCommandBuffer::new(0));
    }
}
