//! # GL Context Restorer
//!
//! Recovers GPU resources after the platform destroys the GL context.
//!
//! ## Suspend
//!
//! [`GlContextRestorer::on_system_suspend`] runs on the lifecycle thread
//! after the command buffer manager and renderer have gone idle. It
//! invalidates every backend wrapper in the pool, which forgets the native
//! handles without calling GL; the context is about to disappear with them.
//!
//! ## Resume
//!
//! [`GlContextRestorer::on_resume`] reloads file-backed resources through the
//! pool and queues restore commands for in-memory ones, which rebuild from
//! their CPU backups. The restore commands are injected ahead of the next
//! frame, after the pool's reloads, in the order meshes, textures, cubemaps
//! and target groups. Target groups come last since they attach textures.
//!
//! The very first resume only marks the restorer initialised: nothing has
//! been lost yet.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::error::{RenderError, RenderResult};
use super::resources::{Model, RenderCubemap, RenderMesh, RenderShader, RenderTargetGroup, RenderTexture};
use super::snapshot::{RenderSnapshot, RenderSnapshotObserver};
use crate::resource::{PooledResource, ResourcePool, StorageLocation};

#[derive(Debug, Default)]
struct RestorerState {
    has_context_been_backed_up: bool,
    initialised: bool,
    meshes: Vec<Arc<RenderMesh>>,
    textures: Vec<Arc<RenderTexture>>,
    cubemaps: Vec<Arc<RenderCubemap>>,
    target_groups: Vec<Arc<RenderTargetGroup>>,
}

/// Invalidates GPU resources on suspend and restores them on resume
#[derive(Debug)]
pub struct GlContextRestorer {
    enabled: bool,
    state: Mutex<RestorerState>,
}

impl GlContextRestorer {
    /// Create a restorer; when `enabled` is false the lifecycle hooks do nothing
    pub fn new(enabled: bool) -> Self {
        Self { enabled, state: Mutex::new(RestorerState::default()) }
    }

    fn state(&self) -> MutexGuard<'_, RestorerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the lifecycle hooks are active on this platform
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether resources are invalidated and waiting to be restored
    pub fn has_context_been_backed_up(&self) -> bool {
        self.state().has_context_been_backed_up
    }

    /// Number of restore commands waiting for the next frame
    pub fn pending_restore_count(&self) -> usize {
        let state = self.state();
        state.meshes.len() + state.textures.len() + state.cubemaps.len() + state.target_groups.len()
    }

    /// Invalidate every backend wrapper in the pool
    ///
    /// Makes no GL calls. Calling it again before a restore does nothing.
    pub fn invalidate_resources(&self, pool: &ResourcePool) {
        let mut state = self.state();
        if state.has_context_been_backed_up {
            return;
        }

        let mut invalidated = 0;
        for shader in pool.get_all_resources::<RenderShader>() {
            invalidated += usize::from(shader.backend().invalidate());
        }
        for texture in pool.get_all_resources::<RenderTexture>() {
            invalidated += usize::from(texture.backend().invalidate());
        }
        for cubemap in pool.get_all_resources::<RenderCubemap>() {
            invalidated += usize::from(cubemap.backend().invalidate());
        }
        for model in pool.get_all_resources::<Model>() {
            for mesh in model.meshes() {
                invalidated += usize::from(mesh.backend().invalidate());
            }
        }
        for target_group in pool.get_all_resources::<RenderTargetGroup>() {
            invalidated += usize::from(target_group.backend().invalidate());
        }

        state.has_context_been_backed_up = true;
        log::info!("Invalidated {} GPU resources for context loss", invalidated);
    }

    /// Recreate everything invalidated by [`GlContextRestorer::invalidate_resources`]
    ///
    /// Does nothing unless an invalidate happened since the last restore.
    ///
    /// # Panics
    ///
    /// Panics if the pool holds a shader with no storage location, since
    /// shaders keep no backup to restore from.
    pub fn restore_resources(&self, pool: &mut ResourcePool) -> RenderResult<()> {
        let mut state = self.state();
        if !state.has_context_been_backed_up {
            return Ok(());
        }

        for shader in pool.get_all_resources::<RenderShader>() {
            assert!(
                shader.storage_location() != StorageLocation::None,
                "shader {} has no storage location and cannot be restored",
                shader.id()
            );
        }
        let reloaded = refresh::<RenderShader>(pool)?
            + refresh::<RenderTexture>(pool)?
            + refresh::<RenderCubemap>(pool)?
            + refresh::<Model>(pool)?;

        for texture in pool.get_all_resources::<RenderTexture>() {
            if texture.storage_location() == StorageLocation::None && texture.backend().is_loaded() {
                state.textures.push(texture);
            }
        }
        for cubemap in pool.get_all_resources::<RenderCubemap>() {
            if cubemap.storage_location() == StorageLocation::None && cubemap.backend().is_loaded() {
                state.cubemaps.push(cubemap);
            }
        }
        for model in pool.get_all_resources::<Model>() {
            if model.storage_location() == StorageLocation::None {
                let loaded = model.meshes().iter().filter(|mesh| mesh.backend().is_loaded()).cloned();
                state.meshes.extend(loaded);
            }
        }
        for target_group in pool.get_all_resources::<RenderTargetGroup>() {
            if target_group.backend().is_loaded() {
                state.target_groups.push(target_group);
            }
        }

        state.has_context_been_backed_up = false;
        log::info!(
            "Restoring GPU resources: {} reloaded, {} meshes, {} textures, {} cubemaps, {} target groups from memory",
            reloaded,
            state.meshes.len(),
            state.textures.len(),
            state.cubemaps.len(),
            state.target_groups.len()
        );
        Ok(())
    }

    /// Lifecycle resume hook
    pub fn on_resume(&self, pool: &mut ResourcePool) -> RenderResult<()> {
        if !self.enabled {
            return Ok(());
        }
        {
            let mut state = self.state();
            if !state.initialised {
                state.initialised = true;
                return Ok(());
            }
        }
        self.restore_resources(pool)
    }

    /// Lifecycle suspend hook
    pub fn on_system_suspend(&self, pool: &ResourcePool) {
        if self.enabled {
            self.invalidate_resources(pool);
        }
    }
}

fn refresh<T: PooledResource>(pool: &mut ResourcePool) -> RenderResult<usize> {
    pool.refresh_resources::<T>()
        .map_err(|error| RenderError::RestoreFailed(format!("reloading {} resources: {}", T::KIND, error)))
}

impl RenderSnapshotObserver for GlContextRestorer {
    fn on_render_snapshot(&self, snapshot: &mut RenderSnapshot) {
        if !snapshot.is_main_target() {
            return;
        }
        let mut state = self.state();
        for mesh in state.meshes.drain(..) {
            snapshot.add_restore_mesh_command(mesh);
        }
        for texture in state.textures.drain(..) {
            snapshot.add_restore_texture_command(texture);
        }
        for cubemap in state.cubemaps.drain(..) {
            snapshot.add_restore_cubemap_command(cubemap);
        }
        for target_group in state.target_groups.drain(..) {
            snapshot.add_restore_render_target_group_command(target_group);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Colour, Resolution};
    use crate::render::commands::{RenderCommand, RenderCommandBuffer, RenderCommandKind};
    use crate::render::executor::{ExecutorSettings, RenderCommandExecutor};
    use crate::render::gl::{HeadlessGl, TextureFormat, VertexFormat};
    use crate::render::resource_manager::RenderResourceManager;
    use crate::render::resources::{MeshData, TextureData};
    use crate::resource::formats::solid_png;
    use crate::resource::MemoryFileSystem;

    const SHADER: &str = r#"(vertex: "void main() {}", fragment: "void main() {}")"#;
    const SKY: &str = r#"(faces: ["face.png", "face.png", "face.png", "face.png", "face.png", "face.png"])"#;

    struct Fixture {
        gl: HeadlessGl,
        files: Arc<MemoryFileSystem>,
        executor: RenderCommandExecutor,
        manager: Arc<RenderResourceManager>,
        pool: ResourcePool,
        restorer: GlContextRestorer,
    }

    impl Fixture {
        fn new() -> Self {
            let files = Arc::new(
                MemoryFileSystem::new()
                    .with_file(StorageLocation::Package, "basic.ron", SHADER)
                    .with_file(StorageLocation::Package, "logo.png", solid_png(2, 2, [255, 0, 0, 255]))
                    .with_file(StorageLocation::Package, "sky.ron", SKY)
                    .with_file(StorageLocation::Package, "face.png", solid_png(2, 2, [0, 0, 255, 255])),
            );
            let manager = Arc::new(RenderResourceManager::new());
            Self {
                gl: HeadlessGl::new(),
                files: Arc::clone(&files),
                executor: RenderCommandExecutor::new(ExecutorSettings {
                    context_loss_recovery: true,
                    dynamic_vertex_capacity: 1024,
                    dynamic_index_capacity: 64,
                }),
                pool: ResourcePool::new(files, Arc::clone(&manager)),
                manager,
                restorer: GlContextRestorer::new(true),
            }
        }

        /// Build and execute a frame with no passes but the pre/post lists
        fn frame(&mut self) -> Vec<RenderCommandKind> {
            let mut snapshot = RenderSnapshot::new(Resolution::new(4, 4), Colour::BLACK);
            self.manager.on_render_snapshot(&mut snapshot);
            self.restorer.on_render_snapshot(&mut snapshot);
            let frame = snapshot.freeze();
            let kinds = frame.pre_render_commands.iter().map(RenderCommand::kind).collect();

            let mut buffer = RenderCommandBuffer::new(0);
            buffer.pre_render_list_mut().extend(frame.pre_render_commands);
            buffer.post_render_list_mut().extend(frame.post_render_commands);
            buffer.seal();
            self.executor.execute(&mut self.gl, &buffer).unwrap();
            kinds
        }

        fn lose_context(&mut self) {
            self.restorer.on_system_suspend(&self.pool);
            self.gl.lose_context();
            self.gl.recreate_context();
        }
    }

    #[test]
    fn test_full_recovery_cycle() {
        let mut fixture = Fixture::new();
        let shader = fixture.pool.load::<RenderShader>(StorageLocation::Package, "basic.ron").unwrap();
        let logo = fixture.pool.load::<RenderTexture>(StorageLocation::Package, "logo.png").unwrap();
        let model = fixture.pool.create_model(vec![MeshData {
            vertex_format: VertexFormat::PositionColour,
            vertices: vec![0; 28 * 3],
            indices: vec![0, 1, 2],
        }]);
        let group = fixture.pool.create_target_group(Resolution::new(8, 8), false);
        fixture.frame();
        fixture.restorer.on_resume(&mut fixture.pool).unwrap();

        fixture.lose_context();
        assert!(fixture.restorer.has_context_been_backed_up());
        assert!(!shader.backend().is_valid());
        assert!(!group.backend().is_valid());

        fixture.restorer.on_resume(&mut fixture.pool).unwrap();
        assert!(!fixture.restorer.has_context_been_backed_up());
        assert_eq!(fixture.pool.reload_count(), 2);

        use RenderCommandKind::*;
        assert_eq!(
            fixture.frame(),
            vec![LoadShader, LoadTexture, RestoreMesh, RestoreTexture, RestoreRenderTargetGroup]
        );
        assert!(shader.backend().is_valid());
        assert!(logo.backend().is_valid());
        assert!(model.meshes()[0].backend().is_valid());
        assert!(group.backend().is_valid());
        assert_eq!(fixture.restorer.pending_restore_count(), 0);
    }

    #[test]
    fn test_file_cubemap_is_reloaded_after_context_loss() {
        let mut fixture = Fixture::new();
        let sky = fixture.pool.load::<RenderCubemap>(StorageLocation::Package, "sky.ron").unwrap();
        assert_eq!(fixture.frame(), vec![RenderCommandKind::LoadCubemap]);
        let old_handle = sky.handle().unwrap();
        fixture.restorer.on_resume(&mut fixture.pool).unwrap();

        fixture.lose_context();
        assert!(!sky.backend().is_valid());

        fixture.restorer.on_resume(&mut fixture.pool).unwrap();
        assert_eq!(fixture.pool.reload_count(), 1);
        assert_eq!(fixture.frame(), vec![RenderCommandKind::LoadCubemap]);
        let new_handle = sky.handle().unwrap();
        assert_ne!(new_handle, old_handle);
        assert!(fixture.gl.is_live(new_handle));
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let mut fixture = Fixture::new();
        fixture.pool.load::<RenderShader>(StorageLocation::Package, "basic.ron").unwrap();
        fixture.frame();

        fixture.restorer.invalidate_resources(&fixture.pool);
        fixture.restorer.invalidate_resources(&fixture.pool);
        fixture.restorer.restore_resources(&mut fixture.pool).unwrap();
        fixture.restorer.restore_resources(&mut fixture.pool).unwrap();
        assert_eq!(fixture.pool.reload_count(), 1);
    }

    #[test]
    fn test_restore_without_invalidate_does_nothing() {
        let mut fixture = Fixture::new();
        fixture.pool.load::<RenderTexture>(StorageLocation::Package, "logo.png").unwrap();
        fixture.frame();

        fixture.restorer.restore_resources(&mut fixture.pool).unwrap();
        assert_eq!(fixture.pool.reload_count(), 0);
        assert_eq!(fixture.restorer.pending_restore_count(), 0);
    }

    #[test]
    fn test_first_resume_only_initialises() {
        let mut fixture = Fixture::new();
        fixture.pool.load::<RenderTexture>(StorageLocation::Package, "logo.png").unwrap();
        fixture.frame();
        fixture.restorer.invalidate_resources(&fixture.pool);

        fixture.restorer.on_resume(&mut fixture.pool).unwrap();
        assert!(fixture.restorer.has_context_been_backed_up());
        fixture.restorer.on_resume(&mut fixture.pool).unwrap();
        assert!(!fixture.restorer.has_context_been_backed_up());
    }

    #[test]
    fn test_disabled_restorer_ignores_lifecycle() {
        let mut fixture = Fixture::new();
        fixture.restorer = GlContextRestorer::new(false);
        let texture = fixture.pool.create_texture(TextureData {
            resolution: Resolution::new(1, 1),
            format: TextureFormat::Rgba8,
            pixels: Some(vec![1, 2, 3, 4]),
        });
        fixture.frame();

        fixture.restorer.on_system_suspend(&fixture.pool);
        assert!(texture.backend().is_valid());
        assert!(!fixture.restorer.has_context_been_backed_up());
    }

    #[test]
    fn test_refresh_failure_is_restore_failed() {
        let mut fixture = Fixture::new();
        fixture.pool.load::<RenderTexture>(StorageLocation::Package, "logo.png").unwrap();
        fixture.frame();

        fixture.files.remove(StorageLocation::Package, "logo.png");
        fixture.restorer.invalidate_resources(&fixture.pool);
        let result = fixture.restorer.restore_resources(&mut fixture.pool);
        assert!(matches!(result, Err(RenderError::RestoreFailed(_))));
    }

    #[test]
    #[should_panic(expected = "cannot be restored")]
    fn test_in_memory_shader_cannot_be_restored() {
        let mut fixture = Fixture::new();
        fixture.pool.create_shader("void main() {}", "void main() {}");
        fixture.restorer.invalidate_resources(&fixture.pool);
        let _ = fixture.restorer.restore_resources(&mut fixture.pool);
    }
}
