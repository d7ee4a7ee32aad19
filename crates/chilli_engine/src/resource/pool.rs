//! # Resource Pool
//!
//! Owns every render resource the application creates or loads, keyed in
//! `slotmap` collections per resource type. File-backed resources are cached
//! by source, so loading the same file twice returns the same resource.
//!
//! The pool never touches GL. Creating, reloading and releasing resources
//! queues load/unload commands on the [`RenderResourceManager`], which the
//! next frame carries to the render thread.
//!
//! ## Context loss
//!
//! [`ResourcePool::refresh_resources`] rereads every file-backed resource of
//! a type and queues a fresh load into the same `Arc`, so everything holding
//! the resource keeps working once the frame has executed.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use slotmap::{new_key_type, SlotMap};

use super::file_system::FileSystem;
use super::formats::{decode_image, parse_ron, CubemapFile, ModelFile, ShaderFile};
use super::{LoadState, ResourceError, ResourceResult, StorageLocation};
use crate::foundation::math::Resolution;
use crate::render::commands::RenderCommand;
use crate::render::gl::TextureFormat;
use crate::render::resource_manager::RenderResourceManager;
use crate::render::resources::{
    CubemapData, MeshData, Model, RenderCubemap, RenderMesh, RenderShader, RenderTargetGroup, RenderTexture,
    ResourceSource, TextureData,
};

new_key_type! {
    /// Key of a resource within its pool collection
    pub struct ResourceKey;
}

/// Resources of one type
#[derive(Debug)]
pub struct ResourceCollection<T> {
    resources: SlotMap<ResourceKey, Arc<T>>,
    by_source: HashMap<ResourceSource, ResourceKey>,
}

impl<T> Default for ResourceCollection<T> {
    fn default() -> Self {
        Self { resources: SlotMap::with_key(), by_source: HashMap::new() }
    }
}

impl<T> ResourceCollection<T> {
    fn insert(&mut self, source: &ResourceSource, resource: Arc<T>) -> ResourceKey {
        let key = self.resources.insert(resource);
        if source.is_file_backed() {
            self.by_source.insert(source.clone(), key);
        }
        key
    }

    fn find(&self, source: &ResourceSource) -> Option<&Arc<T>> {
        self.by_source.get(source).and_then(|key| self.resources.get(*key))
    }

    /// Resource by key
    pub fn get(&self, key: ResourceKey) -> Option<&Arc<T>> {
        self.resources.get(key)
    }

    /// Number of resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Remove resources only the pool still references
    fn take_unused(&mut self) -> Vec<Arc<T>> {
        let unused: Vec<ResourceKey> = self
            .resources
            .iter()
            .filter(|(_, resource)| Arc::strong_count(resource) == 1)
            .map(|(key, _)| key)
            .collect();
        self.by_source.retain(|_, key| !unused.contains(key));
        unused.into_iter().filter_map(|key| self.resources.remove(key)).collect()
    }
}

/// A resource type stored in the pool
pub trait PooledResource: Send + Sync + Sized + 'static {
    /// Human readable kind, for logs
    const KIND: &'static str;

    /// Where the resource came from
    fn source(&self) -> &ResourceSource;

    /// The pool collection holding this type
    fn collection(pool: &ResourcePool) -> &ResourceCollection<Self>;

    /// Mutable pool collection holding this type
    fn collection_mut(pool: &mut ResourcePool) -> &mut ResourceCollection<Self>;

    /// Read the resource's file and queue its load
    fn create_from_file(pool: &ResourcePool, source: ResourceSource) -> ResourceResult<Arc<Self>>;

    /// Reread the resource's file and queue a load into the existing resource
    fn reload(pool: &ResourcePool, resource: &Arc<Self>) -> ResourceResult<()>;

    /// Queue the unload of the resource's GPU side
    fn queue_unload(pool: &ResourcePool, resource: &Arc<Self>);
}

/// Owner of all render resources
pub struct ResourcePool {
    file_system: Arc<dyn FileSystem>,
    render_resource_manager: Arc<RenderResourceManager>,
    shaders: ResourceCollection<RenderShader>,
    textures: ResourceCollection<RenderTexture>,
    cubemaps: ResourceCollection<RenderCubemap>,
    models: ResourceCollection<Model>,
    target_groups: ResourceCollection<RenderTargetGroup>,
    reload_count: usize,
}

impl ResourcePool {
    /// Create an empty pool reading files through `file_system`
    pub fn new(file_system: Arc<dyn FileSystem>, render_resource_manager: Arc<RenderResourceManager>) -> Self {
        Self {
            file_system,
            render_resource_manager,
            shaders: ResourceCollection::default(),
            textures: ResourceCollection::default(),
            cubemaps: ResourceCollection::default(),
            models: ResourceCollection::default(),
            target_groups: ResourceCollection::default(),
            reload_count: 0,
        }
    }

    fn queue(&self, command: RenderCommand) {
        self.render_resource_manager.queue(command);
    }

    /// Every resource of a type
    pub fn get_all_resources<T: PooledResource>(&self) -> Vec<Arc<T>> {
        T::collection(self).resources.values().cloned().collect()
    }

    /// Reload every file-backed resource of a type
    ///
    /// Returns the number of resources reloaded. Stops at the first failure.
    pub fn refresh_resources<T: PooledResource>(&mut self) -> ResourceResult<usize> {
        let file_backed: Vec<Arc<T>> = T::collection(self)
            .resources
            .values()
            .filter(|resource| resource.source().is_file_backed())
            .cloned()
            .collect();
        for resource in &file_backed {
            T::reload(self, resource)?;
        }
        self.reload_count += file_backed.len();
        if !file_backed.is_empty() {
            log::info!("Refreshed {} {} resources", file_backed.len(), T::KIND);
        }
        Ok(file_backed.len())
    }

    /// Total resources reloaded by [`ResourcePool::refresh_resources`]
    pub fn reload_count(&self) -> usize {
        self.reload_count
    }

    /// Load a resource from a file, or return the already loaded one
    pub fn load<T: PooledResource>(
        &mut self,
        location: StorageLocation,
        path: impl AsRef<Path>,
    ) -> ResourceResult<Arc<T>> {
        let source = ResourceSource::file(location, path.as_ref());
        if !source.is_file_backed() {
            return Err(ResourceError::NotFileBacked(source.to_string()));
        }
        if let Some(existing) = T::collection(self).find(&source) {
            return Ok(Arc::clone(existing));
        }

        let resource = T::create_from_file(self, source.clone()).map_err(|error| {
            log::error!("Failed to load {} {}: {}", T::KIND, source, error);
            error
        })?;
        T::collection_mut(self).insert(&source, Arc::clone(&resource));
        log::debug!("Loading {} {}", T::KIND, source);
        Ok(resource)
    }

    /// Create a shader from source in memory
    ///
    /// In-memory shaders keep no backup, so they cannot survive context loss
    /// while recovery is enabled; load shaders from files on such platforms.
    pub fn create_shader(&mut self, vertex_source: &str, fragment_source: &str) -> Arc<RenderShader> {
        let source = ResourceSource::in_memory();
        let shader = RenderShader::new(source.clone());
        self.queue(RenderCommand::LoadShader {
            shader: Arc::clone(&shader),
            vertex_source: vertex_source.to_string(),
            fragment_source: fragment_source.to_string(),
        });
        self.shaders.insert(&source, Arc::clone(&shader));
        shader
    }

    /// Create a texture from pixels in memory
    pub fn create_texture(&mut self, data: TextureData) -> Arc<RenderTexture> {
        let source = ResourceSource::in_memory();
        let texture = RenderTexture::new(source.clone());
        self.queue(RenderCommand::LoadTexture { texture: Arc::clone(&texture), data });
        self.textures.insert(&source, Arc::clone(&texture));
        texture
    }

    /// Create a cubemap from faces in memory
    pub fn create_cubemap(&mut self, data: CubemapData) -> Arc<RenderCubemap> {
        let source = ResourceSource::in_memory();
        let cubemap = RenderCubemap::new(source.clone());
        self.queue(RenderCommand::LoadCubemap { cubemap: Arc::clone(&cubemap), data });
        self.cubemaps.insert(&source, Arc::clone(&cubemap));
        cubemap
    }

    /// Create a model from meshes built in memory
    pub fn create_model(&mut self, meshes: Vec<MeshData>) -> Arc<Model> {
        let source = ResourceSource::in_memory();
        let meshes = meshes
            .into_iter()
            .map(|data| {
                let mesh = RenderMesh::new(source.clone(), data.vertex_format);
                self.queue(RenderCommand::LoadMesh { mesh: Arc::clone(&mesh), data });
                mesh
            })
            .collect();
        let model = Model::new(source.clone(), meshes);
        self.models.insert(&source, Arc::clone(&model));
        model
    }

    /// Create an offscreen target group with an RGBA colour texture
    ///
    /// Depth goes to a sampleable texture when `depth_texture` is set, to a
    /// renderbuffer otherwise.
    pub fn create_target_group(&mut self, resolution: Resolution, depth_texture: bool) -> Arc<RenderTargetGroup> {
        let colour = self.create_texture(TextureData { resolution, format: TextureFormat::Rgba8, pixels: None });
        let depth = depth_texture
            .then(|| self.create_texture(TextureData { resolution, format: TextureFormat::Depth16, pixels: None }));
        let group = RenderTargetGroup::new(resolution, Some(colour), depth, !depth_texture);
        self.queue(RenderCommand::LoadTargetGroup(Arc::clone(&group)));
        self.target_groups.insert(&ResourceSource::in_memory(), Arc::clone(&group));
        group
    }

    /// Release resources nothing outside the pool references
    ///
    /// Textures attached to a released target group stay alive until the
    /// group's unload has reached the render thread, and are released by a
    /// later call. Returns the number of resources released.
    pub fn release_unused(&mut self) -> usize {
        let released = self.release_unused_of::<RenderTargetGroup>()
            + self.release_unused_of::<Model>()
            + self.release_unused_of::<RenderCubemap>()
            + self.release_unused_of::<RenderTexture>()
            + self.release_unused_of::<RenderShader>();
        if released > 0 {
            log::debug!("Released {} unused resources", released);
        }
        released
    }

    fn release_unused_of<T: PooledResource>(&mut self) -> usize {
        let unused = T::collection_mut(self).take_unused();
        for resource in &unused {
            T::queue_unload(self, resource);
        }
        unused.len()
    }

    fn file_path<'a>(&self, source: &'a ResourceSource) -> ResourceResult<&'a Path> {
        source.file_path().ok_or_else(|| ResourceError::NotFileBacked(source.to_string()))
    }

    fn read_shader(&self, source: &ResourceSource) -> ResourceResult<ShaderFile> {
        let path = self.file_path(source)?;
        let text = self.file_system.read_to_string(source.location, path)?;
        parse_ron(path, &text)
    }

    fn read_texture(&self, source: &ResourceSource) -> ResourceResult<TextureData> {
        let path = self.file_path(source)?;
        decode_image(&self.file_system.read(source.location, path)?)
    }

    fn read_cubemap(&self, source: &ResourceSource) -> ResourceResult<CubemapData> {
        let path = self.file_path(source)?;
        let text = self.file_system.read_to_string(source.location, path)?;
        let file: CubemapFile = parse_ron(path, &text)?;
        if file.faces.len() != 6 {
            return Err(ResourceError::InvalidData(format!(
                "cubemap {} lists {} faces, expected 6",
                path.display(),
                file.faces.len()
            )));
        }

        let mut faces: [Vec<u8>; 6] = Default::default();
        let mut face_resolution = None;
        for (face, face_path) in faces.iter_mut().zip(&file.faces) {
            let image = decode_image(&self.file_system.read(source.location, face_path)?)?;
            match face_resolution {
                None => face_resolution = Some(image.resolution),
                Some(resolution) if resolution != image.resolution => {
                    return Err(ResourceError::InvalidData(format!(
                        "cubemap {} faces differ in size",
                        path.display()
                    )));
                }
                Some(_) => {}
            }
            *face = image.pixels.unwrap_or_default();
        }
        Ok(CubemapData {
            face_resolution: face_resolution.unwrap_or(Resolution::new(0, 0)),
            format: TextureFormat::Rgba8,
            faces,
        })
    }

    fn read_model(&self, source: &ResourceSource) -> ResourceResult<MeshData> {
        let path = self.file_path(source)?;
        let text = self.file_system.read_to_string(source.location, path)?;
        parse_ron::<ModelFile>(path, &text)?.into_mesh_data()
    }
}

impl PooledResource for RenderShader {
    const KIND: &'static str = RenderShader::KIND;

    fn source(&self) -> &ResourceSource {
        self.header().source()
    }

    fn collection(pool: &ResourcePool) -> &ResourceCollection<Self> {
        &pool.shaders
    }

    fn collection_mut(pool: &mut ResourcePool) -> &mut ResourceCollection<Self> {
        &mut pool.shaders
    }

    fn create_from_file(pool: &ResourcePool, source: ResourceSource) -> ResourceResult<Arc<Self>> {
        let file = pool.read_shader(&source)?;
        let shader = RenderShader::new(source);
        pool.queue(RenderCommand::LoadShader {
            shader: Arc::clone(&shader),
            vertex_source: file.vertex,
            fragment_source: file.fragment,
        });
        Ok(shader)
    }

    fn reload(pool: &ResourcePool, resource: &Arc<Self>) -> ResourceResult<()> {
        let file = pool.read_shader(resource.header().source())?;
        resource.header().set_load_state(LoadState::Loading);
        pool.queue(RenderCommand::LoadShader {
            shader: Arc::clone(resource),
            vertex_source: file.vertex,
            fragment_source: file.fragment,
        });
        Ok(())
    }

    fn queue_unload(pool: &ResourcePool, resource: &Arc<Self>) {
        pool.queue(RenderCommand::UnloadShader(Arc::clone(resource)));
    }
}

impl PooledResource for RenderTexture {
    const KIND: &'static str = RenderTexture::KIND;

    fn source(&self) -> &ResourceSource {
        self.header().source()
    }

    fn collection(pool: &ResourcePool) -> &ResourceCollection<Self> {
        &pool.textures
    }

    fn collection_mut(pool: &mut ResourcePool) -> &mut ResourceCollection<Self> {
        &mut pool.textures
    }

    fn create_from_file(pool: &ResourcePool, source: ResourceSource) -> ResourceResult<Arc<Self>> {
        let data = pool.read_texture(&source)?;
        let texture = RenderTexture::new(source);
        pool.queue(RenderCommand::LoadTexture { texture: Arc::clone(&texture), data });
        Ok(texture)
    }

    fn reload(pool: &ResourcePool, resource: &Arc<Self>) -> ResourceResult<()> {
        let data = pool.read_texture(resource.header().source())?;
        resource.header().set_load_state(LoadState::Loading);
        pool.queue(RenderCommand::LoadTexture { texture: Arc::clone(resource), data });
        Ok(())
    }

    fn queue_unload(pool: &ResourcePool, resource: &Arc<Self>) {
        pool.queue(RenderCommand::UnloadTexture(Arc::clone(resource)));
    }
}

impl PooledResource for RenderCubemap {
    const KIND: &'static str = RenderCubemap::KIND;

    fn source(&self) -> &ResourceSource {
        self.header().source()
    }

    fn collection(pool: &ResourcePool) -> &ResourceCollection<Self> {
        &pool.cubemaps
    }

    fn collection_mut(pool: &mut ResourcePool) -> &mut ResourceCollection<Self> {
        &mut pool.cubemaps
    }

    fn create_from_file(pool: &ResourcePool, source: ResourceSource) -> ResourceResult<Arc<Self>> {
        let data = pool.read_cubemap(&source)?;
        let cubemap = RenderCubemap::new(source);
        pool.queue(RenderCommand::LoadCubemap { cubemap: Arc::clone(&cubemap), data });
        Ok(cubemap)
    }

    fn reload(pool: &ResourcePool, resource: &Arc<Self>) -> ResourceResult<()> {
        let data = pool.read_cubemap(resource.header().source())?;
        resource.header().set_load_state(LoadState::Loading);
        pool.queue(RenderCommand::LoadCubemap { cubemap: Arc::clone(resource), data });
        Ok(())
    }

    fn queue_unload(pool: &ResourcePool, resource: &Arc<Self>) {
        pool.queue(RenderCommand::UnloadCubemap(Arc::clone(resource)));
    }
}

impl PooledResource for Model {
    const KIND: &'static str = "model";

    fn source(&self) -> &ResourceSource {
        Model::source(self)
    }

    fn collection(pool: &ResourcePool) -> &ResourceCollection<Self> {
        &pool.models
    }

    fn collection_mut(pool: &mut ResourcePool) -> &mut ResourceCollection<Self> {
        &mut pool.models
    }

    fn create_from_file(pool: &ResourcePool, source: ResourceSource) -> ResourceResult<Arc<Self>> {
        let data = pool.read_model(&source)?;
        let mesh = RenderMesh::new(source.clone(), data.vertex_format);
        pool.queue(RenderCommand::LoadMesh { mesh: Arc::clone(&mesh), data });
        Ok(Model::new(source, vec![mesh]))
    }

    fn reload(pool: &ResourcePool, resource: &Arc<Self>) -> ResourceResult<()> {
        let data = pool.read_model(resource.source())?;
        let [mesh] = resource.meshes() else {
            return Err(ResourceError::InvalidData(format!(
                "model {} has {} meshes, its file holds one",
                resource.source(),
                resource.meshes().len()
            )));
        };
        if mesh.vertex_format() != data.vertex_format {
            return Err(ResourceError::InvalidData(format!(
                "model {} changed vertex format on reload",
                resource.source()
            )));
        }
        mesh.header().set_load_state(LoadState::Loading);
        pool.queue(RenderCommand::LoadMesh { mesh: Arc::clone(mesh), data });
        Ok(())
    }

    fn queue_unload(pool: &ResourcePool, resource: &Arc<Self>) {
        for mesh in resource.meshes() {
            pool.queue(RenderCommand::UnloadMesh(Arc::clone(mesh)));
        }
    }
}

impl PooledResource for RenderTargetGroup {
    const KIND: &'static str = RenderTargetGroup::KIND;

    fn source(&self) -> &ResourceSource {
        self.header().source()
    }

    fn collection(pool: &ResourcePool) -> &ResourceCollection<Self> {
        &pool.target_groups
    }

    fn collection_mut(pool: &mut ResourcePool) -> &mut ResourceCollection<Self> {
        &mut pool.target_groups
    }

    fn create_from_file(_pool: &ResourcePool, source: ResourceSource) -> ResourceResult<Arc<Self>> {
        Err(ResourceError::NotFileBacked(format!("target groups cannot be loaded from {}", source)))
    }

    fn reload(_pool: &ResourcePool, resource: &Arc<Self>) -> ResourceResult<()> {
        Err(ResourceError::NotFileBacked(format!("target group {}", resource.id())))
    }

    fn queue_unload(pool: &ResourcePool, resource: &Arc<Self>) {
        pool.queue(RenderCommand::UnloadTargetGroup(Arc::clone(resource)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::commands::RenderCommandKind;
    use crate::render::gl::VertexFormat;
    use crate::render::snapshot::{RenderSnapshot, RenderSnapshotObserver};
    use crate::resource::formats::solid_png;
    use crate::resource::MemoryFileSystem;
    use crate::foundation::math::Colour;

    const SHADER: &str = r#"(vertex: "void main() {}", fragment: "void main() {}")"#;

    fn pool_with(files: MemoryFileSystem) -> (ResourcePool, Arc<RenderResourceManager>) {
        let manager = Arc::new(RenderResourceManager::new());
        (ResourcePool::new(Arc::new(files), Arc::clone(&manager)), manager)
    }

    fn drain(manager: &RenderResourceManager) -> (Vec<RenderCommandKind>, Vec<RenderCommandKind>) {
        let mut snapshot = RenderSnapshot::new(Resolution::new(1, 1), Colour::BLACK);
        manager.on_render_snapshot(&mut snapshot);
        let frame = snapshot.freeze();
        (
            frame.pre_render_commands.iter().map(RenderCommand::kind).collect(),
            frame.post_render_commands.iter().map(RenderCommand::kind).collect(),
        )
    }

    #[test]
    fn test_load_is_cached_by_source() {
        let files = MemoryFileSystem::new().with_file(StorageLocation::Package, "basic.ron", SHADER);
        let (mut pool, manager) = pool_with(files);

        let first = pool.load::<RenderShader>(StorageLocation::Package, "basic.ron").unwrap();
        let second = pool.load::<RenderShader>(StorageLocation::Package, "basic.ron").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.get_all_resources::<RenderShader>().len(), 1);
        assert_eq!(manager.pending_count(), 1);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let (mut pool, manager) = pool_with(MemoryFileSystem::new());
        let result = pool.load::<RenderTexture>(StorageLocation::Package, "missing.png");
        assert!(matches!(result, Err(ResourceError::NotFound(_))));
        assert!(pool.get_all_resources::<RenderTexture>().is_empty());
        assert_eq!(manager.pending_count(), 0);
    }

    #[test]
    fn test_refresh_reloads_only_file_backed() {
        let files = MemoryFileSystem::new().with_file(StorageLocation::Package, "a.png", solid_png(2, 2, [1, 2, 3, 4]));
        let (mut pool, manager) = pool_with(files);
        let loaded = pool.load::<RenderTexture>(StorageLocation::Package, "a.png").unwrap();
        let _built = pool.create_texture(TextureData {
            resolution: Resolution::new(1, 1),
            format: TextureFormat::Rgba8,
            pixels: Some(vec![0; 4]),
        });
        drain(&manager);

        assert_eq!(pool.refresh_resources::<RenderTexture>().unwrap(), 1);
        assert_eq!(pool.reload_count(), 1);
        let (loads, _) = drain(&manager);
        assert_eq!(loads, vec![RenderCommandKind::LoadTexture]);
        assert_eq!(loaded.header().load_state(), LoadState::Loading);
    }

    #[test]
    fn test_model_and_cubemap_files() {
        let model = "(vertex_format: PositionColour, vertices: [0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0], indices: [0])";
        let cubemap = r#"(faces: ["f.png", "f.png", "f.png", "f.png", "f.png", "f.png"])"#;
        let files = MemoryFileSystem::new()
            .with_file(StorageLocation::Dlc, "point.ron", model)
            .with_file(StorageLocation::Dlc, "sky.ron", cubemap)
            .with_file(StorageLocation::Dlc, "f.png", solid_png(4, 4, [9, 9, 9, 255]));
        let (mut pool, manager) = pool_with(files);

        let model = pool.load::<Model>(StorageLocation::Dlc, "point.ron").unwrap();
        assert_eq!(model.meshes().len(), 1);
        assert_eq!(model.meshes()[0].vertex_format(), VertexFormat::PositionColour);
        pool.load::<RenderCubemap>(StorageLocation::Dlc, "sky.ron").unwrap();

        let (loads, _) = drain(&manager);
        assert_eq!(loads, vec![RenderCommandKind::LoadMesh, RenderCommandKind::LoadCubemap]);
        assert_eq!(pool.refresh_resources::<Model>().unwrap(), 1);
        assert_eq!(pool.refresh_resources::<RenderCubemap>().unwrap(), 1);
    }

    #[test]
    fn test_cubemap_needs_six_faces() {
        let cubemap = r#"(faces: ["f.png", "f.png", "f.png"])"#;
        let files = MemoryFileSystem::new()
            .with_file(StorageLocation::Dlc, "sky.ron", cubemap)
            .with_file(StorageLocation::Dlc, "f.png", solid_png(4, 4, [9, 9, 9, 255]));
        let (mut pool, manager) = pool_with(files);

        let result = pool.load::<RenderCubemap>(StorageLocation::Dlc, "sky.ron");
        assert!(matches!(result, Err(ResourceError::InvalidData(_))));
        assert!(pool.get_all_resources::<RenderCubemap>().is_empty());
        assert_eq!(manager.pending_count(), 0);
    }

    #[test]
    fn test_target_group_loads_after_its_textures() {
        let (mut pool, manager) = pool_with(MemoryFileSystem::new());
        let group = pool.create_target_group(Resolution::new(8, 8), true);
        assert!(group.depth_texture().is_some());
        assert!(!group.uses_depth_renderbuffer());

        let (loads, _) = drain(&manager);
        assert_eq!(
            loads,
            vec![RenderCommandKind::LoadTexture, RenderCommandKind::LoadTexture, RenderCommandKind::LoadTargetGroup]
        );
        assert_eq!(pool.refresh_resources::<RenderTargetGroup>().unwrap(), 0);
    }

    #[test]
    fn test_release_unused_frees_group_then_textures() {
        let (mut pool, manager) = pool_with(MemoryFileSystem::new());
        let group = pool.create_target_group(Resolution::new(8, 8), false);
        drain(&manager);

        assert_eq!(pool.release_unused(), 0);
        drop(group);
        assert_eq!(pool.release_unused(), 1);
        let (_, unloads) = drain(&manager);
        assert_eq!(unloads, vec![RenderCommandKind::UnloadTargetGroup]);

        assert_eq!(pool.release_unused(), 1);
        let (_, unloads) = drain(&manager);
        assert_eq!(unloads, vec![RenderCommandKind::UnloadTexture]);
        assert!(pool.get_all_resources::<RenderTexture>().is_empty());
    }
}
