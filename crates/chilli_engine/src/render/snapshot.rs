//! # Render Snapshots
//!
//! A [`RenderSnapshot`] captures everything needed to build one render pass:
//! target, camera, lights, objects and batches, plus the pre/post render
//! command lists that systems append to (resource loads, context restores).
//!
//! Snapshots are filled on the update thread, passed to every
//! [`RenderSnapshotObserver`], then frozen into a [`RenderFrame`] which the
//! compiler turns into a command buffer.

use std::sync::Arc;

use super::commands::{RenderCommand, RenderCommandList};
use super::resources::{MeshData, RenderCubemap, RenderMaterial, RenderMesh, RenderTargetGroup, RenderTexture};
use crate::foundation::math::{Colour, Mat4, Resolution, Vec3};
use crate::render::gl::ClearFlags;

/// Camera matrices for a pass
#[derive(Debug, Clone, PartialEq)]
pub struct RenderCamera {
    /// World to view transform
    pub view: Mat4,
    /// View to clip transform
    pub projection: Mat4,
    /// Camera position in world space
    pub position: Vec3,
}

impl RenderCamera {
    /// Combined view-projection matrix
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

impl Default for RenderCamera {
    fn default() -> Self {
        Self {
            view: Mat4::identity(),
            projection: Mat4::identity(),
            position: Vec3::zeros(),
        }
    }
}

/// Directional light
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    /// Light colour
    pub colour: Colour,
    /// Direction the light travels in
    pub direction: Vec3,
}

/// A static mesh drawn with a material
#[derive(Debug, Clone)]
pub struct RenderObject {
    /// Surface material
    pub material: Arc<RenderMaterial>,
    /// Geometry
    pub mesh: Arc<RenderMesh>,
    /// Object to world transform
    pub world: Mat4,
}

impl RenderObject {
    /// World space position of the object's origin
    pub fn position(&self) -> Vec3 {
        self.world.fixed_view::<3, 1>(0, 3).into_owned()
    }
}

/// Streamed geometry (sprites, text) drawn from the dynamic buffer
#[derive(Debug, Clone)]
pub struct RenderBatch {
    /// Surface material
    pub material: Arc<RenderMaterial>,
    /// Geometry, already in world space
    pub data: MeshData,
}

/// What a pass renders into
#[derive(Debug, Clone, Default)]
pub enum RenderTarget {
    /// The main framebuffer
    #[default]
    Main,
    /// An offscreen target group
    TargetGroup(Arc<RenderTargetGroup>),
}

/// Mutable capture of one pass, filled during the frame
#[derive(Debug)]
pub struct RenderSnapshot {
    target: RenderTarget,
    resolution: Resolution,
    clear_colour: Colour,
    clear_flags: ClearFlags,
    camera: RenderCamera,
    ambient_light: Colour,
    directional_lights: Vec<DirectionalLight>,
    objects: Vec<RenderObject>,
    batches: Vec<RenderBatch>,
    offscreen_passes: Vec<RenderSnapshot>,
    pre_render_commands: RenderCommandList,
    post_render_commands: RenderCommandList,
}

impl RenderSnapshot {
    /// Snapshot of the main target
    pub fn new(resolution: Resolution, clear_colour: Colour) -> Self {
        Self {
            target: RenderTarget::Main,
            resolution,
            clear_colour,
            clear_flags: ClearFlags::all(),
            camera: RenderCamera::default(),
            ambient_light: Colour::BLACK,
            directional_lights: Vec::new(),
            objects: Vec::new(),
            batches: Vec::new(),
            offscreen_passes: Vec::new(),
            pre_render_commands: RenderCommandList::new(),
            post_render_commands: RenderCommandList::new(),
        }
    }

    /// Snapshot of an offscreen target group
    pub fn for_target_group(target_group: Arc<RenderTargetGroup>, clear_colour: Colour) -> Self {
        let resolution = target_group.resolution();
        Self {
            target: RenderTarget::TargetGroup(target_group),
            ..Self::new(resolution, clear_colour)
        }
    }

    /// Whether this is the main target's snapshot
    pub fn is_main_target(&self) -> bool {
        matches!(self.target, RenderTarget::Main)
    }

    /// Render target
    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    /// Target resolution
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Set the buffers cleared at the start of the pass
    pub fn set_clear_flags(&mut self, flags: ClearFlags) {
        self.clear_flags = flags;
    }

    /// Set the camera
    pub fn set_camera(&mut self, camera: RenderCamera) {
        self.camera = camera;
    }

    /// Set the ambient light colour
    pub fn set_ambient_light(&mut self, colour: Colour) {
        self.ambient_light = colour;
    }

    /// Add a directional light
    pub fn add_directional_light(&mut self, light: DirectionalLight) {
        self.directional_lights.push(light);
    }

    /// Add a static mesh instance
    pub fn add_object(&mut self, object: RenderObject) {
        self.objects.push(object);
    }

    /// Add streamed geometry
    pub fn add_batch(&mut self, batch: RenderBatch) {
        self.batches.push(batch);
    }

    /// Add a pass rendered before this one, into a target group
    ///
    /// # Panics
    ///
    /// Panics if called on an offscreen snapshot or with a main target snapshot.
    pub fn add_offscreen_pass(&mut self, pass: Self) {
        assert!(self.is_main_target(), "offscreen passes hang off the main snapshot");
        assert!(!pass.is_main_target(), "an offscreen pass needs a target group");
        self.offscreen_passes.push(pass);
    }

    /// Offscreen passes rendered before this one
    pub fn offscreen_passes_mut(&mut self) -> &mut [Self] {
        &mut self.offscreen_passes
    }

    /// Objects added so far
    pub fn objects(&self) -> &[RenderObject] {
        &self.objects
    }

    /// Commands executed before any pass of the frame
    pub fn pre_render_commands_mut(&mut self) -> &mut RenderCommandList {
        &mut self.pre_render_commands
    }

    /// Commands executed after every pass of the frame
    pub fn post_render_commands_mut(&mut self) -> &mut RenderCommandList {
        &mut self.post_render_commands
    }

    /// Queue a mesh restore ahead of the frame
    pub fn add_restore_mesh_command(&mut self, mesh: Arc<RenderMesh>) {
        self.pre_render_commands.push(RenderCommand::RestoreMesh(mesh));
    }

    /// Queue a texture restore ahead of the frame
    pub fn add_restore_texture_command(&mut self, texture: Arc<RenderTexture>) {
        self.pre_render_commands.push(RenderCommand::RestoreTexture(texture));
    }

    /// Queue a cubemap restore ahead of the frame
    pub fn add_restore_cubemap_command(&mut self, cubemap: Arc<RenderCubemap>) {
        self.pre_render_commands.push(RenderCommand::RestoreCubemap(cubemap));
    }

    /// Queue a target group restore ahead of the frame
    pub fn add_restore_render_target_group_command(&mut self, target_group: Arc<RenderTargetGroup>) {
        self.pre_render_commands.push(RenderCommand::RestoreRenderTargetGroup(target_group));
    }

    /// Freeze the snapshot (and its offscreen passes) into a frame
    ///
    /// Offscreen passes come first, in the order they were added, and their
    /// pre/post render commands are merged in the same order.
    pub fn freeze(mut self) -> RenderFrame {
        let mut frame = RenderFrame::default();
        for pass in std::mem::take(&mut self.offscreen_passes) {
            pass.freeze_into(&mut frame);
        }
        self.freeze_into(&mut frame);
        frame
    }

    fn freeze_into(mut self, frame: &mut RenderFrame) {
        frame.pre_render_commands.extend(self.pre_render_commands.take_commands());
        frame.post_render_commands.extend(self.post_render_commands.take_commands());
        frame.passes.push(FramePass {
            target: self.target,
            resolution: self.resolution,
            clear_colour: self.clear_colour,
            clear_flags: self.clear_flags,
            camera: self.camera,
            ambient_light: self.ambient_light,
            directional_lights: self.directional_lights,
            objects: self.objects,
            batches: self.batches,
        });
    }
}

/// Immutable capture of one pass
#[derive(Debug)]
pub struct FramePass {
    /// Render target
    pub target: RenderTarget,
    /// Viewport size
    pub resolution: Resolution,
    /// Clear colour
    pub clear_colour: Colour,
    /// Buffers cleared at the start of the pass
    pub clear_flags: ClearFlags,
    /// Camera
    pub camera: RenderCamera,
    /// Ambient light colour
    pub ambient_light: Colour,
    /// Directional lights
    pub directional_lights: Vec<DirectionalLight>,
    /// Static mesh instances
    pub objects: Vec<RenderObject>,
    /// Streamed geometry
    pub batches: Vec<RenderBatch>,
}

/// Frozen frame: every pass plus the frame-wide command lists
#[derive(Debug, Default)]
pub struct RenderFrame {
    /// Passes in render order, main target last
    pub passes: Vec<FramePass>,
    /// Commands run before any pass
    pub pre_render_commands: Vec<RenderCommand>,
    /// Commands run after every pass
    pub post_render_commands: Vec<RenderCommand>,
}

/// System notified of every snapshot before it is frozen
///
/// Called once per pass; observers that only care about the frame as a
/// whole check [`RenderSnapshot::is_main_target`].
pub trait RenderSnapshotObserver: Send + Sync {
    /// Inspect or append to a snapshot
    fn on_render_snapshot(&self, snapshot: &mut RenderSnapshot);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::gl::VertexFormat;
    use crate::render::resources::ResourceSource;

    #[test]
    fn test_restore_commands_go_to_pre_render_list() {
        let mut snapshot = RenderSnapshot::new(Resolution::new(4, 4), Colour::BLACK);
        let mesh = RenderMesh::new(ResourceSource::in_memory(), VertexFormat::StaticMesh);
        snapshot.add_restore_mesh_command(mesh);

        let frame = snapshot.freeze();
        assert_eq!(frame.pre_render_commands.len(), 1);
        assert!(frame.post_render_commands.is_empty());
    }

    #[test]
    fn test_offscreen_passes_render_first() {
        let group = RenderTargetGroup::new(Resolution::new(8, 8), None, None, true);
        let mut snapshot = RenderSnapshot::new(Resolution::new(4, 4), Colour::BLACK);
        let mut offscreen = RenderSnapshot::for_target_group(group, Colour::WHITE);
        offscreen.post_render_commands_mut().push(RenderCommand::End);
        snapshot.add_offscreen_pass(offscreen);

        let frame = snapshot.freeze();
        assert_eq!(frame.passes.len(), 2);
        assert!(matches!(frame.passes[0].target, RenderTarget::TargetGroup(_)));
        assert_eq!(frame.passes[0].resolution, Resolution::new(8, 8));
        assert!(matches!(frame.passes[1].target, RenderTarget::Main));
        assert_eq!(frame.post_render_commands.len(), 1);
    }

    #[test]
    fn test_object_position() {
        let shader = crate::render::resources::RenderShader::new(ResourceSource::in_memory());
        let object = RenderObject {
            material: RenderMaterial::new(shader).build(),
            mesh: RenderMesh::new(ResourceSource::in_memory(), VertexFormat::StaticMesh),
            world: Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0)),
        };
        approx::assert_relative_eq!(object.position(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_camera_view_projection_order() {
        let camera = RenderCamera {
            view: Mat4::new_translation(&Vec3::new(0.0, 0.0, -5.0)),
            projection: Mat4::new_scaling(2.0),
            position: Vec3::new(0.0, 0.0, 5.0),
        };
        let origin = camera.view_projection() * crate::foundation::math::Vec4::new(0.0, 0.0, 0.0, 1.0);
        approx::assert_relative_eq!(origin.z, -10.0);
        approx::assert_relative_eq!(origin.w, 1.0);
    }
}
