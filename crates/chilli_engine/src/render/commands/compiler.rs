//! Frame → command buffer compilation
//!
//! Per pass the compiler emits:
//!
//! ```text
//! Begin | BeginWithTargetGroup
//! ApplyCamera, ApplyAmbientLight, ApplyDirectionalLight*
//! opaque objects, sorted by (material, mesh)     ApplyMaterial? ApplyMesh? RenderInstance
//! transparent objects, sorted back to front      ApplyMaterial? ApplyMesh? RenderInstance
//! batches                                        ApplyMaterial? ApplyMeshBatch RenderInstance
//! End
//! ```
//!
//! `ApplyMaterial` and `ApplyMesh` are only emitted when they change from the
//! previous instance, so sorting directly reduces state changes.

use std::cmp::Ordering;
use std::sync::Arc;

use super::buffer::{RenderCommandBuffer, RenderCommandList};
use super::command::RenderCommand;
use crate::foundation::math::{Mat4, Vec3};
use crate::render::resources::{RenderMaterial, RenderMesh, ResourceId};
use crate::render::snapshot::{FramePass, RenderFrame, RenderObject, RenderTarget};

/// Tracks the last applied material and mesh within a pass
#[derive(Default)]
struct AppliedState {
    material: Option<ResourceId>,
    mesh: Option<ResourceId>,
}

impl AppliedState {
    fn apply_material(&mut self, list: &mut RenderCommandList, material: &Arc<RenderMaterial>) {
        if self.material != Some(material.id()) {
            self.material = Some(material.id());
            list.push(RenderCommand::ApplyMaterial(Arc::clone(material)));
        }
    }

    fn apply_mesh(&mut self, list: &mut RenderCommandList, mesh: &Arc<RenderMesh>) {
        if self.mesh != Some(mesh.id()) {
            self.mesh = Some(mesh.id());
            list.push(RenderCommand::ApplyMesh(Arc::clone(mesh)));
        }
    }

    fn forget_mesh(&mut self) {
        self.mesh = None;
    }
}

/// Turns frozen frames into sealed command buffers
#[derive(Debug, Default)]
pub struct RenderCommandCompiler;

impl RenderCommandCompiler {
    /// Create a compiler
    pub fn new() -> Self {
        Self
    }

    /// Fill `buffer` from `frame` and seal it
    ///
    /// `carried` commands (resource commands salvaged from dropped frames)
    /// run first, ahead of the frame's own pre-render commands.
    pub fn compile(&self, frame: RenderFrame, carried: Vec<RenderCommand>, buffer: &mut RenderCommandBuffer) {
        buffer.reset(frame.passes.len());

        let pre_render = buffer.pre_render_list_mut();
        pre_render.extend(carried);
        pre_render.extend(frame.pre_render_commands);

        for (index, pass) in frame.passes.into_iter().enumerate() {
            Self::compile_pass(pass, buffer.pass_list_mut(index));
        }

        buffer.post_render_list_mut().extend(frame.post_render_commands);
        buffer.seal();
        log::trace!("Compiled frame into {} commands", buffer.command_count());
    }

    fn compile_pass(pass: FramePass, list: &mut RenderCommandList) {
        match pass.target {
            RenderTarget::Main => list.push(RenderCommand::Begin {
                resolution: pass.resolution,
                clear_colour: pass.clear_colour,
                clear_flags: pass.clear_flags,
            }),
            RenderTarget::TargetGroup(target_group) => list.push(RenderCommand::BeginWithTargetGroup {
                target_group,
                clear_colour: pass.clear_colour,
                clear_flags: pass.clear_flags,
            }),
        }

        let camera_position = pass.camera.position;
        list.push(RenderCommand::ApplyCamera(pass.camera));
        list.push(RenderCommand::ApplyAmbientLight(pass.ambient_light));
        for light in pass.directional_lights {
            list.push(RenderCommand::ApplyDirectionalLight(light));
        }

        let (mut opaque, mut transparent): (Vec<RenderObject>, Vec<RenderObject>) =
            pass.objects.into_iter().partition(|object| !object.material.is_transparent());
        opaque.sort_by_key(|object| (object.material.id(), object.mesh.id()));
        transparent.sort_by(|a, b| Self::back_to_front(a, b, &camera_position));

        let mut applied = AppliedState::default();
        for object in opaque.iter().chain(&transparent) {
            applied.apply_material(list, &object.material);
            applied.apply_mesh(list, &object.mesh);
            list.push(RenderCommand::RenderInstance { world: object.world });
        }

        for batch in pass.batches {
            applied.apply_material(list, &batch.material);
            applied.forget_mesh();
            list.push(RenderCommand::ApplyMeshBatch(batch.data));
            list.push(RenderCommand::RenderInstance { world: Mat4::identity() });
        }

        list.push(RenderCommand::End);
    }

    fn back_to_front(a: &RenderObject, b: &RenderObject, camera: &Vec3) -> Ordering {
        let distance_a = (a.position() - camera).norm_squared();
        let distance_b = (b.position() - camera).norm_squared();
        distance_b.total_cmp(&distance_a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Colour, Resolution};
    use crate::render::commands::RenderCommandKind;
    use crate::render::gl::VertexFormat;
    use crate::render::resources::{MeshData, RenderShader, ResourceSource};
    use crate::render::snapshot::{RenderBatch, RenderSnapshot};

    fn kinds(list: &RenderCommandList) -> Vec<RenderCommandKind> {
        list.commands().iter().map(RenderCommand::kind).collect()
    }

    fn mesh() -> Arc<RenderMesh> {
        RenderMesh::new(ResourceSource::in_memory(), VertexFormat::StaticMesh)
    }

    fn material(transparent: bool) -> Arc<RenderMaterial> {
        RenderMaterial::new(RenderShader::new(ResourceSource::in_memory()))
            .with_transparency(transparent)
            .build()
    }

    fn object(material: &Arc<RenderMaterial>, mesh: &Arc<RenderMesh>, z: f32) -> RenderObject {
        RenderObject {
            material: Arc::clone(material),
            mesh: Arc::clone(mesh),
            world: Mat4::new_translation(&Vec3::new(0.0, 0.0, z)),
        }
    }

    fn compile(snapshot: RenderSnapshot, carried: Vec<RenderCommand>) -> RenderCommandBuffer {
        let mut buffer = RenderCommandBuffer::new(0);
        RenderCommandCompiler::new().compile(snapshot.freeze(), carried, &mut buffer);
        buffer
    }

    #[test]
    fn test_state_changes_only_on_change() {
        let (material_a, material_b) = (material(false), material(false));
        let (mesh_a, mesh_b) = (mesh(), mesh());
        let mut snapshot = RenderSnapshot::new(Resolution::new(4, 4), Colour::BLACK);
        snapshot.add_object(object(&material_b, &mesh_a, 0.0));
        snapshot.add_object(object(&material_a, &mesh_b, 0.0));
        snapshot.add_object(object(&material_a, &mesh_a, 0.0));
        snapshot.add_object(object(&material_a, &mesh_a, 1.0));

        let mut buffer = compile(snapshot, Vec::new());
        use RenderCommandKind::*;
        assert_eq!(
            kinds(buffer.pass_list_mut(0)),
            vec![
                Begin,
                ApplyCamera,
                ApplyAmbientLight,
                ApplyMaterial,
                ApplyMesh,
                RenderInstance,
                RenderInstance,
                ApplyMesh,
                RenderInstance,
                ApplyMaterial,
                ApplyMesh,
                RenderInstance,
                End,
            ]
        );
    }

    #[test]
    fn test_transparent_sorted_back_to_front_after_opaque() {
        let opaque = material(false);
        let glass = material(true);
        let shared_mesh = mesh();
        let mut snapshot = RenderSnapshot::new(Resolution::new(4, 4), Colour::BLACK);
        snapshot.add_object(object(&glass, &shared_mesh, 1.0));
        snapshot.add_object(object(&glass, &shared_mesh, 10.0));
        snapshot.add_object(object(&opaque, &shared_mesh, 5.0));

        let mut buffer = compile(snapshot, Vec::new());
        let depths: Vec<f32> = buffer
            .pass_list_mut(0)
            .commands()
            .iter()
            .filter_map(|command| match command {
                RenderCommand::RenderInstance { world } => Some(world[(2, 3)]),
                _ => None,
            })
            .collect();
        assert_eq!(depths, vec![5.0, 10.0, 1.0]);
    }

    #[test]
    fn test_pre_render_ordering() {
        let restore_target = mesh();
        let carried_target = mesh();
        let mut snapshot = RenderSnapshot::new(Resolution::new(4, 4), Colour::BLACK);
        snapshot.add_restore_mesh_command(restore_target);

        let mut buffer = compile(snapshot, vec![RenderCommand::UnloadMesh(carried_target)]);
        assert_eq!(
            kinds(buffer.pre_render_list_mut()),
            vec![RenderCommandKind::UnloadMesh, RenderCommandKind::RestoreMesh]
        );
        assert!(buffer.is_sealed());
    }

    #[test]
    fn test_batches_follow_objects() {
        let sprite_material = material(true);
        let mut snapshot = RenderSnapshot::new(Resolution::new(4, 4), Colour::BLACK);
        snapshot.add_batch(RenderBatch {
            material: Arc::clone(&sprite_material),
            data: MeshData { vertex_format: VertexFormat::Sprite, vertices: vec![0; 24 * 4], indices: vec![0, 1, 2] },
        });

        let mut buffer = compile(snapshot, Vec::new());
        let kinds = kinds(buffer.pass_list_mut(0));
        assert_eq!(
            kinds[3..],
            [
                RenderCommandKind::ApplyMaterial,
                RenderCommandKind::ApplyMeshBatch,
                RenderCommandKind::RenderInstance,
                RenderCommandKind::End
            ]
        );
    }
}
