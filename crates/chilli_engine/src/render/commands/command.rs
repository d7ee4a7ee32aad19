//! Discrete GPU operations
//!
//! A [`RenderCommand`] is built on the update thread and executed on the
//! render thread. Commands are immutable once constructed and owned by the
//! list that holds them; resources are referenced through `Arc` so a command
//! stays valid however long it waits in a queued frame.

use std::sync::Arc;

use crate::foundation::math::{Colour, Mat4, Resolution};
use crate::render::gl::ClearFlags;
use crate::render::resources::{
    CubemapData, MeshData, RenderCubemap, RenderMaterial, RenderMesh, RenderShader, RenderTargetGroup,
    RenderTexture, TextureData,
};
use crate::render::snapshot::{DirectionalLight, RenderCamera};

/// One GPU operation
#[derive(Debug)]
pub enum RenderCommand {
    /// Compile a shader into the resource's backend slot
    LoadShader {
        /// Target resource
        shader: Arc<RenderShader>,
        /// Vertex stage source
        vertex_source: String,
        /// Fragment stage source
        fragment_source: String,
    },
    /// Delete a shader's program
    UnloadShader(Arc<RenderShader>),

    /// Upload a texture
    LoadTexture {
        /// Target resource
        texture: Arc<RenderTexture>,
        /// Image to upload
        data: TextureData,
    },
    /// Delete a texture
    UnloadTexture(Arc<RenderTexture>),

    /// Upload a cubemap
    LoadCubemap {
        /// Target resource
        cubemap: Arc<RenderCubemap>,
        /// Faces to upload
        data: CubemapData,
    },
    /// Delete a cubemap
    UnloadCubemap(Arc<RenderCubemap>),

    /// Upload a mesh
    LoadMesh {
        /// Target resource
        mesh: Arc<RenderMesh>,
        /// Geometry to upload
        data: MeshData,
    },
    /// Delete a mesh's buffers
    UnloadMesh(Arc<RenderMesh>),

    /// Build a framebuffer around the group's attachment textures
    LoadTargetGroup(Arc<RenderTargetGroup>),
    /// Delete a framebuffer
    UnloadTargetGroup(Arc<RenderTargetGroup>),

    /// Recreate a mesh from its retained backup after context loss
    RestoreMesh(Arc<RenderMesh>),
    /// Recreate a texture after context loss
    RestoreTexture(Arc<RenderTexture>),
    /// Recreate a cubemap from its retained backup after context loss
    RestoreCubemap(Arc<RenderCubemap>),
    /// Rebuild a framebuffer after context loss
    RestoreRenderTargetGroup(Arc<RenderTargetGroup>),

    /// Start a pass on the main framebuffer
    Begin {
        /// Viewport size
        resolution: Resolution,
        /// Clear colour
        clear_colour: Colour,
        /// Buffers to clear
        clear_flags: ClearFlags,
    },
    /// Start a pass rendering into a target group
    BeginWithTargetGroup {
        /// Target to render into
        target_group: Arc<RenderTargetGroup>,
        /// Clear colour
        clear_colour: Colour,
        /// Buffers to clear
        clear_flags: ClearFlags,
    },
    /// Set the view and projection used by following instances
    ApplyCamera(RenderCamera),
    /// Set the ambient light colour
    ApplyAmbientLight(Colour),
    /// Add a directional light to the pass
    ApplyDirectionalLight(DirectionalLight),
    /// Bind a material's shader and textures
    ApplyMaterial(Arc<RenderMaterial>),
    /// Bind a static mesh as the current geometry
    ApplyMesh(Arc<RenderMesh>),
    /// Stream batched geometry into the dynamic buffer and make it current
    ApplyMeshBatch(MeshData),
    /// Draw the current geometry with a world transform
    RenderInstance {
        /// Object to world transform
        world: Mat4,
    },
    /// Finish the pass
    End,
}

/// Fieldless mirror of [`RenderCommand`] for logging and assertions
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderCommandKind {
    LoadShader,
    UnloadShader,
    LoadTexture,
    UnloadTexture,
    LoadCubemap,
    UnloadCubemap,
    LoadMesh,
    UnloadMesh,
    LoadTargetGroup,
    UnloadTargetGroup,
    RestoreMesh,
    RestoreTexture,
    RestoreCubemap,
    RestoreRenderTargetGroup,
    Begin,
    BeginWithTargetGroup,
    ApplyCamera,
    ApplyAmbientLight,
    ApplyDirectionalLight,
    ApplyMaterial,
    ApplyMesh,
    ApplyMeshBatch,
    RenderInstance,
    End,
}

impl RenderCommand {
    /// Kind of the command
    pub fn kind(&self) -> RenderCommandKind {
        match self {
            Self::LoadShader { .. } => RenderCommandKind::LoadShader,
            Self::UnloadShader(_) => RenderCommandKind::UnloadShader,
            Self::LoadTexture { .. } => RenderCommandKind::LoadTexture,
            Self::UnloadTexture(_) => RenderCommandKind::UnloadTexture,
            Self::LoadCubemap { .. } => RenderCommandKind::LoadCubemap,
            Self::UnloadCubemap(_) => RenderCommandKind::UnloadCubemap,
            Self::LoadMesh { .. } => RenderCommandKind::LoadMesh,
            Self::UnloadMesh(_) => RenderCommandKind::UnloadMesh,
            Self::LoadTargetGroup(_) => RenderCommandKind::LoadTargetGroup,
            Self::UnloadTargetGroup(_) => RenderCommandKind::UnloadTargetGroup,
            Self::RestoreMesh(_) => RenderCommandKind::RestoreMesh,
            Self::RestoreTexture(_) => RenderCommandKind::RestoreTexture,
            Self::RestoreCubemap(_) => RenderCommandKind::RestoreCubemap,
            Self::RestoreRenderTargetGroup(_) => RenderCommandKind::RestoreRenderTargetGroup,
            Self::Begin { .. } => RenderCommandKind::Begin,
            Self::BeginWithTargetGroup { .. } => RenderCommandKind::BeginWithTargetGroup,
            Self::ApplyCamera(_) => RenderCommandKind::ApplyCamera,
            Self::ApplyAmbientLight(_) => RenderCommandKind::ApplyAmbientLight,
            Self::ApplyDirectionalLight(_) => RenderCommandKind::ApplyDirectionalLight,
            Self::ApplyMaterial(_) => RenderCommandKind::ApplyMaterial,
            Self::ApplyMesh(_) => RenderCommandKind::ApplyMesh,
            Self::ApplyMeshBatch(_) => RenderCommandKind::ApplyMeshBatch,
            Self::RenderInstance { .. } => RenderCommandKind::RenderInstance,
            Self::End => RenderCommandKind::End,
        }
    }

    /// Whether the command creates a GPU resource
    pub fn is_load_command(&self) -> bool {
        matches!(
            self,
            Self::LoadShader { .. }
                | Self::LoadTexture { .. }
                | Self::LoadCubemap { .. }
                | Self::LoadMesh { .. }
                | Self::LoadTargetGroup(_)
        )
    }

    /// Whether the command deletes a GPU resource
    pub fn is_unload_command(&self) -> bool {
        matches!(
            self,
            Self::UnloadShader(_)
                | Self::UnloadTexture(_)
                | Self::UnloadCubemap(_)
                | Self::UnloadMesh(_)
                | Self::UnloadTargetGroup(_)
        )
    }

    /// Whether the command loads or unloads a resource
    ///
    /// Resource commands must survive frames dropped during a suspend,
    /// otherwise resources would never be created or would leak.
    pub fn is_resource_command(&self) -> bool {
        self.is_load_command() || self.is_unload_command()
    }
}
