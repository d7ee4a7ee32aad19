//! On-disk resource formats
//!
//! - Textures: PNG or JPEG, decoded to RGBA8
//! - Shaders: RON `(vertex: "...", fragment: "...")`
//! - Models: RON `(vertex_format: StaticMesh, vertices: [..], indices: [..])`,
//!   vertices as interleaved floats
//! - Cubemaps: RON `(faces: ["px.png", "nx.png", ...])`, face images in the
//!   same storage location, ordered +X, -X, +Y, -Y, +Z, -Z

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{ResourceError, ResourceResult};
use crate::foundation::math::Resolution;
use crate::render::gl::{TextureFormat, VertexFormat};
use crate::render::resources::{MeshData, TextureData};

/// Shader source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderFile {
    /// Vertex stage source
    pub vertex: String,
    /// Fragment stage source
    pub fragment: String,
}

/// Model file holding a single mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    /// Vertex layout
    pub vertex_format: VertexFormat,
    /// Interleaved vertex attributes
    pub vertices: Vec<f32>,
    /// Triangle indices
    #[serde(default)]
    pub indices: Vec<u16>,
}

impl ModelFile {
    /// Validate and convert to uploadable mesh data
    pub fn into_mesh_data(self) -> ResourceResult<MeshData> {
        let vertices: Vec<u8> = bytemuck::cast_slice(&self.vertices).to_vec();
        let stride = self.vertex_format.stride();
        if vertices.is_empty() || vertices.len() % stride != 0 {
            return Err(ResourceError::InvalidData(format!(
                "{} vertex floats do not form whole {:?} vertices",
                self.vertices.len(),
                self.vertex_format
            )));
        }
        let vertex_count = vertices.len() / stride;
        if let Some(index) = self.indices.iter().find(|&&index| usize::from(index) >= vertex_count) {
            return Err(ResourceError::InvalidData(format!(
                "index {} out of range for {} vertices",
                index, vertex_count
            )));
        }
        Ok(MeshData { vertex_format: self.vertex_format, vertices, indices: self.indices })
    }
}

/// Cubemap description file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CubemapFile {
    /// Six face images relative to the cubemap's storage location, in
    /// `+X, -X, +Y, -Y, +Z, -Z` order
    pub faces: Vec<PathBuf>,
}

/// Parse a RON resource file
pub fn parse_ron<T: for<'de> Deserialize<'de>>(path: &Path, text: &str) -> ResourceResult<T> {
    ron::from_str(text).map_err(|e| ResourceError::Parse(format!("{}: {}", path.display(), e)))
}

/// Decode a PNG or JPEG into RGBA8 texture data
pub fn decode_image(bytes: &[u8]) -> ResourceResult<TextureData> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    log::debug!("Decoded image {}x{}", width, height);
    Ok(TextureData {
        resolution: Resolution::new(width, height),
        format: TextureFormat::Rgba8,
        pixels: Some(rgba.into_raw()),
    })
}

/// Encode a solid colour PNG
#[cfg(test)]
pub(crate) fn solid_png(width: u32, height: u32, colour: [u8; 4]) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba(colour));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image.write_to(&mut bytes, image::ImageFormat::Png).expect("encode png");
    bytes.into_inner()
}
