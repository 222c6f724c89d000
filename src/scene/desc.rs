use crate::foundation::core::Rgba;
use crate::foundation::error::GpuResult;
use crate::pipeline::linker::VertexLayout;
use crate::pipeline::texture::TextureFormat;
use crate::raster::command::PipelineState;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// One indexed draw described in JSON.
///
/// Vertex data is a flat list of `f32`s laid out according to `layout`, or tightly packed by
/// location when `layout` is omitted.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scene {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub format: TextureFormat,
    #[serde(default = "opaque_black")]
    pub clear_color: Rgba,
    #[serde(default = "far_depth")]
    pub clear_depth: f32,
    #[serde(default)]
    pub clear_stencil: u8,
    #[serde(default)]
    pub pipeline: PipelineState,
    pub vertices: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<VertexLayout>,
    pub indices: Vec<u32>,
    #[serde(default)]
    pub uniforms: Vec<UniformData>,
    #[serde(default)]
    pub textures: Vec<TextureBinding>,
}

fn opaque_black() -> Rgba {
    Rgba::OPAQUE_BLACK
}

fn far_depth() -> f32 {
    1.0
}

/// Contents of one uniform block, as `f32`s.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UniformData {
    #[serde(default)]
    pub set: u32,
    pub binding: u32,
    pub data: Vec<f32>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextureBinding {
    #[serde(default)]
    pub set: u32,
    pub binding: u32,
    pub source: TextureSpec,
}

/// Where a bound texture's texels come from.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TextureSpec {
    /// Image file, relative to the scene file.
    Path { path: PathBuf },
    /// A constant color.
    Solid {
        color: Rgba,
        #[serde(default = "one")]
        width: u32,
        #[serde(default = "one")]
        height: u32,
    },
}

fn one() -> u32 {
    1
}

impl Scene {
    pub fn from_json(json: &str) -> GpuResult<Self> {
        let scene = serde_json::from_str(json).context("parse scene JSON")?;
        Ok(scene)
    }

    pub fn load(path: &Path) -> GpuResult<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("read scene '{}'", path.display()))?;
        Self::from_json(&json)
    }
}
