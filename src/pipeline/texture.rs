//! Color and depth/stencil images.

use crate::foundation::core::{Extent, Rgba, unorm8_from_f32};
use crate::foundation::error::{GpuError, GpuResult};
use anyhow::Context;
use std::path::Path;

/// Texel format of a color [`Texture`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TextureFormat {
    #[default]
    Rgba8Unorm,
    Rgba32Float,
}

impl TextureFormat {
    pub fn bytes_per_texel(self) -> usize {
        match self {
            Self::Rgba8Unorm => 4,
            Self::Rgba32Float => 16,
        }
    }
}

/// A 2D color image, row-major with the origin at the top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    extent: Extent,
    format: TextureFormat,
    data: Vec<u8>,
}

impl Texture {
    /// A texture cleared to transparent black.
    pub fn new(extent: Extent, format: TextureFormat) -> Self {
        Self {
            extent,
            format,
            data: vec![0; extent.texel_count() * format.bytes_per_texel()],
        }
    }

    /// Wrap tightly packed RGBA8 pixels.
    pub fn from_rgba8(extent: Extent, pixels: Vec<u8>) -> GpuResult<Self> {
        if pixels.len() != extent.texel_count() * 4 {
            return Err(GpuError::validation(format!(
                "{} bytes do not form a {}x{} RGBA8 image",
                pixels.len(),
                extent.width,
                extent.height
            )));
        }
        Ok(Self {
            extent,
            format: TextureFormat::Rgba8Unorm,
            data: pixels,
        })
    }

    /// A texture filled with one color.
    pub fn solid(extent: Extent, format: TextureFormat, color: Rgba) -> Self {
        let mut tex = Self::new(extent, format);
        tex.clear(color);
        tex
    }

    pub fn from_image(img: &image::RgbaImage) -> GpuResult<Self> {
        let (width, height) = img.dimensions();
        Self::from_rgba8(Extent::new(width, height)?, img.as_raw().clone())
    }

    /// Decode an image file into an RGBA8 texture.
    pub fn load(path: &Path) -> GpuResult<Self> {
        let img = image::open(path)
            .with_context(|| format!("decode texture {}", path.display()))?
            .to_rgba8();
        Self::from_image(&img)
    }

    /// RGBA8 copy of this texture; float texels are converted with `round(clamp(c) * 255)`.
    pub fn to_image(&self) -> GpuResult<image::RgbaImage> {
        let pixels = match self.format {
            TextureFormat::Rgba8Unorm => self.data.clone(),
            TextureFormat::Rgba32Float => self
                .data
                .chunks_exact(4)
                .map(|c| unorm8_from_f32(f32::from_le_bytes([c[0], c[1], c[2], c[3]])))
                .collect(),
        };
        image::RgbaImage::from_raw(self.extent.width, self.extent.height, pixels)
            .ok_or_else(|| GpuError::validation("texture data does not match its extent"))
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replace the whole texel payload.
    pub fn upload(&mut self, bytes: &[u8]) -> GpuResult<()> {
        if bytes.len() != self.data.len() {
            return Err(GpuError::validation(format!(
                "texture upload of {} bytes, expected {}",
                bytes.len(),
                self.data.len()
            )));
        }
        self.data.copy_from_slice(bytes);
        Ok(())
    }

    pub fn clear(&mut self, color: Rgba) {
        let texel = self.encode(color);
        for dst in self.data.chunks_exact_mut(texel.len()) {
            dst.copy_from_slice(&texel);
        }
    }

    fn encode(&self, color: Rgba) -> Vec<u8> {
        match self.format {
            TextureFormat::Rgba8Unorm => color.to_unorm8().to_vec(),
            TextureFormat::Rgba32Float => color.0.iter().flat_map(|c| c.to_le_bytes()).collect(),
        }
    }

    fn offset(&self, x: i64, y: i64) -> Option<usize> {
        self.extent
            .index_of(x, y)
            .map(|i| i * self.format.bytes_per_texel())
    }

    /// Texel at `(x, y)`, or `None` outside the texture.
    pub fn read(&self, x: i64, y: i64) -> Option<Rgba> {
        let at = self.offset(x, y)?;
        Some(match self.format {
            TextureFormat::Rgba8Unorm => {
                let p = &self.data[at..at + 4];
                Rgba::from_unorm8([p[0], p[1], p[2], p[3]])
            }
            TextureFormat::Rgba32Float => {
                let mut c = [0f32; 4];
                for (i, v) in c.iter_mut().enumerate() {
                    let b = &self.data[at + i * 4..at + i * 4 + 4];
                    *v = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                }
                Rgba(c)
            }
        })
    }

    /// Store `color` at `(x, y)`; writes outside the texture are dropped.
    pub fn write(&mut self, x: i64, y: i64, color: Rgba) {
        if let Some(at) = self.offset(x, y) {
            let texel = self.encode(color);
            self.data[at..at + texel.len()].copy_from_slice(&texel);
        }
    }

    /// Floor-based nearest-neighbour lookup; coordinates outside `[0, 1)` give opaque black.
    pub fn sample_nearest(&self, uv: [f32; 2]) -> Rgba {
        let x = (f64::from(uv[0]) * f64::from(self.extent.width)).floor();
        let y = (f64::from(uv[1]) * f64::from(self.extent.height)).floor();
        if !x.is_finite() || !y.is_finite() {
            return Rgba::OPAQUE_BLACK;
        }
        self.read(x as i64, y as i64).unwrap_or(Rgba::OPAQUE_BLACK)
    }
}

/// One depth/stencil texel.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DepthStencilTexel {
    pub depth: f32,
    pub stencil: u8,
}

impl Default for DepthStencilTexel {
    fn default() -> Self {
        Self {
            depth: 1.0,
            stencil: 0,
        }
    }
}

/// Combined `f32` depth and `u8` stencil image.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthStencilTexture {
    extent: Extent,
    texels: Vec<DepthStencilTexel>,
}

impl DepthStencilTexture {
    /// Depth 1.0, stencil 0 everywhere.
    pub fn new(extent: Extent) -> Self {
        Self {
            extent,
            texels: vec![DepthStencilTexel::default(); extent.texel_count()],
        }
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Reset depth and/or stencil across the whole image.
    pub fn clear(&mut self, depth: Option<f32>, stencil: Option<u8>) {
        for t in &mut self.texels {
            if let Some(d) = depth {
                t.depth = d;
            }
            if let Some(s) = stencil {
                t.stencil = s;
            }
        }
    }

    pub fn texel(&self, x: i64, y: i64) -> Option<DepthStencilTexel> {
        self.extent.index_of(x, y).map(|i| self.texels[i])
    }

    pub fn set_texel(&mut self, x: i64, y: i64, texel: DepthStencilTexel) {
        if let Some(i) = self.extent.index_of(x, y) {
            self.texels[i] = texel;
        }
    }

    /// Depth as an 8-bit grayscale image (0.0 black, 1.0 white).
    pub fn depth_image(&self) -> GpuResult<image::GrayImage> {
        let pixels = self
            .texels
            .iter()
            .map(|t| unorm8_from_f32(t.depth))
            .collect();
        image::GrayImage::from_raw(self.extent.width, self.extent.height, pixels)
            .ok_or_else(|| GpuError::validation("depth data does not match its extent"))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/texture.rs"]
mod tests;
