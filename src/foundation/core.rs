use crate::foundation::error::{GpuError, GpuResult};

/// Width and height of a 2D image in texels.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
pub struct Extent {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
}

impl Extent {
    /// Create a validated, non-empty extent.
    pub fn new(width: u32, height: u32) -> GpuResult<Self> {
        if width == 0 || height == 0 {
            return Err(GpuError::validation("extent must be non-zero"));
        }
        Ok(Self { width, height })
    }

    /// Number of texels covered.
    pub fn texel_count(self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }

    /// Row-major texel index, or `None` when `(x, y)` is outside the extent.
    pub fn index_of(self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }
}

/// Straight-alpha floating point color, as produced by fragment programs.
#[derive(Clone, Copy, Debug, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Rgba(pub [f32; 4]);

impl Rgba {
    /// Opaque black, the value returned for out-of-bounds texture samples.
    pub const OPAQUE_BLACK: Self = Self([0.0, 0.0, 0.0, 1.0]);
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self([0.0, 0.0, 0.0, 0.0]);

    /// Convert to 8-bit unorm channels using `round(clamp(c, 0, 1) * 255)`.
    pub fn to_unorm8(self) -> [u8; 4] {
        self.0.map(unorm8_from_f32)
    }

    /// Expand 8-bit unorm channels into `[0, 1]` floats.
    pub fn from_unorm8(px: [u8; 4]) -> Self {
        Self(px.map(|c| f32::from(c) / 255.0))
    }
}

pub(crate) fn unorm8_from_f32(c: f32) -> u8 {
    // NaN clamps to 0.
    let c = if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) };
    (c * 255.0).round() as u8
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
