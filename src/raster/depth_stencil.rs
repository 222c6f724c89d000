//! Fixed-function depth/stencil state and the per-pixel test.
//!
//! [`run_test`] is a pure function of the stored texel, the incoming depth and the state; nothing
//! carries over between pixels.

use crate::pipeline::texture::DepthStencilTexel;

/// Comparison applied as `op(incoming, stored)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    LessThan,
    GreaterThan,
    Equal,
    NotEqual,
    LessThanOrEqual,
    GreaterThanOrEqual,
    #[default]
    Always,
    Never,
}

impl CompareOp {
    pub fn compare<T: PartialOrd>(self, incoming: T, stored: T) -> bool {
        match self {
            Self::LessThan => incoming < stored,
            Self::GreaterThan => incoming > stored,
            Self::Equal => incoming == stored,
            Self::NotEqual => incoming != stored,
            Self::LessThanOrEqual => incoming <= stored,
            Self::GreaterThanOrEqual => incoming >= stored,
            Self::Always => true,
            Self::Never => false,
        }
    }
}

/// Update applied to the stored stencil byte.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StencilOp {
    #[default]
    Keep,
    SetTo0,
    ReplaceWithReference,
    Invert,
    /// Saturates at 255.
    Increment,
    /// Saturates at 0.
    Decrement,
    IncrementWithWrap,
    DecrementWithWrap,
}

impl StencilOp {
    /// New stencil value; only bits set in `write_mask` may change.
    pub fn apply(self, old: u8, reference: u8, write_mask: u8) -> u8 {
        let new = match self {
            Self::Keep => old,
            Self::SetTo0 => 0,
            Self::ReplaceWithReference => reference,
            Self::Invert => !old,
            Self::Increment => old.saturating_add(1),
            Self::Decrement => old.saturating_sub(1),
            Self::IncrementWithWrap => old.wrapping_add(1),
            Self::DecrementWithWrap => old.wrapping_sub(1),
        };
        (old & !write_mask) | (new & write_mask)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DepthTest {
    pub enabled: bool,
    pub compare: CompareOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DepthState {
    pub write_on_pass: bool,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            write_on_pass: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StencilTest {
    pub enabled: bool,
    pub compare: CompareOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StencilState {
    pub reference: u8,
    pub compare_mask: u8,
    pub write_mask: u8,
    pub pass_op: StencilOp,
    pub fail_op: StencilOp,
    pub depth_fail_op: StencilOp,
}

impl Default for StencilState {
    fn default() -> Self {
        Self {
            reference: 0,
            compare_mask: 0xff,
            write_mask: 0xff,
            pass_op: StencilOp::Keep,
            fail_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
        }
    }
}

/// All fixed-function depth/stencil state of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DepthStencilState {
    pub depth_test: DepthTest,
    pub depth: DepthState,
    pub stencil_test: StencilTest,
    pub stencil: StencilState,
}

impl DepthStencilState {
    /// Whether any test needs a depth/stencil attachment.
    pub fn is_enabled(&self) -> bool {
        self.depth_test.enabled || self.stencil_test.enabled
    }
}

/// Result of testing one fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestOutcome {
    pub passed: bool,
    /// Texel to store back, with any depth write and stencil update applied.
    pub texel: DepthStencilTexel,
}

pub fn run_test(
    state: &DepthStencilState,
    stored: DepthStencilTexel,
    incoming_depth: f32,
) -> TestOutcome {
    let depth_passes = || {
        !state.depth_test.enabled || state.depth_test.compare.compare(incoming_depth, stored.depth)
    };

    let mut texel = stored;
    let passed = if state.stencil_test.enabled {
        let s = &state.stencil;
        let reference = s.reference & s.compare_mask;
        let current = stored.stencil & s.compare_mask;
        if state.stencil_test.compare.compare(reference, current) {
            let depth_ok = depth_passes();
            let op = if depth_ok { s.pass_op } else { s.depth_fail_op };
            texel.stencil = op.apply(stored.stencil, s.reference, s.write_mask);
            depth_ok
        } else {
            texel.stencil = s.fail_op.apply(stored.stencil, s.reference, s.write_mask);
            false
        }
    } else {
        depth_passes()
    };

    if passed && state.depth_test.enabled && state.depth.write_on_pass {
        texel.depth = incoming_depth;
    }
    TestOutcome { passed, texel }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/depth_stencil.rs"]
mod tests;
