/// Barycentric weights of screen-space points relative to one triangle.
///
/// Weights are `λ1 = cross(p - p0, p2 - p0) / area`, `λ2 = cross(p1 - p0, p - p0) / area` and
/// `λ0 = 1 - λ1 - λ2`, evaluated in `f64`. Both windings produce non-negative weights inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeEvaluator {
    origin: [f64; 2],
    e1: [f64; 2],
    e2: [f64; 2],
    inv_area: f64,
}

impl EdgeEvaluator {
    /// `None` for triangles with zero (or non-finite) screen area.
    pub fn new(p0: [f64; 2], p1: [f64; 2], p2: [f64; 2]) -> Option<Self> {
        let e1 = [p1[0] - p0[0], p1[1] - p0[1]];
        let e2 = [p2[0] - p0[0], p2[1] - p0[1]];
        let area = e1[0] * e2[1] - e1[1] * e2[0];
        if area == 0.0 || !area.is_finite() {
            return None;
        }
        Some(Self {
            origin: p0,
            e1,
            e2,
            inv_area: 1.0 / area,
        })
    }

    pub fn weights(&self, p: [f64; 2]) -> [f64; 3] {
        let d = [p[0] - self.origin[0], p[1] - self.origin[1]];
        let l1 = (d[0] * self.e2[1] - d[1] * self.e2[0]) * self.inv_area;
        let l2 = (self.e1[0] * d[1] - self.e1[1] * d[0]) * self.inv_area;
        [1.0 - l1 - l2, l1, l2]
    }

    /// Weights for every `x` on scanline `y`, reusing the per-row terms.
    pub fn row(&self, y: f64, xs: impl IntoIterator<Item = f64>, out: &mut Vec<[f64; 3]>) {
        out.clear();
        let dy = y - self.origin[1];
        let l1_row = -dy * self.e2[0];
        let l2_row = self.e1[0] * dy;
        for x in xs {
            let dx = x - self.origin[0];
            let l1 = (dx * self.e2[1] + l1_row) * self.inv_area;
            let l2 = (l2_row - self.e1[1] * dx) * self.inv_area;
            out.push([1.0 - l1 - l2, l1, l2]);
        }
    }

    pub fn inside(weights: [f64; 3]) -> bool {
        weights.iter().all(|w| *w >= 0.0)
    }
}

/// Perspective-correct screen-space weights.
///
/// Returns the corrected weights and `Σ bᵢ/wᵢ` (the interpolated `1/w`). A weight of exactly one
/// is returned unchanged so values at a corner stay bit-exact.
pub fn perspective_correct(weights: [f64; 3], inv_w: [f64; 3]) -> ([f32; 3], f64) {
    let one_over_w = weights[0] * inv_w[0] + weights[1] * inv_w[1] + weights[2] * inv_w[2];
    if weights.contains(&1.0) {
        return (weights.map(|w| w as f32), one_over_w);
    }
    let w = 1.0 / one_over_w;
    let corrected = [
        weights[0] * inv_w[0] * w,
        weights[1] * inv_w[1] * w,
        weights[2] * inv_w[2] * w,
    ];
    (corrected.map(|c| c as f32), one_over_w)
}

#[cfg(test)]
#[path = "../../tests/unit/raster/barycentric.rs"]
mod tests;
