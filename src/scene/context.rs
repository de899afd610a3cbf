use crate::foundation::core::{Affine, Point, Rect};

/// 2D affine transform plus accumulated opacity.
///
/// Points map as `x' = ta*x + tb*y + px` and `y' = tc*x + td*y + py`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineContext {
    pub alpha: f64,
    pub px: f64,
    pub py: f64,
    pub ta: f64,
    pub tb: f64,
    pub tc: f64,
    pub td: f64,
}

impl Default for AffineContext {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AffineContext {
    pub const IDENTITY: AffineContext = AffineContext {
        alpha: 1.0,
        px: 0.0,
        py: 0.0,
        ta: 1.0,
        tb: 0.0,
        tc: 0.0,
        td: 1.0,
    };

    pub fn is_identity(&self) -> bool {
        self.alpha == 1.0
            && self.px == 0.0
            && self.py == 0.0
            && self.ta == 1.0
            && self.td == 1.0
            && self.tb == 0.0
            && self.tc == 0.0
    }

    /// No rotation or skew: the linear part is diagonal.
    pub fn is_square(&self) -> bool {
        self.tb == 0.0 && self.tc == 0.0
    }

    pub fn to_affine(&self) -> Affine {
        Affine::new([self.ta, self.tc, self.tb, self.td, self.px, self.py])
    }

    pub fn apply(&self, x: f64, y: f64) -> Point {
        Point::new(
            self.ta * x + self.tb * y + self.px,
            self.tc * x + self.td * y + self.py,
        )
    }

    /// Corners of the `w x h` box in top-left, top-right, bottom-right, bottom-left order.
    pub fn corners(&self, w: f64, h: f64) -> [Point; 4] {
        [
            Point::new(self.px, self.py),
            Point::new(self.px + w * self.ta, self.py + w * self.tc),
            Point::new(
                self.px + w * self.ta + h * self.tb,
                self.py + w * self.tc + h * self.td,
            ),
            Point::new(self.px + h * self.tb, self.py + h * self.td),
        ]
    }

    /// Axis-aligned bounds of the transformed `w x h` box.
    pub fn bbox(&self, w: f64, h: f64) -> Rect {
        if self.is_square() {
            let x1 = self.px + w * self.ta;
            let y1 = self.py + h * self.td;
            return Rect::new(
                self.px.min(x1),
                self.py.min(y1),
                self.px.max(x1),
                self.py.max(y1),
            );
        }
        let c = self.corners(w, h);
        let mut r = Rect::from_points(c[0], c[1]);
        r = r.union_pt(c[2]);
        r.union_pt(c[3])
    }

    /// `self ⊗ local`: place `local` (expressed in this context's space) into this context.
    ///
    /// The alpha of the result is `self.alpha * local.alpha`.
    pub fn compose(&self, local: &AffineContext) -> AffineContext {
        let mut out = AffineContext {
            alpha: self.alpha * local.alpha,
            px: self.px + local.px * self.ta,
            py: self.py + local.py * self.td,
            ta: local.ta * self.ta,
            tb: local.td * self.tb,
            tc: local.ta * self.tc,
            td: local.td * self.td,
        };
        if self.tb != 0.0 {
            out.px += local.py * self.tb;
        }
        if self.tc != 0.0 {
            out.py += local.px * self.tc;
        }
        if !local.is_square() {
            out.ta += local.tc * self.tb;
            out.tb += local.tb * self.ta;
            out.tc += local.tc * self.td;
            out.td += local.tb * self.tc;
        }
        out
    }
}

/// Local transform inputs of a node, before composition with its parent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct LocalTransform {
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) scale_x: f64,
    pub(crate) scale_y: f64,
    pub(crate) rotation: f64,
    pub(crate) pivot_x: f64,
    pub(crate) pivot_y: f64,
    pub(crate) mount_x: f64,
    pub(crate) mount_y: f64,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            pivot_x: 0.5,
            pivot_y: 0.5,
            mount_x: 0.0,
            mount_y: 0.0,
        }
    }
}

impl LocalTransform {
    /// Resolve into a local context for a `w x h` node with opacity `alpha`.
    ///
    /// Scale and rotation act around the pivot; the mount point shifts the node by a fraction
    /// of its own size.
    pub(crate) fn to_context(&self, w: f64, h: f64, alpha: f64) -> AffineContext {
        let (ta, tb, tc, td) = if self.rotation != 0.0 {
            let (s, c) = self.rotation.sin_cos();
            (c * self.scale_x, -s * self.scale_y, s * self.scale_x, c * self.scale_y)
        } else {
            (self.scale_x, 0.0, 0.0, self.scale_y)
        };

        let pw = self.pivot_x * w;
        let ph = self.pivot_y * h;
        let px = self.x - (pw * ta + ph * tb) + pw - self.mount_x * w;
        let py = self.y - (pw * tc + ph * td) + ph - self.mount_y * h;

        AffineContext {
            alpha,
            px,
            py,
            ta,
            tb,
            tc,
            td,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/context.rs"]
mod tests;
