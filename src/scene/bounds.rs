use crate::foundation::core::Rect;

/// Visibility of a node's bounding box against its clip area.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OutOfBounds {
    /// Overlaps the clip area; drawn.
    #[default]
    InBounds,
    /// Outside the clip area but inside the margin. Not drawn, resources stay demanded.
    WithinMargin,
    /// Outside the clip area and its margin. The subtree is skipped.
    Outside,
}

impl OutOfBounds {
    /// Whether the node keeps its resources demanded.
    pub fn is_active(self) -> bool {
        !matches!(self, OutOfBounds::Outside)
    }
}

fn overlaps(a: Rect, b: Rect) -> bool {
    a.x0 < b.x1 && a.x1 > b.x0 && a.y0 < b.y1 && a.y1 > b.y0
}

/// Grow `r` by `[left, top, right, bottom]`.
pub(crate) fn inflate(r: Rect, margin: [f64; 4]) -> Rect {
    Rect::new(
        r.x0 - margin[0],
        r.y0 - margin[1],
        r.x1 + margin[2],
        r.y1 + margin[3],
    )
}

/// Classify `bbox` against `clip`, allowing `margin` pixels of slack for pre-activation.
pub(crate) fn classify(bbox: Rect, clip: Rect, margin: [f64; 4]) -> OutOfBounds {
    if overlaps(bbox, clip) {
        OutOfBounds::InBounds
    } else if overlaps(bbox, inflate(clip, margin)) {
        OutOfBounds::WithinMargin
    } else {
        OutOfBounds::Outside
    }
}

/// Intersection of two rects, collapsed to an empty rect at `a`'s origin when disjoint.
pub(crate) fn intersect(a: Rect, b: Rect) -> Rect {
    let r = a.intersect(b);
    if r.width() <= 0.0 || r.height() <= 0.0 {
        Rect::new(r.x0, r.y0, r.x0, r.y0)
    } else {
        r
    }
}
