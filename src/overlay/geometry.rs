//! Overlay geometry
//!
//! Pure functions computing where the highlight ring, label and pointer go
//! for a target box inside a viewport. Nothing here touches the page.

use crate::config::OverlayConfig;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in viewport pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn from_edges(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn center(&self) -> Point {
        Point {
            x: (self.left + self.right()) / 2.0,
            y: (self.top + self.bottom()) / 2.0,
        }
    }

    /// Area shared by `self` and `other`, zero when they do not intersect
    pub fn overlap_area(&self, other: &Rect) -> f64 {
        let x1 = self.left.max(other.left);
        let y1 = self.top.max(other.top);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        (x2 - x1).max(0.0) * (y2 - y1).max(0.0)
    }

    /// Grow the box by `pad` on every side, without crossing the viewport origin
    pub fn padded(&self, pad: f64) -> Rect {
        Rect {
            left: (self.left - pad).max(0.0),
            top: (self.top - pad).max(0.0),
            width: (self.width + pad * 2.0).max(0.0),
            height: (self.height + pad * 2.0).max(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Candidate label positions, in tie-breaking order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelSide {
    Right,
    Left,
    Below,
    Above,
}

impl LabelSide {
    pub const ALL: [LabelSide; 4] = [
        LabelSide::Right,
        LabelSide::Left,
        LabelSide::Below,
        LabelSide::Above,
    ];
}

/// Connecting pointer: origin, rendered length and rotation in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pointer {
    pub start: Point,
    pub end: Point,
    pub length: f64,
    pub angle_deg: f64,
}

/// Everything the page needs to draw one overlay frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayLayout {
    /// Highlight ring, also the hole punched into the backdrop
    pub highlight: Rect,
    pub label: Rect,
    pub label_side: LabelSide,
    pub pointer: Pointer,
}

/// `v` limited to `[lo, hi]`; `lo` wins when the range is empty
fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    lo.max(hi.min(v))
}

fn candidate_origin(side: LabelSide, target: &Rect, label: Size, viewport: Size, cfg: &OverlayConfig) -> Point {
    let inset = cfg.viewport_inset;
    let margin = cfg.label_margin;
    let y_clamped = clamp(target.top, inset, viewport.height - label.height - inset);
    let x_clamped = clamp(target.left, inset, viewport.width - label.width - inset);
    match side {
        LabelSide::Right => Point {
            x: target.right() + margin,
            y: y_clamped,
        },
        LabelSide::Left => Point {
            x: target.left - margin - label.width,
            y: y_clamped,
        },
        LabelSide::Below => Point {
            x: x_clamped,
            y: target.bottom() + margin,
        },
        LabelSide::Above => Point {
            x: x_clamped,
            y: target.top - margin - label.height,
        },
    }
}

/// Penalty of a label box: overflow past the inset viewport weighs 1000 per
/// pixel, overlap with the target 10 per square pixel
pub fn placement_penalty(label: &Rect, target: &Rect, viewport: Size, inset: f64) -> f64 {
    let out_x = (inset - label.left).max(0.0) + (label.right() - (viewport.width - inset)).max(0.0);
    let out_y =
        (inset - label.top).max(0.0) + (label.bottom() - (viewport.height - inset)).max(0.0);
    (out_x + out_y) * 1000.0 + label.overlap_area(target) * 10.0
}

/// Pick the label position with the lowest penalty and clamp it into the
/// inset viewport
pub fn place_label(
    target: &Rect,
    label: Size,
    viewport: Size,
    cfg: &OverlayConfig,
) -> (LabelSide, Point) {
    let mut best = (
        LabelSide::Right,
        candidate_origin(LabelSide::Right, target, label, viewport, cfg),
    );
    let mut best_penalty = f64::INFINITY;

    for side in LabelSide::ALL {
        let origin = candidate_origin(side, target, label, viewport, cfg);
        let rect = Rect::new(origin.x, origin.y, label.width, label.height);
        let penalty = placement_penalty(&rect, target, viewport, cfg.viewport_inset);
        if penalty < best_penalty {
            best_penalty = penalty;
            best = (side, origin);
        }
    }

    let inset = cfg.viewport_inset;
    let (side, origin) = best;
    (
        side,
        Point {
            x: clamp(origin.x, inset, viewport.width - label.width - inset),
            y: clamp(origin.y, inset, viewport.height - label.height - inset),
        },
    )
}

/// Where a ray from the center of `rect` along `(ux, uy)` leaves the box
pub fn boundary_point(rect: &Rect, ux: f64, uy: f64) -> Point {
    let c = rect.center();
    let hx = rect.width / 2.0;
    let hy = rect.height / 2.0;

    let ax = ux.abs().max(1e-6);
    let ay = uy.abs().max(1e-6);
    let t = (hx / ax).min(hy / ay);

    Point {
        x: c.x + ux * t,
        y: c.y + uy * t,
    }
}

/// Pointer from the label's edge to the highlighted target's edge
pub fn pointer_between(label: &Rect, target: &Rect, min_length: f64) -> Pointer {
    let from = label.center();
    let to = target.center();
    let vx = to.x - from.x;
    let vy = to.y - from.y;
    let len = match vx.hypot(vy) {
        l if l == 0.0 => 1.0,
        l => l,
    };
    let ux = vx / len;
    let uy = vy / len;

    let start = boundary_point(label, ux, uy);
    let end = boundary_point(target, -ux, -uy);

    let dx = end.x - start.x;
    let dy = end.y - start.y;

    Pointer {
        start,
        end,
        length: dx.hypot(dy).max(min_length),
        angle_deg: dy.atan2(dx).to_degrees(),
    }
}

/// Full overlay layout for an element box (unpadded) in the given viewport
pub fn compute_layout(element: &Rect, viewport: Size, cfg: &OverlayConfig) -> OverlayLayout {
    let highlight = element.padded(cfg.highlight_padding);
    let label_size = Size {
        width: cfg.label_width,
        height: cfg.label_height,
    };
    let (label_side, origin) = place_label(element, label_size, viewport, cfg);
    let label = Rect::new(origin.x, origin.y, label_size.width, label_size.height);
    let pointer = pointer_between(&label, &highlight, cfg.min_pointer_length);

    OverlayLayout {
        highlight,
        label,
        label_side,
        pointer,
    }
}
