//! On-page guidance overlay

pub mod geometry;
pub mod session;

pub use geometry::{compute_layout, LabelSide, OverlayLayout, Point, Pointer, Rect, Size};
pub use session::{GuideOverlay, GuideSession};
