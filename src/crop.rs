//! Cropping policy: turn a measured body box into a capture plan

use serde::Deserialize;
use std::fmt;

/// Rectangle reported by the browser for the `<body>` element, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// A box counts only if both sides are positive and finite.
    pub fn is_measurable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Region of the page handed to the capture call
///
/// The origin is always the page's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// What to capture once the page has rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePlan {
    /// Capture exactly this region
    Clip(ClipRegion),
    /// Capture the whole scrollable document
    FullPage,
}

impl fmt::Display for CapturePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapturePlan::Clip(c) => write!(f, "clip {}x{}", c.width, c.height),
            CapturePlan::FullPage => write!(f, "full page"),
        }
    }
}

/// Decide what to capture from the measured body box.
///
/// A measurable box is clipped from (0,0) with its sides rounded up, so the
/// last partial pixel row/column is kept. Anything else (no box, zero or
/// negative area) falls back to a full-page capture.
pub fn plan_capture(bbox: Option<BoundingBox>) -> CapturePlan {
    match bbox {
        Some(b) if b.is_measurable() => CapturePlan::Clip(ClipRegion {
            x: 0,
            y: 0,
            width: ceil_px(b.width),
            height: ceil_px(b.height),
        }),
        _ => CapturePlan::FullPage,
    }
}

fn ceil_px(v: f64) -> u32 {
    v.ceil().min(u32::MAX as f64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f64, y: f64, width: f64, height: f64) -> Option<BoundingBox> {
        Some(BoundingBox { x, y, width, height })
    }

    #[test]
    fn test_measurable_box_is_clipped_from_origin() {
        let plan = plan_capture(bbox(8.0, 8.0, 1264.0, 301.0));
        assert_eq!(
            plan,
            CapturePlan::Clip(ClipRegion { x: 0, y: 0, width: 1264, height: 301 })
        );
    }

    #[test]
    fn test_fractional_sides_round_up() {
        let plan = plan_capture(bbox(0.0, 0.0, 319.2, 40.01));
        assert_eq!(
            plan,
            CapturePlan::Clip(ClipRegion { x: 0, y: 0, width: 320, height: 41 })
        );
    }

    #[test]
    fn test_degenerate_boxes_fall_back_to_full_page() {
        assert_eq!(plan_capture(None), CapturePlan::FullPage);
        assert_eq!(plan_capture(bbox(0.0, 0.0, 0.0, 0.0)), CapturePlan::FullPage);
        assert_eq!(plan_capture(bbox(0.0, 0.0, 1280.0, 0.0)), CapturePlan::FullPage);
        assert_eq!(plan_capture(bbox(0.0, 0.0, 0.0, 500.0)), CapturePlan::FullPage);
        assert_eq!(plan_capture(bbox(0.0, 0.0, -3.0, 10.0)), CapturePlan::FullPage);
        assert_eq!(plan_capture(bbox(0.0, 0.0, f64::NAN, 10.0)), CapturePlan::FullPage);
    }

    #[test]
    fn test_bounding_box_deserializes_from_dom_rect_json() {
        let b: BoundingBox =
            serde_json::from_str(r#"{"x": 0, "y": 0, "width": 640.5, "height": 12}"#).unwrap();
        assert!(b.is_measurable());
        assert_eq!(b.width, 640.5);
    }

    #[test]
    fn test_plan_display() {
        let clip = plan_capture(bbox(0.0, 0.0, 100.0, 50.0));
        assert_eq!(clip.to_string(), "clip 100x50");
        assert_eq!(CapturePlan::FullPage.to_string(), "full page");
    }
}
