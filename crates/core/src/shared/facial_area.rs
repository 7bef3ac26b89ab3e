use serde::{Deserialize, Serialize};

/// Face bounding box in source-image pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacialArea {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl FacialArea {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Area in pixels; degenerate boxes count as zero.
    pub fn area(&self) -> i64 {
        self.w.max(0) as i64 * self.h.max(0) as i64
    }

    /// Grows the box by `padding` (fraction of width/height) on every side
    /// and clamps it to the frame.
    ///
    /// Returns `None` when nothing of the padded box lies inside the frame.
    pub fn padded(&self, padding: f64, frame_w: u32, frame_h: u32) -> Option<FacialArea> {
        if self.w <= 0 || self.h <= 0 {
            return None;
        }
        // i64 so boxes near the i32 limits cannot overflow.
        let (x, y, w, h) = (
            i64::from(self.x),
            i64::from(self.y),
            i64::from(self.w),
            i64::from(self.h),
        );
        let pad_x = (w as f64 * padding).round() as i64;
        let pad_y = (h as f64 * padding).round() as i64;

        let x1 = (x - pad_x).max(0);
        let y1 = (y - pad_y).max(0);
        let x2 = (x + w + pad_x).min(i64::from(frame_w));
        let y2 = (y + h + pad_y).min(i64::from(frame_h));

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(FacialArea::new(
            i32::try_from(x1).ok()?,
            i32::try_from(y1).ok()?,
            i32::try_from(x2 - x1).ok()?,
            i32::try_from(y2 - y1).ok()?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_area() {
        assert_eq!(FacialArea::new(0, 0, 10, 20).area(), 200);
    }

    #[rstest]
    #[case::zero_width(FacialArea::new(0, 0, 0, 10))]
    #[case::negative_height(FacialArea::new(0, 0, 10, -5))]
    fn test_area_degenerate(#[case] area: FacialArea) {
        assert_eq!(area.area(), 0);
    }

    #[test]
    fn test_padded_grows_symmetrically() {
        // 20% of 50 = 10 px per side
        let area = FacialArea::new(100, 100, 50, 50);
        let padded = area.padded(0.2, 1000, 1000).unwrap();
        assert_eq!(padded, FacialArea::new(90, 90, 70, 70));
    }

    #[test]
    fn test_padded_clamps_to_frame() {
        let area = FacialArea::new(0, 0, 50, 50);
        let padded = area.padded(0.2, 55, 200).unwrap();
        assert_eq!(padded, FacialArea::new(0, 0, 55, 60));
    }

    #[test]
    fn test_padded_zero_padding_is_identity() {
        let area = FacialArea::new(5, 6, 7, 8);
        assert_eq!(area.padded(0.0, 100, 100), Some(area));
    }

    #[test]
    fn test_padded_outside_frame_is_none() {
        let area = FacialArea::new(500, 500, 20, 20);
        assert_eq!(area.padded(0.2, 100, 100), None);
    }

    #[rstest]
    #[case::right_edge(FacialArea::new(i32::MAX - 5, 0, 100, 100))]
    #[case::bottom_edge(FacialArea::new(0, i32::MAX, i32::MAX, i32::MAX))]
    #[case::left_edge(FacialArea::new(i32::MIN, i32::MIN, 10, 10))]
    fn test_padded_extreme_box_is_none(#[case] area: FacialArea) {
        assert_eq!(area.padded(0.2, 10, 10), None);
    }

    #[test]
    fn test_padded_huge_box_clamps_to_frame() {
        let area = FacialArea::new(-5, -5, i32::MAX, i32::MAX);
        assert_eq!(area.padded(1.0, 10, 10), Some(FacialArea::new(0, 0, 10, 10)));
    }

    #[test]
    fn test_padded_degenerate_is_none() {
        assert_eq!(FacialArea::new(10, 10, 0, 10).padded(0.2, 100, 100), None);
    }

    #[test]
    fn test_serde_uses_short_field_names() {
        let json = serde_json::to_value(FacialArea::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, serde_json::json!({"x": 1, "y": 2, "w": 3, "h": 4}));
    }
}
