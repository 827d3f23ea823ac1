//! Operator-defined region of interest.

use serde::{Deserialize, Serialize};

/// Rectangle in full-frame pixel coordinates, corner-ordered
/// (`x1 <= x2`, `y1 <= y2` after [`Roi::from_corners`]).
///
/// The ROI survives session restarts: starting a new capture run never
/// clears it. Rows reported by the pipeline are measured inside the clamped
/// ROI, so changing it mid-session invalidates a previously set reference
/// row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Roi {
    /// Build from two corner points given in any order.
    pub fn from_corners(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Clamp to a `width x height` frame. Returns `None` when the clamped
    /// region is empty; callers fall back to the full frame in that case.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Roi> {
        let x1 = self.x1.min(width);
        let y1 = self.y1.min(height);
        let x2 = self.x2.min(width);
        let y2 = self.y2.min(height);
        if x1 >= x2 || y1 >= y2 {
            return None;
        }
        Some(Roi { x1, y1, x2, y2 })
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_are_normalized() {
        let roi = Roi::from_corners(30, 40, 10, 20);
        assert_eq!(
            roi,
            Roi {
                x1: 10,
                y1: 20,
                x2: 30,
                y2: 40
            }
        );
    }

    #[test]
    fn clamped_region_satisfies_bounds_invariant() {
        let cases = [
            Roi::from_corners(0, 0, 640, 480),
            Roi::from_corners(600, 400, 700, 500),
            Roi::from_corners(10, 10, 20, 20),
            Roi::from_corners(0, 0, 1, 1),
        ];
        for roi in cases {
            if let Some(c) = roi.clamp_to(640, 480) {
                assert!(c.x1 < c.x2 && c.x2 <= 640, "{c:?}");
                assert!(c.y1 < c.y2 && c.y2 <= 480, "{c:?}");
            }
        }
    }

    #[test]
    fn fully_outside_roi_clamps_to_none() {
        let roi = Roi::from_corners(700, 500, 900, 600);
        assert_eq!(roi.clamp_to(640, 480), None);
    }

    #[test]
    fn degenerate_roi_clamps_to_none() {
        let roi = Roi::from_corners(50, 50, 50, 80);
        assert_eq!(roi.clamp_to(640, 480), None);
    }

    #[test]
    fn partial_overlap_is_trimmed() {
        let roi = Roi::from_corners(600, 400, 800, 600);
        let c = roi.clamp_to(640, 480).expect("overlaps the frame");
        assert_eq!(
            c,
            Roi {
                x1: 600,
                y1: 400,
                x2: 640,
                y2: 480
            }
        );
    }
}
