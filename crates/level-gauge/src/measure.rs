//! Per-frame measurement records.

use std::path::PathBuf;

use serde::Serialize;

/// One row of the session's result log, appended exactly once per processed
/// frame, in frame order.
#[derive(Clone, Debug, Serialize)]
pub struct LevelMeasurement {
    /// Capture index of the frame (1-based).
    pub frame_number: u64,
    /// Local time-of-day stamp, `HH_MM_SS_micros`, shared with the persisted
    /// boundary image name.
    pub timestamp: String,
    /// Subpixel row of the dominant boundary inside the processed region.
    pub subpixel_row: f32,
    /// Height relative to the reference row; absent until a reference is
    /// set. Absent stays absent in the record even where a report plots it
    /// as zero.
    pub height: Option<f32>,
    /// Wall-clock cost of detection + localization for this frame.
    pub processing_secs: f64,
    /// Sliding-window throughput sampled when this frame completed.
    pub fps: f32,
    /// Destination of the persisted boundary-strength image.
    pub image_path: PathBuf,
}
