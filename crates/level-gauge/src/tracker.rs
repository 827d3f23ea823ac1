//! Reference-row bookkeeping and row-to-height conversion.

/// Calibration factors are clamped to this floor; a zero factor would make
/// every height infinite.
pub const MIN_CALIBRATION: f32 = 1e-6;

/// Converts subpixel rows into heights relative to an operator-set
/// reference row.
///
/// Precondition on the camera geometry: a rising surface must move the
/// detected boundary toward *smaller* row indices. The conversion
/// `height = (reference_row - row) / calibration` encodes exactly that and
/// reports positive heights for a rising level.
#[derive(Clone, Debug)]
pub struct LevelTracker {
    reference_row: Option<f32>,
    calibration: f32,
    current_level: f32,
}

impl LevelTracker {
    pub fn new(calibration: f32) -> Self {
        Self {
            reference_row: None,
            calibration: calibration.max(MIN_CALIBRATION),
            current_level: 0.0,
        }
    }

    /// Freeze `row` as the zero-height baseline and reset the level.
    pub fn set_reference(&mut self, row: f32) {
        self.reference_row = Some(row);
        self.current_level = 0.0;
    }

    pub fn reference_row(&self) -> Option<f32> {
        self.reference_row
    }

    /// Height of `row` relative to the reference, rounded to two decimals;
    /// `None` while no reference is set.
    pub fn compute_height(&mut self, row: f32) -> Option<f32> {
        let reference = self.reference_row?;
        let height = round2((reference - row) / self.calibration);
        self.current_level = height;
        Some(height)
    }

    /// Replace the calibration factor, clamped to [`MIN_CALIBRATION`].
    /// Safe to call mid-session; takes effect on the next frame.
    pub fn set_calibration(&mut self, value: f32) {
        self.calibration = value.max(MIN_CALIBRATION);
    }

    pub fn calibration(&self) -> f32 {
        self.calibration
    }

    pub fn current_level(&self) -> f32 {
        self.current_level
    }

    /// Start-of-session reset: clears the reference and the level but keeps
    /// the calibration it was constructed with.
    pub fn reset(&mut self) {
        self.reference_row = None;
        self.current_level = 0.0;
    }
}

fn round2(x: f32) -> f32 {
    (x * 100.0).round() / 100.0
}
