//! Session finalization artifacts.
//!
//! Written by the processing loop after the persistence queue has drained:
//! a tabular CSV with one row per measurement and a JSON summary of the
//! session's counters.

use std::path::Path;

use log::{info, warn};
use serde::Serialize;

use crate::measure::LevelMeasurement;

/// Aggregate counters serialized into `session.json`.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSummary {
    pub frames_captured: u64,
    pub frames_processed: usize,
    pub dropped_frames: u64,
    pub images_written: usize,
    pub write_failures: usize,
    pub calibration: f32,
    pub reference_row: Option<f32>,
}

/// Write `measurements.csv` and `session.json` into `dir`. Individual write
/// failures are logged, not propagated: finalization must not panic the
/// processing thread.
pub(crate) fn write_session_report(
    dir: &Path,
    measurements: &[LevelMeasurement],
    summary: &SessionSummary,
) {
    if measurements.is_empty() {
        info!("no measurements collected; skipping session report");
        return;
    }
    if let Err(err) = write_measurements_csv(dir, measurements) {
        warn!("failed to write measurements.csv: {err}");
    }
    if let Err(err) = write_summary_json(dir, summary) {
        warn!("failed to write session.json: {err}");
    }
    info!(
        "session report written to {} ({} measurements)",
        dir.display(),
        measurements.len()
    );
}

fn write_measurements_csv(
    dir: &Path,
    measurements: &[LevelMeasurement],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_path(dir.join("measurements.csv"))?;
    for measurement in measurements {
        writer.serialize(measurement)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_summary_json(
    dir: &Path,
    summary: &SessionSummary,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(dir.join("session.json"), json)?;
    Ok(())
}
