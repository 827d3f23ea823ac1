//! Liquid level measurement from live video.
//!
//! A [`LevelGauge`] session reads frames from a camera or a video file,
//! detects the liquid boundary with the spectral detector from
//! [`level_gauge_core`], localizes it to a subpixel row, and converts the
//! displacement from an operator-set reference row into a physical height.
//! Capture and processing run as independently paced loops over a single
//! latest-frame slot; boundary images are persisted through an unbounded
//! background queue that never drops a computed result.
//!
//! ## Quickstart
//!
//! ```no_run
//! use level_gauge::{LevelGauge, SessionOptions, SourceSpec, StartOutcome};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let gauge = LevelGauge::with_defaults();
//! # #[cfg(feature = "capture")]
//! # {
//! let outcome = gauge.start(&SourceSpec::parse("0"), SessionOptions::default())?;
//! assert_eq!(outcome, StartOutcome::Started);
//! # }
//!
//! // ... once frames are flowing:
//! gauge.set_reference()?;
//! println!("level: {}", gauge.stats().level);
//! gauge.stop();
//! # Ok(())
//! # }
//! ```
//!
//! The camera must look at the surface so that a rising level moves the
//! detected boundary toward smaller row indices; see [`LevelTracker`].

mod error;
mod fps;
mod measure;
mod persist;
mod report;
mod roi;
mod session;
mod source;
mod tracker;

pub use error::{ControlError, StartError, StartOutcome};
pub use fps::FpsWindow;
pub use measure::LevelMeasurement;
pub use report::SessionSummary;
pub use roi::Roi;
pub use session::{GaugeStats, LevelGauge, LightingSettings, SessionOptions, DEFAULT_TARGET_FPS};
pub use source::{find_fallback_video, FrameSequenceSource, FrameSource, SourceSpec};
#[cfg(feature = "capture")]
pub use source::VideoCaptureSource;
pub use tracker::{LevelTracker, MIN_CALIBRATION};

pub use level_gauge_core as core;
