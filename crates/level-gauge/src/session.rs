//! Caller-owned measurement session: capture, processing, persistence.
//!
//! Three threads cooperate over shared state: a paced capture loop, an
//! unpaced processing loop, and a persistence worker. The only structure
//! shared between capture and processing is the latest-frame slot, guarded
//! by a mutex held just long enough to swap the frame out; all heavy work
//! happens outside the lock. Cancellation is cooperative: both loops check
//! the running flag at the top of each iteration and always complete the
//! iteration in flight.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Timelike;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use log::{debug, info, warn};

use level_gauge_core::{
    equalize_rgb_in_place, locate_subpixel_row, BoundaryDetector, ClaheParams, DetectorParams,
    ImageF32, RgbView,
};

use crate::error::{ControlError, StartError, StartOutcome};
use crate::fps::FpsWindow;
use crate::measure::LevelMeasurement;
use crate::persist::{PersistenceCounters, PersistenceQueue, PersistenceTask};
use crate::report::{self, SessionSummary};
use crate::roi::Roi;
use crate::source::FrameSource;
#[cfg(feature = "capture")]
use crate::source::{find_fallback_video, SourceSpec, VideoCaptureSource};
use crate::tracker::LevelTracker;

/// Capture pacing used when a caller passes a non-positive rate.
pub const DEFAULT_TARGET_FPS: f32 = 30.0;

/// Options applied when a session starts.
#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Row units per height unit; clamped to the tracker's floor.
    pub calibration: f32,
    /// Root directory for boundary images and reports.
    pub output_dir: PathBuf,
    /// Capture pacing target, frames per second.
    pub target_fps: f32,
    /// Folder searched for videos when a camera cannot be opened.
    pub fallback_dir: PathBuf,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            calibration: 1.0,
            output_dir: PathBuf::from("session_output"),
            target_fps: DEFAULT_TARGET_FPS,
            fallback_dir: PathBuf::from("uploaded_videos"),
        }
    }
}

/// Runtime-adjustable lighting normalization settings.
#[derive(Clone, Copy, Debug, Default)]
pub struct LightingSettings {
    pub enabled: bool,
    pub clahe: ClaheParams,
}

/// Snapshot of the session's counters, safe to take while the loops run.
#[derive(Clone, Debug, serde::Serialize)]
pub struct GaugeStats {
    pub level: f32,
    pub fps: f32,
    pub processing_secs: f64,
    pub frame_count: u64,
    pub dropped_frames: u64,
    pub running: bool,
}

struct CapturedFrame {
    index: u64,
    image: RgbImage,
}

#[derive(Default)]
struct FrameSlot {
    clean: Option<CapturedFrame>,
    display: Option<RgbImage>,
}

struct Control {
    roi: Option<Roi>,
    tracker: LevelTracker,
    lighting: LightingSettings,
    target_fps: f32,
    last_row: Option<f32>,
}

struct Metrics {
    fps_window: FpsWindow,
    current_fps: f32,
    processing_secs: f64,
}

struct Shared {
    running: AtomicBool,
    finished: AtomicBool,
    frame_count: AtomicU64,
    dropped_frames: AtomicU64,
    slot: Mutex<FrameSlot>,
    control: Mutex<Control>,
    metrics: Mutex<Metrics>,
    measurements: Mutex<Vec<LevelMeasurement>>,
    persistence: Arc<PersistenceCounters>,
}

/// A liquid-level measurement session.
///
/// One gauge instance can run any number of consecutive capture sessions;
/// the ROI and lighting settings survive restarts, per-session counters do
/// not. All control methods are safe to call concurrently with the running
/// loops.
pub struct LevelGauge {
    shared: Arc<Shared>,
    detector_params: DetectorParams,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl LevelGauge {
    pub fn new(detector_params: DetectorParams) -> Self {
        let shared = Shared {
            running: AtomicBool::new(false),
            finished: AtomicBool::new(true),
            frame_count: AtomicU64::new(0),
            dropped_frames: AtomicU64::new(0),
            slot: Mutex::new(FrameSlot::default()),
            control: Mutex::new(Control {
                roi: None,
                tracker: LevelTracker::new(1.0),
                lighting: LightingSettings::default(),
                target_fps: DEFAULT_TARGET_FPS,
                last_row: None,
            }),
            metrics: Mutex::new(Metrics {
                fps_window: FpsWindow::new(),
                current_fps: 0.0,
                processing_secs: 0.0,
            }),
            measurements: Mutex::new(Vec::new()),
            persistence: Arc::new(PersistenceCounters::default()),
        };
        Self {
            shared: Arc::new(shared),
            detector_params,
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DetectorParams::default())
    }

    /// Open `spec` and launch the pipeline. A camera that cannot be opened
    /// falls back to the first video in `opts.fallback_dir`; a file that
    /// cannot be opened fails directly. No-op when already running.
    #[cfg(feature = "capture")]
    pub fn start(
        &self,
        spec: &SourceSpec,
        opts: SessionOptions,
    ) -> Result<StartOutcome, StartError> {
        if self.shared.running.load(Ordering::SeqCst) {
            return Ok(StartOutcome::AlreadyRunning);
        }
        let source = open_capture_source(spec, &opts.fallback_dir)?;
        self.start_with_source(source, opts)
    }

    /// Launch the pipeline over an already-open frame source.
    pub fn start_with_source(
        &self,
        source: Box<dyn FrameSource>,
        opts: SessionOptions,
    ) -> Result<StartOutcome, StartError> {
        let mut workers = self.workers.lock().unwrap();
        if self.shared.running.load(Ordering::SeqCst) {
            return Ok(StartOutcome::AlreadyRunning);
        }
        // A previous run may still be finalizing; it observed the cleared
        // running flag, so it finishes on its own. Reap it before reusing
        // the shared state.
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
        if self
            .shared
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let images_dir = opts.output_dir.join("processed");
        if let Err(err) = std::fs::create_dir_all(&images_dir) {
            self.shared.running.store(false, Ordering::SeqCst);
            return Err(StartError::OutputUnavailable {
                path: images_dir,
                source: err,
            });
        }

        // Per-session counters reset; ROI and lighting persist.
        self.shared.finished.store(false, Ordering::SeqCst);
        self.shared.frame_count.store(0, Ordering::SeqCst);
        self.shared.dropped_frames.store(0, Ordering::SeqCst);
        self.shared.persistence.reset();
        *self.shared.slot.lock().unwrap() = FrameSlot::default();
        self.shared.measurements.lock().unwrap().clear();
        {
            let mut metrics = self.shared.metrics.lock().unwrap();
            metrics.fps_window.clear();
            metrics.current_fps = 0.0;
            metrics.processing_secs = 0.0;
        }
        {
            let mut control = self.shared.control.lock().unwrap();
            control.tracker = LevelTracker::new(opts.calibration);
            control.last_row = None;
            control.target_fps = sanitize_fps(opts.target_fps);
        }

        let capture_shared = self.shared.clone();
        workers.push(thread::spawn(move || capture_loop(capture_shared, source)));

        let processing_shared = self.shared.clone();
        let detector = BoundaryDetector::new(self.detector_params.clone());
        workers.push(thread::spawn(move || {
            processing_loop(processing_shared, detector, opts)
        }));

        info!("measurement session started");
        Ok(StartOutcome::Started)
    }

    /// Signal the pipeline to stop. Does not join the background threads:
    /// the processing loop drains the persistence queue and finalizes the
    /// session on its own exit path.
    pub fn stop(&self) {
        if self.shared.running.swap(false, Ordering::SeqCst) {
            info!("session stop requested");
        }
    }

    /// Freeze the most recent subpixel row as the zero-height reference.
    /// Fails, leaving all state unchanged, when no frame has been processed
    /// yet.
    pub fn set_reference(&self) -> Result<(), ControlError> {
        let mut control = self.shared.control.lock().unwrap();
        match control.last_row {
            Some(row) => {
                control.tracker.set_reference(row);
                info!("reference row set to {row:.3}");
                Ok(())
            }
            None => Err(ControlError::NoFrameProcessed),
        }
    }

    /// Replace the calibration factor; effective on the next frame.
    pub fn set_calibration(&self, value: f32) {
        self.shared.control.lock().unwrap().tracker.set_calibration(value);
    }

    pub fn set_roi(&self, x1: u32, y1: u32, x2: u32, y2: u32) {
        let roi = Roi::from_corners(x1, y1, x2, y2);
        info!("ROI set to {roi:?}");
        self.shared.control.lock().unwrap().roi = Some(roi);
    }

    pub fn clear_roi(&self) {
        info!("ROI cleared; processing the full frame");
        self.shared.control.lock().unwrap().roi = None;
    }

    pub fn roi(&self) -> Option<Roi> {
        self.shared.control.lock().unwrap().roi
    }

    /// Adjust the capture pacing; non-positive values fall back to
    /// [`DEFAULT_TARGET_FPS`].
    pub fn set_target_fps(&self, fps: f32) {
        self.shared.control.lock().unwrap().target_fps = sanitize_fps(fps);
    }

    pub fn target_fps(&self) -> f32 {
        self.shared.control.lock().unwrap().target_fps
    }

    /// Enable or disable CLAHE-style lighting normalization on captured
    /// frames.
    pub fn set_lighting(&self, enabled: bool, clip_limit: f32) {
        let mut control = self.shared.control.lock().unwrap();
        control.lighting.enabled = enabled;
        control.lighting.clahe = ClaheParams {
            clip_limit,
            ..control.lighting.clahe
        };
    }

    pub fn lighting(&self) -> LightingSettings {
        self.shared.control.lock().unwrap().lighting
    }

    /// Counter snapshot; the FPS value counts processing completions in the
    /// trailing one-second window at call time.
    pub fn stats(&self) -> GaugeStats {
        let level = self.shared.control.lock().unwrap().tracker.current_level();
        let (fps, processing_secs) = {
            let mut metrics = self.shared.metrics.lock().unwrap();
            (metrics.fps_window.rate(Instant::now()), metrics.processing_secs)
        };
        GaugeStats {
            level,
            fps,
            processing_secs,
            frame_count: self.shared.frame_count.load(Ordering::SeqCst),
            dropped_frames: self.shared.dropped_frames.load(Ordering::SeqCst),
            running: self.shared.running.load(Ordering::SeqCst),
        }
    }

    /// Latest display-annotated frame, if any has been captured.
    pub fn latest_frame(&self) -> Option<RgbImage> {
        self.shared.slot.lock().unwrap().display.clone()
    }

    /// Copy of the session's result log, in frame order.
    pub fn measurements(&self) -> Vec<LevelMeasurement> {
        self.shared.measurements.lock().unwrap().clone()
    }

    /// Boundary images written to disk so far.
    pub fn images_written(&self) -> usize {
        self.shared.persistence.completed.load(Ordering::SeqCst)
    }

    pub fn write_failures(&self) -> usize {
        self.shared.persistence.failed.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Block until the processing loop has drained the persistence queue
    /// and written the session report, or until `timeout` elapses.
    pub fn wait_until_finished(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.shared.finished.load(Ordering::SeqCst) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        self.shared.finished.load(Ordering::SeqCst)
    }
}

impl Drop for LevelGauge {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Ok(mut workers) = self.workers.lock() {
            for handle in workers.drain(..) {
                let _ = handle.join();
            }
        }
    }
}

fn sanitize_fps(fps: f32) -> f32 {
    if fps > 0.0 {
        fps
    } else {
        DEFAULT_TARGET_FPS
    }
}

fn capture_loop(shared: Arc<Shared>, mut source: Box<dyn FrameSource>) {
    debug!("capture loop running");
    while shared.running.load(Ordering::SeqCst) {
        let Some(mut frame) = source.read_frame() else {
            info!("video source ended; stopping pipeline");
            shared.running.store(false, Ordering::SeqCst);
            break;
        };

        let (lighting, roi, target_fps) = {
            let control = shared.control.lock().unwrap();
            (control.lighting, control.roi, control.target_fps)
        };

        if lighting.enabled {
            let (w, h) = frame.dimensions();
            equalize_rgb_in_place(
                frame.as_flat_samples_mut().samples,
                w as usize,
                h as usize,
                &lighting.clahe,
            );
        }

        let index = shared.frame_count.fetch_add(1, Ordering::SeqCst) + 1;

        // The display copy gets the ROI overlay; drawing must never touch
        // the clean copy that processing sees.
        let mut display = frame.clone();
        if let Some(roi) = roi {
            draw_roi_overlay(&mut display, roi);
        }

        {
            let mut slot = shared.slot.lock().unwrap();
            if slot.clean.take().is_some() {
                shared.dropped_frames.fetch_add(1, Ordering::SeqCst);
            }
            slot.clean = Some(CapturedFrame { index, image: frame });
            slot.display = Some(display);
        }

        thread::sleep(Duration::from_secs_f64(1.0 / f64::from(sanitize_fps(target_fps))));
    }
    debug!("capture loop exited");
}

fn processing_loop(shared: Arc<Shared>, detector: BoundaryDetector, opts: SessionOptions) {
    let queue = PersistenceQueue::spawn(shared.persistence.clone());
    let images_dir = opts.output_dir.join("processed");
    debug!("processing loop running");

    while shared.running.load(Ordering::SeqCst) {
        let taken = shared.slot.lock().unwrap().clean.take();
        let Some(CapturedFrame { index, image }) = taken else {
            thread::sleep(Duration::from_millis(2));
            continue;
        };

        let started = Instant::now();
        let roi = shared.control.lock().unwrap().roi;
        let region = extract_region(image, roi);
        let view = RgbView {
            width: region.width() as usize,
            height: region.height() as usize,
            data: region.as_raw(),
        };
        let boundary = detector.detect(view);
        let row = locate_subpixel_row(&boundary.values);
        let processing_secs = started.elapsed().as_secs_f64();

        let completed = Instant::now();
        let fps = {
            let mut metrics = shared.metrics.lock().unwrap();
            metrics.fps_window.record(completed);
            let fps = metrics.fps_window.rate(completed);
            metrics.current_fps = fps;
            metrics.processing_secs = processing_secs;
            fps
        };

        let height = {
            let mut control = shared.control.lock().unwrap();
            control.last_row = Some(row);
            control.tracker.compute_height(row)
        };

        let timestamp = time_of_day_stamp();
        let image_path = images_dir.join(format!("frame_{index}_{timestamp}.png"));
        match encode_boundary_png(&boundary.values) {
            Ok(bytes) => queue.enqueue(PersistenceTask {
                path: image_path.clone(),
                bytes,
            }),
            Err(err) => warn!("failed to encode boundary image for frame {index}: {err}"),
        }

        shared.measurements.lock().unwrap().push(LevelMeasurement {
            frame_number: index,
            timestamp,
            subpixel_row: row,
            height,
            processing_secs,
            fps,
            image_path,
        });
    }

    // Every enqueued image must be on disk before the session finalizes.
    queue.shutdown();
    finalize_session(&shared, &opts.output_dir);
    shared.finished.store(true, Ordering::SeqCst);
    debug!("processing loop exited");
}

/// Clamped-ROI crop; a degenerate region silently falls back to the full
/// frame.
fn extract_region(frame: RgbImage, roi: Option<Roi>) -> RgbImage {
    let (w, h) = frame.dimensions();
    if let Some(roi) = roi {
        if let Some(c) = roi.clamp_to(w, h) {
            return image::imageops::crop_imm(&frame, c.x1, c.y1, c.width(), c.height())
                .to_image();
        }
        debug!("ROI clamps to an empty region; processing the full frame");
    }
    frame
}

fn draw_roi_overlay(display: &mut RgbImage, roi: Roi) {
    let (w, h) = display.dimensions();
    let Some(c) = roi.clamp_to(w, h) else {
        return;
    };
    draw_hollow_rect_mut(
        display,
        Rect::at(c.x1 as i32, c.y1 as i32).of_size(c.width(), c.height()),
        Rgb([0, 255, 0]),
    );
}

fn finalize_session(shared: &Arc<Shared>, output_dir: &Path) {
    let measurements = shared.measurements.lock().unwrap().clone();
    let (calibration, reference_row) = {
        let control = shared.control.lock().unwrap();
        (control.tracker.calibration(), control.tracker.reference_row())
    };
    let summary = SessionSummary {
        frames_captured: shared.frame_count.load(Ordering::SeqCst),
        frames_processed: measurements.len(),
        dropped_frames: shared.dropped_frames.load(Ordering::SeqCst),
        images_written: shared.persistence.completed.load(Ordering::SeqCst),
        write_failures: shared.persistence.failed.load(Ordering::SeqCst),
        calibration,
        reference_row,
    };
    report::write_session_report(output_dir, &measurements, &summary);
}

fn time_of_day_stamp() -> String {
    let now = chrono::Local::now();
    format!("{}_{:06}", now.format("%H_%M_%S"), now.nanosecond() / 1000)
}

fn encode_boundary_png(map: &ImageF32) -> Result<Vec<u8>, image::ImageError> {
    let mut gray = image::GrayImage::new(map.width as u32, map.height as u32);
    for (x, y, px) in gray.enumerate_pixels_mut() {
        px.0[0] = (map.get(x as usize, y as usize) * 255.0)
            .round()
            .clamp(0.0, 255.0) as u8;
    }
    let mut bytes = Vec::new();
    image::DynamicImage::ImageLuma8(gray)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)?;
    Ok(bytes)
}

#[cfg(feature = "capture")]
fn open_capture_source(
    spec: &SourceSpec,
    fallback_dir: &Path,
) -> Result<Box<dyn FrameSource>, StartError> {
    if let Some(source) = VideoCaptureSource::open(spec) {
        return Ok(Box::new(source));
    }
    let SourceSpec::Camera(_) = spec else {
        return Err(StartError::SourceUnavailable {
            spec: spec.to_string(),
        });
    };
    warn!(
        "camera {spec} unavailable; searching {} for fallback videos",
        fallback_dir.display()
    );
    let Some(video) = find_fallback_video(fallback_dir) else {
        return Err(StartError::NoFallbackFound {
            folder: fallback_dir.to_path_buf(),
        });
    };
    let fallback = SourceSpec::File(video);
    info!("using fallback video {fallback}");
    VideoCaptureSource::open(&fallback)
        .map(|source| Box::new(source) as Box<dyn FrameSource>)
        .ok_or(StartError::SourceUnavailable {
            spec: fallback.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reference_before_any_frame_is_an_invalid_state() {
        let gauge = LevelGauge::with_defaults();
        assert_eq!(
            gauge.set_reference().unwrap_err(),
            ControlError::NoFrameProcessed
        );
        // state unchanged: still no reference, level still zero
        let stats = gauge.stats();
        assert_eq!(stats.level, 0.0);
        assert!(!stats.running);
    }

    #[test]
    fn roi_round_trips_and_clears() {
        let gauge = LevelGauge::with_defaults();
        gauge.set_roi(40, 30, 10, 20);
        assert_eq!(gauge.roi(), Some(Roi::from_corners(10, 20, 40, 30)));
        gauge.clear_roi();
        assert_eq!(gauge.roi(), None);
    }

    #[test]
    fn non_positive_target_fps_falls_back_to_default() {
        let gauge = LevelGauge::with_defaults();
        gauge.set_target_fps(-3.0);
        assert_eq!(gauge.target_fps(), DEFAULT_TARGET_FPS);
        gauge.set_target_fps(12.5);
        assert_eq!(gauge.target_fps(), 12.5);
    }

    #[test]
    fn lighting_settings_are_adjustable() {
        let gauge = LevelGauge::with_defaults();
        assert!(!gauge.lighting().enabled);
        gauge.set_lighting(true, 3.5);
        let lighting = gauge.lighting();
        assert!(lighting.enabled);
        assert_eq!(lighting.clahe.clip_limit, 3.5);
    }

    #[test]
    fn degenerate_roi_extracts_the_full_frame() {
        let frame = RgbImage::new(64, 48);
        let region = extract_region(frame, Some(Roi::from_corners(100, 100, 200, 120)));
        assert_eq!(region.dimensions(), (64, 48));
    }

    #[test]
    fn valid_roi_extracts_the_cropped_region() {
        let frame = RgbImage::new(64, 48);
        let region = extract_region(frame, Some(Roi::from_corners(10, 8, 30, 20)));
        assert_eq!(region.dimensions(), (20, 12));
    }
}
