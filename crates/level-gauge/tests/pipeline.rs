//! End-to-end pipeline tests over synthetic frame sequences.

use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};
use level_gauge::{FrameSequenceSource, LevelGauge, SessionOptions, StartOutcome};

/// Dark band above `boundary_row`, bright band below: a crisp horizontal
/// boundary for the detector to find.
fn banded_frame(width: u32, height: u32, boundary_row: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |_, y| {
        if y < boundary_row {
            Rgb([25, 28, 40])
        } else {
            Rgb([210, 215, 190])
        }
    })
}

fn options(dir: &std::path::Path) -> SessionOptions {
    SessionOptions {
        calibration: 2.0,
        output_dir: dir.to_path_buf(),
        target_fps: 100.0,
        fallback_dir: dir.join("fallback"),
    }
}

#[test]
fn session_processes_frames_and_never_drops_a_persisted_result() {
    let dir = tempfile::tempdir().expect("tempdir");
    let frames: Vec<RgbImage> = (0..20).map(|_| banded_frame(16, 16, 8)).collect();

    let gauge = LevelGauge::with_defaults();
    let outcome = gauge
        .start_with_source(
            Box::new(FrameSequenceSource::new(frames)),
            options(dir.path()),
        )
        .expect("start");
    assert_eq!(outcome, StartOutcome::Started);

    assert!(
        gauge.wait_until_finished(Duration::from_secs(120)),
        "session did not finish"
    );
    assert!(!gauge.is_running());

    let measurements = gauge.measurements();
    assert!(!measurements.is_empty());

    // Session-end invariant: one completed write per processed frame.
    assert_eq!(gauge.images_written(), measurements.len());
    assert_eq!(gauge.write_failures(), 0);
    let image_count = std::fs::read_dir(dir.path().join("processed"))
        .expect("processed dir")
        .count();
    assert_eq!(image_count, measurements.len());

    // Measurements are appended in capture order.
    for pair in measurements.windows(2) {
        assert!(pair[1].frame_number > pair[0].frame_number);
    }

    // No reference was set, so no measurement carries a height.
    assert!(measurements.iter().all(|m| m.height.is_none()));

    // Finalization artifacts.
    assert!(dir.path().join("measurements.csv").exists());
    assert!(dir.path().join("session.json").exists());
}

#[test]
fn reference_flow_yields_zero_heights_for_a_static_scene() {
    let dir = tempfile::tempdir().expect("tempdir");
    let frames: Vec<RgbImage> = (0..200).map(|_| banded_frame(16, 16, 8)).collect();

    let gauge = LevelGauge::with_defaults();
    gauge
        .start_with_source(
            Box::new(FrameSequenceSource::new(frames)),
            options(dir.path()),
        )
        .expect("start");

    // Starting again while running is a no-op.
    let second = gauge
        .start_with_source(
            Box::new(FrameSequenceSource::new(Vec::new())),
            options(dir.path()),
        )
        .expect("second start");
    assert_eq!(second, StartOutcome::AlreadyRunning);

    // Wait for the first processed frame, then freeze the reference.
    let deadline = Instant::now() + Duration::from_secs(60);
    while gauge.measurements().is_empty() {
        assert!(
            Instant::now() < deadline,
            "no frame processed in time"
        );
        std::thread::sleep(Duration::from_millis(2));
    }
    gauge.set_reference().expect("a frame has been processed");

    assert!(
        gauge.wait_until_finished(Duration::from_secs(120)),
        "session did not finish"
    );

    let measurements = gauge.measurements();
    // The scene is static, so every post-reference frame lands exactly on
    // the reference row.
    let last = measurements.last().expect("measurements recorded");
    assert_eq!(last.height, Some(0.0));
    assert!(measurements.iter().any(|m| m.height.is_none()));

    // Restarting after the session finished works and resets counters.
    let restart = gauge
        .start_with_source(
            Box::new(FrameSequenceSource::new(vec![banded_frame(16, 16, 8); 3])),
            options(dir.path()),
        )
        .expect("restart");
    assert_eq!(restart, StartOutcome::Started);
    assert!(gauge.wait_until_finished(Duration::from_secs(120)));
    assert!(gauge.measurements().len() <= 3);
}

#[test]
fn stop_finalizes_even_with_a_slow_endless_source() {
    struct EndlessSource;
    impl level_gauge::FrameSource for EndlessSource {
        fn read_frame(&mut self) -> Option<RgbImage> {
            std::thread::sleep(Duration::from_millis(5));
            Some(banded_frame(16, 16, 8))
        }
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let gauge = LevelGauge::with_defaults();
    gauge
        .start_with_source(Box::new(EndlessSource), options(dir.path()))
        .expect("start");

    // Let a few frames through, then request a stop.
    let deadline = Instant::now() + Duration::from_secs(60);
    while gauge.measurements().len() < 2 {
        assert!(Instant::now() < deadline, "pipeline made no progress");
        std::thread::sleep(Duration::from_millis(5));
    }
    gauge.stop();

    assert!(
        gauge.wait_until_finished(Duration::from_secs(120)),
        "stop did not finalize"
    );
    assert_eq!(gauge.images_written(), gauge.measurements().len());
    let stats = gauge.stats();
    assert!(!stats.running);
    assert!(stats.frame_count >= gauge.measurements().len() as u64);
}
