//! Command-line front end: run a measurement session against a camera or a
//! video file and print periodic stats.

#[cfg(feature = "capture")]
mod cli {
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    use clap::Parser;

    use level_gauge::{LevelGauge, SessionOptions, SourceSpec, StartOutcome};

    /// Measure liquid level from a camera or video file.
    #[derive(Parser, Debug)]
    #[command(name = "level-gauge", version, about)]
    struct Args {
        /// Camera index or video file path.
        #[arg(long, default_value = "0")]
        source: String,

        /// Row units per height unit.
        #[arg(long, default_value_t = 1.0)]
        calibration: f32,

        /// Output directory for boundary images and reports.
        #[arg(long, default_value = "session_output")]
        output: PathBuf,

        /// Capture pacing target, frames per second.
        #[arg(long, default_value_t = 30.0)]
        fps: f32,

        /// Stop after this many seconds (0 = run until the source ends).
        #[arg(long, default_value_t = 0)]
        duration_secs: u64,

        /// Region of interest as x1,y1,x2,y2.
        #[arg(long, value_delimiter = ',', num_args = 4)]
        roi: Option<Vec<u32>>,

        /// Enable CLAHE-style lighting normalization.
        #[arg(long)]
        lighting: bool,

        /// CLAHE clip limit (used with --lighting).
        #[arg(long, default_value_t = 2.0)]
        clip_limit: f32,

        /// Folder searched for fallback videos when a camera fails.
        #[arg(long, default_value = "uploaded_videos")]
        fallback: PathBuf,
    }

    pub fn run() -> Result<(), Box<dyn std::error::Error>> {
        env_logger::init();
        let args = Args::parse();

        let gauge = LevelGauge::with_defaults();
        if let Some(roi) = &args.roi {
            gauge.set_roi(roi[0], roi[1], roi[2], roi[3]);
        }
        if args.lighting {
            gauge.set_lighting(true, args.clip_limit);
        }

        let spec = SourceSpec::parse(&args.source);
        let opts = SessionOptions {
            calibration: args.calibration,
            output_dir: args.output.clone(),
            target_fps: args.fps,
            fallback_dir: args.fallback.clone(),
        };
        match gauge.start(&spec, opts)? {
            StartOutcome::Started => println!("session started on {spec}"),
            StartOutcome::AlreadyRunning => unreachable!("fresh gauge cannot be running"),
        }

        let started = Instant::now();
        while gauge.is_running() {
            std::thread::sleep(Duration::from_secs(1));
            let stats = gauge.stats();
            println!(
                "frames={} fps={:.1} level={:.2} processing={:.3}s dropped={}",
                stats.frame_count,
                stats.fps,
                stats.level,
                stats.processing_secs,
                stats.dropped_frames
            );
            if args.duration_secs > 0 && started.elapsed() >= Duration::from_secs(args.duration_secs)
            {
                gauge.stop();
            }
        }

        if gauge.wait_until_finished(Duration::from_secs(60)) {
            println!(
                "session finished: {} measurements, {} images written",
                gauge.measurements().len(),
                gauge.images_written()
            );
        } else {
            eprintln!("session did not finalize in time");
        }
        Ok(())
    }
}

#[cfg(feature = "capture")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    cli::run()
}

#[cfg(not(feature = "capture"))]
fn main() {
    eprintln!("level-gauge was built without the `capture` feature; rebuild with `--features capture`");
    std::process::exit(2);
}
