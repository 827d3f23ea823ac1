//! Frame sources: live capture, file playback, and test sequences.

use std::path::{Path, PathBuf};

use image::RgbImage;

/// Where a session reads frames from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSpec {
    /// Camera device index.
    Camera(i32),
    /// Video file path.
    File(PathBuf),
}

impl SourceSpec {
    /// A purely numeric string is a camera index, anything else a file
    /// path.
    pub fn parse(s: &str) -> Self {
        match s.parse::<i32>() {
            Ok(index) if index >= 0 => Self::Camera(index),
            _ => Self::File(PathBuf::from(s)),
        }
    }
}

impl std::fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Camera(index) => write!(f, "camera:{index}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A stream of RGB frames. `read_frame` returning `None` ends the session:
/// a stalled camera is only ever detected through a failed read.
pub trait FrameSource: Send {
    fn read_frame(&mut self) -> Option<RgbImage>;
}

/// Plays back a fixed list of frames, then ends. Used by tests and demos.
pub struct FrameSequenceSource {
    frames: std::vec::IntoIter<RgbImage>,
}

impl FrameSequenceSource {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            frames: frames.into_iter(),
        }
    }
}

impl FrameSource for FrameSequenceSource {
    fn read_frame(&mut self) -> Option<RgbImage> {
        self.frames.next()
    }
}

/// Extensions considered when searching the fallback folder.
pub const FALLBACK_VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];

/// First video file in `dir` (lexicographic order, case-insensitive
/// extension match), or `None` when the folder is missing or holds no
/// videos.
pub fn find_fallback_video(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut videos: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| {
                    FALLBACK_VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
                })
                .unwrap_or(false)
        })
        .collect();
    videos.sort();
    videos.into_iter().next()
}

#[cfg(feature = "capture")]
mod capture {
    use image::RgbImage;
    use log::warn;
    use opencv::prelude::*;
    use opencv::videoio::{self, VideoCapture};

    use super::{FrameSource, SourceSpec};

    /// Live capture through OpenCV's `VideoCapture`; handles both camera
    /// indices and video files.
    pub struct VideoCaptureSource {
        capture: VideoCapture,
    }

    impl VideoCaptureSource {
        /// Open the source, `None` when the device/file cannot be opened.
        pub fn open(spec: &SourceSpec) -> Option<Self> {
            let capture = match spec {
                SourceSpec::Camera(index) => VideoCapture::new(*index, videoio::CAP_ANY).ok()?,
                SourceSpec::File(path) => {
                    VideoCapture::from_file(path.to_str()?, videoio::CAP_ANY).ok()?
                }
            };
            if !capture.is_opened().unwrap_or(false) {
                return None;
            }
            Some(Self { capture })
        }
    }

    impl FrameSource for VideoCaptureSource {
        fn read_frame(&mut self) -> Option<RgbImage> {
            let mut mat = opencv::core::Mat::default();
            match self.capture.read(&mut mat) {
                Ok(true) => mat_to_rgb(&mat),
                Ok(false) => None,
                Err(err) => {
                    warn!("capture read failed: {err}");
                    None
                }
            }
        }
    }

    fn mat_to_rgb(mat: &opencv::core::Mat) -> Option<RgbImage> {
        let rows = mat.rows();
        let cols = mat.cols();
        if rows <= 0 || cols <= 0 || mat.channels() != 3 {
            return None;
        }
        if !mat.is_continuous() {
            warn!("skipping non-continuous capture buffer");
            return None;
        }
        let bgr = mat.data_bytes().ok()?;
        let mut rgb = Vec::with_capacity(bgr.len());
        for px in bgr.chunks_exact(3) {
            rgb.extend_from_slice(&[px[2], px[1], px[0]]);
        }
        RgbImage::from_raw(cols as u32, rows as u32, rgb)
    }
}

#[cfg(feature = "capture")]
pub use capture::VideoCaptureSource;
