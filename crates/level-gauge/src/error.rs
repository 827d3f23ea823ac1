//! Session control outcomes and errors.

use std::path::PathBuf;

/// What a successful `start` call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session was launched.
    Started,
    /// A session is already running; the call was a no-op.
    AlreadyRunning,
}

/// Fatal conditions for `start`. Each variant is distinguishable so callers
/// can branch on the outcome instead of parsing messages.
#[derive(thiserror::Error, Debug)]
pub enum StartError {
    #[error("cannot open video source `{spec}`")]
    SourceUnavailable { spec: String },

    #[error("camera unavailable and no fallback videos found in `{folder}`")]
    NoFallbackFound { folder: PathBuf },

    #[error("cannot create output directory `{path}`")]
    OutputUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid-state errors from the control surface; the pipeline keeps
/// running when these are returned.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ControlError {
    #[error("no frame has been processed yet")]
    NoFrameProcessed,
}
