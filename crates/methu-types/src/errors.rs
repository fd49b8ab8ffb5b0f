use std::{io, path::PathBuf};

use thiserror::Error;

pub type Result<T, E = MethuError> = std::result::Result<T, E>;

/// Whole-operation failures surfaced to callers of the pipeline.
#[derive(Debug, Error)]
pub enum MethuError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("directory structure error: {0}")]
    Structure(String),
    #[error("local store error: {0}")]
    Store(String),
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("conversion error: {0}")]
    Convert(#[from] ConvertError),
    #[error("assembly error: {0}")]
    Assembly(#[from] AssemblyError),
    #[error("network error: {0}")]
    Network(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure to acquire a single frame from the remote source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport failure for {url}: {message}")]
    Transport { url: String, message: String },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("remote answered {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("remote returned an empty body for {url}")]
    EmptyBody { url: String },
    #[error("failed to persist {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    /// Transport hiccups and server-side statuses are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport { .. } | FetchError::Timeout { .. } => true,
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            FetchError::EmptyBody { .. } | FetchError::Io { .. } => false,
        }
    }
}

/// Failure to turn one stored file into a palette-bounded frame.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unsupported image format in {}", path.display())]
    UnsupportedFormat { path: PathBuf },
    #[error("corrupt image data in {}: {message}", path.display())]
    CorruptData { path: PathBuf, message: String },
    #[error("{} did not normalise to a palette-indexed frame: {message}", path.display())]
    NotPaletted { path: PathBuf, message: String },
}

/// Failure of a whole timelapse assembly pass.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("failed to list frames in {}: {message}", dir.display())]
    ListFailed { dir: PathBuf, message: String },
    #[error("no usable frames found in {}", dir.display())]
    NoUsableFrames { dir: PathBuf },
    #[error("failed to encode animation: {0}")]
    Encode(String),
    #[error("failed to publish {}: {source}", path.display())]
    Publish {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
