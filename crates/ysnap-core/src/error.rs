use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the snapshot poller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("token refresh failed: {0}")]
    Auth(#[from] AuthError),
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),
}

impl Error {
    /// Short label of the cycle stage that produced the error, used as a log field.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::InvalidConfig(_) => "config",
            Error::Auth(_) => "auth",
            Error::Capture(_) => "capture",
            Error::Storage(_) => "storage",
        }
    }
}

/// Failure to obtain a usable access token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("vendor rejected credentials: code {code}: {message}")]
    Rejected { code: String, message: String },
    #[error("malformed token response: {0}")]
    Malformed(String),
}

/// Failure to obtain a snapshot for the current cycle.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The vendor answered with a non-"200" code; usually the device is offline.
    #[error("device capture rejected: code {code}: {message}")]
    Rejected { code: String, message: String },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed capture response: {0}")]
    Malformed(String),
    #[error("picture download returned {status} for {url}")]
    Download { status: reqwest::StatusCode, url: String },
}

impl CaptureError {
    /// Vendor result code when the capture was refused by the platform.
    pub fn code(&self) -> Option<&str> {
        match self {
            CaptureError::Rejected { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Failure to write the latest file or its history copy.
#[derive(Debug, Error)]
#[error("{action} {}: {source}", path.display())]
pub struct StorageError {
    pub action: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl StorageError {
    pub fn new(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            action,
            path: path.into(),
            source,
        }
    }
}
