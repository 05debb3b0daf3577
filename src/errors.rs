// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the QR reader

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// The user refused camera access; capture never starts this session
    PermissionDenied,
    /// Capture configuration or hardware failure
    Bind(BindError),
    /// Configuration errors
    Config(String),
    /// Filesystem errors
    Io(String),
    /// Generic error with message
    Other(String),
}

/// Capture binding errors
///
/// Returned by the session manager when no camera stream could be set up.
/// These are logged and leave the screen in its pre-bind state.
#[derive(Debug, Clone, PartialEq)]
pub enum BindError {
    /// No camera devices found
    NoCameraFound,
    /// The capture framework itself is unavailable
    NoProvider(String),
    /// Building or starting the pipeline failed
    PipelineFailed(String),
    /// The requested configuration cannot be satisfied
    Unsupported(String),
}

/// Per-frame analysis errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// Frame rotation outside {0, 90, 180, 270}
    InvalidRotation(u32),
}

/// Barcode decoder errors
///
/// Expected and recoverable; a failed decode clears the displayed text and
/// has no effect on later frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame buffer does not match its declared geometry
    InvalidImage(String),
    /// The blocking decode task panicked or was cancelled
    TaskFailed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::PermissionDenied => write!(f, "Camera permission denied"),
            AppError::Bind(e) => write!(f, "Camera bind error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::NoCameraFound => write!(f, "No camera devices found"),
            BindError::NoProvider(msg) => write!(f, "Camera provider unavailable: {}", msg),
            BindError::PipelineFailed(msg) => write!(f, "Use case binding failed: {}", msg),
            BindError::Unsupported(msg) => write!(f, "Unsupported configuration: {}", msg),
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::InvalidRotation(degrees) => write!(
                f,
                "Rotation must be 0, 90, 180, or 270 (got {})",
                degrees
            ),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidImage(msg) => write!(f, "Invalid image: {}", msg),
            DecodeError::TaskFailed(msg) => write!(f, "Decode task failed: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for BindError {}
impl std::error::Error for AnalysisError {}
impl std::error::Error for DecodeError {}

impl From<BindError> for AppError {
    fn from(err: BindError) -> Self {
        AppError::Bind(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<gstreamer::glib::Error> for BindError {
    fn from(err: gstreamer::glib::Error) -> Self {
        BindError::NoProvider(err.to_string())
    }
}
