// SPDX-License-Identifier: GPL-3.0-only

//! QR Reader - live QR code recognition from a camera feed
//!
//! The crate is organized into several modules:
//!
//! - [`permission`]: Camera permission gate (XDG portal or device access)
//! - [`session`]: Camera session manager and aspect ratio policy
//! - [`backends`]: GStreamer capture provider and camera enumeration
//! - [`frame_processor`]: Per-frame QR analysis on a background task
//! - [`display`]: Preview surface and decoded-text label
//! - [`terminal`]: Terminal front-end that renders the display
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! // Run via:
//! // qr-reader --lens back
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod display;
pub mod errors;
pub mod frame_processor;
pub mod permission;
pub mod session;
pub mod terminal;

// Re-export commonly used types
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use frame_processor::{AnalysisWorker, FrameAnalyzer, QrDetector};
pub use session::{AspectRatio, CameraSessionManager};
