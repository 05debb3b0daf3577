// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Application identifier, used for the config directory and log file name
pub const APP_ID: &str = "qr-reader";

/// Exact value of the 4:3 preview ratio
pub const RATIO_4_3_VALUE: f64 = 4.0 / 3.0;

/// Exact value of the 16:9 preview ratio
pub const RATIO_16_9_VALUE: f64 = 16.0 / 9.0;

/// Capture resolution targets per aspect ratio
pub mod resolution {
    /// 4:3 target (width, height)
    pub const TARGET_4_3: (u32, u32) = (640, 480);
    /// 16:9 target (width, height)
    pub const TARGET_16_9: (u32, u32) = (640, 360);
}

/// GStreamer pipeline tuning
pub mod pipeline {
    /// Buffers held by the analysis appsink before it starts dropping
    pub const ANALYSIS_MAX_BUFFERS: u32 = 1;
    /// Buffers held by the preview appsink
    pub const PREVIEW_MAX_BUFFERS: u32 = 2;
    /// Name of the preview appsink element
    pub const PREVIEW_SINK: &str = "preview";
    /// Name of the analysis appsink element
    pub const ANALYSIS_SINK: &str = "analysis";
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Seconds to wait for the pipeline to reach PLAYING
    pub const START_TIMEOUT_SECS: u64 = 5;
    /// Seconds to wait for the pipeline to reach NULL
    pub const STOP_TIMEOUT_SECS: u64 = 2;
    /// Log frame statistics every N frames
    pub const FRAME_LOG_INTERVAL: u64 = 120;
    /// Terminal input poll interval (about 60 redraws per second)
    pub const UI_POLL_INTERVAL: Duration = Duration::from_millis(16);
}

/// Decoder defaults
pub mod decoder {
    /// Longest edge fed to the QR decoder; larger frames are downscaled
    pub const DEFAULT_MAX_DIMENSION: u32 = 640;
}
