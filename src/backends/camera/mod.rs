// SPDX-License-Identifier: GPL-3.0-only

//! Camera capture backend
//!
//! ```text
//! ┌──────────────────────┐
//! │ CameraSessionManager │  ← computes configuration, rebinds
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │ CaptureProvider trait│  ← bind / unbind streams
//! └──────────┬───────────┘
//!            │
//!            ▼
//!      ┌───────────┐
//!      │ GStreamer │  ← preview stream + keep-latest analysis stream
//!      └───────────┘
//! ```

pub mod enumeration;
pub mod frame_slot;
pub mod pipeline;
pub mod types;

pub use enumeration::{enumerate_cameras, select_device};
pub use frame_slot::LatestSlot;
pub use pipeline::GstCaptureProvider;
pub use types::*;

use crate::display::PreviewSurface;
use crate::errors::BindError;
use std::sync::Arc;

/// Where the analysis stream publishes frames
pub type AnalysisSlot = Arc<LatestSlot<Frame>>;

/// Description of a successfully bound pair of streams
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundStreams {
    pub device_name: String,
    pub width: u32,
    pub height: u32,
}

/// Platform capture framework
///
/// A provider turns a [`CameraConfiguration`] into two running streams: a
/// preview feed written to the display surface and an analysis feed published
/// into a keep-only-latest slot. Publishing must never block the producer.
pub trait CaptureProvider: Send {
    /// Bind preview and analysis streams for `config`
    fn bind(
        &mut self,
        config: &CameraConfiguration,
        preview: PreviewSurface,
        analysis: AnalysisSlot,
    ) -> Result<BoundStreams, BindError>;

    /// Stop and release every bound stream
    fn unbind_all(&mut self);

    /// Number of currently bound stream pairs
    fn bound_count(&self) -> usize;
}
