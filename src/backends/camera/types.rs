// SPDX-License-Identifier: GPL-3.0-only
// Shared types for the capture backend

//! Shared types for camera capture

use crate::session::aspect_ratio::AspectRatio;
use gstreamer::buffer::{MappedBuffer, Readable};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Frame data storage - either pre-copied bytes or zero-copy GStreamer buffer
///
/// The `Mapped` variant keeps the GStreamer buffer mapped and alive until all
/// references are dropped, so the pipeline cannot recycle it underneath us.
#[derive(Clone)]
pub enum FrameData {
    /// Pre-copied bytes (still images, tests)
    Copied(Arc<[u8]>),
    /// Zero-copy mapped GStreamer buffer
    Mapped(Arc<MappedBuffer<Readable>>),
}

impl FrameData {
    /// Create FrameData from a mapped GStreamer buffer (zero-copy)
    pub fn from_mapped_buffer(buffer: MappedBuffer<Readable>) -> Self {
        FrameData::Mapped(Arc::new(buffer))
    }

    pub fn len(&self) -> usize {
        match self {
            FrameData::Copied(data) => data.len(),
            FrameData::Mapped(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u8>> for FrameData {
    fn from(data: Vec<u8>) -> Self {
        FrameData::Copied(Arc::from(data))
    }
}

impl std::fmt::Debug for FrameData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameData::Copied(data) => write!(f, "FrameData::Copied({} bytes)", data.len()),
            FrameData::Mapped(buf) => write!(f, "FrameData::Mapped({} bytes)", buf.len()),
        }
    }
}

impl AsRef<[u8]> for FrameData {
    fn as_ref(&self) -> &[u8] {
        match self {
            FrameData::Copied(data) => data.as_ref(),
            FrameData::Mapped(buf) => buf.as_slice(),
        }
    }
}

impl std::ops::Deref for FrameData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_ref()
    }
}

/// Which physical camera to capture from
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LensFacing {
    /// User-facing camera
    #[default]
    Front,
    /// World-facing camera
    Back,
}

impl LensFacing {
    /// Parse a device location property ("front", "back", "external", ...)
    ///
    /// External webcams face the user, so they count as front lenses.
    pub fn from_location(location: &str) -> Option<Self> {
        match location.trim().to_ascii_lowercase().as_str() {
            "front" | "external" | "user" => Some(LensFacing::Front),
            "back" | "rear" | "environment" => Some(LensFacing::Back),
            _ => None,
        }
    }
}

impl std::fmt::Display for LensFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LensFacing::Front => write!(f, "front"),
            LensFacing::Back => write!(f, "back"),
        }
    }
}

/// Quarter-turn rotation in degrees (clockwise)
///
/// Used both for the display rotation a session is bound with and for the
/// physical mounting angle of a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Rotate0,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Rotation {
    /// Exact conversion; anything but a quarter turn is rejected
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::Rotate0),
            90 => Some(Rotation::Rotate90),
            180 => Some(Rotation::Rotate180),
            270 => Some(Rotation::Rotate270),
            _ => None,
        }
    }

    /// Lenient conversion for device properties (normalised to 0-360,
    /// unknown values treated as unrotated)
    pub fn from_property(degrees: i32) -> Self {
        Self::from_degrees(degrees.rem_euclid(360) as u32).unwrap_or_default()
    }

    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::Rotate0 => 0,
            Rotation::Rotate90 => 90,
            Rotation::Rotate180 => 180,
            Rotation::Rotate270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, Rotation::Rotate90 | Rotation::Rotate270)
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Rotation a frame needs to appear upright on the display
///
/// The sensor is mounted at `sensor` relative to the device's natural
/// orientation, and the display is turned by `display`. Front lenses are
/// mirrored, so the two angles add; back lenses subtract.
pub fn relative_rotation(sensor: Rotation, display: Rotation, lens: LensFacing) -> u32 {
    let sensor = sensor.degrees();
    let display = display.degrees();
    match lens {
        LensFacing::Front => (sensor + display) % 360,
        LensFacing::Back => (sensor + 360 - display) % 360,
    }
}

/// Camera settings computed once per bind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraConfiguration {
    pub lens_facing: LensFacing,
    pub aspect_ratio: AspectRatio,
    pub rotation: Rotation,
}

/// A camera discovered on the system
#[derive(Debug, Clone)]
pub struct CameraDevice {
    /// Human readable name
    pub name: String,
    /// Device class reported by GStreamer (e.g. "Video/Source")
    pub device_class: String,
    /// Which way the lens faces, when the device reports it
    pub lens_facing: Option<LensFacing>,
    /// Sensor mounting rotation
    pub sensor_rotation: Rotation,
    /// GStreamer device used to create the source element
    pub device: Option<gstreamer::Device>,
}

impl CameraDevice {
    /// Whether this device can serve the requested lens
    ///
    /// Devices without a location property are accepted as a fallback only.
    pub fn faces(&self, lens: LensFacing) -> bool {
        self.lens_facing == Some(lens)
    }
}

/// Pixel layout of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit luminance, used by the analysis stream
    Gray8,
    /// 32-bit RGBA, used by the preview stream
    Rgba,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgba => 4,
        }
    }

    /// GStreamer video/x-raw format string
    pub fn to_gst_format_string(&self) -> &'static str {
        match self {
            PixelFormat::Gray8 => "GRAY8",
            PixelFormat::Rgba => "RGBA",
        }
    }
}

/// Callback run when a frame's buffer is handed back to the pipeline
pub type ReleaseHook = Box<dyn FnOnce() + Send + Sync>;

/// One captured image plus its orientation metadata
///
/// A frame is released exactly once: either explicitly through
/// [`Frame::close`] or, failing that, when it is dropped.
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Bytes per row including padding
    pub stride: u32,
    pub format: PixelFormat,
    pub data: FrameData,
    /// Clockwise rotation needed to display the frame upright
    pub rotation_degrees: u32,
    /// Position in the capture stream
    pub sequence: u64,
    pub captured_at: Instant,
    release: Option<ReleaseHook>,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        stride: u32,
        format: PixelFormat,
        data: FrameData,
        rotation_degrees: u32,
    ) -> Self {
        Self {
            width,
            height,
            stride,
            format,
            data,
            rotation_degrees,
            sequence: 0,
            captured_at: Instant::now(),
            release: None,
        }
    }

    /// Tightly packed frame (stride equals row width)
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: impl Into<FrameData>) -> Self {
        let stride = width * format.bytes_per_pixel();
        Self::new(width, height, stride, format, data.into(), 0)
    }

    pub fn with_rotation(mut self, rotation_degrees: u32) -> Self {
        self.rotation_degrees = rotation_degrees;
        self
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Attach a callback that runs when the frame is released
    pub fn on_release(mut self, hook: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.release = Some(Box::new(hook));
        self
    }

    pub fn data_slice(&self) -> &[u8] {
        &self.data
    }

    /// Hand the frame back to the capture pipeline
    pub fn close(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(hook) = self.release.take() {
            hook();
        }
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .field("rotation_degrees", &self.rotation_degrees)
            .field("sequence", &self.sequence)
            .field("data", &self.data)
            .finish()
    }
}
