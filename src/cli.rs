// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Decoding QR codes from still images

use qr_reader::backends::camera::{
    CameraDevice, Frame, PixelFormat, Rotation, enumerate_cameras,
};
use qr_reader::display::{DisplaySink, display_channel};
use qr_reader::errors::BindError;
use qr_reader::frame_processor::{FrameAnalyzer, QrDetector};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// List all available cameras
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    gstreamer::init()?;
    write_camera_list(enumerate_cameras(), &mut std::io::stdout())
}

/// Print an enumeration result; a monitor failure is returned, not hidden
fn write_camera_list(
    cameras: Result<Vec<CameraDevice>, BindError>,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let cameras = cameras?;

    if cameras.is_empty() {
        writeln!(out, "No cameras found.")?;
        return Ok(());
    }

    writeln!(out, "Available cameras:")?;
    writeln!(out)?;
    for (index, camera) in cameras.iter().enumerate() {
        writeln!(out, "  [{}] {}", index, camera.name)?;
        let lens = camera
            .lens_facing
            .map(|l| l.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        writeln!(
            out,
            "      Lens: {}, sensor rotation: {}°",
            lens,
            camera.sensor_rotation.degrees()
        )?;
        writeln!(out)?;
    }

    Ok(())
}

/// Decode QR codes in a still image and print the text
///
/// The image goes through the same analyzer the live camera uses, so
/// `rotation` is applied exactly as a camera frame's rotation would be.
pub fn scan_image(
    path: &Path,
    rotation: Rotation,
    max_dimension: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = image::open(path)
        .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?
        .to_luma8();
    let (width, height) = image.dimensions();
    let frame = Frame::packed(width, height, PixelFormat::Gray8, image.into_raw())
        .with_rotation(rotation.degrees());

    let runtime = tokio::runtime::Runtime::new()?;
    let (display, mut state) = display_channel();
    let display: Arc<dyn DisplaySink> = Arc::new(display);
    let analyzer = FrameAnalyzer::new(
        Arc::new(QrDetector::with_max_dimension(max_dimension)),
        display,
    );

    runtime.block_on(analyzer.analyze(frame))?;
    state.apply_pending();

    match state.text() {
        Some(text) => println!("{}", text),
        None => {
            println!("No QR code found.");
        }
    }

    Ok(())
}
