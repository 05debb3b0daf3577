// SPDX-License-Identifier: GPL-3.0-only

//! Camera discovery through the GStreamer device monitor
//!
//! PipeWire and V4L2 device providers both publish their cameras here. The
//! PipeWire libcamera provider also reports where a camera sits on the device
//! and how its sensor is mounted, which is how the front lens is found.

use super::types::{CameraDevice, LensFacing, Rotation};
use crate::errors::BindError;
use gstreamer::prelude::*;
use tracing::{debug, info, warn};

/// Device properties that carry the lens location, in lookup order
const LOCATION_PROPERTIES: [&str; 2] = ["api.libcamera.location", "camera.location"];

/// Device properties that carry the sensor rotation, in lookup order
const ROTATION_PROPERTIES: [&str; 2] = ["api.libcamera.rotation", "camera.rotation"];

/// Enumerate video sources known to GStreamer
pub fn enumerate_cameras() -> Result<Vec<CameraDevice>, BindError> {
    gstreamer::init()?;

    let monitor = gstreamer::DeviceMonitor::new();
    let caps = gstreamer::Caps::builder("video/x-raw").build();
    monitor.add_filter(Some("Video/Source"), Some(&caps));
    monitor
        .start()
        .map_err(|e| BindError::NoProvider(format!("Failed to start device monitor: {}", e)))?;

    let cameras: Vec<CameraDevice> = monitor.devices().into_iter().map(describe_device).collect();
    monitor.stop();

    info!(count = cameras.len(), "Enumerated cameras");
    Ok(cameras)
}

fn describe_device(device: gstreamer::Device) -> CameraDevice {
    let name = device.display_name().to_string();
    let device_class = device.device_class().to_string();

    let (location, rotation) = match device.properties() {
        Some(props) => (
            LOCATION_PROPERTIES
                .iter()
                .find_map(|key| string_property(&props, key)),
            ROTATION_PROPERTIES
                .iter()
                .find_map(|key| string_property(&props, key)),
        ),
        None => (None, None),
    };

    let lens_facing = location.as_deref().and_then(LensFacing::from_location);
    let sensor_rotation = rotation
        .as_deref()
        .map(parse_rotation_property)
        .unwrap_or_default();

    debug!(
        name = %name,
        class = %device_class,
        location = ?location,
        rotation = %sensor_rotation,
        "Found camera"
    );

    CameraDevice {
        name,
        device_class,
        lens_facing,
        sensor_rotation,
        device: Some(device),
    }
}

/// Device properties are strings for PipeWire and integers for some providers
fn string_property(props: &gstreamer::StructureRef, key: &str) -> Option<String> {
    if let Ok(value) = props.get::<String>(key) {
        return Some(value);
    }
    props.get::<i32>(key).ok().map(|v| v.to_string())
}

/// Parse a rotation property value such as "270"
pub fn parse_rotation_property(value: &str) -> Rotation {
    value
        .trim()
        .parse::<i32>()
        .map(Rotation::from_property)
        .unwrap_or_default()
}

/// Choose the camera to bind
///
/// An explicitly named device wins (case-insensitive substring match). Otherwise
/// the first camera facing `lens`, then the first camera without a location.
/// Cameras facing the other way are never chosen.
pub fn select_device<'a>(
    cameras: &'a [CameraDevice],
    lens: LensFacing,
    preferred: Option<&str>,
) -> Option<&'a CameraDevice> {
    if let Some(wanted) = preferred {
        let wanted = wanted.to_lowercase();
        if let Some(camera) = cameras
            .iter()
            .find(|c| c.name.to_lowercase().contains(&wanted))
        {
            return Some(camera);
        }
        warn!(device = %wanted, "Requested camera not found, falling back to lens selection");
    }

    if let Some(camera) = cameras.iter().find(|c| c.faces(lens)) {
        return Some(camera);
    }

    // A camera that reports the other lens never stands in for the requested one
    let fallback = cameras.iter().find(|c| c.lens_facing.is_none());
    match fallback {
        Some(camera) => warn!(
            lens = %lens,
            camera = %camera.name,
            "No camera reports the requested lens, using one without a location"
        ),
        None => warn!(lens = %lens, "No camera faces the requested lens"),
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(name: &str, lens: Option<LensFacing>) -> CameraDevice {
        CameraDevice {
            name: name.to_string(),
            device_class: "Video/Source".to_string(),
            lens_facing: lens,
            sensor_rotation: Rotation::Rotate0,
            device: None,
        }
    }

    #[test]
    fn test_select_front_lens() {
        let cameras = vec![
            camera("Rear", Some(LensFacing::Back)),
            camera("Selfie", Some(LensFacing::Front)),
        ];
        let selected = select_device(&cameras, LensFacing::Front, None).unwrap();
        assert_eq!(selected.name, "Selfie");
    }

    #[test]
    fn test_select_falls_back_to_first() {
        let cameras = vec![camera("Webcam A", None), camera("Webcam B", None)];
        let selected = select_device(&cameras, LensFacing::Front, None).unwrap();
        assert_eq!(selected.name, "Webcam A");
    }

    #[test]
    fn test_select_skips_opposite_lens() {
        let cameras = vec![
            camera("Rear", Some(LensFacing::Back)),
            camera("Webcam", None),
        ];
        let selected = select_device(&cameras, LensFacing::Front, None).unwrap();
        assert_eq!(selected.name, "Webcam");
    }

    #[test]
    fn test_select_none_when_only_opposite_lens() {
        let cameras = vec![camera("Rear", Some(LensFacing::Back))];
        assert!(select_device(&cameras, LensFacing::Front, None).is_none());
    }

    #[test]
    fn test_select_by_name() {
        let cameras = vec![
            camera("Integrated Camera", Some(LensFacing::Front)),
            camera("USB Capture", None),
        ];
        let selected = select_device(&cameras, LensFacing::Front, Some("usb")).unwrap();
        assert_eq!(selected.name, "USB Capture");
    }

    #[test]
    fn test_select_none_when_empty() {
        assert!(select_device(&[], LensFacing::Front, None).is_none());
    }

    #[test]
    fn test_parse_rotation_property() {
        assert_eq!(parse_rotation_property("270"), Rotation::Rotate270);
        assert_eq!(parse_rotation_property(" 90 "), Rotation::Rotate90);
        assert_eq!(parse_rotation_property("bogus"), Rotation::Rotate0);
    }
}
