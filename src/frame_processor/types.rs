// SPDX-License-Identifier: GPL-3.0-only

//! Types exchanged between the frame analyzer and barcode decoders

use crate::backends::camera::{Frame, FrameData, PixelFormat};
use crate::errors::AnalysisError;

/// Orientation handed to the decoder, clockwise rotation to make the image upright
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Rotate0,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Orientation {
    /// Map frame rotation metadata; only quarter turns are valid
    pub fn from_degrees(degrees: u32) -> Result<Self, AnalysisError> {
        match degrees {
            0 => Ok(Orientation::Rotate0),
            90 => Ok(Orientation::Rotate90),
            180 => Ok(Orientation::Rotate180),
            270 => Ok(Orientation::Rotate270),
            other => Err(AnalysisError::InvalidRotation(other)),
        }
    }

    pub fn degrees(&self) -> u32 {
        match self {
            Orientation::Rotate0 => 0,
            Orientation::Rotate90 => 90,
            Orientation::Rotate180 => 180,
            Orientation::Rotate270 => 270,
        }
    }
}

/// Barcode symbologies a decoder may be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarcodeFormat {
    QrCode,
}

/// Decoder request options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorOptions {
    /// Only symbols of these formats are reported
    pub formats: Vec<BarcodeFormat>,
}

impl DetectorOptions {
    pub fn qr_only() -> Self {
        Self {
            formats: vec![BarcodeFormat::QrCode],
        }
    }

    pub fn accepts(&self, format: BarcodeFormat) -> bool {
        self.formats.contains(&format)
    }
}

/// One detected symbol
///
/// `raw_value` is `None` when a symbol was located but its payload could not
/// be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Barcode {
    pub format: BarcodeFormat,
    pub raw_value: Option<String>,
}

impl Barcode {
    pub fn qr(raw_value: impl Into<String>) -> Self {
        Self {
            format: BarcodeFormat::QrCode,
            raw_value: Some(raw_value.into()),
        }
    }

    pub fn unreadable(format: BarcodeFormat) -> Self {
        Self {
            format,
            raw_value: None,
        }
    }
}

/// Image plus orientation as submitted to a decoder
///
/// Shares the frame's buffer; the frame itself stays with the analyzer so it
/// can be released once the decode completes.
#[derive(Debug, Clone)]
pub struct OrientedImage {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: PixelFormat,
    pub data: FrameData,
    pub orientation: Orientation,
}

impl OrientedImage {
    pub fn from_frame(frame: &Frame, orientation: Orientation) -> Self {
        Self {
            width: frame.width,
            height: frame.height,
            stride: frame.stride,
            format: frame.format,
            data: frame.data.clone(),
            orientation,
        }
    }
}

/// Text shown for a decode result
///
/// Unreadable and empty payloads are dropped, the rest joined by newlines in
/// detection order. `None` when nothing is left to show.
pub fn display_text(barcodes: &[Barcode]) -> Option<String> {
    let text = barcodes
        .iter()
        .filter_map(|b| b.raw_value.as_deref())
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if text.is_empty() { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_mapping() {
        for degrees in [0, 90, 180, 270] {
            let orientation = Orientation::from_degrees(degrees).unwrap();
            assert_eq!(orientation.degrees(), degrees);
        }
    }

    #[test]
    fn test_orientation_rejects_other_values() {
        for degrees in [1, 45, 89, 181, 360, 720] {
            assert_eq!(
                Orientation::from_degrees(degrees),
                Err(AnalysisError::InvalidRotation(degrees))
            );
        }
    }

    #[test]
    fn test_display_text_filters_empty_and_missing() {
        let barcodes = vec![
            Barcode::qr("ABC"),
            Barcode::qr(""),
            Barcode::unreadable(BarcodeFormat::QrCode),
        ];
        assert_eq!(display_text(&barcodes), Some("ABC".to_string()));
    }

    #[test]
    fn test_display_text_joins_with_newlines() {
        let barcodes = vec![Barcode::qr("one"), Barcode::qr("two")];
        assert_eq!(display_text(&barcodes), Some("one\ntwo".to_string()));
    }

    #[test]
    fn test_display_text_empty() {
        assert_eq!(display_text(&[]), None);
        assert_eq!(display_text(&[Barcode::qr("")]), None);
    }

    #[test]
    fn test_qr_only_options() {
        let options = DetectorOptions::qr_only();
        assert!(options.accepts(BarcodeFormat::QrCode));
        assert!(!DetectorOptions { formats: vec![] }.accepts(BarcodeFormat::QrCode));
    }
}
