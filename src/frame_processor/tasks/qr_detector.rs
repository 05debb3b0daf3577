// SPDX-License-Identifier: GPL-3.0-only

//! QR code detection task
//!
//! Decodes QR codes with the rqrr crate. Frames are converted to grayscale,
//! turned upright according to their orientation and downscaled before the
//! CPU-heavy search runs on the blocking thread pool.

use super::BarcodeDecoder;
use crate::backends::camera::PixelFormat;
use crate::constants::decoder::DEFAULT_MAX_DIMENSION;
use crate::errors::DecodeError;
use crate::frame_processor::types::{
    Barcode, BarcodeFormat, DetectorOptions, Orientation, OrientedImage,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, RgbaImage};
use tracing::{debug, trace, warn};

/// QR code detector
///
/// Optimized for real-time processing with frame downscaling.
#[derive(Debug, Clone)]
pub struct QrDetector {
    /// Maximum dimension for processing (frames are downscaled to this, 0 disables)
    max_dimension: u32,
}

impl Default for QrDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDetector {
    pub fn new() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    /// Create a QR detector with custom max dimension
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self { max_dimension }
    }
}

impl BarcodeDecoder for QrDetector {
    fn detect(
        &self,
        image: OrientedImage,
        options: &DetectorOptions,
    ) -> BoxFuture<'static, Result<Vec<Barcode>, DecodeError>> {
        let max_dimension = self.max_dimension;
        let wants_qr = options.accepts(BarcodeFormat::QrCode);

        async move {
            if !wants_qr {
                trace!("QR format not requested, skipping detection");
                return Ok(Vec::new());
            }

            // Run detection in a blocking task to avoid blocking the async runtime
            tokio::task::spawn_blocking(move || detect_sync(&image, max_dimension))
                .await
                .map_err(|e| {
                    warn!(error = %e, "QR detection task panicked");
                    DecodeError::TaskFailed(e.to_string())
                })?
        }
        .boxed()
    }
}

/// Synchronous QR detection (runs in blocking task)
pub fn detect_sync(image: &OrientedImage, max_dimension: u32) -> Result<Vec<Barcode>, DecodeError> {
    let start = std::time::Instant::now();

    let gray = to_luma(image)?;
    let upright = rotate_upright(gray, image.orientation);
    let prepared_image = downscale(upright, max_dimension);
    let (width, height) = prepared_image.dimensions();

    let conversion_time = start.elapsed();
    trace!(
        width,
        height,
        orientation = image.orientation.degrees(),
        conversion_ms = conversion_time.as_millis(),
        "Prepared grayscale image"
    );

    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
            prepared_image.get_pixel(x as u32, y as u32).0[0]
        });
    let grids = prepared.detect_grids();

    let barcodes: Vec<Barcode> = grids
        .iter()
        .map(|grid| match grid.decode() {
            Ok((_meta, content)) => {
                debug!(content = %content, "Detected QR code");
                Barcode::qr(content)
            }
            Err(e) => {
                debug!(error = ?e, "Failed to decode QR code");
                Barcode::unreadable(BarcodeFormat::QrCode)
            }
        })
        .collect();

    if !barcodes.is_empty() {
        debug!(
            count = barcodes.len(),
            total_ms = start.elapsed().as_millis(),
            "QR detection found codes"
        );
    }

    Ok(barcodes)
}

/// Convert the image to tightly packed 8-bit luminance
fn to_luma(image: &OrientedImage) -> Result<GrayImage, DecodeError> {
    let bpp = image.format.bytes_per_pixel() as usize;
    let width = image.width as usize;
    let height = image.height as usize;
    let stride = image.stride as usize;
    let row_bytes = width * bpp;

    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidImage("empty image".to_string()));
    }
    if stride < row_bytes {
        return Err(DecodeError::InvalidImage(format!(
            "stride {} shorter than row of {} bytes",
            stride, row_bytes
        )));
    }
    let needed = stride * (height - 1) + row_bytes;
    if image.data.len() < needed {
        return Err(DecodeError::InvalidImage(format!(
            "buffer holds {} bytes, {}x{} needs {}",
            image.data.len(),
            width,
            height,
            needed
        )));
    }

    let packed = copy_without_stride(&image.data, row_bytes, height, stride);
    let mismatch = || DecodeError::InvalidImage("buffer does not match dimensions".to_string());

    match image.format {
        PixelFormat::Gray8 => GrayImage::from_raw(image.width, image.height, packed).ok_or_else(mismatch),
        PixelFormat::Rgba => {
            let rgba = RgbaImage::from_raw(image.width, image.height, packed).ok_or_else(mismatch)?;
            Ok(DynamicImage::ImageRgba8(rgba).to_luma8())
        }
    }
}

/// Copy frame rows without stride padding
fn copy_without_stride(data: &[u8], row_bytes: usize, height: usize, stride: usize) -> Vec<u8> {
    if stride == row_bytes {
        return data[..row_bytes * height].to_vec();
    }

    let mut result = Vec::with_capacity(row_bytes * height);
    for y in 0..height {
        let row_start = y * stride;
        result.extend_from_slice(&data[row_start..row_start + row_bytes]);
    }
    result
}

fn rotate_upright(image: GrayImage, orientation: Orientation) -> GrayImage {
    match orientation {
        Orientation::Rotate0 => image,
        Orientation::Rotate90 => imageops::rotate90(&image),
        Orientation::Rotate180 => imageops::rotate180(&image),
        Orientation::Rotate270 => imageops::rotate270(&image),
    }
}

fn downscale(image: GrayImage, max_dimension: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    let longest = width.max(height);
    if max_dimension == 0 || longest <= max_dimension {
        return image;
    }

    let scale = max_dimension as f32 / longest as f32;
    let new_width = ((width as f32 * scale) as u32).max(1);
    let new_height = ((height as f32 * scale) as u32).max(1);
    imageops::resize(&image, new_width, new_height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::FrameData;

    /// Render `content` as a QR code: 4px modules, 4 module quiet zone
    fn qr_gray8(content: &str) -> (u32, Vec<u8>) {
        let code = qrcode::QrCode::new(content.as_bytes()).unwrap();
        let modules = code.width();
        let colors = code.to_colors();
        let scale = 4;
        let quiet = 4;
        let side = (modules + 2 * quiet) * scale;

        let mut data = vec![255u8; side * side];
        for my in 0..modules {
            for mx in 0..modules {
                if colors[my * modules + mx] == qrcode::Color::Dark {
                    for dy in 0..scale {
                        for dx in 0..scale {
                            let x = (mx + quiet) * scale + dx;
                            let y = (my + quiet) * scale + dy;
                            data[y * side + x] = 0;
                        }
                    }
                }
            }
        }
        (side as u32, data)
    }

    fn gray_image(side: u32, data: Vec<u8>, orientation: Orientation) -> OrientedImage {
        OrientedImage {
            width: side,
            height: side,
            stride: side,
            format: PixelFormat::Gray8,
            data: FrameData::from(data),
            orientation,
        }
    }

    #[test]
    fn test_detects_qr_code() {
        let (side, data) = qr_gray8("https://example.com");
        let image = gray_image(side, data, Orientation::Rotate0);

        let barcodes = detect_sync(&image, 0).unwrap();
        assert_eq!(barcodes, vec![Barcode::qr("https://example.com")]);
    }

    #[test]
    fn test_detects_rotated_frame() {
        let (side, data) = qr_gray8("rotated");
        let image = gray_image(side, data, Orientation::Rotate90);

        let barcodes = detect_sync(&image, 0).unwrap();
        assert_eq!(barcodes, vec![Barcode::qr("rotated")]);
    }

    #[test]
    fn test_blank_frame_has_no_codes() {
        let image = gray_image(64, vec![255u8; 64 * 64], Orientation::Rotate0);
        assert!(detect_sync(&image, 0).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_short_buffer() {
        let image = gray_image(64, vec![0u8; 100], Orientation::Rotate0);
        assert!(matches!(
            detect_sync(&image, 0),
            Err(DecodeError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_copy_without_stride() {
        // 2x2 gray image with 2 bytes of padding per row
        let data: Vec<u8> = vec![1, 2, 0, 0, 3, 4, 0, 0];
        assert_eq!(copy_without_stride(&data, 2, 2, 4), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_rgba_converted_to_luma() {
        let image = OrientedImage {
            width: 2,
            height: 1,
            stride: 8,
            format: PixelFormat::Rgba,
            data: FrameData::from(vec![255, 255, 255, 255, 0, 0, 0, 255]),
            orientation: Orientation::Rotate0,
        };
        let gray = to_luma(&image).unwrap();
        assert_eq!(gray.get_pixel(0, 0).0[0], 255);
        assert_eq!(gray.get_pixel(1, 0).0[0], 0);
    }

    #[test]
    fn test_downscale_limits_longest_edge() {
        let image = GrayImage::new(1280, 720);
        let scaled = downscale(image, 640);
        assert_eq!(scaled.dimensions(), (640, 360));
    }

    #[tokio::test]
    async fn test_filter_without_qr_returns_nothing() {
        let (side, data) = qr_gray8("filtered");
        let image = gray_image(side, data, Orientation::Rotate0);
        let detector = QrDetector::new();

        let result = detector
            .detect(image, &DetectorOptions { formats: vec![] })
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_async_detect() {
        let (side, data) = qr_gray8("async");
        let image = gray_image(side, data, Orientation::Rotate180);
        let detector = QrDetector::with_max_dimension(640);

        let result = detector
            .detect(image, &DetectorOptions::qr_only())
            .await
            .unwrap();
        assert_eq!(result, vec![Barcode::qr("async")]);
    }
}
