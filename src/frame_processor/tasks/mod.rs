// SPDX-License-Identifier: GPL-3.0-only

//! Barcode decoding services
//!
//! The analyzer treats decoding as an opaque asynchronous service: it hands
//! over an oriented image plus a format filter and eventually gets back a list
//! of symbols or a failure.

pub mod qr_detector;

pub use qr_detector::QrDetector;

use super::types::{Barcode, DetectorOptions, OrientedImage};
use crate::errors::DecodeError;
use futures::future::BoxFuture;

/// Asynchronous barcode detection
pub trait BarcodeDecoder: Send + Sync {
    /// Detect symbols in `image`, reporting only formats accepted by `options`
    ///
    /// The returned future always completes, either with the (possibly empty)
    /// list of symbols or with an error.
    fn detect(
        &self,
        image: OrientedImage,
        options: &DetectorOptions,
    ) -> BoxFuture<'static, Result<Vec<Barcode>, DecodeError>>;
}
