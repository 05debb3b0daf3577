// SPDX-License-Identifier: GPL-3.0-only

//! Frame analysis for the live QR reader
//!
//! [`FrameAnalyzer`] is the per-frame callback of the analysis stream: it maps
//! the frame's rotation, submits it to a [`BarcodeDecoder`], writes the result
//! to the display and releases the frame. [`AnalysisWorker`] is the single
//! task that feeds it from the keep-only-latest slot, so frames are never
//! analyzed concurrently and results reach the display in delivery order.

pub mod tasks;
pub mod types;

pub use tasks::{BarcodeDecoder, QrDetector};
pub use types::{Barcode, BarcodeFormat, DetectorOptions, Orientation, OrientedImage};

use crate::backends::camera::{AnalysisSlot, Frame};
use crate::display::DisplaySink;
use crate::errors::AnalysisError;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, debug_span, error, info, warn};

/// Per-frame QR analysis
pub struct FrameAnalyzer {
    decoder: Arc<dyn BarcodeDecoder>,
    display: Arc<dyn DisplaySink>,
    options: DetectorOptions,
}

impl FrameAnalyzer {
    /// Analyzer restricted to QR codes
    pub fn new(decoder: Arc<dyn BarcodeDecoder>, display: Arc<dyn DisplaySink>) -> Self {
        Self {
            decoder,
            display,
            options: DetectorOptions::qr_only(),
        }
    }

    /// Analyze one frame
    ///
    /// The frame is released exactly once before this returns, whatever the
    /// outcome. An invalid rotation is returned as an error and leaves the
    /// display untouched; decode failures are logged and clear the text.
    pub async fn analyze(&self, frame: Frame) -> Result<(), AnalysisError> {
        let orientation = match Orientation::from_degrees(frame.rotation_degrees) {
            Ok(orientation) => orientation,
            Err(e) => {
                frame.close();
                return Err(e);
            }
        };

        let image = OrientedImage::from_frame(&frame, orientation);
        let text = match self.decoder.detect(image, &self.options).await {
            Ok(barcodes) => types::display_text(&barcodes),
            Err(e) => {
                warn!(error = %e, "Occurred error while recognizing QR code");
                None
            }
        };

        // Decoding is done with the buffer
        frame.close();

        match &text {
            Some(text) => debug!(lines = text.lines().count(), "Showing decoded text"),
            None => debug!("No QR code found, clearing text"),
        }
        self.display.set_text(text);
        Ok(())
    }
}

/// The single background task that runs the analyzer
pub struct AnalysisWorker {
    slot: AnalysisSlot,
    handle: JoinHandle<()>,
}

impl AnalysisWorker {
    /// Start consuming `slot` on the current tokio runtime
    pub fn spawn(slot: AnalysisSlot, analyzer: Arc<FrameAnalyzer>) -> Self {
        let consumer = slot.clone();
        let handle = tokio::spawn(async move {
            info!("Analysis worker started");
            while let Some(frame) = consumer.next().await {
                let sequence = frame.sequence;
                let span = debug_span!("analyze", sequence);
                if let Err(e) = analyzer.analyze(frame).instrument(span).await {
                    error!(sequence, error = %e, "Frame analysis failed");
                }
            }
            info!("Analysis worker stopped");
        });

        Self { slot, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the worker; a frame being analyzed is abandoned (and released)
    pub async fn shutdown(self) {
        self.slot.close();
        self.handle.abort();
        let _ = self.handle.await;
        let (published, dropped) = self.slot.stats();
        info!(published, dropped, "Analysis worker shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{LatestSlot, PixelFormat};
    use crate::display::display_channel;
    use crate::errors::DecodeError;
    use futures::FutureExt;
    use futures::future::BoxFuture;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Decoder returning a fixed result and recording what it was asked
    struct FixedDecoder {
        result: Result<Vec<Barcode>, DecodeError>,
        seen: Mutex<Vec<(Orientation, DetectorOptions)>>,
    }

    impl FixedDecoder {
        fn new(result: Result<Vec<Barcode>, DecodeError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl BarcodeDecoder for FixedDecoder {
        fn detect(
            &self,
            image: OrientedImage,
            options: &DetectorOptions,
        ) -> BoxFuture<'static, Result<Vec<Barcode>, DecodeError>> {
            self.seen
                .lock()
                .unwrap()
                .push((image.orientation, options.clone()));
            let result = self.result.clone();
            async move { result }.boxed()
        }
    }

    fn counted_frame(rotation: u32, released: &Arc<AtomicUsize>) -> Frame {
        let counter = released.clone();
        Frame::packed(4, 4, PixelFormat::Gray8, vec![0u8; 16])
            .with_rotation(rotation)
            .on_release(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
    }

    #[tokio::test]
    async fn test_shows_joined_non_empty_values() {
        let decoder = FixedDecoder::new(Ok(vec![
            Barcode::qr("ABC"),
            Barcode::qr(""),
            Barcode::unreadable(BarcodeFormat::QrCode),
        ]));
        let (handle, mut state) = display_channel();
        let analyzer = FrameAnalyzer::new(decoder.clone(), Arc::new(handle));
        let released = Arc::new(AtomicUsize::new(0));

        analyzer.analyze(counted_frame(90, &released)).await.unwrap();
        state.apply_pending();

        assert_eq!(state.text(), Some("ABC"));
        assert_eq!(released.load(Ordering::SeqCst), 1);

        let seen = decoder.seen.lock().unwrap();
        assert_eq!(seen[0], (Orientation::Rotate90, DetectorOptions::qr_only()));
    }

    #[tokio::test]
    async fn test_empty_result_clears_previous_text() {
        let (handle, mut state) = display_channel();
        handle.set_text(Some("stale".to_string()));
        state.apply_pending();

        let analyzer = FrameAnalyzer::new(FixedDecoder::new(Ok(vec![])), Arc::new(handle));
        let released = Arc::new(AtomicUsize::new(0));
        analyzer.analyze(counted_frame(0, &released)).await.unwrap();
        state.apply_pending();

        assert_eq!(state.text(), None);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_decode_failure_clears_text_and_releases() {
        let (handle, mut state) = display_channel();
        handle.set_text(Some("stale".to_string()));

        let decoder = FixedDecoder::new(Err(DecodeError::TaskFailed("boom".to_string())));
        let analyzer = FrameAnalyzer::new(decoder, Arc::new(handle));
        let released = Arc::new(AtomicUsize::new(0));

        assert!(analyzer.analyze(counted_frame(180, &released)).await.is_ok());
        state.apply_pending();

        assert_eq!(state.text(), None);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_rotation_is_error_but_releases() {
        let decoder = FixedDecoder::new(Ok(vec![Barcode::qr("never")]));
        let (handle, mut state) = display_channel();
        let analyzer = FrameAnalyzer::new(decoder.clone(), Arc::new(handle));
        let released = Arc::new(AtomicUsize::new(0));

        let result = analyzer.analyze(counted_frame(45, &released)).await;
        assert_eq!(result, Err(AnalysisError::InvalidRotation(45)));
        assert_eq!(released.load(Ordering::SeqCst), 1);

        assert_eq!(state.apply_pending(), 0);
        assert!(decoder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_worker_processes_until_shutdown() {
        let decoder = FixedDecoder::new(Ok(vec![Barcode::qr("worker")]));
        let (handle, mut state) = display_channel();
        let analyzer = Arc::new(FrameAnalyzer::new(decoder, Arc::new(handle)));
        let slot: AnalysisSlot = Arc::new(LatestSlot::new());
        let released = Arc::new(AtomicUsize::new(0));

        let worker = AnalysisWorker::spawn(slot.clone(), analyzer);
        slot.publish(counted_frame(0, &released));

        assert!(state.next_update().await);
        assert_eq!(state.text(), Some("worker"));

        worker.shutdown().await;
        assert!(slot.is_closed());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
