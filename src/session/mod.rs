// SPDX-License-Identifier: GPL-3.0-only

//! Camera session management
//!
//! Turns screen metrics into a [`CameraConfiguration`] and (re)binds the
//! preview and analysis streams through a [`CaptureProvider`]. Binding always
//! unbinds first, so a rotation or resize simply calls [`start`] again.
//!
//! [`start`]: CameraSessionManager::start

pub mod aspect_ratio;

pub use aspect_ratio::AspectRatio;

use crate::backends::camera::{
    AnalysisSlot, CameraConfiguration, CaptureProvider, LatestSlot, LensFacing, Rotation,
};
use crate::display::DisplaySink;
use crate::errors::BindError;
use std::sync::Arc;
use tracing::{debug, error, info};

/// The configuration that is currently bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraHandle {
    pub config: CameraConfiguration,
    pub device_name: String,
    pub width: u32,
    pub height: u32,
}

/// Owns the capture provider and the analysis slot shared with the worker
pub struct CameraSessionManager<P: CaptureProvider> {
    provider: P,
    lens_facing: LensFacing,
    display: Arc<dyn DisplaySink>,
    analysis: AnalysisSlot,
    active: Option<CameraHandle>,
}

impl<P: CaptureProvider> CameraSessionManager<P> {
    pub fn new(provider: P, lens_facing: LensFacing, display: Arc<dyn DisplaySink>) -> Self {
        Self {
            provider,
            lens_facing,
            display,
            analysis: Arc::new(LatestSlot::new()),
            active: None,
        }
    }

    /// Slot the analysis stream publishes into; survives rebinds
    pub fn analysis_slot(&self) -> AnalysisSlot {
        self.analysis.clone()
    }

    /// Currently bound configuration
    pub fn active(&self) -> Option<&CameraHandle> {
        self.active.as_ref()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Configure and start capture for the given screen metrics
    ///
    /// On failure the session is left unbound; nothing is retried.
    pub fn start(
        &mut self,
        screen_width: u32,
        screen_height: u32,
        rotation: Rotation,
    ) -> Result<CameraHandle, BindError> {
        debug!(screen_width, screen_height, "Screen metrics");
        let aspect_ratio = AspectRatio::nearest(screen_width, screen_height);
        debug!(aspect_ratio = %aspect_ratio, "Preview aspect ratio");

        let config = CameraConfiguration {
            lens_facing: self.lens_facing,
            aspect_ratio,
            rotation,
        };

        // Must unbind before rebinding
        self.stop();

        let streams = self
            .provider
            .bind(&config, self.display.preview_surface(), self.analysis.clone())
            .inspect_err(|e| error!(error = %e, "Use case binding failed"))?;

        let handle = CameraHandle {
            config,
            device_name: streams.device_name,
            width: streams.width,
            height: streams.height,
        };
        info!(
            device = %handle.device_name,
            width = handle.width,
            height = handle.height,
            "Camera session started"
        );
        self.active = Some(handle.clone());
        Ok(handle)
    }

    /// Unbind all streams
    pub fn stop(&mut self) {
        self.provider.unbind_all();
        if let Some(previous) = self.active.take() {
            debug!(device = %previous.device_name, "Previous session unbound");
        }
    }
}

impl<P: CaptureProvider> Drop for CameraSessionManager<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::BoundStreams;
    use crate::display::{PreviewSurface, display_channel};

    #[derive(Default)]
    struct CountingProvider {
        bound: usize,
        binds: usize,
        unbinds: usize,
        fail: bool,
        last: Option<CameraConfiguration>,
    }

    impl CaptureProvider for CountingProvider {
        fn bind(
            &mut self,
            config: &CameraConfiguration,
            _preview: PreviewSurface,
            _analysis: AnalysisSlot,
        ) -> Result<BoundStreams, BindError> {
            self.binds += 1;
            if self.fail {
                return Err(BindError::NoCameraFound);
            }
            self.bound += 1;
            self.last = Some(*config);
            let (width, height) = config.aspect_ratio.target_resolution();
            Ok(BoundStreams {
                device_name: "fake".to_string(),
                width,
                height,
            })
        }

        fn unbind_all(&mut self) {
            self.unbinds += 1;
            self.bound = 0;
        }

        fn bound_count(&self) -> usize {
            self.bound
        }
    }

    fn manager(provider: CountingProvider) -> CameraSessionManager<CountingProvider> {
        let (handle, _state) = display_channel();
        CameraSessionManager::new(provider, LensFacing::Front, Arc::new(handle))
    }

    #[test]
    fn test_start_computes_configuration() {
        let mut session = manager(CountingProvider::default());
        let handle = session.start(1080, 1920, Rotation::Rotate90).unwrap();

        assert_eq!(
            handle.config,
            CameraConfiguration {
                lens_facing: LensFacing::Front,
                aspect_ratio: AspectRatio::Ratio16x9,
                rotation: Rotation::Rotate90,
            }
        );
        assert_eq!((handle.width, handle.height), (640, 360));
        assert_eq!(session.active(), Some(&handle));
    }

    #[test]
    fn test_restart_keeps_single_binding() {
        let mut session = manager(CountingProvider::default());
        session.start(1080, 1920, Rotation::Rotate0).unwrap();
        session.start(1920, 1080, Rotation::Rotate90).unwrap();

        let provider = session.provider();
        assert_eq!(provider.bound_count(), 1);
        assert_eq!(provider.binds, 2);
        assert_eq!(provider.unbinds, 2);
        assert_eq!(provider.last.unwrap().rotation, Rotation::Rotate90);
    }

    #[test]
    fn test_bind_failure_leaves_session_unbound() {
        let mut session = manager(CountingProvider {
            fail: true,
            ..Default::default()
        });

        assert_eq!(
            session.start(640, 480, Rotation::Rotate0),
            Err(BindError::NoCameraFound)
        );
        assert!(session.active().is_none());
        assert_eq!(session.provider().bound_count(), 0);
        assert_eq!(session.provider().binds, 1);
    }

    #[test]
    fn test_analysis_slot_survives_rebind() {
        let mut session = manager(CountingProvider::default());
        let slot = session.analysis_slot();
        session.start(640, 480, Rotation::Rotate0).unwrap();
        session.start(640, 480, Rotation::Rotate180).unwrap();
        assert!(Arc::ptr_eq(&slot, &session.analysis_slot()));
    }
}
