// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer capture provider
//!
//! One bound configuration is a single pipeline with a tee feeding two
//! appsinks: an RGBA preview branch and a GRAY8 analysis branch. The analysis
//! branch keeps at most one buffer queued and drops older ones, and its appsink
//! callback publishes into a [`LatestSlot`](super::LatestSlot), so a busy
//! analyzer never stalls the camera.

use super::enumeration::{enumerate_cameras, select_device};
use super::types::*;
use super::{AnalysisSlot, BoundStreams, CaptureProvider};
use crate::constants::{pipeline, timing};
use crate::display::PreviewSurface;
use crate::errors::BindError;
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, trace, warn};

/// Counters shared between the streaming thread and the provider
#[derive(Default)]
struct StreamStats {
    delivered: AtomicU64,
    released: AtomicU64,
}

/// A running pipeline; stopping happens on drop
struct BoundPipeline {
    pipeline: gstreamer::Pipeline,
    preview_sink: AppSink,
    analysis_sink: AppSink,
    preview: PreviewSurface,
    stats: Arc<StreamStats>,
    device_name: String,
}

impl Drop for BoundPipeline {
    fn drop(&mut self) {
        info!(device = %self.device_name, "Unbinding camera streams");

        // Clear callbacks first so no frame is published after this point
        self.preview_sink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());
        self.analysis_sink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());

        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!(error = %e, "Failed to stop pipeline");
        }
        let (result, state, _) = self.pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::STOP_TIMEOUT_SECS,
        ));
        debug!(result = ?result, state = ?state, "Pipeline stopped");

        self.preview.clear();
        info!(
            delivered = self.stats.delivered.load(Ordering::Relaxed),
            released = self.stats.released.load(Ordering::Relaxed),
            "Analysis stream statistics"
        );
    }
}

/// Capture provider backed by GStreamer device providers (PipeWire, V4L2)
pub struct GstCaptureProvider {
    preferred_device: Option<String>,
    active: Vec<BoundPipeline>,
}

impl GstCaptureProvider {
    /// `preferred_device` selects a camera by name instead of by lens
    pub fn new(preferred_device: Option<String>) -> Self {
        Self {
            preferred_device,
            active: Vec::new(),
        }
    }
}

impl CaptureProvider for GstCaptureProvider {
    fn bind(
        &mut self,
        config: &CameraConfiguration,
        preview: PreviewSurface,
        analysis: AnalysisSlot,
    ) -> Result<BoundStreams, BindError> {
        let cameras = enumerate_cameras()?;
        let camera = select_device(&cameras, config.lens_facing, self.preferred_device.as_deref())
            .ok_or(BindError::NoCameraFound)?;

        let (width, height) = config.aspect_ratio.target_resolution();
        let rotation = relative_rotation(camera.sensor_rotation, config.rotation, config.lens_facing);

        info!(
            camera = %camera.name,
            aspect_ratio = %config.aspect_ratio,
            target_rotation = %config.rotation,
            frame_rotation = rotation,
            width,
            height,
            "Binding camera streams"
        );

        let bound = build_pipeline(camera, width, height, rotation, preview, analysis)?;
        self.active.push(bound);

        Ok(BoundStreams {
            device_name: camera.name.clone(),
            width,
            height,
        })
    }

    fn unbind_all(&mut self) {
        // Dropping each pipeline stops it
        self.active.clear();
    }

    fn bound_count(&self) -> usize {
        self.active.len()
    }
}

/// Description of everything downstream of the camera source
fn branch_description(width: u32, height: u32) -> String {
    format!(
        "videoconvert ! videoscale ! video/x-raw,width={w},height={h} ! tee name=t \
         t. ! queue max-size-buffers={pb} leaky=downstream ! videoconvert \
            ! video/x-raw,format={pf} ! appsink name={ps} \
         t. ! queue max-size-buffers={ab} leaky=downstream ! videoconvert \
            ! video/x-raw,format={af} ! appsink name={asink}",
        w = width,
        h = height,
        pb = pipeline::PREVIEW_MAX_BUFFERS,
        pf = PixelFormat::Rgba.to_gst_format_string(),
        ps = pipeline::PREVIEW_SINK,
        ab = pipeline::ANALYSIS_MAX_BUFFERS,
        af = PixelFormat::Gray8.to_gst_format_string(),
        asink = pipeline::ANALYSIS_SINK,
    )
}

fn build_pipeline(
    camera: &CameraDevice,
    width: u32,
    height: u32,
    rotation: u32,
    preview: PreviewSurface,
    analysis: AnalysisSlot,
) -> Result<BoundPipeline, BindError> {
    let source = match &camera.device {
        Some(device) => device.create_element(Some("source")),
        None => gstreamer::ElementFactory::make("autovideosrc")
            .name("source")
            .build(),
    }
    .map_err(|e| BindError::PipelineFailed(format!("Failed to create source: {}", e)))?;

    let branches = gstreamer::parse::bin_from_description(&branch_description(width, height), true)
        .map_err(|e| BindError::PipelineFailed(format!("Failed to build branches: {}", e)))?;

    let gst_pipeline = gstreamer::Pipeline::new();
    gst_pipeline
        .add(&source)
        .and_then(|_| gst_pipeline.add(&branches))
        .and_then(|_| source.link(&branches))
        .map_err(|e| BindError::PipelineFailed(format!("Failed to link source: {}", e)))?;

    let preview_sink = appsink(&branches, pipeline::PREVIEW_SINK)?;
    let analysis_sink = appsink(&branches, pipeline::ANALYSIS_SINK)?;

    for (sink, max_buffers) in [
        (&preview_sink, pipeline::PREVIEW_MAX_BUFFERS),
        (&analysis_sink, pipeline::ANALYSIS_MAX_BUFFERS),
    ] {
        sink.set_property("sync", false);
        sink.set_property("max-buffers", max_buffers);
        sink.set_property("drop", true);
        sink.set_property("enable-last-sample", false);
    }

    let stats = Arc::new(StreamStats::default());

    let preview_target = preview.clone();
    preview_sink.set_callbacks(
        gstreamer_app::AppSinkCallbacks::builder()
            .new_sample(move |sink| {
                if let Some(frame) = pull_frame(sink, PixelFormat::Rgba, rotation)? {
                    preview_target.present(frame);
                }
                Ok(gstreamer::FlowSuccess::Ok)
            })
            .build(),
    );

    let analysis_stats = stats.clone();
    analysis_sink.set_callbacks(
        gstreamer_app::AppSinkCallbacks::builder()
            .new_sample(move |sink| {
                let Some(frame) = pull_frame(sink, PixelFormat::Gray8, rotation)? else {
                    return Ok(gstreamer::FlowSuccess::Ok);
                };
                let sequence = analysis_stats.delivered.fetch_add(1, Ordering::Relaxed);
                let released = analysis_stats.clone();
                let frame = frame
                    .with_sequence(sequence)
                    .on_release(move || {
                        released.released.fetch_add(1, Ordering::Relaxed);
                    });

                if sequence % timing::FRAME_LOG_INTERVAL == 0 {
                    debug!(sequence, "Analysis frame delivered");
                }
                if !analysis.publish(frame) {
                    // Slot closed during teardown
                    return Err(gstreamer::FlowError::Flushing);
                }
                Ok(gstreamer::FlowSuccess::Ok)
            })
            .build(),
    );

    debug!("Setting pipeline to PLAYING state");
    if let Err(e) = gst_pipeline.set_state(gstreamer::State::Playing) {
        let _ = gst_pipeline.set_state(gstreamer::State::Null);
        return Err(BindError::PipelineFailed(format!(
            "Failed to start pipeline: {}",
            e
        )));
    }

    let (result, state, pending) = gst_pipeline.state(gstreamer::ClockTime::from_seconds(
        timing::START_TIMEOUT_SECS,
    ));
    debug!(result = ?result, state = ?state, pending = ?pending, "Pipeline state");
    if let Err(e) = result {
        error!(error = ?e, "Pipeline failed to reach PLAYING");
        let _ = gst_pipeline.set_state(gstreamer::State::Null);
        return Err(BindError::Unsupported(format!(
            "Camera rejected {}x{}: {:?}",
            width, height, e
        )));
    }
    if state != gstreamer::State::Playing {
        warn!("Pipeline is not in PLAYING state yet");
    }

    Ok(BoundPipeline {
        pipeline: gst_pipeline,
        preview_sink,
        analysis_sink,
        preview,
        stats,
        device_name: camera.name.clone(),
    })
}

fn appsink(bin: &gstreamer::Bin, name: &str) -> Result<AppSink, BindError> {
    bin.by_name(name)
        .ok_or_else(|| BindError::PipelineFailed(format!("Missing appsink '{}'", name)))?
        .dynamic_cast::<AppSink>()
        .map_err(|_| BindError::PipelineFailed(format!("Element '{}' is not an appsink", name)))
}

/// Pull one sample from an appsink and wrap it without copying
///
/// Corrupted buffers are skipped (`Ok(None)`) without failing the stream.
fn pull_frame(
    sink: &AppSink,
    format: PixelFormat,
    rotation: u32,
) -> Result<Option<Frame>, gstreamer::FlowError> {
    let sample = sink.pull_sample().map_err(|_| gstreamer::FlowError::Eos)?;

    let caps = sample.caps().ok_or(gstreamer::FlowError::Error)?;
    let info = VideoInfo::from_caps(caps).map_err(|e| {
        error!(error = ?e, "Failed to get video info");
        gstreamer::FlowError::Error
    })?;

    let buffer = sample.buffer_owned().ok_or(gstreamer::FlowError::Error)?;
    if buffer.flags().contains(gstreamer::BufferFlags::CORRUPTED) {
        trace!("Skipping corrupted buffer");
        return Ok(None);
    }
    let mapped = buffer.into_mapped_buffer_readable().map_err(|_| {
        error!("Failed to map buffer");
        gstreamer::FlowError::Error
    })?;

    Ok(Some(Frame::new(
        info.width(),
        info.height(),
        info.stride()[0] as u32,
        format,
        FrameData::from_mapped_buffer(mapped),
        rotation,
    )))
}
