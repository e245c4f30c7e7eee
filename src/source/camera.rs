//! GStreamer camera capture
//!
//! Builds a `src ! caps ! queue ! videoconvert ! jpegenc ! appsink` pipeline
//! and writes every encoded sample straight into the sink from the GStreamer
//! streaming thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;

use super::{FrameSource, SourceConfig, SourceError};
use crate::buffer::FrameSink;

/// Camera frame source
///
/// With no device the libcamera source is used (Raspberry Pi camera
/// modules); with a device path the V4L2 source reads that node.
pub struct Camera {
    config: SourceConfig,
    device: Option<String>,
    pipeline: Option<gst::Pipeline>,
    running: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
}

impl Camera {
    pub fn new(config: SourceConfig, device: Option<String>) -> Result<Self, SourceError> {
        gst::init().map_err(|e| SourceError::Camera(e.to_string()))?;

        Ok(Self {
            config,
            device,
            pipeline: None,
            running: Arc::new(AtomicBool::new(false)),
            frames: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Frames captured so far
    pub fn frames_captured(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    fn pipeline_description(&self) -> String {
        let source = match self.device {
            Some(ref device) => format!("v4l2src device={}", device),
            None => "libcamerasrc".to_string(),
        };

        format!(
            "{} ! video/x-raw,width={},height={},framerate={}/1 \
             ! queue max-size-buffers=2 leaky=downstream ! videoconvert \
             ! jpegenc quality={} ! appsink name=sink",
            source,
            self.config.resolution.width,
            self.config.resolution.height,
            self.config.fps,
            self.config.quality
        )
    }
}

impl FrameSource for Camera {
    fn name(&self) -> &'static str {
        "camera"
    }

    fn start(&mut self, sink: Arc<dyn FrameSink>) -> Result<(), SourceError> {
        if self.running.load(Ordering::Relaxed) {
            return Err(SourceError::AlreadyRunning);
        }
        self.config.validate()?;

        tracing::info!(
            device = self.device.as_deref().unwrap_or("libcamera"),
            resolution = %self.config.resolution,
            fps = self.config.fps,
            quality = self.config.quality,
            "Starting camera capture"
        );

        let description = self.pipeline_description();
        tracing::debug!(pipeline = %description, "Creating GStreamer pipeline");

        let pipeline = gst::parse::launch(&description)
            .map_err(|e| SourceError::Camera(e.to_string()))?
            .dynamic_cast::<gst::Pipeline>()
            .map_err(|_| SourceError::Camera("not a pipeline".to_string()))?;

        let app_sink = pipeline
            .by_name("sink")
            .ok_or_else(|| SourceError::Camera("no appsink in pipeline".to_string()))?
            .dynamic_cast::<gst_app::AppSink>()
            .map_err(|_| SourceError::Camera("sink is not an appsink".to_string()))?;

        app_sink.set_property("max-buffers", 2u32);
        app_sink.set_property("drop", true);
        app_sink.set_property("emit-signals", false);

        let running = Arc::clone(&self.running);
        let frames = Arc::clone(&self.frames);

        app_sink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    if !running.load(Ordering::Relaxed) {
                        return Ok(gst::FlowSuccess::Ok);
                    }

                    let sample = appsink.pull_sample().map_err(|_| gst::FlowError::Error)?;
                    let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
                    let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;

                    // The mapped memory belongs to the pipeline
                    sink.write_frame(Bytes::copy_from_slice(map.as_slice()));
                    frames.fetch_add(1, Ordering::Relaxed);

                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );

        self.running.store(true, Ordering::Relaxed);

        if let Err(e) = pipeline.set_state(gst::State::Playing) {
            self.running.store(false, Ordering::Relaxed);
            let _ = pipeline.set_state(gst::State::Null);
            return Err(SourceError::Camera(format!("failed to start pipeline: {:?}", e)));
        }

        self.pipeline = Some(pipeline);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SourceError> {
        self.running.store(false, Ordering::Relaxed);

        if let Some(pipeline) = self.pipeline.take() {
            pipeline
                .set_state(gst::State::Null)
                .map_err(|e| SourceError::Camera(format!("failed to stop pipeline: {:?}", e)))?;
            tracing::info!(frames = self.frames_captured(), "Camera capture stopped");
        }

        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(pipeline) = self.pipeline.take() {
            let _ = pipeline.set_state(gst::State::Null);
        }
    }
}
