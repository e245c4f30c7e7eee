//! Frame producers
//!
//! A [`FrameSource`] captures and JPEG-encodes frames on its own schedule and
//! pushes each one into a [`FrameSink`]. The server never pulls from a
//! source; it only reads the buffer the source writes to.
//!
//! [`Recording`] ties a running source to a scope so that it is stopped on
//! every exit path.

#[cfg(feature = "camera")]
pub mod camera;
pub mod pattern;

#[cfg(feature = "camera")]
pub use camera::Camera;
pub use pattern::TestPattern;

use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::buffer::FrameSink;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("invalid source configuration: {0}")]
    InvalidConfig(String),

    #[error("source already running")]
    AlreadyRunning,

    #[error("failed to spawn capture thread: {0}")]
    Thread(#[from] std::io::Error),

    #[error("capture thread panicked")]
    WorkerPanicked,

    #[error("JPEG encoding failed: {0}")]
    Encode(String),

    #[error("camera error: {0}")]
    Camera(String),
}

/// Capture size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid resolution {0:?}, expected <width>x<height> such as 640x480")]
pub struct ParseResolutionError(String);

impl FromStr for Resolution {
    type Err = ParseResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s
            .split_once('x')
            .ok_or_else(|| ParseResolutionError(s.to_string()))?;

        let width = width
            .parse()
            .map_err(|_| ParseResolutionError(s.to_string()))?;
        let height = height
            .parse()
            .map_err(|_| ParseResolutionError(s.to_string()))?;

        Ok(Self { width, height })
    }
}

/// Largest width or height a JPEG frame can carry
pub const MAX_DIMENSION: u32 = u16::MAX as u32;

/// Capture and encoding settings shared by all sources
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub resolution: Resolution,
    pub fps: u32,
    /// JPEG quality (1-100)
    pub quality: u8,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            fps: 24,
            quality: 85,
        }
    }
}

impl SourceConfig {
    pub fn validate(&self) -> Result<(), SourceError> {
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(SourceError::InvalidConfig(format!(
                "width and height must be > 0, got {}",
                self.resolution
            )));
        }

        if self.resolution.width > MAX_DIMENSION || self.resolution.height > MAX_DIMENSION {
            return Err(SourceError::InvalidConfig(format!(
                "width and height must be at most {}, got {}",
                MAX_DIMENSION, self.resolution
            )));
        }

        if self.fps == 0 || self.fps > 120 {
            return Err(SourceError::InvalidConfig(format!(
                "FPS must be between 1 and 120, got {}",
                self.fps
            )));
        }

        if self.quality == 0 || self.quality > 100 {
            return Err(SourceError::InvalidConfig(format!(
                "quality must be between 1 and 100, got {}",
                self.quality
            )));
        }

        Ok(())
    }
}

/// A producer of encoded JPEG frames
pub trait FrameSource: Send {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Begin delivering frames to `sink`
    ///
    /// Frames arrive from the source's own thread at its own cadence.
    fn start(&mut self, sink: Arc<dyn FrameSink>) -> Result<(), SourceError>;

    /// Stop delivering frames; a no-op when not running
    fn stop(&mut self) -> Result<(), SourceError>;

    fn is_running(&self) -> bool;
}

/// A started source that is stopped when this guard goes away
pub struct Recording {
    source: Box<dyn FrameSource>,
}

impl Recording {
    /// Start `source` writing into `sink`
    pub fn start(
        mut source: Box<dyn FrameSource>,
        sink: Arc<dyn FrameSink>,
    ) -> Result<Self, SourceError> {
        source.start(sink)?;
        tracing::info!(source = source.name(), "Recording started");
        Ok(Self { source })
    }

    pub fn source(&self) -> &dyn FrameSource {
        self.source.as_ref()
    }

    /// Stop the source and report the outcome
    pub fn stop(mut self) -> Result<(), SourceError> {
        self.stop_source()
    }

    fn stop_source(&mut self) -> Result<(), SourceError> {
        if !self.source.is_running() {
            return Ok(());
        }

        self.source.stop()?;
        tracing::info!(source = self.source.name(), "Recording stopped");
        Ok(())
    }
}

impl Drop for Recording {
    fn drop(&mut self) {
        if let Err(e) = self.stop_source() {
            tracing::warn!(source = self.source.name(), error = %e, "Failed to stop recording");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use bytes::Bytes;

    use super::*;
    use crate::buffer::FrameBuffer;

    #[test]
    fn test_parse_resolution() {
        assert_eq!("640x480".parse(), Ok(Resolution::new(640, 480)));
        assert_eq!("1920x1080".parse(), Ok(Resolution::new(1920, 1080)));
    }

    #[test]
    fn test_parse_resolution_rejects_bad_input() {
        for input in ["", "640", "640x", "x480", "640X480", "640x480x2", "-1x480", "a x b"] {
            assert!(input.parse::<Resolution>().is_err(), "accepted {:?}", input);
        }
    }

    #[test]
    fn test_resolution_display() {
        assert_eq!(Resolution::new(800, 600).to_string(), "800x600");
    }

    #[test]
    fn test_validate_config() {
        assert!(SourceConfig::default().validate().is_ok());

        let zero_fps = SourceConfig {
            fps: 0,
            ..Default::default()
        };
        assert!(zero_fps.validate().is_err());

        let zero_width = SourceConfig {
            resolution: Resolution::new(0, 480),
            ..Default::default()
        };
        assert!(zero_width.validate().is_err());

        let bad_quality = SourceConfig {
            quality: 101,
            ..Default::default()
        };
        assert!(bad_quality.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_frames() {
        let widest = SourceConfig {
            resolution: Resolution::new(MAX_DIMENSION, 480),
            ..Default::default()
        };
        assert!(widest.validate().is_ok());

        let too_wide = SourceConfig {
            resolution: Resolution::new(MAX_DIMENSION + 1, 480),
            ..Default::default()
        };
        assert!(too_wide.validate().is_err());

        let too_tall = SourceConfig {
            resolution: Resolution::new(640, 100_000),
            ..Default::default()
        };
        assert!(too_tall.validate().is_err());
    }

    /// Source that publishes one frame on start and counts stops
    struct OneShot {
        running: Arc<AtomicBool>,
        stops: Arc<AtomicU32>,
    }

    impl FrameSource for OneShot {
        fn name(&self) -> &'static str {
            "one-shot"
        }

        fn start(&mut self, sink: Arc<dyn FrameSink>) -> Result<(), SourceError> {
            sink.write_frame(Bytes::from_static(b"hello"));
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&mut self) -> Result<(), SourceError> {
            self.running.store(false, Ordering::SeqCst);
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }
    }

    fn one_shot() -> (OneShot, Arc<AtomicBool>, Arc<AtomicU32>) {
        let running = Arc::new(AtomicBool::new(false));
        let stops = Arc::new(AtomicU32::new(0));
        let source = OneShot {
            running: Arc::clone(&running),
            stops: Arc::clone(&stops),
        };
        (source, running, stops)
    }

    #[test]
    fn test_recording_stops_on_drop() {
        let buffer = Arc::new(FrameBuffer::new());
        let (source, running, stops) = one_shot();

        {
            let _recording = Recording::start(Box::new(source), buffer.clone()).unwrap();
            assert!(running.load(Ordering::SeqCst));
            assert_eq!(buffer.published_count(), 1);
        }

        assert!(!running.load(Ordering::SeqCst));
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_recording_explicit_stop_runs_once() {
        let buffer = Arc::new(FrameBuffer::new());
        let (source, _running, stops) = one_shot();

        let recording = Recording::start(Box::new(source), buffer).unwrap();
        assert_eq!(recording.source().name(), "one-shot");
        recording.stop().unwrap();

        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }
}
