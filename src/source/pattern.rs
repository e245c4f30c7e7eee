//! Synthetic test-pattern source
//!
//! Renders scrolling colour bars with a moving scan line, encodes each frame
//! as JPEG and writes it to the sink at the configured frame rate. Useful on
//! machines without a camera and for exercising the stream end to end.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

use super::{FrameSource, SourceConfig, SourceError};
use crate::buffer::FrameSink;

/// SMPTE-style bar colours, left to right
const BARS: [[u8; 3]; 7] = [
    [192, 192, 192],
    [192, 192, 0],
    [0, 192, 192],
    [0, 192, 0],
    [192, 0, 192],
    [192, 0, 0],
    [0, 0, 192],
];

const SCAN_LINE_HEIGHT: u32 = 4;

/// Test-pattern frame source backed by a dedicated thread
pub struct TestPattern {
    config: SourceConfig,
    running: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl TestPattern {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            frames: Arc::new(AtomicU64::new(0)),
            worker: None,
        }
    }

    /// Frames written to the sink so far
    pub fn frames_produced(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

impl FrameSource for TestPattern {
    fn name(&self) -> &'static str {
        "test-pattern"
    }

    fn start(&mut self, sink: Arc<dyn FrameSink>) -> Result<(), SourceError> {
        if self.running.load(Ordering::Relaxed) {
            return Err(SourceError::AlreadyRunning);
        }
        self.config.validate()?;

        tracing::info!(
            resolution = %self.config.resolution,
            fps = self.config.fps,
            quality = self.config.quality,
            "Starting test pattern"
        );

        self.running.store(true, Ordering::Relaxed);

        let config = self.config.clone();
        let running = Arc::clone(&self.running);
        let frames = Arc::clone(&self.frames);

        let spawned = std::thread::Builder::new()
            .name("test-pattern".to_string())
            .spawn(move || produce(config, sink, running, frames));

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Relaxed);
                Err(SourceError::Thread(e))
            }
        }
    }

    fn stop(&mut self) -> Result<(), SourceError> {
        self.running.store(false, Ordering::Relaxed);

        if let Some(worker) = self.worker.take() {
            worker.join().map_err(|_| SourceError::WorkerPanicked)?;
            tracing::info!(frames = self.frames_produced(), "Test pattern stopped");
        }

        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl Drop for TestPattern {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

/// Capture loop run on the worker thread
fn produce(
    config: SourceConfig,
    sink: Arc<dyn FrameSink>,
    running: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
) {
    let interval = Duration::from_secs_f64(1.0 / f64::from(config.fps));
    let mut deadline = Instant::now();
    let mut index = 0u64;

    while running.load(Ordering::Relaxed) {
        match render_frame(&config, index) {
            Ok(jpeg) => {
                sink.write_frame(jpeg);
                frames.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::warn!(error = %e, frame = index, "Failed to encode test pattern");
            }
        }
        index += 1;

        deadline += interval;
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        } else {
            // Fell behind; don't try to catch up with a burst
            deadline = now;
        }
    }
}

/// Render and encode frame number `index`
pub fn render_frame(config: &SourceConfig, index: u64) -> Result<Bytes, SourceError> {
    let width = config.resolution.width;
    let height = config.resolution.height;
    let offset = (index.wrapping_mul(4) % u64::from(width)) as u32;
    let scan_line = (index.wrapping_mul(2) % u64::from(height)) as u32;

    let image = RgbImage::from_fn(width, height, |x, y| {
        if y >= scan_line && y < scan_line + SCAN_LINE_HEIGHT {
            return Rgb([255, 255, 255]);
        }
        let shifted = (x + offset) % width;
        let bar = (shifted as usize * BARS.len()) / width as usize;
        Rgb(BARS[bar])
    });

    let mut jpeg = Vec::with_capacity((width as usize * height as usize) / 8);
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, config.quality);
        encoder
            .encode_image(&image)
            .map_err(|e| SourceError::Encode(e.to_string()))?;
    }

    Ok(Bytes::from(jpeg))
}
