//! MJPEG streaming server CLI

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, ValueEnum};
use mjpeg_rs::source::{FrameSource, Recording, Resolution, SourceConfig, TestPattern};
use mjpeg_rs::{FrameBuffer, MjpegServer, ServerConfig};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "mjpeg-server")]
#[command(about = "Stream live JPEG frames to browsers as MJPEG over HTTP")]
#[command(version)]
struct Cli {
    /// Resolution of the camera feed (e.g., 640x480)
    #[arg(long, default_value = "640x480")]
    resolution: Resolution,

    /// Frames per second
    #[arg(long, default_value_t = 24)]
    fps: u32,

    /// Port to run the server on
    #[arg(long, default_value_t = mjpeg_rs::server::config::DEFAULT_PORT)]
    port: u16,

    /// Where frames come from
    #[arg(long, value_enum, default_value_t = SourceKind::default())]
    source: SourceKind,

    /// JPEG quality (1-100)
    #[arg(long, default_value_t = 85)]
    quality: u8,

    /// V4L2 device for the camera source; libcamera is used when omitted
    #[arg(long)]
    device: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    /// Synthetic colour bars
    Pattern,
    /// Camera via GStreamer
    Camera,
}

impl Default for SourceKind {
    fn default() -> Self {
        if cfg!(feature = "camera") {
            SourceKind::Camera
        } else {
            SourceKind::Pattern
        }
    }
}

const USAGE_EXAMPLES: [&str; 5] = [
    "--resolution 800x600 --fps 30 --port 8000",
    "--resolution 1024x720 --fps 30 --port 8000",
    "--resolution 1920x1080 --fps 30 --port 8000",
    "--resolution 1920x1080 --fps 60 --port 8000",
    "--resolution 1920x1080 --fps 10 --port 8000",
];

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args_os().len() <= 1 {
        print_usage()?;
        std::process::exit(1);
    }

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let source_config = SourceConfig {
        resolution: cli.resolution,
        fps: cli.fps,
        quality: cli.quality,
    };
    source_config.validate()?;

    let buffer = Arc::new(FrameBuffer::new());
    let server = MjpegServer::with_buffer(ServerConfig::default().port(cli.port), buffer.clone());
    let listener = server
        .bind()
        .with_context(|| format!("Failed to bind port {}", cli.port))?;

    let source = build_source(&cli, source_config)?;
    let recording = Recording::start(source, buffer).context("Failed to start recording")?;

    println!(
        "Starting server on port {} with resolution {} at {} FPS.",
        cli.port, cli.resolution, cli.fps
    );
    info!(
        port = cli.port,
        resolution = %cli.resolution,
        fps = cli.fps,
        source = recording.source().name(),
        "Starting server"
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };

    let served = server.serve_until(listener, shutdown).await;

    // Stop the producer on every exit path
    if let Err(e) = recording.stop() {
        error!(error = %e, "Failed to stop recording");
    }

    served.context("Server failed")?;
    info!("Server stopped");
    Ok(())
}

fn print_usage() -> Result<()> {
    Cli::command().print_help()?;

    let program = std::env::args()
        .next()
        .unwrap_or_else(|| "mjpeg-server".to_string());

    println!();
    println!("Examples:");
    for example in USAGE_EXAMPLES {
        println!("   {} {}", program, example);
    }
    Ok(())
}

fn build_source(cli: &Cli, config: SourceConfig) -> Result<Box<dyn FrameSource>> {
    match cli.source {
        SourceKind::Pattern => Ok(Box::new(TestPattern::new(config))),
        SourceKind::Camera => camera_source(cli, config),
    }
}

#[cfg(feature = "camera")]
fn camera_source(cli: &Cli, config: SourceConfig) -> Result<Box<dyn FrameSource>> {
    let camera = mjpeg_rs::source::Camera::new(config, cli.device.clone())?;
    Ok(Box::new(camera))
}

#[cfg(not(feature = "camera"))]
fn camera_source(_cli: &Cli, _config: SourceConfig) -> Result<Box<dyn FrameSource>> {
    anyhow::bail!("this build has no camera support; rebuild with `--features camera` or use `--source pattern`")
}
