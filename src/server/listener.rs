//! MJPEG server listener
//!
//! Handles the TCP accept loop and spawns one HTTP connection task per
//! accepted socket.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tower::Service;

use crate::buffer::FrameBuffer;
use crate::error::Result;
use crate::http::{router, AppState};
use crate::server::config::ServerConfig;
use crate::server::session::SessionContext;
use crate::stats::{ServerStats, ServerStatsSnapshot};

/// MJPEG-over-HTTP server
pub struct MjpegServer {
    config: ServerConfig,
    buffer: Arc<FrameBuffer>,
    stats: Arc<ServerStats>,
    router: Router,
    http: http1::Builder,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    shutdown: CancellationToken,
}

impl MjpegServer {
    /// Create a new server with its own empty frame buffer
    pub fn new(config: ServerConfig) -> Self {
        Self::with_buffer(config, Arc::new(FrameBuffer::new()))
    }

    /// Create a new server that streams from an existing buffer
    pub fn with_buffer(config: ServerConfig, buffer: Arc<FrameBuffer>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let stats = Arc::new(ServerStats::new());
        let router = router(AppState {
            buffer: Arc::clone(&buffer),
            stats: Arc::clone(&stats),
        });

        let mut http = http1::Builder::new();
        http.timer(TokioTimer::new())
            .header_read_timeout(config.request_timeout)
            .max_buf_size(config.buffer_size)
            .title_case_headers(true);

        Self {
            config,
            buffer,
            stats,
            router,
            http,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
            shutdown: CancellationToken::new(),
        }
    }

    /// The frame buffer sessions stream from; hand it to the producer
    pub fn buffer(&self) -> &Arc<FrameBuffer> {
        &self.buffer
    }

    /// Current server-wide counters
    pub fn stats(&self) -> ServerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Create the listening socket with address reuse enabled
    pub fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.bind_addr;
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };

        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(self.config.listen_backlog)?;

        tracing::info!(addr = %listener.local_addr()?, "MJPEG server listening");
        Ok(listener)
    }

    /// Run the server
    ///
    /// This method only returns on a bind failure or after [`shutdown`](Self::shutdown).
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind()?;
        self.serve(listener).await
    }

    /// Bind, then serve until `signal` resolves
    pub async fn run_until<F>(&self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = self.bind()?;
        self.serve_until(listener, signal).await
    }

    /// Serve an already bound listener until `signal` resolves
    ///
    /// When `signal` resolves, accepting stops and every open connection is
    /// cancelled.
    pub async fn serve_until<F>(&self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::select! {
            _ = signal => {
                tracing::info!("Shutdown signal received");
                self.shutdown();
                Ok(())
            }
            result = self.serve(listener) => result,
        }
    }

    /// Accept connections on an already bound listener until shutdown
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => {
                        self.handle_connection(socket, peer_addr);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                    }
                },
            }
        }
    }

    /// Stop accepting and cancel every connection
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    self.stats.connection_rejected();
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let context = SessionContext::new(session_id, peer_addr, self.shutdown.child_token());
        let cancelled = context.shutdown.clone();
        let router = self.router.clone();
        let service = hyper::service::service_fn(move |mut request: Request<Incoming>| {
            request.extensions_mut().insert(context.clone());
            router.clone().call(request)
        });
        let connection = self.http.serve_connection(TokioIo::new(socket), service);

        let stats = Arc::clone(&self.stats);
        stats.connection_opened();

        tokio::spawn(async move {
            let _permit = permit;

            tokio::select! {
                result = connection => {
                    if let Err(e) = result {
                        tracing::debug!(
                            session_id = session_id,
                            error = %e,
                            "Connection error"
                        );
                    }
                }
                _ = cancelled.cancelled() => {
                    tracing::debug!(session_id = session_id, "Connection cancelled by shutdown");
                }
            }

            stats.connection_closed();
            tracing::debug!(session_id = session_id, "Connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }
}
