//! Route table
//!
//! | Path           | GET                      |
//! |----------------|--------------------------|
//! | `/`            | 301 to `/index.html`     |
//! | `/index.html`  | viewer page              |
//! | `/stream.mjpg` | multipart JPEG stream    |
//! | anything else  | 404                      |
//!
//! Methods other than GET (and the HEAD axum derives from it) get 501.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Router};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::buffer::FrameBuffer;
use crate::server::session::{SessionContext, StreamSession};
use crate::stats::ServerStats;

pub const ROOT_PATH: &str = "/";
pub const INDEX_PATH: &str = "/index.html";
pub const STREAM_PATH: &str = "/stream.mjpg";

/// Value of the `Server` header on every response
pub const SERVER_NAME: &str = concat!("mjpeg-rs/", env!("CARGO_PKG_VERSION"));

/// Viewer page served at [`INDEX_PATH`]
///
/// The image size in the markup is fixed and does not follow the configured
/// capture resolution.
pub const INDEX_PAGE: &str = "\
<html>
<head>
<title>MJPEG Live Stream</title>
</head>
<body>
<h1>MJPEG Live Stream</h1>
<img src=\"stream.mjpg\" width=\"640\" height=\"480\" />
</body>
</html>
";

/// Shared state behind every route
#[derive(Clone)]
pub struct AppState {
    pub buffer: Arc<FrameBuffer>,
    pub stats: Arc<ServerStats>,
}

/// Build the router
///
/// The stream route expects a [`SessionContext`] request extension, which
/// the connection task inserts.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(ROOT_PATH, get(redirect_to_index).fallback(not_implemented))
        .route(INDEX_PATH, get(index_page).fallback(not_implemented))
        .route(STREAM_PATH, get(stream).fallback(not_implemented))
        .fallback(not_found)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::SERVER,
            HeaderValue::from_static(SERVER_NAME),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn redirect_to_index() -> Response {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, INDEX_PATH)]).into_response()
}

async fn index_page() -> Response {
    ([(header::CONTENT_TYPE, "text/html")], INDEX_PAGE).into_response()
}

async fn stream(
    State(state): State<AppState>,
    Extension(context): Extension<SessionContext>,
) -> Response {
    StreamSession::new(context, state.buffer, state.stats).into_response()
}

async fn not_found(method: Method) -> Response {
    if method == Method::GET || method == Method::HEAD {
        error_page(StatusCode::NOT_FOUND)
    } else {
        error_page(StatusCode::NOT_IMPLEMENTED)
    }
}

async fn not_implemented() -> Response {
    error_page(StatusCode::NOT_IMPLEMENTED)
}

/// Small HTML error body naming the status
fn error_page(status: StatusCode) -> Response {
    let reason = status.canonical_reason().unwrap_or("Error");
    let body = format!(
        "<!DOCTYPE HTML>\n\
         <html>\n\
         <head><title>Error response</title></head>\n\
         <body>\n\
         <h1>Error response</h1>\n\
         <p>Error code: {}</p>\n\
         <p>Message: {}.</p>\n\
         </body>\n\
         </html>\n",
        status.as_u16(),
        reason
    );
    (status, Html(body)).into_response()
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use bytes::Bytes;
    use futures_util::StreamExt;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use super::*;

    fn state() -> AppState {
        AppState {
            buffer: Arc::new(FrameBuffer::new()),
            stats: Arc::new(ServerStats::new()),
        }
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_root_redirects_to_index() {
        let response = router(state())
            .oneshot(request(Method::GET, "/"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[header::LOCATION], INDEX_PATH);
        assert_eq!(response.headers()[header::SERVER], SERVER_NAME);
    }

    #[tokio::test]
    async fn test_index_page() {
        let response = router(state())
            .oneshot(request(Method::GET, "/index.html"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");

        let body = body_text(response).await;
        assert_eq!(body, INDEX_PAGE);
        assert!(body.contains(r#"<img src="stream.mjpg" width="640" height="480" />"#));
    }

    #[tokio::test]
    async fn test_unknown_path() {
        for path in ["/does-not-exist", "/index.htm", "/stream.mjpg/"] {
            let response = router(state())
                .oneshot(request(Method::GET, path))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", path);
            assert!(body_text(response).await.contains("Error code: 404"));
        }
    }

    #[tokio::test]
    async fn test_other_methods_not_implemented() {
        for (method, path) in [
            (Method::POST, "/index.html"),
            (Method::PUT, "/stream.mjpg"),
            (Method::DELETE, "/"),
            (Method::POST, "/does-not-exist"),
        ] {
            let response = router(state())
                .oneshot(request(method.clone(), path))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED, "{} {}", method, path);
        }
    }

    #[tokio::test]
    async fn test_stream_route() {
        let state = state();
        let buffer = Arc::clone(&state.buffer);
        let stats = Arc::clone(&state.stats);

        let mut stream_request = request(Method::GET, "/stream.mjpg");
        stream_request.extensions_mut().insert(SessionContext::new(
            1,
            "127.0.0.1:50000".parse::<SocketAddr>().unwrap(),
            CancellationToken::new(),
        ));

        let response = router(state).oneshot(stream_request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "multipart/x-mixed-replace; boundary=FRAME"
        );
        assert_eq!(stats.snapshot().streams_active, 1);

        buffer.publish(Bytes::from_static(b"jpeg"));

        let mut body = response.into_body().into_data_stream();
        let part = body.next().await.unwrap().unwrap();
        assert_eq!(
            &part[..],
            b"--FRAME\r\nContent-Type: image/jpeg\r\nContent-Length: 4\r\n\r\njpeg\r\n"
        );

        drop(body);
        assert_eq!(stats.snapshot().streams_active, 0);
    }
}
