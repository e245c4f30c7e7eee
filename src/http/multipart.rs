//! `multipart/x-mixed-replace` framing for the JPEG stream
//!
//! Each part on the wire:
//!
//! ```text
//! --FRAME\r\n
//! Content-Type: image/jpeg\r\n
//! Content-Length: <n>\r\n
//! \r\n
//! <n bytes of JPEG>\r\n
//! ```

use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::{BufMut, Bytes, BytesMut};

/// Part boundary token
pub const BOUNDARY: &str = "FRAME";

/// `Content-Type` of the stream response
pub const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=FRAME";

/// `Content-Type` of every part
pub const PART_CONTENT_TYPE: &str = "image/jpeg";

/// Bytes written after each part's payload
pub const PART_TRAILER: &[u8] = b"\r\n";

/// Wrap a body of encoded parts in the stream response headers
pub fn stream_response(body: Body) -> Response {
    (
        [
            (header::AGE, "0"),
            (header::CACHE_CONTROL, "no-cache, private"),
            (header::PRAGMA, "no-cache"),
            (header::CONTENT_TYPE, STREAM_CONTENT_TYPE),
        ],
        body,
    )
        .into_response()
}

/// Boundary, part headers, payload and trailer as one chunk
pub fn encode_part(jpeg: &[u8]) -> Bytes {
    let header = format!(
        "--{}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        PART_CONTENT_TYPE,
        jpeg.len()
    );

    let mut part = BytesMut::with_capacity(header.len() + jpeg.len() + PART_TRAILER.len());
    part.put_slice(header.as_bytes());
    part.put_slice(jpeg);
    part.put_slice(PART_TRAILER);
    part.freeze()
}
