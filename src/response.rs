//! The outbound response sink and the [`IntoReply`] conversion trait.
//!
//! Handlers never build a response value and hand it back. They write into a
//! [`ResponseWriter`]: set headers, set the status once, then write body
//! bytes. Middleware stages wrap the sink to observe or transform what the
//! handler writes (status capture, gzip) without the handler knowing.
//!
//! The root sink is [`Response`], a buffer the server turns into a hyper
//! response once the whole chain has returned.

use std::io;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use http::{HeaderMap, HeaderValue, StatusCode};
use http_body_util::Full;
use serde::Serialize;
use tracing::{error, warn};

static JSON: HeaderValue = HeaderValue::from_static("application/json");
static TEXT: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
static NOSNIFF: HeaderValue = HeaderValue::from_static("nosniff");

/// Fixed body for every 500. Internal detail is logged, never sent.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

// ── ResponseWriter ────────────────────────────────────────────────────────────

/// The outbound response channel for one request.
///
/// Headers must be set before the first [`write`](ResponseWriter::write);
/// a write without a prior [`set_status`](ResponseWriter::set_status)
/// implies `200 OK`.
pub trait ResponseWriter: Send {
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Sets the final status. Only the first call has an effect.
    fn set_status(&mut self, status: StatusCode);

    fn write(&mut self, buf: &[u8]) -> io::Result<()>;
}

// ── Response ─────────────────────────────────────────────────────────────────

/// The root response sink: buffers status, headers, and body in memory.
#[derive(Debug, Default)]
pub struct Response {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// The committed status, `200 OK` if nothing was committed.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Converts the buffered response into what hyper sends on the wire.
    /// `content-length` is derived from the body by hyper.
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let status = self.status();
        let mut res = http::Response::new(Full::new(Bytes::from(self.body)));
        *res.status_mut() = status;
        *res.headers_mut() = self.headers;
        res
    }
}

impl ResponseWriter for Response {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn set_status(&mut self, status: StatusCode) {
        match self.status {
            None => self.status = Some(status),
            Some(committed) => warn!(%committed, ignored = %status, "superfluous set_status call"),
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(())
    }
}

// ── IntoReply ─────────────────────────────────────────────────────────────────

/// Conversion of a handler's return value into writes on the response sink.
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoReply {
    fn write_to(self, w: &mut dyn ResponseWriter);
}

/// A `200 OK` JSON body serialised with serde.
pub struct Json<T>(pub T);

impl<T: Serialize> IntoReply for Json<T> {
    fn write_to(self, w: &mut dyn ResponseWriter) {
        match serde_json::to_vec(&self.0) {
            Ok(bytes) => {
                w.headers_mut().insert(CONTENT_TYPE, JSON.clone());
                send(w, &bytes);
            }
            Err(e) => {
                error!("failed to encode response body: {e}");
                text_error(w, StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE);
            }
        }
    }
}

/// Status only, empty body.
impl IntoReply for StatusCode {
    fn write_to(self, w: &mut dyn ResponseWriter) {
        w.set_status(self);
    }
}

impl<T: IntoReply, E: IntoReply> IntoReply for Result<T, E> {
    fn write_to(self, w: &mut dyn ResponseWriter) {
        match self {
            Ok(v) => v.write_to(w),
            Err(e) => e.write_to(w),
        }
    }
}

/// Writes a plain-text error reply: `status`, then `message` as the body.
pub fn text_error(w: &mut dyn ResponseWriter, status: StatusCode, message: &str) {
    let headers = w.headers_mut();
    headers.insert(CONTENT_TYPE, TEXT.clone());
    headers.insert(X_CONTENT_TYPE_OPTIONS, NOSNIFF.clone());
    w.set_status(status);
    send(w, message.as_bytes());
}

fn send(w: &mut dyn ResponseWriter, body: &[u8]) {
    if let Err(e) = w.write(body) {
        warn!("failed to write response body: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_without_status_implies_ok() {
        let mut res = Response::new();
        res.write(b"hello").unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body(), b"hello");
    }

    #[test]
    fn first_status_sticks() {
        let mut res = Response::new();
        res.set_status(StatusCode::NOT_FOUND);
        res.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        res.write(b"x").unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn json_reply_sets_content_type() {
        let mut res = Response::new();
        Json(serde_json::json!({"valid": true})).write_to(&mut res);
        assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(res.body(), br#"{"valid":true}"#);
    }

    #[test]
    fn text_error_is_plain_text() {
        let mut res = Response::new();
        text_error(&mut res, StatusCode::BAD_REQUEST, "Invalid request body");
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(res.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(res.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(res.body(), b"Invalid request body");
    }

    #[test]
    fn into_http_carries_status_and_headers() {
        let mut res = Response::new();
        res.headers_mut().insert("x-request-id", HeaderValue::from_static("abc"));
        res.set_status(StatusCode::CREATED);
        let http = res.into_http();
        assert_eq!(http.status(), StatusCode::CREATED);
        assert_eq!(http.headers()["x-request-id"], "abc");
    }
}
