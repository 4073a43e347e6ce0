//! Conditional gzip compression of response bodies.

use std::io::{self, Write};
use std::sync::Arc;

use flate2::Compression;
use flate2::write::GzEncoder;
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING};
use http::{HeaderMap, HeaderValue, StatusCode};
use tracing::error;

use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::request::Request;
use crate::response::ResponseWriter;

const GZIP: &str = "gzip";

/// Wraps `next` so its body is gzip-compressed when the request's
/// `accept-encoding` allows it.
///
/// Requests that do not advertise gzip pass straight through: no header, no
/// wrapper.
pub fn gzip(next: BoxedHandler) -> BoxedHandler {
    Arc::new(GzipStage { next })
}

struct GzipStage {
    next: BoxedHandler,
}

impl Handler for GzipStage {
    fn call<'a>(&'a self, req: Request, w: &'a mut dyn ResponseWriter) -> BoxFuture<'a> {
        if !accepts_gzip(req.headers()) {
            return self.next.call(req, w);
        }

        Box::pin(async move {
            w.headers_mut().insert(CONTENT_ENCODING, HeaderValue::from_static(GZIP));
            let mut gz = GzipWriter::new(w);
            self.next.call(req, &mut gz).await;
            if let Err(e) = gz.close() {
                error!("failed to finish gzip stream: {e}");
            }
        })
    }
}

/// True when `accept-encoding` lists `gzip` (or `x-gzip`) with a non-zero
/// quality.
pub fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|coding| {
            let mut params = coding.split(';').map(str::trim);
            let name = params.next().unwrap_or_default();
            let gzip = name.eq_ignore_ascii_case(GZIP) || name.eq_ignore_ascii_case("x-gzip");
            gzip && params.all(|p| !is_zero_quality(p))
        })
}

fn is_zero_quality(param: &str) -> bool {
    param
        .strip_prefix("q=")
        .or_else(|| param.strip_prefix("Q="))
        .and_then(|q| q.trim().parse::<f32>().ok())
        .is_some_and(|q| q == 0.0)
}

// ── GzipWriter ────────────────────────────────────────────────────────────────

/// Adapts a [`ResponseWriter`] body to [`io::Write`] for the encoder.
struct Body<'a>(&'a mut dyn ResponseWriter);

impl Write for Body<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A response sink that routes body writes through a streaming gzip encoder
/// bound to the underlying sink.
///
/// The stream is closed exactly once: by [`close`](GzipWriter::close) on the
/// normal path, or on drop when the handler future is abandoned or unwinds.
pub struct GzipWriter<'a> {
    encoder: GzEncoder<Body<'a>>,
    closed: bool,
}

impl<'a> GzipWriter<'a> {
    pub fn new(inner: &'a mut dyn ResponseWriter) -> Self {
        Self { encoder: GzEncoder::new(Body(inner), Compression::default()), closed: false }
    }

    /// Flushes buffered compressed bytes and writes the gzip trailer.
    /// Later calls are no-ops.
    pub fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.encoder.try_finish()
    }
}

impl ResponseWriter for GzipWriter<'_> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.encoder.get_mut().0.headers_mut()
    }

    fn set_status(&mut self, status: StatusCode) {
        self.encoder.get_mut().0.set_status(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "gzip stream already closed"));
        }
        self.encoder.write_all(buf)
    }
}

impl Drop for GzipWriter<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("failed to finish gzip stream on drop: {e}");
        }
    }
}
