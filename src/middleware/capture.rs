//! Status capture around a response sink.

use std::io;

use http::{HeaderMap, StatusCode};

use crate::response::ResponseWriter;

/// Wraps a [`ResponseWriter`] and remembers the status that was sent.
///
/// The underlying sink does not expose its status after the fact; observers
/// that run after the handler (the metrics stage) read it from here instead.
/// The first status to be set, explicitly or implied by a write, is final.
pub struct ResponseCapture<'a> {
    inner: &'a mut dyn ResponseWriter,
    status: StatusCode,
    written: bool,
}

impl<'a> ResponseCapture<'a> {
    pub fn new(inner: &'a mut dyn ResponseWriter) -> Self {
        Self { inner, status: StatusCode::OK, written: false }
    }

    /// The final status, `200 OK` if the handler never set one.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_written(&self) -> bool {
        self.written
    }
}

impl ResponseWriter for ResponseCapture<'_> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn set_status(&mut self, status: StatusCode) {
        if self.written {
            return;
        }
        self.status = status;
        self.inner.set_status(status);
        self.written = true;
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        if !self.written {
            self.set_status(StatusCode::OK);
        }
        self.inner.write(buf)
    }
}
