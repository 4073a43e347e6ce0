//! Per-request timing and access logging.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::middleware::capture::ResponseCapture;
use crate::request::Request;
use crate::response::ResponseWriter;

/// Logged in place of the correlation identifier when no upstream stage
/// assigned one.
pub const MISSING_REQUEST_ID: &str = "-";

/// Wraps `next` with a timer and emits one `request completed` line per
/// request: method, path, final status, duration, and request id.
///
/// Only observes. Whatever the handler writes, including error replies,
/// reaches the client unchanged.
pub fn metrics(next: BoxedHandler) -> BoxedHandler {
    Arc::new(MetricsStage { next })
}

struct MetricsStage {
    next: BoxedHandler,
}

impl Handler for MetricsStage {
    fn call<'a>(&'a self, req: Request, w: &'a mut dyn ResponseWriter) -> BoxFuture<'a> {
        Box::pin(async move {
            let start = Instant::now();
            let method = req.method().clone();
            let path = req.path().to_owned();
            let request_id = req
                .context()
                .request_id()
                .map_or_else(|| MISSING_REQUEST_ID.to_owned(), ToString::to_string);

            let mut capture = ResponseCapture::new(w);
            self.next.call(req, &mut capture).await;

            info!(
                method = %method,
                path = %path,
                status = capture.status().as_u16(),
                duration = ?start.elapsed(),
                request_id = %request_id,
                "request completed"
            );
        })
    }
}
