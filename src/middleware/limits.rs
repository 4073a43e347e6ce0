//! Per-request limits set by the server: body failures and the response
//! deadline.

use std::sync::Arc;

use http::StatusCode;
use tracing::warn;

use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::middleware::capture::ResponseCapture;
use crate::request::Request;
use crate::response::{self, ResponseWriter};

pub const DEADLINE_MESSAGE: &str = "Service unavailable";

/// Wraps `next` with the limits recorded in the request context.
///
/// A request whose body could not be collected is answered with `408` or
/// `400` and never reaches `next`. Otherwise `next` runs until the context
/// deadline; if it overruns and has not committed a status yet, the stage
/// answers `503` through the same sink, so outer stages still see the reply.
///
/// Place it after `request_id` and `metrics`.
pub fn limits(next: BoxedHandler) -> BoxedHandler {
    Arc::new(LimitsStage { next })
}

struct LimitsStage {
    next: BoxedHandler,
}

impl Handler for LimitsStage {
    fn call<'a>(&'a self, req: Request, w: &'a mut dyn ResponseWriter) -> BoxFuture<'a> {
        if let Some(error) = req.context().body_error() {
            return Box::pin(async move { response::text_error(w, error.status(), error.message()) });
        }

        let Some(deadline) = req.context().deadline() else {
            return self.next.call(req, w);
        };

        Box::pin(async move {
            let method = req.method().clone();
            let path = req.path().to_owned();

            let mut capture = ResponseCapture::new(w);
            let finished = tokio::time::timeout_at(deadline, self.next.call(req, &mut capture)).await;
            if finished.is_ok() {
                return;
            }

            if capture.is_written() {
                warn!(%method, %path, status = capture.status().as_u16(), "response deadline exceeded mid-body");
                return;
            }
            warn!(%method, %path, "response deadline exceeded");
            response::text_error(&mut capture, StatusCode::SERVICE_UNAVAILABLE, DEADLINE_MESSAGE);
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use bytes::Bytes;
    use http::header::HeaderValue;
    use tokio::time::Instant;

    use super::*;
    use crate::request::BodyError;
    use crate::response::Response;

    /// Sets a header, then either answers or hangs.
    struct Slow {
        answer: bool,
        calls: AtomicUsize,
    }

    impl Handler for Slow {
        fn call<'a>(&'a self, _req: Request, w: &'a mut dyn ResponseWriter) -> BoxFuture<'a> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                w.headers_mut().insert("x-seen", HeaderValue::from_static("yes"));
                if self.answer {
                    w.set_status(StatusCode::NO_CONTENT);
                } else {
                    std::future::pending::<()>().await;
                }
            })
        }
    }

    fn stage(answer: bool) -> (Arc<Slow>, BoxedHandler) {
        let slow = Arc::new(Slow { answer, calls: AtomicUsize::new(0) });
        (Arc::clone(&slow), limits(slow))
    }

    fn request() -> Request {
        http::Request::get("/slow").body(Bytes::new()).unwrap().into()
    }

    #[tokio::test]
    async fn overrun_answers_503_and_keeps_headers() {
        let (_, app) = stage(false);
        let mut req = request();
        req.context_mut().set_deadline(Instant::now() + Duration::from_millis(20));

        let mut res = Response::new();
        app.call(req, &mut res).await;

        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.body(), DEADLINE_MESSAGE.as_bytes());
        assert_eq!(res.headers()["x-seen"], "yes");
    }

    #[tokio::test]
    async fn in_time_reply_passes_through() {
        let (_, app) = stage(true);
        let mut req = request();
        req.context_mut().set_deadline(Instant::now() + Duration::from_secs(5));

        let mut res = Response::new();
        app.call(req, &mut res).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn without_deadline_stage_is_transparent() {
        let (slow, app) = stage(true);
        let mut res = Response::new();
        app.call(request(), &mut res).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn body_failures_never_reach_the_handler() {
        for (error, status, message) in [
            (BodyError::Timeout, StatusCode::REQUEST_TIMEOUT, "Request timeout"),
            (BodyError::Read, StatusCode::BAD_REQUEST, "Bad request"),
        ] {
            let (slow, app) = stage(true);
            let mut req = request();
            req.context_mut().set_body_error(error);

            let mut res = Response::new();
            app.call(req, &mut res).await;

            assert_eq!(res.status(), status);
            assert_eq!(res.body(), message.as_bytes());
            assert_eq!(slow.calls.load(Ordering::SeqCst), 0);
        }
    }
}
