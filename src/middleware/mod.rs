//! Middleware layer.
//!
//! A middleware is a function from handler to handler: it takes the next
//! stage and returns a new [`Handler`](crate::Handler) that wraps it.
//! [`chain`] nests a list of them around a terminal handler.
//!
//! Built-in stages, in the order the service composes them:
//! - [`request_id`]: assigns or propagates `x-request-id`
//! - [`metrics`]: one log line per request with method, path, status, latency
//! - [`gzip`]: compresses the body when the client accepts gzip
//! - [`limits`]: answers body failures and enforces the response deadline

pub mod capture;
pub mod gzip;
pub mod limits;
pub mod metrics;
pub mod request_id;

pub use capture::ResponseCapture;
pub use gzip::gzip;
pub use limits::limits;
pub use metrics::metrics;
pub use request_id::request_id;

use crate::handler::BoxedHandler;

/// A handler-transforming stage.
pub type Middleware = dyn Fn(BoxedHandler) -> BoxedHandler + Send + Sync;

/// Builds one handler from `handler` and an ordered list of stages.
///
/// `middleware[0]` is the outermost wrapper: it runs first on the way in and
/// last on the way out. The result is a plain handler, reusable across any
/// number of concurrent requests.
pub fn chain(handler: BoxedHandler, middleware: &[&Middleware]) -> BoxedHandler {
    middleware.iter().rev().fold(handler, |next, wrap| wrap(next))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;
    use http::StatusCode;

    use super::*;
    use crate::handler::{BoxFuture, Handler};
    use crate::request::Request;
    use crate::response::{Response, ResponseWriter};

    type Trace = Arc<Mutex<Vec<String>>>;

    struct Stage {
        name: &'static str,
        trace: Trace,
        next: BoxedHandler,
    }

    impl Handler for Stage {
        fn call<'a>(&'a self, req: Request, w: &'a mut dyn ResponseWriter) -> BoxFuture<'a> {
            Box::pin(async move {
                self.trace.lock().unwrap().push(format!("{}-enter", self.name));
                self.next.call(req, w).await;
                self.trace.lock().unwrap().push(format!("{}-exit", self.name));
            })
        }
    }

    struct Terminal(Trace);

    impl Handler for Terminal {
        fn call<'a>(&'a self, _req: Request, w: &'a mut dyn ResponseWriter) -> BoxFuture<'a> {
            Box::pin(async move {
                self.0.lock().unwrap().push("handler".to_owned());
                w.set_status(StatusCode::NO_CONTENT);
            })
        }
    }

    fn stage(name: &'static str, trace: Trace) -> impl Fn(BoxedHandler) -> BoxedHandler + Send + Sync {
        move |next| -> BoxedHandler { Arc::new(Stage { name, trace: Arc::clone(&trace), next }) }
    }

    fn request() -> Request {
        http::Request::get("/test").body(Bytes::new()).unwrap().into()
    }

    #[tokio::test]
    async fn first_stage_is_outermost() {
        let trace = Trace::default();
        let (a, b, c) = (stage("A", trace.clone()), stage("B", trace.clone()), stage("C", trace.clone()));
        let app = chain(Arc::new(Terminal(Arc::clone(&trace))), &[&a, &b, &c]);

        let mut res = Response::new();
        app.call(request(), &mut res).await;

        assert_eq!(
            *trace.lock().unwrap(),
            ["A-enter", "B-enter", "C-enter", "handler", "C-exit", "B-exit", "A-exit"],
        );
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn composed_handler_is_reusable() {
        let trace = Trace::default();
        let a = stage("A", trace.clone());
        let app = chain(Arc::new(Terminal(Arc::clone(&trace))), &[&a]);

        for _ in 0..2 {
            app.call(request(), &mut Response::new()).await;
        }

        assert_eq!(
            *trace.lock().unwrap(),
            ["A-enter", "handler", "A-exit", "A-enter", "handler", "A-exit"],
        );
    }

    #[tokio::test]
    async fn empty_chain_is_the_handler() {
        let trace = Trace::default();
        let app = chain(Arc::new(Terminal(Arc::clone(&trace))), &[]);
        app.call(request(), &mut Response::new()).await;
        assert_eq!(*trace.lock().unwrap(), ["handler"]);
    }
}
