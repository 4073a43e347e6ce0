//! Handler trait and type erasure.
//!
//! # How handlers are stored and composed
//!
//! Everything that processes a request implements one object-safe trait,
//! [`Handler`]: route handlers, the router, and every middleware stage. A
//! handler receives the [`Request`] by value and a mutable borrow of the
//! response sink, and returns a boxed future that borrows both.
//!
//! Route handlers are usually plain async functions that *return* a reply
//! instead of writing one. The blanket [`IntoHandler`] impl bridges the two:
//!
//! ```text
//! async fn festivals(req: Request) -> Json<Vec<Festival>>  ← user writes this
//!        ↓ router.on(Method::GET, "/api/festivals", festivals)
//! festivals.into_handler()                                 ← IntoHandler blanket impl
//!        ↓
//! Arc::new(FnHandler(festivals))                           ← stored as BoxedHandler
//!        ↓
//! handler.call(req, w)  at request time                    ← one vtable dispatch
//!        ↓
//! Box::pin(async { festivals(req).await.write_to(w) })     ← BoxFuture
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoReply, ResponseWriter};

/// A heap-allocated, type-erased future borrowing the handler and the sink
/// for `'a`.
pub type BoxFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// One request-processing step.
///
/// Implementations must drive the response to completion through `w` or
/// delegate to exactly one inner handler.
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, req: Request, w: &'a mut dyn ResponseWriter) -> BoxFuture<'a>;
}

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn Handler>;

// ── IntoHandler ───────────────────────────────────────────────────────────────

/// Implemented for every valid route handler function.
///
/// You never implement this yourself. It is satisfied for any `async fn` or
/// closure with the shape:
///
/// ```text
/// Fn(Request) -> impl Future<Output = impl IntoReply>
/// ```
///
/// The trait is sealed so only the blanket impl below can satisfy it.
pub trait IntoHandler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
}

impl<F, Fut, R> IntoHandler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn into_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Holds a concrete handler function `F` and implements [`Handler`] for it.
struct FnHandler<F>(F);

impl<F, Fut, R> Handler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn call<'a>(&'a self, req: Request, w: &'a mut dyn ResponseWriter) -> BoxFuture<'a> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.write_to(w) })
    }
}
