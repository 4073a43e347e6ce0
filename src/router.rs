//! Radix-tree request router.
//!
//! One tree keyed by path; each path holds a small method table. Lookup is
//! O(path-length) via [`matchit`]. Every matched route gets the same
//! treatment before method dispatch: the CORS policy is applied, pre-flight
//! `OPTIONS` is answered, and unknown methods get `405`.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;
use percent_encoding::percent_decode_str;

use crate::cors::CorsPolicy;
use crate::handler::{BoxFuture, BoxedHandler, Handler, IntoHandler};
use crate::request::Request;
use crate::response::{self, ResponseWriter};

pub const NOT_FOUND_MESSAGE: &str = "404 page not found";
pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "Method not allowed";

/// The application router.
///
/// Build it once at startup, then turn it into the terminal handler of the
/// middleware chain with [`Router::into_handler`]. Each [`Router::on`] call
/// returns `self` so registrations chain naturally.
pub struct Router {
    cors: Arc<CorsPolicy>,
    routes: Vec<(String, HashMap<Method, BoxedHandler>)>,
}

impl Router {
    pub fn new(cors: CorsPolicy) -> Self {
        Self { cors: Arc::new(cors), routes: Vec::new() }
    }

    /// Register a handler for a method + path pair. Returns `self` for
    /// chaining.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves
    /// them. `OPTIONS` is answered by the router and never reaches a handler.
    ///
    /// ```rust,no_run
    /// # use festivals_api::{CorsPolicy, Request, Router};
    /// # use http::{Method, StatusCode};
    /// # async fn list(_: Request) -> StatusCode { StatusCode::OK }
    /// # async fn breweries(_: Request) -> StatusCode { StatusCode::OK }
    /// Router::new(CorsPolicy::default())
    ///     .on(Method::GET, "/api/festivals",                 list)
    ///     .on(Method::GET, "/api/festivals/{id}/breweries", breweries);
    /// ```
    pub fn on(mut self, method: Method, path: &str, handler: impl IntoHandler) -> Self {
        let handler = handler.into_handler();
        match self.routes.iter_mut().find(|(p, _)| p == path) {
            Some((_, methods)) => {
                methods.insert(method, handler);
            }
            None => self.routes.push((path.to_owned(), HashMap::from([(method, handler)]))),
        }
        self
    }

    /// Builds the routing tree.
    ///
    /// # Panics
    ///
    /// Panics if a registered path is not a valid route pattern or conflicts
    /// with another one.
    pub fn into_handler(self) -> BoxedHandler {
        let mut tree = MatchitRouter::new();
        for (path, methods) in self.routes {
            let endpoint = Endpoint { cors: Arc::clone(&self.cors), methods };
            tree.insert(path.as_str(), endpoint)
                .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        }
        Arc::new(Routes { tree })
    }
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

struct Routes {
    tree: MatchitRouter<Endpoint>,
}

impl Handler for Routes {
    fn call<'a>(&'a self, mut req: Request, w: &'a mut dyn ResponseWriter) -> BoxFuture<'a> {
        let Ok(matched) = self.tree.at(req.path()) else {
            return Box::pin(async move {
                response::text_error(w, StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE);
            });
        };

        // Matching runs on the raw path so an encoded `/` stays inside one
        // segment; values are decoded afterwards.
        let endpoint = matched.value;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), percent_decode_str(v).decode_utf8_lossy().into_owned()))
            .collect();
        req.set_params(params);
        endpoint.call(req, w)
    }
}

/// The handlers registered on one path, behind that path's CORS policy.
struct Endpoint {
    cors: Arc<CorsPolicy>,
    methods: HashMap<Method, BoxedHandler>,
}

impl Endpoint {
    fn call<'a>(&'a self, req: Request, w: &'a mut dyn ResponseWriter) -> BoxFuture<'a> {
        self.cors.apply(&req, w);

        if req.method() == Method::OPTIONS {
            return Box::pin(async move { w.set_status(StatusCode::OK) });
        }

        match self.methods.get(req.method()) {
            Some(handler) => handler.call(req, w),
            None => Box::pin(async move {
                response::text_error(w, StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED_MESSAGE);
            }),
        }
    }
}
