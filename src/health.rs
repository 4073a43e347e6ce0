//! Built-in health-check handler.
//!
//! Register it on the router:
//!
//! ```rust,no_run
//! use festivals_api::{CorsPolicy, Router, health};
//! use http::Method;
//!
//! let app = Router::new(CorsPolicy::default())
//!     .on(Method::GET, "/health", health::check);
//! ```

use serde::Serialize;

use crate::request::Request;
use crate::response::Json;

/// Reported service version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Body of a health-check reply.
#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
}

/// Liveness handler.
///
/// Always returns `200 OK` with `{"status":"ok","version":...}`. If the
/// process can respond to HTTP at all, it is alive; this handler has no
/// dependencies.
pub async fn check(_req: Request) -> Json<Health> {
    Json(Health { status: "ok", version: VERSION })
}
