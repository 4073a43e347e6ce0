//! # festivals-api
//!
//! A small HTTP façade that serves festival and brewery listings and passes
//! authentication through to an identity provider.
//!
//! ## The contract
//!
//! A reverse proxy sits in front. It owns TLS, rate limiting, and body-size
//! limits. This service owns what changes between applications:
//!
//! - Radix-tree routing with per-route CORS, via [`matchit`]
//! - A handler-to-handler middleware chain: request id, access log, gzip,
//!   and the server's read and write limits
//! - One data-access capability with two providers: a static JSON snapshot
//!   and a live Supabase project
//! - Graceful shutdown on SIGTERM / Ctrl-C, draining in-flight requests
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use festivals_api::{Server, api, store::Snapshot, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), festivals_api::Error> {
//!     let config = Config::default();
//!     let source = Arc::new(Snapshot::load(&config.festivals_file)?);
//!     let app = api::app(config.cors(), source);
//!
//!     Server::bind(config.addr()).serve(app).await
//! }
//! ```

mod error;
mod handler;
mod request;
mod response;
mod router;

pub mod api;
pub mod config;
pub mod cors;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod model;
pub mod server;
pub mod store;

pub use config::Config;
pub use cors::{AllowedOrigins, CorsPolicy};
pub use error::Error;
pub use handler::{BoxFuture, BoxedHandler, Handler, IntoHandler};
pub use request::{BodyError, Request, RequestContext, RequestId};
pub use response::{IntoReply, Json, Response, ResponseWriter, text_error, INTERNAL_ERROR_MESSAGE};
pub use router::{Router, METHOD_NOT_ALLOWED_MESSAGE, NOT_FOUND_MESSAGE};
pub use server::{Server, Timeouts};
