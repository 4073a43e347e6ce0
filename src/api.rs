//! HTTP API: route handlers and application assembly.
//!
//! ```text
//! GET  /health                         liveness
//! GET  /api/festivals                  all festivals
//! GET  /api/festivals/{id}/breweries   breweries attending one festival
//! POST /api/auth/login                 email + password → session
//! GET  /api/auth/verify                bearer token → user
//! ```

use std::future::Future;
use std::sync::Arc;

use http::header::AUTHORIZATION;
use http::{Method, StatusCode};
use tracing::{error, warn};

use crate::cors::CorsPolicy;
use crate::handler::{BoxedHandler, IntoHandler};
use crate::health;
use crate::middleware::{Middleware, chain, gzip, limits, metrics, request_id};
use crate::model::{Brewery, Festival, LoginRequest, Session, VerifyResponse};
use crate::request::Request;
use crate::response::{self, IntoReply, Json, ResponseWriter};
use crate::router::Router;
use crate::store::{DataError, DataSource};

const BEARER: &str = "Bearer ";

/// Shared handle to the data source, cloned into every handler.
pub type Source = Arc<dyn DataSource>;

/// Client-visible failures. Every variant renders as a plain-text reply.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("Invalid credentials")]
    Unauthorized,

    #[error("{}", response::INTERNAL_ERROR_MESSAGE)]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoReply for ApiError {
    fn write_to(self, w: &mut dyn ResponseWriter) {
        response::text_error(w, self.status(), &self.to_string());
    }
}

/// Logs a data-source failure and hides it from the client.
fn internal(what: &str, e: DataError) -> ApiError {
    error!(error = %e, "failed to fetch {what}");
    ApiError::Internal
}

// ── Handlers ─────────────────────────────────────────────────────────────────

pub async fn festivals(source: Source, _req: Request) -> Result<Json<Vec<Festival>>, ApiError> {
    let festivals = source.festivals().await.map_err(|e| internal("festivals", e))?;
    Ok(Json(festivals))
}

pub async fn breweries(source: Source, req: Request) -> Result<Json<Vec<Brewery>>, ApiError> {
    let id = req.param("id").unwrap_or_default();
    if id.is_empty() {
        return Err(ApiError::BadRequest("Festival ID is required"));
    }
    let breweries = source.breweries_by_festival(id).await.map_err(|e| {
        error!(festival_id = %id, error = %e, "failed to fetch breweries");
        ApiError::Internal
    })?;
    Ok(Json(breweries))
}

pub async fn login(source: Source, req: Request) -> Result<Json<Session>, ApiError> {
    let creds: LoginRequest =
        serde_json::from_slice(req.body()).map_err(|_| ApiError::BadRequest("Invalid request body"))?;
    if creds.email.is_empty() || creds.password.is_empty() {
        return Err(ApiError::BadRequest("Email and password are required"));
    }
    match source.login(&creds.email, &creds.password).await {
        Ok(session) => Ok(Json(session)),
        Err(e) => {
            warn!(error = %e, "login rejected");
            Err(ApiError::Unauthorized)
        }
    }
}

/// Always `200 OK`; the outcome is in the body.
pub async fn verify(source: Source, req: Request) -> Json<VerifyResponse> {
    let Some(header) = req.header(AUTHORIZATION.as_str()).filter(|h| !h.is_empty()) else {
        return Json(VerifyResponse::invalid("No authorization header"));
    };
    let Some(token) = header.strip_prefix(BEARER) else {
        return Json(VerifyResponse::invalid("Invalid authorization format"));
    };
    match source.verify_token(token).await {
        Ok(user) => Json(VerifyResponse::valid(user)),
        Err(e) => {
            warn!(error = %e, "token rejected");
            Json(VerifyResponse::invalid("Invalid token"))
        }
    }
}

// ── Assembly ─────────────────────────────────────────────────────────────────

/// Binds a handler that needs the data source to a clone of it.
fn with_source<F, Fut, R>(source: &Source, f: F) -> impl IntoHandler
where
    F: Fn(Source, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    let source = Arc::clone(source);
    move |req: Request| f(Arc::clone(&source), req)
}

/// The route table.
pub fn router(cors: CorsPolicy, source: Source) -> Router {
    Router::new(cors)
        .on(Method::GET, "/health", health::check)
        .on(Method::GET, "/api/festivals", with_source(&source, festivals))
        .on(Method::GET, "/api/festivals/{id}/breweries", with_source(&source, breweries))
        .on(Method::GET, "/api/festivals//breweries", with_source(&source, breweries))
        .on(Method::POST, "/api/auth/login", with_source(&source, login))
        .on(Method::GET, "/api/auth/verify", with_source(&source, verify))
}

/// The complete application: routes behind request-id, metrics, gzip and
/// the server's per-request limits.
pub fn app(cors: CorsPolicy, source: Source) -> BoxedHandler {
    let stages: [&Middleware; 4] = [&request_id, &metrics, &gzip, &limits];
    chain(router(cors, source).into_handler(), &stages)
}
