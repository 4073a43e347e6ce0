//! Correlation identifier stage.

use std::sync::Arc;

use http::header::HeaderName;
use http::{HeaderValue, StatusCode};
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::error;

use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::request::{Request, RequestId};
use crate::response::{self, ResponseWriter};

/// Header carrying the correlation identifier in both directions.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Wraps `next` so every request carries a correlation identifier.
///
/// An inbound `x-request-id` is propagated verbatim; when it is missing or
/// empty a fresh one is generated. The same value is echoed on the response
/// and bound into the request context.
pub fn request_id(next: BoxedHandler) -> BoxedHandler {
    Arc::new(RequestIdStage { next })
}

struct RequestIdStage {
    next: BoxedHandler,
}

impl Handler for RequestIdStage {
    fn call<'a>(&'a self, mut req: Request, w: &'a mut dyn ResponseWriter) -> BoxFuture<'a> {
        Box::pin(async move {
            let id = match inbound(&req) {
                Some(id) => id,
                None => match generate() {
                    Ok(id) => id,
                    Err(e) => {
                        error!("failed to generate request id: {e}");
                        response::text_error(
                            w,
                            StatusCode::INTERNAL_SERVER_ERROR,
                            response::INTERNAL_ERROR_MESSAGE,
                        );
                        return;
                    }
                },
            };

            // Inbound values already passed header validation; generated ones
            // are hex.
            if let Ok(value) = HeaderValue::from_str(id.as_str()) {
                w.headers_mut().insert(X_REQUEST_ID.clone(), value);
            }
            req.context_mut().set_request_id(id);

            self.next.call(req, w).await;
        })
    }
}

fn inbound(req: &Request) -> Option<RequestId> {
    req.header(X_REQUEST_ID.as_str())
        .filter(|id| !id.is_empty())
        .map(RequestId::new)
}

/// 16 bytes from the OS random source, lowercase hex (32 characters).
pub fn generate() -> Result<RequestId, rand::Error> {
    let mut bytes = [0u8; 16];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(RequestId::new(hex::encode(bytes)))
}
