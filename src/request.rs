//! Incoming HTTP request type and its per-request context.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};
use http::request::Parts;
use tokio::time::Instant;

/// A correlation identifier joining every log line of one request.
///
/// Opaque: either 32 lowercase hex characters when generated, or the
/// caller-supplied value verbatim.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why the server could not collect a request body.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BodyError {
    /// The body did not arrive within the read timeout.
    Timeout,
    /// The connection failed while the body was being read.
    Read,
}

impl BodyError {
    pub fn status(self) -> StatusCode {
        match self {
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::Read => StatusCode::BAD_REQUEST,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Timeout => "Request timeout",
            Self::Read => "Bad request",
        }
    }
}

/// Typed values bound to one request's processing scope.
///
/// Travels with the [`Request`] through every middleware stage. Stages write
/// into it on the way in; later stages only read. The server fills in the
/// response deadline and any body failure before the chain runs.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    request_id: Option<RequestId>,
    deadline: Option<Instant>,
    body_error: Option<BodyError>,
}

impl RequestContext {
    /// The correlation identifier, if the request-id stage ran upstream.
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub(crate) fn set_request_id(&mut self, id: RequestId) {
        self.request_id = Some(id);
    }

    /// When the response must be complete.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) fn set_deadline(&mut self, at: Instant) {
        self.deadline = Some(at);
    }

    /// Set when the body could not be collected; the body is then empty.
    pub fn body_error(&self) -> Option<BodyError> {
        self.body_error
    }

    pub(crate) fn set_body_error(&mut self, error: BodyError) {
        self.body_error = Some(error);
    }
}

/// An incoming HTTP request with its body fully collected.
pub struct Request {
    parts: Parts,
    body: Bytes,
    params: HashMap<String, String>,
    context: RequestContext,
}

impl Request {
    pub fn new(parts: Parts, body: Bytes) -> Self {
        Self { parts, body, params: HashMap::new(), context: RequestContext::default() }
    }

    pub fn method(&self) -> &Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/api/festivals/{id}/breweries`, `req.param("id")` on
    /// `/api/festivals/7/breweries` returns `Some("7")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn context(&self) -> &RequestContext { &self.context }

    pub(crate) fn context_mut(&mut self) -> &mut RequestContext { &mut self.context }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts, body)
    }
}
