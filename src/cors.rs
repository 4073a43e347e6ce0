//! Cross-origin resource sharing policy.
//!
//! Not a chain stage: the router applies it to every route immediately before
//! method dispatch, and answers pre-flight `OPTIONS` requests itself.

use std::convert::Infallible;
use std::str::FromStr;

use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN,
};
use http::HeaderValue;

use crate::request::Request;
use crate::response::ResponseWriter;

const WILDCARD: &str = "*";
static DEFAULT_METHODS: HeaderValue = HeaderValue::from_static("GET, POST, OPTIONS");
static DEFAULT_HEADERS: HeaderValue = HeaderValue::from_static("Content-Type, Authorization");

/// The configured set of origins allowed to read responses cross-origin.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AllowedOrigins {
    /// `*`: every response carries `access-control-allow-origin: *`.
    Any,
    /// Exact origins, compared verbatim against the request's `Origin`.
    List(Vec<String>),
}

impl AllowedOrigins {
    /// Parses the wildcard token or a comma-separated list. Entries are
    /// trimmed; empty entries are dropped.
    pub fn new(config: &str) -> Self {
        if config == WILDCARD {
            return Self::Any;
        }
        let origins = config
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_owned)
            .collect();
        Self::List(origins)
    }

    fn allows(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::List(origins) => origins.iter().any(|o| o == origin),
        }
    }
}

impl FromStr for AllowedOrigins {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

/// Decides per request which origin to echo back, and advertises the fixed
/// methods and headers.
#[derive(Clone, Debug)]
pub struct CorsPolicy {
    origins: AllowedOrigins,
    methods: HeaderValue,
    headers: HeaderValue,
}

impl CorsPolicy {
    pub fn new(origins: AllowedOrigins) -> Self {
        Self { origins, methods: DEFAULT_METHODS.clone(), headers: DEFAULT_HEADERS.clone() }
    }

    pub fn allow_methods(mut self, methods: HeaderValue) -> Self {
        self.methods = methods;
        self
    }

    pub fn allow_headers(mut self, headers: HeaderValue) -> Self {
        self.headers = headers;
        self
    }

    /// The `access-control-allow-origin` value for a request carrying
    /// `origin`, or `None` when the header must be left unset.
    pub fn allow_origin(&self, origin: Option<&HeaderValue>) -> Option<HeaderValue> {
        if self.origins == AllowedOrigins::Any {
            return Some(HeaderValue::from_static(WILDCARD));
        }
        let origin = origin?;
        let value = origin.to_str().ok().filter(|o| !o.is_empty())?;
        self.origins.allows(value).then(|| origin.clone())
    }

    /// Writes the CORS response headers for `req` into `w`.
    pub fn apply(&self, req: &Request, w: &mut dyn ResponseWriter) {
        let headers = w.headers_mut();
        if let Some(origin) = self.allow_origin(req.headers().get(ORIGIN)) {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, self.methods.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, self.headers.clone());
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::new(AllowedOrigins::Any)
    }
}
