//! Data access.
//!
//! Route handlers read festivals and breweries, and delegate authentication,
//! through one capability: [`DataSource`]. Two providers satisfy it:
//!
//! | Provider | Backing | Auth |
//! |---|---|---|
//! | [`Snapshot`] | JSON file loaded once at startup | unsupported |
//! | [`Supabase`] | live PostgREST + GoTrue over HTTPS | yes |
//!
//! Providers are shared across concurrent requests behind an `Arc` and must
//! be safe for concurrent use.

mod snapshot;
mod supabase;

pub use snapshot::Snapshot;
pub use supabase::Supabase;

use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use tracing::info;

use crate::config::Config;
use crate::model::{Brewery, Festival, Session, User};

/// Failures of a data source. Never shown to clients.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned {0}")]
    Status(StatusCode),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read {path}: {source}")]
    Read { path: String, source: std::io::Error },

    #[error("invalid date {value:?}: {source}")]
    Date { value: String, source: chrono::ParseError },

    #[error("{0}")]
    Config(&'static str),

    #[error("{0} is not supported by this data source")]
    Unsupported(&'static str),
}

/// The read and auth contract consumed by route handlers.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn festivals(&self) -> Result<Vec<Festival>, DataError>;

    async fn breweries_by_festival(&self, festival_id: &str) -> Result<Vec<Brewery>, DataError>;

    async fn login(&self, email: &str, password: &str) -> Result<Session, DataError>;

    async fn verify_token(&self, token: &str) -> Result<User, DataError>;
}

/// Picks the provider the configuration asks for.
///
/// Both Supabase settings → live provider. Neither → snapshot file. Exactly
/// one is a misconfiguration.
pub fn from_config(config: &Config) -> Result<Arc<dyn DataSource>, DataError> {
    match (&config.supabase_url, &config.supabase_key) {
        (Some(url), Some(key)) => {
            info!(url = %url, "using supabase data source");
            Ok(Arc::new(Supabase::new(url, key)?))
        }
        (None, None) => {
            info!(path = %config.festivals_file.display(), "using festivals snapshot");
            Ok(Arc::new(Snapshot::load(&config.festivals_file)?))
        }
        _ => Err(DataError::Config(supabase::MISSING_CREDENTIALS)),
    }
}
