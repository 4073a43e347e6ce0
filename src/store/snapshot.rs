use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use super::{DataError, DataSource};
use crate::model::{Brewery, Festival, Session, User};

/// Festivals loaded once from a JSON file and served from memory.
///
/// The file holds an array in the same shape the API serves. Breweries are
/// not part of the snapshot, and there is no identity provider behind it.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    festivals: Vec<Festival>,
}

impl Snapshot {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|source| DataError::Read { path: path.display().to_string(), source })?;
        let festivals: Vec<Festival> = serde_json::from_slice(&bytes)?;
        debug!(count = festivals.len(), "loaded festivals snapshot");
        Ok(Self { festivals })
    }

    pub fn from_festivals(festivals: Vec<Festival>) -> Self {
        Self { festivals }
    }
}

#[async_trait]
impl DataSource for Snapshot {
    async fn festivals(&self) -> Result<Vec<Festival>, DataError> {
        Ok(self.festivals.clone())
    }

    async fn breweries_by_festival(&self, _festival_id: &str) -> Result<Vec<Brewery>, DataError> {
        Ok(Vec::new())
    }

    async fn login(&self, _email: &str, _password: &str) -> Result<Session, DataError> {
        Err(DataError::Unsupported("authentication"))
    }

    async fn verify_token(&self, _token: &str) -> Result<User, DataError> {
        Err(DataError::Unsupported("authentication"))
    }
}
