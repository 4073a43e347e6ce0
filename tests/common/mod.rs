//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use festivals_api::model::{Brewery, Festival, Location, Session, User};
use festivals_api::store::{DataError, DataSource};
use festivals_api::{BoxedHandler, Response};
use http::StatusCode;

/// A data source with canned answers that counts every call.
#[derive(Default)]
pub struct MockSource {
    pub fail_festivals: bool,
    pub fail_breweries: bool,
    pub calls: AtomicUsize,
}

impl MockSource {
    pub fn failing() -> Self {
        Self { fail_festivals: true, fail_breweries: true, ..Self::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

pub const EMAIL: &str = "user@example.com";
pub const PASSWORD: &str = "secret";
pub const TOKEN: &str = "valid-token";

pub fn festival() -> Festival {
    Festival {
        id: 1,
        name: "Test Festival".into(),
        description: "A test festival".into(),
        start_date: Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap(),
        end_date: Utc.with_ymd_and_hms(2025, 10, 3, 0, 0, 0).unwrap(),
        city: "Paris".into(),
        region: "Île-de-France".into(),
        location: Location { latitude: 48.8566, longitude: 2.3522 },
        image: String::new(),
        website: "https://example.com".into(),
        brewery_count: 2,
    }
}

pub fn user() -> User {
    User { id: "user-1".into(), email: EMAIL.into() }
}

#[async_trait]
impl DataSource for MockSource {
    async fn festivals(&self) -> Result<Vec<Festival>, DataError> {
        self.record();
        if self.fail_festivals {
            return Err(DataError::Status(StatusCode::BAD_GATEWAY));
        }
        Ok(vec![festival()])
    }

    async fn breweries_by_festival(&self, festival_id: &str) -> Result<Vec<Brewery>, DataError> {
        self.record();
        if self.fail_breweries {
            return Err(DataError::Status(StatusCode::BAD_GATEWAY));
        }
        Ok(vec![Brewery {
            id: 10,
            name: format!("Brewery of festival {festival_id}"),
            description: String::new(),
            city: "Lyon".into(),
            website: String::new(),
            logo: String::new(),
        }])
    }

    async fn login(&self, email: &str, password: &str) -> Result<Session, DataError> {
        self.record();
        if email == EMAIL && password == PASSWORD {
            return Ok(Session { access_token: TOKEN.into(), refresh_token: "refresh".into(), user: user() });
        }
        Err(DataError::Status(StatusCode::BAD_REQUEST))
    }

    async fn verify_token(&self, token: &str) -> Result<User, DataError> {
        self.record();
        if token == TOKEN {
            return Ok(user());
        }
        Err(DataError::Status(StatusCode::UNAUTHORIZED))
    }
}

/// Drives one request through `app` in-process.
pub async fn send(app: &BoxedHandler, req: http::Request<Bytes>) -> Response {
    let mut res = Response::new();
    app.call(req.into(), &mut res).await;
    res
}

pub fn source(mock: MockSource) -> (Arc<MockSource>, Arc<dyn DataSource>) {
    let mock = Arc::new(mock);
    let source: Arc<dyn DataSource> = mock.clone();
    (mock, source)
}
