use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DataError, DataSource};
use crate::model::{Brewery, Festival, Location, Session, User};

pub(super) const MISSING_CREDENTIALS: &str =
    "SUPABASE_URL and SUPABASE_KEY environment variables are required";

const API_KEY: &str = "apikey";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Live provider backed by a Supabase project: PostgREST for reads, GoTrue
/// for authentication. One request per call, no retries.
#[derive(Clone, Debug)]
pub struct Supabase {
    client: Client,
    url: String,
    key: String,
}

impl Supabase {
    pub fn new(url: &str, key: &str) -> Result<Self, DataError> {
        Self::with_client(url, key, Client::builder().build()?)
    }

    /// Like [`Supabase::new`], reusing a preconfigured HTTP client.
    pub fn with_client(url: &str, key: &str, client: Client) -> Result<Self, DataError> {
        let url = url.trim().trim_end_matches('/');
        let key = key.trim();
        if url.is_empty() || key.is_empty() {
            return Err(DataError::Config(MISSING_CREDENTIALS));
        }
        Ok(Self { client, url: url.to_owned(), key: key.to_owned() })
    }

    // ── Request helpers ──────────────────────────────────────────────────────

    fn rest(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(API_KEY, &self.key).bearer_auth(&self.key)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    async fn fetch<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, DataError> {
        let res = builder.send().await?;
        let bytes = success(res)?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn brewery_counts(&self) -> Result<HashMap<i64, i64>, DataError> {
        let req = self.rest(self.client.post(self.endpoint("/rest/v1/rpc/get_festival_brewery_counts")));
        let rows: Vec<BreweryCountRow> = Self::fetch(req.json(&serde_json::json!({}))).await?;
        Ok(rows.into_iter().map(|r| (r.festival_id, r.count.unwrap_or(0))).collect())
    }
}

fn success(res: Response) -> Result<Response, DataError> {
    let status = res.status();
    if status.is_success() { Ok(res) } else { Err(DataError::Status(status)) }
}

/// Converts a `YYYY-MM-DD` column into a UTC-midnight timestamp.
pub(crate) fn parse_date(value: &str) -> Result<DateTime<Utc>, DataError> {
    let date = NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|source| DataError::Date { value: value.to_owned(), source })?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

// ── Rows ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FestivalRow {
    id: i64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    start_date: String,
    end_date: String,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    website: Option<String>,
}

impl FestivalRow {
    fn into_festival(self, brewery_count: i64) -> Result<Festival, DataError> {
        Ok(Festival {
            id: self.id,
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            start_date: parse_date(&self.start_date)?,
            end_date: parse_date(&self.end_date)?,
            city: self.city.unwrap_or_default(),
            region: self.region.unwrap_or_default(),
            location: Location {
                latitude: self.latitude.unwrap_or_default(),
                longitude: self.longitude.unwrap_or_default(),
            },
            image: self.image.unwrap_or_default(),
            website: self.website.unwrap_or_default(),
            brewery_count,
        })
    }
}

#[derive(Debug, Deserialize)]
struct BreweryCountRow {
    festival_id: i64,
    #[serde(default)]
    count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BreweryRow {
    id: i64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    logo: Option<String>,
}

impl From<BreweryRow> for Brewery {
    fn from(row: BreweryRow) -> Self {
        Self {
            id: row.id,
            name: row.name.unwrap_or_default(),
            description: row.description.unwrap_or_default(),
            city: row.city.unwrap_or_default(),
            website: row.website.unwrap_or_default(),
            logo: row.logo.unwrap_or_default(),
        }
    }
}

/// A `festivals_breweries` link row with its brewery embedded.
#[derive(Debug, Deserialize)]
struct LinkRow {
    breweries: BreweryRow,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<AuthUser> for User {
    fn from(user: AuthUser) -> Self {
        Self { id: user.id, email: user.email.unwrap_or_default() }
    }
}

// ── DataSource ───────────────────────────────────────────────────────────────

#[async_trait]
impl DataSource for Supabase {
    async fn festivals(&self) -> Result<Vec<Festival>, DataError> {
        let req = self.rest(self.client.get(self.endpoint("/rest/v1/festivals")).query(&[("select", "*")]));
        let (rows, counts) = tokio::try_join!(Self::fetch::<Vec<FestivalRow>>(req), self.brewery_counts())?;
        debug!(festivals = rows.len(), "fetched festivals");

        rows.into_iter()
            .map(|row| {
                let count = counts.get(&row.id).copied().unwrap_or(0);
                row.into_festival(count)
            })
            .collect()
    }

    async fn breweries_by_festival(&self, festival_id: &str) -> Result<Vec<Brewery>, DataError> {
        let filter = format!("eq.{festival_id}");
        let req = self.rest(self.client.get(self.endpoint("/rest/v1/festivals_breweries")).query(&[
            ("select", "brewery_id,breweries(*)"),
            ("festival_id", filter.as_str()),
        ]));
        let rows: Vec<LinkRow> = Self::fetch(req).await?;
        Ok(rows.into_iter().map(|link| link.breweries.into()).collect())
    }

    async fn login(&self, email: &str, password: &str) -> Result<Session, DataError> {
        let req = self
            .client
            .post(self.endpoint("/auth/v1/token"))
            .query(&[("grant_type", "password")])
            .header(API_KEY, &self.key)
            .json(&Credentials { email, password });
        let grant: TokenGrant = Self::fetch(req).await?;
        Ok(Session {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            user: grant.user.into(),
        })
    }

    async fn verify_token(&self, token: &str) -> Result<User, DataError> {
        let req = self.client.get(self.endpoint("/auth/v1/user")).header(API_KEY, &self.key).bearer_auth(token);
        let res = req.send().await?;
        if res.status() != reqwest::StatusCode::OK {
            return Err(DataError::Status(res.status()));
        }
        let user: AuthUser = serde_json::from_slice(&res.bytes().await?)?;
        Ok(user.into())
    }
}
