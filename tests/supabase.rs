//! The Supabase provider against a mocked project.

use chrono::{TimeZone, Utc};
use festivals_api::store::{DataError, DataSource, Supabase};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "anon-key";

const FESTIVALS: &str = r#"[
    {"id":1,"name":"Fest A","description":"d","start_date":"2025-06-01","end_date":"2025-06-03",
     "city":"Paris","region":"IDF","latitude":48.85,"longitude":2.35,"image":"","website":""},
    {"id":2,"name":"Fest B","start_date":"2025-07-01","end_date":"2025-07-02"}
]"#;

const COUNTS: &str = r#"[{"festival_id":1,"count":3}]"#;

const BREWERIES: &str = r#"[{"brewery_id":5,"breweries":{"id":5,"name":"Brasserie","city":"Lyon"}}]"#;

const GRANT: &str = r#"{"access_token":"at","refresh_token":"rt","user":{"id":"u-1","email":"a@b.c"}}"#;

fn json(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "application/json")
}

/// A REST call authenticated with the project key twice over.
fn rest(verb: &str, route: &str) -> wiremock::MockBuilder {
    Mock::given(method(verb))
        .and(path(route))
        .and(header("apikey", KEY))
        .and(header("authorization", format!("Bearer {KEY}").as_str()))
}

async fn provider(server: &MockServer) -> Supabase {
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    Supabase::with_client(&format!("{}/", server.uri()), KEY, client).unwrap()
}

#[tokio::test]
async fn festivals_merge_counts_and_dates() {
    let server = MockServer::start().await;
    rest("GET", "/rest/v1/festivals")
        .and(query_param("select", "*"))
        .respond_with(json(FESTIVALS))
        .expect(1)
        .mount(&server)
        .await;
    rest("POST", "/rest/v1/rpc/get_festival_brewery_counts")
        .and(body_json(serde_json::json!({})))
        .respond_with(json(COUNTS))
        .expect(1)
        .mount(&server)
        .await;

    let festivals = provider(&server).await.festivals().await.unwrap();

    assert_eq!(festivals.len(), 2);
    assert_eq!(festivals[0].brewery_count, 3);
    assert_eq!(festivals[1].brewery_count, 0);
    assert_eq!(festivals[0].start_date, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
    assert_eq!(festivals[0].location.longitude, 2.35);
    assert!(festivals[1].city.is_empty());
}

#[tokio::test]
async fn failed_count_query_fails_the_listing() {
    let server = MockServer::start().await;
    rest("GET", "/rest/v1/festivals").respond_with(json(FESTIVALS)).mount(&server).await;
    rest("POST", "/rest/v1/rpc/get_festival_brewery_counts")
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = provider(&server).await.festivals().await.unwrap_err();
    assert!(matches!(err, DataError::Status(status) if status.as_u16() == 500));
}

#[tokio::test]
async fn breweries_for_one_festival() {
    let server = MockServer::start().await;
    rest("GET", "/rest/v1/festivals_breweries")
        .and(query_param("select", "brewery_id,breweries(*)"))
        .and(query_param("festival_id", "eq.1"))
        .respond_with(json(BREWERIES))
        .expect(1)
        .mount(&server)
        .await;
    rest("GET", "/rest/v1/festivals_breweries")
        .and(query_param("festival_id", "eq.2"))
        .respond_with(json("[]"))
        .expect(1)
        .mount(&server)
        .await;

    let db = provider(&server).await;

    let breweries = db.breweries_by_festival("1").await.unwrap();
    assert_eq!(breweries.len(), 1);
    assert_eq!(breweries[0].name, "Brasserie");

    assert!(db.breweries_by_festival("2").await.unwrap().is_empty());
}

#[tokio::test]
async fn login_posts_credentials_with_the_project_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(header("apikey", KEY))
        .and(body_json(serde_json::json!({"email": "a@b.c", "password": "pw"})))
        .respond_with(json(GRANT))
        .expect(1)
        .mount(&server)
        .await;

    let session = provider(&server).await.login("a@b.c", "pw").await.unwrap();
    assert_eq!(session.access_token, "at");
    assert_eq!(session.refresh_token, "rt");
    assert_eq!(session.user.id, "u-1");
}

#[tokio::test]
async fn verify_sends_the_callers_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("apikey", KEY))
        .and(header("authorization", "Bearer good-token"))
        .respond_with(json(r#"{"id":"u-1","email":"a@b.c"}"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("authorization", "Bearer expired"))
        .respond_with(ResponseTemplate::new(401).set_body_raw(r#"{"message":"invalid JWT"}"#, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let db = provider(&server).await;

    let user = db.verify_token("good-token").await.unwrap();
    assert_eq!(user.id, "u-1");
    assert_eq!(user.email, "a@b.c");

    let err = db.verify_token("expired").await.unwrap_err();
    assert!(matches!(err, DataError::Status(status) if status.as_u16() == 401));
}
