use axum::http::{self, Request, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine};
use http_body_util::BodyExt;
use mock_server::{app, Fixture};
use serde_json::Value;
use tower::ServiceExt;

const BASE: &str = "http://localhost:3000/api";

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str, key: Option<&str>) -> Request<String> {
    let mut builder = Request::builder().uri(uri);
    if let Some(key) = key {
        let credentials = STANDARD.encode(format!("1234:{key}"));
        builder = builder.header(http::header::AUTHORIZATION, format!("Basic {credentials}"));
    }
    builder.body(String::new()).unwrap()
}

// --- memberlist ---

#[tokio::test]
async fn memberlist_returns_enveloped_members() {
    let resp = app(Fixture::sample(BASE))
        .oneshot(get("/api/group/memberlist", Some("member-secret")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let data = body["data"].as_object().unwrap();
    assert_eq!(data.len(), 5);
    assert_eq!(data["3001"]["first_name"]["value"], "Astrid");
}

#[tokio::test]
async fn memberlist_without_credentials_is_401() {
    let resp = app(Fixture::sample(BASE))
        .oneshot(get("/api/group/memberlist", None))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn memberlist_rejects_customlists_key() {
    let resp = app(Fixture::sample(BASE))
        .oneshot(get("/api/group/memberlist", Some("lists-secret")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- customlists ---

#[tokio::test]
async fn customlists_index_links_back_to_server() {
    let resp = app(Fixture::sample(BASE))
        .oneshot(get("/api/group/customlists", Some("lists-secret")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(
        body["10"]["link"],
        "http://localhost:3000/api/group/customlists?list_id=10"
    );
    assert_eq!(body["20"]["aliases"], Value::Array(Vec::new()));
}

#[tokio::test]
async fn list_members_by_id() {
    let resp = app(Fixture::sample(BASE))
        .oneshot(get("/api/group/customlists?list_id=10", Some("lists-secret")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["3001"]["extra_emails"]["value"][0], "Mamma@Example.se");
}

#[tokio::test]
async fn unknown_list_is_404() {
    let resp = app(Fixture::sample(BASE))
        .oneshot(get("/api/group/customlists?list_id=99", Some("lists-secret")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_numeric_list_id_is_400() {
    let resp = app(Fixture::sample(BASE))
        .oneshot(get("/api/group/customlists?list_id=abc", Some("lists-secret")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_route_is_404() {
    let resp = app(Fixture::sample(BASE))
        .oneshot(get("/api/group/nothing", Some("member-secret")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
