//! HTTP-level tests through the full router with stub provider adapters

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use common::{sample_track, test_config, SearchBehavior, StubProvider};
use transpose_common::model::ProviderId;
use transpose_server::db::init_memory_pool;
use transpose_server::providers::{ProviderAdapter, ProviderRegistry};
use transpose_server::{build_router, AppState};

async fn test_app(adapters: Vec<Arc<StubProvider>>, min_matches: usize) -> Router {
    let registry = Arc::new(ProviderRegistry::new(
        adapters
            .into_iter()
            .map(|adapter| adapter as Arc<dyn ProviderAdapter>)
            .collect(),
    ));
    let db = init_memory_pool().await.unwrap();
    build_router(AppState::new(db, registry, &test_config(min_matches)))
}

async fn both_providers_matching() -> (Router, Arc<StubProvider>, Arc<StubProvider>) {
    let spotify = StubProvider::new(
        ProviderId::Spotify,
        Some(sample_track("Song", "Artist")),
        SearchBehavior::Match,
    );
    let apple = StubProvider::new(ProviderId::Apple, None, SearchBehavior::Match);
    let app = test_app(vec![spotify.clone(), apple.clone()], 1).await;
    (app, spotify, apple)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _, _) = both_providers_matching().await;

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "transpose-server");
}

#[tokio::test]
async fn transpose_returns_assembled_content() {
    let (app, _, _) = both_providers_matching().await;

    let response = app
        .oneshot(
            Request::get("/transpose/spotify/track/abc123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["metadata"]["type"], "track");
    assert!(body["links"]["spotify"].is_string());
    assert!(body["links"]["apple"].is_string());
    let transpose_link = body["links"]["transpose"].as_str().unwrap();
    assert!(transpose_link.starts_with("https://transpose.test/t/"));
}

#[tokio::test]
async fn minted_short_link_resolves_to_the_same_content() {
    let (app, _, _) = both_providers_matching().await;

    let response = app
        .clone()
        .oneshot(
            Request::get("/transpose/spotify/track/abc123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let minted = body_json(response).await;
    let transpose_link = minted["links"]["transpose"].as_str().unwrap();
    let short_id = transpose_link.rsplit('/').next().unwrap();

    let response = app
        .oneshot(
            Request::get(format!("/t/{}", short_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, minted);
}

#[tokio::test]
async fn unknown_provider_is_a_bad_request() {
    let (app, _, _) = both_providers_matching().await;

    let response = app
        .oneshot(
            Request::get("/transpose/tidal/track/abc123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn unknown_element_type_is_a_bad_request() {
    let (app, _, _) = both_providers_matching().await;

    let response = app
        .oneshot(
            Request::get("/transpose/spotify/podcast/abc123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn playlists_are_rejected_on_the_transpose_route() {
    let (app, _, _) = both_providers_matching().await;

    let response = app
        .oneshot(
            Request::get("/transpose/spotify/playlist/mix123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("/convert"));
}

#[tokio::test]
async fn missing_source_element_is_not_found() {
    let spotify = StubProvider::new(ProviderId::Spotify, None, SearchBehavior::Match);
    let apple = StubProvider::new(ProviderId::Apple, None, SearchBehavior::Match);
    let app = test_app(vec![spotify, apple], 1).await;

    let response = app
        .oneshot(
            Request::get("/transpose/spotify/track/missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn too_few_matches_maps_to_not_found() {
    let spotify = StubProvider::new(
        ProviderId::Spotify,
        Some(sample_track("Song", "Artist")),
        SearchBehavior::Match,
    );
    let apple = StubProvider::new(ProviderId::Apple, None, SearchBehavior::NoMatch);
    let app = test_app(vec![spotify, apple], 1).await;

    let response = app
        .oneshot(
            Request::get("/transpose/spotify/track/abc123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn unknown_transpose_id_is_not_found() {
    let (app, _, _) = both_providers_matching().await;

    let response = app
        .oneshot(Request::get("/t/doesnotexist").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn convert_returns_the_destination_link() {
    let (app, _, _) = both_providers_matching().await;

    let response = app
        .oneshot(post_json(
            "/convert",
            serde_json::json!({
                "link": "https://spotify.example/track/abc123",
                "destProviderID": "apple",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["link"]
        .as_str()
        .unwrap()
        .starts_with("https://apple.example/"));
}

#[tokio::test]
async fn convert_rejects_an_empty_link() {
    let (app, _, _) = both_providers_matching().await;

    let response = app
        .oneshot(post_json(
            "/convert",
            serde_json::json!({ "link": "  ", "destProviderID": "apple" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn convert_rejects_an_unknown_destination() {
    let (app, _, _) = both_providers_matching().await;

    let response = app
        .oneshot(post_json(
            "/convert",
            serde_json::json!({
                "link": "https://spotify.example/track/abc123",
                "destProviderID": "tidal",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn convert_rejects_an_unparseable_link() {
    let (app, _, _) = both_providers_matching().await;

    let response = app
        .oneshot(post_json(
            "/convert",
            serde_json::json!({
                "link": "https://example.com/not-a-music-link",
                "destProviderID": "apple",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn refresh_stores_a_fresh_credential() {
    let (app, spotify, _) = both_providers_matching().await;

    let response = app
        .oneshot(
            Request::post("/refresh/spotify")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        spotify
            .refresh_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

#[tokio::test]
async fn refresh_of_unknown_provider_is_a_bad_request() {
    let (app, _, _) = both_providers_matching().await;

    let response = app
        .oneshot(Request::post("/refresh/tidal").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn refresh_failure_maps_to_bad_gateway() {
    let spotify = StubProvider::failing_refresh(ProviderId::Spotify);
    let apple = StubProvider::new(ProviderId::Apple, None, SearchBehavior::Match);
    let app = test_app(vec![spotify, apple], 1).await;

    let response = app
        .oneshot(
            Request::post("/refresh/spotify")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");
}
