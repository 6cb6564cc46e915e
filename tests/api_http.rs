// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;

use axum::{
    body::{self, Body},
    Router,
};
use http::{Request, StatusCode};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use grant_match::api::{create_router, AppState};
use grant_match::config::MatchConfig;
use grant_match::llm::{DisabledService, DynService, MockService, RetryPolicy, ServiceError};
use grant_match::pipeline::Engine;

const BODY_LIMIT: usize = 1024 * 1024;

fn router_with(service: DynService) -> Router {
    let engine = Engine::new(MatchConfig::default(), RetryPolicy::immediate(1));
    create_router(AppState::new(engine, service, Vec::new()))
}

fn post(uri: &str, payload: Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST request")
}

async fn json_body(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn robotics_profile() -> Json {
    json!({
        "themes": ["robotics"],
        "methods_keywords": ["control"],
        "application_domains": []
    })
}

#[tokio::test]
async fn health_returns_ok() {
    let app = router_with(Arc::new(DisabledService));
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn profile_requires_publications() {
    let app = router_with(Arc::new(DisabledService));
    let resp = app
        .oneshot(post("/profile", json!({"publication_text": "   "})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(resp).await;
    assert!(body["error"].as_str().unwrap().contains("publication"));
}

#[tokio::test]
async fn profile_is_built_with_short_text_warning() {
    let svc = MockService::new().reply(r#"{"themes": ["Robotics"], "methods_keywords": ["grippers"]}"#);
    let app = router_with(Arc::new(svc.clone()));

    let resp = app
        .oneshot(post(
            "/profile",
            json!({"publication_text": "Soft grippers, 2024", "proposal_text": ""}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["profile"]["themes"], json!(["Robotics"]));
    assert_eq!(body["profile"]["keyword_recency_weights"]["grippers"], json!(1.0));
    assert_eq!(body["warnings"].as_array().unwrap().len(), 1);
    assert_eq!(svc.call_count(), 1);
}

#[tokio::test]
async fn normalize_maps_and_drops_records() {
    let app = router_with(Arc::new(DisabledService));
    let resp = app
        .oneshot(post(
            "/listings/normalize",
            json!([
                {"opportunityTitle": "AI Institutes", "url": "https://example.org/ai", "closeDate": "2026-03-01"},
                {"summary": "no title or link"},
                "not an object"
            ]),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    let listings = body["listings"].as_array().unwrap();
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0]["title"], "AI Institutes");
    assert_eq!(listings[0]["deadline"], "2026-03-01");
    assert_eq!(listings[0]["agency"], "");
    assert!(body["warnings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn fetch_without_sources_returns_placeholder() {
    let app = router_with(Arc::new(DisabledService));
    let resp = app
        .oneshot(post("/listings/fetch", json!({"keywords": ["robotics"]})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["listings"][0]["source"], "fallback");
    assert_eq!(body["warnings"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn rank_requires_listings() {
    let app = router_with(Arc::new(DisabledService));
    let resp = app
        .oneshot(post(
            "/rank",
            json!({"profile": robotics_profile(), "listings": []}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn rank_with_disabled_service_falls_back() {
    let app = router_with(Arc::new(DisabledService));
    let resp = app
        .oneshot(post(
            "/rank",
            json!({
                "profile": robotics_profile(),
                "listings": [
                    {"title": "Marine Biology"},
                    {"title": "Robotics Control", "agency": "NSF"}
                ],
                "attempt_id": 4
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["outcome"]["kind"], "fallback_all");
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["title"], "Robotics Control");
    assert_eq!(entries[0]["rank_mode"], "fallback");
    assert_eq!(entries[0]["fit_score"], 22);
}

#[tokio::test]
async fn rank_with_degraded_profile_still_scores_listings() {
    let app = router_with(Arc::new(DisabledService));
    let resp = app
        .oneshot(post(
            "/rank",
            json!({
                "profile": {},
                "listings": [{"title": "Robotics Control Grant", "agency": "NSF"}]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["outcome"]["kind"], "fallback_all");
    assert_eq!(body["entries"][0]["rank_mode"], "fallback");
    assert_eq!(body["entries"][0]["fit_score"], 5);
}

#[tokio::test]
async fn rank_merges_service_answer() {
    let svc = MockService::new().reply(r#"{"ranked": [{"idx": 1, "fit_score": 77, "why_fit": ["match"]}]}"#);
    let app = router_with(Arc::new(svc.clone()));
    let resp = app
        .oneshot(post(
            "/rank",
            json!({
                "profile": robotics_profile(),
                "listings": [{"title": "A"}, {"title": "B"}],
                "attempt_id": 9
            }),
        ))
        .await
        .unwrap();

    let body = json_body(resp).await;
    assert_eq!(body["outcome"], json!({"kind": "merged", "discarded": 0}));
    assert_eq!(body["entries"][0]["title"], "B");
    assert_eq!(body["entries"][0]["fit_score"], 77);
    assert_eq!(svc.requests()[0].seed, Some(9));
}

#[tokio::test]
async fn draft_returns_text_or_bad_gateway() {
    let payload = json!({
        "profile": robotics_profile(),
        "listing": {"title": "Robotics Control", "agency": "NSF"}
    });

    let ok = router_with(Arc::new(MockService::new().reply("# Concept\n1) Project Summary")));
    let resp = ok.oneshot(post("/draft", payload.clone())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["text"], "# Concept\n1) Project Summary");

    let failing = router_with(Arc::new(
        MockService::new().fail(ServiceError::Transport("timeout".into())),
    ));
    let resp = failing.oneshot(post("/draft", payload)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(json_body(resp).await["error"]
        .as_str()
        .unwrap()
        .contains("timeout"));
}
