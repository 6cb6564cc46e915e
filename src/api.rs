use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::draft::draft_concept;
use crate::listing::{ensure_non_empty, normalize_batch, Listing};
use crate::llm::{DynService, ServiceError};
use crate::pipeline::{publications_need_more_text, require_listings, require_publications, Engine, MatchError};
use crate::profile::Profile;
use crate::ranker::RankReport;
use crate::sources::{collect, FetchOutcome, ListingSource};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub service: DynService,
    pub sources: Arc<Vec<Box<dyn ListingSource>>>,
}

impl AppState {
    pub fn new(engine: Engine, service: DynService, sources: Vec<Box<dyn ListingSource>>) -> Self {
        Self {
            engine: Arc::new(engine),
            service,
            sources: Arc::new(sources),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/profile", post(build_profile))
        .route("/listings/normalize", post(normalize_listings))
        .route("/listings/fetch", post(fetch_listings))
        .route("/rank", post(rank))
        .route("/draft", post(draft))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Errors surfaced to HTTP callers.
#[derive(Debug)]
pub enum ApiError {
    Precondition(MatchError),
    Service(ServiceError),
}

impl From<MatchError> for ApiError {
    fn from(e: MatchError) -> Self {
        Self::Precondition(e)
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self::Service(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::Precondition(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            ApiError::Service(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
        };
        (status, Json(json!({ "error": msg }))).into_response()
    }
}

#[derive(Deserialize)]
struct ProfileReq {
    publication_text: String,
    #[serde(default)]
    proposal_text: String,
}

#[derive(Serialize)]
struct ProfileResp {
    profile: Profile,
    warnings: Vec<String>,
}

async fn build_profile(
    State(state): State<AppState>,
    Json(body): Json<ProfileReq>,
) -> Result<Json<ProfileResp>, ApiError> {
    require_publications(&body.publication_text)?;

    let mut warnings = Vec::new();
    if publications_need_more_text(&body.publication_text) {
        warnings.push(
            "Publication list looks short; consider pasting a fuller list or a CV.".to_string(),
        );
    }
    let profile = state
        .engine
        .profiles
        .build(state.service.as_ref(), &body.publication_text, &body.proposal_text)
        .await;
    Ok(Json(ProfileResp { profile, warnings }))
}

async fn normalize_listings(Json(raw): Json<Vec<Value>>) -> Json<FetchOutcome> {
    let mut listings = normalize_batch(&raw);
    let mut warnings = Vec::new();
    ensure_non_empty(&mut listings, &mut warnings);
    Json(FetchOutcome { listings, warnings })
}

#[derive(Deserialize, Default)]
struct FetchReq {
    #[serde(default)]
    keywords: Vec<String>,
}

async fn fetch_listings(
    State(state): State<AppState>,
    Json(body): Json<FetchReq>,
) -> Json<FetchOutcome> {
    let limit = state.engine.config.sources.limit_each;
    Json(collect(&state.sources, &body.keywords, limit).await)
}

#[derive(Deserialize)]
struct RankReq {
    profile: Profile,
    listings: Vec<Listing>,
    #[serde(default)]
    attempt_id: u64,
}

async fn rank(
    State(state): State<AppState>,
    Json(body): Json<RankReq>,
) -> Result<Json<RankReport>, ApiError> {
    require_listings(&body.listings)?;
    let report = state
        .engine
        .ranker
        .rank_detailed(
            state.service.as_ref(),
            &body.profile,
            &body.listings,
            body.attempt_id,
        )
        .await;
    Ok(Json(report))
}

#[derive(Deserialize)]
struct DraftReq {
    profile: Profile,
    listing: Listing,
}

#[derive(Serialize)]
struct DraftResp {
    text: String,
}

async fn draft(
    State(state): State<AppState>,
    Json(body): Json<DraftReq>,
) -> Result<Json<DraftResp>, ApiError> {
    let text = draft_concept(state.service.as_ref(), &body.profile, &body.listing).await?;
    Ok(Json(DraftResp { text }))
}
