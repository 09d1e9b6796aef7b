// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// CRUD-style endpoints over the tracked-symbol store, plus static files for
// the web front end under `/static/`. Store errors render as
// `{"error": "..."}` with a status chosen by `TrackerError`.
//
// CORS is configured permissively.
// =============================================================================

use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Json, Path as UrlPath, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use crate::app_state::AppState;
use crate::error::TrackerError;
use crate::indicators::AnalysisResult;
use crate::types::SymbolConfig;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full router with CORS and shared state.
pub fn router(state: Arc<AppState>, web_dir: impl AsRef<Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { Redirect::to("/static/") }))
        .route("/health", get(health))
        .route("/stocks", get(list_stocks))
        .route(
            "/stocks/:ticker",
            get(get_stock)
                .post(add_stock)
                .put(update_stock)
                .delete(delete_stock),
        )
        .route("/stocks/:ticker/info", get(stock_info))
        .nest_service(
            "/static",
            ServeDir::new(web_dir.as_ref()).append_index_html_on_directories(true),
        )
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.health())
}

// =============================================================================
// Stocks
// =============================================================================

async fn list_stocks(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.tracker.list_tracked())
}

async fn get_stock(
    State(state): State<Arc<AppState>>,
    UrlPath(ticker): UrlPath<String>,
) -> Result<Json<SymbolConfig>, TrackerError> {
    Ok(Json(state.tracker.config(&ticker)?))
}

#[derive(Debug, Default, Deserialize)]
struct TrackRequest {
    #[serde(default, alias = "Tolerance")]
    tolerance: Option<f64>,
}

impl TrackRequest {
    /// Only an empty body means "no options"; anything else must decode.
    fn parse(body: &[u8]) -> Result<Self, TrackerError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| TrackerError::InvalidRequest(e.to_string()))
    }
}

#[derive(Serialize)]
struct TrackResponse {
    ticker: String,
    tolerance: f64,
}

async fn add_stock(
    State(state): State<Arc<AppState>>,
    UrlPath(ticker): UrlPath<String>,
    body: Bytes,
) -> Result<impl IntoResponse, TrackerError> {
    let request = TrackRequest::parse(&body)?;
    // Zero means "unset", matching clients that always send the field.
    let tolerance = match request.tolerance {
        Some(t) if t != 0.0 => t,
        _ => state.default_tolerance,
    };

    state.tracker.register(&ticker, tolerance)?;
    state.increment_version();
    info!(ticker = %ticker, tolerance, "tracking requested via API");

    Ok((
        StatusCode::CREATED,
        Json(TrackResponse {
            ticker: ticker.trim().to_uppercase(),
            tolerance,
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct UpdateRequest {
    #[serde(alias = "Tolerance")]
    tolerance: f64,
}

async fn update_stock(
    State(state): State<Arc<AppState>>,
    UrlPath(ticker): UrlPath<String>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<SymbolConfig>, TrackerError> {
    let config = state.tracker.update_config(&ticker, request.tolerance)?;
    state.increment_version();
    Ok(Json(config))
}

async fn delete_stock(
    State(state): State<Arc<AppState>>,
    UrlPath(ticker): UrlPath<String>,
) -> Result<Json<&'static str>, TrackerError> {
    state.tracker.deregister(&ticker)?;
    state.increment_version();
    Ok(Json("Stock Removed"))
}

async fn stock_info(
    State(state): State<Arc<AppState>>,
    UrlPath(ticker): UrlPath<String>,
) -> Result<Json<AnalysisResult>, TrackerError> {
    Ok(Json(state.tracker.info(&ticker)?))
}
