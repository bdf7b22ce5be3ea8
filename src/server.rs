//! HTTP boundary over the analytics. Every request reads the same immutable
//! reference data; nothing is cached or written between requests.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::{header::CONTENT_TYPE, Method},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::data::ReferenceData;
use crate::error::ValidationError;
use crate::models::Config;
use crate::placements::{
    aggregate_by_company, filter_companies, CompanyAggregate, PlacementAggregator, PlacementOverview,
    YearSummary,
};
use crate::predictor::{CutoffMatcher, Prediction, PredictionQuery};

pub struct AppState {
    pub data: ReferenceData,
    pub config: Config,
}

impl AppState {
    pub fn new(data: ReferenceData, config: Config) -> Arc<Self> {
        Arc::new(Self { data, config })
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictParams {
    rank: Option<String>,
    category: Option<String>,
    stream: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompanyParams {
    q: Option<String>,
    limit: Option<usize>,
}

pub async fn predict_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PredictParams>,
) -> Result<Json<Prediction>, ValidationError> {
    let query = PredictionQuery::parse(
        params.rank.as_deref().unwrap_or_default(),
        params.category.as_deref().unwrap_or_default(),
        params.stream.as_deref(),
    )
    .inspect_err(|e| debug!(error = %e, "Rejected prediction query"))?;

    let matcher = CutoffMatcher::new(&state.data.cutoffs, &state.config.prediction);
    let prediction = matcher.predict(&query);
    debug!(
        rank = query.rank,
        category = %query.category,
        eligible = prediction.eligible.len(),
        borderline = prediction.borderline.len(),
        "Prediction served"
    );
    Ok(Json(prediction))
}

pub async fn summary_handler(State(state): State<Arc<AppState>>) -> Json<Vec<YearSummary>> {
    let aggregator = PlacementAggregator::new(&state.config.placements);
    Json(aggregator.summarize_by_year(&state.data.placements))
}

pub async fn overview_handler(State(state): State<Arc<AppState>>) -> Json<PlacementOverview> {
    let aggregator = PlacementAggregator::new(&state.config.placements);
    Json(aggregator.overview(&state.data.placements))
}

pub async fn companies_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CompanyParams>,
) -> Json<Vec<CompanyAggregate>> {
    let companies = aggregate_by_company(&state.data.placements);
    let matched = filter_companies(params.q.as_deref().unwrap_or_default(), &companies);
    let limit = params.limit.unwrap_or(usize::MAX);
    Json(matched.into_iter().take(limit).cloned().collect())
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/predict", get(predict_handler))
        .route("/placements/summary", get(summary_handler))
        .route("/placements/overview", get(overview_handler))
        .route("/placements/companies", get(companies_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let address = format!("{}:{}", state.config.server.host, state.config.server.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
