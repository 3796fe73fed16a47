use crate::config::Config;
use crate::csv_import::{parse_csv, suggest_mapping, ColumnMapping, RequiredField, REQUIRED_FIELDS};
use crate::dashboard::Dashboard;
use crate::errors::{AppError, ResultExt};
use crate::filter::IntentBand;
use crate::import::{ImportOrchestrator, ImportProgress, ImportReport};
use crate::models::{ActiveView, DisplayMode, LeadId};
use crate::render::ReasoningView;
use crate::scoring::{FeedbackClient, LeadScorer};
use crate::storage::KeyValueStore;
use crate::view::{analytics_snapshot, AllLeadsControls, AnalyticsSnapshot, HotLeadsControls, ViewOutput};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Leads and view state. Only mutations and the import commit lock it.
    pub dashboard: Mutex<Dashboard>,
    /// Runs CSV imports against the configured scorer.
    pub orchestrator: ImportOrchestrator,
    /// Fire-and-forget client for score feedback.
    pub feedback: FeedbackClient,
    /// Application configuration.
    pub config: Config,
}

impl AppState {
    pub fn new(
        config: Config,
        kv: Arc<dyn KeyValueStore>,
        scorer: Arc<dyn LeadScorer>,
    ) -> Result<Self, AppError> {
        let dashboard = Dashboard::load(kv, config.page_size);
        let orchestrator = ImportOrchestrator::new(scorer, config.scoring_concurrency);
        let feedback = FeedbackClient::new(
            &config.scoring_api_url,
            Duration::from_secs(config.scoring_timeout_secs),
        )
        .context("initializing feedback client")?;

        Ok(Self {
            dashboard: Mutex::new(dashboard),
            orchestrator,
            feedback,
            config,
        })
    }
}

/// Every dashboard endpoint except `/health`.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/view", get(get_view))
        .route("/api/v1/view/navigate", post(navigate))
        .route("/api/v1/view/mode", post(set_mode))
        .route("/api/v1/leads", delete(clear_leads))
        .route("/api/v1/leads/:id", delete(delete_lead))
        .route("/api/v1/leads/:id/reasoning", get(get_reasoning))
        .route("/api/v1/leads/:id/feedback", post(submit_feedback))
        .route("/api/v1/import/preview", post(preview_import))
        .route("/api/v1/import", post(run_import))
        .route("/api/v1/import/progress", get(import_progress))
        .route("/api/v1/analytics", get(analytics))
}

/// Health check endpoint.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-leadconnect",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Query parameters accepted by `GET /api/v1/view`.
///
/// Filter values apply to the list view that is active after `view` is handled.
#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub view: Option<String>,
    pub mode: Option<String>,
    pub page: Option<usize>,
    pub search: Option<String>,
    pub intent: Option<String>,
    pub industry: Option<String>,
    pub size: Option<String>,
}

impl ViewQuery {
    fn has_filters(&self) -> bool {
        self.search.is_some() || self.intent.is_some() || self.industry.is_some() || self.size.is_some()
    }
}

fn parse_view(raw: &str) -> Result<ActiveView, AppError> {
    ActiveView::parse(raw).ok_or_else(|| AppError::BadRequest(format!("Unknown view '{}'", raw)))
}

fn parse_mode(raw: &str) -> Result<DisplayMode, AppError> {
    DisplayMode::parse(raw)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown display mode '{}'", raw)))
}

/// GET /api/v1/view
///
/// Applies any view, mode, filter and page changes from the query, then
/// returns the current projection.
pub async fn get_view(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewQuery>,
) -> Result<Json<ViewOutput>, AppError> {
    let view = params.view.as_deref().map(parse_view).transpose()?;
    let mode = params.mode.as_deref().map(parse_mode).transpose()?;

    let mut dashboard = state.dashboard.lock().await;

    if let Some(view) = view {
        if view != dashboard.view().view() {
            dashboard.navigate(view);
        }
    }
    if let Some(mode) = mode {
        if mode != dashboard.view().mode() {
            dashboard.set_display_mode(mode);
        }
    }

    if params.has_filters() {
        let mut all = dashboard.view().all_controls().clone();
        let mut hot = dashboard.view().hot_controls().clone();
        let text = |v: &Option<String>| v.clone().unwrap_or_default();

        match dashboard.view().view() {
            ActiveView::HotLeads => {
                hot = HotLeadsControls {
                    search: text(&params.search),
                    industry: text(&params.industry),
                    company_size: text(&params.size),
                };
            }
            _ => {
                all = AllLeadsControls {
                    search: text(&params.search),
                    intent: IntentBand::parse(params.intent.as_deref().unwrap_or("")),
                    industry: text(&params.industry),
                    company_size: text(&params.size),
                };
            }
        }
        dashboard.set_filters(all, hot);
    }

    if let Some(page) = params.page {
        if page != dashboard.view().page() {
            dashboard.set_page(page);
        }
    }

    Ok(Json(dashboard.render()))
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub view: String,
}

/// POST /api/v1/view/navigate
pub async fn navigate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NavigateRequest>,
) -> Result<Json<ViewOutput>, AppError> {
    let view = parse_view(&payload.view)?;
    let mut dashboard = state.dashboard.lock().await;
    dashboard.navigate(view);
    Ok(Json(dashboard.render()))
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: String,
}

/// POST /api/v1/view/mode
pub async fn set_mode(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ModeRequest>,
) -> Result<Json<ViewOutput>, AppError> {
    let mode = parse_mode(&payload.mode)?;
    let mut dashboard = state.dashboard.lock().await;
    dashboard.set_display_mode(mode);
    Ok(Json(dashboard.render()))
}

/// GET /api/v1/leads/:id/reasoning
pub async fn get_reasoning(
    State(state): State<Arc<AppState>>,
    Path(id): Path<LeadId>,
) -> Result<Json<ReasoningView>, AppError> {
    let dashboard = state.dashboard.lock().await;
    dashboard
        .reasoning(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))
}

/// DELETE /api/v1/leads/:id
pub async fn delete_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<LeadId>,
) -> Result<StatusCode, AppError> {
    let mut dashboard = state.dashboard.lock().await;
    if dashboard.delete_lead(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Lead {} not found", id)))
    }
}

/// DELETE /api/v1/leads
pub async fn clear_leads(State(state): State<Arc<AppState>>) -> Json<ViewOutput> {
    let mut dashboard = state.dashboard.lock().await;
    dashboard.clear_leads();
    Json(dashboard.render())
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub csv: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub headers: Vec<String>,
    pub row_count: usize,
    pub required_fields: &'static [RequiredField],
    pub suggested_mapping: ColumnMapping,
    pub message: String,
}

/// POST /api/v1/import/preview
///
/// Parses the uploaded CSV and proposes a column mapping without scoring
/// anything.
pub async fn preview_import(
    Json(payload): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>, AppError> {
    let table = parse_csv(&payload.csv)?;
    let row_count = table.rows.len();
    Ok(Json(PreviewResponse {
        suggested_mapping: suggest_mapping(&table.headers),
        headers: table.headers,
        row_count,
        required_fields: &REQUIRED_FIELDS,
        message: format!("File loaded successfully. Found {} rows.", row_count),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub csv: String,
    pub mapping: ColumnMapping,
}

/// POST /api/v1/import
///
/// Scores every row and commits the run. Nothing is stored when a scoring
/// task fails hard.
pub async fn run_import(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ImportRequest>,
) -> Result<(StatusCode, Json<ImportReport>), AppError> {
    let report = state
        .orchestrator
        .run_import(&state.dashboard, &payload.csv, &payload.mapping)
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /api/v1/import/progress
pub async fn import_progress(State(state): State<Arc<AppState>>) -> Json<ImportProgress> {
    Json(state.orchestrator.progress())
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub correct: bool,
}

/// POST /api/v1/leads/:id/feedback
///
/// Forwards the vote to the scoring service in the background and answers
/// immediately.
pub async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    Path(id): Path<LeadId>,
    Json(payload): Json<FeedbackRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let dashboard = state.dashboard.lock().await;
    let lead = dashboard
        .lead(id)
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))?;

    // Delivery is not awaited.
    drop(state.feedback.submit(lead, payload.correct));

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "Thank you for your feedback!" })),
    ))
}

/// GET /api/v1/analytics
pub async fn analytics(State(state): State<Arc<AppState>>) -> Json<AnalyticsSnapshot> {
    let dashboard = state.dashboard.lock().await;
    Json(analytics_snapshot(dashboard.store().leads()))
}
