use std::convert::Infallible;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::middleware;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use futures::stream::{self, Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use url::Url;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use gleaner_core::export;
use gleaner_core::models::{RunState, RunStatus};

use crate::auth::require_admin_token;
use crate::dto::{ErrorResponse, ExportQuery, HealthResponse, RunStateResponse, StartRunRequest};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let admin = middleware::from_fn_with_state(state.clone(), require_admin_token);

    Router::new()
        .route("/health", get(health))
        .route(
            "/v1/run",
            get(get_run).merge(post(start_run).delete(cancel_run).route_layer(admin)),
        )
        .route("/v1/run/events", get(run_events))
        .route("/v1/run/export", get(export_run))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/run",
    responses(
        (status = 200, description = "Current run state", body = RunStateResponse),
        (status = 503, description = "Coordinator stopped", body = ErrorResponse),
    ),
    tag = "run"
)]
pub async fn get_run(
    State(state): State<Arc<AppState>>,
) -> Result<axum::Json<RunStateResponse>, ApiError> {
    let run = state.coordinator.get_state().await?;
    Ok(axum::Json(run.into()))
}

#[utoipa::path(
    post,
    path = "/v1/run",
    request_body = StartRunRequest,
    responses(
        (status = 202, description = "Run started", body = RunStateResponse),
        (status = 400, description = "Invalid listing URL", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Run commands disabled"),
    ),
    security(("bearer" = [])),
    tag = "run"
)]
pub async fn start_run(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<StartRunRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let target = parse_target(&body.url)?;
    let run = state.coordinator.start(target).await?;
    Ok((StatusCode::ACCEPTED, axum::Json(RunStateResponse::from(run))))
}

#[utoipa::path(
    delete,
    path = "/v1/run",
    responses(
        (status = 200, description = "Run cancelled, or nothing was running", body = RunStateResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Run commands disabled"),
    ),
    security(("bearer" = [])),
    tag = "run"
)]
pub async fn cancel_run(
    State(state): State<Arc<AppState>>,
) -> Result<axum::Json<RunStateResponse>, ApiError> {
    let run = state.coordinator.cancel().await?;
    Ok(axum::Json(run.into()))
}

#[utoipa::path(
    get,
    path = "/v1/run/events",
    responses(
        (status = 200, description = "`update` event with the current state, then one per state change", content_type = "text/event-stream"),
    ),
    tag = "run"
)]
pub async fn run_events(
    State(state): State<Arc<AppState>>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let rx = state.coordinator.subscribe();
    let current = state.coordinator.get_state().await?;

    let initial = stream::iter(update_event(current).map(Ok));
    let updates = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(run) => update_event(run).map(Ok),
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                tracing::debug!(%missed, "SSE subscriber lagged");
                None
            }
        }
    });

    Ok(Sse::new(initial.chain(updates)).keep_alive(KeepAlive::default()))
}

#[utoipa::path(
    get,
    path = "/v1/run/export",
    params(ExportQuery),
    responses(
        (status = 200, description = "Records of the completed run", content_type = "text/csv", body = String),
        (status = 409, description = "No completed run", body = ErrorResponse),
    ),
    tag = "run"
)]
pub async fn export_run(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let run = state.coordinator.get_state().await?;
    if run.status != RunStatus::Complete {
        return Err(ApiError::Conflict(format!(
            "Nothing to export: run is {}",
            run.status
        )));
    }

    let filename = query
        .filename
        .as_deref()
        .map(sanitize_filename)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| {
            export::default_filename(run.target.as_deref(), chrono::Local::now().date_naive())
        });
    let csv = export::to_csv_string(&run.records)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        csv,
    ))
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_target(raw: &str) -> Result<Url, ApiError> {
    let target = Url::parse(raw.trim())
        .map_err(|e| ApiError::BadRequest(format!("Invalid listing URL '{raw}': {e}")))?;
    match target.scheme() {
        "http" | "https" => Ok(target),
        scheme => Err(ApiError::BadRequest(format!(
            "Listing URL scheme '{scheme}' is not supported (only http/https)"
        ))),
    }
}

fn update_event(run: RunState) -> Option<Event> {
    Event::default()
        .event("update")
        .json_data(RunStateResponse::from(run))
        .ok()
}

/// Keep a client-supplied filename safe for a quoted `Content-Disposition` value.
fn sanitize_filename(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control() && !matches!(c, '"' | '\\' | '/'))
        .collect::<String>()
        .trim()
        .to_string()
}
