use crate::infra::{deserialize_optional_date, AppState, DirectoryContext, PresetConfirmation};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::{Local, NaiveDate};
use position_ops::domain::PositionCode;
use position_ops::error::AppError;
use position_ops::workflows::deactivation::SagaReport;
use position_ops::workflows::vacancy::{UnitCount, VacancySummary};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct VacancyScanRequest {
    pub(crate) employee_groups: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct VacancyScanResponse {
    pub(crate) positions_title: String,
    pub(crate) vacancy_title: String,
    #[serde(flatten)]
    pub(crate) summary: VacancySummary,
}

#[derive(Debug, Serialize)]
pub(crate) struct UnitCountsResponse {
    pub(crate) units: Vec<UnitCount>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeactivationRequest {
    #[serde(default)]
    pub(crate) selected: Vec<PositionCode>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) effective_date: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) confirm_deactivation: bool,
    #[serde(default)]
    pub(crate) confirm_reassignment: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeactivationResponse {
    pub(crate) success: bool,
    pub(crate) message: String,
    pub(crate) report: SagaReport,
}

pub(crate) fn with_directory_routes(context: DirectoryContext) -> axum::Router {
    axum::Router::new()
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/vacancies/scan",
            axum::routing::post(vacancy_scan_endpoint),
        )
        .route(
            "/api/v1/business-units/counts",
            axum::routing::get(unit_counts_endpoint),
        )
        .route(
            "/api/v1/positions/deactivate",
            axum::routing::post(deactivation_endpoint),
        )
        .layer(Extension(context))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn vacancy_scan_endpoint(
    Extension(context): Extension<DirectoryContext>,
    Json(payload): Json<VacancyScanRequest>,
) -> Result<Json<VacancyScanResponse>, AppError> {
    let summary = context
        .scanner()
        .scan(payload.employee_groups.as_slice())
        .await?;

    Ok(Json(VacancyScanResponse {
        positions_title: summary.positions_title(),
        vacancy_title: summary.vacancy_title(),
        summary,
    }))
}

pub(crate) async fn unit_counts_endpoint(
    Extension(context): Extension<DirectoryContext>,
) -> Result<Json<UnitCountsResponse>, AppError> {
    let units = context.aggregator().aggregate_counts().await?;
    Ok(Json(UnitCountsResponse { units }))
}

pub(crate) async fn deactivation_endpoint(
    Extension(context): Extension<DirectoryContext>,
    Json(payload): Json<DeactivationRequest>,
) -> Result<Json<DeactivationResponse>, AppError> {
    let DeactivationRequest {
        selected,
        effective_date,
        confirm_deactivation,
        confirm_reassignment,
    } = payload;

    let prompt = Arc::new(PresetConfirmation {
        deactivation: confirm_deactivation,
        reassignment: confirm_reassignment,
    });
    let effective_date = effective_date.unwrap_or_else(|| Local::now().date_naive());

    let _guard = context.deactivation_guard().await;
    let report = context.saga(prompt).run(&selected, effective_date).await?;

    Ok(Json(DeactivationResponse {
        success: report.is_success(),
        message: report.render(),
        report,
    }))
}
