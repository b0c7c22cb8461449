use axum::{
    extract::{Json, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::services::analytics::{self, daily_sales, gst_report, report_start, window_start};
use crate::state::AppState;
use crate::utils::positive_or;

const DEFAULT_TOP_SELLING: i64 = 5;
const DEFAULT_SALES_DAYS: i64 = 7;
const DEFAULT_REPORT_MONTHS: i64 = 3;
const MAX_SALES_DAYS: i64 = 366;
const MAX_REPORT_MONTHS: i64 = 120;

#[derive(Deserialize)]
pub struct AnalyticsQuery {
    pub limit: Option<String>,
    pub days: Option<String>,
    pub months: Option<String>,
}

async fn top_selling(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<impl IntoResponse> {
    let limit = positive_or(query.limit.as_deref(), DEFAULT_TOP_SELLING) as usize;
    Ok(Json(state.storage.top_selling_medicines(limit).await?))
}

async fn daily_sales_report(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<impl IntoResponse> {
    let days = positive_or(query.days.as_deref(), DEFAULT_SALES_DAYS).min(MAX_SALES_DAYS);
    let today = Utc::now().date_naive();
    let invoices = state.storage.invoices_since(window_start(today, days)).await?;
    Ok(Json(daily_sales(&invoices, today, days)))
}

async fn gst_report_summary(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<impl IntoResponse> {
    let months =
        positive_or(query.months.as_deref(), DEFAULT_REPORT_MONTHS).min(MAX_REPORT_MONTHS) as u32;
    let today = Utc::now().date_naive();
    let invoices = state.storage.invoices_since(report_start(today, months)).await?;
    Ok(Json(gst_report(&invoices, today, months)))
}

async fn dashboard(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let summary = analytics::dashboard(
        state.storage.as_ref(),
        Utc::now().date_naive(),
        state.settings.expiry_alert_days,
    )
    .await?;
    Ok(Json(summary))
}

pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/top-selling", get(top_selling))
        .route("/daily-sales", get(daily_sales_report))
        .route("/gst-report", get(gst_report_summary))
        .route("/dashboard", get(dashboard))
}
