use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use super::parse_id;
use crate::auth::CurrentUser;
use crate::db::models::{Invoice, InvoiceDetails};
use crate::error::{ApiError, ApiResult};
use crate::services::billing::{self, CreateInvoiceRequest, QuoteRequest};
use crate::state::AppState;

async fn with_items(state: &AppState, invoice: Option<Invoice>) -> ApiResult<InvoiceDetails> {
    let invoice = invoice.ok_or_else(|| ApiError::not_found("Invoice not found"))?;
    let items = state.storage.invoice_items(invoice.id).await?;
    Ok(InvoiceDetails { invoice, items })
}

async fn list_invoices(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.storage.list_invoices().await?))
}

async fn get_invoice(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "Invalid invoice ID")?;
    let invoice = state.storage.get_invoice(id).await?;
    Ok(Json(with_items(&state, invoice).await?))
}

async fn get_invoice_by_number(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(number): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let invoice = state.storage.get_invoice_by_number(number.trim()).await?;
    Ok(Json(with_items(&state, invoice).await?))
}

async fn create_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateInvoiceRequest>,
) -> ApiResult<impl IntoResponse> {
    let details = billing::create_invoice(state.storage.as_ref(), user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

async fn quote(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(request): Json<QuoteRequest>,
) -> ApiResult<impl IntoResponse> {
    let summary = billing::quote(state.storage.as_ref(), &request.items).await?;
    Ok(Json(summary))
}

pub fn invoice_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_invoices).post(create_invoice))
        .route("/number/:number", get(get_invoice_by_number))
        .route("/:id", get(get_invoice))
}

pub fn pos_routes() -> Router<AppState> {
    Router::new().route("/quote", post(quote))
}
