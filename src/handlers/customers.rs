use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};

use super::{parse_id, require_text};
use crate::auth::CurrentUser;
use crate::db::models::NewCustomer;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const INVALID_ID: &str = "Invalid customer ID";

async fn list_customers(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.storage.list_customers().await?))
}

async fn get_customer(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, INVALID_ID)?;
    let customer = state
        .storage
        .get_customer(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer not found"))?;
    Ok(Json(customer))
}

async fn get_customer_by_phone(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(phone): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let customer = state
        .storage
        .get_customer_by_phone(phone.trim())
        .await?
        .ok_or_else(|| ApiError::not_found("Customer not found"))?;
    Ok(Json(customer))
}

async fn create_customer(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(customer): Json<NewCustomer>,
) -> ApiResult<impl IntoResponse> {
    require_text(&customer.name, "Name")?;
    require_text(&customer.phone, "Phone")?;
    let created = state
        .storage
        .create_customer(NewCustomer {
            name: customer.name.trim().to_string(),
            phone: customer.phone.trim().to_string(),
            ..customer
        })
        .await?;
    log::info!("Customer {} (#{}) registered", created.name, created.id);
    Ok((StatusCode::CREATED, Json(created)))
}

async fn customer_invoices(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, INVALID_ID)?;
    Ok(Json(state.storage.customer_invoices(id).await?))
}

async fn customer_prescriptions(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, INVALID_ID)?;
    Ok(Json(state.storage.customer_prescriptions(id).await?))
}

pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route("/phone/:phone", get(get_customer_by_phone))
        .route("/:id", get(get_customer))
        .route("/:id/invoices", get(customer_invoices))
        .route("/:id/prescriptions", get(customer_prescriptions))
}
