use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{parse_id, require_text};
use crate::auth::CurrentUser;
use crate::db::models::{MedicineFilter, NewCategory, NewMedicine};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::utils::{expiry_cutoff, positive_or};

const DEFAULT_EXPIRY_DAYS: i64 = 30;

#[derive(Deserialize)]
pub struct ExpiringQuery {
    pub days: Option<String>,
}

#[derive(Deserialize)]
pub struct StockUpdate {
    pub stock: Option<i64>,
}

async fn list_categories(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.storage.list_categories().await?))
}

async fn create_category(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(category): Json<NewCategory>,
) -> ApiResult<impl IntoResponse> {
    require_text(&category.name, "Name")?;
    let created = state
        .storage
        .create_category(NewCategory {
            name: category.name.trim().to_string(),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_medicines(
    State(state): State<AppState>,
    Query(filter): Query<MedicineFilter>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.storage.list_medicines(&filter).await?))
}

async fn low_stock_medicines(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.storage.low_stock_medicines().await?))
}

async fn expiring_medicines(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<ExpiringQuery>,
) -> ApiResult<impl IntoResponse> {
    let days = positive_or(query.days.as_deref(), DEFAULT_EXPIRY_DAYS);
    let cutoff = expiry_cutoff(Utc::now().date_naive(), days);
    Ok(Json(state.storage.expiring_medicines(cutoff).await?))
}

async fn get_medicine(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "Invalid medicine ID")?;
    let medicine = state
        .storage
        .get_medicine(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Medicine not found"))?;
    Ok(Json(medicine))
}

fn validate_medicine(medicine: &NewMedicine) -> Result<(), ApiError> {
    require_text(&medicine.name, "Name")?;
    require_text(&medicine.form, "Form")?;
    require_text(&medicine.batch_number, "Batch number")?;
    if medicine.mrp < Decimal::ZERO {
        return Err(ApiError::validation("MRP cannot be negative"));
    }
    if medicine.stock < 0 || medicine.low_stock_threshold < 0 {
        return Err(ApiError::validation("Stock values cannot be negative"));
    }
    if medicine.gst_rate < Decimal::ZERO || medicine.gst_rate > Decimal::ONE_HUNDRED {
        return Err(ApiError::validation("GST rate must be between 0 and 100"));
    }
    Ok(())
}

async fn create_medicine(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(medicine): Json<NewMedicine>,
) -> ApiResult<impl IntoResponse> {
    validate_medicine(&medicine)?;
    let created = state.storage.create_medicine(medicine).await?;
    log::info!(
        "Medicine {} (#{}) added by user {} with {} in stock",
        created.name,
        created.id,
        user.user_id,
        created.stock
    );
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_stock(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(update): Json<StockUpdate>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "Invalid medicine ID")?;
    let stock = update
        .stock
        .and_then(|stock| i32::try_from(stock).ok())
        .filter(|stock| *stock >= 0)
        .ok_or_else(|| ApiError::validation("Invalid stock value"))?;

    let medicine = state
        .storage
        .update_medicine_stock(id, stock)
        .await?
        .ok_or_else(|| ApiError::not_found("Medicine not found"))?;
    log::info!(
        "Stock of {} (#{}) set to {} by user {}",
        medicine.name,
        medicine.id,
        medicine.stock,
        user.user_id
    );
    Ok(Json(medicine))
}

pub fn category_routes() -> Router<AppState> {
    Router::new().route("/", get(list_categories).post(create_category))
}

pub fn medicine_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_medicines).post(create_medicine))
        .route("/low-stock", get(low_stock_medicines))
        .route("/expiring", get(expiring_medicines))
        .route("/:id", get(get_medicine))
        .route("/:id/stock", patch(update_stock))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn new_medicine() -> NewMedicine {
        NewMedicine {
            name: "Azithromycin".into(),
            description: Some("Antibiotic".into()),
            category_id: 1,
            form: "tablet".into(),
            batch_number: "AZ-22".into(),
            expiry_date: NaiveDate::from_ymd_opt(2027, 9, 30).unwrap(),
            mrp: dec!(95.50),
            stock: 30,
            low_stock_threshold: 10,
            gst_rate: dec!(12),
        }
    }

    #[test]
    fn medicine_validation() {
        assert!(validate_medicine(&new_medicine()).is_ok());

        let mut bad = new_medicine();
        bad.gst_rate = dec!(120);
        assert!(validate_medicine(&bad).is_err());

        let mut bad = new_medicine();
        bad.stock = -1;
        assert!(validate_medicine(&bad).is_err());

        let mut bad = new_medicine();
        bad.batch_number = " ".into();
        assert!(validate_medicine(&bad).is_err());
    }
}
