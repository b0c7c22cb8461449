use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, Request},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use tower_http::services::ServeDir;

use crate::error::ApiError;
use crate::state::AppState;

pub mod analytics;
pub mod auth;
pub mod customers;
pub mod doctors;
pub mod inventory;
pub mod invoices;
pub mod prescriptions;
pub mod users;

/// Headroom over the image limit for the multipart framing and text fields.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let uploads = ServeDir::new(state.settings.upload_dir.clone());
    let body_limit = state.settings.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .nest("/api", api_routes())
        .nest_service("/uploads", uploads)
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::auth_routes())
        .nest("/users", users::user_routes())
        .nest("/categories", inventory::category_routes())
        .nest("/medicines", inventory::medicine_routes())
        .nest("/customers", customers::customer_routes())
        .nest("/doctors", doctors::doctor_routes())
        .nest("/invoices", invoices::invoice_routes())
        .nest("/pos", invoices::pos_routes())
        .nest("/prescriptions", prescriptions::prescription_routes())
        .nest("/analytics", analytics::analytics_routes())
}

async fn health() -> &'static str {
    "ok"
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed = started.elapsed().as_millis();
    if status.is_server_error() {
        log::error!("{} {} {} in {}ms", method, path, status.as_u16(), elapsed);
    } else {
        log::info!("{} {} {} in {}ms", method, path, status.as_u16(), elapsed);
    }
    response
}

/// Parses a numeric path segment, answering 400 with `message` otherwise.
pub(crate) fn parse_id(raw: &str, message: &str) -> Result<i32, ApiError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| ApiError::validation(message))
}

/// Rejects blank required text fields.
pub(crate) fn require_text(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::validation(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_rejects_garbage() {
        assert_eq!(parse_id("12", "Invalid ID").unwrap(), 12);
        assert!(matches!(
            parse_id("abc", "Invalid ID"),
            Err(ApiError::Validation(m)) if m == "Invalid ID"
        ));
    }

    #[test]
    fn require_text_rejects_blank() {
        assert!(require_text("Paracetamol", "Name").is_ok());
        assert!(matches!(
            require_text("  ", "Name"),
            Err(ApiError::Validation(m)) if m == "Name is required"
        ));
    }
}
