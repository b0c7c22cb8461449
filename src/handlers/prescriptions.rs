use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Json, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use super::parse_id;
use crate::auth::CurrentUser;
use crate::db::models::NewPrescription;
use crate::error::{ApiError, ApiResult};
use crate::services::uploads::{remove_prescription_image, save_prescription_image, UploadError};
use crate::state::AppState;

/// Multipart field carrying the prescription image.
pub const IMAGE_FIELD: &str = "prescription_image";

struct ImagePart {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Bytes,
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::bad_request(err.body_text())
}

fn optional_id(raw: Option<String>, message: &str) -> ApiResult<Option<i32>> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_id(value, message).map(Some),
    }
}

async fn create_prescription(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(prescription): Json<NewPrescription>,
) -> ApiResult<impl IntoResponse> {
    let created = state.storage.create_prescription(prescription).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn upload_prescription(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut customer_id = None;
    let mut doctor_id = None;
    let mut notes = None;
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "customer_id" => customer_id = Some(field.text().await.map_err(multipart_error)?),
            "doctor_id" => doctor_id = Some(field.text().await.map_err(multipart_error)?),
            "notes" => notes = Some(field.text().await.map_err(multipart_error)?),
            IMAGE_FIELD => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                image = Some(ImagePart {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            other => log::debug!("Ignoring multipart field {}", other),
        }
    }

    let customer_id = optional_id(customer_id, "Invalid customer ID")?
        .ok_or_else(|| ApiError::validation("customer_id is required"))?;
    let doctor_id = optional_id(doctor_id, "Invalid doctor ID")?;
    let image = image.ok_or(UploadError::Missing)?;

    if state.storage.get_customer(customer_id).await?.is_none() {
        return Err(ApiError::validation(format!(
            "Customer {} does not exist",
            customer_id
        )));
    }
    if let Some(doctor_id) = doctor_id {
        if state.storage.get_doctor(doctor_id).await?.is_none() {
            return Err(ApiError::validation(format!(
                "Doctor {} does not exist",
                doctor_id
            )));
        }
    }

    let stored = save_prescription_image(
        &state.settings.upload_dir,
        state.settings.max_upload_bytes,
        image.file_name.as_deref(),
        image.content_type.as_deref(),
        &image.bytes,
    )
    .await?;

    let created = match state
        .storage
        .create_prescription(NewPrescription {
            customer_id,
            doctor_id,
            prescription_image_path: Some(stored.public_path.clone()),
            notes: notes.filter(|n| !n.trim().is_empty()),
        })
        .await
    {
        Ok(created) => created,
        Err(e) => {
            if let Err(cleanup) =
                remove_prescription_image(&state.settings.upload_dir, &stored.file_name).await
            {
                log::error!("Failed to remove image {}: {}", stored.file_name, cleanup);
            }
            return Err(e.into());
        }
    };
    log::info!(
        "Prescription #{} uploaded for customer {} by user {}",
        created.id,
        customer_id,
        user.user_id
    );
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_prescription(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "Invalid prescription ID")?;
    let prescription = state
        .storage
        .get_prescription(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Prescription not found"))?;
    Ok(Json(prescription))
}

pub fn prescription_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_prescription))
        .route("/upload", post(upload_prescription))
        .route("/:id", get(get_prescription))
}
