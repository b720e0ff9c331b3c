use std::path::PathBuf;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
};
use tower_http::services::ServeDir;

use crate::{
    dto::image::{UploadImageForm, UploadImageResponse},
    error::AppError,
    services::image_service,
    state::SharedState,
};

/// Multipart overhead allowed on top of the picture itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Upload route plus static serving of every stored asset under `/api/images`.
pub fn router(assets_root: PathBuf, max_upload_bytes: usize) -> Router<SharedState> {
    let images = Router::new()
        .route("/", post(upload_image))
        .layer(DefaultBodyLimit::max(max_upload_bytes + FORM_OVERHEAD_BYTES))
        .fallback_service(ServeDir::new(assets_root));

    Router::new().nest("/api/images", images)
}

/// Store a picture and its preview; the returned uuid names the future puzzle.
#[utoipa::path(
    post,
    path = "/api/images",
    tag = "images",
    request_body(content = UploadImageForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image stored", body = UploadImageResponse),
        (status = 400, description = "Missing or oversized `image` field"),
        (status = 422, description = "Image could not be decoded")
    )
)]
pub async fn upload_image(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<UploadImageResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(err.to_string()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::BadRequest(err.to_string()))?;
        return Ok(Json(image_service::upload_image(&state, bytes).await?));
    }

    Err(AppError::BadRequest(
        "multipart field `image` is required".into(),
    ))
}
