use std::path::Path;

use axum::body::Bytes;
use image::{DynamicImage, ImageFormat};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::asset_store::{ORIGINAL_FILE, PREVIEW_FILE},
    dto::image::UploadImageResponse,
    error::ServiceError,
    state::SharedState,
};

/// Longest side of the generated preview, in pixels.
pub const PREVIEW_MAX_SIDE: u32 = 512;

/// Decode an uploaded picture and store it, with a preview, in a fresh namespace.
///
/// The returned uuid is the id the puzzle must later be created under.
pub async fn upload_image(
    state: &SharedState,
    bytes: Bytes,
) -> Result<UploadImageResponse, ServiceError> {
    if bytes.is_empty() {
        return Err(ServiceError::InvalidInput("uploaded image is empty".into()));
    }
    let limit = state.config().max_upload_bytes();
    if bytes.len() > limit {
        return Err(ServiceError::InvalidInput(format!(
            "uploaded image exceeds {limit} bytes"
        )));
    }

    let picture = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|err| ServiceError::Internal(err.to_string()))?
        .map_err(|err| ServiceError::Unprocessable(format!("error decoding image: {err}")))?;
    let (width, height) = (picture.width(), picture.height());

    let id = Uuid::new_v4().to_string();
    state.puzzles().reserve(&id);
    let directory = state.assets().create_namespace(&id).await?;

    let written = tokio::task::spawn_blocking(move || write_pictures(&directory, &picture))
        .await
        .map_err(|err| ServiceError::Internal(err.to_string()))
        .and_then(|result| {
            result.map_err(|err| ServiceError::Internal(format!("error saving image: {err}")))
        });
    if let Err(err) = written {
        if let Err(cleanup) = state.assets().remove_namespace(&id).await {
            warn!(image_id = %id, error = %cleanup, "failed to clean up partial upload");
        }
        return Err(err);
    }

    info!(image_id = %id, width, height, "image uploaded");
    Ok(UploadImageResponse { uuid: id })
}

fn write_pictures(directory: &Path, picture: &DynamicImage) -> Result<(), image::ImageError> {
    picture
        .to_rgb8()
        .save_with_format(directory.join(ORIGINAL_FILE), ImageFormat::Jpeg)?;

    let fits = picture.width() <= PREVIEW_MAX_SIDE && picture.height() <= PREVIEW_MAX_SIDE;
    let preview = if fits {
        picture.to_rgb8()
    } else {
        picture
            .thumbnail(PREVIEW_MAX_SIDE, PREVIEW_MAX_SIDE)
            .to_rgb8()
    };
    preview.save_with_format(directory.join(PREVIEW_FILE), ImageFormat::Jpeg)
}
