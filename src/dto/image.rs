use serde::Serialize;
use utoipa::ToSchema;

/// Identifier of a freshly uploaded picture, usable as a puzzle id.
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadImageResponse {
    /// Namespace holding the stored picture.
    pub uuid: String,
}

/// Multipart form accepted by the upload route.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadImageForm {
    /// Encoded picture (JPEG or PNG).
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}
