use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    services::slicer::SliceError,
    state::{puzzle::PuzzleError, puzzle_pool::CreateError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Asset storage failed.
    #[error("storage failure")]
    Storage(#[source] StorageError),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Input was well formed but its content cannot be processed.
    #[error("unprocessable: {0}")]
    Unprocessable(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Unexpected failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NamespaceCollision(id) => {
                ServiceError::InvalidState(format!("image `{id}` already exists"))
            }
            StorageError::InvalidNamespace(id) => {
                ServiceError::InvalidInput(format!("invalid image id `{id}`"))
            }
            err @ StorageError::Io { .. } => ServiceError::Storage(err),
        }
    }
}

impl From<PuzzleError> for ServiceError {
    fn from(err: PuzzleError) -> Self {
        match err {
            PuzzleError::OutOfBounds { .. } | PuzzleError::UnknownAction => {
                ServiceError::InvalidInput(err.to_string())
            }
            PuzzleError::UnknownUser(_) => ServiceError::NotFound(err.to_string()),
            PuzzleError::NotInPuzzle(_)
            | PuzzleError::AlreadyInPuzzle(_)
            | PuzzleError::PuzzleComplete => ServiceError::InvalidState(err.to_string()),
            PuzzleError::Closed => ServiceError::NotFound(err.to_string()),
        }
    }
}

impl From<SliceError> for ServiceError {
    fn from(err: SliceError) -> Self {
        match err {
            SliceError::InvalidDimensions { .. } => ServiceError::InvalidInput(err.to_string()),
            SliceError::Decode(_) => ServiceError::Unprocessable(err.to_string()),
            SliceError::Encode(_) | SliceError::Task(_) => ServiceError::Internal(err.to_string()),
        }
    }
}

impl From<CreateError> for ServiceError {
    fn from(err: CreateError) -> Self {
        match err {
            CreateError::InvalidDimensions { .. } => ServiceError::InvalidInput(err.to_string()),
            CreateError::AlreadyExists(_) => ServiceError::InvalidState(err.to_string()),
            CreateError::SliceFailed(source) => source.into(),
            CreateError::ShapeMismatch { .. } => ServiceError::Internal(err.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Payload understood but unusable.
    #[error("unprocessable entity: {0}")]
    Unprocessable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Storage(source) => AppError::Internal(source.to_string()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Unprocessable(message) => AppError::Unprocessable(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Internal(message) => AppError::Internal(message),
        }
    }
}

impl AppError {
    /// HTTP status reported for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::piece::Position;

    fn status_of(err: impl Into<ServiceError>) -> StatusCode {
        AppError::from(err.into()).status()
    }

    #[test]
    fn puzzle_errors_map_to_client_statuses() {
        let out_of_bounds = PuzzleError::OutOfBounds {
            position: Position::new(9, 9),
            rows: 2,
            cols: 2,
        };
        assert_eq!(status_of(out_of_bounds), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(PuzzleError::UnknownUser("u".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(PuzzleError::PuzzleComplete), StatusCode::CONFLICT);
    }

    #[test]
    fn create_errors_follow_the_slicer_cause() {
        let decode = CreateError::SliceFailed(SliceError::Decode("bad".into()));
        assert_eq!(status_of(decode), StatusCode::UNPROCESSABLE_ENTITY);
        let grid = CreateError::InvalidDimensions { rows: 0, cols: 1 };
        assert_eq!(status_of(grid), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(CreateError::AlreadyExists("p".into())), StatusCode::CONFLICT);
    }

    #[test]
    fn storage_collisions_are_conflicts() {
        assert_eq!(
            status_of(StorageError::NamespaceCollision("x".into())),
            StatusCode::CONFLICT
        );
        let io = StorageError::io("writing", std::io::Error::other("disk full"));
        assert_eq!(status_of(io), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
