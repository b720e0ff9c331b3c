use tracing::info;

use crate::{
    dto::user::{CreateUserRequest, UserResponse},
    error::ServiceError,
    state::SharedState,
};

/// Register a new participant.
pub fn create_user(
    state: &SharedState,
    request: CreateUserRequest,
) -> Result<UserResponse, ServiceError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput("name must not be blank".into()));
    }
    Ok(state.users().create(name).into())
}

/// Fetch a participant and their counters.
pub fn get_user(state: &SharedState, id: &str) -> Result<UserResponse, ServiceError> {
    state
        .users()
        .get(id)
        .map(Into::into)
        .ok_or_else(|| ServiceError::NotFound(format!("user `{id}` not found")))
}

/// Remove a participant. Puzzles they joined keep running without them.
pub fn delete_user(state: &SharedState, id: &str) -> Result<(), ServiceError> {
    state
        .users()
        .delete(id)
        .map(|user| info!(user_id = %user.id, "user deleted"))
        .ok_or_else(|| ServiceError::NotFound(format!("user `{id}` not found")))
}
