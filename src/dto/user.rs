use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{dto::format_system_time, state::user_pool::User};

/// Payload used to register a participant.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
}

/// Public view of a registered user.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    /// User identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// RFC 3339 registration time.
    pub created: String,
    /// Net correct pieces per live puzzle.
    pub piece_count: BTreeMap<String, i64>,
    /// Net correct pieces across every puzzle, pruned ones included.
    pub lifetime_pieces: i64,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            created: format_system_time(user.created_at),
            piece_count: user.piece_count.into_iter().collect(),
            lifetime_pieces: user.lifetime_pieces,
        }
    }
}
