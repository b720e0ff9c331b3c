use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Puzzles currently live.
    pub puzzles: usize,
    /// Users currently registered.
    pub users: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(puzzles: usize, users: usize) -> Self {
        Self {
            status: "ok".to_string(),
            puzzles,
            users,
        }
    }

    /// Create a health response indicating asset storage is unreachable.
    pub fn degraded(puzzles: usize, users: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            puzzles,
            users,
        }
    }
}
