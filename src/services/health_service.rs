use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report liveness along with registry sizes, flagging unreadable asset storage.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let puzzles = state.puzzles().len();
    let users = state.users().len();

    match state.assets().list_namespaces().await {
        Ok(_) => HealthResponse::ok(puzzles, users),
        Err(err) => {
            warn!(error = %err, "asset storage health check failed");
            HealthResponse::degraded(puzzles, users)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;

    #[tokio::test]
    async fn reports_registry_sizes() {
        let (state, _) = test_state();
        state.users().create("alice");

        let health = health_status(&state).await;

        assert_eq!(health.status, "ok");
        assert_eq!((health.puzzles, health.users), (0, 1));
    }
}
