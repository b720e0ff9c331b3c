use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod health;
pub mod images;
pub mod puzzles;
pub mod users;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let config = state.config();
    let api_router = health::router()
        .merge(users::router())
        .merge(images::router(
            config.assets_dir().clone(),
            config.max_upload_bytes(),
        ))
        .merge(puzzles::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
