pub mod live_puzzle;
pub mod observers;
pub mod piece;
pub mod puzzle;
pub mod puzzle_pool;
pub mod user_pool;

use std::sync::Arc;

use tracing::info;

use crate::{
    config::AppConfig,
    dao::asset_store::AssetStore,
    services::slicer::ImageSlicer,
    state::{puzzle_pool::PuzzlePool, user_pool::UserPool},
};

/// Shared handle passed to every handler and background task.
pub type SharedState = Arc<AppState>;

/// Central application state: configuration plus the user and puzzle registries.
pub struct AppState {
    config: AppConfig,
    users: Arc<UserPool>,
    puzzles: Arc<PuzzlePool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        config: AppConfig,
        assets: Arc<dyn AssetStore>,
        slicer: Arc<dyn ImageSlicer>,
    ) -> SharedState {
        let users = Arc::new(UserPool::new());
        let puzzles = Arc::new(PuzzlePool::new(
            users.clone(),
            assets,
            slicer,
            config.orphan_grace(),
        ));
        Arc::new(Self {
            config,
            users,
            puzzles,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registry of users.
    pub fn users(&self) -> &Arc<UserPool> {
        &self.users
    }

    /// Registry of live puzzles.
    pub fn puzzles(&self) -> &Arc<PuzzlePool> {
        &self.puzzles
    }

    /// Storage holding uploaded pictures and their slices.
    pub fn assets(&self) -> &Arc<dyn AssetStore> {
        self.puzzles.assets()
    }

    /// Stop every puzzle actor. Called once the server stopped accepting connections.
    pub fn shutdown(&self) {
        info!(
            puzzles = self.puzzles.len(),
            users = self.users.len(),
            "shutting down puzzle pool"
        );
        self.puzzles.shutdown();
    }
}

#[cfg(test)]
pub(crate) fn test_state() -> (SharedState, Arc<puzzle_pool::tests::MemoryAssets>) {
    let assets = Arc::new(puzzle_pool::tests::MemoryAssets::default());
    let state = AppState::new(
        AppConfig::default(),
        assets.clone(),
        Arc::new(puzzle_pool::tests::GridSlicer),
    );
    (state, assets)
}
