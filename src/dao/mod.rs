/// Per-puzzle image asset storage.
pub mod asset_store;
/// Storage error types shared by every backend.
pub mod storage;
