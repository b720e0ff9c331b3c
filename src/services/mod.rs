/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Picture upload and preview generation.
pub mod image_service;
/// Puzzle creation and read-only views.
pub mod puzzle_service;
/// Image slicing collaborator.
pub mod slicer;
/// Background pruning of finished puzzles and stale counters.
pub mod sweeper;
/// User registration and lookup.
pub mod user_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
