use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Jigsaw Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::users::create_user,
        crate::routes::users::get_user,
        crate::routes::users::delete_user,
        crate::routes::images::upload_image,
        crate::routes::puzzles::create_puzzle,
        crate::routes::puzzles::get_puzzle,
        crate::routes::puzzles::puzzle_results,
        crate::routes::puzzles::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::user::CreateUserRequest,
            crate::dto::user::UserResponse,
            crate::dto::image::UploadImageForm,
            crate::dto::image::UploadImageResponse,
            crate::dto::puzzle::CreatePuzzleRequest,
            crate::dto::puzzle::CreatePuzzleResponse,
            crate::dto::puzzle::PositionDto,
            crate::dto::puzzle::PieceDto,
            crate::dto::puzzle::PuzzleResponse,
            crate::dto::puzzle::ContributionDto,
            crate::dto::puzzle::ResultsResponse,
            crate::dto::ws::WireAction,
            crate::dto::ws::RequestMessage,
            crate::dto::ws::UpdateMessage,
            crate::dto::ws::ErrorMessage,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "Participant registration"),
        (name = "images", description = "Picture upload and static assets"),
        (name = "puzzles", description = "Puzzle lifecycle and the live WebSocket session"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/api/users",
            "/api/users/{id}",
            "/api/images",
            "/api/puzzles/{id}",
            "/api/puzzles/{id}/results",
            "/api/puzzles/{id}/ws",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
    }
}
