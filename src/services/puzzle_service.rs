use tracing::info;

use crate::{
    dao::asset_store::{ORIGINAL_FILE, validate_namespace},
    dto::puzzle::{
        ContributionDto, CreatePuzzleRequest, CreatePuzzleResponse, PuzzleResponse,
        ResultsResponse,
    },
    error::ServiceError,
    state::{SharedState, live_puzzle::LivePuzzle},
};

/// Cut the picture uploaded under `id` into a `ySize` x `xSize` puzzle.
pub async fn create_puzzle(
    state: &SharedState,
    id: &str,
    request: CreatePuzzleRequest,
) -> Result<CreatePuzzleResponse, ServiceError> {
    let max_side = state.config().max_grid_side();
    if request.y_size > max_side || request.x_size > max_side {
        return Err(ServiceError::InvalidInput(format!(
            "xSize and ySize must not exceed {max_side}"
        )));
    }
    validate_namespace(id)?;
    if !state.assets().namespace_exists(id).await? {
        return Err(ServiceError::NotFound(format!("image `{id}` not found")));
    }

    let picture = state.assets().namespace_path(id).join(ORIGINAL_FILE);
    let puzzle = state
        .puzzles()
        .create(id, &picture, request.y_size, request.x_size)
        .await?;
    info!(puzzle_id = %puzzle.id(), "puzzle ready");

    Ok(CreatePuzzleResponse {
        id: puzzle.id().to_string(),
    })
}

/// Resolve a live puzzle or report it missing.
pub fn lookup(state: &SharedState, id: &str) -> Result<LivePuzzle, ServiceError> {
    state
        .puzzles()
        .get(id)
        .ok_or_else(|| ServiceError::NotFound(format!("puzzle `{id}` not found")))
}

/// Current state of a puzzle.
pub async fn get_puzzle(state: &SharedState, id: &str) -> Result<PuzzleResponse, ServiceError> {
    let snapshot = lookup(state, id)?.snapshot().await?;
    Ok(snapshot.into())
}

/// Pieces contributed by each current participant, best first.
pub async fn puzzle_results(state: &SharedState, id: &str) -> Result<ResultsResponse, ServiceError> {
    let puzzle = lookup(state, id)?;
    let mut results: Vec<ContributionDto> = puzzle
        .results()
        .await?
        .into_iter()
        .map(|(user_id, pieces)| ContributionDto {
            name: state.users().get(&user_id).map(|user| user.name),
            user_id,
            pieces,
        })
        .collect();
    results.sort_by(|a, b| b.pieces.cmp(&a.pieces).then_with(|| a.user_id.cmp(&b.user_id)));

    Ok(ResultsResponse {
        id: puzzle.id().to_string(),
        complete: puzzle.is_complete(),
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        puzzle::Request,
        puzzle_pool::tests::solve,
        test_state,
    };

    fn grid(y_size: usize, x_size: usize) -> CreatePuzzleRequest {
        CreatePuzzleRequest { y_size, x_size }
    }

    #[tokio::test]
    async fn creates_puzzles_only_for_uploaded_images() {
        let (state, assets) = test_state();
        assets.namespaces.lock().unwrap().insert("img".into());

        let created = create_puzzle(&state, "img", grid(2, 3)).await.unwrap();
        assert_eq!(created.id, "img");

        let missing = create_puzzle(&state, "nope", grid(2, 3)).await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));
        let duplicate = create_puzzle(&state, "img", grid(2, 3)).await;
        assert!(matches!(duplicate, Err(ServiceError::InvalidState(_))));
        let traversal = create_puzzle(&state, "..", grid(2, 3)).await;
        assert!(matches!(traversal, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn oversized_grids_are_rejected() {
        let (state, assets) = test_state();
        assets.namespaces.lock().unwrap().insert("img".into());
        let side = state.config().max_grid_side() + 1;

        let result = create_puzzle(&state, "img", grid(side, 2)).await;

        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
        assert!(state.puzzles().is_empty());
    }

    #[tokio::test]
    async fn views_reflect_the_live_puzzle() {
        let (state, assets) = test_state();
        assets.namespaces.lock().unwrap().insert("img".into());
        create_puzzle(&state, "img", grid(2, 2)).await.unwrap();

        let view = get_puzzle(&state, "img").await.unwrap();
        assert_eq!((view.y_size, view.x_size, view.size), (2, 2, 4));
        assert_eq!(view.pieces_correct, 0);
        assert!(!view.complete);

        assert!(matches!(
            get_puzzle(&state, "other").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn results_rank_participants() {
        let (state, assets) = test_state();
        assets.namespaces.lock().unwrap().insert("img".into());
        create_puzzle(&state, "img", grid(2, 2)).await.unwrap();
        let puzzle = lookup(&state, "img").unwrap();
        let solver = state.users().create("solver");
        let idle = state.users().create("idle");
        puzzle.request(Request::join(&idle.id)).await.unwrap();

        solve(&puzzle, &solver.id).await;
        let results = puzzle_results(&state, "img").await.unwrap();

        assert!(results.complete);
        assert_eq!(results.results.len(), 2);
        assert_eq!(results.results[0].user_id, solver.id);
        assert_eq!(results.results[0].name.as_deref(), Some("solver"));
        assert_eq!(results.results[0].pieces, 4);
        assert_eq!(results.results[1].pieces, 0);
    }
}
