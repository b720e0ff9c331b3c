use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::format_system_time,
    state::{
        piece::Position,
        puzzle::{PieceView, PuzzleSnapshot},
    },
};

/// Prefix under which sliced piece images are served.
pub const ASSET_URL_PREFIX: &str = "/api/images";

/// Payload used to cut an uploaded picture into a puzzle.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePuzzleRequest {
    /// Number of rows.
    #[validate(range(min = 1))]
    pub y_size: usize,
    /// Number of columns.
    #[validate(range(min = 1))]
    pub x_size: usize,
}

/// Identifier of the created puzzle.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatePuzzleResponse {
    /// Id of the puzzle, equal to the uploaded image id.
    pub id: String,
}

/// Grid coordinate on the wire: `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PositionDto {
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
}

impl From<Position> for PositionDto {
    fn from(position: Position) -> Self {
        Self {
            x: position.col,
            y: position.row,
        }
    }
}

impl From<PositionDto> for Position {
    fn from(position: PositionDto) -> Self {
        Position::new(position.y, position.x)
    }
}

/// One cell of the grid.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PieceDto {
    /// Cell the piece currently occupies.
    pub position: PositionDto,
    /// URL of the piece image.
    pub image: String,
    /// User currently holding the piece.
    pub held_by: Option<String>,
}

impl From<PieceView> for PieceDto {
    fn from(piece: PieceView) -> Self {
        Self {
            position: piece.current.into(),
            image: asset_url(&piece.asset),
            held_by: piece.held_by,
        }
    }
}

/// Full state of a live puzzle, used for the initial transfer to a client.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleResponse {
    /// Puzzle identifier.
    pub id: String,
    /// Number of rows.
    pub y_size: usize,
    /// Number of columns.
    pub x_size: usize,
    /// Total number of pieces.
    pub size: usize,
    /// Width in pixels of the sliced picture.
    pub image_width: u32,
    /// Height in pixels of the sliced picture.
    pub image_height: u32,
    /// Row-major grid of pieces.
    pub pieces: Vec<Vec<PieceDto>>,
    /// Cell of the piece each user is holding.
    pub held_pieces: BTreeMap<String, PositionDto>,
    /// Pieces sitting on their destination.
    pub pieces_correct: usize,
    /// Whether every piece is in place.
    pub complete: bool,
    /// Id the next update will carry; updates below it are already reflected.
    #[serde(rename = "nextUpdateID")]
    pub next_update_id: u64,
    /// Ids of the users taking part.
    pub current_users: Vec<String>,
    /// RFC 3339 time of the last mutation.
    pub last_updated: String,
}

impl From<PuzzleSnapshot> for PuzzleResponse {
    fn from(snapshot: PuzzleSnapshot) -> Self {
        let size = snapshot.dimensions.size();
        Self {
            id: snapshot.id,
            y_size: snapshot.dimensions.rows,
            x_size: snapshot.dimensions.cols,
            size,
            image_width: snapshot.image_size.width,
            image_height: snapshot.image_size.height,
            pieces: snapshot
                .grid
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
            held_pieces: snapshot
                .held
                .into_iter()
                .map(|(user_id, position)| (user_id, position.into()))
                .collect(),
            pieces_correct: snapshot.pieces_correct,
            complete: snapshot.pieces_correct == size,
            next_update_id: snapshot.next_update_id,
            current_users: snapshot.current_users,
            last_updated: format_system_time(snapshot.last_updated),
        }
    }
}

/// Net pieces one participant contributed.
#[derive(Debug, Serialize, ToSchema)]
pub struct ContributionDto {
    /// Participant id.
    #[serde(rename = "userID")]
    pub user_id: String,
    /// Display name, absent if the user was deleted.
    pub name: Option<String>,
    /// Net correct pieces, negative when their swaps did more harm than good.
    pub pieces: i64,
}

/// Scoreboard of a puzzle's current participants, best first.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultsResponse {
    /// Puzzle identifier.
    pub id: String,
    /// Whether the puzzle is solved.
    pub complete: bool,
    /// One entry per current participant.
    pub results: Vec<ContributionDto>,
}

fn asset_url(asset: &str) -> String {
    format!("{ASSET_URL_PREFIX}/{}", asset.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::state::puzzle::{Dimensions, ImageSize};

    #[test]
    fn positions_map_columns_to_x() {
        let dto = PositionDto::from(Position::new(2, 5));
        assert_eq!(dto, PositionDto { x: 5, y: 2 });
        assert_eq!(Position::from(dto), Position::new(2, 5));
    }

    #[test]
    fn create_request_rejects_empty_grids() {
        let ok: CreatePuzzleRequest = serde_json::from_str(r#"{"ySize":3,"xSize":4}"#).unwrap();
        assert!(ok.validate().is_ok());
        let empty: CreatePuzzleRequest = serde_json::from_str(r#"{"ySize":0,"xSize":4}"#).unwrap();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn snapshot_renders_urls_and_completion() {
        let snapshot = PuzzleSnapshot {
            id: "p".into(),
            dimensions: Dimensions { rows: 1, cols: 2 },
            image_size: ImageSize {
                width: 640,
                height: 320,
            },
            grid: vec![vec![
                PieceView {
                    current: Position::new(0, 0),
                    asset: "p/original_0_1.png".into(),
                    held_by: Some("u".into()),
                },
                PieceView {
                    current: Position::new(0, 1),
                    asset: "p/original_0_0.png".into(),
                    held_by: None,
                },
            ]],
            held: BTreeMap::from([("u".to_string(), Position::new(0, 0))]),
            pieces_correct: 0,
            next_update_id: 7,
            current_users: vec!["u".into()],
            last_updated: SystemTime::UNIX_EPOCH,
        };

        let json = serde_json::to_value(PuzzleResponse::from(snapshot)).unwrap();

        assert_eq!(json["pieces"][0][0]["image"], "/api/images/p/original_0_1.png");
        assert_eq!(json["heldPieces"]["u"]["x"], 0);
        assert_eq!(json["nextUpdateID"], 7);
        assert_eq!(json["imageWidth"], 640);
        assert_eq!(json["imageHeight"], 320);
        assert_eq!(json["complete"], false);
        assert_eq!(json["lastUpdated"], "1970-01-01T00:00:00Z");
    }
}
