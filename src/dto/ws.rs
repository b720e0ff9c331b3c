use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    dto::puzzle::PositionDto,
    state::puzzle::{Action, Request, Update},
};

/// Action names used on the puzzle websocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum WireAction {
    /// Pick up a piece, or swap it with the one already held.
    Hold,
    /// Two pieces exchanged cells. Only sent by the server.
    Swap,
    /// A user joined.
    Join,
    /// A user left.
    Leave,
    /// Anything else a client sent.
    #[serde(other)]
    Unknown,
}

impl From<Action> for WireAction {
    fn from(action: Action) -> Self {
        match action {
            Action::Hold => WireAction::Hold,
            Action::Swap => WireAction::Swap,
            Action::Join => WireAction::Join,
            Action::Leave => WireAction::Leave,
        }
    }
}

/// Messages accepted from puzzle websocket clients.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RequestMessage {
    /// Requested action.
    pub action: WireAction,
    /// Sender; must match the connection's user when present.
    #[serde(rename = "userID", default)]
    pub user_id: Option<String>,
    /// Target cell, required for HOLD.
    #[serde(rename = "piecePosition", default)]
    pub piece_position: Option<PositionDto>,
}

/// Why an inbound message could not become a puzzle request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Clients may only send HOLD, JOIN and LEAVE.
    #[error("unknown action")]
    UnknownAction,
    /// HOLD without a target cell.
    #[error("HOLD requires a piecePosition")]
    MissingPosition,
    /// The message names a different user.
    #[error("userID `{0}` does not belong to this connection")]
    ForeignUser(String),
}

impl RequestMessage {
    /// Build the request on behalf of the connection's user.
    pub fn into_request(self, session_user: &str) -> Result<Request, WireError> {
        if let Some(user_id) = self.user_id.filter(|id| id != session_user) {
            return Err(WireError::ForeignUser(user_id));
        }
        match self.action {
            WireAction::Hold => {
                let position = self.piece_position.ok_or(WireError::MissingPosition)?;
                Ok(Request::hold(session_user, position.into()))
            }
            WireAction::Join => Ok(Request::join(session_user)),
            WireAction::Leave => Ok(Request::leave(session_user)),
            WireAction::Swap | WireAction::Unknown => Err(WireError::UnknownAction),
        }
    }
}

/// Update pushed to every client of a puzzle.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UpdateMessage {
    /// Sequence number within the puzzle.
    pub id: u64,
    /// What happened.
    pub action: WireAction,
    /// User that caused it.
    #[serde(rename = "userID")]
    pub user_id: String,
    /// Held piece, or the first piece of a swap.
    #[serde(rename = "piece1Position")]
    pub piece1_position: PositionDto,
    /// Second piece of a swap.
    #[serde(rename = "piece2Position")]
    pub piece2_position: PositionDto,
    /// Change in correctly placed pieces.
    pub delta: i64,
}

impl From<&Update> for UpdateMessage {
    fn from(update: &Update) -> Self {
        Self {
            id: update.id,
            action: update.action.into(),
            user_id: update.user_id.clone(),
            piece1_position: update.piece1.into(),
            piece2_position: update.piece2.into(),
            delta: update.delta,
        }
    }
}

/// Frame sent back to a single client whose request was rejected.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorMessage {
    /// Why the request was refused.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{piece::Position, puzzle::RequestAction};

    fn parse(json: &str) -> RequestMessage {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn hold_messages_become_hold_requests() {
        let request = parse(r#"{"action":"HOLD","userID":"u1","piecePosition":{"x":2,"y":1}}"#)
            .into_request("u1")
            .unwrap();
        assert_eq!(request.user_id, "u1");
        assert_eq!(request.action, RequestAction::Hold(Position::new(1, 2)));
    }

    #[test]
    fn user_id_defaults_to_the_connection() {
        let request = parse(r#"{"action":"LEAVE"}"#).into_request("u1").unwrap();
        assert_eq!(request.action, RequestAction::Leave);
        assert_eq!(request.user_id, "u1");
    }

    #[test]
    fn malformed_requests_are_refused() {
        assert_eq!(
            parse(r#"{"action":"SWAP"}"#).into_request("u1").unwrap_err(),
            WireError::UnknownAction
        );
        assert_eq!(
            parse(r#"{"action":"DANCE"}"#).into_request("u1").unwrap_err(),
            WireError::UnknownAction
        );
        assert_eq!(
            parse(r#"{"action":"HOLD"}"#).into_request("u1").unwrap_err(),
            WireError::MissingPosition
        );
        assert_eq!(
            parse(r#"{"action":"JOIN","userID":"u2"}"#).into_request("u1").unwrap_err(),
            WireError::ForeignUser("u2".into())
        );
    }

    #[test]
    fn updates_serialize_with_wire_names() {
        let update = Update {
            id: 4,
            action: Action::Swap,
            user_id: "u1".into(),
            piece1: Position::new(0, 1),
            piece2: Position::new(1, 0),
            delta: -1,
        };
        let json = serde_json::to_value(UpdateMessage::from(&update)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 4,
                "action": "SWAP",
                "userID": "u1",
                "piece1Position": {"x": 1, "y": 0},
                "piece2Position": {"x": 0, "y": 1},
                "delta": -1
            })
        );
    }
}
