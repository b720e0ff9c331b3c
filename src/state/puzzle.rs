use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
    time::SystemTime,
};

use rand::Rng;
use thiserror::Error;
use tracing::{debug, info};

use crate::state::{
    piece::{Piece, Position},
    user_pool::UserDirectory,
};

/// Kinds of state change carried by an [`Update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// A user picked up a piece.
    Hold,
    /// Two pieces exchanged cells (or a held piece was released in place).
    Swap,
    /// A user joined the puzzle.
    Join,
    /// A user left the puzzle.
    Leave,
}

/// What a client asks the puzzle to do.
///
/// Swaps are never requested directly; they follow from a second hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    /// Pick up the piece at the position, or swap it with the held piece.
    Hold(Position),
    /// Become a participant.
    Join,
    /// Stop participating, releasing any held piece.
    Leave,
}

/// A mutation request submitted on behalf of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// User issuing the request.
    pub user_id: String,
    /// Requested action.
    pub action: RequestAction,
}

impl Request {
    /// Hold (or swap onto) the piece at `position`.
    pub fn hold(user_id: impl Into<String>, position: Position) -> Self {
        Self {
            user_id: user_id.into(),
            action: RequestAction::Hold(position),
        }
    }

    /// Join the puzzle.
    pub fn join(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            action: RequestAction::Join,
        }
    }

    /// Leave the puzzle.
    pub fn leave(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            action: RequestAction::Leave,
        }
    }
}

/// Immutable, ordered record of one state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    /// Puzzle-scoped sequence number, starting at zero.
    pub id: u64,
    /// Transition kind.
    pub action: Action,
    /// User that caused the transition.
    pub user_id: String,
    /// First piece position (zero when not applicable).
    pub piece1: Position,
    /// Second piece position (zero when not applicable).
    pub piece2: Position,
    /// Change in the number of correctly placed pieces.
    pub delta: i64,
}

/// Reasons a request is rejected without touching puzzle state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PuzzleError {
    /// Target cell lies outside the grid.
    #[error("position {position:?} is outside the {rows}x{cols} grid")]
    OutOfBounds {
        /// Requested cell.
        position: Position,
        /// Grid height.
        rows: usize,
        /// Grid width.
        cols: usize,
    },
    /// The user is not registered in the user pool.
    #[error("user `{0}` is not registered")]
    UnknownUser(String),
    /// The user has not joined this puzzle.
    #[error("user `{0}` has not joined this puzzle")]
    NotInPuzzle(String),
    /// The user already joined this puzzle.
    #[error("user `{0}` already joined this puzzle")]
    AlreadyInPuzzle(String),
    /// The puzzle is solved and accepts no more requests.
    #[error("puzzle is already complete")]
    PuzzleComplete,
    /// The request could not be mapped onto a known action.
    #[error("unknown action")]
    UnknownAction,
    /// The puzzle has been shut down.
    #[error("puzzle is no longer accepting requests")]
    Closed,
}

/// Grid shape of a puzzle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    /// Number of rows (`ySize`).
    pub rows: usize,
    /// Number of columns (`xSize`).
    pub cols: usize,
}

impl Dimensions {
    /// Total number of cells.
    pub fn size(self) -> usize {
        self.rows * self.cols
    }

    /// Reject positions outside the grid.
    pub fn check(self, position: Position) -> Result<(), PuzzleError> {
        if position.row >= self.rows || position.col >= self.cols {
            return Err(PuzzleError::OutOfBounds {
                position,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(())
    }
}

/// Pixel size of the picture the pieces were cut from, after cropping to
/// a whole number of cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Read-only view of one grid cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceView {
    /// Cell the piece occupies.
    pub current: Position,
    /// Asset reference for rendering.
    pub asset: String,
    /// Holder, if any.
    pub held_by: Option<String>,
}

/// Point-in-time copy of a puzzle used for initial state transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleSnapshot {
    /// Puzzle identifier.
    pub id: String,
    /// Grid shape.
    pub dimensions: Dimensions,
    /// Size of the sliced picture.
    pub image_size: ImageSize,
    /// Pieces laid out by the cell they occupy, row by row.
    pub grid: Vec<Vec<PieceView>>,
    /// Current position of every held piece, keyed by holder.
    pub held: BTreeMap<String, Position>,
    /// Number of correctly placed pieces.
    pub pieces_correct: usize,
    /// Identifier the next emitted update will carry.
    pub next_update_id: u64,
    /// Users currently taking part.
    pub current_users: Vec<String>,
    /// Time of the last hold or swap.
    pub last_updated: SystemTime,
}

/// Mutable state of a single puzzle.
///
/// Not thread-safe on purpose: a puzzle is owned by exactly one actor task
/// (see [`crate::state::live_puzzle`]) which applies requests one at a time.
pub struct Puzzle {
    id: String,
    dimensions: Dimensions,
    image_size: ImageSize,
    /// Indexed by piece id.
    pieces: Vec<Piece>,
    /// Cell index to piece id.
    grid: Vec<usize>,
    /// User id to the piece id they hold.
    held: HashMap<String, usize>,
    pieces_correct: usize,
    next_update_id: u64,
    current_users: BTreeSet<String>,
    last_updated: SystemTime,
    users: Arc<dyn UserDirectory>,
}

impl Puzzle {
    /// Build a solved puzzle whose cells use `assets` in row-major order.
    ///
    /// Call [`Puzzle::shuffle`] before handing it to players.
    pub fn new(
        id: impl Into<String>,
        dimensions: Dimensions,
        image_size: ImageSize,
        assets: Vec<String>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        let mut assets = assets.into_iter();
        let pieces = (0..dimensions.size())
            .map(|index| {
                let position = Position::from_index(index, dimensions.cols);
                Piece {
                    id: index,
                    dest: position,
                    current: position,
                    held_by: None,
                    asset: assets.next().unwrap_or_default(),
                }
            })
            .collect::<Vec<_>>();

        Self {
            id: id.into(),
            dimensions,
            image_size,
            grid: (0..pieces.len()).collect(),
            pieces_correct: pieces.len(),
            pieces,
            held: HashMap::new(),
            next_update_id: 0,
            current_users: BTreeSet::new(),
            last_updated: SystemTime::now(),
            users,
        }
    }

    /// Puzzle identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Grid shape.
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Size of the sliced picture.
    pub fn image_size(&self) -> ImageSize {
        self.image_size
    }

    /// Number of correctly placed pieces.
    pub fn pieces_correct(&self) -> usize {
        self.pieces_correct
    }

    /// Whether every piece sits on its destination.
    pub fn is_complete(&self) -> bool {
        self.pieces_correct == self.dimensions.size()
    }

    /// Identifier the next update will carry.
    pub fn next_update_id(&self) -> u64 {
        self.next_update_id
    }

    /// Time of the last hold or swap.
    pub fn last_updated(&self) -> SystemTime {
        self.last_updated
    }

    /// Whether `user_id` currently takes part.
    pub fn has_user(&self, user_id: &str) -> bool {
        self.current_users.contains(user_id)
    }

    /// Piece occupying `position`, if it lies on the grid.
    pub fn piece_at(&self, position: Position) -> Option<&Piece> {
        self.dimensions.check(position).ok()?;
        let piece_id = self.grid[position.index(self.dimensions.cols)];
        self.pieces.get(piece_id)
    }

    /// Piece held by `user_id`, if any.
    pub fn held_piece(&self, user_id: &str) -> Option<&Piece> {
        self.held
            .get(user_id)
            .and_then(|piece_id| self.pieces.get(*piece_id))
    }

    /// Shuffle with the thread-local generator.
    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::rng());
    }

    /// Derange the grid so that no piece is left on its destination.
    ///
    /// Each cell swaps with a uniformly chosen cell strictly after it, which
    /// yields a single cycle over all cells. Correctness is tracked through
    /// the same swap primitive used during play.
    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let size = self.dimensions.size();
        for index in 0..size.saturating_sub(1) {
            let partner = rng.random_range(index + 1..size);
            let delta = self.swap(self.grid[index], self.grid[partner]);
            self.apply_delta(delta);
        }
        debug!(
            puzzle_id = %self.id,
            pieces_correct = self.pieces_correct,
            "puzzle shuffled"
        );
    }

    /// Apply one request, returning the updates it produced in order.
    ///
    /// A hold on a piece held by someone else is accepted but produces no
    /// update and changes nothing.
    pub fn apply(&mut self, request: Request) -> Result<Vec<Update>, PuzzleError> {
        if self.is_complete() {
            return Err(PuzzleError::PuzzleComplete);
        }

        match request.action {
            RequestAction::Hold(position) => self.hold(&request.user_id, position),
            RequestAction::Join => self.join(&request.user_id),
            RequestAction::Leave => Ok(self.leave(&request.user_id)),
        }
    }

    /// Snapshot of the grid and counters.
    pub fn snapshot(&self) -> PuzzleSnapshot {
        let grid = self
            .grid
            .chunks(self.dimensions.cols.max(1))
            .map(|row| {
                row.iter()
                    .map(|piece_id| {
                        let piece = &self.pieces[*piece_id];
                        PieceView {
                            current: piece.current,
                            asset: piece.asset.clone(),
                            held_by: piece.held_by.clone(),
                        }
                    })
                    .collect()
            })
            .collect();

        PuzzleSnapshot {
            id: self.id.clone(),
            dimensions: self.dimensions,
            image_size: self.image_size,
            grid,
            held: self
                .held
                .iter()
                .map(|(user_id, piece_id)| (user_id.clone(), self.pieces[*piece_id].current))
                .collect(),
            pieces_correct: self.pieces_correct,
            next_update_id: self.next_update_id,
            current_users: self.current_users.iter().cloned().collect(),
            last_updated: self.last_updated,
        }
    }

    /// Net correct pieces each current user contributed to this puzzle.
    pub fn results(&self) -> BTreeMap<String, i64> {
        self.current_users
            .iter()
            .map(|user_id| (user_id.clone(), self.users.piece_count(user_id, &self.id)))
            .collect()
    }

    fn hold(&mut self, user_id: &str, position: Position) -> Result<Vec<Update>, PuzzleError> {
        self.dimensions.check(position)?;
        if !self.current_users.contains(user_id) {
            return Err(PuzzleError::NotInPuzzle(user_id.to_string()));
        }

        let piece_id = self.grid[position.index(self.dimensions.cols)];
        if let Some(holder) = self.pieces[piece_id].held_by.as_deref() {
            if holder != user_id {
                debug!(
                    puzzle_id = %self.id,
                    user_id,
                    holder,
                    ?position,
                    "piece held by another user; ignoring hold"
                );
                return Ok(Vec::new());
            }
        }

        self.last_updated = SystemTime::now();

        let Some(other_id) = self.held.remove(user_id) else {
            self.pieces[piece_id].held_by = Some(user_id.to_string());
            self.held.insert(user_id.to_string(), piece_id);
            let update = self.next_update(Action::Hold, user_id, position, Position::default(), 0);
            return Ok(vec![update]);
        };

        let delta = self.swap(piece_id, other_id);
        self.apply_delta(delta);
        self.users.record_pieces(user_id, &self.id, delta);

        let update = self.next_update(
            Action::Swap,
            user_id,
            self.pieces[piece_id].current,
            self.pieces[other_id].current,
            delta,
        );

        if self.is_complete() {
            self.on_complete();
        }

        Ok(vec![update])
    }

    fn join(&mut self, user_id: &str) -> Result<Vec<Update>, PuzzleError> {
        if !self.users.contains(user_id) {
            return Err(PuzzleError::UnknownUser(user_id.to_string()));
        }
        if !self.current_users.insert(user_id.to_string()) {
            return Err(PuzzleError::AlreadyInPuzzle(user_id.to_string()));
        }

        let zero = Position::default();
        Ok(vec![self.next_update(Action::Join, user_id, zero, zero, 0)])
    }

    fn leave(&mut self, user_id: &str) -> Vec<Update> {
        self.current_users.remove(user_id);

        let mut updates = Vec::with_capacity(2);
        if let Some(piece_id) = self.held.remove(user_id) {
            let piece = &mut self.pieces[piece_id];
            piece.held_by = None;
            let position = piece.current;
            updates.push(self.next_update(Action::Swap, user_id, position, position, 0));
        }

        let zero = Position::default();
        updates.push(self.next_update(Action::Leave, user_id, zero, zero, 0));
        updates
    }

    /// Exchange the cells of pieces `a` and `b`, releasing both, and return
    /// the change in correctly placed pieces.
    fn swap(&mut self, a: usize, b: usize) -> i64 {
        let mut delta = 0;
        if self.pieces[a].is_correct() {
            delta -= 1;
        }
        if self.pieces[b].is_correct() {
            delta -= 1;
        }

        let cols = self.dimensions.cols;
        let pos_a = self.pieces[a].current;
        let pos_b = self.pieces[b].current;
        self.grid[pos_a.index(cols)] = b;
        self.grid[pos_b.index(cols)] = a;
        self.pieces[a].current = pos_b;
        self.pieces[b].current = pos_a;
        self.pieces[a].held_by = None;
        self.pieces[b].held_by = None;

        if self.pieces[a].is_correct() {
            delta += 1;
        }
        if self.pieces[b].is_correct() {
            delta += 1;
        }
        delta
    }

    fn apply_delta(&mut self, delta: i64) {
        self.pieces_correct = self.pieces_correct.saturating_add_signed(delta as isize);
    }

    fn on_complete(&self) {
        info!(
            puzzle_id = %self.id,
            pieces = self.dimensions.size(),
            users = self.current_users.len(),
            "puzzle complete"
        );
    }

    fn next_update(
        &mut self,
        action: Action,
        user_id: &str,
        piece1: Position,
        piece2: Position,
        delta: i64,
    ) -> Update {
        let id = self.next_update_id;
        self.next_update_id += 1;
        Update {
            id,
            action,
            user_id: user_id.to_string(),
            piece1,
            piece2,
            delta,
        }
    }
}
