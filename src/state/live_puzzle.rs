use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::state::{
    observers::{ObserverId, UpdateHub},
    puzzle::{Dimensions, Puzzle, PuzzleError, PuzzleSnapshot, Request, RequestAction, Update},
    user_pool::UserDirectory,
};

type Reply<T> = oneshot::Sender<T>;

/// Messages consumed by a puzzle's actor task.
enum Command {
    Apply {
        request: Request,
        reply: Option<Reply<Result<(), PuzzleError>>>,
    },
    Snapshot(Reply<PuzzleSnapshot>),
    Results(Reply<BTreeMap<String, i64>>),
    Close,
}

/// Thread-safe handle to a puzzle owned by its own task.
///
/// Every mutation goes through one ordered queue consumed by a single task,
/// so the grid itself needs no lock. Cloning the handle is cheap.
#[derive(Clone)]
pub struct LivePuzzle {
    id: Arc<str>,
    dimensions: Dimensions,
    commands: mpsc::UnboundedSender<Command>,
    observers: Arc<UpdateHub>,
    complete: Arc<AtomicBool>,
    users: Arc<dyn UserDirectory>,
}

impl LivePuzzle {
    /// Spawn the actor task for `puzzle` and return a handle to it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(puzzle: Puzzle, users: Arc<dyn UserDirectory>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id: Arc::from(puzzle.id()),
            dimensions: puzzle.dimensions(),
            commands: tx,
            observers: Arc::new(UpdateHub::new()),
            complete: Arc::new(AtomicBool::new(puzzle.is_complete())),
            users,
        };

        tokio::spawn(run(
            puzzle,
            rx,
            handle.observers.clone(),
            handle.complete.clone(),
        ));

        handle
    }

    /// Puzzle identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Grid shape.
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Whether every piece is in place.
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// Enqueue a request without waiting for it to be applied.
    ///
    /// Checks that do not depend on the grid (completion, bounds, user
    /// registration for a join) are reported here; the rest are logged by
    /// the actor.
    pub fn submit(&self, request: Request) -> Result<(), PuzzleError> {
        self.precheck(&request)?;
        self.send(Command::Apply {
            request,
            reply: None,
        })
    }

    /// Enqueue a request and wait for the actor's verdict.
    pub async fn request(&self, request: Request) -> Result<(), PuzzleError> {
        self.precheck(&request)?;
        let (tx, rx) = oneshot::channel();
        self.send(Command::Apply {
            request,
            reply: Some(tx),
        })?;
        rx.await.map_err(|_| PuzzleError::Closed)?
    }

    /// State as of every request enqueued before this call.
    pub async fn snapshot(&self) -> Result<PuzzleSnapshot, PuzzleError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx))?;
        rx.await.map_err(|_| PuzzleError::Closed)
    }

    /// Net correct pieces contributed by each current user.
    pub async fn results(&self) -> Result<BTreeMap<String, i64>, PuzzleError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Results(tx))?;
        rx.await.map_err(|_| PuzzleError::Closed)
    }

    /// Register a callback for updates emitted from now on.
    pub fn subscribe<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&Update) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    /// Remove an observer.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Stop the actor after the requests already queued and drop observers.
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    fn precheck(&self, request: &Request) -> Result<(), PuzzleError> {
        if self.is_complete() {
            return Err(PuzzleError::PuzzleComplete);
        }
        match request.action {
            RequestAction::Hold(position) => self.dimensions.check(position),
            RequestAction::Join if !self.users.contains(&request.user_id) => {
                Err(PuzzleError::UnknownUser(request.user_id.clone()))
            }
            RequestAction::Join | RequestAction::Leave => Ok(()),
        }
    }

    fn send(&self, command: Command) -> Result<(), PuzzleError> {
        self.commands.send(command).map_err(|_| PuzzleError::Closed)
    }
}

async fn run(
    mut puzzle: Puzzle,
    mut commands: mpsc::UnboundedReceiver<Command>,
    observers: Arc<UpdateHub>,
    complete: Arc<AtomicBool>,
) {
    debug!(puzzle_id = %puzzle.id(), "puzzle actor started");

    while let Some(command) = commands.recv().await {
        match command {
            Command::Apply { request, reply } => {
                let user_id = request.user_id.clone();
                let outcome = puzzle.apply(request).map(|updates| {
                    for update in &updates {
                        observers.publish(update);
                    }
                });
                complete.store(puzzle.is_complete(), Ordering::Release);

                if let Err(err) = &outcome {
                    debug!(
                        puzzle_id = %puzzle.id(),
                        user_id = %user_id,
                        error = %err,
                        "request rejected"
                    );
                }
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(puzzle.snapshot());
            }
            Command::Results(reply) => {
                let _ = reply.send(puzzle.results());
            }
            Command::Close => break,
        }
    }

    if !observers.is_empty() {
        warn!(
            puzzle_id = %puzzle.id(),
            observers = observers.len(),
            "dropping observers of closed puzzle"
        );
    }
    observers.clear();
    info!(puzzle_id = %puzzle.id(), "puzzle actor stopped");
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::state::{
        piece::Position,
        puzzle::{Action, ImageSize},
        user_pool::UserPool,
    };

    fn spawn(rows: usize, cols: usize, seed: u64) -> (LivePuzzle, Arc<UserPool>) {
        let users = Arc::new(UserPool::new());
        let dimensions = Dimensions { rows, cols };
        let assets = (0..dimensions.size()).map(|i| format!("{i}.png")).collect();
        let mut puzzle =
            Puzzle::new("live", dimensions, ImageSize::default(), assets, users.clone());
        puzzle.shuffle_with(&mut StdRng::seed_from_u64(seed));
        (LivePuzzle::spawn(puzzle, users.clone()), users)
    }

    /// Locate the cell holding the piece whose destination is `dest`.
    fn find(snapshot: &PuzzleSnapshot, dest_asset: &str) -> Position {
        snapshot
            .grid
            .iter()
            .flatten()
            .find(|piece| piece.asset == dest_asset)
            .map(|piece| piece.current)
            .unwrap()
    }

    #[tokio::test]
    async fn observers_see_own_join_and_ordered_ids() {
        let (puzzle, users) = spawn(2, 2, 1);
        let alice = users.create("alice");
        let bob = users.create("bob");

        let (_, mut rx) = puzzle.observers.subscribe_channel();
        puzzle.submit(Request::join(&alice.id)).unwrap();
        puzzle.submit(Request::join(&bob.id)).unwrap();
        puzzle.submit(Request::hold(&alice.id, Position::new(0, 0))).unwrap();

        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(rx.recv().await.unwrap());
        }
        assert_eq!(ids.iter().map(|u| u.id).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(ids[0].action, Action::Join);
        assert_eq!(ids[0].user_id, alice.id);
        assert_eq!(ids[2].action, Action::Hold);
    }

    #[tokio::test]
    async fn submit_reports_stateless_rejections_before_enqueue() {
        let (puzzle, users) = spawn(2, 3, 2);
        let alice = users.create("alice");

        assert!(matches!(
            puzzle.submit(Request::hold(&alice.id, Position::new(2, 0))),
            Err(PuzzleError::OutOfBounds { .. })
        ));
        assert_eq!(
            puzzle.submit(Request::join("ghost")),
            Err(PuzzleError::UnknownUser("ghost".into()))
        );
        assert_eq!(puzzle.snapshot().await.unwrap().next_update_id, 0);
    }

    #[tokio::test]
    async fn request_returns_state_dependent_rejections() {
        let (puzzle, users) = spawn(2, 2, 3);
        let alice = users.create("alice");

        assert_eq!(
            puzzle.request(Request::hold(&alice.id, Position::new(0, 0))).await,
            Err(PuzzleError::NotInPuzzle(alice.id.clone()))
        );
        puzzle.request(Request::join(&alice.id)).await.unwrap();
        assert_eq!(
            puzzle.request(Request::join(&alice.id)).await,
            Err(PuzzleError::AlreadyInPuzzle(alice.id.clone()))
        );
    }

    #[tokio::test]
    async fn concurrent_submitters_are_serialized() {
        let (puzzle, users) = spawn(4, 4, 4);
        let (_, mut rx) = puzzle.observers.subscribe_channel();

        let mut tasks = Vec::new();
        for n in 0..8 {
            let user = users.create(format!("user-{n}"));
            let puzzle = puzzle.clone();
            tasks.push(tokio::spawn(async move {
                puzzle.request(Request::join(&user.id)).await.unwrap();
                for i in 0..20 {
                    let target = Position::new((i + n) % 4, (i * 3 + n) % 4);
                    let _ = puzzle.request(Request::hold(&user.id, target)).await;
                }
                let _ = puzzle.request(Request::leave(&user.id)).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let snapshot = puzzle.snapshot().await.unwrap();
        let mut expected = 0;
        let mut total = 0;
        while let Ok(update) = rx.try_recv() {
            assert_eq!(update.id, expected);
            expected += 1;
            total += update.delta;
        }
        assert_eq!(expected, snapshot.next_update_id);
        assert_eq!(total, snapshot.pieces_correct as i64);
        if !puzzle.is_complete() {
            assert!(snapshot.held.is_empty());
            assert!(snapshot.current_users.is_empty());
        }
    }

    #[tokio::test]
    async fn completion_blocks_further_requests() {
        let (puzzle, users) = spawn(1, 2, 5);
        let alice = users.create("alice");
        puzzle.request(Request::join(&alice.id)).await.unwrap();

        let snapshot = puzzle.snapshot().await.unwrap();
        let first = find(&snapshot, "0.png");
        let second = find(&snapshot, "1.png");
        puzzle.request(Request::hold(&alice.id, first)).await.unwrap();
        puzzle.request(Request::hold(&alice.id, second)).await.unwrap();

        assert!(puzzle.is_complete());
        assert_eq!(
            puzzle.submit(Request::leave(&alice.id)),
            Err(PuzzleError::PuzzleComplete)
        );
        let results = puzzle.results().await.unwrap();
        assert_eq!(results.get(&alice.id), Some(&2));
    }

    #[tokio::test]
    async fn close_stops_actor_and_drops_observers() {
        let (puzzle, users) = spawn(2, 2, 6);
        let (_, mut rx) = puzzle.observers.subscribe_channel();
        puzzle.close();

        assert!(rx.recv().await.is_none());
        assert_eq!(puzzle.observer_count(), 0);
        let alice = users.create("alice");
        assert_eq!(
            puzzle.request(Request::join(&alice.id)).await,
            Err(PuzzleError::Closed)
        );
        assert!(puzzle.snapshot().await.is_err());
    }
}
