use std::{
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::{DashMap, DashSet, mapref::entry::Entry};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    dao::asset_store::AssetStore,
    services::slicer::{ImageSlicer, SliceError},
    state::{
        live_puzzle::LivePuzzle,
        puzzle::{Dimensions, ImageSize, Puzzle},
        user_pool::UserPool,
    },
};

/// Reasons a puzzle could not be created. Nothing is registered on failure.
#[derive(Debug, Error)]
pub enum CreateError {
    /// Rows or columns is zero.
    #[error("invalid puzzle dimensions {rows}x{cols}")]
    InvalidDimensions {
        /// Requested rows.
        rows: usize,
        /// Requested columns.
        cols: usize,
    },
    /// A live puzzle already uses this id.
    #[error("puzzle `{0}` already exists")]
    AlreadyExists(String),
    /// The picture could not be sliced.
    #[error("slicing failed: {0}")]
    SliceFailed(#[from] SliceError),
    /// The slicer produced a grid of the wrong shape.
    #[error("slicer returned {got} cells for a {rows}x{cols} puzzle")]
    ShapeMismatch {
        /// Requested rows.
        rows: usize,
        /// Requested columns.
        cols: usize,
        /// Cells actually produced.
        got: usize,
    },
}

/// Outcome of one [`PuzzlePool::prune`] sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Completed puzzles removed from the registry.
    pub completed: Vec<String>,
    /// Asset namespaces deleted because no live puzzle owned them.
    pub orphans: Vec<String>,
    /// Storage operations that failed and will be retried next sweep.
    pub failures: usize,
}

/// Process-wide registry of live puzzles.
pub struct PuzzlePool {
    puzzles: DashMap<String, LivePuzzle>,
    /// Uploaded namespaces not yet turned into puzzles, with upload time.
    pending: DashMap<String, Instant>,
    pending_grace: Duration,
    /// Ids whose puzzle is being sliced right now.
    building: DashSet<String>,
    users: Arc<UserPool>,
    assets: Arc<dyn AssetStore>,
    slicer: Arc<dyn ImageSlicer>,
}

impl PuzzlePool {
    /// Build an empty pool.
    ///
    /// Uploads reserved through [`PuzzlePool::reserve`] survive orphan
    /// reconciliation for `pending_grace`.
    pub fn new(
        users: Arc<UserPool>,
        assets: Arc<dyn AssetStore>,
        slicer: Arc<dyn ImageSlicer>,
        pending_grace: Duration,
    ) -> Self {
        Self {
            puzzles: DashMap::new(),
            pending: DashMap::new(),
            pending_grace,
            building: DashSet::new(),
            users,
            assets,
            slicer,
        }
    }

    /// Asset storage backing the pool.
    pub fn assets(&self) -> &Arc<dyn AssetStore> {
        &self.assets
    }

    /// Slice `picture`, shuffle the pieces and start a live puzzle under `id`.
    ///
    /// The namespace `id` is never reconciled as an orphan while this runs.
    pub async fn create(
        &self,
        id: &str,
        picture: &Path,
        rows: usize,
        cols: usize,
    ) -> Result<LivePuzzle, CreateError> {
        if rows == 0 || cols == 0 {
            return Err(CreateError::InvalidDimensions { rows, cols });
        }
        if self.puzzles.contains_key(id) {
            return Err(CreateError::AlreadyExists(id.to_string()));
        }
        let Some(_building) = BuildGuard::enter(&self.building, id) else {
            return Err(CreateError::AlreadyExists(id.to_string()));
        };

        let sliced = self.slicer.slice(picture, rows, cols).await?;
        let grid = sliced.cells;
        let image_size = ImageSize {
            width: sliced.width,
            height: sliced.height,
        };
        let dimensions = Dimensions { rows, cols };
        let shape_ok = grid.len() == rows && grid.iter().all(|row| row.len() == cols);
        if !shape_ok {
            return Err(CreateError::ShapeMismatch {
                rows,
                cols,
                got: grid.iter().map(Vec::len).sum(),
            });
        }

        match self.puzzles.entry(id.to_string()) {
            Entry::Occupied(_) => Err(CreateError::AlreadyExists(id.to_string())),
            Entry::Vacant(slot) => {
                let assets = grid.into_iter().flatten().collect();
                let mut puzzle =
                    Puzzle::new(id, dimensions, image_size, assets, self.users.clone());
                puzzle.shuffle();
                let live = LivePuzzle::spawn(puzzle, self.users.clone());
                slot.insert(live.clone());
                self.pending.remove(id);
                info!(puzzle_id = %id, rows, cols, "puzzle created");
                Ok(live)
            }
        }
    }

    /// Live puzzle registered under `id`.
    pub fn get(&self, id: &str) -> Option<LivePuzzle> {
        self.puzzles.get(id).map(|entry| entry.value().clone())
    }

    /// Whether a live puzzle is registered under `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.puzzles.contains_key(id)
    }

    /// Number of live puzzles.
    pub fn len(&self) -> usize {
        self.puzzles.len()
    }

    /// Whether no puzzle is live.
    pub fn is_empty(&self) -> bool {
        self.puzzles.is_empty()
    }

    /// Protect a freshly uploaded namespace from orphan reconciliation
    /// until it is turned into a puzzle or the grace period expires.
    pub fn reserve(&self, id: &str) {
        self.pending.insert(id.to_string(), Instant::now());
    }

    /// Remove completed puzzles and their assets, then delete asset
    /// namespaces no live puzzle owns.
    ///
    /// Storage failures are logged and counted; the sweep always runs to
    /// the end and leftovers are retried on the next sweep.
    pub async fn prune(&self) -> PruneReport {
        let mut report = PruneReport::default();

        let completed: Vec<String> = self
            .puzzles
            .iter()
            .filter(|entry| entry.value().is_complete())
            .map(|entry| entry.key().clone())
            .collect();

        for id in completed {
            if let Err(err) = self.assets.remove_namespace(&id).await {
                warn!(puzzle_id = %id, error = %err, "failed to delete puzzle assets");
                report.failures += 1;
            }
            self.users.forget_puzzle(&id);
            if let Some((_, puzzle)) = self.puzzles.remove(&id) {
                puzzle.close();
            }
            info!(puzzle_id = %id, "pruned completed puzzle");
            report.completed.push(id);
        }

        self.pending
            .retain(|_, reserved_at| reserved_at.elapsed() < self.pending_grace);

        match self.assets.list_namespaces().await {
            Ok(namespaces) => {
                let orphans = namespaces.into_iter().filter(|id| {
                    !self.puzzles.contains_key(id)
                        && !self.pending.contains_key(id)
                        && !self.building.contains(id)
                });
                for id in orphans {
                    match self.assets.remove_namespace(&id).await {
                        Ok(()) => {
                            info!(namespace = %id, "removed orphaned puzzle assets");
                            report.orphans.push(id);
                        }
                        Err(err) => {
                            warn!(namespace = %id, error = %err, "failed to delete orphaned assets");
                            report.failures += 1;
                        }
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to list asset namespaces");
                report.failures += 1;
            }
        }

        info!(
            completed = report.completed.len(),
            orphans = report.orphans.len(),
            failures = report.failures,
            live = self.len(),
            "puzzle pool pruned"
        );
        report
    }

    /// Stop every live puzzle and empty the registry.
    pub fn shutdown(&self) {
        for entry in self.puzzles.iter() {
            entry.value().close();
        }
        self.puzzles.clear();
        self.pending.clear();
    }
}

/// Marks an id as being built until dropped.
struct BuildGuard<'a> {
    building: &'a DashSet<String>,
    id: String,
}

impl<'a> BuildGuard<'a> {
    fn enter(building: &'a DashSet<String>, id: &str) -> Option<Self> {
        building.insert(id.to_string()).then(|| Self {
            building,
            id: id.to_string(),
        })
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        self.building.remove(&self.id);
    }
}
