use std::{collections::HashMap, time::SystemTime};

use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::state::puzzle_pool::PuzzlePool;

/// Registered participant and their scoring counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Identifier handed out at registration.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Registration timestamp.
    pub created_at: SystemTime,
    /// Net correct pieces contributed, keyed by puzzle id.
    pub piece_count: HashMap<String, i64>,
    /// Net correct pieces contributed across every puzzle.
    pub lifetime_pieces: i64,
}

impl User {
    /// Build a user with a fresh identifier and zeroed counters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            created_at: SystemTime::now(),
            piece_count: HashMap::new(),
            lifetime_pieces: 0,
        }
    }
}

/// Lookup seam between a puzzle and the users taking part in it.
///
/// Puzzles only ever refer to users by id and go through this trait, so a
/// puzzle never keeps a user alive and a user never keeps a puzzle alive.
pub trait UserDirectory: Send + Sync {
    /// Whether a user with this id is registered.
    fn contains(&self, user_id: &str) -> bool;
    /// Add `delta` to the user's per-puzzle and lifetime counters.
    fn record_pieces(&self, user_id: &str, puzzle_id: &str, delta: i64);
    /// Net pieces the user contributed to `puzzle_id`.
    fn piece_count(&self, user_id: &str, puzzle_id: &str) -> i64;
}

/// Process-wide registry of users.
#[derive(Debug, Default)]
pub struct UserPool {
    users: DashMap<String, User>,
}

impl UserPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new user under a freshly generated id.
    pub fn create(&self, name: impl Into<String>) -> User {
        let user = User::new(name);
        self.add(user.clone());
        info!(user_id = %user.id, name = %user.name, "user registered");
        user
    }

    /// Insert (or replace) a user.
    pub fn add(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    /// Copy of the user record, if registered.
    pub fn get(&self, id: &str) -> Option<User> {
        self.users.get(id).map(|entry| entry.value().clone())
    }

    /// Remove a user, returning the removed record.
    pub fn delete(&self, id: &str) -> Option<User> {
        self.users.remove(id).map(|(_, user)| user)
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether no user is registered.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Drop every per-puzzle counter that refers to `puzzle_id`.
    pub fn forget_puzzle(&self, puzzle_id: &str) {
        for mut entry in self.users.iter_mut() {
            entry.piece_count.remove(puzzle_id);
        }
    }

    /// Remove counters for puzzles that no longer resolve in `puzzles`.
    ///
    /// Returns the number of counter entries removed.
    pub fn prune(&self, puzzles: &PuzzlePool) -> usize {
        let removed = self.retain_puzzles(|puzzle_id| puzzles.contains(puzzle_id));
        info!(removed, users = self.len(), "user pool pruned");
        removed
    }

    /// Keep only the per-puzzle counters whose puzzle id satisfies `live`.
    pub fn retain_puzzles<F>(&self, live: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let mut removed = 0;
        for mut entry in self.users.iter_mut() {
            let before = entry.piece_count.len();
            entry.piece_count.retain(|puzzle_id, _| live(puzzle_id));
            let dropped = before - entry.piece_count.len();
            if dropped > 0 {
                debug!(user_id = %entry.key(), dropped, "removed stale puzzle counters");
            }
            removed += dropped;
        }
        removed
    }
}

impl UserDirectory for UserPool {
    fn contains(&self, user_id: &str) -> bool {
        self.users.contains_key(user_id)
    }

    fn record_pieces(&self, user_id: &str, puzzle_id: &str, delta: i64) {
        if let Some(mut user) = self.users.get_mut(user_id) {
            *user.piece_count.entry(puzzle_id.to_string()).or_insert(0) += delta;
            user.lifetime_pieces += delta;
        }
    }

    fn piece_count(&self, user_id: &str, puzzle_id: &str) -> i64 {
        self.users
            .get(user_id)
            .and_then(|user| user.piece_count.get(puzzle_id).copied())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_assigns_unique_ids_and_zero_counters() {
        let pool = UserPool::new();
        let a = pool.create("alice");
        let b = pool.create("bob");

        assert_ne!(a.id, b.id);
        assert_eq!(a.lifetime_pieces, 0);
        assert!(a.piece_count.is_empty());
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(&a.id).map(|u| u.name), Some("alice".to_string()));
    }

    #[test]
    fn delete_removes_the_user() {
        let pool = UserPool::new();
        let user = pool.create("carol");
        assert!(pool.delete(&user.id).is_some());
        assert!(pool.get(&user.id).is_none());
        assert!(!pool.contains(&user.id));
    }

    #[test]
    fn record_pieces_tracks_puzzle_and_lifetime_totals() {
        let pool = UserPool::new();
        let user = pool.create("dave");

        pool.record_pieces(&user.id, "p1", 2);
        pool.record_pieces(&user.id, "p1", -1);
        pool.record_pieces(&user.id, "p2", 1);

        assert_eq!(pool.piece_count(&user.id, "p1"), 1);
        assert_eq!(pool.piece_count(&user.id, "p2"), 1);
        assert_eq!(pool.piece_count(&user.id, "p3"), 0);
        assert_eq!(pool.get(&user.id).unwrap().lifetime_pieces, 2);
    }

    #[test]
    fn record_pieces_for_unknown_user_is_ignored() {
        let pool = UserPool::new();
        pool.record_pieces("ghost", "p1", 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn retain_puzzles_drops_dead_references_only() {
        let pool = UserPool::new();
        let user = pool.create("erin");
        pool.record_pieces(&user.id, "alive", 1);
        pool.record_pieces(&user.id, "gone", 3);

        let removed = pool.retain_puzzles(|id| id == "alive");

        assert_eq!(removed, 1);
        let user = pool.get(&user.id).unwrap();
        assert!(user.piece_count.contains_key("alive"));
        assert!(!user.piece_count.contains_key("gone"));
        assert_eq!(user.lifetime_pieces, 4);
    }

    #[test]
    fn forget_puzzle_clears_entry_for_every_user() {
        let pool = UserPool::new();
        let a = pool.create("a");
        let b = pool.create("b");
        pool.record_pieces(&a.id, "p", 1);
        pool.record_pieces(&b.id, "p", -1);

        pool.forget_puzzle("p");

        assert!(pool.get(&a.id).unwrap().piece_count.is_empty());
        assert!(pool.get(&b.id).unwrap().piece_count.is_empty());
    }
}
