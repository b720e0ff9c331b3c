/// Filesystem-backed asset storage.
pub mod fs;

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;

use crate::dao::storage::{StorageError, StorageResult};

pub use self::fs::FsAssetStore;

/// File name of the uploaded source image inside a namespace.
pub const ORIGINAL_FILE: &str = "original.jpeg";
/// File name of the downsized preview inside a namespace.
pub const PREVIEW_FILE: &str = "preview.jpeg";

/// Abstraction over where per-puzzle image assets live.
///
/// Each puzzle owns one namespace named after the puzzle id.
pub trait AssetStore: Send + Sync {
    /// Create an empty namespace, failing if it already exists.
    fn create_namespace(&self, id: &str) -> BoxFuture<'static, StorageResult<PathBuf>>;
    /// Delete a namespace and everything inside it. Missing namespaces are not an error.
    fn remove_namespace(&self, id: &str) -> BoxFuture<'static, StorageResult<()>>;
    /// Whether the namespace exists.
    fn namespace_exists(&self, id: &str) -> BoxFuture<'static, StorageResult<bool>>;
    /// Ids of every namespace currently stored.
    fn list_namespaces(&self) -> BoxFuture<'static, StorageResult<Vec<String>>>;
    /// Location of the namespace, whether or not it exists.
    fn namespace_path(&self, id: &str) -> PathBuf;
    /// Root directory every asset path is relative to.
    fn root(&self) -> &Path;
}

/// Reject ids that are not a single plain path segment.
pub fn validate_namespace(id: &str) -> StorageResult<()> {
    let plain = !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\'])
        && !id.chars().any(char::is_control);
    if plain {
        Ok(())
    } else {
        Err(StorageError::InvalidNamespace(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_namespace_accepts_plain_ids() {
        assert!(validate_namespace("6bfdfa70-d02e-4ba7-a65b-b35627b22212").is_ok());
        assert!(validate_namespace("puzzle_1").is_ok());
    }

    #[test]
    fn validate_namespace_rejects_traversal() {
        for id in ["", ".", "..", "a/b", "..\\x", "a\nb"] {
            assert!(validate_namespace(id).is_err(), "{id:?}");
        }
    }
}
