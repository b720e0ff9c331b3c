use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use futures::future::BoxFuture;
use tracing::{debug, info};

use crate::dao::{
    asset_store::{AssetStore, validate_namespace},
    storage::{StorageError, StorageResult},
};

/// Stores each namespace as a directory under a root directory.
#[derive(Debug, Clone)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    /// Open the store, creating the root directory when missing.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|err| {
            StorageError::io(format!("creating asset root {}", root.display()), err)
        })?;
        info!(root = %root.display(), "asset store ready");
        Ok(Self { root })
    }
}

impl AssetStore for FsAssetStore {
    fn create_namespace(&self, id: &str) -> BoxFuture<'static, StorageResult<PathBuf>> {
        let id = id.to_string();
        let path = self.namespace_path(&id);
        Box::pin(async move {
            validate_namespace(&id)?;
            match tokio::fs::create_dir(&path).await {
                Ok(()) => {
                    debug!(namespace = %id, "namespace created");
                    Ok(path)
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    Err(StorageError::NamespaceCollision(id))
                }
                Err(err) => Err(StorageError::io(format!("creating namespace {id}"), err)),
            }
        })
    }

    fn remove_namespace(&self, id: &str) -> BoxFuture<'static, StorageResult<()>> {
        let id = id.to_string();
        let path = self.namespace_path(&id);
        Box::pin(async move {
            validate_namespace(&id)?;
            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => {
                    debug!(namespace = %id, "namespace removed");
                    Ok(())
                }
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                Err(err) => Err(StorageError::io(format!("removing namespace {id}"), err)),
            }
        })
    }

    fn namespace_exists(&self, id: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let id = id.to_string();
        let path = self.namespace_path(&id);
        Box::pin(async move {
            validate_namespace(&id)?;
            match tokio::fs::metadata(&path).await {
                Ok(metadata) => Ok(metadata.is_dir()),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
                Err(err) => Err(StorageError::io(format!("inspecting namespace {id}"), err)),
            }
        })
    }

    fn list_namespaces(&self) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let root = self.root.clone();
        Box::pin(async move {
            let listing_error =
                |err: std::io::Error| StorageError::io(format!("listing {}", root.display()), err);
            let mut entries = tokio::fs::read_dir(&root).await.map_err(listing_error)?;
            let mut ids = Vec::new();
            while let Some(entry) = entries.next_entry().await.map_err(listing_error)? {
                let is_dir = entry
                    .file_type()
                    .await
                    .map(|kind| kind.is_dir())
                    .unwrap_or(false);
                if !is_dir {
                    continue;
                }
                if let Ok(name) = entry.file_name().into_string() {
                    ids.push(name);
                }
            }
            ids.sort();
            Ok(ids)
        })
    }

    fn namespace_path(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    async fn temp_store() -> FsAssetStore {
        let root = std::env::temp_dir().join(format!("jigsaw-assets-{}", Uuid::new_v4()));
        FsAssetStore::open(root).await.unwrap()
    }

    #[tokio::test]
    async fn namespaces_can_be_created_listed_and_removed() {
        let store = temp_store().await;

        let path = store.create_namespace("b").await.unwrap();
        assert_eq!(path, store.root().join("b"));
        store.create_namespace("a").await.unwrap();
        tokio::fs::write(store.root().join("stray.txt"), b"x")
            .await
            .unwrap();
        tokio::fs::write(path.join("original.jpeg"), b"x").await.unwrap();

        assert_eq!(store.list_namespaces().await.unwrap(), vec!["a", "b"]);
        assert!(store.namespace_exists("b").await.unwrap());

        store.remove_namespace("b").await.unwrap();
        assert!(!store.namespace_exists("b").await.unwrap());
        assert_eq!(store.list_namespaces().await.unwrap(), vec!["a"]);

        tokio::fs::remove_dir_all(store.root()).await.unwrap();
    }

    #[tokio::test]
    async fn creating_an_existing_namespace_collides() {
        let store = temp_store().await;
        store.create_namespace("dup").await.unwrap();

        let err = store.create_namespace("dup").await.unwrap_err();
        assert!(matches!(err, StorageError::NamespaceCollision(id) if id == "dup"));

        tokio::fs::remove_dir_all(store.root()).await.unwrap();
    }

    #[tokio::test]
    async fn removing_a_missing_namespace_succeeds() {
        let store = temp_store().await;
        store.remove_namespace("missing").await.unwrap();
        assert!(matches!(
            store.remove_namespace("../escape").await,
            Err(StorageError::InvalidNamespace(_))
        ));
        tokio::fs::remove_dir_all(store.root()).await.unwrap();
    }
}
