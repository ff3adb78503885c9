use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::BlobStore;

/// Stores blobs as files under a root directory.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> io::Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid storage key {key:?}"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, data: &[u8]) -> io::Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;
        debug!(path = %path.display(), bytes = data.len(), "Stored blob");
        Ok(())
    }

    async fn delete(&self, key: &str) -> io::Result<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_then_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path());
        let on_disk = temp_dir.path().join("datasets/2026/01/01/a.csv");

        store.put("datasets/2026/01/01/a.csv", b"x,y\n").await.unwrap();
        assert_eq!(std::fs::read(&on_disk).unwrap(), b"x,y\n");

        store.delete("datasets/2026/01/01/a.csv").await.unwrap();
        assert!(!on_disk.exists());

        // Deleting twice is fine
        store.delete("datasets/2026/01/01/a.csv").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_keys_escaping_root() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path());

        assert!(store.put("../outside.csv", b"").await.is_err());
        assert!(store.put("/abs.csv", b"").await.is_err());
        assert!(store.put("", b"").await.is_err());
    }
}
