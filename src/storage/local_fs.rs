use super::*;
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct LocalFileStorage {
    storage_path: PathBuf,
}

impl LocalFileStorage {
    /// Uses `storage_path` as the upload directory, creating it if needed.
    pub fn new(storage_path: PathBuf) -> Result<Self, ApiError> {
        if !storage_path.exists() {
            std::fs::create_dir_all(&storage_path)?;
            tracing::info!("Created upload directory {}", storage_path.display());
        }
        Ok(Self { storage_path })
    }

    pub fn path(&self) -> &Path {
        &self.storage_path
    }
}

#[async_trait]
impl Storage for LocalFileStorage {
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<(), ApiError> {
        let file_path = self.storage_path.join(name);
        fs::write(&file_path, bytes).await?;
        tracing::debug!("Stored {} bytes at {}", bytes.len(), file_path.display());
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, ApiError> {
        let file_path = self.storage_path.join(name);
        fs::read(&file_path).await.map_err(|err| {
            tracing::debug!("Failed to read {}: {err}", file_path.display());
            ApiError::NotFound
        })
    }

    async fn delete(&self, name: &str) -> Result<(), ApiError> {
        let file_path = self.storage_path.join(name);
        fs::remove_file(&file_path).await.map_err(|err| {
            tracing::warn!("Failed to delete {}: {err}", file_path.display());
            ApiError::NotFound
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("uploads").join("nested");

        let storage = LocalFileStorage::new(dir.clone()).unwrap();
        assert!(dir.is_dir());
        assert_eq!(storage.path(), dir);

        // Existing directory is fine too.
        LocalFileStorage::new(dir).unwrap();
    }

    #[test]
    fn fails_when_path_is_a_file() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();

        let blocked = file.join("uploads");
        assert!(matches!(
            LocalFileStorage::new(blocked),
            Err(ApiError::Io(_))
        ));
    }

    #[tokio::test]
    async fn save_get_delete() {
        let root = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(root.path().to_path_buf()).unwrap();

        storage.save("a.png", b"first").await.unwrap();
        storage.save("a.png", b"second").await.unwrap();
        assert_eq!(storage.get("a.png").await.unwrap(), b"second");

        storage.delete("a.png").await.unwrap();
        assert!(matches!(storage.get("a.png").await, Err(ApiError::NotFound)));
        assert!(matches!(
            storage.delete("a.png").await,
            Err(ApiError::NotFound)
        ));
    }
}
