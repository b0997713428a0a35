mod local_fs;

pub use local_fs::LocalFileStorage;

use crate::errors::ApiError;
use async_trait::async_trait;

/// Flat, name-addressed file store.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Writes `bytes` under `name`, replacing any existing file.
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<(), ApiError>;
    /// Reads the whole file. Any failure is reported as [`ApiError::NotFound`].
    async fn get(&self, name: &str) -> Result<Vec<u8>, ApiError>;
    /// Removes the file. Any failure is reported as [`ApiError::NotFound`].
    async fn delete(&self, name: &str) -> Result<(), ApiError>;
}

/// Extracts the base file name from a request path.
///
/// Only the last segment is kept so a request can never address anything
/// outside the storage directory. Returns `None` when nothing usable is left.
pub fn base_name(path: &str) -> Option<&str> {
    let name = path.trim_end_matches('/').rsplit('/').next()?;

    match name {
        "" | "." | ".." => None,
        name if name.contains(['\\', '\0']) => None,
        name => Some(name),
    }
}
