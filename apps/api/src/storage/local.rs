use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::storage::ArtifactStore;

/// Filesystem-backed store rooted at `DATA_DIR`.
///
/// Writes go to a sibling temp file and are renamed into place, so readers
/// see either the old artifact or the new one, never a torn write.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(key);
        let escapes = relative.components().any(|c| {
            !matches!(c, std::path::Component::Normal(_))
        });
        if key.is_empty() || escapes {
            return Err(AppError::Validation(format!("Invalid artifact key '{key}'")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("create {}: {e}", parent.display())))?;
        }

        let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|e| AppError::Storage(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| AppError::Storage(format!("rename into {}: {e}", path.display())))?;

        debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, AppError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(format!("read {}: {e}", path.display()))),
        }
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}
