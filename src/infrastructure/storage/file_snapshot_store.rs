use crate::application::ports::snapshot_store::SnapshotStore;
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// ファイルに保存するスナップショット。一時ファイルへ書いてから rename する
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<Vec<u8>>, AppError> {
        match fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AppError::Storage(format!(
                "Failed to read snapshot {}: {err}",
                self.path.display()
            ))),
        }
    }

    async fn save(&self, bytes: &[u8]) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|err| {
                    AppError::Storage(format!("Failed to create snapshot dir: {err}"))
                })?;
            }
        }

        let temp = self.temp_path();
        fs::write(&temp, bytes)
            .await
            .map_err(|err| AppError::Storage(format!("Failed to write snapshot: {err}")))?;
        fs::rename(&temp, &self.path)
            .await
            .map_err(|err| AppError::Storage(format!("Failed to replace snapshot: {err}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("cache.snapshot"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("nested").join("cache.snapshot"));

        store.save(b"first").await.unwrap();
        store.save(b"second").await.unwrap();

        assert_eq!(store.load().await.unwrap().unwrap(), b"second".to_vec());
        assert!(!store.temp_path().exists());
    }
}
