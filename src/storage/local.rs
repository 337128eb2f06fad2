use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::storage::BlobStore;

/// Local file system blob store. Blobs are flat files named by UUID under
/// the base directory; a thumbnail variant of width W lives at `<ref>_W`.
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn blob_path(&self, blob_ref: &str, width: Option<u32>) -> PathBuf {
        match width {
            Some(w) => self.base_path.join(format!("{}_{}", blob_ref, w)),
            None => self.base_path.join(blob_ref),
        }
    }

    // Idempotent, safe under concurrent first-writers.
    async fn ensure_base_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, data: Bytes) -> Result<String> {
        self.ensure_base_dir().await?;

        let blob_ref = Uuid::new_v4().to_string();
        let full_path = self.blob_path(&blob_ref, None);

        // create_new enforces that a generated ref is never reused.
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full_path)
            .await?;
        file.write_all(&data).await?;
        file.flush().await?;

        tracing::debug!("Saved blob to {:?}", full_path);
        Ok(blob_ref)
    }

    async fn put_variant(&self, blob_ref: &str, width: u32, data: Bytes) -> Result<()> {
        self.ensure_base_dir().await?;

        let full_path = self.blob_path(blob_ref, Some(width));

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        tracing::debug!("Saved variant to {:?}", full_path);
        Ok(())
    }

    async fn get(&self, blob_ref: &str, width: Option<u32>) -> Result<Bytes> {
        let full_path = self.blob_path(blob_ref, width);

        let data = fs::read(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound
            } else {
                AppError::Storage(format!("Failed to read blob: {}", e))
            }
        })?;

        Ok(Bytes::from(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_store() -> (TempDir, LocalBlobStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(temp_dir.path());
        (temp_dir, store)
    }

    #[tokio::test]
    async fn put_creates_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("blobs");
        assert!(!root.exists());

        let store = LocalBlobStore::new(&root);
        store.put(Bytes::from_static(b"hello")).await.unwrap();

        assert!(root.exists());
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let (_temp_dir, store) = setup_store();
        let content = Bytes::from_static(b"some binary content \x00\x01\x02");

        let blob_ref = store.put(content.clone()).await.unwrap();
        let loaded = store.get(&blob_ref, None).await.unwrap();

        assert_eq!(loaded, content);
    }

    #[tokio::test]
    async fn puts_yield_distinct_refs() {
        let (_temp_dir, store) = setup_store();

        let a = store.put(Bytes::from_static(b"same")).await.unwrap();
        let b = store.put(Bytes::from_static(b"same")).await.unwrap();

        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn missing_variant_is_not_found() {
        let (_temp_dir, store) = setup_store();
        let blob_ref = store.put(Bytes::from_static(b"original")).await.unwrap();

        let err = store.get(&blob_ref, Some(500)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn variant_write_is_idempotent() {
        let (_temp_dir, store) = setup_store();
        let blob_ref = store.put(Bytes::from_static(b"original")).await.unwrap();

        store
            .put_variant(&blob_ref, 100, Bytes::from_static(b"first"))
            .await
            .unwrap();
        store
            .put_variant(&blob_ref, 100, Bytes::from_static(b"second"))
            .await
            .unwrap();

        let loaded = store.get(&blob_ref, Some(100)).await.unwrap();
        assert_eq!(loaded, Bytes::from_static(b"second"));

        // The original is untouched by variant writes.
        let original = store.get(&blob_ref, None).await.unwrap();
        assert_eq!(original, Bytes::from_static(b"original"));
    }
}
