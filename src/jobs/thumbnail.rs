use std::sync::Arc;

use tokio::sync::mpsc;

use crate::db::Database;
use crate::error::Result;
use crate::models::FileRecord;
use crate::storage::BlobStore;

/// Variant widths derived for every image upload.
pub const THUMBNAIL_WIDTHS: [u32; 3] = [500, 250, 100];

/// Attempts per job before it is abandoned and the variants stay absent.
const MAX_ATTEMPTS: u32 = 3;

pub type ThumbnailQueueHandle = mpsc::Sender<ThumbnailJob>;

/// Transient job: enqueued on image upload, consumed by the worker, not
/// persisted beyond the queue lifetime.
#[derive(Debug, Clone)]
pub struct ThumbnailJob {
    pub owner_id: String,
    pub file_id: String,
}

/// Resize seam. The actual algorithm is an external collaborator; the
/// worker only requires that rendering is a pure function of the original
/// bytes so regeneration stays idempotent.
pub trait ThumbnailRenderer: Send + Sync {
    fn render(&self, original: &[u8], width: u32) -> Result<Vec<u8>>;
}

/// Renderer that stores the original bytes for every variant. Real image
/// decoding is out of scope; a resizing collaborator plugs in through
/// `ThumbnailRenderer` at the composition root.
pub struct PassthroughRenderer;

impl ThumbnailRenderer for PassthroughRenderer {
    fn render(&self, original: &[u8], _width: u32) -> Result<Vec<u8>> {
        Ok(original.to_vec())
    }
}

/// Background thumbnail worker. Delivery is at-least-once: a job may be
/// processed more than once after a retry and variant writes overwrite.
pub struct ThumbnailWorker {
    job_rx: mpsc::Receiver<ThumbnailJob>,
    db: Database,
    blobs: Arc<dyn BlobStore>,
    renderer: Arc<dyn ThumbnailRenderer>,
}

impl ThumbnailWorker {
    /// Spawn the worker task and hand back the enqueue side of the channel.
    pub fn spawn(
        db: Database,
        blobs: Arc<dyn BlobStore>,
        renderer: Arc<dyn ThumbnailRenderer>,
    ) -> ThumbnailQueueHandle {
        let (job_tx, job_rx) = mpsc::channel(128);

        let worker = Self {
            job_rx,
            db,
            blobs,
            renderer,
        };
        worker.start();

        job_tx
    }

    fn start(mut self) {
        tokio::spawn(async move {
            while let Some(job) = self.job_rx.recv().await {
                tracing::debug!("Processing thumbnail job for file '{}'", job.file_id);

                let mut attempt = 0;
                loop {
                    attempt += 1;
                    match Self::process(&self.db, &*self.blobs, &*self.renderer, &job).await {
                        Ok(()) => break,
                        Err(e) if attempt < MAX_ATTEMPTS => {
                            tracing::warn!(
                                "Thumbnail job for '{}' failed (attempt {}): {}",
                                job.file_id,
                                attempt,
                                e
                            );
                        }
                        Err(e) => {
                            // Abandoned; downloads of these variants stay NotFound.
                            tracing::error!(
                                "Abandoning thumbnail job for '{}' after {} attempts: {}",
                                job.file_id,
                                attempt,
                                e
                            );
                            break;
                        }
                    }
                }
            }
            tracing::info!("Thumbnail job channel closed, shutting down worker");
        });
    }

    /// Derive every configured width for one job. Safe to run repeatedly
    /// for the same file.
    pub(crate) async fn process(
        db: &Database,
        blobs: &dyn BlobStore,
        renderer: &dyn ThumbnailRenderer,
        job: &ThumbnailJob,
    ) -> Result<()> {
        let record: Option<FileRecord> =
            sqlx::query_as("SELECT * FROM files WHERE id = ? AND user_id = ?")
                .bind(&job.file_id)
                .bind(&job.owner_id)
                .fetch_optional(db.pool())
                .await?;

        // A vanished or non-image record is a stale job, not a failure.
        let Some(record) = record else {
            tracing::warn!("Thumbnail job for unknown file '{}', skipping", job.file_id);
            return Ok(());
        };
        if !record.kind().is_image() {
            return Ok(());
        }
        let Some(ref blob_ref) = record.storage_ref else {
            return Ok(());
        };

        let original = blobs.get(blob_ref, None).await?;

        for width in THUMBNAIL_WIDTHS {
            let rendered = renderer.render(&original, width)?;
            blobs.put_variant(blob_ref, width, rendered.into()).await?;
        }

        tracing::debug!("Generated {} variants for '{}'", THUMBNAIL_WIDTHS.len(), job.file_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{NewFile, RegisterRequest};
    use crate::services::{FileService, UserService};
    use crate::storage::LocalBlobStore;
    use bytes::Bytes;
    use tempfile::TempDir;

    /// Truncating stand-in for a real resizer: output length depends on
    /// the requested width, so variants are distinguishable.
    struct TruncatingRenderer;

    impl ThumbnailRenderer for TruncatingRenderer {
        fn render(&self, original: &[u8], width: u32) -> Result<Vec<u8>> {
            let len = original.len().min(width as usize);
            Ok(original[..len].to_vec())
        }
    }

    async fn setup() -> (TempDir, Database, LocalBlobStore, String) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        db.run_migrations().await.unwrap();
        let blobs = LocalBlobStore::new(temp_dir.path().join("blobs"));

        let user = UserService::register(
            &db,
            RegisterRequest {
                email: Some("u1@test.com".to_string()),
                password: Some("hunter2".to_string()),
            },
        )
        .await
        .unwrap();

        (temp_dir, db, blobs, user.id)
    }

    fn image(name: &str, data: &[u8]) -> NewFile {
        NewFile {
            name: name.to_string(),
            kind: "image".to_string(),
            parent_id: None,
            is_public: false,
            data: Some(Bytes::copy_from_slice(data)),
        }
    }

    #[tokio::test]
    async fn process_writes_all_variants() {
        let (_tmp, db, blobs, owner) = setup().await;
        let payload = vec![7u8; 600];

        let record = FileService::create(&db, &blobs, &owner, image("pic.png", &payload))
            .await
            .unwrap();
        let blob_ref = record.storage_ref.clone().unwrap();

        let job = ThumbnailJob {
            owner_id: owner.clone(),
            file_id: record.id.clone(),
        };
        ThumbnailWorker::process(&db, &blobs, &TruncatingRenderer, &job)
            .await
            .unwrap();

        for width in THUMBNAIL_WIDTHS {
            let variant = blobs.get(&blob_ref, Some(width)).await.unwrap();
            assert_eq!(variant.len(), (width as usize).min(payload.len()));
        }
    }

    #[tokio::test]
    async fn process_is_idempotent() {
        let (_tmp, db, blobs, owner) = setup().await;

        let record = FileService::create(&db, &blobs, &owner, image("pic.png", b"image data"))
            .await
            .unwrap();
        let blob_ref = record.storage_ref.clone().unwrap();

        let job = ThumbnailJob {
            owner_id: owner.clone(),
            file_id: record.id.clone(),
        };
        ThumbnailWorker::process(&db, &blobs, &TruncatingRenderer, &job)
            .await
            .unwrap();
        ThumbnailWorker::process(&db, &blobs, &TruncatingRenderer, &job)
            .await
            .unwrap();

        let variant = blobs.get(&blob_ref, Some(100)).await.unwrap();
        assert_eq!(&variant[..], b"image data");
    }

    #[tokio::test]
    async fn stale_or_non_image_jobs_are_skipped() {
        let (_tmp, db, blobs, owner) = setup().await;

        // Unknown file id
        let job = ThumbnailJob {
            owner_id: owner.clone(),
            file_id: "gone".to_string(),
        };
        ThumbnailWorker::process(&db, &blobs, &TruncatingRenderer, &job)
            .await
            .unwrap();

        // Plain file never gets variants
        let plain = FileService::create(
            &db,
            &blobs,
            &owner,
            NewFile {
                name: "doc.txt".to_string(),
                kind: "file".to_string(),
                parent_id: None,
                is_public: false,
                data: Some(Bytes::from_static(b"text")),
            },
        )
        .await
        .unwrap();

        let job = ThumbnailJob {
            owner_id: owner.clone(),
            file_id: plain.id.clone(),
        };
        ThumbnailWorker::process(&db, &blobs, &TruncatingRenderer, &job)
            .await
            .unwrap();

        let blob_ref = plain.storage_ref.unwrap();
        let err = blobs.get(&blob_ref, Some(100)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn spawned_worker_consumes_queue() {
        let (_tmp, db, blobs, owner) = setup().await;
        let blobs = Arc::new(blobs);

        let record = FileService::create(&db, &*blobs, &owner, image("pic.png", b"queued image"))
            .await
            .unwrap();
        let blob_ref = record.storage_ref.clone().unwrap();

        let handle = ThumbnailWorker::spawn(
            db.clone(),
            blobs.clone(),
            Arc::new(TruncatingRenderer),
        );
        handle
            .send(ThumbnailJob {
                owner_id: owner.clone(),
                file_id: record.id.clone(),
            })
            .await
            .unwrap();

        // Upload returns before variants exist; poll like a caller would.
        let mut ready = false;
        for _ in 0..100 {
            if blobs.get(&blob_ref, Some(100)).await.is_ok() {
                ready = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(ready, "variant never appeared");
    }
}
