use chrono::Utc;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result, ValidationError};
use crate::models::{FileKind, FileRecord, NewFile};
use crate::services::AccessGate;
use crate::storage::BlobStore;

/// Listing page size
pub const PAGE_SIZE: u32 = 20;

/// File index: the hierarchical metadata store.
pub struct FileService;

impl FileService {
    /// Create a folder or a content record.
    ///
    /// For file/image kinds the payload goes to the blob store first; the
    /// metadata row is only inserted once the blob write succeeded. A blob
    /// written without a committed row is an orphan to be reconciled out of
    /// band, never an inconsistent index.
    pub async fn create(
        db: &Database,
        blobs: &dyn BlobStore,
        owner_id: &str,
        new: NewFile,
    ) -> Result<FileRecord> {
        if new.name.is_empty() {
            return Err(ValidationError::MissingName.into());
        }

        let kind = FileKind::parse(&new.kind).ok_or(ValidationError::InvalidKind)?;

        if !kind.is_folder() && new.data.is_none() {
            return Err(ValidationError::MissingContent.into());
        }

        // Parent must exist, be a folder, and belong to the same owner.
        // Checked at creation time only; records are never reparented.
        if let Some(ref parent_id) = new.parent_id {
            let parent: Option<FileRecord> =
                sqlx::query_as("SELECT * FROM files WHERE id = ? AND user_id = ?")
                    .bind(parent_id)
                    .bind(owner_id)
                    .fetch_optional(db.pool())
                    .await?;

            let parent = parent.ok_or(ValidationError::ParentNotFound)?;
            if !parent.kind().is_folder() {
                return Err(ValidationError::ParentNotFolder.into());
            }
        }

        let storage_ref = match new.data {
            Some(data) if !kind.is_folder() => Some(blobs.put(data).await?),
            _ => None,
        };

        let file_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let inserted = sqlx::query(
            r#"
            INSERT INTO files (id, user_id, parent_id, name, kind, is_public, storage_ref, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&file_id)
        .bind(owner_id)
        .bind(&new.parent_id)
        .bind(&new.name)
        .bind(kind.as_str())
        .bind(new.is_public)
        .bind(&storage_ref)
        .bind(&now)
        .execute(db.pool())
        .await;

        if let Err(e) = inserted {
            if let Some(ref orphan) = storage_ref {
                tracing::warn!("Orphaned blob {} after failed metadata insert", orphan);
            }
            return Err(e.into());
        }

        let file: FileRecord = sqlx::query_as("SELECT * FROM files WHERE id = ?")
            .bind(&file_id)
            .fetch_one(db.pool())
            .await?;

        Ok(file)
    }

    /// Get a record visible to the caller: owned or public. Absent and
    /// unauthorized both come back as `NotFound`.
    pub async fn get(db: &Database, caller_id: &str, file_id: &str) -> Result<FileRecord> {
        let file: Option<FileRecord> = sqlx::query_as("SELECT * FROM files WHERE id = ?")
            .bind(file_id)
            .fetch_optional(db.pool())
            .await?;

        match file {
            Some(f) if AccessGate::can_access(caller_id, &f) => Ok(f),
            _ => Err(AppError::NotFound),
        }
    }

    /// List the caller's own records under a parent (root level when no
    /// parent is given), in insertion order. A page past the end is an
    /// empty sequence, never an error.
    pub async fn list(
        db: &Database,
        owner_id: &str,
        parent_id: Option<&str>,
        page: u32,
    ) -> Result<Vec<FileRecord>> {
        let limit = PAGE_SIZE as i64;
        let offset = page as i64 * limit;

        let files: Vec<FileRecord> = if let Some(pid) = parent_id {
            sqlx::query_as(
                "SELECT * FROM files WHERE user_id = ? AND parent_id = ? ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?",
            )
            .bind(owner_id)
            .bind(pid)
            .bind(limit)
            .bind(offset)
            .fetch_all(db.pool())
            .await?
        } else {
            sqlx::query_as(
                "SELECT * FROM files WHERE user_id = ? AND parent_id IS NULL ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?",
            )
            .bind(owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(db.pool())
            .await?
        };

        Ok(files)
    }

    /// Flip visibility with a single owner-scoped update. Zero matched rows
    /// means foreign, unowned or absent, all reported as `NotFound`.
    /// Idempotent: setting the current value succeeds unchanged.
    pub async fn set_visibility(
        db: &Database,
        owner_id: &str,
        file_id: &str,
        is_public: bool,
    ) -> Result<FileRecord> {
        let result = sqlx::query("UPDATE files SET is_public = ? WHERE id = ? AND user_id = ?")
            .bind(is_public)
            .bind(file_id)
            .bind(owner_id)
            .execute(db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        let file: FileRecord = sqlx::query_as("SELECT * FROM files WHERE id = ? AND user_id = ?")
            .bind(file_id)
            .bind(owner_id)
            .fetch_one(db.pool())
            .await?;

        Ok(file)
    }
}
