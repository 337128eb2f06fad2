use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::Session;

/// Session store: opaque high-entropy tokens with expiry. The token itself
/// never touches the database, only its SHA-256.
pub struct SessionService;

impl SessionService {
    /// Issue a new session token for a user
    pub async fn issue(db: &Database, user_id: &str, ttl: Duration) -> Result<String> {
        let token = Uuid::new_v4().to_string();
        let token_hash = Self::hash_token(&token);

        let id = Uuid::new_v4().to_string();
        let expires_at = (Utc::now() + ttl).to_rfc3339();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(&token_hash)
        .bind(&expires_at)
        .bind(&now)
        .execute(db.pool())
        .await?;

        Ok(token)
    }

    /// Resolve a token to its user id, or `None` when the session is absent
    /// or expired. Expired rows are reaped on the way out.
    pub async fn resolve(db: &Database, token: &str) -> Result<Option<String>> {
        let token_hash = Self::hash_token(token);

        let session: Option<Session> =
            sqlx::query_as("SELECT * FROM sessions WHERE token_hash = ?")
                .bind(&token_hash)
                .fetch_optional(db.pool())
                .await?;

        let Some(session) = session else {
            return Ok(None);
        };

        let expires_at = chrono::DateTime::parse_from_rfc3339(&session.expires_at)
            .map_err(|_| AppError::Internal("Invalid session expiry format".to_string()))?;

        if expires_at < Utc::now() {
            sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(&session.id)
                .execute(db.pool())
                .await?;
            return Ok(None);
        }

        Ok(Some(session.user_id))
    }

    /// Destroy a session. Returns whether a live session was removed.
    pub async fn destroy(db: &Database, token: &str) -> Result<bool> {
        let token_hash = Self::hash_token(token);

        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(&token_hash)
            .execute(db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Hash token for storage
    fn hash_token(token: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegisterRequest;
    use crate::services::UserService;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Database, String) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        db.run_migrations().await.unwrap();

        let user = UserService::register(
            &db,
            RegisterRequest {
                email: Some("a@b.com".to_string()),
                password: Some("hunter2".to_string()),
            },
        )
        .await
        .unwrap();

        (temp_dir, db, user.id)
    }

    #[tokio::test]
    async fn issue_and_resolve() {
        let (_tmp, db, user_id) = setup().await;

        let token = SessionService::issue(&db, &user_id, Duration::hours(24))
            .await
            .unwrap();
        let resolved = SessionService::resolve(&db, &token).await.unwrap();

        assert_eq!(resolved.as_deref(), Some(user_id.as_str()));
    }

    #[tokio::test]
    async fn unknown_token_resolves_to_none() {
        let (_tmp, db, _user_id) = setup().await;

        let resolved = SessionService::resolve(&db, "no-such-token").await.unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn expired_session_resolves_to_none() {
        let (_tmp, db, user_id) = setup().await;

        let token = SessionService::issue(&db, &user_id, Duration::hours(-1))
            .await
            .unwrap();
        let resolved = SessionService::resolve(&db, &token).await.unwrap();

        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn destroy_invalidates_token() {
        let (_tmp, db, user_id) = setup().await;

        let token = SessionService::issue(&db, &user_id, Duration::hours(24))
            .await
            .unwrap();

        assert!(SessionService::destroy(&db, &token).await.unwrap());
        assert!(!SessionService::destroy(&db, &token).await.unwrap());
        assert!(SessionService::resolve(&db, &token).await.unwrap().is_none());
    }
}
