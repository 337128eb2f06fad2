use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use rand::rngs::OsRng;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{RegisterRequest, User, UserResponse};

/// User directory: registration and credential checks.
pub struct UserService;

impl UserService {
    /// Register a new user
    pub async fn register(db: &Database, req: RegisterRequest) -> Result<UserResponse> {
        let email = req
            .email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::BadRequest("Missing email".to_string()))?;
        let password = req
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::BadRequest("Missing password".to_string()))?;

        // Unique email
        let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(db.pool())
            .await?;

        if existing.is_some() {
            return Err(AppError::Conflict("Already exist".to_string()));
        }

        let password_hash = Self::hash_password(&password)?;

        let user_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&user_id)
        .bind(&email)
        .bind(&password_hash)
        .bind(&now)
        .execute(db.pool())
        .await?;

        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&user_id)
            .fetch_one(db.pool())
            .await?;

        Ok(UserResponse::from(user))
    }

    /// Verify a credential pair. An unknown email and a wrong password are
    /// indistinguishable to the caller.
    pub async fn verify_credentials(db: &Database, email: &str, password: &str) -> Result<User> {
        let user: User = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(db.pool())
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !Self::verify_password(password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        Ok(user)
    }

    /// Get a user by id
    pub async fn get_by_id(db: &Database, user_id: &str) -> Result<Option<User>> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(db.pool())
            .await?;

        Ok(user)
    }

    /// Hash password using Argon2
    fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?
            .to_string();

        Ok(password_hash)
    }

    /// Verify password against hash
    fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup_db() -> (TempDir, Database) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        db.run_migrations().await.unwrap();
        (temp_dir, db)
    }

    fn req(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    #[tokio::test]
    async fn register_and_verify() {
        let (_tmp, db) = setup_db().await;

        let user = UserService::register(&db, req("a@b.com", "hunter2"))
            .await
            .unwrap();
        assert_eq!(user.email, "a@b.com");

        let verified = UserService::verify_credentials(&db, "a@b.com", "hunter2")
            .await
            .unwrap();
        assert_eq!(verified.id, user.id);
    }

    #[tokio::test]
    async fn register_requires_email_and_password() {
        let (_tmp, db) = setup_db().await;

        let err = UserService::register(
            &db,
            RegisterRequest {
                email: None,
                password: Some("x".to_string()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Missing email"));

        let err = UserService::register(
            &db,
            RegisterRequest {
                email: Some("a@b.com".to_string()),
                password: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Missing password"));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let (_tmp, db) = setup_db().await;

        UserService::register(&db, req("a@b.com", "one"))
            .await
            .unwrap();
        let err = UserService::register(&db, req("a@b.com", "two"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn bad_credentials_merge_to_unauthorized() {
        let (_tmp, db) = setup_db().await;
        UserService::register(&db, req("a@b.com", "hunter2"))
            .await
            .unwrap();

        let wrong_password = UserService::verify_credentials(&db, "a@b.com", "nope")
            .await
            .unwrap_err();
        let unknown_email = UserService::verify_credentials(&db, "z@b.com", "hunter2")
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AppError::Unauthorized));
        assert!(matches!(unknown_email, AppError::Unauthorized));
    }
}
