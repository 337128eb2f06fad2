use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{FileRecord, User};
use crate::services::{SessionService, UserService};

/// Access gate: composes the session store, the user directory and the
/// file index ownership rules into a single authorization decision.
pub struct AccessGate;

impl AccessGate {
    /// Resolve a session token to its user. A missing token, a missing or
    /// expired session and a dangling user id all collapse to the same
    /// `Unauthorized` outcome.
    pub async fn authorize(db: &Database, token: Option<&str>) -> Result<User> {
        let token = token.ok_or(AppError::Unauthorized)?;

        let user_id = SessionService::resolve(db, token)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let user = UserService::get_by_id(db, &user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(user)
    }

    /// Read access: the owner always, anyone else only when the record is
    /// public. Writes require strict ownership and are checked at the
    /// file index through owner-scoped statements instead.
    pub fn can_access(user_id: &str, record: &FileRecord) -> bool {
        record.user_id == user_id || record.is_public
    }
}
