use axum::{Extension, Json};

use crate::error::{ApiResponse, Result};
use crate::models::{CurrentUser, UserResponse};

/// Get the authorized user's own record
/// GET /api/v1/user/me
pub async fn me(
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    Ok(Json(ApiResponse::success(UserResponse {
        id: current_user.id,
        email: current_user.email,
    })))
}
