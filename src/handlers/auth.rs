use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Duration;

use crate::error::{ApiResponse, AppError, Result};
use crate::middleware::auth::bearer_token;
use crate::models::{LoginRequest, LoginResponse, RegisterRequest, UserResponse};
use crate::services::{SessionService, UserService};
use crate::AppState;

/// Register a new user
/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>)> {
    let user = UserService::register(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

/// Login: exchange a credential pair for an opaque session token
/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>> {
    let user = UserService::verify_credentials(&state.db, &req.email, &req.password).await?;

    let ttl = Duration::hours(state.config.session.ttl_hours as i64);
    let token = SessionService::issue(&state.db, &user.id, ttl).await?;

    Ok(Json(ApiResponse::success(LoginResponse {
        token,
        expires_in: state.config.session.ttl_hours * 3600,
    })))
}

/// Logout: destroy the presented session
/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<()>>> {
    let token = bearer_token(&headers).ok_or(AppError::Unauthorized)?;

    if !SessionService::destroy(&state.db, token).await? {
        return Err(AppError::Unauthorized);
    }

    Ok(Json(ApiResponse::<()>::success_message("Logged out")))
}
