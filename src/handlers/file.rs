use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Extension, Json,
};
use bytes::Bytes;

use crate::error::{ApiResponse, AppError, Result, ValidationError};
use crate::jobs::ThumbnailJob;
use crate::models::{
    CreateFolderRequest, CurrentUser, DownloadQuery, FileQuery, FileResponse, NewFile,
};
use crate::services::FileService;
use crate::AppState;

/// Create a folder
/// POST /api/v1/files
pub async fn create_folder(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<CreateFolderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FileResponse>>)> {
    let file = FileService::create(
        &state.db,
        &*state.blobs,
        &current_user.id,
        NewFile {
            name: req.name,
            kind: "folder".to_string(),
            parent_id: req.parent_id,
            is_public: req.is_public,
            data: None,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(file.into()))))
}

/// Upload a file or image
/// POST /api/v1/files/upload
///
/// Multipart fields: `file` (content, filename used as the default name),
/// `name`, `kind` ("file" or "image"), `parent_id`, `is_public`.
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<FileResponse>>)> {
    let mut data: Option<Bytes> = None;
    let mut file_name: Option<String> = None;
    let mut kind = "file".to_string();
    let mut parent_id: Option<String> = None;
    let mut is_public = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to process multipart: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                if file_name.is_none() {
                    file_name = field.file_name().map(|s| s.to_string());
                }
                data = Some(field.bytes().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read file content: {}", e))
                })?);
            }
            "name" => {
                let text = field.text().await.unwrap_or_default();
                if !text.is_empty() {
                    file_name = Some(text);
                }
            }
            "kind" => {
                let text = field.text().await.unwrap_or_default();
                if !text.is_empty() {
                    kind = text;
                }
            }
            "parent_id" => {
                let text = field.text().await.unwrap_or_default();
                if !text.is_empty() {
                    parent_id = Some(text);
                }
            }
            "is_public" => {
                let text = field.text().await.unwrap_or_default();
                is_public = text == "true" || text == "1";
            }
            _ => {}
        }
    }

    let file = FileService::create(
        &state.db,
        &*state.blobs,
        &current_user.id,
        NewFile {
            name: file_name.unwrap_or_default(),
            kind,
            parent_id,
            is_public,
            data,
        },
    )
    .await?;

    // Fire-and-forget: thumbnail failures never fail the upload.
    if file.kind().is_image() {
        let job = ThumbnailJob {
            owner_id: current_user.id.clone(),
            file_id: file.id.clone(),
        };
        if let Err(e) = state.thumbnails.send(job).await {
            tracing::error!("Failed to enqueue thumbnail job for '{}': {}", file.id, e);
        }
    }

    Ok((StatusCode::CREATED, Json(ApiResponse::success(file.into()))))
}

/// List the caller's files, root level or under a parent, 20 per page
/// GET /api/v1/files?parent_id=xxx&page=0
pub async fn list_files(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<FileQuery>,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>> {
    let files = FileService::list(
        &state.db,
        &current_user.id,
        query.parent_id.as_deref(),
        query.page.unwrap_or(0),
    )
    .await?;

    let files = files.into_iter().map(FileResponse::from).collect();
    Ok(Json(ApiResponse::success(files)))
}

/// Get a specific file (owned or public)
/// GET /api/v1/files/:id
pub async fn get_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<FileResponse>>> {
    let file = FileService::get(&state.db, &current_user.id, &id).await?;
    Ok(Json(ApiResponse::success(file.into())))
}

/// Make a file public
/// PUT /api/v1/files/:id/publish
pub async fn publish_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<FileResponse>>> {
    let file = FileService::set_visibility(&state.db, &current_user.id, &id, true).await?;
    Ok(Json(ApiResponse::success(file.into())))
}

/// Make a file private again
/// PUT /api/v1/files/:id/unpublish
pub async fn unpublish_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<FileResponse>>> {
    let file = FileService::set_visibility(&state.db, &current_user.id, &id, false).await?;
    Ok(Json(ApiResponse::success(file.into())))
}

/// Download blob content, original or a thumbnail variant
/// GET /api/v1/files/:id/download?width=100
pub async fn download_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response> {
    let file = FileService::get(&state.db, &current_user.id, &id).await?;

    if file.kind().is_folder() {
        return Err(ValidationError::FolderHasNoContent.into());
    }

    let blob_ref = file.storage_ref.as_deref().ok_or(AppError::NotFound)?;

    // A not-yet-generated variant reads as NotFound; callers poll until
    // the pipeline catches up.
    let data = state.blobs.get(blob_ref, query.width).await?;

    let fallback_name = file.name.replace(['"', '\\'], "_");
    let encoded_name = urlencoding::encode(&file.name);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, data.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"; filename*=UTF-8''{}",
                fallback_name, encoded_name
            ),
        )
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
}
