use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Extension, Json,
};
use bytes::Bytes;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{ApiResponse, AppError, Result};
use crate::models::{
    CurrentUser, File, FileListResponse, FileQuery, FileResponse, MoveFilesRequest,
    RenameFileRequest, UpdateFileUsersRequest,
};
use crate::services::FileService;
use crate::AppState;

/// List visible files
/// GET /api/v1/files?types=image,video&search=x&sort=name-asc&parent_id=xxx&limit=10
pub async fn list_files(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<FileQuery>,
) -> Result<Json<ApiResponse<FileListResponse>>> {
    let files = FileService::list_files(&state.db, &current_user, query).await?;
    Ok(Json(ApiResponse::success(files)))
}

/// Get a specific file
/// GET /api/v1/files/:id
pub async fn get_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<FileResponse>>> {
    let file = FileService::get_visible_file(&state.db, &current_user, &id).await?;
    Ok(Json(ApiResponse::success(FileResponse::from(file))))
}

/// Upload a file
/// POST /api/v1/files/upload
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<FileResponse>>)> {
    let max_size = state.config.storage.max_upload_size;
    let temp_dir = state.config.storage.upload_temp_dir();
    let mut temp_file_path: Option<PathBuf> = None;
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut parent_id: Option<String> = None;

    let received = async {
        while let Some(mut field) = multipart.next_field().await.map_err(|e| {
            AppError::BadRequest(format!("Failed to process multipart: {}", e))
        })? {
            let name = field.name().unwrap_or("").to_string();

            match name.as_str() {
                "file" => {
                    if temp_file_path.is_some() {
                        return Err(AppError::BadRequest("Only one file per upload".to_string()));
                    }
                    file_name = field.file_name().map(|s| s.to_string());
                    content_type = field.content_type().map(|s| s.to_string());

                    let temp_path = temp_dir.join(format!("cardshare_upload_{}", Uuid::new_v4()));
                    temp_file_path = Some(temp_path.clone());

                    let mut file = tokio::fs::File::create(&temp_path).await.map_err(|e| {
                        AppError::Internal(format!("Failed to create temp file: {}", e))
                    })?;

                    let mut written: u64 = 0;
                    while let Some(chunk) = field.chunk().await.map_err(|e| {
                        AppError::BadRequest(format!("Failed to read file chunk: {}", e))
                    })? {
                        written += chunk.len() as u64;
                        if written > max_size {
                            return Err(FileService::upload_too_large(max_size));
                        }
                        file.write_all(&chunk).await.map_err(|e| {
                            AppError::Internal(format!("Failed to write to temp file: {}", e))
                        })?;
                    }

                    file.flush().await.map_err(|e| {
                        AppError::Internal(format!("Failed to flush temp file: {}", e))
                    })?;
                }
                "parent_id" | "folder_id" => {
                    let text = field.text().await.map_err(|e| {
                        AppError::BadRequest(format!("Failed to read field {}: {}", name, e))
                    })?;
                    if !text.is_empty() {
                        parent_id = Some(text);
                    }
                }
                _ => {}
            }
        }
        Ok::<(), AppError>(())
    }
    .await;

    let result = match (received, temp_file_path.as_ref(), file_name) {
        (Err(e), _, _) => Err(e),
        (Ok(()), None, _) => Err(AppError::BadRequest("No file provided".to_string())),
        (Ok(()), Some(_), None) => Err(AppError::BadRequest("No file name provided".to_string())),
        (Ok(()), Some(temp_path), Some(file_name)) => {
            FileService::upload_file(
                &state.db,
                state.storage.as_ref(),
                &state.config.storage,
                &current_user.id,
                parent_id,
                file_name,
                content_type,
                temp_path,
            )
            .await
        }
    };

    // Cleanup temp file
    if let Some(temp_path) = temp_file_path {
        if let Err(e) = tokio::fs::remove_file(&temp_path).await {
            tracing::error!("Failed to remove temp file {:?}: {}", temp_path, e);
        }
    }

    let file = result?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(file))))
}

/// Download a file
/// GET /api/v1/files/:id/download
pub async fn download_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response> {
    let file = FileService::get_visible_file(&state.db, &current_user, &id).await?;
    let data = FileService::read_content(state.storage.as_ref(), &file).await?;
    attachment_response(&file, data)
}

/// Build an attachment response carrying the file's bytes
pub fn attachment_response(file: &File, data: Bytes) -> Result<Response> {
    let fallback_name = file.name.replace(['"', '\\'], "_");
    let encoded_name = urlencoding::encode(&file.name);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.content_type())
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

/// Rename a file
/// PATCH /api/v1/files/:id
pub async fn rename_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<RenameFileRequest>,
) -> Result<Json<ApiResponse<FileResponse>>> {
    let file =
        FileService::rename_file(&state.db, &current_user, &id, &req.name, &req.extension).await?;
    Ok(Json(ApiResponse::success(file)))
}

/// Replace the shared-with list
/// PUT /api/v1/files/:id/users
pub async fn update_file_users(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateFileUsersRequest>,
) -> Result<Json<ApiResponse<FileResponse>>> {
    let file = FileService::update_file_users(&state.db, &current_user, &id, req.emails).await?;
    Ok(Json(ApiResponse::success(file)))
}

/// Delete a file
/// DELETE /api/v1/files/:id
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    FileService::delete_file(&state.db, state.storage.as_ref(), &current_user, &id).await?;
    Ok(Json(ApiResponse::<()>::success_message("File deleted")))
}

/// Move files into a folder, or to the root
/// POST /api/v1/files/move
pub async fn move_files(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<MoveFilesRequest>,
) -> Result<Json<ApiResponse<()>>> {
    FileService::move_files(
        &state.db,
        &current_user.id,
        &req.file_ids,
        req.folder_id.as_deref().filter(|f| !f.is_empty()),
    )
    .await?;
    Ok(Json(ApiResponse::<()>::success_message("Files moved")))
}
