use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

use crate::error::{ApiResponse, Result};
use crate::models::{CreateFolderRequest, CurrentUser, Folder, FolderQuery, PathItem};
use crate::services::FolderService;
use crate::AppState;

/// List folders under a parent, or at the root
/// GET /api/v1/folders?parent_id=xxx
pub async fn list_folders(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<FolderQuery>,
) -> Result<Json<ApiResponse<Vec<Folder>>>> {
    let parent_id = query.parent_id.as_deref().filter(|p| !p.is_empty());
    let folders = FolderService::list_folders(&state.db, &current_user.id, parent_id).await?;
    Ok(Json(ApiResponse::success(folders)))
}

/// Create a folder
/// POST /api/v1/folders
pub async fn create_folder(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<CreateFolderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Folder>>)> {
    let folder = FolderService::create_folder(&state.db, &current_user.id, req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(folder))))
}

/// Breadcrumb from the root to a folder
/// GET /api/v1/folders/:id/path
pub async fn folder_path(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<PathItem>>>> {
    let path = FolderService::folder_path(&state.db, &current_user.id, &id).await?;
    Ok(Json(ApiResponse::success(path)))
}

/// Delete an empty folder
/// DELETE /api/v1/folders/:id
pub async fn delete_folder(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    FolderService::delete_folder(&state.db, &current_user.id, &id).await?;
    Ok(Json(ApiResponse::<()>::success_message("Folder deleted")))
}
