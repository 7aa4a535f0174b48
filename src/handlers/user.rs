use axum::{extract::State, Extension, Json};

use crate::error::{ApiResponse, Result};
use crate::models::{CurrentUser, StorageSummary, UserResponse};
use crate::services::UserService;
use crate::AppState;

/// Get current user profile
/// GET /api/v1/user/me
pub async fn get_me(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let profile = UserService::get_profile(&state.db, &current_user.id).await?;
    Ok(Json(ApiResponse::success(profile)))
}

/// Per-category storage usage
/// GET /api/v1/user/storage
pub async fn get_storage_summary(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<StorageSummary>>> {
    let summary =
        UserService::storage_summary(&state.db, &current_user.id, state.config.storage.quota)
            .await?;
    Ok(Json(ApiResponse::success(summary)))
}
