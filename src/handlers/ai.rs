use axum::{extract::State, Json};
use serde_json::Value;

use crate::error::{ApiResponse, Result};
use crate::models::{CardMetadata, FileMetadataRequest, FolderSuggestions};
use crate::AppState;

/// Suggest a card name, description and tags
/// POST /api/v1/ai/card-metadata
pub async fn card_metadata(
    State(state): State<AppState>,
    Json(req): Json<FileMetadataRequest>,
) -> Result<Json<ApiResponse<CardMetadata>>> {
    let metadata = state.gemini.generate_card_metadata(&req.files).await?;
    Ok(Json(ApiResponse::success(metadata)))
}

/// Suggest folders for a set of files
/// POST /api/v1/ai/folder-suggestions
pub async fn folder_suggestions(
    State(state): State<AppState>,
    Json(req): Json<FileMetadataRequest>,
) -> Result<Json<ApiResponse<FolderSuggestions>>> {
    let suggestions = state.gemini.generate_folder_suggestions(&req.files).await?;
    Ok(Json(ApiResponse::success(suggestions)))
}

/// List documents known to the Chat-PDF backend
/// GET /api/v1/chat-pdf/list
pub async fn chat_pdf_list(State(state): State<AppState>) -> Result<Json<ApiResponse<Value>>> {
    let data = state.chat_pdf.list().await?;
    Ok(Json(ApiResponse::success(data)))
}

/// Ask the Chat-PDF backend a question
/// POST /api/v1/chat-pdf/ask
pub async fn chat_pdf_ask(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<ApiResponse<Value>>> {
    let data = state.chat_pdf.ask(&body).await?;
    Ok(Json(ApiResponse::success(data)))
}
