use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Extension, Json,
};

use crate::error::{ApiResponse, Result};
use crate::handlers::file::attachment_response;
use crate::models::{CardListItem, CreateCardRequest, CreatedCard, CurrentUser, PublicCard};
use crate::services::{CardService, FileService};
use crate::AppState;

/// Create a share card
/// POST /api/v1/cards
pub async fn create_card(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<CreateCardRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedCard>>)> {
    let card = CardService::create_card(&state.db, &state.config.cards, &current_user, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with("Card created successfully", card)),
    ))
}

/// List the user's cards
/// GET /api/v1/cards/my
pub async fn list_my_cards(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<CardListItem>>>> {
    let cards = CardService::list_cards(&state.db, &current_user.id).await?;
    Ok(Json(ApiResponse::success(cards)))
}

/// Delete a card
/// DELETE /api/v1/cards/:card_id
pub async fn delete_card(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(card_id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    CardService::delete_card(&state.db, &current_user.id, &card_id).await?;
    Ok(Json(ApiResponse::<()>::success_message("Card deleted")))
}

/// Get public card info
/// GET /api/v1/public/cards/:card_id
pub async fn get_public_card(
    State(state): State<AppState>,
    Path(card_id): Path<String>,
) -> Result<Json<ApiResponse<PublicCard>>> {
    let card = CardService::public_card(&state.db, &card_id).await?;
    Ok(Json(ApiResponse::success(card)))
}

/// Download a file of a public card
/// GET /api/v1/public/cards/:card_id/files/:file_id/download
pub async fn download_public_file(
    State(state): State<AppState>,
    Path((card_id, file_id)): Path<(String, String)>,
) -> Result<Response> {
    let file = CardService::public_file(&state.db, &card_id, &file_id).await?;
    let data = FileService::read_content(state.storage.as_ref(), &file).await?;
    attachment_response(&file, data)
}
