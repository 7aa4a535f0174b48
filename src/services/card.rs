use chrono::Utc;
use rand::Rng;
use std::collections::HashSet;
use uuid::Uuid;

use crate::config::CardsConfig;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    CardListItem, CreateCardRequest, CreatedCard, CurrentUser, File, PublicCard, PublicCardFile,
    SharedCard,
};
use crate::services::FileService;

const CARD_ID_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";
const CARD_ID_LEN: usize = 12;
const CARD_ID_ATTEMPTS: usize = 10;

/// Share card service
pub struct CardService;

impl CardService {
    /// Create a card bundling files the owner can see
    pub async fn create_card(
        db: &Database,
        limits: &CardsConfig,
        owner: &CurrentUser,
        req: CreateCardRequest,
    ) -> Result<CreatedCard> {
        Self::create_card_with(db, limits, owner, req, generate_card_id).await
    }

    /// `create_card` with the slug source supplied by the caller
    async fn create_card_with(
        db: &Database,
        limits: &CardsConfig,
        owner: &CurrentUser,
        req: CreateCardRequest,
        mut next_card_id: impl FnMut() -> String,
    ) -> Result<CreatedCard> {
        let name = req.name.trim().to_string();
        let description = req
            .description
            .map(|d| d.trim().to_string())
            .unwrap_or_default();

        let mut seen = HashSet::new();
        let file_ids: Vec<String> = req
            .file_ids
            .into_iter()
            .filter(|id| !id.is_empty() && seen.insert(id.clone()))
            .collect();

        if name.is_empty() || file_ids.is_empty() {
            return Err(AppError::BadRequest("Invalid request body.".to_string()));
        }

        if file_ids.len() > limits.max_files {
            return Err(AppError::BadRequest(format!(
                "A card can hold at most {} files.",
                limits.max_files
            )));
        }

        let mut files: Vec<File> = Vec::with_capacity(file_ids.len());
        for file_id in &file_ids {
            match FileService::get_visible_file(db, owner, file_id).await {
                Ok(file) => files.push(file),
                Err(AppError::NotFound(_)) => {
                    return Err(AppError::NotFound(
                        "One or more files not found.".to_string(),
                    ))
                }
                Err(e) => return Err(e),
            }
        }

        let total_size: i64 = files.iter().map(|f| f.size).sum();
        if total_size as u64 > limits.max_total_size {
            return Err(AppError::BadRequest(format!(
                "Card files exceed the {} MB size limit.",
                limits.max_total_size / (1024 * 1024)
            )));
        }

        let tags = normalize_tags(req.tags.unwrap_or_default());
        let tags_json = serde_json::to_string(&tags)
            .map_err(|e| AppError::Internal(format!("Failed to encode tags: {}", e)))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let mut last_error: Option<sqlx::Error> = None;
        let mut card_id: Option<String> = None;
        for _ in 0..CARD_ID_ATTEMPTS {
            let candidate = next_card_id();

            let mut tx = db.pool().begin().await?;
            let inserted = sqlx::query(
                r#"
                INSERT INTO shared_cards (id, card_id, name, description, tags, owner_id, total_size, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(&candidate)
            .bind(&name)
            .bind(&description)
            .bind(&tags_json)
            .bind(&owner.id)
            .bind(total_size)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => {}
                Err(sqlx::Error::Database(db_err))
                    if db_err
                        .message()
                        .contains("UNIQUE constraint failed: shared_cards.card_id") =>
                {
                    last_error = Some(sqlx::Error::Database(db_err));
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            for (position, file) in files.iter().enumerate() {
                sqlx::query("INSERT INTO card_files (card_id, file_id, position) VALUES (?, ?, ?)")
                    .bind(&id)
                    .bind(&file.id)
                    .bind(position as i64)
                    .execute(&mut *tx)
                    .await?;
            }

            tx.commit().await?;
            card_id = Some(candidate);
            break;
        }

        let card_id = card_id.ok_or_else(|| {
            AppError::Internal(format!(
                "Failed to generate unique card id: {}",
                last_error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            ))
        })?;

        tracing::info!(card_id = %card_id, files = files.len(), "Share card created");
        Ok(CreatedCard {
            card_id,
            name,
            description,
        })
    }

    /// Find a card by its public slug, falling back to the internal id
    pub async fn find_card(db: &Database, card_id: &str) -> Result<SharedCard> {
        let card: Option<SharedCard> =
            sqlx::query_as("SELECT * FROM shared_cards WHERE card_id = ?")
                .bind(card_id)
                .fetch_optional(db.pool())
                .await?;

        if let Some(card) = card {
            return Ok(card);
        }

        sqlx::query_as("SELECT * FROM shared_cards WHERE id = ?")
            .bind(card_id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("Card not found".to_string()))
    }

    /// Card contents as shown to anyone holding the link
    pub async fn public_card(db: &Database, card_id: &str) -> Result<PublicCard> {
        let card = Self::find_card(db, card_id).await?;

        let owner_name: Option<(String,)> =
            sqlx::query_as("SELECT full_name FROM users WHERE id = ?")
                .bind(&card.owner_id)
                .fetch_optional(db.pool())
                .await?;

        let mut files: Vec<PublicCardFile> = sqlx::query_as(
            r#"
            SELECT f.id, f.name, f.size, f.file_type, f.extension, f.bucket_file_id
            FROM card_files cf
            JOIN files f ON f.id = cf.file_id
            WHERE cf.card_id = ?
            ORDER BY cf.position ASC
            "#,
        )
        .bind(&card.id)
        .fetch_all(db.pool())
        .await?;

        for file in &mut files {
            file.url = format!(
                "/api/v1/public/cards/{}/files/{}/download",
                card.card_id, file.id
            );
        }

        Ok(PublicCard {
            tags: card.tag_list(),
            card_id: card.card_id,
            name: card.name,
            description: card.description,
            owner_name: owner_name.map(|o| o.0).unwrap_or_default(),
            files,
        })
    }

    /// A file of the card, for the unauthenticated download route
    pub async fn public_file(db: &Database, card_id: &str, file_id: &str) -> Result<File> {
        let card = Self::find_card(db, card_id).await?;

        let member: Option<(String,)> =
            sqlx::query_as("SELECT file_id FROM card_files WHERE card_id = ? AND file_id = ?")
                .bind(&card.id)
                .bind(file_id)
                .fetch_optional(db.pool())
                .await?;

        if member.is_none() {
            return Err(AppError::NotFound("File not found".to_string()));
        }

        FileService::get_file(db, file_id).await
    }

    /// The owner's cards, newest first
    pub async fn list_cards(db: &Database, owner_id: &str) -> Result<Vec<CardListItem>> {
        let rows: Vec<CardRow> = sqlx::query_as(
            r#"
            SELECT c.*,
                   (SELECT COUNT(*) FROM card_files cf JOIN files f ON f.id = cf.file_id
                    WHERE cf.card_id = c.id) AS file_count,
                   (SELECT COALESCE(SUM(f.size), 0) FROM card_files cf JOIN files f ON f.id = cf.file_id
                    WHERE cf.card_id = c.id) AS present_size
            FROM shared_cards c
            WHERE c.owner_id = ?
            ORDER BY c.created_at DESC, c.id ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CardListItem {
                tags: row.card.tag_list(),
                id: row.card.id,
                card_id: row.card.card_id,
                name: row.card.name,
                description: row.card.description,
                created_at: row.card.created_at,
                file_count: row.file_count,
                total_size: row.present_size,
            })
            .collect())
    }

    /// Delete one of the owner's cards
    pub async fn delete_card(db: &Database, owner_id: &str, card_id: &str) -> Result<()> {
        let card = Self::find_card(db, card_id).await?;
        if card.owner_id != owner_id {
            return Err(AppError::NotFound("Card not found".to_string()));
        }

        sqlx::query("DELETE FROM shared_cards WHERE id = ?")
            .bind(&card.id)
            .execute(db.pool())
            .await?;

        tracing::info!(card_id = %card.card_id, "Share card deleted");
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct CardRow {
    #[sqlx(flatten)]
    card: SharedCard,
    file_count: i64,
    present_size: i64,
}

fn generate_card_id() -> String {
    let mut rng = rand::thread_rng();
    (0..CARD_ID_LEN)
        .map(|_| CARD_ID_ALPHABET[rng.gen_range(0..CARD_ID_ALPHABET.len())] as char)
        .collect()
}

/// Trim, lower-case and dedupe tags, dropping empty ones
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}
