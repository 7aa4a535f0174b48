use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Share card model
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SharedCard {
    pub id: String,
    /// Public slug used in share links
    pub card_id: String,
    pub name: String,
    pub description: String,
    /// JSON array of strings
    #[serde(skip_serializing)]
    pub tags: String,
    pub owner_id: String,
    pub total_size: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl SharedCard {
    pub fn tag_list(&self) -> Vec<String> {
        serde_json::from_str(&self.tags).unwrap_or_default()
    }
}

/// Request to create a card
#[derive(Debug, Deserialize)]
pub struct CreateCardRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub file_ids: Vec<String>,
    pub tags: Option<Vec<String>>,
}

/// Summary returned after creation
#[derive(Debug, Serialize)]
pub struct CreatedCard {
    pub card_id: String,
    pub name: String,
    pub description: String,
}

/// File entry on a public card page
#[derive(Debug, Serialize, FromRow)]
pub struct PublicCardFile {
    pub id: String,
    pub name: String,
    #[sqlx(default)]
    pub url: String,
    pub size: i64,
    #[serde(rename = "type")]
    pub file_type: String,
    pub extension: String,
    pub bucket_file_id: String,
}

/// Public card info (safe to return to anyone with the link)
#[derive(Debug, Serialize)]
pub struct PublicCard {
    pub card_id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub owner_name: String,
    pub files: Vec<PublicCardFile>,
}

/// Card item for the owner's listing
#[derive(Debug, Serialize)]
pub struct CardListItem {
    pub id: String,
    pub card_id: String,
    pub name: String,
    pub description: String,
    pub created_at: String,
    pub file_count: i64,
    pub total_size: i64,
    pub tags: Vec<String>,
}
