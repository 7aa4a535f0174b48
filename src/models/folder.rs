use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Folder model
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub parent_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Path item for breadcrumb
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathItem {
    pub id: String,
    pub name: String,
}

/// Create folder request
#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    pub parent_id: Option<String>,
}

/// Folder query parameters
#[derive(Debug, Default, Deserialize)]
pub struct FolderQuery {
    pub parent_id: Option<String>,
}
