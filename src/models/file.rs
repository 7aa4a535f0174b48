use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Coarse file category used for filtering and usage stats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Document,
    Image,
    Video,
    Audio,
    Other,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Document => "document",
            FileType::Image => "image",
            FileType::Video => "video",
            FileType::Audio => "audio",
            FileType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "document" => Some(FileType::Document),
            "image" => Some(FileType::Image),
            "video" => Some(FileType::Video),
            "audio" => Some(FileType::Audio),
            "other" => Some(FileType::Other),
            _ => None,
        }
    }

    fn from_extension(ext: &str) -> Self {
        match ext {
            "pdf" | "doc" | "docx" | "txt" | "xls" | "xlsx" | "csv" | "rtf" | "ods" | "ppt"
            | "odp" | "md" | "html" | "htm" | "epub" | "pages" | "fig" | "psd" | "ai"
            | "indd" | "xd" | "sketch" | "afdesign" | "afphoto" => FileType::Document,
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "svg" | "webp" => FileType::Image,
            "mp4" | "avi" | "mov" | "mkv" | "webm" => FileType::Video,
            "mp3" | "wav" | "ogg" | "flac" => FileType::Audio,
            _ => FileType::Other,
        }
    }
}

/// Split a file name into its category and lower-cased extension
pub fn classify(name: &str) -> (FileType, String) {
    let extension = match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    };
    (FileType::from_extension(&extension), extension)
}

/// File record joined with its owner's name and shared-with list
#[derive(Debug, Clone, FromRow)]
pub struct File {
    pub id: String,
    pub name: String,
    pub file_type: String,
    pub extension: String,
    pub size: i64,
    pub mime_type: Option<String>,
    pub owner_id: String,
    pub parent_id: Option<String>,
    pub bucket_file_id: String,
    pub created_at: String,
    pub updated_at: String,
    pub owner_name: String,
    /// Newline-separated emails
    pub shared_with: Option<String>,
}

impl File {
    pub fn users(&self) -> Vec<String> {
        self.shared_with
            .as_deref()
            .map(|s| s.split('\n').filter(|e| !e.is_empty()).map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn is_visible_to(&self, user_id: &str, email: &str) -> bool {
        self.owner_id == user_id || self.users().iter().any(|e| e == email)
    }

    pub fn content_type(&self) -> String {
        self.mime_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&self.name)
                .first_or_octet_stream()
                .to_string()
        })
    }
}

/// File as returned to the owner or a shared-with user
#[derive(Debug, Clone, Serialize)]
pub struct FileResponse {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: String,
    pub extension: String,
    pub size: i64,
    pub mime_type: Option<String>,
    pub owner_id: String,
    pub owner_name: String,
    pub users: Vec<String>,
    pub parent_id: Option<String>,
    pub bucket_file_id: String,
    pub url: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<File> for FileResponse {
    fn from(file: File) -> Self {
        let users = file.users();
        Self {
            url: format!("/api/v1/files/{}/download", file.id),
            id: file.id,
            name: file.name,
            file_type: file.file_type,
            extension: file.extension,
            size: file.size,
            mime_type: file.mime_type,
            owner_id: file.owner_id,
            owner_name: file.owner_name,
            users,
            parent_id: file.parent_id,
            bucket_file_id: file.bucket_file_id,
            created_at: file.created_at,
            updated_at: file.updated_at,
        }
    }
}

/// File list response
#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<FileResponse>,
    pub total: usize,
}

/// Rename file request; the stored name becomes `name.extension`
#[derive(Debug, Deserialize)]
pub struct RenameFileRequest {
    pub name: String,
    #[serde(default)]
    pub extension: String,
}

/// Replace the shared-with list
#[derive(Debug, Deserialize)]
pub struct UpdateFileUsersRequest {
    pub emails: Vec<String>,
}

/// Move files into a folder (root when `folder_id` is absent)
#[derive(Debug, Deserialize)]
pub struct MoveFilesRequest {
    pub file_ids: Vec<String>,
    pub folder_id: Option<String>,
}

/// File query parameters
#[derive(Debug, Default, Deserialize)]
pub struct FileQuery {
    /// Comma-separated categories, e.g. `image,video`
    pub types: Option<String>,
    pub search: Option<String>,
    /// `<field>-<asc|desc>`
    pub sort: Option<String>,
    pub parent_id: Option<String>,
    pub limit: Option<i64>,
}

/// Column and direction a file listing is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSort {
    pub column: &'static str,
    pub ascending: bool,
}

impl Default for FileSort {
    fn default() -> Self {
        Self {
            column: "created_at",
            ascending: false,
        }
    }
}

impl FileSort {
    /// Parse `<field>-<asc|desc>`; unknown fields fall back to the default order
    pub fn parse(sort: &str) -> Self {
        let (field, order) = sort.rsplit_once('-').unwrap_or((sort, "desc"));
        let column = match field {
            "name" => "name",
            "size" => "size",
            "date" | "$createdAt" | "created_at" => "created_at",
            "$updatedAt" | "updated_at" => "updated_at",
            _ => return Self::default(),
        };
        Self {
            column,
            ascending: order.eq_ignore_ascii_case("asc"),
        }
    }
}
