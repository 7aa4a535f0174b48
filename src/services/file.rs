use bytes::Bytes;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    classify, CurrentUser, File, FileListResponse, FileQuery, FileResponse, FileSort, FileType,
};
use crate::services::{FolderService, UserService};
use crate::storage::StorageProvider;

/// Base projection for file reads: the record, its owner's name and its
/// newline-joined shared-with list.
pub(crate) const FILE_SELECT: &str = r#"
    SELECT f.id, f.name, f.file_type, f.extension, f.size, f.mime_type, f.owner_id,
           f.parent_id, f.bucket_file_id, f.created_at, f.updated_at,
           u.full_name AS owner_name,
           (SELECT GROUP_CONCAT(fu.email, char(10)) FROM file_users fu WHERE fu.file_id = f.id) AS shared_with
    FROM files f
    JOIN users u ON u.id = f.owner_id
"#;

const MAX_LIST_LIMIT: i64 = 1000;
const MIB: u64 = 1024 * 1024;

/// File service
pub struct FileService;

impl FileService {
    /// Get a file by ID
    pub async fn get_file(db: &Database, file_id: &str) -> Result<File> {
        let query = format!("{} WHERE f.id = ?", FILE_SELECT);
        sqlx::query_as(&query)
            .bind(file_id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))
    }

    /// Get a file the user owns or has been shared. Anything else reads as missing.
    pub async fn get_visible_file(db: &Database, user: &CurrentUser, file_id: &str) -> Result<File> {
        let file = Self::get_file(db, file_id).await?;
        if !file.is_visible_to(&user.id, &user.email) {
            return Err(AppError::NotFound("File not found".to_string()));
        }
        Ok(file)
    }

    /// Get a file for an owner-only operation
    async fn get_owned_file(
        db: &Database,
        user: &CurrentUser,
        file_id: &str,
        denied: &str,
    ) -> Result<File> {
        let file = Self::get_visible_file(db, user, file_id).await?;
        if file.owner_id != user.id {
            return Err(AppError::Forbidden(denied.to_string()));
        }
        Ok(file)
    }

    /// List files the user owns or that are shared with them
    pub async fn list_files(
        db: &Database,
        user: &CurrentUser,
        query: FileQuery,
    ) -> Result<FileListResponse> {
        let types = Self::parse_types(query.types.as_deref())?;
        let sort = query.sort.as_deref().map(FileSort::parse).unwrap_or_default();

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(FILE_SELECT);
        qb.push(" WHERE (f.owner_id = ")
            .push_bind(user.id.clone())
            .push(" OR EXISTS (SELECT 1 FROM file_users s WHERE s.file_id = f.id AND s.email = ")
            .push_bind(user.email.clone())
            .push("))");

        if let Some(parent_id) = query.parent_id.filter(|p| !p.is_empty()) {
            qb.push(" AND f.parent_id = ").push_bind(parent_id);
        }

        if !types.is_empty() {
            qb.push(" AND f.file_type IN (");
            let mut separated = qb.separated(", ");
            for t in &types {
                separated.push_bind(t.as_str());
            }
            separated.push_unseparated(")");
        }

        if let Some(search) = query.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
            qb.push(" AND f.name LIKE ")
                .push_bind(format!("%{}%", escape_like(&search)))
                .push(" ESCAPE '\\'");
        }

        let collate = if sort.column == "name" { " COLLATE NOCASE" } else { "" };
        let direction = if sort.ascending { "ASC" } else { "DESC" };
        qb.push(format!(
            " ORDER BY f.{}{} {}, f.id ASC",
            sort.column, collate, direction
        ));

        if let Some(limit) = query.limit {
            if limit <= 0 {
                return Err(AppError::BadRequest("Limit must be positive".to_string()));
            }
            qb.push(" LIMIT ").push_bind(limit.min(MAX_LIST_LIMIT));
        }

        let files: Vec<File> = qb.build_query_as().fetch_all(db.pool()).await?;
        let files: Vec<FileResponse> = files.into_iter().map(FileResponse::from).collect();

        Ok(FileListResponse {
            total: files.len(),
            files,
        })
    }

    fn parse_types(types: Option<&str>) -> Result<Vec<FileType>> {
        let Some(types) = types else {
            return Ok(Vec::new());
        };
        types
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| {
                FileType::parse(t)
                    .ok_or_else(|| AppError::BadRequest(format!("Unknown file type: {}", t)))
            })
            .collect()
    }

    /// Store an uploaded file and record it.
    ///
    /// The object is written first; when the record cannot be written the object
    /// is removed again.
    #[allow(clippy::too_many_arguments)]
    pub async fn upload_file(
        db: &Database,
        storage: &dyn StorageProvider,
        limits: &StorageConfig,
        user_id: &str,
        parent_id: Option<String>,
        file_name: String,
        content_type: Option<String>,
        file_path: &Path,
    ) -> Result<FileResponse> {
        let file_name = file_name.trim().to_string();
        if file_name.is_empty() || file_name.contains('/') || file_name.contains('\\') {
            return Err(AppError::BadRequest("Invalid file name".to_string()));
        }

        if let Some(ref pid) = parent_id {
            FolderService::get_owned_folder(db, user_id, pid).await?;
        }

        let metadata = tokio::fs::metadata(file_path).await.map_err(|e| {
            AppError::BadRequest(format!("Failed to read file metadata: {}", e))
        })?;
        let file_size = metadata.len();

        if file_size > limits.max_upload_size {
            return Err(Self::upload_too_large(limits.max_upload_size));
        }

        let used = UserService::used_space(db, user_id).await?;
        if used as u64 + file_size > limits.quota {
            return Err(AppError::PayloadTooLarge("Storage quota exceeded".to_string()));
        }

        let (file_type, extension) = classify(&file_name);
        let mime_type = content_type
            .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
            .or_else(|| mime_guess::from_path(&file_name).first().map(|m| m.to_string()));

        let bucket_file_id = Uuid::new_v4().to_string();
        storage.put_file(&bucket_file_id, file_path).await?;

        let file_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let inserted = sqlx::query(
            r#"
            INSERT INTO files (id, name, file_type, extension, size, mime_type, owner_id, parent_id, bucket_file_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&file_id)
        .bind(&file_name)
        .bind(file_type.as_str())
        .bind(&extension)
        .bind(file_size as i64)
        .bind(&mime_type)
        .bind(user_id)
        .bind(&parent_id)
        .bind(&bucket_file_id)
        .bind(&now)
        .bind(&now)
        .execute(db.pool())
        .await;

        if let Err(e) = inserted {
            if let Err(cleanup) = storage.delete(&bucket_file_id).await {
                tracing::error!(
                    "Failed to remove orphaned object {} after record error: {}",
                    bucket_file_id,
                    cleanup
                );
            }
            return Err(e.into());
        }

        tracing::info!(file_id = %file_id, size = file_size, "File uploaded");
        let file = Self::get_file(db, &file_id).await?;
        Ok(FileResponse::from(file))
    }

    pub fn upload_too_large(max_upload_size: u64) -> AppError {
        AppError::PayloadTooLarge(format!(
            "File limit exceeded. Stay within the limit of {} MB.",
            max_upload_size / MIB
        ))
    }

    /// Read the stored bytes of a file
    pub async fn read_content(storage: &dyn StorageProvider, file: &File) -> Result<Bytes> {
        storage.get(&file.bucket_file_id).await
    }

    /// Rename a file to `name.extension`
    pub async fn rename_file(
        db: &Database,
        user: &CurrentUser,
        file_id: &str,
        name: &str,
        extension: &str,
    ) -> Result<FileResponse> {
        Self::get_owned_file(db, user, file_id, "Only file owner can rename this file").await?;

        let name = name.trim();
        let extension = extension.trim().trim_start_matches('.');
        if name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || extension.contains('/')
            || extension.contains('\\')
        {
            return Err(AppError::BadRequest("Invalid name".to_string()));
        }

        let new_name = if extension.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", name, extension)
        };
        let (file_type, new_extension) = classify(&new_name);

        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE files SET name = ?, file_type = ?, extension = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&new_name)
        .bind(file_type.as_str())
        .bind(&new_extension)
        .bind(&now)
        .bind(file_id)
        .execute(db.pool())
        .await?;

        let file = Self::get_file(db, file_id).await?;
        Ok(FileResponse::from(file))
    }

    /// Replace the list of emails a file is shared with
    pub async fn update_file_users(
        db: &Database,
        user: &CurrentUser,
        file_id: &str,
        emails: Vec<String>,
    ) -> Result<FileResponse> {
        Self::get_owned_file(
            db,
            user,
            file_id,
            "Only file owner can modify sharing settings",
        )
        .await?;

        let mut seen = HashSet::new();
        let mut normalized = Vec::new();
        for email in emails {
            let email = email.trim().to_lowercase();
            if email.is_empty() {
                continue;
            }
            if !email.contains('@') {
                return Err(AppError::BadRequest(format!("Invalid email: {}", email)));
            }
            if email != user.email && seen.insert(email.clone()) {
                normalized.push(email);
            }
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = db.pool().begin().await?;

        sqlx::query("DELETE FROM file_users WHERE file_id = ?")
            .bind(file_id)
            .execute(&mut *tx)
            .await?;
        for email in &normalized {
            sqlx::query("INSERT INTO file_users (file_id, email) VALUES (?, ?)")
                .bind(file_id)
                .bind(email)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("UPDATE files SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(file_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let file = Self::get_file(db, file_id).await?;
        Ok(FileResponse::from(file))
    }

    /// Delete a file record and its stored object
    pub async fn delete_file(
        db: &Database,
        storage: &dyn StorageProvider,
        user: &CurrentUser,
        file_id: &str,
    ) -> Result<()> {
        let file =
            Self::get_owned_file(db, user, file_id, "Only file owner can delete this file").await?;

        sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(file_id)
            .execute(db.pool())
            .await?;

        // The record is gone; a leftover object is only logged.
        if let Err(e) = storage.delete(&file.bucket_file_id).await {
            tracing::warn!(
                "Failed to delete object {} of file {}: {}",
                file.bucket_file_id,
                file_id,
                e
            );
        }

        tracing::info!(file_id = %file_id, "File deleted");
        Ok(())
    }

    /// Move the user's files into a folder, or to the root when `folder_id` is None
    pub async fn move_files(
        db: &Database,
        user_id: &str,
        file_ids: &[String],
        folder_id: Option<&str>,
    ) -> Result<()> {
        if file_ids.is_empty() {
            return Err(AppError::BadRequest("No files selected".to_string()));
        }

        if let Some(fid) = folder_id {
            FolderService::get_owned_folder(db, user_id, fid).await?;
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = db.pool().begin().await?;
        let mut seen = HashSet::new();

        for file_id in file_ids.iter().filter(|id| seen.insert(id.as_str())) {
            let result = sqlx::query(
                "UPDATE files SET parent_id = ?, updated_at = ? WHERE id = ? AND owner_id = ?",
            )
            .bind(folder_id)
            .bind(&now)
            .bind(file_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(AppError::NotFound("One or more files not found.".to_string()));
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Escape LIKE wildcards so the search term matches literally
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;
    use crate::storage::LocalStorage;

    fn current(id: &str, email: &str) -> CurrentUser {
        CurrentUser {
            id: id.to_string(),
            email: email.to_string(),
            full_name: "Test".to_string(),
        }
    }

    fn names(list: &FileListResponse) -> Vec<&str> {
        list.files.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[tokio::test]
    async fn test_list_filters_and_sort() {
        let db = testing::db().await;
        let uid = testing::seed_user(&db, "l@example.com").await;
        let user = current(&uid, "l@example.com");
        let folder = FolderService::create_folder(
            &db,
            &uid,
            crate::models::CreateFolderRequest {
                name: "Docs".to_string(),
                parent_id: None,
            },
        )
        .await
        .unwrap();

        testing::seed_file(&db, &uid, "beta.pdf", 300, Some(&folder.id)).await;
        testing::seed_file(&db, &uid, "Alpha.png", 100, None).await;
        testing::seed_file(&db, &uid, "gamma_report.txt", 200, Some(&folder.id)).await;

        let all = FileService::list_files(
            &db,
            &user,
            FileQuery {
                sort: Some("name-asc".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(names(&all), ["Alpha.png", "beta.pdf", "gamma_report.txt"]);
        assert_eq!(all.total, 3);

        let docs = FileService::list_files(
            &db,
            &user,
            FileQuery {
                types: Some("document".to_string()),
                sort: Some("size-desc".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(names(&docs), ["beta.pdf", "gamma_report.txt"]);

        let in_folder = FileService::list_files(
            &db,
            &user,
            FileQuery {
                parent_id: Some(folder.id.clone()),
                search: Some("REPORT".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(names(&in_folder), ["gamma_report.txt"]);

        let limited = FileService::list_files(
            &db,
            &user,
            FileQuery {
                sort: Some("name-desc".to_string()),
                limit: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(names(&limited), ["gamma_report.txt"]);

        let literal = FileService::list_files(
            &db,
            &user,
            FileQuery {
                search: Some("_".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(names(&literal), ["gamma_report.txt"]);
    }

    #[tokio::test]
    async fn test_unknown_type_rejected() {
        let db = testing::db().await;
        let uid = testing::seed_user(&db, "t@example.com").await;
        let result = FileService::list_files(
            &db,
            &current(&uid, "t@example.com"),
            FileQuery {
                types: Some("image,spreadsheet".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_sharing_controls_visibility() {
        let db = testing::db().await;
        let owner_id = testing::seed_user(&db, "owner@example.com").await;
        let friend_id = testing::seed_user(&db, "friend@example.com").await;
        let owner = current(&owner_id, "owner@example.com");
        let friend = current(&friend_id, "friend@example.com");
        let file_id = testing::seed_file(&db, &owner_id, "plan.pdf", 10, None).await;

        let before = FileService::list_files(&db, &friend, FileQuery::default()).await.unwrap();
        assert_eq!(before.total, 0);

        let updated = FileService::update_file_users(
            &db,
            &owner,
            &file_id,
            vec![
                " Friend@Example.com ".to_string(),
                "friend@example.com".to_string(),
                "owner@example.com".to_string(),
                "".to_string(),
            ],
        )
        .await
        .unwrap();
        assert_eq!(updated.users, vec!["friend@example.com"]);

        let after = FileService::list_files(&db, &friend, FileQuery::default()).await.unwrap();
        assert_eq!(names(&after), ["plan.pdf"]);
        assert_eq!(after.files[0].owner_name, "owner");

        let err = FileService::update_file_users(&db, &friend, &file_id, vec![]).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(msg) if msg.contains("Only file owner")));

        let err = FileService::update_file_users(&db, &owner, &file_id, vec!["nope".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_rename() {
        let db = testing::db().await;
        let uid = testing::seed_user(&db, "r@example.com").await;
        let user = current(&uid, "r@example.com");
        let file_id = testing::seed_file(&db, &uid, "draft.txt", 1, None).await;

        let renamed = FileService::rename_file(&db, &user, &file_id, "final", ".md").await.unwrap();
        assert_eq!(renamed.name, "final.md");
        assert_eq!(renamed.extension, "md");

        let renamed = FileService::rename_file(&db, &user, &file_id, "photo", "PNG").await.unwrap();
        assert_eq!(renamed.name, "photo.PNG");
        assert_eq!(renamed.file_type, "image");

        let bare = FileService::rename_file(&db, &user, &file_id, "README", "").await.unwrap();
        assert_eq!(bare.name, "README");

        assert!(FileService::rename_file(&db, &user, &file_id, "a/b", "txt").await.is_err());

        let stranger = current("someone", "someone@example.com");
        assert!(matches!(
            FileService::rename_file(&db, &stranger, &file_id, "x", "txt").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_move_files() {
        let db = testing::db().await;
        let uid = testing::seed_user(&db, "mv@example.com").await;
        let other = testing::seed_user(&db, "other@example.com").await;
        let folder = FolderService::create_folder(
            &db,
            &uid,
            crate::models::CreateFolderRequest {
                name: "Target".to_string(),
                parent_id: None,
            },
        )
        .await
        .unwrap();
        let a = testing::seed_file(&db, &uid, "a.txt", 1, None).await;
        let b = testing::seed_file(&db, &uid, "b.txt", 1, None).await;
        let foreign = testing::seed_file(&db, &other, "c.txt", 1, None).await;

        FileService::move_files(&db, &uid, &[a.clone(), b.clone(), a.clone()], Some(&folder.id))
            .await
            .unwrap();
        assert_eq!(
            FileService::get_file(&db, &a).await.unwrap().parent_id.as_deref(),
            Some(folder.id.as_str())
        );

        // one foreign id rolls back the whole move
        let err = FileService::move_files(&db, &uid, &[a.clone(), foreign], None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(FileService::get_file(&db, &a).await.unwrap().parent_id.is_some());

        FileService::move_files(&db, &uid, &[b.clone()], None).await.unwrap();
        assert!(FileService::get_file(&db, &b).await.unwrap().parent_id.is_none());
    }

    #[tokio::test]
    async fn test_upload_download_delete() {
        let db = testing::db().await;
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("bucket"));
        let limits = StorageConfig::default();
        let uid = testing::seed_user(&db, "up@example.com").await;
        let user = current(&uid, "up@example.com");

        let tmp = dir.path().join("incoming");
        tokio::fs::write(&tmp, b"%PDF-1.7 data").await.unwrap();

        let uploaded = FileService::upload_file(
            &db,
            &storage,
            &limits,
            &uid,
            None,
            "Contract.PDF".to_string(),
            None,
            &tmp,
        )
        .await
        .unwrap();
        assert_eq!(uploaded.file_type, "document");
        assert_eq!(uploaded.extension, "pdf");
        assert_eq!(uploaded.size, 13);
        assert_eq!(uploaded.mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(uploaded.url, format!("/api/v1/files/{}/download", uploaded.id));

        let file = FileService::get_visible_file(&db, &user, &uploaded.id).await.unwrap();
        let bytes = FileService::read_content(&storage, &file).await.unwrap();
        assert_eq!(&bytes[..], b"%PDF-1.7 data");

        FileService::delete_file(&db, &storage, &user, &uploaded.id).await.unwrap();
        assert!(!storage.exists(&uploaded.bucket_file_id).await.unwrap());
        assert!(matches!(
            FileService::get_file(&db, &uploaded.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_limits() {
        let db = testing::db().await;
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("bucket"));
        let uid = testing::seed_user(&db, "lim@example.com").await;

        let tmp = dir.path().join("incoming");
        tokio::fs::write(&tmp, vec![0u8; 64]).await.unwrap();

        let limits = StorageConfig {
            max_upload_size: 32,
            ..StorageConfig::default()
        };
        let err = FileService::upload_file(
            &db, &storage, &limits, &uid, None, "big.bin".to_string(), None, &tmp,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));

        testing::seed_file(&db, &uid, "existing.bin", 100, None).await;
        let limits = StorageConfig {
            quota: 128,
            ..StorageConfig::default()
        };
        let err = FileService::upload_file(
            &db, &storage, &limits, &uid, None, "more.bin".to_string(), None, &tmp,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(msg) if msg.contains("quota")));
    }

    #[tokio::test]
    async fn test_upload_into_foreign_folder_rejected() {
        let db = testing::db().await;
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("bucket"));
        let alice = testing::seed_user(&db, "alice@example.com").await;
        let bob = testing::seed_user(&db, "bob@example.com").await;
        let folder = FolderService::create_folder(
            &db,
            &alice,
            crate::models::CreateFolderRequest {
                name: "Alice".to_string(),
                parent_id: None,
            },
        )
        .await
        .unwrap();

        let tmp = dir.path().join("incoming");
        tokio::fs::write(&tmp, b"x").await.unwrap();
        let err = FileService::upload_file(
            &db,
            &storage,
            &StorageConfig::default(),
            &bob,
            Some(folder.id),
            "x.txt".to_string(),
            None,
            &tmp,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
