use chrono::Utc;
use std::collections::HashSet;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{CreateFolderRequest, Folder, PathItem};

/// Upper bound on breadcrumb depth
const MAX_PATH_DEPTH: usize = 64;

/// Folder service
pub struct FolderService;

impl FolderService {
    /// Get a folder by ID
    pub async fn get_folder(db: &Database, folder_id: &str) -> Result<Folder> {
        sqlx::query_as("SELECT * FROM folders WHERE id = ?")
            .bind(folder_id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("Folder not found".to_string()))
    }

    /// Get a folder the user owns. Other users' folders read as missing.
    pub async fn get_owned_folder(db: &Database, user_id: &str, folder_id: &str) -> Result<Folder> {
        let folder = Self::get_folder(db, folder_id).await?;
        if folder.owner_id != user_id {
            return Err(AppError::NotFound("Folder not found".to_string()));
        }
        Ok(folder)
    }

    /// Create a folder
    pub async fn create_folder(
        db: &Database,
        user_id: &str,
        req: CreateFolderRequest,
    ) -> Result<Folder> {
        let name = req.name.trim();
        if name.is_empty()
            || name.chars().count() > 255
            || name.contains('/')
            || name.contains('\\')
        {
            return Err(AppError::BadRequest("Invalid folder name".to_string()));
        }

        if let Some(ref parent_id) = req.parent_id {
            Self::get_owned_folder(db, user_id, parent_id).await?;
        }

        let folder_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO folders (id, name, owner_id, parent_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&folder_id)
        .bind(name)
        .bind(user_id)
        .bind(&req.parent_id)
        .bind(&now)
        .bind(&now)
        .execute(db.pool())
        .await?;

        tracing::debug!(folder_id = %folder_id, "Folder created");
        Self::get_folder(db, &folder_id).await
    }

    /// List the user's folders directly under `parent_id`, or at the root
    pub async fn list_folders(
        db: &Database,
        user_id: &str,
        parent_id: Option<&str>,
    ) -> Result<Vec<Folder>> {
        let folders = match parent_id {
            Some(pid) => {
                sqlx::query_as(
                    "SELECT * FROM folders WHERE owner_id = ? AND parent_id = ? ORDER BY name ASC",
                )
                .bind(user_id)
                .bind(pid)
                .fetch_all(db.pool())
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT * FROM folders WHERE owner_id = ? AND parent_id IS NULL ORDER BY name ASC",
                )
                .bind(user_id)
                .fetch_all(db.pool())
                .await?
            }
        };
        Ok(folders)
    }

    /// Breadcrumb from the root down to `folder_id`.
    ///
    /// Walks parent references upward. A missing ancestor ends the walk with the
    /// partial path; a repeated id (cycle) or the depth bound does the same.
    pub async fn folder_path(db: &Database, user_id: &str, folder_id: &str) -> Result<Vec<PathItem>> {
        let start = Self::get_owned_folder(db, user_id, folder_id).await?;

        let mut path = vec![PathItem {
            id: start.id.clone(),
            name: start.name,
        }];
        let mut visited = HashSet::from([start.id]);
        let mut current_id = start.parent_id;

        while let Some(id) = current_id {
            if path.len() >= MAX_PATH_DEPTH {
                tracing::warn!(folder_id = %folder_id, "Folder path exceeds depth bound");
                break;
            }
            if !visited.insert(id.clone()) {
                tracing::warn!(folder_id = %folder_id, cycle_at = %id, "Folder parent cycle detected");
                break;
            }

            let folder: Option<Folder> = sqlx::query_as("SELECT * FROM folders WHERE id = ?")
                .bind(&id)
                .fetch_optional(db.pool())
                .await?;

            match folder {
                Some(f) => {
                    path.push(PathItem {
                        id: f.id,
                        name: f.name,
                    });
                    current_id = f.parent_id;
                }
                None => {
                    tracing::warn!("Could not resolve folder path for ID: {}", id);
                    break;
                }
            }
        }

        path.reverse();
        Ok(path)
    }

    /// Delete an empty folder
    pub async fn delete_folder(db: &Database, user_id: &str, folder_id: &str) -> Result<()> {
        Self::get_owned_folder(db, user_id, folder_id).await?;

        let files: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM files WHERE parent_id = ?")
            .bind(folder_id)
            .fetch_one(db.pool())
            .await?;
        if files.0 > 0 {
            return Err(AppError::Conflict(
                "Cannot delete a folder that contains files.".to_string(),
            ));
        }

        let sub_folders: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM folders WHERE parent_id = ?")
            .bind(folder_id)
            .fetch_one(db.pool())
            .await?;
        if sub_folders.0 > 0 {
            return Err(AppError::Conflict(
                "Cannot delete a folder that contains sub-folders.".to_string(),
            ));
        }

        sqlx::query("DELETE FROM folders WHERE id = ?")
            .bind(folder_id)
            .execute(db.pool())
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;

    fn req(name: &str, parent_id: Option<&str>) -> CreateFolderRequest {
        CreateFolderRequest {
            name: name.to_string(),
            parent_id: parent_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let db = testing::db().await;
        let user = testing::seed_user(&db, "f@example.com").await;

        let work = FolderService::create_folder(&db, &user, req("  Work ", None)).await.unwrap();
        assert_eq!(work.name, "Work");
        FolderService::create_folder(&db, &user, req("Archive", None)).await.unwrap();
        FolderService::create_folder(&db, &user, req("Reports", Some(&work.id))).await.unwrap();

        let root = FolderService::list_folders(&db, &user, None).await.unwrap();
        let names: Vec<_> = root.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Archive", "Work"]);

        let children = FolderService::list_folders(&db, &user, Some(&work.id)).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "Reports");
    }

    #[tokio::test]
    async fn test_invalid_names_rejected() {
        let db = testing::db().await;
        let user = testing::seed_user(&db, "f@example.com").await;
        for name in ["", "   ", "a/b", "a\\b"] {
            assert!(matches!(
                FolderService::create_folder(&db, &user, req(name, None)).await,
                Err(AppError::BadRequest(_))
            ));
        }
        let long = "x".repeat(256);
        assert!(FolderService::create_folder(&db, &user, req(&long, None)).await.is_err());
    }

    #[tokio::test]
    async fn test_cannot_nest_under_foreign_folder() {
        let db = testing::db().await;
        let alice = testing::seed_user(&db, "alice@example.com").await;
        let bob = testing::seed_user(&db, "bob@example.com").await;
        let theirs = FolderService::create_folder(&db, &alice, req("Private", None)).await.unwrap();

        assert!(matches!(
            FolderService::create_folder(&db, &bob, req("Sneaky", Some(&theirs.id))).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_folder_path() {
        let db = testing::db().await;
        let user = testing::seed_user(&db, "p@example.com").await;
        let a = FolderService::create_folder(&db, &user, req("A", None)).await.unwrap();
        let b = FolderService::create_folder(&db, &user, req("B", Some(&a.id))).await.unwrap();
        let c = FolderService::create_folder(&db, &user, req("C", Some(&b.id))).await.unwrap();

        let path = FolderService::folder_path(&db, &user, &c.id).await.unwrap();
        let names: Vec<_> = path.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
        assert_eq!(path[0].id, a.id);
    }

    #[tokio::test]
    async fn test_folder_path_stops_on_cycle() {
        let db = testing::db().await;
        let user = testing::seed_user(&db, "cyc@example.com").await;
        let a = FolderService::create_folder(&db, &user, req("A", None)).await.unwrap();
        let b = FolderService::create_folder(&db, &user, req("B", Some(&a.id))).await.unwrap();

        sqlx::query("UPDATE folders SET parent_id = ? WHERE id = ?")
            .bind(&b.id)
            .bind(&a.id)
            .execute(db.pool())
            .await
            .unwrap();

        let path = FolderService::folder_path(&db, &user, &b.id).await.unwrap();
        let names: Vec<_> = path.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
    }

    #[tokio::test]
    async fn test_folder_path_depth_bound() {
        let db = testing::db().await;
        let user = testing::seed_user(&db, "deep@example.com").await;

        let mut parent: Option<String> = None;
        for level in 0..70 {
            let folder = FolderService::create_folder(&db, &user, req(&format!("L{}", level), parent.as_deref()))
                .await
                .unwrap();
            parent = Some(folder.id);
        }
        let deepest = parent.unwrap();

        let path = FolderService::folder_path(&db, &user, &deepest).await.unwrap();
        assert_eq!(path.len(), MAX_PATH_DEPTH);
        assert_eq!(path.last().unwrap().id, deepest);
        assert_eq!(path.last().unwrap().name, "L69");
        assert_eq!(path[0].name, "L6");
    }

    #[tokio::test]
    async fn test_folder_path_stops_at_missing_ancestor() {
        let db = testing::db().await;
        let user = testing::seed_user(&db, "m@example.com").await;
        let a = FolderService::create_folder(&db, &user, req("A", None)).await.unwrap();

        sqlx::query("PRAGMA foreign_keys = OFF").execute(db.pool()).await.unwrap();
        sqlx::query("UPDATE folders SET parent_id = 'gone' WHERE id = ?")
            .bind(&a.id)
            .execute(db.pool())
            .await
            .unwrap();

        let path = FolderService::folder_path(&db, &user, &a.id).await.unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].name, "A");
    }

    #[tokio::test]
    async fn test_delete_refuses_non_empty() {
        let db = testing::db().await;
        let user = testing::seed_user(&db, "d@example.com").await;
        let parent = FolderService::create_folder(&db, &user, req("Parent", None)).await.unwrap();
        let child = FolderService::create_folder(&db, &user, req("Child", Some(&parent.id))).await.unwrap();
        let file = testing::seed_file(&db, &user, "x.txt", 1, Some(&child.id)).await;

        let err = FolderService::delete_folder(&db, &user, &child.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg.contains("contains files")));

        let err = FolderService::delete_folder(&db, &user, &parent.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg.contains("sub-folders")));

        sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(&file)
            .execute(db.pool())
            .await
            .unwrap();
        FolderService::delete_folder(&db, &user, &child.id).await.unwrap();
        FolderService::delete_folder(&db, &user, &parent.id).await.unwrap();
        assert!(FolderService::list_folders(&db, &user, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_foreign_folder_not_found() {
        let db = testing::db().await;
        let alice = testing::seed_user(&db, "alice@example.com").await;
        let bob = testing::seed_user(&db, "bob@example.com").await;
        let folder = FolderService::create_folder(&db, &alice, req("Mine", None)).await.unwrap();
        assert!(matches!(
            FolderService::delete_folder(&db, &bob, &folder.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
