use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{CategoryUsage, FileType, StorageSummary, User, UserResponse};

/// User service
pub struct UserService;

impl UserService {
    /// Get user by ID
    pub async fn get_user(db: &Database, user_id: &str) -> Result<User> {
        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        Ok(user)
    }

    /// Get user profile
    pub async fn get_profile(db: &Database, user_id: &str) -> Result<UserResponse> {
        let user = Self::get_user(db, user_id).await?;
        Ok(UserResponse::from(user))
    }

    /// Total bytes owned by the user
    pub async fn used_space(db: &Database, user_id: &str) -> Result<i64> {
        let used: (i64,) =
            sqlx::query_as("SELECT COALESCE(SUM(size), 0) FROM files WHERE owner_id = ?")
                .bind(user_id)
                .fetch_one(db.pool())
                .await?;
        Ok(used.0)
    }

    /// Per-category usage of the files the user owns
    pub async fn storage_summary(
        db: &Database,
        user_id: &str,
        quota: u64,
    ) -> Result<StorageSummary> {
        let rows: Vec<(String, i64, Option<String>)> = sqlx::query_as(
            r#"
            SELECT file_type, COALESCE(SUM(size), 0), MAX(updated_at)
            FROM files
            WHERE owner_id = ?
            GROUP BY file_type
            "#,
        )
        .bind(user_id)
        .fetch_all(db.pool())
        .await?;

        let mut summary = StorageSummary {
            document: CategoryUsage::default(),
            image: CategoryUsage::default(),
            video: CategoryUsage::default(),
            audio: CategoryUsage::default(),
            other: CategoryUsage::default(),
            used: 0,
            all: quota as i64,
        };

        for (file_type, size, latest_date) in rows {
            let bucket = match FileType::parse(&file_type).unwrap_or(FileType::Other) {
                FileType::Document => &mut summary.document,
                FileType::Image => &mut summary.image,
                FileType::Video => &mut summary.video,
                FileType::Audio => &mut summary.audio,
                FileType::Other => &mut summary.other,
            };
            bucket.size += size;
            if latest_date > bucket.latest_date {
                bucket.latest_date = latest_date;
            }
            summary.used += size;
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;

    #[tokio::test]
    async fn test_storage_summary_groups_by_category() {
        let db = testing::db().await;
        let user = testing::seed_user(&db, "s@example.com").await;
        let other = testing::seed_user(&db, "o@example.com").await;

        testing::seed_file(&db, &user, "a.pdf", 100, None).await;
        testing::seed_file(&db, &user, "b.docx", 50, None).await;
        testing::seed_file(&db, &user, "c.png", 30, None).await;
        testing::seed_file(&db, &user, "d.bin", 7, None).await;
        testing::seed_file(&db, &other, "e.mp4", 1000, None).await;

        let summary = UserService::storage_summary(&db, &user, 2048).await.unwrap();
        assert_eq!(summary.document.size, 150);
        assert_eq!(summary.image.size, 30);
        assert_eq!(summary.other.size, 7);
        assert_eq!(summary.video.size, 0);
        assert!(summary.video.latest_date.is_none());
        assert!(summary.document.latest_date.is_some());
        assert_eq!(summary.used, 187);
        assert_eq!(summary.all, 2048);

        assert_eq!(UserService::used_space(&db, &user).await.unwrap(), 187);
    }

    #[tokio::test]
    async fn test_unknown_user_not_found() {
        let db = testing::db().await;
        assert!(matches!(
            UserService::get_profile(&db, "missing").await,
            Err(AppError::NotFound(_))
        ));
    }
}
