use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::error::Result;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(path: &str) -> Result<Self> {
        let url = format!("sqlite:{}?mode=rwc", path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        Ok(Self { pool })
    }

    /// Open a migrated in-memory database.
    ///
    /// Uses a single long-lived connection: every SQLite memory connection is a
    /// separate database.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                full_name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                avatar TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS folders (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                parent_id TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (parent_id) REFERENCES folders(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                file_type TEXT NOT NULL,
                extension TEXT NOT NULL DEFAULT '',
                size INTEGER NOT NULL DEFAULT 0,
                mime_type TEXT,
                owner_id TEXT NOT NULL,
                parent_id TEXT,
                bucket_file_id TEXT UNIQUE NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (parent_id) REFERENCES folders(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS file_users (
                file_id TEXT NOT NULL,
                email TEXT NOT NULL,
                PRIMARY KEY (file_id, email),
                FOREIGN KEY (file_id) REFERENCES files(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS shared_cards (
                id TEXT PRIMARY KEY,
                card_id TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                tags TEXT NOT NULL DEFAULT '[]',
                owner_id TEXT NOT NULL,
                total_size INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS card_files (
                card_id TEXT NOT NULL,
                file_id TEXT NOT NULL,
                position INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (card_id, file_id),
                FOREIGN KEY (card_id) REFERENCES shared_cards(id) ON DELETE CASCADE,
                FOREIGN KEY (file_id) REFERENCES files(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Create indexes
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_folders_owner_id ON folders(owner_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_folders_parent_id ON folders(parent_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_owner_id ON files(owner_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_parent_id ON files(parent_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_file_users_email ON file_users(email)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_shared_cards_owner_id ON shared_cards(owner_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_card_files_file_id ON card_files(file_id)")
            .execute(&self.pool)
            .await?;

        tracing::info!("Database migrations completed");
        Ok(())
    }
}

/// Fixtures shared by the service tests
#[cfg(test)]
pub mod testing {
    use super::Database;

    pub async fn db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    /// Insert a user with an unusable password hash and return its id
    pub async fn seed_user(db: &Database, email: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO users (id, full_name, email, password_hash) VALUES (?, ?, ?, '!')")
            .bind(&id)
            .bind(email.split('@').next().unwrap_or(email))
            .bind(email)
            .execute(db.pool())
            .await
            .unwrap();
        id
    }

    /// Insert a file record directly, bypassing the bucket
    pub async fn seed_file(
        db: &Database,
        owner_id: &str,
        name: &str,
        size: i64,
        parent_id: Option<&str>,
    ) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let (file_type, extension) = crate::models::classify(name);
        sqlx::query(
            r#"
            INSERT INTO files (id, name, file_type, extension, size, owner_id, parent_id, bucket_file_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(name)
        .bind(file_type.as_str())
        .bind(&extension)
        .bind(size)
        .bind(owner_id)
        .bind(parent_id)
        .bind(uuid::Uuid::new_v4().to_string())
        .execute(db.pool())
        .await
        .unwrap();
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::open_in_memory().await.unwrap();
        db.run_migrations().await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert_eq!(
            names,
            ["card_files", "file_users", "files", "folders", "shared_cards", "users"]
        );
    }

    #[tokio::test]
    async fn test_file_delete_cascades_memberships() {
        let db = testing::db().await;
        let user = testing::seed_user(&db, "a@example.com").await;
        let file = testing::seed_file(&db, &user, "a.pdf", 10, None).await;

        sqlx::query("INSERT INTO file_users (file_id, email) VALUES (?, 'b@example.com')")
            .bind(&file)
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(&file)
            .execute(db.pool())
            .await
            .unwrap();

        let left: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM file_users")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(left.0, 0);
    }
}
