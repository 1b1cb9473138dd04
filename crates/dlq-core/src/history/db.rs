//! SQLite-backed history store.
//!
//! Handles connection and migrations. Record writes and queries live in `records`.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};

/// Handle to the persisted history.
///
/// Default location is under the XDG state directory:
/// `~/.local/state/dlq/history.db` on Debian.
#[derive(Clone)]
pub struct HistoryDb {
    pub(crate) pool: Pool<Sqlite>,
}

impl HistoryDb {
    /// Default database path under the XDG state dir.
    pub fn default_path() -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("dlq")?;
        Ok(xdg_dirs.get_state_home().join("history.db"))
    }

    /// Open (or create) the default history database and run migrations.
    pub async fn open_default() -> Result<Self> {
        Self::open_at(Self::default_path()?).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Passing the path as a filename avoids URI escaping of spaces, `#` and `?`.
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("open history db {}", path.display()))?;
        let db = HistoryDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Open an in-memory database (no disk I/O); contents vanish with the handle.
    pub async fn open_memory() -> Result<Self> {
        // One connection: every sqlite::memory: connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = HistoryDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        // `seq` is the append order; `job_id` is unique so a record is never stored twice.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_history (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL UNIQUE,
                url TEXT NOT NULL,
                description TEXT NOT NULL,
                options_json TEXT,
                status TEXT NOT NULL,
                budget_ms INTEGER NOT NULL,
                submitted_at INTEGER NOT NULL,
                started_at INTEGER,
                finished_at INTEGER,
                deadline_enforced INTEGER,
                error_kind TEXT,
                error_message TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS job_history_finished_at
            ON job_history (finished_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
