//! User profile persistence
//!
//! SQLite-backed store keyed by user identifier. Profiles are read on session
//! start and written on session archive; the conversational turn log is
//! deliberately not persisted here. Uses WAL mode for better concurrency.

use anyhow::{Context, Result};
use chrono::Utc;
use sdk::profile::UserProfile;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{ConnectOptions, Row};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Profile store backed by SQLite
pub struct ProfileStore {
    pool: SqlitePool,
}

impl ProfileStore {
    /// Open (or create) the store at the given path and run migrations.
    ///
    /// A store that cannot be opened aborts session startup; there is no
    /// degraded in-memory mode.
    pub async fn new(db_path: &Path) -> Result<Self> {
        info!("Opening profile store at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create profile store directory")?;
        }

        let connection_string = format!("sqlite:{}", db_path.display());
        let options = SqliteConnectOptions::from_str(&connection_string)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to profile store")?;

        sqlx::raw_sql(include_str!("../../migrations/001_initial.sql"))
            .execute(&pool)
            .await
            .context("Failed to execute migration 001_initial.sql")?;

        debug!("Profile store ready");
        Ok(Self { pool })
    }

    /// Load the profile for a user, if one was previously archived
    pub async fn load(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let row = sqlx::query("SELECT profile FROM user_profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read user profile")?;

        match row {
            None => Ok(None),
            Some(row) => {
                let json: String = row.get("profile");
                let profile = serde_json::from_str(&json)
                    .context("Stored user profile is not valid JSON")?;
                Ok(Some(profile))
            }
        }
    }

    /// Persist the profile for a user, replacing any previous version
    pub async fn save(&self, user_id: &str, profile: &UserProfile) -> Result<()> {
        let json = serde_json::to_string(profile).context("Failed to serialize user profile")?;

        sqlx::query(
            "INSERT INTO user_profiles (user_id, profile, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                 profile = excluded.profile,
                 updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to write user profile")?;

        debug!(user_id, "Profile persisted");
        Ok(())
    }

    /// Remove all data for a user
    pub async fn delete(&self, user_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM user_profiles WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user profile")?;
        Ok(())
    }

    /// Close the pool, checkpointing the WAL
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
