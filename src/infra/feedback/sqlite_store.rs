// SQLite-backed feedback store.
//
// Tables:
// - feedbacks: one row per accepted submission, id is a UUID v4

use crate::core::feedback::{
    FeedbackEntry, FeedbackStore, NewFeedback, StoreError, FEEDBACK_COLLECTION,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use uuid::Uuid;

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

pub struct SqliteFeedbackStore {
    pool: Pool<Sqlite>,
}

impl SqliteFeedbackStore {
    /// Open (creating if needed) the database at `database_url` and run migrations.
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let path_str = database_url.trim_start_matches("sqlite://");
        if !database_url.contains(":memory:") && !Path::new(path_str).exists() {
            if let Some(parent) = Path::new(path_str).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(path_str)?;
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        let pool = SqlitePoolOptions::new()
            .connect(&conn_str)
            .await
            .map_err(db_err)?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                text TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            FEEDBACK_COLLECTION
        ))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{0}_created_at ON {0}(created_at)",
            FEEDBACK_COLLECTION
        ))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    // Fixed-width UTC timestamps so that text order is time order
    fn format_timestamp(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_timestamp(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|e| {
                tracing::warn!("Unreadable feedback timestamp {:?}: {}", raw, e);
                DateTime::<Utc>::default()
            })
    }
}

#[async_trait]
impl FeedbackStore for SqliteFeedbackStore {
    async fn append(&self, feedback: NewFeedback) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(&format!(
            "INSERT INTO {} (id, name, text, created_at) VALUES (?, ?, ?, ?)",
            FEEDBACK_COLLECTION
        ))
        .bind(&id)
        .bind(&feedback.name)
        .bind(&feedback.text)
        .bind(Self::format_timestamp(&feedback.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(id)
    }

    async fn list_recent(&self) -> Result<Vec<FeedbackEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT id, name, text, created_at FROM {} ORDER BY created_at DESC, id ASC",
            FEEDBACK_COLLECTION
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let created_at: String = row.get("created_at");
                FeedbackEntry {
                    id: row.get("id"),
                    name: row.get("name"),
                    text: row.get("text"),
                    created_at: Self::parse_timestamp(&created_at),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    fn feedback(name: &str, text: &str, created_at: DateTime<Utc>) -> NewFeedback {
        NewFeedback {
            name: name.to_string(),
            text: text.to_string(),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_append_and_list_newest_first() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("feedback.db");
        let store = SqliteFeedbackStore::new(db_path.to_str().unwrap())
            .await
            .unwrap();

        let now = Utc::now();
        let old_id = store
            .append(feedback("ada", "older note about the layout", now - Duration::hours(2)))
            .await
            .unwrap();
        let new_id = store
            .append(feedback("sam", "newer note about the layout", now))
            .await
            .unwrap();

        let entries = store.list_recent().await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, new_id);
        assert_eq!(entries[1].id, old_id);
        assert_eq!(entries[0].name, "sam");
        assert_eq!(
            entries[0].created_at.timestamp_micros(),
            now.timestamp_micros()
        );
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("feedback.db");
        let db_path = db_path.to_str().unwrap();

        {
            let store = SqliteFeedbackStore::new(db_path).await.unwrap();
            store
                .append(feedback("ada", "the pdf link is broken", Utc::now()))
                .await
                .unwrap();
        }

        let reopened = SqliteFeedbackStore::new(db_path).await.unwrap();
        let entries = reopened.list_recent().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "the pdf link is broken");
    }
}
