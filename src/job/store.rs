//! Job persistence: an `sqlx`-backed SQLite store for the `Job` document,
//! sufficient for a standalone worker process to run end-to-end without the
//! (out-of-scope) HTTP layer.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::model::{Job, JobId, JobStatus};

/// Thin wrapper around a `SqlitePool`, storing the `Job` document as JSON in
/// a handful of queryable scalar columns plus the full-document blob — the
/// same shape the teacher uses for its own `link_index` SQLite tables
/// (scalar columns for the predicates it needs to filter/sort on, a JSON
/// blob for everything else).
#[derive(Debug, Clone)]
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    /// Open (creating if absent) the SQLite database at `db_path` and run
    /// the schema migration.
    pub async fn connect(db_path: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        // SQLite allows only one writer at a time and an in-memory database
        // is private per connection, so a single pooled connection keeps
        // both the on-disk and `:memory:` cases consistent.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS jobs (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                status      TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                document    TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_user_created ON jobs (user_id, created_at DESC)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert a brand new job (always `waiting`).
    pub async fn insert(&self, job: &Job) -> anyhow::Result<()> {
        let document = serde_json::to_string(job)?;
        sqlx::query("INSERT INTO jobs (id, user_id, status, created_at, document) VALUES (?, ?, ?, ?, ?)")
            .bind(job.id.to_string())
            .bind(&job.user_id)
            .bind(status_str(job.status))
            .bind(job.created_at.to_rfc3339())
            .bind(document)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Overwrite the persisted document for a job that already exists.
    pub async fn save(&self, job: &Job) -> anyhow::Result<()> {
        let document = serde_json::to_string(job)?;
        sqlx::query("UPDATE jobs SET status = ?, document = ? WHERE id = ?")
            .bind(status_str(job.status))
            .bind(document)
            .bind(job.id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get(&self, job_id: JobId) -> anyhow::Result<Option<Job>> {
        let row = sqlx::query("SELECT document FROM jobs WHERE id = ?")
            .bind(job_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let document: String = row.try_get("document")?;
                Ok(Some(serde_json::from_str(&document)?))
            }
            None => Ok(None),
        }
    }

    /// Jobs in `waiting` status, oldest first — the queue's work source.
    pub async fn list_waiting(&self, limit: i64) -> anyhow::Result<Vec<Job>> {
        let rows = sqlx::query(
            "SELECT document FROM jobs WHERE status = ? ORDER BY created_at ASC LIMIT ?",
        )
        .bind(status_str(JobStatus::Waiting))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let document: String = row.try_get("document")?;
                Ok(serde_json::from_str(&document)?)
            })
            .collect()
    }

    /// Jobs for a user, most recent first, paginated — backs the (out of
    /// scope) HTTP layer's `list_jobs` RPC.
    pub async fn list_for_user(&self, user_id: &str, page: i64, page_size: i64) -> anyhow::Result<Vec<Job>> {
        let offset = page.max(0) * page_size;
        let rows = sqlx::query(
            "SELECT document FROM jobs WHERE user_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(page_size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let document: String = row.try_get("document")?;
                Ok(serde_json::from_str(&document)?)
            })
            .collect()
    }
}

fn status_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Waiting => "waiting",
        JobStatus::Active => "active",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
        JobStatus::Cancelled => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobParams, JobScope};

    fn sample_params() -> JobParams {
        JobParams {
            keyword: "coffee".to_string(),
            scope: JobScope { country: "US".to_string(), state: None, city: None },
            max_records: 10,
            rating_filter: None,
            review_count_filter: None,
            review_time_range: None,
            is_extract_email: false,
            is_validate: false,
            only_without_website: false,
        }
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = JobStore::connect(":memory:").await.unwrap();
        let job = Job::new("user-1".to_string(), sample_params());
        store.insert(&job).await.unwrap();

        let fetched = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, job.id);
        assert_eq!(fetched.status, JobStatus::Waiting);
    }

    #[tokio::test]
    async fn list_waiting_returns_only_waiting_jobs() {
        let store = JobStore::connect(":memory:").await.unwrap();
        let mut job = Job::new("user-1".to_string(), sample_params());
        store.insert(&job).await.unwrap();

        job.status = JobStatus::Completed;
        store.save(&job).await.unwrap();

        let waiting = store.list_waiting(10).await.unwrap();
        assert!(waiting.is_empty());
    }

    #[tokio::test]
    async fn list_for_user_orders_most_recent_first() {
        let store = JobStore::connect(":memory:").await.unwrap();
        let first = Job::new("user-1".to_string(), sample_params());
        store.insert(&first).await.unwrap();
        let second = Job::new("user-1".to_string(), sample_params());
        store.insert(&second).await.unwrap();

        let jobs = store.list_for_user("user-1", 0, 10).await.unwrap();
        assert_eq!(jobs.len(), 2);
    }
}
