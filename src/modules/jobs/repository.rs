use super::model::{FileRecord, Job, JobKind, JobStatus, JobSubmission};
use crate::infrastructure::db::pool::DbPool;
use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Narrow contract over the persistent job/file catalog. The scheduler and
/// the HTTP handlers never see rows, only these typed calls.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Oldest job that is not yet terminal (Pending, or Running from an
    /// earlier loop iteration).
    async fn fetch_next_pending_job(&self) -> Result<Option<Job>, StoreError>;

    async fn update_job_status(&self, id: i64, status: JobStatus) -> Result<(), StoreError>;

    async fn fetch_file_record(&self, local_id: &str) -> Result<Option<FileRecord>, StoreError>;

    async fn update_file_record(
        &self,
        local_id: &str,
        filename: &str,
        size_mb: f64,
        created: OffsetDateTime,
    ) -> Result<(), StoreError>;

    /// Inserts a Pending job unless one already exists for the same
    /// (file, kind) pair; an existing row is reported instead.
    async fn create_job_if_absent(
        &self,
        record: &FileRecord,
        kind: JobKind,
        start_sec: i64,
        end_sec: i64,
    ) -> Result<JobSubmission, StoreError>;
}

pub struct PgCatalogStore {
    pool: DbPool,
}

impl PgCatalogStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn fetch_next_pending_job(&self) -> Result<Option<Job>, StoreError> {
        let job = sqlx::query_as::<_, Job>(
            "SELECT id, local_id, path, file, kind, start_sec, end_sec, status \
             FROM media_jobs WHERE status < 2 ORDER BY id LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    async fn update_job_status(&self, id: i64, status: JobStatus) -> Result<(), StoreError> {
        sqlx::query("UPDATE media_jobs SET status = $1 WHERE id = $2")
            .bind(status.as_i16())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fetch_file_record(&self, local_id: &str) -> Result<Option<FileRecord>, StoreError> {
        let record = sqlx::query_as::<_, FileRecord>(
            "SELECT id, path, file, size_mb, created FROM media_files WHERE id = $1",
        )
        .bind(local_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn update_file_record(
        &self,
        local_id: &str,
        filename: &str,
        size_mb: f64,
        created: OffsetDateTime,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE media_files SET file = $1, size_mb = $2, created = $3, updated = NOW() \
             WHERE id = $4",
        )
        .bind(filename)
        .bind(size_mb)
        .bind(created)
        .bind(local_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_job_if_absent(
        &self,
        record: &FileRecord,
        kind: JobKind,
        start_sec: i64,
        end_sec: i64,
    ) -> Result<JobSubmission, StoreError> {
        let existing: Option<(i64, i16)> = sqlx::query_as(
            "SELECT id, status FROM media_jobs \
             WHERE local_id = $1 AND path = $2 AND file = $3 AND kind = $4",
        )
        .bind(&record.id)
        .bind(&record.path)
        .bind(&record.file)
        .bind(kind.as_i16())
        .fetch_optional(&self.pool)
        .await?;

        if let Some((id, status)) = existing {
            return Ok(JobSubmission::Exists {
                id,
                status: JobStatus::from(status),
            });
        }

        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO media_jobs (local_id, path, file, kind, start_sec, end_sec, status) \
             VALUES ($1, $2, $3, $4, $5, $6, 0) RETURNING id",
        )
        .bind(&record.id)
        .bind(&record.path)
        .bind(&record.file)
        .bind(kind.as_i16())
        .bind(start_sec)
        .bind(end_sec)
        .fetch_one(&self.pool)
        .await?;
        Ok(JobSubmission::Created(id))
    }
}
