use sqlx::FromRow;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Cut,
    Transcode,
}

impl JobKind {
    pub fn as_i16(self) -> i16 {
        match self {
            JobKind::Cut => 1,
            JobKind::Transcode => 2,
        }
    }

    pub fn from_i16(raw: i16) -> Option<Self> {
        match raw {
            1 => Some(JobKind::Cut),
            2 => Some(JobKind::Transcode),
            _ => None,
        }
    }
}

/// Lifecycle: Pending → Running → Done or Failed, never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_i16(self) -> i16 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Running => 1,
            JobStatus::Done => 2,
            JobStatus::Failed => 3,
        }
    }
}

impl From<i16> for JobStatus {
    fn from(raw: i16) -> Self {
        match raw {
            1 => JobStatus::Running,
            2 => JobStatus::Done,
            3 => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }
}

/// One persisted cut/transcode request, raw from the store. Kind and status
/// are kept as stored integers; internal logic goes through the accessors.
#[derive(Debug, Clone, FromRow)]
pub struct Job {
    pub id: i64,
    pub local_id: String,
    pub path: String,
    pub file: String,
    pub kind: i16,
    pub start_sec: i64,
    pub end_sec: i64,
    pub status: i16,
}

impl Job {
    pub fn kind(&self) -> Option<JobKind> {
        JobKind::from_i16(self.kind)
    }

    pub fn status(&self) -> JobStatus {
        JobStatus::from(self.status)
    }

    pub fn source_path(&self) -> PathBuf {
        Path::new(&self.path).join(&self.file)
    }
}

/// Catalog entry for one indexed media file.
#[derive(Debug, Clone, FromRow)]
pub struct FileRecord {
    pub id: String,
    pub path: String,
    pub file: String,
    pub size_mb: f64,
    pub created: Option<OffsetDateTime>,
}

impl FileRecord {
    pub fn source_path(&self) -> PathBuf {
        Path::new(&self.path).join(&self.file)
    }
}

/// Outcome of an idempotent submission.
#[derive(Debug, PartialEq, Eq)]
pub enum JobSubmission {
    Created(i64),
    Exists { id: i64, status: JobStatus },
}
