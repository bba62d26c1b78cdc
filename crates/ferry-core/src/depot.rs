use crate::code::Code;
use crate::error::DepotError;
use crate::kind::ContentKind;
use crate::record::{ContentRecord, Quota};
use crate::upload::StagedUpload;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, DepotError>;

/// A file to store, already spooled to disk.
#[derive(Debug)]
pub struct FileUpload {
    /// Name supplied by the uploader; sanitized before touching the disk.
    pub original_name: String,
    pub staged: StagedUpload,
    pub max_downloads: Quota,
}

/// A text paste to store.
#[derive(Debug, Clone)]
pub struct PasteDraft {
    pub content: String,
    /// Syntax-highlighting hint, `plaintext` when empty.
    pub lang: String,
    pub max_views: Quota,
}

/// Receipt for a newly created record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Created {
    pub code: Code,
    pub kind: ContentKind,
    pub max_uses: Quota,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl From<&ContentRecord> for Created {
    fn from(record: &ContentRecord) -> Self {
        Self {
            code: record.code.clone(),
            kind: record.kind(),
            max_uses: record.max_uses,
            created_at: record.created_at,
            expires_at: record.expires_at,
        }
    }
}

/// The payload handed to a consumer.
#[derive(Debug)]
pub enum ServedContent {
    /// An open handle on the blob. The blob may be unlinked once the quota is
    /// exhausted; the handle stays readable until dropped.
    File {
        file: tokio::fs::File,
        file_name: String,
        size: u64,
    },
    Text { content: String, lang: String },
}

/// Result of one consumption request.
#[derive(Debug)]
pub enum ConsumeOutcome {
    Served {
        /// The record after this use was recorded.
        record: ContentRecord,
        content: ServedContent,
    },
    Expired,
    NotFound,
}

impl ConsumeOutcome {
    pub fn is_served(&self) -> bool {
        matches!(self, ConsumeOutcome::Served { .. })
    }
}

/// Aggregate counters for the admin view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_files: u64,
    pub total_pastes: u64,
    /// Sum of recorded downloads over the stored files.
    pub total_downloads: u64,
}

/// The ephemeral content store as seen by the request-handling layer.
#[async_trait]
pub trait Depot: Send + Sync + 'static {
    /// Opens a spool file for an incoming upload. Nothing is recorded until
    /// the finished upload is passed to [`Depot::create_file`].
    async fn stage_file(&self) -> Result<StagedUpload>;

    /// Stores a file under a freshly minted numeric code.
    async fn create_file(&self, upload: FileUpload) -> Result<Created>;

    /// Stores a paste under a freshly minted alphanumeric code.
    async fn create_paste(&self, draft: PasteDraft) -> Result<Created>;

    /// Consumes one use of a record and hands out its payload.
    async fn consume(&self, kind: ContentKind, code: &Code) -> Result<ConsumeOutcome>;

    async fn stats(&self) -> Result<Stats>;
}
