use crate::code::Code;
use crate::depot::Stats;
use crate::error::Result;
use crate::kind::ContentKind;
use crate::record::ContentRecord;
use async_trait::async_trait;
use jiff::Timestamp;

/// Result of one atomic consume-or-expire step against the record store.
#[derive(Debug, Clone, PartialEq)]
pub enum Consumption {
    /// One use was recorded. Carries the record after the increment.
    Served(ContentRecord),
    /// The record exists but may not be consumed.
    ///
    /// Carries the record only for the single caller whose guarded delete
    /// removed a timed-out row; that caller owns the payload cleanup.
    Expired(Option<ContentRecord>),
    /// No record holds this code.
    NotFound,
}

/// A read-only view of the record store.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the stored record for a code, live or not.
    /// Returns `None` if no record holds the code.
    async fn get(&self, kind: ContentKind, code: &Code) -> Result<Option<ContentRecord>>;

    /// Checks whether any record, live or not yet removed, holds the code.
    ///
    /// Codes stay unavailable until their record is deleted, so a fresh
    /// record is never confused with the leftovers of an older one.
    async fn exists(&self, kind: ContentKind, code: &Code) -> Result<bool>;

    /// Returns every stored record of a kind, for sweeping.
    async fn list(&self, kind: ContentKind) -> Result<Vec<ContentRecord>>;

    /// Aggregate counters over all stored records.
    async fn stats(&self) -> Result<Stats>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Inserts a new record. Returns `Err(Conflict)` if the code is already held.
    async fn insert(&self, record: ContentRecord) -> Result<()>;

    /// Atomically consumes one use of a record, or expires it.
    ///
    /// All calls for the same code are serialized: the time-out check, the
    /// quota test and the increment form one step, so a quota of `n` is never
    /// served more than `n` times. A timed-out record is deleted inside the
    /// same step and handed to exactly one caller.
    async fn consume(&self, kind: ContentKind, code: &Code, now: Timestamp)
        -> Result<Consumption>;

    /// Deletes the record for a code. Metadata only; the payload is the caller's.
    /// Returns the removed record to the single caller that removed it.
    async fn delete(&self, kind: ContentKind, code: &Code) -> Result<Option<ContentRecord>>;
}
