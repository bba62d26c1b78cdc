use crate::config::DepotConfig;
use crate::sweeper::Sweeper;
use async_trait::async_trait;
use ferry_core::{
    Clock, Code, ConsumeOutcome, Consumption, ContentKind, ContentRecord, Created, Depot,
    DepotError, FileUpload, PasteDraft, PayloadRef, Repository, ServedContent, StagedUpload,
    Stats, StorageError, SystemClock,
};
use ferry_generator::Generator;
use ferry_storage::BlobStore;
use std::io;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

type Result<T> = std::result::Result<T, DepotError>;

const DEFAULT_LANG: &str = "plaintext";

/// The concrete [`Depot`]: mints codes, stores payloads and gates consumption.
///
/// File payloads live in a [`BlobStore`]; paste text is stored inline with
/// the record. When the last permitted download is served the record and its
/// blob are removed after [`DepotConfig::disposal_delay`], on a tracked task
/// so shutdown can drain pending removals.
pub struct DepotService<R, G, C = SystemClock> {
    repository: Arc<R>,
    generator: Arc<G>,
    blobs: Arc<BlobStore>,
    clock: Arc<C>,
    config: DepotConfig,
    disposals: TaskTracker,
}

impl<R, G, C> Clone for DepotService<R, G, C> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            generator: Arc::clone(&self.generator),
            blobs: Arc::clone(&self.blobs),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
            disposals: self.disposals.clone(),
        }
    }
}

impl<R: Repository, G: Generator> DepotService<R, G, SystemClock> {
    pub fn new(repository: R, generator: G, blobs: BlobStore, config: DepotConfig) -> Self {
        Self {
            repository: Arc::new(repository),
            generator: Arc::new(generator),
            blobs: Arc::new(blobs),
            clock: Arc::new(SystemClock),
            config,
            disposals: TaskTracker::new(),
        }
    }
}

impl<R: Repository, G: Generator, C: Clock> DepotService<R, G, C> {
    /// Replaces the time source, e.g. with a `ManualClock` in tests.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> DepotService<R, G, C2> {
        DepotService {
            repository: self.repository,
            generator: self.generator,
            blobs: self.blobs,
            clock: Arc::new(clock),
            config: self.config,
            disposals: self.disposals,
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn blobs(&self) -> &Arc<BlobStore> {
        &self.blobs
    }

    pub fn config(&self) -> &DepotConfig {
        &self.config
    }

    /// A sweeper over the same records, blobs and clock.
    pub fn sweeper(&self) -> Sweeper<R, C> {
        Sweeper::new(Arc::clone(&self.repository), Arc::clone(&self.blobs))
            .with_shared_clock(Arc::clone(&self.clock))
            .with_orphan_grace(self.config.orphan_grace)
    }

    /// Waits until every scheduled disposal has run.
    pub async fn drain_disposals(&self) {
        self.disposals.close();
        self.disposals.wait().await;
        self.disposals.reopen();
    }

    /// Draws a code that no stored record holds.
    async fn next_free_code(&self, kind: ContentKind) -> Result<Option<Code>> {
        let code = self.generator.generate(kind);
        if self.repository.exists(kind, &code).await? {
            trace!(code = %code, kind = %kind, "generated code is taken");
            return Ok(None);
        }
        Ok(Some(code))
    }

    fn exhausted_attempts(&self, kind: ContentKind) -> DepotError {
        warn!(
            kind = %kind,
            attempts = self.config.max_mint_attempts,
            "code space exhausted"
        );
        DepotError::CodeSpaceExhausted {
            kind,
            attempts: self.config.max_mint_attempts,
        }
    }

    /// Removes a record and then its payload. Failures are logged and left
    /// for the sweeper.
    async fn dispose(&self, kind: ContentKind, code: &Code) {
        match self.repository.delete(kind, code).await {
            Ok(Some(record)) => {
                debug!(code = %code, kind = %kind, "disposed record");
                self.discard_payload(&record).await;
            }
            Ok(None) => trace!(code = %code, kind = %kind, "record already disposed"),
            Err(err) => warn!(code = %code, kind = %kind, error = %err, "failed to dispose record"),
        }
    }

    /// Removes the blob of a record that is no longer stored.
    async fn discard_payload(&self, record: &ContentRecord) {
        let PayloadRef::Blob { file_name } = &record.payload else {
            return;
        };
        if let Err(err) = self.blobs.remove(&record.code, file_name).await {
            warn!(code = %record.code, file_name = %file_name, error = %err, "failed to remove blob");
        }
    }

    fn schedule_disposal(&self, record: &ContentRecord) {
        let this = self.clone();
        let kind = record.kind();
        let code = record.code.clone();
        let delay = self.config.disposal_delay;

        self.disposals.spawn(async move {
            tokio::time::sleep(delay).await;
            this.dispose(kind, &code).await;
        });
    }

    async fn serve(&self, record: ContentRecord) -> Result<ConsumeOutcome> {
        let content = match &record.payload {
            PayloadRef::Text { content, lang } => ServedContent::Text {
                content: content.clone(),
                lang: lang.clone(),
            },
            PayloadRef::Blob { file_name } => {
                match self.blobs.open_blob(&record.code, file_name).await? {
                    Some((file, size)) => ServedContent::File {
                        file,
                        file_name: file_name.clone(),
                        size,
                    },
                    None => {
                        warn!(code = %record.code, file_name = %file_name, "blob missing for live record");
                        self.dispose(record.kind(), &record.code).await;
                        return Ok(ConsumeOutcome::Expired);
                    }
                }
            }
        };

        if record.is_exhausted() {
            match record.kind() {
                // the open handle keeps the blob readable, the delay lets
                // the response head out before the path disappears
                ContentKind::File => self.schedule_disposal(&record),
                ContentKind::Paste => self.dispose(ContentKind::Paste, &record.code).await,
            }
        }

        Ok(ConsumeOutcome::Served { record, content })
    }
}

#[async_trait]
impl<R: Repository, G: Generator, C: Clock> Depot for DepotService<R, G, C> {
    async fn stage_file(&self) -> Result<StagedUpload> {
        Ok(self.blobs.stage().await?)
    }

    async fn create_file(&self, upload: FileUpload) -> Result<Created> {
        let kind = ContentKind::File;

        for _ in 0..self.config.max_mint_attempts {
            let Some(code) = self.next_free_code(kind).await? else {
                continue;
            };

            let file_name = match self
                .blobs
                .promote(&upload.staged, &code, &upload.original_name)
                .await
            {
                Ok(file_name) => file_name,
                // a leftover blob still holds this code
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    trace!(code = %code, "blob path is taken");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let record = ContentRecord::new(
                code,
                self.clock.now(),
                self.config.ttl,
                upload.max_downloads,
                PayloadRef::Blob { file_name },
            );
            let created = Created::from(&record);

            match self.repository.insert(record.clone()).await {
                Ok(()) => {
                    info!(
                        code = %created.code,
                        size = upload.staged.size(),
                        max_downloads = created.max_uses.get(),
                        "stored file"
                    );
                    return Ok(created);
                }
                Err(err) => {
                    self.discard_payload(&record).await;
                    if matches!(err, StorageError::Conflict(_)) {
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }

        Err(self.exhausted_attempts(kind))
    }

    async fn create_paste(&self, draft: PasteDraft) -> Result<Created> {
        if draft.content.trim().is_empty() {
            return Err(DepotError::EmptyContent);
        }
        let lang = match draft.lang.trim() {
            "" => DEFAULT_LANG.to_string(),
            lang => lang.to_string(),
        };
        let kind = ContentKind::Paste;

        for _ in 0..self.config.max_mint_attempts {
            let Some(code) = self.next_free_code(kind).await? else {
                continue;
            };

            let record = ContentRecord::new(
                code,
                self.clock.now(),
                self.config.ttl,
                draft.max_views,
                PayloadRef::Text {
                    content: draft.content.clone(),
                    lang: lang.clone(),
                },
            );
            let created = Created::from(&record);

            match self.repository.insert(record).await {
                Ok(()) => {
                    info!(
                        code = %created.code,
                        lang = %lang,
                        max_views = created.max_uses.get(),
                        "stored paste"
                    );
                    return Ok(created);
                }
                Err(StorageError::Conflict(_)) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Err(self.exhausted_attempts(kind))
    }

    async fn consume(&self, kind: ContentKind, code: &Code) -> Result<ConsumeOutcome> {
        let now = self.clock.now();

        match self.repository.consume(kind, code, now).await? {
            Consumption::NotFound => Ok(ConsumeOutcome::NotFound),
            Consumption::Expired(Some(record)) => {
                debug!(code = %code, kind = %kind, "record timed out");
                self.discard_payload(&record).await;
                Ok(ConsumeOutcome::Expired)
            }
            Consumption::Expired(None) => Ok(ConsumeOutcome::Expired),
            Consumption::Served(record) => {
                debug!(
                    code = %code,
                    kind = %kind,
                    uses = record.current_uses,
                    max_uses = record.max_uses.get(),
                    "serving record"
                );
                self.serve(record).await
            }
        }
    }

    async fn stats(&self) -> Result<Stats> {
        Ok(self.repository.stats().await?)
    }
}
