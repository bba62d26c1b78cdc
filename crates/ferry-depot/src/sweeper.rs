use crate::config::DEFAULT_ORPHAN_GRACE;
use ferry_core::{
    Clock, Code, ContentKind, ContentRecord, DepotError, Liveness, PayloadRef, Repository,
    SystemClock,
};
use ferry_storage::BlobStore;
use jiff::{SignedDuration, Timestamp};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What one sweep pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records past their time-to-live.
    pub expired: usize,
    /// Records whose quota was used up but which were never disposed.
    pub exhausted: usize,
    /// Live file records whose blob is gone.
    pub missing_payload: usize,
    /// Blobs no record owns.
    pub orphan_blobs: usize,
    /// Spool files of uploads that never finished.
    pub stale_uploads: usize,
    /// Items that could not be processed; retried next pass.
    pub failures: usize,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.expired
            + self.exhausted
            + self.missing_payload
            + self.orphan_blobs
            + self.stale_uploads
    }

    pub fn is_empty(&self) -> bool {
        self.removed() == 0 && self.failures == 0
    }
}

#[derive(Debug, Clone, Copy)]
enum Verdict {
    Expired,
    Exhausted,
    MissingPayload,
}

/// Periodic removal of dead records and unowned blobs.
///
/// The sweeper is independent of request traffic. It never serves anything,
/// so it only deletes: a record is removed once it has timed out, used up its
/// quota or lost its blob, and a blob is removed once no record owns it and
/// it is older than the orphan grace period. Spool files of uploads that
/// stalled for longer than the same grace period are removed as well.
pub struct Sweeper<R, C = SystemClock> {
    repository: Arc<R>,
    blobs: Arc<BlobStore>,
    clock: Arc<C>,
    orphan_grace: SignedDuration,
}

impl<R: Repository> Sweeper<R, SystemClock> {
    pub fn new(repository: Arc<R>, blobs: Arc<BlobStore>) -> Self {
        Self {
            repository,
            blobs,
            clock: Arc::new(SystemClock),
            orphan_grace: DEFAULT_ORPHAN_GRACE,
        }
    }
}

impl<R: Repository, C: Clock> Sweeper<R, C> {
    pub fn with_clock<C2: Clock>(self, clock: C2) -> Sweeper<R, C2> {
        self.with_shared_clock(Arc::new(clock))
    }

    pub(crate) fn with_shared_clock<C2: Clock>(self, clock: Arc<C2>) -> Sweeper<R, C2> {
        Sweeper {
            repository: self.repository,
            blobs: self.blobs,
            clock,
            orphan_grace: self.orphan_grace,
        }
    }

    /// Minimum age of an unowned blob before it is removed. Protects blobs
    /// written by a creation whose record is not inserted yet.
    pub fn with_orphan_grace(mut self, grace: SignedDuration) -> Self {
        self.orphan_grace = grace;
        self
    }

    /// Runs one pass over every record and blob.
    ///
    /// Only failing to enumerate the records aborts the pass; any single
    /// record or blob that fails is logged, counted and left for next time.
    pub async fn sweep_once(&self) -> Result<SweepReport, DepotError> {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        for kind in ContentKind::ALL {
            for record in self.repository.list(kind).await? {
                match self.sweep_record(&record, now).await {
                    Ok(Some(Verdict::Expired)) => report.expired += 1,
                    Ok(Some(Verdict::Exhausted)) => report.exhausted += 1,
                    Ok(Some(Verdict::MissingPayload)) => report.missing_payload += 1,
                    Ok(None) => {}
                    Err(err) => {
                        warn!(code = %record.code, kind = %kind, error = %err, "failed to sweep record");
                        report.failures += 1;
                    }
                }
            }
        }

        if let Err(err) = self.sweep_orphans(now, &mut report).await {
            warn!(error = %err, "failed to sweep orphan blobs");
            report.failures += 1;
        }

        if let Ok(cutoff) = now.checked_sub(self.orphan_grace) {
            match self.blobs.purge_staging(cutoff).await {
                Ok(removed) => report.stale_uploads += removed,
                Err(err) => {
                    warn!(error = %err, "failed to purge stale uploads");
                    report.failures += 1;
                }
            }
        }

        Ok(report)
    }

    async fn sweep_record(
        &self,
        record: &ContentRecord,
        now: Timestamp,
    ) -> Result<Option<Verdict>, DepotError> {
        let verdict = match record.liveness(now) {
            Liveness::TimedOut => Verdict::Expired,
            Liveness::Exhausted => Verdict::Exhausted,
            Liveness::Live => {
                let PayloadRef::Blob { file_name } = &record.payload else {
                    return Ok(None);
                };
                if self.blobs.exists(&record.code, file_name).await? {
                    return Ok(None);
                }
                Verdict::MissingPayload
            }
        };

        // Another remover may have won; only the winner touches the blob.
        let Some(removed) = self.repository.delete(record.kind(), &record.code).await? else {
            return Ok(None);
        };
        if let PayloadRef::Blob { file_name } = &removed.payload {
            self.blobs.remove(&removed.code, file_name).await?;
        }

        debug!(code = %removed.code, kind = %removed.kind(), verdict = ?verdict, "swept record");
        Ok(Some(verdict))
    }

    async fn sweep_orphans(
        &self,
        now: Timestamp,
        report: &mut SweepReport,
    ) -> Result<(), DepotError> {
        let owned: HashSet<(Code, String)> = self
            .repository
            .list(ContentKind::File)
            .await?
            .into_iter()
            .filter_map(|record| match record.payload {
                PayloadRef::Blob { file_name } => Some((record.code, file_name)),
                PayloadRef::Text { .. } => None,
            })
            .collect();

        for blob in self.blobs.list().await? {
            if owned.contains(&(blob.code.clone(), blob.file_name.clone())) {
                continue;
            }
            if now.duration_since(blob.modified) < self.orphan_grace {
                continue;
            }

            match self.blobs.remove(&blob.code, &blob.file_name).await {
                Ok(true) => {
                    debug!(code = %blob.code, file_name = %blob.file_name, "removed orphan blob");
                    report.orphan_blobs += 1;
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(code = %blob.code, file_name = %blob.file_name, error = %err, "failed to remove orphan blob");
                    report.failures += 1;
                }
            }
        }

        Ok(())
    }

    /// Spawns the sweep loop. The first pass runs immediately, the rest every
    /// `interval`, until `shutdown` is cancelled.
    pub fn spawn(self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        match self.sweep_once().await {
                            Ok(report) if report.is_empty() => debug!("sweep found nothing to remove"),
                            Ok(report) => info!(
                                expired = report.expired,
                                exhausted = report.exhausted,
                                missing_payload = report.missing_payload,
                                orphan_blobs = report.orphan_blobs,
                                stale_uploads = report.stale_uploads,
                                failures = report.failures,
                                "sweep completed"
                            ),
                            Err(err) => warn!(error = %err, "sweep failed"),
                        }
                    }
                }
            }
        })
    }
}
