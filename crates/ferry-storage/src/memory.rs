use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ferry_core::error::{Result, StorageError};
use ferry_core::{
    Code, ContentKind, ContentRecord, Consumption, Liveness, ReadRepository, Repository, Stats,
};
use jiff::Timestamp;

type Key = (ContentKind, Code);

/// In-memory implementation of the Repository trait using DashMap.
///
/// DashMap shards its locks, so operations on different codes proceed in
/// parallel while the entry lock serializes every consume, insert and delete
/// touching the same code. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    storage: DashMap<Key, ContentRecord>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self {
            storage: DashMap::new(),
        }
    }

    fn key(kind: ContentKind, code: &Code) -> Key {
        (kind, code.clone())
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn get(&self, kind: ContentKind, code: &Code) -> Result<Option<ContentRecord>> {
        Ok(self
            .storage
            .get(&Self::key(kind, code))
            .map(|entry| entry.value().clone()))
    }

    async fn exists(&self, kind: ContentKind, code: &Code) -> Result<bool> {
        Ok(self.storage.contains_key(&Self::key(kind, code)))
    }

    async fn list(&self, kind: ContentKind) -> Result<Vec<ContentRecord>> {
        Ok(self
            .storage
            .iter()
            .filter(|entry| entry.key().0 == kind)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn stats(&self) -> Result<Stats> {
        let mut stats = Stats::default();
        for entry in self.storage.iter() {
            match entry.key().0 {
                ContentKind::File => {
                    stats.total_files += 1;
                    stats.total_downloads += u64::from(entry.value().current_uses);
                }
                ContentKind::Paste => stats.total_pastes += 1,
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn insert(&self, record: ContentRecord) -> Result<()> {
        match self.storage.entry(Self::key(record.kind(), &record.code)) {
            Entry::Occupied(entry) => Err(StorageError::Conflict(entry.key().1.to_string())),
            Entry::Vacant(entry) => {
                entry.insert(record);
                Ok(())
            }
        }
    }

    async fn consume(
        &self,
        kind: ContentKind,
        code: &Code,
        now: Timestamp,
    ) -> Result<Consumption> {
        // The entry guard holds the shard's write lock for the whole decision.
        match self.storage.entry(Self::key(kind, code)) {
            Entry::Vacant(_) => Ok(Consumption::NotFound),
            Entry::Occupied(mut entry) => match entry.get().liveness(now) {
                Liveness::TimedOut => Ok(Consumption::Expired(Some(entry.remove()))),
                Liveness::Exhausted => Ok(Consumption::Expired(None)),
                Liveness::Live => {
                    let record = entry.get_mut();
                    record.current_uses += 1;
                    Ok(Consumption::Served(record.clone()))
                }
            },
        }
    }

    async fn delete(&self, kind: ContentKind, code: &Code) -> Result<Option<ContentRecord>> {
        Ok(self
            .storage
            .remove(&Self::key(kind, code))
            .map(|(_, record)| record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::{PayloadRef, Quota, DEFAULT_TTL};
    use jiff::SignedDuration;
    use std::sync::Arc;

    fn code(s: &str) -> Code {
        Code::new_unchecked(s)
    }

    fn base_time() -> Timestamp {
        Timestamp::from_second(1_700_000_000).unwrap()
    }

    fn paste(c: &str, max_uses: i64) -> ContentRecord {
        ContentRecord::new(
            code(c),
            base_time(),
            DEFAULT_TTL,
            Quota::clamped(max_uses),
            PayloadRef::Text {
                content: format!("content of {c}"),
                lang: "plaintext".to_string(),
            },
        )
    }

    fn file(c: &str, max_uses: i64) -> ContentRecord {
        ContentRecord::new(
            code(c),
            base_time(),
            DEFAULT_TTL,
            Quota::clamped(max_uses),
            PayloadRef::Blob {
                file_name: "notes.txt".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn insert_and_get() {
        let repo = InMemoryRepository::new();

        repo.insert(paste("ABC234", 3)).await.unwrap();

        let result = repo
            .get(ContentKind::Paste, &code("ABC234"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, paste("ABC234", 3));
    }

    #[tokio::test]
    async fn get_nonexistent() {
        let repo = InMemoryRepository::new();

        let result = repo.get(ContentKind::Paste, &code("NOPE22")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn insert_conflict() {
        let repo = InMemoryRepository::new();

        repo.insert(paste("ABC234", 1)).await.unwrap();
        let err = repo.insert(paste("ABC234", 5)).await.unwrap_err();

        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn namespaces_are_separate_per_kind() {
        let repo = InMemoryRepository::new();

        repo.insert(file("234567", 1)).await.unwrap();
        repo.insert(paste("234567", 1)).await.unwrap();

        assert!(repo.exists(ContentKind::File, &code("234567")).await.unwrap());
        assert!(repo.exists(ContentKind::Paste, &code("234567")).await.unwrap());
        assert_eq!(repo.list(ContentKind::File).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn consume_increments_until_exhausted() {
        let repo = InMemoryRepository::new();
        repo.insert(paste("ABC234", 2)).await.unwrap();
        let now = base_time();

        let first = repo.consume(ContentKind::Paste, &code("ABC234"), now).await.unwrap();
        let Consumption::Served(record) = first else {
            panic!("expected first use to be served, got {first:?}");
        };
        assert_eq!(record.current_uses, 1);

        let second = repo.consume(ContentKind::Paste, &code("ABC234"), now).await.unwrap();
        let Consumption::Served(record) = second else {
            panic!("expected second use to be served, got {second:?}");
        };
        assert!(record.is_exhausted());

        let third = repo.consume(ContentKind::Paste, &code("ABC234"), now).await.unwrap();
        assert_eq!(third, Consumption::Expired(None));
    }

    #[tokio::test]
    async fn consume_unknown_code() {
        let repo = InMemoryRepository::new();

        let result = repo
            .consume(ContentKind::File, &code("123456"), base_time())
            .await
            .unwrap();
        assert_eq!(result, Consumption::NotFound);
    }

    #[tokio::test]
    async fn consume_after_ttl_removes_record_once() {
        let repo = InMemoryRepository::new();
        repo.insert(file("123456", 5)).await.unwrap();
        let later = base_time() + SignedDuration::from_hours(25);

        let first = repo.consume(ContentKind::File, &code("123456"), later).await.unwrap();
        assert!(matches!(first, Consumption::Expired(Some(_))));

        let second = repo.consume(ContentKind::File, &code("123456"), later).await.unwrap();
        assert_eq!(second, Consumption::NotFound);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let repo = InMemoryRepository::new();
        repo.insert(file("123456", 1)).await.unwrap();

        assert!(repo.delete(ContentKind::File, &code("123456")).await.unwrap().is_some());
        assert!(repo.delete(ContentKind::File, &code("123456")).await.unwrap().is_none());
        assert!(!repo.exists(ContentKind::File, &code("123456")).await.unwrap());
    }

    #[tokio::test]
    async fn stats_sum_file_downloads() {
        let repo = InMemoryRepository::new();
        repo.insert(file("123456", 5)).await.unwrap();
        repo.insert(file("654321", 5)).await.unwrap();
        repo.insert(paste("ABC234", 5)).await.unwrap();

        let now = base_time();
        repo.consume(ContentKind::File, &code("123456"), now).await.unwrap();
        repo.consume(ContentKind::File, &code("123456"), now).await.unwrap();
        repo.consume(ContentKind::File, &code("654321"), now).await.unwrap();
        repo.consume(ContentKind::Paste, &code("ABC234"), now).await.unwrap();

        let stats = repo.stats().await.unwrap();
        assert_eq!(
            stats,
            Stats {
                total_files: 2,
                total_pastes: 1,
                total_downloads: 3,
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn single_use_is_served_exactly_once_under_contention() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.insert(file("123456", 1)).await.unwrap();

        let mut handles = vec![];
        for _ in 0..64 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.consume(ContentKind::File, &code("123456"), base_time())
                    .await
                    .unwrap()
            }));
        }

        let mut served = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), Consumption::Served(_)) {
                served += 1;
            }
        }
        assert_eq!(served, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn quota_is_never_exceeded_under_contention() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.insert(paste("ABC234", 7)).await.unwrap();

        let mut handles = vec![];
        for _ in 0..50 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.consume(ContentKind::Paste, &code("ABC234"), base_time())
                    .await
                    .unwrap()
            }));
        }

        let mut served = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), Consumption::Served(_)) {
                served += 1;
            }
        }
        assert_eq!(served, 7);
    }
}
