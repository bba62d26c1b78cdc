use ferry_core::{
    ConsumeOutcome, ContentKind, Depot, FileUpload, ManualClock, PasteDraft, Quota,
    ReadRepository, StagedUpload,
};
use ferry_depot::{DepotConfig, DepotService};
use ferry_generator::RandomGenerator;
use ferry_storage::{BlobStore, SqliteRepository};
use jiff::{SignedDuration, Timestamp};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

async fn sqlite_depot(
    dir: &tempfile::TempDir,
) -> (
    DepotService<SqliteRepository, RandomGenerator, ManualClock>,
    ManualClock,
) {
    let repository = SqliteRepository::connect(dir.path().join("ferry.sqlite"))
        .await
        .unwrap();
    let blobs = BlobStore::open(dir.path().join("uploads")).await.unwrap();
    let clock = ManualClock::new(Timestamp::now());
    let config = DepotConfig::builder()
        .disposal_delay(Duration::from_millis(10))
        .build();

    let depot = DepotService::new(repository, RandomGenerator, blobs, config)
        .with_clock(clock.clone());
    (depot, clock)
}

async fn staged(depot: &impl Depot, body: &[u8]) -> StagedUpload {
    let mut staged = depot.stage_file().await.unwrap();
    for chunk in body.chunks(3) {
        staged.write_chunk(chunk).await.unwrap();
    }
    staged.finish().await.unwrap();
    staged
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creations_get_distinct_codes() {
    let dir = tempfile::tempdir().unwrap();
    let (depot, _) = sqlite_depot(&dir).await;
    let depot = Arc::new(depot);

    let mut handles = vec![];
    for i in 0..40 {
        let depot = Arc::clone(&depot);
        handles.push(tokio::spawn(async move {
            depot
                .create_paste(PasteDraft {
                    content: format!("paste {i}"),
                    lang: "plaintext".to_string(),
                    max_views: Quota::default(),
                })
                .await
                .unwrap()
                .code
        }));
    }

    let mut codes = HashSet::new();
    for handle in handles {
        assert!(codes.insert(handle.await.unwrap()));
    }
    assert_eq!(codes.len(), 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_use_file_is_served_once_under_contention() {
    let dir = tempfile::tempdir().unwrap();
    let (depot, _) = sqlite_depot(&dir).await;
    let depot = Arc::new(depot);

    let created = depot
        .create_file(FileUpload {
            original_name: "secret.bin".to_string(),
            staged: staged(&*depot, b"top secret").await,
            max_downloads: Quota::clamped(1),
        })
        .await
        .unwrap();

    let mut handles = vec![];
    for _ in 0..16 {
        let depot = Arc::clone(&depot);
        let code = created.code.clone();
        handles.push(tokio::spawn(async move {
            depot.consume(ContentKind::File, &code).await.unwrap().is_served()
        }));
    }

    let mut served = 0;
    for handle in handles {
        if handle.await.unwrap() {
            served += 1;
        }
    }
    assert_eq!(served, 1);

    depot.drain_disposals().await;
    assert!(depot.blobs().list().await.unwrap().is_empty());
    assert!(!depot
        .repository()
        .exists(ContentKind::File, &created.code)
        .await
        .unwrap());
}

#[tokio::test]
async fn sweep_after_a_day_clears_everything() {
    let dir = tempfile::tempdir().unwrap();
    let (depot, clock) = sqlite_depot(&dir).await;

    let file = depot
        .create_file(FileUpload {
            original_name: "report.pdf".to_string(),
            staged: staged(&depot, b"%PDF").await,
            max_downloads: Quota::clamped(10),
        })
        .await
        .unwrap();
    let paste = depot
        .create_paste(PasteDraft {
            content: "hello".to_string(),
            lang: "text".to_string(),
            max_views: Quota::clamped(10),
        })
        .await
        .unwrap();

    let report = depot.sweeper().sweep_once().await.unwrap();
    assert!(report.is_empty());

    clock.advance(SignedDuration::from_hours(25));
    let report = depot.sweeper().sweep_once().await.unwrap();
    assert_eq!(report.expired, 2);

    let outcome = depot.consume(ContentKind::File, &file.code).await.unwrap();
    assert!(matches!(
        outcome,
        ConsumeOutcome::NotFound | ConsumeOutcome::Expired
    ));
    let outcome = depot.consume(ContentKind::Paste, &paste.code).await.unwrap();
    assert!(matches!(
        outcome,
        ConsumeOutcome::NotFound | ConsumeOutcome::Expired
    ));
    assert!(depot.blobs().list().await.unwrap().is_empty());
}
