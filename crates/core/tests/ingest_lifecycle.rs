//! End-to-end migration pipeline tests against a mock remote catalog.

use std::sync::Arc;
use std::time::Duration;

use carddex_core::ingest::{CatalogMigrator, IngestError, MigrationPhase, MigrationState, MigrationStatus};
use carddex_core::testing::{fixtures, MockRemoteCatalog};
use carddex_core::{CardStore, IngestConfig, SqliteCardStore};

const PAGE_SIZE: u32 = 3;

fn fast_config() -> IngestConfig {
    IngestConfig {
        batch_size: 2,
        batch_delay_ms: 0,
        page_delay_ms: 0,
        max_retries: 3,
        backoff_base_ms: 1,
        backoff_cap_ms: 4,
        max_consecutive_failures: 3,
        start_page: 1,
    }
}

fn migrator(
    store: &Arc<SqliteCardStore>,
    remote: &Arc<MockRemoteCatalog>,
    config: IngestConfig,
) -> CatalogMigrator {
    CatalogMigrator::new(
        store.clone(),
        remote.clone(),
        config,
        PAGE_SIZE,
        Arc::new(MigrationState::new()),
    )
}

/// `n` pages, each holding exactly `PAGE_SIZE` cards.
fn full_pages(n: u32) -> Vec<Vec<carddex_core::ingest::RemoteCard>> {
    (0..n)
        .map(|p| {
            (0..PAGE_SIZE)
                .map(|i| {
                    fixtures::remote_card(&format!("base1-{}", p * PAGE_SIZE + i + 1), "Card")
                })
                .collect()
        })
        .collect()
}

fn two_page_catalog(remote: &MockRemoteCatalog) {
    remote.set_set_pages(vec![vec![fixtures::remote_set("base1", "Base")]]);
    remote.set_card_pages(vec![
        vec![
            fixtures::remote_card("base1-1", "Alakazam"),
            fixtures::remote_card("base1-2", "Blastoise"),
            fixtures::remote_card("base1-3", "Chansey"),
        ],
        vec![
            fixtures::remote_card("base1-4", "Charizard"),
            fixtures::remote_card("base1-5", "Clefairy"),
            fixtures::remote_card("base1-6", "Gyarados"),
        ],
    ]);
}

async fn wait_until_idle(migrator: &CatalogMigrator) {
    for _ in 0..500 {
        if migrator.state().phase() == MigrationPhase::Idle {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("migration did not finish within 5s");
}

#[tokio::test]
async fn test_two_page_ingest_lands_all_rows() {
    let store = Arc::new(SqliteCardStore::in_memory().unwrap());
    let remote = Arc::new(MockRemoteCatalog::new());
    two_page_catalog(&remote);

    let migrator = migrator(&store, &remote, fast_config());
    migrator.start().unwrap();
    wait_until_idle(&migrator).await;

    let stats = store.stats().unwrap();
    assert_eq!(stats.card_count, 6);
    assert_eq!(stats.set_count, 1);

    let progress = migrator.progress().unwrap();
    assert_eq!(progress.status, MigrationStatus::Completed);
    assert_eq!(progress.cards_processed, 6);
    assert_eq!(progress.cards_total, 6);
    assert_eq!(progress.error_count, 0);

    // A clean finish leaves no checkpoint behind.
    assert_eq!(store.checkpoint("cards").unwrap(), None);
    assert_eq!(store.checkpoint("sets").unwrap(), None);
}

#[tokio::test]
async fn test_reingest_converges_and_applies_renames() {
    let store = Arc::new(SqliteCardStore::in_memory().unwrap());
    let remote = Arc::new(MockRemoteCatalog::new());
    two_page_catalog(&remote);

    let migrator = migrator(&store, &remote, fast_config());
    migrator.start().unwrap();
    wait_until_idle(&migrator).await;

    // Second pass serves only page 1, with one record renamed.
    remote.set_card_pages(vec![vec![
        fixtures::remote_card("base1-1", "Alakazam EX"),
        fixtures::remote_card("base1-2", "Blastoise"),
        fixtures::remote_card("base1-3", "Chansey"),
    ]]);
    migrator.start().unwrap();
    wait_until_idle(&migrator).await;

    assert_eq!(store.stats().unwrap().card_count, 6);
    assert_eq!(
        store.get_card("base1-1").unwrap().unwrap().name,
        "Alakazam EX"
    );
    assert_eq!(
        store.get_card("base1-4").unwrap().unwrap().name,
        "Charizard"
    );
}

#[tokio::test]
async fn test_start_fails_while_running() {
    let store = Arc::new(SqliteCardStore::in_memory().unwrap());
    let remote = Arc::new(MockRemoteCatalog::new());
    // Enough full pages with a real inter-page delay to keep the run alive.
    remote.set_card_pages(full_pages(30));

    let config = IngestConfig {
        page_delay_ms: 50,
        ..fast_config()
    };
    let migrator = migrator(&store, &remote, config);
    migrator.start().unwrap();

    let err = migrator.start().unwrap_err();
    assert!(matches!(err, IngestError::MigrationInProgress));

    migrator.stop();
    wait_until_idle(&migrator).await;
}

#[tokio::test]
async fn test_cooperative_stop_at_page_boundary() {
    let store = Arc::new(SqliteCardStore::in_memory().unwrap());
    let remote = Arc::new(MockRemoteCatalog::new());
    remote.set_card_pages(full_pages(50));

    let config = IngestConfig {
        page_delay_ms: 50,
        ..fast_config()
    };
    let migrator = migrator(&store, &remote, config);
    migrator.start().unwrap();

    // Let at least one page land before asking for the stop.
    for _ in 0..500 {
        if migrator
            .progress()
            .is_some_and(|p| p.cards_processed > 0)
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(migrator.stop());
    wait_until_idle(&migrator).await;

    let progress = migrator.progress().unwrap();
    assert_eq!(progress.status, MigrationStatus::Stopped);
    let count = store.stats().unwrap().card_count;
    assert!(count > 0 && count < 150, "stopped mid-run, got {count}");
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let store = Arc::new(SqliteCardStore::in_memory().unwrap());
    let remote = Arc::new(MockRemoteCatalog::new());
    two_page_catalog(&remote);
    remote.fail_card_page(1, 2);

    let migrator = migrator(&store, &remote, fast_config());
    migrator.start().unwrap();
    wait_until_idle(&migrator).await;

    let progress = migrator.progress().unwrap();
    assert_eq!(progress.status, MigrationStatus::Completed);
    assert_eq!(progress.error_count, 2);
    assert_eq!(store.stats().unwrap().card_count, 6);
    // Two failed attempts plus the retry that succeeded, plus page 2.
    assert!(remote.card_fetch_count() >= 4);
}

#[tokio::test]
async fn test_failed_page_is_retried_before_advancing() {
    let store = Arc::new(SqliteCardStore::in_memory().unwrap());
    let remote = Arc::new(MockRemoteCatalog::new());
    two_page_catalog(&remote);
    // Page 1 exhausts its per-fetch retries once, then recovers.
    remote.fail_card_page(1, 1);

    let config = IngestConfig {
        max_retries: 0,
        ..fast_config()
    };
    let migrator = migrator(&store, &remote, config);
    migrator.start().unwrap();
    wait_until_idle(&migrator).await;

    let progress = migrator.progress().unwrap();
    assert_eq!(progress.status, MigrationStatus::Completed);
    assert_eq!(progress.error_count, 1);
    // The failed page was re-attempted, not skipped over.
    assert!(store.get_card("base1-1").unwrap().is_some());
    assert_eq!(store.stats().unwrap().card_count, 6);
}

#[tokio::test]
async fn test_circuit_breaker_aborts_after_consecutive_failures() {
    let store = Arc::new(SqliteCardStore::in_memory().unwrap());
    let remote = Arc::new(MockRemoteCatalog::new());
    remote.set_card_pages(
        (1..=5)
            .map(|n| vec![fixtures::remote_card(&format!("base1-{}", n), "Card")])
            .collect(),
    );
    for page in 1..=3 {
        remote.fail_card_page(page, u32::MAX);
    }

    let config = IngestConfig {
        max_retries: 0,
        ..fast_config()
    };
    let migrator = migrator(&store, &remote, config);
    migrator.start().unwrap();
    wait_until_idle(&migrator).await;

    let progress = migrator.progress().unwrap();
    assert_eq!(progress.status, MigrationStatus::Failed);
    assert_eq!(store.stats().unwrap().card_count, 0);
}

#[tokio::test]
async fn test_resume_from_persisted_checkpoint() {
    let store = Arc::new(SqliteCardStore::in_memory().unwrap());
    let remote = Arc::new(MockRemoteCatalog::new());
    two_page_catalog(&remote);

    // A previous run completed page 1 before being interrupted.
    store.save_checkpoint("cards", 1).unwrap();

    let migrator = migrator(&store, &remote, fast_config());
    migrator.start().unwrap();
    wait_until_idle(&migrator).await;

    assert_eq!(
        migrator.progress().unwrap().status,
        MigrationStatus::Completed
    );
    // Page 1 was skipped entirely.
    assert!(store.get_card("base1-1").unwrap().is_none());
    assert!(store.get_card("base1-4").unwrap().is_some());
    assert_eq!(store.stats().unwrap().card_count, 3);
    assert_eq!(store.checkpoint("cards").unwrap(), None);
}
