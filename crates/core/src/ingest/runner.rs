//! Catalog migration pipeline.
//!
//! Pulls the remote catalog page by page and upserts it into the local
//! store. Exactly one run per process; the run state lives in an
//! explicit, injectable [`MigrationState`] holder rather than a global.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::IngestConfig;
use crate::store::CardStore;

use super::client::RemoteCatalog;
use super::types::{
    map_card, map_set, IngestError, MigrationPhase, MigrationProgress, MigrationStatus,
};

const SETS_RESOURCE: &str = "sets";
const CARDS_RESOURCE: &str = "cards";

/// Shared run state: the phase gate plus the latest progress snapshot.
pub struct MigrationState {
    phase: Mutex<MigrationPhase>,
    progress: Mutex<Option<MigrationProgress>>,
}

impl Default for MigrationState {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationState {
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(MigrationPhase::Idle),
            progress: Mutex::new(None),
        }
    }

    pub fn phase(&self) -> MigrationPhase {
        *self.phase.lock().unwrap()
    }

    /// Atomically claim the run slot. Fails when a run is already active.
    fn try_begin(&self, run_id: Uuid) -> Result<(), IngestError> {
        let mut phase = self.phase.lock().unwrap();
        if *phase != MigrationPhase::Idle {
            return Err(IngestError::MigrationInProgress);
        }
        *phase = MigrationPhase::Running;
        *self.progress.lock().unwrap() = Some(MigrationProgress::new(run_id));
        Ok(())
    }

    /// Ask a running migration to stop at the next page boundary.
    pub fn request_stop(&self) -> bool {
        let mut phase = self.phase.lock().unwrap();
        if *phase == MigrationPhase::Running {
            *phase = MigrationPhase::Stopping;
            true
        } else {
            false
        }
    }

    fn stop_requested(&self) -> bool {
        *self.phase.lock().unwrap() == MigrationPhase::Stopping
    }

    fn finish(&self, status: MigrationStatus) {
        self.update(|p| {
            p.status = status;
            p.eta_seconds = None;
        });
        *self.phase.lock().unwrap() = MigrationPhase::Idle;
    }

    fn update<F: FnOnce(&mut MigrationProgress)>(&self, f: F) {
        if let Some(progress) = self.progress.lock().unwrap().as_mut() {
            f(progress);
        }
    }

    /// Latest snapshot, with the ETA projected at call time for live runs.
    pub fn progress(&self) -> Option<MigrationProgress> {
        let mut snapshot = self.progress.lock().unwrap().clone()?;
        if snapshot.status == MigrationStatus::Running {
            snapshot.eta_seconds = snapshot.compute_eta(Utc::now());
        }
        Some(snapshot)
    }
}

/// Drives one full catalog migration: sets first, then cards.
#[derive(Clone)]
pub struct CatalogMigrator {
    store: Arc<dyn CardStore>,
    remote: Arc<dyn RemoteCatalog>,
    config: IngestConfig,
    page_size: u32,
    state: Arc<MigrationState>,
}

impl CatalogMigrator {
    pub fn new(
        store: Arc<dyn CardStore>,
        remote: Arc<dyn RemoteCatalog>,
        config: IngestConfig,
        page_size: u32,
        state: Arc<MigrationState>,
    ) -> Self {
        Self {
            store,
            remote,
            config,
            page_size,
            state,
        }
    }

    pub fn state(&self) -> &Arc<MigrationState> {
        &self.state
    }

    pub fn progress(&self) -> Option<MigrationProgress> {
        self.state.progress()
    }

    /// Start a migration in the background. Fails fast when one is
    /// already active.
    pub fn start(&self) -> Result<Uuid, IngestError> {
        let run_id = Uuid::new_v4();
        self.state.try_begin(run_id)?;
        info!(%run_id, "Starting catalog migration");

        let migrator = self.clone();
        tokio::spawn(async move {
            let status = match migrator.run().await {
                Ok(status) => status,
                Err(e) => {
                    error!(error = %e, "Catalog migration failed");
                    migrator.state.update(|p| p.error_count += 1);
                    MigrationStatus::Failed
                }
            };
            info!(?status, "Catalog migration finished");
            migrator.state.finish(status);
        });

        Ok(run_id)
    }

    /// Cooperative stop, honored at page boundaries. In-flight requests
    /// are not aborted.
    pub fn stop(&self) -> bool {
        self.state.request_stop()
    }

    async fn run(&self) -> Result<MigrationStatus, IngestError> {
        for resource in [SETS_RESOURCE, CARDS_RESOURCE] {
            match self.ingest_resource(resource).await? {
                MigrationStatus::Completed => {}
                other => return Ok(other),
            }
        }

        // A clean finish invalidates the checkpoints so the next run
        // starts from the beginning.
        self.store.clear_checkpoint(SETS_RESOURCE)?;
        self.store.clear_checkpoint(CARDS_RESOURCE)?;
        Ok(MigrationStatus::Completed)
    }

    async fn ingest_resource(&self, resource: &str) -> Result<MigrationStatus, IngestError> {
        // Resume after the last fully ingested page, if any.
        let mut page = match self.store.checkpoint(resource)? {
            Some(done) => done + 1,
            None => self.config.start_page,
        };
        let mut consecutive_failures = 0u32;

        loop {
            if self.state.stop_requested() {
                info!(resource, page, "Migration stopped on request");
                return Ok(MigrationStatus::Stopped);
            }

            self.state.update(|p| {
                p.current_operation = format!("fetching {} page {}", resource, page)
            });

            let outcome = match resource {
                SETS_RESOURCE => self.ingest_sets_page(page).await,
                _ => self.ingest_cards_page(page).await,
            };

            match outcome {
                Ok(PageOutcome { fetched, total }) => {
                    consecutive_failures = 0;
                    self.store.save_checkpoint(resource, page)?;

                    if (page * self.page_size) >= total || fetched < self.page_size as usize {
                        return Ok(MigrationStatus::Completed);
                    }
                    page += 1;
                }
                Err(e) => {
                    // Stay on the failed page: advancing would checkpoint
                    // past it on the next success and lose its records.
                    consecutive_failures += 1;
                    self.state.update(|p| p.error_count += 1);
                    warn!(
                        resource,
                        page,
                        consecutive_failures,
                        error = %e,
                        "Page ingest failed"
                    );
                    if consecutive_failures >= self.config.max_consecutive_failures {
                        error!(resource, "Too many consecutive page failures, aborting");
                        return Ok(MigrationStatus::Failed);
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(self.config.page_delay_ms)).await;
        }
    }

    async fn ingest_sets_page(&self, page: u32) -> Result<PageOutcome, IngestError> {
        let remote_page = self
            .fetch_with_retry(|| self.remote.fetch_sets(page, self.page_size))
            .await?;
        let total = remote_page.total_count;
        let sets: Vec<_> = remote_page.data.into_iter().map(map_set).collect();
        let fetched = sets.len();

        for batch in sets.chunks(self.config.batch_size as usize) {
            let outcome = self.store.upsert_sets(batch)?;
            self.state.update(|p| {
                p.sets_processed += outcome.inserted + outcome.updated;
                p.sets_total = total;
                p.error_count += outcome.failed;
            });
            tokio::time::sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
        }

        Ok(PageOutcome { fetched, total })
    }

    async fn ingest_cards_page(&self, page: u32) -> Result<PageOutcome, IngestError> {
        let remote_page = self
            .fetch_with_retry(|| self.remote.fetch_cards(page, self.page_size))
            .await?;
        let total = remote_page.total_count;
        let cards: Vec<_> = remote_page.data.into_iter().map(map_card).collect();
        let fetched = cards.len();

        for batch in cards.chunks(self.config.batch_size as usize) {
            let outcome = self.store.upsert_cards(batch)?;
            self.state.update(|p| {
                p.cards_processed += outcome.inserted + outcome.updated;
                p.cards_total = total;
                p.error_count += outcome.failed;
            });
            tokio::time::sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
        }

        Ok(PageOutcome { fetched, total })
    }

    /// Retry transient remote failures with bounded exponential backoff.
    async fn fetch_with_retry<T, F, Fut>(&self, fetch: F) -> Result<T, IngestError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, super::client::RemoteCatalogError>>,
    {
        let mut attempt = 0u32;
        loop {
            match fetch().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = backoff_delay(&self.config, attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "Transient remote failure, retrying");
                    self.state.update(|p| p.error_count += 1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

struct PageOutcome {
    fetched: usize,
    total: u32,
}

fn backoff_delay(config: &IngestConfig, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.min(16);
    let ms = config.backoff_base_ms.saturating_mul(factor);
    Duration::from_millis(ms.min(config.backoff_cap_ms))
}
