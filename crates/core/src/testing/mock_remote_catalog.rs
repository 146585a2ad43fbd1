//! Mock remote catalog for pipeline tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::ingest::{RemoteCard, RemoteCatalog, RemoteCatalogError, RemotePage, RemoteSet};

/// In-memory paginated catalog with scriptable failures.
#[derive(Default)]
pub struct MockRemoteCatalog {
    set_pages: Mutex<Vec<Vec<RemoteSet>>>,
    card_pages: Mutex<Vec<Vec<RemoteCard>>>,
    /// page number -> remaining failures to inject before succeeding.
    card_failures: Mutex<HashMap<u32, u32>>,
    set_fetches: AtomicUsize,
    card_fetches: AtomicUsize,
}

impl MockRemoteCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_set_pages(&self, pages: Vec<Vec<RemoteSet>>) {
        *self.set_pages.lock().unwrap() = pages;
    }

    pub fn set_card_pages(&self, pages: Vec<Vec<RemoteCard>>) {
        *self.card_pages.lock().unwrap() = pages;
    }

    /// Make card page `page` fail `times` times before succeeding. Use a
    /// large count to keep it failing.
    pub fn fail_card_page(&self, page: u32, times: u32) {
        self.card_failures.lock().unwrap().insert(page, times);
    }

    pub fn card_fetch_count(&self) -> usize {
        self.card_fetches.load(Ordering::SeqCst)
    }

    pub fn set_fetch_count(&self) -> usize {
        self.set_fetches.load(Ordering::SeqCst)
    }

    fn page_of<T: Clone>(pages: &[Vec<T>], page: u32, page_size: u32) -> RemotePage<T> {
        let total_count: u32 = pages.iter().map(|p| p.len() as u32).sum();
        let data = pages
            .get(page.saturating_sub(1) as usize)
            .cloned()
            .unwrap_or_default();
        RemotePage {
            count: data.len() as u32,
            data,
            page,
            page_size,
            total_count,
        }
    }
}

#[async_trait]
impl RemoteCatalog for MockRemoteCatalog {
    async fn fetch_sets(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<RemotePage<RemoteSet>, RemoteCatalogError> {
        self.set_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(Self::page_of(&self.set_pages.lock().unwrap(), page, page_size))
    }

    async fn fetch_cards(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<RemotePage<RemoteCard>, RemoteCatalogError> {
        self.card_fetches.fetch_add(1, Ordering::SeqCst);

        let mut failures = self.card_failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(&page) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RemoteCatalogError::ApiError {
                    status: 503,
                    message: "injected failure".to_string(),
                });
            }
        }
        drop(failures);

        Ok(Self::page_of(&self.card_pages.lock().unwrap(), page, page_size))
    }
}
