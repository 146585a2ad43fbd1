//! Query engine: cached, API-shaped reads over a [`CardStore`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::SearchConfig;
use crate::search::cache::{Clock, SearchCache, SystemClock};
use crate::search::plan::{PlanLimits, QueryPlan, SearchRequest};
use crate::store::{
    Card, CardSet, CardStore, Facet, StoreError, StoreStats, Suggestion, PLACEHOLDER_IMAGE_URL,
};

const SUGGESTION_LIMIT_MAX: u32 = 50;
const SIMILAR_LIMIT_MAX: u32 = 50;

/// One page of results, shaped for the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    fn new(data: Vec<T>, total_count: u64, page: u32, page_size: u32) -> Self {
        let total_pages = total_count.div_ceil(page_size.max(1) as u64);
        Self {
            data,
            total_count,
            page,
            page_size,
            total_pages,
        }
    }
}

/// A card as the API returns it: always fully shaped, never a raw null
/// where the contract promises a structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDocument {
    pub id: String,
    pub name: String,
    pub set_name: String,
    pub set_id: String,
    pub series: String,
    pub number: String,
    pub rarity: String,
    pub types: Vec<String>,
    pub subtypes: Vec<String>,
    pub language: String,
    pub images: Value,
    pub tcgplayer: Value,
    pub cardmarket: Value,
    pub last_updated: String,
}

impl From<Card> for CardDocument {
    fn from(card: Card) -> Self {
        let language = card.language().unwrap_or("en").to_string();
        let images = if card.images.is_empty() {
            serde_json::json!({
                "small": PLACEHOLDER_IMAGE_URL,
                "large": PLACEHOLDER_IMAGE_URL,
            })
        } else {
            card.images.payload
        };
        let empty_object = || Value::Object(serde_json::Map::new());
        let tcgplayer = if card.tcgplayer.is_empty() {
            empty_object()
        } else {
            card.tcgplayer.payload
        };
        let cardmarket = if card.cardmarket.is_empty() {
            empty_object()
        } else {
            card.cardmarket.payload
        };

        Self {
            id: card.id,
            name: card.name,
            set_name: card.set_name,
            set_id: card.set_id,
            series: card.series,
            number: card.number,
            rarity: card.rarity,
            types: card.types,
            subtypes: card.subtypes,
            language,
            images,
            tcgplayer,
            cardmarket,
            last_updated: card.last_updated.to_rfc3339(),
        }
    }
}

/// A set as the API returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDocument {
    pub id: String,
    pub name: String,
    pub series: String,
    pub printed_total: u32,
    pub total: u32,
    pub legalities: Value,
    pub ptcgo_code: String,
    pub release_date: String,
    pub updated_at: String,
    pub images: Value,
}

impl From<CardSet> for SetDocument {
    fn from(set: CardSet) -> Self {
        Self {
            id: set.id,
            name: set.name,
            series: set.series,
            printed_total: set.printed_total,
            total: set.total,
            legalities: set.legalities.payload,
            ptcgo_code: set.ptcgo_code,
            release_date: set.release_date,
            updated_at: set.updated_at,
            images: set.images.payload,
        }
    }
}

/// Unpaged listing, used for sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing<T> {
    pub data: Vec<T>,
    pub total_count: u64,
}

/// Cache counters surfaced through the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Engine + store health snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub store: StoreStats,
    pub cache: CacheStats,
}

/// Cached query engine over a pluggable store.
pub struct SearchEngine {
    store: Arc<dyn CardStore>,
    cache: SearchCache,
    limits: PlanLimits,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn CardStore>, config: &SearchConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn CardStore>,
        config: &SearchConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            cache: SearchCache::new(
                Duration::from_secs(config.cache_ttl_secs),
                config.cache_capacity,
                clock,
            ),
            limits: PlanLimits {
                default_page_size: config.default_page_size,
                max_page_size: config.max_page_size,
            },
        }
    }

    /// Run a search, serving repeats from the result cache within the TTL.
    /// Shuffled results are cached too; within the TTL the draw repeats.
    pub fn search(&self, request: &SearchRequest) -> Result<Page<CardDocument>, StoreError> {
        let plan = QueryPlan::resolve(request, &self.limits);
        let key = format!("search:{}", plan.cache_key());
        self.cached(&key, || {
            let (cards, total) = self.store.search(&plan)?;
            let documents = cards.into_iter().map(CardDocument::from).collect();
            Ok(Page::new(documents, total, plan.page, plan.page_size))
        })
    }

    pub fn get_card(&self, id: &str) -> Result<Option<CardDocument>, StoreError> {
        self.cached(&format!("card:{}", id), || {
            Ok(self.store.get_card(id)?.map(CardDocument::from))
        })
    }

    pub fn list_sets(&self) -> Result<Listing<SetDocument>, StoreError> {
        self.cached("sets", || {
            let sets = self.store.list_sets()?;
            let total_count = sets.len() as u64;
            Ok(Listing {
                data: sets.into_iter().map(SetDocument::from).collect(),
                total_count,
            })
        })
    }

    pub fn facet_values(&self, facet: Facet) -> Result<Vec<String>, StoreError> {
        self.cached(&format!("facet:{}", facet.as_str()), || {
            self.store.facet_values(facet)
        })
    }

    pub fn suggestions(&self, text: &str, limit: u32) -> Result<Vec<Suggestion>, StoreError> {
        let limit = limit.clamp(1, SUGGESTION_LIMIT_MAX);
        self.cached(&format!("suggest:{}:{}", text.to_lowercase(), limit), || {
            self.store.suggestions(text, limit)
        })
    }

    pub fn similar(&self, id: &str, limit: u32) -> Result<Vec<CardDocument>, StoreError> {
        let limit = limit.clamp(1, SIMILAR_LIMIT_MAX);
        self.cached(&format!("similar:{}:{}", id, limit), || {
            let cards = self.store.similar(id, limit)?;
            Ok(cards.into_iter().map(CardDocument::from).collect())
        })
    }

    /// Never cached; the status endpoint wants live numbers.
    pub fn stats(&self) -> Result<EngineStats, StoreError> {
        Ok(EngineStats {
            store: self.store.stats()?,
            cache: CacheStats {
                entries: self.cache.len(),
                hits: self.cache.hits(),
                misses: self.cache.misses(),
            },
        })
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn cached<T, F>(&self, key: &str, load: F) -> Result<T, StoreError>
    where
        T: Serialize + for<'de> Deserialize<'de>,
        F: FnOnce() -> Result<T, StoreError>,
    {
        if let Some(hit) = self.cache.get(key) {
            debug!(key, "Cache hit");
            return serde_json::from_value(hit)
                .map_err(|e| StoreError::Internal(format!("cache decode: {}", e)));
        }
        let value = load()?;
        let encoded = serde_json::to_value(&value)
            .map_err(|e| StoreError::Internal(format!("cache encode: {}", e)))?;
        self.cache.put(key.to_string(), encoded);
        Ok(value)
    }
}
