//! Ingestion types: remote wire shapes, run state, progress and errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::store::{Card, CardSet, OpaqueDocument};

/// One page of the remote catalog's envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePage<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub page: u32,
    #[serde(default, alias = "pageSize")]
    pub page_size: u32,
    #[serde(default)]
    pub count: u32,
    #[serde(default, alias = "totalCount")]
    pub total_count: u32,
}

/// A card as the remote catalog serves it. Nearly every field is optional
/// in practice; mapping fills defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteCard {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub rarity: Option<String>,
    #[serde(default)]
    pub types: Option<Vec<String>>,
    #[serde(default)]
    pub subtypes: Option<Vec<String>>,
    #[serde(default)]
    pub set: Option<RemoteSetRef>,
    #[serde(default)]
    pub images: Option<Value>,
    #[serde(default)]
    pub tcgplayer: Option<Value>,
    #[serde(default)]
    pub cardmarket: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSetRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub series: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSet {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub series: String,
    #[serde(default, alias = "printedTotal")]
    pub printed_total: Option<u32>,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub legalities: Option<Value>,
    #[serde(default, alias = "ptcgoCode")]
    pub ptcgo_code: Option<String>,
    #[serde(default, alias = "releaseDate")]
    pub release_date: Option<String>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub images: Option<Value>,
}

fn opaque(value: Option<Value>) -> OpaqueDocument {
    match value {
        Some(v) => OpaqueDocument::new(v),
        None => OpaqueDocument::empty(),
    }
}

/// Map a remote card to a store row, defaulting every missing field.
pub fn map_card(remote: RemoteCard) -> Card {
    let set = remote.set.unwrap_or(RemoteSetRef {
        id: String::new(),
        name: String::new(),
        series: String::new(),
    });
    Card {
        id: remote.id,
        name: remote.name,
        set_name: set.name,
        set_id: set.id,
        series: set.series,
        number: remote.number,
        rarity: remote.rarity.unwrap_or_default(),
        types: remote.types.unwrap_or_default(),
        subtypes: remote.subtypes.unwrap_or_default(),
        images: opaque(remote.images),
        tcgplayer: opaque(remote.tcgplayer),
        cardmarket: opaque(remote.cardmarket),
        last_updated: Utc::now(),
    }
}

/// Map a remote set, defaulting `total` from `printed_total` and vice
/// versa when only one is present.
pub fn map_set(remote: RemoteSet) -> CardSet {
    let printed_total = remote.printed_total.or(remote.total).unwrap_or(0);
    let total = remote.total.or(remote.printed_total).unwrap_or(0);
    CardSet {
        id: remote.id,
        name: remote.name,
        series: remote.series,
        printed_total,
        total,
        legalities: opaque(remote.legalities),
        ptcgo_code: remote.ptcgo_code.unwrap_or_default(),
        release_date: remote.release_date.unwrap_or_default(),
        updated_at: remote.updated_at.unwrap_or_default(),
        images: opaque(remote.images),
    }
}

/// Run phase of the migration pipeline. Exactly one run per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationPhase {
    Idle,
    Running,
    Stopping,
}

/// Terminal or live status reported in a progress snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    Running,
    Completed,
    Stopped,
    Failed,
}

/// Snapshot of a migration run, served by the progress endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationProgress {
    pub run_id: Uuid,
    pub status: MigrationStatus,
    pub current_operation: String,
    pub sets_processed: u32,
    pub sets_total: u32,
    pub cards_processed: u32,
    pub cards_total: u32,
    pub error_count: u32,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<u64>,
}

impl MigrationProgress {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            status: MigrationStatus::Running,
            current_operation: "starting".to_string(),
            sets_processed: 0,
            sets_total: 0,
            cards_processed: 0,
            cards_total: 0,
            error_count: 0,
            started_at: Utc::now(),
            eta_seconds: None,
        }
    }

    /// Projected seconds remaining from the observed throughput.
    pub fn compute_eta(&self, now: DateTime<Utc>) -> Option<u64> {
        let processed = (self.cards_processed + self.sets_processed) as f64;
        let total = (self.cards_total + self.sets_total) as f64;
        if processed <= 0.0 || total <= processed {
            return None;
        }
        let elapsed = (now - self.started_at).num_seconds().max(0) as f64;
        let rate = processed / elapsed.max(1.0);
        Some(((total - processed) / rate).round() as u64)
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Migration already in progress")]
    MigrationInProgress,

    #[error("Remote catalog error: {0}")]
    Remote(#[from] super::client::RemoteCatalogError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_card_defaults_missing_fields() {
        let remote: RemoteCard = serde_json::from_value(json!({"id": "base1-4"})).unwrap();
        let card = map_card(remote);

        assert_eq!(card.id, "base1-4");
        assert_eq!(card.name, "");
        assert_eq!(card.rarity, "");
        assert!(card.types.is_empty());
        assert!(card.images.is_empty());
    }

    #[test]
    fn test_map_card_flattens_set_reference() {
        let remote: RemoteCard = serde_json::from_value(json!({
            "id": "base1-4",
            "name": "Charizard",
            "set": {"id": "base1", "name": "Base", "series": "Base"},
            "images": {"large": "char.png"},
        }))
        .unwrap();
        let card = map_card(remote);

        assert_eq!(card.set_id, "base1");
        assert_eq!(card.set_name, "Base");
        assert_eq!(card.images.payload["large"], "char.png");
    }

    #[test]
    fn test_map_set_total_defaulting() {
        let remote: RemoteSet =
            serde_json::from_value(json!({"id": "base1", "printedTotal": 102})).unwrap();
        let set = map_set(remote);
        assert_eq!(set.printed_total, 102);
        assert_eq!(set.total, 102);

        let remote: RemoteSet = serde_json::from_value(json!({"id": "base1"})).unwrap();
        let set = map_set(remote);
        assert_eq!(set.total, 0);
    }

    #[test]
    fn test_remote_page_envelope_aliases() {
        let page: RemotePage<RemoteCard> = serde_json::from_value(json!({
            "data": [{"id": "base1-4"}],
            "page": 1,
            "pageSize": 250,
            "count": 1,
            "totalCount": 400,
        }))
        .unwrap();
        assert_eq!(page.page_size, 250);
        assert_eq!(page.total_count, 400);
        assert_eq!(page.data.len(), 1);
    }

    #[test]
    fn test_eta_projection() {
        let mut progress = MigrationProgress::new(Uuid::new_v4());
        progress.cards_processed = 100;
        progress.cards_total = 300;
        let now = progress.started_at + chrono::Duration::seconds(10);

        // 100 in 10s leaves 200 at 10/s.
        assert_eq!(progress.compute_eta(now), Some(20));

        progress.cards_processed = 300;
        assert_eq!(progress.compute_eta(now), None);
    }
}
