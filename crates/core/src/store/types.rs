//! Types for the local card store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Image URL served when a card row has no stored image document.
pub const PLACEHOLDER_IMAGE_URL: &str = "https://images.pokemontcg.io/placeholder.png";

/// Schema version written into every encoded opaque document.
pub const OPAQUE_DOCUMENT_VERSION: u16 = 1;

/// A nested document (pricing, images, legalities) stored and returned
/// without the core interpreting its internal shape.
///
/// Encoded as `{"v": <version>, "d": <payload>}`. Decoding tolerates both
/// the envelope and bare legacy JSON objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpaqueDocument {
    pub version: u16,
    pub payload: Value,
}

impl Default for OpaqueDocument {
    fn default() -> Self {
        Self::empty()
    }
}

impl OpaqueDocument {
    pub fn empty() -> Self {
        Self {
            version: OPAQUE_DOCUMENT_VERSION,
            payload: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn new(payload: Value) -> Self {
        Self {
            version: OPAQUE_DOCUMENT_VERSION,
            payload,
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.payload {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Serialize for storage. Empty documents encode as the empty string so
    /// presence filters reduce to a plain column comparison.
    pub fn encode(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        serde_json::json!({ "v": self.version, "d": self.payload }).to_string()
    }

    /// Decode a stored column value. Unknown or malformed input yields an
    /// empty document rather than an error; a read path never fails on a
    /// sparse row.
    pub fn decode(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::empty();
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => {
                if let (Some(v), Some(d)) = (map.get("v"), map.get("d")) {
                    let version = v.as_u64().unwrap_or(OPAQUE_DOCUMENT_VERSION as u64) as u16;
                    return Self {
                        version,
                        payload: d.clone(),
                    };
                }
                // Legacy rows stored the payload bare.
                Self::new(Value::Object(map))
            }
            Ok(other) => Self::new(other),
            Err(_) => Self::empty(),
        }
    }
}

/// One tradable catalog entry. Set metadata is denormalized onto every row
/// so the common search path never joins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    /// Globally unique id, `{setId}-{number}[-{languageSuffix}]`.
    pub id: String,
    pub name: String,
    pub set_name: String,
    pub set_id: String,
    pub series: String,
    /// Collector number; may contain letters.
    pub number: String,
    /// Open enumeration; unknown values allowed.
    pub rarity: String,
    pub types: Vec<String>,
    pub subtypes: Vec<String>,
    pub images: OpaqueDocument,
    pub tcgplayer: OpaqueDocument,
    pub cardmarket: OpaqueDocument,
    pub last_updated: DateTime<Utc>,
}

impl Card {
    /// Language suffix derived from the id convention; `None` means the
    /// default (English) printing.
    pub fn language(&self) -> Option<&str> {
        let mut parts = self.id.split('-');
        let _set = parts.next()?;
        let _number = parts.next()?;
        parts.next_back()
    }

    pub fn primary_type(&self) -> Option<&str> {
        self.types.first().map(String::as_str)
    }
}

/// One catalog expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardSet {
    pub id: String,
    pub name: String,
    pub series: String,
    pub printed_total: u32,
    pub total: u32,
    pub legalities: OpaqueDocument,
    pub ptcgo_code: String,
    pub release_date: String,
    pub updated_at: String,
    pub images: OpaqueDocument,
}

/// Autocomplete suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    pub kind: SuggestionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Card,
    Set,
    Series,
}

/// A distinct-values listing for one filterable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    Types,
    Rarities,
    Subtypes,
    Languages,
    Series,
}

impl Facet {
    pub fn as_str(&self) -> &'static str {
        match self {
            Facet::Types => "types",
            Facet::Rarities => "rarities",
            Facet::Subtypes => "subtypes",
            Facet::Languages => "languages",
            Facet::Series => "series",
        }
    }
}

/// Outcome of one upsert batch. Per-record failures are counted, not fatal.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOutcome {
    /// Rows inserted for the first time.
    pub inserted: u32,
    /// Rows that already existed and were overwritten.
    pub updated: u32,
    /// Rows skipped because the individual write failed.
    pub failed: u32,
}

/// Store statistics for the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub card_count: u64,
    pub set_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Errors for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
