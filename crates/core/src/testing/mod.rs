//! Testing utilities and mock implementations.
//!
//! Mocks for the external seams, so pipeline and server tests run
//! without real infrastructure.

mod mock_remote_catalog;

pub use mock_remote_catalog::MockRemoteCatalog;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;
    use serde_json::json;

    use crate::ingest::{RemoteCard, RemoteSet};
    use crate::store::{Card, CardSet, OpaqueDocument};

    pub fn card(id: &str, name: &str) -> Card {
        let set_id = id.split('-').next().unwrap_or("").to_string();
        Card {
            id: id.to_string(),
            name: name.to_string(),
            set_name: "Base".to_string(),
            set_id,
            series: "Base".to_string(),
            number: id.split('-').nth(1).unwrap_or("1").to_string(),
            rarity: "Common".to_string(),
            types: vec!["Colorless".to_string()],
            subtypes: vec![],
            images: OpaqueDocument::empty(),
            tcgplayer: OpaqueDocument::empty(),
            cardmarket: OpaqueDocument::empty(),
            last_updated: Utc::now(),
        }
    }

    pub fn card_set(id: &str, name: &str) -> CardSet {
        CardSet {
            id: id.to_string(),
            name: name.to_string(),
            series: "Base".to_string(),
            printed_total: 102,
            total: 102,
            legalities: OpaqueDocument::empty(),
            ptcgo_code: String::new(),
            release_date: "1999/01/09".to_string(),
            updated_at: String::new(),
            images: OpaqueDocument::empty(),
        }
    }

    pub fn remote_card(id: &str, name: &str) -> RemoteCard {
        serde_json::from_value(json!({
            "id": id,
            "name": name,
            "number": id.split('-').nth(1).unwrap_or("1"),
            "rarity": "Common",
            "set": {"id": id.split('-').next().unwrap_or(""), "name": "Base", "series": "Base"},
        }))
        .expect("fixture card is valid")
    }

    pub fn remote_set(id: &str, name: &str) -> RemoteSet {
        serde_json::from_value(json!({
            "id": id,
            "name": name,
            "series": "Base",
            "printedTotal": 102,
            "total": 102,
        }))
        .expect("fixture set is valid")
    }
}
