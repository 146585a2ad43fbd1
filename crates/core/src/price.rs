//! Price estimation.
//!
//! Pure, stateless lookup: marketplace data on the card wins when
//! present, otherwise a flat rarity table. No I/O, deliberately naive.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::Card;

/// Fallback price in USD for rarities missing from the table.
const DEFAULT_PRICE: f64 = 1.0;

const RARITY_PRICES: &[(&str, f64)] = &[
    ("common", 0.25),
    ("uncommon", 0.50),
    ("rare", 1.50),
    ("rare holo", 5.00),
    ("rare holo ex", 12.00),
    ("rare holo gx", 10.00),
    ("rare holo v", 8.00),
    ("rare holo vmax", 15.00),
    ("rare ultra", 18.00),
    ("rare secret", 35.00),
    ("rare rainbow", 30.00),
    ("amazing rare", 9.00),
    ("promo", 3.00),
];

/// Where an estimate came from, most trusted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Tcgplayer,
    Cardmarket,
    RarityTable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceEstimate {
    pub card_id: String,
    pub price: f64,
    pub currency: &'static str,
    pub source: PriceSource,
}

/// Estimate a card's market price.
pub fn estimate(card: &Card) -> PriceEstimate {
    if let Some(price) = tcgplayer_market(&card.tcgplayer.payload) {
        return PriceEstimate {
            card_id: card.id.clone(),
            price,
            currency: "USD",
            source: PriceSource::Tcgplayer,
        };
    }

    if let Some(price) = cardmarket_trend(&card.cardmarket.payload) {
        return PriceEstimate {
            card_id: card.id.clone(),
            price,
            currency: "EUR",
            source: PriceSource::Cardmarket,
        };
    }

    PriceEstimate {
        card_id: card.id.clone(),
        price: rarity_price(&card.rarity),
        currency: "USD",
        source: PriceSource::RarityTable,
    }
}

pub fn rarity_price(rarity: &str) -> f64 {
    let needle = rarity.to_lowercase();
    RARITY_PRICES
        .iter()
        .find(|(name, _)| *name == needle)
        .map(|(_, price)| *price)
        .unwrap_or(DEFAULT_PRICE)
}

/// First `market` value under `prices`, whichever printing variant the
/// marketplace listed first.
fn tcgplayer_market(payload: &Value) -> Option<f64> {
    let prices = payload.get("prices")?.as_object()?;
    for variant in prices.values() {
        if let Some(market) = variant.get("market").and_then(Value::as_f64) {
            return Some(market);
        }
    }
    None
}

fn cardmarket_trend(payload: &Value) -> Option<f64> {
    payload
        .get("prices")
        .and_then(|p| p.get("trendPrice"))
        .and_then(Value::as_f64)
        .or_else(|| payload.get("trendPrice").and_then(Value::as_f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::OpaqueDocument;
    use chrono::Utc;
    use serde_json::json;

    fn card(rarity: &str) -> Card {
        Card {
            id: "base1-4".to_string(),
            name: "Charizard".to_string(),
            set_name: "Base".to_string(),
            set_id: "base1".to_string(),
            series: "Base".to_string(),
            number: "4".to_string(),
            rarity: rarity.to_string(),
            types: vec![],
            subtypes: vec![],
            images: OpaqueDocument::empty(),
            tcgplayer: OpaqueDocument::empty(),
            cardmarket: OpaqueDocument::empty(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_tcgplayer_market_preferred() {
        let mut card = card("Rare Holo");
        card.tcgplayer = OpaqueDocument::new(json!({
            "prices": {"holofoil": {"low": 300.0, "market": 420.5}}
        }));
        card.cardmarket = OpaqueDocument::new(json!({"prices": {"trendPrice": 350.0}}));

        let estimate = estimate(&card);
        assert_eq!(estimate.price, 420.5);
        assert_eq!(estimate.source, PriceSource::Tcgplayer);
        assert_eq!(estimate.currency, "USD");
    }

    #[test]
    fn test_cardmarket_trend_fallback() {
        let mut card = card("Rare Holo");
        card.cardmarket = OpaqueDocument::new(json!({"prices": {"trendPrice": 350.0}}));

        let estimate = estimate(&card);
        assert_eq!(estimate.price, 350.0);
        assert_eq!(estimate.source, PriceSource::Cardmarket);
        assert_eq!(estimate.currency, "EUR");
    }

    #[test]
    fn test_rarity_table_fallback() {
        let estimate = estimate(&card("Rare Holo"));
        assert_eq!(estimate.price, 5.0);
        assert_eq!(estimate.source, PriceSource::RarityTable);

        assert_eq!(rarity_price("COMMON"), 0.25);
        assert_eq!(rarity_price("Totally Unknown"), DEFAULT_PRICE);
    }
}
