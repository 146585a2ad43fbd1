//! SQLite-backed card store.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection};
use tracing::{debug, warn};

use crate::search::plan::QueryPlan;
use crate::store::dialect::{SqlDialect, SqliteDialect};
use crate::store::query::QueryBuilder;
use crate::store::types::{
    BatchOutcome, Card, CardSet, Facet, OpaqueDocument, StoreError, StoreStats, Suggestion,
    SuggestionKind,
};
use crate::store::CardStore;

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Catalog store over a single SQLite connection.
pub struct SqliteCardStore {
    conn: Mutex<Connection>,
    dialect: SqliteDialect,
}

impl SqliteCardStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
            dialect: SqliteDialect,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            dialect: SqliteDialect,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Idempotent schema setup; safe to run on every startup.
    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cards (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                set_name TEXT NOT NULL DEFAULT '',
                set_id TEXT NOT NULL DEFAULT '',
                series TEXT NOT NULL DEFAULT '',
                number TEXT NOT NULL DEFAULT '',
                rarity TEXT NOT NULL DEFAULT '',
                types TEXT NOT NULL DEFAULT '',
                subtypes TEXT NOT NULL DEFAULT '',
                images TEXT NOT NULL DEFAULT '',
                tcgplayer TEXT NOT NULL DEFAULT '',
                cardmarket TEXT NOT NULL DEFAULT '',
                last_updated TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS sets (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                series TEXT NOT NULL DEFAULT '',
                printed_total INTEGER NOT NULL DEFAULT 0,
                total INTEGER NOT NULL DEFAULT 0,
                legalities TEXT NOT NULL DEFAULT '',
                ptcgo_code TEXT NOT NULL DEFAULT '',
                release_date TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL DEFAULT '',
                images TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS migration_checkpoint (
                resource TEXT PRIMARY KEY,
                last_page INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_cards_name ON cards(name);
            CREATE INDEX IF NOT EXISTS idx_cards_set_name ON cards(set_name);
            CREATE INDEX IF NOT EXISTS idx_cards_set_id ON cards(set_id);
            CREATE INDEX IF NOT EXISTS idx_cards_series ON cards(series);
            CREATE INDEX IF NOT EXISTS idx_cards_number ON cards(number);
            CREATE INDEX IF NOT EXISTS idx_cards_rarity ON cards(rarity);
            CREATE INDEX IF NOT EXISTS idx_cards_types ON cards(types);
            CREATE INDEX IF NOT EXISTS idx_cards_last_updated ON cards(last_updated);
            CREATE INDEX IF NOT EXISTS idx_cards_search ON cards(name, set_name, rarity);
            CREATE INDEX IF NOT EXISTS idx_sets_name ON sets(name);
            CREATE INDEX IF NOT EXISTS idx_sets_series ON sets(series);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Internal("store lock poisoned".to_string()))
    }

    fn builder(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(&self.dialect)
    }

    fn write_card(&self, conn: &Connection, card: &Card) -> Result<bool, StoreError> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM cards WHERE id = ?1)",
            params![card.id],
            |row| row.get(0),
        )?;

        // Document columns keep their previous value when the incoming
        // record carries nothing, so a sparse re-ingest never wipes
        // enrichment a fuller record provided earlier.
        conn.execute(
            r#"
            INSERT INTO cards (
                id, name, set_name, set_id, series, number, rarity,
                types, subtypes, images, tcgplayer, cardmarket, last_updated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                set_name = excluded.set_name,
                set_id = excluded.set_id,
                series = excluded.series,
                number = excluded.number,
                rarity = excluded.rarity,
                types = excluded.types,
                subtypes = excluded.subtypes,
                images = CASE WHEN excluded.images = ''
                    THEN cards.images ELSE excluded.images END,
                tcgplayer = CASE WHEN excluded.tcgplayer = ''
                    THEN cards.tcgplayer ELSE excluded.tcgplayer END,
                cardmarket = CASE WHEN excluded.cardmarket = ''
                    THEN cards.cardmarket ELSE excluded.cardmarket END,
                last_updated = excluded.last_updated
            "#,
            params![
                card.id,
                card.name,
                card.set_name,
                card.set_id,
                card.series,
                card.number,
                card.rarity,
                self.dialect.encode_list(&card.types),
                self.dialect.encode_list(&card.subtypes),
                card.images.encode(),
                card.tcgplayer.encode(),
                card.cardmarket.encode(),
                card.last_updated.to_rfc3339(),
            ],
        )?;

        Ok(!exists)
    }

    fn write_set(&self, conn: &Connection, set: &CardSet) -> Result<bool, StoreError> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sets WHERE id = ?1)",
            params![set.id],
            |row| row.get(0),
        )?;

        conn.execute(
            r#"
            INSERT INTO sets (
                id, name, series, printed_total, total, legalities,
                ptcgo_code, release_date, updated_at, images
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                series = excluded.series,
                printed_total = excluded.printed_total,
                total = excluded.total,
                legalities = excluded.legalities,
                ptcgo_code = excluded.ptcgo_code,
                release_date = excluded.release_date,
                updated_at = excluded.updated_at,
                images = excluded.images
            "#,
            params![
                set.id,
                set.name,
                set.series,
                set.printed_total,
                set.total,
                set.legalities.encode(),
                set.ptcgo_code,
                set.release_date,
                set.updated_at,
                set.images.encode(),
            ],
        )?;

        Ok(!exists)
    }

    fn row_to_card(&self, row: &rusqlite::Row<'_>) -> rusqlite::Result<Card> {
        let types: String = row.get(7)?;
        let subtypes: String = row.get(8)?;
        let images: String = row.get(9)?;
        let tcgplayer: String = row.get(10)?;
        let cardmarket: String = row.get(11)?;
        let last_updated: String = row.get(12)?;

        Ok(Card {
            id: row.get(0)?,
            name: row.get(1)?,
            set_name: row.get(2)?,
            set_id: row.get(3)?,
            series: row.get(4)?,
            number: row.get(5)?,
            rarity: row.get(6)?,
            types: self.dialect.decode_list(&types),
            subtypes: self.dialect.decode_list(&subtypes),
            images: OpaqueDocument::decode(&images),
            tcgplayer: OpaqueDocument::decode(&tcgplayer),
            cardmarket: OpaqueDocument::decode(&cardmarket),
            last_updated: parse_timestamp(&last_updated),
        })
    }

    fn row_to_set(&self, row: &rusqlite::Row<'_>) -> rusqlite::Result<CardSet> {
        let legalities: String = row.get(5)?;
        let images: String = row.get(9)?;

        Ok(CardSet {
            id: row.get(0)?,
            name: row.get(1)?,
            series: row.get(2)?,
            printed_total: row.get(3)?,
            total: row.get(4)?,
            legalities: OpaqueDocument::decode(&legalities),
            ptcgo_code: row.get(6)?,
            release_date: row.get(7)?,
            updated_at: row.get(8)?,
            images: OpaqueDocument::decode(&images),
        })
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Language suffix of a card id, per the `{setId}-{number}[-{suffix}]`
/// convention.
fn language_of_id(id: &str) -> Option<&str> {
    let mut parts = id.split('-');
    parts.next()?;
    parts.next()?;
    parts.next_back()
}

impl CardStore for SqliteCardStore {
    fn upsert_cards(&self, cards: &[Card]) -> Result<BatchOutcome, StoreError> {
        let conn = self.lock()?;
        let mut outcome = BatchOutcome::default();
        for card in cards {
            match self.write_card(&conn, card) {
                Ok(true) => outcome.inserted += 1,
                Ok(false) => outcome.updated += 1,
                Err(e) => {
                    warn!(card_id = %card.id, error = %e, "Failed to upsert card");
                    outcome.failed += 1;
                }
            }
        }
        debug!(
            inserted = outcome.inserted,
            updated = outcome.updated,
            failed = outcome.failed,
            "Card batch written"
        );
        Ok(outcome)
    }

    fn upsert_sets(&self, sets: &[CardSet]) -> Result<BatchOutcome, StoreError> {
        let conn = self.lock()?;
        let mut outcome = BatchOutcome::default();
        for set in sets {
            match self.write_set(&conn, set) {
                Ok(true) => outcome.inserted += 1,
                Ok(false) => outcome.updated += 1,
                Err(e) => {
                    warn!(set_id = %set.id, error = %e, "Failed to upsert set");
                    outcome.failed += 1;
                }
            }
        }
        Ok(outcome)
    }

    fn search(&self, plan: &QueryPlan) -> Result<(Vec<Card>, u64), StoreError> {
        let (rows_query, count_query) = self.builder().build_card_search(plan);
        let conn = self.lock()?;

        let total: u64 = conn.query_row(
            &count_query.sql,
            params_from_iter(count_query.params.iter()),
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&rows_query.sql)?;
        let cards = stmt
            .query_map(params_from_iter(rows_query.params.iter()), |row| {
                self.row_to_card(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((cards, total))
    }

    fn get_card(&self, id: &str) -> Result<Option<Card>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM cards WHERE id = ?1",
            crate::store::CARD_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], |row| self.row_to_card(row))?;
        match rows.next() {
            Some(card) => Ok(Some(card?)),
            None => Ok(None),
        }
    }

    fn list_sets(&self) -> Result<Vec<CardSet>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, series, printed_total, total, legalities, \
             ptcgo_code, release_date, updated_at, images \
             FROM sets ORDER BY release_date DESC, name ASC",
        )?;
        let sets = stmt
            .query_map([], |row| self.row_to_set(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sets)
    }

    fn facet_values(&self, facet: Facet) -> Result<Vec<String>, StoreError> {
        let query = self.builder().build_facet(facet);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&query.sql)?;
        let raw = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut values = std::collections::BTreeSet::new();
        match facet {
            Facet::Types | Facet::Subtypes => {
                for encoded in &raw {
                    for item in self.dialect.decode_list(encoded) {
                        values.insert(item);
                    }
                }
            }
            Facet::Rarities | Facet::Series => {
                values.extend(raw);
            }
            Facet::Languages => {
                // The default printing carries no suffix.
                values.insert("en".to_string());
                for id in &raw {
                    if let Some(suffix) = language_of_id(id) {
                        values.insert(suffix.to_string());
                    }
                }
            }
        }
        Ok(values.into_iter().collect())
    }

    fn suggestions(&self, needle: &str, limit: u32) -> Result<Vec<Suggestion>, StoreError> {
        if needle.trim().is_empty() {
            return Ok(Vec::new());
        }
        let query = self.builder().build_suggestions(needle.trim(), limit);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&query.sql)?;
        let suggestions = stmt
            .query_map(params_from_iter(query.params.iter()), |row| {
                let text: String = row.get(0)?;
                let kind: String = row.get(1)?;
                Ok(Suggestion {
                    text,
                    kind: match kind.as_str() {
                        "set" => SuggestionKind::Set,
                        "series" => SuggestionKind::Series,
                        _ => SuggestionKind::Card,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(suggestions)
    }

    fn similar(&self, id: &str, limit: u32) -> Result<Vec<Card>, StoreError> {
        let card = self
            .get_card(id)?
            .ok_or_else(|| StoreError::NotFound(format!("card {}", id)))?;

        let query = self.builder().build_similar(&card, limit);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&query.sql)?;
        let cards = stmt
            .query_map(params_from_iter(query.params.iter()), |row| {
                self.row_to_card(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cards)
    }

    fn checkpoint(&self, resource: &str) -> Result<Option<u32>, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT last_page FROM migration_checkpoint WHERE resource = ?1")?;
        let mut rows = stmt.query_map(params![resource], |row| row.get::<_, u32>(0))?;
        match rows.next() {
            Some(page) => Ok(Some(page?)),
            None => Ok(None),
        }
    }

    fn save_checkpoint(&self, resource: &str, last_page: u32) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO migration_checkpoint (resource, last_page) VALUES (?1, ?2) \
             ON CONFLICT(resource) DO UPDATE SET last_page = excluded.last_page",
            params![resource, last_page],
        )?;
        Ok(())
    }

    fn clear_checkpoint(&self, resource: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM migration_checkpoint WHERE resource = ?1",
            params![resource],
        )?;
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.lock()?;
        let card_count: u64 =
            conn.query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))?;
        let set_count: u64 = conn.query_row("SELECT COUNT(*) FROM sets", [], |row| row.get(0))?;
        let last_updated: Option<String> = conn.query_row(
            "SELECT MAX(last_updated) FROM cards WHERE last_updated <> ''",
            [],
            |row| row.get(0),
        )?;

        Ok(StoreStats {
            card_count,
            set_count,
            last_updated: last_updated.as_deref().map(parse_timestamp),
        })
    }
}
