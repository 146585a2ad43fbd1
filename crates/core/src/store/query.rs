//! Shared query construction.
//!
//! All SQL shape lives here, rendered once against a [`SqlDialect`]. The
//! backends execute what this module builds and never assemble predicates
//! themselves, so filter semantics cannot drift between them.

use crate::search::plan::{QueryPlan, SortField, TextClause};
use crate::store::dialect::{SqlDialect, SqlQuery, SqlValue};
use crate::store::types::{Card, Facet};

/// Column list selected by every card query, in row-mapper order.
pub const CARD_COLUMNS: &str =
    "id, name, set_name, set_id, series, number, rarity, types, subtypes, \
     images, tcgplayer, cardmarket, last_updated";

/// Builds queries for one backend dialect.
pub struct QueryBuilder<'a> {
    dialect: &'a dyn SqlDialect,
}

struct WhereClause {
    fragments: Vec<String>,
    params: Vec<SqlValue>,
}

impl WhereClause {
    fn new() -> Self {
        Self {
            fragments: Vec::new(),
            params: Vec::new(),
        }
    }

    /// 1-based index the next bound parameter will occupy.
    fn next_n(&self) -> usize {
        self.params.len() + 1
    }

    fn push(&mut self, fragment: String) {
        self.fragments.push(fragment);
    }

    fn bind(&mut self, value: SqlValue) {
        self.params.push(value);
    }

    fn render(&self) -> String {
        if self.fragments.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.fragments.join(" AND "))
        }
    }
}

impl<'a> QueryBuilder<'a> {
    pub fn new(dialect: &'a dyn SqlDialect) -> Self {
        Self { dialect }
    }

    /// The paged result query and its matching count query. Both share the
    /// same predicate set; only ordering and limits differ.
    pub fn build_card_search(&self, plan: &QueryPlan) -> (SqlQuery, SqlQuery) {
        let mut clause = WhereClause::new();
        self.apply_text(&mut clause, &plan.text);
        self.apply_filters(&mut clause, plan);

        let where_sql = clause.render();

        let count = SqlQuery {
            sql: format!("SELECT COUNT(*) FROM cards{}", where_sql),
            params: clause.params.clone(),
        };

        let mut params = clause.params;
        let order_sql = self.order_clause(plan);
        let limit_ph = self.dialect.placeholder(params.len() + 1);
        let offset_ph = self.dialect.placeholder(params.len() + 2);
        params.push(SqlValue::Int(plan.page_size as i64));
        params.push(SqlValue::Int(plan.offset() as i64));

        let rows = SqlQuery {
            sql: format!(
                "SELECT {} FROM cards{}{} LIMIT {} OFFSET {}",
                CARD_COLUMNS, where_sql, order_sql, limit_ph, offset_ph
            ),
            params,
        };

        (rows, count)
    }

    fn apply_text(&self, clause: &mut WhereClause, text: &TextClause) {
        match text {
            TextClause::None | TextClause::NoneShuffled => {}
            TextClause::SubtypeAny(subtypes) => {
                let mut terms = Vec::with_capacity(subtypes.len());
                for subtype in subtypes {
                    terms.push(self.dialect.list_contains("subtypes", clause.next_n()));
                    clause.bind(SqlValue::Text(self.dialect.list_param(subtype)));
                }
                clause.push(format!("({})", terms.join(" OR ")));
            }
            TextClause::Substring(needle) => {
                let mut terms = Vec::with_capacity(4);
                for column in ["name", "set_name", "series", "subtypes"] {
                    terms.push(self.dialect.ci_like(column, clause.next_n()));
                    clause.bind(SqlValue::Text(self.dialect.ci_pattern(needle)));
                }
                clause.push(format!("({})", terms.join(" OR ")));
            }
        }
    }

    fn apply_filters(&self, clause: &mut WhereClause, plan: &QueryPlan) {
        let filters = &plan.filters;

        if let Some(series) = &filters.series {
            clause.push(self.dialect.ci_like("series", clause.next_n()));
            clause.bind(SqlValue::Text(series.to_lowercase()));
        }

        // A set filter accepts either the display name or the set id.
        if let Some(set) = &filters.set {
            let name = self.dialect.ci_like("set_name", clause.next_n());
            let id = self.dialect.ci_like("set_id", clause.next_n() + 1);
            clause.push(format!("({} OR {})", name, id));
            clause.bind(SqlValue::Text(set.to_lowercase()));
            clause.bind(SqlValue::Text(set.to_lowercase()));
        }

        if let Some(rarity) = &filters.rarity {
            clause.push(self.dialect.ci_like("rarity", clause.next_n()));
            clause.bind(SqlValue::Text(rarity.to_lowercase()));
        }

        if let Some(card_type) = &filters.card_type {
            clause.push(self.dialect.list_contains("types", clause.next_n()));
            clause.bind(SqlValue::Text(self.dialect.list_param(card_type)));
        }

        if let Some(subtype) = &filters.subtype {
            clause.push(self.dialect.list_contains("subtypes", clause.next_n()));
            clause.bind(SqlValue::Text(self.dialect.list_param(subtype)));
        }

        // Language rides on the id convention {setId}-{number}[-{suffix}]:
        // the default English printing has no suffix.
        if let Some(language) = &filters.language {
            if language.eq_ignore_ascii_case("en") {
                clause.push("id NOT LIKE '%-%-%'".to_string());
            } else {
                let ph = self.dialect.placeholder(clause.next_n());
                clause.push(format!("id LIKE {}", ph));
                clause.bind(SqlValue::Text(format!("%-%-{}", language.to_lowercase())));
            }
        }

        // Presence filters read the raw stored columns: an empty document
        // encodes as the empty string, and a stored placeholder image does
        // not count as having an image.
        match filters.has_image {
            Some(true) => {
                clause.push("(images <> '' AND images NOT LIKE '%placeholder%')".to_string())
            }
            Some(false) => {
                clause.push("(images = '' OR images LIKE '%placeholder%')".to_string())
            }
            None => {}
        }

        match filters.has_price {
            Some(true) => clause.push("(tcgplayer <> '' OR cardmarket <> '')".to_string()),
            Some(false) => clause.push("(tcgplayer = '' AND cardmarket = '')".to_string()),
            None => {}
        }
    }

    fn order_clause(&self, plan: &QueryPlan) -> String {
        if plan.is_random() {
            return format!(" ORDER BY {}", self.dialect.random_order());
        }
        let direction = plan.direction.as_sql();
        match plan.sort {
            SortField::Name => format!(" ORDER BY name {}, id ASC", direction),
            SortField::Rarity => format!(" ORDER BY rarity {}, name ASC, id ASC", direction),
            SortField::Number => format!(" ORDER BY number {}, name ASC, id ASC", direction),
            SortField::Random => unreachable!("random handled above"),
        }
    }

    /// Autocomplete over card names, set names and series. Prefix matches
    /// rank ahead of mid-word matches.
    pub fn build_suggestions(&self, needle: &str, limit: u32) -> SqlQuery {
        let mut params = Vec::with_capacity(5);

        let card_match = self.dialect.ci_like("name", 1);
        params.push(SqlValue::Text(self.dialect.ci_pattern(needle)));
        let set_match = self.dialect.ci_like("set_name", 2);
        params.push(SqlValue::Text(self.dialect.ci_pattern(needle)));
        let series_match = self.dialect.ci_like("series", 3);
        params.push(SqlValue::Text(self.dialect.ci_pattern(needle)));

        let prefix_match = self.dialect.ci_like("text", 4);
        params.push(SqlValue::Text(self.dialect.ci_prefix_pattern(needle)));

        let limit_ph = self.dialect.placeholder(5);
        params.push(SqlValue::Int(limit as i64));

        let sql = format!(
            "SELECT text, kind FROM (\
             SELECT DISTINCT name AS text, 'card' AS kind FROM cards WHERE {card} \
             UNION \
             SELECT DISTINCT set_name AS text, 'set' AS kind FROM cards WHERE {set} \
             UNION \
             SELECT DISTINCT series AS text, 'series' AS kind FROM cards WHERE {series}\
             ) AS suggestions \
             ORDER BY CASE WHEN {prefix} THEN 0 ELSE 1 END, text ASC \
             LIMIT {limit}",
            card = card_match,
            set = set_match,
            series = series_match,
            prefix = prefix_match,
            limit = limit_ph,
        );

        SqlQuery { sql, params }
    }

    /// Cards related to `card`, ranked by shared set (8), series (4),
    /// primary type (2) and rarity (1). The card itself is excluded.
    pub fn build_similar(&self, card: &Card, limit: u32) -> SqlQuery {
        let mut params = Vec::new();
        let mut n = 1;

        let mut score_terms = Vec::new();

        let set_eq = format!("set_id = {}", self.dialect.placeholder(n));
        score_terms.push(format!("{} * 8", self.dialect.bool_as_int(&set_eq)));
        params.push(SqlValue::Text(card.set_id.clone()));
        n += 1;

        let series_eq = format!("series = {}", self.dialect.placeholder(n));
        score_terms.push(format!("{} * 4", self.dialect.bool_as_int(&series_eq)));
        params.push(SqlValue::Text(card.series.clone()));
        n += 1;

        if let Some(primary) = card.primary_type() {
            let type_hit = self.dialect.list_contains("types", n);
            score_terms.push(format!("{} * 2", self.dialect.bool_as_int(&type_hit)));
            params.push(SqlValue::Text(self.dialect.list_param(primary)));
            n += 1;
        }

        if !card.rarity.is_empty() {
            let rarity_eq = format!("rarity = {}", self.dialect.placeholder(n));
            score_terms.push(self.dialect.bool_as_int(&rarity_eq));
            params.push(SqlValue::Text(card.rarity.clone()));
            n += 1;
        }

        let score = score_terms.join(" + ");

        let id_ph = self.dialect.placeholder(n);
        params.push(SqlValue::Text(card.id.clone()));
        n += 1;

        let limit_ph = self.dialect.placeholder(n);
        params.push(SqlValue::Int(limit as i64));

        // The score is rendered once, inside the subquery, so every bound
        // parameter has exactly one placeholder.
        let sql = format!(
            "SELECT {cols} FROM (\
             SELECT {cols}, ({score}) AS score FROM cards WHERE id <> {id}\
             ) AS scored \
             WHERE score > 0 ORDER BY score DESC, name ASC, id ASC LIMIT {limit}",
            cols = CARD_COLUMNS,
            score = score,
            id = id_ph,
            limit = limit_ph,
        );

        SqlQuery { sql, params }
    }

    /// Distinct-values query for one facet. Multi-valued and id-derived
    /// facets return raw column values the caller decodes and dedups.
    pub fn build_facet(&self, facet: Facet) -> SqlQuery {
        let sql = match facet {
            Facet::Types => "SELECT DISTINCT types FROM cards WHERE types <> ''",
            Facet::Subtypes => "SELECT DISTINCT subtypes FROM cards WHERE subtypes <> ''",
            Facet::Rarities => "SELECT DISTINCT rarity FROM cards WHERE rarity <> ''",
            Facet::Series => "SELECT DISTINCT series FROM cards WHERE series <> ''",
            Facet::Languages => "SELECT id FROM cards",
        };
        SqlQuery {
            sql: sql.to_string(),
            params: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::plan::{
        PlanLimits, SearchFilters, SearchRequest, SortDirection, SortField,
    };
    use crate::store::dialect::{PostgresDialect, SqliteDialect};
    use crate::store::types::OpaqueDocument;
    use chrono::Utc;

    fn plan(request: SearchRequest) -> QueryPlan {
        QueryPlan::resolve(&request, &PlanLimits::default())
    }

    #[test]
    fn test_unfiltered_search_has_no_where() {
        let builder = QueryBuilder::new(&SqliteDialect);
        let (rows, count) = builder.build_card_search(&plan(SearchRequest::default()));

        assert!(!rows.sql.contains("WHERE"));
        assert!(rows.sql.contains("ORDER BY name ASC, id ASC"));
        assert!(rows.sql.ends_with("LIMIT ? OFFSET ?"));
        assert_eq!(rows.params, vec![SqlValue::Int(20), SqlValue::Int(0)]);

        assert_eq!(count.sql, "SELECT COUNT(*) FROM cards");
        assert!(count.params.is_empty());
    }

    #[test]
    fn test_substring_text_spans_columns() {
        let builder = QueryBuilder::new(&SqliteDialect);
        let request = SearchRequest {
            text: "charizard".to_string(),
            ..Default::default()
        };
        let (rows, count) = builder.build_card_search(&plan(request));

        assert!(rows.sql.contains("LOWER(name) LIKE ?"));
        assert!(rows.sql.contains("LOWER(set_name) LIKE ?"));
        assert!(rows.sql.contains("LOWER(series) LIKE ?"));
        assert!(rows.sql.contains("LOWER(subtypes) LIKE ?"));
        assert_eq!(count.params.len(), 4);
        assert_eq!(
            count.params[0],
            SqlValue::Text("%charizard%".to_string())
        );
    }

    #[test]
    fn test_trainer_keyword_builds_subtype_disjunction() {
        let builder = QueryBuilder::new(&SqliteDialect);
        let request = SearchRequest {
            text: "trainer".to_string(),
            ..Default::default()
        };
        let (_, count) = builder.build_card_search(&plan(request));

        assert_eq!(count.params.len(), 5);
        assert!(count
            .params
            .contains(&SqlValue::Text("%,Supporter,%".to_string())));
        assert!(count
            .params
            .contains(&SqlValue::Text("%,Pokémon Tool,%".to_string())));
    }

    #[test]
    fn test_pokemon_shortcut_orders_randomly() {
        let builder = QueryBuilder::new(&SqliteDialect);
        let request = SearchRequest {
            text: "pokemon".to_string(),
            ..Default::default()
        };
        let (rows, count) = builder.build_card_search(&plan(request));

        assert!(!rows.sql.contains("WHERE"));
        assert!(rows.sql.contains("ORDER BY RANDOM()"));
        assert!(count.params.is_empty());
    }

    #[test]
    fn test_set_filter_matches_name_or_id() {
        let builder = QueryBuilder::new(&SqliteDialect);
        let request = SearchRequest {
            filters: SearchFilters {
                set: Some("Base".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let (rows, _) = builder.build_card_search(&plan(request));

        assert!(rows
            .sql
            .contains("(LOWER(set_name) LIKE ? OR LOWER(set_id) LIKE ?)"));
        assert_eq!(rows.params[0], SqlValue::Text("base".to_string()));
        assert_eq!(rows.params[1], SqlValue::Text("base".to_string()));
    }

    #[test]
    fn test_language_filter_uses_id_suffix() {
        let builder = QueryBuilder::new(&SqliteDialect);
        let request = SearchRequest {
            filters: SearchFilters {
                language: Some("jp".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let (rows, _) = builder.build_card_search(&plan(request));
        assert!(rows.sql.contains("id LIKE ?"));
        assert_eq!(rows.params[0], SqlValue::Text("%-%-jp".to_string()));

        let request = SearchRequest {
            filters: SearchFilters {
                language: Some("en".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let (rows, _) = builder.build_card_search(&plan(request));
        assert!(rows.sql.contains("id NOT LIKE '%-%-%'"));
    }

    #[test]
    fn test_presence_filters_are_tri_state() {
        let builder = QueryBuilder::new(&SqliteDialect);

        let request = SearchRequest {
            filters: SearchFilters {
                has_image: Some(true),
                has_price: Some(false),
                ..Default::default()
            },
            ..Default::default()
        };
        let (rows, _) = builder.build_card_search(&plan(request));
        assert!(rows
            .sql
            .contains("(images <> '' AND images NOT LIKE '%placeholder%')"));
        assert!(rows.sql.contains("(tcgplayer = '' AND cardmarket = '')"));

        let (_, unset) = builder.build_card_search(&plan(SearchRequest::default()));
        assert!(!unset.sql.contains("images"));
        assert!(!unset.sql.contains("tcgplayer"));
    }

    #[test]
    fn test_filters_compose_with_and() {
        let builder = QueryBuilder::new(&SqliteDialect);
        let request = SearchRequest {
            text: "char".to_string(),
            filters: SearchFilters {
                series: Some("Base".to_string()),
                rarity: Some("Rare Holo".to_string()),
                card_type: Some("Fire".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let (_, count) = builder.build_card_search(&plan(request));

        assert_eq!(count.sql.matches(" AND ").count(), 3);
        // 4 text patterns + series + rarity + type.
        assert_eq!(count.params.len(), 7);
    }

    #[test]
    fn test_postgres_placeholders_are_sequenced() {
        let builder = QueryBuilder::new(&PostgresDialect);
        let request = SearchRequest {
            filters: SearchFilters {
                series: Some("Base".to_string()),
                rarity: Some("Rare".to_string()),
                ..Default::default()
            },
            page: 2,
            page_size: 10,
            ..Default::default()
        };
        let (rows, count) = builder.build_card_search(&plan(request));

        assert!(rows.sql.contains("series ILIKE $1"));
        assert!(rows.sql.contains("rarity ILIKE $2"));
        assert!(rows.sql.contains("LIMIT $3 OFFSET $4"));
        assert_eq!(rows.params.len(), 4);
        assert_eq!(rows.params[2], SqlValue::Int(10));
        assert_eq!(rows.params[3], SqlValue::Int(10));

        assert!(!count.sql.contains("$3"));
        assert_eq!(count.params.len(), 2);
    }

    #[test]
    fn test_sort_direction_and_tiebreak() {
        let builder = QueryBuilder::new(&SqliteDialect);
        let request = SearchRequest {
            sort: SortField::Rarity,
            direction: SortDirection::Desc,
            ..Default::default()
        };
        let (rows, _) = builder.build_card_search(&plan(request));
        assert!(rows.sql.contains("ORDER BY rarity DESC, name ASC, id ASC"));
    }

    #[test]
    fn test_suggestions_rank_prefix_first() {
        let builder = QueryBuilder::new(&SqliteDialect);
        let query = builder.build_suggestions("char", 10);

        assert!(query.sql.contains("UNION"));
        assert!(query.sql.contains("CASE WHEN LOWER(text) LIKE ? THEN 0 ELSE 1 END"));
        assert_eq!(query.params.len(), 5);
        assert_eq!(query.params[0], SqlValue::Text("%char%".to_string()));
        assert_eq!(query.params[3], SqlValue::Text("char%".to_string()));
        assert_eq!(query.params[4], SqlValue::Int(10));
    }

    #[test]
    fn test_similar_ranks_set_above_series() {
        let builder = QueryBuilder::new(&SqliteDialect);
        let card = Card {
            id: "base1-4".to_string(),
            name: "Charizard".to_string(),
            set_name: "Base".to_string(),
            set_id: "base1".to_string(),
            series: "Base".to_string(),
            number: "4".to_string(),
            rarity: "Rare Holo".to_string(),
            types: vec!["Fire".to_string()],
            subtypes: vec![],
            images: OpaqueDocument::empty(),
            tcgplayer: OpaqueDocument::empty(),
            cardmarket: OpaqueDocument::empty(),
            last_updated: Utc::now(),
        };
        let query = builder.build_similar(&card, 5);

        assert!(query.sql.contains("(set_id = ?) * 8"));
        assert!(query.sql.contains("(series = ?) * 4"));
        assert!(query.sql.contains("* 2"));
        assert!(query.sql.contains("id <> ?"));
        assert!(query.sql.contains("ORDER BY"));
        // set, series, type, rarity, self-id, limit.
        assert_eq!(query.params.len(), 6);
        assert_eq!(query.params[4], SqlValue::Text("base1-4".to_string()));
        // One placeholder per bound parameter; the score expression must not
        // be rendered with a second, unbound set of slots.
        assert_eq!(query.sql.matches('?').count(), query.params.len());
    }

    #[test]
    fn test_similar_skips_absent_rank_terms() {
        let builder = QueryBuilder::new(&SqliteDialect);
        let card = Card {
            id: "base1-4".to_string(),
            name: "Charizard".to_string(),
            set_name: "Base".to_string(),
            set_id: "base1".to_string(),
            series: "Base".to_string(),
            number: "4".to_string(),
            rarity: String::new(),
            types: vec![],
            subtypes: vec![],
            images: OpaqueDocument::empty(),
            tcgplayer: OpaqueDocument::empty(),
            cardmarket: OpaqueDocument::empty(),
            last_updated: Utc::now(),
        };
        let query = builder.build_similar(&card, 5);

        assert!(!query.sql.contains("* 2"));
        assert!(!query.sql.contains("rarity ="));
        // set, series, self-id, limit.
        assert_eq!(query.params.len(), 4);
        assert_eq!(query.sql.matches('?').count(), query.params.len());
    }

    #[test]
    fn test_facet_queries() {
        let builder = QueryBuilder::new(&SqliteDialect);
        assert!(builder
            .build_facet(Facet::Rarities)
            .sql
            .contains("DISTINCT rarity"));
        assert_eq!(builder.build_facet(Facet::Languages).sql, "SELECT id FROM cards");
    }
}
