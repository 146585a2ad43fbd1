//! Search request normalization.
//!
//! Turns a raw, possibly malformed request into a [`QueryPlan`] the query
//! builder renders to SQL. All text interpretation lives here, above the
//! store backends, so both backends match identically.

use serde::{Deserialize, Serialize};

/// Subtypes selected by the `trainer`/`trainers` category keyword.
pub const TRAINER_SUBTYPES: &[&str] = &[
    "Item",
    "Supporter",
    "Stadium",
    "Pokémon Tool",
    "Technical Machine",
];

/// Subtypes selected by the `energy` family of category keywords.
pub const ENERGY_SUBTYPES: &[&str] = &["Special"];

/// A structured search request, prior to normalization.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub text: String,
    pub page: u32,
    pub page_size: u32,
    pub filters: SearchFilters,
    pub sort: SortField,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    pub series: Option<String>,
    pub set: Option<String>,
    pub rarity: Option<String>,
    pub card_type: Option<String>,
    pub subtype: Option<String>,
    /// Matched against the id suffix convention, not a stored column.
    pub language: Option<String>,
    pub has_image: Option<bool>,
    pub has_price: Option<bool>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.series.is_none()
            && self.set.is_none()
            && self.rarity.is_none()
            && self.card_type.is_none()
            && self.subtype.is_none()
            && self.language.is_none()
            && self.has_image.is_none()
            && self.has_price.is_none()
    }

    /// Drop filters that arrived as empty strings.
    fn normalized(mut self) -> Self {
        fn clean(v: &mut Option<String>) {
            if v.as_ref().is_some_and(|s| s.trim().is_empty()) {
                *v = None;
            }
        }
        clean(&mut self.series);
        clean(&mut self.set);
        clean(&mut self.rarity);
        clean(&mut self.card_type);
        clean(&mut self.subtype);
        clean(&mut self.language);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Name,
    Rarity,
    Number,
    Random,
}

impl SortField {
    /// Parse a query parameter; anything unrecognized falls back to `Name`.
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "rarity" => SortField::Rarity,
            "number" => SortField::Number,
            "random" => SortField::Random,
            _ => SortField::Name,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::Rarity => "rarity",
            SortField::Number => "number",
            SortField::Random => "random",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// How the search text was interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextClause {
    /// No text predicate.
    None,
    /// No text predicate and the result is shuffled: the literal `pokemon`
    /// shortcut with no filters active (a discovery feature, kept as-is).
    NoneShuffled,
    /// Category keyword: membership in any of the listed subtypes.
    SubtypeAny(Vec<String>),
    /// Case-insensitive substring over name, set name, series and subtypes.
    Substring(String),
}

/// Limits applied while coercing pagination.
#[derive(Debug, Clone, Copy)]
pub struct PlanLimits {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 250,
        }
    }
}

/// A normalized, renderable query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub text: TextClause,
    pub filters: SearchFilters,
    pub sort: SortField,
    pub direction: SortDirection,
    pub page: u32,
    pub page_size: u32,
}

impl QueryPlan {
    /// Build a plan from a raw request, coercing malformed pagination to
    /// safe values instead of raising.
    pub fn resolve(request: &SearchRequest, limits: &PlanLimits) -> Self {
        let page = request.page.max(1);
        let page_size = if request.page_size == 0 {
            limits.default_page_size
        } else {
            request.page_size.min(limits.max_page_size)
        };

        let filters = request.filters.clone().normalized();
        let text = interpret_text(request.text.trim(), &filters);

        Self {
            text,
            filters,
            sort: request.sort,
            direction: request.direction,
            page,
            page_size,
        }
    }

    /// Whether row order is a fresh random draw per execution.
    pub fn is_random(&self) -> bool {
        self.sort == SortField::Random || self.text == TextClause::NoneShuffled
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1) * self.page_size
    }

    /// Deterministic serialization of the full request, used as the result
    /// cache key.
    pub fn cache_key(&self) -> String {
        let text = match &self.text {
            TextClause::None => "none".to_string(),
            TextClause::NoneShuffled => "none+shuffle".to_string(),
            TextClause::SubtypeAny(subtypes) => format!("subtypes:{}", subtypes.join("|")),
            TextClause::Substring(s) => format!("substr:{}", s),
        };
        let f = &self.filters;
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        let tri = |v: &Option<bool>| match v {
            None => "-",
            Some(true) => "t",
            Some(false) => "f",
        };
        format!(
            "{text};series={};set={};rarity={};type={};subtype={};lang={};img={};price={};sort={}:{};p={}x{}",
            opt(&f.series),
            opt(&f.set),
            opt(&f.rarity),
            opt(&f.card_type),
            opt(&f.subtype),
            opt(&f.language),
            tri(&f.has_image),
            tri(&f.has_price),
            self.sort.as_str(),
            self.direction.as_sql(),
            self.page,
            self.page_size,
        )
    }
}

/// The text interpretation rules, reproduced exactly: they are load-bearing
/// for category browsing in the product.
fn interpret_text(text: &str, filters: &SearchFilters) -> TextClause {
    if text.is_empty() {
        return TextClause::None;
    }

    // Literal "pokemon" (case-sensitive as typed) means "no text filter";
    // with no filters active the result is additionally shuffled.
    if text == "pokemon" {
        return if filters.is_empty() {
            TextClause::NoneShuffled
        } else {
            TextClause::None
        };
    }

    match text.to_lowercase().as_str() {
        "trainer" | "trainers" => {
            return TextClause::SubtypeAny(
                TRAINER_SUBTYPES.iter().map(|s| s.to_string()).collect(),
            );
        }
        "energy" | "energies" | "energia" | "energias" => {
            return TextClause::SubtypeAny(
                ENERGY_SUBTYPES.iter().map(|s| s.to_string()).collect(),
            );
        }
        _ => {}
    }

    TextClause::Substring(text.to_string())
}
