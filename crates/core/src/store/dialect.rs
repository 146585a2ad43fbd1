//! Backend-specific SQL syntax.
//!
//! The two store backends differ only in parameter-placeholder syntax,
//! multi-valued column encoding (comma-joined text vs native arrays) and
//! case-insensitive matching (`LOWER` + `LIKE` vs `ILIKE`). Everything else
//! about query construction lives once in [`super::query`].

/// One bound query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
}

impl rusqlite::ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        match self {
            SqlValue::Text(s) => s.to_sql(),
            SqlValue::Int(i) => i.to_sql(),
        }
    }
}

/// A rendered query plus its bound parameters, in placeholder order.
#[derive(Debug, Clone)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// The syntax seam between the shared query builder and a concrete backend.
pub trait SqlDialect: Send + Sync {
    /// Placeholder for the `n`-th parameter (1-based).
    fn placeholder(&self, n: usize) -> String;

    /// Case-insensitive pattern match of `column` against the `n`-th
    /// parameter.
    fn ci_like(&self, column: &str, n: usize) -> String;

    /// Parameter value for a case-insensitive `%needle%` match.
    fn ci_pattern(&self, needle: &str) -> String;

    /// Parameter value for a case-insensitive `needle%` prefix match.
    fn ci_prefix_pattern(&self, needle: &str) -> String;

    /// Exact membership test of the `n`-th parameter in a multi-valued
    /// `column`.
    fn list_contains(&self, column: &str, n: usize) -> String;

    /// Parameter value paired with [`SqlDialect::list_contains`].
    fn list_param(&self, member: &str) -> String;

    /// Encode a multi-valued field for storage.
    fn encode_list(&self, items: &[String]) -> String;

    /// Decode a stored multi-valued field.
    fn decode_list(&self, raw: &str) -> Vec<String>;

    /// Render a boolean expression as 0/1 so it can participate in a
    /// ranking sum.
    fn bool_as_int(&self, expr: &str) -> String;

    /// Random ordering expression.
    fn random_order(&self) -> &'static str;
}

/// SQLite: positional `?` placeholders, comma-joined lists, `LOWER` + `LIKE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn placeholder(&self, _n: usize) -> String {
        "?".to_string()
    }

    fn ci_like(&self, column: &str, n: usize) -> String {
        format!("LOWER({}) LIKE {}", column, self.placeholder(n))
    }

    fn ci_pattern(&self, needle: &str) -> String {
        format!("%{}%", needle.to_lowercase())
    }

    fn ci_prefix_pattern(&self, needle: &str) -> String {
        format!("{}%", needle.to_lowercase())
    }

    fn list_contains(&self, column: &str, n: usize) -> String {
        format!("(',' || {} || ',') LIKE {}", column, self.placeholder(n))
    }

    fn list_param(&self, member: &str) -> String {
        format!("%,{},%", member)
    }

    fn encode_list(&self, items: &[String]) -> String {
        items.join(",")
    }

    fn decode_list(&self, raw: &str) -> Vec<String> {
        if raw.is_empty() {
            return Vec::new();
        }
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    fn bool_as_int(&self, expr: &str) -> String {
        format!("({})", expr)
    }

    fn random_order(&self) -> &'static str {
        "RANDOM()"
    }
}

/// Postgres: numbered `$n` placeholders, native array columns, `ILIKE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn placeholder(&self, n: usize) -> String {
        format!("${}", n)
    }

    fn ci_like(&self, column: &str, n: usize) -> String {
        format!("{} ILIKE {}", column, self.placeholder(n))
    }

    fn ci_pattern(&self, needle: &str) -> String {
        format!("%{}%", needle)
    }

    fn ci_prefix_pattern(&self, needle: &str) -> String {
        format!("{}%", needle)
    }

    fn list_contains(&self, column: &str, n: usize) -> String {
        format!("{} = ANY({})", self.placeholder(n), column)
    }

    fn list_param(&self, member: &str) -> String {
        member.to_string()
    }

    fn encode_list(&self, items: &[String]) -> String {
        // Array literal form; the array column binds it directly.
        format!("{{{}}}", items.join(","))
    }

    fn decode_list(&self, raw: &str) -> Vec<String> {
        let trimmed = raw.trim_start_matches('{').trim_end_matches('}');
        if trimmed.is_empty() {
            return Vec::new();
        }
        trimmed
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    fn bool_as_int(&self, expr: &str) -> String {
        format!("(CASE WHEN {} THEN 1 ELSE 0 END)", expr)
    }

    fn random_order(&self) -> &'static str {
        "RANDOM()"
    }
}
