//! Schema registry: canonical fields bound to live destination columns.

use std::sync::LazyLock;

use regex::Regex;
use welfarebridge_shared::{Result, WelfareBridgeError};

static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));

/// A canonical field and the column names that may hold it, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: &'static str,
    pub columns: &'static [&'static str],
}

impl FieldSpec {
    pub const fn new(field: &'static str, columns: &'static [&'static str]) -> Self {
        Self { field, columns }
    }
}

/// Destination table plus the canonical fields it may receive, in insert order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    table: String,
    fields: &'static [FieldSpec],
    required: Option<&'static str>,
}

impl TableSpec {
    /// Fails with a Validation error if `table` is not a plain identifier.
    pub fn new(table: impl Into<String>, fields: &'static [FieldSpec]) -> Result<Self> {
        let table = table.into();
        if !IDENT_RE.is_match(&table) {
            return Err(WelfareBridgeError::validation(format!(
                "invalid table name {table:?}"
            )));
        }
        Ok(Self {
            table,
            fields,
            required: None,
        })
    }

    /// Mark `field` as the one that must be non-blank on every insert.
    pub fn require(mut self, field: &'static str) -> Self {
        self.required = Some(field);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    pub fn required(&self) -> Option<&'static str> {
        self.required
    }
}

/// Where one canonical field lands, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBinding {
    pub field: &'static str,
    /// Live column name as reported by the database; `None` when absent.
    pub column: Option<String>,
}

impl ColumnBinding {
    pub fn is_present(&self) -> bool {
        self.column.is_some()
    }
}

/// Snapshot of a table's columns resolved against a [`TableSpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    table: String,
    columns: Vec<String>,
    bindings: Vec<ColumnBinding>,
}

impl TableSchema {
    /// Bind each spec field to the first candidate present in `live_columns`.
    ///
    /// SQLite column names are case-insensitive, so matching is too.
    pub fn resolve(spec: &TableSpec, live_columns: Vec<String>) -> Self {
        let bindings = spec
            .fields()
            .iter()
            .map(|f| ColumnBinding {
                field: f.field,
                column: f.columns.iter().find_map(|candidate| {
                    live_columns
                        .iter()
                        .find(|c| c.eq_ignore_ascii_case(candidate))
                        .cloned()
                }),
            })
            .collect();

        Self {
            table: spec.table().to_string(),
            columns: live_columns,
            bindings,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Every live column, including ones no field binds to.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn bindings(&self) -> &[ColumnBinding] {
        &self.bindings
    }

    /// Fields that will be dropped on insert.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.bindings
            .iter()
            .filter(|b| !b.is_present())
            .map(|b| b.field)
            .collect()
    }

    /// `(field, column)` pairs in insert order.
    pub fn present(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.bindings
            .iter()
            .filter_map(|b| b.column.as_deref().map(|c| (b.field, c)))
    }

    /// `true` when the table exists in the database.
    pub fn exists(&self) -> bool {
        !self.columns.is_empty()
    }
}

/// Double-quote an identifier for SQL, escaping embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[FieldSpec] = &[
        FieldSpec::new("title", &["title"]),
        FieldSpec::new("summary", &["summary", "subscript"]),
        FieldSpec::new("eligibility", &["eligibility", "applicant"]),
        FieldSpec::new("city", &["city"]),
    ];

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolves_aliases_in_priority_order() {
        let spec = TableSpec::new("welfare_item", FIELDS).unwrap();
        let schema = TableSchema::resolve(
            &spec,
            cols(&["id", "title", "subscript", "summary", "applicant"]),
        );

        let present: Vec<_> = schema.present().collect();
        assert_eq!(
            present,
            vec![
                ("title", "title"),
                ("summary", "summary"),
                ("eligibility", "applicant"),
            ]
        );
        assert_eq!(schema.missing_fields(), vec!["city"]);
    }

    #[test]
    fn column_match_ignores_case_but_keeps_live_name() {
        let spec = TableSpec::new("t", FIELDS).unwrap();
        let schema = TableSchema::resolve(&spec, cols(&["Title", "CITY"]));
        assert_eq!(schema.bindings()[0].column.as_deref(), Some("Title"));
        assert_eq!(schema.bindings()[3].column.as_deref(), Some("CITY"));
    }

    #[test]
    fn empty_column_list_means_missing_table() {
        let spec = TableSpec::new("t", FIELDS).unwrap();
        let schema = TableSchema::resolve(&spec, Vec::new());
        assert!(!schema.exists());
        assert_eq!(schema.missing_fields().len(), FIELDS.len());
    }

    #[test]
    fn table_names_must_be_identifiers() {
        assert!(TableSpec::new("welfare_item", FIELDS).is_ok());
        assert!(TableSpec::new("_t2", FIELDS).is_ok());
        for bad in ["", "2t", "t; DROP TABLE x", "a.b", "t\""] {
            let err = TableSpec::new(bad, FIELDS).unwrap_err();
            assert!(err.is_validation(), "{bad:?} accepted");
        }
    }

    #[test]
    fn quoting_escapes_embedded_quotes() {
        assert_eq!(quote_identifier("title"), "\"title\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}
