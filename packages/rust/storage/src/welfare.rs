//! Welfare catalog persistence.

use std::sync::Arc;

use welfarebridge_shared::{Result, WelfareCard};

use crate::Storage;
use crate::schema::{FieldSpec, TableSchema, TableSpec};
use crate::writer::{Record, SchemaAdaptiveWriter};

/// Catalog fields in insert order, each with its accepted column names.
pub const WELFARE_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("title", &["title"]),
    FieldSpec::new("summary", &["summary", "subscript"]),
    FieldSpec::new("period", &["period"]),
    FieldSpec::new("agency", &["agency"]),
    FieldSpec::new("contact", &["contact", "phone"]),
    FieldSpec::new("eligibility", &["eligibility", "applicant"]),
    FieldSpec::new("link", &["link", "url"]),
    FieldSpec::new("city", &["city"]),
];

/// Canonical record for `card`, with the ingestion `city` injected.
pub fn welfare_record(card: &WelfareCard, city: &str) -> Record {
    Record::new()
        .text("title", &card.title)
        .text("summary", &card.summary)
        .text("period", &card.application_period)
        .text("agency", &card.agency)
        .text("contact", &card.phone)
        .text("eligibility", &card.eligibility)
        .text("link", &card.link)
        .text("city", city)
}

/// Writes [`WelfareCard`]s into the catalog table.
#[derive(Debug)]
pub struct WelfareStore {
    writer: SchemaAdaptiveWriter,
}

impl WelfareStore {
    pub fn new(storage: Storage, table: &str) -> Result<Self> {
        let spec = TableSpec::new(table, WELFARE_FIELDS)?.require("title");
        Ok(Self {
            writer: SchemaAdaptiveWriter::new(storage, spec),
        })
    }

    /// Persist one card and return its row id.
    pub async fn save(&self, card: &WelfareCard, city: &str) -> Result<i64> {
        self.writer.insert(&welfare_record(card, city)).await
    }

    pub async fn schema(&self) -> Result<Arc<TableSchema>> {
        self.writer.schema().await
    }

    pub async fn refresh(&self) -> Result<Arc<TableSchema>> {
        self.writer.refresh().await
    }
}

#[cfg(test)]
mod tests {
    use libsql::params;

    use super::*;
    use crate::test_support::{count_rows, storage_with};

    fn card(title: &str) -> WelfareCard {
        WelfareCard {
            title: title.into(),
            summary: "저소득 어르신 월동 난방비 지원".into(),
            link: "https://www.bokjiro.go.kr/x?a=1&b=2".into(),
            agency: "종로구 어르신복지과".into(),
            application_period: "ongoing application".into(),
            phone: "02-2148-1234".into(),
            eligibility: "저소득, 노년".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn full_table_receives_every_field() {
        let storage = storage_with(
            "CREATE TABLE welfare_item (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL, summary TEXT, period TEXT, agency TEXT,
                contact TEXT, eligibility TEXT, link TEXT, city TEXT
            );",
        )
        .await;
        let store = WelfareStore::new(storage.clone(), "welfare_item").unwrap();

        let id = store.save(&card("난방비 지원"), "서울특별시").await.unwrap();

        let conn = storage.connect().unwrap();
        let mut rows = conn
            .query(
                "SELECT title, period, contact, eligibility, city FROM welfare_item WHERE id = ?1",
                params![id],
            )
            .await
            .unwrap();
        let r = rows.next().await.unwrap().unwrap();
        assert_eq!(r.get::<String>(0).unwrap(), "난방비 지원");
        assert_eq!(r.get::<String>(1).unwrap(), "ongoing application");
        assert_eq!(r.get::<String>(2).unwrap(), "02-2148-1234");
        assert_eq!(r.get::<String>(3).unwrap(), "저소득, 노년");
        assert_eq!(r.get::<String>(4).unwrap(), "서울특별시");
        assert!(store.schema().await.unwrap().missing_fields().is_empty());
    }

    #[tokio::test]
    async fn legacy_layout_uses_alias_columns() {
        let storage = storage_with(
            "CREATE TABLE welfare_item (
                id INTEGER PRIMARY KEY, title TEXT, subscript TEXT, applicant TEXT, city TEXT
            );",
        )
        .await;
        let store = WelfareStore::new(storage.clone(), "welfare_item").unwrap();
        store.save(&card("A"), "부산광역시").await.unwrap();

        let schema = store.schema().await.unwrap();
        assert_eq!(
            schema.missing_fields(),
            vec!["period", "agency", "contact", "link"]
        );
        assert_eq!(count_rows(&storage, "welfare_item").await, 1);
    }

    #[tokio::test]
    async fn untitled_card_is_rejected() {
        let storage = storage_with("CREATE TABLE welfare_item (id INTEGER PRIMARY KEY, title TEXT);")
            .await;
        let store = WelfareStore::new(storage.clone(), "welfare_item").unwrap();
        let err = store.save(&card(" "), "서울특별시").await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(count_rows(&storage, "welfare_item").await, 0);
    }

    #[test]
    fn record_maps_card_fields_to_canonical_names() {
        let mut c = card("T");
        c.summary = String::new();
        let r = welfare_record(&c, "서울특별시");
        assert!(r.is_blank("summary"));
        assert!(!r.is_blank("period"));
        assert!(!r.is_blank("contact"));
        assert!(!r.is_blank("city"));
    }
}
