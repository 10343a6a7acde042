//! Income estimate persistence: one request row plus one numeric snapshot.

use chrono::Utc;
use serde_json::Value;
use tracing::info;
use welfarebridge_shared::{IncomeEstimate, Result, StorageConfig, WelfareBridgeError};

use crate::Storage;
use crate::schema::{FieldSpec, TableSpec};
use crate::writer::{Record, SchemaAdaptiveWriter};

pub const INCOME_REQUEST_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("input_json", &["input_json", "input", "profile_json"]),
    FieldSpec::new("estimate_json", &["estimate_json", "result_json", "output_json"]),
    FieldSpec::new("created_at", &["created_at"]),
];

pub const INCOME_SNAPSHOT_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("request_id", &["request_id"]),
    FieldSpec::new("income_eval", &["income_eval"]),
    FieldSpec::new("asset_eval", &["asset_eval"]),
    FieldSpec::new("total_income", &["total_income"]),
    FieldSpec::new("mid_ratio", &["mid_ratio"]),
    FieldSpec::new("exp_bracket", &["exp_bracket"]),
];

/// Row ids written by [`IncomeStore::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedEstimate {
    pub request_id: i64,
    pub snapshot_id: i64,
}

/// Writes estimates into the request and snapshot tables.
#[derive(Debug)]
pub struct IncomeStore {
    requests: SchemaAdaptiveWriter,
    snapshots: SchemaAdaptiveWriter,
}

impl IncomeStore {
    pub fn new(storage: Storage, request_table: &str, snapshot_table: &str) -> Result<Self> {
        let requests = TableSpec::new(request_table, INCOME_REQUEST_FIELDS)?.require("input_json");
        let snapshots =
            TableSpec::new(snapshot_table, INCOME_SNAPSHOT_FIELDS)?.require("request_id");
        Ok(Self {
            requests: SchemaAdaptiveWriter::new(storage.clone(), requests),
            snapshots: SchemaAdaptiveWriter::new(storage, snapshots),
        })
    }

    pub fn from_config(storage: Storage, config: &StorageConfig) -> Result<Self> {
        Self::new(
            storage,
            &config.income_request_table,
            &config.income_snapshot_table,
        )
    }

    /// Persist the raw `input` and `estimate`, then the numeric snapshot.
    ///
    /// The two inserts are separate transactions; a failed snapshot leaves
    /// the request row in place.
    pub async fn save(&self, input: &Value, estimate: &IncomeEstimate) -> Result<SavedEstimate> {
        let input_json = serde_json::to_string(input)
            .map_err(|e| WelfareBridgeError::Storage(format!("encode input: {e}")))?;
        let estimate_json = serde_json::to_string(estimate)
            .map_err(|e| WelfareBridgeError::Storage(format!("encode estimate: {e}")))?;

        let request_id = self
            .requests
            .insert(
                &Record::new()
                    .text("input_json", input_json)
                    .text("estimate_json", estimate_json)
                    .text("created_at", Utc::now().to_rfc3339()),
            )
            .await?;

        let summary = estimate.summary();
        let snapshot_id = self
            .snapshots
            .insert(
                &Record::new()
                    .integer("request_id", Some(request_id))
                    .integer("income_eval", summary.income_eval)
                    .integer("asset_eval", summary.asset_eval)
                    .integer("total_income", summary.total_income)
                    .integer("mid_ratio", summary.mid_ratio)
                    .integer("exp_bracket", summary.exp_bracket),
            )
            .await?;

        info!(request_id, snapshot_id, "estimate persisted");
        Ok(SavedEstimate {
            request_id,
            snapshot_id,
        })
    }
}
