//! Core domain types for welfarebridge.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::numeric::coerce_opt;

// ---------------------------------------------------------------------------
// WelfareCard
// ---------------------------------------------------------------------------

/// One normalized welfare-program record, ready for display or persistence.
///
/// Every field except `title` is optional upstream and defaults to `""`;
/// fields are never absent. `title` being non-empty is checked at
/// persistence time, not at parse time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WelfareCard {
    pub title: String,
    pub summary: String,
    pub link: String,
    pub agency: String,
    /// `"ongoing application"`, `"<cycle> application"` or `""`.
    pub application_period: String,
    pub phone: String,
    /// Comma-joined eligible target groups.
    pub eligibility: String,
    pub region: Region,
    /// `YYYY-MM-DD` when the feed sent an 8-digit date, otherwise passthrough.
    pub last_modified: String,
}

/// Province / district a program belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Region {
    pub province: String,
    pub district: String,
}

impl WelfareCard {
    /// `true` when the only hard precondition (non-blank title) holds.
    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// IncomeEstimate
// ---------------------------------------------------------------------------

/// Open-shaped object extracted from generation output.
///
/// The pipeline enforces no field set; [`IncomeEstimate::summary`] reads the
/// optional nested `"summary"` object used for the numeric snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncomeEstimate(pub Map<String, Value>);

impl IncomeEstimate {
    /// Borrow the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Look up a top-level key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Numeric snapshot read from the nested `"summary"` object.
    ///
    /// A missing `summary`, a non-object `summary`, or a missing key all
    /// yield `None` for the affected columns.
    pub fn summary(&self) -> EstimateSummary {
        match self.0.get("summary") {
            Some(Value::Object(obj)) => EstimateSummary {
                income_eval: coerce_opt(obj.get("incomeEval")),
                asset_eval: coerce_opt(obj.get("assetEval")),
                total_income: coerce_opt(obj.get("totalIncome")),
                mid_ratio: coerce_opt(obj.get("midRatio")),
                exp_bracket: coerce_opt(obj.get("expBracket")),
            },
            _ => EstimateSummary::default(),
        }
    }
}

impl From<Map<String, Value>> for IncomeEstimate {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Nullable numeric columns of an income snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateSummary {
    pub income_eval: Option<i64>,
    pub asset_eval: Option<i64>,
    pub total_income: Option<i64>,
    pub mid_ratio: Option<i64>,
    pub exp_bracket: Option<i64>,
}
