//! Income estimate with optional persistence.

use serde_json::Value;
use tracing::{info, instrument};

use welfarebridge_estimate::{
    EstimateOutcome, Generator, IncomeEstimator, IncomeProfile, ReferenceRetriever,
};
use welfarebridge_shared::{Result, WelfareBridgeError};
use welfarebridge_storage::{IncomeStore, SavedEstimate};

/// Outcome of one estimate plus the rows written for it, if any.
#[derive(Debug, Clone)]
pub struct EstimateRun {
    pub outcome: EstimateOutcome,
    /// `None` when saving was not requested or nothing was extracted.
    pub saved: Option<SavedEstimate>,
}

/// Run the estimate and, when `store` is given and extraction succeeded,
/// persist the profile and estimate.
#[instrument(skip_all, fields(save = store.is_some()))]
pub async fn estimate_income(
    estimator: &IncomeEstimator,
    generator: &dyn Generator,
    retriever: &dyn ReferenceRetriever,
    profile: &IncomeProfile,
    store: Option<&IncomeStore>,
) -> Result<EstimateRun> {
    let outcome = estimator.run(generator, retriever, profile).await?;

    let saved = match (store, &outcome) {
        (Some(store), EstimateOutcome::Structured(estimate)) => {
            let input = profile_json(profile)?;
            let saved = store.save(&input, estimate).await?;
            info!(request_id = saved.request_id, "estimate saved");
            Some(saved)
        }
        _ => None,
    };

    Ok(EstimateRun { outcome, saved })
}

fn profile_json(profile: &IncomeProfile) -> Result<Value> {
    serde_json::to_value(profile)
        .map_err(|e| WelfareBridgeError::validation(format!("profile is not serializable: {e}")))
}
