//! Income estimation: profile → prompt → generation → JSON extraction.
//!
//! The generation model and the reference search are collaborators passed
//! in by reference ([`Generator`], [`ReferenceRetriever`]). The only output
//! this crate trusts is an object recovered by [`extract_json_object`];
//! anything else is reported as [`EstimateOutcome::Unparsed`].

mod extract;
mod generation;
mod prompt;
mod retrieval;

pub use extract::extract_json_object;
pub use generation::{ChatClient, Generator, Prompt};
pub use prompt::{DEFAULT_SYSTEM_PROMPT, IncomeProfile, load_system_prompt};
pub use retrieval::{NoReferences, ReferenceRetriever, StaticReferences};

use tracing::{info, instrument, warn};
use welfarebridge_shared::{AppConfig, IncomeEstimate, Result, WelfareBridgeError, expand_home};

/// Result of one estimate call.
///
/// Extraction failure is a distinguishable value rather than an error so
/// callers can show the raw reply as a diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimateOutcome {
    Structured(IncomeEstimate),
    Unparsed { raw_text: String, reason: String },
}

impl EstimateOutcome {
    pub fn estimate(&self) -> Option<&IncomeEstimate> {
        match self {
            Self::Structured(e) => Some(e),
            Self::Unparsed { .. } => None,
        }
    }
}

/// Runs the estimate flow with a fixed system instruction.
#[derive(Debug, Clone)]
pub struct IncomeEstimator {
    system_prompt: String,
}

impl Default for IncomeEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

impl IncomeEstimator {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }

    /// Use `generation.system_prompt_path` when set, else the built-in prompt.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let path = config
            .generation
            .system_prompt_path
            .as_deref()
            .map(expand_home)
            .transpose()?;
        Ok(Self::new(load_system_prompt(path.as_deref())?))
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Estimate the income bracket for `profile`.
    ///
    /// Validation, retrieval and generation failures propagate as errors.
    /// Only an extraction failure becomes [`EstimateOutcome::Unparsed`].
    #[instrument(skip_all, fields(model = generator.model(), household = profile.household_size))]
    pub async fn run(
        &self,
        generator: &dyn Generator,
        retriever: &dyn ReferenceRetriever,
        profile: &IncomeProfile,
    ) -> Result<EstimateOutcome> {
        profile.validate()?;

        let references = retriever.retrieve(&profile.retrieval_query()).await?;
        let prompt = profile.to_prompt(&self.system_prompt, &references);
        let raw_text = generator.generate(&prompt).await?;

        match extract_json_object(&raw_text) {
            Ok(map) => {
                info!(keys = map.len(), references = references.len(), "estimate extracted");
                Ok(EstimateOutcome::Structured(IncomeEstimate(map)))
            }
            Err(WelfareBridgeError::Extraction { message }) => {
                warn!(reason = %message, "generation output has no usable JSON object");
                Ok(EstimateOutcome::Unparsed {
                    raw_text,
                    reason: message,
                })
            }
            Err(e) => Err(e),
        }
    }
}
