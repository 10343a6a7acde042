//! Pipeline orchestration for welfarebridge.
//!
//! This crate ties the listing client, the card parser, the schema-adaptive
//! stores and the estimate flow into end-to-end workflows
//! ([`ingest::ingest_catalog`], [`estimate::estimate_income`]). Collaborators
//! are built once by [`Services::open`] and passed down by reference.

pub mod estimate;
pub mod ingest;

use std::sync::Arc;

use tracing::{debug, info};

use welfarebridge_catalog::{ListingClient, ListingQuery};
use welfarebridge_estimate::{
    ChatClient, Generator, IncomeEstimator, IncomeProfile, NoReferences, ReferenceRetriever,
};
use welfarebridge_shared::{AppConfig, Result, WelfareBridgeError, service_key};
use welfarebridge_storage::{IncomeStore, Storage, WelfareStore};

use crate::estimate::EstimateRun;
use crate::ingest::{IngestOptions, IngestReport, ProgressReporter};

/// Explicitly constructed collaborators for one process.
pub struct Services {
    config: AppConfig,
    storage: Storage,
    listing: ListingClient,
    welfare: WelfareStore,
    income: IncomeStore,
    estimator: IncomeEstimator,
    generator: Option<Arc<dyn Generator>>,
    retriever: Arc<dyn ReferenceRetriever>,
}

impl Services {
    /// Open storage and build every client from `config`.
    ///
    /// A missing generation API key is not an error here; estimate calls
    /// fail later with a Config error instead.
    pub async fn open(config: &AppConfig) -> Result<Self> {
        let storage = Storage::from_config(&config.storage).await?;
        let listing = ListingClient::from_config(config)?;
        let welfare = WelfareStore::new(storage.clone(), &config.storage.welfare_table)?;
        let income = IncomeStore::from_config(storage.clone(), &config.storage)?;
        let estimator = IncomeEstimator::from_config(config)?;

        let generator: Option<Arc<dyn Generator>> = match ChatClient::from_config(config) {
            Ok(client) => Some(Arc::new(client)),
            Err(WelfareBridgeError::Config { message }) => {
                debug!(%message, "generation client not configured");
                None
            }
            Err(e) => return Err(e),
        };

        info!(db = %storage.path().display(), "services opened");
        Ok(Self {
            config: config.clone(),
            storage,
            listing,
            welfare,
            income,
            estimator,
            generator,
            retriever: Arc::new(NoReferences),
        })
    }

    /// Replace the generation client.
    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Replace the reference retriever.
    pub fn with_retriever(mut self, retriever: Arc<dyn ReferenceRetriever>) -> Self {
        self.retriever = retriever;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn welfare(&self) -> &WelfareStore {
        &self.welfare
    }

    pub fn income(&self) -> &IncomeStore {
        &self.income
    }

    pub fn generator(&self) -> Result<&dyn Generator> {
        self.generator.as_deref().ok_or_else(|| {
            WelfareBridgeError::config(format!(
                "generation API key not set (export {})",
                self.config.generation.api_key_env
            ))
        })
    }

    /// Listing query seeded from config and the service key env var.
    pub fn listing_query(&self) -> Result<ListingQuery> {
        Ok(ListingQuery::from_config(
            &self.config,
            service_key(&self.config)?,
        ))
    }

    /// Fetch and ingest one listing page.
    pub async fn ingest(
        &self,
        query: &ListingQuery,
        options: &IngestOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<IngestReport> {
        ingest::ingest_catalog(&self.listing, query, &self.welfare, options, progress).await
    }

    /// Estimate for `profile`, saving the result when `save` is set.
    pub async fn estimate(&self, profile: &IncomeProfile, save: bool) -> Result<EstimateRun> {
        estimate::estimate_income(
            &self.estimator,
            self.generator()?,
            self.retriever.as_ref(),
            profile,
            save.then_some(&self.income),
        )
        .await
    }

    /// Tear down. Connections are per call, so this only drops handles.
    pub fn close(self) {
        self.storage.close();
        info!("services closed");
    }
}
