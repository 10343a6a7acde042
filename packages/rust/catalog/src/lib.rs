//! Local-government welfare listing: fetch and card parsing.
//!
//! [`ListingClient::fetch`] issues the outbound GET and returns the raw XML
//! payload; [`parse_cards`] turns that payload into [`WelfareCard`]s. The two
//! are kept apart so a payload can be parsed offline (fixtures, the CLI
//! `parse` command) and so ingestion can digest the exact bytes it parsed.

mod codes;
mod parser;

use std::time::Duration;

use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use welfarebridge_shared::{AppConfig, Result, WelfareBridgeError, WelfareCard};

pub use codes::{SortOrder, life_stage_code, target_group_code, theme_code};
pub use parser::{ONGOING_APPLICATION, application_period, normalize_ymd, parse_cards};

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 3;

/// Maximum response size we accept (10 MB).
const MAX_RESPONSE_SIZE: u64 = 10 * 1024 * 1024;

/// User-Agent string for listing requests.
const USER_AGENT: &str = concat!("welfarebridge/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// ListingQuery
// ---------------------------------------------------------------------------

/// Query parameters for one listing request.
///
/// Optional filters left as `None` are omitted from the query string.
#[derive(Debug, Clone)]
pub struct ListingQuery {
    /// Decoded service key; reqwest percent-encodes it.
    pub service_key: String,
    pub page_no: u32,
    pub num_of_rows: u32,
    /// Life-stage code list (`lifeArray`).
    pub life_array: String,
    pub trgter_indvdl_array: Option<String>,
    pub intrs_thema_array: Option<String>,
    pub srch_key_code: String,
    /// Province / city name filter (`ctpvNm`).
    pub ctpv_nm: Option<String>,
    /// District name filter (`sggNm`).
    pub sgg_nm: Option<String>,
    pub search_wrd: Option<String>,
    pub arrg_ord: Option<SortOrder>,
}

impl ListingQuery {
    /// Start a query from the `[catalog]` defaults.
    pub fn from_config(config: &AppConfig, service_key: impl Into<String>) -> Self {
        Self {
            service_key: service_key.into(),
            page_no: config.catalog.page_no,
            num_of_rows: config.catalog.num_of_rows,
            life_array: config.catalog.life_array.clone(),
            trgter_indvdl_array: None,
            intrs_thema_array: None,
            srch_key_code: config.catalog.srch_key_code.clone(),
            ctpv_nm: None,
            sgg_nm: None,
            search_wrd: None,
            arrg_ord: None,
        }
    }

    pub fn city(mut self, name: impl Into<String>) -> Self {
        self.ctpv_nm = Some(name.into());
        self
    }

    pub fn district(mut self, name: impl Into<String>) -> Self {
        self.sgg_nm = Some(name.into());
        self
    }

    /// Override the life-stage filter by label; unknown labels keep the default.
    pub fn life_stage(mut self, label: &str) -> Self {
        if let Some(code) = life_stage_code(label) {
            self.life_array = code.to_string();
        }
        self
    }

    pub fn target_group(mut self, label: &str) -> Self {
        self.trgter_indvdl_array = target_group_code(label).map(String::from);
        self
    }

    pub fn theme(mut self, label: &str) -> Self {
        self.intrs_thema_array = theme_code(label).map(String::from);
        self
    }

    pub fn keyword(mut self, word: impl Into<String>) -> Self {
        let word = word.into();
        self.search_wrd = (!word.trim().is_empty()).then_some(word);
        self
    }

    pub fn sort(mut self, order: SortOrder) -> Self {
        self.arrg_ord = Some(order);
        self
    }

    /// Query pairs in the order the API documents them.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("serviceKey", self.service_key.clone()),
            ("pageNo", self.page_no.to_string()),
            ("numOfRows", self.num_of_rows.to_string()),
            ("lifeArray", self.life_array.clone()),
        ];
        if let Some(v) = &self.trgter_indvdl_array {
            pairs.push(("trgterIndvdlArray", v.clone()));
        }
        if let Some(v) = &self.intrs_thema_array {
            pairs.push(("intrsThemaArray", v.clone()));
        }
        pairs.push(("srchKeyCode", self.srch_key_code.clone()));
        if let Some(v) = &self.ctpv_nm {
            pairs.push(("ctpvNm", v.clone()));
        }
        if let Some(v) = &self.sgg_nm {
            pairs.push(("sggNm", v.clone()));
        }
        if let Some(v) = &self.search_wrd {
            pairs.push(("searchWrd", v.clone()));
        }
        if let Some(v) = self.arrg_ord {
            pairs.push(("arrgOrd", v.code().to_string()));
        }
        pairs
    }
}

// ---------------------------------------------------------------------------
// Fetched payload
// ---------------------------------------------------------------------------

/// Raw listing payload as received.
#[derive(Debug, Clone)]
pub struct ListingPayload {
    pub body: String,
}

impl ListingPayload {
    /// Hex SHA-256 of the payload, for correlating runs with inputs.
    pub fn sha256(&self) -> String {
        format!("{:x}", Sha256::digest(self.body.as_bytes()))
    }

    pub fn cards(&self) -> Result<Vec<WelfareCard>> {
        parse_cards(&self.body)
    }
}

// ---------------------------------------------------------------------------
// ListingClient
// ---------------------------------------------------------------------------

/// HTTP client for the welfare listing endpoint. No retries.
#[derive(Debug, Clone)]
pub struct ListingClient {
    client: Client,
    base_url: String,
    max_body: u64,
}

impl ListingClient {
    /// Build a client for `base_url` with an explicit request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .build()
            .map_err(|e| {
                WelfareBridgeError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            max_body: MAX_RESPONSE_SIZE,
        })
    }

    /// Override the response size limit (bytes).
    pub fn with_max_body(mut self, bytes: u64) -> Self {
        self.max_body = bytes;
        self
    }

    /// Build a client from the `[catalog]` section.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            config.catalog.base_url.clone(),
            Duration::from_secs(config.catalog.timeout_secs),
        )
    }

    /// Fetch one page of the listing.
    #[instrument(skip_all, fields(city = query.ctpv_nm.as_deref().unwrap_or(""), page = query.page_no))]
    pub async fn fetch(&self, query: &ListingQuery) -> Result<ListingPayload> {
        info!(url = %self.base_url, "fetching welfare listing");

        let mut response = self
            .client
            .get(&self.base_url)
            .query(&query.pairs())
            .send()
            .await
            .map_err(|e| WelfareBridgeError::Network(format!("{}: {e}", self.base_url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WelfareBridgeError::Network(format!(
                "{}: HTTP {status}",
                self.base_url
            )));
        }

        if let Some(len) = response.content_length() {
            if len > self.max_body {
                return Err(self.too_large(len));
            }
        }

        // Chunked responses carry no length, so the cap is enforced while reading.
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            WelfareBridgeError::Network(format!("{}: failed to read body: {e}", self.base_url))
        })? {
            bytes.extend_from_slice(&chunk);
            if bytes.len() as u64 > self.max_body {
                return Err(self.too_large(bytes.len() as u64));
            }
        }
        let body = String::from_utf8(bytes)
            .map_err(|e| WelfareBridgeError::parse(format!("listing body is not UTF-8: {e}")))?;

        debug!(bytes = body.len(), "listing payload received");
        Ok(ListingPayload { body })
    }

    fn too_large(&self, len: u64) -> WelfareBridgeError {
        WelfareBridgeError::validation(format!(
            "listing response too large ({len} bytes, max {})",
            self.max_body
        ))
    }

    /// Fetch and parse in one step.
    pub async fn fetch_cards(&self, query: &ListingQuery) -> Result<Vec<WelfareCard>> {
        self.fetch(query).await?.cards()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fixture() -> String {
        std::fs::read_to_string("../../../fixtures/xml/lcgv-welfare-list.xml")
            .expect("read listing fixture")
    }

    fn query() -> ListingQuery {
        ListingQuery::from_config(&AppConfig::default(), "test-key").city("서울특별시")
    }

    #[test]
    fn pairs_omit_absent_filters() {
        let pairs = query().pairs();
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            ["serviceKey", "pageNo", "numOfRows", "lifeArray", "srchKeyCode", "ctpvNm"]
        );
        assert!(pairs.contains(&("lifeArray", "005".to_string())));
        assert!(pairs.contains(&("numOfRows", "15".to_string())));
    }

    #[test]
    fn builder_maps_labels_to_codes() {
        let q = query()
            .life_stage("노년")
            .target_group("장애인")
            .theme("주거")
            .keyword("  ")
            .sort(SortOrder::Popular);
        let pairs = q.pairs();
        assert!(pairs.contains(&("lifeArray", "006".to_string())));
        assert!(pairs.contains(&("trgterIndvdlArray", "040".to_string())));
        assert!(pairs.contains(&("intrsThemaArray", "040".to_string())));
        assert!(pairs.contains(&("arrgOrd", "002".to_string())));
        assert!(!pairs.iter().any(|(k, _)| *k == "searchWrd"));
    }

    #[test]
    fn unknown_life_stage_keeps_default() {
        let q = query().life_stage("unknown");
        assert_eq!(q.life_array, "005");
    }

    #[test]
    fn payload_digest_is_stable() {
        let a = ListingPayload { body: "abc".into() };
        assert_eq!(
            a.sha256(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn fetch_sends_query_and_parses() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/LcgvWelfarelist"))
            .and(query_param("serviceKey", "test-key"))
            .and(query_param("ctpvNm", "서울특별시"))
            .and(query_param("srchKeyCode", "003"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture()))
            .mount(&server)
            .await;

        let client = ListingClient::new(
            format!("{}/LcgvWelfarelist", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();
        let cards = client.fetch_cards(&query()).await.unwrap();
        assert_eq!(cards.len(), 3);
        assert_eq!(cards[0].title, "어르신 무료 급식 지원");
    }

    #[tokio::test]
    async fn fetch_non_success_is_network_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = ListingClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = client.fetch(&query()).await.unwrap_err();
        assert!(matches!(err, WelfareBridgeError::Network(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn fetch_timeout_is_network_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(fixture())
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = ListingClient::new(server.uri(), Duration::from_millis(50)).unwrap();
        let err = client.fetch(&query()).await.unwrap_err();
        assert!(matches!(err, WelfareBridgeError::Network(_)));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture()))
            .mount(&server)
            .await;

        let client = ListingClient::new(server.uri(), Duration::from_secs(5))
            .unwrap()
            .with_max_body(64);
        let err = client.fetch(&query()).await.unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("too large"));
    }

    #[tokio::test]
    async fn malformed_payload_fetches_but_fails_to_parse() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<wantedList><servList>"))
            .mount(&server)
            .await;

        let client = ListingClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let payload = client.fetch(&query()).await.unwrap();
        assert!(matches!(
            payload.cards().unwrap_err(),
            WelfareBridgeError::Parse { .. }
        ));
    }
}
