//! Wikidata client
//!
//! Free-text entity search (`wbsearchentities`) and entity JSON fetch
//! (`Special:EntityData`). One client is built at startup and shared by the
//! fallback resolver and authority enrichment.
//!
//! # Retry policy
//! Up to `max_retries` retries on 429/500/502/503/504 and transport errors.
//! Delay before retry `n` (1-based) is `backoff_factor * 2^(n-1)` seconds, or
//! the server's numeric `Retry-After`, capped at 30 s.
//!
//! # Rate limiting
//! A token bucket (default 5 requests/second) gates every attempt,
//! including retries.

use super::knowledge_base::{EntityRecord, KbError, KnowledgeBase, SearchHit};
use async_trait::async_trait;
use caplink_common::config::{get_user_agent, WikidataConfig};
use governor::{Quota, RateLimiter};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};

/// MediaWiki action API
const WIKIDATA_API_URL: &str = "https://www.wikidata.org/w/api.php";

/// Entity JSON prefix; `{id}.json` is appended
const ENTITY_DATA_URL: &str = "https://www.wikidata.org/wiki/Special:EntityData";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for any single retry delay
const MAX_BACKOFF: Duration = Duration::from_secs(30);

const RETRY_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct EntityDataResponse {
    #[serde(default)]
    entities: HashMap<String, EntityRecord>,
}

/// Delay before retry number `retry` (1-based)
pub fn backoff_delay(backoff_factor: f64, retry: u32, retry_after: Option<Duration>) -> Duration {
    if let Some(server_delay) = retry_after {
        return server_delay.min(MAX_BACKOFF);
    }
    let exponent = retry.saturating_sub(1).min(16) as i32;
    let seconds = backoff_factor.max(0.0) * 2f64.powi(exponent);
    Duration::from_secs_f64(seconds).min(MAX_BACKOFF)
}

fn retry_after_header(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Wikidata HTTP client
pub struct WikidataClient {
    http_client: Client,
    api_url: String,
    entity_url: String,
    max_retries: u32,
    backoff_factor: f64,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl WikidataClient {
    /// Build the shared client from configuration
    pub fn new(config: &WikidataConfig) -> Result<Self, KbError> {
        let user_agent = get_user_agent(config.user_agent.as_deref());

        let http_client = Client::builder()
            .user_agent(user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| KbError::Network(format!("Failed to build HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        debug!(
            user_agent = %user_agent,
            requests_per_second = per_second.get(),
            max_retries = config.max_retries,
            "Built Wikidata client"
        );

        Ok(Self {
            http_client,
            api_url: WIKIDATA_API_URL.to_string(),
            entity_url: ENTITY_DATA_URL.to_string(),
            max_retries: config.max_retries,
            backoff_factor: config.backoff_factor,
            rate_limiter,
        })
    }

    /// Point the client at other endpoints (mirrors, local test servers)
    pub fn with_endpoints(mut self, api_url: impl Into<String>, entity_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self.entity_url = entity_url.into();
        self
    }

    /// GET with rate limiting and retry; returns the first non-retryable response
    async fn send_with_retry(
        &self,
        what: &str,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, KbError> {
        let mut retry = 0u32;

        loop {
            self.rate_limiter.until_ready().await;

            let (failure, retry_after) = match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if !RETRY_STATUSES.contains(&status.as_u16()) {
                        return Ok(response);
                    }
                    let retry_after = retry_after_header(&response);
                    (KbError::Api(status.as_u16(), what.to_string()), retry_after)
                }
                Err(e) => (KbError::Network(format!("{}: {}", what, e)), None),
            };

            if retry >= self.max_retries {
                warn!(request = what, retries = retry, "Giving up: {}", failure);
                return Err(failure);
            }

            retry += 1;
            let delay = backoff_delay(self.backoff_factor, retry, retry_after);
            debug!(
                request = what,
                retry,
                delay_ms = delay.as_millis() as u64,
                "Retrying after: {}",
                failure
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl KnowledgeBase for WikidataClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, KbError> {
        debug!(query = %query, limit, "Searching Wikidata");

        let limit = limit.to_string();
        let response = self
            .send_with_retry("wbsearchentities", || {
                self.http_client.get(&self.api_url).query(&[
                    ("action", "wbsearchentities"),
                    ("search", query),
                    ("language", "en"),
                    ("format", "json"),
                    ("limit", limit.as_str()),
                    ("type", "item"),
                ])
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(KbError::Api(status.as_u16(), "wbsearchentities".to_string()));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| KbError::Parse(format!("Search response: {}", e)))?;
        Ok(body.search)
    }

    async fn fetch_entity(&self, id: &str) -> Result<EntityRecord, KbError> {
        debug!(id = %id, "Fetching Wikidata entity");

        let url = format!("{}/{}.json", self.entity_url, id);
        let response = self
            .send_with_retry("EntityData", || self.http_client.get(&url))
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(KbError::EntityMissing(id.to_string()));
        } else if !status.is_success() {
            return Err(KbError::Api(status.as_u16(), format!("EntityData {}", id)));
        }

        let mut body: EntityDataResponse = response
            .json()
            .await
            .map_err(|e| KbError::Parse(format!("Entity {}: {}", id, e)))?;

        if let Some(record) = body.entities.remove(id) {
            return Ok(record);
        }
        // Redirected ids come back under the target id
        if body.entities.len() == 1 {
            if let Some((target, record)) = body.entities.into_iter().next() {
                debug!(id = %id, target = %target, "Entity id was redirected");
                return Ok(record);
            }
        }
        Err(KbError::EntityMissing(id.to_string()))
    }
}
