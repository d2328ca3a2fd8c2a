use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::types::Position;
use crate::{DATA_API_BASE, GAMMA_API_BASE};

/// Timeout applied to every data/gamma API request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size for `/positions` requests.
const POSITIONS_PAGE_SIZE: u32 = 500;

/// Failure talking to one of the public Polymarket APIs.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// Source of wallet position snapshots.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Fetch every open position of `wallet`.
    async fn fetch_positions(&self, wallet: &str) -> Result<Vec<Position>, ApiError>;
}

/// A market returned by the gamma `/markets` lookup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSummary {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

impl MarketSummary {
    /// Identifier the execution layer knows this market by.
    pub fn market_id(&self) -> Option<&str> {
        non_empty(&self.condition_id).or_else(|| non_empty(&self.id))
    }
}

fn non_empty(id: &Option<String>) -> Option<&str> {
    id.as_deref().filter(|id| !id.is_empty())
}

/// Looks markets up by their human-readable slug.
#[async_trait]
pub trait MarketLookup: Send + Sync {
    async fn markets_by_slug(&self, slug: &str) -> Result<Vec<MarketSummary>, ApiError>;
}

/// Build the shared HTTP client used by [`DataApi`] and [`GammaApi`].
pub fn http_client() -> Result<reqwest::Client, ApiError> {
    Ok(reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?)
}

/// Data API client for `/positions`.
#[derive(Clone)]
pub struct DataApi {
    http: reqwest::Client,
    base_url: String,
}

impl DataApi {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: DATA_API_BASE.to_string(),
        }
    }
}

impl DataApi {
    async fn positions_page(&self, wallet: &str, offset: u32) -> Result<Vec<Position>, ApiError> {
        let url = format!("{}/positions", self.base_url);
        let page = self
            .http
            .get(&url)
            .query(&[("user", wallet)])
            .query(&[("limit", POSITIONS_PAGE_SIZE), ("offset", offset)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(page)
    }
}

/// Request pages at increasing offsets until one comes back short.
async fn collect_pages<F, Fut>(page_size: u32, mut fetch_page: F) -> Result<Vec<Position>, ApiError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<Position>, ApiError>>,
{
    let mut all = Vec::new();
    let mut offset = 0;
    loop {
        let page = fetch_page(offset).await?;
        let count = page.len();
        all.extend(page);
        if count < page_size as usize {
            break;
        }
        offset += page_size;
    }
    Ok(all)
}

#[async_trait]
impl PositionSource for DataApi {
    async fn fetch_positions(&self, wallet: &str) -> Result<Vec<Position>, ApiError> {
        let positions = collect_pages(POSITIONS_PAGE_SIZE, |offset| {
            self.positions_page(wallet, offset)
        })
        .await?;
        debug!("Fetched {} positions for {wallet}", positions.len());
        Ok(positions)
    }
}

/// Gamma API client for market metadata.
#[derive(Clone)]
pub struct GammaApi {
    http: reqwest::Client,
    base_url: String,
}

impl GammaApi {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: GAMMA_API_BASE.to_string(),
        }
    }
}

#[async_trait]
impl MarketLookup for GammaApi {
    async fn markets_by_slug(&self, slug: &str) -> Result<Vec<MarketSummary>, ApiError> {
        let url = format!("{}/markets", self.base_url);
        let markets: Vec<MarketSummary> = self
            .http
            .get(&url)
            .query(&[("slug", slug)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!("Gamma returned {} market(s) for slug {slug}", markets.len());
        Ok(markets)
    }
}
