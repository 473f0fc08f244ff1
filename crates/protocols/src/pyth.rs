//! Pyth Hermes reference price client.

use crate::client::{OracleClient, PriceSourceError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Public Hermes endpoint.
pub const HERMES_API_URL: &str = "https://hermes.pyth.network";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    parsed: Vec<ParsedFeed>,
}

#[derive(Debug, Deserialize)]
struct ParsedFeed {
    price: FeedPrice,
}

#[derive(Debug, Deserialize)]
struct FeedPrice {
    price: String,
    expo: i32,
}

/// Hermes client resolving pair labels to configured feed ids.
pub struct HermesClient {
    http: Client,
    base_url: String,
    feeds: HashMap<String, String>,
}

impl HermesClient {
    /// Creates a client with no configured feeds.
    pub fn new() -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url: HERMES_API_URL.to_string(),
            feeds: HashMap::new(),
        }
    }

    /// Sets a custom base URL (useful for testing).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Maps a pair label such as `SUI/USDC` to a Hermes feed id.
    #[must_use]
    pub fn with_feed(mut self, pair: impl Into<String>, feed_id: impl Into<String>) -> Self {
        self.feeds.insert(pair.into(), feed_id.into());
        self
    }

    /// Whether a feed is configured for `pair`.
    pub fn has_feed(&self, pair: &str) -> bool {
        self.feeds.contains_key(pair)
    }
}

impl Default for HermesClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Scales a Pyth integer mantissa by its exponent.
fn scale_price(mantissa: &str, expo: i32) -> Result<Decimal, PriceSourceError> {
    let raw: i64 = mantissa
        .parse()
        .map_err(|_| PriceSourceError::Transient(format!("invalid price mantissa '{}'", mantissa)))?;
    let price = if expo <= 0 {
        Decimal::try_from_i128_with_scale(i128::from(raw), expo.unsigned_abs())
            .map_err(|e| PriceSourceError::Transient(e.to_string()))?
    } else {
        Decimal::from(raw)
            .checked_mul(Decimal::from(10i64.pow(expo.unsigned_abs().min(18))))
            .ok_or_else(|| PriceSourceError::Transient("price overflow".to_string()))?
    };
    Ok(price.normalize())
}

#[async_trait]
impl OracleClient for HermesClient {
    async fn price(&self, pair: &str) -> Result<Decimal, PriceSourceError> {
        let feed_id = self
            .feeds
            .get(pair)
            .ok_or_else(|| PriceSourceError::Unavailable(format!("no feed configured for {}", pair)))?;

        let url = format!(
            "{}/v2/updates/price/latest?ids[]={}&parsed=true",
            self.base_url, feed_id
        );
        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PriceSourceError::Transient(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PriceSourceError::Unavailable(format!(
                "feed {} not found for {}",
                feed_id, pair
            )));
        }
        if status == StatusCode::BAD_REQUEST {
            let text = response.text().await.unwrap_or_default();
            return Err(PriceSourceError::Fatal(format!("hermes rejected request: {}", text)));
        }
        if !status.is_success() {
            return Err(PriceSourceError::Transient(format!("hermes returned {}", status)));
        }

        let body: LatestResponse = response
            .json()
            .await
            .map_err(|e| PriceSourceError::Transient(e.to_string()))?;
        let feed = body
            .parsed
            .into_iter()
            .next()
            .ok_or_else(|| PriceSourceError::Unavailable(format!("no price data for {}", pair)))?;

        let price = scale_price(&feed.price.price, feed.price.expo)?;
        if price <= Decimal::ZERO {
            return Err(PriceSourceError::Unavailable(format!(
                "non-positive price for {}",
                pair
            )));
        }
        Ok(price)
    }
}
