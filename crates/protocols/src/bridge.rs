//! HTTP client for the signing bridge.
//!
//! The bridge is a sidecar process that holds the wallet key and speaks
//! the AMM SDK. This client implements both [`AmmClient`] and
//! [`ChainClient`] on top of its JSON API.

use crate::client::{AmmClient, ChainClient, ChainError};
use crate::tx::{
    ClosePositionParams, CoinObject, CollectFeesParams, OpenPositionParams, PoolState,
    SubmitResult, SwapParams, Transaction, TxEffects,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default bridge URL.
pub const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:8787";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct BalanceResponse {
    balance: String,
}

#[derive(Serialize)]
struct TxRequest<'a> {
    transaction: &'a Transaction,
}

/// JSON client for the signing bridge.
pub struct BridgeClient {
    http: Client,
    base_url: String,
    wallet_address: String,
}

impl BridgeClient {
    /// Creates a client for the bridge at `base_url` signing as `wallet_address`.
    pub fn new(base_url: impl Into<String>, wallet_address: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            wallet_address: wallet_address.into(),
        }
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ChainError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        Self::decode(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ChainError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ChainError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, text));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ChainError::Decode(e.to_string()))
    }
}

fn classify_status(status: StatusCode, body: String) -> ChainError {
    let message = format!("bridge returned {}: {}", status, body);
    if status == StatusCode::NOT_FOUND {
        ChainError::NotFound(message)
    } else if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        ChainError::Rpc(message)
    } else {
        ChainError::Rejected(message)
    }
}

#[async_trait]
impl AmmClient for BridgeClient {
    async fn pool_state(&self, pool: &str) -> Result<PoolState, ChainError> {
        self.get(&format!("/pools/{}", pool)).await
    }

    async fn build_open_position_tx(
        &self,
        params: &OpenPositionParams,
    ) -> Result<Transaction, ChainError> {
        self.post("/tx/open-position", params).await
    }

    async fn build_close_position_tx(
        &self,
        params: &ClosePositionParams,
    ) -> Result<Transaction, ChainError> {
        self.post("/tx/close-position", params).await
    }

    async fn build_collect_fees_tx(
        &self,
        params: &CollectFeesParams,
    ) -> Result<Transaction, ChainError> {
        self.post("/tx/collect-fees", params).await
    }

    async fn build_swap_tx(&self, params: &SwapParams) -> Result<Transaction, ChainError> {
        self.post("/tx/swap", params).await
    }
}

#[async_trait]
impl ChainClient for BridgeClient {
    fn address(&self) -> &str {
        &self.wallet_address
    }

    async fn simulate(&self, tx: &Transaction) -> Result<TxEffects, ChainError> {
        self.post("/tx/simulate", &TxRequest { transaction: tx })
            .await
    }

    async fn submit(&self, tx: &Transaction) -> Result<SubmitResult, ChainError> {
        self.post("/tx/submit", &TxRequest { transaction: tx }).await
    }

    async fn balance(&self, owner: &str, coin_type: &str) -> Result<u128, ChainError> {
        let response: BalanceResponse = self
            .get(&format!("/balances/{}?coin_type={}", owner, coin_type))
            .await?;
        response
            .balance
            .parse()
            .map_err(|_| ChainError::Decode(format!("invalid balance '{}'", response.balance)))
    }

    async fn coins(&self, owner: &str, coin_type: &str) -> Result<Vec<CoinObject>, ChainError> {
        self.get(&format!("/coins/{}?coin_type={}", owner, coin_type))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_pool_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pools/0xpool"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "address": "0xpool",
                "price": "3.25",
                "tick_spacing": 60,
                "current_tick": 11780,
                "fee_rate": 2500
            })))
            .mount(&server)
            .await;

        let client = BridgeClient::new(server.uri(), "0xme");
        let state = client.pool_state("0xpool").await.unwrap();
        assert_eq!(state.price, dec!(3.25));
        assert_eq!(state.tick_spacing, 60);
    }

    #[tokio::test]
    async fn test_balance_parses_string() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/balances/0xme"))
            .and(query_param("coin_type", "0x2::sui::SUI"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "balance": "1500000000" })),
            )
            .mount(&server)
            .await;

        let client = BridgeClient::new(server.uri(), "0xme");
        let balance = client.balance("0xme", "0x2::sui::SUI").await.unwrap();
        assert_eq!(balance, 1_500_000_000);
    }

    #[tokio::test]
    async fn test_submit_posts_transaction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tx/submit"))
            .and(body_partial_json(json!({ "transaction": { "label": "close" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "digest": "ABC",
                "effects": { "success": true }
            })))
            .mount(&server)
            .await;

        let client = BridgeClient::new(server.uri(), "0xme");
        let result = client.submit(&Transaction::new("close")).await.unwrap();
        assert_eq!(result.digest, "ABC");
        assert!(result.effects.success);
    }

    #[tokio::test]
    async fn test_status_classification() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pools/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pools/busy"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/tx/swap"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad amount"))
            .mount(&server)
            .await;

        let client = BridgeClient::new(server.uri(), "0xme");
        assert!(matches!(
            client.pool_state("missing").await,
            Err(ChainError::NotFound(_))
        ));
        let busy = client.pool_state("busy").await.unwrap_err();
        assert!(busy.is_transient());

        let swap = SwapParams {
            pool: "0xpool".into(),
            coin_type_a: "A".into(),
            coin_type_b: "B".into(),
            a_to_b: true,
            amount_out: 1,
            slippage_bps: 50,
        };
        assert!(matches!(
            client.build_swap_tx(&swap).await,
            Err(ChainError::Rejected(_))
        ));
    }
}
