//! Coinbase Exchange REST API client.

use crate::config::CoinbaseConfig;
use crate::exchange::traits::{Venue, VenueClient};
use crate::exchange::types::{AssetPair, OrderAmount, OrderReceipt, OrderState, Side};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, instrument, warn};

const API_URL: &str = "https://api.exchange.coinbase.com";

/// Coinbase Exchange client.
///
/// All requests are signed with the CB-ACCESS header scheme: HMAC-SHA256 over
/// `timestamp + method + path + body`, keyed by the base64-decoded secret.
pub struct CoinbaseClient {
    http: Client,
    api_key: String,
    passphrase: String,
    secret_key: String,
    base_url: String,
    live: bool,
}

#[derive(Debug, Deserialize)]
struct OracleResponse {
    prices: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Account {
    currency: String,
    #[serde(with = "rust_decimal::serde::str")]
    balance: Decimal,
}

#[derive(Debug, Serialize)]
struct NewMarketOrder {
    #[serde(rename = "type")]
    order_type: &'static str,
    side: Side,
    product_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    funds: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    status: String,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    fill_fees: Option<Decimal>,
}

impl CoinbaseClient {
    /// Create a new Coinbase client from configuration.
    pub fn new(config: &CoinbaseConfig, live: bool) -> Result<Self> {
        Self::with_base_url(config, live, API_URL)
    }

    /// Create a client against a non-default API endpoint.
    pub fn with_base_url(config: &CoinbaseConfig, live: bool, base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            passphrase: config.passphrase.clone(),
            secret_key: config.secret_key.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            live,
        })
    }

    /// Generate the CB-ACCESS-SIGN value for a request.
    fn sign(&self, timestamp: &str, method: &str, path: &str, body: &str) -> Result<String> {
        let key = BASE64
            .decode(&self.secret_key)
            .context("Coinbase secret key is not valid base64")?;
        let mut mac =
            Hmac::<Sha256>::new_from_slice(&key).expect("HMAC can take key of any size");
        mac.update(format!("{timestamp}{method}{path}{body}").as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    /// Current timestamp in whole seconds.
    fn timestamp() -> String {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_secs()
            .to_string()
    }

    async fn signed_get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let timestamp = Self::timestamp();
        let signature = self.sign(&timestamp, "GET", path, "")?;

        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header("CB-ACCESS-KEY", &self.api_key)
            .header("CB-ACCESS-SIGN", signature)
            .header("CB-ACCESS-TIMESTAMP", timestamp)
            .header("CB-ACCESS-PASSPHRASE", &self.passphrase)
            .send()
            .await
            .with_context(|| format!("Coinbase GET {path} failed"))?;

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse Coinbase {path} response"))
    }
}

#[async_trait]
impl VenueClient for CoinbaseClient {
    fn venue(&self) -> Venue {
        Venue::Coinbase
    }

    /// Oracle price for the base asset in USD. Carries no fee; the router
    /// applies the configured estimate when comparing venues.
    #[instrument(skip(self, pair), fields(pair = %pair))]
    async fn quote(&self, pair: &AssetPair) -> Result<Decimal> {
        let oracle: OracleResponse = self.signed_get("/oracle").await?;
        let price = oracle
            .prices
            .get(&pair.base)
            .with_context(|| format!("no Coinbase oracle price for {}", pair.base))?;
        price
            .parse()
            .with_context(|| format!("bad Coinbase oracle price {price:?}"))
    }

    #[instrument(skip(self))]
    async fn balance(&self, asset: &str) -> Result<Decimal> {
        let accounts: Vec<Account> = self.signed_get("/accounts").await?;
        match accounts.iter().find(|a| a.currency == asset) {
            Some(account) => Ok(account.balance),
            None => {
                warn!(asset, "no Coinbase account for asset, reporting zero");
                Ok(Decimal::ZERO)
            }
        }
    }

    #[instrument(skip(self, pair), fields(pair = %pair))]
    async fn place_market_order(
        &self,
        pair: &AssetPair,
        side: Side,
        amount: OrderAmount,
    ) -> Result<OrderReceipt> {
        let (funds, size) = match amount {
            OrderAmount::Notional(funds) => (Some(funds), None),
            OrderAmount::Base(size) => (None, Some(size)),
        };

        if !self.live {
            info!(%side, ?funds, ?size, "dry run: Coinbase market order not sent");
            return Ok(OrderReceipt::simulated(side));
        }

        let order = NewMarketOrder {
            order_type: "market",
            side,
            product_id: pair.product_id(),
            funds,
            size,
        };

        let path = "/orders";
        let body = serde_json::to_string(&order).context("Failed to encode Coinbase order")?;
        let timestamp = Self::timestamp();
        let signature = self.sign(&timestamp, "POST", path, &body)?;

        info!(%side, ?funds, ?size, "placing Coinbase market order");

        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header("CB-ACCESS-KEY", &self.api_key)
            .header("CB-ACCESS-SIGN", signature)
            .header("CB-ACCESS-TIMESTAMP", timestamp)
            .header("CB-ACCESS-PASSPHRASE", &self.passphrase)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .context("Failed to place Coinbase order")?;

        let order: OrderResponse = response
            .json()
            .await
            .context("Failed to parse Coinbase order response")?;

        let status = if order.status == "rejected" {
            OrderState::Rejected(order.status)
        } else {
            OrderState::Filled
        };

        Ok(OrderReceipt {
            side,
            fee: order.fill_fees.unwrap_or(Decimal::ZERO),
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> CoinbaseConfig {
        CoinbaseConfig {
            api_key: "key".into(),
            passphrase: "phrase".into(),
            secret_key: BASE64.encode(b"secret"),
            fee_estimate: dec!(0.005),
        }
    }

    fn btc_usd() -> AssetPair {
        AssetPair::new("BTC", "USD")
    }

    #[tokio::test]
    async fn test_quote_parses_oracle_price() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oracle"))
            .and(header_exists("CB-ACCESS-SIGN"))
            .and(header_exists("CB-ACCESS-TIMESTAMP"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "prices": { "BTC": "40123.45", "ETH": "2200.10" }
            })))
            .mount(&server)
            .await;

        let client = CoinbaseClient::with_base_url(&test_config(), false, &server.uri()).unwrap();
        assert_eq!(client.quote(&btc_usd()).await.unwrap(), dec!(40123.45));
    }

    #[tokio::test]
    async fn test_quote_missing_asset_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oracle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "prices": {} })))
            .mount(&server)
            .await;

        let client = CoinbaseClient::with_base_url(&test_config(), false, &server.uri()).unwrap();
        assert!(client.quote(&btc_usd()).await.is_err());
    }

    #[tokio::test]
    async fn test_balance_finds_account_by_currency() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "currency": "USD", "balance": "5000.00" },
                { "currency": "BTC", "balance": "0.25" }
            ])))
            .mount(&server)
            .await;

        let client = CoinbaseClient::with_base_url(&test_config(), false, &server.uri()).unwrap();
        assert_eq!(client.balance("USD").await.unwrap(), dec!(5000.00));
        assert_eq!(client.balance("ETH").await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_dry_run_order_is_simulated() {
        // no mock mounted: a dry-run order must never reach the network
        let client =
            CoinbaseClient::with_base_url(&test_config(), false, "http://127.0.0.1:9").unwrap();
        let receipt = client
            .place_market_order(&btc_usd(), Side::Buy, OrderAmount::Notional(dec!(1000)))
            .await
            .unwrap();

        assert_eq!(receipt.status, OrderState::Simulated);
        assert_eq!(receipt.fee, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_live_order_reports_fill_fees() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(header_exists("CB-ACCESS-SIGN"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "d0c5340b",
                "status": "pending",
                "fill_fees": "1.25"
            })))
            .mount(&server)
            .await;

        let client = CoinbaseClient::with_base_url(&test_config(), true, &server.uri()).unwrap();
        let receipt = client
            .place_market_order(&btc_usd(), Side::Sell, OrderAmount::Base(dec!(0.25)))
            .await
            .unwrap();

        assert_eq!(receipt.status, OrderState::Filled);
        assert_eq!(receipt.fee, dec!(1.25));
    }

    #[tokio::test]
    async fn test_rejected_order_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "rejected"
            })))
            .mount(&server)
            .await;

        let client = CoinbaseClient::with_base_url(&test_config(), true, &server.uri()).unwrap();
        let receipt = client
            .place_market_order(&btc_usd(), Side::Buy, OrderAmount::Notional(dec!(1000)))
            .await
            .unwrap();

        assert!(!receipt.status.is_success());
    }
}
