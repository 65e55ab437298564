//! FalconX RFQ REST API client.

use crate::config::FalconxConfig;
use crate::exchange::traits::{Venue, VenueClient};
use crate::exchange::types::{AssetPair, OrderAmount, OrderReceipt, OrderState, Side};
use crate::utils::decimal::round_down_to_lot;
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, instrument, warn};

const API_URL: &str = "https://api.falconx.io/v1";

/// FalconX client.
///
/// Quotes come from the RFQ endpoint and already embed the basis-point fee,
/// so the router's fee estimate for this venue is normally zero.
pub struct FalconxClient {
    http: Client,
    api_key: String,
    passphrase: String,
    secret_key: String,
    base_url: String,
    live: bool,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    fx_quote_id: String,
    buy_price: Decimal,
    #[serde(default)]
    fee_usd: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct TokenBalance {
    token: String,
    total_balance: Decimal,
}

#[derive(Debug, Serialize)]
struct OrderRequest {
    token_pair: TokenPair,
    quantity: TokenQuantity,
    side: Side,
    order_type: &'static str,
}

#[derive(Debug, Serialize)]
struct TokenPair {
    base_token: String,
    quote_token: String,
}

#[derive(Debug, Serialize)]
struct TokenQuantity {
    token: String,
    value: Decimal,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    #[serde(default)]
    fee_usd: Option<Decimal>,
}

impl FalconxClient {
    /// Create a new FalconX client from configuration.
    pub fn new(config: &FalconxConfig, live: bool) -> Result<Self> {
        Self::with_base_url(config, live, API_URL)
    }

    /// Create a client against a non-default API endpoint.
    pub fn with_base_url(config: &FalconxConfig, live: bool, base_url: &str) -> Result<Self> {
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

    /// Generate the FX-ACCESS-SIGN value for a request.
    fn sign(&self, timestamp: &str, method: &str, path: &str, body: &str) -> Result<String> {
        let key = BASE64
            .decode(&self.secret_key)
            .context("FalconX secret key is not valid base64")?;
        let mut mac =
            Hmac::<Sha256>::new_from_slice(&key).expect("HMAC can take key of any size");
        mac.update(format!("{timestamp}{method}{path}{body}").as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    /// Current timestamp in fractional seconds.
    fn timestamp() -> String {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_secs_f64()
            .to_string()
    }

    async fn signed_request<T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<String>,
    ) -> Result<T> {
        let timestamp = Self::timestamp();
        let body = body.unwrap_or_default();
        let signature = self.sign(&timestamp, method.as_str(), path, &body)?;

        let mut request = self
            .http
            .request(method.clone(), format!("{}{}", self.base_url, path))
            .header("FX-ACCESS-KEY", &self.api_key)
            .header("FX-ACCESS-SIGN", signature)
            .header("FX-ACCESS-TIMESTAMP", timestamp)
            .header("FX-ACCESS-PASSPHRASE", &self.passphrase)
            .header("Content-Type", "application/json");
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("FalconX {method} {path} failed"))?;

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse FalconX {path} response"))
    }

    /// Request an RFQ for one base unit, side buy.
    async fn request_quote(&self, pair: &AssetPair) -> Result<QuoteResponse> {
        let body = json!({
            "token_pair": { "base_token": pair.base, "quote_token": pair.quote },
            "quantity": { "token": pair.base, "value": 1 },
            "side": "buy",
        });
        let quote: QuoteResponse = self
            .signed_request(reqwest::Method::POST, "/quotes", Some(body.to_string()))
            .await?;
        debug!(
            quote_id = %quote.fx_quote_id,
            buy_price = %quote.buy_price,
            fee_usd = ?quote.fee_usd,
            "FalconX RFQ received"
        );
        Ok(quote)
    }
}

#[async_trait]
impl VenueClient for FalconxClient {
    fn venue(&self) -> Venue {
        Venue::FalconX
    }

    #[instrument(skip(self, pair), fields(pair = %pair))]
    async fn quote(&self, pair: &AssetPair) -> Result<Decimal> {
        Ok(self.request_quote(pair).await?.buy_price)
    }

    #[instrument(skip(self))]
    async fn balance(&self, asset: &str) -> Result<Decimal> {
        let balances: Vec<TokenBalance> = self
            .signed_request(reqwest::Method::GET, "/balances/total", None)
            .await?;
        match balances.iter().find(|b| b.token == asset) {
            Some(balance) => Ok(balance.total_balance),
            None => {
                warn!(asset, "no FalconX balance entry for asset, reporting zero");
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
        if !self.live {
            info!(%side, ?amount, "dry run: FalconX market order not sent");
            return Ok(OrderReceipt::simulated(side));
        }

        // FalconX sizes orders in base-asset terms; a notional buy is
        // converted at the current RFQ price.
        let quantity = match amount {
            OrderAmount::Base(quantity) => quantity,
            OrderAmount::Notional(funds) => {
                let quote = self.request_quote(pair).await?;
                round_down_to_lot(funds / quote.buy_price, dec!(0.00000001))
            }
        };

        let order = OrderRequest {
            token_pair: TokenPair {
                base_token: pair.base.clone(),
                quote_token: pair.quote.clone(),
            },
            quantity: TokenQuantity {
                token: pair.base.clone(),
                value: quantity,
            },
            side,
            order_type: "market",
        };

        info!(%side, %quantity, "placing FalconX market order");

        let body = serde_json::to_string(&order).context("Failed to encode FalconX order")?;
        let response: OrderResponse = self
            .signed_request(reqwest::Method::POST, "/order", Some(body))
            .await
            .context("Failed to place FalconX order")?;

        Ok(OrderReceipt {
            side,
            fee: response.fee_usd.unwrap_or(Decimal::ZERO),
            status: OrderState::Filled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> FalconxConfig {
        FalconxConfig {
            api_key: "key".into(),
            passphrase: "phrase".into(),
            secret_key: BASE64.encode(b"secret"),
            fee_estimate: Decimal::ZERO,
        }
    }

    fn btc_usd() -> AssetPair {
        AssetPair::new("BTC", "USD")
    }

    #[tokio::test]
    async fn test_quote_returns_rfq_buy_price() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/quotes"))
            .and(header_exists("FX-ACCESS-SIGN"))
            .and(body_partial_json(json!({ "side": "buy" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "fx_quote_id": "q-123",
                "buy_price": 40050.0,
                "fee_usd": 12.5
            })))
            .mount(&server)
            .await;

        let client = FalconxClient::with_base_url(&test_config(), false, &server.uri()).unwrap();
        assert_eq!(client.quote(&btc_usd()).await.unwrap(), dec!(40050.0));
    }

    #[tokio::test]
    async fn test_balance_finds_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/balances/total"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "token": "USD", "total_balance": 25000.5 },
                { "token": "BTC", "total_balance": 0.75 }
            ])))
            .mount(&server)
            .await;

        let client = FalconxClient::with_base_url(&test_config(), false, &server.uri()).unwrap();
        assert_eq!(client.balance("BTC").await.unwrap(), dec!(0.75));
        assert_eq!(client.balance("ETH").await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_dry_run_order_is_simulated() {
        let client =
            FalconxClient::with_base_url(&test_config(), false, "http://127.0.0.1:9").unwrap();
        let receipt = client
            .place_market_order(&btc_usd(), Side::Sell, OrderAmount::Base(dec!(0.5)))
            .await
            .unwrap();

        assert_eq!(receipt.status, OrderState::Simulated);
        assert_eq!(receipt.fee, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_live_buy_converts_notional_to_base_quantity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/quotes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "fx_quote_id": "q-124",
                "buy_price": 40000
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/order"))
            .and(body_partial_json(json!({
                "side": "buy",
                "order_type": "market",
                "quantity": { "token": "BTC" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "fee_usd": 8.0
            })))
            .mount(&server)
            .await;

        let client = FalconxClient::with_base_url(&test_config(), true, &server.uri()).unwrap();
        let receipt = client
            .place_market_order(&btc_usd(), Side::Buy, OrderAmount::Notional(dec!(1000)))
            .await
            .unwrap();

        assert_eq!(receipt.status, OrderState::Filled);
        assert_eq!(receipt.fee, dec!(8.0));
    }
}
