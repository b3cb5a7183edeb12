//! Exchange-rate API client.
//!
//! Fetches a single currency-pair rate from an exchangerate.host-style JSON
//! endpoint. A missing, malformed, or non-positive rate is a fetch error —
//! fatal for the pipeline's rate node.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, instrument};

use pricewatch_shared::{PricewatchError, RatesConfig, Result};

/// User-Agent string for rate API requests.
const USER_AGENT: &str = concat!("Pricewatch/", env!("CARGO_PKG_VERSION"));

/// Response shape of `GET {api_url}?base=GBP&symbols=INR`.
#[derive(Debug, Deserialize)]
struct RateResponse {
    /// Some providers signal API-level errors with `success: false`.
    success: Option<bool>,
    #[serde(default)]
    rates: HashMap<String, f64>,
}

/// HTTP client for the exchange-rate API.
pub struct RateClient {
    client: reqwest::Client,
    api_url: String,
}

impl RateClient {
    /// Create a new client from the rates configuration.
    pub fn new(config: &RatesConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PricewatchError::fetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
        })
    }

    /// Fetch the rate for one unit of `base` in `target` units.
    ///
    /// Returns the rate only if the response carries a strictly positive
    /// value for the target symbol.
    #[instrument(skip(self))]
    pub async fn fetch_rate(&self, base: &str, target: &str) -> Result<f64> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[("base", base), ("symbols", target)])
            .send()
            .await
            .map_err(|e| PricewatchError::fetch(format!("rate API request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PricewatchError::fetch(format!("rate API: HTTP {status}")));
        }

        let parsed: RateResponse = response
            .json()
            .await
            .map_err(|e| PricewatchError::fetch(format!("rate API: invalid JSON: {e}")))?;

        if parsed.success == Some(false) {
            return Err(PricewatchError::fetch("rate API reported failure"));
        }

        let rate = parsed
            .rates
            .get(target)
            .copied()
            .ok_or_else(|| PricewatchError::fetch(format!("rate for {target} not in response")))?;

        if !(rate.is_finite() && rate > 0.0) {
            return Err(PricewatchError::fetch(format!(
                "rate for {target} is not positive: {rate}"
            )));
        }

        info!(base, target, rate, "exchange rate fetched");
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> RateClient {
        RateClient::new(&RatesConfig {
            api_url: format!("{}/latest", server.uri()),
            base_currency: "GBP".into(),
            target_currency: "INR".into(),
            timeout_secs: 5,
        })
        .expect("build client")
    }

    #[tokio::test]
    async fn fetches_positive_rate() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/latest"))
            .and(query_param("base", "GBP"))
            .and(query_param("symbols", "INR"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "base": "GBP",
                "rates": { "INR": 105.50 }
            })))
            .mount(&server)
            .await;

        let rate = client_for(&server)
            .await
            .fetch_rate("GBP", "INR")
            .await
            .expect("fetch rate");
        assert_eq!(rate, 105.50);
    }

    #[tokio::test]
    async fn missing_symbol_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "rates": { "USD": 1.27 }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .fetch_rate("GBP", "INR")
            .await
            .expect_err("must fail");
        assert!(matches!(err, PricewatchError::Fetch(_)));
        assert!(err.to_string().contains("INR"));
    }

    #[tokio::test]
    async fn api_failure_flag_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "rates": {}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .fetch_rate("GBP", "INR")
            .await
            .expect_err("must fail");
        assert!(matches!(err, PricewatchError::Fetch(_)));
    }

    #[tokio::test]
    async fn non_positive_rate_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "rates": { "INR": 0.0 }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .fetch_rate("GBP", "INR")
            .await
            .expect_err("must fail");
        assert!(err.to_string().contains("not positive"));
    }

    #[tokio::test]
    async fn http_error_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .fetch_rate("GBP", "INR")
            .await
            .expect_err("must fail");
        assert!(err.to_string().contains("502"));
    }
}
