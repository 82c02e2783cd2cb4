use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{instrument, warn};

use super::util::get_json;
use crate::core::currency::{Currency, Quotes, RateSource};
use crate::core::error::RateError;

const NAME: &str = "CoinGecko";

/// Primary source: CoinGecko's simple price endpoint.
pub struct CoinGeckoSource {
    base_url: String,
    client: reqwest::Client,
}

impl CoinGeckoSource {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        CoinGeckoSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url(&self, currencies: &[Currency]) -> String {
        let vs = currencies
            .iter()
            .map(|c| c.code().to_lowercase())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}/api/v3/simple/price?ids=bitcoin&vs_currencies={}",
            self.base_url, vs
        )
    }

    async fn fetch(&self, currencies: &[Currency]) -> Result<HashMap<String, f64>, RateError> {
        let data: SimplePriceResponse = get_json(&self.client, NAME, &self.url(currencies)).await?;
        data.bitcoin
            .ok_or_else(|| RateError::parse(NAME, "No bitcoin entry in response"))
    }
}

#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    bitcoin: Option<HashMap<String, f64>>,
}

fn required(prices: &HashMap<String, f64>, currency: Currency) -> Result<f64, RateError> {
    prices
        .get(&currency.code().to_lowercase())
        .copied()
        .ok_or_else(|| RateError::parse(NAME, format!("Missing {currency} price")))
}

#[async_trait]
impl RateSource for CoinGeckoSource {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(name = "CoinGeckoFetch", skip(self))]
    async fn fetch_rates(&self) -> Result<Quotes, RateError> {
        let prices = self.fetch(&Currency::ALL).await?;

        // A missing GBP price is left for the plausibility check to replace
        let gbp = match prices.get("gbp") {
            Some(gbp) => *gbp,
            None => {
                warn!("CoinGecko response has no GBP price");
                0.0
            }
        };

        Ok(Quotes {
            usd: required(&prices, Currency::Usd)?,
            gbp,
            eur: required(&prices, Currency::Eur)?,
        })
    }

    #[instrument(name = "CoinGeckoFetchPair", skip(self))]
    async fn fetch_rate(&self, currency: Currency) -> Result<f64, RateError> {
        let prices = self.fetch(&[currency]).await?;
        required(&prices, currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::util::http_client;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_server(vs_currencies: &str, status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v3/simple/price"))
            .and(query_param("ids", "bitcoin"))
            .and(query_param("vs_currencies", vs_currencies))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn source(mock_server: &MockServer) -> CoinGeckoSource {
        CoinGeckoSource::new(
            &mock_server.uri(),
            http_client(Duration::from_secs(5)).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_successful_rates_fetch() {
        let mock_server = create_mock_server(
            "usd,gbp,eur",
            200,
            r#"{"bitcoin": {"usd": 103475.55, "gbp": 78124.09, "eur": 97530.4}}"#,
        )
        .await;

        let quotes = source(&mock_server).fetch_rates().await.unwrap();
        assert_eq!(quotes.usd, 103475.55);
        assert_eq!(quotes.gbp, 78124.09);
        assert_eq!(quotes.eur, 97530.4);
    }

    #[tokio::test]
    async fn test_missing_gbp_is_reported_as_zero() {
        let mock_server = create_mock_server(
            "usd,gbp,eur",
            200,
            r#"{"bitcoin": {"usd": 100000, "eur": 95000}}"#,
        )
        .await;

        let quotes = source(&mock_server).fetch_rates().await.unwrap();
        assert_eq!(quotes.gbp, 0.0);
        assert_eq!(quotes.usd, 100000.0);
    }

    #[tokio::test]
    async fn test_missing_usd_is_a_parse_error() {
        let mock_server =
            create_mock_server("usd,gbp,eur", 200, r#"{"bitcoin": {"gbp": 1, "eur": 1}}"#).await;

        let result = source(&mock_server).fetch_rates().await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "Failed to parse response from CoinGecko: Missing USD price"
        );
    }

    #[tokio::test]
    async fn test_empty_object_is_a_parse_error() {
        let mock_server = create_mock_server("usd,gbp,eur", 200, "{}").await;

        let result = source(&mock_server).fetch_rates().await;
        assert!(matches!(result, Err(RateError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_rate_limited_response_is_a_network_error() {
        let mock_server = create_mock_server("usd,gbp,eur", 429, "").await;

        let result = source(&mock_server).fetch_rates().await;
        assert!(matches!(result, Err(RateError::Network { .. })));
    }

    #[tokio::test]
    async fn test_single_pair_fetch() {
        let mock_server =
            create_mock_server("gbp", 200, r#"{"bitcoin": {"gbp": 77001.25}}"#).await;

        let gbp = source(&mock_server).fetch_rate(Currency::Gbp).await.unwrap();
        assert_eq!(gbp, 77001.25);
    }
}
