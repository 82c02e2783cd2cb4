use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::instrument;

use super::util::get_json;
use crate::core::currency::{Currency, Quotes, RateSource};
use crate::core::error::RateError;

const NAME: &str = "Kraken";

fn pair(currency: Currency) -> &'static str {
    match currency {
        Currency::Usd => "XXBTZUSD",
        Currency::Gbp => "XXBTZGBP",
        Currency::Eur => "XXBTZEUR",
    }
}

/// Secondary source: Kraken's public ticker.
pub struct KrakenSource {
    base_url: String,
    client: reqwest::Client,
}

impl KrakenSource {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        KrakenSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn fetch(&self, currencies: &[Currency]) -> Result<TickerResponse, RateError> {
        let pairs = currencies.iter().map(|c| pair(*c)).collect::<Vec<_>>().join(",");
        let url = format!("{}/0/public/Ticker?pair={}", self.base_url, pairs);
        let data: TickerResponse = get_json(&self.client, NAME, &url).await?;

        if !data.error.is_empty() {
            return Err(RateError::Upstream {
                source_name: NAME.to_string(),
                errors: data.error,
            });
        }
        Ok(data)
    }
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: HashMap<String, Ticker>,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    /// Last trade closed: [price, lot volume]
    c: Vec<String>,
}

impl TickerResponse {
    fn last_trade(&self, currency: Currency) -> Result<f64, RateError> {
        let pair = pair(currency);
        let ticker = self
            .result
            .get(pair)
            .ok_or_else(|| RateError::parse(NAME, format!("Missing ticker for {pair}")))?;
        let price = ticker
            .c
            .first()
            .ok_or_else(|| RateError::parse(NAME, format!("Missing last trade for {pair}")))?;
        price
            .parse::<f64>()
            .map_err(|e| RateError::parse(NAME, format!("Invalid last trade '{price}' for {pair}: {e}")))
    }
}

#[async_trait]
impl RateSource for KrakenSource {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(name = "KrakenFetch", skip(self))]
    async fn fetch_rates(&self) -> Result<Quotes, RateError> {
        let data = self.fetch(&Currency::ALL).await?;
        Ok(Quotes {
            usd: data.last_trade(Currency::Usd)?,
            gbp: data.last_trade(Currency::Gbp)?,
            eur: data.last_trade(Currency::Eur)?,
        })
    }

    #[instrument(name = "KrakenFetchPair", skip(self))]
    async fn fetch_rate(&self, currency: Currency) -> Result<f64, RateError> {
        self.fetch(&[currency]).await?.last_trade(currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::util::http_client;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_server(pairs: &str, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/0/public/Ticker"))
            .and(query_param("pair", pairs))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn source(mock_server: &MockServer) -> KrakenSource {
        KrakenSource::new(
            &mock_server.uri(),
            http_client(Duration::from_secs(5)).unwrap(),
        )
    }

    const ALL_PAIRS: &str = "XXBTZUSD,XXBTZGBP,XXBTZEUR";

    #[tokio::test]
    async fn test_successful_rates_fetch() {
        let mock_response = r#"{
            "error": [],
            "result": {
                "XXBTZUSD": {"a": ["103480.0", "1", "1.000"], "c": ["103475.50000", "0.00100000"]},
                "XXBTZGBP": {"c": ["78124.10000", "0.01000000"]},
                "XXBTZEUR": {"c": ["97530.40000", "0.00500000"]}
            }
        }"#;
        let mock_server = create_mock_server(ALL_PAIRS, mock_response).await;

        let quotes = source(&mock_server).fetch_rates().await.unwrap();
        assert_eq!(quotes.usd, 103475.5);
        assert_eq!(quotes.gbp, 78124.1);
        assert_eq!(quotes.eur, 97530.4);
    }

    #[tokio::test]
    async fn test_error_list_is_surfaced() {
        let mock_response = r#"{"error": ["EGeneral:Temporary lockout"], "result": {}}"#;
        let mock_server = create_mock_server(ALL_PAIRS, mock_response).await;

        let result = source(&mock_server).fetch_rates().await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "Kraken reported errors: EGeneral:Temporary lockout"
        );
    }

    #[tokio::test]
    async fn test_missing_pair_is_a_parse_error() {
        let mock_response = r#"{
            "error": [],
            "result": {
                "XXBTZUSD": {"c": ["103475.5", "1"]},
                "XXBTZEUR": {"c": ["97530.4", "1"]}
            }
        }"#;
        let mock_server = create_mock_server(ALL_PAIRS, mock_response).await;

        let result = source(&mock_server).fetch_rates().await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "Failed to parse response from Kraken: Missing ticker for XXBTZGBP"
        );
    }

    #[tokio::test]
    async fn test_unparsable_last_trade_is_a_parse_error() {
        let mock_response = r#"{"error": [], "result": {"XXBTZGBP": {"c": ["n/a", "1"]}}}"#;
        let mock_server = create_mock_server("XXBTZGBP", mock_response).await;

        let result = source(&mock_server).fetch_rate(Currency::Gbp).await;
        assert!(matches!(result, Err(RateError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_single_pair_fetch() {
        let mock_response = r#"{"error": [], "result": {"XXBTZGBP": {"c": ["77950.00000", "0.1"]}}}"#;
        let mock_server = create_mock_server("XXBTZGBP", mock_response).await;

        let gbp = source(&mock_server).fetch_rate(Currency::Gbp).await.unwrap();
        assert_eq!(gbp, 77950.0);
    }
}
