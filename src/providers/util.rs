use crate::core::error::RateError;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error};

/// Builds the HTTP client shared by all rate sources
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("basedmotors/0.1")
        .timeout(timeout)
        .build()
}

/// GETs `url` and decodes the JSON body, classifying failures as network
/// (transport or non-2xx status) or parse errors.
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    source_name: &str,
    url: &str,
) -> Result<T, RateError> {
    debug!("Requesting rates from {}", url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| RateError::network(source_name, format!("Request error: {e}")))?;

    if !response.status().is_success() {
        return Err(RateError::network(
            source_name,
            format!("HTTP error: {}", response.status()),
        ));
    }

    let text = response
        .text()
        .await
        .map_err(|e| RateError::network(source_name, format!("Failed to read body: {e}")))?;

    serde_json::from_str(&text).map_err(|e| {
        error!(error = ?e, response = %text, "Failed to parse rate response");
        RateError::parse(source_name, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize)]
    struct Body {
        value: f64,
    }

    #[tokio::test]
    async fn test_status_and_body_errors_are_classified() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"value": 1.5}"#))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/garbage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&mock_server)
            .await;

        let client = http_client(Duration::from_secs(5)).unwrap();
        let base = mock_server.uri();

        let body: Body = get_json(&client, "test", &format!("{base}/ok")).await.unwrap();
        assert_eq!(body.value, 1.5);

        let down = get_json::<Body>(&client, "test", &format!("{base}/down")).await;
        assert_eq!(
            down.unwrap_err().to_string(),
            "Network error from test: HTTP error: 503 Service Unavailable"
        );

        let garbage = get_json::<Body>(&client, "test", &format!("{base}/garbage")).await;
        assert!(matches!(garbage, Err(RateError::Parse { .. })));
    }
}
