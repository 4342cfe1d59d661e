//! HTTP configuration store

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::store::ConfigStore;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Store fetching the payload from an HTTP endpoint with a GET request
///
/// Options:
/// - `url` (required): the endpoint to fetch
/// - `timeout` (ms, default 3000): per-request timeout
/// - `headers` (object of strings): extra request headers
///
/// A non-success status is a fetch failure, so an optional descriptor can
/// tolerate an endpoint that is down.
#[derive(Debug)]
pub struct HttpStore {
    client: reqwest::Client,
    url: String,
    headers: Vec<(String, String)>,
}

impl HttpStore {
    /// Create a store from a descriptor options tree
    pub fn from_config(config: &Value) -> anyhow::Result<Self> {
        let url = config
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("the `url` option is required"))?
            .to_string();
        let timeout = config
            .get("timeout")
            .and_then(Value::as_u64)
            .map_or(DEFAULT_TIMEOUT, Duration::from_millis);
        let headers = config
            .get("headers")
            .and_then(Value::as_object)
            .map(|headers| {
                headers
                    .iter()
                    .filter_map(|(name, value)| {
                        value.as_str().map(|value| (name.clone(), value.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            headers,
        })
    }
}

#[async_trait]
impl ConfigStore for HttpStore {
    async fn fetch(&self) -> anyhow::Result<Vec<u8>> {
        let mut request = self.client.get(&self.url);
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }
        let response = request.send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conf"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"a": 1}"#))
            .mount(&server)
            .await;

        let store = HttpStore::from_config(&json!({
            "url": format!("{}/conf", server.uri())
        }))
        .unwrap();

        assert_eq!(store.fetch().await.unwrap(), br#"{"a": 1}"#);
    }

    #[tokio::test]
    async fn test_headers_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conf"))
            .and(header("x-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let store = HttpStore::from_config(&json!({
            "url": format!("{}/conf", server.uri()),
            "headers": { "x-api-key": "secret" }
        }))
        .unwrap();

        assert!(store.fetch().await.is_ok());
    }

    #[tokio::test]
    async fn test_error_status_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conf"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = HttpStore::from_config(&json!({
            "url": format!("{}/conf", server.uri())
        }))
        .unwrap();

        assert!(store.fetch().await.is_err());
    }

    #[test]
    fn test_url_option_is_required() {
        assert!(HttpStore::from_config(&json!({})).is_err());
    }
}
