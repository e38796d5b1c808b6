//! STAC catalog search strategy
//!
//! Issues one search per request against a STAC `/search` endpoint. The
//! service is treated as unreliable: transport errors, timeouts, non-2xx
//! statuses and bodies without a `features` array all surface as
//! `UpstreamUnavailable`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use super::{RawBatch, RetrievalStrategy, TemperatureError, TemperatureQuery};

/// Body of a STAC item search
#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    bbox: [f64; 4],
    datetime: String,
    collections: [&'a str; 1],
    limit: u32,
}

pub struct CatalogSearch {
    client: Client,
    search_url: String,
    collection: String,
    limit: u32,
}

impl CatalogSearch {
    /// Build the strategy with a client-wide request timeout
    pub fn new(
        search_url: String,
        collection: String,
        limit: u32,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("geotemp/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            search_url,
            collection,
            limit,
        })
    }
}

#[async_trait]
impl RetrievalStrategy for CatalogSearch {
    fn name(&self) -> &'static str {
        "catalog"
    }

    async fn fetch(&self, query: &TemperatureQuery) -> Result<RawBatch, TemperatureError> {
        let body = SearchRequest {
            bbox: query.bounding_box.as_array(),
            datetime: query.date.datetime_interval(),
            collections: [self.collection.as_str()],
            limit: self.limit,
        };

        let response = self
            .client
            .post(&self.search_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() { "timeout" } else { "transport" };
                TemperatureError::UpstreamUnavailable(format!("catalog {kind} error: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TemperatureError::UpstreamUnavailable(format!(
                "catalog returned HTTP {status}"
            )));
        }

        let payload: Value = response.json().await.map_err(|e| {
            TemperatureError::UpstreamUnavailable(format!("catalog body unreadable: {e}"))
        })?;

        let features = match payload {
            Value::Object(mut map) => match map.remove("features") {
                Some(Value::Array(features)) => features,
                _ => {
                    return Err(TemperatureError::UpstreamUnavailable(
                        "catalog response has no features array".to_string(),
                    ))
                }
            },
            _ => {
                return Err(TemperatureError::UpstreamUnavailable(
                    "catalog response is not a JSON object".to_string(),
                ))
            }
        };

        tracing::debug!(features = features.len(), "Catalog search returned");
        Ok(RawBatch::catalog(features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temperature::DateSpec;
    use geotemp_shared::BoundingBox;
    use mockito::Matcher;
    use serde_json::json;

    fn strategy(server: &mockito::ServerGuard, timeout: Duration) -> CatalogSearch {
        CatalogSearch::new(
            format!("{}/api/stac/v1/search", server.url()),
            "goes-lst".to_string(),
            100,
            timeout,
        )
        .unwrap()
    }

    fn query(raw: &str) -> TemperatureQuery {
        let date = DateSpec::parse(raw).unwrap();
        TemperatureQuery::new(date, BoundingBox::WEST_VIRGINIA)
    }

    #[tokio::test]
    async fn test_search_body_carries_bbox_datetime_collection_limit() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/stac/v1/search")
            .match_body(Matcher::Json(json!({
                "bbox": [-82.6447, 37.2015, -77.7195, 40.6388],
                "datetime": "2022-06-01T00:00:00Z/2022-06-01T23:59:59Z",
                "collections": ["goes-lst"],
                "limit": 100
            })))
            .with_status(200)
            .with_header("content-type", "application/geo+json")
            .with_body(r#"{"type":"FeatureCollection","features":[]}"#)
            .create_async()
            .await;

        let batch = strategy(&server, Duration::from_secs(5))
            .fetch(&query("2022-06-01"))
            .await
            .unwrap();
        assert!(batch.records.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_month_query_uses_month_bounds() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/stac/v1/search")
            .match_body(Matcher::PartialJson(json!({
                "datetime": "2022-11-01T00:00:00Z/2022-11-30T23:59:59Z"
            })))
            .with_status(200)
            .with_body(r#"{"features":[]}"#)
            .create_async()
            .await;

        strategy(&server, Duration::from_secs(5))
            .fetch(&query("2022-11"))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/stac/v1/search")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = strategy(&server, Duration::from_secs(5))
            .fetch(&query("2022-06-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, TemperatureError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_missing_features_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/stac/v1/search")
            .with_status(200)
            .with_body(r#"{"type":"FeatureCollection"}"#)
            .create_async()
            .await;

        let err = strategy(&server, Duration::from_secs(5))
            .fetch(&query("2022-06-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, TemperatureError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_non_json_body_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/stac/v1/search")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let err = strategy(&server, Duration::from_secs(5))
            .fetch(&query("2022-06-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, TemperatureError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unavailable() {
        let search = CatalogSearch::new(
            "http://127.0.0.1:9/search".to_string(),
            "goes-lst".to_string(),
            100,
            Duration::from_secs(2),
        )
        .unwrap();
        let err = search.fetch(&query("2022-06-01")).await.unwrap_err();
        assert!(matches!(err, TemperatureError::UpstreamUnavailable(_)));
    }
}
