//! Temperature retrieval gateway
//!
//! A request moves through `Received → Validating → Dispatching →
//! Normalizing → Done | Failed`. Any failure ends the request; there are no
//! retries and no partial results at this layer.

pub mod catalog;
pub mod fixture;
pub mod normalize;
pub mod process;
pub mod query;

use std::sync::Arc;

use async_trait::async_trait;
use geotemp_shared::{BoundingBox, TemperaturePoint};
use tracing::Instrument;

use crate::config::{Config, TemperatureSource};

pub use catalog::CatalogSearch;
pub use fixture::Fixture;
pub use normalize::{normalize, ObservationShape, RawBatch};
pub use process::ExternalProcess;
pub use query::{DateSpec, TemperatureQuery};

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum TemperatureError {
    #[error("invalid date format: {0:?}")]
    InvalidDateFormat(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),
}

/// Source of raw observations for a query
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    /// Short name used in logs and the health endpoint
    fn name(&self) -> &'static str;

    async fn fetch(&self, query: &TemperatureQuery) -> Result<RawBatch, TemperatureError>;
}

/// Validates requests, dispatches to the configured strategy and normalizes
#[derive(Clone)]
pub struct TemperatureGateway {
    strategy: Arc<dyn RetrievalStrategy>,
    region: BoundingBox,
}

impl TemperatureGateway {
    pub fn new(strategy: Arc<dyn RetrievalStrategy>, region: BoundingBox) -> Self {
        Self { strategy, region }
    }

    /// Build the gateway for the strategy selected in configuration
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let strategy: Arc<dyn RetrievalStrategy> = match config.temperature_source {
            TemperatureSource::Catalog => Arc::new(CatalogSearch::new(
                config.catalog_search_url.clone(),
                config.catalog_collection.clone(),
                config.catalog_limit,
                config.upstream_timeout,
            )?),
            TemperatureSource::Process => Arc::new(ExternalProcess::new(
                config.process_program.clone(),
                config.process_args.clone(),
                config.upstream_timeout,
                config.process_max_output_bytes,
            )),
            TemperatureSource::Fixture => Arc::new(Fixture::west_virginia_sample()),
        };

        Ok(Self::new(strategy, config.region))
    }

    pub fn source_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn region(&self) -> BoundingBox {
        self.region
    }

    /// Fetch normalized points for a raw date parameter
    pub async fn fetch_points(
        &self,
        raw_date: &str,
    ) -> Result<Vec<TemperaturePoint>, TemperatureError> {
        let span = tracing::info_span!(
            "temperature_request",
            date = %raw_date,
            source = self.strategy.name()
        );
        self.run(raw_date).instrument(span).await
    }

    async fn run(&self, raw_date: &str) -> Result<Vec<TemperaturePoint>, TemperatureError> {
        tracing::debug!(state = "validating", "Temperature request received");
        let date = DateSpec::parse(raw_date).inspect_err(|_| {
            tracing::debug!(state = "failed", "Rejected date parameter");
        })?;
        let query = TemperatureQuery::new(date, self.region);

        tracing::debug!(
            state = "dispatching",
            interval = %date.datetime_interval(),
            "Fetching observations"
        );
        let batch = self.strategy.fetch(&query).await.inspect_err(|e| {
            tracing::warn!(state = "failed", error = %e, "Retrieval failed");
        })?;

        tracing::debug!(
            state = "normalizing",
            records = batch.records.len(),
            "Normalizing observations"
        );
        let points = normalize(batch, &query.bounding_box).inspect_err(|e| {
            tracing::warn!(state = "failed", error = %e, "Normalization failed");
        })?;

        tracing::info!(
            state = "done",
            points = points.len(),
            "Temperature request complete"
        );
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Strategy that records calls and returns a canned batch
    struct Recording {
        calls: AtomicUsize,
        result: Result<RawBatch, TemperatureError>,
    }

    #[async_trait]
    impl RetrievalStrategy for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn fetch(&self, _query: &TemperatureQuery) -> Result<RawBatch, TemperatureError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn gateway(result: Result<RawBatch, TemperatureError>) -> (TemperatureGateway, Arc<Recording>) {
        let strategy = Arc::new(Recording {
            calls: AtomicUsize::new(0),
            result,
        });
        (
            TemperatureGateway::new(strategy.clone(), BoundingBox::WEST_VIRGINIA),
            strategy,
        )
    }

    #[tokio::test]
    async fn test_invalid_date_never_dispatches() {
        let (gateway, strategy) = gateway(Ok(RawBatch::station(vec![])));
        let err = gateway.fetch_points("2022-13-40").await.unwrap_err();
        assert!(matches!(err, TemperatureError::InvalidDateFormat(_)));
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_propagates() {
        let (gateway, strategy) =
            gateway(Err(TemperatureError::UpstreamUnavailable("down".into())));
        let err = gateway.fetch_points("2022-06-01").await.unwrap_err();
        assert_eq!(err, TemperatureError::UpstreamUnavailable("down".into()));
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_month_query_dispatches() {
        let batch = RawBatch::station(vec![serde_json::json!({
            "latitude": 38.35, "longitude": -81.63, "tavg": 75.2
        })]);
        let (gateway, strategy) = gateway(Ok(batch));
        let points = gateway.fetch_points("2022-06").await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 1);
    }
}
