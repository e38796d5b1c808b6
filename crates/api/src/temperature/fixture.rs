//! Static fixture strategy for development and demos

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{RawBatch, RetrievalStrategy, TemperatureError, TemperatureQuery};

/// Returns the same station records for every date
pub struct Fixture {
    records: Vec<Value>,
}

impl Fixture {
    pub fn new(records: Vec<Value>) -> Self {
        Self { records }
    }

    /// Averages for a handful of West Virginia stations
    pub fn west_virginia_sample() -> Self {
        let stations: [(&str, f64, f64, f64); 8] = [
            ("Charleston", 38.3498, -81.6326, 74.8),
            ("Morgantown", 39.6295, -79.9559, 70.1),
            ("Huntington", 38.4192, -82.4452, 76.3),
            ("Wheeling", 40.0640, -80.7209, 71.6),
            ("Elkins", 38.9262, -79.8467, 64.2),
            ("Beckley", 37.7782, -81.1882, 66.9),
            ("Martinsburg", 39.4562, -77.9639, 75.0),
            ("Parkersburg", 39.2667, -81.5615, 73.4),
        ];

        let records = stations
            .iter()
            .map(|(name, latitude, longitude, tavg)| {
                json!({
                    "station": name,
                    "latitude": latitude,
                    "longitude": longitude,
                    "tavg": tavg,
                })
            })
            .collect();

        Self::new(records)
    }
}

#[async_trait]
impl RetrievalStrategy for Fixture {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn fetch(&self, _query: &TemperatureQuery) -> Result<RawBatch, TemperatureError> {
        Ok(RawBatch::station(self.records.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temperature::{normalize, DateSpec};
    use geotemp_shared::BoundingBox;

    #[tokio::test]
    async fn test_sample_normalizes_inside_region() {
        let date = DateSpec::parse("2022-07-04").unwrap();
        let query = TemperatureQuery::new(date, BoundingBox::WEST_VIRGINIA);
        let batch = Fixture::west_virginia_sample().fetch(&query).await.unwrap();
        let reported = batch.records.len();

        let points = normalize(batch, &BoundingBox::WEST_VIRGINIA).unwrap();
        assert_eq!(points.len(), reported);
    }
}
