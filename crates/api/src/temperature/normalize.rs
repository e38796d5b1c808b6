//! Observation normalization
//!
//! Turns strategy-specific records into [`TemperaturePoint`]s. Individual
//! bad records are dropped; a batch where every record was dropped is an
//! upstream fault, not an empty result.

use geotemp_shared::{BoundingBox, TemperaturePoint};
use serde_json::Value;

use super::TemperatureError;

/// Record layout produced by a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationShape {
    /// GeoJSON feature: `geometry.coordinates = [lon, lat]`, `properties.temperature`
    Catalog,
    /// Flat station value: `latitude`, `longitude`, `tavg`
    Station,
}

/// Raw records as returned by one strategy call
#[derive(Debug, Clone, PartialEq)]
pub struct RawBatch {
    pub shape: ObservationShape,
    pub records: Vec<Value>,
}

impl RawBatch {
    pub fn catalog(records: Vec<Value>) -> Self {
        Self {
            shape: ObservationShape::Catalog,
            records,
        }
    }

    pub fn station(records: Vec<Value>) -> Self {
        Self {
            shape: ObservationShape::Station,
            records,
        }
    }
}

/// Normalize a batch, keeping only complete records inside `region`
pub fn normalize(
    batch: RawBatch,
    region: &BoundingBox,
) -> Result<Vec<TemperaturePoint>, TemperatureError> {
    let reported = batch.records.len();
    let mut incomplete = 0usize;
    let mut outside = 0usize;

    let points: Vec<TemperaturePoint> = batch
        .records
        .iter()
        .filter_map(|record| {
            let Some((latitude, longitude, value)) = extract(batch.shape, record) else {
                incomplete += 1;
                return None;
            };
            if !region.contains(latitude, longitude) {
                outside += 1;
                return None;
            }
            Some(TemperaturePoint::new(latitude, longitude, value))
        })
        .collect();

    if incomplete + outside > 0 {
        tracing::warn!(
            reported,
            incomplete,
            outside_region = outside,
            kept = points.len(),
            "Dropped upstream records during normalization"
        );
    }

    if reported > 0 && points.is_empty() {
        return Err(TemperatureError::MalformedUpstreamResponse(format!(
            "all {reported} records dropped ({incomplete} incomplete, {outside} outside region)"
        )));
    }

    Ok(points)
}

/// Pull `(latitude, longitude, value)` out of one record
fn extract(shape: ObservationShape, record: &Value) -> Option<(f64, f64, f64)> {
    let (latitude, longitude, value) = match shape {
        ObservationShape::Catalog => {
            let coordinates = record.pointer("/geometry/coordinates")?.as_array()?;
            // GeoJSON order is [lon, lat]
            let longitude = coordinates.first()?.as_f64()?;
            let latitude = coordinates.get(1)?.as_f64()?;
            let value = record.pointer("/properties/temperature")?.as_f64()?;
            (latitude, longitude, value)
        }
        ObservationShape::Station => (
            record.get("latitude")?.as_f64()?,
            record.get("longitude")?.as_f64()?,
            record.get("tavg")?.as_f64()?,
        ),
    };

    [latitude, longitude, value]
        .iter()
        .all(|v| v.is_finite())
        .then_some((latitude, longitude, value))
}
