//! Geographic value types
//!
//! Everything the map collaborator consumes is expressed with these types:
//! a fixed query region and the canonical temperature point.

use serde::{Deserialize, Serialize};

/// Rectangular region in WGS84 degrees.
///
/// Serialized in the `[min_lon, min_lat, max_lon, max_lat]` order used by
/// STAC search requests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// State of West Virginia
    pub const WEST_VIRGINIA: BoundingBox = BoundingBox {
        min_lon: -82.6447,
        min_lat: 37.2015,
        max_lon: -77.7195,
        max_lat: 40.6388,
    };

    pub const fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// True when the corners are finite, ordered and inside WGS84 range
    pub fn is_valid(&self) -> bool {
        let corners = [self.min_lon, self.min_lat, self.max_lon, self.max_lat];
        corners.iter().all(|v| v.is_finite())
            && self.min_lon < self.max_lon
            && self.min_lat < self.max_lat
            && (-180.0..=180.0).contains(&self.min_lon)
            && (-180.0..=180.0).contains(&self.max_lon)
            && (-90.0..=90.0).contains(&self.min_lat)
            && (-90.0..=90.0).contains(&self.max_lat)
    }

    /// Edges are inclusive
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&latitude)
            && (self.min_lon..=self.max_lon).contains(&longitude)
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([min_lon, min_lat, max_lon, max_lat]: [f64; 4]) -> Self {
        Self::new(min_lon, min_lat, max_lon, max_lat)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bbox: BoundingBox) -> Self {
        bbox.as_array()
    }
}

/// Discrete temperature classification used for marker coloring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureBand {
    /// Below 32°F
    Freezing,
    /// 32°F up to 50°F
    Cool,
    /// 50°F up to 70°F
    Moderate,
    /// 70°F up to 90°F
    Warm,
    /// 90°F and above
    Hot,
}

impl TemperatureBand {
    /// Classify a Fahrenheit value. Lower bounds are inclusive.
    pub fn classify(fahrenheit: f64) -> Self {
        if fahrenheit < 32.0 {
            TemperatureBand::Freezing
        } else if fahrenheit < 50.0 {
            TemperatureBand::Cool
        } else if fahrenheit < 70.0 {
            TemperatureBand::Moderate
        } else if fahrenheit < 90.0 {
            TemperatureBand::Warm
        } else {
            TemperatureBand::Hot
        }
    }

    /// Marker color for the map layer
    pub fn color(&self) -> &'static str {
        match self {
            TemperatureBand::Freezing => "#0000FF",
            TemperatureBand::Cool => "#ADD8E6",
            TemperatureBand::Moderate => "#FFFF00",
            TemperatureBand::Warm => "#FFA500",
            TemperatureBand::Hot => "#FF0000",
        }
    }
}

/// Canonical observation handed to the map collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperaturePoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Degrees Fahrenheit
    pub value: f64,
    pub band: TemperatureBand,
}

impl TemperaturePoint {
    pub fn new(latitude: f64, longitude: f64, value: f64) -> Self {
        Self {
            latitude,
            longitude,
            value,
            band: TemperatureBand::classify(value),
        }
    }
}
