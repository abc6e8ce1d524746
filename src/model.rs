/// Core data types for the weather alert relay.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O: geographic primitives, feed records, and the error
/// type every fallible operation returns.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Geographic types
// ---------------------------------------------------------------------------

/// A WGS84 coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Rectangular area used to drop strikes at the feed boundary.
///
/// Edges are inclusive: a point is rejected only when it lies strictly
/// outside one of the four limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        !(point.lat < self.min_lat
            || point.lon < self.min_lon
            || point.lat > self.max_lat
            || point.lon > self.max_lon)
    }
}

/// One of the eight compass sectors, each spanning 45° of bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Octant {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Octant {
    /// Clockwise from north, matching the quantization index.
    pub const ALL: [Octant; 8] = [
        Octant::N,
        Octant::NE,
        Octant::E,
        Octant::SE,
        Octant::S,
        Octant::SW,
        Octant::W,
        Octant::NW,
    ];

    /// Quantizes a bearing in `[0, 360)` degrees to the octant centred on it.
    pub fn from_bearing(degrees: f64) -> Self {
        let index = (degrees / 45.0).round() as usize % 8;
        Self::ALL[index]
    }
}

impl fmt::Display for Octant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Octant::N => "N",
            Octant::NE => "NE",
            Octant::E => "E",
            Octant::SE => "SE",
            Octant::S => "S",
            Octant::SW => "SW",
            Octant::W => "W",
            Octant::NW => "NW",
        };
        write!(f, "{}", label)
    }
}

/// Position of a strike relative to the reference point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BearingDistance {
    pub octant: Octant,
    pub distance_km: f64,
}

impl BearingDistance {
    /// Spatial bucket for this strike, with bands `bucket_km` wide.
    pub fn bucket(&self, bucket_km: f64) -> BucketKey {
        BucketKey {
            octant: self.octant,
            band: (self.distance_km / bucket_km).floor() as u32,
        }
    }
}

/// `(octant, distance band)` pair used both for counting and for dedup.
///
/// With the default 10 km width, `band` is the decile index
/// `floor(distance_km / 10)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub octant: Octant,
    pub band: u32,
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.octant, self.band)
    }
}

// ---------------------------------------------------------------------------
// Warning records
// ---------------------------------------------------------------------------

/// A single warning as published by the warning feed.
///
/// Two records with the same type, severity and validity window are the
/// same warning even when the free text differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: String,
    pub text: String,
    pub start_time: String,
    pub end_time: String,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise anywhere in the relay.
#[derive(Debug, PartialEq)]
pub enum RelayError {
    /// Non-2xx HTTP response from a feed.
    Http(u16),
    /// The request itself failed (DNS, connect, timeout, body read).
    Fetch(String),
    /// A payload could not be deserialized.
    Parse(String),
    /// The configuration file is unreadable or inconsistent.
    Config(String),
    /// The outbound transport refused or failed a send.
    Transport(String),
    /// An alert was addressed to a channel with no configured byte limit.
    UnknownDestination(String),
    /// The dispatcher worker has shut down.
    DispatcherClosed,
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Http(code) => write!(f, "HTTP error: {}", code),
            RelayError::Fetch(msg) => write!(f, "Fetch error: {}", msg),
            RelayError::Parse(msg) => write!(f, "Parse error: {}", msg),
            RelayError::Config(msg) => write!(f, "Config error: {}", msg),
            RelayError::Transport(msg) => write!(f, "Transport error: {}", msg),
            RelayError::UnknownDestination(name) => write!(f, "Unknown destination: {}", name),
            RelayError::DispatcherClosed => write!(f, "Dispatcher closed"),
        }
    }
}

impl std::error::Error for RelayError {}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for RelayError {
    fn from(err: toml::de::Error) -> Self {
        RelayError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => RelayError::Http(status.as_u16()),
            None => RelayError::Fetch(err.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn strike_area() -> BoundingBox {
        BoundingBox {
            min_lat: 47.51,
            min_lon: 15.54,
            max_lat: 48.76,
            max_lon: 18.62,
        }
    }

    #[test]
    fn test_bounding_box_accepts_interior_and_edge_points() {
        let area = strike_area();
        assert!(area.contains(&GeoPoint::new(48.14, 17.11)));
        assert!(area.contains(&GeoPoint::new(47.51, 15.54)), "edges are inclusive");
        assert!(area.contains(&GeoPoint::new(48.76, 18.62)), "edges are inclusive");
    }

    #[test]
    fn test_bounding_box_rejects_points_outside_any_edge() {
        let area = strike_area();
        assert!(!area.contains(&GeoPoint::new(47.50, 17.0)));
        assert!(!area.contains(&GeoPoint::new(48.0, 15.53)));
        assert!(!area.contains(&GeoPoint::new(48.77, 17.0)));
        assert!(!area.contains(&GeoPoint::new(48.0, 18.63)));
    }

    #[test]
    fn test_octant_quantization_centres_sectors_on_directions() {
        assert_eq!(Octant::from_bearing(0.0), Octant::N);
        assert_eq!(Octant::from_bearing(22.4), Octant::N);
        assert_eq!(Octant::from_bearing(22.5), Octant::NE, "half-way rounds up");
        assert_eq!(Octant::from_bearing(90.0), Octant::E);
        assert_eq!(Octant::from_bearing(200.0), Octant::S);
        assert_eq!(Octant::from_bearing(315.0), Octant::NW);
        assert_eq!(Octant::from_bearing(350.0), Octant::N, "wraps back to north");
    }

    #[test]
    fn test_bucket_uses_floor_of_band_width() {
        let bd = BearingDistance { octant: Octant::SE, distance_km: 29.99 };
        assert_eq!(bd.bucket(10.0), BucketKey { octant: Octant::SE, band: 2 });
        let bd = BearingDistance { octant: Octant::SE, distance_km: 30.0 };
        assert_eq!(bd.bucket(10.0).band, 3);
        assert_eq!(bd.bucket(10.0).to_string(), "SE|3");
    }

    #[test]
    fn test_warning_record_reads_feed_field_names() {
        let json = r#"{"type":"rain","severity":"yellow","text":"Heavy rain",
                       "startTime":"2025-06-01 12:00","endTime":"2025-06-01 18:00"}"#;
        let record: WarningRecord = serde_json::from_str(json).expect("valid record");
        assert_eq!(record.kind, "rain");
        assert_eq!(record.start_time, "2025-06-01 12:00");
    }

    #[test]
    fn test_error_display_messages() {
        assert_eq!(RelayError::Http(503).to_string(), "HTTP error: 503");
        assert_eq!(
            RelayError::UnknownDestination("X".into()).to_string(),
            "Unknown destination: X"
        );
    }
}
