/// Relay configuration.
///
/// Loaded from a TOML file whose every field is optional; anything missing
/// falls back to the reference deployment (Bratislava, Slovak compass
/// names, MeshCore-sized message budgets). `validate` is the single place
/// that rejects inconsistent settings, so the rest of the crate can trust
/// the values it is handed.

use chrono::NaiveDate;
use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::alert::schedule::{parse_alarm_time, render_header};
use crate::model::{BoundingBox, GeoPoint, Octant, RelayError};

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Display names for the eight compass directions, as they should appear in
/// storm alerts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "UPPERCASE")]
pub struct CompassNames {
    pub n: String,
    pub ne: String,
    pub e: String,
    pub se: String,
    pub s: String,
    pub sw: String,
    pub w: String,
    pub nw: String,
}

impl CompassNames {
    pub fn name(&self, octant: Octant) -> &str {
        match octant {
            Octant::N => &self.n,
            Octant::NE => &self.ne,
            Octant::E => &self.e,
            Octant::SE => &self.se,
            Octant::S => &self.s,
            Octant::SW => &self.sw,
            Octant::W => &self.w,
            Octant::NW => &self.nw,
        }
    }
}

impl Default for CompassNames {
    fn default() -> Self {
        Self {
            n: "Severne".to_string(),
            ne: "Severo-Vychodne".to_string(),
            e: "Vychodne".to_string(),
            se: "Juho-Vychodne".to_string(),
            s: "Juzne".to_string(),
            sw: "Juho-Zapadne".to_string(),
            w: "Zapadne".to_string(),
            nw: "Severo-Zapadne".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StormConfig {
    /// Strikes per bucket per window needed to raise an alert.
    pub threshold: usize,
    /// Width of each distance band, in kilometres.
    pub bucket_km: f64,
    /// Aggregation window length.
    pub tick_secs: u64,
}

impl Default for StormConfig {
    fn default() -> Self {
        Self {
            threshold: 10,
            bucket_km: 10.0,
            tick_secs: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WarningFeedConfig {
    /// JSON warning endpoint. Empty disables warning polling.
    pub url: String,
    pub poll_secs: u64,
    pub timeout_secs: u64,
}

impl Default for WarningFeedConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            poll_secs: 600,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Plain-text forecast endpoint. Empty disables the daily digest.
    pub url: String,
    /// Local time of day, `"H:MM"`.
    pub alarm: String,
    /// How often the wall clock is compared against `alarm`.
    pub check_secs: u64,
    /// chrono format string for the digest's first chunk.
    pub header: String,
    pub channel: String,
    pub timeout_secs: u64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            alarm: "7:23".to_string(),
            check_secs: 30,
            header: "Pocasie pre %-d.%-m.%Y:".to_string(),
            channel: "Omega".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StrikeFeedConfig {
    /// `host:port` of a line-delimited JSON strike stream, or `-` for stdin.
    pub address: String,
    pub reconnect_secs: u64,
}

impl Default for StrikeFeedConfig {
    fn default() -> Self {
        Self {
            address: "-".to_string(),
            reconnect_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Device or file receiving outbound lines, or `-` for stdout.
    pub device: String,
    /// Minimum gap between two consecutive sends.
    pub pacing_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            device: "-".to_string(),
            pacing_secs: 15,
        }
    }
}

/// How text longer than the byte limit is fitted to a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Greedy multi-chunk split; nothing is dropped.
    #[default]
    Segment,
    /// One message only; text past the last boundary is dropped.
    Truncate,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Destination {
    pub max_bytes: usize,
    #[serde(default)]
    pub mode: DeliveryMode,
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Reference point strikes are measured from.
    pub position: GeoPoint,
    /// Strikes outside this box never reach the aggregator.
    pub strike_area: BoundingBox,
    /// Channel receiving storm and warning alerts.
    pub alert_channel: String,
    pub compass: CompassNames,
    pub storm: StormConfig,
    pub warnings: WarningFeedConfig,
    pub forecast: ForecastConfig,
    pub feed: StrikeFeedConfig,
    pub transport: TransportConfig,
    /// Per-channel byte limits.
    pub destinations: HashMap<String, Destination>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        let mut destinations = HashMap::new();
        destinations.insert(
            "ARES".to_string(),
            Destination { max_bytes: 155, mode: DeliveryMode::Segment },
        );
        destinations.insert(
            "Omega".to_string(),
            Destination { max_bytes: 130, mode: DeliveryMode::Segment },
        );

        Self {
            position: GeoPoint::new(48.14, 17.11),
            strike_area: BoundingBox {
                min_lat: 47.51,
                min_lon: 15.54,
                max_lat: 48.76,
                max_lon: 18.62,
            },
            alert_channel: "ARES".to_string(),
            compass: CompassNames::default(),
            storm: StormConfig::default(),
            warnings: WarningFeedConfig::default(),
            forecast: ForecastConfig::default(),
            feed: StrikeFeedConfig::default(),
            transport: TransportConfig::default(),
            destinations,
        }
    }
}

impl RelayConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, RelayError> {
        let config: RelayConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates the TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self, RelayError> {
        let text = fs::read_to_string(path)
            .map_err(|e| RelayError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn destination(&self, channel: &str) -> Result<Destination, RelayError> {
        self.destinations
            .get(channel)
            .copied()
            .ok_or_else(|| RelayError::UnknownDestination(channel.to_string()))
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        let fail = |msg: String| -> Result<(), RelayError> { Err(RelayError::Config(msg)) };

        if self.storm.threshold == 0 {
            return fail("storm.threshold must be at least 1".into());
        }
        if !(self.storm.bucket_km.is_finite() && self.storm.bucket_km > 0.0) {
            return fail(format!("storm.bucket_km must be positive, got {}", self.storm.bucket_km));
        }
        for (name, secs) in [
            ("storm.tick_secs", self.storm.tick_secs),
            ("warnings.poll_secs", self.warnings.poll_secs),
            ("forecast.check_secs", self.forecast.check_secs),
        ] {
            if secs == 0 {
                return fail(format!("{} must be greater than zero", name));
            }
        }

        let area = &self.strike_area;
        if area.min_lat > area.max_lat || area.min_lon > area.max_lon {
            return fail("strike_area minimums must not exceed maximums".into());
        }

        for (name, dest) in &self.destinations {
            if dest.max_bytes == 0 {
                return fail(format!("destination '{}' needs a positive max_bytes", name));
            }
        }
        self.destination(&self.alert_channel)
            .map_err(|_| RelayError::Config(format!("alert_channel '{}' has no destination entry", self.alert_channel)))?;
        self.destination(&self.forecast.channel)
            .map_err(|_| RelayError::Config(format!("forecast.channel '{}' has no destination entry", self.forecast.channel)))?;

        parse_alarm_time(&self.forecast.alarm)?;
        if StrftimeItems::new(&self.forecast.header).any(|item| matches!(item, Item::Error)) {
            return fail(format!("forecast.header '{}' is not a valid date format", self.forecast.header));
        }
        // Specifiers that parse but need a time of day only fail when rendered.
        if let Some(sample) = NaiveDate::from_ymd_opt(2000, 12, 31) {
            render_header(&self.forecast.header, sample)?;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
