/// Lightning strike stream client
///
/// Reads newline-delimited JSON strike notices, such as the payloads of a
/// Blitzortung MQTT topic piped through `mosquitto_sub`, or a TCP bridge
/// that emits one object per line. Only `lat` and `lon` are used; every
/// other field is ignored.
///
/// The strike area filter lives here, at the boundary: strikes outside it
/// are counted and dropped and never reach the aggregator.

use serde::Deserialize;
use std::io::{self, BufRead, BufReader};
use std::net::TcpStream;

use crate::alert::storm::EventAggregator;
use crate::logging::{self, Source};
use crate::model::{BoundingBox, GeoPoint, RelayError};

// ============================================================================
// Wire Format
// ============================================================================

/// One strike notice. Extra fields (time, altitude, station list...) are
/// skipped by serde.
#[derive(Debug, Deserialize)]
struct StrikeMessage {
    lat: f64,
    lon: f64,
}

/// Parses a single feed line into a strike position.
pub fn parse_strike(line: &str) -> Result<GeoPoint, RelayError> {
    let msg: StrikeMessage = serde_json::from_str(line.trim())?;
    Ok(GeoPoint::new(msg.lat, msg.lon))
}

// ============================================================================
// Stream Pump
// ============================================================================

/// Per-connection counters, reported when the stream ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub accepted: usize,
    pub outside: usize,
    pub malformed: usize,
}

pub struct StrikeFeed {
    area: BoundingBox,
}

impl StrikeFeed {
    pub fn new(area: BoundingBox) -> Self {
        Self { area }
    }

    /// Classifies one line, updating `stats`. Returns the strike only if it
    /// parsed and lies inside the strike area.
    pub fn accept(&self, line: &str, stats: &mut FeedStats) -> Option<GeoPoint> {
        if line.trim().is_empty() {
            return None;
        }
        match parse_strike(line) {
            Ok(point) if self.area.contains(&point) => {
                stats.accepted += 1;
                Some(point)
            }
            Ok(_) => {
                stats.outside += 1;
                None
            }
            Err(e) => {
                stats.malformed += 1;
                logging::debug(Source::Feed, None, &format!("dropping line: {}", e));
                None
            }
        }
    }

    /// Forwards every accepted strike from `reader` to `aggregator` until
    /// end of stream.
    ///
    /// Malformed lines are skipped. A read error ends the stream and is
    /// returned so the caller can reconnect.
    pub fn pump<R: BufRead>(&self, reader: R, aggregator: &EventAggregator) -> Result<FeedStats, RelayError> {
        let mut stats = FeedStats::default();
        for line in reader.lines() {
            let line = line.map_err(|e| RelayError::Fetch(format!("strike stream read failed: {}", e)))?;
            if let Some(point) = self.accept(&line, &mut stats) {
                aggregator.on_event(point);
            }
        }
        Ok(stats)
    }
}

/// Opens the configured strike stream: `-` is stdin, anything else is a
/// `host:port` TCP address.
pub fn open_stream(address: &str) -> Result<Box<dyn BufRead + Send>, RelayError> {
    if address == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let stream = TcpStream::connect(address)
        .map_err(|e| RelayError::Fetch(format!("cannot connect to {}: {}", address, e)))?;
    Ok(Box::new(BufReader::new(stream)))
}

// ============================================================================
// Tests
// ============================================================================
