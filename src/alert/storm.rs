//! Lightning strike aggregation into storm alerts.
//!
//! Strikes arrive one at a time from the feed and are reduced to an
//! octant/distance pair relative to the reference point. On each tick the
//! buffered strikes are counted per spatial bucket; every bucket at or
//! above the threshold that has never fired before contributes one part to
//! a single `[STORM]` alert. The buffer is emptied on every tick whether or
//! not anything fired.
//!
//! A bucket that fired once stays silent for the rest of the process, even
//! if the storm drifts away and returns.

use std::collections::HashMap;
use std::mem;
use std::sync::{Mutex, PoisonError};

use crate::alert::dedup::DedupGate;
use crate::analysis::geo::bearing_and_distance;
use crate::config::{CompassNames, StormConfig};
use crate::model::{BearingDistance, BucketKey, GeoPoint};

/// Tag that opens every storm alert.
pub const STORM_PREFIX: &str = "[STORM]: ";

pub struct EventAggregator {
    origin: GeoPoint,
    threshold: usize,
    bucket_km: f64,
    compass: CompassNames,
    buffer: Mutex<Vec<BearingDistance>>,
    fired: DedupGate,
}

impl EventAggregator {
    pub fn new(origin: GeoPoint, storm: &StormConfig, compass: CompassNames) -> Self {
        Self {
            origin,
            threshold: storm.threshold,
            bucket_km: storm.bucket_km,
            compass,
            buffer: Mutex::new(Vec::new()),
            fired: DedupGate::persistent(),
        }
    }

    /// Buffers one strike. Geographic filtering has already happened at
    /// the feed boundary.
    pub fn on_event(&self, strike: GeoPoint) {
        let bd = bearing_and_distance(&self.origin, &strike);
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(bd);
    }

    /// Number of strikes waiting for the next tick.
    pub fn buffered(&self) -> usize {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Drains the buffer and returns the storm alert for this window, if
    /// any bucket crossed the threshold for the first time.
    ///
    /// Parts appear in the order their buckets were first seen in the
    /// window.
    pub fn on_tick(&self) -> Option<String> {
        let window = mem::take(&mut *self.buffer.lock().unwrap_or_else(PoisonError::into_inner));

        let mut order: Vec<BucketKey> = Vec::new();
        let mut counts: HashMap<BucketKey, usize> = HashMap::new();
        for strike in &window {
            let key = strike.bucket(self.bucket_km);
            let count = counts.entry(key).or_insert(0);
            if *count == 0 {
                order.push(key);
            }
            *count += 1;
        }

        let parts: Vec<String> = order
            .into_iter()
            .filter(|key| counts[key] >= self.threshold)
            .filter(|key| self.fired.should_fire(&key.to_string()))
            .map(|key| self.describe(key))
            .collect();

        if parts.is_empty() {
            return None;
        }
        Some(format!("{}{}", STORM_PREFIX, parts.join(", ")))
    }

    /// `"{band start}km {direction}"`, e.g. `"20km Severne"`.
    ///
    /// The band start is rounded to 0.1 km; whole kilometres print without
    /// a fraction.
    fn describe(&self, key: BucketKey) -> String {
        let start_km = (f64::from(key.band) * self.bucket_km * 10.0).round() / 10.0;
        format!("{}km {}", start_km, self.compass.name(key.octant))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator() -> EventAggregator {
        EventAggregator::new(
            GeoPoint::new(0.0, 0.0),
            &StormConfig::default(),
            CompassNames::default(),
        )
    }

    /// ~22 km east of the origin: bucket (E, 2).
    fn east_strike() -> GeoPoint {
        GeoPoint::new(0.0, 0.2)
    }

    /// ~55 km north of the origin: bucket (N, 5).
    fn north_strike() -> GeoPoint {
        GeoPoint::new(0.5, 0.0)
    }

    fn feed(agg: &EventAggregator, point: GeoPoint, n: usize) {
        for _ in 0..n {
            agg.on_event(point);
        }
    }

    #[test]
    fn test_threshold_reached_fires_once() {
        let agg = aggregator();
        feed(&agg, east_strike(), 10);
        assert_eq!(agg.on_tick().as_deref(), Some("[STORM]: 20km Vychodne"));
    }

    #[test]
    fn test_below_threshold_is_silent() {
        let agg = aggregator();
        feed(&agg, east_strike(), 9);
        assert_eq!(agg.on_tick(), None);
    }

    #[test]
    fn test_fired_bucket_never_refires() {
        let agg = aggregator();
        feed(&agg, east_strike(), 10);
        assert!(agg.on_tick().is_some());
        feed(&agg, east_strike(), 10);
        assert_eq!(agg.on_tick(), None, "bucket (E, 2) already fired in an earlier window");
    }

    #[test]
    fn test_buffer_cleared_even_without_alert() {
        let agg = aggregator();
        feed(&agg, east_strike(), 9);
        assert_eq!(agg.on_tick(), None);
        assert_eq!(agg.buffered(), 0);
        feed(&agg, east_strike(), 1);
        assert_eq!(agg.on_tick(), None, "counts must not roll over between windows");
    }

    #[test]
    fn test_multiple_buckets_join_in_discovery_order() {
        let agg = aggregator();
        agg.on_event(north_strike());
        feed(&agg, east_strike(), 10);
        feed(&agg, north_strike(), 9);
        assert_eq!(
            agg.on_tick().as_deref(),
            Some("[STORM]: 50km Severne, 20km Vychodne")
        );
    }

    #[test]
    fn test_new_bucket_fires_alongside_suppressed_one() {
        let agg = aggregator();
        feed(&agg, east_strike(), 10);
        agg.on_tick();
        feed(&agg, east_strike(), 10);
        feed(&agg, north_strike(), 10);
        assert_eq!(agg.on_tick().as_deref(), Some("[STORM]: 50km Severne"));
    }

    #[test]
    fn test_custom_threshold_and_band_width() {
        let storm = StormConfig {
            threshold: 2,
            bucket_km: 25.0,
            ..StormConfig::default()
        };
        let agg = EventAggregator::new(GeoPoint::new(0.0, 0.0), &storm, CompassNames::default());
        feed(&agg, north_strike(), 2);
        assert_eq!(agg.on_tick().as_deref(), Some("[STORM]: 50km Severne"));
    }

    #[test]
    fn test_fractional_band_width_prints_without_float_noise() {
        let storm = StormConfig {
            threshold: 1,
            bucket_km: 0.1,
            ..StormConfig::default()
        };
        let agg = EventAggregator::new(GeoPoint::new(0.0, 0.0), &storm, CompassNames::default());
        // ~0.36 km north: band 3, which starts at 0.1 * 3 = 0.30000000000000004.
        agg.on_event(GeoPoint::new(0.0032, 0.0));
        assert_eq!(agg.on_tick().as_deref(), Some("[STORM]: 0.3km Severne"));
    }
}
