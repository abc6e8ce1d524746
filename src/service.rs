//! Relay wiring: feeds in, alerts out.
//!
//! Shared state and who touches it:
//! - the strike buffer and storm gate, inside [`EventAggregator`], written
//!   by the feed thread and drained by the storm timer;
//! - the warning gate, inside [`WarningPoller`], used by the warning timer;
//! - the daily gate, inside [`DailyAlarm`], used by the alarm timer.
//!
//! Each of those structures guards itself with its own mutex, so the three
//! timers and the feed thread can run concurrently on a shared
//! `Arc<Relay>`. The dispatcher's pacing sleeps happen on its own worker
//! thread and never block any of them.

use chrono::{Local, NaiveDate, NaiveDateTime};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::alert::schedule::{DailyAlarm, build_digest, parse_alarm_time};
use crate::alert::storm::EventAggregator;
use crate::alert::warnings::WarningPoller;
use crate::config::RelayConfig;
use crate::dispatch::{AlertDispatcher, LineTransport};
use crate::ingest::forecast::{ForecastSource, HttpForecastSource};
use crate::ingest::strikes::{StrikeFeed, open_stream};
use crate::ingest::warnings::{HttpWarningSource, WarningSource};
use crate::logging::{self, Source};
use crate::model::RelayError;

pub struct Relay {
    config: RelayConfig,
    aggregator: EventAggregator,
    warnings: WarningPoller,
    alarm: DailyAlarm,
    dispatcher: AlertDispatcher,
}

impl Relay {
    pub fn new(config: RelayConfig, dispatcher: AlertDispatcher) -> Result<Self, RelayError> {
        config.validate()?;
        let aggregator = EventAggregator::new(config.position, &config.storm, config.compass.clone());
        let alarm = DailyAlarm::new(parse_alarm_time(&config.forecast.alarm)?);
        Ok(Self {
            config,
            aggregator,
            warnings: WarningPoller::new(),
            alarm,
            dispatcher,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn aggregator(&self) -> &EventAggregator {
        &self.aggregator
    }

    fn send(&self, source: Source, text: &str, channel: &str) -> usize {
        logging::info(source, Some(channel), text);
        match self.dispatcher.dispatch(text, channel) {
            Ok(queued) => queued,
            Err(e) => {
                logging::error(source, Some(channel), &format!("dispatch failed: {}", e));
                0
            }
        }
    }

    // --- Warning feed ---------------------------------------------------------

    /// Fetches the warning list and dispatches every warning not seen before.
    /// A failed fetch skips this cycle. Returns the number of new warnings.
    pub fn poll_warnings(&self, source: &dyn WarningSource) -> usize {
        let records = match source.fetch() {
            Ok(records) => records,
            Err(e) => {
                logging::log_fetch_failure(Source::Warnings, "warning poll", &e);
                return 0;
            }
        };

        let alerts = self.warnings.poll(&records);
        logging::debug(
            Source::Warnings,
            None,
            &format!("{} warning(s) published, {} new", records.len(), alerts.len()),
        );
        for alert in &alerts {
            self.send(Source::Warnings, alert, &self.config.alert_channel);
        }
        alerts.len()
    }

    // --- Storm aggregation ----------------------------------------------------

    /// Closes the current strike window. Returns whether a storm alert went out.
    pub fn storm_tick(&self) -> bool {
        match self.aggregator.on_tick() {
            Some(alert) => {
                self.send(Source::Storm, &alert, &self.config.alert_channel);
                true
            }
            None => false,
        }
    }

    // --- Daily forecast -------------------------------------------------------

    /// Sends the forecast digest if the alarm is due at `now`. Returns the
    /// number of chunks queued.
    pub fn check_forecast_at(&self, now: NaiveDateTime, source: &dyn ForecastSource) -> usize {
        if !self.alarm.is_due_at(now) {
            return 0;
        }
        logging::debug(Source::Forecast, None, &format!("alarm {} triggered", self.alarm.time()));
        self.send_forecast(source, now.date())
    }

    /// Fetches, splits, and queues the digest for `date`.
    pub fn send_forecast(&self, source: &dyn ForecastSource, date: NaiveDate) -> usize {
        let channel = &self.config.forecast.channel;
        let text = match source.fetch() {
            Ok(text) => text,
            Err(e) => {
                logging::log_fetch_failure(Source::Forecast, "forecast fetch", &e);
                return 0;
            }
        };

        let max_bytes = match self.config.destination(channel) {
            Ok(dest) => dest.max_bytes,
            Err(e) => {
                logging::error(Source::Forecast, Some(channel), &e.to_string());
                return 0;
            }
        };

        let digest = match build_digest(&text, max_bytes, &self.config.forecast.header, date) {
            Ok(digest) => digest,
            Err(e) => {
                logging::error(Source::Forecast, Some(channel), &e.to_string());
                return 0;
            }
        };
        match self.dispatcher.dispatch_chunks(digest, channel) {
            Ok(queued) => queued,
            Err(e) => {
                logging::error(Source::Forecast, Some(channel), &format!("dispatch failed: {}", e));
                0
            }
        }
    }

    // --- Strike feed ----------------------------------------------------------

    /// Pumps the strike stream into the aggregator, reconnecting after a
    /// fixed delay whenever it drops. Returns only when stdin is the source
    /// and it reaches end of file.
    pub fn run_feed(&self) {
        let address = self.config.feed.address.as_str();
        let feed = StrikeFeed::new(self.config.strike_area);
        let reconnect = Duration::from_secs(self.config.feed.reconnect_secs);

        loop {
            match open_stream(address).and_then(|reader| feed.pump(reader, &self.aggregator)) {
                Ok(stats) => logging::info(
                    Source::Feed,
                    Some(address),
                    &format!(
                        "stream ended: {} accepted, {} outside area, {} malformed",
                        stats.accepted, stats.outside, stats.malformed
                    ),
                ),
                Err(e) => logging::log_fetch_failure(Source::Feed, "strike stream", &e),
            }

            if address == "-" {
                return;
            }
            thread::sleep(reconnect);
        }
    }

    // --- Timers ---------------------------------------------------------------

    /// Starts the warning, storm, and alarm timers on their own threads.
    /// A timer whose source is `None` is not started.
    pub fn spawn_timers(
        self: &Arc<Self>,
        warnings: Option<Box<dyn WarningSource>>,
        forecast: Option<Box<dyn ForecastSource>>,
    ) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        if let Some(source) = warnings {
            let relay = Arc::clone(self);
            let period = Duration::from_secs(relay.config.warnings.poll_secs);
            handles.push(thread::spawn(move || loop {
                relay.poll_warnings(source.as_ref());
                thread::sleep(period);
            }));
        }

        let relay = Arc::clone(self);
        let period = Duration::from_secs(relay.config.storm.tick_secs);
        handles.push(thread::spawn(move || loop {
            thread::sleep(period);
            relay.storm_tick();
        }));

        if let Some(source) = forecast {
            let relay = Arc::clone(self);
            let period = Duration::from_secs(relay.config.forecast.check_secs);
            handles.push(thread::spawn(move || loop {
                relay.check_forecast_at(Local::now().naive_local(), source.as_ref());
                thread::sleep(period);
            }));
        }

        handles
    }
}

/// Builds the transport, dispatcher, and feed clients from `config` and runs
/// until the process is terminated.
pub fn run(config: RelayConfig) -> Result<(), RelayError> {
    let transport = LineTransport::open(&config.transport.device)?;
    let (dispatcher, _worker) = AlertDispatcher::spawn(
        transport,
        config.destinations.clone(),
        Duration::from_secs(config.transport.pacing_secs),
    );

    let warnings: Option<Box<dyn WarningSource>> = if config.warnings.url.is_empty() {
        logging::info(Source::Warnings, None, "no warning feed configured");
        None
    } else {
        let timeout = Duration::from_secs(config.warnings.timeout_secs);
        Some(Box::new(HttpWarningSource::new(&config.warnings.url, timeout)?))
    };

    let forecast: Option<Box<dyn ForecastSource>> = if config.forecast.url.is_empty() {
        logging::info(Source::Forecast, None, "no forecast feed configured");
        None
    } else {
        let timeout = Duration::from_secs(config.forecast.timeout_secs);
        Some(Box::new(HttpForecastSource::new(&config.forecast.url, timeout)?))
    };

    let relay = Arc::new(Relay::new(config, dispatcher)?);
    logging::info(
        Source::System,
        None,
        &format!(
            "relay up: position {:.2},{:.2}, alerts to {}",
            relay.config.position.lat, relay.config.position.lon, relay.config.alert_channel
        ),
    );

    let timers = relay.spawn_timers(warnings, forecast);
    relay.run_feed();

    for timer in timers {
        if timer.join().is_err() {
            logging::error(Source::System, None, "timer thread panicked");
        }
    }
    Ok(())
}
