//! Outbound alert dispatch.
//!
//! The dispatcher is the only component that knows each channel's byte
//! ceiling and the pacing the radio needs between messages. Producers call
//! [`AlertDispatcher::dispatch`] from any thread; the text is fitted to the
//! destination immediately and the resulting chunks are queued for a single
//! worker thread that owns the transport. Pacing sleeps happen only on that
//! worker, so feed ingestion and timers never stall behind a slow channel.
//!
//! Delivery is best effort: a failed chunk is logged and the remaining
//! chunks are still attempted.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::{DeliveryMode, Destination};
use crate::logging::{self, Source};
use crate::model::RelayError;
use crate::text::{segment, truncate};

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Outbound text channel. Message order per channel is preserved; there is
/// no delivery acknowledgement.
pub trait Transport: Send {
    fn send(&mut self, channel: &str, text: &str) -> Result<(), RelayError>;
}

/// Writes `"{channel}\t{text}\n"` per message to a device, file, or stdout,
/// for a radio bridge that reads one message per line.
pub struct LineTransport<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> LineTransport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl LineTransport<Box<dyn Write + Send>> {
    /// `-` writes to stdout; anything else is opened for appending.
    pub fn open(device: &str) -> Result<Self, RelayError> {
        let writer: Box<dyn Write + Send> = if device == "-" {
            Box::new(io::stdout())
        } else {
            Box::new(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(device)
                    .map_err(|e| RelayError::Transport(format!("cannot open {}: {}", device, e)))?,
            )
        };
        Ok(Self::new(writer))
    }
}

impl<W: Write + Send> Transport for LineTransport<W> {
    fn send(&mut self, channel: &str, text: &str) -> Result<(), RelayError> {
        // Line breaks would split one message into two on the bridge.
        let flat: String = text
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();
        writeln!(self.writer, "{}\t{}", channel, flat)?;
        self.writer.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fitting text to a destination
// ---------------------------------------------------------------------------

/// Fits `text` to `destination`'s byte ceiling according to its mode.
///
/// An empty result means there is nothing worth sending.
pub fn prepare(text: &str, destination: &Destination) -> Vec<String> {
    match destination.mode {
        DeliveryMode::Segment => segment(text, destination.max_bytes),
        DeliveryMode::Truncate => {
            let single = truncate(text, destination.max_bytes);
            if single.is_empty() { Vec::new() } else { vec![single] }
        }
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// One alert, already split into chunks, bound for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub channel: String,
    pub max_bytes: usize,
    pub chunks: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
    /// Chunks over the byte ceiling; never handed to the transport.
    pub refused: usize,
}

/// Enforces a minimum gap between consecutive sends.
pub struct Pacer {
    gap: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(gap: Duration) -> Self {
        Self { gap, last: None }
    }

    fn wait(&self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.gap {
                thread::sleep(self.gap - elapsed);
            }
        }
    }

    fn mark(&mut self) {
        self.last = Some(Instant::now());
    }
}

/// Sends every chunk of `job` in order, pacing between sends.
pub fn deliver<T: Transport + ?Sized>(transport: &mut T, job: &Outbound, pacer: &mut Pacer) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    for chunk in &job.chunks {
        if chunk.len() > job.max_bytes {
            report.refused += 1;
            logging::error(
                Source::Transport,
                Some(&job.channel),
                &format!("refusing {}-byte chunk over the {}-byte limit", chunk.len(), job.max_bytes),
            );
            continue;
        }

        pacer.wait();
        match transport.send(&job.channel, chunk) {
            Ok(()) => {
                report.sent += 1;
                logging::info(Source::Transport, Some(&job.channel), &format!("sent: {}", chunk));
            }
            Err(e) => {
                report.failed += 1;
                logging::warn(Source::Transport, Some(&job.channel), &format!("send failed: {}", e));
            }
        }
        pacer.mark();
    }

    logging::log_delivery_summary(
        &job.channel,
        job.chunks.len(),
        report.sent,
        report.failed + report.refused,
    );
    report
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct AlertDispatcher {
    queue: Sender<Outbound>,
    destinations: HashMap<String, Destination>,
}

impl AlertDispatcher {
    /// Starts the delivery worker. It runs until every clone of the
    /// dispatcher's queue is dropped, then drains what is left and exits.
    pub fn spawn<T: Transport + 'static>(
        mut transport: T,
        destinations: HashMap<String, Destination>,
        pacing: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (queue, jobs) = mpsc::channel::<Outbound>();
        let worker = thread::spawn(move || {
            let mut pacer = Pacer::new(pacing);
            for job in jobs {
                deliver(&mut transport, &job, &mut pacer);
            }
        });
        (Self { queue, destinations }, worker)
    }

    fn destination(&self, channel: &str) -> Result<Destination, RelayError> {
        self.destinations
            .get(channel)
            .copied()
            .ok_or_else(|| RelayError::UnknownDestination(channel.to_string()))
    }

    /// Fits `text` to `channel` and queues the chunks. Returns how many
    /// chunks were queued; zero means the text had nothing sendable.
    pub fn dispatch(&self, text: &str, channel: &str) -> Result<usize, RelayError> {
        let destination = self.destination(channel)?;
        let chunks = prepare(text, &destination);
        if chunks.is_empty() {
            logging::warn(
                Source::Transport,
                Some(channel),
                &format!("nothing sendable within {} bytes: {}", destination.max_bytes, text),
            );
            return Ok(0);
        }
        self.enqueue(channel, destination, chunks)
    }

    /// Queues chunks the caller already split, such as a digest with its own
    /// header chunk. Oversized chunks are refused by the worker.
    pub fn dispatch_chunks(&self, chunks: Vec<String>, channel: &str) -> Result<usize, RelayError> {
        let destination = self.destination(channel)?;
        if chunks.is_empty() {
            return Ok(0);
        }
        self.enqueue(channel, destination, chunks)
    }

    fn enqueue(&self, channel: &str, destination: Destination, chunks: Vec<String>) -> Result<usize, RelayError> {
        let count = chunks.len();
        self.queue
            .send(Outbound {
                channel: channel.to_string(),
                max_bytes: destination.max_bytes,
                chunks,
            })
            .map_err(|_| RelayError::DispatcherClosed)?;
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every send; fails the sends whose 0-based index is listed.
    #[derive(Clone, Default)]
    struct RecordingTransport {
        sent: Arc<Mutex<Vec<(String, String)>>>,
        fail_on: Vec<usize>,
        attempts: Arc<Mutex<usize>>,
    }

    impl Transport for RecordingTransport {
        fn send(&mut self, channel: &str, text: &str) -> Result<(), RelayError> {
            let mut attempts = self.attempts.lock().unwrap();
            let index = *attempts;
            *attempts += 1;
            if self.fail_on.contains(&index) {
                return Err(RelayError::Transport("radio busy".into()));
            }
            self.sent.lock().unwrap().push((channel.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn destinations() -> HashMap<String, Destination> {
        let mut map = HashMap::new();
        map.insert("ARES".to_string(), Destination { max_bytes: 12, mode: DeliveryMode::Segment });
        map.insert("ONE".to_string(), Destination { max_bytes: 12, mode: DeliveryMode::Truncate });
        map
    }

    #[test]
    fn test_prepare_segment_and_truncate_modes() {
        let seg = Destination { max_bytes: 8, mode: DeliveryMode::Segment };
        let one = Destination { max_bytes: 8, mode: DeliveryMode::Truncate };
        assert_eq!(prepare("hello world again", &seg), vec!["hello", "world", "again"]);
        assert_eq!(prepare("hello world again", &one), vec!["hello"]);
        assert!(prepare("unbreakable", &one).is_empty(), "truncate mode never sends fragments");
    }

    #[test]
    fn test_deliver_continues_after_failed_send() {
        let mut transport = RecordingTransport { fail_on: vec![1], ..Default::default() };
        let job = Outbound {
            channel: "ARES".into(),
            max_bytes: 12,
            chunks: vec!["one".into(), "two".into(), "three".into()],
        };
        let report = deliver(&mut transport, &job, &mut Pacer::new(Duration::ZERO));

        assert_eq!(report, DeliveryReport { sent: 2, failed: 1, refused: 0 });
        let sent = transport.sent.lock().unwrap();
        let texts: Vec<_> = sent.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["one", "three"]);
    }

    #[test]
    fn test_deliver_refuses_oversized_chunks() {
        let mut transport = RecordingTransport::default();
        let job = Outbound {
            channel: "ARES".into(),
            max_bytes: 4,
            chunks: vec!["ok".into(), "far too long".into()],
        };
        let report = deliver(&mut transport, &job, &mut Pacer::new(Duration::ZERO));
        assert_eq!(report, DeliveryReport { sent: 1, failed: 0, refused: 1 });
    }

    #[test]
    fn test_pacer_spaces_consecutive_sends() {
        let mut transport = RecordingTransport::default();
        let job = Outbound {
            channel: "ARES".into(),
            max_bytes: 12,
            chunks: vec!["a".into(), "b".into(), "c".into()],
        };
        let started = Instant::now();
        deliver(&mut transport, &job, &mut Pacer::new(Duration::from_millis(30)));
        assert!(
            started.elapsed() >= Duration::from_millis(60),
            "three sends need two gaps, took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn test_dispatcher_delivers_in_order_through_worker() {
        let transport = RecordingTransport::default();
        let sent = Arc::clone(&transport.sent);
        let (dispatcher, worker) = AlertDispatcher::spawn(transport, destinations(), Duration::ZERO);

        assert_eq!(dispatcher.dispatch("First. Second one.", "ARES"), Ok(2));
        assert_eq!(dispatcher.dispatch("hello world again", "ONE"), Ok(1));
        drop(dispatcher);
        worker.join().unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(
            *sent,
            vec![
                ("ARES".to_string(), "First.".to_string()),
                ("ARES".to_string(), "Second one.".to_string()),
                ("ONE".to_string(), "hello world".to_string()),
            ]
        );
    }

    #[test]
    fn test_dispatch_to_unknown_channel_is_an_error() {
        let (dispatcher, _worker) =
            AlertDispatcher::spawn(RecordingTransport::default(), destinations(), Duration::ZERO);
        assert_eq!(
            dispatcher.dispatch("x", "Nowhere"),
            Err(RelayError::UnknownDestination("Nowhere".into()))
        );
    }

    #[test]
    fn test_dispatch_unsendable_text_queues_nothing() {
        let (dispatcher, _worker) =
            AlertDispatcher::spawn(RecordingTransport::default(), destinations(), Duration::ZERO);
        assert_eq!(dispatcher.dispatch("   ", "ARES"), Ok(0));
        assert_eq!(dispatcher.dispatch("abcdefghijklmnop", "ONE"), Ok(0));
    }

    #[test]
    fn test_line_transport_writes_one_line_per_message() {
        let mut transport = LineTransport::new(Vec::new());
        transport.send("ARES", "[STORM]: 20km Juzne").unwrap();
        transport.send("Omega", "two\nlines").unwrap();
        let out = String::from_utf8(transport.into_inner()).unwrap();
        assert_eq!(out, "ARES\t[STORM]: 20km Juzne\nOmega\ttwo lines\n");
    }
}
