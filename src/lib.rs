//! Weather alert relay for a narrow-bandwidth text radio channel.
//!
//! Ingests a streaming lightning feed and a polled warning feed, turns them
//! into short deduplicated alerts, and sends them in byte-bounded chunks.

pub mod alert;
pub mod analysis;
pub mod config;
pub mod dispatch;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod service;
pub mod text;
