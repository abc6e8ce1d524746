//! Alert generation.
//!
//! - `dedup`: fire-once gates with a persistent or daily reset policy
//! - `storm`: strike aggregation into `[STORM]` alerts
//! - `warnings`: warning feed deduplication and formatting
//! - `schedule`: daily forecast alarm and digest assembly

pub mod dedup;
pub mod schedule;
pub mod storm;
pub mod warnings;
