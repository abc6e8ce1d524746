/// Fire-once gates for alert deduplication.
///
/// Warnings, storm buckets, and the daily forecast alarm all need the same
/// "has this already gone out?" check. They differ only in when a key may
/// fire again, which is captured by [`ResetPolicy`].
///
/// # Clock injection
/// `should_fire_at` takes the calendar date explicitly. `should_fire` is
/// the convenience wrapper that reads the local clock; tests use the `_at`
/// form to stay deterministic.
///
/// # Concurrency
/// Each gate owns its own mutex, so one gate can be shared between timer
/// threads through an `Arc` without any outer lock.

use chrono::{Local, NaiveDate};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

// ---------------------------------------------------------------------------
// Reset policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetPolicy {
    /// A key fires once for the lifetime of the process.
    Never,
    /// A key fires once per calendar date.
    Daily,
}

impl ResetPolicy {
    /// The scope a key is remembered under on `today`.
    fn scope(self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            ResetPolicy::Never => None,
            ResetPolicy::Daily => Some(today),
        }
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

pub struct DedupGate {
    policy: ResetPolicy,
    fired: Mutex<HashMap<Option<NaiveDate>, HashSet<String>>>,
}

impl DedupGate {
    pub fn new(policy: ResetPolicy) -> Self {
        Self {
            policy,
            fired: Mutex::new(HashMap::new()),
        }
    }

    /// Gate that never forgets a key.
    pub fn persistent() -> Self {
        Self::new(ResetPolicy::Never)
    }

    /// Gate whose keys become eligible again on the next calendar date.
    pub fn daily() -> Self {
        Self::new(ResetPolicy::Daily)
    }

    /// Returns `true` the first time `key` is seen in its scope and marks it
    /// fired; every later call in the same scope returns `false`.
    ///
    /// For the daily policy, scopes older than `today` are discarded.
    pub fn should_fire_at(&self, key: &str, today: NaiveDate) -> bool {
        let scope = self.policy.scope(today);
        let mut fired = self.fired.lock().unwrap_or_else(PoisonError::into_inner);

        if self.policy == ResetPolicy::Daily {
            fired.retain(|date, _| date.is_some_and(|d| d >= today));
        }

        fired.entry(scope).or_default().insert(key.to_string())
    }

    /// Convenience wrapper that uses the local calendar date.
    pub fn should_fire(&self, key: &str) -> bool {
        self.should_fire_at(key, Local::now().date_naive())
    }

    /// Number of keys currently remembered across all scopes.
    pub fn len(&self) -> usize {
        self.fired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(HashSet::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
