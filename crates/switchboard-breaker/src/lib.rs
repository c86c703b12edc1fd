//! Per-upstream circuit breaker.
//!
//! Extends the teacher-shaped two-state health tracker (closed/broken)
//! into the full three-state machine this core needs: `Closed` admits
//! every call and counts failures in a sliding window; `Open` fails
//! fast until `recovery_seconds` elapse; `HalfOpen` admits at most
//! `half_open_max_calls` concurrent probes and requires
//! `success_threshold` consecutive successes, not just one, before
//! returning to `Closed`.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

/// Observable state of a single upstream's breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub error_threshold: u32,
    pub window_seconds: u64,
    pub recovery_seconds: u64,
    pub half_open_max_calls: u32,
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            error_threshold: 5,
            window_seconds: 60,
            recovery_seconds: 30,
            half_open_max_calls: 1,
            success_threshold: 1,
        }
    }
}

struct Entry {
    error_count: AtomicU32,
    window_start: AtomicU64,
    opened_at: AtomicU64,
    half_open_in_flight: AtomicU32,
    half_open_successes: AtomicU32,
}

impl Entry {
    fn new() -> Self {
        Self {
            error_count: AtomicU32::new(0),
            window_start: AtomicU64::new(now_secs()),
            opened_at: AtomicU64::new(0),
            half_open_in_flight: AtomicU32::new(0),
            half_open_successes: AtomicU32::new(0),
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Result of asking whether a call may be admitted.
pub enum Admission {
    /// Call may proceed. `HalfOpen` admissions must be matched with a
    /// call to [`CircuitBreaker::record_result`] to release the slot.
    Admit(CircuitState),
    /// Breaker is open; fail fast without touching the upstream.
    Reject,
}

/// Tracks breaker state for every `(engine_type, endpoint)` key behind
/// a lock-free map, mirroring the concurrency shape of the health
/// monitor's `UpstreamHealth` table.
pub struct CircuitBreaker {
    entries: DashMap<String, Entry>,
    config: BreakerConfig,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    fn entry(&self, key: &str) -> dashmap::mapref::one::Ref<'_, String, Entry> {
        if !self.entries.contains_key(key) {
            self.entries.entry(key.to_owned()).or_insert_with(Entry::new);
        }
        self.entries.get(key).expect("just inserted")
    }

    #[must_use]
    pub fn state(&self, key: &str) -> CircuitState {
        let entry = self.entry(key);
        let opened_at = entry.opened_at.load(Ordering::Relaxed);
        if opened_at == 0 {
            return CircuitState::Closed;
        }
        if now_secs().saturating_sub(opened_at) >= self.config.recovery_seconds {
            CircuitState::HalfOpen
        } else {
            CircuitState::Open
        }
    }

    /// Ask permission to make a call against `key`.
    pub fn try_admit(&self, key: &str) -> Admission {
        match self.state(key) {
            CircuitState::Closed => Admission::Admit(CircuitState::Closed),
            CircuitState::Open => Admission::Reject,
            CircuitState::HalfOpen => {
                let entry = self.entry(key);
                let in_flight = entry.half_open_in_flight.fetch_add(1, Ordering::SeqCst);
                if in_flight >= self.config.half_open_max_calls {
                    entry.half_open_in_flight.fetch_sub(1, Ordering::SeqCst);
                    Admission::Reject
                } else {
                    Admission::Admit(CircuitState::HalfOpen)
                }
            }
        }
    }

    /// Record the outcome of a call previously admitted via
    /// [`Self::try_admit`].
    pub fn record_result(&self, key: &str, admitted_as: CircuitState, success: bool) {
        match admitted_as {
            CircuitState::HalfOpen => self.record_half_open(key, success),
            _ => {
                if success {
                    self.record_success(key);
                } else {
                    self.record_failure(key);
                }
            }
        }
    }

    fn record_half_open(&self, key: &str, success: bool) {
        let entry = self.entry(key);
        entry.half_open_in_flight.fetch_sub(1, Ordering::SeqCst);

        if success {
            let successes = entry.half_open_successes.fetch_add(1, Ordering::SeqCst) + 1;
            if successes >= self.config.success_threshold {
                entry.opened_at.store(0, Ordering::SeqCst);
                entry.error_count.store(0, Ordering::SeqCst);
                entry.half_open_successes.store(0, Ordering::SeqCst);
                entry.window_start.store(now_secs(), Ordering::SeqCst);
                tracing::info!(upstream = key, "circuit closed after recovery");
            }
        } else {
            entry.half_open_successes.store(0, Ordering::SeqCst);
            entry.opened_at.store(now_secs(), Ordering::SeqCst);
            tracing::warn!(upstream = key, "half-open probe failed, circuit re-opened");
        }
    }

    fn record_success(&self, key: &str) {
        let entry = self.entry(key);
        entry.error_count.store(0, Ordering::Relaxed);
        entry.window_start.store(now_secs(), Ordering::Relaxed);
    }

    fn record_failure(&self, key: &str) {
        let entry = self.entry(key);
        let now = now_secs();
        let window_start = entry.window_start.load(Ordering::Relaxed);
        if now.saturating_sub(window_start) > self.config.window_seconds {
            entry.error_count.store(1, Ordering::Relaxed);
            entry.window_start.store(now, Ordering::Relaxed);
            return;
        }

        let errors = entry.error_count.fetch_add(1, Ordering::Relaxed) + 1;
        if errors >= self.config.error_threshold {
            entry.opened_at.store(now, Ordering::Relaxed);
            tracing::warn!(upstream = key, errors, "circuit opened");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            error_threshold: 3,
            window_seconds: 60,
            recovery_seconds: 30,
            half_open_max_calls: 1,
            success_threshold: 2,
        })
    }

    #[test]
    fn starts_closed() {
        let b = breaker();
        assert!(matches!(b.state("up"), CircuitState::Closed));
    }

    #[test]
    fn failures_below_threshold_stay_closed() {
        let b = breaker();
        b.record_failure("up");
        b.record_failure("up");
        assert!(matches!(b.state("up"), CircuitState::Closed));
    }

    #[test]
    fn failures_at_threshold_open_circuit() {
        let b = breaker();
        for _ in 0..3 {
            b.record_failure("up");
        }
        assert!(matches!(b.state("up"), CircuitState::Open));
    }

    #[test]
    fn half_open_requires_success_threshold_calls() {
        let b = breaker();
        for _ in 0..3 {
            b.record_failure("up");
        }
        // force recovery window to have elapsed
        b.entries.get("up").unwrap().opened_at.store(1, Ordering::SeqCst);
        assert!(matches!(b.state("up"), CircuitState::HalfOpen));

        b.record_half_open("up", true);
        assert!(matches!(b.state("up"), CircuitState::HalfOpen));

        b.record_half_open("up", true);
        assert!(matches!(b.state("up"), CircuitState::Closed));
    }

    #[test]
    fn half_open_failure_reopens() {
        let b = breaker();
        for _ in 0..3 {
            b.record_failure("up");
        }
        b.entries.get("up").unwrap().opened_at.store(1, Ordering::SeqCst);
        b.record_half_open("up", false);
        assert!(matches!(b.state("up"), CircuitState::Open));
    }

    #[test]
    fn half_open_bounds_concurrent_probes() {
        let b = breaker();
        for _ in 0..3 {
            b.record_failure("up");
        }
        b.entries.get("up").unwrap().opened_at.store(1, Ordering::SeqCst);

        assert!(matches!(b.try_admit("up"), Admission::Admit(CircuitState::HalfOpen)));
        assert!(matches!(b.try_admit("up"), Admission::Reject));
    }

    #[test]
    fn independent_upstream_tracking() {
        let b = breaker();
        for _ in 0..3 {
            b.record_failure("a");
        }
        assert!(matches!(b.state("a"), CircuitState::Open));
        assert!(matches!(b.state("b"), CircuitState::Closed));
    }
}
