//! Active health probing of every registered adapter.
//!
//! Repurposes the teacher's background-discovery pattern (spawn once,
//! immediate first pass, then tick forever on an interval) into an
//! active-probe loop that calls each adapter's [`Adapter::health_check`]
//! instead of fetching a model list.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use switchboard_adapters::Adapter;
use switchboard_core::EngineType;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Healthy,
    Degraded,
    Down,
}

#[derive(Debug)]
pub struct UpstreamHealth {
    status: std::sync::atomic::AtomicU8,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
    last_check_unix: std::sync::atomic::AtomicU64,
    quarantine_until_unix: std::sync::atomic::AtomicU64,
}

impl UpstreamHealth {
    fn new() -> Self {
        Self {
            status: std::sync::atomic::AtomicU8::new(0),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
            last_check_unix: std::sync::atomic::AtomicU64::new(0),
            quarantine_until_unix: std::sync::atomic::AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn status(&self) -> Status {
        match self.status.load(Ordering::Relaxed) {
            0 => Status::Healthy,
            1 => Status::Degraded,
            _ => Status::Down,
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status() != Status::Down && now_secs() >= self.quarantine_until_unix.load(Ordering::Relaxed)
    }

    fn set_status(&self, status: Status) {
        self.status.store(
            match status {
                Status::Healthy => 0,
                Status::Degraded => 1,
                Status::Down => 2,
            },
            Ordering::Relaxed,
        );
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy)]
pub struct HealthMonitorConfig {
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    pub degraded_after_failures: u32,
    pub down_after_failures: u32,
    pub recovered_after_successes: u32,
    pub router_failure_quarantine: Duration,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(3),
            degraded_after_failures: 1,
            down_after_failures: 3,
            recovered_after_successes: 2,
            router_failure_quarantine: Duration::from_secs(5),
        }
    }
}

/// One registered adapter the monitor probes on a fixed interval.
pub struct MonitoredUpstream {
    pub engine_type: EngineType,
    pub endpoint: String,
    pub adapter: Arc<dyn Adapter>,
}

/// Tracks and periodically refreshes the health of every registered
/// upstream. Keyed by `"{engine_type}:{endpoint}"` in a `DashMap`, the
/// same concurrency shape the teacher uses for per-provider state.
pub struct HealthMonitor {
    table: DashMap<String, Arc<UpstreamHealth>>,
    config: HealthMonitorConfig,
}

fn key(engine_type: EngineType, endpoint: &str) -> String {
    format!("{engine_type}:{endpoint}")
}

impl HealthMonitor {
    #[must_use]
    pub fn new(config: HealthMonitorConfig) -> Self {
        Self {
            table: DashMap::new(),
            config,
        }
    }

    #[must_use]
    pub fn health_for(&self, engine_type: EngineType, endpoint: &str) -> Arc<UpstreamHealth> {
        self.table
            .entry(key(engine_type, endpoint))
            .or_insert_with(|| Arc::new(UpstreamHealth::new()))
            .clone()
    }

    /// Called by the router immediately on a failed call, independent
    /// of the probe cadence, so a single bad response quarantines an
    /// upstream without waiting for the next tick.
    pub fn record_router_failure(&self, engine_type: EngineType, endpoint: &str) {
        let health = self.health_for(engine_type, endpoint);
        health
            .quarantine_until_unix
            .store(now_secs() + self.config.router_failure_quarantine.as_secs(), Ordering::Relaxed);
    }

    async fn probe_one(&self, upstream: &MonitoredUpstream) {
        let health = self.health_for(upstream.engine_type, &upstream.endpoint);
        health.last_check_unix.store(now_secs(), Ordering::Relaxed);

        match upstream.adapter.health_check(self.config.probe_timeout).await {
            Ok(()) => {
                health.consecutive_failures.store(0, Ordering::Relaxed);
                let successes = health.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
                if successes >= self.config.recovered_after_successes {
                    health.set_status(Status::Healthy);
                }
            }
            Err(e) => {
                health.consecutive_successes.store(0, Ordering::Relaxed);
                let failures = health.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                if failures >= self.config.down_after_failures {
                    health.set_status(Status::Down);
                    tracing::warn!(endpoint = %upstream.endpoint, error = %e, "upstream marked down");
                } else if failures >= self.config.degraded_after_failures {
                    health.set_status(Status::Degraded);
                    tracing::debug!(endpoint = %upstream.endpoint, error = %e, "upstream probe failed");
                }
            }
        }
    }

    async fn refresh_all(&self, upstreams: &[MonitoredUpstream]) {
        for upstream in upstreams {
            self.probe_one(upstream).await;
        }
    }

    /// Spawn the periodic probe loop. Grounded on the teacher's
    /// `start_discovery` task: run once immediately, then tick forever
    /// until `shutdown` fires.
    pub fn spawn(self: Arc<Self>, upstreams: Vec<MonitoredUpstream>, shutdown: CancellationToken) {
        tokio::spawn(async move {
            self.refresh_all(&upstreams).await;
            let mut interval = tokio::time::interval(self.config.probe_interval);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = interval.tick() => self.refresh_all(&upstreams).await,
                }
            }
        });
    }

    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Status> {
        self.table.iter().map(|e| (e.key().clone(), e.value().status())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_upstream_is_healthy_and_available() {
        let monitor = HealthMonitor::new(HealthMonitorConfig::default());
        let health = monitor.health_for(EngineType::Vllm, "http://localhost:8000");
        assert_eq!(health.status(), Status::Healthy);
        assert!(health.is_available());
    }

    #[test]
    fn router_failure_quarantines_immediately() {
        let monitor = HealthMonitor::new(HealthMonitorConfig {
            router_failure_quarantine: Duration::from_secs(60),
            ..Default::default()
        });
        monitor.record_router_failure(EngineType::Vllm, "http://localhost:8000");
        let health = monitor.health_for(EngineType::Vllm, "http://localhost:8000");
        assert!(!health.is_available());
    }
}
