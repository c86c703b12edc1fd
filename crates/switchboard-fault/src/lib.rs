//! Fault Domain Manager: the router's last line of defense.
//!
//! Grounded in the teacher's general idiom for global shared state —
//! plain atomics under `Ordering::Relaxed`, read by every request path
//! without a lock, the same shape `ProviderHealth` uses for its error
//! counters — generalized to a kill switch, a degradation level, and a
//! service-isolation set, none of which the teacher itself has a
//! direct analog for.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use dashmap::DashMap;
use switchboard_core::EngineType;

/// How much of the routing surface is currently disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradationLevel {
    None,
    Partial,
    Full,
    Emergency,
}

impl DegradationLevel {
    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Partial,
            2 => Self::Full,
            3 => Self::Emergency,
            _ => Self::None,
        }
    }

    const fn as_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Partial => 1,
            Self::Full => 2,
            Self::Emergency => 3,
        }
    }

    /// Whether a feature tagged `feature` is disabled at this level.
    /// Each level strictly widens the disabled set of the one below it.
    #[must_use]
    pub fn disables(self, feature: Feature) -> bool {
        match self {
            Self::None => false,
            Self::Partial => matches!(feature, Feature::Streaming),
            Self::Full => matches!(feature, Feature::Streaming | Feature::NonPriorityTraffic),
            Self::Emergency => true,
        }
    }
}

/// Feature tags the degradation ladder can gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Streaming,
    NonPriorityTraffic,
}

/// Single global kill switch plus degradation level, each a single
/// atomic word — readers never take a lock.
pub struct FaultDomainManager {
    kill_switch: AtomicBool,
    degradation: AtomicU8,
    isolated: DashMap<(EngineType, String), ()>,
}

impl Default for FaultDomainManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultDomainManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            kill_switch: AtomicBool::new(false),
            degradation: AtomicU8::new(DegradationLevel::None.as_u8()),
            isolated: DashMap::new(),
        }
    }

    #[must_use]
    pub fn kill_switch_enabled(&self) -> bool {
        self.kill_switch.load(Ordering::Relaxed)
    }

    pub fn set_kill_switch(&self, enabled: bool) {
        self.kill_switch.store(enabled, Ordering::Relaxed);
        tracing::warn!(enabled, "kill switch toggled");
    }

    #[must_use]
    pub fn degradation_level(&self) -> DegradationLevel {
        DegradationLevel::from_u8(self.degradation.load(Ordering::Relaxed))
    }

    pub fn set_degradation_level(&self, level: DegradationLevel) {
        self.degradation.store(level.as_u8(), Ordering::Relaxed);
        tracing::warn!(?level, "degradation level changed");
    }

    #[must_use]
    pub fn is_isolated(&self, engine_type: EngineType, endpoint: &str) -> bool {
        self.isolated.contains_key(&(engine_type, endpoint.to_owned()))
    }

    pub fn isolate(&self, engine_type: EngineType, endpoint: &str) {
        self.isolated.insert((engine_type, endpoint.to_owned()), ());
        tracing::warn!(%engine_type, endpoint, "upstream isolated");
    }

    pub fn clear_isolation(&self, engine_type: EngineType, endpoint: &str) {
        self.isolated.remove(&(engine_type, endpoint.to_owned()));
    }

    /// Whether a call against `engine_type`/`endpoint` for `feature`
    /// should be gated before it ever reaches the breaker or pool.
    #[must_use]
    pub fn gate(&self, engine_type: EngineType, endpoint: &str, feature: Feature) -> Result<(), GateRejection> {
        if self.kill_switch_enabled() {
            return Err(GateRejection::KillSwitch);
        }
        if self.is_isolated(engine_type, endpoint) {
            return Err(GateRejection::Isolated);
        }
        if self.degradation_level().disables(feature) {
            return Err(GateRejection::Degraded(self.degradation_level()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum GateRejection {
    KillSwitch,
    Isolated,
    Degraded(DegradationLevel),
}
