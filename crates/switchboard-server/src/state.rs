use std::sync::Arc;

use switchboard_fault::FaultDomainManager;
use switchboard_health::HealthMonitor;
use switchboard_router::Router;

/// Shared handles every handler needs. Cheap to clone: every field is
/// already behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<Router>,
    pub fault: Arc<FaultDomainManager>,
    pub health: Arc<HealthMonitor>,
}
