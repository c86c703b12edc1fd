use std::net::SocketAddr;

use serde::Deserialize;

use crate::health::HealthConfig;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: SocketAddr,
    #[serde(default)]
    pub health: HealthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            health: HealthConfig::default(),
        }
    }
}

fn default_listen_address() -> SocketAddr {
    "0.0.0.0:8080".parse().expect("valid default listen address")
}
