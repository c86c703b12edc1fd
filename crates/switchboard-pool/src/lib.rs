//! Per-upstream connection pool.
//!
//! Combines `reqwest::Client`'s native idle-connection pooling with an
//! explicit [`tokio::sync::Semaphore`] bound on concurrent in-flight
//! requests per upstream, since TCP keep-alive reuse alone doesn't cap
//! how many requests can be outstanding against a single endpoint at
//! once.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no connection became available within {0:?}")]
    Exhausted(Duration),
    #[error("failed to build http client: {0}")]
    Build(String),
}

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: usize,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub stream_read_timeout: Duration,
    pub tls_verify: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 64,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            stream_read_timeout: Duration::from_secs(300),
            tls_verify: true,
        }
    }
}

/// One pool per upstream. Holds a long-lived `reqwest::Client` plus a
/// semaphore bounding concurrent requests beyond what the client's own
/// idle-connection cap allows.
pub struct ConnectionPool {
    client: Client,
    semaphore: Arc<Semaphore>,
    config: PoolConfig,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(config.max_connections)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(!config.tls_verify)
            .build()
            .map_err(|e| PoolError::Build(e.to_string()))?;

        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(config.max_connections)),
            config,
        })
    }

    /// Acquire a permit and return the shared client for use with a
    /// custom per-request timeout (e.g. the longer streaming read
    /// timeout). The permit must be held for the full lifetime of the
    /// request, including any streaming body read; the returned
    /// [`Lease`] owns its permit so it can be moved into a boxed stream.
    pub async fn acquire(&self) -> Result<Lease, PoolError> {
        let permit = tokio::time::timeout(self.config.connect_timeout, Arc::clone(&self.semaphore).acquire_owned())
            .await
            .map_err(|_| PoolError::Exhausted(self.config.connect_timeout))?
            .expect("semaphore never closed");

        Ok(Lease {
            client: self.client.clone(),
            _permit: permit,
        })
    }

    #[must_use]
    pub const fn stream_read_timeout(&self) -> Duration {
        self.config.stream_read_timeout
    }
}

/// A held connection slot. Dropping it releases the permit; the
/// caller should drop it as soon as the call (including a streamed
/// body) completes, errors, or is cancelled. Cloning `reqwest::Client`
/// is cheap (it's an `Arc` over the connection pool internally), so the
/// lease can own its client handle without an extra allocation per call.
pub struct Lease {
    client: Client,
    _permit: OwnedSemaphorePermit,
}

impl Lease {
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_succeeds_under_capacity() {
        let pool = ConnectionPool::new(PoolConfig {
            max_connections: 2,
            ..Default::default()
        })
        .unwrap();

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        drop(a);
        drop(b);
    }

    #[tokio::test]
    async fn acquire_times_out_when_exhausted() {
        let pool = ConnectionPool::new(PoolConfig {
            max_connections: 1,
            connect_timeout: Duration::from_millis(50),
            ..Default::default()
        })
        .unwrap();

        let _held = pool.acquire().await.unwrap();
        let result = pool.acquire().await;
        assert!(matches!(result, Err(PoolError::Exhausted(_))));
    }
}
