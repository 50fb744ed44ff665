//! Interchangeable transport adapters for the runtime channel.
//!
//! Each adapter implements [`RuntimeClient`], [`ReelClient`] and
//! [`PresentationClient`] over its own wire mechanism and routes every call
//! through a [`grhost_core::CallPolicy`].

pub mod duplex;
pub mod pipe;
pub mod rpc;
mod stream;

pub use stream::{AsyncStream, LocalListener, connect_local};

use backon::{ExponentialBuilder, Retryable};
use grhost_core::{
    CancellationScope, EndpointProvider, EventBus, HostError, PresentationClient, ProcessId,
    ReelClient, RetryConfig, RuntimeClient,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Everything an adapter needs to know about the process it talks to
#[derive(Clone)]
pub struct TransportContext {
    pub pid: ProcessId,
    pub events: EventBus,
    pub scope: Arc<CancellationScope>,
    pub call_timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryConfig,
}

/// Endpoint providers for the three client roles
#[derive(Clone)]
pub struct EndpointSet {
    pub runtime: Arc<EndpointProvider<dyn RuntimeClient>>,
    pub reels: Arc<EndpointProvider<dyn ReelClient>>,
    pub presentation: Arc<EndpointProvider<dyn PresentationClient>>,
}

impl Default for EndpointSet {
    fn default() -> Self {
        Self {
            runtime: Arc::new(EndpointProvider::new("runtime")),
            reels: Arc::new(EndpointProvider::new("reels")),
            presentation: Arc::new(EndpointProvider::new("presentation")),
        }
    }
}

impl EndpointSet {
    /// Install one adapter instance in every role slot
    pub fn register<T>(&self, client: Arc<T>)
    where
        T: RuntimeClient + ReelClient + PresentationClient + 'static,
    {
        self.runtime.add_or_update(client.clone());
        self.reels.add_or_update(client.clone());
        self.presentation.add_or_update(client);
    }

    pub fn clear(&self) {
        self.runtime.clear();
        self.reels.clear();
        self.presentation.clear();
    }
}

/// Backoff between connection attempts to a freshly started game process
pub(crate) fn retry_strategy(config: &RetryConfig) -> ExponentialBuilder {
    let mut builder = ExponentialBuilder::default()
        .with_min_delay(config.min_delay())
        .with_max_delay(config.max_delay())
        .with_max_times(config.retries());

    if !config.use_exponential_backoff {
        builder = builder.with_factor(1.0);
    }
    if config.jitter {
        builder = builder.with_jitter();
    }
    builder
}

/// Run `attempt` until it succeeds, fails permanently or runs out of retries.
///
/// Each attempt is bounded by `timeout`.
pub(crate) async fn connect_with_retry<T, F, Fut>(
    transport: &'static str,
    config: &RetryConfig,
    timeout: Duration,
    mut attempt: F,
) -> Result<T, HostError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HostError>>,
{
    let bounded = || {
        let next = attempt();
        async move {
            tokio::time::timeout(timeout, next)
                .await
                .map_err(|_| HostError::timeout(format!("{transport} connect attempt")))?
        }
    };

    let result = bounded
        .retry(retry_strategy(config))
        .when(|e: &HostError| e.is_retryable())
        .notify(|e: &HostError, delay: Duration| {
            warn!(
                transport,
                error = %e,
                retry_in_ms = delay.as_millis() as u64,
                "Connection attempt failed"
            );
        })
        .await;

    if result.is_ok() {
        info!(transport, "Runtime channel connected");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            min_delay_ms: 1,
            max_delay_ms: 5,
            max_attempts,
            use_exponential_backoff: false,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_connect_retries_until_success() {
        let attempts = AtomicU32::new(0);
        let result = connect_with_retry("test", &fast_retry(5), Duration::from_secs(1), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(HostError::connection_failed("refused"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_connect_stops_on_permanent_error() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), HostError> =
            connect_with_retry("test", &fast_retry(5), Duration::from_secs(1), || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(HostError::configuration_error("bad endpoint")) }
            })
            .await;

        assert!(matches!(result, Err(HostError::ConfigurationError(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_gives_up_after_max_attempts() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), HostError> =
            connect_with_retry("test", &fast_retry(3), Duration::from_secs(1), || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(HostError::connection_failed("refused")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
