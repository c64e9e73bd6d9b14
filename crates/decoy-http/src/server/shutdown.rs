//! Graceful shutdown of the accept loop and in-flight connections.

use crate::error::ServerError;
use hyper_util::server::graceful::GracefulShutdown;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Grace period and hard timeout for stopping the server.
///
/// Always satisfies `timeout >= grace_period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownTimeouts {
    grace_period: Duration,
    timeout: Duration,
}

impl ShutdownTimeouts {
    /// Abort all connections at once. Used when the server handle is dropped.
    pub const IMMEDIATE: Self = Self {
        grace_period: Duration::ZERO,
        timeout: Duration::ZERO,
    };

    pub fn new(grace_period: Duration, timeout: Duration) -> Result<Self, ServerError> {
        if timeout < grace_period {
            return Err(ServerError::TimeoutBeforeGrace {
                grace_period,
                timeout,
            });
        }
        Ok(Self {
            grace_period,
            timeout,
        })
    }

    pub fn from_millis(grace_period_ms: i64, timeout_ms: i64) -> Result<Self, ServerError> {
        if grace_period_ms < 0 {
            return Err(ServerError::NegativeGracePeriod(grace_period_ms));
        }
        if timeout_ms < 0 {
            return Err(ServerError::NegativeTimeout(timeout_ms));
        }
        Self::new(
            Duration::from_millis(grace_period_ms.unsigned_abs()),
            Duration::from_millis(timeout_ms.unsigned_abs()),
        )
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for ShutdownTimeouts {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_millis(500),
            timeout: Duration::from_millis(1000),
        }
    }
}

/// Closes out connections after the listener has stopped accepting.
///
/// Up to the grace period connections are left alone to finish; then they
/// are told to close after their current exchange; whatever is still open at
/// the hard timeout is aborted.
pub(crate) async fn drain(
    mut connections: JoinSet<()>,
    graceful: GracefulShutdown,
    timeouts: ShutdownTimeouts,
) {
    let settled = tokio::time::timeout(timeouts.grace_period, join_all(&mut connections)).await;
    if settled.is_ok() {
        return;
    }

    debug!(
        "{} connections still open after grace period, closing gracefully",
        connections.len()
    );
    let remaining = timeouts.timeout.saturating_sub(timeouts.grace_period);
    let closed = tokio::time::timeout(remaining, async {
        graceful.shutdown().await;
        join_all(&mut connections).await;
    })
    .await;
    if closed.is_err() {
        warn!(
            "Aborting {} connections still open after {:?}",
            connections.len(),
            timeouts.timeout
        );
        connections.shutdown().await;
    }
}

async fn join_all(connections: &mut JoinSet<()>) {
    while connections.join_next().await.is_some() {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_timeouts() {
        let t = ShutdownTimeouts::from_millis(0, 0).unwrap();
        assert_eq!(t, ShutdownTimeouts::IMMEDIATE);

        let t = ShutdownTimeouts::from_millis(500, 1000).unwrap();
        assert_eq!(t, ShutdownTimeouts::default());
        assert_eq!(t.grace_period(), Duration::from_millis(500));
        assert_eq!(t.timeout(), Duration::from_millis(1000));
    }

    #[test]
    fn test_rejects_negative_values() {
        assert!(matches!(
            ShutdownTimeouts::from_millis(-1, 100),
            Err(ServerError::NegativeGracePeriod(-1))
        ));
        assert!(matches!(
            ShutdownTimeouts::from_millis(0, -5),
            Err(ServerError::NegativeTimeout(-5))
        ));
    }

    #[test]
    fn test_rejects_timeout_shorter_than_grace() {
        let err = ShutdownTimeouts::new(Duration::from_secs(2), Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ServerError::TimeoutBeforeGrace { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_aborts_stuck_connections_at_timeout() {
        let mut connections = JoinSet::new();
        connections.spawn(std::future::pending::<()>());
        let started = tokio::time::Instant::now();

        drain(
            connections,
            GracefulShutdown::new(),
            ShutdownTimeouts::new(Duration::from_millis(100), Duration::from_millis(300)).unwrap(),
        )
        .await;

        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_drain_returns_once_connections_finish() {
        let mut connections = JoinSet::new();
        connections.spawn(async {});

        drain(connections, GracefulShutdown::new(), ShutdownTimeouts::default()).await;
    }
}
