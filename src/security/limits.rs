use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// Resource limits applied while decoding requests
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Maximum size of the request line plus headers in bytes
    pub max_head_size: usize,
    /// Maximum number of header lines per request
    pub max_headers: usize,
    /// Maximum decoded request body size in bytes
    pub max_body_size: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_head_size: 16 * 1024,       // 16KB
            max_headers: 100,
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Connection tracking and management
///
/// Slots are handed out without waiting: a connection that arrives while
/// every slot is taken is rejected, not queued.
#[derive(Debug)]
pub struct ConnectionTracker {
    active_connections: AtomicUsize,
    total_connections: AtomicU64,
    connection_semaphore: Arc<Semaphore>,
    max_connections: usize,
}

impl ConnectionTracker {
    pub fn new(max_connections: usize) -> Self {
        Self {
            active_connections: AtomicUsize::new(0),
            total_connections: AtomicU64::new(0),
            connection_semaphore: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        }
    }

    /// Attempt to acquire a connection slot
    pub fn try_acquire(self: &Arc<Self>) -> Result<ConnectionGuard, ConnectionError> {
        let permit = self
            .connection_semaphore
            .clone()
            .try_acquire_owned()
            .map_err(|e| match e {
                TryAcquireError::NoPermits => ConnectionError::LimitReached {
                    limit: self.max_connections,
                },
                TryAcquireError::Closed => ConnectionError::Closed,
            })?;

        let active = self.active_connections.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total_connections.fetch_add(1, Ordering::SeqCst) + 1;

        tracing::debug!(
            active_connections = active,
            total_connections = total,
            "Connection acquired"
        );

        Ok(ConnectionGuard {
            _permit: permit,
            tracker: Arc::clone(self),
            start_time: Instant::now(),
        })
    }

    /// Get current metrics
    pub fn metrics(&self) -> ConnectionMetrics {
        ConnectionMetrics {
            active_connections: self.active_connections.load(Ordering::SeqCst),
            total_connections: self.total_connections.load(Ordering::SeqCst),
            available_slots: self.connection_semaphore.available_permits(),
            max_connections: self.max_connections,
        }
    }
}

/// RAII guard for connection tracking
///
/// Owns its permit so it can move into the task serving the connection.
pub struct ConnectionGuard {
    _permit: OwnedSemaphorePermit,
    tracker: Arc<ConnectionTracker>,
    start_time: Instant,
}

impl ConnectionGuard {
    /// Number of connections active, this one included
    pub fn active_connections(&self) -> usize {
        self.tracker.active_connections.load(Ordering::SeqCst)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let active = self
            .tracker
            .active_connections
            .fetch_sub(1, Ordering::SeqCst)
            - 1;
        let duration = self.start_time.elapsed();

        tracing::debug!(
            active_connections = active,
            connection_duration_ms = duration.as_millis(),
            "Connection released"
        );
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Connection limit of {limit} reached")]
    LimitReached { limit: usize },
    #[error("Connection tracker closed")]
    Closed,
}

/// Connection metrics for monitoring
#[derive(Debug, Clone)]
pub struct ConnectionMetrics {
    pub active_connections: usize,
    pub total_connections: u64,
    pub available_slots: usize,
    pub max_connections: usize,
}

/// Size validator for request heads and bodies
#[derive(Debug, Clone, Copy)]
pub struct SizeValidator {
    max_size: usize,
}

impl SizeValidator {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    pub fn validate_size(&self, size: usize) -> Result<(), SizeError> {
        if size > self.max_size {
            Err(SizeError::TooLarge {
                actual: size,
                max: self.max_size,
            })
        } else {
            Ok(())
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SizeError {
    #[error("{actual} bytes exceeds the maximum of {max} bytes")]
    TooLarge { actual: usize, max: usize },
}
