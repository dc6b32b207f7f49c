//! The backend-neutral pool contract: configuration, the capability set every
//! backend under test implements, and the tag-to-constructor dispatch.

use crate::conn::{Connection, ConnectionSource, MOCK_URL};
use crate::error::Result;
use crate::fixed::FixedPool;
use crate::managed::ManagedPool;
use crate::Error;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Which pool implementation a batch runs against. Resolved exactly once,
/// in [`open`]; the trial loop never branches on it afterward.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BackendKind {
    /// In-crate fixed-size pool (lock-free idle queue plus parking semaphore).
    Fixed,
    /// The external `r2d2` pool behind the same contract.
    R2d2,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => f.write_str("fixed"),
            Self::R2d2 => f.write_str("r2d2"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "r2d2" => Ok(Self::R2d2),
            other => Err(Error::Registration(format!("unknown backend {other:?}"))),
        }
    }
}

/// Immutable per-batch pool settings. The benchmark runs a fixed-size pool
/// (initial size equals maximum size) with validation effectively disabled.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    pub backend: BackendKind,
    pub pool_size: usize,
    pub url: String,
    /// How long `acquire` waits before failing with [`Error::PoolExhausted`].
    pub acquire_timeout: Duration,
    /// Idle age beyond which a connection is re-validated before reuse. Set
    /// far past any run length so validation never skews a measurement.
    pub validation_timeout: Duration,
    /// Off by default; counting acquires inside the measured path is skew.
    pub metrics_enabled: bool,
}

impl PoolConfig {
    pub fn new(backend: BackendKind, pool_size: usize) -> Self {
        Self {
            backend,
            pool_size,
            url: MOCK_URL.to_owned(),
            acquire_timeout: Duration::from_secs(30),
            validation_timeout: Duration::from_secs(15 * 60),
            metrics_enabled: false,
        }
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn metrics_enabled(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }
}

/// Capability set of a pool under test. One instance is live per batch and
/// is shared by every trial thread, so implementations must support
/// concurrent `acquire`/`release`.
pub trait Backend: Send + Sync {
    /// Leases a connection, waiting up to the configured acquire timeout.
    fn acquire(&self) -> Result<Connection>;

    /// Returns a leased connection to the pool. Fails with
    /// [`Error::InvalidRelease`] if the connection is not currently leased
    /// from this pool.
    fn release(&self, conn: Connection) -> Result<()>;

    /// Drains and closes all pooled connections. Safe to call again once
    /// closed; later acquires fail with [`Error::PoolClosed`].
    fn close(&self) -> Result<()>;

    /// Number of connections currently leased out.
    fn leased(&self) -> usize;
}

/// Resolves the configured backend tag into a live pool instance.
pub fn open(config: &PoolConfig, source: Arc<dyn ConnectionSource>) -> Result<Box<dyn Backend>> {
    match config.backend {
        BackendKind::Fixed => Ok(Box::new(FixedPool::open(config, source)?)),
        BackendKind::R2d2 => Ok(Box::new(ManagedPool::open(config, source)?)),
    }
}
