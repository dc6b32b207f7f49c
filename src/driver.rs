//! The benchmark driver: one harness per batch, one `cycle` per trial.

use crate::conn::{Connection, MockSource, SourceRegistry};
use crate::error::Result;
use crate::pool::{self, Backend, BackendKind, PoolConfig};
use crate::work::{consume_cpu, sleep_micros, yield_if};
use crate::Error;
use std::sync::Arc;
use tracing::{debug, warn};

const MOCK_SOURCE_NAME: &str = "mock";

/// Workload shape of a single trial. The external framework supplies the
/// cross-product of values; each combination is an independent configuration.
#[derive(Clone, Copy, Debug)]
pub struct WorkloadParams {
    /// CPU burn units before the yield/sleep window.
    pub pre_work: u64,
    /// CPU burn units after the sleep, before release.
    pub post_work: u64,
    /// Whether to yield the scheduler once per trial.
    pub yield_thread: bool,
    /// Target blocking delay per trial, in microseconds.
    pub sleep_us: u64,
}

impl Default for WorkloadParams {
    fn default() -> Self {
        Self {
            pre_work: 10,
            post_work: 10,
            yield_thread: false,
            sleep_us: 500,
        }
    }
}

/// Per-batch context: the source registry and the single live pool instance.
/// Built once in setup, shared by every trial thread, torn down once.
pub struct Harness {
    registry: SourceRegistry,
    pool: Box<dyn Backend>,
    params: WorkloadParams,
}

impl Harness {
    /// Registers the mock connection source, resolves it through the
    /// registry by the configured URL, and opens the pool under test.
    pub fn setup(config: &PoolConfig, params: WorkloadParams) -> Result<Self> {
        let registry = SourceRegistry::new();
        registry.register(MOCK_SOURCE_NAME, Arc::new(MockSource::new()));
        let source = registry
            .lookup(&config.url)
            .ok_or_else(|| Error::Registration(format!("no source accepts {:?}", config.url)))?;
        let pool = pool::open(config, source)?;
        debug!(backend = %config.backend, pool_size = config.pool_size, "pool opened");
        Ok(Self {
            registry,
            pool,
            params,
        })
    }

    /// Runs one trial: acquire, pre-work, optional yield, timed sleep,
    /// post-work, release. Errors propagate to the caller unmasked; there is
    /// no retry and no path that skips the release once acquire succeeded
    /// and the workload ran.
    ///
    /// The released connection handle is returned so the framework can
    /// black-box it, keeping the measured operations live.
    pub fn cycle(&self) -> Result<Connection> {
        let conn = self.pool.acquire()?;

        consume_cpu(self.params.pre_work);
        yield_if(self.params.yield_thread);
        sleep_micros(self.params.sleep_us);
        consume_cpu(self.params.post_work);

        let token = conn.clone();
        self.pool.release(conn)?;
        Ok(token)
    }

    /// Outstanding-lease count of the pool under test.
    pub fn leased(&self) -> usize {
        self.pool.leased()
    }

    /// Closes the pool and deregisters the mock source. Registration faults
    /// here are idempotency races, logged rather than raised.
    pub fn teardown(self) {
        if let Err(err) = self.pool.close() {
            warn!(%err, "unable to close pool");
        }
        self.registry.deregister(MOCK_SOURCE_NAME);
    }
}

/// Ad-hoc single-trial entry: pool of size one, default workload, one cycle.
/// Useful for smoke-testing a backend outside the statistical framework.
pub fn run_once(backend: BackendKind) -> Result<Connection> {
    let harness = Harness::setup(&PoolConfig::new(backend, 1), WorkloadParams::default())?;
    let conn = harness.cycle()?;
    harness.teardown();
    Ok(conn)
}
