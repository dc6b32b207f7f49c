//! Adapter backend that drives the external `r2d2` pool through the same
//! contract as the in-crate one.

use crate::conn::{Connection, ConnectionSource};
use crate::error::Result;
use crate::pool::{Backend, PoolConfig};
use crate::Error;
use parking_lot::Mutex;
use r2d2::{ManageConnection, Pool, PooledConnection};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Bridges a [`ConnectionSource`] to the `r2d2` manager contract.
pub struct MockManager {
    source: Arc<dyn ConnectionSource>,
    url: String,
}

impl ManageConnection for MockManager {
    type Connection = Connection;
    type Error = Error;

    fn connect(&self) -> Result<Connection> {
        self.source.connect(&self.url)
    }

    fn is_valid(&self, conn: &mut Connection) -> Result<()> {
        if self.source.validate(conn) {
            Ok(())
        } else {
            Err(Error::Source("connection failed validation".into()))
        }
    }

    fn has_broken(&self, _conn: &mut Connection) -> bool {
        false
    }
}

/// `r2d2` leases connections through RAII guards, while the benchmark
/// contract passes connection handles by value; the pool keeps each live
/// guard keyed by connection id and drops it on release.
pub struct ManagedPool {
    pool: Pool<MockManager>,
    guards: Mutex<HashMap<u64, PooledConnection<MockManager>>>,
    closed: AtomicBool,
}

impl ManagedPool {
    pub fn open(config: &PoolConfig, source: Arc<dyn ConnectionSource>) -> Result<Self> {
        let manager = MockManager {
            source,
            url: config.url.clone(),
        };
        let pool = Pool::builder()
            .max_size(config.pool_size as u32)
            .min_idle(Some(config.pool_size as u32))
            .connection_timeout(config.acquire_timeout)
            .idle_timeout(None)
            .max_lifetime(None)
            .test_on_check_out(false)
            .build(manager)
            .map_err(|err| Error::Source(Box::new(err)))?;
        Ok(Self {
            pool,
            guards: Mutex::new(HashMap::with_capacity(config.pool_size)),
            closed: AtomicBool::new(false),
        })
    }
}

impl Backend for ManagedPool {
    fn acquire(&self) -> Result<Connection> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::PoolClosed);
        }
        let guard = self.pool.get().map_err(|_| Error::PoolExhausted)?;
        let conn = (*guard).clone();
        self.guards.lock().insert(conn.id(), guard);
        Ok(conn)
    }

    fn release(&self, conn: Connection) -> Result<()> {
        match self.guards.lock().remove(&conn.id()) {
            // Dropping the guard hands the connection back to r2d2.
            Some(_guard) => Ok(()),
            None => Err(Error::InvalidRelease),
        }
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut guards = self.guards.lock();
        if !guards.is_empty() {
            warn!(outstanding = guards.len(), "pool closed with connections still leased");
        }
        guards.clear();
        Ok(())
    }

    fn leased(&self) -> usize {
        self.guards.lock().len()
    }
}
