//! In-crate fixed-size backend: a lock-free queue of idle connections guarded
//! by a thread-parking semaphore.

use crate::conn::{Connection, ConnectionSource};
use crate::error::Result;
use crate::pool::{Backend, PoolConfig};
use crate::Error;
use crossbeam_queue::{ArrayQueue, SegQueue};
use crossbeam_utils::Backoff;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, Thread};
use std::time::{Duration, Instant};
use tracing::warn;

/// Counting semaphore for synchronous callers. Permits are taken with a CAS
/// loop and contended waits park the thread; a released permit unparks one
/// queued waiter. A stale queue entry only costs the popped thread a spurious
/// wake-up, never a lost permit.
struct Semaphore {
    permits: AtomicUsize,
    waiters: SegQueue<Thread>,
}

impl Semaphore {
    fn new(permits: usize) -> Self {
        Self {
            permits: AtomicUsize::new(permits),
            waiters: SegQueue::new(),
        }
    }

    fn try_acquire(&self) -> bool {
        let backoff = Backoff::new();
        let mut permits = self.permits.load(Ordering::Acquire);
        loop {
            if permits == 0 {
                return false;
            }
            match self.permits.compare_exchange_weak(
                permits,
                permits - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(changed) => permits = changed,
            }
            backoff.spin();
        }
    }

    /// Takes a permit, parking up to `timeout`. Returns false on timeout.
    fn acquire_timeout(&self, timeout: Duration) -> bool {
        if self.try_acquire() {
            return true;
        }
        let deadline = Instant::now() + timeout;
        loop {
            self.waiters.push(thread::current());
            // Re-check after enqueueing so a permit added in between cannot
            // be missed while we park.
            if self.try_acquire() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::park_timeout(deadline - now);
            if self.try_acquire() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
        }
    }

    fn add_permit(&self) {
        self.permits.fetch_add(1, Ordering::Release);
        if let Some(waiter) = self.waiters.pop() {
            waiter.unpark();
        }
    }
}

/// Acquire/release counters, maintained only when the config enables them.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    pub acquires: u64,
    pub releases: u64,
}

#[derive(Default)]
struct Counters {
    acquires: AtomicU64,
    releases: AtomicU64,
}

/// A fixed-size pool: `pool_size` connections are created up front and only
/// replaced if one fails validation after sitting idle past the validation
/// timeout.
pub struct FixedPool {
    source: Arc<dyn ConnectionSource>,
    url: String,
    idle: ArrayQueue<(Connection, Instant)>,
    semaphore: Semaphore,
    leased: Mutex<HashSet<u64>>,
    closed: AtomicBool,
    acquire_timeout: Duration,
    validation_timeout: Duration,
    counters: Option<Counters>,
}

impl FixedPool {
    pub fn open(config: &PoolConfig, source: Arc<dyn ConnectionSource>) -> Result<Self> {
        let idle = ArrayQueue::new(config.pool_size);
        let now = Instant::now();
        for _ in 0..config.pool_size {
            let conn = source.connect(&config.url)?;
            // Cannot overflow: the queue holds exactly pool_size entries.
            let _ = idle.push((conn, now));
        }
        Ok(Self {
            source,
            url: config.url.clone(),
            idle,
            semaphore: Semaphore::new(config.pool_size),
            leased: Mutex::new(HashSet::with_capacity(config.pool_size)),
            closed: AtomicBool::new(false),
            acquire_timeout: config.acquire_timeout,
            validation_timeout: config.validation_timeout,
            counters: config.metrics_enabled.then(Counters::default),
        })
    }

    fn checkout(&self) -> Result<Connection> {
        while let Some((conn, idle_since)) = self.idle.pop() {
            if idle_since.elapsed() < self.validation_timeout || self.source.validate(&conn) {
                return Ok(conn);
            }
            // Stale and invalid: discard and fall through to a replacement.
        }
        self.source.connect(&self.url)
    }

    /// Counter snapshot, present only when metrics were enabled at open.
    pub fn metrics(&self) -> Option<PoolMetrics> {
        self.counters.as_ref().map(|counters| PoolMetrics {
            acquires: counters.acquires.load(Ordering::Relaxed),
            releases: counters.releases.load(Ordering::Relaxed),
        })
    }
}

impl Backend for FixedPool {
    fn acquire(&self) -> Result<Connection> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::PoolClosed);
        }
        if !self.semaphore.acquire_timeout(self.acquire_timeout) {
            return Err(Error::PoolExhausted);
        }
        let conn = match self.checkout() {
            Ok(conn) => conn,
            Err(err) => {
                self.semaphore.add_permit();
                return Err(err);
            }
        };
        self.leased.lock().insert(conn.id());
        if let Some(counters) = &self.counters {
            counters.acquires.fetch_add(1, Ordering::Relaxed);
        }
        Ok(conn)
    }

    fn release(&self, mut conn: Connection) -> Result<()> {
        if !self.leased.lock().remove(&conn.id()) {
            return Err(Error::InvalidRelease);
        }
        if self.closed.load(Ordering::Acquire) {
            conn.close();
        } else {
            let _ = self.idle.push((conn, Instant::now()));
        }
        self.semaphore.add_permit();
        if let Some(counters) = &self.counters {
            counters.releases.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        while let Some((mut conn, _)) = self.idle.pop() {
            conn.close();
        }
        let outstanding = self.leased.lock().len();
        if outstanding > 0 {
            warn!(outstanding, "pool closed with connections still leased");
        }
        Ok(())
    }

    fn leased(&self) -> usize {
        self.leased.lock().len()
    }
}
