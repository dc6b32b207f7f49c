//! Connection handles, the connection-source contract, the zero-cost mock
//! source, and the explicit source registry.

use crate::error::Result;
use crate::Error;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Stub URL handed to the pool under test; the mock source accepts anything.
pub const MOCK_URL: &str = "mock://bench";

/// An opaque leased resource. Identity is for equality and debugging only;
/// the handle holds no backing I/O.
#[derive(Clone, Debug)]
pub struct Connection {
    id: u64,
    open: bool,
}

impl Connection {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Marks the connection closed. Closing an already-closed connection is
    /// a no-op; the pool contract still requires exactly one release per
    /// acquire.
    pub fn close(&mut self) {
        self.open = false;
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

/// A factory for connections, the "driver" side of the pool contract.
pub trait ConnectionSource: Send + Sync {
    /// Whether this source can serve the given connection URL.
    fn accepts(&self, url: &str) -> bool;

    /// Produces a new open connection for `url`. Must not block on I/O.
    fn connect(&self, url: &str) -> Result<Connection>;

    /// Whether an idle connection is still usable. Sources with no backing
    /// resource have nothing to check.
    fn validate(&self, _conn: &Connection) -> bool {
        true
    }
}

/// A connection source with no backing I/O: `connect` is O(1) and constant
/// across runs regardless of the URL content, so pool overhead is measured
/// in isolation.
#[derive(Debug, Default)]
pub struct MockSource {
    next_id: AtomicU64,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConnectionSource for MockSource {
    fn accepts(&self, _url: &str) -> bool {
        true
    }

    fn connect(&self, _url: &str) -> Result<Connection> {
        Ok(Connection {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            open: true,
        })
    }
}

/// An explicit name-to-source registry standing in for a process-wide driver
/// registry. Mutated only during setup and teardown, never during trials.
#[derive(Default)]
pub struct SourceRegistry {
    entries: Mutex<Vec<(String, Arc<dyn ConnectionSource>)>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `source` under `name`, erroring if the name is taken.
    pub fn try_register(&self, name: &str, source: Arc<dyn ConnectionSource>) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.iter().any(|(n, _)| n == name) {
            return Err(Error::Registration(format!(
                "source {name:?} is already registered"
            )));
        }
        entries.push((name.to_owned(), source));
        Ok(())
    }

    /// Removes the registration for `name`, erroring if it is absent.
    pub fn try_deregister(&self, name: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        match entries.iter().position(|(n, _)| n == name) {
            Some(index) => {
                entries.remove(index);
                Ok(())
            }
            None => Err(Error::Registration(format!(
                "source {name:?} is not registered"
            ))),
        }
    }

    /// Registers `source` under `name`; a duplicate registration is logged
    /// and dropped, leaving the existing entry in place.
    pub fn register(&self, name: &str, source: Arc<dyn ConnectionSource>) {
        if let Err(err) = self.try_register(name, source) {
            warn!(name, %err, "unable to register connection source");
        }
    }

    /// Deregisters `name`; an absent registration is logged, not raised.
    pub fn deregister(&self, name: &str) {
        if let Err(err) = self.try_deregister(name) {
            warn!(name, %err, "unable to deregister connection source");
        }
    }

    /// Returns the first registered source that accepts `url`.
    pub fn lookup(&self, url: &str) -> Option<Arc<dyn ConnectionSource>> {
        self.entries
            .lock()
            .iter()
            .find(|(_, source)| source.accepts(url))
            .map(|(_, source)| Arc::clone(source))
    }

    /// Number of effective registrations.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
