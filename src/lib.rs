//! Micro-benchmark harness for connection pool acquire/release throughput.
//!
//! The pool under test is fed by a zero-cost mock connection source, so the
//! measured loop isolates pool overhead from network and database latency.
//! Interchangeable backends sit behind one [`Backend`] contract; the trial
//! loop in [`Harness`] never learns which backend it drives.

mod conn;
mod driver;
mod error;
mod fixed;
mod managed;
mod pool;
pub mod work;

pub use conn::{Connection, ConnectionSource, MockSource, SourceRegistry, MOCK_URL};
pub use driver::{run_once, Harness, WorkloadParams};
pub use error::{BoxDynError, Error, Result};
pub use fixed::{FixedPool, PoolMetrics};
pub use managed::{ManagedPool, MockManager};
pub use pool::{open, Backend, BackendKind, PoolConfig};
