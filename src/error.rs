use std::error::Error as StdError;
use std::result::Result as StdResult;

pub type BoxDynError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("pool timed out while waiting for a connection")]
    PoolExhausted,

    #[error("released a connection that is not leased from this pool")]
    InvalidRelease,

    #[error("attempted to acquire a connection on a closed pool")]
    PoolClosed,

    #[error("connection source registration failed: {0}")]
    Registration(String),

    #[error("error returned from a connection source")]
    Source(#[source] BoxDynError),
}

pub type Result<T> = StdResult<T, Error>;
