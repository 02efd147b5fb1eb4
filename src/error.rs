//! Unified error type.

use crate::store::StoreError;

/// The error type returned by pressroom's startup and serving operations.
///
/// Request-level failures (400, 404, 409, ...) are expressed as
/// [`ApiError`](crate::ApiError) values, not as `Error`s. This type surfaces
/// infrastructure failures: loading configuration, connecting the store,
/// binding to a port.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(Box<figment::Error>),

    #[error("store: {0}")]
    Store(#[from] StoreError),
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Self::Config(Box::new(e))
    }
}
