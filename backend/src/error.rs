use thiserror::Error;

use adapters::AdapterError;

use crate::journal::StorageError;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Domain-level rejection before any adapter call.
    #[error("{0}")]
    Validation(String),

    /// A second deposit for the same `(token, exchange)` key while one is
    /// still in flight.
    #[error("There is a pending {token} deposit to {exchange} currently, please try again")]
    PendingConflict { token: String, exchange: String },

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
