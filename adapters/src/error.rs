use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    /// Transport-level failure talking to a venue or the chain endpoint.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote side answered with an application-level error.
    #[error("{0}")]
    Remote(String),

    /// The requested operation is not available on this venue, e.g. an
    /// unsupported deposit token.
    #[error("{0}")]
    Unsupported(String),
}
