use thiserror::Error;

use crate::http::FetchError;
use crate::storage::DatabaseError;

/// Failures surfaced by the ingestion, aggregation and registry services.
#[derive(Debug, Error)]
pub enum Error {
    /// The feed URL is already subscribed
    #[error("Feed already exists: {0}")]
    DuplicateFeed(String),

    #[error("{0} not found")]
    NotFound(String),

    /// The trending top-list call failed; there is no partial result
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(#[source] FetchError),

    /// The upstream answered, but with a body that is not a feed or not the
    /// expected JSON. Feed refreshes log this and carry on with no entries.
    #[error("Malformed source: {0}")]
    MalformedSource(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Database(DatabaseError),
}

impl From<DatabaseError> for Error {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Duplicate(key) => Error::DuplicateFeed(key),
            DatabaseError::InvalidInput(msg) => Error::Validation(msg),
            other => Error::Database(other),
        }
    }
}

/// Classify a source failure: undecodable bodies are malformed, anything
/// else means the source could not be reached.
impl From<FetchError> for Error {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Parse(msg) | FetchError::Decode(msg) => Error::MalformedSource(msg),
            other => Error::UpstreamUnavailable(other),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
