//! Error types of the encrypted index
//!
//! Structural errors (malformed locations, exhausted buckets) are fatal and
//! reported as soon as they are detected. Lookup misses are not errors.

use thiserror::Error;

use crate::base::LevelIndex;

/// Result type alias for index operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A location lacks the fields required by its variant
    #[error("Location format error: {0}")]
    LocationFormat(String),

    /// No bucket of the level has room for a chunk. This means the level
    /// parameters were computed incorrectly.
    #[error("No bucket of level {level} can hold a chunk of length {chunk_length}")]
    CapacityExhausted {
        level: LevelIndex,
        chunk_length: usize,
    },

    /// A single document identifier does not fit under the blob cutoff
    #[error("Blob cutoff {cutoff} is too small for an identifier of serialized size {size}")]
    BlobTooSmall { cutoff: usize, size: usize },

    /// The completion ticket does not belong to a pending item
    #[error("Unknown or foreign completion ticket")]
    UnknownTicket,

    /// The item was already completed
    #[error("Item {0} was already completed")]
    AlreadyCompleted(String),

    /// The lookup table was rewritten before every blob was uploaded
    #[error("{0} blob(s) have not been uploaded yet")]
    IncompleteUpload(usize),

    /// The merge was finalized before every blob was fetched
    #[error("{0} keyword(s) still wait for fetched blobs")]
    IncompleteFetch(usize),

    /// A fetched reference was not requested for this item
    #[error("Reference {0} was not requested")]
    UnexpectedReference(String),

    #[error("Expected a remote location")]
    RemoteLocationExpected,

    #[error("Expected a local location")]
    LocalLocationExpected,

    /// A location points to a blob absent from the fetched set
    #[error("Blob {0} has not been fetched")]
    MissingBlob(String),

    /// Fetched content does not have the expected shape
    #[error("Malformed blob: {0}")]
    MalformedBlob(String),

    /// `locate` called without a preceding `lookup`
    #[error("No active query: lookup must be called before locate")]
    NoActiveQuery,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by a caller-provided blob store
    #[error("Blob store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<ciborium::de::Error<std::io::Error>> for Error {
    fn from(e: ciborium::de::Error<std::io::Error>) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for Error {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        Error::Serialization(e.to_string())
    }
}
