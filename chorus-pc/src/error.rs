//! Error types for chorus-pc
//!
//! Every variant below is an expected, recoverable outcome surfaced to the
//! requester; none of them terminates the process.

use thiserror::Error;

/// Convenience Result type using the chorus-pc Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the playback coordinator
#[derive(Error, Debug)]
pub enum Error {
    /// Action attempted on a session with no active audio connection
    #[error("Not connected to an audio channel")]
    NotConnected,

    /// No channel could be resolved for a connect request
    #[error("No channel to join; specify one or join a channel first")]
    InvalidChannel,

    /// Requester is in a different active channel than the session
    #[error("Already connected to a different channel")]
    AlreadyElsewhere,

    /// Request rejected before any mutation (bad volume, unknown preset,
    /// queue too short to shuffle, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Audio node or membership collaborator unreachable or erroring
    #[error("Collaborator failure: {0}")]
    CollaboratorFailure(String),

    /// Track resolution returned nothing
    #[error("No tracks were found with that query")]
    NoTrackFound,

    /// Shared library errors
    #[error(transparent)]
    Common(#[from] chorus_common::Error),

    /// Programming invariant violation; aborts the request, not the process
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::CollaboratorFailure(err.to_string())
    }
}
