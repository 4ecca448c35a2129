//! Error types for `tally-core`.
//!
//! All fallible operations in the core library return [`CoreResult<T>`],
//! which is an alias for `Result<T, CoreError>`.

/// Unified error type for all core operations.
///
/// Client-side problems (`InvalidVoteType`, `InvalidIdentity`,
/// `RateLimitExceeded`) are always detected before any mutation.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The vote type was neither `upvote` nor `downvote`.
    #[error("invalid vote type: {0}")]
    InvalidVoteType(String),

    /// The voter identity was empty.
    #[error("invalid voter identity")]
    InvalidIdentity,

    /// The identity already used all of today's votes.
    #[error("You can only vote {limit} times per day.")]
    RateLimitExceeded { limit: u32 },

    /// The singleton tally row is gone.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// The database could not be reached or the statement failed.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// An I/O error, e.g. creating the database directory.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Returns `true` for errors caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidVoteType(_)
                | CoreError::InvalidIdentity
                | CoreError::RateLimitExceeded { .. }
        )
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::StorageUnavailable(e.to_string())
    }
}

/// Convenience alias used throughout `tally-core`.
pub type CoreResult<T> = Result<T, CoreError>;
