/// Crate-wide error taxonomy. Everything here is recoverable at the call
/// site; `Store` is the only class a caller may reasonably retry (the core
/// itself never retries).
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Malformed or out-of-range input, named by field.
    #[error("invalid {field}")]
    Validation { field: &'static str },

    #[error("email already registered")]
    DuplicateEmail,

    #[error("username already taken")]
    DuplicateUsername,

    #[error("external identity already linked")]
    DuplicateSocialId,

    /// Lookup miss, named by what was looked up.
    #[error("no such {0}")]
    NotFound(&'static str),

    /// Idempotence signal from `follow`, not a failure.
    #[error("already following")]
    AlreadyFollowing,

    /// Idempotence signal from `unfollow`, not a failure.
    #[error("not following")]
    NotFollowing,

    #[error("incorrect password")]
    InvalidCredential,

    /// Expired, malformed or fingerprint-mismatched token. Deliberately
    /// carries no detail about which check failed.
    #[error("invalid token")]
    InvalidToken,

    /// I/O or transport failure from the durable store.
    #[error("store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, Error>;
