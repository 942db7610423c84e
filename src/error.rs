//! Error taxonomy shared by every component of the service.
//!
//! Each variant is a distinct kind the caller (HTTP layer or UI) can branch on.
//! "Already owned" is deliberately absent: it is a normal outcome reported via
//! [`crate::storage::ledger::AddOutcome`].

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No signing capability is registered.
    #[error("No signer available")]
    SignerUnavailable,

    /// The signing capability is present but declined or errored.
    #[error("Signer rejected the request: {0}")]
    SignerRejected(String),

    #[error("Malformed identity: {0}")]
    MalformedIdentity(String),

    /// Every configured relay endpoint failed.
    #[error("All relay endpoints are unreachable")]
    RelayUnreachable,

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("{0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A logout or newer login arrived before this login could commit.
    #[error("Login was cancelled")]
    LoginCancelled,
}

impl Error {
    /// Transient failures may be retried without side effects beyond the
    /// ledger's idempotency guarantees.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Persistence(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => Error::Timeout("database pool".to_string()),
            other => Error::Persistence(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(format!("ledger request: {}", e))
        } else {
            Error::Persistence(format!("ledger request: {}", e))
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
