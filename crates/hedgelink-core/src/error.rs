use thiserror::Error;

use crate::types::AccountId;

/// Domain errors shared across the backend crates.
///
/// The API layer maps these onto HTTP statuses; see the error-kind table in
/// the API crate. Variants carry enough context to build the user-visible
/// `detail` string without re-deriving it at every call site.
#[derive(Debug, Error)]
pub enum HedgeError {
    // ── Lookup failures ──────────────────────────────────────────────────────
    #[error("account {0} not found on any agent")]
    AccountNotFound(AccountId),

    #[error("versus {0} not found")]
    VersusNotFound(String),

    // ── Preconditions ────────────────────────────────────────────────────────
    #[error("versus {id} is '{actual}', expected '{expected}'")]
    VersusStatusMismatch {
        id: String,
        expected: &'static str,
        actual: String,
    },

    #[error("versus {id} has {got} tickets on account A, expected {expected}")]
    TicketCountMismatch {
        id: String,
        expected: usize,
        got: usize,
    },

    #[error("VS group '{group}' already has 2 accounts assigned; each VS group can only have 2 accounts")]
    VsGroupFull { group: String },

    // ── Input validation ─────────────────────────────────────────────────────
    #[error("account A and account B must be different")]
    SameAccountPair,

    #[error("lots must be greater than 0")]
    NonPositiveLots,

    #[error("side must be BUY or SELL")]
    InvalidSide,

    // ── Upstream (agent) failures ────────────────────────────────────────────
    #[error("agent '{agent}' returned an invalid quote for {symbol}: {reason}")]
    BadQuote {
        agent: String,
        symbol: String,
        reason: String,
    },

    #[error("failed to open {side} on account {account}: {message}")]
    OpenFailed {
        account: AccountId,
        side: &'static str,
        message: String,
    },

    #[error("failed to close ticket {ticket} on account {account}: {message}")]
    CloseFailed {
        account: AccountId,
        ticket: u64,
        message: String,
    },

    #[error("agent call failed: {0}")]
    Upstream(String),

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}
