use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// Result type used across the interop crates
pub type Result<T> = std::result::Result<T, InteropError>;

/// The field of a proven record that did not match the caller's expectation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchField {
    TokenType,
    Quantity,
    Owner,
    Recipient,
    Deadline,
    DestinationNetwork,
    TokenId,
    Origin,
    PledgeId,
}

impl fmt::Display for MismatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MismatchField::TokenType => "token type",
            MismatchField::Quantity => "quantity",
            MismatchField::Owner => "owner",
            MismatchField::Recipient => "recipient",
            MismatchField::Deadline => "deadline",
            MismatchField::DestinationNetwork => "destination network",
            MismatchField::TokenId => "token id",
            MismatchField::Origin => "origin",
            MismatchField::PledgeId => "pledge id",
        };
        write!(f, "{}", name)
    }
}

/// Coarse classification of failures, used by callers to decide whether to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad precision, bad configuration, unknown scheme
    Configuration,
    /// Malformed input rejected before anything is submitted
    Validation,
    /// Structurally invalid proof, field mismatch or failed signature check
    ProofFailure,
    /// Already claimed, redeemed or reclaimed
    StateConflict,
    /// Scan or relay round trip exceeded the caller's budget
    Timeout,
    Internal,
}

/// Represents all possible errors of the pledge/claim/reclaim protocol
#[derive(Error, Debug)]
pub enum InteropError {
    /// Precision outside of the supported bit range
    #[error("Invalid precision: {0}")]
    InvalidPrecision(u32),

    /// Value does not fit into the requested precision
    #[error("Value {value} cannot be represented with precision {precision}")]
    PrecisionOverflow { value: String, precision: u32 },

    /// Two quantities of different precision were combined or compared
    #[error("Precision mismatch: {left} != {right}")]
    PrecisionMismatch { left: u32, right: u32 },

    #[error("Unknown owner type: {0}")]
    UnknownOwnerType(String),

    #[error("Malformed owner: {0}")]
    MalformedOwner(String),

    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Invalid ledger url: {0}")]
    InvalidUrl(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Insufficient balance of [{token_type}]: requested {requested}, available {available}")]
    InsufficientBalance {
        token_type: String,
        requested: String,
        available: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Relay query failed: {0}")]
    RelayQueryFailed(String),

    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    /// A proven record disagrees with what the caller expected
    #[error("Proof mismatch: {field} (expected [{expected}], found [{found}])")]
    ProofMismatch {
        field: MismatchField,
        expected: String,
        found: String,
    },

    #[error("Claim proof invalid: {0}")]
    ClaimProofInvalid(#[source] Box<InteropError>),

    #[error("Redeem proof invalid: {0}")]
    RedeemProofInvalid(#[source] Box<InteropError>),

    #[error("Non-existence proof invalid: {0}")]
    NonExistenceProofInvalid(#[source] Box<InteropError>),

    #[error("Pledged token already claimed or reclaimed: {0}")]
    AlreadyClaimedOrReclaimed(String),

    #[error("Pledged token already redeemed: {0}")]
    AlreadyRedeemed(String),

    #[error("Deadline not reached: {deadline}")]
    DeadlineNotReached { deadline: DateTime<Utc> },

    #[error("Scan failed: timeout reached")]
    ScanTimeout,

    #[error("Audit mismatch: {0}")]
    AuditMismatch(String),

    /// The ledger refused a request that breaks a validation rule
    #[error("Ledger rejected transaction: {0}")]
    LedgerRejected(String),

    /// The ledger refused a request that conflicts with committed state
    #[error("State conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),

    /// Anyhow error wrapper for error context
    #[error(transparent)]
    Context(#[from] anyhow::Error),
}

impl InteropError {
    pub fn mismatch(field: MismatchField, expected: impl ToString, found: impl ToString) -> Self {
        InteropError::ProofMismatch {
            field,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            InteropError::InvalidPrecision(_)
            | InteropError::UnsupportedScheme(_)
            | InteropError::InvalidUrl(_)
            | InteropError::Config(_) => ErrorKind::Configuration,

            InteropError::PrecisionOverflow { .. }
            | InteropError::PrecisionMismatch { .. }
            | InteropError::UnknownOwnerType(_)
            | InteropError::MalformedOwner(_)
            | InteropError::InsufficientBalance { .. }
            | InteropError::InvalidRequest(_)
            | InteropError::DeadlineNotReached { .. }
            | InteropError::AuditMismatch(_)
            | InteropError::LedgerRejected(_)
            | InteropError::NotFound(_) => ErrorKind::Validation,

            InteropError::InvalidProof(_)
            | InteropError::ProofMismatch { .. }
            | InteropError::ClaimProofInvalid(_)
            | InteropError::RedeemProofInvalid(_)
            | InteropError::NonExistenceProofInvalid(_) => ErrorKind::ProofFailure,

            InteropError::AlreadyClaimedOrReclaimed(_)
            | InteropError::AlreadyRedeemed(_)
            | InteropError::Conflict(_) => ErrorKind::StateConflict,

            InteropError::ScanTimeout | InteropError::RelayQueryFailed(_) => ErrorKind::Timeout,

            InteropError::Serialization(_)
            | InteropError::Io(_)
            | InteropError::Other(_)
            | InteropError::Context(_) => ErrorKind::Internal,
        }
    }

    /// Proof failures can be retried with a fresh proof, timeouts with a longer budget
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::ProofFailure | ErrorKind::Timeout)
    }

    /// The mismatching field, looking through the proof wrappers
    pub fn mismatch_field(&self) -> Option<MismatchField> {
        match self {
            InteropError::ProofMismatch { field, .. } => Some(*field),
            InteropError::ClaimProofInvalid(inner)
            | InteropError::RedeemProofInvalid(inner)
            | InteropError::NonExistenceProofInvalid(inner) => inner.mismatch_field(),
            _ => None,
        }
    }
}

// Additional From conversions for common error types

impl From<bincode::Error> for InteropError {
    fn from(err: bincode::Error) -> Self {
        InteropError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for InteropError {
    fn from(err: serde_json::Error) -> Self {
        InteropError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for InteropError {
    fn from(err: url::ParseError) -> Self {
        InteropError::InvalidUrl(err.to_string())
    }
}

impl From<String> for InteropError {
    fn from(err: String) -> Self {
        InteropError::Other(err)
    }
}

impl From<&str> for InteropError {
    fn from(err: &str) -> Self {
        InteropError::Other(err.to_string())
    }
}
