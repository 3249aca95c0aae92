//! Error types for the openkey library
//!
//! This module defines the error hierarchy for all openkey operations.
//! Errors are organized by where a failure is attributed: the card protocol,
//! the tag transport, the cryptographic primitives, or an operation's
//! preconditions. All of them are implemented with thiserror.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::{Operation, Role, StatusCode};

/// Result type alias for openkey operations
///
/// This is a convenience alias for `Result<T, OpenkeyError>`.
pub type OpenkeyResult<T> = Result<T, OpenkeyError>;

/// Top-level error type for all openkey operations
#[derive(Error, Debug)]
pub enum OpenkeyError {
    /// Protocol-level failures, including raw status codes
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Failures attributed to the tag transport
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Key derivation and primitive library errors
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    /// Preconditions that failed before any tag I/O
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Domain validation errors
    #[error("Domain validation error: {0}")]
    Domain(#[from] DomainError),

    /// Key material persistence errors
    #[error("Key store error: {0}")]
    KeyStore(#[from] KeyStoreError),

    /// Rejected context configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Protocol-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A lifecycle step failed with no attributable transport cause
    #[error("openkey error #{} during {operation}: {}", .code.code(), .code.describe())]
    Status {
        operation: Operation,
        code: StatusCode,
    },

    /// The context has been closed
    #[error("context has already been closed")]
    ContextClosed,

    /// The role was never added to the context
    #[error("role {role} has not been added to the context")]
    RoleNotAdded { role: Role },

    /// The role was added twice
    #[error("role {role} has already been added to the context")]
    RoleAlreadyAdded { role: Role },

    /// The slot cannot hold an owner key
    #[error("key slot {slot} cannot be used for ownership")]
    InvalidSlot { slot: u8 },

    /// No free slot is left for a manager
    #[error("no free key slot available")]
    NoFreeSlot,

    /// The card content does not match the expected layout
    #[error("malformed card state: {reason}")]
    MalformedCard { reason: String },
}

/// Errors attributed to the tag transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The card rejected the key used in an authentication challenge
    #[error("card authentication failed: {detail}")]
    AuthenticationMismatch { detail: String },

    /// The current session lacks rights for the requested operation
    #[error("permission denied by card: {detail}")]
    PermissionDenied { detail: String },

    /// The requested application, key or file does not exist on the card
    #[error("not found on card: {detail}")]
    NotFound { detail: String },

    /// The reader could not exchange frames with the card
    #[error("communication with card failed: {detail}")]
    Communication { detail: String },

    /// The card left the field mid-operation
    #[error("card removed during operation")]
    CardRemoved,

    /// The transport reported a failure it could not classify
    #[error("unclassified transport failure: {detail}")]
    Unknown { detail: String },

    /// The card reset failed; the reset primitive does not tell causes apart
    #[error("card reset failed: {detail}")]
    Reset { detail: String },
}

/// Cryptographic operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The primitive library failed its start-up self test
    #[error("cryptographic library initialization failed: {reason}")]
    InitializationFailed { reason: String },

    /// A required input was empty
    #[error("{input} must not be empty")]
    EmptyInput { input: &'static str },

    /// The caller asked for a zero-length key
    #[error("derived key length must not be zero")]
    ZeroLengthOutput,

    /// The caller asked for more output than the derivation can produce
    #[error("derived key length {requested} exceeds maximum of {max}")]
    OutputTooLong { requested: usize, max: usize },

    /// Password derivation needs at least one iteration
    #[error("iteration count must be at least 1")]
    InvalidIterations,

    /// The secure random source failed
    #[error("random source failed: {reason}")]
    RandomSource { reason: String },
}

/// Precondition failures detected before touching the tag
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The role an operation needs is not ready
    #[error("{operation} requires the {role} role to be added and bootstrapped")]
    RoleNotReady { role: Role, operation: Operation },

    /// A role that only loads material found nothing to load
    #[error("no {role} key material stored at {}", .path.display())]
    MissingMaterial { role: Role, path: PathBuf },
}

/// Domain validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Card name error
    #[error("Card name error: {0}")]
    CardName(#[from] crate::model::CardNameError),

    /// Card id error
    #[error("Card id error: {0}")]
    CardId(#[from] crate::model::CardIdError),

    /// Slot error
    #[error("Slot error: {0}")]
    Slot(#[from] crate::model::SlotError),
}

/// Key material persistence errors
#[derive(Error, Debug)]
pub enum KeyStoreError {
    /// Reading or writing key material failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored key material could not be parsed
    #[error("malformed key material in {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },

    /// Material is never overwritten once stored
    #[error("key material already stored at {}", .path.display())]
    AlreadyExists { path: PathBuf },
}

/// Configuration values outside what cards and derivations support
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("password iterations {iterations} outside 1..={max}")]
    IterationsOutOfRange { iterations: u32, max: u32 },

    #[error("card key length {len} unsupported, cards use {expected}-byte keys")]
    UnsupportedKeyLength { len: usize, expected: usize },
}

impl From<crate::model::CardNameError> for OpenkeyError {
    fn from(err: crate::model::CardNameError) -> Self {
        OpenkeyError::Domain(DomainError::CardName(err))
    }
}

impl From<crate::model::CardIdError> for OpenkeyError {
    fn from(err: crate::model::CardIdError) -> Self {
        OpenkeyError::Domain(DomainError::CardId(err))
    }
}

impl From<crate::model::SlotError> for OpenkeyError {
    fn from(err: crate::model::SlotError) -> Self {
        OpenkeyError::Domain(DomainError::Slot(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = ProtocolError::Status {
            operation: Operation::Create,
            code: StatusCode::ApplicationCreate,
        };
        assert!(err.to_string().starts_with("openkey error #6"));
        assert!(err.to_string().contains("create"));
    }

    #[test]
    fn test_slot_error_conversion() {
        let err: OpenkeyError = crate::model::SlotError::OutOfRange { slot: 42, max: 13 }.into();
        assert!(matches!(err, OpenkeyError::Domain(DomainError::Slot(_))));
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_lifecycle_error_names_role() {
        let err = OpenkeyError::from(LifecycleError::RoleNotReady {
            role: Role::Manager,
            operation: Operation::Own,
        });
        assert!(err.to_string().contains("manager"));
    }

    #[test]
    fn test_result_type_alias() {
        let result: OpenkeyResult<i32> = Ok(42);
        assert_eq!(result.unwrap(), 42);

        let result: OpenkeyResult<i32> = Err(ProtocolError::ContextClosed.into());
        assert!(result.is_err());
    }
}
