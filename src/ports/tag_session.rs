//! TagSession trait - capability to talk to one physical card

use std::fmt;

use crate::model::{ApplicationId, DerivedKey, FileAccess, FileId};

/// Result of a single tag operation
pub type TagResult<T> = Result<T, TransportFault>;

/// Class of failure reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// The card rejected a key during an authentication challenge
    AuthenticationError,
    /// The session is not authenticated for the requested access
    PermissionDenied,
    /// Application, key or file does not exist
    NotFound,
    /// Frames could not be exchanged with the card
    Communication,
    /// The card left the reader's field
    TagRemoved,
    Other,
}

/// Transport-layer failure signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFault {
    pub kind: FaultKind,
    pub detail: String,
}

impl TransportFault {
    pub fn new(kind: FaultKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for TransportFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.detail)
    }
}

/// Capability to read and write the structures of a single card
///
/// A session is stateful: `select_application` and `authenticate` change
/// what later calls may access. Implementations are not reentrant and are
/// borrowed mutably for the duration of one lifecycle operation.
pub trait TagSession {
    /// Unique hardware identifier of the card
    fn uid(&mut self) -> TagResult<Vec<u8>>;

    /// Select an application, dropping any authentication
    fn select_application(&mut self, aid: ApplicationId) -> TagResult<()>;

    /// Create an application with `key_count` all-zero keys
    ///
    /// Requires the card master key to be authenticated.
    fn create_application(&mut self, aid: ApplicationId, key_count: u8) -> TagResult<()>;

    /// Run an authentication challenge with key `key_no` of the selected
    /// application
    fn authenticate(&mut self, key_no: u8, key: &DerivedKey) -> TagResult<()>;

    /// Replace key `key_no` of the selected application
    ///
    /// Requires authentication with that same key and drops the
    /// authentication afterwards.
    fn change_key(&mut self, key_no: u8, new_key: &DerivedKey) -> TagResult<()>;

    /// Delete every application on the card
    ///
    /// Requires the card master key to be authenticated.
    fn format_picc(&mut self) -> TagResult<()>;

    /// Create a file in the selected application
    ///
    /// Requires the application master key to be authenticated.
    fn create_file(&mut self, file: FileId, access: FileAccess, contents: &[u8])
        -> TagResult<()>;

    /// Replace the contents of a file
    fn write_file(&mut self, file: FileId, contents: &[u8]) -> TagResult<()>;

    /// Read the contents of a file
    fn read_file(&mut self, file: FileId) -> TagResult<Vec<u8>>;
}
