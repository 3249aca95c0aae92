use std::fmt;

use thiserror::Error;

use crate::error::CryptoError;
use crate::logic::fill_random;

/// Human-readable card label written by the producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardName(String);

impl CardName {
    pub const MAX_LENGTH: usize = 64;

    pub fn new(name: &str) -> Result<Self, CardNameError> {
        if name.is_empty() {
            return Err(CardNameError::Empty);
        }
        if name.len() > Self::MAX_LENGTH {
            return Err(CardNameError::TooLong { len: name.len() });
        }
        if name.chars().any(char::is_control) {
            return Err(CardNameError::ControlCharacter);
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for CardName {
    type Error = CardNameError;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

impl fmt::Display for CardName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardNameError {
    #[error("Card name must not be empty")]
    Empty,

    #[error("Card name is {len} bytes, at most {max} allowed", max = CardName::MAX_LENGTH)]
    TooLong { len: usize },

    #[error("Card name must not contain control characters")]
    ControlCharacter,
}

/// Unique identity of a card
///
/// Fresh ids are random UUIDs. Recreating a card may carry an existing id
/// over, so any printable ASCII string up to `MAX_LENGTH` bytes is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardId(String);

impl CardId {
    pub const MAX_LENGTH: usize = 64;

    pub fn new(id: &str) -> Result<Self, CardIdError> {
        if id.is_empty() {
            return Err(CardIdError::Empty);
        }
        if id.len() > Self::MAX_LENGTH {
            return Err(CardIdError::TooLong { len: id.len() });
        }
        if !id.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(CardIdError::InvalidCharacter);
        }
        Ok(Self(id.to_string()))
    }

    /// Generate a random version 4 UUID id
    pub fn generate() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; 16];
        fill_random(&mut bytes)?;
        let uuid = uuid::Builder::from_random_bytes(bytes).into_uuid();
        Ok(Self(uuid.hyphenated().to_string()))
    }

    /// Parse an id read back from card storage
    pub fn from_card_bytes(bytes: &[u8]) -> Result<Self, CardIdError> {
        let id = std::str::from_utf8(bytes).map_err(|_| CardIdError::InvalidCharacter)?;
        Self::new(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for CardId {
    type Error = CardIdError;

    fn try_from(id: &str) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardIdError {
    #[error("Card id must not be empty")]
    Empty,

    #[error("Card id is {len} bytes, at most {max} allowed", max = CardId::MAX_LENGTH)]
    TooLong { len: usize },

    #[error("Card id must be printable ASCII")]
    InvalidCharacter,
}
