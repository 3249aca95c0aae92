use std::fmt;

use thiserror::Error;

/// Key storage location inside the openkey card application
///
/// Slot 0 holds the application master key and is reserved for the
/// producer. Slots `1..=KeySlot::MAX` can be claimed by managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeySlot(u8);

impl KeySlot {
    /// Number of keys in the card application
    pub const COUNT: u8 = 14;

    pub const MAX: u8 = Self::COUNT - 1;

    pub const APPLICATION_MASTER: KeySlot = KeySlot(0);

    pub fn new(slot: u8) -> Result<Self, SlotError> {
        if slot > Self::MAX {
            return Err(SlotError::OutOfRange {
                slot,
                max: Self::MAX,
            });
        }
        Ok(Self(slot))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Whether a manager may install its key here
    pub fn is_owner_slot(self) -> bool {
        self != Self::APPLICATION_MASTER
    }

    /// All slots a manager may claim, lowest first
    pub fn owner_slots() -> impl Iterator<Item = KeySlot> {
        (1..=Self::MAX).map(KeySlot)
    }
}

impl fmt::Display for KeySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for KeySlot {
    type Error = SlotError;

    fn try_from(slot: u8) -> Result<Self, Self::Error> {
        Self::new(slot)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    #[error("Slot {slot} out of range, maximum is {max}")]
    OutOfRange { slot: u8, max: u8 },
}
