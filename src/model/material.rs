//! Role key material as it is persisted by a key store

use super::{CardId, KeySlot, MasterSecret};

/// Everything a producer needs to create and recreate cards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerMaterial {
    pub master: MasterSecret,
}

/// Key material shared by a manager and the authenticators it serves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerMaterial {
    pub master: MasterSecret,
    /// Card slot this manager installs its keys into
    pub slot: KeySlot,
}

/// Manager-side record of a card it owns
///
/// Holds no key material; the owner key is recomputed from the manager's
/// master secret whenever it is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRecord {
    pub card_id: CardId,
    pub slot: KeySlot,
    pub password_protected: bool,
    pub iterations: u32,
}
