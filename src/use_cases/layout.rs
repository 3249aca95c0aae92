//! On-card layout of the openkey application
//!
//! The card master key is derived from the producer secret. The openkey
//! application carries one key per slot: slot 0 is the application master
//! key, slots `1..=KeySlot::MAX` belong to managers. Every owner slot has a
//! file holding the CardId (readable with the slot key) and a descriptor
//! telling authenticators how the slot key is derived.

use tracing::debug;

use crate::error::{CryptoError, OpenkeyResult};
use crate::logic::{derive, derive_with_password, kdf};
use crate::model::{
    check_iterations, Access, ApplicationId, CardId, CardName, DerivedKey, FileAccess, FileId,
    KeySlot, MasterSecret, Password, StatusCode,
};
use crate::ports::TagSession;

use super::channel::Channel;

/// Publicly known secret behind the keys of unowned slots
const TRANSPORT_SECRET: &[u8] = b"openkey-transport";

pub(crate) const CARD_NAME_FILE: FileId = FileId(0x00);

pub(crate) fn card_id_file(slot: KeySlot) -> FileId {
    FileId(0x10 + slot.value())
}

pub(crate) fn descriptor_file(slot: KeySlot) -> FileId {
    FileId(0x20 + slot.value())
}

pub(crate) fn picc_master_key(
    producer: &MasterSecret,
    uid: &[u8],
    len: usize,
) -> Result<DerivedKey, CryptoError> {
    derive(producer, ApplicationId::PICC.value(), 0, uid, len)
}

pub(crate) fn application_master_key(
    producer: &MasterSecret,
    uid: &[u8],
    len: usize,
) -> Result<DerivedKey, CryptoError> {
    derive(
        producer,
        ApplicationId::OPENKEY.value(),
        KeySlot::APPLICATION_MASTER.value(),
        uid,
        len,
    )
}

/// Key guarding an unowned slot until a manager claims it
pub(crate) fn transport_key(
    slot: KeySlot,
    uid: &[u8],
    len: usize,
) -> Result<DerivedKey, CryptoError> {
    let mut key = vec![0u8; len];
    kdf(
        TRANSPORT_SECRET,
        ApplicationId::OPENKEY.value(),
        slot.value(),
        uid,
        &mut key,
    )?;
    Ok(DerivedKey::from_vec(key))
}

/// Key a manager installs into `slot`, hardened with `password` if one is set
pub(crate) fn owner_key(
    manager: &MasterSecret,
    slot: KeySlot,
    uid: &[u8],
    password: &Password,
    iterations: u32,
    len: usize,
) -> Result<DerivedKey, CryptoError> {
    let aid = ApplicationId::OPENKEY.value();
    if password.is_empty() {
        derive(manager, aid, slot.value(), uid, len)
    } else {
        derive_with_password(
            manager,
            aid,
            slot.value(),
            uid,
            password.as_bytes(),
            iterations,
            len,
        )
    }
}

/// Per-slot record stored in the descriptor file
///
/// Layout: version byte, flag byte (bit 0 owned, bit 1 password), PBKDF2
/// iteration count as big-endian u32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlotDescriptor {
    pub owned: bool,
    pub password_protected: bool,
    pub iterations: u32,
}

impl SlotDescriptor {
    const VERSION: u8 = 1;
    const LEN: usize = 6;
    const FLAG_OWNED: u8 = 0x01;
    const FLAG_PASSWORD: u8 = 0x02;

    pub(crate) const UNOWNED: SlotDescriptor = SlotDescriptor {
        owned: false,
        password_protected: false,
        iterations: 0,
    };

    pub(crate) fn owned(password: &Password, iterations: u32) -> Self {
        let password_protected = !password.is_empty();
        Self {
            owned: true,
            password_protected,
            iterations: if password_protected { iterations } else { 0 },
        }
    }

    pub(crate) fn encode(&self) -> [u8; Self::LEN] {
        let mut flags = 0;
        if self.owned {
            flags |= Self::FLAG_OWNED;
        }
        if self.password_protected {
            flags |= Self::FLAG_PASSWORD;
        }
        let [a, b, c, d] = self.iterations.to_be_bytes();
        [Self::VERSION, flags, a, b, c, d]
    }

    /// Parse descriptor bytes, `None` if they are not a valid descriptor
    ///
    /// Iteration counts above `ContextConfig::MAX_PASSWORD_ITERATIONS` are
    /// rejected so a forged descriptor cannot stall an authenticator.
    pub(crate) fn decode(bytes: &[u8]) -> Option<Self> {
        let [version, flags, a, b, c, d] = <[u8; Self::LEN]>::try_from(bytes).ok()?;
        if version != Self::VERSION || flags & !(Self::FLAG_OWNED | Self::FLAG_PASSWORD) != 0 {
            return None;
        }
        let descriptor = Self {
            owned: flags & Self::FLAG_OWNED != 0,
            password_protected: flags & Self::FLAG_PASSWORD != 0,
            iterations: u32::from_be_bytes([a, b, c, d]),
        };
        if descriptor.password_protected
            && (!descriptor.owned || check_iterations(descriptor.iterations).is_err())
        {
            return None;
        }
        Some(descriptor)
    }
}

/// Build the openkey application on a card whose master key is authenticated
///
/// Creates the application, moves its master key off the default, writes
/// the name, id and descriptor files, and parks every owner slot on its
/// transport key.
pub(crate) fn install_application(
    channel: &mut Channel,
    tag: &mut impl TagSession,
    producer: &MasterSecret,
    uid: &[u8],
    name: &CardName,
    card_id: &CardId,
    key_len: usize,
) -> OpenkeyResult<()> {
    let aid = ApplicationId::OPENKEY;
    let master = KeySlot::APPLICATION_MASTER.value();
    let default_key = DerivedKey::zeroed(key_len);

    channel.call(
        StatusCode::ApplicationCreate,
        tag.create_application(aid, KeySlot::COUNT),
    )?;
    channel.call(StatusCode::ApplicationSelect, tag.select_application(aid))?;
    channel.call(
        StatusCode::ApplicationAuthenticate,
        tag.authenticate(master, &default_key),
    )?;

    let app_key = application_master_key(producer, uid, key_len)?;
    channel.call(
        StatusCode::ApplicationChangeKey,
        tag.change_key(master, &app_key),
    )?;
    channel.call(
        StatusCode::ApplicationAuthenticate,
        tag.authenticate(master, &app_key),
    )?;
    debug!(%aid, "Application master key installed");

    let name_access = FileAccess {
        read: Access::Free,
        write: Access::Key(master),
    };
    channel.call(
        StatusCode::CardNameWrite,
        tag.create_file(CARD_NAME_FILE, name_access, name.as_str().as_bytes()),
    )?;

    let unowned = SlotDescriptor::UNOWNED.encode();
    for slot in KeySlot::owner_slots() {
        let id_access = FileAccess {
            read: Access::Key(slot.value()),
            write: Access::Key(master),
        };
        channel.call(
            StatusCode::CardIdWrite,
            tag.create_file(card_id_file(slot), id_access, card_id.as_str().as_bytes()),
        )?;

        let descriptor_access = FileAccess {
            read: Access::Free,
            write: Access::Key(slot.value()),
        };
        channel.call(
            StatusCode::DescriptorWrite,
            tag.create_file(descriptor_file(slot), descriptor_access, &unowned),
        )?;
    }

    for slot in KeySlot::owner_slots() {
        let key = transport_key(slot, uid, key_len)?;
        channel.call(
            StatusCode::SlotAuthenticate,
            tag.authenticate(slot.value(), &default_key),
        )?;
        channel.call(
            StatusCode::SlotChangeKey,
            tag.change_key(slot.value(), &key),
        )?;
    }
    debug!(%aid, "Owner slots parked on transport keys");

    Ok(())
}
