//! Own use case
//!
//! A manager claims one owner slot of a created card by replacing the
//! slot's transport key with a key derived from its own master secret.
//! The descriptor is written while the transport key still opens the slot,
//! so an Own interrupted at any step can be run again.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{OpenkeyResult, ProtocolError};
use crate::model::{
    check_iterations, ApplicationId, CardId, KeySlot, ManagerMaterial, Operation, OwnerRecord,
    Password, StatusCode,
};
use crate::ports::{KeyStore, TagSession};

use super::channel::Channel;
use super::layout::{card_id_file, descriptor_file, owner_key, transport_key, SlotDescriptor};

/// Install the manager's key into `slot` of a created card
///
/// With a non-empty `password` the key is hardened with PBKDF2 using
/// `iterations`; the count is written to the slot descriptor so that
/// authenticators can replay it. An empty password selects keyless
/// ownership.
///
/// The resulting [`OwnerRecord`] is persisted to `key_file` through `store`
/// unless `key_file` is empty.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidSlot`] before any tag I/O if `slot` is the
/// application master slot, and `ConfigError::IterationsOutOfRange` if a
/// password comes with an unusable iteration count. A slot that is already
/// owned fails its transport key authentication.
#[allow(clippy::too_many_arguments)]
pub fn own_card<T: TagSession, S: KeyStore>(
    tag: &mut T,
    store: &mut S,
    manager: &ManagerMaterial,
    slot: KeySlot,
    key_file: &Path,
    password: &Password,
    iterations: u32,
    key_len: usize,
) -> OpenkeyResult<OwnerRecord> {
    if !slot.is_owner_slot() {
        return Err(ProtocolError::InvalidSlot { slot: slot.value() }.into());
    }
    if !password.is_empty() {
        check_iterations(iterations)?;
    }

    let mut channel = Channel::new(Operation::Own);

    let uid = channel.call(StatusCode::ReadUid, tag.uid())?;
    debug!(uid = %hex::encode(&uid), %slot, "Owning card");

    channel.call(
        StatusCode::ApplicationSelect,
        tag.select_application(ApplicationId::OPENKEY),
    )?;

    let parked = transport_key(slot, &uid, key_len)?;
    channel.call(
        StatusCode::SlotAuthenticate,
        tag.authenticate(slot.value(), &parked),
    )?;

    let id_bytes = channel.call(StatusCode::CardIdRead, tag.read_file(card_id_file(slot)))?;
    let card_id = CardId::from_card_bytes(&id_bytes)
        .map_err(|_| channel.fail(StatusCode::CardIdMalformed))?;

    let descriptor = SlotDescriptor::owned(password, iterations);
    channel.call(
        StatusCode::DescriptorWrite,
        tag.write_file(descriptor_file(slot), &descriptor.encode()),
    )?;

    let key = owner_key(&manager.master, slot, &uid, password, iterations, key_len)?;
    channel.call(
        StatusCode::SlotChangeKey,
        tag.change_key(slot.value(), &key),
    )?;
    channel.call(
        StatusCode::SlotAuthenticate,
        tag.authenticate(slot.value(), &key),
    )?;

    let record = OwnerRecord {
        card_id,
        slot,
        password_protected: descriptor.password_protected,
        iterations: descriptor.iterations,
    };
    if !key_file.as_os_str().is_empty() {
        store.store_owner_record(key_file, &record)?;
        debug!(path = %key_file.display(), "Owner record stored");
    }

    info!(card_id = %record.card_id, %slot, "Card owned");
    Ok(record)
}
