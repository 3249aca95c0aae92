//! Create use case
//!
//! Turns a blank card into an openkey card owned by nobody: the card master
//! key moves to a producer-derived key, the openkey application is built,
//! and every owner slot is parked on its transport key.

use tracing::{debug, info};

use crate::error::OpenkeyResult;
use crate::model::{
    ApplicationId, CardId, CardName, DerivedKey, Operation, ProducerMaterial, StatusCode,
};
use crate::ports::{FaultKind, TagSession};

use super::channel::Channel;
use super::layout::{install_application, picc_master_key};

/// Provision a blank card
///
/// # Arguments
///
/// * `tag` - Session with the card, borrowed for this operation only
/// * `producer` - Material of a bootstrapped producer
/// * `name` - Label written to the card
/// * `key_len` - Length of the card keys
///
/// # Returns
///
/// The freshly generated CardId
///
/// # Errors
///
/// Returns a status error if the card already carries the openkey
/// application, or a transport error when a tag call fails.
pub fn create_card<T: TagSession>(
    tag: &mut T,
    producer: &ProducerMaterial,
    name: &CardName,
    key_len: usize,
) -> OpenkeyResult<CardId> {
    let mut channel = Channel::new(Operation::Create);

    let uid = channel.call(StatusCode::ReadUid, tag.uid())?;
    debug!(uid = %hex::encode(&uid), "Creating card");

    // A blank card has no openkey application; anything else is not blank
    match tag.select_application(ApplicationId::OPENKEY) {
        Ok(()) => return Err(channel.fail(StatusCode::ApplicationPresent)),
        Err(fault) if fault.kind == FaultKind::NotFound => channel.tolerate(fault),
        Err(fault) => return channel.call(StatusCode::ApplicationSelect, Err(fault)),
    }

    channel.call(
        StatusCode::ApplicationSelect,
        tag.select_application(ApplicationId::PICC),
    )?;
    channel.call(
        StatusCode::PiccAuthenticate,
        tag.authenticate(0, &DerivedKey::zeroed(key_len)),
    )?;

    let picc_key = picc_master_key(&producer.master, &uid, key_len)?;
    channel.call(StatusCode::PiccChangeKey, tag.change_key(0, &picc_key))?;
    channel.call(StatusCode::PiccAuthenticate, tag.authenticate(0, &picc_key))?;

    let card_id = CardId::generate()?;
    install_application(
        &mut channel,
        tag,
        &producer.master,
        &uid,
        name,
        &card_id,
        key_len,
    )?;

    info!(%card_id, %name, "Card created");
    Ok(card_id)
}
