//! Recreate use case
//!
//! Wipes a card previously created by the same producer and builds the
//! openkey application again. Ownership is lost; every slot returns to its
//! transport key.

use tracing::{debug, info};

use crate::error::OpenkeyResult;
use crate::model::{ApplicationId, CardId, CardName, Operation, ProducerMaterial, StatusCode};
use crate::ports::TagSession;

use super::channel::Channel;
use super::layout::{install_application, picc_master_key};

/// Reset and reprovision a card
///
/// `old_id` is the id the card carried before, supplied for audit
/// continuity. It is not checked against the card; when non-empty it
/// becomes the id of the recreated card, otherwise a fresh id is generated.
///
/// Transport failures are not told apart: any of them is reported as
/// [`TransportError::Reset`](crate::error::TransportError::Reset).
pub fn recreate_card<T: TagSession>(
    tag: &mut T,
    producer: &ProducerMaterial,
    name: &CardName,
    old_id: &str,
    key_len: usize,
) -> OpenkeyResult<CardId> {
    let card_id = if old_id.is_empty() {
        CardId::generate()?
    } else {
        CardId::new(old_id)?
    };

    let mut channel = Channel::new(Operation::Recreate);

    let uid = channel.call(StatusCode::ReadUid, tag.uid())?;
    debug!(uid = %hex::encode(&uid), old_id, "Recreating card");

    let picc_key = picc_master_key(&producer.master, &uid, key_len)?;
    channel.call(
        StatusCode::ApplicationSelect,
        tag.select_application(ApplicationId::PICC),
    )?;
    channel.call(StatusCode::PiccAuthenticate, tag.authenticate(0, &picc_key))?;
    channel.call(StatusCode::PiccFormat, tag.format_picc())?;
    channel.call(StatusCode::PiccAuthenticate, tag.authenticate(0, &picc_key))?;

    install_application(
        &mut channel,
        tag,
        &producer.master,
        &uid,
        name,
        &card_id,
        key_len,
    )?;

    info!(%card_id, %name, "Card recreated");
    Ok(card_id)
}
