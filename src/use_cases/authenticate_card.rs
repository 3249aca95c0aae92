//! Authenticate use case
//!
//! An authenticator sharing a manager's material re-derives the slot key
//! for the presented card, proves possession of it to the card and reads
//! back the CardId.

use tracing::{debug, info};

use crate::error::OpenkeyResult;
use crate::model::{ApplicationId, CardId, ManagerMaterial, Operation, Password, StatusCode};
use crate::ports::TagSession;

use super::channel::Channel;
use super::layout::{card_id_file, descriptor_file, owner_key, SlotDescriptor};

/// Authenticate a card owned by the manager behind `manager`
///
/// The slot descriptor decides how the key is derived. `password` must be
/// empty exactly when the slot was owned without one.
///
/// # Returns
///
/// The CardId stored on the card
pub fn authenticate_card<T: TagSession>(
    tag: &mut T,
    manager: &ManagerMaterial,
    password: &Password,
    key_len: usize,
) -> OpenkeyResult<CardId> {
    let slot = manager.slot;
    let mut channel = Channel::new(Operation::Authenticate);

    let uid = channel.call(StatusCode::ReadUid, tag.uid())?;
    debug!(uid = %hex::encode(&uid), %slot, "Authenticating card");

    channel.call(
        StatusCode::ApplicationSelect,
        tag.select_application(ApplicationId::OPENKEY),
    )?;

    let raw = channel.call(
        StatusCode::DescriptorRead,
        tag.read_file(descriptor_file(slot)),
    )?;
    let descriptor =
        SlotDescriptor::decode(&raw).ok_or_else(|| channel.fail(StatusCode::DescriptorMalformed))?;
    if !descriptor.owned {
        return Err(channel.fail(StatusCode::SlotNotOwned));
    }
    if descriptor.password_protected == password.is_empty() {
        return Err(channel.fail(StatusCode::PasswordModeMismatch));
    }

    let key = owner_key(
        &manager.master,
        slot,
        &uid,
        password,
        descriptor.iterations,
        key_len,
    )?;
    channel.call(
        StatusCode::SlotAuthenticate,
        tag.authenticate(slot.value(), &key),
    )?;

    let id_bytes = channel.call(StatusCode::CardIdRead, tag.read_file(card_id_file(slot)))?;
    let card_id = CardId::from_card_bytes(&id_bytes)
        .map_err(|_| channel.fail(StatusCode::CardIdMalformed))?;

    info!(%card_id, %slot, "Card authenticated");
    Ok(card_id)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::adapters::{MemoryKeyStore, SimulatedTag, TagCall};
    use crate::error::{OpenkeyError, ProtocolError, TransportError};
    use crate::model::{CardName, KeySlot, MasterSecret, ProducerMaterial};
    use crate::ports::FaultKind;
    use crate::use_cases::{create_card, own_card};

    const UID: &[u8] = &[0x04, 0x5E, 0x6F, 0x70, 0x81, 0x92, 0xA3];

    fn manager() -> ManagerMaterial {
        ManagerMaterial {
            master: MasterSecret::from_bytes(vec![0x55; 32]).unwrap(),
            slot: KeySlot::new(1).unwrap(),
        }
    }

    fn owned_tag(password: &str) -> (SimulatedTag, CardId) {
        let producer = ProducerMaterial {
            master: MasterSecret::from_bytes(vec![0x66; 32]).unwrap(),
        };
        let mut tag = SimulatedTag::blank(UID);
        let name = CardName::new("badge-42").unwrap();
        let card_id = create_card(&mut tag, &producer, &name, 16).unwrap();
        tag.reset_session();
        own_card(
            &mut tag,
            &mut MemoryKeyStore::new(),
            &manager(),
            manager().slot,
            Path::new(""),
            &Password::from(password),
            64,
            16,
        )
        .unwrap();
        tag.reset_session();
        (tag, card_id)
    }

    fn status_code(err: &OpenkeyError) -> Option<StatusCode> {
        match err {
            OpenkeyError::Protocol(ProtocolError::Status { code, .. }) => Some(*code),
            _ => None,
        }
    }

    #[test]
    fn test_authenticate_with_password() {
        let (mut tag, card_id) = owned_tag("1234");

        let read = authenticate_card(&mut tag, &manager(), &Password::from("1234"), 16).unwrap();

        assert_eq!(read, card_id);
    }

    #[test]
    fn test_authenticate_keyless() {
        let (mut tag, card_id) = owned_tag("");

        let read = authenticate_card(&mut tag, &manager(), &Password::none(), 16).unwrap();

        assert_eq!(read, card_id);
    }

    #[test]
    fn test_wrong_password_fails() {
        let (mut tag, _) = owned_tag("1234");

        let err = authenticate_card(&mut tag, &manager(), &Password::from("0000"), 16).unwrap_err();

        assert!(matches!(
            err,
            OpenkeyError::Transport(TransportError::AuthenticationMismatch { .. })
        ));
    }

    #[test]
    fn test_password_mode_mismatch() {
        let (mut tag, _) = owned_tag("1234");
        let err = authenticate_card(&mut tag, &manager(), &Password::none(), 16).unwrap_err();
        assert_eq!(status_code(&err), Some(StatusCode::PasswordModeMismatch));

        let (mut tag, _) = owned_tag("");
        tag.reset_session();
        let err = authenticate_card(&mut tag, &manager(), &Password::from("1234"), 16).unwrap_err();
        assert_eq!(status_code(&err), Some(StatusCode::PasswordModeMismatch));
    }

    #[test]
    fn test_unowned_slot_is_rejected() {
        let (mut tag, _) = owned_tag("1234");
        let other = ManagerMaterial {
            slot: KeySlot::new(2).unwrap(),
            ..manager()
        };

        let err = authenticate_card(&mut tag, &other, &Password::none(), 16).unwrap_err();

        assert_eq!(status_code(&err), Some(StatusCode::SlotNotOwned));
    }

    #[test]
    fn test_foreign_manager_fails_challenge() {
        let (mut tag, _) = owned_tag("");
        let stranger = ManagerMaterial {
            master: MasterSecret::from_bytes(vec![0x77; 32]).unwrap(),
            slot: KeySlot::new(1).unwrap(),
        };

        let err = authenticate_card(&mut tag, &stranger, &Password::none(), 16).unwrap_err();

        assert!(matches!(err, OpenkeyError::Transport(_)));
    }

    #[test]
    fn test_descriptor_read_fault_is_transport_error() {
        let (mut tag, _) = owned_tag("");
        tag.fail_next(TagCall::ReadFile, FaultKind::TagRemoved);

        let err = authenticate_card(&mut tag, &manager(), &Password::none(), 16).unwrap_err();

        assert!(matches!(
            err,
            OpenkeyError::Transport(TransportError::CardRemoved)
        ));
    }

    #[test]
    fn test_forged_iteration_count_is_malformed() {
        let (mut tag, _) = owned_tag("1234");
        let slot = manager().slot;
        let key = owner_key(
            &manager().master,
            slot,
            UID,
            &Password::from("1234"),
            64,
            16,
        )
        .unwrap();
        tag.select_application(ApplicationId::OPENKEY).unwrap();
        tag.authenticate(slot.value(), &key).unwrap();
        tag.write_file(descriptor_file(slot), &[1, 0x03, 0xFF, 0xFF, 0xFF, 0xFF])
            .unwrap();
        tag.reset_session();

        let err = authenticate_card(&mut tag, &manager(), &Password::from("1234"), 16).unwrap_err();

        assert_eq!(status_code(&err), Some(StatusCode::DescriptorMalformed));
    }
}
