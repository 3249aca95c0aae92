use openkey::adapters::{FileKeyStore, SimulatedTag};
use openkey::api::{Password, Role};
use openkey::error::{OpenkeyError, TransportError};
use openkey::Context;

const UID: &[u8] = &[0x04, 0x3A, 0x5C, 0x7E, 0x91, 0xB3, 0xD5];

#[test]
fn test_producer_manager_authenticator_scenario() {
    let p1 = tempfile::tempdir().unwrap();
    let p2 = tempfile::tempdir().unwrap();
    let key_file = p2.path().join("badge-42.card");
    let mut tag = SimulatedTag::blank(UID);

    // Producer at P1 creates the card
    let mut producer = Context::new().unwrap();
    producer.add_role(Role::Producer, p1.path()).unwrap();
    assert!(!producer.bootstrap_producer().unwrap());
    assert!(producer.is_producer_bootstrapped());
    let card_id = producer.create_card(&mut tag, "badge-42").unwrap();
    assert!(!card_id.as_str().is_empty());
    producer.close().unwrap();

    // Manager at P2 owns it in slot 1
    tag.reset_session();
    let mut manager = Context::new().unwrap();
    manager.add_role(Role::Manager, p2.path()).unwrap();
    assert!(!manager.bootstrap_manager(1).unwrap());
    assert!(manager.is_manager_bootstrapped());
    let record = manager
        .own_card(&mut tag, 1, &key_file, &Password::from("1234"))
        .unwrap();
    assert_eq!(record.card_id, card_id);
    assert!(key_file.exists());
    manager.close().unwrap();

    // Authenticator shares the manager material at P2
    let mut authenticator = Context::new().unwrap();
    authenticator.add_role(Role::Authenticator, p2.path()).unwrap();
    assert!(authenticator.prepare_authenticator());

    tag.reset_session();
    let read = authenticator
        .authenticate_card(&mut tag, &Password::from("1234"))
        .unwrap();
    assert_eq!(read, card_id);

    tag.reset_session();
    let err = authenticator
        .authenticate_card(&mut tag, &Password::from("0000"))
        .unwrap_err();
    assert!(matches!(
        err,
        OpenkeyError::Transport(TransportError::AuthenticationMismatch { .. })
    ));
}

#[test]
fn test_bootstrap_survives_restart() {
    let p1 = tempfile::tempdir().unwrap();

    let mut first = Context::new().unwrap();
    first.add_role(Role::Producer, p1.path()).unwrap();
    assert!(!first.bootstrap_producer().unwrap());
    let mut tag = SimulatedTag::blank(UID);
    let card_id = first.create_card(&mut tag, "badge-42").unwrap();
    first.close().unwrap();
    assert!(first.close().is_err());

    // A second process with the same path recreates the card it created
    let mut second = Context::new().unwrap();
    second.add_role(Role::Producer, p1.path()).unwrap();
    assert!(second.bootstrap_producer().unwrap());
    tag.reset_session();
    let recreated = second
        .recreate_card(&mut tag, "badge-42", card_id.as_str())
        .unwrap();
    assert_eq!(recreated, card_id);
}

#[test]
fn test_keyless_ownership_with_file_store() {
    let p1 = tempfile::tempdir().unwrap();
    let p2 = tempfile::tempdir().unwrap();
    let mut tag = SimulatedTag::blank(UID);

    let mut ctx = Context::new().unwrap();
    ctx.add_role(Role::Producer, p1.path()).unwrap();
    ctx.add_role(Role::Manager, p2.path()).unwrap();
    ctx.bootstrap_producer().unwrap();
    ctx.bootstrap_manager(5).unwrap();
    ctx.add_role(Role::Authenticator, p2.path()).unwrap();

    let card_id = ctx.create_card(&mut tag, "visitor").unwrap();
    tag.reset_session();
    ctx.own_card(&mut tag, 5, "", &Password::none()).unwrap();
    tag.reset_session();

    assert_eq!(
        ctx.authenticate_card(&mut tag, &Password::none()).unwrap(),
        card_id
    );

    let loaded = FileKeyStore::new()
        .load_owner_record(&p2.path().join("missing.card"))
        .unwrap();
    assert!(loaded.is_none());
}
