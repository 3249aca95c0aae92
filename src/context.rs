//! Role context
//!
//! A [`Context`] holds the roles active in this process and their key
//! material. Roles are added with a storage path, bootstrapped to load or
//! generate their material, and then drive the card lifecycle operations.
//! Closing the context wipes all material and rejects every later call.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::adapters::FileKeyStore;
use crate::error::{LifecycleError, OpenkeyResult, ProtocolError};
use crate::logic::ensure_initialized;
use crate::model::{
    CardId, CardName, ContextConfig, KeySlot, ManagerMaterial, MasterSecret, Operation,
    OwnerRecord, Password, ProducerMaterial, Role,
};
use crate::ports::{KeyStore, TagSession};
use crate::use_cases;

/// Options for [`Context::bootstrap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapOptions {
    /// Slot a newly bootstrapped manager asks for
    ///
    /// Ignored by the other roles and by managers whose material already
    /// exists.
    pub preferred_slot: u8,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self { preferred_slot: 1 }
    }
}

#[derive(Debug)]
struct RoleEntry<M> {
    path: PathBuf,
    material: Option<M>,
}

impl<M> RoleEntry<M> {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            material: None,
        }
    }
}

/// Process-scoped role state
///
/// Not meant for concurrent use; every operation takes `&mut self`.
#[derive(Debug)]
pub struct Context<S: KeyStore = FileKeyStore> {
    store: S,
    config: ContextConfig,
    producer: Option<RoleEntry<ProducerMaterial>>,
    manager: Option<RoleEntry<ManagerMaterial>>,
    authenticator: Option<RoleEntry<ManagerMaterial>>,
    closed: bool,
}

impl Context<FileKeyStore> {
    /// Open a context keeping role material in files
    pub fn new() -> OpenkeyResult<Self> {
        Self::with_store(FileKeyStore::new(), ContextConfig::default())
    }
}

impl<S: KeyStore> Context<S> {
    /// Open a context on top of any key store
    pub fn with_store(store: S, config: ContextConfig) -> OpenkeyResult<Self> {
        ensure_initialized()?;
        config.validate()?;
        debug!(?config, "Opening context");
        Ok(Self {
            store,
            config,
            producer: None,
            manager: None,
            authenticator: None,
            closed: false,
        })
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Activate `role` with key material kept under `path`
    ///
    /// The authenticator shares a manager's material and loads it right
    /// away; it is ready as soon as that material exists.
    pub fn add_role(&mut self, role: Role, path: impl AsRef<Path>) -> OpenkeyResult<()> {
        self.ensure_open()?;
        let path = path.as_ref().to_path_buf();

        match role {
            Role::Producer => {
                if self.producer.is_some() {
                    return Err(ProtocolError::RoleAlreadyAdded { role }.into());
                }
                self.producer = Some(RoleEntry::new(path));
            }
            Role::Manager => {
                if self.manager.is_some() {
                    return Err(ProtocolError::RoleAlreadyAdded { role }.into());
                }
                self.manager = Some(RoleEntry::new(path));
            }
            Role::Authenticator => {
                if self.authenticator.is_some() {
                    return Err(ProtocolError::RoleAlreadyAdded { role }.into());
                }
                let mut entry = RoleEntry::new(path);
                entry.material = self.store.load_manager(&entry.path)?;
                if entry.material.is_none() {
                    warn!(path = %entry.path.display(), "No manager material for authenticator yet");
                }
                self.authenticator = Some(entry);
            }
        }

        debug!(%role, "Role added");
        Ok(())
    }

    /// Load or generate the material of `role`
    ///
    /// Returns `true` if the material already existed, in which case it is
    /// loaded and left untouched.
    pub fn bootstrap(&mut self, role: Role, options: &BootstrapOptions) -> OpenkeyResult<bool> {
        match role {
            Role::Producer => self.bootstrap_producer(),
            Role::Manager => self.bootstrap_manager(options.preferred_slot),
            Role::Authenticator => self.bootstrap_authenticator(),
        }
    }

    pub fn bootstrap_producer(&mut self) -> OpenkeyResult<bool> {
        self.ensure_open()?;
        let entry = self
            .producer
            .as_mut()
            .ok_or(ProtocolError::RoleNotAdded {
                role: Role::Producer,
            })?;
        if entry.material.is_some() {
            return Ok(true);
        }

        if let Some(material) = self.store.load_producer(&entry.path)? {
            info!(path = %entry.path.display(), "Producer already bootstrapped");
            entry.material = Some(material);
            return Ok(true);
        }

        let material = ProducerMaterial {
            master: MasterSecret::generate()?,
        };
        self.store.store_producer(&entry.path, &material)?;
        entry.material = Some(material);
        info!(path = %entry.path.display(), "Producer bootstrapped");
        Ok(false)
    }

    /// Bootstrap the manager, claiming `preferred_slot` if it can hold an
    /// owner key and the lowest owner slot otherwise
    pub fn bootstrap_manager(&mut self, preferred_slot: u8) -> OpenkeyResult<bool> {
        self.ensure_open()?;
        let entry = self.manager.as_mut().ok_or(ProtocolError::RoleNotAdded {
            role: Role::Manager,
        })?;
        if entry.material.is_some() {
            return Ok(true);
        }

        if let Some(material) = self.store.load_manager(&entry.path)? {
            info!(path = %entry.path.display(), slot = %material.slot, "Manager already bootstrapped");
            entry.material = Some(material);
            return Ok(true);
        }

        let material = ManagerMaterial {
            master: MasterSecret::generate()?,
            slot: select_slot(preferred_slot)?,
        };
        self.store.store_manager(&entry.path, &material)?;
        info!(path = %entry.path.display(), slot = %material.slot, "Manager bootstrapped");
        entry.material = Some(material);
        Ok(false)
    }

    /// Reload the manager material an authenticator depends on
    fn bootstrap_authenticator(&mut self) -> OpenkeyResult<bool> {
        self.ensure_open()?;
        let entry = self
            .authenticator
            .as_mut()
            .ok_or(ProtocolError::RoleNotAdded {
                role: Role::Authenticator,
            })?;
        if entry.material.is_some() {
            return Ok(true);
        }

        match self.store.load_manager(&entry.path)? {
            Some(material) => {
                entry.material = Some(material);
                Ok(true)
            }
            None => Err(LifecycleError::MissingMaterial {
                role: Role::Authenticator,
                path: entry.path.clone(),
            }
            .into()),
        }
    }

    pub fn is_bootstrapped(&self, role: Role) -> bool {
        if self.closed {
            return false;
        }
        match role {
            Role::Producer => has_material(&self.producer),
            Role::Manager => has_material(&self.manager),
            Role::Authenticator => has_material(&self.authenticator),
        }
    }

    pub fn is_producer_bootstrapped(&self) -> bool {
        self.is_bootstrapped(Role::Producer)
    }

    pub fn is_manager_bootstrapped(&self) -> bool {
        self.is_bootstrapped(Role::Manager)
    }

    /// Whether the authenticator was added and its material loaded
    pub fn prepare_authenticator(&self) -> bool {
        self.is_bootstrapped(Role::Authenticator)
    }

    /// Slot the bootstrapped manager installs its keys into
    pub fn manager_slot(&self) -> Option<KeySlot> {
        self.manager
            .as_ref()
            .and_then(|entry| entry.material.as_ref())
            .map(|material| material.slot)
    }

    /// Wipe all material and invalidate the context
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ContextClosed`] if the context was already
    /// closed. Callers may ignore it.
    pub fn close(&mut self) -> OpenkeyResult<()> {
        self.ensure_open()?;
        self.producer = None;
        self.manager = None;
        self.authenticator = None;
        self.closed = true;
        debug!("Context closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Provision a blank card; requires a bootstrapped producer
    pub fn create_card<T: TagSession>(&mut self, tag: &mut T, name: &str) -> OpenkeyResult<CardId> {
        self.ensure_open()?;
        let producer = ready(&self.producer, Role::Producer, Operation::Create)?;
        let name = CardName::new(name)?;
        use_cases::create_card(tag, producer, &name, self.config.key_len)
    }

    /// Wipe and reprovision a card; requires a bootstrapped producer
    pub fn recreate_card<T: TagSession>(
        &mut self,
        tag: &mut T,
        name: &str,
        old_id: &str,
    ) -> OpenkeyResult<CardId> {
        self.ensure_open()?;
        let producer = ready(&self.producer, Role::Producer, Operation::Recreate)?;
        let name = CardName::new(name)?;
        use_cases::recreate_card(tag, producer, &name, old_id, self.config.key_len)
    }

    /// Claim `slot` of a created card; requires a bootstrapped manager
    ///
    /// `slot` has to be the slot the manager was bootstrapped with, since
    /// that is where authenticators look. An empty `key_file` skips
    /// persisting the ownership record.
    pub fn own_card<T: TagSession>(
        &mut self,
        tag: &mut T,
        slot: u8,
        key_file: impl AsRef<Path>,
        password: &Password,
    ) -> OpenkeyResult<OwnerRecord> {
        self.ensure_open()?;
        let manager = ready(&self.manager, Role::Manager, Operation::Own)?;
        let slot = KeySlot::new(slot)?;
        if slot != manager.slot {
            warn!(%slot, manager_slot = %manager.slot, "Slot differs from the manager's slot");
            return Err(ProtocolError::InvalidSlot { slot: slot.value() }.into());
        }

        use_cases::own_card(
            tag,
            &mut self.store,
            manager,
            slot,
            key_file.as_ref(),
            password,
            self.config.password_iterations,
            self.config.key_len,
        )
    }

    /// Authenticate a card; requires a prepared authenticator
    pub fn authenticate_card<T: TagSession>(
        &mut self,
        tag: &mut T,
        password: &Password,
    ) -> OpenkeyResult<CardId> {
        self.ensure_open()?;
        let manager = ready(&self.authenticator, Role::Authenticator, Operation::Authenticate)?;
        use_cases::authenticate_card(tag, manager, password, self.config.key_len)
    }

    fn ensure_open(&self) -> OpenkeyResult<()> {
        if self.closed {
            return Err(ProtocolError::ContextClosed.into());
        }
        Ok(())
    }
}

fn has_material<M>(entry: &Option<RoleEntry<M>>) -> bool {
    entry.as_ref().is_some_and(|e| e.material.is_some())
}

fn ready<M>(entry: &Option<RoleEntry<M>>, role: Role, operation: Operation) -> OpenkeyResult<&M> {
    entry
        .as_ref()
        .and_then(|e| e.material.as_ref())
        .ok_or_else(|| LifecycleError::RoleNotReady { role, operation }.into())
}

fn select_slot(preferred: u8) -> OpenkeyResult<KeySlot> {
    let preferred = KeySlot::new(preferred)?;
    if preferred.is_owner_slot() {
        return Ok(preferred);
    }
    let fallback = KeySlot::owner_slots()
        .next()
        .ok_or(ProtocolError::NoFreeSlot)?;
    debug!(%preferred, %fallback, "Preferred slot is reserved, falling back");
    Ok(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryKeyStore, SimulatedTag};
    use crate::error::{ConfigError, OpenkeyError};

    const UID: &[u8] = &[0x04, 0xC0, 0xFF, 0xEE, 0x00, 0x11, 0x22];

    fn context() -> Context<MemoryKeyStore> {
        let config = ContextConfig {
            password_iterations: 32,
            ..ContextConfig::default()
        };
        Context::with_store(MemoryKeyStore::new(), config).unwrap()
    }

    fn is_not_ready(err: &OpenkeyError, expected: Role) -> bool {
        matches!(
            err,
            OpenkeyError::Lifecycle(LifecycleError::RoleNotReady { role, .. }) if *role == expected
        )
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let too_many = ContextConfig {
            password_iterations: ContextConfig::MAX_PASSWORD_ITERATIONS + 1,
            ..ContextConfig::default()
        };
        let err = Context::with_store(MemoryKeyStore::new(), too_many).unwrap_err();
        assert!(matches!(
            err,
            OpenkeyError::Config(ConfigError::IterationsOutOfRange { .. })
        ));

        let zero = ContextConfig {
            password_iterations: 0,
            ..ContextConfig::default()
        };
        assert!(Context::with_store(MemoryKeyStore::new(), zero).is_err());

        let aes_256 = ContextConfig {
            key_len: 32,
            ..ContextConfig::default()
        };
        let err = Context::with_store(MemoryKeyStore::new(), aes_256).unwrap_err();
        assert!(matches!(
            err,
            OpenkeyError::Config(ConfigError::UnsupportedKeyLength { len: 32, .. })
        ));
    }

    #[test]
    fn test_double_bootstrap_keeps_material() {
        let mut ctx = context();
        ctx.add_role(Role::Producer, "/p1").unwrap();

        assert!(!ctx.bootstrap_producer().unwrap());
        let first = ctx.store().load_producer(Path::new("/p1")).unwrap();
        assert!(ctx.bootstrap_producer().unwrap());
        let second = ctx.store().load_producer(Path::new("/p1")).unwrap();

        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_bootstrap_loads_existing_material() {
        let mut store = MemoryKeyStore::new();
        let material = ManagerMaterial {
            master: MasterSecret::from_bytes(vec![8; 32]).unwrap(),
            slot: KeySlot::new(4).unwrap(),
        };
        store.store_manager(Path::new("/p2"), &material).unwrap();
        let mut ctx = Context::with_store(store, ContextConfig::default()).unwrap();
        ctx.add_role(Role::Manager, "/p2").unwrap();

        let options = BootstrapOptions { preferred_slot: 1 };
        assert!(ctx.bootstrap(Role::Manager, &options).unwrap());
        assert_eq!(ctx.manager_slot(), Some(KeySlot::new(4).unwrap()));
    }

    #[test]
    fn test_manager_falls_back_from_reserved_slot() {
        let mut ctx = context();
        ctx.add_role(Role::Manager, "/p2").unwrap();

        assert!(!ctx.bootstrap_manager(0).unwrap());
        assert_eq!(ctx.manager_slot(), Some(KeySlot::new(1).unwrap()));
    }

    #[test]
    fn test_manager_rejects_out_of_range_slot() {
        let mut ctx = context();
        ctx.add_role(Role::Manager, "/p2").unwrap();

        let err = ctx.bootstrap_manager(KeySlot::COUNT).unwrap_err();
        assert!(matches!(err, OpenkeyError::Domain(_)));
        assert!(!ctx.is_manager_bootstrapped());
    }

    #[test]
    fn test_bootstrap_requires_added_role() {
        let mut ctx = context();
        let err = ctx.bootstrap_producer().unwrap_err();
        assert!(matches!(
            err,
            OpenkeyError::Protocol(ProtocolError::RoleNotAdded {
                role: Role::Producer
            })
        ));
    }

    #[test]
    fn test_add_role_twice_fails() {
        let mut ctx = context();
        ctx.add_role(Role::Manager, "/p2").unwrap();
        let err = ctx.add_role(Role::Manager, "/p3").unwrap_err();
        assert!(matches!(
            err,
            OpenkeyError::Protocol(ProtocolError::RoleAlreadyAdded { .. })
        ));
    }

    #[test]
    fn test_authenticator_needs_manager_material() {
        let mut ctx = context();
        ctx.add_role(Role::Authenticator, "/p2").unwrap();
        assert!(!ctx.prepare_authenticator());

        let err = ctx
            .bootstrap(Role::Authenticator, &BootstrapOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            OpenkeyError::Lifecycle(LifecycleError::MissingMaterial { .. })
        ));
    }

    #[test]
    fn test_operations_require_bootstrapped_roles() {
        let mut ctx = context();
        let mut tag = SimulatedTag::blank(UID);
        ctx.add_role(Role::Producer, "/p1").unwrap();

        let err = ctx.create_card(&mut tag, "badge-42").unwrap_err();
        assert!(is_not_ready(&err, Role::Producer));
        let err = ctx
            .own_card(&mut tag, 1, "", &Password::none())
            .unwrap_err();
        assert!(is_not_ready(&err, Role::Manager));
        let err = ctx
            .authenticate_card(&mut tag, &Password::none())
            .unwrap_err();
        assert!(is_not_ready(&err, Role::Authenticator));
        assert!(!tag.has_application(crate::model::ApplicationId::OPENKEY));
    }

    #[test]
    fn test_own_rejects_foreign_slot() {
        let mut ctx = context();
        ctx.add_role(Role::Manager, "/p2").unwrap();
        ctx.bootstrap_manager(1).unwrap();
        let mut tag = SimulatedTag::blank(UID);

        let err = ctx
            .own_card(&mut tag, 2, "", &Password::none())
            .unwrap_err();

        assert!(matches!(
            err,
            OpenkeyError::Protocol(ProtocolError::InvalidSlot { slot: 2 })
        ));
    }

    #[test]
    fn test_close_invalidates_context() {
        let mut ctx = context();
        ctx.add_role(Role::Producer, "/p1").unwrap();
        ctx.bootstrap_producer().unwrap();
        assert!(ctx.is_producer_bootstrapped());

        ctx.close().unwrap();

        assert!(ctx.is_closed());
        assert!(!ctx.is_producer_bootstrapped());
        assert!(!ctx.is_manager_bootstrapped());
        assert!(!ctx.prepare_authenticator());
        let mut tag = SimulatedTag::blank(UID);
        assert!(matches!(
            ctx.create_card(&mut tag, "badge-42").unwrap_err(),
            OpenkeyError::Protocol(ProtocolError::ContextClosed)
        ));
        assert!(matches!(
            ctx.close().unwrap_err(),
            OpenkeyError::Protocol(ProtocolError::ContextClosed)
        ));
    }

    #[test]
    fn test_full_lifecycle_in_memory() {
        let mut ctx = context();
        ctx.add_role(Role::Producer, "/p1").unwrap();
        ctx.add_role(Role::Manager, "/p2").unwrap();
        ctx.bootstrap_producer().unwrap();
        ctx.bootstrap_manager(2).unwrap();
        ctx.add_role(Role::Authenticator, "/p2").unwrap();
        assert!(ctx.prepare_authenticator());

        let mut tag = SimulatedTag::blank(UID);
        let card_id = ctx.create_card(&mut tag, "badge-42").unwrap();
        tag.reset_session();
        let record = ctx
            .own_card(&mut tag, 2, "/cards/badge-42", &Password::from("1234"))
            .unwrap();
        assert_eq!(record.card_id, card_id);
        assert_eq!(ctx.store().owner_record(Path::new("/cards/badge-42")), Some(&record));

        tag.reset_session();
        let read = ctx
            .authenticate_card(&mut tag, &Password::from("1234"))
            .unwrap();
        assert_eq!(read, card_id);

        tag.reset_session();
        let recreated = ctx
            .recreate_card(&mut tag, "badge-42", card_id.as_str())
            .unwrap();
        assert_eq!(recreated, card_id);
        tag.reset_session();
        let err = ctx
            .authenticate_card(&mut tag, &Password::from("1234"))
            .unwrap_err();
        assert!(matches!(
            err,
            OpenkeyError::Protocol(ProtocolError::Status { .. })
        ));
    }
}
