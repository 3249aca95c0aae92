//! KeyStore trait - capability to persist role key material

use std::path::Path;

use crate::error::KeyStoreError;
use crate::model::{ManagerMaterial, OwnerRecord, ProducerMaterial};

/// Persistence of role key material
///
/// Paths are supplied by the caller and handed through unchanged; how
/// material is laid out underneath a path is up to the implementation.
/// Storing producer or manager material where some already exists fails
/// with `KeyStoreError::AlreadyExists` and leaves the old material intact.
pub trait KeyStore {
    /// Load producer material, `None` if nothing has been stored at `path`
    fn load_producer(&self, path: &Path) -> Result<Option<ProducerMaterial>, KeyStoreError>;

    fn store_producer(
        &mut self,
        path: &Path,
        material: &ProducerMaterial,
    ) -> Result<(), KeyStoreError>;

    /// Load manager material, `None` if nothing has been stored at `path`
    fn load_manager(&self, path: &Path) -> Result<Option<ManagerMaterial>, KeyStoreError>;

    fn store_manager(
        &mut self,
        path: &Path,
        material: &ManagerMaterial,
    ) -> Result<(), KeyStoreError>;

    /// Persist the manager-side record of an owned card to `key_file`
    fn store_owner_record(
        &mut self,
        key_file: &Path,
        record: &OwnerRecord,
    ) -> Result<(), KeyStoreError>;
}
