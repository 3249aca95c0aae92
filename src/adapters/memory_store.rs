//! In-memory implementation of `KeyStore`
//!
//! Material lives in maps keyed by the caller's path and is gone when the
//! store is dropped. Used by tests and dry runs.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::KeyStoreError;
use crate::model::{ManagerMaterial, OwnerRecord, ProducerMaterial};
use crate::ports::KeyStore;

#[derive(Debug, Clone, Default)]
pub struct MemoryKeyStore {
    producers: HashMap<PathBuf, ProducerMaterial>,
    managers: HashMap<PathBuf, ManagerMaterial>,
    owner_records: HashMap<PathBuf, OwnerRecord>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner_record(&self, key_file: &Path) -> Option<&OwnerRecord> {
        self.owner_records.get(key_file)
    }
}

impl KeyStore for MemoryKeyStore {
    fn load_producer(&self, path: &Path) -> Result<Option<ProducerMaterial>, KeyStoreError> {
        Ok(self.producers.get(path).cloned())
    }

    fn store_producer(
        &mut self,
        path: &Path,
        material: &ProducerMaterial,
    ) -> Result<(), KeyStoreError> {
        insert_new(&mut self.producers, path, material)
    }

    fn load_manager(&self, path: &Path) -> Result<Option<ManagerMaterial>, KeyStoreError> {
        Ok(self.managers.get(path).cloned())
    }

    fn store_manager(
        &mut self,
        path: &Path,
        material: &ManagerMaterial,
    ) -> Result<(), KeyStoreError> {
        insert_new(&mut self.managers, path, material)
    }

    fn store_owner_record(
        &mut self,
        key_file: &Path,
        record: &OwnerRecord,
    ) -> Result<(), KeyStoreError> {
        self.owner_records
            .insert(key_file.to_path_buf(), record.clone());
        Ok(())
    }
}

fn insert_new<T: Clone>(
    map: &mut HashMap<PathBuf, T>,
    path: &Path,
    material: &T,
) -> Result<(), KeyStoreError> {
    match map.entry(path.to_path_buf()) {
        Entry::Occupied(_) => Err(KeyStoreError::AlreadyExists {
            path: path.to_path_buf(),
        }),
        Entry::Vacant(slot) => {
            slot.insert(material.clone());
            Ok(())
        }
    }
}
