//! Filesystem implementation of `KeyStore`
//!
//! Each role's storage path is a directory. Material is kept as small JSON
//! documents with hex-encoded secrets: `producer.json` for the producer and
//! `manager.json` for a manager and its authenticators. Files are written
//! through a temporary file in the same directory and never overwritten.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::KeyStoreError;
use crate::model::{
    CardId, KeySlot, ManagerMaterial, MasterSecret, OwnerRecord, ProducerMaterial,
};
use crate::ports::KeyStore;

const PRODUCER_FILE: &str = "producer.json";
const MANAGER_FILE: &str = "manager.json";
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoredProducer {
    version: u32,
    #[serde(with = "hex_secret")]
    master: Zeroizing<Vec<u8>>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoredManager {
    version: u32,
    #[serde(with = "hex_secret")]
    master: Zeroizing<Vec<u8>>,
    slot: u8,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoredOwnerRecord {
    version: u32,
    card_id: String,
    slot: u8,
    password_protected: bool,
    iterations: u32,
}

mod hex_secret {
    use serde::{Deserialize, Deserializer, Serializer};
    use zeroize::Zeroizing;

    pub fn serialize<S: Serializer>(bytes: &Zeroizing<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        let encoded = Zeroizing::new(hex::encode(&bytes[..]));
        s.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Zeroizing<Vec<u8>>, D::Error> {
        let encoded = Zeroizing::new(String::deserialize(d)?);
        hex::decode(encoded.as_str())
            .map(Zeroizing::new)
            .map_err(serde::de::Error::custom)
    }
}

/// Key store backed by plain files
#[derive(Debug, Clone, Default)]
pub struct FileKeyStore;

impl FileKeyStore {
    pub fn new() -> Self {
        Self
    }
}

impl KeyStore for FileKeyStore {
    fn load_producer(&self, path: &Path) -> Result<Option<ProducerMaterial>, KeyStoreError> {
        let file = path.join(PRODUCER_FILE);
        let Some(stored) = read_document::<StoredProducer>(&file)? else {
            return Ok(None);
        };
        check_version(&file, stored.version)?;
        let master = master_secret(&file, &stored.master)?;
        Ok(Some(ProducerMaterial { master }))
    }

    fn store_producer(
        &mut self,
        path: &Path,
        material: &ProducerMaterial,
    ) -> Result<(), KeyStoreError> {
        let stored = StoredProducer {
            version: FORMAT_VERSION,
            master: Zeroizing::new(material.master.as_bytes().to_vec()),
        };
        write_atomic(&path.join(PRODUCER_FILE), &stored, Clobber::Refuse)
    }

    fn load_manager(&self, path: &Path) -> Result<Option<ManagerMaterial>, KeyStoreError> {
        let file = path.join(MANAGER_FILE);
        let Some(stored) = read_document::<StoredManager>(&file)? else {
            return Ok(None);
        };
        check_version(&file, stored.version)?;
        let master = master_secret(&file, &stored.master)?;
        let slot = KeySlot::new(stored.slot).map_err(|e| malformed(&file, &e.to_string()))?;
        Ok(Some(ManagerMaterial { master, slot }))
    }

    fn store_manager(
        &mut self,
        path: &Path,
        material: &ManagerMaterial,
    ) -> Result<(), KeyStoreError> {
        let stored = StoredManager {
            version: FORMAT_VERSION,
            master: Zeroizing::new(material.master.as_bytes().to_vec()),
            slot: material.slot.value(),
        };
        write_atomic(&path.join(MANAGER_FILE), &stored, Clobber::Refuse)
    }

    fn store_owner_record(
        &mut self,
        key_file: &Path,
        record: &OwnerRecord,
    ) -> Result<(), KeyStoreError> {
        let stored = StoredOwnerRecord {
            version: FORMAT_VERSION,
            card_id: record.card_id.as_str().to_string(),
            slot: record.slot.value(),
            password_protected: record.password_protected,
            iterations: record.iterations,
        };
        write_atomic(key_file, &stored, Clobber::Replace)
    }
}

impl FileKeyStore {
    /// Read back an ownership record written by `store_owner_record`
    pub fn load_owner_record(&self, key_file: &Path) -> Result<Option<OwnerRecord>, KeyStoreError> {
        let Some(stored) = read_document::<StoredOwnerRecord>(key_file)? else {
            return Ok(None);
        };
        check_version(key_file, stored.version)?;
        let card_id =
            CardId::new(&stored.card_id).map_err(|e| malformed(key_file, &e.to_string()))?;
        let slot = KeySlot::new(stored.slot).map_err(|e| malformed(key_file, &e.to_string()))?;
        Ok(Some(OwnerRecord {
            card_id,
            slot,
            password_protected: stored.password_protected,
            iterations: stored.iterations,
        }))
    }
}

fn read_document<T: DeserializeOwned>(file: &Path) -> Result<Option<T>, KeyStoreError> {
    let bytes = match fs::read(file) {
        Ok(bytes) => Zeroizing::new(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(KeyStoreError::Io {
                path: file.to_path_buf(),
                source,
            })
        }
    };
    let document = serde_json::from_slice(&bytes).map_err(|e| malformed(file, &e.to_string()))?;
    debug!(path = %file.display(), "Loaded key material");
    Ok(Some(document))
}

fn check_version(file: &Path, version: u32) -> Result<(), KeyStoreError> {
    if version != FORMAT_VERSION {
        return Err(malformed(file, &format!("unsupported version {version}")));
    }
    Ok(())
}

fn master_secret(file: &Path, bytes: &[u8]) -> Result<MasterSecret, KeyStoreError> {
    MasterSecret::from_bytes(bytes.to_vec()).map_err(|e| malformed(file, &e.to_string()))
}

fn malformed(file: &Path, reason: &str) -> KeyStoreError {
    KeyStoreError::Malformed {
        path: file.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> KeyStoreError {
    let path: PathBuf = path.to_path_buf();
    move |source| KeyStoreError::Io { path, source }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clobber {
    Refuse,
    Replace,
}

/// Serialize `document` into `file` via a synced temporary sibling,
/// readable by the owner only where supported
fn write_atomic<T: Serialize>(
    file: &Path,
    document: &T,
    clobber: Clobber,
) -> Result<(), KeyStoreError> {
    let parent = match file.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
            parent
        }
        None => Path::new("."),
    };

    let encoded = Zeroizing::new(
        serde_json::to_vec_pretty(document).map_err(|e| malformed(file, &e.to_string()))?,
    );

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io_error(parent))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(io_error(temp.path()))?;
    }
    temp.write_all(&encoded).map_err(io_error(file))?;
    temp.as_file().sync_all().map_err(io_error(file))?;

    let persisted = match clobber {
        Clobber::Refuse => temp.persist_noclobber(file),
        Clobber::Replace => temp.persist(file),
    };
    persisted.map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::AlreadyExists {
            KeyStoreError::AlreadyExists {
                path: file.to_path_buf(),
            }
        } else {
            KeyStoreError::Io {
                path: file.to_path_buf(),
                source: e.error,
            }
        }
    })?;

    debug!(path = %file.display(), "Stored key material");
    Ok(())
}
