//! In-memory card implementing `TagSession`
//!
//! Models the parts of a DESFire-like card the protocol relies on: a card
//! master key, applications with key tables, files with access rights, and
//! per-session authentication state. Faults can be injected per call and
//! the card can be pulled from the field.

use std::collections::{BTreeMap, VecDeque};

use tracing::trace;

use crate::model::{Access, ApplicationId, DerivedKey, FileAccess, FileId};
use crate::ports::{FaultKind, TagResult, TagSession, TransportFault};

/// Length of the factory default keys
pub const DEFAULT_KEY_LEN: usize = 16;

/// Tag operations, used to target fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagCall {
    Uid,
    SelectApplication,
    CreateApplication,
    Authenticate,
    ChangeKey,
    FormatPicc,
    CreateFile,
    WriteFile,
    ReadFile,
}

#[derive(Debug, Clone)]
struct SimFile {
    access: FileAccess,
    contents: Vec<u8>,
}

#[derive(Debug, Clone)]
struct SimApplication {
    keys: Vec<Vec<u8>>,
    files: BTreeMap<FileId, SimFile>,
}

#[derive(Debug, Clone)]
pub struct SimulatedTag {
    uid: Vec<u8>,
    picc_keys: Vec<Vec<u8>>,
    applications: BTreeMap<u32, SimApplication>,
    selected: ApplicationId,
    authenticated: Option<u8>,
    removed: bool,
    faults: VecDeque<(TagCall, FaultKind)>,
}

impl SimulatedTag {
    /// A factory-fresh card with the given UID
    pub fn blank(uid: &[u8]) -> Self {
        Self {
            uid: uid.to_vec(),
            picc_keys: vec![vec![0u8; DEFAULT_KEY_LEN]],
            applications: BTreeMap::new(),
            selected: ApplicationId::PICC,
            authenticated: None,
            removed: false,
            faults: VecDeque::new(),
        }
    }

    /// Make the next `call` fail with `kind`
    ///
    /// Injected faults queue up and are consumed in order of their calls.
    pub fn fail_next(&mut self, call: TagCall, kind: FaultKind) {
        self.faults.push_back((call, kind));
    }

    /// Pull the card out of the field; every call fails until reinserted
    pub fn remove(&mut self) {
        self.removed = true;
    }

    /// Put the card back, starting a fresh session
    pub fn reinsert(&mut self) {
        self.removed = false;
        self.reset_session();
    }

    /// Drop selection and authentication, as a new reader session would
    pub fn reset_session(&mut self) {
        self.selected = ApplicationId::PICC;
        self.authenticated = None;
    }

    pub fn has_application(&self, aid: ApplicationId) -> bool {
        self.applications.contains_key(&aid.value())
    }

    /// Raw file contents, bypassing access rights
    pub fn peek_file(&self, aid: ApplicationId, file: FileId) -> Option<&[u8]> {
        self.applications
            .get(&aid.value())
            .and_then(|app| app.files.get(&file))
            .map(|f| f.contents.as_slice())
    }

    fn check(&mut self, call: TagCall) -> TagResult<()> {
        if self.removed {
            return Err(TransportFault::new(FaultKind::TagRemoved, "no tag in field"));
        }
        if let Some(index) = self.faults.iter().position(|(c, _)| *c == call) {
            if let Some((_, kind)) = self.faults.remove(index) {
                trace!(?call, ?kind, "Injecting fault");
                self.authenticated = None;
                return Err(TransportFault::new(kind, format!("injected on {:?}", call)));
            }
        }
        Ok(())
    }

    fn keys_mut(&mut self) -> TagResult<&mut Vec<Vec<u8>>> {
        if self.selected == ApplicationId::PICC {
            return Ok(&mut self.picc_keys);
        }
        let aid = self.selected;
        self.applications
            .get_mut(&aid.value())
            .map(|app| &mut app.keys)
            .ok_or_else(|| TransportFault::new(FaultKind::NotFound, format!("application {aid}")))
    }

    fn selected_application(&mut self) -> TagResult<&mut SimApplication> {
        let aid = self.selected;
        if aid == ApplicationId::PICC {
            return Err(TransportFault::new(
                FaultKind::NotFound,
                "no application selected",
            ));
        }
        self.applications
            .get_mut(&aid.value())
            .ok_or_else(|| TransportFault::new(FaultKind::NotFound, format!("application {aid}")))
    }

    fn require_key(&self, key_no: u8, what: &str) -> TagResult<()> {
        if self.authenticated != Some(key_no) {
            return Err(TransportFault::new(
                FaultKind::PermissionDenied,
                format!("{what} requires key {key_no}"),
            ));
        }
        Ok(())
    }

    fn permits(&self, access: Access) -> bool {
        match access {
            Access::Free => true,
            Access::Key(key_no) => self.authenticated == Some(key_no),
        }
    }
}

impl TagSession for SimulatedTag {
    fn uid(&mut self) -> TagResult<Vec<u8>> {
        self.check(TagCall::Uid)?;
        Ok(self.uid.clone())
    }

    fn select_application(&mut self, aid: ApplicationId) -> TagResult<()> {
        self.check(TagCall::SelectApplication)?;
        self.authenticated = None;
        if aid != ApplicationId::PICC && !self.has_application(aid) {
            return Err(TransportFault::new(
                FaultKind::NotFound,
                format!("application {aid}"),
            ));
        }
        self.selected = aid;
        Ok(())
    }

    fn create_application(&mut self, aid: ApplicationId, key_count: u8) -> TagResult<()> {
        self.check(TagCall::CreateApplication)?;
        if self.selected != ApplicationId::PICC {
            return Err(TransportFault::new(
                FaultKind::PermissionDenied,
                "applications are created at card level",
            ));
        }
        self.require_key(0, "create application")?;
        if self.has_application(aid) {
            return Err(TransportFault::new(
                FaultKind::Other,
                format!("duplicate application {aid}"),
            ));
        }
        self.applications.insert(
            aid.value(),
            SimApplication {
                keys: vec![vec![0u8; DEFAULT_KEY_LEN]; key_count as usize],
                files: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn authenticate(&mut self, key_no: u8, key: &DerivedKey) -> TagResult<()> {
        self.check(TagCall::Authenticate)?;
        self.authenticated = None;
        let stored = self
            .keys_mut()?
            .get(key_no as usize)
            .cloned()
            .ok_or_else(|| TransportFault::new(FaultKind::NotFound, format!("key {key_no}")))?;
        if stored.as_slice() != key.as_bytes() {
            return Err(TransportFault::new(
                FaultKind::AuthenticationError,
                format!("key {key_no} rejected"),
            ));
        }
        self.authenticated = Some(key_no);
        Ok(())
    }

    fn change_key(&mut self, key_no: u8, new_key: &DerivedKey) -> TagResult<()> {
        self.check(TagCall::ChangeKey)?;
        self.require_key(key_no, "change key")?;
        let keys = self.keys_mut()?;
        let slot = keys
            .get_mut(key_no as usize)
            .ok_or_else(|| TransportFault::new(FaultKind::NotFound, format!("key {key_no}")))?;
        *slot = new_key.as_bytes().to_vec();
        self.authenticated = None;
        Ok(())
    }

    fn format_picc(&mut self) -> TagResult<()> {
        self.check(TagCall::FormatPicc)?;
        if self.selected != ApplicationId::PICC {
            return Err(TransportFault::new(
                FaultKind::PermissionDenied,
                "format requires card level",
            ));
        }
        self.require_key(0, "format")?;
        self.applications.clear();
        Ok(())
    }

    fn create_file(
        &mut self,
        file: FileId,
        access: FileAccess,
        contents: &[u8],
    ) -> TagResult<()> {
        self.check(TagCall::CreateFile)?;
        self.require_key(0, "create file")?;
        let app = self.selected_application()?;
        if app.files.contains_key(&file) {
            return Err(TransportFault::new(
                FaultKind::Other,
                format!("duplicate file {file}"),
            ));
        }
        app.files.insert(
            file,
            SimFile {
                access,
                contents: contents.to_vec(),
            },
        );
        Ok(())
    }

    fn write_file(&mut self, file: FileId, contents: &[u8]) -> TagResult<()> {
        self.check(TagCall::WriteFile)?;
        let authenticated = self.authenticated;
        let app = self.selected_application()?;
        let entry = app
            .files
            .get_mut(&file)
            .ok_or_else(|| TransportFault::new(FaultKind::NotFound, format!("file {file}")))?;
        let allowed = match entry.access.write {
            Access::Free => true,
            Access::Key(key_no) => authenticated == Some(key_no),
        };
        if !allowed {
            return Err(TransportFault::new(
                FaultKind::PermissionDenied,
                format!("write to file {file}"),
            ));
        }
        entry.contents = contents.to_vec();
        Ok(())
    }

    fn read_file(&mut self, file: FileId) -> TagResult<Vec<u8>> {
        self.check(TagCall::ReadFile)?;
        let app = self.selected_application()?;
        let entry = app
            .files
            .get(&file)
            .cloned()
            .ok_or_else(|| TransportFault::new(FaultKind::NotFound, format!("file {file}")))?;
        if !self.permits(entry.access.read) {
            return Err(TransportFault::new(
                FaultKind::PermissionDenied,
                format!("read of file {file}"),
            ));
        }
        Ok(entry.contents)
    }
}
