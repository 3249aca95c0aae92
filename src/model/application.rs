use std::fmt;

/// 24-bit identifier of an application on the card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ApplicationId(u32);

impl ApplicationId {
    /// The card-level (PICC) application
    pub const PICC: ApplicationId = ApplicationId(0);

    /// Application holding the openkey structure
    pub const OPENKEY: ApplicationId = ApplicationId(0xFF77F0);

    pub const fn new(aid: u32) -> Self {
        Self(aid & 0x00FF_FFFF)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06X}", self.0)
    }
}

/// File number inside an application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u8);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Who may perform an access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Free,
    Key(u8),
}

/// Access rights of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAccess {
    pub read: Access,
    pub write: Access,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_id_masks_to_24_bits() {
        assert_eq!(ApplicationId::new(0x12FF77F0), ApplicationId::OPENKEY);
        assert_eq!(ApplicationId::OPENKEY.to_string(), "FF77F0");
    }
}
