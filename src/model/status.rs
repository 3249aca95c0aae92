use std::fmt;

/// Card lifecycle operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Recreate,
    Own,
    Authenticate,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Recreate => "recreate",
            Operation::Own => "own",
            Operation::Authenticate => "authenticate",
        };
        f.write_str(name)
    }
}

/// Raw status of a failed lifecycle step
///
/// Steps that talk to the tag and steps that only check card content share
/// one numbering. Which codes may be blamed on the transport depends on the
/// operation, see `logic::translate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum StatusCode {
    ReadUid = 1,
    PiccAuthenticate = 2,
    PiccChangeKey = 3,
    PiccFormat = 4,
    ApplicationPresent = 5,
    ApplicationCreate = 6,
    ApplicationSelect = 7,
    ApplicationAuthenticate = 8,
    ApplicationChangeKey = 9,
    CardNameWrite = 10,
    SlotChangeKey = 11,
    SlotAuthenticate = 12,
    CardIdWrite = 13,
    CardIdRead = 14,
    CardIdMalformed = 15,
    DescriptorWrite = 16,
    DescriptorRead = 17,
    DescriptorMalformed = 18,
    PasswordModeMismatch = 19,
    SlotNotOwned = 20,
}

impl StatusCode {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn describe(self) -> &'static str {
        match self {
            StatusCode::ReadUid => "reading the card UID failed",
            StatusCode::PiccAuthenticate => "authentication with the card master key failed",
            StatusCode::PiccChangeKey => "changing the card master key failed",
            StatusCode::PiccFormat => "formatting the card failed",
            StatusCode::ApplicationPresent => "card already carries an openkey application",
            StatusCode::ApplicationCreate => "creating the openkey application failed",
            StatusCode::ApplicationSelect => "selecting the openkey application failed",
            StatusCode::ApplicationAuthenticate => {
                "authentication with the application master key failed"
            }
            StatusCode::ApplicationChangeKey => "changing the application master key failed",
            StatusCode::CardNameWrite => "writing the card name failed",
            StatusCode::SlotChangeKey => "changing a slot key failed",
            StatusCode::SlotAuthenticate => "authentication with a slot key failed",
            StatusCode::CardIdWrite => "writing the card id failed",
            StatusCode::CardIdRead => "reading the card id failed",
            StatusCode::CardIdMalformed => "card id stored on the card is malformed",
            StatusCode::DescriptorWrite => "writing the slot descriptor failed",
            StatusCode::DescriptorRead => "reading the slot descriptor failed",
            StatusCode::DescriptorMalformed => "slot descriptor is malformed",
            StatusCode::PasswordModeMismatch => {
                "password presence does not match the slot's protection mode"
            }
            StatusCode::SlotNotOwned => "slot has not been taken over by a manager",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.code(), self.describe())
    }
}
