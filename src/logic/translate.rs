//! Error translation
//!
//! The protocol layer and the tag transport report failures through one
//! channel. A failed step yields a raw status code and, if the transport
//! signalled something during the operation, a [`TransportFault`]. Whether
//! that fault explains the failure depends on the step: only codes of steps
//! known to issue tag I/O for the given operation are blamed on the
//! transport.

use tracing::debug;

use crate::error::{OpenkeyError, ProtocolError, TransportError};
use crate::model::{Operation, StatusCode};
use crate::ports::{FaultKind, TransportFault};

const CREATE_TAG_CODES: &[StatusCode] = &[
    StatusCode::ReadUid,
    StatusCode::PiccAuthenticate,
    StatusCode::PiccChangeKey,
    StatusCode::ApplicationCreate,
    StatusCode::ApplicationSelect,
    StatusCode::ApplicationAuthenticate,
    StatusCode::ApplicationChangeKey,
    StatusCode::CardNameWrite,
    StatusCode::SlotChangeKey,
    StatusCode::SlotAuthenticate,
    StatusCode::CardIdWrite,
    StatusCode::DescriptorWrite,
];

const OWN_TAG_CODES: &[StatusCode] = &[
    StatusCode::ReadUid,
    StatusCode::ApplicationSelect,
    StatusCode::SlotChangeKey,
    StatusCode::SlotAuthenticate,
    StatusCode::CardIdRead,
    StatusCode::DescriptorWrite,
];

const AUTHENTICATE_TAG_CODES: &[StatusCode] = &[
    StatusCode::ReadUid,
    StatusCode::ApplicationSelect,
    StatusCode::SlotAuthenticate,
    StatusCode::CardIdRead,
    StatusCode::DescriptorRead,
];

/// Codes of `operation` that may be attributed to the transport
///
/// Recreate has no list: its reset step does not distinguish causes, so
/// every transport signal is reported as a reset failure.
pub fn transport_codes(operation: Operation) -> Option<&'static [StatusCode]> {
    match operation {
        Operation::Create => Some(CREATE_TAG_CODES),
        Operation::Own => Some(OWN_TAG_CODES),
        Operation::Authenticate => Some(AUTHENTICATE_TAG_CODES),
        Operation::Recreate => None,
    }
}

/// Decide how a failed step of `operation` is reported
pub fn translate(
    operation: Operation,
    code: StatusCode,
    signal: Option<&TransportFault>,
) -> OpenkeyError {
    let Some(fault) = signal else {
        return ProtocolError::Status { operation, code }.into();
    };

    match transport_codes(operation) {
        None => {
            debug!(%operation, code = code.code(), "Reporting coarse reset failure");
            TransportError::Reset {
                detail: fault.to_string(),
            }
            .into()
        }
        Some(codes) if codes.contains(&code) => {
            debug!(%operation, code = code.code(), kind = ?fault.kind, "Attributing failure to transport");
            TransportError::from(fault).into()
        }
        Some(_) => {
            debug!(%operation, code = code.code(), "Ignoring unrelated transport signal");
            ProtocolError::Status { operation, code }.into()
        }
    }
}

impl From<&TransportFault> for TransportError {
    fn from(fault: &TransportFault) -> Self {
        let detail = fault.detail.clone();
        match fault.kind {
            FaultKind::AuthenticationError => TransportError::AuthenticationMismatch { detail },
            FaultKind::PermissionDenied => TransportError::PermissionDenied { detail },
            FaultKind::NotFound => TransportError::NotFound { detail },
            FaultKind::Communication => TransportError::Communication { detail },
            FaultKind::TagRemoved => TransportError::CardRemoved,
            FaultKind::Other => TransportError::Unknown { detail },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_CODES: &[StatusCode] = &[
        StatusCode::ReadUid,
        StatusCode::PiccAuthenticate,
        StatusCode::PiccChangeKey,
        StatusCode::PiccFormat,
        StatusCode::ApplicationPresent,
        StatusCode::ApplicationCreate,
        StatusCode::ApplicationSelect,
        StatusCode::ApplicationAuthenticate,
        StatusCode::ApplicationChangeKey,
        StatusCode::CardNameWrite,
        StatusCode::SlotChangeKey,
        StatusCode::SlotAuthenticate,
        StatusCode::CardIdWrite,
        StatusCode::CardIdRead,
        StatusCode::CardIdMalformed,
        StatusCode::DescriptorWrite,
        StatusCode::DescriptorRead,
        StatusCode::DescriptorMalformed,
        StatusCode::PasswordModeMismatch,
        StatusCode::SlotNotOwned,
    ];

    fn auth_fault() -> TransportFault {
        TransportFault::new(FaultKind::AuthenticationError, "integrity error")
    }

    fn is_protocol_status(err: &OpenkeyError, expected: StatusCode) -> bool {
        matches!(
            err,
            OpenkeyError::Protocol(ProtocolError::Status { code, .. }) if *code == expected
        )
    }

    #[test]
    fn test_no_signal_always_reports_protocol_error() {
        for operation in [
            Operation::Create,
            Operation::Recreate,
            Operation::Own,
            Operation::Authenticate,
        ] {
            for &code in ALL_CODES {
                let err = translate(operation, code, None);
                assert!(is_protocol_status(&err, code), "{operation} {code}: {err}");
            }
        }
    }

    #[test]
    fn test_allow_listed_codes_with_signal_report_transport_error() {
        for operation in [Operation::Create, Operation::Own, Operation::Authenticate] {
            let codes = transport_codes(operation).unwrap();
            for &code in codes {
                let err = translate(operation, code, Some(&auth_fault()));
                assert!(
                    matches!(
                        err,
                        OpenkeyError::Transport(TransportError::AuthenticationMismatch { .. })
                    ),
                    "{operation} {code}: {err}"
                );
            }
        }
    }

    #[test]
    fn test_unlisted_codes_ignore_signal() {
        for operation in [Operation::Create, Operation::Own, Operation::Authenticate] {
            let codes = transport_codes(operation).unwrap();
            for &code in ALL_CODES.iter().filter(|c| !codes.contains(*c)) {
                let err = translate(operation, code, Some(&auth_fault()));
                assert!(is_protocol_status(&err, code), "{operation} {code}: {err}");
            }
        }
    }

    #[test]
    fn test_allow_lists_differ_per_operation() {
        let err = translate(
            Operation::Own,
            StatusCode::PiccAuthenticate,
            Some(&auth_fault()),
        );
        assert!(is_protocol_status(&err, StatusCode::PiccAuthenticate));

        let err = translate(
            Operation::Create,
            StatusCode::PiccAuthenticate,
            Some(&auth_fault()),
        );
        assert!(matches!(err, OpenkeyError::Transport(_)));
    }

    #[test]
    fn test_recreate_translation_is_coarse() {
        for &code in ALL_CODES {
            let fault = TransportFault::new(FaultKind::Communication, "timeout");
            let err = translate(Operation::Recreate, code, Some(&fault));
            assert!(matches!(
                err,
                OpenkeyError::Transport(TransportError::Reset { .. })
            ));
        }
    }

    #[test]
    fn test_fault_kind_mapping() {
        let removed = TransportFault::new(FaultKind::TagRemoved, "gone");
        assert_eq!(TransportError::from(&removed), TransportError::CardRemoved);

        let missing = TransportFault::new(FaultKind::NotFound, "file 0x21");
        assert_eq!(
            TransportError::from(&missing),
            TransportError::NotFound {
                detail: "file 0x21".to_string()
            }
        );
    }
}
