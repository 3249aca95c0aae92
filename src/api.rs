use crate::context::Context;
use crate::error::OpenkeyResult;
use crate::logic;

pub use crate::context::BootstrapOptions;
pub use crate::model::*;

/// Open a context that keeps role material in files
pub fn open_context() -> OpenkeyResult<Context> {
    Context::new()
}

/// Derive a key into `derived_key` without a context
///
/// `aid` is the application the key belongs to, `key_no` its slot and
/// `data` the card-specific context, usually the card UID. The output
/// length is the length of `derived_key`.
pub fn kdf(
    master_key: &[u8],
    aid: u32,
    key_no: u8,
    data: &[u8],
    derived_key: &mut [u8],
) -> OpenkeyResult<()> {
    logic::kdf(master_key, aid, key_no, data, derived_key)?;
    Ok(())
}

/// Derive a password-hardened key into `derived_key` without a context
///
/// The same `iterations` must be supplied again to recompute the key.
pub fn pbkdf(
    master_key: &[u8],
    aid: u32,
    key_no: u8,
    data: &[u8],
    password: &[u8],
    iterations: u32,
    derived_key: &mut [u8],
) -> OpenkeyResult<()> {
    logic::pbkdf(
        master_key,
        aid,
        key_no,
        data,
        password,
        iterations,
        derived_key,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CryptoError, OpenkeyError};

    #[test]
    fn test_kdf_wraps_crypto_errors() {
        let mut out = [0u8; 16];
        let err = kdf(b"", 0xFF77F0, 1, b"uid", &mut out).unwrap_err();
        assert!(matches!(
            err,
            OpenkeyError::Crypto(CryptoError::EmptyInput { .. })
        ));
    }

    #[test]
    fn test_pbkdf_matches_logic() {
        let mut api_out = [0u8; 16];
        let mut logic_out = [0u8; 16];
        pbkdf(b"master", 1, 2, b"uid", b"1234", 8, &mut api_out).unwrap();
        logic::pbkdf(b"master", 1, 2, b"uid", b"1234", 8, &mut logic_out).unwrap();
        assert_eq!(api_out, logic_out);
    }
}
