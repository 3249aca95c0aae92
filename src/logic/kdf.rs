//! Key derivation engine
//!
//! Direct derivation is an HMAC-SHA256 counter-mode KDF (NIST SP 800-108).
//! Each block is `HMAC(master, i || label || 0x00 || aid || key_no || data || L)`,
//! where `i` is a one-byte block counter, `aid` is a 32-bit big-endian
//! application id, and `L` is the output length in bits as a 32-bit
//! big-endian value. Output is the concatenation of blocks, truncated.
//!
//! Password derivation feeds the direct derivation into PBKDF2-HMAC-SHA256
//! as salt, with the password as PBKDF2 password and the caller's iteration
//! count.

use hmac::Mac;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

use super::primitives::{ensure_initialized, new_mac};
use crate::error::CryptoError;
use crate::model::{DerivedKey, MasterSecret};

const LABEL: &[u8] = b"openkey kdf";
const BLOCK_LEN: usize = 32;

/// Length of the intermediate key used as PBKDF2 salt
const PASSWORD_SALT_LEN: usize = 32;

/// Largest output a single derivation can produce
pub const MAX_OUTPUT_LEN: usize = 255 * BLOCK_LEN;

/// Derive a key into `derived_key`
///
/// # Errors
///
/// Fails if the primitive library cannot be initialized, if `master_key` or
/// `data` is empty, or if `derived_key` is empty or longer than
/// [`MAX_OUTPUT_LEN`].
pub fn kdf(
    master_key: &[u8],
    aid: u32,
    key_no: u8,
    data: &[u8],
    derived_key: &mut [u8],
) -> Result<(), CryptoError> {
    ensure_initialized()?;

    if master_key.is_empty() {
        return Err(CryptoError::EmptyInput {
            input: "master key",
        });
    }
    if data.is_empty() {
        return Err(CryptoError::EmptyInput {
            input: "context data",
        });
    }
    check_output_len(derived_key.len())?;

    let length_bits = (derived_key.len() as u32) * 8;

    for (index, chunk) in derived_key.chunks_mut(BLOCK_LEN).enumerate() {
        let counter = (index + 1) as u8;

        let mut mac = new_mac(master_key)?;
        mac.update(&[counter]);
        mac.update(LABEL);
        mac.update(&[0x00]);
        mac.update(&aid.to_be_bytes());
        mac.update(&[key_no]);
        mac.update(data);
        mac.update(&length_bits.to_be_bytes());

        let block = mac.finalize().into_bytes();
        chunk.copy_from_slice(&block[..chunk.len()]);
    }

    Ok(())
}

/// Derive a password-hardened key into `derived_key`
///
/// `iterations` has to be stored next to whatever the key protects: the same
/// count must be replayed to recompute the key.
///
/// # Errors
///
/// Same as [`kdf`], and additionally fails on an empty password or an
/// iteration count of zero.
pub fn pbkdf(
    master_key: &[u8],
    aid: u32,
    key_no: u8,
    data: &[u8],
    password: &[u8],
    iterations: u32,
    derived_key: &mut [u8],
) -> Result<(), CryptoError> {
    if password.is_empty() {
        return Err(CryptoError::EmptyInput { input: "password" });
    }
    if iterations == 0 {
        return Err(CryptoError::InvalidIterations);
    }
    check_output_len(derived_key.len())?;

    let mut salt = Zeroizing::new([0u8; PASSWORD_SALT_LEN]);
    kdf(master_key, aid, key_no, data, &mut salt[..])?;

    pbkdf2_hmac::<Sha256>(password, &salt[..], iterations, derived_key);
    Ok(())
}

/// Derive a key of `len` bytes from a role's master secret
pub fn derive(
    master: &MasterSecret,
    aid: u32,
    key_no: u8,
    data: &[u8],
    len: usize,
) -> Result<DerivedKey, CryptoError> {
    let mut out = vec![0u8; len];
    kdf(master.as_bytes(), aid, key_no, data, &mut out)?;
    Ok(DerivedKey::from_vec(out))
}

/// Derive a password-hardened key of `len` bytes from a role's master secret
pub fn derive_with_password(
    master: &MasterSecret,
    aid: u32,
    key_no: u8,
    data: &[u8],
    password: &[u8],
    iterations: u32,
    len: usize,
) -> Result<DerivedKey, CryptoError> {
    let mut out = vec![0u8; len];
    pbkdf(
        master.as_bytes(),
        aid,
        key_no,
        data,
        password,
        iterations,
        &mut out,
    )?;
    Ok(DerivedKey::from_vec(out))
}

fn check_output_len(len: usize) -> Result<(), CryptoError> {
    if len == 0 {
        return Err(CryptoError::ZeroLengthOutput);
    }
    if len > MAX_OUTPUT_LEN {
        return Err(CryptoError::OutputTooLong {
            requested: len,
            max: MAX_OUTPUT_LEN,
        });
    }
    Ok(())
}
