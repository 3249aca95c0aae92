//! Access to the cryptographic primitive library
//!
//! The HMAC-SHA256 primitive is checked against a known answer once per
//! process before the first derivation uses it.

use std::sync::OnceLock;

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::TryRngCore;
use sha2::Sha256;
use tracing::debug;

use crate::error::CryptoError;

pub(crate) type HmacSha256 = Hmac<Sha256>;

// RFC 4231, test case 2
const SELF_TEST_KEY: &[u8] = b"Jefe";
const SELF_TEST_DATA: &[u8] = b"what do ya want for nothing?";
const SELF_TEST_MAC: &str = "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843";

static INITIALIZED: OnceLock<Result<(), CryptoError>> = OnceLock::new();

/// Initialize the primitive library
///
/// The first call runs the self test; every later call, from any thread,
/// returns the stored outcome.
pub fn ensure_initialized() -> Result<(), CryptoError> {
    INITIALIZED.get_or_init(self_test).clone()
}

fn self_test() -> Result<(), CryptoError> {
    debug!("Running HMAC-SHA256 self test");

    let expected = hex::decode(SELF_TEST_MAC).map_err(|e| CryptoError::InitializationFailed {
        reason: e.to_string(),
    })?;

    let mut mac = new_mac(SELF_TEST_KEY)?;
    mac.update(SELF_TEST_DATA);
    mac.verify_slice(&expected)
        .map_err(|_| CryptoError::InitializationFailed {
            reason: "HMAC-SHA256 known answer mismatch".to_string(),
        })
}

pub(crate) fn new_mac(key: &[u8]) -> Result<HmacSha256, CryptoError> {
    <HmacSha256 as Mac>::new_from_slice(key).map_err(|e| CryptoError::InitializationFailed {
        reason: e.to_string(),
    })
}

/// Fill `buf` from the operating system's secure random source
pub fn fill_random(buf: &mut [u8]) -> Result<(), CryptoError> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CryptoError::RandomSource {
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialization_is_idempotent() {
        assert!(ensure_initialized().is_ok());
        assert!(ensure_initialized().is_ok());
    }

    #[test]
    fn test_concurrent_first_use() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(ensure_initialized))
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
    }

    #[test]
    fn test_fill_random() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        fill_random(&mut a).unwrap();
        fill_random(&mut b).unwrap();
        assert_ne!(a, b);
    }
}
