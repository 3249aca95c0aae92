use crate::error::ConfigError;

/// Tunables shared by every lifecycle operation of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextConfig {
    /// PBKDF2 iterations used when `own` installs a password-protected key
    pub password_iterations: u32,
    /// Length of every key written to a card
    pub key_len: usize,
}

impl ContextConfig {
    pub const DEFAULT_PASSWORD_ITERATIONS: u32 = 4096;

    /// Upper bound for iteration counts, both configured and read from cards
    pub const MAX_PASSWORD_ITERATIONS: u32 = 1_000_000;

    /// AES-128 card keys
    pub const DEFAULT_KEY_LEN: usize = 16;

    /// Reject values a card or a derivation cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_iterations(self.password_iterations)?;
        if self.key_len != Self::DEFAULT_KEY_LEN {
            return Err(ConfigError::UnsupportedKeyLength {
                len: self.key_len,
                expected: Self::DEFAULT_KEY_LEN,
            });
        }
        Ok(())
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            password_iterations: Self::DEFAULT_PASSWORD_ITERATIONS,
            key_len: Self::DEFAULT_KEY_LEN,
        }
    }
}

/// Check a PBKDF2 iteration count against `1..=MAX_PASSWORD_ITERATIONS`
pub fn check_iterations(iterations: u32) -> Result<(), ConfigError> {
    if iterations == 0 || iterations > ContextConfig::MAX_PASSWORD_ITERATIONS {
        return Err(ConfigError::IterationsOutOfRange {
            iterations,
            max: ContextConfig::MAX_PASSWORD_ITERATIONS,
        });
    }
    Ok(())
}
