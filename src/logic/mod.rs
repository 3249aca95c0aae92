mod kdf;
mod primitives;
mod translate;

pub use kdf::{derive, derive_with_password, kdf, pbkdf, MAX_OUTPUT_LEN};
pub use primitives::{ensure_initialized, fill_random};
pub use translate::translate;
