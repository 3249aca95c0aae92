//! Role-based access control for contactless smart cards
//!
//! A producer provisions cards, a manager claims key slots on them, and
//! authenticators sharing the manager's material verify cards at access
//! points. Card keys are derived on demand from each role's master secret
//! and the card UID, so no per-card key is ever stored.

pub mod adapters;
pub mod api;
mod context;
pub mod error;
mod logic;
pub mod model;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use context::{BootstrapOptions, Context};
pub use error::{OpenkeyError, OpenkeyResult};

// Re-export public API
pub use api::{kdf, open_context, pbkdf};
pub use logic::MAX_OUTPUT_LEN;
