//! Ports (traits) for the collaborators of the protocol core
//!
//! The core depends on these abstractions, not on a concrete reader driver
//! or storage backend. `TagSession` stands in for the contactless transport,
//! `KeyStore` for wherever role key material lives.

mod key_store;
mod tag_session;

pub use key_store::KeyStore;
pub use tag_session::{FaultKind, TagResult, TagSession, TransportFault};
