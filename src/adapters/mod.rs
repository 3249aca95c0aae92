//! Adapters - concrete implementations of ports (traits)

mod file_store;
mod memory_store;
mod simulated_tag;

pub use file_store::FileKeyStore;
pub use memory_store::MemoryKeyStore;
pub use simulated_tag::{SimulatedTag, TagCall, DEFAULT_KEY_LEN};
