mod application;
mod card;
mod config;
mod material;
mod role;
mod secret;
mod slot;
mod status;

pub use application::{Access, ApplicationId, FileAccess, FileId};
pub use card::{CardId, CardIdError, CardName, CardNameError};
pub use config::{check_iterations, ContextConfig};
pub use material::{ManagerMaterial, OwnerRecord, ProducerMaterial};
pub use role::Role;
pub use secret::{DerivedKey, MasterSecret, Password};
pub use slot::{KeySlot, SlotError};
pub use status::{Operation, StatusCode};
