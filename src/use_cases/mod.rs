//! Use cases (orchestration)
//!
//! Each card lifecycle operation drives a `TagSession` through a fixed
//! sequence of steps. A failing step is reported with its status code and
//! translated against the transport faults seen during the operation.

mod authenticate_card;
mod channel;
mod create_card;
mod layout;
mod own_card;
mod recreate_card;

pub use authenticate_card::authenticate_card;
pub use create_card::create_card;
pub use own_card::own_card;
pub use recreate_card::recreate_card;
