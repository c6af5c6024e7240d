//! Wire-level JSON shapes for the client, the primary backend and the secondary backend

mod envelope;
mod inbound;
mod openai;

pub use envelope::*;
pub use inbound::*;
pub use openai::*;
