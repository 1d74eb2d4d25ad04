mod registry;
mod server;

pub use registry::{Outbox, Registry};
pub use server::RelayServer;
