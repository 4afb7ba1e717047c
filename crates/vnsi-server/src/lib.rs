//! vnsi-server
//!
//! Multi-client async TCP server for the VNSI connection engine.

pub mod config;
pub mod error;
pub mod types;
pub mod status;
pub mod server;

// internal, not re-exported
mod client;

pub use config::{Cli, Config};
pub use error::{ServerError, ServerResult};
pub use server::Server;
pub use status::StatusHub;
