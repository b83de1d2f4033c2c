//! SSH server module.

mod greeter;
mod handler;
mod server;
mod session;

pub use handler::SshHandler;
pub use server::TunnelServer;
