//! HTTP surface for Portier

pub mod middleware;
pub mod routes;
pub mod server;

pub use middleware::{basic_auth, AuthState};
pub use server::PortierServer;
