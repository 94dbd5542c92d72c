//! Listening endpoint and the set of live connections.

pub mod connections;
pub mod listener;

pub use connections::{ConnectionHandle, ConnectionSet};
pub use listener::Server;
