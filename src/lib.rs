//! Wibble - multiplayer simulation server
//!
//! Clients drive frames of a simulation by sending small payloads over a
//! minimal HTTP-like protocol; everything else is served from an asset root.

pub mod config;
pub mod http;
pub mod server;
pub mod sim;
