//! Request/response protocol layer.
//!
//! A small subset of HTTP/1.1: the request line, `Content-Length` and the blank
//! line ending the header block are all that is recognized.
//!
//! # Architecture
//!
//! - **`parser`**: Incremental request extraction from an accumulating buffer
//! - **`request`**: The extracted request (URL and body)
//! - **`dispatch`**: Runs a simulation frame or looks up a static asset
//! - **`assets`**: Static files under a fixed root
//! - **`response`**: Responses with builder pattern
//! - **`writer`**: Serializes and writes responses to the client
//! - **`connection`**: The per-client state machine
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌──────────────┐
//!   ┌──► │ AwaitingTick │ ← Wait for the polling timer (~33 ms)
//!   │    └──────┬───────┘
//!   │           │ Tick (buffered request? skip straight to Dispatching)
//!   │           ▼
//!   │    ┌──────────────┐
//!   │    │   Reading    │ ← One read into the window
//!   │    └──────┬───────┘
//!   │           │ Complete request parsed (else back to AwaitingTick)
//!   │           ▼
//!   │    ┌──────────────┐
//!   │    │ Dispatching  │ ← Build the response
//!   │    └──────┬───────┘
//!   │           ▼
//!   │    ┌──────────────┐
//!   └─── │   Writing    │ ← Send it
//!        └──────────────┘
//!
//!   Any state ──(peer closed / transport error)──► Closed
//! ```
//!
//! # Example
//!
//! ```ignore
//! use wibble::config::Config;
//! use wibble::server::Server;
//! use wibble::sim::{self, JsonSimulation, triangle::Triangle};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = Server::bind(&Config::default()).await?;
//!     server.add_simulation(sim::shared(JsonSimulation::new(Triangle::new())));
//!     server.run().await
//! }
//! ```

pub mod assets;
pub mod connection;
pub mod dispatch;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
