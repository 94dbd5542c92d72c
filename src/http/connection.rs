use std::cell::Cell;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use crate::http::assets::AssetRoot;
use crate::http::dispatch::handle_request;
use crate::http::parser::RequestBuffer;
use crate::http::request::Request;
use crate::http::writer::ResponseWriter;
use crate::sim::SharedSimulation;

/// Size of the fixed read window.
pub const READ_WINDOW: usize = 2048;

/// Where a connection is in its frame cycle.
#[derive(Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No outstanding operation
    Idle,
    /// Waiting for the polling timer
    AwaitingTick,
    /// A read is due
    Reading,
    /// A complete request is ready
    Dispatching(Request),
    /// The output buffer holds a response to send
    Writing,
    Closed,
}

/// Shared open/closed flag of one connection.
///
/// The connection clears it when it closes; the server polls it when reaping.
#[derive(Debug, Clone)]
pub struct ConnectionStatus(Rc<Cell<bool>>);

impl ConnectionStatus {
    fn new() -> Self {
        Self(Rc::new(Cell::new(true)))
    }

    pub fn is_open(&self) -> bool {
        self.0.get()
    }

    fn close(&self) {
        self.0.set(false);
    }
}

/// One client endpoint driving frames of one simulation.
///
/// New reads are gated by a periodic timer, so a client is serviced at most
/// once per tick no matter how fast it sends.
pub struct Connection<S> {
    id: u64,
    stream: S,
    window: [u8; READ_WINDOW],
    pending: RequestBuffer,
    writer: ResponseWriter,
    ticker: Interval,
    simulation: SharedSimulation,
    assets: Rc<AssetRoot>,
    status: ConnectionStatus,
    state: ConnectionState,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an accepted stream. The first read happens one tick from now.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        id: u64,
        stream: S,
        simulation: SharedSimulation,
        assets: Rc<AssetRoot>,
        tick: Duration,
    ) -> Self {
        let mut ticker = interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            id,
            stream,
            window: [0u8; READ_WINDOW],
            pending: RequestBuffer::new(),
            writer: ResponseWriter::new(),
            ticker,
            simulation,
            assets,
            status: ConnectionStatus::new(),
            state: ConnectionState::AwaitingTick,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.clone()
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Bytes received but not yet consumed by a request.
    pub fn pending(&self) -> &[u8] {
        self.pending.as_bytes()
    }

    /// Drives the connection until it closes.
    pub async fn run(mut self) {
        while self.step().await {}
    }

    /// Performs one state transition. Returns `false` once closed.
    pub async fn step(&mut self) -> bool {
        let next = match std::mem::replace(&mut self.state, ConnectionState::Idle) {
            ConnectionState::Idle => ConnectionState::AwaitingTick,

            ConnectionState::AwaitingTick => {
                self.ticker.tick().await;
                // A pipelined request may already be buffered.
                match self.pending.next_request() {
                    Some(req) => ConnectionState::Dispatching(req),
                    None => ConnectionState::Reading,
                }
            }

            ConnectionState::Reading => self.read().await,

            ConnectionState::Dispatching(req) => self.dispatch(&req),

            ConnectionState::Writing => self.write().await,

            ConnectionState::Closed => {
                self.status.close();
                self.state = ConnectionState::Closed;
                return false;
            }
        };

        if matches!(next, ConnectionState::Closed) {
            self.status.close();
        }
        self.state = next;
        true
    }

    async fn read(&mut self) -> ConnectionState {
        match self.stream.read(&mut self.window).await {
            Ok(0) => {
                tracing::info!(conn = self.id, "Client closed connection");
                self.shutdown().await;
                ConnectionState::Closed
            }

            Ok(n) => {
                tracing::debug!(conn = self.id, bytes = n, "Read");
                self.pending.extend(&self.window[..n]);

                match self.pending.next_request() {
                    Some(req) => ConnectionState::Dispatching(req),
                    None => ConnectionState::AwaitingTick,
                }
            }

            Err(e) => self.transport_error("read", e).await,
        }
    }

    fn dispatch(&mut self, req: &Request) -> ConnectionState {
        tracing::debug!(
            conn = self.id,
            method = req.method.map(|m| m.as_str()),
            url = %req.url,
            body = req.body.len(),
            "Dispatching request"
        );

        let response = {
            let mut sim = self.simulation.borrow_mut();
            handle_request(req, &mut *sim, &self.assets)
        };

        self.writer.load(&response);
        ConnectionState::Writing
    }

    async fn write(&mut self) -> ConnectionState {
        match self.writer.write_to_stream(&mut self.stream).await {
            Ok(()) => ConnectionState::AwaitingTick,
            Err(e) => self.transport_error("write", e).await,
        }
    }

    /// Aborts mean the peer is already gone; anything else is closed locally.
    async fn transport_error(&mut self, op: &'static str, e: io::Error) -> ConnectionState {
        if is_abort(&e) {
            tracing::info!(conn = self.id, op, error = %e, "Connection aborted");
        } else {
            tracing::warn!(conn = self.id, op, error = %e, "Transport error, closing");
            self.shutdown().await;
        }
        ConnectionState::Closed
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!(conn = self.id, error = %e, "Shutdown failed");
        }
    }
}

impl<S> Drop for Connection<S> {
    fn drop(&mut self) {
        self.status.close();
    }
}

/// Errors signalling that the remote end has torn the connection down.
pub fn is_abort(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset
    )
}
