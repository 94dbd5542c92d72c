use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;

use crate::http::connection::{Connection, ConnectionStatus};

/// A live connection running as a task on the local set.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: u64,
    status: ConnectionStatus,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    /// Starts `conn` on the current `LocalSet`.
    pub fn spawn<S>(conn: Connection<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + 'static,
    {
        let id = conn.id();
        let status = conn.status();
        let task = tokio::task::spawn_local(conn.run());
        Self { id, status, task }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }
}

/// Connections owned by the server. Order carries no meaning.
#[derive(Debug, Default)]
pub struct ConnectionSet {
    live: Vec<ConnectionHandle>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: ConnectionHandle) {
        self.live.push(handle);
    }

    /// Drops every closed connection; returns how many went.
    pub fn reap(&mut self) -> usize {
        let before = self.live.len();
        self.live.retain(|handle| {
            if handle.is_open() {
                return true;
            }
            handle.task.abort();
            false
        });
        before - self.live.len()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.live.iter().map(ConnectionHandle::id)
    }
}
