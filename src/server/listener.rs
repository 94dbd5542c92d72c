use std::fmt::Display;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::task::LocalSet;
use tracing::info;

use crate::config::Config;
use crate::http::assets::AssetRoot;
use crate::http::connection::Connection;
use crate::server::connections::{ConnectionHandle, ConnectionSet};
use crate::sim::SharedSimulation;

/// Back-off after a failed accept, so a persistent error does not spin.
const ACCEPT_RETRY: Duration = Duration::from_millis(100);

/// Accepts clients and binds each to a simulation.
///
/// Everything runs on one thread inside a `LocalSet`; the connection set is
/// only touched between accepts.
pub struct Server {
    listener: TcpListener,
    connections: ConnectionSet,
    simulations: Vec<SharedSimulation>,
    assets: Rc<AssetRoot>,
    tick: Duration,
    next_id: u64,
}

impl Server {
    pub async fn bind(cfg: &Config) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(&cfg.server.listen_addr)
            .await
            .with_context(|| format!("binding {}", cfg.server.listen_addr))?;
        info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            connections: ConnectionSet::new(),
            simulations: Vec::new(),
            assets: Rc::new(AssetRoot::from_config(&cfg.static_files)),
            tick: cfg.server.tick_interval(),
            next_id: 0,
        })
    }

    /// Registers a simulation. Must happen before `run`.
    pub fn add_simulation(&mut self, sim: SharedSimulation) {
        self.simulations.push(sim);
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn connections(&self) -> &ConnectionSet {
        &self.connections
    }

    /// Runs the accept loop on a fresh `LocalSet`.
    pub async fn run(self) -> anyhow::Result<()> {
        LocalSet::new().run_until(self.serve()).await
    }

    /// Runs the accept loop. Must be polled inside a `LocalSet`.
    pub async fn serve(mut self) -> anyhow::Result<()> {
        if self.simulations.is_empty() {
            anyhow::bail!("no simulation registered");
        }

        loop {
            match self.listener.accept().await {
                Ok((socket, peer)) => {
                    if let Err(e) = socket.set_nodelay(true) {
                        tracing::debug!(%peer, error = %e, "Could not set TCP_NODELAY");
                    }
                    self.admit(socket, peer)?;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_RETRY).await;
                }
            }
        }
    }

    /// Reaps closed connections, then starts a connection over `stream`.
    ///
    /// Every connection is bound to the first registered simulation. Must be
    /// called inside a `LocalSet`.
    pub fn admit<S>(&mut self, stream: S, peer: impl Display) -> anyhow::Result<u64>
    where
        S: AsyncRead + AsyncWrite + Unpin + 'static,
    {
        // TODO: route to other simulations once there is a lobby.
        let sim = self
            .simulations
            .first()
            .cloned()
            .context("no simulation registered")?;

        let reaped = self.connections.reap();
        if reaped > 0 {
            tracing::debug!(reaped, live = self.connections.len(), "Reaped closed connections");
        }

        let id = self.next_id;
        self.next_id += 1;

        let conn = Connection::new(id, stream, sim, Rc::clone(&self.assets), self.tick);
        self.connections.insert(ConnectionHandle::spawn(conn));
        info!(conn = id, %peer, live = self.connections.len(), "Accepted connection");

        Ok(id)
    }
}
