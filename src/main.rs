use wibble::config::Config;
use wibble::server::Server;
use wibble::sim::{self, JsonSimulation, triangle::Triangle};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;

    let mut server = Server::bind(&cfg).await?;
    server.add_simulation(sim::shared(JsonSimulation::new(Triangle::new())));

    tokio::select! {
        res = server.run() => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
