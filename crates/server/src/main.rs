//! Ingest Server - HTTP file-upload API
//!
//! Loads configuration from `.env`, `server.*` and `INGEST_SERVER__*`
//! variables, then serves until shut down.

use server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load()?;

    server::start_server(config).await?;

    Ok(())
}
