//! Expose the card in the first PC/SC reader
//!
//! `cargo run --example serve_pcsc --features pcsc`

use jcop_remote::pcsc::PcscCard;
use jcop_remote::{RemoteServer, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let bind = std::env::var("JCOP_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());

    let card = PcscCard::open_first()?;
    let server = RemoteServer::bind(ServerConfig::new(bind, jcop_remote::DEFAULT_PORT)).await?;

    server.run(card).await?;

    Ok(())
}
