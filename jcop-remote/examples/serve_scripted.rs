//! Serve a scripted card
//!
//! Answers `90 00` to the first 16 commands, then fails every command after.
//! Run with `RUST_LOG=debug` to watch the traffic.

use jcop_remote::{RemoteServer, ScriptedCard, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("JCOP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(jcop_remote::DEFAULT_PORT);

    let mut card = ScriptedCard::new(vec![0x3B, 0x8A, 0x80, 0x01, 0x4A, 0x43, 0x4F, 0x50]);
    for _ in 0..16 {
        card = card.respond(vec![0x90, 0x00]);
    }

    let server = RemoteServer::bind(ServerConfig::new("127.0.0.1", port)).await?;
    let handle = server.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.stop();
        }
    });

    println!("Serving scripted card on {}", server.local_addr()?);
    server.run(card).await?;
    println!("Stopped");

    Ok(())
}
