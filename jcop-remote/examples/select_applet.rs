//! Connect to a remote terminal and select an applet

use jcop_remote::{IsoApdu, RemoteTransport};

#[tokio::main]
async fn main() -> jcop_remote::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let host = std::env::var("JCOP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

    let mut card = RemoteTransport::new(host, jcop_remote::DEFAULT_PORT);
    card.connect().await?;

    if let Some(atr) = card.card_atr() {
        println!("ATR: {}", atr);
    }

    // Card manager AID
    let select = IsoApdu::new(0xA4)
        .p1(0x04)
        .data(vec![0xA0, 0x00, 0x00, 0x01, 0x51, 0x00, 0x00, 0x00]);

    match card.iso_apdu(&select).await {
        Ok(fci) => println!("FCI: {}", hex::encode_upper(&fci)),
        Err(e) => match e.status_word() {
            Some(sw) => println!("Card answered {}", sw),
            None => return Err(e),
        },
    }

    card.disconnect().await?;

    Ok(())
}
