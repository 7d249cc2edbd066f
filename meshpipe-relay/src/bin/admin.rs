//! Maintenance commands against the aggregation server
//!
//! meshpipe-admin clear                : wipe the server's relayed data
//! meshpipe-admin delete <message-id>  : remove one relayed message
//!
//! Uses the same configuration as the daemon (relay.yaml / SERVER_URL).

use anyhow::{bail, Context, Result};

use meshpipe_relay::config;
use meshpipe_relay::sink::SinkClient;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let cfg = config::load_config().await;
    let url = cfg
        .server_url
        .context("no server configured - set server_url in relay.yaml or SERVER_URL")?;
    let sink = SinkClient::new(url);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("clear") => {
            sink.clear_messages().await?;
            println!("✓ cleared remote message store at {}", sink.base_url());
        }
        Some("delete") => {
            let id = args
                .get(1)
                .context("usage: meshpipe-admin delete <message-id>")?;
            sink.delete_message(id).await?;
            println!("✓ deleted {id}");
        }
        _ => bail!("usage: meshpipe-admin <clear | delete <message-id>>"),
    }
    Ok(())
}
