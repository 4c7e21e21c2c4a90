//! HTTP long-polling chat broker.
//!
//! Holds each client's poll open until a message arrives or the renewal
//! timeout elapses, and fans every accepted message out to all clients.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin server
//! cargo run --bin server -- --host 0.0.0.0 --port 3000
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use comet_chat::{
    broker::{Broker, BrokerConfig},
    common::logger::setup_logger,
    domain::{MessageSink, MessageStore},
    infrastructure::FileMessageSink,
    server::run_server,
};

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "HTTP long-polling chat broker", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8124")]
    port: u16,

    /// Seconds a poll is held open before being renewed with an empty reply
    #[arg(long, default_value = "50")]
    poll_timeout: u64,

    /// Append-only message log file, replayed into history at startup
    #[arg(long, default_value = "messages.log")]
    message_file: PathBuf,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    // Initialize dependencies in order:
    // 1. Persistence sink, recovering prior messages into the history
    // 2. Broker owning the history and all client slots
    // 3. Server

    let sink = Arc::new(FileMessageSink::new(args.message_file.clone()));
    let history = MessageStore::recover(sink.recover_all().await);

    let config = BrokerConfig {
        poll_timeout: Duration::from_secs(args.poll_timeout),
        ..BrokerConfig::default()
    };
    let broker = Arc::new(Broker::new(sink, config, history));

    if let Err(e) = run_server(args.host, args.port, broker).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
