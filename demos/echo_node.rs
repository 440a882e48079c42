use clap::Parser;
use rudp::config::RudpConfig;
use rudp::connection_handler::ConnectionHandler;
use rudp::packet_header::ConnectionId;
use rudp::server::UdpServer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use tokio::time::interval;
use tracing::{info, warn, Level};

/// A node that echoes every message it receives. With `--peer`, it connects to another node and
///  sends it a numbered message every second.
#[derive(Parser)]
struct Args {
    bind_address: String,

    #[clap(long)]
    peer: Option<String>,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

struct EchoHandler {
    echo: bool,
}

#[async_trait]
impl ConnectionHandler for EchoHandler {
    async fn on_payload(&self, connection_id: ConnectionId, payload: &[u8]) -> Option<Vec<u8>> {
        info!("{}: received {:?}", connection_id, String::from_utf8_lossy(payload));
        if self.echo {
            Some(payload.to_vec())
        }
        else {
            None
        }
    }

    async fn on_connection_established(&self, connection_id: ConnectionId) {
        info!("{}: connection established", connection_id);
    }

    async fn on_connection_failed(&self, connection_id: ConnectionId) {
        warn!("{}: connection failed", connection_id);
    }
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    let config = RudpConfig {
        self_addr: args.bind_address.parse()?,
        ..Default::default()
    };

    let peer: Option<SocketAddr> = match args.peer {
        Some(peer) => Some(peer.parse()?),
        None => None,
    };

    let server = UdpServer::bind(config, Arc::new(EchoHandler { echo: peer.is_none() })).await?;
    info!("listening on {:?}", server.local_addr());

    let mut stats_interval = interval(Duration::from_secs(1));
    match peer {
        Some(peer) => {
            let connection_id = ConnectionId::random();
            server.end_point().connect(connection_id, peer).await;

            let mut counter = 0u64;
            loop {
                stats_interval.tick().await;
                if !server.end_point().is_connected(connection_id).await {
                    continue;
                }
                counter += 1;
                if let Err(e) = server.end_point().send(connection_id, format!("message #{}", counter).as_bytes()).await {
                    warn!("error sending: {}", e);
                }
            }
        }
        None => {
            loop {
                stats_interval.tick().await;
                info!("{} requests per second, {} send streams, {} receive streams",
                    server.requests_per_second(),
                    server.end_point().num_send_streams().await,
                    server.end_point().num_receive_streams().await,
                );
            }
        }
    }
}
