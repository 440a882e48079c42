use std::net::SocketAddr;
use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use tokio::net::UdpSocket;
use tracing::{error, trace};

/// The raw, unreliable datagram transport. Sending is fire-and-forget: errors are logged by
///  implementations and not reported to callers, and retransmission takes care of lost packets.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SendSocket: Send + Sync + 'static {
    async fn do_send_packet(&self, to: SocketAddr, packet_buf: &[u8]);
}

#[async_trait]
impl SendSocket for UdpSocket {
    async fn do_send_packet(&self, to: SocketAddr, packet_buf: &[u8]) {
        trace!("sending packet to {:?}: {:?}", to, packet_buf);
        if let Err(e) = self.send_to(packet_buf, to).await {
            error!("error sending UDP packet to {:?}: {}", to, e);
        }
    }
}

