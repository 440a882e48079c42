use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use crate::packet_header::ConnectionId;

/// Application code's view of the protocol: it receives payloads in order and exactly once per
///  connection, and it is notified when connections are established or fail.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Called for every payload in sequence order. A returned reply is sent back over the same
    ///  connection before the next payload of this connection is delivered.
    async fn on_payload(&self, connection_id: ConnectionId, payload: &[u8]) -> Option<Vec<u8>>;

    /// Called when the local sender's SYN is acknowledged
    async fn on_connection_established(&self, connection_id: ConnectionId);

    /// Called exactly once per failing connection, after all of its state was discarded.
    async fn on_connection_failed(&self, connection_id: ConnectionId);
}
