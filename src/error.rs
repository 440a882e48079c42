use crate::packet_header::ConnectionId;

/// Error conditions that callers may want to distinguish. They are returned wrapped in
///  `anyhow::Error`, so use `downcast_ref::<RudpError>()` to inspect them.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum RudpError {
    /// The sender's SYN was not acknowledged (yet), or the connection failed.
    #[error("connection {0} is not connected")]
    NotConnected(ConnectionId),

    /// No packet was received for this connection, and it was not explicitly connected.
    #[error("no address known for connection {0}")]
    AddressNotFound(ConnectionId),

    /// Empty payloads are indistinguishable from acks on the wire.
    #[error("empty payload")]
    EmptyPayload,

    #[error("payload of {len} bytes exceeds the maximum of {max} bytes")]
    PayloadTooLarge { len: usize, max: usize },

    /// All sequence ids of the ring are taken by unacknowledged messages.
    #[error("send buffer for connection {0} is full")]
    SendBufferFull(ConnectionId),

    #[error("malformed packet of length {len}")]
    MalformedPacket { len: usize },
}
