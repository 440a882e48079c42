//! Reliable, in-order delivery of datagrams over UDP, with an overhead of 5 bytes per message.
//!
//! The protocol works on *connections*, identified by a 32 bit [packet_header::ConnectionId]
//!  that is independent of the peers' network addresses. Each connection has two directions, and
//!  each direction is handled by a [send_stream::SendStream] on one side and a
//!  [receive_stream::ReceiveStream] on the other side. Messages are numbered by a single byte
//!  [sequence_id::SequenceId] which wraps around.
//!
//! ```ascii
//! 0: sequence id (u8)
//! 1: connection id (u32 BE)
//! 5: payload (at least one byte - a packet without payload is an ack)
//! ```
//!
//! Two sequence ids are reserved: `0` (SYN) establishes a direction of a connection, and `1`
//!  (ERROR ACK) tells a sender that the receiver does not know its connection.
//!
//! The receiver acknowledges every message it receives, including duplicates, and delivers
//!  messages to the application strictly in sequence order, buffering messages that arrive
//!  ahead of a missing one. The sender keeps every message until it is acknowledged and
//!  retransmits the oldest unacknowledged message with a spacing based on the smoothed round
//!  trip time and the number of attempts so far.
//!
//! A connection fails if a message is not acknowledged after `max_attempts` retransmissions, if too
//!  many messages arrive while one is missing, if the peer does not know the connection, or if it
//!  is idle for too long. All state of a failed connection is discarded, and the application is
//!  notified through [connection_handler::ConnectionHandler::on_connection_failed]. A new
//!  handshake is required to use it again.
//!
//! [end_point::EndPoint] is the protocol's entry point, and [server::UdpServer] wires it to
//!  a UDP socket.

pub mod config;
pub mod connection_handler;
pub mod end_point;
pub mod error;
pub mod flood_detector;
pub mod packet_header;
pub mod receive_stream;
pub mod rtt_estimator;
pub mod send_socket;
pub mod send_stream;
pub mod sequence_id;
pub mod server;

#[cfg(test)]
pub mod test_util;
