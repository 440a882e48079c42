use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use crate::config::RudpConfig;
use crate::packet_header::{ConnectionId, PacketHeader};
use crate::send_socket::SendSocket;
use crate::sequence_id::SequenceId;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ReceiveOutcome {
    /// nothing to report to the application
    Nothing,
    /// A SYN (re)initialized the stream. The peer's address is the natural target for the
    ///  reverse direction of the connection. `new_session` is set if the stream had delivered
    ///  messages before the SYN: a peer sends data only after its SYN was acknowledged, so this
    ///  SYN cannot be a retransmission and the peer has started over.
    Connected { peer_addr: SocketAddr, new_session: bool },
    /// Payloads that are now deliverable, in sequence order
    Deliver(Vec<Vec<u8>>),
    /// Too many messages arrived while waiting for a missing one. All buffered messages were
    ///  discarded.
    Failed,
}

/// The receiving half of a connection. It acknowledges every message, releases messages to the
///  application strictly in sequence order, and buffers messages that arrive ahead of a gap.
pub struct ReceiveStream {
    config: Arc<RudpConfig>,
    connection_id: ConnectionId,
    send_socket: Arc<dyn SendSocket>,

    expected: SequenceId,
    connected: bool,
    /// number of messages that arrived ahead of `expected` since the last in-order message
    num_out_of_order: usize,
    /// true if a message was delivered since the last SYN
    delivered_any: bool,
    ring: Vec<Option<Vec<u8>>>,
    last_activity: Instant,
}

impl ReceiveStream {
    pub fn new(config: Arc<RudpConfig>, connection_id: ConnectionId, send_socket: Arc<dyn SendSocket>) -> ReceiveStream {
        ReceiveStream {
            config,
            connection_id,
            send_socket,
            expected: SequenceId::SYN.next(),
            connected: false,
            num_out_of_order: 0,
            delivered_any: false,
            ring: Self::empty_ring(),
            last_activity: Instant::now(),
        }
    }

    fn empty_ring() -> Vec<Option<Vec<u8>>> {
        (0..SequenceId::RING_SIZE).map(|_| None).collect()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn num_out_of_order(&self) -> usize {
        self.num_out_of_order
    }

    pub fn num_buffered(&self) -> usize {
        self.ring.iter()
            .filter(|item| item.is_some())
            .count()
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    fn clear_ring(&mut self) {
        for item in self.ring.iter_mut() {
            *item = None;
        }
    }

    async fn send_ack(&self, sequence_id: SequenceId, to: SocketAddr) {
        trace!("sending ack #{} for {} to {:?}", sequence_id, self.connection_id, to);
        let packet = PacketHeader::new(sequence_id, self.connection_id)
            .ack_packet();
        self.send_socket.do_send_packet(to, &packet).await;
    }

    pub async fn on_packet(&mut self, sequence_id: SequenceId, payload: &[u8], from: SocketAddr) -> ReceiveOutcome {
        self.last_activity = Instant::now();

        if sequence_id == SequenceId::SYN {
            let new_session = self.connected && self.delivered_any;
            self.delivered_any = false;
            self.clear_ring();
            self.expected = SequenceId::SYN.next();
            self.num_out_of_order = 0;
            self.connected = true;

            self.send_ack(SequenceId::SYN, from).await;
            info!("receiver for {} connected from {:?}", self.connection_id, from);
            return ReceiveOutcome::Connected { peer_addr: from, new_session };
        }

        if sequence_id == SequenceId::ERROR_ACK {
            warn!("received data with reserved sequence id #{} for {} from {:?} - dropping", sequence_id, self.connection_id, from);
            return ReceiveOutcome::Nothing;
        }

        if !self.connected {
            debug!("received message #{} for unconnected {} from {:?} - replying with error ack", sequence_id, self.connection_id, from);
            self.send_ack(SequenceId::ERROR_ACK, from).await;
            return ReceiveOutcome::Nothing;
        }

        // duplicates are acknowledged as well, the original ack may have been lost
        self.send_ack(sequence_id, from).await;

        if sequence_id == self.expected {
            let mut deliverable = vec![payload.to_vec()];
            self.expected = self.expected.next();
            self.num_out_of_order = 0;
            self.delivered_any = true;

            while let Some(buffered) = self.ring[self.expected.slot()].take() {
                deliverable.push(buffered);
                self.expected = self.expected.next();
            }
            ReceiveOutcome::Deliver(deliverable)
        }
        else if sequence_id.is_after(self.expected) {
            self.num_out_of_order += 1;
            if self.num_out_of_order > self.config.max_pending {
                info!("more than {} messages out of order for {} - failing", self.config.max_pending, self.connection_id);
                self.connected = false;
                self.num_out_of_order = 0;
                self.clear_ring();
                return ReceiveOutcome::Failed;
            }

            trace!("buffering message #{} for {}, waiting for #{}", sequence_id, self.connection_id, self.expected);
            self.ring[sequence_id.slot()] = Some(payload.to_vec());
            ReceiveOutcome::Nothing
        }
        else {
            debug!("duplicate message #{} for {} - dropping", sequence_id, self.connection_id);
            ReceiveOutcome::Nothing
        }
    }
}
