use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::bail;
use bytes::Bytes;
use tokio::time::Instant;
use tracing::{debug, info, trace};
use crate::config::RudpConfig;
use crate::error::RudpError;
use crate::packet_header::{ConnectionId, PacketHeader};
use crate::rtt_estimator::RttEstimator;
use crate::send_socket::SendSocket;
use crate::sequence_id::SequenceId;

/// A message that was sent but is not yet acknowledged
struct PendingItem {
    /// the complete packet including header
    packet: Bytes,
    to: SocketAddr,
    acked: bool,
    /// ticks this item spent as the oldest unacknowledged item
    ticks: u64,
    attempt: u32,
    /// the value of `ticks` at which the next retransmission is due
    next_repeat: u64,
    /// tick counter value when the current attempt was sent
    rtt_start: u64,
}

impl PendingItem {
    fn new(packet: Bytes, to: SocketAddr, rtt_start: u64) -> PendingItem {
        PendingItem {
            packet,
            to,
            acked: false,
            ticks: 0,
            attempt: 0,
            next_repeat: 0,
            rtt_start,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SendStreamEvent {
    /// The SYN was acknowledged, and regular messages can be sent
    Connected,
    /// The peer reported an unknown connection, or retransmission attempts are exhausted. All
    ///  pending messages were discarded.
    Failed,
}

/// The sending half of a connection: It numbers outbound messages, keeps them until they are
///  acknowledged, and retransmits the oldest unacknowledged message with a spacing that grows
///  with the number of attempts and the smoothed round trip time.
///
/// NB: Only the oldest unacknowledged message is ever retransmitted. Later messages are covered
///  by the receiver buffering out-of-order arrivals.
pub struct SendStream {
    config: Arc<RudpConfig>,
    connection_id: ConnectionId,
    send_socket: Arc<dyn SendSocket>,

    /// the sequence id of the most recently sent message
    cursor: SequenceId,
    oldest_unacked: SequenceId,
    connected: bool,
    rtt: RttEstimator,
    total_ticks: u64,
    ring: Vec<Option<PendingItem>>,
    last_activity: Instant,
}

impl SendStream {
    pub fn new(config: Arc<RudpConfig>, connection_id: ConnectionId, send_socket: Arc<dyn SendSocket>) -> SendStream {
        let rtt = RttEstimator::new(&config);
        SendStream {
            config,
            connection_id,
            send_socket,
            cursor: SequenceId::SYN,
            oldest_unacked: SequenceId::SYN,
            connected: false,
            rtt,
            total_ticks: 0,
            ring: Self::empty_ring(),
            last_activity: Instant::now(),
        }
    }

    fn empty_ring() -> Vec<Option<PendingItem>> {
        (0..SequenceId::RING_SIZE).map(|_| None).collect()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// true while a SYN is waiting for its ack
    pub fn is_handshaking(&self) -> bool {
        !self.connected && self.ring[SequenceId::SYN.slot()].is_some()
    }

    pub fn srtt(&self) -> f64 {
        self.rtt.srtt()
    }

    pub fn num_unacknowledged(&self) -> usize {
        self.ring.iter()
            .filter(|item| item.is_some())
            .count()
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// (Re)initializes the stream, discarding all pending messages, and sends a SYN. Regular
    ///  messages can be sent after the SYN is acknowledged.
    pub async fn connect(&mut self, to: SocketAddr) {
        debug!("connecting {} to {:?}", self.connection_id, to);

        self.reset();
        self.last_activity = Instant::now();

        let packet = PacketHeader::new(SequenceId::SYN, self.connection_id)
            .data_packet(&[self.config.syn_placeholder]);
        self.ring[SequenceId::SYN.slot()] = Some(PendingItem::new(packet.clone(), to, self.total_ticks));

        trace!("sending SYN for {} to {:?}", self.connection_id, to);
        self.send_socket.do_send_packet(to, &packet).await;
    }

    fn reset(&mut self) {
        self.cursor = SequenceId::SYN;
        self.oldest_unacked = SequenceId::SYN;
        self.connected = false;
        self.rtt.reset();
        self.total_ticks = 0;
        self.clear_ring();
    }

    fn clear_ring(&mut self) {
        for item in self.ring.iter_mut() {
            *item = None;
        }
    }

    pub async fn send(&mut self, payload: &[u8], to: SocketAddr) -> anyhow::Result<()> {
        if !self.connected {
            bail!(RudpError::NotConnected(self.connection_id));
        }

        let sequence_id = self.cursor.next();
        if self.ring[sequence_id.slot()].is_some() {
            debug!("no free sequence id for {}", self.connection_id);
            bail!(RudpError::SendBufferFull(self.connection_id));
        }
        self.cursor = sequence_id;
        self.last_activity = Instant::now();

        let packet = PacketHeader::new(sequence_id, self.connection_id)
            .data_packet(payload);
        self.ring[sequence_id.slot()] = Some(PendingItem::new(packet.clone(), to, self.total_ticks));

        trace!("sending message #{} for {} to {:?}", sequence_id, self.connection_id, to);
        self.send_socket.do_send_packet(to, &packet).await;
        Ok(())
    }

    pub fn on_ack(&mut self, sequence_id: SequenceId) -> Option<SendStreamEvent> {
        trace!("received ack #{} for {}", sequence_id, self.connection_id);
        self.last_activity = Instant::now();

        let is_oldest = sequence_id == self.oldest_unacked;
        if let Some(item) = self.ring[sequence_id.slot()].as_mut() {
            item.acked = true;
            if is_oldest {
                let sample = self.total_ticks.saturating_sub(item.rtt_start) + 1;
                self.rtt.on_sample(sample);
            }
        }
        if is_oldest {
            self.release_acknowledged();
        }

        if sequence_id == SequenceId::SYN {
            if !self.connected {
                info!("sender for {} connected", self.connection_id);
                self.connected = true;
                return Some(SendStreamEvent::Connected);
            }
        }
        else if sequence_id == SequenceId::ERROR_ACK {
            info!("peer does not know connection {} - failing", self.connection_id);
            self.fail();
            return Some(SendStreamEvent::Failed);
        }
        None
    }

    /// frees the contiguous run of acknowledged items starting at the oldest one
    fn release_acknowledged(&mut self) {
        while let Some(item) = &self.ring[self.oldest_unacked.slot()] {
            if !item.acked {
                break;
            }
            self.ring[self.oldest_unacked.slot()] = None;
            self.oldest_unacked = self.oldest_unacked.next();
        }
    }

    fn fail(&mut self) {
        self.connected = false;
        self.clear_ring();
    }

    /// Called once per tick. This checks if the oldest unacknowledged message is due for
    ///  retransmission, and fails the stream once it was sent `max_attempts + 1` times in total.
    pub async fn trigger(&mut self) -> Option<SendStreamEvent> {
        self.total_ticks += 1;

        let max_attempts = self.config.max_attempts;
        let item = match self.ring[self.oldest_unacked.slot()].as_mut() {
            Some(item) if !item.acked => item,
            _ => return None,
        };

        if item.attempt > max_attempts {
            info!("message #{} for {} was not acknowledged after {} attempts - failing", self.oldest_unacked, self.connection_id, max_attempts);
            self.fail();
            return Some(SendStreamEvent::Failed);
        }

        let mut retransmit = None;
        if item.ticks == item.next_repeat {
            item.attempt += 1;
            item.next_repeat += (self.config.assurance_coefficient * self.rtt.srtt() * item.attempt as f64) as u64;
            if item.attempt > 1 {
                item.rtt_start = self.total_ticks;
                retransmit = Some((item.to, item.packet.clone()));
            }
        }
        item.ticks += 1;

        if let Some((to, packet)) = retransmit {
            trace!("retransmitting message #{} for {} to {:?}", self.oldest_unacked, self.connection_id, to);
            self.send_socket.do_send_packet(to, &packet).await;
        }
        None
    }
}
