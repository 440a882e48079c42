use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use anyhow::bail;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::select;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use crate::config::RudpConfig;
use crate::connection_handler::ConnectionHandler;
use crate::error::RudpError;
use crate::packet_header::{ConnectionId, Packet, PacketHeader};
use crate::receive_stream::{ReceiveOutcome, ReceiveStream};
use crate::send_socket::SendSocket;
use crate::send_stream::{SendStream, SendStreamEvent};

/// EndPoint is where the parts of the protocol come together. It keeps track of the send and
///  receive streams of all connections and of the peers' addresses, dispatches incoming packets
///  to their streams, and drives retransmission and the sweep of idle connections.
///
/// Lock order is stream before map: a stream's lock may be held while a map is locked, but a map's
///  lock is never held while waiting for a stream. A receive stream's lock may be held while
///  locking a send stream (for replies and the reverse handshake), never the other way around.
pub struct EndPoint {
    config: Arc<RudpConfig>,
    send_socket: Arc<dyn SendSocket>,
    handler: Arc<dyn ConnectionHandler>,
    send_streams: RwLock<FxHashMap<ConnectionId, Arc<Mutex<SendStream>>>>,
    receive_streams: RwLock<FxHashMap<ConnectionId, Arc<Mutex<ReceiveStream>>>>,
    addresses: RwLock<FxHashMap<ConnectionId, SocketAddr>>,
    periodic_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Drop for EndPoint {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl EndPoint {
    pub fn new(config: Arc<RudpConfig>, send_socket: Arc<dyn SendSocket>, handler: Arc<dyn ConnectionHandler>) -> EndPoint {
        EndPoint {
            config,
            send_socket,
            handler,
            send_streams: Default::default(),
            receive_streams: Default::default(),
            addresses: Default::default(),
            periodic_task: Default::default(),
        }
    }

    /// Spawns the loop that calls [EndPoint::on_tick] every `tick_interval` and
    ///  [EndPoint::sweep_idle] every `idle_sweep_interval`. The loop ends when the EndPoint
    ///  is dropped or shut down.
    pub fn spawn_periodic_tasks(self: &Arc<Self>) {
        info!("starting periodic tasks with a tick interval of {:?}", self.config.tick_interval);
        let handle = tokio::spawn(Self::do_loop(self.config.clone(), Arc::downgrade(self)));

        if let Ok(mut periodic_task) = self.periodic_task.lock() {
            if let Some(previous) = periodic_task.replace(handle) {
                previous.abort();
            }
        }
    }

    async fn do_loop(config: Arc<RudpConfig>, end_point: Weak<EndPoint>) {
        let mut tick_interval = interval(config.tick_interval);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sweep_interval = interval(config.idle_sweep_interval);
        sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                _ = tick_interval.tick() => {
                    match end_point.upgrade() {
                        Some(end_point) => end_point.on_tick().await,
                        None => break,
                    }
                }
                _ = sweep_interval.tick() => {
                    match end_point.upgrade() {
                        Some(end_point) => end_point.sweep_idle().await,
                        None => break,
                    }
                }
            }
        }
        debug!("periodic tasks ended");
    }

    pub fn shutdown(&self) {
        if let Ok(mut periodic_task) = self.periodic_task.lock() {
            if let Some(handle) = periodic_task.take() {
                info!("stopping periodic tasks");
                handle.abort();
            }
        }
    }

    /// Establishes (or re-establishes) the sending direction of a connection to a peer. Messages
    ///  can be sent after the peer acknowledged, which is reported by
    ///  [ConnectionHandler::on_connection_established].
    pub async fn connect(&self, connection_id: ConnectionId, to: SocketAddr) {
        self.addresses.write().await
            .insert(connection_id, to);

        let send_stream = self.get_or_create_send_stream(connection_id).await;
        send_stream.lock().await
            .connect(to).await;
    }

    pub async fn send(&self, connection_id: ConnectionId, payload: &[u8]) -> anyhow::Result<()> {
        if payload.is_empty() {
            bail!(RudpError::EmptyPayload);
        }
        let max = self.config.max_payload_len();
        if payload.len() > max {
            bail!(RudpError::PayloadTooLarge { len: payload.len(), max });
        }

        let addr = match self.peer_addr(connection_id).await {
            Some(addr) => addr,
            None => bail!(RudpError::AddressNotFound(connection_id)),
        };
        let send_stream = match self.send_streams.read().await.get(&connection_id) {
            Some(send_stream) => send_stream.clone(),
            None => bail!(RudpError::NotConnected(connection_id)),
        };

        let result = send_stream.lock().await
            .send(payload, addr).await;
        result
    }

    /// Dispatches a received datagram. Every well-formed packet updates the peer address for its
    ///  connection, so peers can change their address without reconnecting.
    pub async fn on_received(&self, packet_buf: &[u8], from: SocketAddr) -> anyhow::Result<()> {
        let packet = match Packet::parse(packet_buf) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("received malformed packet from {:?}: {:?} - dropping", from, packet_buf);
                return Err(e);
            }
        };
        trace!("received packet from {:?}: {:?}", from, packet);

        let connection_id = packet.header().connection_id;
        self.addresses.write().await
            .insert(connection_id, from);

        match packet {
            Packet::Ack(header) => self.on_ack(header).await,
            Packet::Data(header, payload) => self.on_data(header, payload, from).await,
        }
        Ok(())
    }

    async fn on_ack(&self, header: PacketHeader) {
        let send_stream = match self.send_streams.read().await.get(&header.connection_id) {
            Some(send_stream) => send_stream.clone(),
            None => {
                debug!("received ack #{} for unknown connection {} - dropping", header.sequence_id, header.connection_id);
                return;
            }
        };

        let event = send_stream.lock().await
            .on_ack(header.sequence_id);
        match event {
            Some(SendStreamEvent::Connected) => {
                self.handler.on_connection_established(header.connection_id).await;
            }
            Some(SendStreamEvent::Failed) => {
                self.connection_failed(header.connection_id).await;
            }
            None => {}
        }
    }

    async fn on_data(&self, header: PacketHeader, payload: &[u8], from: SocketAddr) {
        let connection_id = header.connection_id;
        let receive_stream = self.get_or_create_receive_stream(connection_id).await;

        let mut receive_stream = receive_stream.lock().await;
        match receive_stream.on_packet(header.sequence_id, payload, from).await {
            ReceiveOutcome::Nothing => {}
            ReceiveOutcome::Connected { peer_addr, new_session } => {
                self.on_receiver_connected(connection_id, peer_addr, new_session).await;
            }
            ReceiveOutcome::Deliver(payloads) => {
                // replies go out under the receive stream's lock, in payload order
                for payload in payloads {
                    if let Some(reply) = self.handler.on_payload(connection_id, &payload).await {
                        if let Err(e) = self.send(connection_id, &reply).await {
                            warn!("could not send reply on {}: {}", connection_id, e);
                        }
                    }
                }
            }
            ReceiveOutcome::Failed => {
                drop(receive_stream);
                self.connection_failed(connection_id).await;
            }
        }
    }

    /// A peer established its sending direction, so this establishes the reverse direction. A local
    ///  send stream that is connected or has a SYN in flight is left alone, unless the peer started
    ///  a new session: its receiving side is gone then, and the reverse direction is re-established.
    async fn on_receiver_connected(&self, connection_id: ConnectionId, peer_addr: SocketAddr, new_session: bool) {
        let send_stream = self.get_or_create_send_stream(connection_id).await;
        let mut send_stream = send_stream.lock().await;
        if new_session {
            info!("peer {:?} started a new session for {} - reconnecting", peer_addr, connection_id);
        }
        else if send_stream.is_connected() || send_stream.is_handshaking() {
            debug!("sending direction of {} is already established", connection_id);
            return;
        }
        send_stream.connect(peer_addr).await;
    }

    /// Discards all state of a connection. The handler is notified if there was anything to
    ///  discard, i.e. exactly once per failing connection.
    pub async fn connection_failed(&self, connection_id: ConnectionId) {
        let removed_send = self.send_streams.write().await
            .remove(&connection_id)
            .is_some();
        let removed_receive = self.receive_streams.write().await
            .remove(&connection_id)
            .is_some();
        self.addresses.write().await
            .remove(&connection_id);

        if removed_send || removed_receive {
            let num_send_streams = self.num_send_streams().await;
            let num_receive_streams = self.num_receive_streams().await;
            info!("connection {} failed: {} send streams and {} receive streams left", connection_id, num_send_streams, num_receive_streams);
            self.handler.on_connection_failed(connection_id).await;
        }
    }

    /// Gives every send stream the opportunity to retransmit
    pub async fn on_tick(&self) {
        let send_streams = self.send_streams.read().await
            .iter()
            .map(|(&connection_id, send_stream)| (connection_id, send_stream.clone()))
            .collect::<Vec<_>>();

        for (connection_id, send_stream) in send_streams {
            let event = send_stream.lock().await
                .trigger().await;
            if event == Some(SendStreamEvent::Failed) {
                self.connection_failed(connection_id).await;
            }
        }
    }

    /// Fails all connections where either stream has been idle for longer than `idle_timeout`
    pub async fn sweep_idle(&self) {
        let now = Instant::now();
        let mut idle = FxHashSet::default();

        let send_streams = self.send_streams.read().await
            .iter()
            .map(|(&connection_id, send_stream)| (connection_id, send_stream.clone()))
            .collect::<Vec<_>>();
        for (connection_id, send_stream) in send_streams {
            if now.duration_since(send_stream.lock().await.last_activity()) > self.config.idle_timeout {
                idle.insert(connection_id);
            }
        }

        let receive_streams = self.receive_streams.read().await
            .iter()
            .map(|(&connection_id, receive_stream)| (connection_id, receive_stream.clone()))
            .collect::<Vec<_>>();
        for (connection_id, receive_stream) in receive_streams {
            if now.duration_since(receive_stream.lock().await.last_activity()) > self.config.idle_timeout {
                idle.insert(connection_id);
            }
        }

        for connection_id in idle {
            info!("connection {} is idle", connection_id);
            self.connection_failed(connection_id).await;
        }
    }

    async fn get_or_create_send_stream(&self, connection_id: ConnectionId) -> Arc<Mutex<SendStream>> {
        if let Some(send_stream) = self.send_streams.read().await.get(&connection_id) {
            return send_stream.clone();
        }

        self.send_streams.write().await
            .entry(connection_id)
            .or_insert_with(|| {
                debug!("initializing send stream for {}", connection_id);
                Arc::new(Mutex::new(SendStream::new(self.config.clone(), connection_id, self.send_socket.clone())))
            })
            .clone()
    }

    async fn get_or_create_receive_stream(&self, connection_id: ConnectionId) -> Arc<Mutex<ReceiveStream>> {
        if let Some(receive_stream) = self.receive_streams.read().await.get(&connection_id) {
            return receive_stream.clone();
        }

        self.receive_streams.write().await
            .entry(connection_id)
            .or_insert_with(|| {
                debug!("initializing receive stream for {}", connection_id);
                Arc::new(Mutex::new(ReceiveStream::new(self.config.clone(), connection_id, self.send_socket.clone())))
            })
            .clone()
    }

    pub async fn num_send_streams(&self) -> usize {
        self.send_streams.read().await.len()
    }

    pub async fn num_receive_streams(&self) -> usize {
        self.receive_streams.read().await.len()
    }

    pub async fn peer_addr(&self, connection_id: ConnectionId) -> Option<SocketAddr> {
        self.addresses.read().await
            .get(&connection_id)
            .copied()
    }

    /// true if the sending direction of the connection is established
    pub async fn is_connected(&self, connection_id: ConnectionId) -> bool {
        let send_stream = self.send_streams.read().await
            .get(&connection_id)
            .cloned();
        let Some(send_stream) = send_stream else {
            return false;
        };
        let is_connected = send_stream.lock().await.is_connected();
        is_connected
    }
}
