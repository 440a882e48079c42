use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, span, trace, warn, Instrument, Level};
use uuid::Uuid;
use crate::config::RudpConfig;
use crate::connection_handler::ConnectionHandler;
use crate::end_point::EndPoint;
use crate::flood_detector::FloodDetector;

struct UdpServerInner {
    config: Arc<RudpConfig>,
    socket: Arc<UdpSocket>,
    end_point: Arc<EndPoint>,
    flood_detector: Option<FloodDetector>,
    received_in_current_second: AtomicU32,
    requests_per_second: AtomicU32,
}

impl UdpServerInner {
    async fn recv_loop(self: Arc<Self>) {
        info!("starting receive loop");

        // one spare byte to detect datagrams that would otherwise be truncated silently
        let mut buf = vec![0u8; self.config.max_datagram_size + 1];
        loop {
            let (num_read, from) = match self.socket.recv_from(&mut buf).await {
                Ok(x) => x,
                Err(e) => {
                    error!("socket error: {}", e);
                    continue;
                }
            };
            self.received_in_current_second.fetch_add(1, Ordering::Relaxed);

            if let Some(flood_detector) = &self.flood_detector {
                if flood_detector.check_banned(from).await {
                    trace!("dropping packet from banned address {:?}", from);
                    continue;
                }
            }

            if num_read > self.config.max_datagram_size {
                warn!("dropping datagram from {:?}: exceeds the maximum size of {} bytes", from, self.config.max_datagram_size);
                continue;
            }

            let correlation_id = Uuid::new_v4();
            let span = span!(Level::TRACE, "packet_received", ?correlation_id);

            let packet_buf = buf[..num_read].to_vec();
            let end_point = self.end_point.clone();
            tokio::spawn(async move {
                trace!("received packet from {:?}: {:?}", from, packet_buf);
                if let Err(e) = end_point.on_received(&packet_buf, from).await {
                    debug!("error handling packet from {:?}: {}", from, e);
                }
            }.instrument(span));
        }
    }

    async fn rps_loop(inner: Weak<UdpServerInner>) {
        let mut rps_interval = interval(Duration::from_secs(1));
        rps_interval.tick().await;
        loop {
            rps_interval.tick().await;
            match inner.upgrade() {
                Some(inner) => {
                    let num_received = inner.received_in_current_second.swap(0, Ordering::Relaxed);
                    inner.requests_per_second.store(num_received, Ordering::Relaxed);
                }
                None => break,
            }
        }
    }
}

/// Owns the UDP socket: It feeds received datagrams to an [EndPoint], one task per datagram,
///  and keeps statistics of the number of datagrams received.
pub struct UdpServer {
    inner: Arc<UdpServerInner>,
    local_addr: SocketAddr,
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for UdpServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl UdpServer {
    /// Binds to `config.self_addr` and starts receiving as well as the protocol's periodic tasks
    pub async fn bind(config: RudpConfig, handler: Arc<dyn ConnectionHandler>) -> anyhow::Result<UdpServer> {
        config.validate()?;
        let config = Arc::new(config);

        let socket = Arc::new(UdpSocket::bind(config.self_addr).await?);
        let local_addr = socket.local_addr()?;
        info!("bound UDP socket to {:?}", local_addr);

        let end_point = Arc::new(EndPoint::new(config.clone(), socket.clone(), handler));
        end_point.spawn_periodic_tasks();

        let flood_detector = config.flood_detection.clone()
            .map(FloodDetector::new);

        let inner = Arc::new(UdpServerInner {
            config,
            socket,
            end_point,
            flood_detector,
            received_in_current_second: AtomicU32::new(0),
            requests_per_second: AtomicU32::new(0),
        });

        let tasks = vec![
            tokio::spawn(inner.clone().recv_loop()),
            tokio::spawn(UdpServerInner::rps_loop(Arc::downgrade(&inner))),
        ];

        Ok(UdpServer {
            inner,
            local_addr,
            tasks,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn end_point(&self) -> &Arc<EndPoint> {
        &self.inner.end_point
    }

    /// number of datagrams received during the last full second
    pub fn requests_per_second(&self) -> u32 {
        self.inner.requests_per_second.load(Ordering::Relaxed)
    }

    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.abort();
        }
        self.inner.end_point.shutdown();
    }
}
