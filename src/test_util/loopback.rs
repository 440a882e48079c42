use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tracing::trace;
use crate::config::RudpConfig;
use crate::connection_handler::ConnectionHandler;
use crate::end_point::EndPoint;
use crate::send_socket::SendSocket;

/// returns true for packets that should be lost: `(from, to, packet)`
type DropFilter = Arc<dyn Fn(SocketAddr, SocketAddr, &[u8]) -> bool + Send + Sync>;

/// An in-memory network of [EndPoint]s. Every packet is delivered in a task of its own, the way
///  the server dispatches received datagrams.
#[derive(Default)]
pub struct LoopbackNetwork {
    end_points: Mutex<FxHashMap<SocketAddr, Weak<EndPoint>>>,
    drop_filter: Mutex<Option<DropFilter>>,
    num_dropped: AtomicUsize,
}

impl LoopbackNetwork {
    pub fn new() -> Arc<LoopbackNetwork> {
        Default::default()
    }

    pub fn add_end_point(self: &Arc<Self>, addr: SocketAddr, config: RudpConfig, handler: Arc<dyn ConnectionHandler>) -> Arc<EndPoint> {
        let socket = Arc::new(LoopbackSocket {
            network: self.clone(),
            self_addr: addr,
        });
        let end_point = Arc::new(EndPoint::new(Arc::new(config), socket, handler));
        self.end_points.lock().unwrap()
            .insert(addr, Arc::downgrade(&end_point));
        end_point
    }

    /// packets to a removed address are silently lost
    pub fn remove_end_point(&self, addr: SocketAddr) {
        self.end_points.lock().unwrap()
            .remove(&addr);
    }

    pub fn set_drop_filter(&self, filter: impl Fn(SocketAddr, SocketAddr, &[u8]) -> bool + Send + Sync + 'static) {
        *self.drop_filter.lock().unwrap() = Some(Arc::new(filter));
    }

    pub fn num_dropped(&self) -> usize {
        self.num_dropped.load(Ordering::Acquire)
    }

    fn deliver(&self, from: SocketAddr, to: SocketAddr, packet_buf: &[u8]) {
        let filter = self.drop_filter.lock().unwrap().clone();
        if let Some(filter) = filter {
            if filter(from, to, packet_buf) {
                trace!("dropping packet from {:?} to {:?}: {:?}", from, to, packet_buf);
                self.num_dropped.fetch_add(1, Ordering::AcqRel);
                return;
            }
        }

        let target = self.end_points.lock().unwrap()
            .get(&to)
            .and_then(Weak::upgrade);
        if let Some(end_point) = target {
            let packet = packet_buf.to_vec();
            tokio::spawn(async move {
                let _ = end_point.on_received(&packet, from).await;
            });
        }
    }
}

struct LoopbackSocket {
    network: Arc<LoopbackNetwork>,
    self_addr: SocketAddr,
}

#[async_trait]
impl SendSocket for LoopbackSocket {
    async fn do_send_packet(&self, to: SocketAddr, packet_buf: &[u8]) {
        self.network.deliver(self.self_addr, to, packet_buf);
    }
}
