use std::net::SocketAddr;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;
use crate::config::FloodDetectorConfig;

struct Sample {
    count: u32,
    window_start: Instant,
}

struct FloodDetectorInner {
    samples: FxHashMap<SocketAddr, Sample>,
    banned: FxHashSet<SocketAddr>,
}

/// Detects source addresses that send suspiciously many packets. Packets are counted per address
///  in windows of `interval`, not counting the packet that opens a window: an address is banned
///  at the end of a window if it sent more than `max_samples` further packets in it. Bans are permanent for the lifetime of the detector.
pub struct FloodDetector {
    config: FloodDetectorConfig,
    inner: Mutex<FloodDetectorInner>,
}

impl FloodDetector {
    pub fn new(config: FloodDetectorConfig) -> FloodDetector {
        FloodDetector {
            config,
            inner: Mutex::new(FloodDetectorInner {
                samples: Default::default(),
                banned: Default::default(),
            }),
        }
    }

    /// Registers a packet from `addr`, returning true if the address is banned
    pub async fn check_banned(&self, addr: SocketAddr) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.banned.contains(&addr) {
            return true;
        }

        let now = Instant::now();
        let Some(sample) = inner.samples.get_mut(&addr) else {
            // the packet opening a window is not counted
            inner.samples.insert(addr, Sample { count: 0, window_start: now });
            return false;
        };
        sample.count += 1;

        if now.duration_since(sample.window_start) > self.config.interval {
            if sample.count > self.config.max_samples {
                warn!("address {:?} banned: {} packets in {:?}", addr, sample.count, now.duration_since(sample.window_start));
                inner.samples.remove(&addr);
                inner.banned.insert(addr);
                return true;
            }
            sample.count = 0;
            sample.window_start = now;
        }
        false
    }

    pub async fn is_banned(&self, addr: &SocketAddr) -> bool {
        self.inner.lock().await
            .banned.contains(addr)
    }
}
