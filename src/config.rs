use std::net::SocketAddr;
use std::time::Duration;
use anyhow::bail;
use crate::packet_header::PacketHeader;

pub struct RudpConfig {
    /// The address the server binds its UDP socket to.
    pub self_addr: SocketAddr,

    /// This is the maximum size of a datagram, including the 5 byte header. Payloads are limited
    ///  to `max_datagram_size - 5` bytes, and the server's receive buffer has this size.
    ///
    /// Datagrams are never fragmented by this protocol, so this must be supported by all network
    ///  connections between peers.
    pub max_datagram_size: usize,

    /// Number of retransmissions of a message before the connection is declared failed.
    pub max_attempts: u32,

    /// Period of the retransmission timer. All RTT related values are measured in ticks of
    ///  this timer.
    pub tick_interval: Duration,

    /// Maximum number of messages a receiver buffers while waiting for a missing one. Exceeding
    ///  this fails the connection.
    pub max_pending: usize,

    pub min_srtt: f64,
    pub max_srtt: f64,
    /// initial RTT estimate for a new or reconnected sender
    pub default_srtt: f64,
    /// weight of the previous RTT estimate when folding in a new sample
    pub rtt_coefficient: f64,
    /// Retransmission spacing is `assurance_coefficient * srtt * attempt` ticks.
    pub assurance_coefficient: f64,

    /// Period of the sweep that fails idle connections
    pub idle_sweep_interval: Duration,
    /// Connections without activity for longer than this are failed by the idle sweep.
    pub idle_timeout: Duration,

    /// The single payload byte of a SYN packet. Its value has no meaning, but a SYN must carry
    ///  payload so it is not mistaken for an ack.
    pub syn_placeholder: u8,

    /// `None` disables flood detection
    pub flood_detection: Option<FloodDetectorConfig>,
}

impl Default for RudpConfig {
    fn default() -> Self {
        RudpConfig {
            self_addr: SocketAddr::from(([0, 0, 0, 0], 7777)),
            max_datagram_size: 768,
            max_attempts: 9,
            tick_interval: Duration::from_millis(10),
            max_pending: 5,
            min_srtt: 2.0,
            max_srtt: 12.5,
            default_srtt: 5.0,
            rtt_coefficient: 0.8,
            assurance_coefficient: 2.2,
            idle_sweep_interval: Duration::from_secs(600),
            idle_timeout: Duration::from_secs(600),
            syn_placeholder: 0xFD,
            flood_detection: Some(FloodDetectorConfig::default()),
        }
    }
}

impl RudpConfig {
    pub fn max_payload_len(&self) -> usize {
        self.max_datagram_size.saturating_sub(PacketHeader::SERIALIZED_LEN)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_datagram_size <= PacketHeader::SERIALIZED_LEN {
            bail!("max datagram size must be bigger than the packet header");
        }
        if self.min_srtt <= 0.0 {
            bail!("min srtt must be positive");
        }
        if self.min_srtt > self.max_srtt {
            bail!("min srtt must not be bigger than max srtt");
        }
        if self.default_srtt < self.min_srtt || self.default_srtt > self.max_srtt {
            bail!("default srtt must be between min srtt and max srtt");
        }
        if !(0.0..1.0).contains(&self.rtt_coefficient) {
            bail!("rtt coefficient must be in [0, 1)");
        }
        if self.assurance_coefficient <= 0.0 {
            bail!("assurance coefficient must be positive");
        }
        if self.tick_interval.is_zero() || self.idle_sweep_interval.is_zero() || self.idle_timeout.is_zero() {
            bail!("intervals must be non-zero");
        }
        if let Some(flood_detection) = &self.flood_detection {
            flood_detection.validate()?;
        }

        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct FloodDetectorConfig {
    /// maximum number of packets per address during `interval`
    pub max_samples: u32,
    pub interval: Duration,
}

impl Default for FloodDetectorConfig {
    fn default() -> Self {
        FloodDetectorConfig {
            max_samples: 60,
            interval: Duration::from_secs(10),
        }
    }
}

impl FloodDetectorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.interval.is_zero() {
            bail!("flood detection interval must be non-zero");
        }
        Ok(())
    }
}
