use crate::config::RudpConfig;

/// Exponentially smoothed round trip time, measured in ticks of the retransmission timer. The
///  estimate is clamped to `[min_srtt, max_srtt]` after every sample.
#[derive(Clone, Debug)]
pub struct RttEstimator {
    srtt: f64,
    min_srtt: f64,
    max_srtt: f64,
    default_srtt: f64,
    /// weight of the previous estimate when folding in a new sample
    rtt_coefficient: f64,
}

impl RttEstimator {
    pub fn new(config: &RudpConfig) -> RttEstimator {
        RttEstimator {
            srtt: config.default_srtt,
            min_srtt: config.min_srtt,
            max_srtt: config.max_srtt,
            default_srtt: config.default_srtt,
            rtt_coefficient: config.rtt_coefficient,
        }
    }

    pub fn srtt(&self) -> f64 {
        self.srtt
    }

    pub fn reset(&mut self) {
        self.srtt = self.default_srtt;
    }

    pub fn on_sample(&mut self, sample_ticks: u64) {
        let smoothed = self.rtt_coefficient * self.srtt + (1.0 - self.rtt_coefficient) * sample_ticks as f64;
        self.srtt = smoothed.clamp(self.min_srtt, self.max_srtt);
    }
}
