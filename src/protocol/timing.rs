//! Round-trip time estimation.
//!
//! RFC 6298 smoothing over ack samples. Samples come only from messages
//! that were never resent (Karn's rule), so an ack for a retransmission
//! cannot be matched to the wrong send.

use std::time::Duration;

/// RTT constants.
pub mod constants {
    use std::time::Duration;

    /// Reported RTT before the first sample.
    pub const INITIAL_RTT: Duration = Duration::from_millis(0);

    /// SRTT gain (1/8).
    pub const SRTT_ALPHA: f64 = 0.125;

    /// RTTVAR gain (1/4).
    pub const RTTVAR_BETA: f64 = 0.25;
}

/// Smoothed RTT estimator.
#[derive(Debug, Clone, Default)]
pub struct RttEstimator {
    /// Smoothed RTT in milliseconds.
    srtt: f64,
    /// RTT variance in milliseconds.
    rttvar: f64,
    /// Most recent raw sample.
    latest: Option<Duration>,
}

impl RttEstimator {
    /// Create an estimator with no samples.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a new sample.
    pub fn update(&mut self, sample: Duration) {
        let sample_ms = sample.as_secs_f64() * 1000.0;

        if self.latest.is_none() {
            self.srtt = sample_ms;
            self.rttvar = sample_ms / 2.0;
        } else {
            self.rttvar = (1.0 - constants::RTTVAR_BETA) * self.rttvar
                + constants::RTTVAR_BETA * (self.srtt - sample_ms).abs();
            self.srtt =
                (1.0 - constants::SRTT_ALPHA) * self.srtt + constants::SRTT_ALPHA * sample_ms;
        }

        self.latest = Some(sample);
    }

    /// Smoothed RTT.
    pub fn smoothed(&self) -> Duration {
        if self.latest.is_none() {
            return constants::INITIAL_RTT;
        }
        Duration::from_secs_f64(self.srtt / 1000.0)
    }

    /// RTT variance.
    pub fn variance(&self) -> Duration {
        Duration::from_secs_f64(self.rttvar / 1000.0)
    }

    /// Latest raw sample, if any.
    pub fn latest(&self) -> Option<Duration> {
        self.latest
    }

    /// Whether at least one sample has been recorded.
    pub fn has_samples(&self) -> bool {
        self.latest.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(d: Duration) -> f64 {
        d.as_secs_f64() * 1000.0
    }

    #[test]
    fn test_initial() {
        let rtt = RttEstimator::new();
        assert!(!rtt.has_samples());
        assert_eq!(rtt.smoothed(), constants::INITIAL_RTT);
        assert_eq!(rtt.latest(), None);
    }

    #[test]
    fn test_first_sample() {
        let mut rtt = RttEstimator::new();
        rtt.update(Duration::from_millis(100));

        assert!((ms(rtt.smoothed()) - 100.0).abs() < 0.01);
        assert!((ms(rtt.variance()) - 50.0).abs() < 0.01);
        assert_eq!(rtt.latest(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_smoothing_moves_toward_sample() {
        let mut rtt = RttEstimator::new();
        rtt.update(Duration::from_millis(100));
        rtt.update(Duration::from_millis(180));

        let srtt = rtt.smoothed();
        assert!(srtt > Duration::from_millis(100));
        assert!(srtt < Duration::from_millis(180));
        assert!((ms(srtt) - 110.0).abs() < 0.01);
    }
}
