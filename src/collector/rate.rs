//! Converts cumulative interface counters into throughput.
//!
//! Rates are megabits per second using SI megabits (10^6 bits), rounded to
//! two decimals.

use crate::core::NetworkCounters;
use std::time::Instant;
use tracing::debug;

/// Below this many seconds between two readings, no new rate is derived.
pub const MIN_ELAPSED_SECS: f64 = 1.0;

/// Upload and download throughput in Mbps.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Throughput {
    pub upload_mbps: f64,
    pub download_mbps: f64,
}

/// Converts a byte count observed over `seconds` into Mbps.
///
/// Returns zero for a non-positive or non-finite interval.
pub fn bytes_to_mbps(bytes: u64, seconds: f64) -> f64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0.0;
    }
    let megabits = (bytes as f64 * 8.0) / 1_000_000.0;
    round2(megabits / seconds)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Previous counters and the instant they were read.
#[derive(Debug, Clone, Copy)]
struct RateState {
    counters: NetworkCounters,
    at: Instant,
}

/// Stateful estimator owned by the sampling loop. Updated once per tick.
#[derive(Debug, Default)]
pub struct RateEstimator {
    previous: Option<RateState>,
    last_rate: Throughput,
}

impl RateEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives throughput from the counters read at `now`.
    ///
    /// * The first call has nothing to compare against and yields zero.
    /// * Readings less than [`MIN_ELAPSED_SECS`] apart yield the previous rate.
    /// * A counter that went backwards (interface reset) contributes zero.
    ///
    /// The stored counters and instant are replaced on every call.
    pub fn estimate(&mut self, current: NetworkCounters, now: Instant) -> Throughput {
        let rate = match self.previous {
            None => Throughput::default(),
            Some(previous) => {
                let elapsed = now
                    .checked_duration_since(previous.at)
                    .map(|d| d.as_secs_f64())
                    .unwrap_or(0.0);
                if elapsed < MIN_ELAPSED_SECS {
                    debug!(elapsed, "Counter readings too close together, keeping previous rate");
                    self.last_rate
                } else {
                    let sent = current
                        .bytes_sent
                        .checked_sub(previous.counters.bytes_sent)
                        .unwrap_or(0);
                    let received = current
                        .bytes_received
                        .checked_sub(previous.counters.bytes_received)
                        .unwrap_or(0);
                    debug!(sent, received, elapsed, "Raw bytes transferred since last tick");
                    Throughput {
                        upload_mbps: bytes_to_mbps(sent, elapsed),
                        download_mbps: bytes_to_mbps(received, elapsed),
                    }
                }
            }
        };

        self.previous = Some(RateState {
            counters: current,
            at: now,
        });
        self.last_rate = rate;
        rate
    }
}
