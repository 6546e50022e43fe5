//! Per-session counters

use std::{fmt, time::Duration};

/// What a single poll accomplished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollOutcome {
    /// A pixel slot was handed to the device
    pub sent: bool,
    /// A result slot was read back
    pub received: bool,
    /// The termination marker has been seen
    pub finished: bool,
}

impl PollOutcome {
    /// Whether the poll moved either stream forward
    pub fn made_progress(&self) -> bool {
        self.sent || self.received
    }
}

/// Totals for one streaming session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamStats {
    pub slots_sent: u64,
    pub pixels_sent: u64,
    pub slots_received: u64,
    /// Measurements passed to the sink
    pub records_reported: u64,
    /// Frame-end and termination markers seen
    pub boundary_records: u64,
    /// Polls that neither sent nor received
    pub idle_polls: u64,
    pub elapsed: Duration,
}

impl StreamStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pixel throughput over the elapsed time
    pub fn pixels_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.pixels_sent as f64 / secs
        } else {
            0.0
        }
    }

    /// Get summary string
    pub fn summary(&self) -> String {
        format!(
            "Sent {} slots ({} pixels), received {} slots, {} results, {} markers, {} idle polls in {:.3}s",
            self.slots_sent,
            self.pixels_sent,
            self.slots_received,
            self.records_reported,
            self.boundary_records,
            self.idle_polls,
            self.elapsed.as_secs_f64()
        )
    }
}

impl fmt::Display for StreamStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}
