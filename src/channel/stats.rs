//! Per-channel transfer statistics

/// Counters kept by a channel while it is polled
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Non-blocking transfer attempts (`send` or `recv` calls)
    pub attempts: u64,
    /// Attempts that moved a slot
    pub transferred: u64,
    /// Slots handed back to the device after reading
    pub discarded: u64,
}

impl ChannelStats {
    pub fn new() -> Self {
        Default::default()
    }

    /// Attempts that found no slot available
    pub fn idle_polls(&self) -> u64 {
        self.attempts - self.transferred
    }

    /// Fraction of attempts that moved a slot (0.0 to 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        self.transferred as f64 / self.attempts as f64
    }

    /// Get a summary string of the statistics
    pub fn summary(&self) -> String {
        format!(
            "ChannelStats {{ attempts: {}, transferred: {}, discarded: {}, success_rate: {:.2}% }}",
            self.attempts,
            self.transferred,
            self.discarded,
            self.success_rate() * 100.0
        )
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let mut stats = ChannelStats::new();
        assert_eq!(stats.success_rate(), 0.0);

        stats.attempts = 8;
        stats.transferred = 2;
        assert_eq!(stats.idle_polls(), 6);
        assert_eq!(stats.success_rate(), 0.25);
        assert!(stats.summary().contains("25.00%"));

        stats.reset();
        assert_eq!(stats, ChannelStats::default());
    }
}
