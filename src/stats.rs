/// Snapshot of the running SSIM statistics.
///
/// The empty snapshot (`count == 0`) reports `avg = 0`, `min = 1`, `max = 0`. Once at least
/// one value was recorded, `min <= avg <= max` holds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SsimStats {
    /// Number of recorded frame scores.
    pub count: u64,
    /// Arithmetic mean of the recorded scores.
    pub avg: f64,
    /// Smallest recorded score.
    pub min: f64,
    /// Largest recorded score.
    pub max: f64,
}

impl Default for SsimStats {
    fn default() -> Self {
        Self {
            count: 0,
            avg: 0.0,
            min: 1.0,
            max: 0.0,
        }
    }
}

impl std::fmt::Display for SsimStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "avg={:.6}, min={:.6}, max={:.6}, frames={}",
            self.avg, self.min, self.max, self.count
        )
    }
}

/// Incremental mean/min/max over frame SSIM scores, without retaining history.
///
/// Single writer: only the session records values.
#[derive(Clone, Debug, Default)]
pub struct StatsAccumulator {
    stats: SsimStats,
}

impl StatsAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one frame score into the running statistics.
    pub fn record(&mut self, value: f64) {
        let s = &mut self.stats;
        let c = s.count as f64;
        s.avg = (s.avg * c + value) / (c + 1.0);
        s.count += 1;
        s.min = s.min.min(value);
        s.max = s.max.max(value);
    }

    /// Current statistics, reflecting the most recently recorded value.
    pub fn snapshot(&self) -> SsimStats {
        self.stats
    }
}

#[cfg(test)]
#[path = "../tests/unit/stats.rs"]
mod tests;
