/// Feed statistics tracking
///
/// Counts delivered events and dropped records per reason, and keeps a window
/// of relay-to-consumer latencies for percentile summaries.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::info;

const WINDOW_SIZE: usize = 10000;
const DROP_REASONS: usize = 4;

/// Why a received record did not become an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MalformedControl,
    Malformed,
    UnresolvedIndex,
    UnknownKind,
}

impl DropReason {
    const ALL: [DropReason; DROP_REASONS] = [
        DropReason::MalformedControl,
        DropReason::Malformed,
        DropReason::UnresolvedIndex,
        DropReason::UnknownKind,
    ];

    fn slot(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::MalformedControl => "malformed_control",
            DropReason::Malformed => "malformed",
            DropReason::UnresolvedIndex => "unresolved_index",
            DropReason::UnknownKind => "unknown_kind",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStats {
    pub min_ns: i64,
    pub max_ns: i64,
    pub mean_ns: f64,
    pub p50_ns: i64,
    pub p99_ns: i64,
}

#[derive(Debug, Clone)]
pub struct FeedStats {
    start_time: Option<Instant>,
    total_events: u64,
    total_bytes: u64,
    latencies: VecDeque<i64>,
    drops: [u64; DROP_REASONS],
    io_errors: u64,
}

impl FeedStats {
    pub fn new() -> Self {
        FeedStats {
            start_time: None,
            total_events: 0,
            total_bytes: 0,
            latencies: VecDeque::with_capacity(WINDOW_SIZE),
            drops: [0; DROP_REASONS],
            io_errors: 0,
        }
    }

    /// Record an event delivered to the caller
    pub fn record_event(&mut self, bytes: usize, latency_ns: i64) {
        if self.start_time.is_none() {
            self.start_time = Some(Instant::now());
        }
        self.total_events += 1;
        self.total_bytes += bytes as u64;

        if self.latencies.len() >= WINDOW_SIZE {
            self.latencies.pop_front();
        }
        self.latencies.push_back(latency_ns);
    }

    pub fn record_drop(&mut self, reason: DropReason) {
        self.drops[reason.slot()] += 1;
    }

    pub fn record_io_error(&mut self) {
        self.io_errors += 1;
    }

    pub fn events_per_sec(&self) -> f64 {
        match self.start_time {
            None => 0.0,
            Some(start) => {
                let elapsed = start.elapsed().as_secs_f64();
                if elapsed > 0.0 {
                    self.total_events as f64 / elapsed
                } else {
                    0.0
                }
            }
        }
    }

    /// Latency statistics over the recent window
    pub fn latency_stats(&self) -> Option<LatencyStats> {
        if self.latencies.is_empty() {
            return None;
        }

        let mut sorted: Vec<i64> = self.latencies.iter().copied().collect();
        sorted.sort_unstable();

        let mean = sorted.iter().map(|&v| v as f64).sum::<f64>() / sorted.len() as f64;
        Some(LatencyStats {
            min_ns: sorted[0],
            max_ns: sorted[sorted.len() - 1],
            mean_ns: mean,
            p50_ns: sorted[sorted.len() / 2],
            p99_ns: sorted[(sorted.len() * 99) / 100],
        })
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.start_time.map(|st| st.elapsed())
    }

    pub fn total_events(&self) -> u64 {
        self.total_events
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn drops(&self, reason: DropReason) -> u64 {
        self.drops[reason.slot()]
    }

    pub fn total_drops(&self) -> u64 {
        self.drops.iter().sum()
    }

    pub fn io_errors(&self) -> u64 {
        self.io_errors
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Emit a summary through the log
    pub fn log_summary(&self) {
        info!(
            events = self.total_events,
            bytes = self.total_bytes,
            events_per_sec = self.events_per_sec(),
            io_errors = self.io_errors,
            "feed statistics"
        );
        for reason in DropReason::ALL {
            let count = self.drops(reason);
            if count > 0 {
                info!(reason = reason.as_str(), count, "dropped records");
            }
        }
        if let Some(stats) = self.latency_stats() {
            info!(
                min_ns = stats.min_ns,
                max_ns = stats.max_ns,
                mean_ns = stats.mean_ns,
                p50_ns = stats.p50_ns,
                p99_ns = stats.p99_ns,
                "latency"
            );
        }
    }
}

impl Default for FeedStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_event() {
        let mut stats = FeedStats::new();
        stats.record_event(56, 1_000);
        assert_eq!(stats.total_events(), 1);
        assert_eq!(stats.total_bytes(), 56);
    }

    #[test]
    fn test_latency_stats() {
        let mut stats = FeedStats::new();
        for i in 1..=100 {
            stats.record_event(56, i);
        }

        let latency = stats.latency_stats().unwrap();
        assert_eq!(latency.min_ns, 1);
        assert_eq!(latency.max_ns, 100);
        assert_eq!(latency.p50_ns, 51);
    }

    #[test]
    fn test_latency_window_is_bounded() {
        let mut stats = FeedStats::new();
        for i in 0..(WINDOW_SIZE as i64 + 10) {
            stats.record_event(1, i);
        }
        assert_eq!(stats.latency_stats().unwrap().min_ns, 10);
    }

    #[test]
    fn test_drops() {
        let mut stats = FeedStats::new();
        stats.record_drop(DropReason::UnknownKind);
        stats.record_drop(DropReason::UnknownKind);
        stats.record_drop(DropReason::Malformed);
        assert_eq!(stats.drops(DropReason::UnknownKind), 2);
        assert_eq!(stats.drops(DropReason::UnresolvedIndex), 0);
        assert_eq!(stats.total_drops(), 3);
    }
}
