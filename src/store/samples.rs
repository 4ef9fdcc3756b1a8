//! Bounded latency sample window.

use std::collections::VecDeque;
use std::time::Duration;

/// Latency statistics derived from a sample window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatencyStats {
    pub average: Option<Duration>,
    pub median: Option<Duration>,
    pub p95: Option<Duration>,
}

/// Fixed-capacity window of recent latency observations.
///
/// Pushing beyond capacity evicts the oldest sample. Statistics are computed
/// on read so the write path stays O(1).
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: VecDeque<Duration>,
    capacity: usize,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: Duration) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Change capacity, trimming the oldest samples if it shrank.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn average(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let total: u128 = self.samples.iter().map(Duration::as_nanos).sum();
        Some(saturating_nanos(total / self.samples.len() as u128))
    }

    pub fn stats(&self) -> LatencyStats {
        let mut sorted: Vec<Duration> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        LatencyStats {
            average: self.average(),
            median: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
        }
    }
}

/// Linearly interpolated percentile over an ascending slice.
pub fn percentile(sorted: &[Duration], pct: f64) -> Option<Duration> {
    match sorted.len() {
        0 => None,
        1 => Some(sorted[0]),
        n => {
            let rank = (pct.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            let lo = sorted[lower].as_nanos() as f64;
            let hi = sorted[upper].as_nanos() as f64;
            Some(saturating_nanos((lo + (hi - lo) * weight).round() as u128))
        }
    }
}

/// Nanoseconds to a `Duration`, clamping at `Duration::MAX`.
fn saturating_nanos(nanos: u128) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    let secs = nanos / NANOS_PER_SEC;
    match u64::try_from(secs) {
        Ok(secs) => Duration::new(secs, (nanos % NANOS_PER_SEC) as u32),
        Err(_) => Duration::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_evicts_oldest() {
        let mut window = LatencyWindow::new(3);
        for v in [10, 20, 30, 40] {
            window.push(ms(v));
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.average(), Some(ms(30)));
    }

    #[test]
    fn test_percentiles_interpolate() {
        let sorted: Vec<_> = (1..=10).map(|v| ms(v * 10)).collect();
        // rank 4.5 between 50ms and 60ms
        assert_eq!(percentile(&sorted, 50.0), Some(ms(55)));
        // rank 8.55 between 90ms and 100ms
        assert_eq!(percentile(&sorted, 95.0), Some(Duration::from_micros(95_500)));
    }

    #[test]
    fn test_stats_unsorted_input() {
        let mut window = LatencyWindow::new(10);
        for v in [300, 100, 200] {
            window.push(ms(v));
        }
        let stats = window.stats();
        assert_eq!(stats.median, Some(ms(200)));
        assert_eq!(stats.average, Some(ms(200)));
    }

    #[test]
    fn test_empty_window() {
        let window = LatencyWindow::new(5);
        assert_eq!(window.stats(), LatencyStats::default());
    }

    #[test]
    fn test_shrink_capacity() {
        let mut window = LatencyWindow::new(5);
        for v in 1..=5 {
            window.push(ms(v));
        }
        window.set_capacity(2);
        assert_eq!(window.len(), 2);
        assert_eq!(window.average(), Some(Duration::from_micros(4500)));
    }

    #[test]
    fn test_huge_samples_do_not_overflow() {
        let mut window = LatencyWindow::new(10);
        window.push(Duration::MAX);
        window.push(Duration::MAX);
        window.push(Duration::from_secs(1));

        let stats = window.stats();
        let average = stats.average.unwrap();
        assert!(average > Duration::from_secs(u64::MAX / 2));
        assert!(stats.median.is_some());
        assert_eq!(stats.p95, Some(Duration::MAX));
    }

    #[test]
    fn test_saturating_nanos() {
        assert_eq!(saturating_nanos(1_500_000_000), Duration::from_millis(1500));
        assert_eq!(saturating_nanos(u128::MAX), Duration::MAX);
    }
}
