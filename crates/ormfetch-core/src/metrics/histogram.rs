//! Fixed-bucket histogram.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free histogram over fixed upper bounds.
///
/// Each observation lands in the first bucket whose bound is at least the
/// value; values above the last bound land in the last bucket.
pub struct Histogram {
    bounds: Vec<u64>,
    counts: Vec<AtomicU64>,
    sum: AtomicU64,
    count: AtomicU64,
    max: AtomicU64,
}

impl Histogram {
    /// Create a histogram with the given ascending bucket bounds.
    pub fn with_bounds(bounds: Vec<u64>) -> Self {
        let counts = bounds.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds,
            counts,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            max: AtomicU64::new(0),
        }
    }

    /// Buckets for query latency in microseconds, 100us to 5s.
    pub fn latency() -> Self {
        Self::with_bounds(vec![
            100, 500, 1_000, 5_000, 10_000, 50_000, 100_000, 500_000, 1_000_000, 5_000_000,
        ])
    }

    /// Buckets for row counts per window fill.
    pub fn row_counts() -> Self {
        Self::with_bounds(vec![1, 5, 10, 25, 50, 100, 250, 500, 1_000])
    }

    /// Record one value.
    pub fn observe(&self, value: u64) {
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max.fetch_max(value, Ordering::Relaxed);

        if self.counts.is_empty() {
            return;
        }
        let bucket = self
            .bounds
            .partition_point(|&bound| bound < value)
            .min(self.counts.len() - 1);
        self.counts[bucket].fetch_add(1, Ordering::Relaxed);
    }

    /// Number of observations.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Sum of observations.
    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    /// Largest observation.
    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    /// Mean observation, zero when empty.
    pub fn avg(&self) -> u64 {
        match self.count() {
            0 => 0,
            n => self.sum() / n,
        }
    }

    /// Upper bound of the bucket holding quantile `q` (0.0 to 1.0).
    pub fn percentile(&self, q: f64) -> u64 {
        let total = self.count();
        if total == 0 {
            return 0;
        }

        let target = ((total as f64) * q).ceil().max(1.0) as u64;
        let mut seen = 0;
        for (bound, count) in self.bounds.iter().zip(&self.counts) {
            seen += count.load(Ordering::Relaxed);
            if seen >= target {
                return *bound;
            }
        }
        self.bounds.last().copied().unwrap_or(0)
    }

    /// Median.
    pub fn p50(&self) -> u64 {
        self.percentile(0.50)
    }

    /// 99th percentile.
    pub fn p99(&self) -> u64 {
        self.percentile(0.99)
    }

    /// `(bound, count)` per bucket.
    pub fn snapshot(&self) -> Vec<(u64, u64)> {
        self.bounds
            .iter()
            .zip(&self.counts)
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.sum.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
        self.max.store(0, Ordering::Relaxed);
        self.counts
            .iter()
            .for_each(|count| count.store(0, Ordering::Relaxed));
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::latency()
    }
}
